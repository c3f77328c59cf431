//! Core configuration and error types for Callflow.

pub mod config;
pub mod error;
