//! Concrete providers against stub backends that mimic each vendor's API.
//!
//! Run with: `cargo test -p callflow-providers --test providers`

mod common;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path, Query};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use callflow_providers::deepgram::DeepgramProvider;
use callflow_providers::elevenlabs::ElevenLabsSynthesizer;
use callflow_providers::openai::OpenAiResponder;
use callflow_providers::{HealthProbe, ProviderError, Responder, Synthesizer, Transcriber};
use serde_json::{Value, json};

use common::{dead_url, fast_policy, spawn_stub};

fn header(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

#[tokio::test]
async fn test_deepgram_transcribe() {
    let received = Arc::new(Mutex::new(None::<(String, Vec<u8>)>));
    let sink = received.clone();
    let router = Router::new().route(
        "/listen",
        post(move |headers: HeaderMap, body: Bytes| {
            let sink = sink.clone();
            async move {
                *sink.lock().unwrap() = Some((header(&headers, "authorization"), body.to_vec()));
                Json(json!({
                    "results": {
                        "channels": [{ "alternatives": [{ "transcript": "Hello world" }] }]
                    }
                }))
            }
        }),
    );
    let url = spawn_stub(router).await;
    let stt = DeepgramProvider::new("fake_key", Some(&url), fast_policy(3)).unwrap();

    let transcript = stt
        .transcribe(Bytes::from_static(b"fake_audio_data"))
        .await
        .unwrap();
    assert_eq!(transcript, "Hello world");

    let (auth, body) = received.lock().unwrap().take().expect("backend was not called");
    assert_eq!(auth, "Token fake_key");
    assert_eq!(body, b"fake_audio_data");
}

#[tokio::test]
async fn test_deepgram_transcribe_rejected_key() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/listen",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": "Invalid API key" })))
            }
        }),
    );
    let url = spawn_stub(router).await;
    let stt = DeepgramProvider::new("invalid_key", Some(&url), fast_policy(3)).unwrap();

    let err = stt
        .transcribe(Bytes::from_static(b"fake_audio_data"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Status { status: 401, attempts: 3, .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_deepgram_synthesize_uses_speak_model() {
    let router = Router::new().route(
        "/speak",
        post(
            |Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                assert_eq!(params.get("model").map(String::as_str), Some("aura-luna-en"));
                assert_eq!(body["text"], "Hi there");
                Bytes::from_static(b"MP3DATA")
            },
        ),
    );
    let url = spawn_stub(router).await;
    let tts = DeepgramProvider::new("fake_key", Some(&url), fast_policy(1))
        .unwrap()
        .with_speak_model("aura-luna-en");

    let audio = tts.synthesize("Hi there").await.unwrap();
    assert_eq!(&audio[..], b"MP3DATA");
}

#[tokio::test]
async fn test_openai_generate_response() {
    let router = Router::new().route(
        "/chat/completions",
        post(|headers: HeaderMap, Json(body): Json<Value>| async move {
            assert_eq!(header(&headers, "authorization"), "Bearer fake_key");
            assert_eq!(body["model"], "gpt-4o-mini");
            assert_eq!(body["messages"][0]["role"], "system");
            let user = body["messages"][1]["content"].clone();
            Json(json!({ "choices": [{ "message": { "role": "assistant", "content": user } }] }))
        }),
    );
    let url = spawn_stub(router).await;
    let llm = OpenAiResponder::new("fake_key", Some(&url), fast_policy(3)).unwrap();

    let reply = llm.generate_response("Hello world").await.unwrap();
    assert_eq!(reply, "Hello world");
}

#[tokio::test]
async fn test_openai_malformed_response_is_not_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let counter = hits.clone();
    let router = Router::new().route(
        "/chat/completions",
        post(move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Json(json!({ "error": "Invalid API key" }))
            }
        }),
    );
    let url = spawn_stub(router).await;
    let llm = OpenAiResponder::new("fake_key", Some(&url), fast_policy(3)).unwrap();

    let err = llm.generate_response("Hello world").await.unwrap_err();
    assert!(matches!(err, ProviderError::MalformedResponse { .. }));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_elevenlabs_synthesize() {
    let router = Router::new().route(
        "/text-to-speech/{voice_id}",
        post(
            |Path(voice_id): Path<String>, headers: HeaderMap, Json(body): Json<Value>| async move {
                assert_eq!(voice_id, "9BWtsMINqrJLrRacOk9x");
                assert_eq!(header(&headers, "xi-api-key"), "fake_key");
                assert_eq!(body["text"], "Hello world");
                assert_eq!(body["voice_settings"]["stability"], 0.75);
                assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
                Bytes::from_static(b"ID3audio")
            },
        ),
    );
    let url = spawn_stub(router).await;
    let tts = ElevenLabsSynthesizer::new("fake_key", Some(&url), fast_policy(1)).unwrap();

    let audio = tts.synthesize("Hello world").await.unwrap();
    assert_eq!(&audio[..], b"ID3audio");
}

#[tokio::test]
async fn test_elevenlabs_voice_id_is_one_path_segment() {
    let router = Router::new().route(
        "/text-to-speech/{voice_id}",
        post(|Path(voice_id): Path<String>| async move {
            assert_eq!(voice_id, "team/voice?v=2");
            Bytes::from_static(b"ID3audio")
        }),
    );
    let url = spawn_stub(router).await;
    let tts = ElevenLabsSynthesizer::new("fake_key", Some(&url), fast_policy(1))
        .unwrap()
        .with_voice("team/voice?v=2");

    let audio = tts.synthesize("Hello world").await.unwrap();
    assert_eq!(&audio[..], b"ID3audio");
}

#[tokio::test]
async fn test_deepgram_models_are_sent_as_single_query_values() {
    let router = Router::new()
        .route(
            "/listen",
            post(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("model").map(String::as_str), Some("nova-2&punctuate=true"));
                assert!(!params.contains_key("punctuate"));
                Json(json!({
                    "results": {
                        "channels": [{ "alternatives": [{ "transcript": "ok" }] }]
                    }
                }))
            }),
        )
        .route(
            "/speak",
            post(
                |Query(params): Query<HashMap<String, String>>, Json(body): Json<Value>| async move {
                    assert_eq!(params.get("model").map(String::as_str), Some("aura a&b=c"));
                    assert_eq!(params.len(), 1);
                    assert_eq!(body["text"], "Hi there");
                    Bytes::from_static(b"MP3DATA")
                },
            ),
        );
    let url = spawn_stub(router).await;
    let provider = DeepgramProvider::new("fake_key", Some(&url), fast_policy(1))
        .unwrap()
        .with_listen_model("nova-2&punctuate=true")
        .with_speak_model("aura a&b=c");

    let transcript = provider
        .transcribe(Bytes::from_static(b"fake_audio_data"))
        .await
        .unwrap();
    assert_eq!(transcript, "ok");
    let audio = provider.synthesize("Hi there").await.unwrap();
    assert_eq!(&audio[..], b"MP3DATA");
}

#[tokio::test]
async fn test_health_checks_follow_probe_status() {
    let router = Router::new()
        .route("/projects", get(|| async { StatusCode::OK }))
        .route("/models", get(|| async { StatusCode::UNAUTHORIZED }))
        .route("/voices", get(|| async { Json(json!({ "voices": [] })) }));
    let url = spawn_stub(router).await;

    let stt = DeepgramProvider::new("k", Some(&url), fast_policy(2)).unwrap();
    let llm = OpenAiResponder::new("k", Some(&url), fast_policy(2)).unwrap();
    let tts = ElevenLabsSynthesizer::new("k", Some(&url), fast_policy(2)).unwrap();

    assert!(stt.health_check().await);
    assert!(!llm.health_check().await);
    assert!(tts.health_check().await);
}

#[tokio::test]
async fn test_health_check_unreachable_backend_is_false() {
    let stt = DeepgramProvider::new("k", Some(&dead_url()), fast_policy(1)).unwrap();
    assert!(!stt.health_check().await);
}
