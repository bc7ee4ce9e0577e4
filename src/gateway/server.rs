//! HTTP server for the translation endpoints

use super::error::GatewayError;
use super::request::{Operation, PromptRequest, TranslationRequest, TranslationResponse};
use crate::config::Config;
use crate::services::translator::TranslatorService;
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{debug, info};

/// Shared state for request handlers
pub struct GatewayState {
    pub translator: TranslatorService,
}

/// Build the router with CORS headers on every response
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/translate", any(translate))
        .route("/api/complete", any(complete))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static("Content-Type"),
        ))
        .with_state(Arc::new(state))
}

/// Bind and serve until the process exits
pub async fn serve(config: &Config, state: GatewayState) -> Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind gateway to {}", addr))?;

    info!("Translation gateway listening on {}", addr);

    axum::serve(listener, router(state))
        .await
        .context("Gateway server error")
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

/// Translate, detect or refine
async fn translate(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    body: Bytes,
) -> Result<Response, GatewayError> {
    match method {
        Method::OPTIONS => Ok(StatusCode::OK.into_response()),
        Method::POST => {
            let request: TranslationRequest = parse_body(&body)?;
            let operation = Operation::try_from(request)?;
            let response = dispatch(&state.translator, operation).await?;
            Ok(Json(response).into_response())
        }
        _ => Err(GatewayError::MethodNotAllowed),
    }
}

/// Legacy endpoint: forward a raw prompt
async fn complete(
    State(state): State<Arc<GatewayState>>,
    method: Method,
    body: Bytes,
) -> Result<Response, GatewayError> {
    match method {
        Method::OPTIONS => Ok(StatusCode::OK.into_response()),
        Method::POST => {
            let request: PromptRequest = parse_body(&body)?;
            let prompt = request
                .prompt
                .filter(|p| !p.is_empty())
                .ok_or_else(|| GatewayError::validation("Missing prompt"))?;

            debug!("Forwarding raw prompt ({} chars)", prompt.chars().count());

            let translation = state
                .translator
                .complete_prompt(&prompt, request.temperature)
                .await?;
            Ok(Json(TranslationResponse::Single { translation }).into_response())
        }
        _ => Err(GatewayError::MethodNotAllowed),
    }
}

/// Run a validated operation against the translator
pub async fn dispatch(
    translator: &TranslatorService,
    operation: Operation,
) -> Result<TranslationResponse> {
    match operation {
        Operation::Detect { text } => {
            debug!("Detecting language of {} chars", text.chars().count());
            let lang = translator.detect_language(&text).await?;
            Ok(TranslationResponse::Detected { lang })
        }
        Operation::Refine {
            source,
            current,
            target,
        } => {
            debug!("Refining translation to {}", target);
            let translation = translator.refine(&source, &current, &target).await?;
            Ok(TranslationResponse::Single { translation })
        }
        Operation::TranslateBatch { items, target } => {
            let translations = translator.translate_batch(&items, &target).await?;
            Ok(TranslationResponse::Batch { translations })
        }
        Operation::TranslateText { text, target } => {
            let translation = translator.translate_text(&text, &target).await?;
            Ok(TranslationResponse::Single { translation })
        }
    }
}

/// Decode a JSON body; an empty body reads as `{}`
fn parse_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| {
        debug!("Rejected request body: {}", e);
        GatewayError::validation("Invalid JSON body")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompletionConfig;
    use crate::services::completion::testing::ScriptedClient;
    use axum::body::Body;
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn app(client: Arc<ScriptedClient>) -> Router {
        let translator = TranslatorService::new(&CompletionConfig::default(), client);
        router(GatewayState { translator })
    }

    async fn send(app: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Response) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn post(app: Router, body: Value) -> (StatusCode, Value) {
        let (status, response) = send(app, Method::POST, "/api/translate", &body.to_string()).await;
        (status, json_body(response).await)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    /// In-memory sink for tracing output
    #[derive(Clone, Default)]
    struct LogCapture(Arc<Mutex<Vec<u8>>>);

    impl LogCapture {
        fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
            let sink = self.clone();
            tracing_subscriber::fmt()
                .with_writer(move || sink.clone())
                .with_ansi(false)
                .with_max_level(tracing::Level::DEBUG)
                .finish()
        }

        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn assert_cors(response: &Response) {
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_HEADERS], "Content-Type");
    }

    #[tokio::test]
    async fn test_options_preflight() {
        let client = Arc::new(ScriptedClient::default());
        let (status, response) = send(app(client.clone()), Method::OPTIONS, "/api/translate", "not json at all").await;

        assert_eq!(status, StatusCode::OK);
        assert_cors(&response);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.is_empty());
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_other_methods_rejected() {
        for method in [Method::GET, Method::PUT, Method::DELETE] {
            let client = Arc::new(ScriptedClient::replying("unused"));
            let (status, response) = send(app(client.clone()), method, "/api/translate", "").await;

            assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
            assert_cors(&response);
            assert_eq!(json_body(response).await, json!({ "error": "Only POST supported" }));
            assert!(client.requests().is_empty());
        }
    }

    #[tokio::test]
    async fn test_detect() {
        let client = Arc::new(ScriptedClient::replying(" FR\n"));
        let (status, body) = post(app(client.clone()), json!({ "mode": "detect", "text": "Bonjour" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "lang": "fr" }));
        assert_eq!(client.requests()[0].model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_detect_code_is_short_and_lowercase() {
        let client = Arc::new(ScriptedClient::replying("The language is French"));
        let (_, body) = post(app(client), json!({ "mode": "detect", "text": "Bonjour" })).await;

        let lang = body["lang"].as_str().unwrap();
        assert!(lang.chars().count() <= 5);
        assert_eq!(lang, lang.to_lowercase());
    }

    #[tokio::test]
    async fn test_detect_missing_text() {
        let client = Arc::new(ScriptedClient::default());
        let (status, body) = post(app(client.clone()), json!({ "mode": "detect" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing text" }));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_refine() {
        let client = Arc::new(ScriptedClient::replying("Guten Morgen"));
        let (status, body) = post(
            app(client),
            json!({ "mode": "refine", "source": "Good morning", "current": "Gute Morgen", "target": "de" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "translation": "Guten Morgen" }));
    }

    #[tokio::test]
    async fn test_refine_missing_field() {
        let client = Arc::new(ScriptedClient::default());
        let (status, body) = post(app(client.clone()), json!({ "mode": "refine", "source": "a", "target": "de" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing refine fields" }));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_translate_batch_strict() {
        let client = Arc::new(ScriptedClient::replying(r#"["Enregistrer", "Annuler", "Ouvrir"]"#));
        let (status, body) = post(
            app(client),
            json!({ "items": ["Save", "Cancel", "Open"], "target": "fr" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "translations": ["Enregistrer", "Annuler", "Ouvrir"] }));
    }

    #[tokio::test]
    async fn test_translate_batch_line_fallback_keeps_length() {
        let client = Arc::new(ScriptedClient::replying("Sure! Here you go:\nEnregistrer"));
        let (status, body) = post(
            app(client),
            json!({ "items": ["Save", "Cancel", "Open"], "target": "fr" }),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({ "translations": ["Sure! Here you go:", "Enregistrer", "Open"] })
        );
    }

    #[tokio::test]
    async fn test_translate_single_from_prompt() {
        let client = Arc::new(ScriptedClient::replying(r#"["Traduisez ceci"]"#));
        let (status, body) = post(app(client.clone()), json!({ "prompt": "Translate this to French" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "translation": "Traduisez ceci" }));
        assert!(client.requests()[0].messages[1].content.contains("to French."));
    }

    #[tokio::test]
    async fn test_translate_single_empty_reply_returns_input() {
        let client = Arc::new(ScriptedClient::replying(""));
        let (status, body) = post(app(client), json!({ "text": "Hello", "target": "fr" })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "translation": "Hello" }));
    }

    #[tokio::test]
    async fn test_translate_missing_payload() {
        let client = Arc::new(ScriptedClient::default());
        let (status, body) = post(app(client.clone()), json!({ "items": [], "target": "fr" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing text/prompt" }));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_translate_missing_target() {
        let client = Arc::new(ScriptedClient::default());
        let (status, body) = post(app(client.clone()), json!({ "text": "Hello" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Missing target language" }));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_body() {
        let client = Arc::new(ScriptedClient::default());
        let (status, response) = send(app(client.clone()), Method::POST, "/api/translate", "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Invalid JSON body" }));

        let (status, body) = post(app(client.clone()), json!({ "items": [1, 2], "target": "fr" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Invalid JSON body" }));
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_empty_body_is_validation_error() {
        let client = Arc::new(ScriptedClient::default());
        let (status, response) = send(app(client), Method::POST, "/api/translate", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Missing target language" }));
    }

    #[tokio::test]
    async fn test_upstream_failure_every_mode() {
        let bodies = [
            json!({ "mode": "detect", "text": "Hola" }),
            json!({ "mode": "refine", "source": "a", "current": "b", "target": "fr" }),
            json!({ "items": ["a", "b"], "target": "fr" }),
            json!({ "text": "a", "target": "fr" }),
        ];
        for body in bodies {
            let logs = LogCapture::default();
            // tokio::test runs on one thread, so the guard covers every await below
            let _guard = tracing::subscriber::set_default(logs.subscriber());

            let client = Arc::new(ScriptedClient::failing("connection reset by peer"));
            let (status, response) = send(app(client.clone()), Method::POST, "/api/translate", &body.to_string()).await;

            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_cors(&response);
            assert_eq!(json_body(response).await, json!({ "error": "Translation failed" }));
            assert_eq!(client.requests().len(), 1);

            let output = logs.contents();
            assert!(
                output
                    .lines()
                    .any(|line| line.contains("ERROR") && line.contains("Translation failed: connection reset by peer")),
                "no error log for {}:\n{}",
                body,
                output
            );
        }
    }

    #[tokio::test]
    async fn test_validation_failure_not_logged_as_error() {
        let logs = LogCapture::default();
        let _guard = tracing::subscriber::set_default(logs.subscriber());

        let client = Arc::new(ScriptedClient::default());
        let (status, _) = post(app(client), json!({ "mode": "detect" })).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!logs.contents().contains("Translation failed"));
    }

    #[tokio::test]
    async fn test_legacy_complete() {
        let client = Arc::new(ScriptedClient::replying("  Hallo Welt \n"));
        let (status, response) = send(
            app(client.clone()),
            Method::POST,
            "/api/complete",
            r#"{"prompt":"Say hello world in German","temperature":0.5}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_cors(&response);
        assert_eq!(json_body(response).await, json!({ "translation": "Hallo Welt" }));
        assert_eq!(client.requests()[0].temperature, 0.5);
    }

    #[tokio::test]
    async fn test_legacy_complete_missing_prompt() {
        let client = Arc::new(ScriptedClient::default());
        let (status, response) = send(app(client), Method::POST, "/api/complete", "{}").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await, json!({ "error": "Missing prompt" }));
    }

    #[tokio::test]
    async fn test_health_has_cors() {
        let client = Arc::new(ScriptedClient::default());
        let (status, response) = send(app(client), Method::GET, "/health", "").await;
        assert_eq!(status, StatusCode::OK);
        assert_cors(&response);
    }
}
