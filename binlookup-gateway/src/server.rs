use crate::app::{LookupOutcome, LookupUseCase};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

pub const INVALID_BIN_BODY: &str = "Invalid BIN number";
pub const SERVER_ERROR_BODY: &str = "Server error";
pub const RATE_LIMITED_BODY: &str = "Rate limit exceeded";
pub const NOT_FOUND_BODY: &str = "No data found for this BIN/IIN number";
pub const ENCODING_ERROR_BODY: &str = "Failed to encode BIN data as JSON";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub lookup: Arc<LookupUseCase>,
    pub metrics: Option<PrometheusHandle>,
}

/// First `bin` value of the query; missing means empty.
fn bin_param(params: &[(String, String)]) -> &str {
    params
        .iter()
        .find(|(name, _)| name == "bin")
        .map(|(_, value)| value.as_str())
        .unwrap_or_default()
}

/// GET /?bin=<bin>
///
/// Pairs rather than a struct so a repeated `bin` still reaches validation.
async fn lookup_handler(
    State(state): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let outcome = state.lookup.lookup(bin_param(&params).trim()).await;
    outcome_response(outcome)
}

/// Map a lookup outcome to its status code and body.
pub fn outcome_response(outcome: LookupOutcome) -> Response {
    match outcome {
        LookupOutcome::InvalidInput => (StatusCode::BAD_REQUEST, INVALID_BIN_BODY).into_response(),
        LookupOutcome::Found { record, .. } => match serde_json::to_vec(&record) {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "application/json")],
                body,
            )
                .into_response(),
            Err(e) => {
                error!("Failed to encode card record: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, ENCODING_ERROR_BODY).into_response()
            }
        },
        LookupOutcome::RateLimited { retry_after } => {
            let mut response = (StatusCode::TOO_MANY_REQUESTS, RATE_LIMITED_BODY).into_response();
            if let Some(retry_after) = retry_after {
                // Round up so clients never retry before the window opens.
                let secs = retry_after.as_secs() + u64::from(retry_after.subsec_nanos() > 0);
                response
                    .headers_mut()
                    .insert(header::RETRY_AFTER, HeaderValue::from(secs.max(1)));
            }
            response
        }
        LookupOutcome::ServerError => {
            (StatusCode::INTERNAL_SERVER_ERROR, SERVER_ERROR_BODY).into_response()
        }
        LookupOutcome::NotFound => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "binlookup-gateway",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Prometheus exposition, when the recorder is installed
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "Metrics recorder not installed").into_response(),
    }
}

/// Create the HTTP router with all routes
pub fn create_server(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET])
        .allow_headers(Any);

    Router::new()
        .route("/", get(lookup_handler))
        .route("/health", get(health))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
}

/// Start the HTTP server and run until Ctrl-C
pub async fn start_server(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = create_server(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server starting on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler, run until the process is killed.
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::RecordSource;
    use binlookup_core::CardRecord;
    use std::time::Duration;

    #[test]
    fn test_status_codes() {
        let cases = [
            (LookupOutcome::InvalidInput, StatusCode::BAD_REQUEST),
            (LookupOutcome::ServerError, StatusCode::INTERNAL_SERVER_ERROR),
            (LookupOutcome::NotFound, StatusCode::NOT_FOUND),
            (
                LookupOutcome::RateLimited { retry_after: None },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                LookupOutcome::Found {
                    record: CardRecord::default(),
                    source: RecordSource::Cache,
                },
                StatusCode::OK,
            ),
        ];

        for (outcome, status) in cases {
            assert_eq!(outcome_response(outcome).status(), status);
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let response = outcome_response(LookupOutcome::RateLimited {
            retry_after: Some(Duration::from_millis(1200)),
        });
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");

        let response = outcome_response(LookupOutcome::RateLimited {
            retry_after: Some(Duration::from_millis(5)),
        });
        assert_eq!(response.headers()[header::RETRY_AFTER], "1");

        let response = outcome_response(LookupOutcome::RateLimited { retry_after: None });
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_first_bin_param_wins() {
        let params = vec![
            ("other".to_string(), "1".to_string()),
            ("bin".to_string(), "abc".to_string()),
            ("bin".to_string(), "411111".to_string()),
        ];
        assert_eq!(bin_param(&params), "abc");
        assert_eq!(bin_param(&[]), "");
    }

    #[test]
    fn test_found_is_json() {
        let response = outcome_response(LookupOutcome::Found {
            record: CardRecord::default(),
            source: RecordSource::Upstream,
        });
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/json");
    }
}
