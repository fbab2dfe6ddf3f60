//! HTTP scoring service

use crate::bundle::ModelRegistry;
use crate::error::ScoringError;
use crate::geography::Geography;
use crate::schema::CustomerRecord;
use crate::scoring::{feature_importances, score_batch, FeatureImportanceMap, PredictionResult};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared, read-only handler state.
#[derive(Clone)]
pub struct AppState {
    registry: Arc<ModelRegistry>,
}

impl AppState {
    pub fn new(registry: ModelRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }
}

/// Scoring request body: the `{"clients": [...]}` envelope or a bare array.
#[derive(Debug)]
pub enum BatchRequest {
    Envelope { clients: Vec<CustomerRecord> },
    Records(Vec<CustomerRecord>),
}

impl BatchRequest {
    pub fn into_records(self) -> Vec<CustomerRecord> {
        match self {
            BatchRequest::Envelope { clients } => clients,
            BatchRequest::Records(records) => records,
        }
    }
}

impl<'de> Deserialize<'de> for BatchRequest {
    /// Dispatches on the body shape first so record errors keep serde's message.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let decode = |value: Value| {
            serde_json::from_value::<Vec<CustomerRecord>>(value).map_err(D::Error::custom)
        };
        match Value::deserialize(deserializer)? {
            Value::Object(mut body) => {
                let clients = body
                    .remove("clients")
                    .ok_or_else(|| D::Error::missing_field("clients"))?;
                Ok(BatchRequest::Envelope {
                    clients: decode(clients)?,
                })
            }
            records @ Value::Array(_) => Ok(BatchRequest::Records(decode(records)?)),
            _ => Err(D::Error::custom(
                "expected an object with `clients` or an array of records",
            )),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ScoringError {
    fn into_response(self) -> Response {
        let status = if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }
        (
            status,
            Json(ErrorBody {
                detail: self.to_string(),
            }),
        )
            .into_response()
    }
}

async fn predict_batch(
    State(state): State<AppState>,
    request: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<Vec<PredictionResult>>, ScoringError> {
    let Json(request) =
        request.map_err(|rejection| ScoringError::InvalidRequest(rejection.body_text()))?;
    let records = request.into_records();
    let results = score_batch(&state.registry, &records)?;
    let churners = results.iter().filter(|r| r.prediction == 1).count();
    tracing::info!(records = records.len(), churners, "scored batch");
    Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct ImportanceQuery {
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    Geography::France.as_str().to_string()
}

async fn get_feature_importances(
    State(state): State<AppState>,
    Query(query): Query<ImportanceQuery>,
) -> Result<Json<FeatureImportanceMap>, ScoringError> {
    feature_importances(&state.registry, &query.country).map(Json)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
        "geographies": Geography::ALL.iter().map(|g| g.as_str()).collect::<Vec<_>>(),
    }))
}

/// Build the router over an already-loaded registry.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/predict_batch", post(predict_batch))
        .route("/feature_importances", get(get_feature_importances))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Load every bundle, then serve until Ctrl-C.
///
/// Bundle loading happens before the listener is bound; a failure there
/// aborts startup.
pub async fn serve(addr: SocketAddr, model_dir: &Path) -> crate::Result<()> {
    let registry = ModelRegistry::load(model_dir)?;
    let app = router(AppState::new(registry));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        "churnforge v{} scoring service listening on {}",
        env!("CARGO_PKG_VERSION"),
        addr
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("shutdown signal received");
            }
        })
        .await?;
    Ok(())
}
