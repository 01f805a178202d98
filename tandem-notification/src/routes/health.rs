use axum::Json;

use tandem_shared::types::api::HealthResponse;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy("tandem-notification", env!("CARGO_PKG_VERSION")))
}
