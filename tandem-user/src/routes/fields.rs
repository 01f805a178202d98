use axum::extract::State;
use axum::Json;
use std::sync::Arc;

use tandem_shared::types::auth::AuthUser;
use tandem_shared::types::ApiResponse;

use crate::fields::FieldDef;
use crate::AppState;

/// GET /fields - the portal field catalog, for client-side form rendering
pub async fn list_fields(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<FieldDef>>> {
    Json(ApiResponse::ok(state.registry.fields().to_vec()))
}
