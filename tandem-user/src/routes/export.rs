use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use diesel::prelude::*;
use std::sync::Arc;

use tandem_shared::errors::{AppError, AppResult};
use tandem_shared::middleware::AdminUser;

use crate::fields::export::{export_csv, ExportRow};
use crate::models::Profile;
use crate::schema::profiles;
use crate::AppState;

/// GET /export/profiles.csv - full profile export with one column per
/// catalog field, admin only.
pub async fn export_profiles(
    AdminUser(admin): AdminUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<impl IntoResponse> {
    let mut conn = state.db.get().map_err(|e| AppError::internal(e.to_string()))?;

    let all: Vec<Profile> = profiles::table
        .order(profiles::created_at.asc())
        .load::<Profile>(&mut conn)?;

    let rows: Vec<ExportRow<'_>> = all
        .iter()
        .map(|profile| ExportRow {
            profile_id: profile.id,
            display_name: profile.display_name.as_deref().unwrap_or(""),
            fields: &profile.fields,
        })
        .collect();

    let csv = export_csv(&state.registry, &rows, &state.config.export_locale);

    tracing::info!(admin_id = %admin.id, rows = rows.len(), "profile export generated");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"profiles.csv\"",
            ),
        ],
        csv,
    ))
}
