//! Settings handlers: CSV import, import template, backup and system settings

use axum::{
    extract::{Multipart, State},
    http::header,
    response::IntoResponse,
    Json,
};
use shared::Permission;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::backup::{backup_filename, SystemConfigView};
use crate::services::import::{template_csv, ImportReport};
use crate::services::{BackupService, ImportService};
use crate::AppState;

/// Largest accepted import upload
pub const MAX_IMPORT_BYTES: usize = 10 * 1024 * 1024;

/// Import products from the uploaded CSV (`file` field); rows that fail are
/// listed in the report while the rest commit
pub async fn import_products(
    State(state): State<AppState>,
    current_user: CurrentUser,
    mut multipart: Multipart,
) -> AppResult<Json<ImportReport>> {
    current_user.require(Permission::Admin)?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::field("file", format!("Invalid upload: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let is_csv = field
            .file_name()
            .map(|name| name.to_lowercase().ends_with(".csv"))
            .unwrap_or(true);
        if !is_csv {
            return Err(AppError::field("file", "Only CSV files can be imported"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::field("file", format!("Invalid upload: {}", e)))?;
        upload = Some(bytes);
        break;
    }

    let data = upload.ok_or_else(|| AppError::field("file", "No file provided"))?;
    if data.len() > MAX_IMPORT_BYTES {
        return Err(AppError::field("file", "File exceeds the 10 MB limit"));
    }

    let service = ImportService::new(state.db, state.config.import.clone());
    let report = service.import_csv(&data).await?;
    Ok(Json(report))
}

/// Download the import template
pub async fn import_template(current_user: CurrentUser) -> AppResult<impl IntoResponse> {
    current_user.require(Permission::View)?;
    let csv = template_csv()?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"import-template.csv\"",
            ),
        ],
        csv,
    ))
}

/// Full snapshot as a JSON attachment
pub async fn download_backup(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<impl IntoResponse> {
    current_user.require(Permission::Admin)?;
    let snapshot = BackupService::new(state.db).dump_all().await?;

    let disposition = format!(
        "attachment; filename=\"{}\"",
        backup_filename(snapshot.metadata.created_at)
    );
    tracing::info!(user_id = current_user.user_id, "Backup downloaded");
    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(snapshot)))
}

pub async fn system_config(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<SystemConfigView>> {
    current_user.require(Permission::Admin)?;
    let view = BackupService::new(state.db).system_config(&state.config).await?;
    Ok(Json(view))
}
