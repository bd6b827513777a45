use super::AppState;
use crate::{Error, Result, types::FilesResponse};
use axum::{Json, extract::State};

pub async fn list_files(State(state): State<AppState>) -> Result<Json<FilesResponse>> {
    let storage = state.storage.clone();
    let files = tokio::task::spawn_blocking(move || storage.list())
        .await
        .map_err(|e| Error::Internal(format!("listing task failed: {e}")))??;

    Ok(Json(FilesResponse { files }))
}
