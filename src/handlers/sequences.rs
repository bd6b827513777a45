use super::AppState;
use crate::{Result, types::SequencesResponse};
use axum::{
    Json,
    extract::{Path, State},
};

/// Sequence names in the file's index, in index order
pub async fn get_sequences(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SequencesResponse>> {
    let sequences = state
        .with_file(id.clone(), |file| Ok(file.sequence_names().to_vec()))
        .await?;

    Ok(Json(SequencesResponse { id, sequences }))
}
