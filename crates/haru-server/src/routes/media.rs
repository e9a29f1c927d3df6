//! Serving stored image objects by key.

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::api::AppState;
use crate::error::ServerError;
use crate::media_store::content_type_for;

pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let data = state.media.load(&key).await?;
    let content_type = content_type_for(&key);
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}
