use axum::body::Bytes;
use axum::extract::{Multipart, State};
use serde::Serialize;

use crate::api::errors::ApiError;
use crate::api::extract::AppJson;
use crate::api::middleware::auth::CurrentUser;
use crate::domain::user::Role;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Content type and body of the multipart part called `field_name`
pub(crate) async fn read_image(
    mut multipart: Multipart,
    field_name: &str,
) -> Result<(Option<String>, Bytes), ApiError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(field_name) {
            continue;
        }
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await?;
        return Ok((content_type, bytes));
    }
    Err(ApiError::bad_request(format!(
        "No file uploaded in field '{}'",
        field_name
    )))
}

/// POST /api/upload
pub async fn upload_image(
    State(state): State<AppState>,
    user: CurrentUser,
    multipart: Multipart,
) -> Result<AppJson<UploadResponse>, ApiError> {
    user.require(Role::Staff)?;

    let (content_type, bytes) = read_image(multipart, "image").await?;
    let url = state.storage.save_image(content_type.as_deref(), &bytes).await?;

    tracing::info!(url = %url, uploaded_by = %user.id(), "Image uploaded");
    Ok(AppJson(UploadResponse { url }))
}
