use crate::server::{
    Result, ServerError, ServerRouter, auth::Viewer, images::ImageStore, json::Json,
};
use axum::{
    body::Bytes,
    extract::{
        Multipart, State,
        multipart::{Field, MultipartRejection},
    },
    http::StatusCode,
};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const IMAGE_FIELD: &str = "image";
const OLD_PATH_FIELD: &str = "oldPath";

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_put(post_image).typed_post(post_image)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/post-image", rejection(ServerError))]
struct PostImagePath();

#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_path: Option<String>,
}

struct ImageUpload {
    file_name: Option<String>,
    content_type: Option<String>,
    bytes: Bytes,
}

impl ImageUpload {
    async fn read(field: Field<'_>) -> Result<Option<Self>> {
        let file_name = field.file_name().map(ToOwned::to_owned);
        let content_type = field.content_type().map(ToOwned::to_owned);
        let bytes = field.bytes().await?;

        // Browsers send an empty, nameless part when no file was picked
        if bytes.is_empty() && file_name.as_deref().is_none_or(str::is_empty) {
            return Ok(None);
        }

        Ok(Some(Self {
            file_name,
            content_type,
            bytes,
        }))
    }
}

/// Stores one image for a post. A previous image of the post, named by `oldPath`, is
/// removed once the new one is safely stored.
async fn post_image(
    PostImagePath(): PostImagePath,
    State(images): State<Arc<ImageStore>>,
    viewer: Viewer,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let user_id = viewer.require()?;
    let mut multipart = multipart?;

    let mut image = None;
    let mut old_path = None;
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some(IMAGE_FIELD) => image = ImageUpload::read(field).await?,
            Some(OLD_PATH_FIELD) => old_path = Some(field.text().await?),
            _ => {}
        }
    }

    let Some(image) = image else {
        return Ok((
            StatusCode::OK,
            Json(UploadResponse {
                message: "No files sent!",
                file_path: None,
            }),
        ));
    };

    let content_type = image.content_type.unwrap_or_default();
    if !ImageStore::accepts(&content_type) {
        return Err(ServerError::UnsupportedImageType(content_type));
    }

    let file_path = images
        .save(image.file_name.as_deref(), &image.bytes)
        .await
        .map_err(ServerError::ImageWrite)?;
    if let Some(old_path) = old_path.filter(|old_path| !old_path.is_empty()) {
        images.discard(&old_path).await;
    }

    info!(%user_id, %file_path, "Received post image");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File Received",
            file_path: Some(file_path),
        }),
    ))
}
