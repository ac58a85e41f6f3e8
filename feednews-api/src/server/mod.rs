use crate::server::{
    auth::NotAuthenticated,
    images::{IMAGE_ROUTE, ImageStore},
    schema::{FeedSchema, FieldError, Pagination},
};
use async_graphql::ParseRequestError;
use axum::{
    Router,
    extract::{
        DefaultBodyLimit, FromRef, Request,
        multipart::{MultipartError, MultipartRejection},
        rejection::PathRejection,
    },
    http::{
        Method, StatusCode, Uri,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use feednews_common::auth::token::TokenCodec;
use feednews_db::store::SharedStore;
use json::Json;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::{debug, error};

pub mod auth;
pub mod images;
mod json;
mod routes;
pub mod schema;

/// Message sent instead of the details of any server-side failure.
pub const INTERNAL_ERROR_MESSAGE: &str = "An error occurred.";

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub tokens: Arc<TokenCodec>,
    pub images: Arc<ImageStore>,
    pub schema: FeedSchema,
}

impl ServerState {
    #[must_use]
    pub fn new(
        store: SharedStore,
        tokens: Arc<TokenCodec>,
        images: Arc<ImageStore>,
        pagination: Pagination,
    ) -> Self {
        let schema = schema::build(store, Arc::clone(&tokens), Arc::clone(&images), pagination);

        Self {
            tokens,
            images,
            schema,
        }
    }
}

/// The whole application: GraphQL, uploads and the static image directory.
pub fn app(state: ServerState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    routes::routes()
        .nest_service(IMAGE_ROUTE, ServeDir::new(state.images.root()))
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("GraphQL request rejected: {0}")]
    GraphQlRequest(#[from] ParseRequestError),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error(transparent)]
    NotAuthenticated(#[from] NotAuthenticated),
    #[error("Multipart request rejected: {0}")]
    MultipartRejection(#[from] MultipartRejection),
    #[error("Multipart body could not be read: {0}")]
    Multipart(#[from] MultipartError),
    #[error("Image type {0:?} is not supported.")]
    UnsupportedImageType(String),
    #[error("Image could not be written: {0}")]
    ImageWrite(std::io::Error),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_) | ServerError::PathRejection(_) => StatusCode::NOT_FOUND,
            ServerError::GraphQlRequest(ParseRequestError::PayloadTooLarge) => {
                StatusCode::PAYLOAD_TOO_LARGE
            }
            ServerError::GraphQlRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotAuthenticated(_) => StatusCode::UNAUTHORIZED,
            ServerError::MultipartRejection(rejection) => rejection.status(),
            ServerError::Multipart(err) => err.status(),
            ServerError::UnsupportedImageType(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServerError::JsonResponse(_) | ServerError::ImageWrite(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// The error shape shared by every endpoint.
#[derive(Clone, Eq, PartialEq, Debug, Hash, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<FieldError>>,
}

impl ErrorBody {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        let message = if status.is_server_error() {
            INTERNAL_ERROR_MESSAGE.to_owned()
        } else {
            message.into()
        };

        Self {
            message,
            status: status.as_u16(),
            data: None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            debug!(error = %self, %status, "Replying with error");
        }

        (status, Json(ErrorBody::new(status, self.to_string()))).into_response()
    }
}
