//! The GraphQL schema: users register and log in, authenticated users write, list and
//! delete posts.

use crate::server::{ErrorBody, auth::Viewer, images::ImageStore};
use async_graphql::{Context, EmptySubscription, MergedObject, Response, Schema, Value};
use axum::http::StatusCode;
use feednews_common::auth::token::TokenCodec;
use feednews_db::store::SharedStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error};

pub use error::{ApiError, FieldError};

mod error;
mod posts;
mod types;
mod users;

pub const MAX_QUERY_DEPTH: usize = 20;

#[derive(MergedObject, Default)]
pub struct QueryRoot(users::UserQuery, posts::PostQuery);

#[derive(MergedObject, Default)]
pub struct MutationRoot(users::UserMutation, posts::PostMutation);

pub type FeedSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct Pagination {
    pub posts_per_page: u64,
}

pub fn build(
    store: SharedStore,
    tokens: Arc<TokenCodec>,
    images: Arc<ImageStore>,
    pagination: Pagination,
) -> FeedSchema {
    Schema::build(
        QueryRoot::default(),
        MutationRoot::default(),
        EmptySubscription,
    )
    .data(store)
    .data(tokens)
    .data(images)
    .data(pagination)
    .limit_depth(MAX_QUERY_DEPTH)
    .finish()
}

fn store<'a>(ctx: &Context<'a>) -> &'a SharedStore {
    ctx.data_unchecked::<SharedStore>()
}

fn viewer(ctx: &Context<'_>) -> Viewer {
    ctx.data_opt::<Viewer>().copied().unwrap_or_default()
}

/// A GraphQL result with errors in the same shape as every other endpoint.
#[derive(Clone, PartialEq, Debug, Serialize)]
pub struct GraphQlEnvelope {
    pub data: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorBody>,
}

impl From<Response> for GraphQlEnvelope {
    fn from(response: Response) -> Self {
        Self {
            errors: response.errors.iter().map(error_body).collect(),
            data: response.data,
        }
    }
}

fn error_body(error: &async_graphql::ServerError) -> ErrorBody {
    let Some(api_error) = error.source::<ApiError>() else {
        // Parsing, validation or depth failures raised by the executor itself
        debug!(error = %error.message, "Rejected GraphQL request");
        return ErrorBody::new(StatusCode::BAD_REQUEST, error.message.clone());
    };

    let status = api_error.status();
    if status.is_server_error() {
        error!(error = %api_error, %status, "GraphQL operation failed");
    } else {
        debug!(error = %api_error, %status, "GraphQL operation rejected");
    }

    ErrorBody {
        message: api_error.public_message(),
        status: status.as_u16(),
        data: api_error.field_errors().map(<[FieldError]>::to_vec),
    }
}
