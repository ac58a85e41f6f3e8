use crate::server::ServerRouter;
use axum::Router;

mod graphql;
mod upload;

pub fn routes() -> ServerRouter {
    Router::new()
        .merge(graphql::routes())
        .merge(upload::routes())
}

#[cfg(test)]
mod tests;
