use crate::server::{
    ServerError, ServerRouter,
    auth::Viewer,
    json::Json,
    schema::{FeedSchema, GraphQlEnvelope},
};
use async_graphql::http::GraphiQLSource;
use async_graphql_axum::GraphQLRequest;
use axum::{extract::State, response::Html};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Deserialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(graphiql)
        .typed_post(graphql)
}

#[derive(TypedPath, Deserialize)]
#[typed_path("/graphql", rejection(ServerError))]
struct GraphQlPath();

async fn graphiql(GraphQlPath(): GraphQlPath) -> Html<String> {
    Html(GraphiQLSource::build().endpoint(GraphQlPath::PATH).finish())
}

async fn graphql(
    GraphQlPath(): GraphQlPath,
    State(schema): State<FeedSchema>,
    viewer: Viewer,
    request: GraphQLRequest<ServerError>,
) -> Json<GraphQlEnvelope> {
    let response = schema.execute(request.into_inner().data(viewer)).await;

    Json(response.into())
}
