//! HTTP routes for one mounted command repository.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use cmdgate_engine::parse_request;
use cmdgate_registry::CommandTree;
use cmdgate_util::split_command_path;
use serde_json::{Value, json};
use tracing::{Instrument, debug, info_span};

use crate::dispatch::{RouteFamily, Target, select_renderer};
use crate::error::DispatchError;
use crate::render::render;
use crate::state::RouteState;

type QueryPairs = Query<Vec<(String, String)>>;

/// The router for `route`, with paths relative to its mount.
pub fn route_router(route: Arc<RouteState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/commands", get(list_root))
        .route("/commands/{*path}", get(list_node))
        .route("/data/{*path}", get(data))
        .route("/text/{*path}", get(text))
        .route("/streaming/{*path}", get(streaming))
        .route("/datatables/{*path}", get(datatables))
        .route("/download/{*path}", get(download))
        .with_state(route)
}

/// All routes of a server, each nested under its mount.
///
/// A nested router answers `{mount}` but not `{mount}/`, so the index is
/// registered under the trailing-slash form as well.
pub fn build_router<'a>(routes: impl IntoIterator<Item = &'a Arc<RouteState>>) -> Router {
    routes.into_iter().fold(Router::new(), |router, route| {
        let mounted = route_router(Arc::clone(route));
        if route.mount.is_empty() {
            router.merge(mounted)
        } else {
            router
                .route(&format!("{}/", route.mount), get(index).with_state(Arc::clone(route)))
                .nest(&route.mount, mounted)
        }
    })
}

async fn index(State(route): State<Arc<RouteState>>) -> Result<Json<Value>, DispatchError> {
    let tree = CommandTree::build::<&str>(&route.repository.commands(), &[]);
    Ok(Json(json!({ "name": route.name, "tree": tree })))
}

async fn list_root(State(route): State<Arc<RouteState>>) -> Result<Json<CommandTree>, DispatchError> {
    list(&route, "")
}

async fn list_node(State(route): State<Arc<RouteState>>, Path(path): Path<String>) -> Result<Json<CommandTree>, DispatchError> {
    list(&route, &path)
}

fn list(route: &RouteState, path: &str) -> Result<Json<CommandTree>, DispatchError> {
    let segments = split_command_path(path);
    let trie = route.repository.commands();
    CommandTree::build(&trie, &segments)
        .map(Json)
        .ok_or_else(|| DispatchError::CommandNotFound { path: segments.join("/") })
}

async fn data(State(route): State<Arc<RouteState>>, Path(path): Path<String>, Query(query): QueryPairs) -> Result<Response, DispatchError> {
    dispatch(route, RouteFamily::Data, path, query).await
}

async fn text(State(route): State<Arc<RouteState>>, Path(path): Path<String>, Query(query): QueryPairs) -> Result<Response, DispatchError> {
    dispatch(route, RouteFamily::Text, path, query).await
}

async fn streaming(State(route): State<Arc<RouteState>>, Path(path): Path<String>, Query(query): QueryPairs) -> Result<Response, DispatchError> {
    dispatch(route, RouteFamily::Streaming, path, query).await
}

async fn datatables(State(route): State<Arc<RouteState>>, Path(path): Path<String>, Query(query): QueryPairs) -> Result<Response, DispatchError> {
    dispatch(route, RouteFamily::Datatables, path, query).await
}

async fn download(State(route): State<Arc<RouteState>>, Path(path): Path<String>, Query(query): QueryPairs) -> Result<Response, DispatchError> {
    dispatch(route, RouteFamily::Download, path, query).await
}

/// Locate, check capability, resolve parameters, render.
async fn dispatch(route: Arc<RouteState>, family: RouteFamily, path: String, query: Vec<(String, String)>) -> Result<Response, DispatchError> {
    let target = Target::parse(family, &path);
    let span = info_span!("request", route = %route.name, family = %family, command = %target.command_path);

    async move {
        let snapshot = route.repository.snapshot();
        let command = snapshot.locate(&target.command_path)?;
        let renderer = select_renderer(family, command.kind(), &target)?;
        let description = command.description();

        let request = parse_request(description, &query)?;
        let parameters = snapshot.context.resolve(description, request)?;
        debug!(?renderer, "dispatching");

        render(renderer, &command, parameters, &route).await
    }
    .instrument(span)
    .await
}
