use std::fs;
use std::path::Path;

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use cmdgate_engine::ResolutionPipeline;
use cmdgate_server::{CommandServer, RouteState, ServerSettings, build_router, parse_config};
use cmdgate_util::default_evaluators;
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

const BAR: &str = r#"
short: Bar report
columns: [a, b]
rows:
  - { a: 1, b: x }
"#;

const MANY: &str = r#"
short: Several rows
flags:
  - { name: limit, type: int }
columns: [a, b]
rows:
  - { a: 1, b: one }
  - { a: 3, b: three }
  - { a: 2, b: two }
"#;

const HELLO: &str = r#"
short: Greeting
type: text
flags:
  - { name: who, type: string, default: world }
text: "hello ${{ who }}"
"#;

const CONFIG: &str = r#"
routes:
  - name: main
    mount: /
    repositories: [commands]
  - name: reports
    mount: /reports
    repositories: [commands]
    overrides: { parameters: { limit: 1 } }
    blacklist: { layers: [glazed] }
  - name: limited
    mount: /limited
    repositories: [commands]
    whitelist: { parameters: [who] }
  - name: twice
    mount: /twice
    repositories: [commands, more]
"#;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().expect("file has a parent")).expect("create directories");
    fs::write(path, content).expect("write file");
}

fn fixtures() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    write(dir.path(), "commands/foo/bar.yaml", BAR);
    write(dir.path(), "commands/foo/many.yaml", MANY);
    write(dir.path(), "commands/foo/hello.yaml", HELLO);
    write(dir.path(), "more/foo/bar.yaml", BAR);
    dir
}

fn settings(dir: &Path, config: &str) -> ServerSettings {
    let config = parse_config(config, &dir.join("config.yaml"), dir, &default_evaluators()).expect("config parses");
    ServerSettings::from_config(&config).expect("repositories load")
}

fn router() -> (TempDir, Router) {
    let dir = fixtures();
    let router = CommandServer::new(settings(dir.path(), CONFIG)).router();
    (dir, router)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let request = Request::builder().uri(uri).body(Body::empty()).expect("request builds");
    let response = router.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
    (status, headers, body.to_vec())
}

async fn get_json(router: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, _, body) = get(router, uri).await;
    (status, serde_json::from_slice(&body).expect("body is JSON"))
}

#[tokio::test]
async fn data_returns_rows_as_json() {
    let (_dir, router) = router();
    let (status, headers, body) = get(&router, "/data/foo/bar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    assert_eq!(String::from_utf8(body).expect("utf8"), r#"[{"a":1,"b":"x"}]"#);
}

#[tokio::test]
async fn download_picks_the_format_from_the_suffix() {
    let (_dir, router) = router();
    let (status, headers, body) = get(&router, "/download/foo/bar/out.csv").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(String::from_utf8(body).expect("utf8"), "a,b\n1,x\n");
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"out.csv\"");
    assert_eq!(headers[header::CONTENT_TYPE], "text/csv; charset=utf-8");

    let (status, body) = get_json(&router, "/download/foo/bar/out.zip").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "could not determine output format" }));
}

#[tokio::test]
async fn unknown_commands_are_not_found() {
    let (_dir, router) = router();
    let (status, body) = get_json(&router, "/data/unknown/path").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "command unknown/path not found" }));

    let (status, body) = get_json(&router, "/data/foo").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "command foo not found" }));
}

#[tokio::test]
async fn duplicate_definitions_are_ambiguous() {
    let (_dir, router) = router();
    let (status, body) = get_json(&router, "/twice/data/foo/bar").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({ "error": "command foo/bar is ambiguous, could be one of: foo bar, foo bar" }));
}

#[tokio::test]
async fn streaming_sends_one_event_per_row() {
    let (_dir, router) = router();
    let (status, headers, body) = get(&router, "/streaming/foo/many").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE].to_str().expect("header").starts_with("text/event-stream"));

    let body = String::from_utf8(body).expect("utf8");
    let rows: Vec<Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data:").map(str::trim_start))
        .map(|data| serde_json::from_str(data).expect("event data is JSON"))
        .collect();
    let events = body.lines().filter(|line| line.strip_prefix("event:").map(str::trim) == Some("row")).count();
    assert_eq!(events, 3);
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0], json!({ "a": 1, "b": "one" }));
    assert_eq!(rows[2], json!({ "a": 2, "b": "two" }));
}

#[tokio::test]
async fn writer_commands() {
    let (_dir, router) = router();
    let (status, headers, body) = get(&router, "/data/foo/hello?who=there").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/plain; charset=utf-8");
    assert_eq!(body, b"hello there");

    let (status, headers, body) = get(&router, "/download/foo/hello/greeting.bin").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_DISPOSITION], "attachment; filename=\"greeting.bin\"");
    assert_eq!(body, b"hello world");

    let (status, body) = get_json(&router, "/streaming/foo/hello").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({ "error": "command foo/hello is not a glazed/writer command" }));
}

#[tokio::test]
async fn text_renders_an_ascii_table() {
    let (_dir, router) = router();
    let (status, _, body) = get(&router, "/text/foo/bar").await;
    assert_eq!(status, StatusCode::OK);
    let body = String::from_utf8(body).expect("utf8");
    assert!(body.contains("| a | b |"), "{body}");
    assert!(body.contains("| 1 | x |"), "{body}");
}

#[tokio::test]
async fn datatables_embeds_the_rows() {
    let (_dir, router) = router();
    let (status, headers, body) = get(&router, "/datatables/foo/bar").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    let body = String::from_utf8(body).expect("utf8");
    assert!(body.contains("<td>1</td><td>x</td>"));
}

#[tokio::test]
async fn glazed_parameters_shape_rows() {
    let (_dir, router) = router();
    let (_, body) = get_json(&router, "/data/foo/many?fields=b&sort-by=-a").await;
    assert_eq!(body, json!([{ "b": "three" }, { "b": "two" }, { "b": "one" }]));
}

#[tokio::test]
async fn route_rules_apply_in_order() {
    let (_dir, router) = router();

    // override beats the request; the blacklisted glazed layer is ignored
    let (_, body) = get_json(&router, "/reports/data/foo/many?limit=3&fields=b").await;
    assert_eq!(body, json!([{ "a": 1, "b": "one" }]));

    // `limit` is not whitelisted
    let (_, body) = get_json(&router, "/limited/data/foo/many?limit=1").await;
    assert_eq!(body.as_array().map(Vec::len), Some(3));

    let (status, body) = get_json(&router, "/data/foo/many?limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid parameter limit: 'abc' is not an integer" }));
}

#[tokio::test]
async fn listings_describe_the_tree() {
    let (_dir, router) = router();
    let (status, body) = get_json(&router, "/reports").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "reports");
    assert_eq!(body["tree"]["children"][0]["path"], "foo");

    let (status, slashed) = get_json(&router, "/reports/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slashed, body);

    let (status, body) = get_json(&router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "main");

    let (status, body) = get_json(&router, "/commands/foo").await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["commands"]
        .as_array()
        .map(|commands| commands.iter().filter_map(|command| command["name"].as_str()).collect())
        .unwrap_or_default();
    assert!(names.is_empty());
    let children: Vec<&str> = body["children"]
        .as_array()
        .map(|children| children.iter().filter_map(|child| child["path"].as_str()).collect())
        .unwrap_or_default();
    assert_eq!(children, ["foo/bar", "foo/hello", "foo/many"]);

    let (status, body) = get_json(&router, "/commands/foo/hello").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["commands"][0]["capability"], "writer");

    let (status, _) = get_json(&router, "/commands/nothing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

const RELOADED: &str = r#"
routes:
  - name: reports
    mount: /reports
    repositories: [more]
"#;

#[tokio::test]
async fn replacing_a_route_swaps_commands_and_rules_together() {
    let dir = fixtures();
    let mut before = settings(dir.path(), CONFIG);
    let mut after = settings(dir.path(), RELOADED);
    let reports = before.routes.remove(1);
    let old_filter = reports.filter.clone();
    let state = Arc::new(RouteState::new(reports, &before, CancellationToken::new()));
    let router = build_router([&state]);

    let (_, body) = get_json(&router, "/reports/data/foo/many?limit=3").await;
    assert_eq!(body.as_array().map(Vec::len), Some(1));

    let held = state.repository.snapshot();
    let next = after.routes.remove(0);
    let new_filter = next.filter.clone();
    state.replace(next);

    // an in-flight request keeps the commands and the rules it started with
    assert!(held.locate("foo/many").is_ok());
    assert_eq!(*held.context, ResolutionPipeline::from_filter(&old_filter));

    let current = state.repository.snapshot();
    assert!(current.locate("foo/many").is_err());
    assert_eq!(*current.context, ResolutionPipeline::from_filter(&new_filter));

    let (status, _) = get_json(&router, "/reports/data/foo/many").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, body) = get_json(&router, "/reports/data/foo/bar?fields=b").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([{ "b": "x" }]));
}
