use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use sluice::core::models::ServerOptions;
use sluice::infrastructure::DevServer;
use tempfile::TempDir;
use tower::ServiceExt;

fn dist() -> TempDir {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    std::fs::create_dir_all(root.join("images")).unwrap();
    std::fs::create_dir_all(root.join("maps")).unwrap();

    std::fs::write(
        root.join("index.html"),
        "<!DOCTYPE html><html><body><h1>Home</h1></body></html>",
    )
    .unwrap();
    std::fs::write(root.join("style.css"), "body{margin:0}").unwrap();
    std::fs::write(root.join("bundle.js"), "console.log(1);").unwrap();
    std::fs::write(root.join("maps/bundle.js.map"), "{}").unwrap();
    std::fs::write(root.join("images/logo.png"), [0x89u8, b'P', b'N', b'G']).unwrap();

    temp_dir
}

fn server(dist: &TempDir) -> DevServer {
    let options = ServerOptions {
        host: "127.0.0.1".to_string(),
        port: 4000,
    };
    DevServer::new(dist.path().to_path_buf(), "maps", options)
}

async fn get(server: &DevServer, uri: &str) -> axum::response::Response {
    server
        .router()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_index_gets_reload_script() {
    let dist = dist();
    let response = get(&server(&dist), "/").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-sourcemap").is_none());

    let body = body_text(response).await;
    let script = body.find("ws://").unwrap();
    assert!(body.contains(":4001"));
    assert!(script < body.find("</body>").unwrap());
    assert!(body.contains("<h1>Home</h1>"));
}

#[tokio::test]
async fn test_content_length_matches_injected_body() {
    let dist = dist();
    let response = get(&server(&dist), "/index.html").await;

    let declared = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    let body = body_text(response).await;

    if let Some(length) = declared {
        assert_eq!(length, body.len());
    }
}

#[tokio::test]
async fn test_stylesheet_has_source_map_header() {
    let dist = dist();
    let response = get(&server(&dist), "/style.css?v=3").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-sourcemap").unwrap(),
        "/maps/style.css.map"
    );
    assert_eq!(body_text(response).await, "body{margin:0}");
}

#[tokio::test]
async fn test_script_has_source_map_header() {
    let dist = dist();
    let response = get(&server(&dist), "/bundle.js").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-sourcemap").unwrap(),
        "/maps/bundle.js.map"
    );
}

#[tokio::test]
async fn test_image_is_served_untouched() {
    let dist = dist();
    let response = get(&server(&dist), "/images/logo.png").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get("x-sourcemap").is_none());

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(bytes.as_ref(), &[0x89u8, b'P', b'N', b'G']);
}

#[tokio::test]
async fn test_map_files_are_served() {
    let dist = dist();
    let response = get(&server(&dist), "/maps/bundle.js.map").await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "{}");
}

#[tokio::test]
async fn test_missing_file_is_not_found() {
    let dist = dist();
    let response = get(&server(&dist), "/nope.html").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
