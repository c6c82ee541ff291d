use crate::core::models::ServerOptions;
use crate::infrastructure::live_reload_client::generate_live_reload_script;
use crate::utils::{Logger, Result, SluiceError};
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue},
    middleware::{self, Next},
    response::Response,
    Router,
};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

const SOURCEMAP_HEADER: HeaderName = HeaderName::from_static("x-sourcemap");

#[derive(Clone)]
struct ServerState {
    maps_dir: Arc<String>,
    reload_script: Option<Arc<String>>,
}

/// Static server for the output tree with live-reload injection
pub struct DevServer {
    outdir: PathBuf,
    maps_dir: String,
    options: ServerOptions,
}

impl DevServer {
    pub fn new(outdir: PathBuf, maps_dir: impl Into<String>, options: ServerOptions) -> Self {
        Self {
            outdir,
            maps_dir: maps_dir.into(),
            options,
        }
    }

    pub fn router(&self) -> Router {
        let state = ServerState {
            maps_dir: Arc::new(self.maps_dir.clone()),
            reload_script: self
                .options
                .reload_port()
                .map(|port| Arc::new(generate_live_reload_script(port))),
        };

        Router::new()
            .fallback_service(ServeDir::new(&self.outdir))
            .layer(middleware::from_fn_with_state(state.clone(), inject_reload_script))
            .layer(middleware::from_fn_with_state(state, add_source_map_header))
            .layer(TraceLayer::new_for_http())
    }

    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.options.host, self.options.port);
        TcpListener::bind(&addr)
            .await
            .map_err(|e| SluiceError::Server(format!("failed to bind {}: {}", addr, e)))
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if let Ok(addr) = listener.local_addr() {
            Logger::info(&format!("🚀 Serving {} on http://{}", self.outdir.display(), addr));
        }

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| SluiceError::Server(e.to_string()))
    }
}

/// `X-SourceMap` value for a request path, if it names a css or js file.
/// Query strings are not part of `path`.
pub fn source_map_location(path: &str, maps_dir: &str) -> Option<String> {
    let file_name = path.rsplit('/').next()?;
    if !(file_name.ends_with(".css") || file_name.ends_with(".js")) {
        return None;
    }

    Some(format!("/{}/{}.map", maps_dir.trim_matches('/'), file_name))
}

/// Insert `script` before the last `</body>`, or append it
pub fn inject_script(html: &str, script: &str) -> String {
    match html.to_ascii_lowercase().rfind("</body>") {
        Some(index) => {
            let mut injected = String::with_capacity(html.len() + script.len());
            injected.push_str(&html[..index]);
            injected.push_str(script);
            injected.push_str(&html[index..]);
            injected
        }
        None => format!("{}{}", html, script),
    }
}

async fn add_source_map_header(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    let location = source_map_location(request.uri().path(), &state.maps_dir);
    let mut response = next.run(request).await;

    if let Some(location) = location {
        if let Ok(value) = HeaderValue::from_str(&location) {
            response.headers_mut().insert(SOURCEMAP_HEADER, value);
        }
    }

    response
}

async fn inject_reload_script(
    State(state): State<ServerState>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    let Some(script) = state.reload_script.as_deref() else {
        return response;
    };

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/html"))
        .unwrap_or(false);
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            Logger::warn(&format!("Failed to buffer HTML response: {}", e));
            parts.headers.remove(header::CONTENT_LENGTH);
            return Response::from_parts(parts, Body::empty());
        }
    };

    let html = String::from_utf8_lossy(&bytes);
    let injected = inject_script(&html, script);
    parts.headers.remove(header::CONTENT_LENGTH);

    Response::from_parts(parts, Body::from(injected))
}
