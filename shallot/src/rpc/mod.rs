// Copyright (c) 2024 Botho Foundation

//! HTTP services, one per node role.
//!
//! - [`registry`]: node directory (`/registerNode`, `/getNodeRegistry`)
//! - [`relay`]: onion router (`/message` plus observation endpoints)
//! - [`user`]: user endpoint (`/message`, `/sendMessage` plus observation
//!   endpoints)
//!
//! Every service answers `GET /status` with `live`. Observation endpoints
//! return `{"result": value}` with `null` when nothing has happened yet;
//! errors return `{"error": message}`.
//!
//! Servers take an already-bound [`TcpListener`], so callers choose the
//! port (tests bind port 0).

pub mod registry;
pub mod relay;
pub mod user;

pub use registry::serve_registry;
pub use relay::serve_relay;
pub use user::serve_user;

use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming},
    header::{HeaderValue, CONTENT_TYPE},
    server::conn::http1,
    service::service_fn,
    Request, Response, StatusCode,
};
use hyper_util::rt::TokioIo;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::{convert::Infallible, fmt::Display, future::Future};
use tokio::net::TcpListener;
use tracing::{debug, error};

/// Body returned by `GET /status`.
pub const STATUS_LIVE: &str = "live";

/// Response type of every handler.
pub type HttpResponse = Response<Full<Bytes>>;

/// Body of `POST /message`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    /// Envelope text (relay) or plaintext (user).
    #[serde(default)]
    pub message: Option<String>,
}

/// Body of observation responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBody<T> {
    /// The observed value.
    pub result: T,
}

/// Accept connections forever, answering each request with `handler`.
pub async fn serve<H, F>(listener: TcpListener, handler: H) -> std::io::Result<()>
where
    H: Fn(Request<Incoming>) -> F + Clone + Send + Sync + 'static,
    F: Future<Output = HttpResponse> + Send + 'static,
{
    loop {
        let (stream, peer) = listener.accept().await?;
        let io = TokioIo::new(stream);
        let handler = handler.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| {
                let response = handler(req);
                async move { Ok::<_, Infallible>(response.await) }
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                error!("Error serving connection from {}: {:?}", peer, err);
            }
        });
    }
}

fn response(status: StatusCode, body: Bytes, content_type: &'static str) -> HttpResponse {
    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

pub(crate) fn text_response(status: StatusCode, body: &'static str) -> HttpResponse {
    response(status, Bytes::from_static(body.as_bytes()), "text/plain; charset=utf-8")
}

pub(crate) fn json_response<T: Serialize>(status: StatusCode, body: &T) -> HttpResponse {
    match serde_json::to_vec(body) {
        Ok(bytes) => response(status, Bytes::from(bytes), "application/json"),
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            text_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}

pub(crate) fn result_response<T: Serialize>(result: T) -> HttpResponse {
    json_response(StatusCode::OK, &ResultBody { result })
}

pub(crate) fn error_response(status: StatusCode, message: impl Display) -> HttpResponse {
    json_response(status, &json!({ "error": message.to_string() }))
}

pub(crate) fn not_found() -> HttpResponse {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

/// Read and parse a JSON request body. On failure the `Err` holds a ready
/// 400 response.
pub(crate) async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, HttpResponse> {
    let bytes = match req.into_body().collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            return Err(error_response(StatusCode::BAD_REQUEST, "Failed to read body"));
        }
    };

    serde_json::from_slice(&bytes)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON body: {}", e)))
}
