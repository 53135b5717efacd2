// Copyright (c) 2024 Botho Foundation

//! Node directory HTTP API.
//!
//! | Method | Path               | Body                 | Response                       |
//! |--------|--------------------|----------------------|--------------------------------|
//! | GET    | `/status`          |                      | `live`                         |
//! | POST   | `/registerNode`    | `{nodeId, pubKey}`   | 200, 400 missing, 409 duplicate |
//! | GET    | `/getNodeRegistry` |                      | `{"nodes": [...]}`             |

use hyper::{body::Incoming, Method, Request, StatusCode};
use serde_json::json;
use shl_directory::{DirectoryError, GetNodeRegistryBody, NodeRegistry, RegisterNodeBody};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use super::{
    error_response, json_response, not_found, read_json, serve, text_response, HttpResponse,
    STATUS_LIVE,
};

/// Serve the registry on `listener` until an accept error occurs.
pub async fn serve_registry(listener: TcpListener, registry: Arc<NodeRegistry>) -> std::io::Result<()> {
    info!("Registry listening on {}", listener.local_addr()?);
    serve(listener, move |req| handle_request(req, registry.clone())).await
}

async fn handle_request(req: Request<Incoming>, registry: Arc<NodeRegistry>) -> HttpResponse {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/status") => text_response(StatusCode::OK, STATUS_LIVE),
        (&Method::POST, "/registerNode") => {
            let body: RegisterNodeBody = match read_json(req).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            match registry.register(body) {
                Ok(entry) => json_response(
                    StatusCode::OK,
                    &json!({ "message": format!("Node {} registered", entry.node_id) }),
                ),
                Err(e @ DirectoryError::MissingField) => error_response(StatusCode::BAD_REQUEST, e),
                Err(e @ DirectoryError::DuplicateNode(_)) => error_response(StatusCode::CONFLICT, e),
                Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e),
            }
        }
        (&Method::GET, "/getNodeRegistry") => json_response(
            StatusCode::OK,
            &GetNodeRegistryBody {
                nodes: registry.list(),
            },
        ),
        _ => not_found(),
    }
}
