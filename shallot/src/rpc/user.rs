// Copyright (c) 2024 Botho Foundation

//! User HTTP API.
//!
//! | Method | Path                      | Body                              | Response                    |
//! |--------|---------------------------|-----------------------------------|-----------------------------|
//! | GET    | `/status`                 |                                   | `live`                      |
//! | POST   | `/message`                | `{message}`                       | 200, 400 missing or empty   |
//! | POST   | `/sendMessage`            | `{message, destinationUserId}`    | `{"result": [node ids]}`    |
//! | GET    | `/getLastReceivedMessage` |                                   | `{"result": text \| null}`  |
//! | GET    | `/getLastSentMessage`     |                                   | `{"result": text \| null}`  |
//! | GET    | `/getLastCircuit`         |                                   | `{"result": [ids] \| null}` |

use hyper::{body::Incoming, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::{
    error_response, not_found, read_json, result_response, serve, text_response, HttpResponse,
    MessageBody, STATUS_LIVE,
};
use crate::network::onion::{DestinationSink, UserId};
use crate::node::{SendError, UserNode};

/// Body of `POST /sendMessage`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageBody {
    /// Plaintext to send.
    #[serde(default)]
    pub message: Option<String>,
    /// Destination user.
    #[serde(default)]
    pub destination_user_id: Option<UserId>,
}

/// Serve `user` on `listener`.
pub async fn serve_user(listener: TcpListener, user: Arc<UserNode>) -> std::io::Result<()> {
    info!("User {} listening on {}", user.user_id(), listener.local_addr()?);
    serve(listener, move |req| handle_request(req, user.clone())).await
}

async fn handle_request(req: Request<Incoming>, user: Arc<UserNode>) -> HttpResponse {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/status") => text_response(StatusCode::OK, STATUS_LIVE),
        (&Method::POST, "/message") => {
            let body: MessageBody = match read_json(req).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            let Some(message) = body.message.filter(|m| !m.is_empty()) else {
                return error_response(StatusCode::BAD_REQUEST, "Missing message");
            };
            match user.inbox().deliver(message.as_bytes()) {
                Ok(()) => result_response("success"),
                Err(e) => error_response(StatusCode::BAD_REQUEST, e),
            }
        }
        (&Method::POST, "/sendMessage") => {
            let body: SendMessageBody = match read_json(req).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            let (Some(message), Some(destination)) = (body.message, body.destination_user_id) else {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Missing message or destinationUserId",
                );
            };

            match user.send_message(&message, destination).await {
                Ok(circuit) => result_response(circuit),
                Err(e) => {
                    warn!("User {} failed to send: {}", user.user_id(), e);
                    let status = match e {
                        SendError::Circuit(_) => StatusCode::SERVICE_UNAVAILABLE,
                        SendError::Directory(_) | SendError::Transport(_) => StatusCode::BAD_GATEWAY,
                    };
                    error_response(status, e)
                }
            }
        }
        (&Method::GET, "/getLastReceivedMessage") => result_response(user.inbox().last_received()),
        (&Method::GET, "/getLastSentMessage") => result_response(user.last_sent_message()),
        (&Method::GET, "/getLastCircuit") => result_response(user.last_circuit()),
        _ => not_found(),
    }
}
