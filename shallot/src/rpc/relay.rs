// Copyright (c) 2024 Botho Foundation

//! Onion router HTTP API.
//!
//! | Method | Path                                | Response                                  |
//! |--------|-------------------------------------|-------------------------------------------|
//! | GET    | `/status`                           | `live`                                    |
//! | POST   | `/message`                          | 200, 400 rejected, 502 downstream failure |
//! | GET    | `/getLastReceivedEncryptedMessage`  | `{"result": text \| null}`                |
//! | GET    | `/getLastReceivedDecryptedMessage`  | `{"result": text \| null}`                |
//! | GET    | `/getLastMessageDestination`        | `{"result": url \| null}`                 |
//! | GET    | `/metrics`                          | relay counters                            |

use hyper::{body::Incoming, Method, Request, StatusCode};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use super::{
    error_response, json_response, not_found, read_json, result_response, serve, text_response,
    HttpResponse, MessageBody, STATUS_LIVE,
};
use crate::network::onion::Envelope;
use crate::network::transport::AddressResolver;
use crate::node::{OnionRouter, RelayOutcome};

/// Serve `router` on `listener`. `resolver` turns the last next hop into a
/// URL for `/getLastMessageDestination`.
pub async fn serve_relay(
    listener: TcpListener,
    router: Arc<OnionRouter>,
    resolver: Arc<dyn AddressResolver>,
) -> std::io::Result<()> {
    info!(
        "Onion router {} listening on {}",
        router.node_id(),
        listener.local_addr()?
    );
    serve(listener, move |req| {
        handle_request(req, router.clone(), resolver.clone())
    })
    .await
}

async fn handle_request(
    req: Request<Incoming>,
    router: Arc<OnionRouter>,
    resolver: Arc<dyn AddressResolver>,
) -> HttpResponse {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/status") => text_response(StatusCode::OK, STATUS_LIVE),
        (&Method::POST, "/message") => {
            let body: MessageBody = match read_json(req).await {
                Ok(body) => body,
                Err(response) => return response,
            };
            let Some(message) = body.message else {
                return error_response(StatusCode::BAD_REQUEST, "Missing message");
            };

            match router.handle_envelope(Envelope::from(message)).await {
                Ok(RelayOutcome::Forwarded { .. }) => result_response("forwarded"),
                Ok(RelayOutcome::Delivered { .. }) => result_response("delivered"),
                Err(e) if e.is_rejection() => error_response(StatusCode::BAD_REQUEST, e),
                Err(e) => error_response(StatusCode::BAD_GATEWAY, e),
            }
        }
        (&Method::GET, "/getLastReceivedEncryptedMessage") => {
            result_response(router.log().last_received_encrypted())
        }
        (&Method::GET, "/getLastReceivedDecryptedMessage") => {
            result_response(router.log().last_received_decrypted())
        }
        (&Method::GET, "/getLastMessageDestination") => result_response(
            router
                .log()
                .last_destination()
                .and_then(|hop| resolver.hop_url(hop)),
        ),
        (&Method::GET, "/metrics") => json_response(StatusCode::OK, &router.metrics().snapshot()),
        _ => not_found(),
    }
}
