// Copyright (c) 2024 Botho Foundation

//! The registry, relays and users talking HTTP on loopback.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use shallot::network::onion::{NodeId, RelayIdentity, RelayMetricsSnapshot, UserId};
use shallot::network::{AddressResolver, DirectoryClient, HttpTransport, StaticAddresses};
use shallot::node::{HopLog, OnionRouter, UserNode};
use shallot::rpc::{serve_registry, serve_relay, serve_user};
use shl_directory::{NodeDirectory, NodeRegistry};

const TIMEOUT: Duration = Duration::from_secs(10);

struct HttpNetwork {
    addresses: Arc<StaticAddresses>,
    registry: Arc<NodeRegistry>,
    users: Vec<Arc<UserNode>>,
    client: reqwest::Client,
}

async fn bind_loopback() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

impl HttpNetwork {
    async fn start(relay_count: u32, user_count: u32) -> Self {
        let (registry_listener, registry_url) = bind_loopback().await;
        let mut addresses = StaticAddresses::new(registry_url.clone());

        let mut relay_listeners = Vec::new();
        for id in 0..relay_count {
            let (listener, url) = bind_loopback().await;
            addresses = addresses.with_relay(NodeId(id), url);
            relay_listeners.push(listener);
        }
        let mut user_listeners = Vec::new();
        for id in 0..user_count {
            let (listener, url) = bind_loopback().await;
            addresses = addresses.with_user(UserId(id), url);
            user_listeners.push(listener);
        }
        let addresses = Arc::new(addresses);

        let registry = Arc::new(NodeRegistry::new());
        tokio::spawn(serve_registry(registry_listener, registry.clone()));

        let directory = Arc::new(DirectoryClient::new(registry_url, TIMEOUT).unwrap());
        let transport = Arc::new(HttpTransport::new(addresses.clone(), TIMEOUT).unwrap());

        let mut rng = rand::thread_rng();
        for (id, listener) in relay_listeners.into_iter().enumerate() {
            let identity = RelayIdentity::generate(NodeId(id as u32), &mut rng);
            directory.register_node(identity.registration()).await.unwrap();
            let router = Arc::new(OnionRouter::new(
                identity,
                transport.clone(),
                Arc::new(HopLog::new()),
            ));
            tokio::spawn(serve_relay(listener, router, addresses.clone()));
        }

        let mut users = Vec::new();
        for (id, listener) in user_listeners.into_iter().enumerate() {
            let user = Arc::new(UserNode::new(
                UserId(id as u32),
                directory.clone(),
                transport.clone(),
                3,
            ));
            tokio::spawn(serve_user(listener, user.clone()));
            users.push(user);
        }

        Self {
            addresses,
            registry,
            users,
            client: reqwest::Client::new(),
        }
    }

    fn relay_url(&self, id: NodeId) -> String {
        self.addresses.relay_url(id).unwrap()
    }

    fn user_url(&self, id: UserId) -> String {
        self.addresses.user_url(id).unwrap()
    }

    async fn get(&self, url: String) -> Value {
        self.client.get(url).send().await.unwrap().json().await.unwrap()
    }

    async fn post(&self, url: String, body: Value) -> (u16, Value) {
        let response = self.client.post(url).json(&body).send().await.unwrap();
        let status = response.status().as_u16();
        (status, response.json().await.unwrap())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_send_message_over_http() {
    let network = HttpNetwork::start(5, 2).await;
    assert_eq!(network.registry.len(), 5);

    let (status, body) = network
        .post(
            format!("{}/sendMessage", network.user_url(UserId(0))),
            json!({ "message": "attack at dawn", "destinationUserId": 1 }),
        )
        .await;
    assert_eq!(status, 200, "{}", body);

    let circuit: Vec<u32> = serde_json::from_value(body["result"].clone()).unwrap();
    assert_eq!(circuit.len(), 3);

    let received = network
        .get(format!("{}/getLastReceivedMessage", network.user_url(UserId(1))))
        .await;
    assert_eq!(received, json!({ "result": "attack at dawn" }));

    let sent = network
        .get(format!("{}/getLastSentMessage", network.user_url(UserId(0))))
        .await;
    assert_eq!(sent, json!({ "result": "attack at dawn" }));

    let last_circuit = network
        .get(format!("{}/getLastCircuit", network.user_url(UserId(0))))
        .await;
    assert_eq!(last_circuit["result"], body["result"]);

    // Intermediate relays point at the next relay, the exit at the user.
    for window in circuit.windows(2) {
        let destination = network
            .get(format!(
                "{}/getLastMessageDestination",
                network.relay_url(NodeId(window[0]))
            ))
            .await;
        assert_eq!(destination["result"], json!(network.relay_url(NodeId(window[1]))));
    }
    let exit_url = network.relay_url(NodeId(circuit[2]));
    let destination = network
        .get(format!("{}/getLastMessageDestination", exit_url))
        .await;
    assert_eq!(destination["result"], json!(network.user_url(UserId(1))));

    let decrypted = network
        .get(format!("{}/getLastReceivedDecryptedMessage", exit_url))
        .await;
    assert_eq!(decrypted["result"], json!("attack at dawn"));

    for id in &circuit {
        let encrypted = network
            .get(format!(
                "{}/getLastReceivedEncryptedMessage",
                network.relay_url(NodeId(*id))
            ))
            .await;
        let text = encrypted["result"].as_str().unwrap();
        assert!(!text.contains("attack at dawn"));
    }

    let metrics: RelayMetricsSnapshot =
        serde_json::from_value(network.get(format!("{}/metrics", exit_url)).await).unwrap();
    assert_eq!(metrics.envelopes_received, 1);
    assert_eq!(metrics.envelopes_delivered, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_user_node_sends_directly() {
    let network = HttpNetwork::start(3, 2).await;
    let circuit = network.users[1].send_message("hello", UserId(0)).await.unwrap();
    assert_eq!(circuit.len(), 3);
    assert_eq!(
        network.users[0].inbox().last_received().as_deref(),
        Some("hello")
    );
}

#[tokio::test]
async fn test_registry_endpoints() {
    let network = HttpNetwork::start(2, 0).await;
    let registry_url = network.addresses.registry_url();

    let status = network
        .client
        .get(format!("{}/status", registry_url))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(status, "live");

    let (status, body) = network
        .post(
            format!("{}/registerNode", registry_url),
            json!({ "pubKey": "abc" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "error": "Missing nodeId or pubKey" }));

    let (status, _) = network
        .post(
            format!("{}/registerNode", registry_url),
            json!({ "nodeId": 0, "pubKey": "abc" }),
        )
        .await;
    assert_eq!(status, 409);

    let (status, body) = network
        .post(
            format!("{}/registerNode", registry_url),
            json!({ "nodeId": 9, "pubKey": "abc" }),
        )
        .await;
    assert_eq!(status, 200);
    assert!(body["message"].is_string());

    let nodes = network.get(format!("{}/getNodeRegistry", registry_url)).await;
    assert_eq!(nodes["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(nodes["nodes"][2], json!({ "nodeId": 9, "pubKey": "abc" }));

    let directory = DirectoryClient::new(registry_url, TIMEOUT).unwrap();
    assert_eq!(directory.list_nodes().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_relay_rejects_bad_envelopes() {
    let network = HttpNetwork::start(3, 1).await;
    let relay_url = network.relay_url(NodeId(0));

    let (status, body) = network
        .post(format!("{}/message", relay_url), json!({ "message": "%%%" }))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let (status, _) = network
        .post(format!("{}/message", relay_url), json!({}))
        .await;
    assert_eq!(status, 400);

    let metrics: RelayMetricsSnapshot =
        serde_json::from_value(network.get(format!("{}/metrics", relay_url)).await).unwrap();
    assert_eq!(metrics.envelopes_rejected, 1);
    assert_eq!(metrics.envelopes_forwarded, 0);
}

#[tokio::test]
async fn test_user_endpoints() {
    let network = HttpNetwork::start(0, 1).await;
    let user_url = network.user_url(UserId(0));

    let empty = network
        .get(format!("{}/getLastReceivedMessage", user_url))
        .await;
    assert_eq!(empty, json!({ "result": null }));

    let (status, body) = network
        .post(format!("{}/message", user_url), json!({ "message": "direct" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "result": "success" }));

    let (status, _) = network.post(format!("{}/message", user_url), json!({})).await;
    assert_eq!(status, 400);

    let (status, _) = network
        .post(format!("{}/message", user_url), json!({ "message": "" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(network.users[0].inbox().received_count(), 1);

    let received = network
        .get(format!("{}/getLastReceivedMessage", user_url))
        .await;
    assert_eq!(received, json!({ "result": "direct" }));

    // No relays registered, so no circuit can be built.
    let (status, body) = network
        .post(
            format!("{}/sendMessage", user_url),
            json!({ "message": "x", "destinationUserId": 0 }),
        )
        .await;
    assert_eq!(status, 503);
    assert!(body["error"].is_string());

    let (status, _) = network
        .post(format!("{}/sendMessage", user_url), json!({ "message": "x" }))
        .await;
    assert_eq!(status, 400);
}
