// Copyright (c) 2024 Botho Foundation

//! HTTP client for a remote node directory.

use async_trait::async_trait;
use reqwest::StatusCode;
use shl_directory::{
    DirectoryEntry, DirectoryError, GetNodeRegistryBody, NodeDirectory, RegisterNodeBody,
};
use std::time::Duration;
use tracing::debug;

use super::transport::endpoint;

/// [`NodeDirectory`] backed by the registry's HTTP API.
#[derive(Clone, Debug)]
pub struct DirectoryClient {
    client: reqwest::Client,
    base_url: String,
}

impl DirectoryClient {
    /// Create a client for the registry at `base_url`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DirectoryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

fn unavailable(err: reqwest::Error) -> DirectoryError {
    DirectoryError::Unavailable(err.to_string())
}

#[async_trait]
impl NodeDirectory for DirectoryClient {
    async fn register_node(&self, body: RegisterNodeBody) -> Result<DirectoryEntry, DirectoryError> {
        let url = endpoint(&self.base_url, "/registerNode");
        debug!("Registering node {:?} at {}", body.node_id, url);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        match (response.status(), body.node_id, body.pub_key) {
            (status, Some(node_id), Some(pub_key)) if status.is_success() => {
                Ok(DirectoryEntry { node_id, pub_key })
            }
            (StatusCode::CONFLICT, Some(node_id), _) => Err(DirectoryError::DuplicateNode(node_id)),
            (StatusCode::BAD_REQUEST, _, _) => Err(DirectoryError::MissingField),
            (status, _, _) => Err(DirectoryError::Unavailable(format!(
                "{} responded with status {}",
                url, status
            ))),
        }
    }

    async fn list_nodes(&self) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        let url = endpoint(&self.base_url, "/getNodeRegistry");
        let response = self.client.get(&url).send().await.map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "{} responded with status {}",
                url, status
            )));
        }

        let registry: GetNodeRegistryBody = response.json().await.map_err(unavailable)?;
        Ok(registry.nodes)
    }
}
