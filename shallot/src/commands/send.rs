use anyhow::{anyhow, Result};
use serde_json::Value;

use super::block_on;
use crate::config::Config;
use crate::network::onion::UserId;
use crate::network::{AddressResolver, PortLayout};
use crate::rpc::user::SendMessageBody;

/// Ask user `from` to send `message` to user `to`
pub fn run(config: &Config, from: u32, to: u32, message: String) -> Result<()> {
    let layout = PortLayout::from(&config.network);
    let base = layout
        .user_url(UserId(from))
        .ok_or_else(|| anyhow!("No port available for user {}", from))?;
    let url = format!("{}/sendMessage", base);
    let timeout = config.network.request_timeout();

    block_on(async move {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let body = SendMessageBody {
            message: Some(message),
            destination_user_id: Some(UserId(to)),
        };

        let response = client.post(&url).json(&body).send().await?;
        let status = response.status();
        let result: Value = response.json().await?;

        if status.is_success() {
            println!("Message sent from user {} to user {}", from, to);
            if let Some(circuit) = result.get("result") {
                println!("Circuit: {}", circuit);
            }
            Ok(())
        } else if let Some(error) = result.get("error") {
            Err(anyhow!("Send failed ({}): {}", status, error))
        } else {
            Err(anyhow!("Send failed: {}", status))
        }
    })
}
