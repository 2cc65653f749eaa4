use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{DeliveryOutcome, NotificationChannel, Payload};
use crate::subscribers::SubscriberId;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Clone)]
pub struct TelegramChannel {
    token: String,
    api_base: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl TelegramChannel {
    pub fn new(token: String) -> Self {
        Self {
            token,
            api_base: API_BASE.to_string(),
            client: Client::new(),
            timeout: Duration::from_secs(60),
            max_retries: 3,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries;
        self
    }

    /// Point at a different Bot API host (local bot server, test double).
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: SubscriberId,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
}

#[async_trait::async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send(&self, subscriber: SubscriberId, payload: &Payload) -> DeliveryOutcome {
        let body = SendMessage {
            chat_id: subscriber,
            text: &payload.text,
            parse_mode: payload.markdown.then_some("Markdown"),
        };
        let url = self.endpoint();
        let attempts = self.max_retries.max(1);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&url)
                .timeout(self.timeout)
                .json(&body)
                .send()
                .await;

            let failure = match res {
                Ok(rsp) => match rsp.error_for_status_ref() {
                    Ok(_) => return DeliveryOutcome::Delivered,
                    Err(e) => format!("Telegram HTTP error: {e}"),
                },
                Err(e) => format!("Telegram request failed: {e}"),
            };

            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                continue;
            }
            // never echo the token-bearing URL
            return DeliveryOutcome::DeliveryFailed(failure.replace(&self.token, "***"));
        }
    }
}
