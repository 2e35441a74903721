use anyhow::Context;
use async_trait::async_trait;

use super::NotificationSink;
use crate::models::User;

pub struct ExpoPushSink {
    api_url: String,
    client: reqwest::Client,
}

impl ExpoPushSink {
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl NotificationSink for ExpoPushSink {
    async fn notify(
        &self,
        user: &User,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()> {
        let Some(token) = user.push_token.as_deref().filter(|t| !t.is_empty()) else {
            tracing::debug!(user = %user.id, "no push token registered, skipping notification");
            return Ok(());
        };

        self.client
            .post(&self.api_url)
            .json(&serde_json::json!({
                "to": token,
                "title": title,
                "body": body,
                "data": data,
            }))
            .send()
            .await
            .context("failed to send push notification")?
            .error_for_status()
            .context("push gateway returned error")?;

        Ok(())
    }
}
