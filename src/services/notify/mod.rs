pub mod expo;

use async_trait::async_trait;

use crate::models::User;

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(
        &self,
        user: &User,
        title: &str,
        body: &str,
        data: serde_json::Value,
    ) -> anyhow::Result<()>;
}

/// Delivers a notification without letting a delivery failure escape.
pub async fn notify_best_effort(
    sink: &dyn NotificationSink,
    user: &User,
    title: &str,
    body: &str,
    data: serde_json::Value,
) {
    if let Err(e) = sink.notify(user, title, body, data).await {
        tracing::warn!(user = %user.id, error = %e, "failed to deliver notification");
    }
}
