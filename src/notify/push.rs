use crate::config::Config;

/// Deliver a device push through the configured FCM-compatible gateway.
/// Best effort: failures are logged and never propagated to the caller.
pub async fn send(config: &Config, device_token: &str, title: &str, body: &str) {
    let Some(key) = config.push_key.as_deref() else {
        tracing::debug!("push gateway not configured, skipping device push");
        return;
    };

    let payload = serde_json::json!({
        "to": device_token,
        "notification": { "title": title, "body": body },
    });

    let client = reqwest::Client::new();
    match client
        .post(&config.push_endpoint)
        .header("Authorization", format!("key={key}"))
        .header("User-Agent", "InternHub-Push/1.0")
        .json(&payload)
        .send()
        .await
    {
        Ok(resp) => {
            tracing::info!(status = resp.status().as_u16(), "device push delivered");
        }
        Err(e) => {
            tracing::warn!(error = %e, "device push delivery failed");
        }
    }
}
