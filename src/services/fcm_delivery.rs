/// HTTP v1 push-delivery collaborator.
///
/// Posts one message per call with bearer auth. Any non-2xx response is a
/// per-token failure carrying the status and response body.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::services::dispatcher::{PushDelivery, PushMessage};

pub struct FcmDelivery {
    http: reqwest::Client,
    endpoint: String,
}

impl FcmDelivery {
    pub fn new(project_id: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!(
                "https://fcm.googleapis.com/v1/projects/{}/messages:send",
                project_id
            ),
        }
    }

    #[cfg(test)]
    fn with_endpoint(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[derive(Serialize)]
struct PushEnvelope<'a> {
    message: &'a PushMessage,
}

#[derive(Deserialize)]
struct PushApiResponse {
    name: Option<String>,
}

#[async_trait]
impl PushDelivery for FcmDelivery {
    async fn send(&self, access_token: &str, message: &PushMessage) -> Result<String, String> {
        let response = self
            .http
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&PushEnvelope { message })
            .send()
            .await
            .map_err(|e| format!("push request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "no body returned".to_string());
            return Err(format!("push endpoint returned {}: {}", status, body));
        }

        let api: PushApiResponse = response
            .json()
            .await
            .map_err(|e| format!("failed to parse push response: {}", e))?;

        Ok(api.name.unwrap_or_else(|| Uuid::new_v4().to_string()))
    }
}
