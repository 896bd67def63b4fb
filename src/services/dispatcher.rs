/// Dispatch Fan-out Engine
///
/// Sends one push message per resolved token. All sends run concurrently,
/// each bounded by its own timeout, and the aggregate outcome is computed
/// only after every send has settled. A failure or timeout on one token
/// never aborts or delays its siblings.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::models::{DeviceToken, DispatchOutcome, DispatchRequest, SignedCredential, TokenFailure};

pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub const EMERGENCY_CHANNEL: &str = "emergency_channel";
pub const REMINDER_CHANNEL: &str = "reminder_channel";

/// Delivery capability for a single push message.
///
/// Returns a message identifier on success and a failure reason otherwise.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn send(&self, access_token: &str, message: &PushMessage) -> Result<String, String>;
}

/// One push message, shaped for the HTTP v1 delivery endpoint
#[derive(Debug, Clone, Serialize)]
pub struct PushMessage {
    pub token: String,
    pub notification: PushNotification,
    pub data: BTreeMap<String, String>,
    pub android: AndroidConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushNotification {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AndroidConfig {
    pub priority: &'static str,
    pub notification: AndroidNotification,
}

#[derive(Debug, Clone, Serialize)]
pub struct AndroidNotification {
    pub channel_id: &'static str,
    pub priority: &'static str,
    pub default_sound: bool,
    pub default_vibrate_timings: bool,
    pub notification_priority: &'static str,
}

/// Emergency notifications get their own channel. Case-sensitive substring
/// match, same as the client apps register their channels.
fn channel_for(notification_type: &str) -> &'static str {
    if notification_type.contains("sos") || notification_type.contains("emergency") {
        EMERGENCY_CHANNEL
    } else {
        REMINDER_CHANNEL
    }
}

/// Build the message for one token. Fixed data keys are written first and
/// cannot be shadowed by caller-supplied data.
pub fn build_message(token: &DeviceToken, request: &DispatchRequest) -> PushMessage {
    let mut data = BTreeMap::new();
    data.insert("type".to_string(), "reminder".to_string());
    data.insert("reminder_id".to_string(), request.reminder_id.clone());
    data.insert(
        "notification_type".to_string(),
        request.notification_type.clone(),
    );
    data.insert("patient_id".to_string(), request.patient_id.clone());
    data.insert("role".to_string(), token.role.as_str().to_string());

    for (key, value) in &request.data {
        data.entry(key.clone()).or_insert_with(|| value.clone());
    }

    PushMessage {
        token: token.value.clone(),
        notification: PushNotification {
            title: request.title.clone(),
            body: request.body.clone(),
        },
        data,
        android: AndroidConfig {
            priority: "high",
            notification: AndroidNotification {
                channel_id: channel_for(&request.notification_type),
                priority: "PRIORITY_HIGH",
                default_sound: true,
                default_vibrate_timings: true,
                notification_priority: "PRIORITY_HIGH",
            },
        },
    }
}

pub struct Dispatcher {
    delivery: Arc<dyn PushDelivery>,
    send_timeout: Duration,
}

impl Dispatcher {
    pub fn new(delivery: Arc<dyn PushDelivery>, send_timeout: Duration) -> Self {
        Self {
            delivery,
            send_timeout,
        }
    }

    /// Fan the message out to every token and settle all sends.
    pub async fn dispatch(
        &self,
        tokens: &[DeviceToken],
        credential: &SignedCredential,
        request: &DispatchRequest,
    ) -> DispatchOutcome {
        if tokens.is_empty() {
            return DispatchOutcome::empty();
        }

        info!("Sending push notification to {} token(s)", tokens.len());

        let mut tasks = Vec::with_capacity(tokens.len());
        for token in tokens {
            let delivery = Arc::clone(&self.delivery);
            let access_token = credential.access_token.clone();
            let message = build_message(token, request);
            let send_timeout = self.send_timeout;

            tasks.push(tokio::spawn(async move {
                match tokio::time::timeout(send_timeout, delivery.send(&access_token, &message))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(format!("timed out after {}s", send_timeout.as_secs())),
                }
            }));
        }

        let mut outcome = DispatchOutcome {
            sent: 0,
            failed: 0,
            total: tokens.len(),
            per_token_errors: Vec::new(),
        };

        // Join in spawn order so per-token errors line up with token indexes
        for (token_index, task) in tasks.into_iter().enumerate() {
            match task.await {
                Ok(Ok(message_id)) => {
                    debug!("Push message delivered: {}", message_id);
                    outcome.sent += 1;
                }
                Ok(Err(reason)) => {
                    warn!("Push send failed for token index {}: {}", token_index, reason);
                    outcome.failed += 1;
                    outcome.per_token_errors.push(TokenFailure {
                        token_index,
                        reason,
                    });
                }
                Err(e) => {
                    error!("Push send task failed for token index {}: {}", token_index, e);
                    outcome.failed += 1;
                    outcome.per_token_errors.push(TokenFailure {
                        token_index,
                        reason: format!("send task failed: {}", e),
                    });
                }
            }
        }

        info!(
            "Completed batch. Sent: {}, Failed: {}",
            outcome.sent, outcome.failed
        );

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TokenRole;
    use chrono::Utc;
    use std::collections::HashMap;

    fn request() -> DispatchRequest {
        DispatchRequest {
            patient_id: "p1".to_string(),
            reminder_id: "r1".to_string(),
            title: "Take medicine".to_string(),
            body: "It's time".to_string(),
            notification_type: "reminder_due".to_string(),
            notify_patient: true,
            notify_caregivers: true,
            data: HashMap::new(),
        }
    }

    fn credential() -> SignedCredential {
        let now = Utc::now();
        SignedCredential {
            access_token: "test-access-token".to_string(),
            issued_at: now,
            expires_at: now + chrono::Duration::seconds(3600),
        }
    }

    fn token(value: &str, role: TokenRole) -> DeviceToken {
        DeviceToken {
            value: value.to_string(),
            role,
        }
    }

    /// Per-token scripted delivery: fails tokens listed in `failing`,
    /// stalls tokens listed in `stalling`, succeeds otherwise.
    struct ScriptedDelivery {
        failing: Vec<String>,
        stalling: Vec<String>,
    }

    impl ScriptedDelivery {
        fn succeeding() -> Self {
            Self {
                failing: vec![],
                stalling: vec![],
            }
        }
    }

    #[async_trait]
    impl PushDelivery for ScriptedDelivery {
        async fn send(&self, _access_token: &str, message: &PushMessage) -> Result<String, String> {
            if self.stalling.contains(&message.token) {
                tokio::time::sleep(Duration::from_secs(86400)).await;
            }
            if self.failing.contains(&message.token) {
                return Err("push endpoint returned 400: bad token".to_string());
            }
            Ok(format!("projects/test/messages/{}", message.token))
        }
    }

    #[test]
    fn test_channel_selection() {
        assert_eq!(channel_for("sos_triggered"), EMERGENCY_CHANNEL);
        assert_eq!(channel_for("emergency"), EMERGENCY_CHANNEL);
        assert_eq!(channel_for("fall_emergency_alert"), EMERGENCY_CHANNEL);
        assert_eq!(channel_for("reminder_due"), REMINDER_CHANNEL);
        // Case-sensitive substring match
        assert_eq!(channel_for("SOS"), REMINDER_CHANNEL);
    }

    #[test]
    fn test_build_message_fixed_keys() {
        let message = build_message(&token("tokA", TokenRole::Caregiver), &request());

        assert_eq!(message.token, "tokA");
        assert_eq!(message.notification.title, "Take medicine");
        assert_eq!(message.data["type"], "reminder");
        assert_eq!(message.data["reminder_id"], "r1");
        assert_eq!(message.data["notification_type"], "reminder_due");
        assert_eq!(message.data["patient_id"], "p1");
        assert_eq!(message.data["role"], "caregiver");
        assert_eq!(message.android.priority, "high");
        assert_eq!(message.android.notification.channel_id, REMINDER_CHANNEL);
    }

    #[test]
    fn test_caller_data_cannot_shadow_fixed_keys() {
        let mut req = request();
        req.data.insert("patient_id".to_string(), "forged".to_string());
        req.data.insert("role".to_string(), "patient".to_string());
        req.data.insert("custom".to_string(), "value".to_string());

        let message = build_message(&token("tokA", TokenRole::Caregiver), &req);

        assert_eq!(message.data["patient_id"], "p1");
        assert_eq!(message.data["role"], "caregiver");
        assert_eq!(message.data["custom"], "value");
    }

    #[test]
    fn test_message_wire_shape() {
        let message = build_message(&token("tokA", TokenRole::Patient), &request());
        let json = serde_json::to_value(&message).unwrap();

        assert_eq!(json["token"], "tokA");
        assert_eq!(json["notification"]["title"], "Take medicine");
        assert_eq!(json["android"]["priority"], "high");
        assert_eq!(
            json["android"]["notification"]["channel_id"],
            "reminder_channel"
        );
        assert_eq!(json["android"]["notification"]["default_sound"], true);
        assert_eq!(
            json["android"]["notification"]["notification_priority"],
            "PRIORITY_HIGH"
        );
    }

    #[tokio::test]
    async fn test_empty_token_set_short_circuits() {
        let dispatcher = Dispatcher::new(
            Arc::new(ScriptedDelivery::succeeding()),
            DEFAULT_SEND_TIMEOUT,
        );

        let outcome = dispatcher.dispatch(&[], &credential(), &request()).await;
        assert_eq!(outcome, DispatchOutcome::empty());
    }

    #[tokio::test]
    async fn test_all_sends_succeed() {
        let dispatcher = Dispatcher::new(
            Arc::new(ScriptedDelivery::succeeding()),
            DEFAULT_SEND_TIMEOUT,
        );

        let tokens = vec![
            token("tokA", TokenRole::Patient),
            token("tokB", TokenRole::Caregiver),
        ];
        let outcome = dispatcher.dispatch(&tokens, &credential(), &request()).await;

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 0);
        assert_eq!(outcome.total, 2);
        assert!(outcome.per_token_errors.is_empty());
    }

    #[tokio::test]
    async fn test_partial_failure_is_tolerated() {
        let dispatcher = Dispatcher::new(
            Arc::new(ScriptedDelivery {
                failing: vec!["tokB".to_string()],
                stalling: vec![],
            }),
            DEFAULT_SEND_TIMEOUT,
        );

        let tokens = vec![
            token("tokA", TokenRole::Patient),
            token("tokB", TokenRole::Caregiver),
            token("tokC", TokenRole::Caregiver),
        ];
        let outcome = dispatcher.dispatch(&tokens, &credential(), &request()).await;

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.per_token_errors.len(), 1);
        assert_eq!(outcome.per_token_errors[0].token_index, 1);
        assert!(outcome.per_token_errors[0].reason.contains("400"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_send_times_out_without_blocking_siblings() {
        let dispatcher = Dispatcher::new(
            Arc::new(ScriptedDelivery {
                failing: vec![],
                stalling: vec!["tokB".to_string()],
            }),
            DEFAULT_SEND_TIMEOUT,
        );

        let tokens = vec![
            token("tokA", TokenRole::Patient),
            token("tokB", TokenRole::Caregiver),
            token("tokC", TokenRole::Caregiver),
        ];
        let outcome = dispatcher.dispatch(&tokens, &credential(), &request()).await;

        assert_eq!(outcome.sent, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.total, 3);
        assert_eq!(outcome.per_token_errors[0].token_index, 1);
        assert_eq!(outcome.per_token_errors[0].reason, "timed out after 10s");
    }
}
