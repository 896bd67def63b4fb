use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::AppError;

/// Who a device token belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TokenRole {
    /// The monitored patient, the primary recipient
    Patient,
    /// A caregiver linked to the patient
    Caregiver,
}

impl TokenRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenRole::Patient => "patient",
            TokenRole::Caregiver => "caregiver",
        }
    }
}

/// A validated, deduplicated push token for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceToken {
    pub value: String,
    pub role: TokenRole,
}

/// Inbound JSON body for the dispatch endpoint.
///
/// Required fields are optional here so that validation can produce a
/// structured 400 instead of a deserialization failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub patient_id: Option<String>,
    pub reminder_id: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
    pub notification_type: Option<String>,
    pub notify_patient: Option<bool>,
    pub notify_caregivers: Option<bool>,
    pub data: Option<HashMap<String, String>>,
}

/// A validated dispatch request. Immutable once accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRequest {
    pub patient_id: String,
    pub reminder_id: String,
    pub title: String,
    pub body: String,
    pub notification_type: String,
    pub notify_patient: bool,
    pub notify_caregivers: bool,
    pub data: HashMap<String, String>,
}

impl DispatchRequest {
    /// Validate the wire payload. Empty strings count as missing.
    pub fn from_payload(payload: NotificationPayload) -> Result<Self, AppError> {
        let patient_id = non_empty(payload.patient_id);
        let title = non_empty(payload.title);
        let body = non_empty(payload.body);

        match (patient_id, title, body) {
            (Some(patient_id), Some(title), Some(body)) => Ok(DispatchRequest {
                patient_id,
                reminder_id: payload.reminder_id.unwrap_or_default(),
                title,
                body,
                notification_type: payload
                    .notification_type
                    .unwrap_or_else(|| "reminder_due".to_string()),
                notify_patient: payload.notify_patient.unwrap_or(true),
                notify_caregivers: payload.notify_caregivers.unwrap_or(true),
                data: payload.data.unwrap_or_default(),
            }),
            _ => Err(AppError::Validation(
                "Missing required fields: patient_id, title, body".to_string(),
            )),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

/// Short-lived bearer credential from the JWT-bearer exchange.
///
/// Held for the duration of one dispatch, never persisted.
#[derive(Debug, Clone)]
pub struct SignedCredential {
    pub access_token: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One token's failure, recorded in send order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenFailure {
    pub token_index: usize,
    pub reason: String,
}

/// Aggregate result of one fan-out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    pub per_token_errors: Vec<TokenFailure>,
}

impl DispatchOutcome {
    pub fn empty() -> Self {
        DispatchOutcome {
            sent: 0,
            failed: 0,
            total: 0,
            per_token_errors: Vec::new(),
        }
    }

    pub fn error_summary(&self) -> Option<String> {
        if self.failed > 0 {
            Some(format!("{} of {} failed", self.failed, self.total))
        } else {
            None
        }
    }
}

/// Audit row written after dispatch completes
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub patient_id: String,
    pub notification_type: String,
    pub title: String,
    pub body: String,
    pub data: HashMap<String, String>,
    pub sent_at: DateTime<Utc>,
    pub delivered: bool,
    pub error: Option<String>,
}

/// Outbound JSON body for the dispatch endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchResponse {
    pub sent: usize,
    pub failed: usize,
    pub total: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl DispatchResponse {
    /// The idempotent no-send outcome: nothing to notify is not an error.
    pub fn no_tokens() -> Self {
        DispatchResponse {
            sent: 0,
            failed: 0,
            total: 0,
            message: Some("No push tokens available".to_string()),
            reason: Some("idempotent_no_tokens".to_string()),
        }
    }

    pub fn from_outcome(outcome: &DispatchOutcome) -> Self {
        DispatchResponse {
            sent: outcome.sent,
            failed: outcome.failed,
            total: outcome.total,
            message: None,
            reason: None,
        }
    }
}
