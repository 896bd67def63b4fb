/// Token Resolver
///
/// Gathers raw device tokens for a patient and their linked caregivers,
/// then applies token hygiene: trim, drop empty/"null"/"undefined"
/// values, and deduplicate by trimmed value keeping the first-seen role.
/// Lookup failures are logged and degrade to an empty result for that
/// stage only.
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::LookupError;
use crate::models::{DeviceToken, TokenRole};

/// Lookup capability for device push tokens
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Push token registered for the patient, if any
    async fn primary_token(&self, patient_id: &str) -> Result<Option<String>, LookupError>;

    /// Ids of caregivers linked to the patient
    async fn linked_ids(&self, patient_id: &str) -> Result<Vec<String>, LookupError>;

    /// Push tokens for a batch of caregiver ids
    async fn tokens_for_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, LookupError>;
}

pub struct TokenResolver {
    store: Arc<dyn TokenStore>,
}

impl TokenResolver {
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        Self { store }
    }

    /// Resolve the deduplicated token set for one dispatch.
    ///
    /// An empty result is a valid outcome, not an error.
    pub async fn resolve(
        &self,
        patient_id: &str,
        notify_patient: bool,
        notify_caregivers: bool,
    ) -> Vec<DeviceToken> {
        let mut raw: Vec<(String, TokenRole)> = Vec::new();

        if notify_patient {
            match self.store.primary_token(patient_id).await {
                Ok(Some(token)) => raw.push((token, TokenRole::Patient)),
                Ok(None) => {}
                Err(e) => warn!("Failed to fetch patient token: {}", e),
            }
        }

        if notify_caregivers {
            match self.store.linked_ids(patient_id).await {
                Ok(ids) if !ids.is_empty() => match self.store.tokens_for_ids(&ids).await {
                    Ok(tokens) => {
                        // Iterate over ids, not the map, for stable ordering
                        for id in &ids {
                            if let Some(Some(token)) = tokens.get(id) {
                                raw.push((token.clone(), TokenRole::Caregiver));
                            }
                        }
                    }
                    Err(e) => warn!("Failed to fetch caregiver tokens: {}", e),
                },
                Ok(_) => {}
                Err(e) => warn!("Failed to fetch caregiver links: {}", e),
            }
        }

        dedupe_tokens(raw)
    }
}

const SENTINEL_TOKENS: [&str; 2] = ["null", "undefined"];

fn is_valid_token(trimmed: &str) -> bool {
    !trimmed.is_empty()
        && !SENTINEL_TOKENS
            .iter()
            .any(|s| trimmed.eq_ignore_ascii_case(s))
}

/// Trim, discard sentinels, and deduplicate keeping the first-seen role.
pub(crate) fn dedupe_tokens(raw: Vec<(String, TokenRole)>) -> Vec<DeviceToken> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut tokens = Vec::new();
    let mut skipped = 0usize;

    for (value, role) in raw {
        let trimmed = value.trim();
        if !is_valid_token(trimmed) {
            skipped += 1;
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            tokens.push(DeviceToken {
                value: trimmed.to_string(),
                role,
            });
        }
    }

    if skipped > 0 {
        info!("Skipped {} empty, null, or malformed push tokens", skipped);
    }

    tokens
}
