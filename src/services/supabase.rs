/// PostgREST-backed token lookup and audit store.
///
/// Reads patient and caregiver push tokens and writes `notification_log`
/// rows over the REST interface with the service-role key. Every failure
/// here is a `LookupError`; callers log it and carry on.
use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SupabaseConfig;
use crate::error::LookupError;
use crate::services::audit_reporter::AuditStore;
use crate::services::token_resolver::TokenStore;
use crate::models::AuditRecord;

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn get(&self, table: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.rest_url(table))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, LookupError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(LookupError(format!("store returned {}: {}", status, body)))
    }
}

#[derive(Debug, Deserialize)]
struct PatientRow {
    fcm_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LinkRow {
    caregiver_id: String,
}

#[derive(Debug, Deserialize)]
struct CaregiverRow {
    id: String,
    fcm_token: Option<String>,
}

#[async_trait]
impl TokenStore for SupabaseClient {
    async fn primary_token(&self, patient_id: &str) -> Result<Option<String>, LookupError> {
        let response = self
            .get("patients")
            .query(&[
                ("id", format!("eq.{}", patient_id)),
                ("select", "fcm_token".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<PatientRow> = check(response).await?.json().await?;
        Ok(rows.into_iter().next().and_then(|row| row.fcm_token))
    }

    async fn linked_ids(&self, patient_id: &str) -> Result<Vec<String>, LookupError> {
        let response = self
            .get("caregiver_patient_links")
            .query(&[
                ("patient_id", format!("eq.{}", patient_id)),
                ("select", "caregiver_id".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<LinkRow> = check(response).await?.json().await?;
        Ok(rows.into_iter().map(|row| row.caregiver_id).collect())
    }

    async fn tokens_for_ids(
        &self,
        ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, LookupError> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }

        let response = self
            .get("caregiver_profiles")
            .query(&[
                ("id", format!("in.({})", ids.join(","))),
                ("select", "id,fcm_token".to_string()),
            ])
            .send()
            .await?;

        let rows: Vec<CaregiverRow> = check(response).await?.json().await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.id, row.fcm_token))
            .collect())
    }
}

#[async_trait]
impl AuditStore for SupabaseClient {
    async fn insert(&self, record: &AuditRecord) -> Result<(), LookupError> {
        let response = self
            .http
            .post(self.rest_url("notification_log"))
            .header("apikey", &self.service_role_key)
            .bearer_auth(&self.service_role_key)
            .header("Prefer", "return=minimal")
            .json(record)
            .send()
            .await?;

        check(response).await.map(|_| ())
    }
}
