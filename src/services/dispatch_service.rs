/// Dispatch orchestrator
///
/// Ties the pipeline together for one request: resolve tokens, sign a
/// delivery credential, fan the message out, report the outcome. The
/// empty-token path returns before any credential work happens.
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};

use crate::error::AppError;
use crate::models::{DispatchRequest, DispatchResponse};
use crate::services::audit_reporter::{AuditReporter, AuditStore};
use crate::services::credential_signer::CredentialProvider;
use crate::services::dispatcher::{Dispatcher, PushDelivery};
use crate::services::token_resolver::{TokenResolver, TokenStore};

pub struct DispatchService {
    resolver: TokenResolver,
    credentials: Arc<dyn CredentialProvider>,
    dispatcher: Dispatcher,
    reporter: AuditReporter,
}

impl DispatchService {
    pub fn new(
        token_store: Arc<dyn TokenStore>,
        credentials: Arc<dyn CredentialProvider>,
        delivery: Arc<dyn PushDelivery>,
        audit_store: Arc<dyn AuditStore>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            resolver: TokenResolver::new(token_store),
            credentials,
            dispatcher: Dispatcher::new(delivery, send_timeout),
            reporter: AuditReporter::new(audit_store),
        }
    }

    pub async fn send_reminder(
        &self,
        request: &DispatchRequest,
    ) -> Result<DispatchResponse, AppError> {
        let tokens = self
            .resolver
            .resolve(
                &request.patient_id,
                request.notify_patient,
                request.notify_caregivers,
            )
            .await;

        if tokens.is_empty() {
            info!(
                "No valid push tokens found for patient {}",
                request.patient_id
            );
            return Ok(DispatchResponse::no_tokens());
        }

        let credential = self.credentials.credential().await.map_err(|e| {
            error!("Push auth failure: {}", e);
            e
        })?;

        let outcome = self
            .dispatcher
            .dispatch(&tokens, &credential, request)
            .await;

        self.reporter.record(request, &outcome).await;

        Ok(DispatchResponse::from_outcome(&outcome))
    }
}
