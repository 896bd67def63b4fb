/// Outcome Reporter
///
/// Writes one audit row per dispatch. A failed write is logged and
/// swallowed: by this point the sends themselves have already settled,
/// and the caller must still get its outcome.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::error;

use crate::error::LookupError;
use crate::models::{AuditRecord, DispatchOutcome, DispatchRequest};

#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn insert(&self, record: &AuditRecord) -> Result<(), LookupError>;
}

pub struct AuditReporter {
    store: Arc<dyn AuditStore>,
}

impl AuditReporter {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    pub async fn record(&self, request: &DispatchRequest, outcome: &DispatchOutcome) {
        let record = AuditRecord {
            patient_id: request.patient_id.clone(),
            notification_type: request.notification_type.clone(),
            title: request.title.clone(),
            body: request.body.clone(),
            data: request.data.clone(),
            sent_at: Utc::now(),
            delivered: outcome.sent > 0,
            error: outcome.error_summary(),
        };

        if let Err(e) = self.store.insert(&record).await {
            error!("Failed to write notification audit record: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct RecordingStore {
        records: Mutex<Vec<AuditRecord>>,
        fail: bool,
    }

    #[async_trait]
    impl AuditStore for RecordingStore {
        async fn insert(&self, record: &AuditRecord) -> Result<(), LookupError> {
            if self.fail {
                return Err(LookupError("insert failed".to_string()));
            }
            self.records.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

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

    #[tokio::test]
    async fn test_record_maps_outcome_to_audit_row() {
        let store = Arc::new(RecordingStore {
            records: Mutex::new(Vec::new()),
            fail: false,
        });
        let reporter = AuditReporter::new(store.clone());

        let outcome = DispatchOutcome {
            sent: 2,
            failed: 1,
            total: 3,
            per_token_errors: Vec::new(),
        };
        reporter.record(&request(), &outcome).await;

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].patient_id, "p1");
        assert!(records[0].delivered);
        assert_eq!(records[0].error.as_deref(), Some("1 of 3 failed"));
    }

    #[tokio::test]
    async fn test_all_failed_dispatch_is_not_delivered() {
        let store = Arc::new(RecordingStore {
            records: Mutex::new(Vec::new()),
            fail: false,
        });
        let reporter = AuditReporter::new(store.clone());

        let outcome = DispatchOutcome {
            sent: 0,
            failed: 2,
            total: 2,
            per_token_errors: Vec::new(),
        };
        reporter.record(&request(), &outcome).await;

        let records = store.records.lock().unwrap();
        assert!(!records[0].delivered);
    }

    #[tokio::test]
    async fn test_insert_failure_is_swallowed() {
        let reporter = AuditReporter::new(Arc::new(RecordingStore {
            records: Mutex::new(Vec::new()),
            fail: true,
        }));

        let outcome = DispatchOutcome {
            sent: 1,
            failed: 0,
            total: 1,
            per_token_errors: Vec::new(),
        };

        // Must complete without propagating the store failure
        reporter.record(&request(), &outcome).await;
    }
}
