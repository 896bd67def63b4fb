use std::sync::Arc;

use actix_web::{web, HttpResponse};

use crate::error::AppError;
use crate::models::{DispatchRequest, NotificationPayload};
use crate::services::DispatchService;

/// Dispatch a reminder push notification to a patient and their caregivers.
///
/// POST /api/v1/notifications/send
pub async fn send_notification(
    service: web::Data<Arc<DispatchService>>,
    payload: web::Json<NotificationPayload>,
) -> Result<HttpResponse, AppError> {
    let request = DispatchRequest::from_payload(payload.into_inner())?;
    let response = service.send_reminder(&request).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications").route("/send", web::post().to(send_notification)),
    );
}

/// Malformed JSON bodies get the same structured error shape as
/// validation failures.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|_err, _req| AppError::Validation("Invalid JSON payload".to_string()).into())
}
