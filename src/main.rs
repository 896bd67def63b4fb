use std::io;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware, web, App, HttpServer};
use reminder_push_service::config::Config;
use reminder_push_service::handlers::notifications::{json_config, register_routes};
use reminder_push_service::services::{
    DispatchService, FcmDelivery, JwtBearerCredentialProvider, ServiceAccountKey, SupabaseClient,
};
use reminder_push_service::services::audit_reporter::AuditStore;
use reminder_push_service::services::credential_signer::CredentialProvider;
use reminder_push_service::services::token_resolver::TokenStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn fatal(message: String) -> io::Error {
    tracing::error!("{}", message);
    io::Error::new(io::ErrorKind::InvalidInput, message)
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting reminder push service");

    let config = Config::from_env().map_err(|e| fatal(e.to_string()))?;

    let service_account = ServiceAccountKey::from_json(&config.firebase.service_account_json)
        .map_err(|e| fatal(e.to_string()))?;
    let credentials = Arc::new(
        JwtBearerCredentialProvider::new(service_account).map_err(|e| fatal(e.to_string()))?,
    );

    let supabase = Arc::new(SupabaseClient::new(&config.supabase));
    let delivery = Arc::new(FcmDelivery::new(&config.firebase.project_id));

    let service = Arc::new(DispatchService::new(
        supabase.clone() as Arc<dyn TokenStore>,
        credentials as Arc<dyn CredentialProvider>,
        delivery,
        supabase as Arc<dyn AuditStore>,
        Duration::from_secs(config.app.send_timeout_secs),
    ));

    let addr = format!("0.0.0.0:{}", config.app.port);
    tracing::info!("Starting HTTP server on {}", addr);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .app_data(json_config())
            .wrap(middleware::Logger::default())
            .route("/health", web::get().to(|| async { "OK" }))
            .route(
                "/",
                web::get().to(|| async { "Reminder Push Service v1.0" }),
            )
            .configure(register_routes)
    })
    .bind(&addr)?
    .run()
    .await
}
