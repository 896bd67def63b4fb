use crate::error::AppError;

/// Immutable service configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub app: AppConfig,
    pub supabase: SupabaseConfig,
    pub firebase: FirebaseConfig,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub env: String,
    pub port: u16,
    /// Per-send timeout for the push fan-out, in seconds (default: 10)
    pub send_timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    pub url: String,
    pub service_role_key: String,
}

#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
    /// Raw service-account JSON blob; parsed by the credential signer
    pub service_account_json: String,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        Ok(Config {
            app: AppConfig {
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
                port: std::env::var("APP_PORT")
                    .unwrap_or_else(|_| "8000".to_string())
                    .parse()
                    .map_err(|_| AppError::Config("APP_PORT must be a number".to_string()))?,
                send_timeout_secs: std::env::var("SEND_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .map_err(|_| {
                        AppError::Config("SEND_TIMEOUT_SECS must be a number".to_string())
                    })?,
            },
            supabase: SupabaseConfig {
                url: require("SUPABASE_URL")?,
                service_role_key: require("SUPABASE_SERVICE_ROLE_KEY")?,
            },
            firebase: FirebaseConfig {
                project_id: require("FIREBASE_PROJECT_ID")?,
                service_account_json: require("FIREBASE_SERVICE_ACCOUNT")?,
            },
        })
    }
}

fn require(name: &str) -> Result<String, AppError> {
    std::env::var(name)
        .map_err(|_| AppError::Config(format!("Missing required env var: {}", name)))
}
