pub mod audit_reporter;
pub mod credential_signer;
pub mod dispatch_service;
pub mod dispatcher;
pub mod fcm_delivery;
pub mod supabase;
pub mod token_resolver;

pub use audit_reporter::*;
pub use credential_signer::*;
pub use dispatch_service::*;
pub use dispatcher::*;
pub use fcm_delivery::*;
pub use supabase::*;
pub use token_resolver::*;
