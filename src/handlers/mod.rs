/// HTTP handlers for the push dispatch API
pub mod notifications;

pub use notifications::*;
