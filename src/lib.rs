pub mod config;
pub mod identity;
pub mod practice;
pub mod session;
pub mod sync;

pub use config::{AppConfig, ConfigError};
pub use identity::{IdentityProvider, IdentityState, SessionIdentity, SharedIdentity};
pub use session::{PracticeSession, WordStats};
