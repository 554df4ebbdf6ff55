//! Streaming platform session adapters.
//!
//! Each supported platform (Zoom, Facebook, Instagram) implements the
//! [`PlatformAdapter`] trait, translating session operations into calls
//! against the platform's API through its own [`resilient_client::ResilientClient`]
//! instance. One client per adapter keeps breaker and pacing state independent
//! across platforms.

mod adapter;
mod credentials;
mod error;
mod platform;

pub mod facebook;
pub mod instagram;
pub mod zoom;

pub use adapter::{PlatformAdapter, PlatformSession, SessionSpec, SessionState};
pub use credentials::{Credential, CredentialSource, StaticCredentialSource, TokenCache};
pub use error::AdapterError;
pub use platform::Platform;
