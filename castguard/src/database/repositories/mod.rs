//! Repository traits and their sqlx implementations.

mod analytics;
mod broadcast;

pub use analytics::{AnalyticsRepository, SqlxAnalyticsRepository};
pub use broadcast::{BroadcastRepository, SqlxBroadcastRepository};
