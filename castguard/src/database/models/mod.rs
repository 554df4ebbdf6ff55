//! Database row models.

mod analytics;
mod broadcast;

pub use analytics::{AlertRecordDbModel, HealthRecordDbModel, QualityRecordDbModel};
pub use broadcast::{
    BroadcastDbModel, BroadcastPlatformDbModel, BroadcastStatus, PlatformStatus,
};
