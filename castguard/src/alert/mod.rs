//! Alert envelope, channel selection, and the multi-channel dispatcher.

mod dispatcher;
mod types;

pub use dispatcher::AlertDispatcher;
pub use types::{
    Alert, AlertSeverity, AlertType, ChannelOverride, ChannelSelection, ContactResolver,
    LogNotifier, NotificationChannel, NotificationRequest, Notifier, OwnerContacts,
    StaticContactResolver,
};
