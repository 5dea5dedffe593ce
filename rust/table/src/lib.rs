pub mod actor;
pub mod errors;
pub mod events;
pub mod logging;
pub mod settings;

pub use actor::{spawn_table, spawn_with, TableHandle};
pub use errors::TableError;
pub use events::{BusSink, EventBus, EventSubscription, TableEvent, TableId, Viewer};
pub use logging::{
    init_logging, init_logging_with, init_test_logging, LogEntry, LogFormat, TestLogSubscriber,
};
pub use settings::{
    load, load_with_sources, SettingsError, SettingsResolved, SettingsSources, TableSettings,
    ValueSource,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_starts_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(TableSettings::default().validate().is_ok());
    }
}
