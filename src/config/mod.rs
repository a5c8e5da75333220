mod settings;

pub use settings::{Settings, SlackConfig, StreamConfig, load_settings, settings_from};
