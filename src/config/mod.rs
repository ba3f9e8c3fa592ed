//! Configuration module for tributary.
//!
//! Settings are loaded once at startup and passed to the components that need
//! them; input existence checks happen through [`InputPaths::require`].

mod settings;

pub use settings::{
    expand_env_vars, CacheSettings, InputPaths, InputSettings, OutputSettings, ParsingSettings,
    Settings, SettingsError, TreeSettings,
};
