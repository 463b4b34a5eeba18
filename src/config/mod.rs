/// Database configuration and connection management
pub mod database;

/// Application settings and bus seeds loaded from config.toml
pub mod settings;
