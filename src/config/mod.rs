/// Database configuration and connection management
pub mod database;

/// Import source and sink configuration loading from config.toml
pub mod sources;
