//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Stored settings blob is not valid JSON.
    ConfigCorrupt(String),
    /// Settings backend unreachable (network or filesystem).
    ConfigUnavailable(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
    /// Chat platform connection or send failure.
    Connect(String),
    /// Markov generation collaborator failure.
    Generate(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::ConfigCorrupt(msg) => write!(f, "config corrupt: {msg}"),
            Self::ConfigUnavailable(msg) => write!(f, "config unavailable: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
            Self::Connect(msg) => write!(f, "connect: {msg}"),
            Self::Generate(msg) => write!(f, "generate: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
