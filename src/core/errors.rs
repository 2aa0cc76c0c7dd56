//! FGM-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, FgmError>;

/// Top-level error type for the fleet gap monitor.
#[derive(Debug, Error)]
pub enum FgmError {
    #[error("[FGM-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[FGM-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[FGM-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[FGM-2001] source query failure for vehicle {vehicle_id} during {stage}: {details}")]
    Source {
        vehicle_id: String,
        stage: &'static str,
        details: String,
    },

    #[error("[FGM-2002] unknown report: {report_id}")]
    UnknownReport { report_id: String },

    #[error("[FGM-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[FGM-2102] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[FGM-2201] unknown alert: {alert_id}")]
    UnknownAlert { alert_id: i64 },

    #[error(
        "[FGM-2202] no completed analysis artifact for vehicle {vehicle_id}; certification requires one"
    )]
    MissingArtifact { vehicle_id: String },

    #[error("[FGM-2203] illegal alert transition for alert {alert_id}: {current} -> {requested}")]
    InvalidStateTransition {
        alert_id: i64,
        current: String,
        requested: String,
    },

    #[error("[FGM-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[FGM-3003] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[FGM-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl FgmError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "FGM-1001",
            Self::MissingConfig { .. } => "FGM-1002",
            Self::ConfigParse { .. } => "FGM-1003",
            Self::Source { .. } => "FGM-2001",
            Self::UnknownReport { .. } => "FGM-2002",
            Self::Serialization { .. } => "FGM-2101",
            Self::Sql { .. } => "FGM-2102",
            Self::UnknownAlert { .. } => "FGM-2201",
            Self::MissingArtifact { .. } => "FGM-2202",
            Self::InvalidStateTransition { .. } => "FGM-2203",
            Self::Io { .. } => "FGM-3002",
            Self::ChannelClosed { .. } => "FGM-3003",
            Self::Runtime { .. } => "FGM-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Source { .. }
                | Self::Sql { .. }
                | Self::Io { .. }
                | Self::ChannelClosed { .. }
                | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for source-query failures.
    #[must_use]
    pub fn source_failure(
        vehicle_id: impl Into<String>,
        stage: &'static str,
        details: impl Into<String>,
    ) -> Self {
        Self::Source {
            vehicle_id: vehicle_id.into(),
            stage,
            details: details.into(),
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for FgmError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for FgmError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for FgmError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
