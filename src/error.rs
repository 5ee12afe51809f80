/*!
 * Error handling for IDSS dataset operations
 *
 * Provides detailed error types with context, suggestions, and recovery guidance.
 * Row-level parse anomalies never reach this module: the normalizer absorbs
 * them into `None`/empty values. What ends up here is fatal for one load
 * attempt or one configuration step.
 */

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use serde::{Serialize, Deserialize};

/// IDSS library result type
pub type Result<T> = std::result::Result<T, IdssError>;

/// Error types with context and suggestions
#[derive(Error, Debug)]
pub enum IdssError {
    /// File I/O errors with context
    #[error("I/O error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
        context: ErrorContext,
    },

    /// CSV parsing errors with location information
    #[error("CSV parsing error at line {line:?}: {message}")]
    CsvParse {
        message: String,
        line: Option<usize>,
        context: ErrorContext,
    },

    /// The configured row source could not produce a dataset
    #[error("Failed to load data from {source_description} ({reason}): {message}")]
    Ingestion {
        reason: IngestionFailure,
        source_description: String,
        message: String,
        suggestion: Option<String>,
    },

    /// File not found with suggestions
    #[error("File not found: {path}")]
    FileNotFound {
        path: PathBuf,
        suggestion: String,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        suggestion: Option<String>,
    },

    /// Feature not enabled error
    #[error("Feature '{feature}' is not enabled")]
    FeatureNotEnabled {
        feature: String,
        enable_instruction: String,
    },

    /// Generic errors with custom message
    #[error("{message}")]
    Custom {
        message: String,
        suggestion: Option<String>,
    },
}

/// Error context providing additional information
#[derive(Debug, Default, Clone)]
pub struct ErrorContext {
    pub file_path: Option<PathBuf>,
    pub line_number: Option<usize>,
}

/// Why an ingestion attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionFailure {
    /// Network or filesystem could not be reached at all
    Unreachable,
    /// The source answered with a non-success status
    HttpStatus(u16),
    /// The source refused access (auth or row-level security)
    PermissionDenied,
    /// The source answered but produced zero rows
    EmptyResult,
    /// The payload could not be decoded into rows
    MalformedPayload,
}

impl fmt::Display for IngestionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestionFailure::Unreachable => write!(f, "source unreachable"),
            IngestionFailure::HttpStatus(code) => write!(f, "HTTP status {}", code),
            IngestionFailure::PermissionDenied => write!(f, "permission denied"),
            IngestionFailure::EmptyResult => write!(f, "empty result"),
            IngestionFailure::MalformedPayload => write!(f, "malformed payload"),
        }
    }
}

impl IdssError {
    /// Create a file not found error with helpful suggestion
    pub fn file_not_found_with_suggestion(path: PathBuf) -> Self {
        let suggestion = if path.extension().and_then(|e| e.to_str()) == Some("csv") {
            format!(
                "Check if the file exists at '{}'. The IDSS history export is usually named \
                like 'idss_2012_2025.csv' and can be downloaded from the ANS open-data portal.",
                path.display()
            )
        } else {
            format!(
                "Check if the file exists at '{}'. Make sure the path is correct and you have read permissions.",
                path.display()
            )
        };

        Self::FileNotFound { path, suggestion }
    }

    /// Create an ingestion error for a source that produced no rows
    pub fn empty_source(source_description: impl Into<String>) -> Self {
        Self::Ingestion {
            reason: IngestionFailure::EmptyResult,
            source_description: source_description.into(),
            message: "no rows were returned".to_string(),
            suggestion: Some(
                "Check that the source contains a header row followed by data rows. \
                For remote tables, verify that read access is granted to the key in use."
                    .to_string(),
            ),
        }
    }

    /// Create an ingestion error for an access-denied response
    pub fn permission_denied(source_description: impl Into<String>, detail: &str, table: &str) -> Self {
        Self::Ingestion {
            reason: IngestionFailure::PermissionDenied,
            source_description: source_description.into(),
            message: detail.to_string(),
            suggestion: Some(format!(
                "Grant read access on the table, e.g.:\n\n\
                CREATE POLICY \"Enable read access for all users\"\n\
                ON public.\"{}\"\n\
                FOR SELECT\n\
                USING (true);",
                table
            )),
        }
    }

    /// Create an ingestion error for a source that could not be reached
    pub fn unreachable(source_description: impl Into<String>, detail: impl fmt::Display) -> Self {
        Self::Ingestion {
            reason: IngestionFailure::Unreachable,
            source_description: source_description.into(),
            message: detail.to_string(),
            suggestion: Some("Check the network connection and the configured source URL, then reload.".to_string()),
        }
    }

    /// Create a feature not enabled error
    pub fn feature_required(feature: &str) -> Self {
        let enable_instruction = match feature {
            "remote" => "Add 'idss = { version = \"0.0.1\", features = [\"remote\"] }' to your Cargo.toml",
            _ => "Enable the required feature in your Cargo.toml",
        };

        Self::FeatureNotEnabled {
            feature: feature.to_string(),
            enable_instruction: enable_instruction.to_string(),
        }
    }

    /// Whether this error came from the data source (as opposed to local setup)
    pub fn is_ingestion(&self) -> bool {
        matches!(self, Self::Ingestion { .. } | Self::FileNotFound { .. } | Self::CsvParse { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            Self::FileNotFound { suggestion, .. } => {
                format!("{}\n\nSuggestion: {}", self, suggestion)
            }
            Self::Ingestion { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            Self::Configuration { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            Self::FeatureNotEnabled { enable_instruction, .. } => {
                format!("{}\n\nTo enable: {}", self, enable_instruction)
            }
            Self::Custom { suggestion: Some(sug), .. } => {
                format!("{}\n\nSuggestion: {}", self, sug)
            }
            _ => self.to_string(),
        }
    }
}

// Convenience conversions
impl From<std::io::Error> for IdssError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
            context: ErrorContext::default(),
        }
    }
}

impl From<csv::Error> for IdssError {
    fn from(err: csv::Error) -> Self {
        let (line, message) = match err.position() {
            Some(pos) => (Some(pos.line() as usize), err.to_string()),
            None => (None, err.to_string()),
        };

        Self::CsvParse {
            message,
            line,
            context: ErrorContext::default(),
        }
    }
}

impl From<serde_json::Error> for IdssError {
    fn from(err: serde_json::Error) -> Self {
        IdssError::Ingestion {
            reason: IngestionFailure::MalformedPayload,
            source_description: "JSON payload".to_string(),
            message: err.to_string(),
            suggestion: Some("The source must return a JSON array of objects keyed by column name.".to_string()),
        }
    }
}
