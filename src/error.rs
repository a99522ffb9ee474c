//! Error types for settings validation.

use thiserror::Error;

/// Result type alias for settings resolution.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// The reason a single setting failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationErrorKind {
    /// A required value was neither given as a string nor available from its
    /// fallback environment variable.
    #[error("Expected a string, or for {envvar} envvar to be set")]
    ExpectedStringOrEnvvar {
        /// Name of the fallback environment variable.
        envvar: String,
    },

    /// The connection string does not name a database.
    #[error(
        "Could not determine the database name, please ensure connectionString includes the database name."
    )]
    DatabaseNameMissing,

    /// The shadow connection string does not name a database.
    #[error(
        "Could not determine the shadow database name, please ensure shadowConnectionString includes the database name."
    )]
    ShadowDatabaseNameMissing,

    /// A value that must be a plain string was something else.
    #[error("Expected a string")]
    ExpectedString,

    /// A value that must be an object was something else.
    #[error("Expected an object")]
    ExpectedObject,

    /// An action list item was neither a string nor an action spec object.
    #[error("Expected a string or an action spec, but found {found}")]
    ActionNotStringOrSpec {
        /// Compact JSON rendering of the offending item.
        found: String,
    },

    /// An action spec object did not deserialize into an action.
    #[error("Not a valid action spec: {reason}")]
    InvalidActionSpec {
        /// Deserializer message describing the mismatch.
        reason: String,
    },

    /// A placeholder key is not of the `:UPPER_SNAKE_CASE` form.
    #[error("Placeholder key '{key}' must start with a colon and be in UPPER_SNAKE_CASE")]
    InvalidPlaceholderKey {
        /// The offending key.
        key: String,
    },

    /// A placeholder key collides with one the engine provides itself.
    #[error("Placeholder '{key}' is reserved and is provided automatically")]
    ReservedPlaceholder {
        /// The offending key.
        key: String,
    },

    /// A placeholder value was not a string.
    #[error("Expected a string value for placeholder '{key}'")]
    ExpectedPlaceholderString {
        /// The placeholder key.
        key: String,
    },

    /// A `!ENV` placeholder referenced an unset environment variable.
    #[error("Placeholder '{key}' is set to !ENV, but the {envvar} envvar is not set")]
    PlaceholderEnvvarMissing {
        /// The placeholder key.
        key: String,
        /// The environment variable named by the key (leading colon dropped).
        envvar: String,
    },

    /// A pgSettings value was neither a string nor a number.
    #[error("Expected a string or number for pgSettings key '{key}'")]
    InvalidPgSetting {
        /// The offending key.
        key: String,
    },

    /// The settings object carried a key this tool does not know.
    #[error("Not a recognized setting")]
    UnknownSetting,
}

/// A single validation failure, tied to the setting that caused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Setting '{setting}': {kind}")]
pub struct ValidationError {
    /// Wire name of the offending setting (camelCase).
    pub setting: String,
    /// What went wrong.
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    /// Create a validation error for the named setting.
    pub fn new(setting: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            setting: setting.into(),
            kind,
        }
    }
}

/// Every validation failure found in one resolution pass, as one error.
///
/// Renders as a report: a header line followed by one bullet per failure, in
/// check order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Errors occurred during settings validation:\n{}", bullet_list(.errors))]
pub struct SettingsError {
    errors: Vec<ValidationError>,
}

impl SettingsError {
    /// Build an aggregate from the failures collected during one pass.
    pub fn new(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    /// The individual failures, in check order.
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Number of individual failures in the report.
    pub fn count(&self) -> usize {
        self.errors.len()
    }
}

fn bullet_list(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|error| format!("- {}", error))
        .collect::<Vec<_>>()
        .join("\n")
}
