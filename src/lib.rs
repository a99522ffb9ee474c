//! # weir-settings
//!
//! Settings validation and resolution for the Weir database migration tool.
//!
//! Weir reads its configuration document into the loosely-typed [`Settings`]
//! structure, then resolves it with [`parse_settings`] into
//! [`ParsedSettings`]:
//! - Connection strings fall back to environment variables (`DATABASE_URL`,
//!   `TEST_DATABASE_URL`, `ROOT_DATABASE_URL`)
//! - Lifecycle hooks normalize into uniform, order-preserving [`Action`]
//!   lists
//! - Placeholders are validated and `!ENV` values substituted
//! - Every problem found in the pass is reported at once in one aggregated
//!   [`SettingsError`], not one at a time
//!
//! Resolution opens no database connection and reads no files: it is a pure
//! computation over the settings object and the environment, so the
//! collaborators that execute migrations can rely on [`ParsedSettings`]
//! being internally consistent before any stateful work starts.
//!
//! ## Example
//!
//! ```rust,ignore
//! use weir_settings::{parse_settings, Settings};
//!
//! let settings: Settings = serde_json::from_str(
//!     r#"{
//!         "connectionString": "postgres://localhost:5432/app",
//!         "afterReset": ["install-extensions.sql"],
//!         "afterAllMigrations": [
//!             {"_": "command", "command": "pg_dump --schema-only > schema.sql"}
//!         ]
//!     }"#,
//! )?;
//!
//! let parsed = parse_settings(&settings, false).await?;
//! assert_eq!(parsed.database_name, "app");
//! ```
//!
//! ## Validation report
//!
//! Failures aggregate into a single error whose message lists every problem:
//!
//! ```text
//! Errors occurred during settings validation:
//! - Setting 'connectionString': Expected a string, or for DATABASE_URL envvar to be set
//! - Setting 'afterReset': Expected a string or an action spec, but found 42
//! ```

pub mod actions;
pub mod connection;
pub mod env;
pub mod error;
pub mod settings;

// Re-exports
pub use actions::{Action, ActionList};
pub use env::{Environment, MapEnvironment, SystemEnvironment};
pub use error::{SettingsError, SettingsResult, ValidationError, ValidationErrorKind};
pub use settings::{
    DATABASE_URL_ENVVAR, DEFAULT_MIGRATIONS_FOLDER, DEFAULT_ROOT_CONNECTION_STRING,
    ParsedSettings, RESERVED_PLACEHOLDERS, ROOT_DATABASE_URL_ENVVAR, Settings,
    TEST_DATABASE_URL_ENVVAR, parse_settings, parse_settings_with_env,
};
