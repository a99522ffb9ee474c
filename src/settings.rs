//! Raw settings, resolved settings, and the validation pass between them.
//!
//! [`Settings`] is the loosely-typed document shape; [`parse_settings`]
//! validates and resolves it into [`ParsedSettings`], collecting every
//! problem it finds into a single [`SettingsError`] instead of stopping at
//! the first one.

use std::path::PathBuf;

use indexmap::IndexMap;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::actions::{ActionList, normalize_actions};
use crate::connection;
use crate::env::{Environment, SystemEnvironment};
use crate::error::{SettingsError, SettingsResult, ValidationError, ValidationErrorKind};

/// Environment variable consulted when `connectionString` is not set.
pub const DATABASE_URL_ENVVAR: &str = "DATABASE_URL";

/// Environment variable consulted when `shadowConnectionString` is not set.
pub const TEST_DATABASE_URL_ENVVAR: &str = "TEST_DATABASE_URL";

/// Environment variable consulted when `rootConnectionString` is not set.
pub const ROOT_DATABASE_URL_ENVVAR: &str = "ROOT_DATABASE_URL";

/// Maintenance connection string used when neither the setting nor
/// [`ROOT_DATABASE_URL_ENVVAR`] provides one.
pub const DEFAULT_ROOT_CONNECTION_STRING: &str = "template1";

/// Default folder for committed migrations.
pub const DEFAULT_MIGRATIONS_FOLDER: &str = "./migrations";

/// Placeholder names the engine provides itself; settings may not redefine
/// them.
pub const RESERVED_PLACEHOLDERS: [&str; 2] = [":DATABASE_NAME", ":DATABASE_OWNER"];

/// Raw, loosely-typed settings as read from a configuration document.
///
/// Every field is optional and deliberately untyped ([`Value`]): shape
/// problems are reported by [`parse_settings`], which aggregates all of them,
/// rather than by the deserializer, which would stop at the first. Keys this
/// tool does not recognize are collected into [`unknown`](Self::unknown) and
/// rejected during validation instead of being silently dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    /// Connection string for the database being migrated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<Value>,
    /// Superuser connection string for maintenance operations (creating and
    /// dropping databases).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_connection_string: Option<Value>,
    /// Connection string for the disposable shadow database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_connection_string: Option<Value>,
    /// Role that owns the database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_owner: Option<Value>,
    /// Folder holding committed migrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrations_folder: Option<Value>,
    /// `:UPPER_SNAKE` placeholder substitutions for migration SQL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub placeholders: Option<Value>,
    /// Server settings applied to every migration session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pg_settings: Option<Value>,
    /// Actions to run before the database is reset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_reset: Option<Value>,
    /// Actions to run after the database is reset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_reset: Option<Value>,
    /// Actions to run before committed migrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_all_migrations: Option<Value>,
    /// Actions to run after committed migrations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_all_migrations: Option<Value>,
    /// Actions to run before the working migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before_current: Option<Value>,
    /// Actions to run after the working migration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_current: Option<Value>,
    /// Keys this tool does not recognize.
    #[serde(flatten)]
    pub unknown: IndexMap<String, Value>,
}

/// Fully validated and resolved settings.
///
/// Produced by [`parse_settings`]. Every field is concrete: connection
/// strings resolved with their environment fallbacks applied, hook lists
/// always present (empty when the input omitted them), maps validated and
/// `!ENV` placeholders substituted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSettings {
    /// Resolved connection string; never empty.
    pub connection_string: String,
    /// Maintenance connection string; `template1` when nothing was given.
    pub root_connection_string: String,
    /// Database named by `connection_string`.
    pub database_name: String,
    /// Role owning the database; defaults to the connection user, then to
    /// the database name.
    pub database_owner: String,
    /// Folder holding committed migrations.
    pub migrations_folder: PathBuf,
    /// Shadow connection string; `Some` iff shadow mode was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_connection_string: Option<String>,
    /// Database named by `shadow_connection_string`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow_database_name: Option<String>,
    /// Validated placeholder substitutions, `!ENV` already applied.
    pub placeholders: IndexMap<String, String>,
    /// Server settings for migration sessions, values stringified.
    pub pg_settings: IndexMap<String, String>,
    /// Actions before a database reset.
    pub before_reset: ActionList,
    /// Actions after a database reset.
    pub after_reset: ActionList,
    /// Actions before committed migrations run.
    pub before_all_migrations: ActionList,
    /// Actions after committed migrations run.
    pub after_all_migrations: ActionList,
    /// Actions before the working migration runs.
    pub before_current: ActionList,
    /// Actions after the working migration runs.
    pub after_current: ActionList,
}

/// Validate and resolve `settings` against the process environment.
///
/// `shadow` requests shadow-database support: the shadow connection string
/// becomes required (fallback [`TEST_DATABASE_URL_ENVVAR`]) and must name a
/// database. Returns every problem found, aggregated into one
/// [`SettingsError`].
pub async fn parse_settings(settings: &Settings, shadow: bool) -> SettingsResult<ParsedSettings> {
    parse_settings_with_env(settings, shadow, &SystemEnvironment).await
}

/// [`parse_settings`] with an explicit [`Environment`].
///
/// Lets tests and hermetic callers resolve against a fixed variable map
/// instead of the process environment.
pub async fn parse_settings_with_env(
    settings: &Settings,
    shadow: bool,
    env: &dyn Environment,
) -> SettingsResult<ParsedSettings> {
    debug!("validating settings (shadow: {})", shadow);
    let mut errors: Vec<ValidationError> = Vec::new();

    // connectionString, then the database name it implies. The name check
    // only runs when the string resolved: a missing connection string is one
    // problem, not two.
    let connection_string = resolve_with_envvar(
        settings.connection_string.as_ref(),
        DATABASE_URL_ENVVAR,
        env,
    );
    let database_name = match &connection_string {
        Some(cs) => {
            let name = connection::database_name(cs);
            if name.is_none() {
                errors.push(ValidationError::new(
                    "connectionString",
                    ValidationErrorKind::DatabaseNameMissing,
                ));
            }
            name
        }
        None => {
            errors.push(ValidationError::new(
                "connectionString",
                ValidationErrorKind::ExpectedStringOrEnvvar {
                    envvar: DATABASE_URL_ENVVAR.to_string(),
                },
            ));
            None
        }
    };

    // Maintenance connection falls back to a server default, so it can never
    // fail to resolve.
    let root_connection_string = resolve_with_envvar(
        settings.root_connection_string.as_ref(),
        ROOT_DATABASE_URL_ENVVAR,
        env,
    )
    .unwrap_or_else(|| DEFAULT_ROOT_CONNECTION_STRING.to_string());

    // The shadow name check runs even when the string is missing, so a fully
    // absent shadow config reports both problems at once.
    let (shadow_connection_string, shadow_database_name) = if shadow {
        let shadow_string = resolve_with_envvar(
            settings.shadow_connection_string.as_ref(),
            TEST_DATABASE_URL_ENVVAR,
            env,
        );
        if shadow_string.is_none() {
            errors.push(ValidationError::new(
                "shadowConnectionString",
                ValidationErrorKind::ExpectedStringOrEnvvar {
                    envvar: TEST_DATABASE_URL_ENVVAR.to_string(),
                },
            ));
        }
        let shadow_name = shadow_string.as_deref().and_then(connection::database_name);
        if shadow_name.is_none() {
            errors.push(ValidationError::new(
                "shadowConnectionString",
                ValidationErrorKind::ShadowDatabaseNameMissing,
            ));
        }
        (shadow_string, shadow_name)
    } else {
        (None, None)
    };

    let database_owner = match settings.database_owner.as_ref() {
        Some(Value::String(owner)) => Some(owner.clone()),
        Some(_) => {
            errors.push(ValidationError::new(
                "databaseOwner",
                ValidationErrorKind::ExpectedString,
            ));
            None
        }
        None => connection_string
            .as_deref()
            .and_then(connection::connection_user)
            .or_else(|| database_name.clone()),
    };

    let migrations_folder = match settings.migrations_folder.as_ref() {
        Some(Value::String(folder)) => PathBuf::from(folder),
        Some(_) => {
            errors.push(ValidationError::new(
                "migrationsFolder",
                ValidationErrorKind::ExpectedString,
            ));
            PathBuf::from(DEFAULT_MIGRATIONS_FOLDER)
        }
        None => PathBuf::from(DEFAULT_MIGRATIONS_FOLDER),
    };

    let placeholders = resolve_placeholders(settings.placeholders.as_ref(), env, &mut errors);
    let pg_settings = resolve_pg_settings(settings.pg_settings.as_ref(), &mut errors);

    let before_reset =
        normalize_actions("beforeReset", settings.before_reset.as_ref(), &mut errors);
    let after_reset = normalize_actions("afterReset", settings.after_reset.as_ref(), &mut errors);
    let before_all_migrations = normalize_actions(
        "beforeAllMigrations",
        settings.before_all_migrations.as_ref(),
        &mut errors,
    );
    let after_all_migrations = normalize_actions(
        "afterAllMigrations",
        settings.after_all_migrations.as_ref(),
        &mut errors,
    );
    let before_current = normalize_actions(
        "beforeCurrent",
        settings.before_current.as_ref(),
        &mut errors,
    );
    let after_current = normalize_actions(
        "afterCurrent",
        settings.after_current.as_ref(),
        &mut errors,
    );

    for key in settings.unknown.keys() {
        errors.push(ValidationError::new(
            key,
            ValidationErrorKind::UnknownSetting,
        ));
    }

    match (connection_string, database_name, database_owner) {
        (Some(connection_string), Some(database_name), Some(database_owner))
            if errors.is_empty() =>
        {
            debug!("settings validated for database '{}'", database_name);
            Ok(ParsedSettings {
                connection_string,
                root_connection_string,
                database_name,
                database_owner,
                migrations_folder,
                shadow_connection_string,
                shadow_database_name,
                placeholders,
                pg_settings,
                before_reset,
                after_reset,
                before_all_migrations,
                after_all_migrations,
                before_current,
                after_current,
            })
        }
        _ => {
            debug!("settings validation failed with {} errors", errors.len());
            Err(SettingsError::new(errors))
        }
    }
}

/// A string-typed setting value, or the named environment variable.
///
/// A present but non-string value falls through to the environment, matching
/// the loose-input philosophy: the caller reports the miss in whatever terms
/// suit the setting.
fn resolve_with_envvar(
    raw: Option<&Value>,
    envvar: &str,
    env: &dyn Environment,
) -> Option<String> {
    match raw {
        Some(Value::String(value)) => Some(value.clone()),
        _ => env.var(envvar),
    }
}

fn resolve_placeholders(
    raw: Option<&Value>,
    env: &dyn Environment,
    errors: &mut Vec<ValidationError>,
) -> IndexMap<String, String> {
    let mut resolved = IndexMap::new();
    let map = match raw {
        None | Some(Value::Null) => return resolved,
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.push(ValidationError::new(
                "placeholders",
                ValidationErrorKind::ExpectedObject,
            ));
            return resolved;
        }
    };

    let key_pattern = Regex::new(r"^:[A-Z][A-Z0-9_]*$").unwrap();
    for (key, value) in map {
        if !key_pattern.is_match(key) {
            errors.push(ValidationError::new(
                "placeholders",
                ValidationErrorKind::InvalidPlaceholderKey { key: key.clone() },
            ));
            continue;
        }
        if RESERVED_PLACEHOLDERS.contains(&key.as_str()) {
            errors.push(ValidationError::new(
                "placeholders",
                ValidationErrorKind::ReservedPlaceholder { key: key.clone() },
            ));
            continue;
        }
        let Value::String(text) = value else {
            errors.push(ValidationError::new(
                "placeholders",
                ValidationErrorKind::ExpectedPlaceholderString { key: key.clone() },
            ));
            continue;
        };
        if text == "!ENV" {
            let envvar = key.trim_start_matches(':').to_string();
            match env.var(&envvar) {
                Some(from_env) => {
                    resolved.insert(key.clone(), from_env);
                }
                None => errors.push(ValidationError::new(
                    "placeholders",
                    ValidationErrorKind::PlaceholderEnvvarMissing {
                        key: key.clone(),
                        envvar,
                    },
                )),
            }
        } else {
            resolved.insert(key.clone(), text.clone());
        }
    }
    resolved
}

fn resolve_pg_settings(
    raw: Option<&Value>,
    errors: &mut Vec<ValidationError>,
) -> IndexMap<String, String> {
    let mut resolved = IndexMap::new();
    let map = match raw {
        None | Some(Value::Null) => return resolved,
        Some(Value::Object(map)) => map,
        Some(_) => {
            errors.push(ValidationError::new(
                "pgSettings",
                ValidationErrorKind::ExpectedObject,
            ));
            return resolved;
        }
    };

    for (key, value) in map {
        match value {
            Value::String(text) => {
                resolved.insert(key.clone(), text.clone());
            }
            Value::Number(number) => {
                resolved.insert(key.clone(), number.to_string());
            }
            _ => errors.push(ValidationError::new(
                "pgSettings",
                ValidationErrorKind::InvalidPgSetting { key: key.clone() },
            )),
        }
    }
    resolved
}
