//! Migration lifecycle actions.
//!
//! Hook settings (`afterReset`, `afterAllMigrations`, ...) accept a loose
//! grammar: a bare string as shorthand for running a SQL file, a tagged
//! action object, or a list mixing both. [`normalize_actions`] turns whatever
//! the user wrote into a uniform [`ActionList`] without reordering it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ValidationError, ValidationErrorKind};

/// A single unit of work attached to a migration lifecycle hook.
///
/// The wire format tags variants with the `_` key:
/// `{"_": "sql", "file": "promote.sql"}` or
/// `{"_": "command", "command": "pg_dump --schema-only"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "_", rename_all = "lowercase")]
pub enum Action {
    /// Run a SQL file.
    Sql {
        /// Path to the SQL file, relative to the migrations folder.
        file: String,
        /// Restrict the action to the shadow database (`true`) or the main
        /// database (`false`); unset runs against both.
        #[serde(skip_serializing_if = "Option::is_none")]
        shadow: Option<bool>,
    },
    /// Run a shell command.
    Command {
        /// The command line to execute.
        command: String,
        /// Restrict the action to the shadow database (`true`) or the main
        /// database (`false`); unset runs against both.
        #[serde(skip_serializing_if = "Option::is_none")]
        shadow: Option<bool>,
    },
}

impl Action {
    /// Create a SQL-file action with no shadow restriction.
    pub fn sql(file: impl Into<String>) -> Self {
        Self::Sql {
            file: file.into(),
            shadow: None,
        }
    }

    /// Create a shell-command action with no shadow restriction.
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            shadow: None,
        }
    }

    /// Restrict the action to the shadow (`true`) or main (`false`) database.
    pub fn with_shadow(mut self, shadow: bool) -> Self {
        match &mut self {
            Self::Sql { shadow: s, .. } | Self::Command { shadow: s, .. } => *s = Some(shadow),
        }
        self
    }

    /// The shadow restriction, if any.
    pub fn shadow(&self) -> Option<bool> {
        match self {
            Self::Sql { shadow, .. } | Self::Command { shadow, .. } => *shadow,
        }
    }

    /// Whether this action runs when targeting the given database.
    ///
    /// `shadow` is `true` when the executor is working on the shadow
    /// database. Unrestricted actions run against both databases.
    pub fn applies_to(&self, shadow: bool) -> bool {
        match self.shadow() {
            Some(restriction) => restriction == shadow,
            None => true,
        }
    }
}

/// Ordered list of actions attached to one lifecycle hook.
pub type ActionList = Vec<Action>;

/// Normalize a hook setting's raw value into an [`ActionList`].
///
/// Accepts nothing (absent or `null`), a single item, or a list; items may be
/// bare strings (SQL shorthand) or tagged action objects. Bad items are
/// reported against `setting` and skipped; good items keep their input order.
pub(crate) fn normalize_actions(
    setting: &str,
    raw: Option<&Value>,
    errors: &mut Vec<ValidationError>,
) -> ActionList {
    let items: Vec<&Value> = match raw {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().collect(),
        Some(single) => vec![single],
    };

    let mut actions = ActionList::new();
    for item in items {
        match normalize_item(item) {
            Ok(action) => actions.push(action),
            Err(kind) => errors.push(ValidationError::new(setting, kind)),
        }
    }
    actions
}

fn normalize_item(item: &Value) -> Result<Action, ValidationErrorKind> {
    match item {
        Value::String(file) => Ok(Action::sql(file)),
        Value::Object(_) => serde_json::from_value(item.clone())
            .map_err(|e| ValidationErrorKind::InvalidActionSpec {
                reason: e.to_string(),
            }),
        other => Err(ValidationErrorKind::ActionNotStringOrSpec {
            found: other.to_string(),
        }),
    }
}
