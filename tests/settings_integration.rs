//! Integration tests for settings resolution.
//!
//! Exercises the public surface end to end: documents go in as JSON or TOML,
//! resolution runs against a fixed [`MapEnvironment`], and the resolved
//! structure (or the aggregated error report) comes out.

use pretty_assertions::assert_eq;

use weir_settings::{
    Action, MapEnvironment, ParsedSettings, Settings, parse_settings, parse_settings_with_env,
};

const EXAMPLE_CONNECTION: &str = "postgres://localhost:5432/dbname?ssl=1";

fn settings_from_json(doc: &str) -> Settings {
    serde_json::from_str(doc).expect("Failed to parse settings document")
}

async fn resolve(settings: &Settings, shadow: bool, env: &MapEnvironment) -> ParsedSettings {
    parse_settings_with_env(settings, shadow, env)
        .await
        .expect("Failed to resolve settings")
}

/// Test that a minimal valid config resolves with all defaults applied.
#[tokio::test]
async fn test_parses_basic_config() {
    let settings = settings_from_json(&format!(
        r#"{{ "connectionString": "{}" }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = resolve(&settings, false, &MapEnvironment::new()).await;

    assert_eq!(parsed.connection_string, EXAMPLE_CONNECTION);
    assert_eq!(parsed.database_name, "dbname");
    assert_eq!(parsed.database_owner, "dbname");
    assert_eq!(parsed.root_connection_string, "template1");
    assert_eq!(parsed.migrations_folder.to_str(), Some("./migrations"));
    assert_eq!(parsed.shadow_connection_string, None);
    assert_eq!(parsed.shadow_database_name, None);
    assert!(parsed.placeholders.is_empty());
    assert!(parsed.pg_settings.is_empty());
    assert!(parsed.before_reset.is_empty());
    assert!(parsed.after_reset.is_empty());
    assert!(parsed.before_all_migrations.is_empty());
    assert!(parsed.after_all_migrations.is_empty());
    assert!(parsed.before_current.is_empty());
    assert!(parsed.after_current.is_empty());
}

/// Test that the process-environment entry point accepts an explicit
/// connection string.
#[tokio::test]
async fn test_parse_settings_with_process_environment() {
    let settings = settings_from_json(&format!(
        r#"{{ "connectionString": "{}" }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = parse_settings(&settings, false)
        .await
        .expect("Failed to resolve settings");
    assert_eq!(parsed.connection_string, EXAMPLE_CONNECTION);
    assert_eq!(parsed.database_name, "dbname");
}

/// Test that a missing connection string is reported as exactly one error.
#[tokio::test]
async fn test_errors_when_no_connection_string() {
    let settings = settings_from_json("{}");
    let err = parse_settings_with_env(&settings, false, &MapEnvironment::new())
        .await
        .expect_err("resolution should fail without a connection string");

    assert_eq!(err.count(), 1);
    assert_eq!(
        err.to_string(),
        "Errors occurred during settings validation:\n\
         - Setting 'connectionString': Expected a string, or for DATABASE_URL envvar to be set"
    );
}

/// Test that `DATABASE_URL` stands in for a missing connection string.
#[tokio::test]
async fn test_connection_string_from_envvar() {
    let settings = settings_from_json("{}");
    let env = MapEnvironment::new().with("DATABASE_URL", EXAMPLE_CONNECTION);
    let parsed = resolve(&settings, false, &env).await;
    assert_eq!(parsed.connection_string, EXAMPLE_CONNECTION);
    assert_eq!(parsed.database_name, "dbname");
}

/// Test that a fully absent shadow config reports both shadow problems in
/// one pass.
#[tokio::test]
async fn test_errors_when_shadow_config_missing() {
    let settings = settings_from_json(&format!(
        r#"{{ "connectionString": "{}" }}"#,
        EXAMPLE_CONNECTION
    ));
    let err = parse_settings_with_env(&settings, true, &MapEnvironment::new())
        .await
        .expect_err("resolution should fail without a shadow connection string");

    assert_eq!(err.count(), 2);
    assert_eq!(
        err.to_string(),
        "Errors occurred during settings validation:\n\
         - Setting 'shadowConnectionString': Expected a string, or for TEST_DATABASE_URL envvar to be set\n\
         - Setting 'shadowConnectionString': Could not determine the shadow database name, please ensure shadowConnectionString includes the database name."
    );
}

/// Test that an explicit shadow connection string resolves with its database
/// name.
#[tokio::test]
async fn test_shadow_config_resolves() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "shadowConnectionString": "postgres://localhost:5432/dbname_shadow"
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = resolve(&settings, true, &MapEnvironment::new()).await;
    assert_eq!(
        parsed.shadow_connection_string.as_deref(),
        Some("postgres://localhost:5432/dbname_shadow")
    );
    assert_eq!(parsed.shadow_database_name.as_deref(), Some("dbname_shadow"));
}

/// Test that `TEST_DATABASE_URL` stands in for a missing shadow connection
/// string.
#[tokio::test]
async fn test_shadow_config_from_envvar() {
    let settings = settings_from_json(&format!(
        r#"{{ "connectionString": "{}" }}"#,
        EXAMPLE_CONNECTION
    ));
    let env = MapEnvironment::new().with(
        "TEST_DATABASE_URL",
        "postgres://localhost:5432/dbname_shadow",
    );
    let parsed = resolve(&settings, true, &env).await;
    assert_eq!(
        parsed.shadow_connection_string.as_deref(),
        Some("postgres://localhost:5432/dbname_shadow")
    );
    assert_eq!(parsed.shadow_database_name.as_deref(), Some("dbname_shadow"));
}

/// Test that bare strings are shorthand for SQL actions.
#[tokio::test]
async fn test_string_actions_become_sql_actions() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "afterReset": "foo.sql",
            "afterAllMigrations": ["bar.sql", "baz.sql"]
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = resolve(&settings, false, &MapEnvironment::new()).await;
    assert_eq!(parsed.after_reset, vec![Action::sql("foo.sql")]);
    assert_eq!(
        parsed.after_all_migrations,
        vec![Action::sql("bar.sql"), Action::sql("baz.sql")]
    );
}

/// Test that tagged SQL action specs resolve, including the shadow flag.
#[tokio::test]
async fn test_sql_action_specs() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "afterReset": {{"_": "sql", "file": "foo.sql"}},
            "afterCurrent": [{{"_": "sql", "file": "bar.sql", "shadow": true}}]
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = resolve(&settings, false, &MapEnvironment::new()).await;
    assert_eq!(parsed.after_reset, vec![Action::sql("foo.sql")]);
    assert_eq!(
        parsed.after_current,
        vec![Action::sql("bar.sql").with_shadow(true)]
    );
}

/// Test that command action specs resolve.
#[tokio::test]
async fn test_command_action_specs() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "afterAllMigrations": [
                {{"_": "command", "command": "pg_dump --schema-only"}},
                {{"_": "command", "command": "echo migrations-complete"}}
            ]
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = resolve(&settings, false, &MapEnvironment::new()).await;
    assert_eq!(
        parsed.after_all_migrations,
        vec![
            Action::command("pg_dump --schema-only"),
            Action::command("echo migrations-complete"),
        ]
    );
}

/// Test that mixed string/spec lists keep their exact input order.
#[tokio::test]
async fn test_mixed_actions_preserve_order() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "afterReset": [
                "foo.sql",
                {{"_": "sql", "file": "bar.sql"}},
                {{"_": "command", "command": "pg_dump --schema-only"}},
                {{"_": "command", "command": "echo done"}}
            ]
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let parsed = resolve(&settings, false, &MapEnvironment::new()).await;
    assert_eq!(
        parsed.after_reset,
        vec![
            Action::sql("foo.sql"),
            Action::sql("bar.sql"),
            Action::command("pg_dump --schema-only"),
            Action::command("echo done"),
        ]
    );
}

/// Test that a TOML document resolves the same way a JSON one does.
#[tokio::test]
async fn test_settings_from_toml() {
    let settings: Settings = toml::from_str(
        r#"
            connectionString = "postgres://localhost:5432/dbname?ssl=1"
            migrationsFolder = "db/migrations"

            afterReset = [
                "install-extensions.sql",
                { _ = "command", command = "echo reset-complete" },
            ]

            [placeholders]
            ":BATCH_SIZE" = "100"

            [pgSettings]
            search_path = "app_public,public"
            statement_timeout = 3000
        "#,
    )
    .expect("Failed to parse settings document");

    let parsed = resolve(&settings, false, &MapEnvironment::new()).await;
    assert_eq!(parsed.connection_string, EXAMPLE_CONNECTION);
    assert_eq!(parsed.migrations_folder.to_str(), Some("db/migrations"));
    assert_eq!(
        parsed.after_reset,
        vec![
            Action::sql("install-extensions.sql"),
            Action::command("echo reset-complete"),
        ]
    );
    assert_eq!(
        parsed.placeholders.get(":BATCH_SIZE").map(String::as_str),
        Some("100")
    );
    assert_eq!(
        parsed.pg_settings.get("statement_timeout").map(String::as_str),
        Some("3000")
    );
}

/// Test that unrecognized keys are rejected rather than silently dropped.
#[tokio::test]
async fn test_unknown_setting_rejected() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "connectionSting": "typo"
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let err = parse_settings_with_env(&settings, false, &MapEnvironment::new())
        .await
        .expect_err("resolution should reject unknown settings");
    assert_eq!(err.count(), 1);
    assert_eq!(
        err.to_string(),
        "Errors occurred during settings validation:\n\
         - Setting 'connectionSting': Not a recognized setting"
    );
}

/// Test that `!ENV` placeholders resolve from the environment.
#[tokio::test]
async fn test_placeholder_env_resolution() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "placeholders": {{ ":DEPLOY_ENV": "!ENV" }}
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let env = MapEnvironment::new().with("DEPLOY_ENV", "staging");
    let parsed = resolve(&settings, false, &env).await;
    assert_eq!(
        parsed.placeholders.get(":DEPLOY_ENV").map(String::as_str),
        Some("staging")
    );
}

/// Test that resolving an already-resolved config is a fixed point.
#[tokio::test]
async fn test_resolution_is_idempotent() {
    let settings = settings_from_json(&format!(
        r#"{{
            "connectionString": "{}",
            "databaseOwner": "app_owner",
            "migrationsFolder": "db/migrations",
            "afterReset": ["foo.sql", {{"_": "command", "command": "echo done"}}],
            "placeholders": {{ ":BATCH_SIZE": "100" }}
        }}"#,
        EXAMPLE_CONNECTION
    ));
    let env = MapEnvironment::new();
    let first = resolve(&settings, false, &env).await;

    let roundtrip = Settings {
        connection_string: Some(serde_json::Value::String(first.connection_string.clone())),
        database_owner: Some(serde_json::Value::String(first.database_owner.clone())),
        migrations_folder: first
            .migrations_folder
            .to_str()
            .map(|folder| serde_json::Value::String(folder.to_string())),
        after_reset: Some(serde_json::to_value(&first.after_reset).expect("serializable actions")),
        placeholders: Some(serde_json::to_value(&first.placeholders).expect("serializable map")),
        ..Settings::default()
    };
    let second = resolve(&roundtrip, false, &env).await;
    assert_eq!(first, second);
}

/// Test that independent problems are all reported in one pass.
#[tokio::test]
async fn test_aggregates_multiple_problems() {
    let settings = settings_from_json(
        r#"{
            "migrationsFolder": 42,
            "afterReset": [true],
            "pgSettings": { "jit": false }
        }"#,
    );
    let err = parse_settings_with_env(&settings, true, &MapEnvironment::new())
        .await
        .expect_err("resolution should aggregate every problem");

    assert_eq!(err.count(), 6);
    let report = err.to_string();
    assert!(report.starts_with("Errors occurred during settings validation:"));
    assert!(report.contains(
        "- Setting 'connectionString': Expected a string, or for DATABASE_URL envvar to be set"
    ));
    assert!(report.contains(
        "- Setting 'shadowConnectionString': Expected a string, or for TEST_DATABASE_URL envvar to be set"
    ));
    assert!(report.contains("- Setting 'migrationsFolder': Expected a string"));
    assert!(report.contains(
        "- Setting 'afterReset': Expected a string or an action spec, but found true"
    ));
    assert!(report.contains(
        "- Setting 'pgSettings': Expected a string or number for pgSettings key 'jit'"
    ));
}
