//! Environment variable access for settings resolution.
//!
//! Resolution consults the environment for fallback values (`DATABASE_URL`
//! and friends) and for `!ENV` placeholders. The [`Environment`] trait keeps
//! that dependency behind a seam so tests and hermetic callers can substitute
//! a fixed map for the process environment.

use std::collections::HashMap;

/// Read-only access to environment variables.
pub trait Environment {
    /// Look up a variable, returning `None` when it is unset.
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnvironment;

impl Environment for SystemEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// A fixed in-memory environment.
///
/// # Example
///
/// ```rust,ignore
/// let env = MapEnvironment::new().with("DATABASE_URL", "postgres://localhost/app");
/// assert_eq!(env.var("DATABASE_URL").as_deref(), Some("postgres://localhost/app"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MapEnvironment {
    vars: HashMap<String, String>,
}

impl MapEnvironment {
    /// Create an empty environment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable, returning `self` for chaining.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }
}

impl Environment for MapEnvironment {
    fn var(&self, name: &str) -> Option<String> {
        self.vars.get(name).cloned()
    }
}
