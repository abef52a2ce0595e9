//! Environment access
//!
//! Everything that reads process environment goes through [`EnvSource`] so
//! that path resolution, container detection and config layering can be
//! exercised against an in-memory environment.

use std::collections::HashMap;
use std::path::PathBuf;

/// Read-only view of environment variables
pub trait EnvSource: Send + Sync {
    /// Value of a single variable
    fn var(&self, key: &str) -> Option<String>;

    /// All variables, used for prefix-filtered config layering
    fn vars(&self) -> HashMap<String, String>;

    /// Explicit current-directory override; `None` means "use the process
    /// working directory"
    fn current_dir(&self) -> Option<PathBuf> {
        None
    }

    /// Value of a variable, treating empty strings as unset
    fn non_empty_var(&self, key: &str) -> Option<String> {
        self.var(key).filter(|value| !value.is_empty())
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }

    fn vars(&self) -> HashMap<String, String> {
        std::env::vars().collect()
    }
}

/// Fixed environment, mostly for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct MapEnv {
    vars: HashMap<String, String>,
    current_dir: Option<PathBuf>,
}

impl MapEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a variable
    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    /// Override the current directory
    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }
}

impl EnvSource for MapEnv {
    fn var(&self, key: &str) -> Option<String> {
        self.vars.get(key).cloned()
    }

    fn vars(&self) -> HashMap<String, String> {
        self.vars.clone()
    }

    fn current_dir(&self) -> Option<PathBuf> {
        self.current_dir.clone()
    }
}

/// Current directory: the override if present, else the process cwd
pub fn effective_current_dir(env: &dyn EnvSource) -> PathBuf {
    env.current_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_env_empty_values_are_unset() {
        let env = MapEnv::new().with_var("A", "").with_var("B", "x");
        assert_eq!(env.var("A").as_deref(), Some(""));
        assert_eq!(env.non_empty_var("A"), None);
        assert_eq!(env.non_empty_var("B").as_deref(), Some("x"));
        assert_eq!(env.non_empty_var("C"), None);
    }

    #[test]
    fn test_current_dir_override_wins() {
        let env = MapEnv::new().with_current_dir("/srv/silo");
        assert_eq!(effective_current_dir(&env), PathBuf::from("/srv/silo"));
    }
}
