//! Module path resolution
//!
//! Configured load paths are relative to the executable's directory unless
//! they contain the `{GrainLoadPath}` token and the `GrainLoadPath`
//! environment variable is set, in which case the token is substituted and a
//! relative result is anchored at the current directory instead.

use silo_config::defaults;
use silo_config::env::{effective_current_dir, EnvSource};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct PathResolver {
    exe_dir: PathBuf,
    env: Arc<dyn EnvSource>,
}

impl PathResolver {
    pub fn new(exe_dir: impl Into<PathBuf>, env: Arc<dyn EnvSource>) -> Self {
        Self {
            exe_dir: normalize(&exe_dir.into()),
            env,
        }
    }

    /// Anchor relative paths at the running executable's directory
    pub fn for_current_exe(env: Arc<dyn EnvSource>) -> Self {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| effective_current_dir(env.as_ref()));
        Self::new(exe_dir, env)
    }

    pub fn exe_dir(&self) -> &Path {
        &self.exe_dir
    }

    /// Expand and absolutize one configured path; never fails
    pub fn resolve(&self, configured: &str) -> PathBuf {
        let token = defaults::files::GRAIN_LOAD_PATH_TOKEN;

        if configured.contains(token) {
            if let Some(value) = self.env.non_empty_var(defaults::env::GRAIN_LOAD_PATH) {
                let substituted = PathBuf::from(configured.replace(token, &value));
                let resolved = if substituted.is_absolute() {
                    substituted
                } else {
                    effective_current_dir(self.env.as_ref()).join(substituted)
                };
                debug!(
                    "Resolved {} to {:?} via {}",
                    configured,
                    resolved,
                    defaults::env::GRAIN_LOAD_PATH
                );
                return normalize(&resolved);
            }
            // Token kept literally when the variable is unset
            debug!("{} unset, keeping token in {}", defaults::env::GRAIN_LOAD_PATH, configured);
        }

        normalize(&self.exe_dir.join(configured))
    }
}

/// Lexically fold `.` and `..` without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` at the root stays at the root
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use silo_config::env::MapEnv;

    fn resolver(env: MapEnv) -> PathResolver {
        PathResolver::new("/opt/silo/bin", Arc::new(env))
    }

    #[test]
    fn test_relative_path_anchors_at_exe_dir() {
        let resolver = resolver(MapEnv::new());
        assert_eq!(
            resolver.resolve("grains/hello.so"),
            PathBuf::from("/opt/silo/bin/grains/hello.so")
        );
        assert_eq!(
            resolver.resolve("../grains/./hello.so"),
            PathBuf::from("/opt/silo/grains/hello.so")
        );
    }

    #[test]
    fn test_absolute_path_kept() {
        let resolver = resolver(MapEnv::new());
        assert_eq!(resolver.resolve("/srv/grains/a.so"), PathBuf::from("/srv/grains/a.so"));
    }

    #[test]
    fn test_token_with_absolute_value() {
        let resolver = resolver(MapEnv::new().with_var("GrainLoadPath", "/data/modules"));
        assert_eq!(
            resolver.resolve("{GrainLoadPath}/hello/libhello.so"),
            PathBuf::from("/data/modules/hello/libhello.so")
        );
    }

    #[test]
    fn test_token_with_relative_value_uses_current_dir() {
        let env = MapEnv::new()
            .with_var("GrainLoadPath", "modules")
            .with_current_dir("/work");
        let resolver = resolver(env);
        assert_eq!(
            resolver.resolve("{GrainLoadPath}/libhello.so"),
            PathBuf::from("/work/modules/libhello.so")
        );
    }

    #[test]
    fn test_token_unset_or_empty_stays_literal() {
        for env in [MapEnv::new(), MapEnv::new().with_var("GrainLoadPath", "")] {
            let resolver = resolver(env);
            assert_eq!(
                resolver.resolve("{GrainLoadPath}/libhello.so"),
                PathBuf::from("/opt/silo/bin/{GrainLoadPath}/libhello.so")
            );
        }
    }

    #[test]
    fn test_normalize_parent_at_root() {
        assert_eq!(normalize(Path::new("/../a")), PathBuf::from("/a"));
        assert_eq!(normalize(Path::new("a/../../b")), PathBuf::from("../b"));
    }

    proptest! {
        #[test]
        fn prop_resolved_paths_are_absolute(
            segments in prop::collection::vec("[a-z][a-z0-9_]{0,7}", 1..5),
            use_token in any::<bool>(),
            token_value in prop::option::of("[a-z]{1,6}"),
        ) {
            let mut env = MapEnv::new().with_current_dir("/cwd");
            if let Some(value) = &token_value {
                env = env.with_var("GrainLoadPath", value.clone());
            }
            let resolver = resolver(env);

            let mut configured = segments.join("/");
            if use_token {
                configured = format!("{{GrainLoadPath}}/{}", configured);
            }

            let resolved = resolver.resolve(&configured);
            prop_assert!(resolved.is_absolute());
            prop_assert!(resolved.ends_with(segments.join("/")));

            let anchor = match (use_token, &token_value) {
                (true, Some(value)) => PathBuf::from("/cwd").join(value),
                _ => PathBuf::from("/opt/silo/bin"),
            };
            prop_assert!(resolved.starts_with(&anchor));
        }
    }
}
