//! Layered configuration loading
//!
//! Two configurations are built, both with config-crate:
//!
//! - **host** configuration: `ORLEANS_HOST_*` environment variables, then the
//!   command line. It only decides the environment name and content root.
//! - **app** configuration: `hostsettings.json`, `hostsettings.{env}.json`,
//!   `ORLEANS_HOST_APP_*` environment variables, then the command line.
//!
//! Later sources win. Keys are lower-cased on the way in and matched
//! case-insensitively on the way out (see [`crate::binding`]).

use crate::binding::{self, lowercase_keys};
use crate::defaults;
use crate::env::{effective_current_dir, EnvSource};
use crate::error::{ConfigError, Result};
use crate::options::{
    DashboardOption, GrainLoadOption, MultiClusterOption, ProviderConfig, SiloConfig,
};
use config_crate::{Config, ConfigBuilder, Environment, File, FileFormat};
use config_crate::builder::DefaultState;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefixes and file names used while layering
#[derive(Debug, Clone)]
pub struct ConfigLayerOptions {
    /// Environment prefix for host configuration (`ORLEANS_HOST_`)
    pub host_env_prefix: String,

    /// Environment prefix for app configuration (`ORLEANS_HOST_APP_`)
    pub app_env_prefix: String,

    /// JSON file prefix (`hostsettings`)
    pub config_file_prefix: String,
}

impl Default for ConfigLayerOptions {
    fn default() -> Self {
        Self {
            host_env_prefix: defaults::env::HOST_PREFIX.to_string(),
            app_env_prefix: defaults::env::APP_PREFIX.to_string(),
            config_file_prefix: defaults::files::CONFIG_FILE_PREFIX.to_string(),
        }
    }
}

/// One `key=value` override from the command line, key already in
/// config-crate path form (`orleans.siloconfig.clusterid`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineOverride {
    pub key: String,
    pub value: String,
}

/// Parse `--key=value`, `--key value`, `/key value` and `key=value`
/// arguments. `:` and `__` separate hierarchy levels.
pub fn parse_command_line(args: &[String]) -> Result<Vec<CommandLineOverride>> {
    let mut overrides = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        let (prefixed, body) = if let Some(rest) = arg.strip_prefix("--") {
            (true, rest)
        } else if let Some(rest) = arg.strip_prefix('/') {
            (true, rest)
        } else if arg.starts_with('-') {
            return Err(ConfigError::CommandLine {
                message: format!("single-dash switch '{}' is not supported", arg),
            });
        } else {
            (false, arg.as_str())
        };

        let (key, value) = match body.split_once('=') {
            Some((key, value)) => (key, value.to_string()),
            None if prefixed => match iter.next() {
                Some(value) => (body, value.clone()),
                None => {
                    return Err(ConfigError::CommandLine {
                        message: format!("missing value for '{}'", arg),
                    })
                }
            },
            None => {
                debug!("Ignoring command line argument without a value: {}", arg);
                continue;
            }
        };

        let key = normalize_key(key);
        if key.is_empty() {
            return Err(ConfigError::CommandLine {
                message: format!("empty key in '{}'", arg),
            });
        }
        overrides.push(CommandLineOverride { key, value });
    }

    Ok(overrides)
}

fn normalize_key(key: &str) -> String {
    key.replace("__", ":")
        .split(':')
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(".")
}

/// Fully layered configuration for one host process
#[derive(Debug, Clone)]
pub struct HostConfiguration {
    /// Hosting environment name (`Production` unless configured)
    pub environment: String,

    /// Directory the app configuration files were read from
    pub content_root: PathBuf,

    /// Merged app configuration, keys lower-cased
    pub app: Value,
}

impl HostConfiguration {
    /// Build host and app configuration from the command line and environment
    pub fn load(
        args: &[String],
        env: &dyn EnvSource,
        options: &ConfigLayerOptions,
    ) -> Result<Self> {
        let overrides = parse_command_line(args)?;

        let host = with_overrides(
            Config::builder().add_source(env_source(&options.host_env_prefix, env)),
            &overrides,
        )?
        .build()?
        .try_deserialize::<Value>()?;

        let environment = setting_string(&host, defaults::sections::ENVIRONMENT)
            .unwrap_or_else(|| defaults::files::DEFAULT_ENVIRONMENT.to_string());

        let current_dir = effective_current_dir(env);
        let content_root = match setting_string(&host, defaults::sections::CONTENT_ROOT) {
            Some(root) => current_dir.join(root),
            None => current_dir,
        };

        info!(
            "Loading configuration for environment '{}' from {:?}",
            environment, content_root
        );

        let mut builder = Config::builder();
        for file_name in [
            format!("{}.json", options.config_file_prefix),
            format!("{}.{}.json", options.config_file_prefix, environment),
        ] {
            let path = content_root.join(&file_name);
            if let Some(source) = json_file_source(&path)? {
                debug!("Adding configuration file {:?}", path);
                builder = builder.add_source(source);
            }
        }
        builder = builder.add_source(env_source(&options.app_env_prefix, env));

        let app = with_overrides(builder, &overrides)?
            .build()?
            .try_deserialize::<Value>()?;

        Ok(Self {
            environment,
            content_root,
            app,
        })
    }

    /// Configuration from an already merged tree
    pub fn from_value(
        environment: impl Into<String>,
        content_root: impl Into<PathBuf>,
        app: Value,
    ) -> Self {
        Self {
            environment: environment.into(),
            content_root: content_root.into(),
            app: lowercase_keys(app),
        }
    }

    /// Case-insensitive section lookup (`["Orleans", "SiloConfig"]`)
    pub fn section(&self, path: &[&str]) -> Option<&Value> {
        binding::lookup(&self.app, path)
    }

    /// Bind a section to typed options; missing sections yield defaults
    pub fn bind<T>(&self, path: &[&str]) -> Result<T>
    where
        T: Default + Serialize + DeserializeOwned,
    {
        binding::bind(self.section(path), &path.join(":"))
    }
}

fn env_source(prefix: &str, env: &dyn EnvSource) -> Environment {
    Environment::with_prefix(prefix.trim_end_matches('_'))
        .prefix_separator("_")
        .separator("__")
        .source(Some(env.vars().into_iter().collect()))
}

fn with_overrides(
    mut builder: ConfigBuilder<DefaultState>,
    overrides: &[CommandLineOverride],
) -> Result<ConfigBuilder<DefaultState>> {
    for entry in overrides {
        builder = builder.set_override(entry.key.as_str(), entry.value.as_str())?;
    }
    Ok(builder)
}

/// Optional JSON file, keys lower-cased so every layer merges on equal keys
fn json_file_source(
    path: &Path,
) -> Result<Option<File<config_crate::FileSourceString, FileFormat>>> {
    if !path.is_file() {
        return Ok(None);
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: Value = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    let normalized =
        serde_json::to_string(&lowercase_keys(parsed)).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(Some(File::from_str(&normalized, FileFormat::Json)))
}

fn setting_string(root: &Value, key: &str) -> Option<String> {
    binding::child(root, key)
        .and_then(|value| match value {
            Value::String(text) => Some(text.trim().to_string()),
            Value::Number(number) => Some(number.to_string()),
            _ => None,
        })
        .filter(|text| !text.is_empty())
}

/// Every typed section under `Orleans`, bound and validated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HostOptions {
    pub silo: SiloConfig,
    pub grain: GrainLoadOption,
    pub provider: ProviderConfig,
    pub dashboard: DashboardOption,
    pub multi_cluster: MultiClusterOption,
}

impl HostOptions {
    /// Bind all sections, apply the `MultiCluster` overlay, validate
    pub fn bind(configuration: &HostConfiguration) -> Result<Self> {
        use defaults::sections::*;

        let mut silo: SiloConfig = configuration.bind(&[ROOT, SILO_CONFIG])?;
        let multi_cluster: MultiClusterOption = configuration.bind(&[ROOT, MULTI_CLUSTER])?;
        silo.apply_multi_cluster(&multi_cluster);
        silo.validate()?;

        Ok(Self {
            silo,
            grain: configuration.bind(&[ROOT, GRAIN_OPTION])?,
            provider: configuration.bind(&[ROOT, PROVIDER])?,
            dashboard: configuration.bind(&[ROOT, DASHBOARD])?,
            multi_cluster,
        })
    }
}
