//! Configuration system for hookflow.
//!
//! Uses `figment` for layered configuration: defaults -> user config file ->
//! workspace config file -> environment -> CLI overrides. Configuration is
//! loaded from `~/.config/hookflow/config.toml` and/or
//! `.hookflow/config.toml` in the workspace directory.

use crate::error::ConfigError;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Directory under the workspace holding hookflow state.
pub const WORKSPACE_DIR: &str = ".hookflow";
/// Prefix of environment overrides, e.g. `HOOKFLOW_DEFAULT_SHELL=bash`.
pub const ENV_PREFIX: &str = "HOOKFLOW_";

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HookflowConfig {
    /// Where workflow files live, relative to the workspace unless absolute.
    pub workflow_dir: PathBuf,
    /// Where denial logs are written. Defaults to `.hookflow/logs`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    /// Local cache of remote actions. Defaults to `.hookflow/actions`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_cache_dir: Option<PathBuf>,
    /// Shell for steps that do not name one.
    pub default_shell: String,
    /// Timeout for steps that do not declare one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_step_timeout_secs: Option<u64>,
    /// Abort loading when any workflow file is invalid instead of skipping it.
    pub fail_on_invalid_workflow: bool,
}

impl Default for HookflowConfig {
    fn default() -> Self {
        Self {
            workflow_dir: PathBuf::from(WORKSPACE_DIR).join("workflows"),
            log_dir: None,
            action_cache_dir: None,
            default_shell: "sh".to_string(),
            default_step_timeout_secs: None,
            fail_on_invalid_workflow: false,
        }
    }
}

impl HookflowConfig {
    pub fn workflow_dir(&self, workspace: &Path) -> PathBuf {
        workspace.join(&self.workflow_dir)
    }

    pub fn log_dir(&self, workspace: &Path) -> PathBuf {
        match &self.log_dir {
            Some(dir) => workspace.join(dir),
            None => workspace.join(WORKSPACE_DIR).join("logs"),
        }
    }

    pub fn action_cache_dir(&self, workspace: &Path) -> PathBuf {
        match &self.action_cache_dir {
            Some(dir) => workspace.join(dir),
            None => workspace.join(WORKSPACE_DIR).join("actions"),
        }
    }

    pub fn default_step_timeout(&self) -> Option<Duration> {
        self.default_step_timeout_secs.map(Duration::from_secs)
    }

    /// Human-readable warnings about suspicious settings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.default_shell.trim().is_empty() {
            warnings.push("default_shell is empty; steps without 'shell' will fail to start".to_string());
        }
        if self.default_step_timeout_secs == Some(0) {
            warnings.push("default_step_timeout_secs is 0; every step will time out immediately".to_string());
        }
        if self.workflow_dir.as_os_str().is_empty() {
            warnings.push("workflow_dir is empty; workflows will be searched in the workspace root".to_string());
        }
        warnings
    }

    /// Serialize as TOML, e.g. for `config init`.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            message: e.to_string(),
        })
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "hookflow", "hookflow")
}

/// `~/.config/hookflow/config.toml` (or the platform equivalent).
pub fn user_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join("config.toml"))
}

/// `<workspace>/.hookflow/config.toml`.
pub fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(WORKSPACE_DIR).join("config.toml")
}

/// Load configuration from all layers.
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&HookflowConfig>,
) -> Result<HookflowConfig, ConfigError> {
    let mut figment = Figment::from(Serialized::defaults(HookflowConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // HOOKFLOW_DEFAULT_SHELL, HOOKFLOW_WORKFLOW_DIR, ...
    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment
        .extract()
        .map_err(|e| ConfigError::Extract(Box::new(e)))
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|path| path.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}
