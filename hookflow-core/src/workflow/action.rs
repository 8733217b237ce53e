//! `uses:` action references, resolution and metadata.
//!
//! A reference is either a local directory (`./path`, `../path`) or a remote
//! bundle (`owner/repo[/path]@version`). Remote bundles are looked up in a
//! local cache; populating that cache is left to the operator.

use crate::error::ActionError;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const METADATA_FILES: [&str; 2] = ["action.yml", "action.yaml"];

/// A parsed `uses:` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReference {
    Local {
        path: PathBuf,
    },
    Remote {
        owner: String,
        repo: String,
        path: Option<String>,
        version: String,
    },
}

impl ActionReference {
    pub fn parse(uses: &str) -> Result<Self, ActionError> {
        let uses = uses.trim();
        let invalid = |reason: &str| ActionError::InvalidReference {
            reference: uses.to_string(),
            reason: reason.to_string(),
        };

        if uses.starts_with("./") || uses.starts_with("../") {
            return Ok(ActionReference::Local {
                path: PathBuf::from(uses),
            });
        }
        if uses.starts_with("docker://") {
            return Err(invalid("container actions are not supported"));
        }

        let Some((location, version)) = uses.rsplit_once('@') else {
            return Err(invalid("expected ./path or owner/repo[/path]@version"));
        };
        if version.is_empty() {
            return Err(invalid("missing version after '@'"));
        }
        let mut parts = location.splitn(3, '/');
        let owner = parts.next().unwrap_or_default();
        let repo = parts.next().unwrap_or_default();
        let path = parts.next();
        if owner.is_empty() || repo.is_empty() {
            return Err(invalid("expected owner/repo before '@'"));
        }
        if path.is_some_and(|p| p.is_empty() || p.split('/').any(|s| s.is_empty() || s == "..")) {
            return Err(invalid("malformed path inside repository"));
        }
        Ok(ActionReference::Remote {
            owner: owner.to_string(),
            repo: repo.to_string(),
            path: path.map(str::to_string),
            version: version.to_string(),
        })
    }

    pub fn is_local(&self) -> bool {
        matches!(self, ActionReference::Local { .. })
    }
}

impl fmt::Display for ActionReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionReference::Local { path } => write!(f, "{}", path.display()),
            ActionReference::Remote {
                owner,
                repo,
                path,
                version,
            } => match path {
                Some(path) => write!(f, "{owner}/{repo}/{path}@{version}"),
                None => write!(f, "{owner}/{repo}@{version}"),
            },
        }
    }
}

/// Maps a reference to the directory holding its `action.yml`.
pub trait ActionResolver: Send + Sync {
    fn resolve(&self, reference: &ActionReference) -> Result<PathBuf, ActionError>;
}

/// Resolves local references against the workspace and remote ones into
/// `<cache>/<owner>/<repo>/<version>[/<path>]`.
#[derive(Debug, Clone)]
pub struct CachedActionResolver {
    workspace: PathBuf,
    cache_dir: PathBuf,
}

impl CachedActionResolver {
    pub fn new(workspace: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            workspace: workspace.into(),
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

impl ActionResolver for CachedActionResolver {
    fn resolve(&self, reference: &ActionReference) -> Result<PathBuf, ActionError> {
        let dir = match reference {
            ActionReference::Local { path } => self.workspace.join(path),
            ActionReference::Remote {
                owner,
                repo,
                path,
                version,
            } => {
                let mut dir = self.cache_dir.join(owner).join(repo).join(version);
                if let Some(path) = path {
                    dir = dir.join(path);
                }
                dir
            }
        };
        if !dir.is_dir() {
            return Err(ActionError::NotFound {
                reference: reference.to_string(),
                path: dir,
            });
        }
        Ok(dir)
    }
}

/// Contents of `action.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionMetadata {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub inputs: IndexMap<String, ActionInput>,
    pub runs: ActionRuns,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionInput {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRuns {
    pub using: String,
    #[serde(default)]
    pub steps: Vec<CompositeStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositeStep {
    #[serde(default)]
    pub name: Option<String>,
    pub run: String,
    #[serde(default)]
    pub shell: Option<String>,
    #[serde(default)]
    pub env: IndexMap<String, String>,
    #[serde(default, alias = "working-directory", alias = "working_directory")]
    pub working_directory: Option<String>,
}

impl ActionMetadata {
    /// Read `action.yml` (or `action.yaml`) from `dir`.
    pub fn load(dir: &Path) -> Result<Self, ActionError> {
        let Some(path) = METADATA_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
        else {
            return Err(ActionError::MissingMetadata {
                path: dir.to_path_buf(),
            });
        };
        let text = std::fs::read_to_string(&path).map_err(|e| ActionError::Metadata {
            path: path.clone(),
            message: e.to_string(),
        })?;
        serde_yaml::from_str(&text).map_err(|e| ActionError::Metadata {
            path,
            message: e.to_string(),
        })
    }

    pub fn is_composite(&self) -> bool {
        self.runs.using == "composite"
    }

    /// Fail unless the action can be run locally.
    pub fn ensure_supported(&self) -> Result<(), ActionError> {
        if self.is_composite() {
            Ok(())
        } else {
            Err(ActionError::UnsupportedRuntime {
                using: self.runs.using.clone(),
            })
        }
    }

    /// `INPUT_<NAME>` variables from the step's `with:` map, falling back to
    /// declared defaults. Inputs not declared by the action pass through.
    pub fn input_env(
        &self,
        action: &str,
        with: &IndexMap<String, String>,
    ) -> Result<IndexMap<String, String>, ActionError> {
        let mut env = IndexMap::new();
        for (name, input) in &self.inputs {
            let value = match (with.get(name), &input.default) {
                (Some(value), _) => value.clone(),
                (None, Some(default)) => default.clone(),
                (None, None) if input.required => {
                    return Err(ActionError::MissingInput {
                        action: action.to_string(),
                        input: name.clone(),
                    });
                }
                (None, None) => String::new(),
            };
            env.insert(input_var(name), value);
        }
        for (name, value) in with {
            if !self.inputs.contains_key(name) {
                env.insert(input_var(name), value.clone());
            }
        }
        Ok(env)
    }
}

fn input_var(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect();
    format!("INPUT_{name}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_local() {
        assert_eq!(
            ActionReference::parse("./actions/lint").unwrap(),
            ActionReference::Local {
                path: PathBuf::from("./actions/lint")
            }
        );
        assert!(ActionReference::parse("../shared").unwrap().is_local());
    }

    #[test]
    fn test_parse_remote() {
        assert_eq!(
            ActionReference::parse("acme/checks@v2").unwrap(),
            ActionReference::Remote {
                owner: "acme".into(),
                repo: "checks".into(),
                path: None,
                version: "v2".into(),
            }
        );
        let nested = ActionReference::parse("acme/checks/lint/js@main").unwrap();
        assert_eq!(nested.to_string(), "acme/checks/lint/js@main");
    }

    #[test]
    fn test_parse_invalid() {
        for bad in ["acme", "acme/checks", "acme/checks@", "/abs/path", "@v1", "docker://alpine", "a/b/../c@v1"] {
            assert!(
                matches!(
                    ActionReference::parse(bad),
                    Err(ActionError::InvalidReference { .. })
                ),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_resolve_local_and_remote() {
        let workspace = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(workspace.path().join("actions/fmt")).unwrap();
        std::fs::create_dir_all(cache.path().join("acme/checks/v1/lint")).unwrap();
        let resolver = CachedActionResolver::new(workspace.path(), cache.path());

        let local = ActionReference::parse("./actions/fmt").unwrap();
        assert!(resolver.resolve(&local).unwrap().ends_with("actions/fmt"));

        let remote = ActionReference::parse("acme/checks/lint@v1").unwrap();
        assert_eq!(
            resolver.resolve(&remote).unwrap(),
            cache.path().join("acme/checks/v1/lint")
        );

        let missing = ActionReference::parse("acme/other@v1").unwrap();
        assert!(matches!(
            resolver.resolve(&missing),
            Err(ActionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_load_metadata() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ActionMetadata::load(dir.path()),
            Err(ActionError::MissingMetadata { .. })
        ));

        std::fs::write(
            dir.path().join("action.yaml"),
            r#"
name: greet
inputs:
  who:
    required: true
  punctuation:
    default: "!"
runs:
  using: composite
  steps:
    - run: echo "hello $INPUT_WHO$INPUT_PUNCTUATION"
      shell: sh
"#,
        )
        .unwrap();
        let meta = ActionMetadata::load(dir.path()).unwrap();
        assert_eq!(meta.name, "greet");
        assert!(meta.ensure_supported().is_ok());
        assert_eq!(meta.runs.steps.len(), 1);
    }

    #[test]
    fn test_unsupported_runtime() {
        let meta: ActionMetadata =
            serde_yaml::from_str("runs:\n  using: node20\n").unwrap();
        assert!(matches!(
            meta.ensure_supported(),
            Err(ActionError::UnsupportedRuntime { using }) if using == "node20"
        ));
    }

    #[test]
    fn test_input_env() {
        let meta: ActionMetadata = serde_yaml::from_str(
            "inputs:\n  who:\n    required: true\n  dry-run:\n    default: 'false'\nruns:\n  using: composite\n",
        )
        .unwrap();
        let mut with = IndexMap::new();
        with.insert("who".to_string(), "world".to_string());
        with.insert("extra".to_string(), "1".to_string());
        let env = meta.input_env("greet", &with).unwrap();
        assert_eq!(env.get("INPUT_WHO").map(String::as_str), Some("world"));
        assert_eq!(env.get("INPUT_DRY_RUN").map(String::as_str), Some("false"));
        assert_eq!(env.get("INPUT_EXTRA").map(String::as_str), Some("1"));

        let err = meta.input_env("greet", &IndexMap::new()).unwrap_err();
        assert!(matches!(err, ActionError::MissingInput { input, .. } if input == "who"));
    }
}
