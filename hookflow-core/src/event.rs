//! Incoming events: what the agent (or git) just did.
//!
//! An event carries at most one of each sub-record. The caller builds it and
//! the core only reads it.

use crate::expression::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A single event to be matched against workflow triggers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<HookEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<CommitEvent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push: Option<PushEvent>,
    #[serde(default)]
    pub cwd: String,
    /// ISO-8601 timestamp.
    #[serde(default)]
    pub timestamp: String,
}

/// A host lifecycle hook (e.g. `PreToolUse`), optionally about a tool call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    #[serde(rename = "type")]
    pub hook_type: String,
    #[serde(default)]
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolEvent>,
}

/// A tool invocation by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolEvent {
    pub name: String,
    #[serde(default)]
    pub args: IndexMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<String>,
}

impl ToolEvent {
    /// The string form of an argument: strings as-is, other JSON as text.
    pub fn arg_string(&self, name: &str) -> Option<String> {
        self.args.get(name).map(|value| match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}

/// A file touched by the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEvent {
    pub path: String,
    /// e.g. `create`, `edit`, `delete`.
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitEvent {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub files: Vec<CommitFile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitFile {
    pub path: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    #[serde(default)]
    pub before: String,
    #[serde(default)]
    pub after: String,
}

impl Event {
    /// Names of the populated sub-records, in declaration order.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        if self.hook.is_some() {
            kinds.push("hook");
        }
        if self.tool.is_some() {
            kinds.push("tool");
        }
        if self.file.is_some() {
            kinds.push("file");
        }
        if self.commit.is_some() {
            kinds.push("commit");
        }
        if self.push.is_some() {
            kinds.push("push");
        }
        kinds
    }

    /// The expression value bound to the `event` root.
    pub fn to_value(&self) -> Value {
        match serde_json::to_value(self) {
            Ok(json) => Value::from(json),
            Err(_) => Value::Null,
        }
    }

    /// Parse an event from its JSON form.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_hook_event_with_tool() {
        let event = Event::from_json(
            r#"{
                "hook": {"type": "PreToolUse", "cwd": "/repo",
                         "tool": {"name": "Bash", "args": {"command": "ls"}, "hookType": "PreToolUse"}},
                "cwd": "/repo",
                "timestamp": "2026-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();
        let hook = event.hook.as_ref().unwrap();
        assert_eq!(hook.hook_type, "PreToolUse");
        assert_eq!(hook.tool.as_ref().unwrap().name, "Bash");
        assert_eq!(event.kinds(), vec!["hook"]);
    }

    #[test]
    fn test_push_ref_field_name() {
        let event = Event::from_json(r#"{"push": {"ref": "refs/heads/main"}}"#).unwrap();
        assert_eq!(event.push.unwrap().git_ref, "refs/heads/main");
    }

    #[test]
    fn test_arg_string() {
        let tool = ToolEvent {
            name: "Write".into(),
            args: [
                ("file_path".to_string(), json!("a.rs")),
                ("limit".to_string(), json!(10)),
            ]
            .into_iter()
            .collect(),
            hook_type: None,
        };
        assert_eq!(tool.arg_string("file_path").as_deref(), Some("a.rs"));
        assert_eq!(tool.arg_string("limit").as_deref(), Some("10"));
        assert_eq!(tool.arg_string("missing"), None);
    }

    #[test]
    fn test_to_value_exposes_camel_case_fields() {
        let event = Event {
            tool: Some(ToolEvent {
                name: "Edit".into(),
                args: IndexMap::new(),
                hook_type: Some("PostToolUse".into()),
            }),
            commit: Some(CommitEvent {
                files: vec![CommitFile {
                    path: "main.go".into(),
                    status: "modified".into(),
                }],
                ..Default::default()
            }),
            ..Default::default()
        };
        let value = event.to_value();
        assert_eq!(value.member("tool").member("hookType"), Value::from("PostToolUse"));
        assert_eq!(
            value.member("commit").member("files").index(&Value::Int(0)).member("path"),
            Value::from("main.go")
        );
        assert_eq!(value.member("push"), Value::Null);
    }
}
