//! Trigger matching: does a workflow's `on:` block select an event?
//!
//! Kinds are OR'd; fields inside one kind are AND'd. Matching is a pure
//! predicate. Missing or malformed event fields simply fail to match.

pub mod glob;

pub use glob::{match_glob, match_patterns};

use crate::event::{Event, ToolEvent};
use crate::workflow::types::{
    CommitTrigger, FileTrigger, HooksTrigger, PushTrigger, ToolTrigger, Triggers,
};

const BRANCH_PREFIX: &str = "refs/heads/";
const TAG_PREFIX: &str = "refs/tags/";

/// Whether any declared trigger kind matches the event.
/// A workflow with no triggers never matches.
pub fn matches(triggers: &Triggers, event: &Event) -> bool {
    if let Some(hooks) = &triggers.hooks {
        if match_hooks(hooks, event) {
            return true;
        }
    }
    if let Some(tool) = &triggers.tool {
        if match_tool(tool, event) {
            return true;
        }
    }
    if triggers.tools.iter().any(|tool| match_tool(tool, event)) {
        return true;
    }
    if let Some(file) = &triggers.file {
        if match_file(file, event) {
            return true;
        }
    }
    if let Some(commit) = &triggers.commit {
        if match_commit(commit, event) {
            return true;
        }
    }
    if let Some(push) = &triggers.push {
        if match_push(push, event) {
            return true;
        }
    }
    false
}

pub fn match_hooks(trigger: &HooksTrigger, event: &Event) -> bool {
    let Some(hook) = &event.hook else {
        return false;
    };
    if !trigger.types.is_empty() && !trigger.types.contains(&hook.hook_type) {
        return false;
    }
    if !trigger.tools.is_empty() {
        if let Some(tool) = &hook.tool {
            return trigger.tools.contains(&tool.name);
        }
    }
    true
}

pub fn match_tool(trigger: &ToolTrigger, event: &Event) -> bool {
    event
        .tool
        .as_ref()
        .is_some_and(|tool| match_tool_call(trigger, tool))
}

fn match_tool_call(trigger: &ToolTrigger, tool: &ToolEvent) -> bool {
    if trigger.name != tool.name {
        return false;
    }
    trigger.args.iter().all(|(name, pattern)| {
        tool.arg_string(name)
            .is_some_and(|value| match_glob(pattern, &value))
    })
}

pub fn match_file(trigger: &FileTrigger, event: &Event) -> bool {
    let Some(file) = &event.file else {
        return false;
    };
    if !trigger.types.is_empty() && !trigger.types.contains(&file.action) {
        return false;
    }
    path_selected(&trigger.paths, &trigger.paths_ignore, &file.path)
}

pub fn match_commit(trigger: &CommitTrigger, event: &Event) -> bool {
    let Some(commit) = &event.commit else {
        return false;
    };
    if trigger.paths.is_empty() && trigger.paths_ignore.is_empty() {
        return true;
    }
    commit
        .files
        .iter()
        .any(|file| path_selected(&trigger.paths, &trigger.paths_ignore, &file.path))
}

pub fn match_push(trigger: &PushTrigger, event: &Event) -> bool {
    let Some(push) = &event.push else {
        return false;
    };
    let branch = extract_branch(&push.git_ref);
    if !branch.is_empty() {
        if !trigger.branches.is_empty() && !match_patterns(&trigger.branches, branch) {
            return false;
        }
        if match_patterns(&trigger.branches_ignore, branch) {
            return false;
        }
    }
    let tag = extract_tag(&push.git_ref);
    if !tag.is_empty() {
        if !trigger.tags.is_empty() && !match_patterns(&trigger.tags, tag) {
            return false;
        }
        if match_patterns(&trigger.tags_ignore, tag) {
            return false;
        }
    }
    true
}

/// `paths` empty selects everything; `ignore` then vetoes.
fn path_selected(paths: &[String], ignore: &[String], path: &str) -> bool {
    (paths.is_empty() || match_patterns(paths, path)) && !match_patterns(ignore, path)
}

/// `refs/heads/<name>` -> `<name>`, otherwise empty.
pub fn extract_branch(git_ref: &str) -> &str {
    git_ref.strip_prefix(BRANCH_PREFIX).unwrap_or("")
}

/// `refs/tags/<name>` -> `<name>`, otherwise empty.
pub fn extract_tag(git_ref: &str) -> &str {
    git_ref.strip_prefix(TAG_PREFIX).unwrap_or("")
}
