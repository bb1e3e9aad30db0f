// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Part formatter
//!
//! Pure rendering of agent parts into chat text. An empty string means the
//! part has nothing to show.

use serde_json::Value;

use crate::agent::{Part, PartBody, ToolState, ToolStatus};
use crate::utils::truncate_chars;

/// Shell output longer than this is truncated
const MAX_SHELL_OUTPUT_CHARS: usize = 300;
/// Generic tool input is only shown when its JSON is shorter than this
const MAX_INLINE_INPUT_CHARS: usize = 100;

pub const REASONING_PREFIX: &str = "🤔 Thinking: ";

pub fn format_part(part: &Part, show_reasoning: bool) -> String {
    match &part.body {
        PartBody::Text { text } => text.clone(),
        PartBody::Reasoning { text } => format_reasoning(text, show_reasoning),
        PartBody::Tool { tool, state, .. } => format_tool(tool, state),
        PartBody::StepStart {} | PartBody::Snapshot {} | PartBody::Compaction {} => String::new(),
        PartBody::StepFinish { success, title } => {
            format_step_finish(success.unwrap_or(true), title.as_deref().unwrap_or(""))
        }
        PartBody::Agent { name } => {
            format!("🤖 Subagent: {}", name.as_deref().unwrap_or("unnamed"))
        }
        PartBody::Subtask {
            agent,
            description,
            prompt,
        } => format!(
            "🧩 Subtask ({}): {}",
            agent.as_deref().unwrap_or("agent"),
            description.as_deref().or(prompt.as_deref()).unwrap_or("")
        ),
        PartBody::Patch { hash, files } => {
            let files = if files.is_empty() {
                "no files".to_string()
            } else {
                files.join(", ")
            };
            format!("📦 Patch ({}): {}", hash.as_deref().unwrap_or("?"), files)
        }
        PartBody::Retry { attempt, error } => format!(
            "🔄 Retry (attempt {}): {}",
            attempt.map(|n| n.to_string()).unwrap_or_else(|| "?".to_string()),
            retry_message(error.as_ref())
        ),
        PartBody::File { filename, url } => format!(
            "📎 File: {}",
            filename
                .as_deref()
                .or(url.as_deref())
                .unwrap_or("unknown file")
        ),
        PartBody::Other { kind } => format!("📦 {kind}"),
    }
}

pub fn format_reasoning(text: &str, show_reasoning: bool) -> String {
    if show_reasoning {
        format!("{REASONING_PREFIX}{text}")
    } else {
        String::new()
    }
}

pub fn format_step_finish(success: bool, title: &str) -> String {
    if success {
        format!("✅ Step finished: {title}")
    } else {
        format!("❌ Step failed: {title}")
    }
}

fn retry_message(error: Option<&Value>) -> String {
    let Some(error) = error else {
        return String::new();
    };
    error
        .pointer("/data/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

fn tool_header(tool: &str, status: ToolStatus) -> String {
    match status {
        ToolStatus::Running => format!("🔧 Running tool: {tool}"),
        ToolStatus::Completed => format!("✅ Tool {tool} finished"),
        other => format!("🔧 Tool {tool} ({other})"),
    }
}

fn str_input<'a>(input: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| input.get(*key).and_then(Value::as_str))
        .filter(|s| !s.is_empty())
}

/// Tool parts: status header plus a tool-specific body. Pending calls render
/// nothing.
pub fn format_tool(tool: &str, state: &ToolState) -> String {
    if state.status == ToolStatus::Pending {
        return String::new();
    }

    let mut header = tool_header(tool, state.status);
    let input = &state.input;
    let mut body = String::new();

    match tool {
        "todowrite" if input.get("todos").is_some_and(Value::is_array) => {
            body = render_todos(input);
        }
        "edit" | "write" | "replace_file_content" | "multi_replace_file_content"
            if str_input(input, &["filePath", "TargetFile"]).is_some() =>
        {
            if let Some(file) = str_input(input, &["filePath", "TargetFile"]) {
                if !header.contains('(') {
                    header.push_str(&format!(" ({file})"));
                }
            }
            if let Some(diff) = state.metadata.get("diff").and_then(Value::as_str) {
                body = format!("\n```diff\n{diff}\n```");
            }
        }
        "bash" | "run_command" => {
            let command = str_input(input, &["command", "CommandLine"]);
            if let Some(command) = command {
                header.push_str(&format!("\n$ {command}"));
            }
            if let Some(output) = state.output.as_ref().filter(|o| !is_empty_output(o)) {
                body = render_shell_output(command.unwrap_or(""), output);
            }
        }
        _ => {
            let labelled = match tool {
                "webfetch" => str_input(input, &["url"]),
                "read" => str_input(input, &["filePath"]),
                "skill" => str_input(input, &["name"]),
                _ => None,
            };
            if let Some(label) = labelled {
                header.push_str(&format!(" ({label})"));
            }
            if !header.contains('(') {
                header.push_str(&generic_input_suffix(input));
            }
        }
    }

    header + &body
}

fn render_todos(input: &Value) -> String {
    let todos = input
        .get("todos")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let lines: Vec<String> = todos
        .iter()
        .map(|todo| {
            let mark = match todo.get("status").and_then(Value::as_str) {
                Some("completed") => "[x]",
                Some("in_progress") => "[/]",
                _ => "[ ]",
            };
            let content = todo.get("content").and_then(Value::as_str).unwrap_or("");
            format!("{mark} {content}")
        })
        .collect();
    format!("\n{}", lines.join("\n"))
}

fn is_empty_output(output: &Value) -> bool {
    match output {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn render_shell_output(command: &str, output: &Value) -> String {
    let text = match output {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    let command = command.trim().to_lowercase();
    let looks_like_diff = command.starts_with("diff")
        || command.starts_with("fc")
        || (output.is_string() && text.contains("diff --git"));
    if looks_like_diff {
        format!("\n```diff\n{text}\n```")
    } else {
        format!("\n{}", truncate_chars(&text, MAX_SHELL_OUTPUT_CHARS))
    }
}

/// ` (value)` for a single string field, ` {json}` for short inputs.
fn generic_input_suffix(input: &Value) -> String {
    let Some(map) = input.as_object() else {
        return String::new();
    };
    if map.len() == 1 {
        if let Some(Value::String(value)) = map.values().next() {
            return format!(" ({value})");
        }
    }
    if map.is_empty() {
        return String::new();
    }
    let json = input.to_string();
    if json.chars().count() < MAX_INLINE_INPUT_CHARS {
        format!(" {json}")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_part(tool: &str, state: Value) -> Part {
        Part::from_value(json!({"type": "tool", "callID": "c1", "tool": tool, "state": state}))
    }

    #[test]
    fn test_text_and_reasoning() {
        let text = Part::new(PartBody::Text {
            text: "hi".to_string(),
        });
        assert_eq!(format_part(&text, true), "hi");

        let reasoning = Part::new(PartBody::Reasoning {
            text: "hmm".to_string(),
        });
        assert_eq!(format_part(&reasoning, true), "🤔 Thinking: hmm");
        assert_eq!(format_part(&reasoning, false), "");
    }

    #[test]
    fn test_pending_tool_is_suppressed() {
        let part = tool_part("bash", json!({"status": "pending"}));
        assert_eq!(format_part(&part, true), "");
    }

    #[test]
    fn test_tool_headers() {
        let running = tool_part("grep", json!({"status": "running"}));
        assert_eq!(format_part(&running, true), "🔧 Running tool: grep");

        let failed = tool_part("grep", json!({"status": "error", "input": {"pattern": "x"}}));
        assert_eq!(format_part(&failed, true), "🔧 Tool grep (error)");
    }

    #[test]
    fn test_todowrite_checklist() {
        let part = tool_part(
            "todowrite",
            json!({"status": "completed", "input": {"todos": [
                {"content": "a", "status": "completed"},
                {"content": "b", "status": "in_progress"},
                {"content": "c", "status": "pending"}
            ]}}),
        );
        assert_eq!(
            format_part(&part, true),
            "✅ Tool todowrite finished\n[x] a\n[/] b\n[ ] c"
        );
    }

    #[test]
    fn test_edit_with_diff() {
        let part = tool_part(
            "edit",
            json!({"status": "completed",
                   "input": {"filePath": "src/lib.rs"},
                   "metadata": {"diff": "-a\n+b"}}),
        );
        assert_eq!(
            format_part(&part, true),
            "✅ Tool edit finished (src/lib.rs)\n```diff\n-a\n+b\n```"
        );
    }

    #[test]
    fn test_bash_truncates_output() {
        let long = "x".repeat(400);
        let part = tool_part(
            "bash",
            json!({"status": "completed", "input": {"command": "ls"}, "output": long}),
        );
        let rendered = format_part(&part, true);
        assert!(rendered.starts_with("✅ Tool bash finished\n$ ls\n"));
        assert!(rendered.ends_with("..."));
        assert_eq!(rendered.lines().last().unwrap().chars().count(), 303);
    }

    #[test]
    fn test_bash_diff_output_is_fenced() {
        let part = tool_part(
            "bash",
            json!({"status": "completed", "input": {"command": "git show"},
                   "output": "diff --git a/x b/x"}),
        );
        assert!(format_part(&part, true).ends_with("```diff\ndiff --git a/x b/x\n```"));
    }

    #[test]
    fn test_labelled_and_generic_inputs() {
        let fetch = tool_part(
            "webfetch",
            json!({"status": "running", "input": {"url": "https://x.dev", "format": "md"}}),
        );
        assert_eq!(format_part(&fetch, true), "🔧 Running tool: webfetch (https://x.dev)");

        let single = tool_part("glob", json!({"status": "running", "input": {"pattern": "*.rs"}}));
        assert_eq!(format_part(&single, true), "🔧 Running tool: glob (*.rs)");

        let short = tool_part("list", json!({"status": "running", "input": {"depth": 2}}));
        assert_eq!(format_part(&short, true), r#"🔧 Running tool: list {"depth":2}"#);

        let big = "y".repeat(120);
        let long = tool_part(
            "list",
            json!({"status": "running", "input": {"a": big, "b": 1}}),
        );
        assert_eq!(format_part(&long, true), "🔧 Running tool: list");
    }

    #[test]
    fn test_step_finish() {
        let ok = Part::new(PartBody::StepFinish {
            success: None,
            title: Some("build".to_string()),
        });
        assert_eq!(format_part(&ok, true), "✅ Step finished: build");

        let failed = Part::new(PartBody::StepFinish {
            success: Some(false),
            title: None,
        });
        assert_eq!(format_part(&failed, true), "❌ Step failed: ");
    }

    #[test]
    fn test_summaries_and_suppressed_kinds() {
        let patch = Part::new(PartBody::Patch {
            hash: Some("abc".to_string()),
            files: vec!["a.rs".to_string(), "b.rs".to_string()],
        });
        assert_eq!(format_part(&patch, true), "📦 Patch (abc): a.rs, b.rs");

        let retry = Part::from_value(json!({
            "type": "retry", "attempt": 2, "error": {"data": {"message": "rate limited"}}
        }));
        assert_eq!(format_part(&retry, true), "🔄 Retry (attempt 2): rate limited");

        let file = Part::from_value(json!({"type": "file", "url": "file:///a.png"}));
        assert_eq!(format_part(&file, true), "📎 File: file:///a.png");

        for kind in ["step-start", "snapshot", "compaction"] {
            let part = Part::from_value(json!({"type": kind}));
            assert_eq!(format_part(&part, true), "", "{kind} should render empty");
        }

        let unknown = Part::from_value(json!({"type": "hologram"}));
        assert_eq!(format_part(&unknown, true), "📦 hologram");
    }
}
