//! Worker event stream to human-readable transcript lines.
//!
//! The worker prints one JSON object per line. Only assistant turns and the
//! final result are kept; everything else (including non-JSON telemetry
//! noise) is dropped.

use serde::Deserialize;
use serde_json::Value;

const TEXT_LIMIT: usize = 300;
const COMMAND_LIMIT: usize = 100;
const PROMPT_PREVIEW: usize = 200;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkerEvent {
    Assistant {
        #[serde(default)]
        message: Option<AssistantMessage>,
    },
    Result {
        #[serde(default)]
        cost_usd: Option<f64>,
        #[serde(default)]
        total_cost_usd: Option<f64>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        name: String,
        #[serde(default)]
        input: Value,
    },
    #[serde(other)]
    Other,
}

impl WorkerEvent {
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str(line.trim()).ok()
    }

    /// Transcript lines for this event, each prefixed with `[ts]`.
    pub fn transcript_lines(&self, ts: &str) -> Vec<String> {
        match self {
            WorkerEvent::Assistant { message: Some(msg) } => msg
                .content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } if !text.is_empty() => {
                        Some(format!("[{ts}] THINKING: {}", truncate(&flatten(text), TEXT_LIMIT)))
                    }
                    ContentBlock::ToolUse { name, input } => match tool_detail(name, input) {
                        Some(detail) => Some(format!("[{ts}] TOOL: {name} → {detail}")),
                        None => Some(format!("[{ts}] TOOL: {name}")),
                    },
                    _ => None,
                })
                .collect(),
            WorkerEvent::Result {
                cost_usd,
                total_cost_usd,
            } => {
                let cost = cost_usd.or(*total_cost_usd).filter(|c| *c > 0.0);
                match cost {
                    Some(c) => vec![format!("[{ts}] RESULT: Agent finished (${c:.4})")],
                    None => vec![format!("[{ts}] RESULT: Agent finished")],
                }
            }
            _ => Vec::new(),
        }
    }
}

/// Format one raw stdout line. Unparseable lines produce nothing.
pub fn format_line(line: &str, ts: &str) -> Vec<String> {
    WorkerEvent::parse(line)
        .map(|event| event.transcript_lines(ts))
        .unwrap_or_default()
}

/// One-line summary of a tool call's input.
fn tool_detail(name: &str, input: &Value) -> Option<String> {
    let field = |key: &str| input.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());
    match name {
        "Read" | "Write" | "Edit" => field("file_path").map(str::to_string),
        "Glob" => field("pattern").map(str::to_string),
        "Grep" => field("pattern").map(|p| format!("\"{p}\"")),
        "Bash" => Some(truncate(&flatten(field("command").unwrap_or("")), COMMAND_LIMIT)),
        "Task" => field("description").map(str::to_string),
        _ => None,
    }
}

/// Opening lines written before the worker produces anything.
pub fn header_lines(model: &str, repo_name: &str, prompt: &str) -> Vec<String> {
    let now = chrono::Utc::now().to_rfc3339();
    vec![
        format!("[{now}] Agent started: {model} in {repo_name}"),
        format!("[{now}] Prompt: {}...", take_chars(prompt, PROMPT_PREVIEW)),
        String::new(),
    ]
}

pub fn exit_line(exit_code: Option<i32>) -> String {
    let code = exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string());
    format!("[{}] Agent exited (code {code})", clock())
}

/// Wall-clock prefix for event lines.
pub fn clock() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

fn flatten(text: &str) -> String {
    text.replace(['\r', '\n'], " ")
}

fn take_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Cut `text` to `max` characters, marking the cut with `...`.
pub fn truncate(text: &str, max: usize) -> String {
    let head = take_chars(text, max);
    if head.len() < text.len() {
        format!("{head}...")
    } else {
        text.to_string()
    }
}
