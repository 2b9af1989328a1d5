//! Prompt rendering for launched agents.
//!
//! Templates live on [`crate::actions::AgentTemplate`] and use `{variable}`
//! placeholders. Rendering is a single pass over the template: substituted
//! values are never rescanned, so a title or feedback containing `{factory}`
//! stays literal.

use std::path::Path;

use crate::actions::AgentTemplate;

/// Everything a prompt template may reference.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub epic_id: &'a str,
    pub title: &'a str,
    pub app_name: &'a str,
    pub factory: &'a Path,
    pub qa_round: Option<u32>,
    pub feedback: Option<&'a str>,
}

/// Replace each known `{key}` in `template` with its value. Unknown
/// placeholders are left as written.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut output = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        output.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after.find('}').and_then(|close| {
            let key = &after[..close];
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| (*v, close))
        });
        match value {
            Some((value, close)) => {
                output.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                output.push('{');
                rest = after;
            }
        }
    }
    output.push_str(rest);
    output
}

/// Build the full prompt for an agent launch.
pub fn build_prompt(template: &AgentTemplate, ctx: &PromptContext<'_>) -> String {
    let factory = ctx.factory.display().to_string();
    let qa_round = ctx.qa_round.unwrap_or(1).to_string();
    let note = match (template.feedback_note, ctx.feedback) {
        (Some(note), Some(feedback)) if !feedback.trim().is_empty() => {
            render(note, &[("feedback", feedback)])
        }
        _ => String::new(),
    };
    render(
        template.prompt,
        &[
            ("title", ctx.title),
            ("epic_id", ctx.epic_id),
            ("app_name", ctx.app_name),
            ("factory", &factory),
            ("qa_round", &qa_round),
            ("feedback_note", &note),
        ],
    )
}
