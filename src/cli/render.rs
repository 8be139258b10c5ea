// src/cli/render.rs — Terminal renderer for streamed research events

use serde_json::Value;

use crate::session::event::{EventKind, EventPayload, ReceivedEvent};
use crate::session::research::ResearchOutput;
use crate::session::{Session, SessionController, SessionStatus};

const PREVIEW_CHARS: usize = 80;

/// One progress line for `event`.
pub fn progress_line(event: &ReceivedEvent) -> String {
    match &event.payload {
        EventPayload::AgentReasoningStart => "[reasoning] thinking...".to_string(),
        EventPayload::ToolStart { tool_name, input } => {
            format!("[tool] {}({})", tool_name, preview(input))
        }
        EventPayload::ToolEnd { output } => format!("[tool done] {}", preview(output)),
        EventPayload::AgentAction { tool, tool_input } => {
            format!("[action] {} <- {}", tool, preview(tool_input))
        }
        EventPayload::AgentFinish { output } => format!("[finish] {}", preview(output)),
        EventPayload::LlmFullResponse { content } => {
            format!("[llm] {}", clip(content, PREVIEW_CHARS))
        }
        EventPayload::FinalResearchOutput(_) => "[result] research output received".to_string(),
        EventPayload::WorkflowEnd => "[done] workflow finished".to_string(),
    }
}

/// Print a progress line on stderr for every event kind.
///
/// All progress output goes to stderr so stdout remains clean for the result.
pub fn attach_terminal_progress(controller: &mut SessionController) {
    for kind in EventKind::ALL {
        controller.on(kind, |event| eprintln!("{}", progress_line(event)));
    }
    controller.on_finish(|session| {
        if session.status == SessionStatus::Failed {
            if let Some(err) = &session.error {
                eprintln!("[failed] {}", err);
            }
        }
    });
}

/// Human-readable final report for a finished session.
pub fn format_report(session: &Session) -> String {
    match session.output.research_output() {
        Some(output) => format_research_output(&output),
        None => {
            // Fall back to the raw object, or the last LLM answer.
            let raw = session.events().iter().rev().find_map(|e| match &e.payload {
                EventPayload::FinalResearchOutput(body) => {
                    serde_json::to_string_pretty(body).ok()
                }
                _ => None,
            });
            raw.or_else(|| {
                session.events().iter().rev().find_map(|e| match &e.payload {
                    EventPayload::LlmFullResponse { content } => Some(content.clone()),
                    _ => None,
                })
            })
            .unwrap_or_default()
        }
    }
}

pub fn format_research_output(output: &ResearchOutput) -> String {
    let mut out = format!("# {}\n\n{}\n", output.topic, output.summary.trim());

    if !output.sources.is_empty() {
        out.push_str("\n## Sources\n");
        for source in output.ranked_sources() {
            out.push_str(&format!(
                "\n- {} ({:?}, confidence {:.2})\n  {}\n",
                source.title,
                source.source_type,
                source.confidence(),
                source.url
            ));
            for point in &source.key_points {
                out.push_str(&format!("  * {}\n", point));
            }
        }
    }

    if let Some(meta) = &output.metadata {
        out.push_str(&format!(
            "\n{} source(s) analyzed, {} search quer{}",
            meta.total_sources_analyzed,
            meta.search_queries_used.len(),
            if meta.search_queries_used.len() == 1 {
                "y"
            } else {
                "ies"
            }
        ));
        if let Some(ts) = meta.generation_timestamp {
            out.push_str(&format!(", generated {}", ts.to_rfc3339()));
        }
        out.push('\n');
    }
    out
}

fn preview(value: &Value) -> String {
    let text = match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    clip(&text, PREVIEW_CHARS)
}

fn clip(text: &str, max: usize) -> String {
    let flat: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        flat
    } else {
        let cut: String = flat.chars().take(max).collect();
        format!("{}...", cut)
    }
}
