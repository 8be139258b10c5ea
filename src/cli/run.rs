// src/cli/run.rs — Default command: stream one research session

use std::sync::Arc;

use super::render;
use crate::infra::config::Config;
use crate::session::{SessionController, SessionStatus};
use crate::stream::sse::SseTransport;

/// Stream one research session to the terminal and return its final status.
///
/// Ctrl-C disposes the controller, which releases the connection.
pub async fn run_research(
    query: &str,
    config: &Config,
    quiet: bool,
    json: bool,
) -> anyhow::Result<SessionStatus> {
    let transport = Arc::new(SseTransport::new(&config.stream)?);
    let mut controller = SessionController::new(transport, config.stream.clone());

    if !quiet {
        render::attach_terminal_progress(&mut controller);
        eprintln!(
            "[research] {} | endpoint: {}",
            truncate_query(query, 60),
            config.stream.endpoint
        );
    }

    controller.submit(query)?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            active = controller.pump() => {
                if !active {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                controller.dispose();
                if !quiet {
                    eprintln!("[interrupted] connection closed");
                }
                break;
            }
        }
    }

    let session = controller.session();
    if !session.diagnostics.is_empty() {
        tracing::info!(
            "{} event(s) dropped during the session",
            session.diagnostics.len()
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(session)?);
    } else if session.status == SessionStatus::Completed {
        let report = render::format_report(session);
        if !report.is_empty() {
            println!("{}", report);
        }
    }

    let status = session.status;
    controller.dispose();
    Ok(status)
}

fn truncate_query(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}...", cut)
    }
}
