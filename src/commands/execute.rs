//! Runs parsed commands against the engine and renders the operator's reply.

use std::fmt::Write;
use std::sync::Arc;

use tracing::{info, warn};

use crate::lifecycle::Engine;
use crate::store::Store;
use crate::transport::Transport;

use super::types::Command;

pub const HELP: &str = "\
/new <manual|random|activity> target=N collect=MIN [window=MIN] [cap=N] [refs=N] [min=N] [max=N] <prize>
/start <id>: close registration now
/cancel <id>: end without a winner
/win <id> <position> [<position>...]: pick winners
/active: list running contests";

/// Executes `command` and returns the reply text. Failures become replies.
pub async fn execute<S: Store, T: Transport>(engine: &Arc<Engine<S, T>>, command: Command) -> String {
    info!(?command, "executing operator command");
    let reply = match command {
        Command::New(params) => engine
            .create_contest(params)
            .await
            .map(|c| format!("Contest {} created ({}, target {}).", c.id, c.kind, c.target)),
        Command::Start(id) => engine
            .force_start(id)
            .await
            .map(|c| format!("Contest {} is now {}.", c.id, c.status)),
        Command::Cancel(id) => engine
            .cancel_contest(id)
            .await
            .map(|c| format!("Contest {} ended.", c.id)),
        Command::Win { contest, positions } => {
            engine.select_winners(contest, &positions).await.map(|winners| {
                let names: Vec<String> = winners
                    .iter()
                    .map(|w| format!("{} {}", w.position, w.name))
                    .collect();
                format!("Contest {} ended. Winners: {}", contest, names.join(", "))
            })
        }
        Command::Active => return active(engine).await,
        Command::Help => return HELP.to_string(),
    };

    reply.unwrap_or_else(|e| {
        warn!(error = %e, "operator command failed");
        format!("Error: {}", e)
    })
}

async fn active<S: Store, T: Transport>(engine: &Arc<Engine<S, T>>) -> String {
    let contests = match engine.active_contests().await {
        Ok(contests) => contests,
        Err(e) => return format!("Error: {}", e),
    };
    if contests.is_empty() {
        return "No active contests.".to_string();
    }

    let mut out = String::new();
    for contest in contests {
        let count = engine
            .store()
            .participant_count(contest.id)
            .await
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{} {} {} {}/{}: {}",
            contest.id, contest.kind, contest.status, count, contest.target, contest.prize
        );
    }
    out.trim_end().to_string()
}
