//! `persona-relay run`: one turn from the command line.
//!
//! Useful for trying personas and models without a Telegram bot. The
//! conversation lives only for the duration of the process.

use std::sync::Arc;

use pr_domain::config::Config;
use pr_domain::UserId;

use crate::bootstrap;
use crate::runtime::TurnState;

pub async fn run(
    config: Arc<Config>,
    message: String,
    user: UserId,
    mode: Option<String>,
    json_output: bool,
) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config)?;
    let processor = &state.processor;

    if let Some(name) = mode {
        processor
            .switch_mode_by_name(user, &name)
            .await
            .map_err(|e| anyhow::anyhow!("{e} (expected one of neo, morpheus, trinity)"))?;
    }

    let outcome = processor.process(user, &message).await;

    if json_output {
        let value = serde_json::json!({
            "turn_id": outcome.turn_id,
            "state": format!("{:?}", outcome.state),
            "reply": outcome.reply,
            "error": outcome.error,
            "compactions": outcome.compactions.len(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{}", outcome.reply);
        if let Some(err) = &outcome.error {
            eprintln!("error: {err}");
        }
    }

    if outcome.state == TurnState::Failed {
        std::process::exit(1);
    }
    Ok(())
}
