use linkstash_core::sync::SyncOutcome;

use crate::commands::common::Context;
use crate::error::CliError;

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncMode {
    pub init: bool,
    pub force: bool,
    pub push_only: bool,
}

pub async fn run_sync(context: &Context, mode: SyncMode, as_json: bool) -> Result<(), CliError> {
    let manager = context.manager().await?;
    let result = if mode.force {
        manager.force_sync(mode.push_only).await
    } else if mode.init {
        manager.init_smart_sync().await
    } else {
        manager.sync_data().await
    };
    context.save_status(&manager)?;
    let outcome = result?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", describe_outcome(&outcome));
    }
    Ok(())
}

pub fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Skipped => "Sync skipped: another sync is running".to_string(),
        SyncOutcome::InSync => "Already in sync".to_string(),
        SyncOutcome::Pushed(push) => format!(
            "Pushed: {} created, {} updated, {} relinked, {} failed",
            push.created, push.updated, push.relinked, push.failed
        ),
        SyncOutcome::Pulled(pull) => format!(
            "Pulled: {} added, {} updated ({} cached)",
            pull.added, pull.updated, pull.total
        ),
        SyncOutcome::Forced { push, pull } => {
            let line = format!(
                "Force pushed: {} created, {} updated, {} relinked, {} failed",
                push.created, push.updated, push.relinked, push.failed
            );
            match pull {
                Some(pull) => format!("{line}; pulled back {} posts", pull.total),
                None => line,
            }
        }
    }
}
