use crate::commands::common::{format_sync_timestamp, Context};
use crate::error::CliError;

const RECENT_ERRORS: usize = 5;

pub fn run_status(context: &Context, as_json: bool) -> Result<(), CliError> {
    let status = context.load_status()?.unwrap_or_default();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    for line in status_lines(context, &status) {
        println!("{line}");
    }
    Ok(())
}

pub fn status_lines(context: &Context, status: &linkstash_core::sync::SyncStatus) -> Vec<String> {
    let mut lines = Vec::new();
    lines.push(match context.identity() {
        Ok(identity) => format!(
            "User: {}",
            identity.email.as_deref().unwrap_or(&identity.id)
        ),
        Err(_) => "User: not signed in".to_string(),
    });
    lines.push(if context.has_remote() {
        "Remote: configured".to_string()
    } else {
        "Remote: not configured".to_string()
    });
    lines.push(match status.state.last_sync_time {
        Some(time) => format!(
            "Last sync: {}",
            format_sync_timestamp(time.timestamp_millis())
        ),
        None => "Last sync: never".to_string(),
    });
    if !status.pending_operations.is_empty() {
        lines.push(format!(
            "Pending: {}",
            status.pending_operations.join(", ")
        ));
    }

    let errors = &status.state.error_log;
    if !errors.is_empty() {
        lines.push(format!("Errors ({} total):", errors.len()));
        for entry in errors.iter().rev().take(RECENT_ERRORS) {
            lines.push(format!(
                "  {} {}",
                format_sync_timestamp(entry.at.timestamp_millis()),
                entry.message
            ));
        }
    }
    lines
}
