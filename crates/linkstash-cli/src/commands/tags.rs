use serde::Serialize;

use crate::commands::common::{collect_tags, Context};
use crate::error::CliError;

#[derive(Debug, Serialize)]
pub struct TagListItem {
    pub name: String,
    pub color: String,
}

pub fn run_tags(context: &Context, as_json: bool) -> Result<(), CliError> {
    let identity = context.identity()?;
    let tags = collect_tags(&context.store(), &identity)?;

    if as_json {
        let json_items = tags
            .into_iter()
            .map(|tag| TagListItem {
                name: tag.name,
                color: tag.color,
            })
            .collect::<Vec<_>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if tags.is_empty() {
        println!("No tags.");
        return Ok(());
    }
    for tag in tags {
        println!("{} ({})", tag.name, tag.color);
    }
    Ok(())
}
