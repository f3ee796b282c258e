use linkstash_core::models::{Post, TagRef};
use linkstash_core::store::upsert_post;
use linkstash_core::util::normalize_text_option;

use crate::commands::common::{parse_tag_arg, validate_url, Context};
use crate::error::CliError;

/// Fields of a link being saved from the command line
pub struct AddRequest<'a> {
    pub url: &'a str,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: &'a [String],
    pub no_sync: bool,
}

pub fn build_post(request: &AddRequest<'_>) -> Result<Post, CliError> {
    let url = validate_url(request.url)?;
    let tags = request
        .tags
        .iter()
        .map(|raw| parse_tag_arg(raw))
        .collect::<Result<Vec<TagRef>, CliError>>()?;

    let mut post = Post::new(url).with_tags(tags);
    if let Some(title) = normalize_text_option(request.title.clone()) {
        post = post.with_title(title);
    }
    if let Some(description) = normalize_text_option(request.description.clone()) {
        post = post.with_description(description);
    }
    Ok(post)
}

pub async fn run_add(context: &Context, request: AddRequest<'_>) -> Result<(), CliError> {
    let post = build_post(&request)?;

    if request.no_sync || !context.has_remote() {
        let saved = save_locally(context, post)?;
        println!("Saved {} (not synced)", saved.url);
        return Ok(());
    }

    let manager = match context.manager().await {
        Ok(manager) => manager,
        Err(error) => {
            tracing::warn!("Remote unavailable, saving locally: {}", error);
            let saved = save_locally(context, post)?;
            println!("Saved {} (not synced)", saved.url);
            return Ok(());
        }
    };

    let saved = manager.save_local_post(post).await?;
    manager.enqueue_push();
    let report = manager.process_queue().await;
    context.save_status(&manager)?;

    if report.dropped > 0 {
        println!(
            "Saved {} locally; push failed, run `linkstash sync` to retry",
            saved.url
        );
    } else {
        println!("Saved {}", saved.url);
    }
    Ok(())
}

fn save_locally(context: &Context, post: Post) -> Result<Post, CliError> {
    let identity = context.identity()?;
    Ok(upsert_post(&context.store(), &identity, post)?)
}
