use linkstash_core::store::LocalStore;

use crate::commands::common::{
    filter_by_tag, format_post_lines, post_to_list_item, Context, PostListItem,
};
use crate::error::CliError;

pub fn run_list(context: &Context, tag: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let identity = context.identity()?;
    let mut posts = filter_by_tag(context.store().load_posts(&identity)?, tag);
    posts.sort_by_key(|post| std::cmp::Reverse(post.freshness()));

    if as_json {
        let json_items = posts
            .iter()
            .map(post_to_list_item)
            .collect::<Vec<PostListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if posts.is_empty() {
        println!("No links saved.");
        return Ok(());
    }
    for line in format_post_lines(&posts) {
        println!("{line}");
    }
    Ok(())
}
