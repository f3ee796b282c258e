use linkstash_core::auth::IdentityProvider;

use crate::auth::session_manager;
use crate::commands::common::Context;
use crate::error::CliError;

pub async fn run_login(context: &Context, email: &str, password: &str) -> Result<(), CliError> {
    let manager = session_manager(&context.config)?.ok_or_else(|| {
        CliError::Config(
            "Supabase auth is not configured. Set supabase_url and supabase_anon_key in the config file."
                .to_string(),
        )
    })?;
    let session = manager.sign_in(email, password).await?;
    let label = session.user.email.as_deref().unwrap_or(&session.user.id);
    println!("Signed in as {label}");
    Ok(())
}

pub async fn run_logout(context: &Context) -> Result<(), CliError> {
    let Some(manager) = session_manager(&context.config)? else {
        println!("Not signed in.");
        return Ok(());
    };
    if manager.current_session().is_none() {
        println!("Not signed in.");
        return Ok(());
    }
    manager.sign_out().await?;
    println!("Signed out");
    Ok(())
}
