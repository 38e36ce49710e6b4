use anyhow::{Result, anyhow};
use colored::Colorize;

use credgate_auth::AuthError;
use credgate_server::AuthCore;

use crate::cli::{ChangePasswordArgs, LoginArgs, OutputFormat};
use crate::commands::token::print_pair;
use crate::output::print_success;

pub async fn login(core: &AuthCore, args: &LoginArgs, format: OutputFormat) -> Result<()> {
    let outcome = core
        .login
        .login(&args.identifier, &args.password)
        .await
        .map_err(hide_reason)?;
    print_success(&format!(
        "Logged in as {} ({})",
        outcome.user.username.cyan(),
        outcome.user.public_id
    ));
    print_pair(&outcome.tokens, format)
}

pub async fn change_password(core: &AuthCore, args: &ChangePasswordArgs) -> Result<()> {
    let claims = core.tokens.verify_access(&args.access_token).await?;
    core.login
        .change_password(claims.user_id, &args.old_password, &args.new_password)
        .await
        .map_err(hide_reason)?;
    print_success(&format!("Password changed for {}", claims.username.cyan()));
    Ok(())
}

/// Unknown account and wrong password print the same line.
fn hide_reason(err: AuthError) -> anyhow::Error {
    match err {
        AuthError::InvalidCredentials { .. } => anyhow!(err.public_message()),
        other => other.into(),
    }
}
