use anyhow::{Context, Result};
use colored::Colorize;
use time::OffsetDateTime;

use credgate_auth::{TokenClaims, TokenPair};

use credgate_server::AuthCore;

use crate::cli::{IssueArgs, LogoutArgs, OutputFormat, RefreshArgs, TokenCommands, VerifyArgs};
use crate::output::{print_record, print_success, print_warning};

pub async fn run(core: &AuthCore, command: &TokenCommands, format: OutputFormat) -> Result<()> {
    // Revocations only reach other instances through a shared cache.
    if !matches!(command, TokenCommands::Issue(_)) && core.cache_is_local() {
        print_warning("Redis disabled, revocation state does not outlive this command");
    }
    match command {
        TokenCommands::Issue(args) => issue(core, args, format).await,
        TokenCommands::Verify(args) => verify(core, args, format).await,
        TokenCommands::Refresh(args) => refresh(core, args, format).await,
        TokenCommands::Logout(args) => logout(core, args).await,
    }
}

async fn issue(core: &AuthCore, args: &IssueArgs, format: OutputFormat) -> Result<()> {
    let user_id = match args.user_id {
        Some(id) => id,
        None => {
            core.store
                .find_by_username(&args.username)
                .await?
                .with_context(|| format!("no account named {}", args.username))?
                .id
        }
    };
    let pair = core.tokens.generate(user_id, &args.username)?;
    print_pair(&pair, format)
}

async fn verify(core: &AuthCore, args: &VerifyArgs, format: OutputFormat) -> Result<()> {
    let claims = if args.refresh {
        core.tokens.verify_refresh(&args.token).await?
    } else {
        core.tokens.verify_access(&args.token).await?
    };
    print_success(&format!("Token is valid ({})", claims.kind.to_string().cyan()));
    print_claims(&claims, format)
}

async fn refresh(core: &AuthCore, args: &RefreshArgs, format: OutputFormat) -> Result<()> {
    let pair = core.tokens.refresh(&args.refresh_token).await?;
    print_success("Refresh token rotated");
    print_pair(&pair, format)
}

async fn logout(core: &AuthCore, args: &LogoutArgs) -> Result<()> {
    core.tokens
        .logout(&args.access_token, &args.refresh_token)
        .await?;
    print_success("Token pair revoked");
    Ok(())
}

fn timestamp(unix: i64) -> String {
    OffsetDateTime::from_unix_timestamp(unix)
        .ok()
        .and_then(|t| t.format(&time::format_description::well_known::Rfc3339).ok())
        .unwrap_or_else(|| unix.to_string())
}

pub fn print_pair(pair: &TokenPair, format: OutputFormat) -> Result<()> {
    print_record(
        pair,
        vec![
            ("access_token", pair.access_token.clone()),
            ("access_expires_at", timestamp(pair.access_expires_at)),
            ("refresh_token", pair.refresh_token.clone()),
            ("refresh_expires_at", timestamp(pair.refresh_expires_at)),
            ("token_type", pair.token_type.clone()),
        ],
        format,
    )
}

fn print_claims(claims: &TokenClaims, format: OutputFormat) -> Result<()> {
    print_record(
        claims,
        vec![
            ("user_id", claims.user_id.to_string()),
            ("username", claims.username.clone()),
            ("token_id", claims.token_id.clone()),
            ("issuer", claims.iss.clone()),
            ("issued_at", timestamp(claims.iat)),
            ("expires_at", timestamp(claims.exp)),
        ],
        format,
    )
}
