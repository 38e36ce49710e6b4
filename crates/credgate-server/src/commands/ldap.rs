use std::sync::Arc;

use anyhow::{Context, Result};
use colored::Colorize;

use credgate_auth::LdapClient;

use credgate_server::AuthCore;

use crate::cli::{LdapCommands, OutputFormat};
use crate::output::{print_json, print_record, print_success, render_table};

pub async fn run(core: &AuthCore, command: &LdapCommands, format: OutputFormat) -> Result<()> {
    let client = directory(core)?;
    match command {
        LdapCommands::Search(args) => {
            let entries = client.search_users(&args.filter, args.limit).await?;
            match format {
                OutputFormat::Json => print_json(&entries)?,
                OutputFormat::Table => {
                    let rows = entries
                        .iter()
                        .map(|e| {
                            [
                                e.dn.clone().unwrap_or_else(|| e.subject.clone()),
                                e.username().unwrap_or("-").to_string(),
                                e.email().unwrap_or("-").to_string(),
                                e.display_name().unwrap_or("-").to_string(),
                            ]
                        })
                        .collect();
                    println!("{}", render_table(["DN", "Username", "Email", "Name"], rows));
                    println!("Total: {}", entries.len());
                }
            }
        }
        LdapCommands::Groups(args) => {
            let groups = client.get_user_groups(&args.user_dn).await?;
            match format {
                OutputFormat::Json => print_json(&groups)?,
                OutputFormat::Table => {
                    let rows = groups.iter().map(|g| [g.clone()]).collect();
                    println!("{}", render_table(["Group"], rows));
                }
            }
        }
        LdapCommands::Login(args) => {
            let outcome = core
                .reconciler
                .reconcile_ldap(&args.username, &args.password)
                .await?;
            let verb = if outcome.is_new_user { "Provisioned" } else { "Authenticated" };
            print_success(&format!("{verb} {}", outcome.user.username.cyan()));
            print_record(
                &outcome.tokens,
                vec![
                    ("user_id", outcome.user.id.to_string()),
                    ("username", outcome.user.username.clone()),
                    ("new_user", outcome.is_new_user.to_string()),
                    ("access_token", outcome.tokens.access_token.clone()),
                    ("refresh_token", outcome.tokens.refresh_token.clone()),
                ],
                format,
            )?;
        }
    }
    Ok(())
}

fn directory(core: &AuthCore) -> Result<&Arc<LdapClient>> {
    core.ldap
        .as_ref()
        .context("LDAP is not enabled (set auth.sso.ldap.enabled = true)")
}
