use anyhow::Result;
use colored::Colorize;

use credgate_server::AuthCore;
use credgate_server::config::AppConfig;

use crate::output::{print_error, print_success, print_warning};

/// Checks every configured dependency. Fails if an enabled provider is
/// unreachable, even though the server itself would start without it.
pub async fn check(config: &AppConfig, core: &AuthCore) -> Result<()> {
    print_success("Configuration is valid");
    print_success(&format!(
        "Storage backend {} reachable",
        format!("{:?}", config.storage.backend).to_lowercase().cyan()
    ));
    if config.redis.enabled {
        print_success("Redis reachable");
    } else {
        print_warning("Redis disabled, revocations are local to one process");
    }

    let mut failures = 0;

    if config.auth.sso.oidc.enabled {
        match &core.oidc {
            Some(client) => print_success(&format!(
                "OIDC discovery OK (issuer {})",
                client.discovery().issuer.cyan()
            )),
            None => {
                failures += 1;
                print_error(&format!(
                    "OIDC discovery failed for {}",
                    config.auth.sso.oidc.provider_url
                ));
            }
        }
    }

    if let Some(ldap) = &core.ldap {
        match ldap.test_connection().await {
            Ok(()) => print_success(&format!("LDAP bind OK ({})", ldap.config().url().cyan())),
            Err(e) => {
                failures += 1;
                tracing::debug!(error = %e, "LDAP test connection failed");
                print_error(&format!("LDAP test connection failed: {e}"));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} provider check(s) failed");
    }
    Ok(())
}
