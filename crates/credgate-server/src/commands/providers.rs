use anyhow::Result;

use credgate_server::AuthCore;

use crate::cli::OutputFormat;
use crate::output::{print_json, render_table};

pub fn providers(core: &AuthCore, format: OutputFormat) -> Result<()> {
    let listing = core.sso.list();
    match format {
        OutputFormat::Json => print_json(&listing),
        OutputFormat::Table => {
            let rows = listing
                .providers
                .iter()
                .map(|p| {
                    let default = if p.id == listing.default_provider { "*" } else { "" };
                    [
                        p.id.to_string(),
                        p.name.clone(),
                        p.login_url.clone(),
                        default.to_string(),
                    ]
                })
                .collect();
            println!("{}", render_table(["ID", "Name", "Login URL", "Default"], rows));
            Ok(())
        }
    }
}
