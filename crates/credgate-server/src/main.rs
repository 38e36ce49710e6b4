mod cli;
mod commands;
mod output;

use anyhow::{Result, anyhow};
use clap::Parser;

use cli::{Cli, Commands};
use credgate_server::config::loader::load_config;
use credgate_server::{AuthCore, observability};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env if present
    match dotenvy::dotenv() {
        Ok(_) => {}
        Err(dotenvy::Error::Io(ref e)) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("Warning: failed to load .env: {e}"),
    }

    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    let config = load_config(cli.config.as_deref()).map_err(|e| anyhow!(e))?;
    observability::init_tracing_with_level(observability::level_for_verbosity(
        &config.logging.level,
        cli.verbose,
    ));
    tracing::debug!(?config, "Configuration loaded");

    let core = AuthCore::build(&config).await?;

    match &cli.command {
        Commands::Check => commands::check::check(&config, &core).await?,
        Commands::Providers => commands::providers::providers(&core, format)?,
        Commands::Register(args) => commands::register::register(&core, args, format).await?,
        Commands::Login(args) => commands::login::login(&core, args, format).await?,
        Commands::ChangePassword(args) => commands::login::change_password(&core, args).await?,
        Commands::Token(args) => commands::token::run(&core, &args.command, format).await?,
        Commands::Ldap(args) => commands::ldap::run(&core, &args.command, format).await?,
    }
    Ok(())
}
