use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "credgate")]
#[command(about = "credgate operator CLI: inspect configuration, providers and tokens")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file (defaults to ./credgate.toml)
    #[arg(short, long, global = true, env = "CREDGATE_CONFIG")]
    pub config: Option<String>,

    /// Output format
    #[arg(short, long, global = true)]
    pub format: Option<OutputFormat>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate config, run OIDC discovery and an LDAP test bind
    Check,
    /// List the login methods offered to clients
    Providers,
    /// Register a local account
    Register(RegisterArgs),
    /// Log in with a username, email or phone and a password
    Login(LoginArgs),
    /// Change the password of the account an access token belongs to
    ChangePassword(ChangePasswordArgs),
    /// Issue, inspect and revoke tokens
    Token(TokenArgs),
    /// Query the configured directory
    Ldap(LdapArgs),
}

#[derive(clap::Args)]
pub struct RegisterArgs {
    pub username: String,
    #[arg(long)]
    pub email: String,
    /// Password (prompting is not supported; prefer the env var)
    #[arg(long, env = "CREDGATE_PASSWORD", hide_env_values = true)]
    pub password: String,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub nickname: Option<String>,
}

#[derive(clap::Args)]
pub struct LoginArgs {
    /// Username, email or phone number
    pub identifier: String,
    #[arg(long, env = "CREDGATE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[derive(clap::Args)]
pub struct ChangePasswordArgs {
    #[arg(long)]
    pub access_token: String,
    #[arg(long, env = "CREDGATE_PASSWORD", hide_env_values = true)]
    pub old_password: String,
    #[arg(long, env = "CREDGATE_NEW_PASSWORD", hide_env_values = true)]
    pub new_password: String,
}

#[derive(clap::Args)]
pub struct TokenArgs {
    #[command(subcommand)]
    pub command: TokenCommands,
}

#[derive(Subcommand)]
pub enum TokenCommands {
    /// Issue a token pair for an account
    Issue(IssueArgs),
    /// Verify an access token (or a refresh token with --refresh)
    Verify(VerifyArgs),
    /// Rotate a refresh token into a new pair
    Refresh(RefreshArgs),
    /// Revoke an access/refresh pair
    Logout(LogoutArgs),
}

#[derive(clap::Args)]
pub struct IssueArgs {
    /// Account username
    pub username: String,
    /// Sign for this id without looking the account up
    #[arg(long)]
    pub user_id: Option<u64>,
}

#[derive(clap::Args)]
pub struct VerifyArgs {
    pub token: String,
    /// Treat the token as a refresh token
    #[arg(long)]
    pub refresh: bool,
}

#[derive(clap::Args)]
pub struct RefreshArgs {
    pub refresh_token: String,
}

#[derive(clap::Args)]
pub struct LogoutArgs {
    #[arg(long)]
    pub access_token: String,
    #[arg(long)]
    pub refresh_token: String,
}

#[derive(clap::Args)]
pub struct LdapArgs {
    #[command(subcommand)]
    pub command: LdapCommands,
}

#[derive(Subcommand)]
pub enum LdapCommands {
    /// Run a raw search filter under the base DN
    Search(LdapSearchArgs),
    /// List the groups of an entry
    Groups(LdapGroupsArgs),
    /// Authenticate against the directory and provision the account
    Login(LdapLoginArgs),
}

#[derive(clap::Args)]
pub struct LdapSearchArgs {
    /// LDAP filter, e.g. "(objectClass=person)"
    pub filter: String,
    #[arg(long, default_value_t = 20)]
    pub limit: i32,
}

#[derive(clap::Args)]
pub struct LdapGroupsArgs {
    /// Distinguished name of the user entry
    pub user_dn: String,
}

#[derive(clap::Args)]
pub struct LdapLoginArgs {
    pub username: String,
    #[arg(long, env = "CREDGATE_PASSWORD", hide_env_values = true)]
    pub password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_token_logout() {
        let cli = Cli::try_parse_from([
            "credgate",
            "token",
            "logout",
            "--access-token",
            "a",
            "--refresh-token",
            "r",
            "-f",
            "json",
        ])
        .unwrap();
        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Commands::Token(args) = cli.command else {
            panic!("expected token command");
        };
        assert!(matches!(args.command, TokenCommands::Logout(_)));
    }

    #[test]
    fn test_parse_login_and_change_password() {
        let cli =
            Cli::try_parse_from(["credgate", "login", "alice@x.com", "--password", "pw"]).unwrap();
        let Commands::Login(args) = cli.command else {
            panic!("expected login");
        };
        assert_eq!(args.identifier, "alice@x.com");
        assert_eq!(args.password, "pw");

        let cli = Cli::try_parse_from([
            "credgate",
            "change-password",
            "--access-token",
            "t",
            "--old-password",
            "a",
            "--new-password",
            "b",
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::ChangePassword(_)));
    }

    #[test]
    fn test_parse_ldap_search_default_limit() {
        let cli = Cli::try_parse_from(["credgate", "-vv", "ldap", "search", "(uid=*)"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Ldap(LdapArgs {
            command: LdapCommands::Search(args),
        }) = cli.command
        else {
            panic!("expected ldap search");
        };
        assert_eq!(args.limit, 20);
        assert_eq!(args.filter, "(uid=*)");
    }
}
