use anyhow::Result;
use colored::Colorize;

use credgate_auth::RegistrationRequest;

use credgate_server::AuthCore;

use crate::cli::{OutputFormat, RegisterArgs};
use crate::output::{print_record, print_success};

pub async fn register(core: &AuthCore, args: &RegisterArgs, format: OutputFormat) -> Result<()> {
    let request = RegistrationRequest {
        username: args.username.clone(),
        email: args.email.clone(),
        password: args.password.clone(),
        phone: args.phone.clone(),
        nickname: args.nickname.clone(),
    };
    let user = core.registration.register(request).await?;
    print_success(&format!("Registered {}", user.username.cyan()));
    print_record(
        &user,
        vec![
            ("id", user.id.to_string()),
            ("public_id", user.public_id.clone()),
            ("username", user.username.clone()),
            ("email", user.email.clone()),
            ("phone", user.phone.clone().unwrap_or_else(|| "-".into())),
        ],
        format,
    )
}
