use clap::Args;
use serde_json::json;
use uuid::Uuid;

use crate::auth::JwtAuthority;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Args)]
pub struct TokenArgs {
    #[arg(help = "User id to place in the `sub` claim")]
    pub user_id: Uuid,

    #[arg(long, help = "Email claim")]
    pub email: Option<String>,
}

/// Signs with the configured JWT_SECRET, so the token is accepted by a
/// server running with the same environment.
pub fn handle(args: TokenArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let config = AppConfig::from_env();
    let authority = JwtAuthority::from_config(&config.security)?;
    let token = authority.issue(args.user_id, args.email)?;

    match output_format {
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({ "user_id": args.user_id, "token": token })),
        ),
        OutputFormat::Text => {
            println!("{}", token);
            Ok(())
        }
    }
}
