pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "schoolbox")]
#[command(about = "Schoolbox CLI - palette extraction, contrast checks and dev tokens")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Extract the dominant colors of an image file or URL")]
    Palette(commands::palette::PaletteArgs),

    #[command(about = "WCAG contrast ratio of a color against a reference")]
    Contrast(commands::contrast::ContrastArgs),

    #[command(about = "Pick the highest-contrast color that meets a threshold")]
    Select(commands::contrast::SelectArgs),

    #[command(about = "Mint a bearer token for local development")]
    Token(commands::token::TokenArgs),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Palette(args) => commands::palette::handle(args, output_format).await,
        Commands::Contrast(args) => commands::contrast::handle_contrast(args, output_format),
        Commands::Select(args) => commands::contrast::handle_select(args, output_format),
        Commands::Token(args) => commands::token::handle(args, output_format),
    }
}
