pub mod commands;
pub mod config;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "fbctl")]
#[command(about = "formbase CLI - database setup, invitations and API calls")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        env = "APP_CONFIG_PATH",
        default_value = "app-config.json",
        help = "Application file with database URL and setup SQL"
    )]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the configured tables_sql statements against the database")]
    Setup,

    #[command(about = "Invitation code management")]
    Invite {
        #[command(subcommand)]
        cmd: commands::invite::InviteCommands,
    },

    #[command(about = "Invoke an action on a running server")]
    Call(commands::call::CallArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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
        Commands::Setup => commands::setup::handle(&cli.config, output_format).await,
        Commands::Invite { cmd } => commands::invite::handle(cmd, &cli.config, output_format).await,
        Commands::Call(args) => commands::call::handle(args, output_format).await,
    }
}
