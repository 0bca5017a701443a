use clap::Subcommand;
use rand::{rngs::OsRng, RngCore};
use serde_json::json;

use crate::cli::config::connect;
use crate::cli::utils::{output_rows, output_success};
use crate::cli::OutputFormat;
use crate::database::models::Invitation;

#[derive(Subcommand)]
pub enum InviteCommands {
    #[command(about = "Create invitation codes")]
    Add {
        #[arg(help = "Explicit code (random when omitted)")]
        code: Option<String>,
        #[arg(long, default_value_t = 1, help = "Number of random codes to create")]
        count: usize,
    },

    #[command(about = "List invitation codes and their status")]
    List,
}

pub async fn handle(cmd: InviteCommands, config_path: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let (_, db) = connect(config_path).await?;

    let result = match cmd {
        InviteCommands::Add { code, count } => {
            let codes: Vec<String> = match code {
                Some(code) => vec![code],
                None => (0..count.max(1)).map(|_| random_code()).collect(),
            };
            let mut created = Vec::with_capacity(codes.len());
            for code in &codes {
                created.push(Invitation::create(db.pool(), code).await?.code);
            }
            if matches!(output_format, OutputFormat::Text) {
                for code in &created {
                    println!("{}", code);
                }
            }
            output_success(
                &output_format,
                &format!("Created {} invitation code(s)", created.len()),
                Some(json!({ "codes": created })),
            )
        }
        InviteCommands::List => {
            let rows = Invitation::list(db.pool())
                .await?
                .into_iter()
                .map(|inv| {
                    json!({
                        "code": inv.code,
                        "used": inv.is_used(),
                        "used_by": inv.used_by,
                        "used_at": inv.used_at,
                        "created_at": inv.created_at,
                    })
                })
                .collect();
            output_rows(&output_format, "invitations", &["code", "used", "used_by", "created_at"], rows)
        }
    };

    db.close().await;
    result
}

/// Ten uppercase hex characters.
fn random_code() -> String {
    let mut bytes = [0u8; 5];
    OsRng.fill_bytes(&mut bytes);
    hex::encode_upper(bytes)
}
