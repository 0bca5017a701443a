use clap::Args;
use serde_json::Value;

use crate::cli::config::server_url;
use crate::cli::utils::output_error;
use crate::cli::OutputFormat;
use crate::client::{ClientError, DataClient};

#[derive(Args)]
pub struct CallArgs {
    #[arg(help = "Action name, e.g. ping, loadAll, saveFormData")]
    pub action: String,

    #[arg(long, help = "JSON object merged into the request envelope")]
    pub payload: Option<String>,

    #[arg(long, help = "Server base URL (default: FORMBASE_URL or http://127.0.0.1:8080/)")]
    pub server: Option<String>,

    #[arg(long, env = "FORMBASE_TOKEN", help = "API token sent as a bearer credential")]
    pub token: Option<String>,

    #[arg(long, help = "Log in first with this username or email")]
    pub user: Option<String>,

    #[arg(long, env = "FORMBASE_PASSWORD", requires = "user", help = "Password for --user")]
    pub password: Option<String>,
}

pub async fn handle(args: CallArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let payload: Value = match &args.payload {
        Some(raw) => serde_json::from_str(raw)?,
        None => Value::Null,
    };

    let mut client = DataClient::new(&server_url(args.server))?;
    if let Some(token) = args.token {
        client = client.with_token(token);
    }
    if let Some(user) = &args.user {
        let password = args.password.as_deref().unwrap_or_default();
        client.login(user, password, false).await?;
    }

    match client.call(&args.action, payload).await {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
        Err(ClientError::Api { status, code, message }) => {
            output_error(&output_format, &message, code.as_deref())?;
            anyhow::bail!("server answered {}", status)
        }
        Err(e) => Err(e.into()),
    }
}
