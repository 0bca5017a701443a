use anyhow::Context;

use crate::config::AppFile;
use crate::database::Database;

/// Loads the application file the server would use and connects to its database.
pub async fn connect(config_path: &str) -> anyhow::Result<(AppFile, Database)> {
    let app = AppFile::load(config_path).with_context(|| format!("loading {}", config_path))?;
    let url = app.database_url()?;
    let db = Database::connect(&url, 2)
        .await
        .context("connecting to the database")?;
    Ok((app, db))
}

/// Server base URL for `call`: explicit flag, then `FORMBASE_URL`, then localhost.
pub fn server_url(explicit: Option<String>) -> String {
    explicit
        .or_else(|| std::env::var("FORMBASE_URL").ok())
        .unwrap_or_else(|| "http://127.0.0.1:8080/".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_server_url_wins() {
        assert_eq!(server_url(Some("http://api.local/".into())), "http://api.local/");
    }
}
