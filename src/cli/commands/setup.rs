use serde_json::json;

use crate::cli::config::connect;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;

pub async fn handle(config_path: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let (app, db) = connect(config_path).await?;
    let report = db.run_setup(&app.tables_sql).await;
    db.close().await;

    if report.is_success() {
        return output_success(
            &output_format,
            &format!("Setup successful! {} statements processed.", report.executed),
            Some(json!({ "executed": report.executed })),
        );
    }

    for failure in &report.failures {
        output_error(
            &output_format,
            &format!("statement {} failed: {}", failure.index + 1, failure.message),
            Some("SETUP_STATEMENT_FAILED"),
        )?;
    }
    anyhow::bail!(
        "{} of {} statements failed",
        report.failures.len(),
        app.tables_sql.len()
    )
}
