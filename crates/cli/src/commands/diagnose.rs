//! Run the database self-test from the command line.

use bloomtable_admin::services::DiagnosticRunner;

use super::{CliError, connect};

pub async fn run() -> Result<(), CliError> {
    let pool = connect().await?;
    let report = DiagnosticRunner::builtin(&pool).run().await;

    for result in &report.results {
        if result.success {
            tracing::info!("PASS {}: {}", result.name, result.message);
        } else {
            tracing::error!("FAIL {}: {}", result.name, result.message);
        }
    }

    if report.all_passed() {
        tracing::info!("All {} checks passed", report.results.len());
        Ok(())
    } else if report.stopped_early {
        Err(CliError::Failed(
            "a required check failed; remaining checks were skipped".into(),
        ))
    } else {
        let failed = report.results.iter().filter(|r| !r.success).count();
        Err(CliError::Failed(format!("{failed} check(s) failed")))
    }
}
