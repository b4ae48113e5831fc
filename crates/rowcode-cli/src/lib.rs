use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rowcode_core::models::ConversionReport;
use rowcode_processing::{CsvSource, DataSource, JsonSource};

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Initialize tracing for CLI binaries. Logs go to stderr so stdout stays parseable.
pub fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "rowcode=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

pub fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize output")?;
    println!("{}", out);
    Ok(())
}

/// Pick a data source from the input file's extension.
pub fn source_for_path(
    path: &Path,
    value_column: &str,
    id_column: Option<&str>,
) -> anyhow::Result<Box<dyn DataSource>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") => {
            let mut source = CsvSource::new(path, value_column);
            if let Some(id_column) = id_column {
                source = source.with_id_column(id_column);
            }
            Ok(Box::new(source))
        }
        Some("json") => Ok(Box::new(JsonSource::new(path))),
        _ => Err(anyhow::anyhow!(
            "Unsupported input file '{}': expected a .csv or .json file",
            path.display()
        )),
    }
}

/// Plain-text summary of a finished run.
pub fn format_report(report: &ConversionReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Converted {} of {} items ({} failed, {} skipped) in {:.1}s\n",
        report.stats.success,
        report.total_items,
        report.stats.failed,
        report.skipped_items,
        report.elapsed_ms as f64 / 1000.0
    ));

    if !report.failures.is_empty() {
        out.push_str(&format!("\n{:<24} {:<10} {}\n", "RECORD", "STAGE", "ERROR"));
        for failure in &report.failures {
            out.push_str(&format!(
                "{:<24} {:<10} {}\n",
                truncate_string(&failure.record_id, 24),
                failure.stage,
                truncate_string(&failure.message, 80)
            ));
        }
    }

    out
}
