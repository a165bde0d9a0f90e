use std::fmt::Write as _;

use burn_dataset::types::ValidationReport;
use clap::Args;
use cli_support::DatasetRootArgs;

#[derive(Debug, Clone, Default, Args)]
pub struct SummaryArgs {
    #[command(flatten)]
    pub dataset: DatasetRootArgs,
    /// Emit the report as JSON instead of text.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Human-readable report: one line per bucket, then the verdict and its reasons.
pub fn render_text(report: &ValidationReport) -> String {
    let mut out = String::new();
    for bucket in &report.summary.buckets {
        let marker = if bucket.value.is_none() {
            "  (non-numeric)"
        } else {
            ""
        };
        let _ = writeln!(out, "{:>8} {:>7}{marker}", bucket.name, bucket.images);
    }
    let _ = writeln!(
        out,
        "{} images in {} buckets: {}",
        report.summary.total_images,
        report.summary.buckets.len(),
        report.outcome.as_str()
    );
    for reason in &report.reasons {
        let _ = writeln!(out, "  - {reason}");
    }
    out
}
