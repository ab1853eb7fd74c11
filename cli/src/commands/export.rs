use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::ValueEnum;

use diatrack_core::export::{REPORT_FILENAME, WORKBOOK_FILENAME};
use diatrack_core::models::User;
use diatrack_core::service::DiatrackService;

pub(crate) const CHART_FILENAME: &str = "diatrack_chart.png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ExportFormat {
    /// Two-sheet spreadsheet of readings and food log
    Xlsx,
    /// Summary report of the 50 most recent readings
    Pdf,
    /// Blood sugar trend chart
    Chart,
}

impl ExportFormat {
    fn default_file_name(self) -> &'static str {
        match self {
            Self::Xlsx => WORKBOOK_FILENAME,
            Self::Pdf => REPORT_FILENAME,
            Self::Chart => CHART_FILENAME,
        }
    }
}

fn render(svc: &DiatrackService, user: &User, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => svc.export_workbook(user.id),
        ExportFormat::Pdf => svc.export_report(user.id, Local::now().naive_local()),
        ExportFormat::Chart => match svc.dashboard_chart(user.id)? {
            Some(png) => Ok(png),
            None => bail!("No readings yet, nothing to chart"),
        },
    }
}

pub(crate) fn cmd_export(
    svc: &DiatrackService,
    user: &User,
    format: ExportFormat,
    out: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let path = out.unwrap_or_else(|| PathBuf::from(format.default_file_name()));
    let bytes = render(svc, user, format)?;
    write_export(&path, &bytes)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "path": path.display().to_string(), "bytes": bytes.len() })
        );
    } else {
        println!("Wrote {} ({} bytes)", path.display(), bytes.len());
    }

    Ok(())
}

fn write_export(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))
}
