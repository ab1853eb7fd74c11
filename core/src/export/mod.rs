//! Report exporters.
//!
//! Each exporter is a pure function of already-fetched rows plus formatting
//! parameters and returns a fully-buffered file. None of them touch the
//! database or reorder their input.

pub mod chart;
pub mod report;
pub mod workbook;

pub use chart::render_reading_chart;
pub use report::{ReportLayout, build_report_pdf, layout_report};
pub use workbook::{build_workbook, workbook_tables};

pub const WORKBOOK_FILENAME: &str = "diatrack_data.xlsx";
pub const WORKBOOK_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

pub const REPORT_FILENAME: &str = "diatrack_report.pdf";
pub const REPORT_MIME: &str = "application/pdf";

/// Maximum number of readings included in the PDF report.
pub const REPORT_READING_LIMIT: usize = 50;
