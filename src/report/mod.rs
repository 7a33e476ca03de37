pub mod csv_export;

pub use csv_export::{export_reports, format_amount, write_comparison_csv, ReportPaths, REPORT_HEADER};
