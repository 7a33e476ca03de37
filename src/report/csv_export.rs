use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use csv::WriterBuilder;
use serde::Serialize;

use crate::config::ReportConfig;
use crate::error::ReconError;
use crate::models::{ComparisonRow, Reconciliation};

pub const REPORT_HEADER: [&str; 12] = [
    "ID", "STATUS", "TAX_ID", "NAME", "DATE_A", "DATE_B", "VAT_A", "VAT_B", "VAT_DIFF", "TOTAL_A", "TOTAL_B",
    "TOTAL_DIFF",
];

/// 已写出的报表文件
#[derive(Debug, Clone, Serialize)]
pub struct ReportPaths {
    pub general: PathBuf,
    pub differences: PathBuf,
}

/// 两位小数; `decimal_comma` 时使用逗号作小数点 (西语 Excel)
pub fn format_amount(value: f64, decimal_comma: bool) -> String {
    let formatted = format!("{value:.2}");
    if decimal_comma {
        formatted.replace('.', ",")
    } else {
        formatted
    }
}

/// 以 `;` 分隔写出对比行
pub fn write_comparison_csv<'a, W, I>(rows: I, writer: W, decimal_comma: bool) -> Result<(), ReconError>
where
    W: Write,
    I: IntoIterator<Item = &'a ComparisonRow>,
{
    let mut writer = WriterBuilder::new().delimiter(b';').from_writer(writer);
    writer.write_record(REPORT_HEADER)?;

    let amount = |v: f64| format_amount(v, decimal_comma);
    for row in rows {
        writer.write_record([
            row.key.to_string(),
            row.status.to_string(),
            row.tax_id.clone(),
            row.issuer_name.clone(),
            row.date_a.clone().unwrap_or_default(),
            row.date_b.clone().unwrap_or_default(),
            amount(row.vat_a),
            amount(row.vat_b),
            amount(row.vat_diff),
            amount(row.total_a),
            amount(row.total_b),
            amount(row.total_diff),
        ])?;
    }

    writer.flush().map_err(|e| ReconError::Report(e.to_string()))?;
    Ok(())
}

/// 写出完整报表与仅差异报表
pub fn export_reports(reconciliation: &Reconciliation, config: &ReportConfig) -> Result<ReportPaths, ReconError> {
    fs::create_dir_all(&config.output_dir).map_err(|e| {
        ReconError::Report(format!("cannot create {}: {e}", config.output_dir.display()))
    })?;

    let paths = ReportPaths {
        general: config.general_path(reconciliation.period),
        differences: config.differences_path(reconciliation.period),
    };

    let create = |path: &PathBuf| {
        File::create(path).map_err(|e| ReconError::Report(format!("cannot create {}: {e}", path.display())))
    };

    write_comparison_csv(&reconciliation.rows, create(&paths.general)?, config.decimal_comma)?;
    write_comparison_csv(reconciliation.differences(), create(&paths.differences)?, config.decimal_comma)?;

    tracing::info!(
        "报表已生成: {} / {}",
        paths.general.display(),
        paths.differences.display()
    );
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DataQuality, MatchKey, MatchStatus, Period};

    fn row(key: &str, status: MatchStatus, name: &str) -> ComparisonRow {
        ComparisonRow {
            key: MatchKey::new(key),
            status,
            issuer_name: name.into(),
            tax_id: "20123456789".into(),
            date_a: Some("2025-11-03".into()),
            date_b: None,
            vat_a: 4805.0,
            vat_b: 0.0,
            vat_diff: -4805.0,
            total_a: 27685.95,
            total_b: 0.0,
            total_diff: -27685.95,
            category: None,
        }
    }

    #[test]
    fn formats_amounts() {
        assert_eq!(format_amount(27685.95, true), "27685,95");
        assert_eq!(format_amount(-0.5, false), "-0.50");
        assert_eq!(format_amount(0.0, true), "0,00");
    }

    #[test]
    fn writes_header_and_rows() {
        let rows = vec![row("K1", MatchStatus::OnlyInA, "SERVICIOS; DEL SUR")];
        let mut out = Vec::new();
        write_comparison_csv(&rows, &mut out, true).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], REPORT_HEADER.join(";"));
        assert_eq!(
            lines[1],
            "K1;ONLY_IN_A;20123456789;\"SERVICIOS; DEL SUR\";2025-11-03;;4805,00;0,00;-4805,00;27685,95;0,00;-27685,95"
        );
    }

    #[test]
    fn exports_general_and_differences_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = ReportConfig {
            output_dir: dir.path().join("out"),
            ..ReportConfig::default()
        };

        let mut matched = row("K1", MatchStatus::Matched, "A");
        matched.vat_diff = 0.0;
        let reconciliation = Reconciliation {
            period: Period::new(11, 2025).unwrap(),
            rows: vec![matched, row("K2", MatchStatus::OnlyInA, "B")],
            quality: DataQuality::default(),
        };

        let paths = export_reports(&reconciliation, &config).unwrap();
        let general = std::fs::read_to_string(&paths.general).unwrap();
        let differences = std::fs::read_to_string(&paths.differences).unwrap();

        assert_eq!(general.lines().count(), 3);
        assert_eq!(differences.lines().count(), 2);
        assert!(differences.contains("K2;ONLY_IN_A"));
        assert!(!differences.contains("K1;"));
        assert!(paths.general.ends_with("comparativo_2025-11.csv"));
    }
}
