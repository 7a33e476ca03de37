use std::path::PathBuf;

use csv::{ReaderBuilder, StringRecord, Trim};

use super::{SourceInput, SourceSide, TaxSource};
use crate::error::ReconError;
use crate::models::TaxRecord;
use crate::service::normalize::{normalize_amount, NumberLocale};

pub const COL_ISSUE_DATE: &str = "Fecha de Emisión";
pub const COL_POINT_OF_SALE: &str = "Punto de Venta";
pub const COL_DOCUMENT_NUMBER: &str = "Número Desde";
pub const COL_ISSUER_TAX_ID: &str = "Nro. Doc. Emisor";
pub const COL_ISSUER_NAME: &str = "Denominación Emisor";
pub const COL_VAT: &str = "Total IVA";
pub const COL_TOTAL: &str = "Imp. Total";
pub const COL_DOCUMENT_TYPE: &str = "Tipo de Comprobante";

const SIDE: SourceSide = SourceSide::TaxAuthority;

/// 税务局 `;` 分隔导出 (带表头)
#[derive(Debug, Clone)]
pub struct AfipCsvSource {
    input: SourceInput,
}

impl AfipCsvSource {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            input: SourceInput::Path(path.into()),
        }
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            input: SourceInput::Text(text.into()),
        }
    }
}

impl TaxSource for AfipCsvSource {
    fn load_tax_records(&self) -> Result<Vec<TaxRecord>, ReconError> {
        let text = self.input.read_text(SIDE)?;
        parse_tax_csv(&text)
    }
}

/// 表头中各列的位置
struct Columns {
    issue_date: usize,
    point_of_sale: usize,
    document_number: usize,
    issuer_tax_id: usize,
    issuer_name: usize,
    vat: usize,
    total: usize,
    document_type: Option<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord) -> Result<Self, ReconError> {
        let find = |name: &'static str| headers.iter().position(|h| h.trim_start_matches('\u{feff}').trim() == name);
        let require = |name: &'static str| find(name).ok_or(ReconError::MissingColumn { side: SIDE, column: name });

        Ok(Self {
            issue_date: require(COL_ISSUE_DATE)?,
            point_of_sale: require(COL_POINT_OF_SALE)?,
            document_number: require(COL_DOCUMENT_NUMBER)?,
            issuer_tax_id: require(COL_ISSUER_TAX_ID)?,
            issuer_name: require(COL_ISSUER_NAME)?,
            vat: require(COL_VAT)?,
            total: require(COL_TOTAL)?,
            document_type: find(COL_DOCUMENT_TYPE),
        })
    }
}

/// 解析税务局 CSV
///
/// 缺少必需列即失败; 单元格缺失按空串处理, 金额无法解析按 0 处理。
pub fn parse_tax_csv(text: &str) -> Result<Vec<TaxRecord>, ReconError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let csv_error = |e: csv::Error| ReconError::Csv {
        side: SIDE,
        message: e.to_string(),
    };

    let headers = reader.headers().map_err(csv_error)?.clone();
    let columns = Columns::locate(&headers)?;

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result.map_err(csv_error)?;
        if row.iter().all(str::is_empty) {
            continue;
        }

        let cell = |idx: usize| row.get(idx).unwrap_or("").to_string();
        records.push(TaxRecord {
            issuer_tax_id: cell(columns.issuer_tax_id),
            point_of_sale: cell(columns.point_of_sale),
            document_number: cell(columns.document_number),
            issue_date: cell(columns.issue_date),
            issuer_name: cell(columns.issuer_name),
            document_type: columns.document_type.map(cell).unwrap_or_default(),
            vat_amount: normalize_amount(row.get(columns.vat).unwrap_or(""), NumberLocale::DecimalComma),
            total_amount: normalize_amount(row.get(columns.total).unwrap_or(""), NumberLocale::DecimalComma),
        });
    }

    tracing::info!("税务局记录读取完成: {} 条", records.len());
    Ok(records)
}
