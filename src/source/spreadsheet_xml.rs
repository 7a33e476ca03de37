use std::path::PathBuf;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use super::{ErpSource, SourceInput, SourceSide};
use crate::error::ReconError;
use crate::models::ErpRecord;
use crate::service::normalize::{normalize_amount, NumberLocale};

/// 表头行的识别标记: 同时包含这两个标签的行即为表头
pub const HEADER_CODE_LABEL: &str = "CODIGO";
pub const HEADER_NAME_LABEL: &str = "DENOMINACION";

pub const COL_TAX_ID: &str = "Nº DOCUMENTO";
pub const COL_NUMBER: &str = "NUMERO";
pub const COL_DATE: &str = "FECHA";
pub const COL_NAME: &str = "DENOMINACION";
pub const COL_TOTAL: &str = "TOTAL";
pub const COL_VAT: &str = "IVA";

const SIDE: SourceSide = SourceSide::Erp;

/// 在哪些工作表中查找表头
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SheetLookup {
    /// 第一个包含表头的工作表
    #[default]
    AnySheet,
    /// 只看第一个工作表
    FirstSheet,
}

/// 一个工作表的单元格文本 (按行, 列位置已按 ss:Index 对齐)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Worksheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// ERP 导出的 Excel 2003 XML (SpreadsheetML)
#[derive(Debug, Clone)]
pub struct SpreadsheetXmlSource {
    input: SourceInput,
    lookup: SheetLookup,
}

impl SpreadsheetXmlSource {
    pub fn from_path(path: impl Into<PathBuf>, lookup: SheetLookup) -> Self {
        Self {
            input: SourceInput::Path(path.into()),
            lookup,
        }
    }

    pub fn from_text(text: impl Into<String>, lookup: SheetLookup) -> Self {
        Self {
            input: SourceInput::Text(text.into()),
            lookup,
        }
    }
}

impl ErpSource for SpreadsheetXmlSource {
    fn load_erp_records(&self) -> Result<Vec<ErpRecord>, ReconError> {
        let text = self.input.read_text(SIDE)?;
        parse_erp_workbook(&text, self.lookup)
    }
}

/// 解析 Workbook -> Worksheet -> Table -> Row -> Cell -> Data
pub fn parse_workbook(xml: &str) -> Result<Vec<Worksheet>, ReconError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut sheets: Vec<Worksheet> = Vec::new();
    let mut sheet: Option<Worksheet> = None;
    let mut row: Option<Vec<String>> = None;
    let mut in_cell = false;
    let mut in_data = false;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"Worksheet" => {
                    sheet = Some(Worksheet {
                        name: attribute(e, b"Name").unwrap_or_default(),
                        rows: Vec::new(),
                    });
                }
                b"Row" => row = Some(Vec::new()),
                b"Cell" => {
                    if let Some(cells) = row.as_mut() {
                        align_to_index(cells, e);
                    }
                    in_cell = true;
                    text.clear();
                }
                b"Data" if in_cell => in_data = true,
                _ => {}
            },
            Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"Worksheet" => sheets.push(Worksheet {
                    name: attribute(e, b"Name").unwrap_or_default(),
                    rows: Vec::new(),
                }),
                b"Row" => {
                    if let Some(current) = sheet.as_mut() {
                        current.rows.push(Vec::new());
                    }
                }
                b"Cell" => {
                    if let Some(cells) = row.as_mut() {
                        align_to_index(cells, e);
                        cells.push(String::new());
                    }
                }
                _ => {}
            },
            Ok(Event::Text(ref e)) if in_data => {
                let raw = String::from_utf8_lossy(e.as_ref());
                match quick_xml::escape::unescape(&raw) {
                    Ok(unescaped) => text.push_str(&unescaped),
                    Err(_) => text.push_str(&raw),
                }
            }
            Ok(Event::CData(ref e)) if in_data => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Ok(Event::GeneralRef(ref e)) if in_data => {
                text.push_str(&resolve_reference(&String::from_utf8_lossy(e)));
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"Data" => in_data = false,
                b"Cell" => {
                    if let Some(cells) = row.as_mut() {
                        cells.push(text.trim().to_string());
                    }
                    text.clear();
                    in_cell = false;
                    in_data = false;
                }
                b"Row" => {
                    if let (Some(current), Some(cells)) = (sheet.as_mut(), row.take()) {
                        current.rows.push(cells);
                    }
                }
                b"Worksheet" => {
                    if let Some(current) = sheet.take() {
                        sheets.push(current);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ReconError::Xml {
                    side: SIDE,
                    message: format!("at position {}: {e}", reader.buffer_position()),
                })
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// 解析 ERP 工作簿并按表头映射为记录
pub fn parse_erp_workbook(xml: &str, lookup: SheetLookup) -> Result<Vec<ErpRecord>, ReconError> {
    let sheets = parse_workbook(xml)?;
    if sheets.is_empty() {
        return Err(ReconError::NoWorksheet { side: SIDE });
    }

    let candidates = match lookup {
        SheetLookup::FirstSheet => &sheets[..1],
        SheetLookup::AnySheet => &sheets[..],
    };

    let (sheet, header_idx) = candidates
        .iter()
        .find_map(|sheet| find_header_row(sheet).map(|idx| (sheet, idx)))
        .ok_or(ReconError::HeaderNotFound {
            side: SIDE,
            code: HEADER_CODE_LABEL,
            name: HEADER_NAME_LABEL,
        })?;

    let header = &sheet.rows[header_idx];
    let require = |name: &'static str| {
        header
            .iter()
            .position(|label| label == name)
            .ok_or(ReconError::MissingColumn { side: SIDE, column: name })
    };
    let tax_id = require(COL_TAX_ID)?;
    let number = require(COL_NUMBER)?;
    let date = require(COL_DATE)?;
    let name = require(COL_NAME)?;
    let total = require(COL_TOTAL)?;
    let vat = require(COL_VAT)?;

    tracing::debug!(
        "ERP 表头位于工作表 '{}' 第 {} 行",
        sheet.name,
        header_idx + 1
    );

    let records: Vec<ErpRecord> = sheet.rows[header_idx + 1..]
        .iter()
        .filter(|cells| cells.iter().any(|c| !c.is_empty()))
        .map(|cells| {
            let cell = |idx: usize| cells.get(idx).map(String::as_str).unwrap_or("");
            ErpRecord {
                document_tax_id: cell(tax_id).to_string(),
                document_number: cell(number).to_string(),
                date: cell(date).to_string(),
                name: cell(name).to_string(),
                total_amount: normalize_amount(cell(total), NumberLocale::Plain),
                vat_amount: normalize_amount(cell(vat), NumberLocale::Plain),
            }
        })
        .collect();

    tracing::info!("ERP 记录读取完成: {} 条 (工作表 '{}')", records.len(), sheet.name);
    Ok(records)
}

fn find_header_row(sheet: &Worksheet) -> Option<usize> {
    sheet.rows.iter().position(|cells| {
        cells.iter().any(|c| c == HEADER_CODE_LABEL) && cells.iter().any(|c| c == HEADER_NAME_LABEL)
    })
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local)
        .map(|attr| String::from_utf8_lossy(&attr.value).to_string())
}

/// ss:Index 为 1 起始的列号, 跳过的列补空串
fn align_to_index(cells: &mut Vec<String>, e: &BytesStart<'_>) {
    let index = attribute(e, b"Index").and_then(|v| v.trim().parse::<usize>().ok());
    if let Some(index) = index {
        while cells.len() + 1 < index {
            cells.push(String::new());
        }
    }
}

fn resolve_reference(name: &str) -> String {
    let resolved = match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        _ => name
            .strip_prefix("#x")
            .or_else(|| name.strip_prefix("#X"))
            .map(|hex| u32::from_str_radix(hex, 16))
            .or_else(|| name.strip_prefix('#').map(str::parse::<u32>))
            .and_then(Result::ok)
            .and_then(char::from_u32),
    };

    match resolved {
        Some(c) => c.to_string(),
        None => format!("&{name};"),
    }
}
