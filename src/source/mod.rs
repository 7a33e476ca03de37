//! 数据源适配器
//!
//! 引擎只依赖 [`TaxSource`] / [`ErpSource`] 两个能力; 文件格式的差异 (单工作表/多工作表、
//! 编码) 都留在适配器内部。

pub mod afip_csv;
pub mod spreadsheet_xml;

use std::borrow::Cow;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ReconError;
use crate::models::{ErpRecord, TaxRecord};

pub use afip_csv::{parse_tax_csv, AfipCsvSource};
pub use spreadsheet_xml::{parse_erp_workbook, parse_workbook, SheetLookup, SpreadsheetXmlSource, Worksheet};

/// 能产出 A 侧 (税务局) 记录的数据源
pub trait TaxSource {
    fn load_tax_records(&self) -> Result<Vec<TaxRecord>, ReconError>;
}

/// 能产出 B 侧 (ERP) 记录的数据源
pub trait ErpSource {
    fn load_erp_records(&self) -> Result<Vec<ErpRecord>, ReconError>;
}

impl TaxSource for [TaxRecord] {
    fn load_tax_records(&self) -> Result<Vec<TaxRecord>, ReconError> {
        Ok(self.to_vec())
    }
}

impl ErpSource for [ErpRecord] {
    fn load_erp_records(&self) -> Result<Vec<ErpRecord>, ReconError> {
        Ok(self.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceSide {
    TaxAuthority,
    Erp,
}

impl fmt::Display for SourceSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TaxAuthority => write!(f, "tax-authority feed (A)"),
            Self::Erp => write!(f, "ERP feed (B)"),
        }
    }
}

/// 数据源内容: 磁盘文件或已上传的文本
#[derive(Debug, Clone)]
pub enum SourceInput {
    Path(PathBuf),
    Text(String),
}

impl SourceInput {
    pub fn read_text(&self, side: SourceSide) -> Result<Cow<'_, str>, ReconError> {
        match self {
            Self::Text(text) => Ok(Cow::Borrowed(text.strip_prefix('\u{feff}').unwrap_or(text))),
            Self::Path(path) => {
                let bytes = std::fs::read(path).map_err(|error| ReconError::Io {
                    side,
                    path: path.clone(),
                    error,
                })?;
                tracing::debug!("{}: 读取 {} ({} bytes)", side, path.display(), bytes.len());
                Ok(Cow::Owned(decode_bytes(bytes)))
            }
        }
    }
}

/// UTF-8 优先; 否则按 Windows-1252 解码 (税务局导出常为 Latin-1)
pub fn decode_bytes(bytes: Vec<u8>) -> String {
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    };

    match text.strip_prefix('\u{feff}') {
        Some(stripped) => stripped.to_string(),
        None => text,
    }
}
