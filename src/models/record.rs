use serde::{Deserialize, Serialize};

/// 税务局 (AFIP) 导出记录 - A 侧
///
/// 金额在源文件中总是非负。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaxRecord {
    pub issuer_tax_id: String,   // Nro. Doc. Emisor
    pub point_of_sale: String,   // Punto de Venta
    pub document_number: String, // Número Desde
    pub issue_date: String,      // YYYY-MM-DD
    pub issuer_name: String,
    pub document_type: String,   // Tipo de Comprobante, 可能为空
    pub vat_amount: f64,
    pub total_amount: f64,
}

impl TaxRecord {
    pub fn category(&self) -> DocumentCategory {
        DocumentCategory::from_type_code(&self.document_type)
    }
}

/// ERP (Protheus) 导出记录 - B 侧
///
/// 金额带符号 (贷/借方向), 与 A 侧的约定无关。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErpRecord {
    pub document_tax_id: String, // Nº DOCUMENTO, 可能带 '-'
    pub document_number: String, // NUMERO, 通常已是 12 位 (4 位销售点 + 8 位序号)
    pub date: String,            // DD/MM/YYYY
    pub name: String,
    pub total_amount: f64,
    pub vat_amount: f64,
}

/// 单据类别, 按税务局的单据类型代码划分
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    Invoice,
    Note,
    Other,
}

impl DocumentCategory {
    const INVOICE_CODES: [&'static str; 5] = ["1", "6", "11", "19", "51"];
    const NOTE_CODES: [&'static str; 10] = ["2", "3", "7", "8", "12", "13", "20", "21", "52", "53"];

    pub fn from_type_code(code: &str) -> Self {
        let code = code.trim().trim_start_matches('0');
        if Self::INVOICE_CODES.contains(&code) {
            Self::Invoice
        } else if Self::NOTE_CODES.contains(&code) {
            Self::Note
        } else {
            Self::Other
        }
    }
}
