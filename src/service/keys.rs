use serde::{Deserialize, Serialize};

use crate::models::{ErpRecord, MatchKey, TaxRecord};

pub const POINT_OF_SALE_WIDTH: usize = 4;
pub const SEQUENCE_WIDTH: usize = 8;

/// ERP 单据号 (NUMERO) 的取值方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErpNumberScheme {
    /// 原样使用 (仅去首尾空白), ERP 已输出 4 位销售点 + 8 位序号
    #[default]
    AsGiven,
    /// 去掉所有非数字字符: "0004-00025904" -> "000400025904"
    DigitsOnly,
    /// 按 '-' 拆成销售点/序号分别补零; 不含 '-' 的数字串补足 12 位
    Padded,
}

impl ErpNumberScheme {
    pub fn apply(self, raw: &str) -> String {
        let raw = raw.trim();
        match self {
            Self::AsGiven => raw.to_string(),
            Self::DigitsOnly => digits_only(raw),
            Self::Padded => match raw.split_once('-') {
                Some((pos, seq)) => format!(
                    "{}{}",
                    left_pad(&digits_only(pos), POINT_OF_SALE_WIDTH),
                    left_pad(&digits_only(seq), SEQUENCE_WIDTH)
                ),
                None => left_pad(&digits_only(raw), POINT_OF_SALE_WIDTH + SEQUENCE_WIDTH),
            },
        }
    }
}

pub fn digits_only(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}

fn left_pad(raw: &str, width: usize) -> String {
    format!("{raw:0>width$}")
}

/// A 侧键: 纳税人号 (仅数字) + 销售点 (补零到 4 位) + 单据号 (补零到 8 位)
///
/// 任一字段为空时返回 `None`, 记录不参与匹配。
pub fn key_for_tax_record(record: &TaxRecord) -> Option<MatchKey> {
    let tax_id = digits_only(&record.issuer_tax_id);
    let point_of_sale = record.point_of_sale.trim();
    let number = record.document_number.trim();

    if tax_id.is_empty() || point_of_sale.is_empty() || number.is_empty() {
        return None;
    }

    Some(MatchKey::new(format!(
        "{tax_id}{}{}",
        left_pad(point_of_sale, POINT_OF_SALE_WIDTH),
        left_pad(number, SEQUENCE_WIDTH)
    )))
}

/// B 侧键: 纳税人号 (仅数字) + 单据号 (按 `scheme` 处理)
pub fn key_for_erp_record(record: &ErpRecord, scheme: ErpNumberScheme) -> Option<MatchKey> {
    let tax_id = digits_only(&record.document_tax_id);
    let number = scheme.apply(&record.document_number);

    if tax_id.is_empty() || number.trim_start_matches('0').is_empty() {
        return None;
    }

    Some(MatchKey::new(format!("{tax_id}{number}")))
}
