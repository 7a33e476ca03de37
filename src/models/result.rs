use std::fmt;

use serde::Serialize;

use super::record::DocumentCategory;

/// 匹配键: 纳税人号 (仅数字) + 销售点 + 单据号
///
/// 同一张发票在两个数据源中必须得到同一个键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct MatchKey(String);

impl MatchKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 对账状态 (A = 税务局, B = ERP)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Matched,
    OnlyInA,
    OnlyInB,
    AmountMismatch,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Matched => write!(f, "MATCHED"),
            Self::OnlyInA => write!(f, "ONLY_IN_A"),
            Self::OnlyInB => write!(f, "ONLY_IN_B"),
            Self::AmountMismatch => write!(f, "AMOUNT_MISMATCH"),
        }
    }
}

/// 对比结果行, 每个不同的键恰好一行
///
/// 差额一律为 B - A (均取两位小数)；缺失一侧的金额为 0。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub key: MatchKey,
    pub status: MatchStatus,
    pub issuer_name: String,
    pub tax_id: String,
    pub date_a: Option<String>,
    pub date_b: Option<String>,
    pub vat_a: f64,
    pub vat_b: f64,
    pub vat_diff: f64,
    pub total_a: f64,
    pub total_b: f64,
    pub total_diff: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<DocumentCategory>,
}

impl ComparisonRow {
    pub fn is_difference(&self) -> bool {
        self.status != MatchStatus::Matched
    }
}
