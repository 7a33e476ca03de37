use serde::{Deserialize, Serialize};

use super::keys::digits_only;
use super::normalize::{absolute, round2};
use crate::models::{ComparisonRow, ErpRecord, MatchKey, MatchStatus, TaxRecord};

/// 金额差额容差 (货币单位), 吸收分位以下的舍入误差
pub const DEFAULT_TOLERANCE: f64 = 0.05;

/// B 侧金额的符号处理
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignHandling {
    /// 取绝对值后比较
    #[default]
    Absolute,
    /// 保留 ERP 原始符号 (旧版报表的行为)
    Signed,
}

impl SignHandling {
    pub fn apply(self, amount: f64) -> f64 {
        match self {
            Self::Absolute => absolute(amount),
            Self::Signed => amount,
        }
    }
}

/// 两侧都存在时的状态: 任一差额超出容差即为金额不符
pub fn status_for(vat_diff: f64, total_diff: f64, tolerance: f64) -> MatchStatus {
    if vat_diff.abs() > tolerance || total_diff.abs() > tolerance {
        MatchStatus::AmountMismatch
    } else {
        MatchStatus::Matched
    }
}

/// 两侧都存在的发票
pub fn compare_pair(
    key: MatchKey,
    tax: &TaxRecord,
    erp: &ErpRecord,
    sign: SignHandling,
    tolerance: f64,
) -> ComparisonRow {
    let vat_b = sign.apply(erp.vat_amount);
    let total_b = sign.apply(erp.total_amount);
    let vat_diff = round2(vat_b - tax.vat_amount);
    let total_diff = round2(total_b - tax.total_amount);

    ComparisonRow {
        key,
        status: status_for(vat_diff, total_diff, tolerance),
        issuer_name: preferred_name(&erp.name, &tax.issuer_name),
        tax_id: digits_only(&erp.document_tax_id),
        date_a: Some(tax.issue_date.clone()),
        date_b: Some(erp.date.clone()),
        vat_a: tax.vat_amount,
        vat_b,
        vat_diff,
        total_a: tax.total_amount,
        total_b,
        total_diff,
        category: Some(tax.category()),
    }
}

/// 只在税务局一侧: 差额 = 0 - A
pub fn only_in_a(key: MatchKey, tax: &TaxRecord) -> ComparisonRow {
    ComparisonRow {
        key,
        status: MatchStatus::OnlyInA,
        issuer_name: tax.issuer_name.trim().to_string(),
        tax_id: digits_only(&tax.issuer_tax_id),
        date_a: Some(tax.issue_date.clone()),
        date_b: None,
        vat_a: tax.vat_amount,
        vat_b: 0.0,
        vat_diff: round2(-tax.vat_amount),
        total_a: tax.total_amount,
        total_b: 0.0,
        total_diff: round2(-tax.total_amount),
        category: Some(tax.category()),
    }
}

/// 只在 ERP 一侧: 差额 = B - 0
pub fn only_in_b(key: MatchKey, erp: &ErpRecord, sign: SignHandling) -> ComparisonRow {
    let vat_b = sign.apply(erp.vat_amount);
    let total_b = sign.apply(erp.total_amount);

    ComparisonRow {
        key,
        status: MatchStatus::OnlyInB,
        issuer_name: erp.name.trim().to_string(),
        tax_id: digits_only(&erp.document_tax_id),
        date_a: None,
        date_b: Some(erp.date.clone()),
        vat_a: 0.0,
        vat_b,
        vat_diff: round2(vat_b),
        total_a: 0.0,
        total_b,
        total_diff: round2(total_b),
        category: None,
    }
}

fn preferred_name(erp_name: &str, tax_name: &str) -> String {
    let erp_name = erp_name.trim();
    if erp_name.is_empty() {
        tax_name.trim().to_string()
    } else {
        erp_name.to_string()
    }
}
