use std::collections::BTreeMap;

use serde::Serialize;

use super::period::Period;
use super::record::DocumentCategory;
use super::result::{ComparisonRow, MatchStatus};
use crate::service::normalize::round2;

/// 数据质量统计 (每次对账重新计算)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQuality {
    pub tax_rows_read: usize,
    pub erp_rows_read: usize,
    pub tax_out_of_period: usize,
    pub erp_out_of_period: usize,
    /// 键字段为空而被拒绝的记录
    pub tax_rejected: usize,
    pub erp_rejected: usize,
    /// 同一数据源内重复的键 (后出现的记录覆盖先前的)
    pub tax_duplicate_keys: usize,
    pub erp_duplicate_keys: usize,
    /// ERP 单据号长度分布, 用于核对两侧补零规则是否一致
    pub erp_number_lengths: BTreeMap<usize, usize>,
}

impl DataQuality {
    pub fn has_warnings(&self) -> bool {
        self.tax_rejected + self.erp_rejected + self.tax_duplicate_keys + self.erp_duplicate_keys > 0
    }
}

/// 对账汇总
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconSummary {
    pub total: usize,
    pub matched: usize,
    pub amount_mismatch: usize,
    pub only_in_a: usize,
    pub only_in_b: usize,
    pub only_in_a_by_category: BTreeMap<DocumentCategory, usize>,
    pub vat_diff_sum: f64,
    pub total_diff_sum: f64,
}

impl ReconSummary {
    pub fn from_rows(rows: &[ComparisonRow]) -> Self {
        let mut summary = Self {
            total: rows.len(),
            ..Self::default()
        };

        for row in rows {
            match row.status {
                MatchStatus::Matched => summary.matched += 1,
                MatchStatus::AmountMismatch => summary.amount_mismatch += 1,
                MatchStatus::OnlyInB => summary.only_in_b += 1,
                MatchStatus::OnlyInA => {
                    summary.only_in_a += 1;
                    let category = row.category.unwrap_or(DocumentCategory::Other);
                    *summary.only_in_a_by_category.entry(category).or_insert(0) += 1;
                }
            }
            summary.vat_diff_sum += row.vat_diff;
            summary.total_diff_sum += row.total_diff;
        }

        summary.vat_diff_sum = round2(summary.vat_diff_sum);
        summary.total_diff_sum = round2(summary.total_diff_sum);
        summary
    }

    pub fn differences(&self) -> usize {
        self.total - self.matched
    }
}

/// 一次完整对账的结果
#[derive(Debug, Clone, Serialize)]
pub struct Reconciliation {
    pub period: Period,
    /// 先是按 B 侧顺序产生的行, 然后是剩余的 A 侧行 (按 A 侧原始顺序)
    pub rows: Vec<ComparisonRow>,
    pub quality: DataQuality,
}

impl Reconciliation {
    pub fn summary(&self) -> ReconSummary {
        ReconSummary::from_rows(&self.rows)
    }

    pub fn differences(&self) -> impl Iterator<Item = &ComparisonRow> {
        self.rows.iter().filter(|row| row.is_difference())
    }

    pub fn row(&self, key: &str) -> Option<&ComparisonRow> {
        self.rows.iter().find(|row| row.key.as_str() == key)
    }
}
