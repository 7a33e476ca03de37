use indexmap::map::Entry;
use indexmap::IndexMap;
use rayon::prelude::*;

use super::classify::{self, SignHandling, DEFAULT_TOLERANCE};
use super::keys::{key_for_erp_record, key_for_tax_record, ErpNumberScheme};
use super::normalize::is_in_period;
use crate::error::ReconError;
use crate::models::{DataQuality, ErpRecord, MatchKey, Period, Reconciliation, TaxRecord};
use crate::source::{ErpSource, TaxSource};

/// 匹配参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchOptions {
    pub tolerance: f64,
    pub erp_sign: SignHandling,
    pub erp_number: ErpNumberScheme,
}

impl Default for MatchOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            erp_sign: SignHandling::default(),
            erp_number: ErpNumberScheme::default(),
        }
    }
}

/// 预处理结果: 期间过滤 + 生成键
enum Prepared<'a, R> {
    OutOfPeriod,
    Rejected,
    Keyed(MatchKey, &'a R),
}

/// 对账引擎
///
/// 不持有任何跨次运行的状态: 每次 `reconcile` 都重新建立工作表。
pub struct ReconEngine {
    options: MatchOptions,
}

impl ReconEngine {
    pub fn new(options: MatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &MatchOptions {
        &self.options
    }

    /// 两阶段对账
    ///
    /// 1. 按期间过滤 A 侧, 建立 `键 -> 记录` 工作表 (重复键后者覆盖前者, 位置保留首次出现)
    /// 2. 按 B 侧顺序逐条查找: 命中则从工作表移除并比较金额, 未命中即 ONLY_IN_B
    /// 3. 工作表中剩余的全部是 ONLY_IN_A, 按 A 侧原始顺序追加
    pub fn reconcile(&self, tax: &[TaxRecord], erp: &[ErpRecord], period: Period) -> Reconciliation {
        let mut quality = DataQuality {
            tax_rows_read: tax.len(),
            erp_rows_read: erp.len(),
            ..DataQuality::default()
        };

        // Phase 1: A 侧工作表, 值为 (首次出现序号, 记录)
        let prepared_tax: Vec<Prepared<'_, TaxRecord>> = tax
            .par_iter()
            .map(|record| {
                if !is_in_period(&record.issue_date, period) {
                    return Prepared::OutOfPeriod;
                }
                match key_for_tax_record(record) {
                    Some(key) => Prepared::Keyed(key, record),
                    None => Prepared::Rejected,
                }
            })
            .collect();

        let mut pending_tax: IndexMap<MatchKey, (usize, &TaxRecord)> = IndexMap::with_capacity(prepared_tax.len());
        for prepared in prepared_tax {
            match prepared {
                Prepared::OutOfPeriod => quality.tax_out_of_period += 1,
                Prepared::Rejected => quality.tax_rejected += 1,
                Prepared::Keyed(key, record) => {
                    let seq = pending_tax.len();
                    match pending_tax.entry(key) {
                        Entry::Occupied(mut slot) => {
                            quality.tax_duplicate_keys += 1;
                            slot.get_mut().1 = record;
                        }
                        Entry::Vacant(slot) => {
                            slot.insert((seq, record));
                        }
                    }
                }
            }
        }

        // Phase 2: B 侧同样去重, 保持 B 的顺序
        let erp_number = self.options.erp_number;
        let prepared_erp: Vec<Prepared<'_, ErpRecord>> = erp
            .par_iter()
            .map(|record| {
                if !is_in_period(&record.date, period) {
                    return Prepared::OutOfPeriod;
                }
                match key_for_erp_record(record, erp_number) {
                    Some(key) => Prepared::Keyed(key, record),
                    None => Prepared::Rejected,
                }
            })
            .collect();

        let mut erp_by_key: IndexMap<MatchKey, &ErpRecord> = IndexMap::with_capacity(prepared_erp.len());
        for prepared in prepared_erp {
            match prepared {
                Prepared::OutOfPeriod => quality.erp_out_of_period += 1,
                Prepared::Rejected => quality.erp_rejected += 1,
                Prepared::Keyed(key, record) => {
                    let length = record.document_number.trim().chars().count();
                    *quality.erp_number_lengths.entry(length).or_insert(0) += 1;
                    if erp_by_key.insert(key, record).is_some() {
                        quality.erp_duplicate_keys += 1;
                    }
                }
            }
        }

        tracing::info!(
            "期间 {}: A 侧 {} 条 (工作表 {} 个键), B 侧 {} 条 ({} 个键)",
            period,
            quality.tax_rows_read,
            pending_tax.len(),
            quality.erp_rows_read,
            erp_by_key.len()
        );

        // Phase 3: 正向消费 A 侧工作表
        let mut rows = Vec::with_capacity(erp_by_key.len() + pending_tax.len());
        for (key, erp_record) in erp_by_key {
            let row = match pending_tax.swap_remove(&key) {
                Some((_, tax_record)) => classify::compare_pair(
                    key,
                    tax_record,
                    erp_record,
                    self.options.erp_sign,
                    self.options.tolerance,
                ),
                None => classify::only_in_b(key, erp_record, self.options.erp_sign),
            };
            rows.push(row);
        }

        // Phase 4: 剩余即 ONLY_IN_A; swap_remove 打乱了顺序, 按首次出现序号还原
        let mut remaining: Vec<(MatchKey, (usize, &TaxRecord))> = pending_tax.into_iter().collect();
        remaining.sort_unstable_by_key(|(_, (seq, _))| *seq);
        rows.extend(
            remaining
                .into_iter()
                .map(|(key, (_, tax_record))| classify::only_in_a(key, tax_record)),
        );

        if quality.has_warnings() {
            tracing::warn!(
                "数据质量: 重复键 A={} B={}, 键字段缺失 A={} B={}",
                quality.tax_duplicate_keys,
                quality.erp_duplicate_keys,
                quality.tax_rejected,
                quality.erp_rejected
            );
        }

        let reconciliation = Reconciliation {
            period,
            rows,
            quality,
        };

        let summary = reconciliation.summary();
        tracing::info!(
            "对账完成 {}: 共 {} 行, 一致 {}, 金额不符 {}, 仅 A {}, 仅 B {}",
            period,
            summary.total,
            summary.matched,
            summary.amount_mismatch,
            summary.only_in_a,
            summary.only_in_b
        );

        reconciliation
    }
}

/// 从两个数据源读取并对账
///
/// 任一数据源读取/解析失败即中止, 不会基于不完整的数据给出部分结果。
pub fn run<T, E>(tax_source: &T, erp_source: &E, period: Period, options: MatchOptions) -> Result<Reconciliation, ReconError>
where
    T: TaxSource + ?Sized,
    E: ErpSource + ?Sized,
{
    let tax = tax_source.load_tax_records()?;
    tracing::debug!("A 侧读取 {} 条记录", tax.len());

    let erp = erp_source.load_erp_records()?;
    tracing::debug!("B 侧读取 {} 条记录", erp.len());

    Ok(ReconEngine::new(options).reconcile(&tax, &erp, period))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::models::MatchStatus;

    const CUIT: &str = "20123456789";

    fn tax(pos: &str, number: &str, date: &str, vat: f64, total: f64) -> TaxRecord {
        TaxRecord {
            issuer_tax_id: CUIT.into(),
            point_of_sale: pos.into(),
            document_number: number.into(),
            issue_date: date.into(),
            issuer_name: format!("EMISOR {number}"),
            document_type: "1".into(),
            vat_amount: vat,
            total_amount: total,
        }
    }

    fn erp(number: &str, date: &str, vat: f64, total: f64) -> ErpRecord {
        ErpRecord {
            document_tax_id: "20-12345678-9".into(),
            document_number: number.into(),
            date: date.into(),
            name: format!("ERP {number}"),
            total_amount: total,
            vat_amount: vat,
        }
    }

    fn key(pos: u32, number: u32) -> String {
        format!("{CUIT}{pos:04}{number:08}")
    }

    fn november() -> Period {
        Period::new(11, 2025).unwrap()
    }

    fn engine() -> ReconEngine {
        ReconEngine::new(MatchOptions::default())
    }

    #[test]
    fn end_to_end_scenario() {
        let a = vec![tax("1", "10", "2025-11-10", 100.0, 1100.0)];
        let b = vec![
            erp("000100000010", "10/11/2025", -100.0, -1100.0),
            erp("000100000020", "12/11/2025", 50.0, 550.0),
        ];

        let result = engine().reconcile(&a, &b, november());
        assert_eq!(result.rows.len(), 2);

        let k1 = &result.rows[0];
        assert_eq!(k1.key.as_str(), key(1, 10));
        assert_eq!(k1.status, MatchStatus::Matched);
        assert_eq!((k1.vat_diff, k1.total_diff), (0.0, 0.0));

        let k2 = &result.rows[1];
        assert_eq!(k2.key.as_str(), key(1, 20));
        assert_eq!(k2.status, MatchStatus::OnlyInB);
        assert_eq!((k2.vat_diff, k2.total_diff), (50.0, 550.0));
    }

    #[test]
    fn output_partitions_the_key_universe() {
        let a = vec![
            tax("1", "1", "2025-11-01", 10.0, 110.0),
            tax("1", "2", "2025-11-02", 20.0, 220.0),
            tax("1", "3", "2025-11-03", 30.0, 330.0),
            tax("2", "1", "2025-11-04", 40.0, 440.0),
        ];
        let b = vec![
            erp("000100000002", "02/11/2025", -20.0, -220.0),
            erp("000900000009", "09/11/2025", 9.0, 99.0),
            erp("000200000001", "04/11/2025", 40.5, 440.0),
        ];

        let result = engine().reconcile(&a, &b, november());

        let keys: Vec<&str> = result.rows.iter().map(|r| r.key.as_str()).collect();
        let unique: HashSet<&str> = keys.iter().copied().collect();
        assert_eq!(keys.len(), unique.len(), "a key appeared twice");

        let expected: HashSet<String> = [key(1, 1), key(1, 2), key(1, 3), key(2, 1), key(9, 9)].into_iter().collect();
        let actual: HashSet<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(actual, expected);

        let summary = result.summary();
        assert_eq!(summary.matched, 1);
        assert_eq!(summary.amount_mismatch, 1);
        assert_eq!(summary.only_in_b, 1);
        assert_eq!(summary.only_in_a, 2);
        assert_eq!(
            summary.matched + summary.amount_mismatch + summary.only_in_a + summary.only_in_b,
            summary.total
        );
    }

    #[test]
    fn rows_follow_b_order_then_remaining_a_order() {
        let a = vec![
            tax("1", "5", "2025-11-01", 1.0, 1.0),
            tax("1", "3", "2025-11-01", 1.0, 1.0),
            tax("1", "1", "2025-11-01", 1.0, 1.0),
            tax("1", "4", "2025-11-01", 1.0, 1.0),
            tax("1", "2", "2025-11-01", 1.0, 1.0),
        ];
        let b = vec![
            erp("000100000004", "01/11/2025", 1.0, 1.0),
            erp("000100000099", "01/11/2025", 1.0, 1.0),
            erp("000100000005", "01/11/2025", 1.0, 1.0),
        ];

        let result = engine().reconcile(&a, &b, november());
        let order: Vec<String> = result.rows.iter().map(|r| r.key.to_string()).collect();
        assert_eq!(
            order,
            vec![key(1, 4), key(1, 99), key(1, 5), key(1, 3), key(1, 1), key(1, 2)]
        );
    }

    #[test]
    fn duplicate_tax_key_keeps_last_record() {
        let a = vec![
            tax("1", "7", "2025-11-01", 10.0, 100.0),
            tax("1", "8", "2025-11-01", 1.0, 1.0),
            tax("0001", "00000007", "2025-11-02", 12.0, 120.0),
        ];
        let b = vec![erp("000100000007", "02/11/2025", 12.0, 120.0)];

        let result = engine().reconcile(&a, &b, november());
        assert_eq!(result.quality.tax_duplicate_keys, 1);

        let row = result.row(&key(1, 7)).unwrap();
        assert_eq!(row.status, MatchStatus::Matched);
        assert_eq!(row.vat_a, 12.0);
        assert_eq!(row.date_a.as_deref(), Some("2025-11-02"));
    }

    #[test]
    fn duplicate_tax_key_keeps_first_position_when_unmatched() {
        let a = vec![
            tax("1", "7", "2025-11-01", 10.0, 100.0),
            tax("1", "8", "2025-11-01", 1.0, 1.0),
            tax("1", "7", "2025-11-03", 30.0, 300.0),
        ];

        let result = engine().reconcile(&a, &[], november());
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].key.as_str(), key(1, 7));
        assert_eq!(result.rows[0].total_a, 300.0);
        assert_eq!(result.rows[1].key.as_str(), key(1, 8));
    }

    #[test]
    fn duplicate_erp_key_yields_a_single_row() {
        let a = vec![tax("1", "7", "2025-11-01", 10.0, 100.0)];
        let b = vec![
            erp("000100000007", "01/11/2025", 99.0, 999.0),
            erp("000100000007", "01/11/2025", 10.0, 100.0),
        ];

        let result = engine().reconcile(&a, &b, november());
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].status, MatchStatus::Matched);
        assert_eq!(result.quality.erp_duplicate_keys, 1);
    }

    #[test]
    fn records_outside_the_period_never_enter() {
        let a = vec![
            tax("1", "1", "2025-11-30", 1.0, 1.0),
            tax("1", "2", "2025-12-01", 1.0, 1.0),
            tax("1", "3", "", 1.0, 1.0),
        ];
        let b = vec![
            erp("000100000002", "01/12/2025", 1.0, 1.0),
            erp("000100000001", "30/11/2025", 1.0, 1.0),
        ];

        let result = engine().reconcile(&a, &b, november());
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].status, MatchStatus::Matched);
        assert_eq!(result.quality.tax_out_of_period, 2);
        assert_eq!(result.quality.erp_out_of_period, 1);
    }

    #[test]
    fn records_with_empty_key_fields_are_rejected_not_collided() {
        let mut no_cuit_a = tax("1", "1", "2025-11-01", 5.0, 50.0);
        no_cuit_a.issuer_tax_id.clear();
        let mut no_cuit_b = erp("000100000001", "01/11/2025", 5.0, 50.0);
        no_cuit_b.document_tax_id.clear();

        let result = engine().reconcile(&[no_cuit_a], &[no_cuit_b], november());
        assert!(result.rows.is_empty());
        assert_eq!(result.quality.tax_rejected, 1);
        assert_eq!(result.quality.erp_rejected, 1);
    }

    #[test]
    fn erp_number_lengths_are_counted() {
        let b = vec![
            erp("000100000001", "01/11/2025", 1.0, 1.0),
            erp("000100000002", "01/11/2025", 1.0, 1.0),
            erp("1-3", "01/11/2025", 1.0, 1.0),
        ];
        let result = engine().reconcile(&[], &b, november());
        assert_eq!(result.quality.erp_number_lengths.get(&12), Some(&2));
        assert_eq!(result.quality.erp_number_lengths.get(&3), Some(&1));
    }

    #[test]
    fn padded_scheme_aligns_dashed_erp_numbers() {
        let a = vec![tax("4", "25904", "2025-11-01", 1.0, 1.0)];
        let b = vec![erp("4-25904", "01/11/2025", 1.0, 1.0)];

        let as_given = engine().reconcile(&a, &b, november());
        assert_eq!(as_given.rows.len(), 2);

        let padded = ReconEngine::new(MatchOptions {
            erp_number: ErpNumberScheme::Padded,
            ..MatchOptions::default()
        })
        .reconcile(&a, &b, november());
        assert_eq!(padded.rows.len(), 1);
        assert_eq!(padded.rows[0].status, MatchStatus::Matched);
    }

    #[test]
    fn run_reads_both_sources() {
        let a = vec![tax("1", "1", "2025-11-01", 1.0, 1.0)];
        let b = vec![erp("000100000001", "01/11/2025", -1.0, -1.0)];

        let result = run(a.as_slice(), b.as_slice(), november(), MatchOptions::default()).unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].status, MatchStatus::Matched);
    }
}
