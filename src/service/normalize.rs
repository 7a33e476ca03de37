use chrono::NaiveDate;

use crate::models::Period;

/// 金额的书写习惯
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberLocale {
    /// 税务局格式: `.` 千分位, `,` 小数点 ("27.685,95")
    DecimalComma,
    /// ERP 格式: 普通数字串, 可带负号 ("-1500.5")
    Plain,
}

/// 把金额文本转换为 f64
///
/// 空值或无法解析的值一律视为 0.0, 不报错。
pub fn normalize_amount(raw: &str, locale: NumberLocale) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0.0;
    }

    let parsed = match locale {
        NumberLocale::DecimalComma => raw.replace('.', "").replacen(',', ".", 1).parse::<f64>(),
        NumberLocale::Plain => raw.parse::<f64>(),
    };

    match parsed {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

/// B 侧金额只比较绝对值
pub fn absolute(value: f64) -> f64 {
    value.abs()
}

/// 四舍五入到两位小数
pub fn round2(value: f64) -> f64 {
    // + 0.0 把 -0.0 归一为 0.0
    (value * 100.0).round() / 100.0 + 0.0
}

/// 解析日期所属的期间
///
/// 支持 `YYYY-MM-DD` (A 侧, 也接受表格的 `YYYY-MM-DDTHH:MM:SS`) 和 `DD/MM/YYYY` (B 侧),
/// 以是否包含 `-` / `/` 区分。无法解析返回 `None`。
pub fn parse_period(raw: &str) -> Option<Period> {
    let raw = raw.trim();

    let date = if raw.contains('-') {
        let day = raw.split(['T', ' ']).next().unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()?
    } else if raw.contains('/') {
        let day = raw.split(' ').next().unwrap_or(raw);
        NaiveDate::parse_from_str(day, "%d/%m/%Y").ok()?
    } else {
        return None;
    };

    Some(Period::of_date(date))
}

/// 日期是否落在目标期间内; 缺失或无法解析的日期永远不在期间内
pub fn is_in_period(raw: &str, target: Period) -> bool {
    parse_period(raw) == Some(target)
}
