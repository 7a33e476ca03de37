use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::ReconError;

/// 对账期间 (月 + 年)
///
/// 只能通过 [`Period::new`] / [`Period::from_parts`] 构造, 因此持有的值总是合法的。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Period {
    month: u32,
    year: i32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self, ReconError> {
        if !(1..=12).contains(&month) || year <= 0 {
            return Err(ReconError::InvalidPeriod { month, year });
        }
        Ok(Self { month, year })
    }

    /// 调用方提供的月/年, 任一缺失都直接失败 (不回退到默认期间)
    pub fn from_parts(month: Option<u32>, year: Option<i32>) -> Result<Self, ReconError> {
        let month = month.ok_or(ReconError::MissingPeriod("month"))?;
        let year = year.ok_or(ReconError::MissingPeriod("year"))?;
        Self::new(month, year)
    }

    pub fn of_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_month() {
        assert!(matches!(
            Period::new(13, 2025),
            Err(ReconError::InvalidPeriod { month: 13, year: 2025 })
        ));
        assert!(Period::new(0, 2025).is_err());
        assert!(Period::new(11, 0).is_err());
    }

    #[test]
    fn missing_parts_fail_instead_of_defaulting() {
        assert!(matches!(
            Period::from_parts(None, Some(2025)),
            Err(ReconError::MissingPeriod("month"))
        ));
        assert!(matches!(
            Period::from_parts(Some(11), None),
            Err(ReconError::MissingPeriod("year"))
        ));
        let p = Period::from_parts(Some(11), Some(2025)).unwrap();
        assert_eq!((p.month(), p.year()), (11, 2025));
        assert_eq!(p.to_string(), "11/2025");
    }
}
