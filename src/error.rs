use std::path::PathBuf;

use crate::source::SourceSide;

/// 对账错误
///
/// 结构性错误 (缺工作表、缺表头、缺列) 会中止整次对账；
/// 单条记录的金额/日期问题不会出现在这里, 而是降级为 0 / 期间外。
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    #[error("missing period argument: {0}")]
    MissingPeriod(&'static str),

    #[error("invalid period: month {month}, year {year}")]
    InvalidPeriod { month: u32, year: i32 },

    #[error("{side}: cannot read {}: {error}", path.display())]
    Io {
        side: SourceSide,
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("{side}: no worksheet found in spreadsheet document")]
    NoWorksheet { side: SourceSide },

    #[error("{side}: no header row containing '{code}' and '{name}' found")]
    HeaderNotFound {
        side: SourceSide,
        code: &'static str,
        name: &'static str,
    },

    #[error("{side}: missing required column '{column}'")]
    MissingColumn { side: SourceSide, column: &'static str },

    #[error("{side}: malformed XML: {message}")]
    Xml { side: SourceSide, message: String },

    #[error("{side}: malformed CSV: {message}")]
    Csv { side: SourceSide, message: String },

    #[error("config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("report error: {0}")]
    Report(String),
}

impl ReconError {
    /// 调用方参数错误 (期间缺失/非法), 在读取任何文件之前就会被拒绝
    pub fn is_period_error(&self) -> bool {
        matches!(self, Self::MissingPeriod(_) | Self::InvalidPeriod { .. })
    }

    /// 数据源结构不符合预期
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Self::NoWorksheet { .. }
                | Self::HeaderNotFound { .. }
                | Self::MissingColumn { .. }
                | Self::Xml { .. }
                | Self::Csv { .. }
        )
    }
}

impl From<csv::Error> for ReconError {
    fn from(e: csv::Error) -> Self {
        Self::Report(e.to_string())
    }
}
