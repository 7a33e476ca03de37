pub mod period;
pub mod record;
pub mod result;
pub mod stats;

pub use period::Period;
pub use record::{DocumentCategory, ErpRecord, TaxRecord};
pub use result::{ComparisonRow, MatchKey, MatchStatus};
pub use stats::{DataQuality, ReconSummary, Reconciliation};
