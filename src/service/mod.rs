pub mod classify;
pub mod engine;
pub mod keys;
pub mod normalize;

pub use classify::{SignHandling, DEFAULT_TOLERANCE};
pub use engine::{run, MatchOptions, ReconEngine};
pub use keys::{key_for_erp_record, key_for_tax_record, ErpNumberScheme};
pub use normalize::{is_in_period, normalize_amount, parse_period, NumberLocale};
