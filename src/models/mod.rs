pub mod page;
pub mod record;
pub mod result;
pub mod row;

pub use page::Page;
pub use record::{GroupedOrder, LineItemRecord, RecordPage, RecordQuery};
pub use result::{MatchStatus, MatchingEnvelope, ReconcileRequest, ReconciliationResult, ResultSummary};
pub use row::{CellValue, RawRow};
