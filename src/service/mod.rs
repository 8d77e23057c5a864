pub mod context_gate;
pub mod export;
pub mod grouper;
pub mod orderer;
pub mod paging;
pub mod session;
pub mod submitter;

pub use context_gate::{AppliedContext, ContextGate, FeedView, GroupedPage, Identity, RecordFeed};
pub use paging::{slice, Pager};
pub use session::{load_records, reconcile_upload, ResultsView, Session, SessionStore, SharedSession};
pub use submitter::{ReconciliationSubmitter, ResultSet, SubmissionState};
