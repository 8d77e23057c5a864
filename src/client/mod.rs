pub mod matching;
pub mod records;

pub use matching::{HttpMatchingClient, MatchingClient};
pub use records::{HttpRecordClient, RecordClient};

/// 超时统一表述, 其余错误保留原文
pub(crate) fn describe(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.to_string()
    }
}
