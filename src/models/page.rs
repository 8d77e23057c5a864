use serde::{Deserialize, Serialize};

/// 有序序列上的一页窗口, page_number 从 1 开始
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub total_pages: usize,
}
