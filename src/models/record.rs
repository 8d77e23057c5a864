use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// SPM 明细行 (只读, 由表单模块维护)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemRecord {
    pub id: i64,
    pub spm_number: String,      // 所属 SPM 单号 (分组键)
    pub spm_date: NaiveDate,     // 所属 SPM 日期
    pub account_code: String,    // 科目编码
    #[serde(default)]
    pub account_name: Option<String>,
    pub amount: BigDecimal,
    #[serde(default)]
    pub completeness: f64,       // 完成度百分比
}

/// 按 SPM 单号聚合后的展示行 (仅存在于内存)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedOrder {
    pub spm_number: String,
    pub spm_date: NaiveDate,
    pub row_span: usize,
    pub total_amount: BigDecimal,
    pub items: Vec<LineItemRecord>,
}

/// 记录服务查询参数 (分页在服务端完成)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub org_unit_id: Option<i64>,
    pub fiscal_year: String,
    pub page: usize,
    pub limit: usize,
}

/// 记录服务响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPage {
    pub items: Vec<LineItemRecord>,
    pub total_pages: usize,
    pub total_count: usize,
}
