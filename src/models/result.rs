use super::RawRow;
use bigdecimal::{BigDecimal, Zero};
use serde::{Deserialize, Serialize};

/// 比对状态 (由外部匹配服务给出)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Match,
    Mismatch,
    NotFound,
}

impl MatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Match => "MATCH",
            MatchStatus::Mismatch => "MISMATCH",
            MatchStatus::NotFound => "NOT_FOUND",
        }
    }

    /// 在外部账目中是否找到对应条目
    pub fn is_found(&self) -> bool {
        !matches!(self, MatchStatus::NotFound)
    }
}

/// 比对结果 (外部匹配服务返回, 接收后不可变)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    #[serde(default)]
    pub spm_number: Option<String>,
    #[serde(default)]
    pub line_description: Option<String>,
    #[serde(default)]
    pub account_code: Option<String>,
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub app_amount: Option<BigDecimal>,
    #[serde(default)]
    pub external_amount: Option<BigDecimal>,
    #[serde(default)]
    pub difference: Option<BigDecimal>,
    pub status: MatchStatus,
}

impl ReconciliationResult {
    /// 排序键: 缺失视为空串
    pub fn spm_key(&self) -> &str {
        self.spm_number.as_deref().unwrap_or("")
    }

    pub fn description_key(&self) -> &str {
        self.line_description.as_deref().unwrap_or("")
    }
}

/// 提交给匹配服务的请求体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileRequest {
    pub data: Vec<RawRow>,
}

/// 匹配服务响应: 成功 `{data}` 或失败 `{error}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchingEnvelope {
    Data { data: Vec<ReconciliationResult> },
    Error { error: String },
}

/// 结果统计
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSummary {
    pub total: usize,
    pub matched: usize,
    pub mismatched: usize,
    pub not_found: usize,
    pub mismatch_difference: BigDecimal,
}

impl ResultSummary {
    pub fn from_results(results: &[ReconciliationResult]) -> Self {
        let mut summary = ResultSummary {
            total: results.len(),
            matched: 0,
            mismatched: 0,
            not_found: 0,
            mismatch_difference: BigDecimal::zero(),
        };

        for r in results {
            match r.status {
                MatchStatus::Match => summary.matched += 1,
                MatchStatus::Mismatch => {
                    summary.mismatched += 1;
                    if let Some(diff) = &r.difference {
                        summary.mismatch_difference += diff;
                    }
                }
                MatchStatus::NotFound => summary.not_found += 1,
            }
        }

        summary
    }
}
