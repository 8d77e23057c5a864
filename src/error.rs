use std::fmt;
use thiserror::Error;

/// 文件形状不满足最低要求的原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeViolation {
    /// 工作簿中没有任何工作表
    NoSheets,
    TooFewRows { found: usize, min: usize },
    /// 仅 CSV 检查首行列数
    TooFewColumns { found: usize, min: usize },
}

impl fmt::Display for ShapeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeViolation::NoSheets => write!(f, "workbook contains no sheets"),
            ShapeViolation::TooFewRows { found, min } => {
                write!(f, "expected at least {min} rows, found {found}")
            }
            ShapeViolation::TooFewColumns { found, min } => {
                write!(f, "expected at least {min} columns in the first row, found {found}")
            }
        }
    }
}

/// 本地解析失败 (永远不会进入提交阶段)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("malformed file ({0}); please re-export the source file")]
    MalformedShape(ShapeViolation),

    #[error("failed to read file: {0}")]
    ReadFailure(String),
}

/// 远程匹配服务失败
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    /// 服务返回了 `{error}` 载荷, 原样展示给用户
    #[error("{0}")]
    RemoteRejected(String),

    #[error("matching service unreachable: {0}")]
    NetworkFailure(String),
}

/// 记录服务查询失败
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("{0}")]
    RemoteRejected(String),

    #[error("record service unreachable: {0}")]
    NetworkFailure(String),
}

/// 上下文门控错误
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("fiscal year is required")]
    MissingFiscalYear,

    #[error("org unit is fixed to {pinned} for this account")]
    OrgUnitPinned { pinned: i64 },

    #[error("no authenticated identity")]
    NoIdentity,
}

/// 一次对账流程的失败 (解析域与提交域分开)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    /// 已被更新的一次提交取代, 结果被丢弃
    #[error("superseded by a newer submission")]
    Superseded,
}
