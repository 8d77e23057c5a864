use serde::{Deserialize, Serialize};

/// 单元格原始值 (CSV 全部为文本, Excel 保留数值)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// 原始行: 按位置寻址, 不解释表头
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRow(pub Vec<CellValue>);

impl RawRow {
    pub fn width(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, idx: usize) -> Option<&CellValue> {
        self.0.get(idx)
    }

    pub fn is_blank(&self) -> bool {
        self.0.iter().all(CellValue::is_blank)
    }
}

impl From<Vec<CellValue>> for RawRow {
    fn from(cells: Vec<CellValue>) -> Self {
        Self(cells)
    }
}
