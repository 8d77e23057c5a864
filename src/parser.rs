use crate::error::{ParseError, ShapeViolation};
use crate::models::{CellValue, RawRow};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use std::io::Cursor;
use std::path::Path;

/// 最少行数 (CSV 与 Excel 相同)
pub const MIN_ROWS: usize = 5;
/// CSV 首行最少列数 (Excel 路径不检查)
pub const MIN_CSV_COLUMNS: usize = 23;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// 上传的文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            bytes,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// 从磁盘读取, 读失败与形状校验失败区分开
    pub async fn read(path: &Path) -> Result<Self, ParseError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ParseError::ReadFailure(format!("{}: {}", path.display(), e)))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(name, bytes))
    }
}

/// 文件类型, 在入口处解析一次
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Spreadsheet,
    Unsupported(String),
}

impl FileKind {
    /// 优先按扩展名判断, 没有扩展名时退回 Content-Type
    pub fn detect(name: &str, content_type: Option<&str>) -> Self {
        let extension = Path::new(name)
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase());

        match extension.as_deref() {
            Some("csv") => FileKind::Csv,
            Some("xlsx" | "xlsm" | "xlsb" | "xls" | "ods") => FileKind::Spreadsheet,
            Some(other) => FileKind::Unsupported(format!(".{other}")),
            None => Self::from_content_type(name, content_type),
        }
    }

    fn from_content_type(name: &str, content_type: Option<&str>) -> Self {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase());

        match mime.as_deref() {
            Some("text/csv") => FileKind::Csv,
            Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")
            | Some("application/vnd.ms-excel") => FileKind::Spreadsheet,
            Some(other) => FileKind::Unsupported(other.to_string()),
            None => FileKind::Unsupported(if name.is_empty() {
                "unknown".to_string()
            } else {
                name.to_string()
            }),
        }
    }
}

/// 将上传文件解析为原始行 (纯转换, 无副作用)
pub fn parse(file: &UploadedFile) -> Result<Vec<RawRow>, ParseError> {
    let kind = FileKind::detect(&file.name, file.content_type.as_deref());
    tracing::debug!("Parsing {} ({} bytes) as {:?}", file.name, file.bytes.len(), kind);

    let rows = match kind {
        FileKind::Csv => parse_csv(&file.bytes)?,
        FileKind::Spreadsheet => parse_spreadsheet(&file.bytes)?,
        FileKind::Unsupported(what) => return Err(ParseError::UnsupportedFormat(what)),
    };

    tracing::info!("Parsed {}: {} rows", file.name, rows.len());
    Ok(rows)
}

/// CSV: 不使用表头, 跳过空行, 校验行数与首行列数
pub fn parse_csv(bytes: &[u8]) -> Result<Vec<RawRow>, ParseError> {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut rows = Vec::new();
    for record in reader.byte_records() {
        let record = record.map_err(|e| ParseError::ReadFailure(format!("csv: {e}")))?;
        let row: RawRow = record
            .iter()
            .map(|field| CellValue::Text(String::from_utf8_lossy(field).into_owned()))
            .collect::<Vec<_>>()
            .into();
        if row.is_blank() {
            continue;
        }
        rows.push(row);
    }

    check_row_count(&rows)?;

    let width = rows.first().map(RawRow::width).unwrap_or(0);
    if width < MIN_CSV_COLUMNS {
        return Err(ParseError::MalformedShape(ShapeViolation::TooFewColumns {
            found: width,
            min: MIN_CSV_COLUMNS,
        }));
    }

    Ok(rows)
}

/// Excel: 只读第一个工作表, 只校验行数
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<RawRow>, ParseError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|e| ParseError::ReadFailure(format!("workbook: {e}")))?;

    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range.map_err(|e| ParseError::ReadFailure(format!("sheet: {e}")))?,
        None => return Err(ParseError::MalformedShape(ShapeViolation::NoSheets)),
    };

    let rows = range_to_rows(&range);
    check_row_count(&rows)?;
    Ok(rows)
}

fn range_to_rows(range: &Range<Data>) -> Vec<RawRow> {
    range
        .rows()
        .map(|r| RawRow(r.iter().map(cell_value).collect()))
        .collect()
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::String(v) => CellValue::Text(v.clone()),
        Data::Float(v) => CellValue::Number(*v),
        Data::Int(v) => CellValue::Number(*v as f64),
        Data::Bool(v) => CellValue::Text(v.to_string()),
        Data::DateTime(v) => CellValue::Number(v.as_f64()),
        Data::DateTimeIso(v) => CellValue::Text(v.clone()),
        Data::DurationIso(v) => CellValue::Text(v.clone()),
        Data::Error(v) => CellValue::Text(format!("{v:?}")),
        Data::Empty => CellValue::Empty,
    }
}

fn check_row_count(rows: &[RawRow]) -> Result<(), ParseError> {
    if rows.len() < MIN_ROWS {
        return Err(ParseError::MalformedShape(ShapeViolation::TooFewRows {
            found: rows.len(),
            min: MIN_ROWS,
        }));
    }
    Ok(())
}
