//! Serialize exported records to CSV or an Excel workbook

use crate::list::Record;
use crate::list::projection::value_text;
use rust_xlsxwriter::{Color, Format, Workbook, XlsxError};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const FILE_STEM: &str = "sharepoint_data";
const SHEET_NAME: &str = "SharePoint Data";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("No data to export")]
    NoData,

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Excel error: {0}")]
    Xlsx(#[from] XlsxError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Excel,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "xlsx",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Excel => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Csv => "text/csv",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "excel" | "xlsx" => Ok(ExportFormat::Excel),
            "csv" => Ok(ExportFormat::Csv),
            _ => Err(ExportError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Excel => write!(f, "excel"),
            ExportFormat::Csv => write!(f, "csv"),
        }
    }
}

/// A serialized export, ready to be written or sent
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    /// Write into `dir` under the generated file name
    pub fn save(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.bytes)?;
        log::info!("Export written to: {}", path.display());
        Ok(path)
    }
}

/// Column names in the order they first appear across `records`
pub fn columns(records: &[Record]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .flat_map(|record| record.fields().keys())
        .filter(|name| seen.insert(name.as_str()))
        .cloned()
        .collect()
}

/// `sharepoint_data_<YYYYmmdd_HHMMSS>.<ext>` for the current local time
pub fn file_name(format: ExportFormat) -> String {
    format!(
        "{}_{}.{}",
        FILE_STEM,
        chrono::Local::now().format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

pub fn write(records: &[Record], format: ExportFormat) -> Result<ExportFile, ExportError> {
    if records.is_empty() {
        return Err(ExportError::NoData);
    }
    let columns = columns(records);

    let bytes = match format {
        ExportFormat::Csv => write_csv(records, &columns)?,
        ExportFormat::Excel => write_xlsx(records, &columns)?,
    };

    Ok(ExportFile {
        file_name: file_name(format),
        mime_type: format.mime_type(),
        bytes,
    })
}

fn write_csv(records: &[Record], columns: &[String]) -> Result<Vec<u8>, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|name| value_text(record.get(name))))?;
    }
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(e.into_error()))
}

fn write_xlsx(records: &[Record], columns: &[String]) -> Result<Vec<u8>, ExportError> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(SHEET_NAME)?;

    let header_format = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(0x4472C4))
        .set_font_color(Color::White);

    for (col, name) in columns.iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, name, &header_format)?;
    }

    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, name) in columns.iter().enumerate() {
            let col = col as u16;
            match record.get(name) {
                None | Some(Value::Null) => {}
                Some(Value::Number(n)) => match n.as_f64() {
                    Some(number) => {
                        sheet.write_number(row, col, number)?;
                    }
                    None => {
                        sheet.write_string(row, col, n.to_string())?;
                    }
                },
                Some(Value::Bool(b)) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                Some(other) => {
                    sheet.write_string(row, col, value_text(Some(other)))?;
                }
            }
        }
    }

    sheet.autofit();
    Ok(workbook.save_to_buffer()?)
}
