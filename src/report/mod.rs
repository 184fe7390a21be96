//! Spreadsheet export of query results

use crate::db::QueryResult;
use crate::error::{Error, Result};
use crate::session::Session;
use crate::value::FieldValue;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};
use log::info;
use rust_xlsxwriter::{ExcelDateTime, Format, Table, TableColumn, Workbook, Worksheet, XlsxError};
use std::collections::HashMap;
use std::path::Path;

pub const DEFAULT_SHEET_NAME: &str = "Sheet1";

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Wrap the data in an Excel table with filter buttons.
    pub add_table: bool,
    /// Excel number formats by column name, passed through unchanged.
    pub column_formats: HashMap<String, String>,
}

impl ExportOptions {
    pub fn with_table(mut self) -> Self {
        self.add_table = true;
        self
    }

    pub fn with_column_format(mut self, column: &str, num_format: &str) -> Self {
        self.column_formats
            .insert(column.to_uppercase(), num_format.to_string());
        self
    }

    fn format_for(&self, column: &str) -> Option<Format> {
        self.column_formats
            .get(&column.to_uppercase())
            .map(|f| Format::new().set_num_format(f))
    }
}

/// `=HYPERLINK("link", "text")`
pub fn hyperlink_formula(text: &str, link: &str) -> String {
    format!(
        "=HYPERLINK(\"{}\", \"{}\")",
        link.replace('"', "\"\""),
        text.replace('"', "\"\"")
    )
}

/// Years Excel can hold as a serial date.
fn in_excel_range(date: NaiveDate) -> bool {
    (1900..=9999).contains(&date.year())
}

fn excel_date(date: NaiveDate) -> std::result::Result<ExcelDateTime, XlsxError> {
    ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)
}

fn excel_time(time: NaiveTime) -> f64 {
    time.second() as f64 + time.nanosecond() as f64 / 1e9
}

struct CellFormats {
    date: Format,
    datetime: Format,
    time: Format,
}

impl CellFormats {
    fn new() -> Self {
        Self {
            date: Format::new().set_num_format("yyyy-mm-dd"),
            datetime: Format::new().set_num_format("yyyy-mm-dd hh:mm:ss"),
            time: Format::new().set_num_format("hh:mm:ss"),
        }
    }
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    value: &FieldValue,
    hint: Option<&Format>,
    defaults: &CellFormats,
) -> std::result::Result<(), XlsxError> {
    let plain = Format::new();
    let format = hint.unwrap_or(&plain);
    match value {
        FieldValue::Null => {}
        FieldValue::Bool(b) => {
            sheet.write_boolean_with_format(row, col, *b, format)?;
        }
        FieldValue::Int(i) => {
            sheet.write_number_with_format(row, col, *i as f64, format)?;
        }
        FieldValue::Float(f) => {
            sheet.write_number_with_format(row, col, *f, format)?;
        }
        FieldValue::Text(text) if text.starts_with('=') => {
            sheet.write_formula_with_format(row, col, text.as_str(), format)?;
        }
        FieldValue::Text(text) => {
            sheet.write_string_with_format(row, col, text, format)?;
        }
        FieldValue::Date(date) if !in_excel_range(*date) => {
            sheet.write_string_with_format(row, col, value.to_xml_text(), format)?;
        }
        FieldValue::DateTime(dt) if !in_excel_range(dt.date()) => {
            sheet.write_string_with_format(row, col, value.to_xml_text(), format)?;
        }
        FieldValue::Date(date) => {
            let datetime = excel_date(*date)?;
            sheet.write_datetime_with_format(row, col, &datetime, hint.unwrap_or(&defaults.date))?;
        }
        FieldValue::DateTime(dt) => {
            let datetime = excel_date(dt.date())?.and_hms(dt.hour() as u16, dt.minute() as u8, excel_time(dt.time()))?;
            sheet.write_datetime_with_format(row, col, &datetime, hint.unwrap_or(&defaults.datetime))?;
        }
        FieldValue::Time(time) => {
            let datetime = ExcelDateTime::from_hms(time.hour() as u16, time.minute() as u8, excel_time(*time))?;
            sheet.write_datetime_with_format(row, col, &datetime, hint.unwrap_or(&defaults.time))?;
        }
        FieldValue::Blob(_) => {
            sheet.write_string_with_format(row, col, value.to_xml_text(), format)?;
        }
    }
    Ok(())
}

fn write_sheet(workbook: &mut Workbook, name: &str, data: &QueryResult, options: &ExportOptions) -> Result<()> {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name)?;

    let header_format = Format::new().set_bold();
    let defaults = CellFormats::new();
    let hints: Vec<Option<Format>> = data.columns().iter().map(|c| options.format_for(c)).collect();

    for (col, column) in data.columns().iter().enumerate() {
        sheet.write_string_with_format(0, col as u16, column, &header_format)?;
    }
    for (row, values) in data.rows().iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            write_cell(sheet, row as u32 + 1, col as u16, value, hints[col].as_ref(), &defaults)?;
        }
    }

    if options.add_table && !data.is_empty() && !data.columns().is_empty() {
        let columns: Vec<TableColumn> = data
            .columns()
            .iter()
            .map(|c| TableColumn::new().set_header(c))
            .collect();
        let table = Table::new().set_columns(&columns);
        sheet.add_table(0, 0, data.len() as u32, (data.columns().len() - 1) as u16, &table)?;
    }

    sheet.autofit();
    Ok(())
}

/// Writes one worksheet per `(result, sheet name)` pair.
pub fn export_to_excel(path: &Path, sheets: &[(&QueryResult, &str)], options: &ExportOptions) -> Result<()> {
    if sheets.is_empty() {
        return Err(Error::Report(XlsxError::ParameterError("no sheets to export".to_string())));
    }

    let mut workbook = Workbook::new();
    for (data, name) in sheets {
        write_sheet(&mut workbook, name, data, options)?;
    }
    workbook.save(path)?;

    info!("Excel file exported to: {}", path.display());
    Ok(())
}

/// Completes `sql`, runs it and writes the result to `path`.
pub async fn export_query(
    session: &Session,
    sql: &str,
    path: &Path,
    sheet_name: Option<&str>,
    options: &ExportOptions,
) -> Result<QueryResult> {
    let result = session.query(sql, &[]).await?;
    export_to_excel(path, &[(&result, sheet_name.unwrap_or(DEFAULT_SHEET_NAME))], options)?;
    Ok(result)
}
