#![cfg(not(tarpaulin_include))]

use crate::sheet::Row;
use crate::store::Table;
use std::error::Error;

/// Convert one ledger table to CSV format
///
/// The first line holds the table's column headers; each following line is one row.
/// Fields containing commas, quotes or newlines are quoted, with inner quotes doubled.
///
/// # Arguments
/// * `table` - Which table the rows belong to (selects the header line)
/// * `rows` - Rows in the table's column order
///
/// # Returns
/// * `Result<String, Box<dyn Error>>` - CSV content as a string or an error
///
/// # Examples
/// ```
/// use asset_ledger::downloader::to_csv;
/// use asset_ledger::store::{MemoryStore, Table, TabularStore};
///
/// let store = MemoryStore::new();
/// let csv = to_csv(Table::Assets, &store.list_rows(Table::Assets).unwrap()).unwrap();
/// assert!(csv.starts_with("Asset ID,Asset Name"));
/// ```
pub fn to_csv(table: Table, rows: &[Row]) -> Result<String, Box<dyn Error>> {
    let mut csv_content = String::new();

    for (c, column) in table.columns().iter().enumerate() {
        if c > 0 {
            csv_content.push(',');
        }
        csv_content.push_str(&escape_field(column));
    }
    csv_content.push('\n');

    for row in rows {
        for c in 0..table.columns().len() {
            if c > 0 {
                csv_content.push(',');
            }
            if let Some(cell) = row.get(c) {
                csv_content.push_str(&escape_field(&cell.as_text()));
            }
        }
        csv_content.push('\n');
    }

    Ok(csv_content)
}

/// Convert ledger tables to XLSX format
///
/// Each `(table, rows)` pair becomes a worksheet named after the table, with a header
/// row followed by the data. Numeric cells are written as numbers so spreadsheet
/// formulas keep working on them.
///
/// # Arguments
/// * `tables` - Tables to write, in worksheet order
///
/// # Returns
/// * `Result<Vec<u8>, Box<dyn Error>>` - XLSX file content as bytes or an error
#[cfg(feature = "web")]
pub fn to_xlsx(tables: &[(Table, Vec<Row>)]) -> Result<Vec<u8>, Box<dyn Error>> {
    use crate::sheet::CellValue;
    use rust_xlsxwriter::{Workbook, Worksheet};

    let mut workbook = Workbook::new();

    for (table, rows) in tables {
        let mut worksheet = Worksheet::new();
        worksheet.set_name(table.name())?;

        for (c, column) in table.columns().iter().enumerate() {
            worksheet.write_string(0, c as u16, *column)?;
        }

        for (r, row) in rows.iter().enumerate() {
            let xr = (r + 1) as u32;
            for (c, cell) in row.iter().enumerate() {
                match cell {
                    CellValue::Number(n) => {
                        worksheet.write_number(xr, c as u16, *n)?;
                    }
                    CellValue::Text(s) => {
                        worksheet.write_string(xr, c as u16, s.as_str())?;
                    }
                    CellValue::Empty => {}
                }
            }
        }

        workbook.push_worksheet(worksheet);
    }

    let buffer = workbook.save_to_buffer()?;

    Ok(buffer)
}

fn escape_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
