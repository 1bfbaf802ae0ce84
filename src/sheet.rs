use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    static ref NUMBER_PREFIX_REGEX: Regex =
        Regex::new(r"^\s*([+-]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)(?:[eE][+-]?[0-9]+)?)").unwrap();
}

/// A single cell of a stored row
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
}

pub type Row = Vec<CellValue>;

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(value)
        }
    }

    /// Numeric view of the cell. Anything that is not a clean number reads as 0.
    pub fn as_number(&self) -> f64 {
        let value = match self {
            CellValue::Empty => 0.0,
            CellValue::Number(n) => *n,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(0.0)
                }
            }
        };
        if value.is_finite() { value } else { 0.0 }
    }

    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    n.to_string()
                }
            }
            CellValue::Text(s) => s.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

/// Parse user input the way a browser form does: take the longest numeric prefix,
/// and fall back to 0 when there is none or the result is not finite.
pub fn coerce_number(raw: &str) -> f64 {
    NUMBER_PREFIX_REGEX
        .captures(raw)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|n| n.is_finite())
        .unwrap_or(0.0)
}

/// Column-name keyed set of cell writes applied to one row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RowPatch {
    pub cells: Vec<(String, CellValue)>,
}

impl RowPatch {
    pub fn new() -> Self {
        RowPatch { cells: Vec::new() }
    }

    pub fn set(mut self, column: &str, value: CellValue) -> Self {
        self.cells.push((column.to_string(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn sheet_create(name: &str, header: &[&str]) -> Self {
        Sheet {
            name: name.to_string(),
            header: header.iter().map(|h| h.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// Index of the first row whose key cell (column 0) equals `key`.
    pub fn find_row(&self, key: &str) -> Option<usize> {
        self.rows.iter().position(|row| {
            row.first()
                .map(|cell| !cell.is_empty() && cell.as_text() == key)
                .unwrap_or(false)
        })
    }

    pub fn append(&mut self, mut row: Row) {
        // Rows always carry one cell per header column
        row.resize(self.header.len(), CellValue::Empty);
        self.rows.push(row);
    }

    /// Apply `patch` to the row at `index`. Returns the first column name the sheet
    /// does not know, leaving the row untouched in that case.
    pub fn apply(&mut self, index: usize, patch: &RowPatch) -> Result<(), String> {
        let mut targets = Vec::with_capacity(patch.cells.len());
        for (column, value) in &patch.cells {
            match self.column(column) {
                Some(col) => targets.push((col, value.clone())),
                None => return Err(column.clone()),
            }
        }

        if let Some(row) = self.rows.get_mut(index) {
            row.resize(self.header.len(), CellValue::Empty);
            for (col, value) in targets {
                row[col] = value;
            }
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        match self.find_row(key) {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn clear(&mut self) -> usize {
        let count = self.rows.len();
        self.rows.clear();
        count
    }
}

/// Named collection of sheets. This is the unit that gets persisted.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
pub struct Workbook {
    pub sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }

    /// Add the sheet if it is missing. An existing sheet keeps its rows.
    pub fn ensure_sheet(&mut self, name: &str, header: &[&str]) -> &mut Sheet {
        if let Some(index) = self.sheets.iter().position(|s| s.name == name) {
            return &mut self.sheets[index];
        }
        self.sheets.push(Sheet::sheet_create(name, header));
        let last = self.sheets.len() - 1;
        &mut self.sheets[last]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_number_takes_numeric_prefix() {
        assert_eq!(coerce_number("100"), 100.0);
        assert_eq!(coerce_number("  12.5 dollars"), 12.5);
        assert_eq!(coerce_number("-3"), -3.0);
        assert_eq!(coerce_number(".5"), 0.5);
        assert_eq!(coerce_number("1e3"), 1000.0);
        assert_eq!(coerce_number("abc"), 0.0);
        assert_eq!(coerce_number(""), 0.0);
    }

    #[test]
    fn cell_numbers_default_to_zero() {
        assert_eq!(CellValue::Text("42".into()).as_number(), 42.0);
        assert_eq!(CellValue::Text("42abc".into()).as_number(), 0.0);
        assert_eq!(CellValue::Empty.as_number(), 0.0);
        assert_eq!(CellValue::Number(f64::NAN).as_number(), 0.0);
    }

    #[test]
    fn apply_rejects_unknown_column() {
        let mut sheet = Sheet::sheet_create("Assets", &["Asset ID", "Asset Name"]);
        sheet.append(vec![CellValue::text("A1")]);
        assert_eq!(sheet.rows[0].len(), 2);

        let bad = RowPatch::new()
            .set("Asset Name", CellValue::text("Mower"))
            .set("Colour", CellValue::text("red"));
        assert_eq!(sheet.apply(0, &bad), Err("Colour".to_string()));
        assert_eq!(sheet.rows[0][1], CellValue::Empty);

        let good = RowPatch::new().set("Asset Name", CellValue::text("Mower"));
        assert!(sheet.apply(0, &good).is_ok());
        assert_eq!(sheet.rows[0][1].as_text(), "Mower");
    }

    #[test]
    fn find_row_matches_numeric_keys_as_text() {
        let mut sheet = Sheet::sheet_create("Assets", &["Asset ID"]);
        sheet.append(vec![CellValue::Number(7.0)]);
        sheet.append(vec![CellValue::Empty]);
        assert_eq!(sheet.find_row("7"), Some(0));
        assert_eq!(sheet.find_row(""), None);
        assert!(sheet.remove("7"));
        assert_eq!(sheet.rows.len(), 1);
    }
}
