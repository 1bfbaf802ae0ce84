use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::record::{ASSET_COLUMNS, REPAIR_COLUMNS};
use crate::saving;
use crate::sheet::{CellValue, Row, RowPatch, Sheet, Workbook};

/// The two tables the ledger keeps.
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Assets,
    Repairs,
}

impl Table {
    pub const ALL: [Table; 2] = [Table::Assets, Table::Repairs];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Assets => "Assets",
            Table::Repairs => "Repairs",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Assets => &ASSET_COLUMNS,
            Table::Repairs => &REPAIR_COLUMNS,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "assets" => Some(Table::Assets),
            "repairs" => Some(Table::Repairs),
            _ => None,
        }
    }
}

/// Row-oriented storage behind the ledger.
///
/// Rows are keyed by their first cell. Implementations must keep rows in insertion
/// order and must return them aligned to [`Table::columns`].
///
/// Mutations between `begin` and `commit` form one unit: after `rollback` the store
/// looks as it did at `begin`.
pub trait TabularStore {
    fn list_rows(&self, table: Table) -> Result<Vec<Row>, StoreError>;

    fn append_row(&mut self, table: Table, row: Row) -> Result<(), StoreError>;

    /// Returns `false` when no row has that key.
    fn update_row(&mut self, table: Table, key: &str, patch: &RowPatch)
    -> Result<bool, StoreError>;

    /// Returns `false` when no row has that key.
    fn delete_row(&mut self, table: Table, key: &str) -> Result<bool, StoreError>;

    /// Remove every row of `table`, returning how many were removed.
    fn clear(&mut self, table: Table) -> Result<usize, StoreError> {
        let keys: Vec<String> = self
            .list_rows(table)?
            .iter()
            .filter_map(|row| row.first().map(|cell| cell.as_text()))
            .filter(|key| !key.is_empty())
            .collect();
        let mut removed = 0;
        for key in keys {
            if self.delete_row(table, &key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Workbook held in memory. Starts with both tables present and empty.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    workbook: Workbook,
    snapshot: Option<Workbook>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::from_workbook(Workbook::default())
    }

    /// Wrap an existing workbook, adding any table it is missing.
    pub fn from_workbook(mut workbook: Workbook) -> Self {
        for table in Table::ALL {
            workbook.ensure_sheet(table.name(), table.columns());
        }
        MemoryStore {
            workbook,
            snapshot: None,
        }
    }

    pub fn workbook(&self) -> &Workbook {
        &self.workbook
    }

    fn sheet(&self, table: Table) -> Result<&Sheet, StoreError> {
        self.workbook
            .sheet(table.name())
            .ok_or_else(|| StoreError::MissingTable(table.name().to_string()))
    }

    fn sheet_mut(&mut self, table: Table) -> Result<&mut Sheet, StoreError> {
        self.workbook
            .sheet_mut(table.name())
            .ok_or_else(|| StoreError::MissingTable(table.name().to_string()))
    }

    /// Rows reordered into the table's schema, for sheets whose header order differs.
    fn aligned_rows(sheet: &Sheet, table: Table) -> Vec<Row> {
        let mapping: Vec<Option<usize>> = table
            .columns()
            .iter()
            .map(|column| sheet.column(column))
            .collect();

        sheet
            .rows
            .iter()
            .map(|row| {
                mapping
                    .iter()
                    .map(|source| {
                        source
                            .and_then(|idx| row.get(idx).cloned())
                            .unwrap_or(CellValue::Empty)
                    })
                    .collect()
            })
            .collect()
    }
}

impl TabularStore for MemoryStore {
    fn list_rows(&self, table: Table) -> Result<Vec<Row>, StoreError> {
        let sheet = self.sheet(table)?;
        Ok(Self::aligned_rows(sheet, table))
    }

    fn append_row(&mut self, table: Table, row: Row) -> Result<(), StoreError> {
        let sheet = self.sheet_mut(table)?;
        let row = if sheet.header.iter().map(String::as_str).eq(table.columns().iter().copied()) {
            row
        } else {
            // Lay the schema-ordered row out in the sheet's own column order
            let mut placed = vec![CellValue::Empty; sheet.header.len()];
            for (column, value) in table.columns().iter().zip(row) {
                if let Some(idx) = sheet.column(column) {
                    placed[idx] = value;
                }
            }
            placed
        };
        sheet.append(row);
        Ok(())
    }

    fn update_row(
        &mut self,
        table: Table,
        key: &str,
        patch: &RowPatch,
    ) -> Result<bool, StoreError> {
        let sheet = self.sheet_mut(table)?;
        let Some(index) = sheet.find_row(key) else {
            return Ok(false);
        };
        sheet
            .apply(index, patch)
            .map_err(|column| StoreError::UnknownColumn {
                table: table.name().to_string(),
                column,
            })?;
        Ok(true)
    }

    fn delete_row(&mut self, table: Table, key: &str) -> Result<bool, StoreError> {
        Ok(self.sheet_mut(table)?.remove(key))
    }

    fn clear(&mut self, table: Table) -> Result<usize, StoreError> {
        Ok(self.sheet_mut(table)?.clear())
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.snapshot = Some(self.workbook.clone());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.snapshot = None;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        if let Some(snapshot) = self.snapshot.take() {
            self.workbook = snapshot;
        }
        Ok(())
    }
}

/// [`MemoryStore`] backed by a workbook file. Changes reach the disk on `commit`.
#[derive(Debug)]
pub struct FileStore {
    inner: MemoryStore,
    path: PathBuf,
}

impl FileStore {
    /// Open the workbook at `path`, creating an empty one when the file does not exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let workbook = if path.exists() {
            saving::load_workbook(&path).map_err(|e| match e.kind() {
                std::io::ErrorKind::InvalidData => StoreError::Encoding(e.to_string()),
                _ => StoreError::Io(e),
            })?
        } else {
            info!("No workbook at {}, starting empty", path.display());
            Workbook::default()
        };

        let store = FileStore {
            inner: MemoryStore::from_workbook(workbook),
            path,
        };
        if !store.path.exists() {
            store.persist()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn workbook(&self) -> &Workbook {
        self.inner.workbook()
    }

    fn persist(&self) -> Result<(), StoreError> {
        saving::save_workbook(self.inner.workbook(), &self.path)?;
        debug!("Workbook written to {}", self.path.display());
        Ok(())
    }
}

impl TabularStore for FileStore {
    fn list_rows(&self, table: Table) -> Result<Vec<Row>, StoreError> {
        self.inner.list_rows(table)
    }

    fn append_row(&mut self, table: Table, row: Row) -> Result<(), StoreError> {
        self.inner.append_row(table, row)
    }

    fn update_row(
        &mut self,
        table: Table,
        key: &str,
        patch: &RowPatch,
    ) -> Result<bool, StoreError> {
        self.inner.update_row(table, key, patch)
    }

    fn delete_row(&mut self, table: Table, key: &str) -> Result<bool, StoreError> {
        self.inner.delete_row(table, key)
    }

    fn clear(&mut self, table: Table) -> Result<usize, StoreError> {
        self.inner.clear(table)
    }

    fn begin(&mut self) -> Result<(), StoreError> {
        self.inner.begin()
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        if let Err(e) = self.persist() {
            warn!("Could not write {}: {}", self.path.display(), e);
            self.inner.rollback()?;
            return Err(e);
        }
        self.inner.commit()
    }

    fn rollback(&mut self) -> Result<(), StoreError> {
        self.inner.rollback()
    }
}
