use asset_ledger::error::StoreError;
use asset_ledger::ledger::LedgerService;
use asset_ledger::record::{AssetStatus, NewAsset, RepairRequest};
use asset_ledger::saving::{load_workbook, save_workbook};
use asset_ledger::sheet::{CellValue, RowPatch, Sheet, Workbook};
use asset_ledger::store::{FileStore, MemoryStore, Table, TabularStore};
use std::fs;
use tempfile::tempdir;

fn asset_row(id: &str, cost: f64) -> Vec<CellValue> {
    let mut row = vec![CellValue::Empty; Table::Assets.columns().len()];
    row[0] = CellValue::text(id);
    row[1] = CellValue::text(format!("Asset {}", id));
    row[4] = CellValue::Number(cost);
    row
}

#[test]
fn memory_store_starts_with_both_tables() {
    let store = MemoryStore::new();
    for table in Table::ALL {
        assert!(store.list_rows(table).unwrap().is_empty());
        let sheet = store.workbook().sheet(table.name()).unwrap();
        assert_eq!(sheet.header.len(), table.columns().len());
    }
}

#[test]
fn update_and_delete_by_key() {
    println!("\n====== Testing row updates ======");
    let mut store = MemoryStore::new();
    store.append_row(Table::Assets, asset_row("A1", 100.0)).unwrap();
    store.append_row(Table::Assets, asset_row("A2", 200.0)).unwrap();

    let patch = RowPatch::new().set("Total Repairs", CellValue::Number(42.0));
    assert!(store.update_row(Table::Assets, "A2", &patch).unwrap());
    assert!(!store.update_row(Table::Assets, "A9", &patch).unwrap());

    let rows = store.list_rows(Table::Assets).unwrap();
    assert_eq!(rows[1][7], CellValue::Number(42.0));
    assert_eq!(rows[0][7], CellValue::Empty);
    println!("✓ Patch landed on the keyed row only");

    assert!(store.delete_row(Table::Assets, "A1").unwrap());
    assert!(!store.delete_row(Table::Assets, "A1").unwrap());
    let rows = store.list_rows(Table::Assets).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_text(), "A2");
}

#[test]
fn unknown_column_is_rejected() {
    let mut store = MemoryStore::new();
    store.append_row(Table::Assets, asset_row("A1", 100.0)).unwrap();

    let patch = RowPatch::new().set("Colour", CellValue::text("red"));
    let err = store.update_row(Table::Assets, "A1", &patch).unwrap_err();
    match err {
        StoreError::UnknownColumn { table, column } => {
            assert_eq!(table, "Assets");
            assert_eq!(column, "Colour");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn rollback_restores_state_at_begin() {
    let mut store = MemoryStore::new();
    store.append_row(Table::Assets, asset_row("A1", 100.0)).unwrap();

    store.begin().unwrap();
    store.append_row(Table::Assets, asset_row("A2", 200.0)).unwrap();
    store.delete_row(Table::Assets, "A1").unwrap();
    store.rollback().unwrap();

    let rows = store.list_rows(Table::Assets).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_text(), "A1");

    store.begin().unwrap();
    store.append_row(Table::Assets, asset_row("A3", 300.0)).unwrap();
    store.commit().unwrap();
    store.rollback().unwrap();
    assert_eq!(store.list_rows(Table::Assets).unwrap().len(), 2);
}

#[test]
fn clear_empties_a_table() {
    let mut store = MemoryStore::new();
    store.append_row(Table::Assets, asset_row("A1", 100.0)).unwrap();
    store.append_row(Table::Assets, asset_row("A2", 200.0)).unwrap();
    assert_eq!(store.clear(Table::Assets).unwrap(), 2);
    assert!(store.list_rows(Table::Assets).unwrap().is_empty());
}

#[test]
fn rows_follow_schema_when_sheet_columns_are_shuffled() {
    println!("\n====== Testing column mapping ======");
    let mut header: Vec<&str> = Table::Assets.columns().to_vec();
    header.reverse();
    let mut workbook = Workbook::default();
    workbook.sheets.push(Sheet::sheet_create("Assets", &header));

    let mut store = MemoryStore::from_workbook(workbook);
    store.append_row(Table::Assets, asset_row("A1", 750.0)).unwrap();

    // Stored in the sheet's own order
    let sheet = store.workbook().sheet("Assets").unwrap();
    let last = sheet.rows[0].len() - 1;
    assert_eq!(sheet.rows[0][last].as_text(), "A1");

    // Read back in schema order
    let rows = store.list_rows(Table::Assets).unwrap();
    assert_eq!(rows[0][0].as_text(), "A1");
    assert_eq!(rows[0][4], CellValue::Number(750.0));
    assert!(store.workbook().sheet("Repairs").is_some());
    println!("✓ Header order does not matter");
}

#[test]
fn workbook_survives_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested").join("book.bin.gz");

    let mut store = MemoryStore::new();
    store.append_row(Table::Assets, asset_row("A1", 100.0)).unwrap();
    save_workbook(store.workbook(), &path).unwrap();

    let loaded = load_workbook(&path).unwrap();
    assert_eq!(&loaded, store.workbook());
}

#[test]
fn file_store_persists_ledger_changes() {
    println!("\n====== Testing FileStore persistence ======");
    let dir = tempdir().unwrap();
    let path = dir.path().join("database").join("ledger.bin.gz");

    let store = FileStore::open(&path).unwrap();
    assert!(path.exists());
    assert_eq!(store.path(), path.as_path());
    let ledger = LedgerService::new(store);
    ledger
        .add_asset(NewAsset {
            id: "F1".to_string(),
            name: "Fryer".to_string(),
            replacement_cost: 1000.0,
            ..Default::default()
        })
        .unwrap();
    ledger
        .add_repair(RepairRequest {
            asset_id: "F1".to_string(),
            part_name: "Thermostat".to_string(),
            part_cost: 100.0,
            labor_hours: 2.0,
            labor_rate: 80.0,
            ..Default::default()
        })
        .unwrap();
    drop(ledger);
    println!("✓ Ledger written to {}", path.display());

    let reopened = LedgerService::new(FileStore::open(&path).unwrap());
    let asset = reopened.get_asset("F1").unwrap();
    assert_eq!(asset.name, "Fryer");
    assert_eq!(asset.total_repairs, 260.0);
    assert_eq!(asset.status, AssetStatus::Good);
    let repairs = reopened.get_repairs_for_asset("F1").unwrap();
    assert_eq!(repairs.len(), 1);
    assert_eq!(repairs[0].part_name, "Thermostat");
    println!("✓ Asset and repair read back after reopening");
}

#[test]
fn file_store_rejects_corrupt_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ledger.bin.gz");
    fs::write(&path, b"definitely not gzip").unwrap();

    assert!(FileStore::open(&path).is_err());
}
