use asset_ledger::downloader::to_csv;
use asset_ledger::ledger::LedgerService;
use asset_ledger::loader::{from_csv, from_csv_str};
use asset_ledger::record::RepairRequest;
use asset_ledger::store::{MemoryStore, Table};
use chrono::NaiveDate;
use std::fs;
use tempfile::tempdir;

const ASSET_CSV: &str = "\
Name,Replacement Cost,Asset ID,Category,Purchase Date,Threshold %
\"Pump, big\",\"$1,200\",P1,Plumbing,2024-01-15,
Mixer,800,M1,Kitchen,03/02/2022,60
,,,,,
Orphan,100,,Misc,,
";

#[test]
fn assets_are_read_by_header_name() {
    println!("\n====== Testing CSV import ======");
    let assets = from_csv_str(ASSET_CSV).unwrap();
    assert_eq!(assets.len(), 2);

    assert_eq!(assets[0].id, "P1");
    assert_eq!(assets[0].name, "Pump, big");
    assert_eq!(assets[0].category, "Plumbing");
    assert_eq!(assets[0].replacement_cost, 1200.0);
    assert_eq!(assets[0].purchase_date, NaiveDate::from_ymd_opt(2024, 1, 15));
    assert_eq!(assets[0].threshold, None);
    println!("✓ Quoted name and currency-formatted cost parsed");

    assert_eq!(assets[1].id, "M1");
    assert_eq!(assets[1].purchase_date, NaiveDate::from_ymd_opt(2022, 3, 2));
    assert_eq!(assets[1].threshold, Some(60.0));
    println!("✓ Rows without an asset ID skipped");
}

#[test]
fn header_aliases_are_accepted() {
    let assets = from_csv_str("id,name,cost\nX1,Boiler,5000\n").unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].id, "X1");
    assert_eq!(assets[0].name, "Boiler");
    assert_eq!(assets[0].replacement_cost, 5000.0);
}

#[test]
fn missing_id_column_is_an_error() {
    assert!(from_csv_str("Name,Cost\nBoiler,5000\n").is_err());
    assert!(from_csv_str("").is_err());
}

#[test]
fn unterminated_quote_is_an_error() {
    assert!(from_csv_str("Asset ID,Name\nA1,\"Broken\n").is_err());
}

#[test]
fn csv_file_imports_into_ledger() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("assets.csv");
    fs::write(&path, ASSET_CSV).unwrap();

    let ledger = LedgerService::new(MemoryStore::new());
    let outcome = ledger.add_assets(from_csv(&path).unwrap()).unwrap();
    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.skipped, 0);

    // Importing the same file again only skips
    let outcome = ledger.add_assets(from_csv(&path).unwrap()).unwrap();
    assert_eq!(outcome.added, 0);
    assert_eq!(outcome.skipped, 2);

    let mixer = ledger.get_asset("M1").unwrap();
    assert_eq!(mixer.threshold, 60.0);
    assert_eq!(mixer.threshold_amount, 480.0);
}

#[test]
fn tables_export_to_csv() {
    println!("\n====== Testing CSV export ======");
    let ledger = LedgerService::new(MemoryStore::new());
    ledger.add_assets(from_csv_str(ASSET_CSV).unwrap()).unwrap();
    ledger
        .add_repair(RepairRequest {
            asset_id: "P1".to_string(),
            repair_date: NaiveDate::from_ymd_opt(2024, 6, 1),
            part_name: "Seal \"kit\"".to_string(),
            part_cost: 90.0,
            labor_hours: 1.5,
            labor_rate: 80.0,
            notes: "leak\nunder base".to_string(),
        })
        .unwrap();

    let csv = to_csv(Table::Assets, &ledger.table_rows(Table::Assets).unwrap()).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(
        lines[0],
        "Asset ID,Asset Name,Category,Purchase Date,Replacement Cost,Threshold %,\
         Threshold Amount,Total Repairs,% of Replacement,Status,Days Since Purchase"
    );
    assert!(lines[1].starts_with("P1,\"Pump, big\",Plumbing,2024-01-15,1200,50,600,210,0.175,GOOD,"));
    assert!(lines[2].starts_with("M1,Mixer,Kitchen,2022-03-02,800,60,480,0,0,GOOD,"));
    println!("✓ Assets exported with quoting and derived totals");

    let csv = to_csv(Table::Repairs, &ledger.table_rows(Table::Repairs).unwrap()).unwrap();
    assert!(csv.starts_with("Repair ID,Asset ID,Repair Date,Part Name,"));
    assert!(csv.contains(",P1,2024-06-01,\"Seal \"\"kit\"\"\",90,1.5,80,120,210,210,0.175,\"leak\nunder base\","));
    println!("✓ Repairs exported with escaped quotes and newlines");
}
