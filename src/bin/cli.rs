#![cfg(not(tarpaulin_include))]

use asset_ledger::config::{Args, init_logging};
use asset_ledger::downloader;
use asset_ledger::error::LedgerError;
use asset_ledger::estimator::{Decision, EstimateInput, estimate};
use asset_ledger::ledger::{LedgerService, Summary};
use asset_ledger::loader;
use asset_ledger::record::{Asset, NewAsset, Repair, RepairRequest, format_date, parse_date};
use asset_ledger::sheet::coerce_number;
use asset_ledger::store::{FileStore, Table};

use std::io::{self, Write};
use std::time::Instant;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::load();
    init_logging(&args.log_level);

    let ledger = LedgerService::new(FileStore::open(&args.data_file)?);
    println!("Ledger file: {}", args.data_file.display());

    let mut start_time = Instant::now();
    let mut status = String::from("ok");
    loop {
        let elapsed_time = start_time.elapsed().as_secs_f64();
        print!("[{:.1}] ({}) > ", elapsed_time, status);
        io::stdout().flush()?;

        let mut command = String::new();
        match io::stdin().read_line(&mut command) {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let command = command.trim();

        start_time = Instant::now();

        if command.is_empty() {
            status = String::from("invalid command");
            continue;
        }
        if command == "q" {
            break;
        }

        let (name, rest) = match command.split_once(' ') {
            Some((name, rest)) => (name, rest.trim()),
            None => (command, ""),
        };

        status = match run_command(&ledger, name, rest) {
            Ok(()) => String::from("ok"),
            Err(message) => {
                println!("{}", message);
                message
                    .split(':')
                    .next()
                    .unwrap_or("error")
                    .to_lowercase()
            }
        };
    }

    Ok(())
}

fn print_help() {
    println!("Commands:");
    println!("  q: Quit");
    println!("  assets: List assets with their repair totals");
    println!("  repairs [asset]: List repairs, optionally for one asset");
    println!("  add_asset <id>|<name>|<category>|<purchase date>|<replacement cost>[|<threshold %>]");
    println!("  add_repair <asset>|<part>|<part cost>|<labor hours>|<labor rate>[|<notes>[|<date>]]");
    println!("  delete_repair <repair id>: Remove a repair and rebuild its asset's totals");
    println!("  delete_asset <asset>: Remove an asset and its repairs");
    println!("  clear <asset>: Remove all repairs of an asset");
    println!("  clear_all: Remove every repair and reset all assets");
    println!("  recalc [asset]: Rebuild one asset's totals, or every asset's status");
    println!("  status <asset>: Compare stored status with the stored ratio");
    println!("  stats: Dashboard figures");
    println!("  counts: Assets per status");
    println!("  estimate <age> <original> <repair> <replace> <lifespan> [energy]");
    println!("  import <file.csv>: Add assets from a CSV file");
    println!("  export <assets|repairs> <file.csv>: Write a table to CSV");
}

fn failure(err: LedgerError) -> String {
    format!("{}: {}", err.kind(), err)
}

fn report<T: Summary>(result: Result<T, LedgerError>) -> Result<(), String> {
    let outcome = result.map_err(failure)?;
    println!("{}", outcome.summary());
    Ok(())
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str, String> {
    if rest.is_empty() {
        Err(format!("usage: {}", usage))
    } else {
        Ok(rest)
    }
}

fn run_command(ledger: &LedgerService<FileStore>, name: &str, rest: &str) -> Result<(), String> {
    match name {
        "help" => {
            print_help();
            Ok(())
        }
        "assets" => {
            let assets = ledger.get_assets().map_err(failure)?;
            print_assets(&assets);
            Ok(())
        }
        "repairs" => {
            let repairs = if rest.is_empty() {
                ledger.get_repairs()
            } else {
                ledger.get_repairs_for_asset(rest)
            }
            .map_err(failure)?;
            print_repairs(&repairs);
            Ok(())
        }
        "add_asset" => {
            let fields = pipe_fields(required(rest, "add_asset <id>|<name>|...")?);
            let field = |i: usize| fields.get(i).cloned().unwrap_or_default();
            let threshold = field(5);
            report(ledger.add_asset(NewAsset {
                id: field(0),
                name: field(1),
                category: field(2),
                purchase_date: parse_date(&field(3)),
                replacement_cost: coerce_number(&field(4)),
                threshold: if threshold.is_empty() {
                    None
                } else {
                    Some(coerce_number(&threshold))
                },
            }))
        }
        "add_repair" => {
            let fields = pipe_fields(required(rest, "add_repair <asset>|<part>|...")?);
            let field = |i: usize| fields.get(i).cloned().unwrap_or_default();
            let date = field(6);
            report(ledger.add_repair(RepairRequest {
                asset_id: field(0),
                repair_date: if date.is_empty() {
                    Some(chrono::Local::now().date_naive())
                } else {
                    parse_date(&date)
                },
                part_name: field(1),
                part_cost: coerce_number(&field(2)),
                labor_hours: coerce_number(&field(3)),
                labor_rate: coerce_number(&field(4)),
                notes: field(5),
            }))
        }
        "delete_repair" => report(
            ledger.delete_repair(required(rest, "delete_repair <repair id>")?),
        ),
        "delete_asset" => report(ledger.delete_asset(required(rest, "delete_asset <asset>")?)),
        "clear" => report(
            ledger.delete_all_repairs_for_asset(required(rest, "clear <asset>")?),
        ),
        "clear_all" => report(ledger.delete_all_repairs()),
        "recalc" => {
            if rest.is_empty() {
                report(ledger.recalculate_all_statuses())
            } else {
                report(ledger.recalculate_asset_totals(rest))
            }
        }
        "status" => {
            let check = ledger
                .check_asset_status(required(rest, "status <asset>")?)
                .map_err(failure)?;
            println!(
                "{} ({}): ${:.2} of ${:.2} = {:.1}%",
                check.asset_id,
                check.name,
                check.total_repairs,
                check.replacement_cost,
                check.percentage
            );
            println!(
                "  stored {}, expected {}{}",
                check.current_status.label(),
                check.expected_status.label(),
                if check.consistent { "" } else { " (run recalc)" }
            );
            Ok(())
        }
        "stats" => {
            let stats = ledger.dashboard_stats().map_err(failure)?;
            println!(
                "Assets: {}  Replace: {}  Warnings: {}  Good: {}",
                stats.total_assets, stats.need_replacement, stats.warnings, stats.good
            );
            println!(
                "Repairs: {}  Total cost: ${:.2}  Average: ${:.2}",
                stats.repair_count, stats.total_repair_cost, stats.average_repair_cost
            );
            for (rank, problem) in stats.top_problems.iter().enumerate() {
                println!(
                    "  {}. {} ({}) ${:.2} {:.1}% {}",
                    rank + 1,
                    problem.name,
                    problem.id,
                    problem.total_repairs,
                    problem.percent_of_replacement * 100.0,
                    problem.status.label()
                );
            }
            Ok(())
        }
        "counts" => {
            let counts = ledger.asset_counts().map_err(failure)?;
            println!(
                "Total: {}  Good: {}  Monitor: {}  Warning: {}  Replace: {}",
                counts.total, counts.good, counts.monitor, counts.warning, counts.replace
            );
            Ok(())
        }
        "estimate" => {
            let values: Vec<&str> = rest.split_whitespace().collect();
            if values.len() < 5 {
                return Err(
                    "usage: estimate <age> <original> <repair> <replace> <lifespan> [energy]"
                        .to_string(),
                );
            }
            let input = EstimateInput::new(
                coerce_number(values[0]),
                coerce_number(values[1]),
                coerce_number(values[2]),
                coerce_number(values[3]),
                coerce_number(values[4]),
                matches!(values.get(5), Some(&"energy") | Some(&"true") | Some(&"yes")),
            );
            let result = estimate(&input);
            let verdict = match result.recommendation {
                Decision::Repair => "REPAIR",
                Decision::Replace => "REPLACE",
            };
            println!("{} ({}% confidence)", verdict, result.confidence);
            println!(
                "  repair is {}% of replacement, asset {}% depreciated, {} years left",
                result.repair_percentage, result.depreciation, result.remaining_life
            );
            println!(
                "  5-year cost: repair ${} vs replace ${} (difference ${})",
                result.repair_tco, result.replace_tco, result.savings_amount
            );
            if result.energy_savings > 0 {
                println!("  energy savings ${}", result.energy_savings);
            }
            Ok(())
        }
        "import" => {
            let path = required(rest, "import <file.csv>")?;
            let assets = loader::from_csv(path).map_err(|e| format!("import: {}", e))?;
            report(ledger.add_assets(assets))
        }
        "export" => {
            let mut parts = rest.split_whitespace();
            let (table, path) = match (parts.next().and_then(Table::from_name), parts.next()) {
                (Some(table), Some(path)) => (table, path),
                _ => return Err("usage: export <assets|repairs> <file.csv>".to_string()),
            };
            let rows = ledger.table_rows(table).map_err(failure)?;
            let csv = downloader::to_csv(table, &rows).map_err(|e| format!("export: {}", e))?;
            std::fs::write(path, csv).map_err(|e| format!("export: {}", e))?;
            println!("Wrote {} rows to {}", rows.len(), path);
            Ok(())
        }
        _ => Err("invalid command".to_string()),
    }
}

fn pipe_fields(rest: &str) -> Vec<String> {
    rest.split('|').map(|f| f.trim().to_string()).collect()
}

fn print_assets(assets: &[Asset]) {
    println!(
        "{:<12} {:<24} {:>12} {:>12} {:>7}  {}",
        "ID", "Name", "Replacement", "Repairs", "%", "Status"
    );
    for asset in assets {
        println!(
            "{:<12} {:<24} {:>12.2} {:>12.2} {:>6.1}%  {}",
            asset.id,
            asset.name,
            asset.replacement_cost,
            asset.total_repairs,
            asset.percent_of_replacement * 100.0,
            asset.status.label()
        );
    }
}

fn print_repairs(repairs: &[Repair]) {
    println!(
        "{:<28} {:<12} {:<10} {:<20} {:>10} {:>12}",
        "Repair ID", "Asset", "Date", "Part", "Cost", "Running"
    );
    for repair in repairs {
        println!(
            "{:<28} {:<12} {:<10} {:<20} {:>10.2} {:>12.2}",
            repair.repair_id,
            repair.asset_id,
            format_date(repair.repair_date),
            repair.part_name,
            repair.total_cost,
            repair.running_total
        );
    }
}
