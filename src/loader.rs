#![cfg(not(tarpaulin_include))]

use crate::record::{NewAsset, parse_date};
use crate::sheet::coerce_number;
use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Load asset definitions from a CSV file
///
/// The first line must be a header. Columns are matched by name, case-insensitively,
/// so the file may hold them in any order and may carry extra columns. Recognised
/// headers are `Asset ID` (or `ID`), `Asset Name` (or `Name`), `Category`,
/// `Purchase Date`, `Replacement Cost` and `Threshold %` (or `Threshold`).
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Vec<NewAsset>, Box<dyn Error>>` - One entry per non-blank data line
///
/// # Examples
/// ```no_run
/// use asset_ledger::loader::from_csv;
///
/// match from_csv("assets.csv") {
///     Ok(assets) => println!("Read {} assets", assets.len()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Vec<NewAsset>, Box<dyn Error>> {
    let file = File::open(filepath)?;
    let reader = BufReader::new(file);
    let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
    assets_from_lines(&lines)
}

/// Same as [`from_csv`] for CSV text already in memory (e.g. an upload).
pub fn from_csv_str(content: &str) -> Result<Vec<NewAsset>, Box<dyn Error>> {
    let lines: Vec<String> = content.lines().map(|l| l.to_string()).collect();
    assets_from_lines(&lines)
}

struct AssetColumns {
    id: usize,
    name: Option<usize>,
    category: Option<usize>,
    purchase_date: Option<usize>,
    replacement_cost: Option<usize>,
    threshold: Option<usize>,
}

fn assets_from_lines(lines: &[String]) -> Result<Vec<NewAsset>, Box<dyn Error>> {
    let header_line = lines
        .iter()
        .find(|l| !l.trim().is_empty())
        .ok_or("CSV file is empty")?;
    let header = parse_csv_row(header_line.trim_start_matches('\u{feff}'))?;
    let columns = map_columns(&header)?;

    let mut assets = Vec::new();
    for line in lines
        .iter()
        .skip_while(|l| l.trim().is_empty())
        .skip(1)
        .filter(|l| !l.trim().is_empty())
    {
        let fields = parse_csv_row(line)?;
        let field = |idx: Option<usize>| -> String {
            idx.and_then(|i| fields.get(i))
                .map(|v| v.trim().to_string())
                .unwrap_or_default()
        };

        let id = field(Some(columns.id));
        if id.is_empty() {
            continue;
        }

        let threshold = field(columns.threshold);
        assets.push(NewAsset {
            id,
            name: field(columns.name),
            category: field(columns.category),
            purchase_date: parse_date(&field(columns.purchase_date)),
            replacement_cost: coerce_number(&strip_currency(&field(columns.replacement_cost))),
            threshold: if threshold.is_empty() {
                None
            } else {
                Some(coerce_number(&strip_currency(&threshold)))
            },
        });
    }

    Ok(assets)
}

fn map_columns(header: &[String]) -> Result<AssetColumns, Box<dyn Error>> {
    let find = |names: &[&str]| -> Option<usize> {
        header.iter().position(|h| {
            let h = h.trim().to_lowercase();
            names.iter().any(|n| h == *n)
        })
    };

    let id = find(&["asset id", "id", "asset"]).ok_or("CSV file has no Asset ID column")?;
    Ok(AssetColumns {
        id,
        name: find(&["asset name", "name"]),
        category: find(&["category"]),
        purchase_date: find(&["purchase date", "purchased"]),
        replacement_cost: find(&["replacement cost", "cost"]),
        threshold: find(&["threshold %", "threshold"]),
    })
}

// Drop the currency and grouping characters spreadsheets like to export
fn strip_currency(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '$' | ',' | '%')).collect()
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Result<Vec<String>, Box<dyn Error>> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if let Some(&next) = chars.peek() {
                    if next == '"' && in_quotes {
                        // Double quote inside quoted field - add a single quote
                        current_field.push('"');
                        chars.next();
                    } else {
                        in_quotes = !in_quotes;
                    }
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(current_field);
                current_field = String::new();
            }
            _ => {
                current_field.push(c);
            }
        }
    }

    if in_quotes {
        return Err(format!("Unterminated quoted field in line: {}", line).into());
    }

    result.push(current_field);

    Ok(result)
}
