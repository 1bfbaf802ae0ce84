use crate::sheet::{CellValue, Row, RowPatch, coerce_number};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const ASSET_COLUMNS: [&str; 11] = [
    "Asset ID",
    "Asset Name",
    "Category",
    "Purchase Date",
    "Replacement Cost",
    "Threshold %",
    "Threshold Amount",
    "Total Repairs",
    "% of Replacement",
    "Status",
    "Days Since Purchase",
];

pub const REPAIR_COLUMNS: [&str; 13] = [
    "Repair ID",
    "Asset ID",
    "Repair Date",
    "Part Name",
    "Part Cost",
    "Labor Hours",
    "Labor Rate",
    "Labor Cost",
    "Total Cost",
    "Running Total",
    "% of Replacement",
    "Notes",
    "Timestamp",
];

// Ratio thresholds, checked from the most urgent tier down
pub const REPLACE_NOW_RATIO: f64 = 0.75;
pub const WARNING_RATIO: f64 = 0.60;
pub const MONITOR_RATIO: f64 = 0.40;

pub const DEFAULT_THRESHOLD: f64 = 50.0;

/// Asset IDs that mark error rows rather than real equipment
pub const SENTINEL_IDS: [&str; 3] = ["ERROR", "NO_DATA", "SHEET_ERROR"];

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetStatus {
    Good,
    Monitor,
    Warning,
    ReplaceNow,
}

impl AssetStatus {
    /// Status tier for a repair-spend / replacement-cost ratio.
    pub fn classify(ratio: f64) -> Self {
        if ratio >= REPLACE_NOW_RATIO {
            AssetStatus::ReplaceNow
        } else if ratio >= WARNING_RATIO {
            AssetStatus::Warning
        } else if ratio >= MONITOR_RATIO {
            AssetStatus::Monitor
        } else {
            AssetStatus::Good
        }
    }

    /// Text written into the Status column.
    pub fn label(&self) -> &'static str {
        match self {
            AssetStatus::Good => "GOOD",
            AssetStatus::Monitor => "MONITOR",
            AssetStatus::Warning => "WARNING - Consider",
            AssetStatus::ReplaceNow => "REPLACE NOW",
        }
    }

    /// Reads both the column labels and hand-typed variants ("replace now", "Warning").
    pub fn from_label(text: &str) -> Self {
        let upper = text.to_uppercase();
        if upper.contains("REPLACE") {
            AssetStatus::ReplaceNow
        } else if upper.contains("WARNING") {
            AssetStatus::Warning
        } else if upper.contains("MONITOR") {
            AssetStatus::Monitor
        } else {
            AssetStatus::Good
        }
    }
}

impl std::fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

pub fn percent_of_replacement(total_repairs: f64, replacement_cost: f64) -> f64 {
    if replacement_cost > 0.0 {
        total_repairs / replacement_cost
    } else {
        0.0
    }
}

/// The three asset fields owned by the ledger. They are only ever written together.
#[derive(Clone, Copy, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetTotals {
    pub total_repairs: f64,
    pub percent_of_replacement: f64,
    pub status: AssetStatus,
}

impl AssetTotals {
    pub fn derive(total_repairs: f64, replacement_cost: f64) -> Self {
        let ratio = percent_of_replacement(total_repairs, replacement_cost);
        AssetTotals {
            total_repairs,
            percent_of_replacement: ratio,
            status: AssetStatus::classify(ratio),
        }
    }

    pub fn zero() -> Self {
        AssetTotals {
            total_repairs: 0.0,
            percent_of_replacement: 0.0,
            status: AssetStatus::Good,
        }
    }

    pub fn to_patch(&self) -> RowPatch {
        RowPatch::new()
            .set("Total Repairs", CellValue::Number(self.total_repairs))
            .set("% of Replacement", CellValue::Number(self.percent_of_replacement))
            .set("Status", CellValue::text(self.status.label()))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Asset {
    pub id: String,
    pub name: String,
    pub category: String,
    pub purchase_date: Option<NaiveDate>,
    pub replacement_cost: f64,
    pub threshold: f64,
    pub threshold_amount: f64,
    pub total_repairs: f64,
    pub percent_of_replacement: f64,
    pub status: AssetStatus,
    pub days_since_purchase: i64,
}

impl Asset {
    /// Typed view of an Assets row. Rows without a key yield `None`.
    pub fn from_row(row: &Row, today: NaiveDate) -> Option<Self> {
        let id = cell(row, 0).as_text();
        if id.trim().is_empty() {
            return None;
        }

        let name = non_blank(cell(row, 1).as_text(), "Unknown");
        let category = non_blank(cell(row, 2).as_text(), "Unknown");
        let purchase_date = parse_date(&cell(row, 3).as_text());
        let replacement_cost = cell(row, 4).as_number();
        let threshold = match cell(row, 5).as_number() {
            t if t != 0.0 => t,
            _ => DEFAULT_THRESHOLD,
        };
        let status_text = cell(row, 9).as_text();

        Some(Asset {
            id,
            name,
            category,
            purchase_date,
            replacement_cost,
            threshold,
            threshold_amount: replacement_cost * threshold / 100.0,
            total_repairs: cell(row, 7).as_number(),
            percent_of_replacement: cell(row, 8).as_number(),
            status: AssetStatus::from_label(&status_text),
            days_since_purchase: days_between(purchase_date, today),
        })
    }

    pub fn to_row(&self) -> Row {
        vec![
            CellValue::text(self.id.clone()),
            CellValue::text(self.name.clone()),
            CellValue::text(self.category.clone()),
            CellValue::text(format_date(self.purchase_date)),
            CellValue::Number(self.replacement_cost),
            CellValue::Number(self.threshold),
            CellValue::Number(self.threshold_amount),
            CellValue::Number(self.total_repairs),
            CellValue::Number(self.percent_of_replacement),
            CellValue::text(self.status.label()),
            CellValue::Number(self.days_since_purchase as f64),
        ]
    }

    pub fn totals(&self) -> AssetTotals {
        AssetTotals {
            total_repairs: self.total_repairs,
            percent_of_replacement: self.percent_of_replacement,
            status: self.status,
        }
    }

    pub fn apply_totals(&mut self, totals: AssetTotals) {
        self.total_repairs = totals.total_repairs;
        self.percent_of_replacement = totals.percent_of_replacement;
        self.status = totals.status;
    }

    pub fn is_sentinel(&self) -> bool {
        self.id.is_empty() || SENTINEL_IDS.contains(&self.id.as_str())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Repair {
    pub repair_id: String,
    pub asset_id: String,
    pub repair_date: Option<NaiveDate>,
    pub part_name: String,
    pub part_cost: f64,
    pub labor_hours: f64,
    pub labor_rate: f64,
    pub labor_cost: f64,
    pub total_cost: f64,
    pub running_total: f64,
    pub percent_of_replacement: f64,
    pub notes: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl Repair {
    pub fn from_row(row: &Row) -> Option<Self> {
        let repair_id = cell(row, 0).as_text();
        if repair_id.trim().is_empty() {
            return None;
        }

        Some(Repair {
            repair_id,
            asset_id: cell(row, 1).as_text(),
            repair_date: parse_date(&cell(row, 2).as_text()),
            part_name: cell(row, 3).as_text(),
            part_cost: cell(row, 4).as_number(),
            labor_hours: cell(row, 5).as_number(),
            labor_rate: cell(row, 6).as_number(),
            labor_cost: cell(row, 7).as_number(),
            total_cost: cell(row, 8).as_number(),
            running_total: cell(row, 9).as_number(),
            percent_of_replacement: cell(row, 10).as_number(),
            notes: cell(row, 11).as_text(),
            timestamp: DateTime::parse_from_rfc3339(cell(row, 12).as_text().trim())
                .ok()
                .map(|t| t.with_timezone(&Utc)),
        })
    }

    pub fn to_row(&self) -> Row {
        vec![
            CellValue::text(self.repair_id.clone()),
            CellValue::text(self.asset_id.clone()),
            CellValue::text(format_date(self.repair_date)),
            CellValue::text(self.part_name.clone()),
            CellValue::Number(self.part_cost),
            CellValue::Number(self.labor_hours),
            CellValue::Number(self.labor_rate),
            CellValue::Number(self.labor_cost),
            CellValue::Number(self.total_cost),
            CellValue::Number(self.running_total),
            CellValue::Number(self.percent_of_replacement),
            CellValue::text(self.notes.clone()),
            CellValue::text(
                self.timestamp
                    .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
                    .unwrap_or_default(),
            ),
        ]
    }
}

/// Input for a new asset. Totals always start at zero.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NewAsset {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(deserialize_with = "lenient_date")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_number")]
    pub replacement_cost: f64,
    #[serde(deserialize_with = "lenient_optional_number")]
    pub threshold: Option<f64>,
}

impl NewAsset {
    pub fn into_asset(self, today: NaiveDate) -> Asset {
        let threshold = self.threshold.filter(|t| *t != 0.0).unwrap_or(DEFAULT_THRESHOLD);
        let totals = AssetTotals::zero();
        Asset {
            id: self.id.trim().to_string(),
            name: non_blank(self.name, "Unknown"),
            category: non_blank(self.category, "Unknown"),
            purchase_date: self.purchase_date,
            replacement_cost: self.replacement_cost,
            threshold,
            threshold_amount: self.replacement_cost * threshold / 100.0,
            total_repairs: totals.total_repairs,
            percent_of_replacement: totals.percent_of_replacement,
            status: totals.status,
            days_since_purchase: days_between(self.purchase_date, today),
        }
    }
}

/// Editable asset fields. `None` leaves the stored value alone.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AssetUpdate {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(deserialize_with = "lenient_date")]
    pub purchase_date: Option<NaiveDate>,
    #[serde(deserialize_with = "lenient_optional_number")]
    pub replacement_cost: Option<f64>,
    #[serde(deserialize_with = "lenient_optional_number")]
    pub threshold: Option<f64>,
}

/// A repair as submitted by a caller. Numeric fields accept numbers or numeric text
/// and fall back to 0.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct RepairRequest {
    pub asset_id: String,
    #[serde(deserialize_with = "lenient_date")]
    pub repair_date: Option<NaiveDate>,
    pub part_name: String,
    #[serde(deserialize_with = "lenient_number")]
    pub part_cost: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub labor_hours: f64,
    #[serde(deserialize_with = "lenient_number")]
    pub labor_rate: f64,
    pub notes: String,
}

impl RepairRequest {
    pub fn labor_cost(&self) -> f64 {
        finite_or_zero(self.labor_hours) * finite_or_zero(self.labor_rate)
    }

    pub fn total_cost(&self) -> f64 {
        finite_or_zero(self.part_cost) + self.labor_cost()
    }
}

/// `REP<yyyyMMddHHmmss>-<8 hex chars>`. The random suffix keeps IDs unique when
/// several repairs land in the same second.
pub fn new_repair_id(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("REP{}-{}", now.format("%Y%m%d%H%M%S"), &suffix[..8])
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|t| t.date_naive())
        })
        .or_else(|| NaiveDate::parse_from_str(text, "%m/%d/%Y").ok())
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

fn days_between(purchase_date: Option<NaiveDate>, today: NaiveDate) -> i64 {
    purchase_date
        .map(|d| (today - d).num_days())
        .unwrap_or(0)
}

static EMPTY_CELL: CellValue = CellValue::Empty;

fn cell(row: &Row, index: usize) -> &CellValue {
    row.get(index).unwrap_or(&EMPTY_CELL)
}

fn non_blank(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

fn lenient_value_to_number(value: Option<serde_json::Value>) -> Option<f64> {
    match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(finite_or_zero),
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(coerce_number(&s)),
        Some(serde_json::Value::Bool(b)) => Some(if b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(lenient_value_to_number(value).unwrap_or(0.0))
}

fn lenient_optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(lenient_value_to_number(value))
}

fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(parse_date))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_boundaries() {
        assert_eq!(AssetStatus::classify(0.0), AssetStatus::Good);
        assert_eq!(AssetStatus::classify(0.3999), AssetStatus::Good);
        assert_eq!(AssetStatus::classify(0.40), AssetStatus::Monitor);
        assert_eq!(AssetStatus::classify(0.5999), AssetStatus::Monitor);
        assert_eq!(AssetStatus::classify(0.60), AssetStatus::Warning);
        assert_eq!(AssetStatus::classify(0.7499), AssetStatus::Warning);
        assert_eq!(AssetStatus::classify(0.75), AssetStatus::ReplaceNow);
        assert_eq!(AssetStatus::classify(3.0), AssetStatus::ReplaceNow);
    }

    #[test]
    fn labels_round_trip_through_status_column() {
        for status in [
            AssetStatus::Good,
            AssetStatus::Monitor,
            AssetStatus::Warning,
            AssetStatus::ReplaceNow,
        ] {
            assert_eq!(AssetStatus::from_label(status.label()), status);
        }
        assert_eq!(AssetStatus::from_label("replace now"), AssetStatus::ReplaceNow);
        assert_eq!(AssetStatus::from_label(""), AssetStatus::Good);
    }

    #[test]
    fn zero_replacement_cost_gives_zero_ratio() {
        let totals = AssetTotals::derive(500.0, 0.0);
        assert_eq!(totals.percent_of_replacement, 0.0);
        assert_eq!(totals.status, AssetStatus::Good);
    }

    #[test]
    fn asset_row_defaults() {
        let today = NaiveDate::from_ymd_opt(2024, 1, 11).unwrap();
        let row = vec![
            CellValue::text("MOWER-1"),
            CellValue::Empty,
            CellValue::Empty,
            CellValue::text("2024-01-01"),
            CellValue::text("2000"),
        ];
        let asset = Asset::from_row(&row, today).unwrap();
        assert_eq!(asset.name, "Unknown");
        assert_eq!(asset.threshold, DEFAULT_THRESHOLD);
        assert_eq!(asset.threshold_amount, 1000.0);
        assert_eq!(asset.days_since_purchase, 10);
        assert_eq!(asset.status, AssetStatus::Good);

        assert!(Asset::from_row(&vec![CellValue::Empty], today).is_none());
    }

    #[test]
    fn repair_ids_are_distinct_within_one_second() {
        let now = Utc::now();
        let a = new_repair_id(now);
        let b = new_repair_id(now);
        assert!(a.starts_with("REP"));
        assert_ne!(a, b);
    }

    #[test]
    fn repair_request_accepts_text_numbers() {
        let request: RepairRequest = serde_json::from_str(
            r#"{"assetId":"A","partCost":"100","laborHours":2,"laborRate":"eighty","repairDate":"2024-03-01"}"#,
        )
        .unwrap();
        assert_eq!(request.part_cost, 100.0);
        assert_eq!(request.labor_hours, 2.0);
        assert_eq!(request.labor_rate, 0.0);
        assert_eq!(request.labor_cost(), 0.0);
        assert_eq!(request.total_cost(), 100.0);
        assert_eq!(request.repair_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }
}
