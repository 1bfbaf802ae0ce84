use serde::{Deserialize, Deserializer, Serialize};

use crate::record::finite_or_zero;
use crate::sheet::coerce_number;

/// Fixed horizon for both total-cost-of-ownership figures, in years.
pub const TCO_YEARS: f64 = 5.0;
/// Yearly upkeep of a repaired asset as a share of the repair cost.
pub const REPAIR_MAINTENANCE_RATE: f64 = 0.15;
/// Yearly upkeep of a new asset as a share of its price.
pub const REPLACE_MAINTENANCE_RATE: f64 = 0.05;
/// Yearly energy saving of an efficient replacement as a share of its price.
pub const ENERGY_SAVINGS_RATE: f64 = 0.20;
/// Share of the remaining life a repair buys back.
pub const REPAIR_LIFE_EXTENSION: f64 = 0.5;

pub const DEFAULT_LIFESPAN: f64 = 10.0;
pub const DEFAULT_LABOR_RATE: f64 = 80.0;
pub const DEFAULT_LABOR_RATE_LABEL: &str = "Day Rate - $80/hour";

const MAX_CONFIDENCE: f64 = 95.0;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Decision {
    Repair,
    Replace,
}

/// One estimate request. Numbers may arrive as JSON numbers or numeric text;
/// anything unreadable counts as 0.
#[derive(Clone, Serialize, Deserialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimateInput {
    #[serde(deserialize_with = "form_number")]
    pub asset_age: f64,
    #[serde(deserialize_with = "form_number")]
    pub original_cost: f64,
    #[serde(deserialize_with = "form_number")]
    pub repair_cost: f64,
    #[serde(deserialize_with = "form_number")]
    pub replace_cost: f64,
    #[serde(deserialize_with = "form_number")]
    pub lifespan: f64,
    #[serde(deserialize_with = "form_flag")]
    pub energy_efficiency: bool,
    #[serde(deserialize_with = "form_number")]
    pub parts_cost: f64,
    #[serde(deserialize_with = "form_number")]
    pub labor_hours: f64,
    #[serde(deserialize_with = "form_number")]
    pub labor_rate: f64,
    pub labor_rate_label: Option<String>,
}

impl EstimateInput {
    pub fn new(
        asset_age: f64,
        original_cost: f64,
        repair_cost: f64,
        replace_cost: f64,
        lifespan: f64,
        energy_efficiency: bool,
    ) -> Self {
        EstimateInput {
            asset_age,
            original_cost,
            repair_cost,
            replace_cost,
            lifespan,
            energy_efficiency,
            ..Default::default()
        }
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recommendation {
    pub recommendation: Decision,
    pub confidence: i64,
    pub parts_cost: f64,
    pub labor_hours: f64,
    pub labor_rate: f64,
    pub labor_rate_label: String,
    pub labor_cost: f64,
    pub repair_cost: f64,
    pub replace_cost: f64,
    pub repair_percentage: f64,
    pub current_value: i64,
    pub depreciation: i64,
    pub remaining_life: f64,
    pub repair_tco: i64,
    pub replace_tco: i64,
    pub savings_amount: i64,
    pub energy_savings: i64,
}

/// Labor plus parts, as the calculator form fills in the repair cost.
pub fn repair_cost_from_parts(parts_cost: f64, labor_hours: f64, labor_rate: f64) -> f64 {
    let rate = if labor_rate > 0.0 { labor_rate } else { DEFAULT_LABOR_RATE };
    finite_or_zero(parts_cost) + finite_or_zero(labor_hours) * rate
}

/// Decide whether repairing or replacing an asset is the better buy.
///
/// Rules are tried in order and the first match wins:
/// 1. repair costs more than half of a replacement
/// 2. the asset is more than 80% depreciated
/// 3. less than two years of life remain
/// 4. otherwise repair
///
/// An efficient replacement whose five-year energy savings exceed twice the repair
/// cost always wins, with at least 80% confidence.
///
/// # Arguments
/// * `input` - Age, lifespan, costs and the energy-efficiency flag
///
/// # Returns
/// * `Recommendation` - The decision plus the figures behind it, rounded for display
///
/// # Examples
/// ```
/// use asset_ledger::estimator::{Decision, EstimateInput, estimate};
///
/// let result = estimate(&EstimateInput::new(8.0, 1000.0, 600.0, 1000.0, 10.0, false));
/// assert_eq!(result.recommendation, Decision::Replace);
/// assert_eq!(result.confidence, 60);
/// ```
pub fn estimate(input: &EstimateInput) -> Recommendation {
    let asset_age = finite_or_zero(input.asset_age);
    let original_cost = finite_or_zero(input.original_cost);
    let replace_cost = finite_or_zero(input.replace_cost);
    let lifespan = match finite_or_zero(input.lifespan) {
        l if l > 0.0 => l,
        _ => DEFAULT_LIFESPAN,
    };

    let parts_cost = finite_or_zero(input.parts_cost);
    let labor_hours = finite_or_zero(input.labor_hours);
    let labor_rate = match finite_or_zero(input.labor_rate) {
        r if r > 0.0 => r,
        _ => DEFAULT_LABOR_RATE,
    };
    let labor_cost = labor_hours * labor_rate;
    let repair_cost = match finite_or_zero(input.repair_cost) {
        c if c > 0.0 => c,
        _ => repair_cost_from_parts(parts_cost, labor_hours, labor_rate),
    };

    let depreciation = (asset_age / lifespan) * 100.0;
    let current_value = original_cost * (1.0 - depreciation / 100.0);

    let repair_percentage = if replace_cost > 0.0 {
        (repair_cost / replace_cost) * 100.0
    } else {
        0.0
    };

    let remaining_life = (lifespan - asset_age).max(0.0);
    let repair_life_extension = remaining_life * REPAIR_LIFE_EXTENSION;

    let repair_tco =
        repair_cost + repair_cost * REPAIR_MAINTENANCE_RATE * repair_life_extension.min(TCO_YEARS);
    let replace_tco = replace_cost + replace_cost * REPLACE_MAINTENANCE_RATE * TCO_YEARS;

    let energy_savings = if input.energy_efficiency {
        replace_cost * ENERGY_SAVINGS_RATE * TCO_YEARS
    } else {
        0.0
    };
    let adjusted_replace_tco = replace_tco - energy_savings;

    let (mut recommendation, mut confidence) = if repair_percentage > 50.0 {
        (
            Decision::Replace,
            MAX_CONFIDENCE.min(50.0 + (repair_percentage - 50.0)),
        )
    } else if depreciation > 80.0 {
        (
            Decision::Replace,
            MAX_CONFIDENCE.min(60.0 + (depreciation - 80.0)),
        )
    } else if remaining_life < 2.0 {
        (Decision::Replace, 85.0)
    } else {
        (Decision::Repair, MAX_CONFIDENCE.min(90.0 - repair_percentage))
    };

    if input.energy_efficiency && energy_savings > repair_cost * 2.0 {
        recommendation = Decision::Replace;
        confidence = confidence.max(80.0);
    }

    Recommendation {
        recommendation,
        confidence: js_round(confidence),
        parts_cost,
        labor_hours,
        labor_rate,
        labor_rate_label: input
            .labor_rate_label
            .clone()
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LABOR_RATE_LABEL.to_string()),
        labor_cost,
        repair_cost,
        replace_cost,
        repair_percentage: round_tenths(repair_percentage),
        current_value: js_round(current_value),
        depreciation: js_round(depreciation),
        remaining_life: round_tenths(remaining_life),
        repair_tco: js_round(repair_tco),
        replace_tco: js_round(adjusted_replace_tco),
        savings_amount: js_round((repair_tco - adjusted_replace_tco).abs()),
        energy_savings: js_round(energy_savings),
    }
}

/// Half-way values round towards positive infinity (`-2.5` becomes `-2`).
fn js_round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn round_tenths(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}

fn form_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64().map(finite_or_zero).unwrap_or(0.0),
        Some(serde_json::Value::String(s)) => coerce_number(&s),
        _ => 0.0,
    })
}

// Checkbox values: `true`, `"on"`, `"yes"`, `"1"` or any non-zero number
fn form_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => b,
        Some(serde_json::Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(serde_json::Value::String(s)) => matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "true" | "on" | "yes" | "1"
        ),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn js_round_matches_browser_rounding() {
        assert_eq!(js_round(2.5), 3);
        assert_eq!(js_round(-2.5), -2);
        assert_eq!(js_round(-100.6), -101);
        assert_eq!(round_tenths(1.25), 1.3);
    }

    #[test]
    fn parts_and_labor_use_default_rate_when_unset() {
        assert_eq!(repair_cost_from_parts(100.0, 2.0, 0.0), 260.0);
        assert_eq!(repair_cost_from_parts(100.0, 2.0, 50.0), 200.0);
        assert_eq!(repair_cost_from_parts(f64::NAN, 1.0, 80.0), 80.0);
    }
}
