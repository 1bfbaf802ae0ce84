use serde::Serialize;

use crate::record::{Asset, AssetStatus, Repair};

pub const TOP_PROBLEM_LIMIT: usize = 5;

/// Asset summary shown in the "top problems" list.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopProblem {
    pub id: String,
    pub name: String,
    pub total_repairs: f64,
    pub percent_of_replacement: f64,
    pub status: AssetStatus,
}

/// Fleet-wide figures for the dashboard.
///
/// `warnings` folds the WARNING and MONITOR tiers together. That merge exists only
/// here; assets keep their own distinct status.
#[derive(Clone, Serialize, Debug, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_assets: usize,
    pub need_replacement: usize,
    pub warnings: usize,
    pub good: usize,
    pub total_repair_cost: f64,
    pub repair_count: usize,
    pub average_repair_cost: f64,
    pub top_problems: Vec<TopProblem>,
}

impl DashboardStats {
    pub fn from_records(assets: &[Asset], repairs: &[Repair]) -> Self {
        let valid: Vec<&Asset> = assets.iter().filter(|a| !a.is_sentinel()).collect();

        let mut stats = DashboardStats {
            total_assets: valid.len(),
            repair_count: repairs.len(),
            ..Default::default()
        };

        for asset in &valid {
            stats.total_repair_cost += asset.total_repairs;
            match asset.status {
                AssetStatus::ReplaceNow => stats.need_replacement += 1,
                AssetStatus::Warning | AssetStatus::Monitor => stats.warnings += 1,
                AssetStatus::Good => stats.good += 1,
            }
        }

        if !repairs.is_empty() {
            let total: f64 = repairs.iter().map(|r| r.total_cost).sum();
            stats.average_repair_cost = total / repairs.len() as f64;
        }

        stats.top_problems = top_problems(&valid, TOP_PROBLEM_LIMIT);
        stats
    }
}

/// Assets with any repair spend, highest spend first. `sort_by` is stable, so
/// equal totals keep their table order.
fn top_problems(assets: &[&Asset], limit: usize) -> Vec<TopProblem> {
    let mut ranked: Vec<&Asset> = assets
        .iter()
        .copied()
        .filter(|a| a.total_repairs > 0.0)
        .collect();
    ranked.sort_by(|a, b| b.total_repairs.total_cmp(&a.total_repairs));

    ranked
        .into_iter()
        .take(limit)
        .map(|a| TopProblem {
            id: a.id.clone(),
            name: a.name.clone(),
            total_repairs: a.total_repairs,
            percent_of_replacement: a.percent_of_replacement,
            status: a.status,
        })
        .collect()
}

/// Per-tier asset counts, without the dashboard's WARNING/MONITOR merge.
#[derive(Clone, Serialize, Debug, Default, PartialEq, Eq)]
pub struct AssetCounts {
    pub total: usize,
    pub good: usize,
    pub monitor: usize,
    pub warning: usize,
    pub replace: usize,
}

impl AssetCounts {
    pub fn from_assets(assets: &[Asset]) -> Self {
        let mut counts = AssetCounts::default();
        for asset in assets.iter().filter(|a| !a.is_sentinel()) {
            counts.total += 1;
            match asset.status {
                AssetStatus::Good => counts.good += 1,
                AssetStatus::Monitor => counts.monitor += 1,
                AssetStatus::Warning => counts.warning += 1,
                AssetStatus::ReplaceNow => counts.replace += 1,
            }
        }
        counts
    }
}
