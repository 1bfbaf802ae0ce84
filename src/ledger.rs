use chrono::{Local, NaiveDate, Utc};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard};

use crate::dashboard::{AssetCounts, DashboardStats};
use crate::error::{LedgerError, StoreError};
use crate::record::{
    Asset, AssetStatus, AssetTotals, AssetUpdate, NewAsset, Repair, RepairRequest,
    finite_or_zero, format_date, new_repair_id,
};
use crate::sheet::{CellValue, Row, RowPatch};
use crate::store::{Table, TabularStore};

/// Human-readable outcome line for a ledger operation.
pub trait Summary {
    fn summary(&self) -> String;
}

/// Wire shape of every mutating ledger call: `{success, message, ...data}`.
///
/// Callers check `success` instead of relying on an error channel.
#[derive(Serialize, Debug)]
pub struct Reply<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(flatten)]
    pub data: Option<T>,
}

impl<T> Reply<T> {
    pub fn failure(err: &LedgerError) -> Self {
        Reply {
            success: false,
            message: err.to_string(),
            error: Some(err.kind()),
            data: None,
        }
    }
}

impl<T: Summary> From<Result<T, LedgerError>> for Reply<T> {
    fn from(result: Result<T, LedgerError>) -> Self {
        match result {
            Ok(data) => Reply {
                success: true,
                message: data.summary(),
                error: None,
                data: Some(data),
            },
            Err(err) => Reply::failure(&err),
        }
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AddRepairOutcome {
    pub repair: Repair,
    pub asset_name: String,
    pub replacement_cost: f64,
    pub running_total: f64,
    pub percent_of_replacement: f64,
    pub new_status: AssetStatus,
}

impl Summary for AddRepairOutcome {
    fn summary(&self) -> String {
        format!(
            "Repair added for {}! Total: ${:.2} ({:.1}% of ${}). Status: {}",
            self.asset_name,
            self.running_total,
            self.percent_of_replacement * 100.0,
            CellValue::Number(self.replacement_cost).as_text(),
            self.new_status.label()
        )
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRepairOutcome {
    pub repair_id: String,
    pub asset_id: String,
    /// `None` when the repair pointed at an asset that no longer exists.
    pub totals: Option<AssetTotals>,
}

impl Summary for DeleteRepairOutcome {
    fn summary(&self) -> String {
        format!("Deleted repair {} and updated asset totals", self.repair_id)
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetRepairsDeleted {
    pub asset_id: String,
    pub deleted_count: usize,
}

impl Summary for AssetRepairsDeleted {
    fn summary(&self) -> String {
        format!(
            "Deleted {} repairs for {} and reset totals",
            self.deleted_count, self.asset_id
        )
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllRepairsDeleted {
    pub deleted_count: usize,
    pub assets_reset: usize,
}

impl Summary for AllRepairsDeleted {
    fn summary(&self) -> String {
        "All repairs deleted and all assets reset".to_string()
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusesRecalculated {
    pub updated: usize,
}

impl Summary for StatusesRecalculated {
    fn summary(&self) -> String {
        format!("Updated {} asset statuses", self.updated)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssetAction {
    Added,
    Updated,
    Recalculated,
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetChange {
    pub asset: Asset,
    #[serde(skip)]
    pub action: AssetAction,
}

impl Summary for AssetChange {
    fn summary(&self) -> String {
        match self.action {
            AssetAction::Added => format!("Asset {} added", self.asset.id),
            AssetAction::Updated => format!("Asset {} updated", self.asset.id),
            AssetAction::Recalculated => format!(
                "Recalculated totals for {}: ${:.2}, status {}",
                self.asset.id,
                self.asset.total_repairs,
                self.asset.status.label()
            ),
        }
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssetDeleted {
    pub asset_id: String,
    pub deleted_repairs: usize,
}

impl Summary for AssetDeleted {
    fn summary(&self) -> String {
        format!(
            "Deleted asset {} and {} repairs",
            self.asset_id, self.deleted_repairs
        )
    }
}

#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub added: usize,
    pub skipped: usize,
}

impl Summary for ImportOutcome {
    fn summary(&self) -> String {
        format!("Imported {} assets ({} skipped)", self.added, self.skipped)
    }
}

/// Stored status next to the one its stored ratio implies.
#[derive(Clone, Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StatusCheck {
    pub asset_id: String,
    pub name: String,
    pub replacement_cost: f64,
    pub total_repairs: f64,
    /// Percent of replacement scaled to 0..100
    pub percentage: f64,
    pub current_status: AssetStatus,
    pub expected_status: AssetStatus,
    pub consistent: bool,
}

/// Repair ledger over a tabular store.
///
/// The store sits behind one lock, so every mutation below is serialised and runs
/// as a single store transaction: either all of its row writes land or none do.
pub struct LedgerService<S> {
    store: Mutex<S>,
}

impl<S: TabularStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        LedgerService {
            store: Mutex::new(store),
        }
    }

    pub fn into_inner(self) -> Result<S, LedgerError> {
        self.store.into_inner().map_err(|_| poisoned())
    }

    fn lock(&self) -> Result<MutexGuard<'_, S>, LedgerError> {
        self.store.lock().map_err(|_| poisoned())
    }

    fn transact<T>(
        &self,
        operation: &str,
        f: impl FnOnce(&mut S) -> Result<T, LedgerError>,
    ) -> Result<T, LedgerError> {
        let mut store = self.lock()?;
        store.begin()?;
        match f(&mut *store) {
            Ok(value) => {
                if let Err(e) = store.commit() {
                    error!("{} could not be committed: {}", operation, e);
                    if let Err(rb) = store.rollback() {
                        error!("{} rollback failed: {}", operation, rb);
                    }
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                warn!("{} rolled back: {}", operation, e);
                if let Err(rb) = store.rollback() {
                    error!("{} rollback failed: {}", operation, rb);
                }
                Err(e)
            }
        }
    }

    /// Raw rows of one table, in schema column order.
    pub fn table_rows(&self, table: Table) -> Result<Vec<Row>, LedgerError> {
        Ok(self.lock()?.list_rows(table)?)
    }

    pub fn get_assets(&self) -> Result<Vec<Asset>, LedgerError> {
        let store = self.lock()?;
        let assets = load_assets(&*store, today())?;
        debug!("Loaded {} assets", assets.len());
        Ok(assets)
    }

    pub fn get_asset(&self, asset_id: &str) -> Result<Asset, LedgerError> {
        let store = self.lock()?;
        find_asset(&*store, asset_id.trim())
    }

    pub fn get_repairs(&self) -> Result<Vec<Repair>, LedgerError> {
        let store = self.lock()?;
        let repairs = load_repairs(&*store)?;
        debug!("Loaded {} repairs", repairs.len());
        Ok(repairs)
    }

    /// Repairs of one asset in the order they were recorded.
    ///
    /// # Errors
    /// * `NotFound` if the asset does not exist
    pub fn get_repairs_for_asset(&self, asset_id: &str) -> Result<Vec<Repair>, LedgerError> {
        let store = self.lock()?;
        let asset = find_asset(&*store, asset_id.trim())?;
        Ok(load_repairs(&*store)?
            .into_iter()
            .filter(|r| r.asset_id == asset.id)
            .collect())
    }

    /// Register a new asset with zero repair totals.
    ///
    /// # Errors
    /// * `Validation` if the id is empty, already taken, or the replacement cost is negative
    pub fn add_asset(&self, new_asset: NewAsset) -> Result<AssetChange, LedgerError> {
        self.transact("add_asset", |store| {
            let existing = load_assets(&*store, today())?;
            let asset = validate_new_asset(new_asset, &existing)?;
            store.append_row(Table::Assets, asset.to_row())?;
            info!("Added asset {} ({})", asset.id, asset.name);
            Ok(AssetChange {
                asset,
                action: AssetAction::Added,
            })
        })
    }

    /// Add a batch of assets in one transaction. Invalid or duplicate entries are
    /// skipped and counted rather than failing the batch.
    pub fn add_assets(&self, batch: Vec<NewAsset>) -> Result<ImportOutcome, LedgerError> {
        self.transact("add_assets", |store| {
            let mut existing = load_assets(&*store, today())?;
            let mut outcome = ImportOutcome {
                added: 0,
                skipped: 0,
            };
            for new_asset in batch {
                match validate_new_asset(new_asset, &existing) {
                    Ok(asset) => {
                        store.append_row(Table::Assets, asset.to_row())?;
                        existing.push(asset);
                        outcome.added += 1;
                    }
                    Err(e) => {
                        debug!("Skipping asset: {}", e);
                        outcome.skipped += 1;
                    }
                }
            }
            info!(
                "Imported {} assets, skipped {}",
                outcome.added, outcome.skipped
            );
            Ok(outcome)
        })
    }

    /// Edit descriptive fields and the replacement cost of an asset. The ratio and
    /// status are re-derived from the stored repair total afterwards.
    pub fn update_asset(
        &self,
        asset_id: &str,
        update: AssetUpdate,
    ) -> Result<AssetChange, LedgerError> {
        let asset_id = asset_id.trim().to_string();
        self.transact("update_asset", |store| {
            let mut asset = find_asset(&*store, &asset_id)?;

            if let Some(name) = update.name.filter(|n| !n.trim().is_empty()) {
                asset.name = name;
            }
            if let Some(category) = update.category.filter(|c| !c.trim().is_empty()) {
                asset.category = category;
            }
            if update.purchase_date.is_some() {
                asset.purchase_date = update.purchase_date;
            }
            if let Some(cost) = update.replacement_cost {
                if !cost.is_finite() || cost < 0.0 {
                    return Err(LedgerError::Validation(
                        "Replacement cost must be a non-negative number".to_string(),
                    ));
                }
                asset.replacement_cost = cost;
            }
            if let Some(threshold) = update.threshold.filter(|t| *t != 0.0) {
                if !threshold.is_finite() {
                    return Err(LedgerError::Validation(
                        "Threshold must be a number".to_string(),
                    ));
                }
                asset.threshold = threshold;
            }
            asset.threshold_amount = asset.replacement_cost * asset.threshold / 100.0;
            if let Some(date) = asset.purchase_date {
                asset.days_since_purchase = (today() - date).num_days();
            }
            asset.apply_totals(AssetTotals::derive(
                asset.total_repairs,
                asset.replacement_cost,
            ));

            let patch = RowPatch::new()
                .set("Asset Name", CellValue::text(asset.name.clone()))
                .set("Category", CellValue::text(asset.category.clone()))
                .set(
                    "Purchase Date",
                    CellValue::text(format_date(asset.purchase_date)),
                )
                .set("Replacement Cost", CellValue::Number(asset.replacement_cost))
                .set("Threshold %", CellValue::Number(asset.threshold))
                .set("Threshold Amount", CellValue::Number(asset.threshold_amount))
                .set(
                    "Days Since Purchase",
                    CellValue::Number(asset.days_since_purchase as f64),
                );
            store.update_row(Table::Assets, &asset.id, &patch)?;
            write_totals(store, &asset.id, asset.totals())?;

            info!("Updated asset {}", asset.id);
            Ok(AssetChange {
                asset,
                action: AssetAction::Updated,
            })
        })
    }

    /// Remove an asset together with its repair history.
    pub fn delete_asset(&self, asset_id: &str) -> Result<AssetDeleted, LedgerError> {
        let asset_id = asset_id.trim().to_string();
        self.transact("delete_asset", |store| {
            let asset = find_asset(&*store, &asset_id)?;
            let deleted_repairs = delete_repairs_of(store, &asset.id)?;
            store.delete_row(Table::Assets, &asset.id)?;
            info!(
                "Deleted asset {} with {} repairs",
                asset.id, deleted_repairs
            );
            Ok(AssetDeleted {
                asset_id: asset.id,
                deleted_repairs,
            })
        })
    }

    /// Record a repair against an asset and roll it into the asset's totals.
    ///
    /// Labor cost is `labor_hours * labor_rate` and the repair total is
    /// `part_cost + labor_cost`. The new running total is the asset's stored total
    /// plus this repair; the repair row keeps a snapshot of it and of the ratio.
    ///
    /// # Arguments
    /// * `request` - Asset id, date, part, costs and notes. Non-finite numbers count as 0
    ///
    /// # Returns
    /// * `Result<AddRepairOutcome, LedgerError>` - The stored repair plus the asset's new totals
    ///
    /// # Errors
    /// * `NotFound` if the asset does not exist
    /// * `StoreUnavailable` if the store rejects a write (nothing is kept in that case)
    pub fn add_repair(&self, request: RepairRequest) -> Result<AddRepairOutcome, LedgerError> {
        let asset_id = request.asset_id.trim().to_string();
        self.transact("add_repair", |store| {
            let asset = find_asset(&*store, &asset_id)?;

            let labor_cost = request.labor_cost();
            let total_cost = request.total_cost();
            let totals = AssetTotals::derive(asset.total_repairs + total_cost, asset.replacement_cost);

            let now = Utc::now();
            let repair = Repair {
                repair_id: new_repair_id(now),
                asset_id: asset.id.clone(),
                repair_date: request.repair_date,
                part_name: request.part_name.clone(),
                part_cost: finite_or_zero(request.part_cost),
                labor_hours: finite_or_zero(request.labor_hours),
                labor_rate: finite_or_zero(request.labor_rate),
                labor_cost,
                total_cost,
                running_total: totals.total_repairs,
                percent_of_replacement: totals.percent_of_replacement,
                notes: request.notes.clone(),
                timestamp: Some(now),
            };

            store.append_row(Table::Repairs, repair.to_row())?;
            write_totals(store, &asset.id, totals)?;

            info!(
                "Repair {} on {}: total repairs {:.2}, {:.1}% of replacement, status {}",
                repair.repair_id,
                asset.id,
                totals.total_repairs,
                totals.percent_of_replacement * 100.0,
                totals.status
            );

            Ok(AddRepairOutcome {
                repair,
                asset_name: asset.name,
                replacement_cost: asset.replacement_cost,
                running_total: totals.total_repairs,
                percent_of_replacement: totals.percent_of_replacement,
                new_status: totals.status,
            })
        })
    }

    /// Remove one repair and rebuild its asset's totals from the repairs that remain.
    ///
    /// # Errors
    /// * `NotFound` if no repair has that id
    pub fn delete_repair(&self, repair_id: &str) -> Result<DeleteRepairOutcome, LedgerError> {
        let repair_id = repair_id.trim().to_string();
        self.transact("delete_repair", |store| {
            let repair = load_repairs(&*store)?
                .into_iter()
                .find(|r| r.repair_id == repair_id)
                .ok_or_else(|| LedgerError::repair_not_found(&repair_id))?;

            store.delete_row(Table::Repairs, &repair.repair_id)?;

            let totals = match recalculate_in(store, &repair.asset_id) {
                Ok(asset) => Some(asset.totals()),
                Err(LedgerError::NotFound(_)) => {
                    warn!(
                        "Repair {} belonged to missing asset {}",
                        repair.repair_id, repair.asset_id
                    );
                    None
                }
                Err(e) => return Err(e),
            };

            info!("Deleted repair {} from {}", repair.repair_id, repair.asset_id);
            Ok(DeleteRepairOutcome {
                repair_id: repair.repair_id,
                asset_id: repair.asset_id,
                totals,
            })
        })
    }

    /// Rebuild an asset's total, ratio and status by summing the `total_cost` of its
    /// repairs. Running it again without intervening changes gives the same result.
    ///
    /// # Errors
    /// * `NotFound` if the asset does not exist
    pub fn recalculate_asset_totals(&self, asset_id: &str) -> Result<AssetChange, LedgerError> {
        let asset_id = asset_id.trim().to_string();
        self.transact("recalculate_asset_totals", |store| {
            let asset = recalculate_in(store, &asset_id)?;
            Ok(AssetChange {
                asset,
                action: AssetAction::Recalculated,
            })
        })
    }

    /// Drop every repair of one asset and reset it to 0 / 0 / GOOD.
    ///
    /// An unknown asset id is not an error: any repairs still carrying that id are
    /// removed and the count reports them.
    pub fn delete_all_repairs_for_asset(
        &self,
        asset_id: &str,
    ) -> Result<AssetRepairsDeleted, LedgerError> {
        let asset_id = asset_id.trim().to_string();
        self.transact("delete_all_repairs_for_asset", |store| {
            let deleted_count = delete_repairs_of(store, &asset_id)?;
            let reset = store.update_row(Table::Assets, &asset_id, &AssetTotals::zero().to_patch())?;
            if !reset {
                debug!("No asset row for {}, only repairs were removed", asset_id);
            }
            info!("Deleted {} repairs for {}", deleted_count, asset_id);
            Ok(AssetRepairsDeleted {
                asset_id: asset_id.clone(),
                deleted_count,
            })
        })
    }

    /// Empty the Repairs table and reset every asset.
    pub fn delete_all_repairs(&self) -> Result<AllRepairsDeleted, LedgerError> {
        self.transact("delete_all_repairs", |store| {
            let deleted_count = store.clear(Table::Repairs)?;
            let assets = load_assets(&*store, today())?;
            let zero = AssetTotals::zero().to_patch();
            for asset in &assets {
                store.update_row(Table::Assets, &asset.id, &zero)?;
            }
            info!(
                "Deleted all {} repairs and reset {} assets",
                deleted_count,
                assets.len()
            );
            Ok(AllRepairsDeleted {
                deleted_count,
                assets_reset: assets.len(),
            })
        })
    }

    /// Re-derive ratio and status of every asset from its stored total and
    /// replacement cost. Used to repair stale rows.
    pub fn recalculate_all_statuses(&self) -> Result<StatusesRecalculated, LedgerError> {
        self.transact("recalculate_all_statuses", |store| {
            let assets = load_assets(&*store, today())?;
            let mut updated = 0;
            for asset in &assets {
                let totals = AssetTotals::derive(asset.total_repairs, asset.replacement_cost);
                write_totals(store, &asset.id, totals)?;
                updated += 1;
            }
            info!("Recalculated statuses for {} assets", updated);
            Ok(StatusesRecalculated { updated })
        })
    }

    pub fn dashboard_stats(&self) -> Result<DashboardStats, LedgerError> {
        let store = self.lock()?;
        let assets = load_assets(&*store, today())?;
        let repairs = load_repairs(&*store)?;
        Ok(DashboardStats::from_records(&assets, &repairs))
    }

    pub fn asset_counts(&self) -> Result<AssetCounts, LedgerError> {
        Ok(AssetCounts::from_assets(&self.get_assets()?))
    }

    pub fn check_asset_status(&self, asset_id: &str) -> Result<StatusCheck, LedgerError> {
        let asset = self.get_asset(asset_id)?;
        let expected_status = AssetStatus::classify(asset.percent_of_replacement);
        Ok(StatusCheck {
            asset_id: asset.id,
            name: asset.name,
            replacement_cost: asset.replacement_cost,
            total_repairs: asset.total_repairs,
            percentage: asset.percent_of_replacement * 100.0,
            current_status: asset.status,
            expected_status,
            consistent: asset.status == expected_status,
        })
    }
}

fn poisoned() -> LedgerError {
    LedgerError::StoreUnavailable(StoreError::Unavailable(
        "ledger store lock poisoned".to_string(),
    ))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn load_assets<S: TabularStore>(store: &S, today: NaiveDate) -> Result<Vec<Asset>, LedgerError> {
    Ok(store
        .list_rows(Table::Assets)?
        .iter()
        .filter_map(|row| Asset::from_row(row, today))
        .collect())
}

fn load_repairs<S: TabularStore>(store: &S) -> Result<Vec<Repair>, LedgerError> {
    Ok(store
        .list_rows(Table::Repairs)?
        .iter()
        .filter_map(Repair::from_row)
        .collect())
}

fn find_asset<S: TabularStore>(store: &S, asset_id: &str) -> Result<Asset, LedgerError> {
    load_assets(store, today())?
        .into_iter()
        .find(|a| a.id == asset_id)
        .ok_or_else(|| LedgerError::asset_not_found(asset_id))
}

fn write_totals<S: TabularStore>(
    store: &mut S,
    asset_id: &str,
    totals: AssetTotals,
) -> Result<(), LedgerError> {
    if store.update_row(Table::Assets, asset_id, &totals.to_patch())? {
        Ok(())
    } else {
        Err(LedgerError::asset_not_found(asset_id))
    }
}

fn recalculate_in<S: TabularStore>(store: &mut S, asset_id: &str) -> Result<Asset, LedgerError> {
    let mut asset = find_asset(&*store, asset_id)?;
    let total: f64 = load_repairs(&*store)?
        .iter()
        .filter(|r| r.asset_id == asset.id)
        .map(|r| r.total_cost)
        .sum();

    let totals = AssetTotals::derive(total, asset.replacement_cost);
    write_totals(store, &asset.id, totals)?;
    asset.apply_totals(totals);
    debug!(
        "Recalculated {}: {:.2} ({})",
        asset.id, totals.total_repairs, totals.status
    );
    Ok(asset)
}

fn delete_repairs_of<S: TabularStore>(store: &mut S, asset_id: &str) -> Result<usize, LedgerError> {
    let ids: Vec<String> = load_repairs(&*store)?
        .into_iter()
        .filter(|r| r.asset_id == asset_id)
        .map(|r| r.repair_id)
        .collect();

    let mut deleted = 0;
    for id in ids {
        if store.delete_row(Table::Repairs, &id)? {
            deleted += 1;
        }
    }
    Ok(deleted)
}

fn validate_new_asset(new_asset: NewAsset, existing: &[Asset]) -> Result<Asset, LedgerError> {
    let id = new_asset.id.trim();
    if id.is_empty() {
        return Err(LedgerError::Validation("Asset ID cannot be empty".to_string()));
    }
    if existing.iter().any(|a| a.id == id) {
        return Err(LedgerError::Validation(format!("Asset ID already exists: {}", id)));
    }
    if !new_asset.replacement_cost.is_finite() || new_asset.replacement_cost < 0.0 {
        return Err(LedgerError::Validation(
            "Replacement cost cannot be negative".to_string(),
        ));
    }
    Ok(new_asset.into_asset(today()))
}
