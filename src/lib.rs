/*!
# Asset Ledger

Repair tracking for physical assets, with a repair-vs-replace estimator, built in Rust.

## Overview

Every asset has a replacement cost. Each repair recorded against it adds to the
asset's running repair total, and the ratio of that total to the replacement cost
places the asset in a status tier:

| Ratio            | Status        |
|------------------|---------------|
| `>= 0.75`        | `REPLACE NOW` |
| `>= 0.60`        | `WARNING`     |
| `>= 0.40`        | `MONITOR`     |
| below `0.40`     | `GOOD`        |

The estimator answers a separate question for a single pending repair: given the
asset's age, lifespan and costs, is it cheaper to repair or to replace?

## Architecture

### Storage Layer
- **Sheet / Workbook**: named tables of typed cells, keyed by the first column
- **TabularStore**: the row-level trait the ledger is written against
- **MemoryStore**: workbook in memory with snapshot transactions
- **FileStore**: the same, persisted with Gzip compression and bincode on commit

### Ledger Layer
- **Records**: typed `Asset` and `Repair` rows and the status tier rules
- **LedgerService**: every mutation runs as one store transaction under one lock,
  so an asset's derived totals are never lost or left half written
- **Dashboard**: portfolio counts, spend and the top problem assets

### Surfaces
- **cli**: interactive prompt over the ledger
- **website** (feature `web`): JSON API with CSV/XLSX export, CSV import and PNG charts

## Modules

- **sheet**: cell values, rows, sheets and workbooks
- **record**: asset and repair rows, status tiers, request types
- **error**: store and ledger error types
- **store**: the tabular store trait and its memory and file implementations
- **saving**: workbook persistence with compression
- **ledger**: the ledger service and its outcome types
- **dashboard**: dashboard statistics and status counts
- **estimator**: repair-vs-replace recommendation
- **loader**: asset import from CSV
- **downloader**: export functionality (CSV, XLSX)
- **graph**: charts of problem assets and repair history
- **config**: command line and environment configuration
- **app**: routing for the web API

## REST API Endpoints

- `GET/POST /api/assets`, `GET/PUT/DELETE /api/assets/:id`
- `GET /api/assets/:id/status`, `POST /api/assets/:id/recalculate`
- `GET/DELETE /api/assets/:id/repairs`, `GET /api/assets/:id/graph`
- `GET/POST/DELETE /api/repairs`, `DELETE /api/repairs/:id`
- `GET /api/dashboard`, `/api/dashboard/counts`, `/api/dashboard/graph`
- `POST /api/recalculate`, `POST /api/estimate`
- `GET /api/export/csv?table=`, `GET /api/export/xlsx`, `POST /api/import`
*/

pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod estimator;
pub mod ledger;
pub mod loader;
pub mod record;
pub mod saving;
pub mod sheet;
pub mod store;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod graph;

pub use dashboard::{AssetCounts, DashboardStats, TopProblem};
pub use error::{LedgerError, StoreError};
pub use estimator::{Decision, EstimateInput, Recommendation, estimate};
pub use ledger::{LedgerService, Reply, Summary};
pub use record::{Asset, AssetStatus, AssetTotals, NewAsset, Repair, RepairRequest};
pub use store::{FileStore, MemoryStore, Table, TabularStore};
