//! Shared domain crate for the store replenishment backend
//!
//! Snapshot loaders, the reconciliation engine, order capture and the order
//! models. Nothing in here touches the network or the database.

pub mod capture;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod sources;
pub mod types;

pub use capture::{capture_batch, capture_line, CaptureError, CaptureRequest, Submitter};
pub use models::*;
pub use reconcile::{
    central_stock, reconcile, suggested_quantity, CentralStock, ProductReconciliation,
    ReconcileError, SnapshotSet, StoreReconciliation,
};
pub use sources::{LoadReport, SourceError, SourceKind, SourceOptions};
pub use types::*;
