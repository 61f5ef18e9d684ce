//! Core logic for the workload apps service.
//! This crate owns the typed request contract, the storage port and the
//! business rules behind it. Transport lives in `workload_server`.

pub mod api;
pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;

pub use api::{
    CreateAppRequest, CreateAppResponse, ErrorBody, GetAppByIdRequest, GetAppByIdResponse,
    GetAppsRequest, GetAppsResponse, ResponseObject, ServiceResult, StrictServer,
    UpdateAppBody, UpdateAppRequest, UpdateAppResponse,
};
pub use db::{open_storage, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::app::{App, AppId};
pub use service::app_service::{AppOperation, AppService, ServiceError, StorageStage};
pub use storage::{
    CancelHook, CancelOnDrop, Context, RowCursor, Scan, ScanError, SqliteRows, SqliteStorage,
    Storage, Value,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
