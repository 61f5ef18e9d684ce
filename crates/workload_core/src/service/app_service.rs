//! App use-case service.
//!
//! # Responsibility
//! - Implement list/create/get/update for apps against the storage port.
//! - Own schema bootstrap for the `apps` table.
//! - Wrap every storage failure with the operation and stage it came from.
//!
//! # Invariants
//! - Holds no copy of any app; storage is the only source of truth.
//! - Never retries and never pre-checks uniqueness.
//! - Every cursor it obtains is closed on every exit path.
//! - Caller values reach storage only as positional arguments.

use crate::api::{
    CreateAppRequest, CreateAppResponse, ErrorBody, GetAppByIdRequest, GetAppByIdResponse,
    GetAppsRequest, GetAppsResponse, ServiceResult, StrictServer, UpdateAppRequest,
    UpdateAppResponse,
};
use crate::db::DbError;
use crate::model::app::App;
use crate::storage::{Context, RowCursor, Storage, Value};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};

const CREATE_APPS_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS apps (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
)";
const LIST_APPS_SQL: &str = "SELECT id, name FROM apps";
const GET_APP_SQL: &str = "SELECT id, name FROM apps WHERE id = ?1";
const INSERT_APP_SQL: &str = "INSERT INTO apps (id, name) VALUES (?1, ?2)";
const UPDATE_APP_SQL: &str = "UPDATE apps SET name = ?1 WHERE id = ?2";

/// Logical service operation a storage failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppOperation {
    ListApps,
    CreateApp,
    GetAppById,
    UpdateApp,
}

impl AppOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ListApps => "list_apps",
            Self::CreateApp => "create_app",
            Self::GetAppById => "get_app_by_id",
            Self::UpdateApp => "update_app",
        }
    }
}

/// Step of a storage interaction that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageStage {
    Execute,
    Query,
    Scan,
    Iterate,
}

impl StorageStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Execute => "execute",
            Self::Query => "query",
            Self::Scan => "scan",
            Self::Iterate => "iterate",
        }
    }
}

/// Failures surfaced by the app service.
#[derive(Debug)]
pub enum ServiceError {
    /// A storage call failed while serving a request.
    Storage {
        operation: AppOperation,
        stage: StorageStage,
        source: DbError,
    },
    /// The idempotent `apps` table creation failed.
    SchemaBootstrap(DbError),
}

impl ServiceError {
    fn storage(operation: AppOperation, stage: StorageStage, source: DbError) -> Self {
        Self::Storage {
            operation,
            stage,
            source,
        }
    }

    /// Returns whether the underlying cause is a uniqueness violation, e.g.
    /// creating an app whose id already exists.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Self::Storage { source, .. } | Self::SchemaBootstrap(source) => {
                source.is_unique_violation()
            }
        }
    }

    /// Stable machine-readable code for logs.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Storage { .. } => "storage_error",
            Self::SchemaBootstrap(_) => "schema_bootstrap_error",
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage {
                operation,
                stage,
                source,
            } => write!(
                f,
                "{} failed during {}: {source}",
                operation.as_str(),
                stage.as_str()
            ),
            Self::SchemaBootstrap(err) => write!(f, "failed to create apps table: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage { source, .. } => Some(source),
            Self::SchemaBootstrap(err) => Some(err),
        }
    }
}

/// Use-case service for the apps resource.
///
/// The storage handle is injected by the caller, which also owns its
/// lifetime. Pass `&storage` or an `Arc` to keep access to it.
pub struct AppService<S: Storage> {
    storage: S,
}

impl<S: Storage> AppService<S> {
    /// Creates a service using the provided storage handle.
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Creates the `apps` table when absent.
    ///
    /// Safe to call on every start. Callers may treat the error as
    /// non-fatal; mutating operations fail later while the table is missing.
    pub fn bootstrap_schema(&self, ctx: &Context) -> ServiceResult<()> {
        match self.storage.execute(ctx, CREATE_APPS_TABLE_SQL, &[]) {
            Ok(_) => {
                info!("event=schema_bootstrap module=service status=ok table=apps");
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=schema_bootstrap module=service status=error table=apps error={}",
                    err
                );
                Err(ServiceError::SchemaBootstrap(err))
            }
        }
    }

    /// Lists every app in storage order.
    ///
    /// Returns an empty vector for an empty table. Any scan or iteration
    /// failure discards rows scanned so far.
    pub fn list_apps(&self, ctx: &Context) -> ServiceResult<Vec<App>> {
        let op = AppOperation::ListApps;
        let mut rows = self
            .storage
            .query(ctx, LIST_APPS_SQL, &[])
            .map_err(|err| ServiceError::storage(op, StorageStage::Query, err))
            .inspect_err(|err| log_failure(op, err))?;

        let result = collect_apps(&mut rows, op);
        rows.close();

        let apps = result.inspect_err(|err| log_failure(op, err))?;
        debug!(
            "event=list_apps module=service status=ok count={}",
            apps.len()
        );
        Ok(apps)
    }

    /// Inserts one app and echoes it back without re-reading storage.
    pub fn create_app(&self, ctx: &Context, app: App) -> ServiceResult<App> {
        let op = AppOperation::CreateApp;
        self.storage
            .execute(
                ctx,
                INSERT_APP_SQL,
                &[Value::from(app.id.as_str()), Value::from(app.name.as_str())],
            )
            .map_err(|err| ServiceError::storage(op, StorageStage::Execute, err))
            .inspect_err(|err| log_failure(op, err))?;

        debug!("event=create_app module=service status=ok");
        Ok(app)
    }

    /// Reads one app by id. Returns `Ok(None)` when no row matches.
    pub fn get_app(&self, ctx: &Context, id: &str) -> ServiceResult<Option<App>> {
        let op = AppOperation::GetAppById;
        let mut rows = self
            .storage
            .query(ctx, GET_APP_SQL, &[Value::from(id)])
            .map_err(|err| ServiceError::storage(op, StorageStage::Query, err))
            .inspect_err(|err| log_failure(op, err))?;

        let result = collect_apps(&mut rows, op);
        rows.close();

        let app = result
            .inspect_err(|err| log_failure(op, err))?
            .into_iter()
            .next();
        Ok(app)
    }

    /// Renames one app by id. Returns `Ok(None)` when no row matches.
    pub fn update_app(&self, ctx: &Context, id: &str, name: &str) -> ServiceResult<Option<App>> {
        let op = AppOperation::UpdateApp;
        let changed = self
            .storage
            .execute(ctx, UPDATE_APP_SQL, &[Value::from(name), Value::from(id)])
            .map_err(|err| ServiceError::storage(op, StorageStage::Execute, err))
            .inspect_err(|err| log_failure(op, err))?;

        if changed == 0 {
            return Ok(None);
        }
        Ok(Some(App::new(id, name)))
    }
}

impl<S: Storage> StrictServer for AppService<S> {
    fn get_apps(&self, ctx: &Context, _request: GetAppsRequest) -> ServiceResult<GetAppsResponse> {
        self.list_apps(ctx).map(GetAppsResponse::Ok)
    }

    fn create_app(
        &self,
        ctx: &Context,
        request: CreateAppRequest,
    ) -> ServiceResult<CreateAppResponse> {
        AppService::create_app(self, ctx, request.body).map(CreateAppResponse::Created)
    }

    fn get_app_by_id(
        &self,
        ctx: &Context,
        request: GetAppByIdRequest,
    ) -> ServiceResult<GetAppByIdResponse> {
        Ok(match self.get_app(ctx, &request.app_id)? {
            Some(app) => GetAppByIdResponse::Ok(app),
            None => GetAppByIdResponse::NotFound(ErrorBody::app_not_found(&request.app_id)),
        })
    }

    fn update_app(
        &self,
        ctx: &Context,
        request: UpdateAppRequest,
    ) -> ServiceResult<UpdateAppResponse> {
        let updated = AppService::update_app(self, ctx, &request.app_id, &request.body.name)?;
        Ok(match updated {
            Some(app) => UpdateAppResponse::Ok(app),
            None => UpdateAppResponse::NotFound(ErrorBody::app_not_found(&request.app_id)),
        })
    }
}

fn collect_apps<R: RowCursor>(rows: &mut R, op: AppOperation) -> ServiceResult<Vec<App>> {
    let mut apps = Vec::new();
    while rows.advance() {
        let mut id = String::new();
        let mut name = String::new();
        rows.scan(&mut [&mut id, &mut name])
            .map_err(|err| ServiceError::storage(op, StorageStage::Scan, err))?;
        apps.push(App { id, name });
    }

    if let Some(err) = rows.take_error() {
        return Err(ServiceError::storage(op, StorageStage::Iterate, err));
    }
    Ok(apps)
}

fn log_failure(op: AppOperation, err: &ServiceError) {
    error!(
        "event={} module=service status=error error_code={} error={}",
        op.as_str(),
        err.code(),
        err
    );
}
