//! HTTP transport for the apps contract.
//!
//! # Responsibility
//! - Decode requests into typed request objects.
//! - Run the `StrictServer` on the blocking pool with a request-scoped
//!   `Context`.
//! - Encode typed responses and map service failures to 500.
//!
//! # Invariants
//! - Handlers never touch storage directly.
//! - Dropping a request future cancels its `Context`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use log::{error, info};
use std::sync::Arc;
use std::time::Instant;
use workload_core::{
    App, Context, CreateAppRequest, CreateAppResponse, ErrorBody, GetAppByIdRequest,
    GetAppByIdResponse, GetAppsRequest, GetAppsResponse, ResponseObject, ServiceError,
    ServiceResult, StrictServer, UpdateAppBody, UpdateAppRequest, UpdateAppResponse,
};

pub type SharedServer = Arc<dyn StrictServer + Send + Sync>;

pub fn router(server: SharedServer) -> Router {
    Router::new()
        .route("/apps", get(get_apps).post(create_app))
        .route("/apps/:app_id", get(get_app_by_id).put(update_app))
        .route("/health", get(|| async { StatusCode::OK }))
        .with_state(server)
}

/// Encodes a typed response object with its declared status.
pub struct Reply<R>(pub R);

impl<R: ResponseObject> IntoResponse for Reply<R> {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

/// Undeclared failure rendered as an `ErrorBody` with its status code.
///
/// The message is a stable error code, never the underlying cause.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl From<ServiceError> for HttpError {
    fn from(err: ServiceError) -> Self {
        // Details stay in the logs; clients only learn the failure class.
        Self::internal(err.code())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

async fn get_apps(
    State(server): State<SharedServer>,
) -> Result<Reply<GetAppsResponse>, HttpError> {
    dispatch(server, "get_apps", |server, ctx| server.get_apps(ctx, GetAppsRequest)).await
}

async fn create_app(
    State(server): State<SharedServer>,
    Json(body): Json<App>,
) -> Result<Reply<CreateAppResponse>, HttpError> {
    dispatch(server, "create_app", move |server, ctx| {
        server.create_app(ctx, CreateAppRequest { body })
    })
    .await
}

async fn get_app_by_id(
    State(server): State<SharedServer>,
    Path(app_id): Path<String>,
) -> Result<Reply<GetAppByIdResponse>, HttpError> {
    dispatch(server, "get_app_by_id", move |server, ctx| {
        server.get_app_by_id(ctx, GetAppByIdRequest { app_id })
    })
    .await
}

async fn update_app(
    State(server): State<SharedServer>,
    Path(app_id): Path<String>,
    Json(body): Json<UpdateAppBody>,
) -> Result<Reply<UpdateAppResponse>, HttpError> {
    dispatch(server, "update_app", move |server, ctx| {
        server.update_app(ctx, UpdateAppRequest { app_id, body })
    })
    .await
}

/// Runs one service call on the blocking pool.
///
/// The context is cancelled if this future is dropped before the call
/// returns, so in-flight storage work stops at its next check.
async fn dispatch<R, F>(
    server: SharedServer,
    op: &'static str,
    call: F,
) -> Result<Reply<R>, HttpError>
where
    R: ResponseObject + Send + 'static,
    F: FnOnce(&dyn StrictServer, &Context) -> ServiceResult<R> + Send + 'static,
{
    let started_at = Instant::now();
    let ctx = Context::new();
    let guard = ctx.cancel_on_drop();
    let task_ctx = ctx.clone();

    let joined = tokio::task::spawn_blocking(move || {
        let server: &dyn StrictServer = server.as_ref();
        call(server, &task_ctx)
    })
    .await;
    guard.disarm();

    match joined {
        Ok(Ok(response)) => {
            info!(
                "event=http_request module=http op={} status={} duration_ms={}",
                op,
                response.status(),
                started_at.elapsed().as_millis()
            );
            Ok(Reply(response))
        }
        Ok(Err(err)) => {
            error!(
                "event=http_request module=http op={} status=500 duration_ms={} error_code={} error={}",
                op,
                started_at.elapsed().as_millis(),
                err.code(),
                err
            );
            Err(err.into())
        }
        Err(join_err) => {
            error!(
                "event=http_request module=http op={} status=500 duration_ms={} error_code=handler_panicked error={}",
                op,
                started_at.elapsed().as_millis(),
                join_err
            );
            Err(HttpError::internal("handler_panicked"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{router, SharedServer};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value as JsonValue};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;
    use workload_core::db::open_db_in_memory;
    use workload_core::{
        AppOperation, AppService, Context, CreateAppRequest, CreateAppResponse, DbError,
        GetAppByIdRequest, GetAppByIdResponse, GetAppsRequest, GetAppsResponse, ServiceError,
        ServiceResult, SqliteStorage, StorageStage, StrictServer, UpdateAppRequest,
        UpdateAppResponse,
    };

    fn sqlite_server() -> SharedServer {
        let service = AppService::new(SqliteStorage::new(open_db_in_memory().unwrap()));
        service.bootstrap_schema(&Context::new()).unwrap();
        Arc::new(service)
    }

    fn json_request(method: &str, uri: &str, body: JsonValue) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn empty_request(method: &str, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(response: Response) -> JsonValue {
        let bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn create_then_list_round_trips_through_http() {
        let app = router(sqlite_server());

        let created = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/apps",
                json!({ "id": "1", "name": "App 1" }),
            ))
            .await
            .unwrap();
        assert_eq!(created.status(), StatusCode::CREATED);
        assert_eq!(body_json(created).await, json!({ "id": "1", "name": "App 1" }));

        let listed = app.oneshot(empty_request("GET", "/apps")).await.unwrap();
        assert_eq!(listed.status(), StatusCode::OK);
        assert_eq!(
            body_json(listed).await,
            json!([{ "id": "1", "name": "App 1" }])
        );
    }

    #[tokio::test]
    async fn empty_list_is_json_array() {
        let app = router(sqlite_server());

        let response = app.oneshot(empty_request("GET", "/apps")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!([]));
    }

    #[tokio::test]
    async fn get_and_put_by_id() {
        let app = router(sqlite_server());
        app.clone()
            .oneshot(json_request("POST", "/apps", json!({ "id": "a", "name": "Old" })))
            .await
            .unwrap();

        let updated = app
            .clone()
            .oneshot(json_request("PUT", "/apps/a", json!({ "name": "New" })))
            .await
            .unwrap();
        assert_eq!(updated.status(), StatusCode::OK);
        assert_eq!(body_json(updated).await, json!({ "id": "a", "name": "New" }));

        let fetched = app
            .clone()
            .oneshot(empty_request("GET", "/apps/a"))
            .await
            .unwrap();
        assert_eq!(fetched.status(), StatusCode::OK);
        assert_eq!(body_json(fetched).await, json!({ "id": "a", "name": "New" }));

        let missing = app
            .oneshot(empty_request("GET", "/apps/zzz"))
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn put_on_unknown_id_is_not_found() {
        let app = router(sqlite_server());

        let response = app
            .oneshot(json_request("PUT", "/apps/ghost", json!({ "name": "x" })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn duplicate_create_maps_to_server_error() {
        let app = router(sqlite_server());
        let body = json!({ "id": "x", "name": "A" });

        let first = app
            .clone()
            .oneshot(json_request("POST", "/apps", body.clone()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);

        let second = app
            .oneshot(json_request("POST", "/apps", body))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(second).await, json!({ "message": "storage_error" }));
    }

    #[tokio::test]
    async fn malformed_body_is_rejected_before_the_service() {
        let app = router(Arc::new(FailingServer));

        let response = app
            .oneshot(json_request("POST", "/apps", json!({ "id": "only-id" })))
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn health_is_ok() {
        let app = router(Arc::new(FailingServer));

        let response = app.oneshot(empty_request("GET", "/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn dropped_request_cancels_storage_context() {
        let observed = Arc::new(AtomicBool::new(false));
        let app = router(Arc::new(WaitForCancel {
            observed: Arc::clone(&observed),
        }));

        let request = app.oneshot(empty_request("GET", "/apps"));
        let outcome = tokio::time::timeout(Duration::from_millis(50), request).await;
        assert!(outcome.is_err(), "request should still be in flight");

        for _ in 0..100 {
            if observed.load(Ordering::SeqCst) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("service never observed cancellation");
    }

    struct FailingServer;

    fn failure(operation: AppOperation) -> ServiceError {
        ServiceError::Storage {
            operation,
            stage: StorageStage::Query,
            source: DbError::Backend("unreachable".to_string()),
        }
    }

    impl StrictServer for FailingServer {
        fn get_apps(&self, _: &Context, _: GetAppsRequest) -> ServiceResult<GetAppsResponse> {
            Err(failure(AppOperation::ListApps))
        }

        fn create_app(&self, _: &Context, _: CreateAppRequest) -> ServiceResult<CreateAppResponse> {
            Err(failure(AppOperation::CreateApp))
        }

        fn get_app_by_id(
            &self,
            _: &Context,
            _: GetAppByIdRequest,
        ) -> ServiceResult<GetAppByIdResponse> {
            Err(failure(AppOperation::GetAppById))
        }

        fn update_app(&self, _: &Context, _: UpdateAppRequest) -> ServiceResult<UpdateAppResponse> {
            Err(failure(AppOperation::UpdateApp))
        }
    }

    struct WaitForCancel {
        observed: Arc<AtomicBool>,
    }

    impl StrictServer for WaitForCancel {
        fn get_apps(&self, ctx: &Context, _: GetAppsRequest) -> ServiceResult<GetAppsResponse> {
            for _ in 0..250 {
                if ctx.is_cancelled() {
                    self.observed.store(true, Ordering::SeqCst);
                    return Err(ServiceError::Storage {
                        operation: AppOperation::ListApps,
                        stage: StorageStage::Iterate,
                        source: DbError::Cancelled,
                    });
                }
                std::thread::sleep(Duration::from_millis(20));
            }
            Ok(GetAppsResponse::Ok(Vec::new()))
        }

        fn create_app(&self, _: &Context, _: CreateAppRequest) -> ServiceResult<CreateAppResponse> {
            Err(failure(AppOperation::CreateApp))
        }

        fn get_app_by_id(
            &self,
            _: &Context,
            _: GetAppByIdRequest,
        ) -> ServiceResult<GetAppByIdResponse> {
            Err(failure(AppOperation::GetAppById))
        }

        fn update_app(&self, _: &Context, _: UpdateAppRequest) -> ServiceResult<UpdateAppResponse> {
            Err(failure(AppOperation::UpdateApp))
        }
    }
}
