//! Strict request/response contract for the apps HTTP surface.
//!
//! # Responsibility
//! - Define one typed request object per operation, as decoded by transport.
//! - Define one response enum per operation with a variant per declared
//!   status code.
//! - Define the [`StrictServer`] trait business logic implements.
//!
//! # Invariants
//! - Transport only builds request objects and encodes response objects; it
//!   never reaches storage.
//! - Declared outcomes (including "not found") are response variants. Only
//!   undeclared failures travel as `ServiceError`.

use crate::model::app::{App, AppId};
use crate::service::app_service::ServiceError;
use crate::storage::Context;
use serde::{Deserialize, Serialize};

/// `GET /apps`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetAppsRequest;

/// `POST /apps`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAppRequest {
    pub body: App,
}

/// `GET /apps/{appId}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetAppByIdRequest {
    pub app_id: AppId,
}

/// `PUT /apps/{appId}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAppRequest {
    pub app_id: AppId,
    pub body: UpdateAppBody,
}

/// Body accepted by `PUT /apps/{appId}`. Extra fields such as `id` are
/// ignored; the path parameter is authoritative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateAppBody {
    pub name: String,
}

/// Error payload for declared non-success responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn app_not_found(app_id: &str) -> Self {
        Self {
            message: format!("app not found: {app_id}"),
        }
    }
}

/// Status code and body of a typed response.
///
/// Response enums serialize to the body of their active variant.
pub trait ResponseObject: Serialize {
    fn status(&self) -> u16;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GetAppsResponse {
    Ok(Vec<App>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum CreateAppResponse {
    Created(App),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum GetAppByIdResponse {
    Ok(App),
    NotFound(ErrorBody),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum UpdateAppResponse {
    Ok(App),
    NotFound(ErrorBody),
}

impl ResponseObject for GetAppsResponse {
    fn status(&self) -> u16 {
        200
    }
}

impl ResponseObject for CreateAppResponse {
    fn status(&self) -> u16 {
        201
    }
}

impl ResponseObject for GetAppByIdResponse {
    fn status(&self) -> u16 {
        match self {
            Self::Ok(_) => 200,
            Self::NotFound(_) => 404,
        }
    }
}

impl ResponseObject for UpdateAppResponse {
    fn status(&self) -> u16 {
        match self {
            Self::Ok(_) => 200,
            Self::NotFound(_) => 404,
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Business logic behind the apps HTTP surface.
///
/// Implementations receive already-decoded request objects and the
/// request-scoped [`Context`], and must pass that context to every storage
/// call they make.
pub trait StrictServer {
    fn get_apps(&self, ctx: &Context, request: GetAppsRequest) -> ServiceResult<GetAppsResponse>;

    fn create_app(
        &self,
        ctx: &Context,
        request: CreateAppRequest,
    ) -> ServiceResult<CreateAppResponse>;

    fn get_app_by_id(
        &self,
        ctx: &Context,
        request: GetAppByIdRequest,
    ) -> ServiceResult<GetAppByIdResponse>;

    fn update_app(
        &self,
        ctx: &Context,
        request: UpdateAppRequest,
    ) -> ServiceResult<UpdateAppResponse>;
}
