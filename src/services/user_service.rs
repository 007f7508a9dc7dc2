use actix_web::http::StatusCode;
use chrono::Utc;

use crate::database::UserStore;
use crate::models::{CreateUserRequest, UpdateUserRequest, User};
use crate::utils::{ApiError, StoreError};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;

pub const LOOKUP_FAILED: &str = "Error al buscar el usuario";
pub const UPDATE_FAILED: &str = "Error al actualizar el usuario";
pub const DELETE_FAILED: &str = "Error al eliminar el usuario";
pub const UPDATED_MESSAGE: &str = "Usuario modificado correctamente";
pub const DELETED_MESSAGE: &str = "Usuario eliminado correctamente";

/// Page of the user listing. Never rejects: anything that is not a
/// positive integer falls back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    pub fn from_query(page: Option<&str>, limit: Option<&str>) -> Self {
        Self {
            page: page.and_then(parse_positive).unwrap_or(DEFAULT_PAGE),
            limit: limit.and_then(parse_positive).unwrap_or(DEFAULT_LIMIT),
        }
    }

    pub fn offset(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

/// Leading-digits integer parse ("12abc" -> 12, " 3" -> 3). Zero, negative
/// or digit-less input yields `None`.
fn parse_positive(raw: &str) -> Option<u64> {
    let trimmed = raw.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let end = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(unsigned.len());

    unsigned[..end].parse::<u64>().ok().filter(|n| *n > 0)
}

pub async fn create_user(store: &dyn UserStore, request: CreateUserRequest) -> Result<User, ApiError> {
    let new_user = request
        .into_new_user(Utc::now())
        .map_err(|failure| ApiError::Rejected(failure.into()))?;

    store.insert(new_user).await.map_err(ApiError::Rejected)
}

pub async fn list_users(store: &dyn UserStore, page: PageRequest) -> Result<Vec<User>, ApiError> {
    store
        .find_page(page.offset(), page.limit)
        .await
        .map_err(ApiError::Failed)
}

/// A missing city matches no user.
pub async fn search_by_city(store: &dyn UserStore, city: Option<&str>) -> Result<Vec<User>, ApiError> {
    match city {
        Some(city) => store.find_by_city(city).await.map_err(ApiError::Failed),
        None => Ok(Vec::new()),
    }
}

pub async fn get_user(store: &dyn UserStore, id: &str) -> Result<User, ApiError> {
    match store.find_by_id(id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::described(StatusCode::INTERNAL_SERVER_ERROR, LOOKUP_FAILED, e)),
    }
}

pub async fn update_user(store: &dyn UserStore, id: &str, request: UpdateUserRequest) -> Result<User, ApiError> {
    let changes = request
        .into_changes()
        .map_err(|failure| ApiError::described(StatusCode::BAD_REQUEST, UPDATE_FAILED, StoreError::from(failure)))?;

    match store.update_by_id(id, changes).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::described(StatusCode::BAD_REQUEST, UPDATE_FAILED, e)),
    }
}

pub async fn delete_user(store: &dyn UserStore, id: &str) -> Result<User, ApiError> {
    match store.delete_by_id(id).await {
        Ok(Some(user)) => Ok(user),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => Err(ApiError::described(StatusCode::INTERNAL_SERVER_ERROR, DELETE_FAILED, e)),
    }
}
