use actix_web::error::JsonPayloadError;
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::database::UserStore;
use crate::models::{
    CreateUserRequest, DeletedUserResponse, ErrorResponse, UpdateUserRequest, UpdatedUserResponse, User,
};
use crate::services::user_service::{self, PageRequest, DELETED_MESSAGE, UPDATED_MESSAGE};
use crate::utils::ApiError;

/// Paging is read as raw text so bad values fall back instead of failing.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// Número de página (por defecto 1)
    #[param(value_type = Option<u64>)]
    pub page: Option<String>,
    /// Usuarios por página (por defecto 10)
    #[param(value_type = Option<u64>)]
    pub limit: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQuery {
    /// Ciudad de alguna dirección del usuario
    pub ciudad: Option<String>,
}

/// Registers the `/usuarios` routes. `/buscar` must stay ahead of `/{id}`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/usuarios")
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .route("", web::post().to(create_user))
            .route("", web::get().to(list_users))
            .route("/buscar", web::get().to(search_users))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::put().to(update_user))
            .route("/{id}", web::delete().to(delete_user)),
    );
}

fn json_error_handler(err: JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    log::warn!("⚠️  Invalid JSON body on {} {}: {}", req.method(), req.path(), err);
    ApiError::MalformedBody(err.to_string()).into()
}

fn log_failure(action: &str, error: &ApiError) {
    if error.status_code().is_server_error() {
        log::error!("❌ {} failed: {}", action, error);
    } else {
        log::warn!("❌ {} failed: {}", action, error);
    }
}

#[utoipa::path(
    post,
    path = "/usuarios",
    tag = "Usuarios",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Usuario creado correctamente", body = User),
        (status = 400, description = "Error en la solicitud (validación o email duplicado)")
    )
)]
pub async fn create_user(
    store: web::Data<dyn UserStore>,
    body: web::Json<CreateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    log::info!("👤 POST /usuarios - email: {}", request.email.as_deref().unwrap_or("N/A"));

    let user = user_service::create_user(store.get_ref(), request)
        .await
        .inspect_err(|e| log_failure("Create", e))?;

    log::info!("✅ Usuario created: {}", user.id);
    Ok(HttpResponse::Created().json(user))
}

#[utoipa::path(
    get,
    path = "/usuarios",
    tag = "Usuarios",
    params(ListQuery),
    responses(
        (status = 200, description = "Lista de usuarios", body = [User]),
        (status = 500, description = "Error al obtener los usuarios")
    )
)]
pub async fn list_users(
    store: web::Data<dyn UserStore>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let page = PageRequest::from_query(query.page.as_deref(), query.limit.as_deref());
    log::info!("📋 GET /usuarios - page: {}, limit: {}", page.page, page.limit);

    let users = user_service::list_users(store.get_ref(), page)
        .await
        .inspect_err(|e| log_failure("List", e))?;

    log::info!("✅ Usuarios listed: {}", users.len());
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/usuarios/buscar",
    tag = "Usuarios",
    params(SearchQuery),
    responses(
        (status = 200, description = "Usuarios con una dirección en la ciudad", body = [User]),
        (status = 500, description = "Error al buscar usuarios")
    )
)]
pub async fn search_users(
    store: web::Data<dyn UserStore>,
    query: web::Query<SearchQuery>,
) -> Result<HttpResponse, ApiError> {
    let ciudad = query.ciudad.as_deref();
    log::info!("🔍 GET /usuarios/buscar?ciudad={}", ciudad.unwrap_or(""));

    if ciudad.is_none() {
        log::warn!("⚠️  Search without ciudad, returning no users");
    }

    let users = user_service::search_by_city(store.get_ref(), ciudad)
        .await
        .inspect_err(|e| log_failure("Search", e))?;

    log::info!("✅ Found {} usuarios", users.len());
    Ok(HttpResponse::Ok().json(users))
}

#[utoipa::path(
    get,
    path = "/usuarios/{id}",
    tag = "Usuarios",
    params(
        ("id" = String, Path, description = "ID del usuario")
    ),
    responses(
        (status = 200, description = "Usuario encontrado", body = User),
        (status = 404, description = "Usuario no encontrado", body = ErrorResponse),
        (status = 500, description = "Error al buscar el usuario", body = ErrorResponse)
    )
)]
pub async fn get_user(
    store: web::Data<dyn UserStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    log::info!("👤 GET /usuarios/{}", id);

    let user = user_service::get_user(store.get_ref(), &id)
        .await
        .inspect_err(|e| log_failure("Lookup", e))?;

    Ok(HttpResponse::Ok().json(user))
}

#[utoipa::path(
    put,
    path = "/usuarios/{id}",
    tag = "Usuarios",
    params(
        ("id" = String, Path, description = "ID del usuario")
    ),
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Usuario modificado correctamente", body = UpdatedUserResponse),
        (status = 404, description = "Usuario no encontrado", body = ErrorResponse),
        (status = 400, description = "Error al actualizar el usuario", body = ErrorResponse)
    )
)]
pub async fn update_user(
    store: web::Data<dyn UserStore>,
    path: web::Path<String>,
    body: web::Json<UpdateUserRequest>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    log::info!("✏️  PUT /usuarios/{}", id);

    let usuario = user_service::update_user(store.get_ref(), &id, body.into_inner())
        .await
        .inspect_err(|e| log_failure("Update", e))?;

    log::info!("✅ Usuario updated: {}", id);
    Ok(HttpResponse::Ok().json(UpdatedUserResponse {
        usuario,
        mensaje: UPDATED_MESSAGE.to_string(),
    }))
}

#[utoipa::path(
    delete,
    path = "/usuarios/{id}",
    tag = "Usuarios",
    params(
        ("id" = String, Path, description = "ID del usuario")
    ),
    responses(
        (status = 200, description = "Usuario eliminado correctamente", body = DeletedUserResponse),
        (status = 404, description = "Usuario no encontrado", body = ErrorResponse),
        (status = 500, description = "Error al eliminar el usuario", body = ErrorResponse)
    )
)]
pub async fn delete_user(
    store: web::Data<dyn UserStore>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    log::info!("🗑️  DELETE /usuarios/{}", id);

    let usuario = user_service::delete_user(store.get_ref(), &id)
        .await
        .inspect_err(|e| log_failure("Delete", e))?;

    log::info!("✅ Usuario deleted: {}", id);
    Ok(HttpResponse::Ok().json(DeletedUserResponse {
        message: DELETED_MESSAGE.to_string(),
        usuario,
    }))
}
