use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Usuarios API",
        version = "1.0.0",
        description = "CRUD de usuarios con direcciones embebidas, sobre MongoDB.\n\n**Errores:** 400 validación o email duplicado, 404 usuario no encontrado, 500 error de base de datos."
    ),
    paths(
        // Usuarios
        crate::api::usuarios::create_user,
        crate::api::usuarios::list_users,
        crate::api::usuarios::search_users,
        crate::api::usuarios::get_user,
        crate::api::usuarios::update_user,
        crate::api::usuarios::delete_user,

        // Health
        crate::api::health::health_check,
    ),
    components(
        schemas(
            crate::models::User,
            crate::models::Address,
            crate::models::CreateUserRequest,
            crate::models::UpdateUserRequest,
            crate::models::UpdatedUserResponse,
            crate::models::DeletedUserResponse,
            crate::models::ErrorResponse,
            crate::api::health::HealthResponse,
        )
    ),
    tags(
        (name = "Usuarios", description = "Alta, listado paginado, búsqueda por ciudad, consulta, modificación y baja de usuarios."),
        (name = "Health", description = "Health check of the service and its database."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths = &doc.paths.paths;

        for path in ["/usuarios", "/usuarios/buscar", "/usuarios/{id}", "/health"] {
            assert!(paths.contains_key(path), "missing {}", path);
        }
        assert!(doc.components.unwrap().schemas.contains_key("User"));
    }
}
