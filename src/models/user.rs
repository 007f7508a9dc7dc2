use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::utils::ValidationFailure;

/// Postal address embedded in a user. Has no identity of its own.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciudad: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pais: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codigo_postal: Option<String>,
}

/// Stored user as returned by every endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct User {
    /// Store-generated ObjectId (hex)
    #[serde(rename = "_id")]
    pub id: String,
    pub nombre: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edad: Option<i64>,
    pub fecha_creacion: DateTime<Utc>,
    #[serde(default)]
    pub direcciones: Vec<Address>,
}

/// Validated insert, ready for the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    pub nombre: String,
    pub email: String,
    pub edad: Option<i64>,
    pub fecha_creacion: DateTime<Utc>,
    pub direcciones: Vec<Address>,
}

/// Validated set of fields to overwrite on an existing user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub nombre: Option<String>,
    pub email: Option<String>,
    /// `Some(None)` clears the stored age
    pub edad: Option<Option<i64>>,
    pub fecha_creacion: Option<DateTime<Utc>>,
    pub direcciones: Option<Vec<Address>>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.nombre.is_none()
            && self.email.is_none()
            && self.edad.is_none()
            && self.fecha_creacion.is_none()
            && self.direcciones.is_none()
    }

    /// Overwrite the provided fields, keeping `id`.
    pub fn apply_to(self, user: &mut User) {
        if let Some(nombre) = self.nombre { user.nombre = nombre; }
        if let Some(email) = self.email { user.email = email; }
        if let Some(edad) = self.edad { user.edad = edad; }
        if let Some(fecha_creacion) = self.fecha_creacion { user.fecha_creacion = fecha_creacion; }
        if let Some(direcciones) = self.direcciones { user.direcciones = direcciones; }
    }
}

/// Create payload. A client-sent `_id` is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[serde(default)]
    #[validate(
        required(code = "required", message = "Path `nombre` is required."),
        length(min = 1, code = "required", message = "Path `nombre` is required.")
    )]
    pub nombre: Option<String>,

    #[serde(default)]
    #[validate(
        required(code = "required", message = "Path `email` is required."),
        length(min = 1, code = "required", message = "Path `email` is required.")
    )]
    pub email: Option<String>,

    #[serde(default)]
    pub edad: Option<i64>,

    /// Defaults to the insert time
    #[serde(default)]
    pub fecha_creacion: Option<DateTime<Utc>>,

    #[serde(default)]
    pub direcciones: Option<Vec<Address>>,
}

impl CreateUserRequest {
    /// Applies the schema rules and defaults.
    pub fn into_new_user(self, now: DateTime<Utc>) -> Result<NewUser, ValidationFailure> {
        self.validate()?;

        Ok(NewUser {
            nombre: self.nombre.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            edad: self.edad,
            fecha_creacion: self.fecha_creacion.unwrap_or(now),
            direcciones: self.direcciones.unwrap_or_default(),
        })
    }
}

/// Update payload. Only the fields present in the body are written; an
/// explicit `null` is kept apart from an absent field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateUserRequest {
    /// `null` is validated like an empty name
    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1, code = "required", message = "Path `nombre` is required."))]
    pub nombre: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    #[validate(length(min = 1, code = "required", message = "Path `email` is required."))]
    pub email: Option<String>,

    /// `null` clears the age
    #[serde(default, deserialize_with = "nullable")]
    #[schema(value_type = Option<i64>)]
    pub edad: Option<Option<i64>>,

    /// `null` keeps the stored creation date
    #[serde(default)]
    pub fecha_creacion: Option<DateTime<Utc>>,

    /// `null` clears the address list
    #[serde(default, deserialize_with = "null_as_default")]
    pub direcciones: Option<Vec<Address>>,
}

/// Present field, possibly `null`. Absence is left to `#[serde(default)]`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(|value| Some(value.unwrap_or_default()))
}

impl UpdateUserRequest {
    pub fn into_changes(self) -> Result<UserChanges, ValidationFailure> {
        self.validate()?;

        Ok(UserChanges {
            nombre: self.nombre,
            email: self.email,
            edad: self.edad,
            fecha_creacion: self.fecha_creacion,
            direcciones: self.direcciones,
        })
    }
}

/// Updated user plus the confirmation message, in one flat object
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdatedUserResponse {
    #[serde(flatten)]
    pub usuario: User,
    pub mensaje: String,
}

/// Confirmation message and the removed user
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletedUserResponse {
    pub message: String,
    pub usuario: User,
}

/// `{message, error}` body of lookup/update/delete failures
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
