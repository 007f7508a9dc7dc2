use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, oid::ObjectId, Bson, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::ReturnDocument;
use mongodb::{Collection, Database};
use serde::{Deserialize, Deserializer, Serialize};

use super::MongoDB;
use crate::models::{Address, NewUser, User, UserChanges};
use crate::utils::{StoreError, DUPLICATE_KEY_CODE};

pub const COLLECTION: &str = "usuarios";

/// Document store operations behind the user endpoints. Each method is one
/// store round-trip; ids are the hex form of an ObjectId.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError>;

    /// Natural order, `skip` then at most `limit` users.
    async fn find_page(&self, skip: u64, limit: u64) -> Result<Vec<User>, StoreError>;

    /// Users with at least one address in `city` (exact match).
    async fn find_by_city(&self, city: &str) -> Result<Vec<User>, StoreError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    /// Returns the user after the update, `None` when no user has that id.
    async fn update_by_id(&self, id: &str, changes: UserChanges) -> Result<Option<User>, StoreError>;

    /// Returns the removed user.
    async fn delete_by_id(&self, id: &str) -> Result<Option<User>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// BSON shape of a "usuarios" document
#[derive(Debug, Serialize, Deserialize)]
struct UserDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    nombre: String,
    email: String,
    #[serde(default, deserialize_with = "deserialize_edad", skip_serializing_if = "Option::is_none")]
    edad: Option<i64>,
    fecha_creacion: bson::DateTime,
    #[serde(default)]
    direcciones: Vec<Address>,
}

/// Documents written by other clients may carry `edad` as a double.
fn deserialize_edad<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Bson>::deserialize(deserializer)? {
        None | Some(Bson::Null) => Ok(None),
        Some(Bson::Int32(v)) => Ok(Some(i64::from(v))),
        Some(Bson::Int64(v)) => Ok(Some(v)),
        Some(Bson::Double(v)) if v.fract() == 0.0 => Ok(Some(v as i64)),
        Some(other) => Err(serde::de::Error::custom(format!(
            "Expected integer edad, got {}",
            other
        ))),
    }
}

fn to_bson_datetime(value: DateTime<Utc>) -> bson::DateTime {
    bson::DateTime::from_millis(value.timestamp_millis())
}

fn from_bson_datetime(value: bson::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(value.timestamp_millis()).unwrap_or_default()
}

impl From<NewUser> for UserDocument {
    fn from(user: NewUser) -> Self {
        UserDocument {
            id: None,
            nombre: user.nombre,
            email: user.email,
            edad: user.edad,
            fecha_creacion: to_bson_datetime(user.fecha_creacion),
            direcciones: user.direcciones,
        }
    }
}

impl From<UserDocument> for User {
    fn from(d: UserDocument) -> Self {
        User {
            id: d.id.map(|id| id.to_hex()).unwrap_or_default(),
            nombre: d.nombre,
            email: d.email,
            edad: d.edad,
            fecha_creacion: from_bson_datetime(d.fecha_creacion),
            direcciones: d.direcciones,
        }
    }
}

/// `UserStore` over the MongoDB "usuarios" collection.
#[derive(Clone)]
pub struct MongoUserStore {
    db: Database,
    collection: Collection<UserDocument>,
}

impl MongoUserStore {
    pub fn new(mongodb: &MongoDB) -> Self {
        Self {
            db: mongodb.database().clone(),
            collection: mongodb.collection(COLLECTION),
        }
    }

    fn namespace(&self) -> String {
        format!("{}.{}", self.db.name(), COLLECTION)
    }

    /// Maps a driver error, turning unique index violations on `email` into
    /// `StoreError::DuplicateKey`.
    fn map_error(&self, error: mongodb::error::Error, email: Option<&str>) -> StoreError {
        let duplicate = match error.kind.as_ref() {
            ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY_CODE,
            ErrorKind::Command(e) => e.code == DUPLICATE_KEY_CODE,
            _ => false,
        };

        if duplicate {
            StoreError::DuplicateKey {
                collection: self.namespace(),
                field: "email".to_string(),
                value: email.unwrap_or_default().to_string(),
            }
        } else {
            StoreError::Database(error.to_string())
        }
    }

    async fn collect(&self, filter: Document, skip: Option<u64>, limit: Option<u64>) -> Result<Vec<User>, StoreError> {
        let mut find = self.collection.find(filter);
        if let Some(skip) = skip {
            find = find.skip(skip);
        }
        if let Some(limit) = limit {
            find = find.limit(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = find.await.map_err(|e| self.map_error(e, None))?;
        let documents: Vec<UserDocument> = cursor
            .try_collect()
            .await
            .map_err(|e| self.map_error(e, None))?;

        Ok(documents.into_iter().map(User::from).collect())
    }
}

fn parse_object_id(id: &str) -> Result<ObjectId, StoreError> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn set_document(changes: &UserChanges) -> Result<Document, StoreError> {
    let mut set = Document::new();

    if let Some(nombre) = &changes.nombre { set.insert("nombre", nombre); }
    if let Some(email) = &changes.email { set.insert("email", email); }
    match changes.edad {
        Some(Some(edad)) => { set.insert("edad", edad); }
        Some(None) => { set.insert("edad", Bson::Null); }
        None => {}
    }
    if let Some(fecha) = changes.fecha_creacion { set.insert("fecha_creacion", to_bson_datetime(fecha)); }
    if let Some(direcciones) = &changes.direcciones {
        let value = bson::to_bson(direcciones).map_err(|e| StoreError::Database(e.to_string()))?;
        set.insert("direcciones", value);
    }

    Ok(set)
}

#[async_trait]
impl UserStore for MongoUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut document = UserDocument::from(user);

        let result = self
            .collection
            .insert_one(&document)
            .await
            .map_err(|e| self.map_error(e, Some(&document.email)))?;

        document.id = result.inserted_id.as_object_id();
        Ok(document.into())
    }

    async fn find_page(&self, skip: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        self.collect(doc! {}, Some(skip), Some(limit)).await
    }

    async fn find_by_city(&self, city: &str) -> Result<Vec<User>, StoreError> {
        self.collect(doc! { "direcciones.ciudad": city }, None, None).await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let object_id = parse_object_id(id)?;

        self.collection
            .find_one(doc! { "_id": object_id })
            .await
            .map(|found| found.map(User::from))
            .map_err(|e| self.map_error(e, None))
    }

    async fn update_by_id(&self, id: &str, changes: UserChanges) -> Result<Option<User>, StoreError> {
        let object_id = parse_object_id(id)?;

        // $set with no fields is rejected by the server
        if changes.is_empty() {
            return self.find_by_id(id).await;
        }

        let set = set_document(&changes)?;

        self.collection
            .find_one_and_update(doc! { "_id": object_id }, doc! { "$set": set })
            .return_document(ReturnDocument::After)
            .await
            .map(|found| found.map(User::from))
            .map_err(|e| self.map_error(e, changes.email.as_deref()))
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        let object_id = parse_object_id(id)?;

        self.collection
            .find_one_and_delete(doc! { "_id": object_id })
            .await
            .map(|found| found.map(User::from))
            .map_err(|e| self.map_error(e, None))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_round_trips_through_bson() {
        let fecha = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let mut document = UserDocument::from(NewUser {
            nombre: "Juan Blanco".to_string(),
            email: "juan.blanco@example.com".to_string(),
            edad: Some(30),
            fecha_creacion: fecha,
            direcciones: vec![Address {
                ciudad: Some("Lima".to_string()),
                ..Default::default()
            }],
        });
        document.id = Some(ObjectId::new());

        let raw = bson::to_document(&document).unwrap();
        assert!(raw.get_datetime("fecha_creacion").is_ok());
        assert_eq!(raw.get_array("direcciones").unwrap().len(), 1);

        let user = User::from(bson::from_document::<UserDocument>(raw).unwrap());
        assert_eq!(user.id.len(), 24);
        assert_eq!(user.fecha_creacion, fecha);
        assert_eq!(user.direcciones[0].ciudad.as_deref(), Some("Lima"));
    }

    #[test]
    fn test_edad_accepts_whole_doubles() {
        let raw = doc! {
            "_id": ObjectId::new(),
            "nombre": "Ana",
            "email": "ana@example.com",
            "edad": 30.0,
            "fecha_creacion": bson::DateTime::now(),
        };

        let document: UserDocument = bson::from_document(raw).unwrap();

        assert_eq!(document.edad, Some(30));
        assert!(document.direcciones.is_empty());
    }

    #[test]
    fn test_set_document_only_has_changed_fields() {
        let set = set_document(&UserChanges {
            edad: Some(Some(41)),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(set.len(), 1);
        assert_eq!(set.get_i64("edad").unwrap(), 41);
    }

    #[test]
    fn test_set_document_writes_null_edad() {
        let set = set_document(&UserChanges {
            edad: Some(None),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(set.get("edad"), Some(&Bson::Null));
    }

    #[test]
    fn test_malformed_id_is_rejected() {
        assert!(matches!(parse_object_id("not-an-id"), Err(StoreError::InvalidId(_))));
    }

    async fn live_store() -> MongoUserStore {
        dotenv::dotenv().ok();
        let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let mongodb = MongoDB::new(&uri, Some("crud_usuarios_test")).await.unwrap();
        let store = MongoUserStore::new(&mongodb);
        store.collection.delete_many(doc! {}).await.unwrap();
        store
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_duplicate_email_is_rejected_by_index() {
        let store = live_store().await;
        let user = NewUser {
            nombre: "Juan Perez".to_string(),
            email: "juan.perez@example.com".to_string(),
            edad: Some(30),
            fecha_creacion: Utc::now(),
            direcciones: vec![],
        };

        store.insert(user.clone()).await.unwrap();
        let error = store.insert(user).await.unwrap_err();

        assert!(matches!(error, StoreError::DuplicateKey { .. }));
        assert_eq!(error.detail()["code"], 11000);
    }

    #[tokio::test]
    #[ignore] // Requires MongoDB to be running
    async fn test_update_and_delete_by_id() {
        let store = live_store().await;
        let created = store
            .insert(NewUser {
                nombre: "Ana".to_string(),
                email: "ana@example.com".to_string(),
                edad: None,
                fecha_creacion: Utc::now(),
                direcciones: vec![],
            })
            .await
            .unwrap();

        let updated = store
            .update_by_id(&created.id, UserChanges { edad: Some(Some(22)), ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.edad, Some(22));

        assert!(store.delete_by_id(&created.id).await.unwrap().is_some());
        assert!(store.delete_by_id(&created.id).await.unwrap().is_none());
    }
}
