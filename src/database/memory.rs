//! In-memory `UserStore` for handler tests. Mirrors the MongoDB store:
//! ObjectId ids, unique email, natural (insertion) order.

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use tokio::sync::RwLock;

use super::UserStore;
use crate::models::{NewUser, User, UserChanges};
use crate::utils::StoreError;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<Vec<User>>,
    unavailable: bool,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every operation fails like a lost connection.
    pub fn unavailable() -> Self {
        Self {
            users: RwLock::default(),
            unavailable: true,
        }
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Database("connection refused".to_string()));
        }
        Ok(())
    }

    fn duplicate(email: &str) -> StoreError {
        StoreError::DuplicateKey {
            collection: "memory.usuarios".to_string(),
            field: "email".to_string(),
            value: email.to_string(),
        }
    }
}

fn check_id(id: &str) -> Result<(), StoreError> {
    ObjectId::parse_str(id)
        .map(|_| ())
        .map_err(|_| StoreError::InvalidId(id.to_string()))
}

fn to_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        self.check_available()?;
        let mut users = self.users.write().await;

        if users.iter().any(|u| u.email == user.email) {
            return Err(Self::duplicate(&user.email));
        }

        let stored = User {
            id: ObjectId::new().to_hex(),
            nombre: user.nombre,
            email: user.email,
            edad: user.edad,
            fecha_creacion: user.fecha_creacion,
            direcciones: user.direcciones,
        };
        users.push(stored.clone());

        Ok(stored)
    }

    async fn find_page(&self, skip: u64, limit: u64) -> Result<Vec<User>, StoreError> {
        self.check_available()?;
        let users = self.users.read().await;

        Ok(users
            .iter()
            .skip(to_usize(skip))
            .take(to_usize(limit))
            .cloned()
            .collect())
    }

    async fn find_by_city(&self, city: &str) -> Result<Vec<User>, StoreError> {
        self.check_available()?;
        let users = self.users.read().await;

        Ok(users
            .iter()
            .filter(|u| u.direcciones.iter().any(|d| d.ciudad.as_deref() == Some(city)))
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        check_id(id)?;

        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn update_by_id(&self, id: &str, changes: UserChanges) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        check_id(id)?;
        let mut users = self.users.write().await;

        // an unmatched filter never reaches the unique index
        if !users.iter().any(|u| u.id == id) {
            return Ok(None);
        }

        if let Some(email) = &changes.email {
            if users.iter().any(|u| u.id != id && &u.email == email) {
                return Err(Self::duplicate(email));
            }
        }

        Ok(users.iter_mut().find(|u| u.id == id).map(|user| {
            changes.apply_to(user);
            user.clone()
        }))
    }

    async fn delete_by_id(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.check_available()?;
        check_id(id)?;
        let mut users = self.users.write().await;

        Ok(users
            .iter()
            .position(|u| u.id == id)
            .map(|index| users.remove(index)))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.check_available()
    }
}
