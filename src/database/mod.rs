pub mod user_store;

#[cfg(test)]
pub mod memory;

pub use user_store::{MongoUserStore, UserStore};

use mongodb::bson::{doc, Document};
use mongodb::error::Result;
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use std::time::Duration;

/// Database used when neither MONGO_DATABASE nor the URI name one.
pub const DEFAULT_DATABASE: &str = "crud_usuarios";

#[derive(Clone)]
pub struct MongoDB {
    client: Client,
    db: Database,
}

impl MongoDB {
    pub async fn new(uri: &str, database_name: Option<&str>) -> Result<Self> {
        let mut client_options = ClientOptions::parse(uri).await?;

        // Connection pool
        client_options.max_pool_size = Some(20);
        client_options.min_pool_size = Some(2);
        client_options.max_idle_time = Some(Duration::from_secs(300));

        client_options.connect_timeout = Some(Duration::from_secs(5));
        client_options.server_selection_timeout = Some(Duration::from_secs(5));

        let db_name = database_name
            .map(str::to_string)
            .or_else(|| client_options.default_database.clone())
            .unwrap_or_else(|| DEFAULT_DATABASE.to_string());

        let client = Client::with_options(client_options)?;
        let db = client.database(&db_name);

        // Test connection
        db.list_collection_names().await?;
        log::info!("📊 Using database: {}", db_name);

        let mongodb = Self { client, db };
        mongodb.ensure_indexes().await?;

        Ok(mongodb)
    }

    /// Creates the indexes the user collection relies on. The unique email
    /// index is what enforces email uniqueness, so failing to build it aborts
    /// startup.
    async fn ensure_indexes(&self) -> Result<()> {
        log::info!("🔧 Creating database indexes...");

        let usuarios = self.collection::<Document>(user_store::COLLECTION);

        let email_index = IndexModel::builder()
            .keys(doc! { "email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        usuarios.create_index(email_index).await?;
        log::info!("   ✅ Index ready: usuarios(email) unique");

        let city_index = IndexModel::builder()
            .keys(doc! { "direcciones.ciudad": 1 })
            .build();
        match usuarios.create_index(city_index).await {
            Ok(_) => log::info!("   ✅ Index ready: usuarios(direcciones.ciudad)"),
            Err(e) => log::warn!("   ⚠️  Could not create city index: {}", e),
        }

        log::info!("✅ Database indexes ready");

        Ok(())
    }

    pub fn collection<T: Send + Sync>(&self, name: &str) -> Collection<T> {
        self.db.collection(name)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Closes the connection pool, waiting for in-flight operations.
    pub async fn shutdown(self) {
        self.client.shutdown().await;
    }
}
