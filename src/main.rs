mod api;
mod config;
mod database;
mod models;
mod services;
mod utils;

use actix_cors::Cors;
use actix_web::{http::header, middleware::Logger, web, App, HttpServer};
use dotenv::dotenv;
use std::io;
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{Config, ConfigError};
use crate::database::{MongoDB, MongoUserStore, UserStore};

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(|e| {
        log::error!("❌ Invalid configuration: {}", e);
        match e {
            ConfigError::MissingMongoUri => io::Error::new(io::ErrorKind::NotFound, e),
            ConfigError::InvalidPort(_) => io::Error::new(io::ErrorKind::InvalidInput, e),
        }
    })?;

    log::info!("🚀 Starting Usuarios Service...");

    let db = MongoDB::new(&config.mongo_uri, config.database_name.as_deref())
        .await
        .map_err(|e| {
            log::error!("❌ Failed to connect to MongoDB: {}", e);
            io::Error::other(e)
        })?;

    log::info!("✅ MongoDB connected successfully");

    let store: Arc<dyn UserStore> = Arc::new(MongoUserStore::new(&db));
    let result = serve(&config, web::Data::from(store)).await;

    log::info!("🛑 Server stopped, closing MongoDB connection...");
    db.shutdown().await;
    log::info!("👋 Bye");

    result
}

async fn serve(config: &Config, store: web::Data<dyn UserStore>) -> io::Result<()> {
    let (host, port) = config.bind_address();
    let allowed_origins = config.cors_allowed_origins.clone();

    log::info!("🌐 Server starting on {}:{}", host, port);
    log::info!("📚 Swagger UI available at: http://{}:{}/swagger-ui/", host, port);
    log::info!("📄 OpenAPI spec at: http://{}:{}/api-docs/openapi.json", host, port);

    let openapi = api::swagger::ApiDoc::openapi();

    HttpServer::new(move || {
        App::new()
            .app_data(store.clone())
            .wrap(cors(&allowed_origins))
            .wrap(Logger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
            .route("/health", web::get().to(api::health::health_check))
            .configure(api::usuarios::configure)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}

/// An empty origin list accepts any origin.
fn cors(allowed_origins: &[String]) -> Cors {
    let cors = if allowed_origins.is_empty() {
        Cors::default().allow_any_origin()
    } else {
        allowed_origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT])
        .max_age(3600)
}
