//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, LocalStorage, MemoryDatabase, SupabaseStorage},
    app::{AppSettings, RecordsApp},
    config::{Config, StorageConfig},
    credentials::Credentials,
    error::ApiError,
    web::{self, AppState},
};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use family_records_core::ports::{DatabaseService, StorageService};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    if config.registration_role.is_elevated() {
        warn!(
            role = %config.registration_role,
            "Self-registration grants write access to every new account"
        );
    }

    // --- 2. Connect to Database & Run Migrations ---
    let db: Arc<dyn DatabaseService> = if config.database_url == "memory" {
        warn!("Using the in-memory database; all data is lost on shutdown");
        Arc::new(MemoryDatabase::new())
    } else {
        info!("Connecting to database...");
        let db_pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&config.database_url)
            .await?;
        let db_adapter = DbAdapter::new(db_pool);
        info!("Running database migrations...");
        db_adapter.run_migrations().await?;
        info!("Database migrations complete.");
        Arc::new(db_adapter)
    };

    // --- 3. Initialize the Document Store ---
    let (storage, file_server): (Arc<dyn StorageService>, Option<Arc<LocalStorage>>) =
        match &config.storage {
            StorageConfig::Local {
                root,
                base_url,
                url_secret,
            } => {
                let secret = match url_secret {
                    Some(secret) => secret.as_bytes().to_vec(),
                    None => {
                        warn!("FILE_URL_SECRET is not set; download links will not survive a restart");
                        let mut secret = vec![0u8; 32];
                        OsRng.fill_bytes(&mut secret);
                        secret
                    }
                };
                let local = Arc::new(LocalStorage::new(root, base_url.as_str(), secret).await?);
                (local.clone(), Some(local))
            }
            StorageConfig::Supabase {
                url,
                api_key,
                bucket,
            } => {
                let supabase = SupabaseStorage::new(
                    reqwest::Client::new(),
                    url,
                    api_key.clone(),
                    bucket.clone(),
                )?;
                info!(bucket = %bucket, "Using Supabase document storage");
                (Arc::new(supabase), None)
            }
        };

    // --- 4. Build the Shared AppState ---
    let credentials = Credentials::new(config.password_hashing)?;
    let settings = AppSettings {
        registration_role: config.registration_role,
        signed_url_ttl: config.signed_url_ttl,
        session_ttl: config.session_ttl,
    };
    let app_state = Arc::new(AppState {
        app: Arc::new(RecordsApp::new(db, storage, credentials, settings)),
        config: config.clone(),
        file_server,
    });

    // --- 5. Create the Web Router ---
    let app = web::router(app_state).layer(web::cors_layer(&config.cors_origin)?);

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
