use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger};
use anyhow::Result;

use overtime::config::StorageBackend;
use overtime::database::{
    InMemorySubmissionStore, OvertimeSubmissionRepository, SubmissionStore, init_database,
};
use overtime::middleware::RequestIdMiddleware;
use overtime::services::{LogMailer, NotificationDispatcher, Notifier};
use overtime::{AppState, Config, configure_app};

#[actix_web::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let config = Config::from_env()?;
    log::info!(
        "Starting overtime service (environment: {})",
        config.environment
    );

    let store: Arc<dyn SubmissionStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let pool = init_database(&config.database_url).await?;
            Arc::new(OvertimeSubmissionRepository::new(pool))
        }
        StorageBackend::Memory => {
            log::warn!("Using in-memory storage; submissions are lost on restart");
            Arc::new(InMemorySubmissionStore::new())
        }
    };

    let (notifier, receiver) = Notifier::channel();
    let mailer = Arc::new(LogMailer::new(config.mail_from.clone()));
    NotificationDispatcher::new(mailer, &config).spawn(receiver);

    let state = AppState::new(config.clone(), store, notifier);
    let server_address = config.server_address();
    log::info!("Server starting on http://{}", server_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allowed_origin(&state.config.client_base_url)
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        "Authorization",
                        "Content-Type",
                        "Accept",
                        "X-Requested-With",
                        "X-Correlation-ID",
                    ])
                    .max_age(3600),
            )
            .wrap(RequestIdMiddleware)
            .wrap(Logger::new(
                r#"%a "%r" %s %b %T correlation_id=%{x-correlation-id}o"#,
            ))
            .configure(|cfg| configure_app(cfg, &state))
    })
    .bind(&server_address)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e))
}
