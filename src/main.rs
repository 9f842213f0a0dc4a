use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use std::time::Duration;

use edutrack::config::Config;
use edutrack::db::init_store;
use edutrack::docs::ApiDoc;
use edutrack::routes;
use edutrack::utils::student_directory::StudentDirectory;

use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "EduTrack API"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(|e| std::io::Error::other(format!("{e:#}")))?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(backend = ?config.storage_backend, "Server starting...");

    let store = init_store(&config).await.map_err(|e| {
        error!(error = %e, "Failed to initialise storage");
        std::io::Error::other(format!("{e:#}"))
    })?;

    let directory = StudentDirectory::new(
        store.clone(),
        config.student_cache_capacity,
        Duration::from_secs(config.student_cache_ttl_secs),
    );

    let directory_for_warmup = directory.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = directory_for_warmup.warmup(500).await {
            error!(error = %e, "Failed to warmup student cache");
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(store.clone()))
            .app_data(Data::new(directory.clone()))
            .app_data(Data::new(config.clone()))
            .service(index)
            // protected API with auth + rate limiting
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
