use actix_web::http::StatusCode;
use actix_web::middleware::Logger;
use actix_web::{App, HttpResponse, HttpServer, Responder, get, web};
use article_engagement::article::service::ArticleService;
use article_engagement::comment::service::CommentService;
use article_engagement::database::{DocumentStore, MemoryStore, MongoStore};
use article_engagement::identity::AdminRoster;
use article_engagement::middleware::auth::AuthSettings;
use article_engagement::middleware::not_found::not_found;
use article_engagement::poll::service::PollService;
use article_engagement::router::index::routes;
use article_engagement::user::service::UserService;
use article_engagement::utils::config::{Config, StoreKind};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info, warn};
use serde_json::json;
use std::sync::Arc;

#[get("/")]
async fn default() -> impl Responder {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Article engagement service",
        "httpStatusCode": StatusCode::OK.as_u16(),
        "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string()),
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = Config::load();
    config.check().map_err(|e| {
        error!("Refusing to start: {}", e);
        std::io::Error::other(e)
    })?;

    let store: Arc<dyn DocumentStore> = match config.store {
        StoreKind::Mongo => {
            let mongo = MongoStore::connect(&config.mongodb_uri, &config.database_name)
                .await
                .map_err(|e| {
                    error!("Failed to connect to MongoDB: {}", e);
                    std::io::Error::other(e.to_string())
                })?;
            Arc::new(mongo)
        }
        StoreKind::Memory => {
            warn!("Using the in-memory store, data is lost on shutdown");
            Arc::new(MemoryStore::new())
        }
    };

    if config.admin_user_ids.is_empty() {
        info!("No ADMIN_USER_IDS configured, admin role comes from user profiles only");
    }
    let roster = AdminRoster::new(config.admin_user_ids.clone());

    let auth_settings = web::Data::new(AuthSettings::new(config.jwt_secret.clone(), roster));
    let user_service = web::Data::new(UserService::new(store.clone()));
    let article_service = web::Data::new(ArticleService::new(store.clone()));
    let comment_service = web::Data::new(CommentService::new(store.clone()));
    let poll_service = web::Data::new(PollService::new(store.clone()));

    info!("Starting server on http://{}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(auth_settings.clone())
            .app_data(user_service.clone())
            .app_data(article_service.clone())
            .app_data(comment_service.clone())
            .app_data(poll_service.clone())
            .configure(routes)
            .service(default)
            .default_service(web::route().to(not_found))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    info!("Server has stopped");

    Ok(())
}
