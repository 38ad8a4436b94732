use super::controller::{get_article, list_articles};
use actix_web::web;

pub fn article_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/articles")
            .route("", web::get().to(list_articles))
            .route("/{slug}", web::get().to(get_article)),
    );
}
