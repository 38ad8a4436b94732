use super::controller::{get_poll, vote};
use actix_web::web;

pub fn poll_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/polls")
            .route("/{article_id}", web::get().to(get_poll))
            .route("/{article_id}/vote", web::post().to(vote)),
    );
}
