use super::controller::{create_comment, get_article_comments, like_comment, pin_comment};
use actix_web::web;

pub fn comment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/comments")
            .route("", web::post().to(create_comment))
            .route("/article/{article_id}", web::get().to(get_article_comments))
            .route("/{comment_id}/like", web::post().to(like_comment))
            .route("/{comment_id}/pin", web::post().to(pin_comment)),
    );
}
