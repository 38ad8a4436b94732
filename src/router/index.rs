use crate::article::index::article_routes;
use crate::comment::index::comment_routes;
use crate::poll::index::poll_routes;
use crate::user::index::user_routes;
use actix_web::web;

pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(article_routes);
    cfg.configure(comment_routes);
    cfg.configure(poll_routes);
    cfg.configure(user_routes);
}
