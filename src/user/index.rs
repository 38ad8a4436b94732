use super::controller::{
    change_username, check_username, follow_user, get_user_profile, set_admin,
    set_follower_count, set_verified, unfollow_user,
};
use actix_web::web;

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("/username-available/{username}", web::get().to(check_username))
            .route("/me/username", web::put().to(change_username))
            .route("/{username}", web::get().to(get_user_profile))
            .route("/{uid}/follow", web::post().to(follow_user))
            .route("/{uid}/follow", web::delete().to(unfollow_user))
            .route("/{uid}/verified", web::patch().to(set_verified))
            .route("/{uid}/admin", web::patch().to(set_admin))
            .route("/{uid}/followers", web::patch().to(set_follower_count)),
    );
}
