use crate::identity::Identity;
use crate::middleware::auth::{AuthSettings, resolve_viewer};
use crate::user::model::{FlagRequest, FollowerCountRequest, UsernameRequest};
use crate::user::service::UserService;
use crate::utils::error::{CustomError, tolerate_store_failure};
use actix_web::{HttpResponse, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde_json::json;

/// Whether a username can still be claimed
/// GET /users/username-available/{username}
pub async fn check_username(
    user_service: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let available = tolerate_store_failure(
        "username check",
        user_service.is_username_available(&path.into_inner()).await,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Username checked",
        "httpStatusCode": 200,
        "available": available
    })))
}

/// Public profile by username
/// GET /users/{username}
pub async fn get_user_profile(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let profile = user_service
        .get_profile_by_username(&path.into_inner())
        .await?
        .ok_or_else(|| CustomError::NotFoundError("User not found".to_string()))?;

    let is_following = match viewer.identity.current_user() {
        Some(user_id) => tolerate_store_failure(
            "follow lookup",
            user_service.is_following(user_id, &profile.uid).await,
        )?
        .unwrap_or(false),
        None => false,
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Profile fetched successfully",
        "httpStatusCode": 200,
        "is_following": is_following,
        "data": profile
    })))
}

/// POST /users/{uid}/follow
pub async fn follow_user(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let changed = tolerate_store_failure(
        "follow",
        user_service
            .follow_user(&viewer.identity, &path.into_inner())
            .await,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Follow updated",
        "httpStatusCode": 200,
        "applied": changed.is_some(),
        "changed": changed.unwrap_or(false)
    })))
}

/// DELETE /users/{uid}/follow
pub async fn unfollow_user(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let changed = tolerate_store_failure(
        "unfollow",
        user_service
            .unfollow_user(&viewer.identity, &path.into_inner())
            .await,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Follow updated",
        "httpStatusCode": 200,
        "applied": changed.is_some(),
        "changed": changed.unwrap_or(false)
    })))
}

/// PUT /users/me/username
pub async fn change_username(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    body: web::Json<UsernameRequest>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let username = tolerate_store_failure(
        "username change",
        user_service
            .change_username(&viewer.identity, &body.username)
            .await,
    )?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Username updated",
        "httpStatusCode": 200,
        "applied": username.is_some(),
        "username": username
    })))
}

fn admin_response(applied: bool) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "success": true,
        "message": "User updated",
        "httpStatusCode": 200,
        "applied": applied
    }))
}

/// PATCH /users/{uid}/verified (admins only)
pub async fn set_verified(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    path: web::Path<String>,
    body: web::Json<FlagRequest>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let applied = tolerate_store_failure(
        "verified flag",
        user_service
            .set_verified(&viewer.identity, &path.into_inner(), body.value)
            .await,
    )?;
    Ok(admin_response(applied.is_some()))
}

/// PATCH /users/{uid}/admin (admins only)
pub async fn set_admin(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    path: web::Path<String>,
    body: web::Json<FlagRequest>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let applied = tolerate_store_failure(
        "admin flag",
        user_service
            .set_admin(&viewer.identity, &path.into_inner(), body.value)
            .await,
    )?;
    Ok(admin_response(applied.is_some()))
}

/// PATCH /users/{uid}/followers (admins only)
pub async fn set_follower_count(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    path: web::Path<String>,
    body: web::Json<FollowerCountRequest>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let applied = tolerate_store_failure(
        "follower count",
        user_service
            .set_follower_count(&viewer.identity, &path.into_inner(), body.count)
            .await,
    )?;
    Ok(admin_response(applied.is_some()))
}
