use crate::comment::model::{Comment, CreateCommentRequest};
use crate::comment::service::CommentService;
use crate::comment::thread::build_threads;
use crate::identity::Identity;
use crate::middleware::auth::{AuthSettings, resolve_viewer};
use crate::user::service::UserService;
use crate::utils::error::{CustomError, tolerate_store_failure};
use actix_web::{HttpResponse, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde_json::json;

async fn load_comment(
    comment_service: &CommentService,
    comment_id: &str,
) -> Result<Option<Comment>, CustomError> {
    let comment = tolerate_store_failure(
        "comment lookup",
        comment_service.get_comment(comment_id).await,
    )?;
    match comment {
        Some(Some(comment)) => Ok(Some(comment)),
        Some(None) => Err(CustomError::NotFoundError("Comment not found".to_string())),
        None => Ok(None),
    }
}

/// Threaded comments for an article
/// GET /comments/article/{article_id}
pub async fn get_article_comments(
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let article_id = path.into_inner();

    let comments = tolerate_store_failure(
        "comment listing",
        comment_service.list_comments(&article_id).await,
    )?
    .unwrap_or_default();
    let count = comments.len();
    let threads = build_threads(&comments);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comments retrieved successfully",
        "httpStatusCode": 200,
        "count": count,
        "data": threads
    })))
}

/// Create a comment or a reply
/// POST /comments
pub async fn create_comment(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    comment_service: web::Data<CommentService>,
    body: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    if viewer.identity.current_user().is_none() {
        return Err(CustomError::UnauthenticatedError(
            "Not authenticated".to_string(),
        ));
    }
    let author = viewer.author()?;

    let comment_id = tolerate_store_failure(
        "comment submission",
        comment_service
            .submit_comment(
                &viewer.identity,
                &body.article_id,
                author,
                &body.content,
                body.parent_id.as_deref(),
            )
            .await,
    )?;

    Ok(HttpResponse::Created().json(json!({
        "success": true,
        "message": "Comment created successfully",
        "httpStatusCode": 201,
        "applied": comment_id.is_some(),
        "comment_id": comment_id
    })))
}

/// Toggle the viewer's like on a comment
/// POST /comments/{comment_id}/like
pub async fn like_comment(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let comment_id = path.into_inner();

    let applied = match load_comment(&comment_service, &comment_id).await? {
        Some(comment) => tolerate_store_failure(
            "comment like",
            comment_service.toggle_like(&viewer.identity, &comment).await,
        )?
        .is_some(),
        None => false,
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment like toggled",
        "httpStatusCode": 200,
        "applied": applied
    })))
}

/// Toggle the pinned flag on a comment (admins only)
/// POST /comments/{comment_id}/pin
pub async fn pin_comment(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    comment_service: web::Data<CommentService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let comment_id = path.into_inner();

    let applied = match load_comment(&comment_service, &comment_id).await? {
        Some(comment) => tolerate_store_failure(
            "comment pin",
            comment_service.toggle_pin(&viewer.identity, &comment).await,
        )?
        .is_some(),
        None => false,
    };

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Comment pin toggled",
        "httpStatusCode": 200,
        "applied": applied
    })))
}
