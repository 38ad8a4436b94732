use crate::identity::Identity;
use crate::middleware::auth::{AuthSettings, Viewer, resolve_viewer};
use crate::poll::model::VoteRequest;
use crate::poll::service::PollService;
use crate::poll::session::PollSession;
use crate::user::service::UserService;
use crate::utils::error::{CustomError, tolerate_store_failure};
use actix_web::{HttpResponse, web};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::Utc;
use serde_json::json;

/// Bring the session in line with the stored votes. Leaves it untouched if
/// either read fails.
async fn refresh(
    session: &mut PollSession,
    poll_service: &PollService,
    article_id: &str,
    viewer: &Viewer,
) -> Result<(), CustomError> {
    let Some(votes) =
        tolerate_store_failure("poll recount", poll_service.list_votes(article_id).await)?
    else {
        return Ok(());
    };

    let own_vote = match viewer.identity.current_user() {
        Some(user_id) => {
            match tolerate_store_failure(
                "poll vote lookup",
                poll_service.get_user_vote(article_id, user_id).await,
            )? {
                Some(vote) => vote,
                None => return Ok(()),
            }
        }
        None => None,
    };

    session.reload(&votes, own_vote.as_ref());
    Ok(())
}

async fn open_session(
    poll_service: &PollService,
    article_id: &str,
    viewer: &Viewer,
) -> Result<Option<PollSession>, CustomError> {
    let Some(poll) = tolerate_store_failure("poll lookup", poll_service.get_poll(article_id).await)?
    else {
        return Ok(None);
    };

    let mut session = PollSession::new(poll, viewer.identity.current_user().is_some());
    refresh(&mut session, poll_service, article_id, viewer).await?;
    Ok(Some(session))
}

/// Poll as seen by the viewer
/// GET /polls/{article_id}
pub async fn get_poll(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    poll_service: web::Data<PollService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let article_id = path.into_inner();

    let session = open_session(&poll_service, &article_id, &viewer).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Poll retrieved successfully",
        "httpStatusCode": 200,
        "data": session.map(|s| s.view(Utc::now()))
    })))
}

/// Cast or change the viewer's vote
/// POST /polls/{article_id}/vote
pub async fn vote(
    auth: Option<BearerAuth>,
    settings: web::Data<AuthSettings>,
    user_service: web::Data<UserService>,
    poll_service: web::Data<PollService>,
    path: web::Path<String>,
    body: web::Json<VoteRequest>,
) -> Result<HttpResponse, CustomError> {
    let viewer = resolve_viewer(auth.as_ref().map(|a| a.token()), &settings, &user_service).await?;
    let article_id = path.into_inner();

    let applied = tolerate_store_failure(
        "poll vote",
        poll_service
            .cast_vote(&viewer.identity, &article_id, body.option_index)
            .await,
    )?
    .is_some();

    let mut session = open_session(&poll_service, &article_id, &viewer).await?;
    if applied
        && let Some(session) = session.as_mut()
        && session.voted() != Some(body.option_index)
    {
        // The recount could not be read back; show the vote locally.
        session.record_vote(body.option_index);
    }

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Vote recorded",
        "httpStatusCode": 200,
        "applied": applied,
        "data": session.map(|s| s.view(Utc::now()))
    })))
}
