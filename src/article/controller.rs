use crate::article::feed::{ALL_TAG, featured_article, filter_by_tag};
use crate::article::model::ArticleListQuery;
use crate::article::service::ArticleService;
use crate::utils::error::{CustomError, tolerate_store_failure};
use actix_web::{HttpResponse, web};
use serde_json::json;

/// Article feed, optionally narrowed to one tag
/// GET /articles?tag=MUSIC
pub async fn list_articles(
    article_service: web::Data<ArticleService>,
    query: web::Query<ArticleListQuery>,
) -> Result<HttpResponse, CustomError> {
    let tag = query
        .tag
        .as_deref()
        .map(str::to_uppercase)
        .unwrap_or_else(|| ALL_TAG.to_string());

    let articles = tolerate_store_failure("article listing", article_service.list_articles().await)?
        .unwrap_or_default();
    let featured = featured_article(&articles);
    let filtered = filter_by_tag(&articles, &tag);

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Articles retrieved successfully",
        "httpStatusCode": 200,
        "tag": tag,
        "featured": featured,
        "count": filtered.len(),
        "data": filtered
    })))
}

/// Single article by slug
/// GET /articles/{slug}
pub async fn get_article(
    article_service: web::Data<ArticleService>,
    path: web::Path<String>,
) -> Result<HttpResponse, CustomError> {
    let article = article_service.get_article_by_slug(&path.into_inner()).await?;
    tolerate_store_failure("article view", article_service.record_view(&article.id).await)?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Article fetched successfully",
        "httpStatusCode": 200,
        "service": std::env::var("SERVICE_NAME").unwrap_or_else(|_| "Unknown".to_string()),
        "article": article
    })))
}
