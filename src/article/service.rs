use crate::article::model::Article;
use crate::database::{DocumentStore, SortBy, decode, encode};
use crate::utils::error::CustomError;
use log::info;
use mongodb::bson::doc;
use std::sync::Arc;

pub const ARTICLES: &str = "articles";

#[derive(Clone)]
pub struct ArticleService {
    store: Arc<dyn DocumentStore>,
}

impl ArticleService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        ArticleService { store }
    }

    /// Get an article by ID
    pub async fn get_article(&self, article_id: &str) -> Result<Article, CustomError> {
        let record = self
            .store
            .get(ARTICLES, article_id)
            .await?
            .ok_or_else(|| CustomError::NotFoundError("Article not found".to_string()))?;
        Ok(decode(record)?)
    }

    /// Get an article by its slug
    pub async fn get_article_by_slug(&self, slug: &str) -> Result<Article, CustomError> {
        let record = self
            .store
            .query(ARTICLES, doc! { "slug": slug }, None)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| CustomError::NotFoundError("Article not found".to_string()))?;
        Ok(decode(record)?)
    }

    /// All articles, newest first
    ///
    /// Stored timestamps do not sort as text once sub-second digits differ,
    /// so the order is settled on the decoded dates.
    pub async fn list_articles(&self) -> Result<Vec<Article>, CustomError> {
        let records = self
            .store
            .query(ARTICLES, doc! {}, Some(SortBy::descending("publish_date")))
            .await?;

        let mut articles = records
            .into_iter()
            .map(|record| decode(record).map_err(CustomError::from))
            .collect::<Result<Vec<Article>, CustomError>>()?;
        articles.sort_by(|a, b| b.publish_date.cmp(&a.publish_date));
        Ok(articles)
    }

    /// Count one read of the article page
    pub async fn record_view(&self, article_id: &str) -> Result<(), CustomError> {
        self.store
            .increment_field(ARTICLES, article_id, "views", 1)
            .await?;
        Ok(())
    }

    /// Store an article, validating its poll first
    pub async fn save_article(&self, article: &Article) -> Result<String, CustomError> {
        if let Some(poll) = &article.poll {
            poll.validate()?;
        }

        let record = encode(article)?;
        let article_id = if article.id.is_empty() {
            self.store.create(ARTICLES, record).await?
        } else {
            self.store.upsert(ARTICLES, &article.id, record).await?;
            article.id.clone()
        };

        info!("Article {} saved as {}", article.slug, article_id);
        Ok(article_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::poll::model::Poll;
    use chrono::{Duration, TimeZone, Utc};

    fn article(slug: &str, days_ago: i64) -> Article {
        Article {
            slug: slug.to_string(),
            title: slug.to_string(),
            tags: vec!["OPINION".to_string()],
            publish_date: Utc::now() - Duration::days(days_ago),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn articles_are_found_by_id_and_slug() {
        let service = ArticleService::new(Arc::new(MemoryStore::new()));
        let id = service.save_article(&article("hot-take", 0)).await.unwrap();

        assert_eq!(service.get_article(&id).await.unwrap().slug, "hot-take");
        assert_eq!(service.get_article_by_slug("hot-take").await.unwrap().id, id);
        assert!(matches!(
            service.get_article_by_slug("nope").await,
            Err(CustomError::NotFoundError(_))
        ));
    }

    #[tokio::test]
    async fn listing_is_newest_first() {
        let service = ArticleService::new(Arc::new(MemoryStore::new()));
        service.save_article(&article("older", 3)).await.unwrap();
        service.save_article(&article("newest", 0)).await.unwrap();
        service.save_article(&article("middle", 1)).await.unwrap();

        let slugs: Vec<String> = service
            .list_articles()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(slugs, vec!["newest", "middle", "older"]);
    }

    #[tokio::test]
    async fn listing_orders_by_date_within_the_same_second() {
        let service = ArticleService::new(Arc::new(MemoryStore::new()));
        let on_the_second = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();

        let mut older = article("older", 0);
        older.publish_date = on_the_second;
        let mut newer = article("newer", 0);
        newer.publish_date = on_the_second + Duration::milliseconds(500);

        service.save_article(&older).await.unwrap();
        service.save_article(&newer).await.unwrap();

        let slugs: Vec<String> = service
            .list_articles()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.slug)
            .collect();
        assert_eq!(slugs, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn page_views_are_counted() {
        let service = ArticleService::new(Arc::new(MemoryStore::new()));
        let id = service.save_article(&article("viewed", 0)).await.unwrap();

        service.record_view(&id).await.unwrap();
        service.record_view(&id).await.unwrap();

        assert_eq!(service.get_article(&id).await.unwrap().views, 2);
        assert!(matches!(
            service.record_view("missing").await,
            Err(CustomError::NotFoundError(_))
        ));
    }

    #[tokio::test]
    async fn invalid_polls_are_refused() {
        let service = ArticleService::new(Arc::new(MemoryStore::new()));
        let mut bad = article("bad-poll", 0);
        bad.poll = Some(Poll {
            enabled: true,
            question: "Pick one".to_string(),
            options: vec!["lonely".to_string()],
            expiration: None,
            locked: false,
            votes: Default::default(),
            total_votes: 0,
        });

        assert!(matches!(
            service.save_article(&bad).await,
            Err(CustomError::InvalidInputError(_))
        ));
    }
}
