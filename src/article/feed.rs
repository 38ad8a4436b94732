use crate::article::model::Article;

/// Tag that selects every article.
pub const ALL_TAG: &str = "ALL";

/// The first featured article, shown above the feed.
pub fn featured_article(articles: &[Article]) -> Option<&Article> {
    articles.iter().find(|a| a.featured)
}

/// Non-featured articles carrying `tag`, in their original order.
pub fn filter_by_tag<'a>(articles: &'a [Article], tag: &str) -> Vec<&'a Article> {
    let tag = tag.trim();
    articles
        .iter()
        .filter(|a| !a.featured)
        .filter(|a| tag.is_empty() || tag.eq_ignore_ascii_case(ALL_TAG) || a.has_tag(tag))
        .collect()
}
