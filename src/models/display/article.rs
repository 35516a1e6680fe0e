//! Article and search result display models

use serde::Serialize;
use tabled::Tabled;

use crate::client::models::Article;
use crate::output::formatters::{format_datetime_local, truncate};

/// Article display model for table/JSON output.
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct ArticleDisplay {
    #[tabled(rename = "SLUG")]
    pub slug: String,

    #[tabled(rename = "TITLE")]
    pub title: String,

    #[tabled(rename = "AUTHOR")]
    pub author: String,

    #[tabled(rename = "CATEGORY")]
    pub category: String,

    #[tabled(rename = "PUBLISHED")]
    pub published: String,

    /// Views / likes / comments
    #[tabled(rename = "STATS")]
    pub stats: String,
}

impl From<&Article> for ArticleDisplay {
    fn from(article: &Article) -> Self {
        Self {
            slug: article.slug.clone(),
            title: truncate(&article.title, 48),
            author: article
                .author
                .as_ref()
                .map(|a| a.full_name.clone())
                .unwrap_or_default(),
            category: article.category_name().unwrap_or_default(),
            published: format_datetime_local(article.published_at.as_ref()),
            stats: format!(
                "{} / {} / {}",
                article.views_count, article.likes_count, article.comment_count
            ),
        }
    }
}

impl From<Article> for ArticleDisplay {
    fn from(article: Article) -> Self {
        Self::from(&article)
    }
}

/// One search hit. The search endpoint returns loosely typed objects.
#[derive(Debug, Clone, Tabled, Serialize)]
pub struct SearchHitDisplay {
    #[tabled(rename = "TYPE")]
    pub kind: String,

    #[tabled(rename = "TITLE")]
    pub title: String,

    #[tabled(rename = "LINK")]
    pub link: String,
}

impl SearchHitDisplay {
    /// Flatten a search payload into rows.
    ///
    /// Accepts a bare list, `{"results": [...]}`, or results grouped by type
    /// (`{"articles": [...], "users": [...]}`).
    pub fn rows(payload: &serde_json::Value, kind: Option<&str>) -> Vec<Self> {
        match payload {
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| Self::from_item(item, kind.unwrap_or("result")))
                .collect(),
            serde_json::Value::Object(map) => {
                if let Some(results) = map.get("results") {
                    return Self::rows(results, kind);
                }
                map.iter()
                    .filter_map(|(group, items)| items.as_array().map(|items| (group, items)))
                    .flat_map(|(group, items)| {
                        let label = group.trim_end_matches('s').to_string();
                        items.iter().map(move |item| Self::from_item(item, &label))
                    })
                    .collect()
            }
            _ => vec![],
        }
    }

    fn from_item(item: &serde_json::Value, kind: &str) -> Self {
        let field = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| item.get(*k).and_then(|v| v.as_str()))
                .unwrap_or_default()
                .to_string()
        };
        let link = match field(&["url", "slug", "username"]) {
            l if l.is_empty() => item
                .get("id")
                .map(|v| v.to_string())
                .unwrap_or_default(),
            l => l,
        };
        Self {
            kind: item
                .get("type")
                .and_then(|v| v.as_str())
                .unwrap_or(kind)
                .to_string(),
            title: truncate(&field(&["title", "full_name", "name", "content"]), 60),
            link,
        }
    }
}
