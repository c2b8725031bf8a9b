use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ArticleStatus {
    Pending,
    Generating,
    Failed,
    ReviewPending,
    Reviewed,
    Published,
}

impl ArticleStatus {
    pub const ALL: [ArticleStatus; 6] = [
        ArticleStatus::Pending,
        ArticleStatus::Generating,
        ArticleStatus::Failed,
        ArticleStatus::ReviewPending,
        ArticleStatus::Reviewed,
        ArticleStatus::Published,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "pending",
            ArticleStatus::Generating => "generating",
            ArticleStatus::Failed => "failed",
            ArticleStatus::ReviewPending => "review_pending",
            ArticleStatus::Reviewed => "reviewed",
            ArticleStatus::Published => "published",
        }
    }

    /// Human label shown in listings, matching the editorial tool's wording.
    pub fn label(&self) -> &'static str {
        match self {
            ArticleStatus::Pending => "未生成",
            ArticleStatus::Generating => "生成中",
            ArticleStatus::Failed => "生成失敗",
            ArticleStatus::ReviewPending => "レビュー待ち",
            ArticleStatus::Reviewed => "レビュー済み",
            ArticleStatus::Published => "公開済み",
        }
    }
}

impl fmt::Display for ArticleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArticleStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ArticleStatus::Pending),
            "generating" => Ok(ArticleStatus::Generating),
            "failed" => Ok(ArticleStatus::Failed),
            "review_pending" => Ok(ArticleStatus::ReviewPending),
            "reviewed" => Ok(ArticleStatus::Reviewed),
            "published" => Ok(ArticleStatus::Published),
            other => Err(format!("unknown article status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sheet_id: Option<String>,
    pub sheet_url: Option<String>,
    pub sheets_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub id: Uuid,
    pub category_id: Uuid,
    pub keyword: String,
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: ArticleStatus,
    pub wp_post_id: Option<i64>,
    pub wp_url: Option<String>,
    pub wp_published_at: Option<DateTime<Utc>>,
    // The backend serializes the metadata map under a trailing underscore.
    #[serde(rename = "metadata_", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Value>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Article {
    pub fn has_content(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.trim().is_empty())
    }

    /// Generation may only be offered for articles that have never run.
    pub fn can_generate(&self) -> bool {
        self.status == ArticleStatus::Pending
    }

    pub fn can_regenerate(&self) -> bool {
        self.has_content() && self.status != ArticleStatus::Pending
    }

    pub fn can_publish(&self) -> bool {
        self.has_content() && self.status != ArticleStatus::Published
    }

    pub fn can_submit_draft(&self) -> bool {
        self.can_publish()
    }

    pub fn is_editable(&self) -> bool {
        self.has_content()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArticlePage {
    pub items: Vec<Article>,
    pub total: u64,
    pub page: u32,
    pub per_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleFilter {
    pub category_id: Option<Uuid>,
    pub status: Option<ArticleStatus>,
}

impl ArticleFilter {
    /// Canonical cache-key parameter for a filtered, paginated article list.
    /// Two requests for the same logical page must map to the same key.
    pub fn cache_param(&self, page: u32, per_page: u32) -> String {
        let category = self
            .category_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "*".into());
        let status = self.status.map(|s| s.as_str()).unwrap_or("*");
        format!("{category}/{status}/{page}/{per_page}")
    }
}

/// Per-status article counts for the dashboard view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusBreakdown {
    pub counts: BTreeMap<ArticleStatus, u64>,
    pub total: u64,
}

impl StatusBreakdown {
    pub fn from_articles<'a>(articles: impl IntoIterator<Item = &'a Article>) -> Self {
        let mut breakdown = StatusBreakdown::default();
        for article in articles {
            *breakdown.counts.entry(article.status).or_insert(0) += 1;
            breakdown.total += 1;
        }
        breakdown
    }

    pub fn count(&self, status: ArticleStatus) -> u64 {
        self.counts.get(&status).copied().unwrap_or(0)
    }
}
