//! Session-scoped facade wiring the API client, the query cache and the
//! mutation orchestrator. Reads go through the cache; every write is a named
//! mutation that declares which cache keys it invalidates.
use crate::api::model::{ArticlePatch, BatchAck, BatchJobStatus, CategoryPatch, GenerateAck, GenerateOptions};
use crate::api::ContentApi;
use crate::cache::{CachePolicy, QueryCache, QueryKey};
use crate::error::ApiError;
use crate::model::{Article, ArticleFilter, ArticlePage, Category, StatusBreakdown};
use crate::mutation::{Affected, Mutation, MutationError};
use crate::notify::Notifier;
use crate::validate;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

pub const CATEGORIES: &str = "categories";
pub const ARTICLES: &str = "articles";
pub const ARTICLE: &str = "article";

/// How many articles the dashboard scans for its status breakdown, and how
/// many categories it lists as recent.
const DASHBOARD_SCAN: u32 = 200;
const DASHBOARD_RECENT: usize = 5;

pub fn article_key(id: Uuid) -> QueryKey {
    QueryKey::item(ARTICLE, id.to_string())
}

pub fn articles_key(filter: &ArticleFilter, page: u32, per_page: u32) -> QueryKey {
    QueryKey::item(ARTICLES, filter.cache_param(page, per_page))
}

pub fn categories_key() -> QueryKey {
    QueryKey::resource(CATEGORIES)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dashboard {
    pub breakdown: StatusBreakdown,
    pub recent_categories: Vec<Category>,
    pub total_categories: usize,
}

struct Mutations {
    create_category: Mutation,
    update_category: Mutation,
    delete_category: Mutation,
    create_sheet: Mutation,
    link_sheet: Mutation,
    create_article: Mutation,
    update_article: Mutation,
    delete_article: Mutation,
    generate: Mutation,
    regenerate: Mutation,
    batch_generate: Mutation,
    publish_draft: Mutation,
    publish: Mutation,
}

impl Mutations {
    fn new() -> Self {
        Self {
            create_category: Mutation::new("create category"),
            update_category: Mutation::new("update category"),
            delete_category: Mutation::new("delete category"),
            create_sheet: Mutation::new("create sheet"),
            link_sheet: Mutation::new("link sheet"),
            create_article: Mutation::new("create article"),
            update_article: Mutation::new("update article"),
            delete_article: Mutation::new("delete article"),
            generate: Mutation::new("generate"),
            regenerate: Mutation::new("regenerate"),
            batch_generate: Mutation::new("batch generate"),
            publish_draft: Mutation::new("submit draft"),
            publish: Mutation::new("publish"),
        }
    }
}

pub struct Console {
    api: Arc<dyn ContentApi>,
    cache: QueryCache,
    notifier: Arc<dyn Notifier>,
    mutations: Mutations,
}

impl Console {
    /// One console per session; never a process-wide singleton.
    pub fn new(api: Arc<dyn ContentApi>, policy: CachePolicy, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            api,
            cache: QueryCache::new(policy),
            notifier,
            mutations: Mutations::new(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    // ---- reads -----------------------------------------------------------

    #[instrument(skip_all)]
    pub async fn categories(&self) -> Result<Arc<Vec<Category>>, ApiError> {
        let api = Arc::clone(&self.api);
        self.cache
            .get(categories_key(), async move { api.list_categories().await })
            .await
    }

    #[instrument(skip_all)]
    pub async fn articles(
        &self,
        filter: &ArticleFilter,
        page: u32,
        per_page: u32,
    ) -> Result<Arc<ArticlePage>, ApiError> {
        validate::page_params(page, per_page)?;
        let api = Arc::clone(&self.api);
        let fetch_filter = filter.clone();
        self.cache
            .get(articles_key(filter, page, per_page), async move {
                api.list_articles(&fetch_filter, page, per_page).await
            })
            .await
    }

    #[instrument(skip_all, fields(article = %id))]
    pub async fn article(&self, id: Uuid) -> Result<Arc<Article>, ApiError> {
        let api = Arc::clone(&self.api);
        self.cache
            .get(article_key(id), async move { api.get_article(id).await })
            .await
    }

    /// Status breakdown plus the most recently updated categories.
    #[instrument(skip_all)]
    pub async fn dashboard(&self) -> Result<Dashboard, ApiError> {
        let categories = self.categories().await?;
        let page = self
            .articles(&ArticleFilter::default(), 1, DASHBOARD_SCAN)
            .await?;
        let mut recent: Vec<Category> = categories.as_ref().clone();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        recent.truncate(DASHBOARD_RECENT);
        Ok(Dashboard {
            breakdown: StatusBreakdown::from_articles(&page.items),
            recent_categories: recent,
            total_categories: categories.len(),
        })
    }

    /// Poll data for a running batch job; deliberately never cached.
    pub async fn batch_status(&self, job_id: &str) -> Result<BatchJobStatus, ApiError> {
        self.api.batch_status(job_id).await
    }

    // ---- writes ----------------------------------------------------------

    pub async fn create_category(&self, name: &str, slug: &str) -> Result<Category, MutationError> {
        validate::category_input(name, slug)?;
        let api = Arc::clone(&self.api);
        let (name, slug) = (name.to_string(), slug.to_string());
        self.mutations
            .create_category
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(CATEGORIES)],
                async move { api.create_category(&name, &slug).await },
            )
            .await
    }

    pub async fn update_category(
        &self,
        id: Uuid,
        patch: CategoryPatch,
    ) -> Result<Category, MutationError> {
        if let Some(name) = &patch.name {
            validate::name_input(name)?;
        }
        if let Some(slug) = &patch.slug {
            validate::slug_input(slug)?;
        }
        let api = Arc::clone(&self.api);
        self.mutations
            .update_category
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(CATEGORIES)],
                async move { api.update_category(id, &patch).await },
            )
            .await
    }

    pub async fn delete_category(&self, id: Uuid) -> Result<(), MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .delete_category
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(CATEGORIES)],
                async move { api.delete_category(id).await },
            )
            .await
    }

    pub async fn create_sheet(&self, category_id: Uuid) -> Result<Category, MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .create_sheet
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(CATEGORIES)],
                async move { api.create_sheet(category_id).await },
            )
            .await
    }

    /// The sheet id is extracted from the URL client-side; a URL without a
    /// `/spreadsheets/d/{id}` segment is rejected before any request is sent.
    pub async fn link_sheet(
        &self,
        category_id: Uuid,
        sheet_url: &str,
    ) -> Result<Category, MutationError> {
        let sheet_id = validate::sheet_id_from_url(sheet_url)?;
        let api = Arc::clone(&self.api);
        let sheet_url = sheet_url.to_string();
        self.mutations
            .link_sheet
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(CATEGORIES)],
                async move { api.link_sheet(category_id, &sheet_id, &sheet_url).await },
            )
            .await
    }

    pub async fn create_article(
        &self,
        category_id: Uuid,
        keyword: &str,
        prompt_template_id: Option<Uuid>,
    ) -> Result<Article, MutationError> {
        validate::keyword_input(keyword)?;
        let api = Arc::clone(&self.api);
        let keyword = keyword.to_string();
        self.mutations
            .create_article
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(ARTICLES)],
                async move {
                    api.create_article(category_id, &keyword, prompt_template_id)
                        .await
                },
            )
            .await
    }

    pub async fn update_article(
        &self,
        id: Uuid,
        patch: ArticlePatch,
    ) -> Result<Article, MutationError> {
        if let Some(keyword) = &patch.keyword {
            validate::keyword_input(keyword)?;
        }
        let api = Arc::clone(&self.api);
        self.mutations
            .update_article
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Key(article_key(id))],
                async move { api.update_article(id, &patch).await },
            )
            .await
    }

    pub async fn delete_article(&self, id: Uuid) -> Result<(), MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .delete_article
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(ARTICLES), Affected::Key(article_key(id))],
                async move { api.delete_article(id).await },
            )
            .await
    }

    pub async fn generate(
        &self,
        article_id: Uuid,
        options: Option<GenerateOptions>,
    ) -> Result<GenerateAck, MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .generate
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[
                    Affected::Resource(ARTICLES),
                    Affected::Key(article_key(article_id)),
                ],
                async move { api.generate(article_id, options.as_ref()).await },
            )
            .await
    }

    pub async fn regenerate(
        &self,
        article_id: Uuid,
        options: Option<GenerateOptions>,
    ) -> Result<GenerateAck, MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .regenerate
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Key(article_key(article_id))],
                async move { api.regenerate(article_id, options.as_ref()).await },
            )
            .await
    }

    pub async fn batch_generate(
        &self,
        article_ids: Vec<Uuid>,
        options: Option<GenerateOptions>,
    ) -> Result<BatchAck, MutationError> {
        if article_ids.is_empty() {
            return Err(ApiError::validation("at least one article id is required").into());
        }
        let api = Arc::clone(&self.api);
        self.mutations
            .batch_generate
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Resource(ARTICLES)],
                async move { api.batch_generate(&article_ids, options.as_ref()).await },
            )
            .await
    }

    pub async fn publish_draft(&self, article_id: Uuid) -> Result<Article, MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .publish_draft
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Key(article_key(article_id))],
                async move { api.publish_draft(article_id).await },
            )
            .await
    }

    pub async fn publish(&self, article_id: Uuid) -> Result<Article, MutationError> {
        let api = Arc::clone(&self.api);
        self.mutations
            .publish
            .run(
                &self.cache,
                self.notifier.as_ref(),
                &[Affected::Key(article_key(article_id))],
                async move { api.publish(article_id).await },
            )
            .await
    }
}
