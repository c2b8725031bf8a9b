use article_console::api::model::{
    ArticlePatch, BatchAck, BatchJobStatus, CategoryPatch, GenerateAck, GenerateOptions,
};
use article_console::api::ContentApi;
use article_console::cache::{CachePolicy, QueryCache, Snapshot};
use article_console::console::{categories_key, Console};
use article_console::error::ApiError;
use article_console::model::{Article, ArticleFilter, ArticlePage, ArticleStatus, Category};
use article_console::mutation::MutationError;
use article_console::notify::{Notification, NotificationKind, Notifier};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
enum ApiCall {
    ListCategories,
    CreateCategory { name: String, slug: String },
    GetCategory(Uuid),
    UpdateCategory(Uuid),
    DeleteCategory(Uuid),
    ListArticles { param: String },
    GetArticle(Uuid),
    CreateArticle { category_id: Uuid, keyword: String },
    UpdateArticle { id: Uuid, patch: ArticlePatch },
    DeleteArticle(Uuid),
    Generate(Uuid),
    Regenerate(Uuid),
    BatchGenerate(Vec<Uuid>),
    BatchStatus(String),
    CreateSheet(Uuid),
    LinkSheet { category_id: Uuid, sheet_id: String },
    PublishDraft(Uuid),
    Publish(Uuid),
}

/// Scripted API double: pops one queued JSON response per call and records
/// every call made against it.
#[derive(Clone, Default)]
struct RecordingApi {
    responses: Arc<Mutex<VecDeque<Result<Value, ApiError>>>>,
    calls: Arc<Mutex<Vec<ApiCall>>>,
}

impl RecordingApi {
    fn with_responses(responses: Vec<Result<Value, ApiError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::from(responses))),
            ..Default::default()
        }
    }

    fn push_response(&self, response: Result<Value, ApiError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn answer<T: serde::de::DeserializeOwned>(&self, call: ApiCall) -> Result<T, ApiError> {
        self.calls.lock().unwrap().push(call);
        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(Value::Null));
        response.and_then(|value| {
            serde_json::from_value(value)
                .map_err(|err| ApiError::network(format!("bad scripted response: {err}")))
        })
    }
}

#[async_trait]
impl ContentApi for RecordingApi {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.answer(ApiCall::ListCategories)
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, ApiError> {
        self.answer(ApiCall::CreateCategory {
            name: name.to_string(),
            slug: slug.to_string(),
        })
    }

    async fn get_category(&self, id: Uuid) -> Result<Category, ApiError> {
        self.answer(ApiCall::GetCategory(id))
    }

    async fn update_category(
        &self,
        id: Uuid,
        _patch: &CategoryPatch,
    ) -> Result<Category, ApiError> {
        self.answer(ApiCall::UpdateCategory(id))
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), ApiError> {
        self.answer(ApiCall::DeleteCategory(id))
    }

    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: u32,
        per_page: u32,
    ) -> Result<ArticlePage, ApiError> {
        self.answer(ApiCall::ListArticles {
            param: filter.cache_param(page, per_page),
        })
    }

    async fn get_article(&self, id: Uuid) -> Result<Article, ApiError> {
        self.answer(ApiCall::GetArticle(id))
    }

    async fn create_article(
        &self,
        category_id: Uuid,
        keyword: &str,
        _prompt_template_id: Option<Uuid>,
    ) -> Result<Article, ApiError> {
        self.answer(ApiCall::CreateArticle {
            category_id,
            keyword: keyword.to_string(),
        })
    }

    async fn update_article(&self, id: Uuid, patch: &ArticlePatch) -> Result<Article, ApiError> {
        self.answer(ApiCall::UpdateArticle {
            id,
            patch: patch.clone(),
        })
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), ApiError> {
        self.answer(ApiCall::DeleteArticle(id))
    }

    async fn generate(
        &self,
        article_id: Uuid,
        _options: Option<&GenerateOptions>,
    ) -> Result<GenerateAck, ApiError> {
        self.answer(ApiCall::Generate(article_id))
    }

    async fn regenerate(
        &self,
        article_id: Uuid,
        _options: Option<&GenerateOptions>,
    ) -> Result<GenerateAck, ApiError> {
        self.answer(ApiCall::Regenerate(article_id))
    }

    async fn batch_generate(
        &self,
        article_ids: &[Uuid],
        _options: Option<&GenerateOptions>,
    ) -> Result<BatchAck, ApiError> {
        self.answer(ApiCall::BatchGenerate(article_ids.to_vec()))
    }

    async fn batch_status(&self, job_id: &str) -> Result<BatchJobStatus, ApiError> {
        self.answer(ApiCall::BatchStatus(job_id.to_string()))
    }

    async fn create_sheet(&self, category_id: Uuid) -> Result<Category, ApiError> {
        self.answer(ApiCall::CreateSheet(category_id))
    }

    async fn link_sheet(
        &self,
        category_id: Uuid,
        sheet_id: &str,
        _sheet_url: &str,
    ) -> Result<Category, ApiError> {
        self.answer(ApiCall::LinkSheet {
            category_id,
            sheet_id: sheet_id.to_string(),
        })
    }

    async fn publish_draft(&self, article_id: Uuid) -> Result<Article, ApiError> {
        self.answer(ApiCall::PublishDraft(article_id))
    }

    async fn publish(&self, article_id: Uuid) -> Result<Article, ApiError> {
        self.answer(ApiCall::Publish(article_id))
    }
}

#[derive(Clone, Default)]
struct RecordingNotifier {
    seen: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.seen.lock().unwrap().push(notification);
    }
}

fn category_json(id: Uuid, name: &str, slug: &str, sheet_url: Option<&str>) -> Value {
    json!({
        "id": id,
        "name": name,
        "slug": slug,
        "sheet_id": sheet_url.map(|_| "sheet-1"),
        "sheet_url": sheet_url,
        "sheets_synced_at": null,
        "created_at": "2024-05-01T00:00:00Z",
        "updated_at": "2024-05-01T00:00:00Z",
    })
}

fn article_json(id: Uuid, category_id: Uuid, keyword: &str, status: &str) -> Value {
    json!({
        "id": id,
        "category_id": category_id,
        "keyword": keyword,
        "title": null,
        "content": null,
        "status": status,
        "wp_post_id": null,
        "wp_url": null,
        "wp_published_at": null,
        "created_at": "2024-05-01T00:00:00Z",
        "updated_at": "2024-05-01T00:00:00Z",
    })
}

fn article_page_json(items: Vec<Value>) -> Value {
    let total = items.len();
    json!({ "items": items, "total": total, "page": 1, "per_page": 20 })
}

fn console_with(api: &RecordingApi, notifier: &RecordingNotifier) -> Console {
    Console::new(
        Arc::new(api.clone()),
        CachePolicy::default(),
        Arc::new(notifier.clone()),
    )
}

#[tokio::test]
async fn created_category_appears_after_invalidated_list_refetch() {
    let category_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(json!([])),
        Ok(category_json(category_id, "テクノロジー", "technology", None)),
        Ok(json!([category_json(
            category_id,
            "テクノロジー",
            "technology",
            None
        )])),
    ]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    assert!(console.categories().await.unwrap().is_empty());

    let created = console
        .create_category("テクノロジー", "technology")
        .await
        .unwrap();
    assert_eq!(created.slug, "technology");

    // The list key was invalidated, so this is a real refetch.
    let listed = console.categories().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "テクノロジー");
    assert_eq!(listed[0].sheet_url, None);

    assert_eq!(
        api.calls(),
        vec![
            ApiCall::ListCategories,
            ApiCall::CreateCategory {
                name: "テクノロジー".into(),
                slug: "technology".into()
            },
            ApiCall::ListCategories,
        ]
    );
    let seen = notifier.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].kind, NotificationKind::Info);
}

#[tokio::test]
async fn created_article_is_pending_and_list_is_invalidated() {
    let category_id = Uuid::new_v4();
    let article_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(article_page_json(vec![])),
        Ok(article_json(
            article_id,
            category_id,
            "Next.js チュートリアル",
            "pending",
        )),
        Ok(article_page_json(vec![article_json(
            article_id,
            category_id,
            "Next.js チュートリアル",
            "pending",
        )])),
    ]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);
    let filter = ArticleFilter::default();

    assert!(console.articles(&filter, 1, 20).await.unwrap().items.is_empty());

    let created = console
        .create_article(category_id, "Next.js チュートリアル", None)
        .await
        .unwrap();
    assert_eq!(created.status, ArticleStatus::Pending);

    let page = console.articles(&filter, 1, 20).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(
        api.calls(),
        vec![
            ApiCall::ListArticles {
                param: "*/*/1/20".into()
            },
            ApiCall::CreateArticle {
                category_id,
                keyword: "Next.js チュートリアル".into()
            },
            ApiCall::ListArticles {
                param: "*/*/1/20".into()
            },
        ]
    );
}

#[tokio::test]
async fn generate_invalidates_article_detail() {
    let category_id = Uuid::new_v4();
    let article_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(article_json(article_id, category_id, "kw", "pending")),
        Ok(json!({ "job_id": "job-1", "status": "accepted" })),
        Ok(article_json(article_id, category_id, "kw", "generating")),
    ]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let before = console.article(article_id).await.unwrap();
    assert!(before.can_generate());

    let ack = console.generate(article_id, None).await.unwrap();
    assert_eq!(ack.job_id.as_deref(), Some("job-1"));

    // Server-driven progress becomes visible on the forced refetch.
    let after = console.article(article_id).await.unwrap();
    assert_eq!(after.status, ArticleStatus::Generating);
    assert_eq!(
        api.calls(),
        vec![
            ApiCall::GetArticle(article_id),
            ApiCall::Generate(article_id),
            ApiCall::GetArticle(article_id),
        ]
    );
}

#[tokio::test]
async fn link_sheet_with_bad_url_never_reaches_the_network() {
    let api = RecordingApi::default();
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let err = console
        .link_sheet(Uuid::new_v4(), "https://example.com/doc/123")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MutationError::Failed(ApiError::Validation { .. })
    ));
    assert!(api.calls().is_empty());
    assert!(notifier.seen().is_empty());
}

#[tokio::test]
async fn link_sheet_extracts_id_from_url() {
    let category_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![Ok(category_json(
        category_id,
        "Tech",
        "tech",
        Some("https://docs.google.com/spreadsheets/d/1AbC-xyz_9/edit"),
    ))]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let category = console
        .link_sheet(
            category_id,
            "https://docs.google.com/spreadsheets/d/1AbC-xyz_9/edit",
        )
        .await
        .unwrap();
    assert!(category.sheet_url.is_some());
    assert_eq!(
        api.calls(),
        vec![ApiCall::LinkSheet {
            category_id,
            sheet_id: "1AbC-xyz_9".into()
        }]
    );
}

#[tokio::test]
async fn deleting_a_deleted_article_surfaces_not_found() {
    let article_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(Value::Null),
        Err(ApiError::NotFound {
            detail: Some("article not found".into()),
        }),
    ]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    console.delete_article(article_id).await.unwrap();
    let err = console.delete_article(article_id).await.unwrap_err();
    assert!(matches!(err, MutationError::Failed(ApiError::NotFound { .. })));

    let seen = notifier.seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0].kind, NotificationKind::Info);
    assert_eq!(seen[1].kind, NotificationKind::Error);
    assert_eq!(seen[1].title, "delete article failed");
    assert_eq!(seen[1].description.as_deref(), Some("article not found"));
}

#[tokio::test]
async fn failed_mutation_falls_back_to_generic_detail() {
    let article_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![Err(ApiError::Request {
        status: 500,
        detail: None,
    })]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let patch = ArticlePatch {
        title: Some("t".into()),
        ..Default::default()
    };
    let _ = console.update_article(article_id, patch).await.unwrap_err();

    let seen = notifier.seen();
    assert_eq!(seen[0].title, "update article failed");
    assert_eq!(
        seen[0].description.as_deref(),
        Some("The request could not be completed.")
    );
}

/// Notifier that inspects the cache the moment the success notification is
/// emitted, proving invalidation happens first.
struct OrderingNotifier {
    cache: Mutex<Option<QueryCache>>,
    stale_at_notify: Arc<Mutex<Option<bool>>>,
}

impl Notifier for OrderingNotifier {
    fn notify(&self, _notification: Notification) {
        let cache = self.cache.lock().unwrap();
        let cache = cache.as_ref().expect("cache installed");
        let stale = matches!(
            cache.peek::<Vec<Category>>(&categories_key()),
            Snapshot::Stale(_)
        );
        *self.stale_at_notify.lock().unwrap() = Some(stale);
    }
}

#[tokio::test]
async fn invalidation_is_visible_before_the_success_notification() {
    let category_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(json!([])),
        Ok(category_json(category_id, "Tech", "tech", None)),
    ]);
    let stale_at_notify = Arc::new(Mutex::new(None));
    let notifier = Arc::new(OrderingNotifier {
        cache: Mutex::new(None),
        stale_at_notify: Arc::clone(&stale_at_notify),
    });
    let console = Console::new(
        Arc::new(api.clone()),
        CachePolicy::default(),
        notifier.clone(),
    );
    *notifier.cache.lock().unwrap() = Some(console.cache().clone());

    let _ = console.categories().await.unwrap();
    console.create_category("Tech", "tech").await.unwrap();

    assert_eq!(*stale_at_notify.lock().unwrap(), Some(true));
}

#[tokio::test]
async fn failed_list_refresh_serves_previous_snapshot() {
    let category_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(json!([category_json(category_id, "Tech", "tech", None)])),
        Ok(category_json(
            category_id,
            "Tech",
            "tech",
            Some("https://docs.google.com/spreadsheets/d/1X/edit"),
        )),
        Err(ApiError::network("connection reset")),
    ]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let before = console.categories().await.unwrap();
    assert_eq!(before.len(), 1);

    // Invalidate through a successful mutation, then fail the refetch.
    console.create_sheet(category_id).await.unwrap();
    let after = console.categories().await.unwrap();
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].slug, "tech");
}

#[tokio::test]
async fn batch_status_is_never_cached() {
    let api = RecordingApi::default();
    api.push_response(Ok(json!({ "job_id": "j-1", "status": "running" })));
    api.push_response(Ok(json!({ "job_id": "j-1", "status": "done" })));
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    assert_eq!(console.batch_status("j-1").await.unwrap().status, "running");
    assert_eq!(console.batch_status("j-1").await.unwrap().status, "done");
    assert_eq!(
        api.calls(),
        vec![
            ApiCall::BatchStatus("j-1".into()),
            ApiCall::BatchStatus("j-1".into()),
        ]
    );
}

#[tokio::test]
async fn batch_generate_requires_ids() {
    let api = RecordingApi::default();
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let err = console.batch_generate(vec![], None).await.unwrap_err();
    assert!(matches!(
        err,
        MutationError::Failed(ApiError::Validation { .. })
    ));
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn dashboard_composes_breakdown_and_recent_categories() {
    let category_id = Uuid::new_v4();
    let api = RecordingApi::with_responses(vec![
        Ok(json!([category_json(category_id, "Tech", "tech", None)])),
        Ok(article_page_json(vec![
            article_json(Uuid::new_v4(), category_id, "a", "pending"),
            article_json(Uuid::new_v4(), category_id, "b", "pending"),
            article_json(Uuid::new_v4(), category_id, "c", "published"),
        ])),
    ]);
    let notifier = RecordingNotifier::default();
    let console = console_with(&api, &notifier);

    let dashboard = console.dashboard().await.unwrap();
    assert_eq!(dashboard.breakdown.total, 3);
    assert_eq!(dashboard.breakdown.count(ArticleStatus::Pending), 2);
    assert_eq!(dashboard.breakdown.count(ArticleStatus::Published), 1);
    assert_eq!(dashboard.total_categories, 1);
    assert_eq!(dashboard.recent_categories[0].slug, "tech");
}
