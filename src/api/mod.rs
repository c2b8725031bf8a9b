pub mod model;

use crate::error::ApiError;
use crate::model::{Article, ArticleFilter, ArticlePage, Category};
use async_trait::async_trait;
use self::model::{ArticlePatch, BatchAck, BatchJobStatus, CategoryPatch, GenerateAck, GenerateOptions};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::fmt;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

/// One method per remote operation. The console and the orchestrator depend
/// on this trait; tests implement it with a recording double.
#[async_trait]
pub trait ContentApi: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError>;
    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, ApiError>;
    async fn get_category(&self, id: Uuid) -> Result<Category, ApiError>;
    async fn update_category(&self, id: Uuid, patch: &CategoryPatch) -> Result<Category, ApiError>;
    async fn delete_category(&self, id: Uuid) -> Result<(), ApiError>;

    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: u32,
        per_page: u32,
    ) -> Result<ArticlePage, ApiError>;
    async fn get_article(&self, id: Uuid) -> Result<Article, ApiError>;
    async fn create_article(
        &self,
        category_id: Uuid,
        keyword: &str,
        prompt_template_id: Option<Uuid>,
    ) -> Result<Article, ApiError>;
    async fn update_article(&self, id: Uuid, patch: &ArticlePatch) -> Result<Article, ApiError>;
    async fn delete_article(&self, id: Uuid) -> Result<(), ApiError>;

    async fn generate(
        &self,
        article_id: Uuid,
        options: Option<&GenerateOptions>,
    ) -> Result<GenerateAck, ApiError>;
    async fn regenerate(
        &self,
        article_id: Uuid,
        options: Option<&GenerateOptions>,
    ) -> Result<GenerateAck, ApiError>;
    async fn batch_generate(
        &self,
        article_ids: &[Uuid],
        options: Option<&GenerateOptions>,
    ) -> Result<BatchAck, ApiError>;
    async fn batch_status(&self, job_id: &str) -> Result<BatchJobStatus, ApiError>;

    async fn create_sheet(&self, category_id: Uuid) -> Result<Category, ApiError>;
    async fn link_sheet(
        &self,
        category_id: Uuid,
        sheet_id: &str,
        sheet_url: &str,
    ) -> Result<Category, ApiError>;

    async fn publish_draft(&self, article_id: Uuid) -> Result<Article, ApiError>;
    async fn publish(&self, article_id: Uuid) -> Result<Article, ApiError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let base_url = normalize_base_url(base_url)?;
        let http = Client::builder()
            .user_agent("article-console/0.1")
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Ok(Self { http, base_url })
    }

    pub fn from_config(cfg: &crate::config::Config) -> Result<Self, ApiError> {
        Self::new(&cfg.api.base_url, cfg.timeout())
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::network(format!("invalid endpoint '{path}': {err}")))
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<reqwest::Request, ApiError> {
        let url = self.endpoint(path)?;
        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        builder
            .build()
            .map_err(|err| ApiError::network(format!("failed to build request: {err}")))
    }

    async fn execute(&self, request: reqwest::Request) -> Result<String, ApiError> {
        debug!(method = %request.method(), url = %request.url(), "sending api request");
        let res = self
            .http
            .execute(request)
            .await
            .map_err(|err| ApiError::network(err.to_string()))?;
        let status = res.status();
        let body = res.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(error_from_status(status.as_u16(), &body));
        }
        Ok(body)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        request: reqwest::Request,
    ) -> Result<T, ApiError> {
        let body = self.execute(request).await?;
        decode_body(&body)
    }

    /// GETs are retried exactly once on a transport failure; writes never are.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, ApiError> {
        let request = self
            .http
            .get(url)
            .build()
            .map_err(|err| ApiError::network(format!("failed to build request: {err}")))?;
        let retry = request.try_clone();
        match (self.execute_json(request).await, retry) {
            (Err(ApiError::Network { .. }), Some(retry)) => self.execute_json(retry).await,
            (outcome, _) => outcome,
        }
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ApiError> {
        self.execute_json(self.build_request(Method::POST, path, Some(body))?)
            .await
    }

    async fn patch_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &Value,
    ) -> Result<T, ApiError> {
        self.execute_json(self.build_request(Method::PATCH, path, Some(body))?)
            .await
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute(self.build_request(Method::DELETE, path, None)?)
            .await
            .map(|_| ())
    }
}

#[async_trait]
impl ContentApi for ApiClient {
    async fn list_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.get_json(self.endpoint("categories")?).await
    }

    async fn create_category(&self, name: &str, slug: &str) -> Result<Category, ApiError> {
        self.post_json("categories", &create_category_body(name, slug))
            .await
    }

    async fn get_category(&self, id: Uuid) -> Result<Category, ApiError> {
        self.get_json(self.endpoint(&format!("categories/{id}"))?)
            .await
    }

    async fn update_category(&self, id: Uuid, patch: &CategoryPatch) -> Result<Category, ApiError> {
        let body = serde_json::to_value(patch)
            .map_err(|err| ApiError::network(format!("unserializable patch: {err}")))?;
        self.patch_json(&format!("categories/{id}"), &body).await
    }

    async fn delete_category(&self, id: Uuid) -> Result<(), ApiError> {
        self.delete(&format!("categories/{id}")).await
    }

    async fn list_articles(
        &self,
        filter: &ArticleFilter,
        page: u32,
        per_page: u32,
    ) -> Result<ArticlePage, ApiError> {
        let mut url = self.endpoint("articles")?;
        {
            let mut pairs = url.query_pairs_mut();
            for (name, value) in article_query(filter, page, per_page) {
                pairs.append_pair(name, &value);
            }
        }
        self.get_json(url).await
    }

    async fn get_article(&self, id: Uuid) -> Result<Article, ApiError> {
        self.get_json(self.endpoint(&format!("articles/{id}"))?)
            .await
    }

    async fn create_article(
        &self,
        category_id: Uuid,
        keyword: &str,
        prompt_template_id: Option<Uuid>,
    ) -> Result<Article, ApiError> {
        self.post_json(
            "articles",
            &create_article_body(category_id, keyword, prompt_template_id),
        )
        .await
    }

    async fn update_article(&self, id: Uuid, patch: &ArticlePatch) -> Result<Article, ApiError> {
        let body = serde_json::to_value(patch)
            .map_err(|err| ApiError::network(format!("unserializable patch: {err}")))?;
        self.patch_json(&format!("articles/{id}"), &body).await
    }

    async fn delete_article(&self, id: Uuid) -> Result<(), ApiError> {
        self.delete(&format!("articles/{id}")).await
    }

    async fn generate(
        &self,
        article_id: Uuid,
        options: Option<&GenerateOptions>,
    ) -> Result<GenerateAck, ApiError> {
        self.post_json("generate", &generate_body(article_id, options))
            .await
    }

    async fn regenerate(
        &self,
        article_id: Uuid,
        options: Option<&GenerateOptions>,
    ) -> Result<GenerateAck, ApiError> {
        let body = options
            .map(|opts| Value::Object(opts.clone()))
            .unwrap_or_else(|| json!({}));
        self.post_json(&format!("generate/regenerate/{article_id}"), &body)
            .await
    }

    async fn batch_generate(
        &self,
        article_ids: &[Uuid],
        options: Option<&GenerateOptions>,
    ) -> Result<BatchAck, ApiError> {
        self.post_json("batch/generate", &batch_generate_body(article_ids, options))
            .await
    }

    async fn batch_status(&self, job_id: &str) -> Result<BatchJobStatus, ApiError> {
        self.get_json(self.endpoint(&format!("batch/status/{job_id}"))?)
            .await
    }

    async fn create_sheet(&self, category_id: Uuid) -> Result<Category, ApiError> {
        self.post_json("sheets/create", &json!({ "category_id": category_id }))
            .await
    }

    async fn link_sheet(
        &self,
        category_id: Uuid,
        sheet_id: &str,
        sheet_url: &str,
    ) -> Result<Category, ApiError> {
        self.post_json(
            "sheets/link",
            &link_sheet_body(category_id, sheet_id, sheet_url),
        )
        .await
    }

    async fn publish_draft(&self, article_id: Uuid) -> Result<Article, ApiError> {
        self.post_json("wordpress/draft", &json!({ "article_id": article_id }))
            .await
    }

    async fn publish(&self, article_id: Uuid) -> Result<Article, ApiError> {
        self.post_json("wordpress/publish", &json!({ "article_id": article_id }))
            .await
    }
}

/// Base URLs are normalized to end with `/` so `Url::join` keeps the final
/// path segment (`http://host/api` + `categories` = `http://host/api/categories`).
fn normalize_base_url(raw: &str) -> Result<Url, ApiError> {
    let mut base = raw.trim_end_matches('/').to_string();
    base.push('/');
    Url::parse(&base).map_err(|err| ApiError::network(format!("invalid base URL '{raw}': {err}")))
}

pub fn create_category_body(name: &str, slug: &str) -> Value {
    json!({ "name": name, "slug": slug })
}

pub fn create_article_body(
    category_id: Uuid,
    keyword: &str,
    prompt_template_id: Option<Uuid>,
) -> Value {
    let mut body = json!({ "category_id": category_id, "keyword": keyword });
    if let Some(template) = prompt_template_id {
        body["prompt_template_id"] = json!(template);
    }
    body
}

pub fn generate_body(article_id: Uuid, options: Option<&GenerateOptions>) -> Value {
    let mut body = json!({ "article_id": article_id });
    if let Some(opts) = options {
        body["options"] = Value::Object(opts.clone());
    }
    body
}

pub fn batch_generate_body(article_ids: &[Uuid], options: Option<&GenerateOptions>) -> Value {
    let mut body = json!({ "article_ids": article_ids });
    if let Some(opts) = options {
        body["options"] = Value::Object(opts.clone());
    }
    body
}

pub fn link_sheet_body(category_id: Uuid, sheet_id: &str, sheet_url: &str) -> Value {
    json!({
        "category_id": category_id,
        "sheet_id": sheet_id,
        "sheet_url": sheet_url,
    })
}

pub fn article_query(
    filter: &ArticleFilter,
    page: u32,
    per_page: u32,
) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::with_capacity(4);
    if let Some(category_id) = filter.category_id {
        pairs.push(("category_id", category_id.to_string()));
    }
    if let Some(status) = filter.status {
        pairs.push(("status", status.as_str().to_string()));
    }
    pairs.push(("page", page.to_string()));
    pairs.push(("per_page", per_page.to_string()));
    pairs
}

fn decode_body<T: DeserializeOwned>(body: &str) -> Result<T, ApiError> {
    // Acks may come back with an empty body.
    let body = if body.trim().is_empty() { "{}" } else { body };
    serde_json::from_str(body)
        .map_err(|err| ApiError::network(format!("invalid response body: {err}")))
}

/// Error responses are expected as `{"detail": string | object}`; anything
/// other than a string detail is treated as absent.
fn parse_detail(body: &str) -> Option<String> {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        #[serde(default)]
        detail: Option<Value>,
    }
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(Value::String(detail)),
        }) => Some(detail),
        _ => None,
    }
}

fn error_from_status(status: u16, body: &str) -> ApiError {
    let detail = parse_detail(body);
    if status == 404 {
        ApiError::NotFound { detail }
    } else {
        ApiError::Request { status, detail }
    }
}
