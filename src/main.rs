use anyhow::{bail, Result};
use article_console::api::model::CategoryPatch;
use article_console::api::ApiClient;
use article_console::config;
use article_console::console::Console;
use article_console::editor::Editor;
use article_console::model::{ArticleFilter, ArticleStatus};
use article_console::notify::TermNotifier;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show article status counts and recent categories
    Dashboard,
    /// Category operations
    #[command(subcommand)]
    Category(CategoryCmd),
    /// Article operations
    #[command(subcommand)]
    Article(ArticleCmd),
    /// Batch generation job operations
    #[command(subcommand)]
    Batch(BatchCmd),
    /// Print an example configuration file
    PrintConfig,
}

#[derive(Debug, Subcommand)]
enum CategoryCmd {
    List,
    Create {
        name: String,
        /// Slug; derived from the name when omitted
        #[arg(long)]
        slug: Option<String>,
    },
    Update {
        id: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        slug: Option<String>,
    },
    Delete {
        id: Uuid,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    /// Create a linked spreadsheet for a category
    CreateSheet { id: Uuid },
    /// Link an existing spreadsheet by URL
    LinkSheet { id: Uuid, url: String },
}

#[derive(Debug, Subcommand)]
enum ArticleCmd {
    List {
        #[arg(long)]
        category: Option<Uuid>,
        #[arg(long)]
        status: Option<ArticleStatus>,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        per_page: u32,
    },
    Show { id: Uuid },
    Create {
        #[arg(long)]
        category: Uuid,
        keyword: String,
        #[arg(long)]
        prompt_template: Option<Uuid>,
    },
    /// Edit title/content of a generated article
    Edit {
        id: Uuid,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
    },
    Delete {
        id: Uuid,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
    Generate { id: Uuid },
    Regenerate { id: Uuid },
    BatchGenerate { ids: Vec<Uuid> },
    /// Send to the publishing platform as a draft
    Draft { id: Uuid },
    Publish { id: Uuid },
}

#[derive(Debug, Subcommand)]
enum BatchCmd {
    Status { job_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();

    if matches!(args.command, Command::PrintConfig) {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))?;
    let api = Arc::new(ApiClient::from_config(&cfg)?);
    let console = Console::new(api, cfg.cache_policy(), Arc::new(TermNotifier));

    // Retention sweeper; best-effort housekeeping alongside the command.
    let sweep_cache = console.cache().clone();
    let sweep_interval = Duration::from_secs(cfg.cache.sweep_interval_seconds);
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            let evicted = sweep_cache.evict_idle();
            if evicted > 0 {
                debug!(evicted, "cache sweep");
            }
        }
    });

    match args.command {
        Command::Dashboard => {
            let dashboard = console.dashboard().await?;
            println!("articles: {}", dashboard.breakdown.total);
            for status in ArticleStatus::ALL {
                let count = dashboard.breakdown.count(status);
                if count > 0 {
                    println!("  {:<16} {:>5}  {}", status.as_str(), count, status.label());
                }
            }
            println!("categories: {}", dashboard.total_categories);
            for category in &dashboard.recent_categories {
                println!("  {}  {}", category.slug, category.name);
            }
        }
        Command::Category(cmd) => run_category(&console, cmd).await?,
        Command::Article(cmd) => run_article(&console, cmd).await?,
        Command::Batch(BatchCmd::Status { job_id }) => {
            let status = console.batch_status(&job_id).await?;
            println!("job {}: {}", job_id, status.status);
            if let (Some(completed), Some(total)) = (status.completed, status.total) {
                println!("  {completed}/{total} completed");
            }
            if let Some(failed) = status.failed {
                println!("  {failed} failed");
            }
        }
        Command::PrintConfig => unreachable!("handled above"),
    }

    Ok(())
}

async fn run_category(console: &Console, cmd: CategoryCmd) -> Result<()> {
    match cmd {
        CategoryCmd::List => {
            for category in console.categories().await?.iter() {
                let sheet = category.sheet_url.as_deref().unwrap_or("-");
                println!("{}  {:<24} {:<24} {}", category.id, category.name, category.slug, sheet);
            }
        }
        CategoryCmd::Create { name, slug } => {
            let slug = slug.unwrap_or_else(|| article_console::validate::slugify(&name));
            let category = console.create_category(&name, &slug).await?;
            println!("created category {} ({})", category.slug, category.id);
        }
        CategoryCmd::Update { id, name, slug } => {
            let category = console
                .update_category(id, CategoryPatch { name, slug })
                .await?;
            println!("updated category {}", category.id);
        }
        CategoryCmd::Delete { id, yes } => {
            if !yes {
                bail!("deleting a category is permanent; pass --yes to confirm");
            }
            console.delete_category(id).await?;
            println!("deleted category {id}");
        }
        CategoryCmd::CreateSheet { id } => {
            let category = console.create_sheet(id).await?;
            match category.sheet_url {
                Some(url) => println!("sheet created: {url}"),
                None => println!("sheet created for category {}", category.id),
            }
        }
        CategoryCmd::LinkSheet { id, url } => {
            let category = console.link_sheet(id, &url).await?;
            println!("sheet linked to category {}", category.id);
        }
    }
    Ok(())
}

async fn run_article(console: &Console, cmd: ArticleCmd) -> Result<()> {
    match cmd {
        ArticleCmd::List {
            category,
            status,
            page,
            per_page,
        } => {
            let filter = ArticleFilter {
                category_id: category,
                status,
            };
            let result = console.articles(&filter, page, per_page).await?;
            for article in &result.items {
                println!(
                    "{}  {:<12} {}",
                    article.id,
                    article.status.as_str(),
                    article.title.as_deref().unwrap_or(&article.keyword)
                );
            }
            println!(
                "page {}/{} ({} total)",
                result.page,
                result.total.div_ceil(result.per_page.max(1) as u64),
                result.total
            );
        }
        ArticleCmd::Show { id } => {
            let article = console.article(id).await?;
            println!("id:      {}", article.id);
            println!("keyword: {}", article.keyword);
            println!("status:  {} ({})", article.status.as_str(), article.status.label());
            if let Some(title) = &article.title {
                println!("title:   {title}");
            }
            if let Some(url) = &article.wp_url {
                println!("url:     {url}");
            }
            if let Some(content) = &article.content {
                println!("---\n{content}");
            }
        }
        ArticleCmd::Create {
            category,
            keyword,
            prompt_template,
        } => {
            let article = console
                .create_article(category, &keyword, prompt_template)
                .await?;
            println!("created article {} ({})", article.id, article.status.as_str());
        }
        ArticleCmd::Edit { id, title, content } => {
            let article = console.article(id).await?;
            if !article.is_editable() {
                bail!("article {id} has no content to edit yet");
            }
            let mut editor = Editor::new();
            editor.begin(&article)?;
            if let Some(title) = title {
                editor.set_title(title)?;
            }
            if let Some(content) = content {
                editor.set_content(content)?;
            }
            let patch = editor.start_save()?;
            match console.update_article(id, patch).await {
                Ok(updated) => {
                    editor.saved()?;
                    println!("updated article {}", updated.id);
                }
                Err(err) => {
                    editor.save_failed()?;
                    return Err(err.into());
                }
            }
        }
        ArticleCmd::Delete { id, yes } => {
            if !yes {
                bail!("deleting an article is permanent; pass --yes to confirm");
            }
            console.delete_article(id).await?;
            println!("deleted article {id}");
        }
        ArticleCmd::Generate { id } => {
            let article = console.article(id).await?;
            if !article.can_generate() {
                bail!(
                    "article {id} is {}; only pending articles can be generated",
                    article.status.as_str()
                );
            }
            let ack = console.generate(id, None).await?;
            match ack.job_id {
                Some(job) => println!("generation accepted (job {job})"),
                None => println!("generation accepted"),
            }
        }
        ArticleCmd::Regenerate { id } => {
            let article = console.article(id).await?;
            if !article.can_regenerate() {
                bail!("article {id} has no generated content to regenerate");
            }
            let ack = console.regenerate(id, None).await?;
            match ack.job_id {
                Some(job) => println!("regeneration accepted (job {job})"),
                None => println!("regeneration accepted"),
            }
        }
        ArticleCmd::BatchGenerate { ids } => {
            let ack = console.batch_generate(ids, None).await?;
            match ack.job_id {
                Some(job) => println!("batch accepted (job {job})"),
                None => println!("batch accepted"),
            }
        }
        ArticleCmd::Draft { id } => {
            let article = console.article(id).await?;
            if !article.can_submit_draft() {
                bail!("article {id} cannot be sent as a draft");
            }
            let updated = console.publish_draft(id).await?;
            println!("draft submitted for article {}", updated.id);
        }
        ArticleCmd::Publish { id } => {
            let article = console.article(id).await?;
            if !article.can_publish() {
                bail!("article {id} cannot be published");
            }
            let updated = console.publish(id).await?;
            match updated.wp_url {
                Some(url) => println!("published: {url}"),
                None => println!("published article {}", updated.id),
            }
        }
    }
    Ok(())
}
