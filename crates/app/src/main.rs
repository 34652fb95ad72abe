mod routes;

use book_qa_core::{
    explain_section, AnswerRequest, AnswerService, DocumentTree, IndexingOptions, QueryContext,
    QueryMode, ScoringOptions,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use routes::{cors_layer, router, AppState};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "book-qa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Root folder of the markdown book.
    #[arg(long, env = "BOOK_QA_DOCS_DIR", default_value = "docs", global = true)]
    docs_dir: PathBuf,

    /// Number of ranked sections an answer is built from.
    #[arg(long, env = "BOOK_QA_TOP_K", default_value = "5", global = true)]
    top_k: usize,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the question endpoint over HTTP.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "BOOK_QA_BIND_ADDR", default_value = "127.0.0.1:8000")]
        bind: String,
        /// Build the index before accepting requests.
        #[arg(long, default_value_t = false)]
        warm: bool,
        /// Origins the docs-site widget is served from; `*` allows any.
        #[arg(
            long = "cors-origin",
            env = "BOOK_QA_CORS_ORIGINS",
            value_delimiter = ',',
            default_value = "*"
        )]
        cors_origins: Vec<String>,
    },
    /// Answer one question and print it.
    Ask {
        /// The question.
        #[arg(long)]
        query: String,
        /// book_scope or selected_text_only.
        #[arg(long, default_value = "book_scope")]
        mode: String,
        /// Module the reader is currently viewing.
        #[arg(long)]
        module: Option<String>,
        /// Text the reader highlighted.
        #[arg(long)]
        selected_text: Option<String>,
        /// Print per-rule scores for every ranked section.
        #[arg(long, default_value_t = false)]
        explain: bool,
    },
    /// Build the index once and report what was indexed.
    Index,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let tree = DocumentTree::new(&cli.docs_dir, IndexingOptions::default());
    let service = Arc::new(AnswerService::new(
        tree,
        ScoringOptions { top_k: cli.top_k },
    ));
    info!(
        version = app_version,
        docs_dir = %cli.docs_dir.display(),
        started_at = %Utc::now().to_rfc3339(),
        "book-qa boot"
    );

    match cli.command {
        Command::Serve {
            bind,
            warm,
            cors_origins,
        } => {
            if warm {
                let index = service.ensure_ready().await?;
                info!(sections = index.sections.len(), "index warmed");
            }

            let app = router(
                AppState {
                    service: Arc::clone(&service),
                },
                cors_layer(&cors_origins)?,
            );
            let listener = tokio::net::TcpListener::bind(&bind).await?;
            info!(bind = %bind, cors_origins = ?cors_origins, "server listening");
            axum::serve(listener, app).await?;
        }
        Command::Ask {
            query,
            mode,
            module,
            selected_text,
            explain,
        } => {
            let request = AnswerRequest {
                query,
                mode: mode.parse::<QueryMode>()?,
                selected_text,
                module,
            };

            let answer = service.answer(&request).await?;
            println!("{}", answer.text);
            if !answer.sources.is_empty() {
                println!();
                println!("sources: {}", answer.sources.join(" | "));
            }

            if explain {
                let context = QueryContext::new(&request.query, request.module.as_deref());
                for hit in service
                    .search(&request.query, request.module.as_deref())
                    .await?
                {
                    println!(
                        "explain: score={} section={} file={}",
                        hit.score, hit.section.section_path, hit.section.file
                    );
                    for (rule, points) in explain_section(&context, &hit.section) {
                        println!("  {rule}={points}");
                    }
                }
            }
        }
        Command::Index => {
            let index = service.ensure_ready().await?;

            for skipped in &index.skipped_files {
                warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped document");
            }

            println!(
                "{} sections indexed from {} at {}",
                index.sections.len(),
                cli.docs_dir.display(),
                index.built_at.to_rfc3339()
            );
            if !index.skipped_files.is_empty() {
                println!("{} documents skipped", index.skipped_files.len());
            }
        }
    }

    Ok(())
}
