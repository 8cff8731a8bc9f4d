use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use docqa_core::{
    load_documents_best_effort, Answer, AnswerMode, ChatModelConfig, Downloader, IndexCache,
    IndexOrigin, IngestionReport, OpenAiChatClient, QaSession, RetrievalOptions,
    VectorizerConfig,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "docqa", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Target chunk size in characters
    #[arg(long, env = "DOCQA_CHUNK_SIZE", default_value = "1000")]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP", default_value = "200")]
    chunk_overlap: usize,

    /// Number of nearest chunks to retrieve
    #[arg(long, env = "DOCQA_TOP_K", default_value = "3")]
    top_k: usize,

    /// Character budget for the retrieved context
    #[arg(long, env = "DOCQA_MAX_CONTEXT_CHARS", default_value = "4000")]
    max_context_chars: usize,

    /// Vocabulary size bound for the TF-IDF vectorizer
    #[arg(long, env = "DOCQA_MAX_FEATURES", default_value = "5000")]
    max_features: usize,

    /// Index unigrams only
    #[arg(long, env = "DOCQA_NO_BIGRAMS", default_value_t = false)]
    no_bigrams: bool,

    /// Directory for cached indexes
    #[arg(long, env = "DOCQA_CACHE_DIR")]
    cache_dir: Option<PathBuf>,
}

#[derive(Args, Clone)]
struct SourceArgs {
    /// Document file or folder (pdf, txt, md). Repeatable.
    #[arg(long = "path")]
    paths: Vec<PathBuf>,

    /// Document URL, Google Drive share links included. Repeatable.
    #[arg(long = "url")]
    urls: Vec<String>,
}

#[derive(Args, Clone)]
struct ModelArgs {
    /// How questions are answered.
    #[arg(long, value_enum, default_value_t = Mode::Keyword)]
    mode: Mode,

    /// API key for the chat-completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Chat model name
    #[arg(long, env = "DOCQA_MODEL", default_value = "gpt-3.5-turbo")]
    model: String,

    /// Base URL of an OpenAI-compatible API
    #[arg(long, env = "DOCQA_API_BASE", default_value = "https://api.openai.com/v1")]
    api_base: String,

    #[arg(long, default_value = "0.2")]
    temperature: f32,

    #[arg(long, default_value = "512")]
    max_tokens: u32,

    /// Request timeout in seconds
    #[arg(long, default_value = "60")]
    timeout_secs: u64,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    /// Literal keyword scoring over document sentences.
    Keyword,
    /// Templated answer around keyword matches, no remote call.
    Simulated,
    /// Print the retrieved TF-IDF context.
    Retrieval,
    /// Send the retrieved context to the chat-completion API.
    Llm,
}

impl From<Mode> for AnswerMode {
    fn from(value: Mode) -> Self {
        match value {
            Mode::Keyword => AnswerMode::Keyword,
            Mode::Simulated => AnswerMode::Simulated,
            Mode::Retrieval => AnswerMode::Retrieval,
            Mode::Llm => AnswerMode::Llm,
        }
    }
}

impl Mode {
    fn needs_index(self) -> bool {
        matches!(self, Mode::Retrieval | Mode::Llm)
    }
}

#[derive(Subcommand)]
enum Command {
    /// Load documents, build the TF-IDF index and report what was indexed.
    Index {
        #[command(flatten)]
        sources: SourceArgs,
    },
    /// Answer a single question over the documents.
    Ask {
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        model: ModelArgs,
        /// Question to answer
        #[arg(long)]
        question: String,
    },
    /// Answer questions read line by line from stdin.
    Chat {
        #[command(flatten)]
        sources: SourceArgs,
        #[command(flatten)]
        model: ModelArgs,
    },
}

impl Cli {
    fn retrieval_options(&self) -> RetrievalOptions {
        RetrievalOptions {
            chunk_size: self.chunk_size,
            chunk_overlap: self.chunk_overlap,
            top_k: self.top_k,
            max_context_chars: self.max_context_chars,
            vectorizer: VectorizerConfig {
                max_features: Some(self.max_features),
                include_bigrams: !self.no_bigrams,
                remove_stop_words: true,
            },
        }
    }
}

async fn load_sources(sources: &SourceArgs) -> anyhow::Result<IngestionReport> {
    if sources.paths.is_empty() && sources.urls.is_empty() {
        bail!("provide at least one --path or --url");
    }

    let mut report = load_documents_best_effort(&sources.paths);

    let downloader = Downloader::default();
    for url in &sources.urls {
        match downloader.fetch(url).await {
            Ok(document) => report.documents.push(document),
            Err(error) => report.skip(url.clone(), &error),
        }
    }

    for skipped in &report.skipped_files {
        println!("skipped {}: {}", skipped.source, skipped.reason);
    }

    if report.documents.is_empty() {
        bail!("no documents could be loaded (all sources were skipped)");
    }

    Ok(report)
}

fn open_session(
    cli: &Cli,
    report: IngestionReport,
) -> anyhow::Result<QaSession<OpenAiChatClient>> {
    let mut session = QaSession::new(cli.retrieval_options())?;
    if let Some(dir) = &cli.cache_dir {
        session = session.with_cache(IndexCache::new(dir));
    }
    session.add_documents(report.documents);
    Ok(session)
}

fn attach_model(
    session: QaSession<OpenAiChatClient>,
    args: &ModelArgs,
) -> anyhow::Result<QaSession<OpenAiChatClient>> {
    if !matches!(args.mode, Mode::Llm) {
        return Ok(session);
    }

    let config = ChatModelConfig {
        api_base: args.api_base.clone(),
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        timeout: Duration::from_secs(args.timeout_secs),
    };
    let api_key = args
        .api_key
        .clone()
        .context("llm mode needs --api-key or OPENAI_API_KEY")?;

    Ok(session.with_chat_model(OpenAiChatClient::new(api_key, config)?))
}

fn print_answer(answer: &Answer) {
    println!("{}", answer.text.trim_end());
    if !answer.sources.is_empty() {
        println!("sources: {}", answer.sources.join(", "));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    cli.retrieval_options().validate()?;

    info!(
        version = app_version,
        started_at = %Utc::now().to_rfc3339(),
        "docqa boot"
    );

    match &cli.command {
        Command::Index { sources } => {
            let report = load_sources(sources).await?;
            let document_count = report.documents.len();
            let skipped = report.skipped_files.len();

            let mut session = open_session(&cli, report)?;
            let origin = session.build_index()?;
            let chunk_count = session.index().map(|index| index.len()).unwrap_or_default();
            let vocabulary = session
                .index()
                .map(|index| index.vectorizer().vocabulary_size())
                .unwrap_or_default();

            println!(
                "{document_count} document(s), {chunk_count} chunk(s), {vocabulary} term(s) indexed{} at {}",
                if origin == IndexOrigin::Cache { " (cached)" } else { "" },
                Utc::now().to_rfc3339()
            );
            if skipped > 0 {
                warn!(skipped, "some sources were skipped");
            }
        }
        Command::Ask {
            sources,
            model,
            question,
        } => {
            let report = load_sources(sources).await?;
            let mut session = attach_model(open_session(&cli, report)?, model)?;
            if model.mode.needs_index() {
                session.build_index()?;
            }

            let answer = session.ask(question, model.mode.into()).await?;
            print_answer(&answer);
        }
        Command::Chat { sources, model } => {
            let report = load_sources(sources).await?;
            let mut session = attach_model(open_session(&cli, report)?, model)?;
            if model.mode.needs_index() {
                session.build_index()?;
            }

            println!(
                "{} document(s) loaded. Ask a question, or type `exit` to quit.",
                session.documents().len()
            );

            let mut stdout = tokio::io::stdout();
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                stdout.write_all(b"> ").await?;
                stdout.flush().await?;

                let Some(line) = lines.next_line().await? else {
                    break;
                };
                let question = line.trim();
                if question.is_empty() {
                    continue;
                }
                if question.eq_ignore_ascii_case("exit") || question.eq_ignore_ascii_case("quit") {
                    break;
                }

                match session.ask(question, model.mode.into()).await {
                    Ok(answer) => print_answer(&answer),
                    Err(error) => {
                        warn!(%error, "question failed");
                        println!("Sorry, I encountered an error: {error}");
                    }
                }
            }
        }
    }

    Ok(())
}
