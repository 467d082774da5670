use std::env;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use tutorrag_core::config::{expand_path, Config};
use tutorrag_core::data_processor::DataProcessor;
use tutorrag_embed::{get_default_embedder, get_default_reranker};
use tutorrag_hybrid::{HybridRetriever, RagSystem, RetrievalFilters, RetrieverOptions};

const USAGE: &str = "Usage: tutorrag <ingest [docs_dir] | query \"<text>\" [--k N] [--alpha A] [--source S] [--no-rerank] [--json] | stats>";

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (cmd, args)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") { pb.set_style(style); }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

fn flag_value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> anyhow::Result<&'a str> {
    *i += 1;
    args.get(*i).map(String::as_str).ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut settings = config.settings()?;
    let (cmd, args) = parse_args();
    match cmd.as_str() {
        "ingest" => {
            let docs_dir = args.first().map(PathBuf::from).unwrap_or_else(|| expand_path(&settings.paths.docs_dir));
            let pb = spinner(&format!("Chunking {}", docs_dir.display()));
            let documents = DataProcessor::with_config(settings.chunking.clone()).process_directory(&docs_dir)?;
            pb.set_message(format!("Embedding and indexing {} chunks", documents.len()));
            let embedder = get_default_embedder(&settings.embedding)?;
            let reranker = get_default_reranker(&settings.reranker, settings.embedding.use_fake).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "reranker unavailable");
                None
            });
            let cache_dir = expand_path(&settings.paths.cache_dir);
            let retriever = HybridRetriever::new(embedder, reranker, RetrieverOptions::from_settings(&settings, Some(cache_dir.clone())));
            let count = documents.len();
            retriever.ingest(documents)?;
            pb.finish_with_message(format!("Ingested {} chunks into {}", count, cache_dir.display()));
            println!("{}", serde_json::to_string_pretty(&retriever.statistics())?);
        }
        "query" => {
            let Some(query) = args.first().cloned() else { eprintln!("{USAGE}"); std::process::exit(1) };
            let mut json = false;
            let mut source = None;
            let mut k = None;
            let mut alpha = None;
            let mut i = 1;
            while i < args.len() {
                match args[i].as_str() {
                    "--k" | "-k" => k = Some(flag_value(&args, &mut i, "--k")?.parse::<usize>()?),
                    "--alpha" => alpha = Some(flag_value(&args, &mut i, "--alpha")?.parse::<f32>()?),
                    "--source" => source = Some(flag_value(&args, &mut i, "--source")?.to_string()),
                    "--no-rerank" => settings.retrieval.use_reranking = false,
                    "--json" => json = true,
                    other => { eprintln!("Unknown option: {other}\n{USAGE}"); std::process::exit(1); }
                }
                i += 1;
            }
            let system = RagSystem::open(settings)?;
            let mut options = system.default_options();
            if let Some(k) = k { options = options.with_k(k); }
            if let Some(alpha) = alpha { options = options.with_alpha(alpha); }
            if let Some(source) = source { options = options.with_filters(RetrievalFilters::by_source(source)); }
            let ctx = system.retrieve(&query, &options)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&ctx)?);
            } else if ctx.is_empty() {
                println!("No results for {:?}", query);
            } else {
                println!("{}\n", ctx.context);
                println!("Sources: {}", ctx.citations.join(" "));
            }
        }
        "stats" => {
            let system = RagSystem::open(settings)?;
            println!("{}", serde_json::to_string_pretty(&system.statistics())?);
        }
        _ => { eprintln!("Unknown command: {}\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}
