//! gateway-cli：通过网关发送对话、估算 Token、查看缓存的命令行工具
//!
//! Usage:
//!   gateway-cli dispatch <conversation.json> [OPTIONS]   Send a conversation
//!   gateway-cli embed <text> [OPTIONS]                   Embed a piece of text
//!   gateway-cli tokens <conversation.json> <model>       Estimate prompt tokens
//!   gateway-cli cache-info [<path>]                      Inspect a cache file
//!   gateway-cli providers [OPTIONS]                      List registered providers

use anyhow::{bail, Context};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use llm_gateway::cache::{CacheBackend, FileCache};
use llm_gateway::config::{GatewayConfig, DEFAULT_CACHE_FILE};
use llm_gateway::{tokens, Conversation, Dispatcher};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "dispatch" => cmd_dispatch(&args[2..]).await,
        "embed" => cmd_embed(&args[2..]).await,
        "tokens" => cmd_tokens(&args[2..]),
        "cache-info" => cmd_cache_info(&args[2..]).await,
        "providers" => cmd_providers(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("gateway-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"gateway-cli：LLM 网关命令行工具

USAGE:
    gateway-cli <COMMAND> [OPTIONS]

COMMANDS:
    dispatch <conversation.json>    Send a conversation and print the reply
    embed <text>                    Print the embedding vector of <text>
    tokens <conversation.json> <model>
                                    Estimate the prompt size of a conversation
    cache-info [<path>]             Show the number of cached responses
    providers                       List registered providers and the active one
    version                         Show version information
    help                            Show this help message

OPTIONS:
    --config <file>                 YAML configuration file
    --set <key>=<value>             Force a configuration value (repeatable)
    --provider <id>                 Use this provider instead of the configured one
    --model <name>                  Override the requested model

ENVIRONMENT:
    LLM_GATEWAY_PROVIDER, OPENAI_API_KEY, OPENAI_BASE_URL, AZURE_OPENAI_ENDPOINT,
    AZURE_OPENAI_KEY, AZURE_API_VERSION, OLLAMA_BASE_URL, OLLAMA_MODEL,
    LLM_GATEWAY_CACHE, LLM_GATEWAY_CACHE_FILE, RUST_LOG"#
    );
}

fn flag_values<'a>(args: &'a [String], flag: &str) -> Vec<&'a str> {
    args.iter()
        .enumerate()
        .filter(|(_, a)| a.as_str() == flag)
        .filter_map(|(i, _)| args.get(i + 1).map(String::as_str))
        .collect()
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    flag_values(args, flag).last().copied()
}

/// File, then environment, then `--set` / `--provider` forcing.
fn load_config(args: &[String]) -> anyhow::Result<GatewayConfig> {
    let mut config = match flag_value(args, "--config") {
        Some(path) => GatewayConfig::from_yaml_file(path)?,
        None => GatewayConfig::default(),
    };
    config.apply_env()?;
    for assignment in flag_values(args, "--set") {
        let (key, value) = assignment
            .split_once('=')
            .with_context(|| format!("--set expects key=value, got '{assignment}'"))?;
        config.force(key.trim(), value)?;
    }
    if let Some(provider) = flag_value(args, "--provider") {
        config.force("provider", provider)?;
    }
    config.validate()?;
    Ok(config)
}

fn read_conversation(path: &Path) -> anyhow::Result<Conversation> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of messages", path.display()))
}

async fn cmd_dispatch(args: &[String]) -> anyhow::Result<()> {
    let Some(path) = args.first() else {
        bail!("dispatch requires a conversation file");
    };
    let conversation = read_conversation(Path::new(path))?;
    let config = load_config(args)?;

    let mut params = config.request_defaults()?;
    if let Some(model) = flag_value(args, "--model") {
        params = params.with_model(model);
    }

    let dispatcher = Dispatcher::from_config(&config)?;
    let reply = dispatcher.dispatch(&conversation, &params).await?;
    println!("{}", reply.content.to_text());
    if let Some(usage) = &reply.usage {
        eprintln!(
            "model: {}  tokens: {} prompt + {} completion",
            reply.model, usage.prompt_tokens, usage.completion_tokens
        );
    }
    if let Some(cache) = dispatcher.cache() {
        let stats = cache.stats();
        eprintln!("cache: {} hit(s), {} write(s)", stats.hits, stats.writes);
    }
    Ok(())
}

async fn cmd_embed(args: &[String]) -> anyhow::Result<()> {
    let Some(text) = args.first() else {
        bail!("embed requires the text to embed");
    };
    let config = load_config(args)?;
    let dispatcher = Dispatcher::from_config(&config)?;
    let vector = dispatcher.embed(text).await?;
    println!("{}", serde_json::to_string(&vector)?);
    Ok(())
}

fn cmd_tokens(args: &[String]) -> anyhow::Result<()> {
    let (Some(path), Some(model)) = (args.first(), args.get(1)) else {
        bail!("tokens requires a conversation file and a model");
    };
    let conversation = read_conversation(Path::new(path))?;
    let count = tokens::estimate(&conversation, model)?;
    println!("{count}");
    Ok(())
}

async fn cmd_cache_info(args: &[String]) -> anyhow::Result<()> {
    let path = args
        .first()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_FILE));
    let cache = FileCache::new(&path);
    let entries = cache.len().await?;
    println!("{}: {} cached response(s)", path.display(), entries);
    Ok(())
}

fn cmd_providers(args: &[String]) -> anyhow::Result<()> {
    let config = load_config(args)?;
    let dispatcher = Dispatcher::from_config(&config)?;
    let registry = dispatcher.registry();
    let active = registry.active_id();
    for id in registry.ids() {
        let marker = if id == active { "*" } else { " " };
        println!("{marker} {id}");
    }
    Ok(())
}
