//! docsearch search - Run a query through the coordinator
//!
//! Uses the local engine when the network policy allows it and the engine
//! finishes its handshake in time; otherwise races the remote legs.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use colored::Colorize;
use serde_json::json;
use tracing::{debug, info};

use crate::app::AppContext;
use crate::cli::output;
use crate::config::ChannelKind;
use crate::engine::{ConfigProbe, Credentials, EngineHost, EngineLink, EngineOptions, open_channel};
use crate::error::{DocsError, Result};
use crate::remote::HttpRemote;
use crate::search::{ReducerVariant, SearchCoordinator, SearchResult, SearchState, SearchStore};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Search query
    pub query: String,

    /// Only use the local engine
    #[arg(long, conflicts_with = "remote_only")]
    pub local_only: bool,

    /// Skip the local engine and query the remote backend
    #[arg(long)]
    pub remote_only: bool,

    /// How long to wait for the local engine handshake (milliseconds)
    #[arg(long, default_value = "2000")]
    pub engine_timeout_ms: u64,
}

pub fn run(ctx: &AppContext, args: &SearchArgs) -> Result<()> {
    if args.query.trim().is_empty() {
        return Err(DocsError::InvalidQuery("query must not be empty".to_string()));
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let state = runtime.block_on(search(ctx, args))?;
    display_state(ctx, args, &state)
}

async fn search(ctx: &AppContext, args: &SearchArgs) -> Result<SearchState> {
    let config = &ctx.config;
    let use_engine = config.engine.enabled && !args.remote_only;

    let remote = if args.local_only {
        None
    } else if config.remote.is_configured() {
        Some(HttpRemote::from_config(&config.remote)?)
    } else {
        debug!("remote backend not configured");
        None
    };

    if !use_engine && remote.is_none() {
        return Err(DocsError::MissingConfig(
            "no search backend: enable [engine] or configure [remote]".to_string(),
        ));
    }

    let variant = if args.local_only {
        ReducerVariant::LocalOnly
    } else {
        ReducerVariant::RemoteFallback
    };
    let store = Arc::new(SearchStore::new(variant));

    let coordinator = if use_engine {
        let options = EngineOptions::from_config(config);
        let kind = config.engine.channel;
        let shared = match kind {
            ChannelKind::Shared => Some(EngineHost::spawn_shared(options.clone())?),
            ChannelKind::Dedicated => None,
        };
        let probe = ConfigProbe::new(config.network.clone());
        let credentials = Credentials::from(&config.remote);

        let coordinator = SearchCoordinator::with_engine(store, remote, |replies| {
            EngineLink::start(
                &probe,
                move || open_channel(kind, options, shared.as_ref()),
                credentials,
                replies,
            )
        });

        if let Some(engine) = coordinator.engine().filter(|engine| !engine.skip_engine()) {
            let timeout = Duration::from_millis(args.engine_timeout_ms);
            match tokio::time::timeout(timeout, engine.wait_ready()).await {
                Ok(Ok(())) => info!("local engine ready"),
                Ok(Err(err)) => info!(error = %err, "local engine unavailable"),
                Err(_) => info!(timeout_ms = args.engine_timeout_ms, "local engine not ready in time"),
            }
        }
        coordinator
    } else {
        SearchCoordinator::new(store, remote)
    };

    coordinator.search(&args.query);
    coordinator.settled().await;
    Ok(coordinator.store().state())
}

fn display_state(ctx: &AppContext, args: &SearchArgs, state: &SearchState) -> Result<()> {
    if ctx.json {
        return output::emit_json(&json!({
            "query": args.query,
            "count": state.results().len(),
            "state": state,
        }));
    }

    match state {
        SearchState::Error => {
            println!(
                "{} Search for '{}' failed (run with -v for details)",
                "✗".red(),
                args.query.cyan()
            );
        }
        SearchState::Results { results } | SearchState::Stale { results } => {
            println!(
                "{} results for '{}':",
                results.len().to_string().bold(),
                args.query.cyan()
            );
            println!();
            for (i, result) in results.iter().enumerate() {
                print_result(i + 1, result);
            }
        }
        _ => {
            println!(
                "{} No documentation found for '{}'",
                "!".yellow(),
                args.query.cyan()
            );
        }
    }
    Ok(())
}

fn print_result(rank: usize, result: &SearchResult) {
    println!(
        "{} {} {}",
        format!("{rank}.").dimmed(),
        result.title.bold(),
        format!("[{}]", result.page_type.as_str()).dimmed()
    );
    println!("   {}", result.path.blue());
    if let Some(description) = &result.description {
        println!("   {description}");
    }
    for heading in result.headings.iter().flatten() {
        println!("   {} {}#{}", "›".dimmed(), heading.title, heading.slug.dimmed());
    }
    println!();
}
