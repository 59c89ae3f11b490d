//! Wiring from configuration to running services, and the three run modes.

use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use fd_backend::{
    build_http_client, AgentClient, AgentGateway, GatewayError, RecordKeyMatcher, RecordStore,
    ResponseInterpreter,
};
use fd_protocol::QuerySpec;
use log::{error, info};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::SearchArgs;
use crate::config::{Config, ConfigError};
use crate::engine::RecordQueryEngine;
use crate::render::{render_message, render_page, render_summary};
use crate::session::ChatSession;
use crate::style::Style;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// What the ask and chat modes need: the agent and the reply interpreter.
/// The record store is not configured or contacted.
pub struct AgentServices {
    pub agent: AgentGateway,
    pub interpreter: ResponseInterpreter,
}

impl AgentServices {
    pub fn connect(config: &Config) -> Result<Self, AppError> {
        let endpoint = config
            .agent
            .endpoint
            .clone()
            .ok_or(ConfigError::Missing("agent.endpoint"))?;

        let http = build_http_client()?;
        let credentials = Arc::new(config.identity.credential_provider(&http)?);
        info!("agent configured (endpoint={endpoint})");

        Ok(Self {
            agent: AgentGateway::new(http, endpoint, credentials)
                .with_timeout(Duration::from_secs(config.agent.timeout_secs)),
            interpreter: ResponseInterpreter::new(RecordKeyMatcher::new(&config.agent.record_keys)),
        })
    }
}

/// The record store for the search mode. The agent endpoint is not required.
pub fn connect_store(config: &Config) -> Result<RecordStore, AppError> {
    let endpoint = config
        .store
        .endpoint
        .clone()
        .ok_or(ConfigError::Missing("store.endpoint"))?;

    let http = build_http_client()?;
    let credentials = Arc::new(config.identity.credential_provider(&http)?);
    info!("record store configured (endpoint={endpoint})");

    Ok(RecordStore::new(http, endpoint, credentials)
        .with_timeout(Duration::from_secs(config.store.timeout_secs)))
}

/// Ask once, print the reply on stdout. Returns the process exit code.
pub async fn run_ask(config: &Config, prompt: &str) -> i32 {
    let services = match AgentServices::connect(config) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };
    let style = Style::for_terminal(std::io::stdout().is_terminal());
    let mut session = ChatSession::new(services.agent, services.interpreter);

    match session.submit(prompt).await {
        Ok(message) => {
            println!("{}", render_message(message, &style));
            0
        }
        Err(e) => {
            let err_style = Style::for_terminal(std::io::stderr().is_terminal());
            eprintln!("{}", err_style.error(&e.user_message()));
            error!("{e}");
            1
        }
    }
}

/// Line-oriented chat on a terminal until `/quit` or end of input.
pub async fn run_chat(config: &Config) -> i32 {
    let services = match AgentServices::connect(config) {
        Ok(s) => s,
        Err(e) => return report(&e),
    };
    let session = ChatSession::new(services.agent, services.interpreter);
    let style = Style::for_terminal(true);
    chat_loop(session, &style).await;
    0
}

async fn chat_loop<A: AgentClient>(mut session: ChatSession<A>, style: &Style) {
    println!("{}", style.dim("Ask about the fleet. /clear starts over, /quit exits."));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("{} ", style.accent(">"));
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("failed to read input: {e}");
                break;
            }
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("{}", style.dim("Conversation cleared."));
                continue;
            }
            prompt => {
                println!("{}", style.dim("thinking..."));
                match session.submit(prompt).await {
                    Ok(message) => println!("{}\n", render_message(message, style)),
                    Err(e) => println!("{}\n", style.error(&e.user_message())),
                }
            }
        }
    }
}

/// Fetch the inventory and print one page or the summary.
pub async fn run_search(config: &Config, args: &SearchArgs) -> i32 {
    let store = match connect_store(config) {
        Ok(store) => store,
        Err(e) => return report(&e),
    };
    let style = Style::for_terminal(std::io::stdout().is_terminal());

    let records = match store.fetch_all().await {
        Ok(records) => records,
        Err(e) => return report(&AppError::Gateway(e)),
    };
    let mut engine = RecordQueryEngine::new();
    engine.load(records);

    let page_index = args.page.saturating_sub(1);
    let spec = query_spec(args, config.query.page_size);
    if args.summary {
        println!("{}", render_summary(&engine.summarize(&spec), &style));
    } else {
        println!("{}", render_page(&engine.query(&spec), page_index, &style));
    }
    0
}

/// Turn typed search flags into an engine query.
pub fn query_spec(args: &SearchArgs, default_page_size: usize) -> QuerySpec {
    let mut spec = QuerySpec::new();
    if let Some(text) = &args.text {
        spec = spec.with_text(text.clone());
    }
    for (field, value) in &args.filters {
        spec = spec.with_filter(*field, value.clone());
    }
    if let Some(sort) = args.sort {
        spec = spec.sorted_by(sort.field, sort.descending);
    }
    spec.with_page(
        args.page.saturating_sub(1),
        args.size.unwrap_or(default_page_size),
    )
}

fn report(err: &AppError) -> i32 {
    let style = Style::for_terminal(std::io::stderr().is_terminal());
    let text = match err {
        AppError::Gateway(e) => e.user_message(),
        other => other.to_string(),
    };
    eprintln!("{} {text}", style.error("error:"));
    error!("{err}");
    1
}
