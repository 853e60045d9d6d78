use std::future::Future;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use agent_core::{ChatEvent, ChatMode, ChatSession, TurnOutcome, TurnStatus};
use anyhow::{bail, Context, Result};
use clap::Args;
use pagelens_core_types::TabId;
use pagelens_inference::{CancellationToken, InferenceClient, StaticCredentials};
use pagelens_snapshot_store::SnapshotStoreBuilder;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Config;
use crate::page_source::FilePage;

const EVENT_BUFFER: usize = 256;

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    /// File holding the page text
    #[arg(long, value_name = "FILE")]
    pub page: PathBuf,

    /// URL reported for the page (defaults to the file URL)
    #[arg(long)]
    pub url: Option<String>,

    /// Title reported for the page (defaults to the file name)
    #[arg(long)]
    pub title: Option<String>,

    /// Tab id the page is attributed to
    #[arg(long, default_value_t = 1)]
    pub tab: i64,

    /// ask (read-only) or agent (may edit the page file)
    #[arg(long)]
    pub mode: Option<ChatMode>,

    /// Model override
    #[arg(long)]
    pub model: Option<String>,

    /// Print model reasoning to stderr
    #[arg(long)]
    pub show_thinking: bool,

    /// Question to ask; omit for an interactive session
    pub question: Vec<String>,
}

pub async fn cmd_ask(args: AskArgs, config: &Config) -> Result<()> {
    let credentials = StaticCredentials::from_env(config.provider.project_id.as_deref())
        .context("Missing inference credentials")?;
    let profile = config.provider_profile()?;
    let client = InferenceClient::new(profile, config.retry.clone(), Arc::new(credentials))
        .context("Failed to create inference client")?;
    let store = SnapshotStoreBuilder::new(config.snapshot.clone()).build();

    let mut loop_config = config.loop_config();
    if let Some(mode) = args.mode {
        loop_config = loop_config.mode(mode);
    }
    if let Some(model) = args.model.as_ref() {
        loop_config = loop_config.model(model.clone());
    }

    let page = Arc::new(FilePage::new(
        args.page.clone(),
        args.url.clone(),
        args.title.clone(),
    ));
    let mut session = ChatSession::new(Arc::new(client), store, page.clone(), loop_config)
        .with_writer(page);
    let tab = TabId(args.tab);
    info!(tab = %tab, page = %args.page.display(), "chat session ready");

    let question = args.question.join(" ");
    if !question.trim().is_empty() {
        let outcome = ask_once(&mut session, tab, &question, args.show_thinking).await?;
        if outcome.status == TurnStatus::Failed {
            let reason = outcome
                .error
                .map(|err| err.to_string())
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Chat turn failed: {}", reason);
        }
        return Ok(());
    }

    eprintln!(
        "Interactive session on {}. Ctrl-C stops a reply, or exits at the prompt; Ctrl-D exits.",
        args.page.display()
    );
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();
        let line = match next_prompt(&mut lines, tokio::signal::ctrl_c()).await? {
            Prompt::Line(line) => line,
            Prompt::Closed => break,
            Prompt::Interrupted => {
                eprintln!();
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        ask_once(&mut session, tab, &line, args.show_thinking).await?;
    }
    Ok(())
}

#[derive(Debug, PartialEq)]
enum Prompt {
    Line(String),
    Closed,
    Interrupted,
}

/// Wait for the next input line, or for `interrupt` to fire first.
async fn next_prompt<R, F>(lines: &mut Lines<R>, interrupt: F) -> Result<Prompt>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => {
            Ok(match line.context("Failed to read stdin")? {
                Some(line) => Prompt::Line(line),
                None => Prompt::Closed,
            })
        }
        signal = interrupt => {
            signal.context("Failed to listen for Ctrl-C")?;
            Ok(Prompt::Interrupted)
        }
    }
}

/// Run one turn, printing answer text to stdout as it streams. Ctrl-C
/// cancels the turn rather than the process.
async fn ask_once(
    session: &mut ChatSession,
    tab: TabId,
    question: &str,
    show_thinking: bool,
) -> Result<TurnOutcome> {
    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });
    let printer = tokio::spawn(print_events(rx, show_thinking));

    let result = session.run_turn(tab, question, tx, cancel).await;
    ctrl_c.abort();
    printer.await.context("Event printer panicked")?;
    Ok(result?)
}

async fn print_events(mut rx: mpsc::Receiver<ChatEvent>, show_thinking: bool) {
    let mut stdout = std::io::stdout();
    while let Some(event) = rx.recv().await {
        match event {
            ChatEvent::TextDelta { text } => {
                print!("{}", text);
                stdout.flush().ok();
            }
            ChatEvent::ThinkingDelta { text } => {
                if show_thinking {
                    eprint!("{}", text);
                }
            }
            ChatEvent::ToolCall {
                name, args, round, ..
            } => {
                eprintln!("[round {}] {} {}", round, name, args);
            }
            ChatEvent::Usage { usage } => {
                eprintln!(
                    "\n[tokens] prompt {} / output {} / thinking {} / total {}",
                    usage.prompt_tokens,
                    usage.output_tokens,
                    usage.thinking_tokens,
                    usage.total_tokens
                );
            }
            ChatEvent::Finish { reason } => {
                if reason != "STOP" {
                    eprintln!("[finish] {}", reason);
                }
            }
            ChatEvent::Error { message } => {
                eprintln!("\n[error] {}", message);
            }
            ChatEvent::TurnComplete { .. } => {
                println!();
            }
        }
    }
}
