//! `ask` and `chat` commands

use super::Runtime;
use anyhow::Result;
use colored::Colorize;
use rag_core::chat::RagOrchestrator;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Cancellation token wired to Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received, cancelling in-flight work");
            signal_token.cancel();
        }
    });
    token
}

/// Answer one question and exit.
pub async fn ask(runtime: &Runtime, question: &str) -> Result<()> {
    let pool = runtime.warm_pool().await?;
    let orchestrator = RagOrchestrator::new(
        runtime.memory.clone(),
        pool.clone(),
        runtime.settings.rag.clone(),
    );

    let reply = orchestrator.ask(question, &interrupt_token()).await?;
    println!("{reply}");

    pool.teardown().await;
    Ok(())
}

/// Interactive read-eval loop over stdin, reusing one conversation log.
pub async fn chat(runtime: &Runtime) -> Result<()> {
    let pool = runtime.warm_pool().await?;
    let orchestrator = RagOrchestrator::new(
        runtime.memory.clone(),
        pool.clone(),
        runtime.settings.rag.clone(),
    );

    use std::io::Write;

    println!("{}", "Ask away (exit to quit).".dimmed());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{} ", ">".cyan());
        std::io::stdout().flush()?;

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

        match orchestrator.ask(question, &interrupt_token()).await {
            Ok(reply) => println!("{reply}"),
            Err(err) => eprintln!("{} {err}", "error:".red()),
        }
    }

    pool.teardown().await;
    Ok(())
}
