//! Interactive question loop on the terminal.

use std::sync::Arc;

use anyhow::{Context, Result};
use nlq_rag::QueryService;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::runtime::Handle;
use tracing::{debug, warn};

const PROMPT: &str = "Question: ";

fn is_exit_command(line: &str) -> bool {
    matches!(line.trim().to_ascii_lowercase().as_str(), "quit" | "exit" | "q")
}

/// Read questions until `quit`, `exit`, `q`, Ctrl-C or EOF, printing each answer.
///
/// The editor blocks, so the loop runs on a blocking thread and drives
/// queries through the current runtime handle.
pub async fn run_chat(service: Arc<QueryService>) -> Result<()> {
    let handle = Handle::current();
    tokio::task::spawn_blocking(move || chat_loop(&handle, &service))
        .await
        .context("chat loop panicked")?
}

/// Add `question` to the line history. A failed write only loses recall.
fn remember(editor: &mut DefaultEditor, question: &str) {
    if let Err(e) = editor.add_history_entry(question) {
        debug!(error = %e, "history entry not recorded");
    }
}

fn chat_loop(handle: &Handle, service: &QueryService) -> Result<()> {
    let mut editor = DefaultEditor::new().context("failed to open terminal")?;
    println!("Ask a question about the data (type 'quit' to exit).");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if is_exit_command(question) {
            break;
        }
        remember(&mut editor, question);

        match handle.block_on(service.query(question, None)) {
            Ok(response) => println!("\nAnswer: {}\n", response.answer),
            Err(e) => {
                warn!(error = %e, "query failed");
                eprintln!("Error: {e}");
            }
        }
    }
    Ok(())
}
