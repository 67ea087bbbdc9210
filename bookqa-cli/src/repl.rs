//! Interactive chat loop.

use anyhow::Result;
use bookqa_rag::{ConversationMemory, ConversationalRag};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::warn;

use crate::commands::print_answer;

const PROMPT: &str = "you> ";

const HELP: &str = "Commands: /reset clears the conversation, /history shows it, /exit quits.";

enum Input<'a> {
    Question(&'a str),
    Reset,
    History,
    Help,
    Exit,
    Empty,
}

fn parse(line: &str) -> Input<'_> {
    match line.trim() {
        "" => Input::Empty,
        "/exit" | "/quit" => Input::Exit,
        "/reset" => Input::Reset,
        "/history" => Input::History,
        "/help" => Input::Help,
        question => Input::Question(question),
    }
}

/// Run the chat loop until the user exits. One conversation is kept for the
/// whole session; a failed turn leaves it unchanged.
pub async fn run(rag: &ConversationalRag, with_sources: bool) -> Result<()> {
    let mut editor = DefaultEditor::new()?;
    let mut memory = ConversationMemory::new();

    println!("Ask a question about the book. {HELP}");

    loop {
        let line = match editor.readline(PROMPT) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };

        match parse(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::Help => println!("{HELP}"),
            Input::Reset => {
                memory.clear();
                println!("Conversation cleared.");
            }
            Input::History => {
                if memory.is_empty() {
                    println!("No conversation yet.");
                } else {
                    println!("{}", memory.transcript());
                }
            }
            Input::Question(question) => {
                let _ = editor.add_history_entry(question);
                match rag.ask(question, &mut memory).await {
                    Ok(answer) => print_answer(&answer, with_sources),
                    Err(e) => {
                        warn!(error = %e, "question failed");
                        if e.is_transient() {
                            eprintln!("error: {e} (the question was not recorded; try again)");
                        } else {
                            eprintln!("error: {e}");
                        }
                    }
                }
            }
        }
        println!();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_questions() {
        assert!(matches!(parse("  /exit "), Input::Exit));
        assert!(matches!(parse("/quit"), Input::Exit));
        assert!(matches!(parse("/reset"), Input::Reset));
        assert!(matches!(parse("   "), Input::Empty));
        assert!(matches!(parse(" How do I prevent it? "), Input::Question("How do I prevent it?")));
    }
}
