//! Line-oriented terminal front end for a [`ChatSession`]

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use super::accumulator::ConversationView;
use super::conversation::{Message, Role};
use super::markdown::extract_code_blocks;
use super::session::{ChatError, ChatSession};

/// Prints the conversation to stdout incrementally.
///
/// Only text not yet on screen is written. Text that arrives for an earlier
/// message (a reply still streaming after a notice) is printed as a
/// continuation.
#[derive(Debug, Default)]
pub struct TerminalView {
    /// Bytes written per message
    written: Vec<usize>,
    /// Message whose line is still open
    open: Option<usize>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget what was printed; the next publish starts from the top
    pub fn reset(&mut self) {
        self.written.clear();
        self.open = None;
    }

    /// Record a message the terminal already shows (typed input)
    pub fn assume_printed(&mut self, content: &str) {
        self.written.push(content.len());
    }

    fn write_messages(&mut self, messages: &[Message], out: &mut impl Write) -> std::io::Result<()> {
        for (idx, message) in messages.iter().enumerate() {
            let len = message.content.len();
            match self.written.get(idx).copied() {
                Some(done) if len <= done => continue,
                Some(done) => {
                    if self.open != Some(idx) {
                        self.close_line(out)?;
                        write!(out, "\n{} (cont.): ", label(message.role))?;
                    }
                    write!(out, "{}", message.content.get(done..).unwrap_or(""))?;
                    self.written[idx] = len;
                }
                None => {
                    self.close_line(out)?;
                    write!(out, "\n{}: {}", label(message.role), message.content)?;
                    self.written.push(len);
                }
            }
            self.open = Some(idx);
        }
        out.flush()
    }

    fn close_line(&mut self, out: &mut impl Write) -> std::io::Result<()> {
        if self.open.take().is_some() {
            writeln!(out)?;
        }
        Ok(())
    }

    /// Close the line left open by the last message written
    pub fn end_turn(&mut self) {
        if self.open.take().is_some() {
            println!();
        }
    }
}

impl ConversationView for TerminalView {
    fn publish(&mut self, messages: &[Message]) {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        if let Err(e) = self.write_messages(messages, &mut out) {
            tracing::warn!(error = %e, "Failed to write to terminal");
        }
    }
}

fn label(role: Role) -> &'static str {
    match role {
        Role::User => "you",
        Role::Assistant => "assistant",
    }
}

enum Command {
    Quit,
    Clear,
    Code(Option<usize>),
    Help,
    Prompt(String),
}

fn parse_command(line: &str) -> Command {
    let trimmed = line.trim();
    let mut parts = trimmed.split_whitespace();
    match parts.next() {
        Some("/quit") | Some("/exit") => Command::Quit,
        Some("/clear") => Command::Clear,
        Some("/help") => Command::Help,
        Some("/code") => Command::Code(parts.next().and_then(|n| n.parse().ok())),
        _ => Command::Prompt(trimmed.to_string()),
    }
}

const HELP: &str = "Commands:
  /clear     start a new conversation
  /code [N]  print code block N (default: all) of the last reply
  /quit      leave";

/// Print the code blocks of the last reply, or block `index` (1-based)
fn print_code(session: &ChatSession, index: Option<usize>) {
    let Some(reply) = session.conversation().last_reply() else {
        println!("No reply yet.");
        return;
    };

    let blocks = extract_code_blocks(&reply.content);
    if blocks.is_empty() {
        println!("No code blocks in the last reply.");
        return;
    }

    match index {
        Some(n) => match n.checked_sub(1).and_then(|i| blocks.get(i)) {
            Some(block) => println!("{}", block.code),
            None => println!("No code block {} (last reply has {}).", n, blocks.len()),
        },
        None => {
            for (i, block) in blocks.iter().enumerate() {
                println!("--- [{}] {}", i + 1, block.language.as_deref().unwrap_or("text"));
                println!("{}", block.code);
            }
        }
    }
}

/// Interactive loop over stdin until `/quit` or end of input
pub async fn run_repl(session: &mut ChatSession) -> Result<(), ChatError> {
    let mut view = TerminalView::new();
    let rendered = session.render().to_vec();
    view.publish(&rendered);
    view.end_turn();

    println!("\nmodel: {}  endpoint: {}  (/help for commands)", session.model(), session.endpoint());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\n> ");
        let _ = std::io::stdout().flush();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                tracing::error!(error = %e, "Failed to read stdin");
                break;
            }
        };

        match parse_command(&line) {
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::Clear => {
                session.clear()?;
                view.reset();
                let rendered = session.render().to_vec();
                view.publish(&rendered);
                view.end_turn();
            }
            Command::Code(index) => print_code(session, index),
            Command::Prompt(prompt) => {
                if !prompt.is_empty() {
                    view.assume_printed(&prompt);
                }
                session.submit(&prompt, &mut view).await?;
                view.end_turn();
            }
        }
    }

    Ok(())
}
