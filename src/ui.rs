use crate::error::AgError;
use crate::markdown::MarkdownStyler;
use crate::session::{Role, Session};
use chrono::Local;
use colored::Colorize;
use crossterm::cursor::{Hide, MoveToColumn, Show};
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};

/// Message severity levels for consistent UI feedback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MessageSeverity {
    Warning,
    Error,
    Info,
    Success,
}

impl MessageSeverity {
    pub fn prefix(&self) -> colored::ColoredString {
        match self {
            Self::Warning => "Warning:".bright_yellow().bold(),
            Self::Error => "Error:".bright_red().bold(),
            Self::Info => "Info:".bright_cyan().bold(),
            Self::Success => "Success:".bright_green().bold(),
        }
    }
}

pub fn write_message<W: Write>(
    out: &mut W,
    severity: MessageSeverity,
    message: &str,
) -> io::Result<()> {
    writeln!(out, "{} {}", severity.prefix(), message)
}

pub fn print_error_with_hint(error: &AgError) {
    eprintln!("{} {}", MessageSeverity::Error.prefix(), error);
    if let Some(hint) = error.hint() {
        eprintln!("  {} {}", "Hint:".bright_cyan(), hint);
    }
}

/// Returns the cursor to column 0 and clears the line.
pub fn erase_line<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))
}

pub fn hide_cursor<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, Hide)?;
    out.flush()
}

pub fn show_cursor<W: Write>(out: &mut W) -> io::Result<()> {
    queue!(out, Show)?;
    out.flush()
}

/// Replays a stored conversation, styling assistant answers like live output.
pub fn display_session<W: Write>(session: &Session, plain: bool, out: &mut W) -> io::Result<()> {
    if session.messages.is_empty() {
        writeln!(out, "{}", "no message yet.".dimmed())?;
        return Ok(());
    }

    let mut styler = MarkdownStyler::new(plain);
    for message in &session.messages {
        match message.role {
            Role::User => {
                writeln!(
                    out,
                    "🙋 {} {}",
                    "You:".bright_green().bold(),
                    message.content.trim_end().bright_black().bold()
                )?;
                writeln!(out, "{}", "=".repeat(100).dimmed())?;
            }
            Role::Assistant => {
                let date = message
                    .timestamp
                    .with_timezone(&Local)
                    .format("%a %b %e %H:%M:%S %Y");
                let model = message.model.as_deref().unwrap_or("unknown");
                writeln!(
                    out,
                    "🤖{}{}:",
                    format!("({})", model).yellow().bold(),
                    format!("[{}]", date).yellow().italic()
                )?;

                styler.reset();
                for line in message.content.split('\n') {
                    writeln!(out, "{}", styler.style(line))?;
                }
                writeln!(out, "{}", "*".repeat(100).dimmed())?;
                writeln!(out)?;
            }
        }
    }

    out.flush()
}
