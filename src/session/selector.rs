use crate::error::Result;
use colored::Colorize;
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};

/// Interactive numbered picker over the stored sessions, on stdin/stderr.
pub fn select_session(sessions: &BTreeSet<String>, current: &str) -> Result<Option<String>> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stderr();
    pick_session(sessions, current, &mut input, &mut output)
}

fn pick_session<R: BufRead, W: Write>(
    sessions: &BTreeSet<String>,
    current: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>> {
    if sessions.is_empty() {
        writeln!(output, "{}", "No saved sessions found.".yellow())?;
        return Ok(None);
    }

    writeln!(output, "\n{}", "Select a session:".bright_cyan().bold())?;
    writeln!(output)?;

    let sessions: Vec<&String> = sessions.iter().collect();
    for (i, name) in sessions.iter().enumerate() {
        let marker = if name.as_str() == current {
            " (current)".dimmed().to_string()
        } else {
            String::new()
        };
        writeln!(
            output,
            "  {} {}{}",
            format!("[{}]", i + 1).bright_green().bold(),
            name.bright_white(),
            marker
        )?;
    }

    writeln!(output)?;
    write!(output, "{} ", "Enter number or name (or 'q' to cancel):".dimmed())?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let line = line.trim();

    if line.is_empty() || line == "q" || line == "quit" {
        return Ok(None);
    }

    match line.parse::<usize>() {
        Ok(num) if num > 0 && num <= sessions.len() => Ok(Some(sessions[num - 1].clone())),
        Ok(_) => {
            writeln!(output, "{}", "Invalid selection".red())?;
            Ok(None)
        }
        Err(_) => Ok(Some(line.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn names() -> BTreeSet<String> {
        ["DEFAULT_SESSION", "machine_learning", "rust_dev"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn pick(answer: &str) -> Option<String> {
        let mut input = Cursor::new(answer.as_bytes().to_vec());
        let mut output = Vec::new();
        pick_session(&names(), "rust_dev", &mut input, &mut output).unwrap()
    }

    #[test]
    fn test_pick_by_number() {
        assert_eq!(pick("2\n"), Some("machine_learning".to_string()));
    }

    #[test]
    fn test_pick_by_name() {
        assert_eq!(pick("new_topic\n"), Some("new_topic".to_string()));
    }

    #[test]
    fn test_cancel_and_out_of_range() {
        assert_eq!(pick("q\n"), None);
        assert_eq!(pick("\n"), None);
        assert_eq!(pick("9\n"), None);
    }

    #[test]
    fn test_current_is_marked() {
        let mut input = Cursor::new(b"q\n".to_vec());
        let mut output = Vec::new();
        pick_session(&names(), "rust_dev", &mut input, &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let line = text.lines().find(|l| l.contains("rust_dev")).unwrap();
        assert!(line.contains("(current)"));
    }
}
