use colored::Colorize;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*```").unwrap());
static HEADING_MAJOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{1,3}\s+(.+)$").unwrap());
static HEADING_MINOR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{4,}\s+(.+)$").unwrap());
static LINK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[(.*?)\]\((.*?)\)").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*(.*?)\*\*").unwrap());
static ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*(.*?)\*").unwrap());

/// Styles one line of markdown for the terminal.
///
/// `inside_fence` is the only state carried between lines; the returned flag
/// is the value to pass with the next line. Input that matches nothing is
/// returned verbatim.
pub fn style_line(line: &str, inside_fence: bool) -> (String, bool) {
    if FENCE.is_match(line) {
        return (code(line), !inside_fence);
    }
    if inside_fence {
        return (code(line), true);
    }

    if let Some(caps) = HEADING_MAJOR.captures(line) {
        return (caps[1].yellow().bold().to_string(), false);
    }
    if let Some(caps) = HEADING_MINOR.captures(line) {
        return (caps[1].green().bold().to_string(), false);
    }

    let text = LINK.replace_all(line, |caps: &Captures| {
        format!(
            "{}{}",
            format!("[{}]", &caps[1]).red(),
            format!("({})", &caps[2]).blue().italic()
        )
    });
    let text = BOLD.replace_all(&text, |caps: &Captures| caps[1].bold().to_string());
    let text = ITALIC.replace_all(&text, |caps: &Captures| caps[1].italic().to_string());

    (text.into_owned(), false)
}

fn code(line: &str) -> String {
    line.green().italic().to_string()
}

/// Line-at-a-time styler holding the fence flag for one response.
#[derive(Debug, Default)]
pub struct MarkdownStyler {
    inside_fence: bool,
    plain: bool,
}

impl MarkdownStyler {
    pub fn new(plain: bool) -> Self {
        Self {
            inside_fence: false,
            plain,
        }
    }

    pub fn style(&mut self, line: &str) -> String {
        if self.plain {
            return line.to_string();
        }
        let (styled, inside_fence) = style_line(line, self.inside_fence);
        self.inside_fence = inside_fence;
        styled
    }

    pub fn inside_fence(&self) -> bool {
        self.inside_fence
    }

    /// Forgets an unterminated fence before styling the next response.
    pub fn reset(&mut self) {
        self.inside_fence = false;
    }
}
