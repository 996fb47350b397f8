use clap::Parser;

const EXAMPLES: &str = "\
Examples:
  Basics:
    man read | ag -d Translate to Chinese
    ag --model qwen-max -d Explain quantum computing

  Sessions:
    ag -s machine_learning
    ag -d what is machine learning
    ag -s rust_dev
    ag -d how do I install rust on archlinux
    ag -s machine_learning && ag --recover
    ag --clean all

Models (DashScope): deepseek-r1 (default), qwen-long, qwen-turbo, qwen-max, qwen-plus";

#[derive(Parser, Debug)]
#[command(
    name = "ag",
    about = "AG - AI command line assistant",
    long_about = "Pipe text and a prompt to a streaming LLM. Every exchange is saved to the current session so conversations can be resumed.",
    after_help = EXAMPLES,
    version
)]
pub struct Cli {
    /// LLM model [default: config file, then deepseek-r1]
    #[arg(short, long, env = "AG_MODEL_DEFAULT")]
    pub model: Option<String>,

    /// Task description; every following word is part of the prompt
    #[arg(short = 'd', long, num_args = 1.., allow_hyphen_values = true, value_name = "PROMPT")]
    pub prompt: Option<Vec<String>>,

    /// Switch to a session, creating it if needed
    #[arg(short, long, value_name = "SESSION")]
    pub session: Option<String>,

    /// Select the session to use (from the prompt, piped text, or a picker)
    #[arg(short = 'S', long)]
    pub select: bool,

    /// Delete a session, or every session with `all`
    #[arg(short, long, value_name = "SESSION|all")]
    pub clean: Option<String>,

    /// Replay the dialog of the current session
    #[arg(short, long)]
    pub recover: bool,

    /// Plain text output without markdown styling
    #[arg(long)]
    pub plain: bool,

    #[arg(long, env = "AG_DASHSCOPE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL
    #[arg(long, env = "AG_BASE_URL")]
    pub base_url: Option<String>,

    /// Debug logging to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// The `-d` words joined by single spaces.
    pub fn prompt_text(&self) -> Option<String> {
        self.prompt.as_ref().map(|words| words.join(" "))
    }

    pub fn get_api_key(&self) -> Result<String, String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| "env AG_DASHSCOPE_API_KEY not provided.".to_string())
    }

    /// Session name for `--clean`/`--select`: the explicit value, else the
    /// prompt, else piped text. `None` means the user has to pick one.
    pub fn resolve_session_name(&self, explicit: Option<&str>, piped: &str) -> Option<String> {
        let prompt = self.prompt_text();
        let name = [explicit, prompt.as_deref(), Some(piped)]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|name| !name.is_empty())
            .map(str::to_string);
        name
    }
}

/// Combines the prompt with piped input, dropping input past `max_chars`.
pub fn compose_prompt(prompt: Option<&str>, input: &str, max_chars: usize) -> String {
    let input: String = input.chars().take(max_chars).collect();
    match prompt {
        Some(prompt) if !input.is_empty() => format!("{}:\n{}", prompt, input),
        Some(prompt) => prompt.to_string(),
        None => input,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ag").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_prompt_words_joined() {
        let cli = parse(&["--plain", "-d", "Explain", "quantum", "computing"]);
        assert_eq!(cli.prompt_text().as_deref(), Some("Explain quantum computing"));
        assert!(cli.plain);
    }

    #[test]
    fn test_verbs() {
        let cli = parse(&["-s", "rust_dev"]);
        assert_eq!(cli.session.as_deref(), Some("rust_dev"));

        let cli = parse(&["-c", "all"]);
        assert_eq!(cli.clean.as_deref(), Some("all"));

        let cli = parse(&["-S", "-r"]);
        assert!(cli.select && cli.recover);
    }

    #[test]
    fn test_resolve_session_name_precedence() {
        let cli = parse(&["-d", "from", "prompt"]);
        assert_eq!(
            cli.resolve_session_name(Some("explicit"), "piped").as_deref(),
            Some("explicit")
        );
        assert_eq!(
            cli.resolve_session_name(None, "piped").as_deref(),
            Some("from prompt")
        );

        let cli = parse(&[]);
        assert_eq!(
            cli.resolve_session_name(None, "  piped_name\n").as_deref(),
            Some("piped_name")
        );
        assert_eq!(cli.resolve_session_name(None, " \n"), None);
    }

    #[test]
    fn test_compose_prompt() {
        assert_eq!(
            compose_prompt(Some("Translate"), "bonjour", 100),
            "Translate:\nbonjour"
        );
        assert_eq!(compose_prompt(Some("Hi"), "", 100), "Hi");
        assert_eq!(compose_prompt(None, "just input", 100), "just input");
        assert_eq!(compose_prompt(None, "ééééé", 3), "ééé");
    }

    #[test]
    fn test_blank_api_key_rejected() {
        let mut cli = parse(&[]);
        cli.api_key = Some("  ".to_string());
        assert!(cli.get_api_key().is_err());
        cli.api_key = Some("sk-1".to_string());
        assert_eq!(cli.get_api_key().unwrap(), "sk-1");
    }
}
