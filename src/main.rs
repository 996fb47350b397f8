mod api;
mod chat;
mod cli;
mod config;
mod error;
mod markdown;
mod render;
mod session;
mod spinner;
mod ui;

use api::CompletionClient;
use chat::Turn;
use clap::{CommandFactory, Parser};
use cli::Cli;
use colored::Colorize;
use config::AgConfig;
use error::{AgError, Result};
use session::{Deletion, SessionStore, DEFAULT_SESSION};
use std::io::{self, IsTerminal, Read, Write};
use ui::MessageSeverity;

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()),
        )
        .init();

    install_interrupt_handler();

    if let Err(e) = run(cli) {
        ui::print_error_with_hint(&e);
        std::process::exit(1);
    }
}

fn install_interrupt_handler() {
    let result = ctrlc::set_handler(|| {
        let mut err = io::stderr();
        let _ = ui::erase_line(&mut err);
        let _ = ui::show_cursor(&mut err);
        eprintln!("{}", "Interrupted. Exiting.".dimmed());
        std::process::exit(130);
    });
    if let Err(e) = result {
        tracing::warn!(error = %e, "Failed to install interrupt handler");
    }
}

fn read_piped_input() -> Result<String> {
    let mut input = String::new();
    if !io::stdin().is_terminal() {
        io::stdin().read_to_string(&mut input)?;
    }
    Ok(input)
}

/// What one invocation does, decided from the flags and piped input.
#[derive(Debug, PartialEq)]
enum Command {
    Clean(String),
    Switch(String),
    /// `None` when neither the prompt nor piped text names a session.
    Select(Option<String>),
    Recover,
    Help,
    Send(Option<String>),
}

fn plan(cli: &Cli, input: &str) -> Command {
    if let Some(target) = cli.clean.as_deref() {
        Command::Clean(target.trim().to_string())
    } else if let Some(name) = cli.session.as_deref() {
        Command::Switch(name.trim().to_string())
    } else if cli.select {
        Command::Select(cli.resolve_session_name(None, input))
    } else if cli.recover {
        Command::Recover
    } else {
        match cli.prompt_text() {
            None if input.is_empty() => Command::Help,
            prompt => Command::Send(prompt),
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = AgConfig::load(config::default_root())?;
    let input = read_piped_input()?;

    let prompt = match plan(&cli, &input) {
        Command::Help => {
            Cli::command().print_help()?;
            return Ok(());
        }
        Command::Send(prompt) => prompt,
        command => {
            let store = SessionStore::open(config.root.clone())?;
            return session_command(&store, command, cli.plain);
        }
    };

    let api_key = cli.get_api_key().map_err(AgError::Config)?;
    let model = cli.model.clone().unwrap_or_else(|| config.model.clone());
    let base_url = cli.base_url.clone().unwrap_or_else(|| config.base_url.clone());
    let client = CompletionClient::new(&api_key, &base_url, config.connect_timeout)?;

    let store = SessionStore::open(config.root.clone())?;
    let turn = Turn {
        model,
        session: store.current()?,
        prompt: cli::compose_prompt(prompt.as_deref(), &input, config.max_input_chars),
        plain: cli.plain,
    };

    chat::send(&client, &store, &config, &turn)?;
    Ok(())
}

fn session_command(store: &SessionStore, command: Command, plain: bool) -> Result<()> {
    match command {
        Command::Clean(target) => clean(store, &target, &mut io::stderr()),
        Command::Switch(name) => switch(store, &name, &mut io::stdout()),
        Command::Select(name) => {
            let name = match name {
                Some(name) => Some(name),
                None if io::stdin().is_terminal() => {
                    let current = store.current()?;
                    session::select_session(&store.list()?, &current)?
                }
                None => None,
            };
            let name = name.ok_or_else(|| AgError::Config("Session name required.".to_string()))?;
            switch(store, &name, &mut io::stdout())
        }
        Command::Recover => {
            let current = store.current()?;
            let session = store.load(&current)?;
            Ok(ui::display_session(&session, plain, &mut io::stdout())?)
        }
        Command::Help | Command::Send(_) => Ok(()),
    }
}

fn switch<W: Write>(store: &SessionStore, name: &str, out: &mut W) -> Result<()> {
    if store.switch_current(name)? {
        writeln!(out, "{} {}", "Session created:".bright_green(), name)?;
    }
    writeln!(out, "{} {}", "Session switched ==>".bright_cyan(), name.bold())?;
    Ok(())
}

fn clean<W: Write>(store: &SessionStore, target: &str, out: &mut W) -> Result<()> {
    if target.eq_ignore_ascii_case("all") {
        let removed = store.delete_all()?;
        ui::write_message(
            out,
            MessageSeverity::Success,
            &format!("All session history cleared ({} sessions).", removed),
        )?;
        return Ok(());
    }

    let Deletion {
        existed,
        was_current,
    } = store.delete(target)?;
    if !existed {
        ui::write_message(out, MessageSeverity::Warning, "No such session.")?;
        return Ok(());
    }

    ui::write_message(
        out,
        MessageSeverity::Success,
        &format!("Session [{}] cleared", target),
    )?;
    if was_current && target != DEFAULT_SESSION {
        ui::write_message(
            out,
            MessageSeverity::Info,
            "Switched current session to default",
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ag").chain(args.iter().copied())).unwrap()
    }

    fn open_store() -> (TempDir, SessionStore) {
        let temp_dir = TempDir::new().unwrap();
        let store = SessionStore::open(temp_dir.path()).unwrap();
        (temp_dir, store)
    }

    fn output(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_plan_dispatch() {
        assert_eq!(plan(&parse(&[]), ""), Command::Help);
        assert_eq!(
            plan(&parse(&[]), "piped text"),
            Command::Send(None)
        );
        assert_eq!(
            plan(&parse(&["-d", "Translate", "this"]), ""),
            Command::Send(Some("Translate this".to_string()))
        );
        assert_eq!(
            plan(&parse(&["-c", " all ", "-s", "x"]), ""),
            Command::Clean("all".to_string())
        );
        assert_eq!(
            plan(&parse(&["-s", "rust_dev", "-r"]), ""),
            Command::Switch("rust_dev".to_string())
        );
        assert_eq!(plan(&parse(&["-r"]), "ignored"), Command::Recover);
    }

    #[test]
    fn test_plan_select_name() {
        assert_eq!(
            plan(&parse(&["-S", "-d", "work"]), "piped"),
            Command::Select(Some("work".to_string()))
        );
        assert_eq!(
            plan(&parse(&["-S"]), "notes\n"),
            Command::Select(Some("notes".to_string()))
        );
        assert_eq!(plan(&parse(&["-S"]), ""), Command::Select(None));
    }

    #[test]
    fn test_switch_reports_creation_once() {
        let (_temp_dir, store) = open_store();

        let mut out = Vec::new();
        switch(&store, "rust_dev", &mut out).unwrap();
        let text = output(out);
        assert!(text.contains("Session created:"));
        assert!(text.contains("Session switched ==>"));
        assert_eq!(store.current().unwrap(), "rust_dev");

        let mut out = Vec::new();
        switch(&store, "rust_dev", &mut out).unwrap();
        let text = output(out);
        assert!(!text.contains("Session created:"));
        assert!(text.contains("rust_dev"));
    }

    #[test]
    fn test_clean_named_session() {
        let (_temp_dir, store) = open_store();
        store.create("other").unwrap();

        let mut out = Vec::new();
        clean(&store, "other", &mut out).unwrap();
        let text = output(out);
        assert!(text.contains("Session [other] cleared"));
        assert!(!text.contains("Switched current session"));
        assert!(!store.list().unwrap().contains("other"));
        assert_eq!(store.current().unwrap(), DEFAULT_SESSION);
    }

    #[test]
    fn test_clean_current_session_switches_to_default() {
        let (_temp_dir, store) = open_store();
        store.switch_current("scratch").unwrap();

        let mut out = Vec::new();
        clean(&store, "scratch", &mut out).unwrap();
        assert!(output(out).contains("Switched current session to default"));
        assert_eq!(store.current().unwrap(), DEFAULT_SESSION);
    }

    #[test]
    fn test_clean_missing_session_warns() {
        let (_temp_dir, store) = open_store();

        let mut out = Vec::new();
        clean(&store, "nope", &mut out).unwrap();
        assert!(output(out).contains("No such session."));
    }

    #[test]
    fn test_clean_all() {
        let (_temp_dir, store) = open_store();
        store.create("a").unwrap();
        store.switch_current("b").unwrap();

        let mut out = Vec::new();
        clean(&store, "ALL", &mut out).unwrap();
        assert!(output(out).contains("(3 sessions)"));
        assert_eq!(
            store.list().unwrap().into_iter().collect::<Vec<_>>(),
            vec![DEFAULT_SESSION.to_string()]
        );
    }

    #[test]
    fn test_clean_corrupt_current_session() {
        let (temp_dir, store) = open_store();
        store.switch_current("bad").unwrap();
        fs::write(temp_dir.path().join("sessions/bad.json"), "{not json").unwrap();

        let mut out = Vec::new();
        clean(&store, "bad", &mut out).unwrap();
        let text = output(out);
        assert!(text.contains("Session [bad] cleared"));
        assert!(text.contains("Switched current session to default"));
        assert_eq!(store.current().unwrap(), DEFAULT_SESSION);
    }
}
