//! zoe - terminal front-end for the Zoe assistant
//!
//! USAGE:
//!   zoe                           # interactive chat
//!   zoe doctor                    # check config and identity settings
//!   zoe config set <key> <value>  # non-interactive config

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use zoe::config::{self, Config};
use zoe::terminal::{TerminalIdentity, ENV_ID_TOKEN};
use zoe::{ChatSession, Feedback, HttpTransport, Message, Role, SubmitOutcome, TokenProvider};

// ═══════════════════════════════════════════════════════════════
// CLI
// ═══════════════════════════════════════════════════════════════

#[derive(Debug)]
enum Command {
    Chat,
    Doctor,
    ConfigSet { key: String, value: String },
    Help,
}

fn parse_args() -> Command {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        return Command::Help;
    }

    match args.first().map(|s| s.as_str()) {
        None => Command::Chat,
        Some("doctor") => Command::Doctor,
        Some("config") if args.get(1).map(|s| s.as_str()) == Some("set") => Command::ConfigSet {
            key: args.get(2).cloned().unwrap_or_default(),
            value: args.get(3).cloned().unwrap_or_default(),
        },
        Some(_) => Command::Help,
    }
}

fn print_help() {
    println!(r#"zoe - terminal client for the Zoe assistant

USAGE:
    zoe                           # interactive chat
    zoe doctor                    # check config and identity settings
    zoe config set <key> <value>  # set config value

CONFIG KEYS:
    api_url, client_id, authority, redirect_uri, scopes,
    include_user_id, timeout

CONFIG:
    ~/.config/zoe/config.json

ENVIRONMENT:
    ZOE_API_URL         Override backend URL
    ZOE_CLIENT_ID       Override identity client id
    ZOE_AUTHORITY       Override identity authority
    ZOE_REDIRECT_URI    Override redirect URI
    ZOE_ID_TOKEN        Use this id token instead of signing in
    RUST_LOG            Log filter (default: warn)

CHAT COMMANDS:
    /like <n>       Toggle like on message n
    /dislike <n>    Toggle dislike on message n
    /history        Show the conversation
    /quit           Leave
"#);
}

// ═══════════════════════════════════════════════════════════════
// MAIN
// ═══════════════════════════════════════════════════════════════

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match parse_args() {
        Command::Help => {
            print_help();
            Ok(())
        }
        Command::Doctor => run_doctor(),
        Command::ConfigSet { key, value } => run_config_set(&key, &value),
        Command::Chat => run_chat().await,
    }
}

// ═══════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════

fn run_doctor() -> Result<()> {
    println!("zoe doctor\n");

    let path = config::config_path()?;
    println!("[{}] Config: {}", mark(path.exists()), path.display());

    let cfg = Config::load()?;
    match cfg.api_base_url() {
        Ok(url) => println!("[{}] API URL: {}", mark(true), url),
        Err(e) => println!("[{}] API URL: {}", mark(false), e),
    }

    let has_token = std::env::var(ENV_ID_TOKEN).map(|v| !v.is_empty()).unwrap_or(false);
    println!(
        "[{}] Client id: {}",
        mark(cfg.client_id.is_some() || has_token),
        cfg.client_id.as_deref().unwrap_or("missing")
    );
    println!("[{}] {}: {}", mark(true), ENV_ID_TOKEN, if has_token { "set" } else { "unset" });
    println!("    Authority: {}", cfg.authority);
    println!("    Redirect URI: {}", cfg.redirect_uri);
    println!("    Scopes: {}", cfg.scopes.join(" "));

    Ok(())
}

fn mark(ok: bool) -> &'static str {
    if ok { "✓" } else { "✗" }
}

fn run_config_set(key: &str, value: &str) -> Result<()> {
    if key.is_empty() {
        anyhow::bail!("Usage: zoe config set <key> <value>");
    }

    let path = config::config_path()?;
    let mut cfg = Config::load_from(&path)?;
    cfg.set(key, value)?;
    cfg.save_to(&path)?;
    println!("Saved {} to {}", key, path.display());
    Ok(())
}

async fn run_chat() -> Result<()> {
    let cfg = Config::load()?;
    let transport = HttpTransport::new(cfg.api_base_url()?)
        .with_user_id(cfg.include_user_id)
        .with_timeout(cfg.request_timeout());

    let stdin = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin())));
    let identity = TerminalIdentity::shared(&cfg, stdin.clone()).with_env();
    let provider = TokenProvider::with_scopes(identity, cfg.scopes.clone());
    if let Err(e) = provider.initialize().await {
        // Sends still run and report the failure in the conversation
        tracing::warn!(error = %e, "identity client failed to initialize");
    }

    let session = ChatSession::new(Arc::new(provider), Arc::new(transport));
    for (i, msg) in session.messages().iter().enumerate() {
        print_message(i + 1, msg, None);
    }

    loop {
        let Some(line) = read_line(&stdin).await? else {
            break;
        };
        let line = line.trim_end_matches(['\r', '\n']);

        match line.trim() {
            "/quit" | "/exit" => break,
            "/history" => {
                for (i, msg) in session.messages().iter().enumerate() {
                    print_message(i + 1, msg, session.feedback(&msg.id));
                }
                continue;
            }
            cmd => {
                if let Some((kind, number)) = parse_feedback_command(cmd) {
                    run_feedback(&session, kind, number).await;
                    continue;
                }
            }
        }

        let before = session.message_count();
        session.set_input(line);
        if let SubmitOutcome::Rejected(reason) = session.submit().await {
            tracing::debug!(?reason, "input ignored");
            continue;
        }

        for (i, msg) in session.messages().iter().enumerate().skip(before) {
            if msg.role == Role::Assistant {
                print_message(i + 1, msg, None);
            }
        }
    }

    Ok(())
}

async fn read_line(stdin: &Mutex<BufReader<Stdin>>) -> Result<Option<String>> {
    let mut line = String::new();
    let read = stdin
        .lock()
        .await
        .read_line(&mut line)
        .await
        .context("Failed to read from stdin")?;
    Ok((read > 0).then_some(line))
}

/// `/like N` or `/dislike N`; the number is `None` when missing or invalid
fn parse_feedback_command(cmd: &str) -> Option<(Feedback, Option<usize>)> {
    let mut parts = cmd.split_whitespace();
    let kind = match parts.next()? {
        "/like" => Feedback::Like,
        "/dislike" => Feedback::Dislike,
        _ => return None,
    };
    let number = parts.next().and_then(|n| n.parse::<usize>().ok());
    Some((kind, number))
}

async fn run_feedback(session: &ChatSession, kind: Feedback, number: Option<usize>) {
    let messages = session.messages();
    let target = number
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| messages.get(i));

    let Some(msg) = target else {
        println!("No such message. Use /history to see numbers.");
        return;
    };

    let report = session.toggle_feedback(&msg.id, kind).await;
    let state = match report.local {
        Some(Feedback::Like) => "liked",
        Some(Feedback::Dislike) => "disliked",
        None => "cleared",
    };
    println!("Feedback {} ({:?})", state, report.remote);
}

fn print_message(n: usize, msg: &Message, feedback: Option<Feedback>) {
    let who = match msg.role {
        Role::User => "Tú",
        Role::Assistant => "Zoe",
    };
    let time = msg.timestamp.with_timezone(&chrono::Local).format("%H:%M");
    let mark = match feedback {
        Some(Feedback::Like) => " [+]",
        Some(Feedback::Dislike) => " [-]",
        None => "",
    };
    println!("{:>3}. [{}] {}: {}{}", n, time, who, msg.content, mark);
}
