use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lurehive_core::*;
use lurehive_schema::ConversationEntry;

#[derive(Parser)]
#[command(name = "lurehive", version, about = "lurehive scam honeypot agent")]
struct Cli {
    #[arg(
        long,
        default_value = "~/.lurehive",
        help = "Config root directory (contains lurehive.yaml and logs/)"
    )]
    config_root: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Play the scammer against the persona in a local REPL")]
    Chat {
        #[arg(long, help = "Session ID to use (random if omitted)")]
        session: Option<String>,
        #[arg(long, help = "Seed for reproducible persona replies")]
        seed: Option<u64>,
        #[arg(long, help = "Log final results instead of posting them")]
        offline: bool,
    },
    #[command(about = "Classify a single message")]
    Classify {
        #[arg(required = true, help = "Message text")]
        text: Vec<String>,
    },
    #[command(about = "Extract intelligence from a message and print it as JSON")]
    Extract {
        #[arg(required = true, help = "Message text")]
        text: Vec<String>,
    },
    #[command(about = "Validate lurehive.yaml")]
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut cli = Cli::parse();
    cli.config_root = expand_home(&cli.config_root);

    let log_dir = cli.config_root.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let file_appender = tracing_appender::rolling::daily(&log_dir, "lurehive.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(non_blocking),
        )
        .init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    match command {
        Commands::Validate => {
            let config = load_config(&cli.config_root)?;
            println!(
                "Config valid. persona={}, max_turns={}, generator={}, reporter={}",
                config.persona.id,
                config.engagement.max_turns,
                if config.generator.enabled {
                    config.generator.model.as_str()
                } else {
                    "off"
                },
                if config.reporter.enabled {
                    config.reporter.callback_url.as_str()
                } else {
                    "off"
                },
            );
        }
        Commands::Classify { text } => {
            let text = text.join(" ");
            let result = classify(&text, &[]);
            println!("scam:       {}", result.is_scam);
            println!("category:   {}", result.category);
            println!("confidence: {:.3}", result.confidence);
            println!(
                "signals:    urgency={:.3} authority={:.3} action={:.3}",
                result.signals.urgency, result.signals.authority, result.signals.action
            );
        }
        Commands::Extract { text } => {
            let intel = extract(&text.join(" "));
            println!("{}", serde_json::to_string_pretty(&intel)?);
        }
        Commands::Chat {
            session,
            seed,
            offline,
        } => {
            let mut config = load_config(&cli.config_root)?;
            if offline {
                config.reporter.enabled = false;
            }
            run_repl(&config, session, seed).await?;
        }
    }

    Ok(())
}

fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join(path.strip_prefix("~").unwrap_or(path));
        }
    }
    path.to_path_buf()
}

#[derive(Debug, PartialEq)]
enum ReplCommand {
    Quit,
    Sessions,
    Show,
    New,
    Purge(i64),
    Unknown(String),
    Message(String),
}

fn parse_repl_line(line: &str) -> Option<ReplCommand> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return Some(ReplCommand::Message(line.to_string()));
    };

    let mut parts = rest.split_whitespace();
    let cmd = match parts.next().unwrap_or_default() {
        "quit" | "exit" => ReplCommand::Quit,
        "sessions" => ReplCommand::Sessions,
        "show" => ReplCommand::Show,
        "new" => ReplCommand::New,
        "purge" => match parts.next().map(str::parse::<i64>) {
            Some(Ok(hours)) => ReplCommand::Purge(hours),
            None => ReplCommand::Purge(0),
            Some(Err(_)) => ReplCommand::Unknown(line.to_string()),
        },
        _ => ReplCommand::Unknown(line.to_string()),
    };
    Some(cmd)
}

fn new_session_id() -> String {
    format!("repl-{}", uuid::Uuid::new_v4())
}

async fn run_repl(config: &LurehiveConfig, session: Option<String>, seed: Option<u64>) -> Result<()> {
    let responder = build_responder(config, seed)?;
    let reporter = build_reporter(config)?;
    let orch = Orchestrator::new(config, responder, reporter);

    let mut session_id = session.unwrap_or_else(new_session_id);
    let mut history: Vec<ConversationEntry> = Vec::new();
    tracing::info!("Starting REPL with session {session_id}");

    println!("lurehive REPL as {}. You are the scammer.", config.persona.display_name);
    println!("Commands: /sessions /show /new /purge [hours] /quit");
    println!("Session: {session_id}");
    println!("---");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }
        let Some(cmd) = parse_repl_line(&input) else {
            continue;
        };

        match cmd {
            ReplCommand::Quit => break,
            ReplCommand::Sessions => {
                for id in orch.list_sessions() {
                    if let Some(s) = orch.session(&id) {
                        println!(
                            "{id}  {:?}  turns={}  type={}  identifiers={}",
                            s.phase(),
                            s.turn_count,
                            s.scam_type,
                            s.intelligence.entity_count()
                        );
                    }
                }
            }
            ReplCommand::Show => match orch.session(&session_id) {
                Some(s) => println!("{}", serde_json::to_string_pretty(&s)?),
                None => println!("No messages in {session_id} yet."),
            },
            ReplCommand::New => {
                session_id = new_session_id();
                history.clear();
                tracing::debug!("Switched to session {session_id}");
                println!("Session: {session_id}");
            }
            ReplCommand::Purge(hours) => {
                let removed = orch.purge_sessions(chrono::Duration::hours(hours)).await;
                println!("Purged {removed} sessions.");
            }
            ReplCommand::Unknown(line) => eprintln!("Unknown command: {line}"),
            ReplCommand::Message(text) => {
                match orch.process_message(&session_id, &text, &history).await {
                    Ok(reply) => {
                        println!("{}: {reply}", config.persona.display_name);
                        history.push(ConversationEntry::scammer(text));
                        history.push(ConversationEntry::user(reply));
                    }
                    Err(err) => eprintln!("Error: {err}"),
                }
                if let Some(s) = orch.session(&session_id) {
                    if s.finalized {
                        println!("[session finalized after {} turns]", s.turn_count);
                    }
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_classify_words() {
        let cli = Cli::try_parse_from(["lurehive", "classify", "your", "kyc", "expired"]).unwrap();
        match cli.command {
            Some(Commands::Classify { text }) => assert_eq!(text.join(" "), "your kyc expired"),
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn cli_chat_flags() {
        let cli = Cli::try_parse_from([
            "lurehive",
            "--config-root",
            "/tmp/lh",
            "chat",
            "--seed",
            "7",
            "--offline",
        ])
        .unwrap();
        assert_eq!(cli.config_root, PathBuf::from("/tmp/lh"));
        match cli.command {
            Some(Commands::Chat {
                session,
                seed,
                offline,
            }) => {
                assert!(session.is_none());
                assert_eq!(seed, Some(7));
                assert!(offline);
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home(Path::new("/etc/lurehive")), PathBuf::from("/etc/lurehive"));
    }

    #[test]
    fn repl_line_parsing() {
        assert_eq!(parse_repl_line("   "), None);
        assert_eq!(parse_repl_line("/quit"), Some(ReplCommand::Quit));
        assert_eq!(parse_repl_line("/purge 24"), Some(ReplCommand::Purge(24)));
        assert_eq!(parse_repl_line("/purge"), Some(ReplCommand::Purge(0)));
        assert!(matches!(
            parse_repl_line("/purge soon"),
            Some(ReplCommand::Unknown(_))
        ));
        assert_eq!(
            parse_repl_line("send Rs 10 to pay@ybl"),
            Some(ReplCommand::Message("send Rs 10 to pay@ybl".into()))
        );
    }
}
