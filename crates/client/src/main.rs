//! SpeakSpace terminal client.
//!
//! Signs in, enters a session room and relays stdin as chat.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use speakspace_client::identity::{DemoIdentityProvider, HttpIdentityProvider, IdentityProvider};
use speakspace_client::{ApiClient, AppContext, ClientConfig, Subscription};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "speakspace",
    version,
    about = "Join a SpeakSpace practice session from the terminal"
)]
struct Cli {
    /// Account email
    #[arg(long, env = "SPEAKSPACE_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "SPEAKSPACE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Session room to enter
    #[arg(long, default_value = "lobby")]
    session: String,

    /// Create an account with this display name before entering
    #[arg(long, value_name = "NAME", requires = "role")]
    register: Option<String>,

    /// moderator, participant or evaluator
    #[arg(long, value_name = "ROLE")]
    role: Option<String>,

    /// Use the built-in demo directory instead of the API
    #[arg(long)]
    demo: bool,
}

enum Command<'a> {
    Speak,
    Stop,
    Join(&'a str),
    Leave,
    Logout,
    Quit,
    Chat(&'a str),
}

fn parse_command(line: &str) -> Option<Command<'_>> {
    let line = line.trim();
    let command = match line {
        "" => return None,
        "/speak" => Command::Speak,
        "/stop" => Command::Stop,
        "/leave" => Command::Leave,
        "/logout" => Command::Logout,
        "/quit" => Command::Quit,
        _ => match line.strip_prefix("/join ") {
            Some(session) => Command::Join(session.trim()),
            None => Command::Chat(line),
        },
    };
    Some(command)
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("speakspace_client=debug")),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ClientConfig::from_env();
    let provider: Arc<dyn IdentityProvider> = if cli.demo {
        Arc::new(DemoIdentityProvider::new())
    } else {
        let api = ApiClient::new().with_base_url(config.api_url.clone());
        match api.health().await {
            Ok(health) => tracing::info!("{} ({})", health.message, config.api_url),
            Err(e) => tracing::warn!(
                "Backend at {} is unreachable: {}",
                config.api_url,
                e.user_message()
            ),
        }
        Arc::new(HttpIdentityProvider::new(config.api_url.clone()))
    };
    let app = AppContext::new(config, provider).context("failed to open client storage")?;

    sign_in(&app, &cli).await?;
    let user = app
        .identity()
        .current_user()
        .context("sign-in did not produce a user")?;
    println!("Signed in as {} ({})", user.name, user.role);

    let subscriptions = subscribe(&app);

    let state = app.enter_session(&cli.session).await?;
    if !state.is_connected() {
        for sub in subscriptions {
            sub.unsubscribe();
        }
        bail!("could not reach the realtime broker: {:?}", state);
    }
    println!(
        "Entered session {}. Commands: /speak /stop /join ID /leave /logout /quit",
        cli.session
    );

    let mut session = Some(cli.session.clone());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match parse_command(&line) {
            None => {}
            Some(Command::Speak) => app.realtime().start_speaking(),
            Some(Command::Stop) => app.realtime().stop_speaking(),
            Some(Command::Join(next)) => {
                app.realtime().join_session(next);
                session = Some(next.to_string());
            }
            Some(Command::Leave) => {
                if let Some(current) = session.take() {
                    app.realtime().leave_session(current);
                }
            }
            Some(Command::Logout) => {
                let transition = app.sign_out();
                println!("Signed out, returning to {}", transition.destination());
                break;
            }
            Some(Command::Quit) => break,
            Some(Command::Chat(text)) => app.send_chat(text)?,
        }
    }

    for sub in subscriptions {
        sub.unsubscribe();
    }
    app.shutdown();
    Ok(())
}

async fn sign_in(app: &AppContext, cli: &Cli) -> anyhow::Result<()> {
    let identity = app.identity();

    if let Some(name) = &cli.register {
        let (Some(email), Some(password), Some(role)) = (&cli.email, &cli.password, &cli.role)
        else {
            bail!("--register needs --email, --password and --role");
        };
        identity.register(name, email, password, role).await?;
        return Ok(());
    }

    match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => {
            identity.login(email, password).await?;
        }
        _ if identity.is_authenticated() => {
            tracing::debug!("Using persisted identity");
        }
        _ => bail!("not signed in: pass --email and --password"),
    }
    Ok(())
}

fn subscribe(app: &AppContext) -> Vec<Subscription> {
    let realtime = app.realtime();
    vec![
        realtime.on_message(|m| {
            let sender = m.sender_name.unwrap_or(m.sender_id);
            println!("[{}] {}: {}", m.timestamp.format("%H:%M:%S"), sender, m.content);
        }),
        realtime.on_user_join(|p| println!("* {} joined {}", p.user_id, p.session_id)),
        realtime.on_user_leave(|user_id| println!("* {} left", user_id)),
        realtime.on_speaking_time(|t| {
            let status = if t.speaking { "speaking" } else { "idle" };
            println!("* {} {} ({}s total)", t.user_id, status, t.total_seconds);
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_command() {
        assert!(parse_command("   ").is_none());
        assert!(matches!(parse_command("/speak"), Some(Command::Speak)));
        assert!(matches!(parse_command(" /stop "), Some(Command::Stop)));
        assert!(matches!(parse_command("/join s2"), Some(Command::Join("s2"))));
        assert!(matches!(parse_command("hello all"), Some(Command::Chat("hello all"))));
        assert!(matches!(parse_command("/logout"), Some(Command::Logout)));
    }

    #[test]
    fn test_cli_register_requires_role() {
        let result = Cli::try_parse_from(["speakspace", "--register", "Ana"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from([
            "speakspace",
            "--register",
            "Ana",
            "--role",
            "evaluator",
            "--demo",
        ])
        .unwrap();
        assert_eq!(cli.session, "lobby");
        assert!(cli.demo);
    }
}
