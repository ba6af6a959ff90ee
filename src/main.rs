use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};

use mirror_me::app::{AppContext, Route};
use mirror_me::config::{APP_NAME, AppConfig};
use mirror_me::conversation::{ChatFlow, MirrorSessionFlow};
use mirror_me::state::{ONBOARDING_STEPS, SessionPhase, Theme};

const HELP: &str = "\
Commands:
  /start              begin a mirror session
  /end [--summary]    end the session, optionally summarizing it
  /history            list past sessions
  /show <id>          show one past session
  /stats              totals across history
  /clear              delete session history
  /chat               switch to free chat (/mirror to switch back)
  /voice /haptic      toggle voice output or haptic feedback
  /theme [light|dark] toggle or set the color theme
  /settings           show settings
  /reset              restore default settings
  /onboarding         walk through onboarding (/skip to skip it)
  /quit               exit
Anything else is sent to the coach.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Mirror,
    Chat,
}

enum Flow {
    Continue,
    Quit,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let ephemeral = std::env::args().skip(1).any(|a| a == "--ephemeral");
    let config = AppConfig::from_env().context("reading configuration")?;

    let app = if ephemeral {
        AppContext::ephemeral(&config).await?
    } else {
        AppContext::open(&config)
            .await
            .with_context(|| format!("opening {}", config.db_path.display()))?
    };

    eprintln!("🪞 {} v{}", APP_NAME, env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", app.coach.model_name());
    if ephemeral {
        eprintln!("   Storage: in-memory");
    } else {
        eprintln!("   Storage: {}", config.db_path.display());
    }
    eprintln!("   Theme: {}", app.theme.get());
    eprintln!("   Type /help for commands, /quit to exit.\n");

    if app.initial_route() == Route::Onboarding {
        print_onboarding_step(&app);
    }

    let mirror = app.mirror_flow();
    let mut chat = app.chat_flow();
    let mut mode = Mode::Mirror;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    eprint!("> ");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            eprint!("> ");
            continue;
        }

        match handle_line(&app, &mirror, &mut chat, &mut mode, line).await {
            Ok(Flow::Quit) => break,
            Ok(Flow::Continue) => {}
            Err(e) => eprintln!("❌ {e:#}"),
        }
        eprint!("> ");
    }

    if app.sessions.phase() == SessionPhase::Active {
        eprintln!("Session left open, it will resume next time");
    }
    Ok(())
}

/// Run one REPL line.
async fn handle_line(
    app: &AppContext,
    mirror: &MirrorSessionFlow,
    chat: &mut ChatFlow,
    mode: &mut Mode,
    line: &str,
) -> anyhow::Result<Flow> {
    let (command, arg) = match line.split_once(' ') {
        Some((c, a)) => (c, a.trim()),
        None => (line, ""),
    };

    match command {
        "/quit" | "/exit" => return Ok(Flow::Quit),
        "/help" => eprintln!("{HELP}"),
        "/start" => {
            if !camera_ready(app).await {
                return Ok(Flow::Continue);
            }
            let outcome = app.sessions.start().await?;
            if let Some(prev) = outcome.archived {
                eprintln!("ℹ️  Archived unfinished session {}", prev.id);
            }
            eprintln!("Session {} started", outcome.session.id);
            *mode = Mode::Mirror;
        }
        "/end" => match mirror.finish(arg == "--summary").await? {
            Some(session) => {
                eprintln!(
                    "Session ended: {} messages, {}s",
                    session.messages.len(),
                    session.duration_ms.unwrap_or_default() / 1000
                );
                if let Some(summary) = session.summary {
                    println!("\n{summary}\n");
                }
            }
            None => eprintln!("No active session"),
        },
        "/history" => {
            let history = app.sessions.history();
            if history.is_empty() {
                eprintln!("No sessions yet");
            }
            for s in history {
                eprintln!(
                    "  {}  {}  {} messages",
                    s.id,
                    format_time(s.start_time),
                    s.messages.len()
                );
            }
        }
        "/show" => match app.sessions.find(arg) {
            Some(session) => {
                for m in &session.messages {
                    println!("{}: {}", m.role, m.content);
                }
                if let Some(summary) = session.summary {
                    println!("\nSummary: {summary}");
                }
            }
            None => eprintln!("No session with id {arg:?}"),
        },
        "/stats" => {
            let stats = app.sessions.stats();
            eprintln!("  Sessions: {}", stats.total_sessions);
            eprintln!("  Messages: {}", stats.total_messages);
            eprintln!("  Total time: {}s", stats.total_duration_ms / 1000);
            if let Some(last) = stats.last_session_start {
                eprintln!("  Last session: {}", format_time(last));
            }
        }
        "/clear" => {
            app.sessions.clear_history().await?;
            eprintln!("History cleared");
        }
        "/chat" => {
            *mode = Mode::Chat;
            *chat = app.chat_flow();
            print_chat_greeting(chat);
        }
        "/mirror" => *mode = Mode::Mirror,
        "/voice" => {
            let s = app.settings.toggle_voice().await?;
            eprintln!("Voice {}", on_off(s.voice_enabled));
        }
        "/haptic" => {
            let s = app.settings.toggle_haptic().await?;
            eprintln!("Haptics {}", on_off(s.haptic_enabled));
        }
        "/theme" => {
            let theme = if arg.is_empty() {
                app.theme.toggle().await?
            } else {
                match arg.parse::<Theme>() {
                    Ok(theme) => app.theme.set(theme).await?,
                    Err(e) => {
                        eprintln!("{e}");
                        app.theme.get()
                    }
                }
            };
            eprintln!("Theme: {theme}");
        }
        "/settings" => {
            for line in settings_lines(app) {
                eprintln!("  {line}");
            }
        }
        "/reset" => {
            app.settings.reset().await?;
            eprintln!("Settings restored to defaults");
        }
        "/onboarding" => {
            if app.onboarding.is_complete() {
                app.onboarding.reset().await?;
            } else {
                app.onboarding.next_step().await?;
            }
            print_onboarding_step(app);
        }
        "/skip" => {
            app.onboarding.skip().await?;
            eprintln!("Onboarding skipped");
        }
        _ if command.starts_with('/') => eprintln!("Unknown command {command}, try /help"),
        _ => match *mode {
            Mode::Mirror => {
                if app.sessions.phase() == SessionPhase::Idle {
                    if !camera_ready(app).await {
                        return Ok(Flow::Continue);
                    }
                    eprintln!("⏳ Starting a new session");
                }
                if let Some(exchange) = mirror.send(line).await {
                    println!("\n{}\n", exchange.reply.content);
                    if let Some(e) = exchange.storage_error {
                        eprintln!("⚠️  Not saved: {e}");
                    }
                }
            }
            Mode::Chat => {
                if let Some(reply) = chat.send(line).await {
                    println!("\n{}\n", reply.content);
                }
            }
        },
    }
    Ok(Flow::Continue)
}

/// Mirror sessions need the camera; print why when it is unavailable.
async fn camera_ready(app: &AppContext) -> bool {
    let status = app.camera.ensure().await;
    if let Some(message) = status.message.as_deref().filter(|_| !status.granted) {
        eprintln!("📷 {message}");
    }
    status.granted
}

fn print_onboarding_step(app: &AppContext) {
    let progress = app.onboarding.get();
    if progress.completed {
        eprintln!("Onboarding complete. Type /start or just say something.");
        return;
    }
    if let Some(step) = progress.step() {
        eprintln!(
            "[{}/{}] {}\n   {}",
            progress.current_step + 1,
            ONBOARDING_STEPS.len(),
            step.title,
            step.description
        );
        eprintln!("   /onboarding to continue, /skip to skip");
    }
}

fn print_chat_greeting(chat: &ChatFlow) {
    if let Some(greeting) = chat.transcript().first() {
        println!("\n{}\n", greeting.content);
    }
}

/// Current preferences. The theme comes from the theme store, which `/theme` changes.
fn settings_lines(app: &AppContext) -> Vec<String> {
    let s = app.settings.get();
    vec![
        format!("Theme: {}", app.theme.get()),
        format!("Voice: {}", on_off(s.voice_enabled)),
        format!("Haptics: {}", on_off(s.haptic_enabled)),
        format!("Language: {}", s.language),
    ]
}

fn on_off(enabled: bool) -> &'static str {
    if enabled { "on" } else { "off" }
}

fn format_time(epoch_ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(epoch_ms)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| epoch_ms.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn settings_show_the_theme_set_by_theme_command() {
        let app = AppContext::ephemeral(&AppConfig::default()).await.unwrap();
        let mut chat = app.chat_flow();
        let mirror = app.mirror_flow();
        let mut mode = Mode::Mirror;

        handle_line(&app, &mirror, &mut chat, &mut mode, "/theme light")
            .await
            .unwrap();
        let lines = settings_lines(&app);
        assert_eq!(lines[0], "Theme: light");
        assert_eq!(lines[1], "Voice: on");
    }

    #[tokio::test]
    async fn quit_ends_the_loop() {
        let app = AppContext::ephemeral(&AppConfig::default()).await.unwrap();
        let mut chat = app.chat_flow();
        let mirror = app.mirror_flow();
        let mut mode = Mode::Mirror;

        let flow = handle_line(&app, &mirror, &mut chat, &mut mode, "/quit")
            .await
            .unwrap();
        assert!(matches!(flow, Flow::Quit));
    }
}
