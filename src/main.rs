// ABOUTME: Main entry point for the agents-mux terminal multiplexer
// Lists workspaces or attaches the terminal to dual-mode sessions running in them

use agents_mux::input::{InputAction, InputRouter, ShortcutAction, ShortcutResolver};
use agents_mux::session::{EventKind, SessionEvent, SessionManager, StdoutSink, Subscription};
use agents_mux::workspace::{GitWorktreeDirectory, WorkspaceDirectory};
use agents_mux::{Channel, MuxConfig, NativePtySpawner, TerminalSize};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crossterm::{
    cursor::Show,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode},
};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "agents-mux", version, about = "Run agents and shells side by side in git worktrees")]
struct Cli {
    /// Configuration file (defaults to <config dir>/agents-mux/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the workspaces of a repository
    List {
        /// Any path inside the repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Start a session in each workspace and attach to the first
    Attach {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Command to run instead of the configured one
        #[arg(last = true)]
        command: Vec<String>,
    },
}

/// Why the terminal left a session
enum Detach {
    Menu,
    PrimaryExited,
    InputClosed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_file = setup_logging()?;
    setup_panic_handler();
    info!("Logging to {}", log_file.display());

    match cli.command {
        Commands::List { repo, json } => list_workspaces(&repo, json),
        Commands::Attach { paths, command } => attach(cli.config.as_deref(), paths, &command).await,
    }
}

fn list_workspaces(repo: &Path, json: bool) -> Result<()> {
    let directory = GitWorktreeDirectory::open(repo)?;
    let workspaces = directory
        .list_workspaces()
        .with_context(|| format!("Failed to list workspaces of {}", repo.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&workspaces)?);
        return Ok(());
    }

    for workspace in workspaces {
        let marker = if workspace.is_primary { "*" } else { " " };
        println!("{} {:<24} {}", marker, workspace.label, workspace.path.display());
    }
    Ok(())
}

async fn attach(config_path: Option<&Path>, paths: Vec<PathBuf>, command: &[String]) -> Result<()> {
    let config = MuxConfig::load(config_path)?;
    let bindings = config.key_bindings()?;
    let size = crossterm::terminal::size()
        .map(|(cols, rows)| TerminalSize::new(cols, rows))
        .unwrap_or_default();

    let toggle_hint = bindings.display_label(ShortcutAction::ToggleMode);
    let menu_hint = bindings.display_label(ShortcutAction::ReturnToMenu);
    let manager = SessionManager::new(
        Arc::new(NativePtySpawner::new(config.term.clone())),
        Arc::new(StdoutSink),
        config.settings(size, Some(toggle_hint)),
    );

    let mut workspaces = Vec::with_capacity(paths.len());
    for path in paths {
        let path = path
            .canonicalize()
            .with_context(|| format!("Workspace does not exist: {}", path.display()))?;
        manager
            .create_session(&path, config.session_command(command))
            .with_context(|| format!("Failed to start session in {}", path.display()))?;
        workspaces.push(path);
    }

    let router = InputRouter::new(Arc::new(bindings));
    let result = run(&manager, &router, &workspaces, &menu_hint).await;

    let _ = disable_raw_mode();
    for report in manager.destroy_all() {
        if !report.is_clean() {
            warn!("Session {} torn down with {} kill failures", report.session, report.kill_failures.len());
        }
    }
    result
}

async fn run(manager: &SessionManager, router: &InputRouter, workspaces: &[PathBuf], menu_hint: &str) -> Result<()> {
    let mut input = spawn_stdin_reader();
    let mut current = workspaces.first().cloned();

    while let Some(path) = current.take() {
        let Some(session) = manager.get_session(&path) else {
            current = choose_session(manager, &mut input, menu_hint).await?;
            continue;
        };

        enable_raw_mode().context("Failed to enable raw mode")?;
        if let Ok((cols, rows)) = crossterm::terminal::size() {
            session.resize(cols, rows);
        }
        let mut exits = manager.subscribe_to(&[EventKind::Exit]);
        manager.set_session_active(&path, true);

        // The exit may have been published before the subscription existed
        let detach = if session.process_status(Channel::Primary).is_some_and(|status| !status.is_running()) {
            Ok(Detach::PrimaryExited)
        } else {
            attach_loop(manager, router, &session, &mut input, &mut exits).await
        };

        manager.set_session_active(&path, false);
        manager.unsubscribe(&exits);
        disable_raw_mode().context("Failed to disable raw mode")?;

        match detach? {
            Detach::InputClosed => break,
            Detach::PrimaryExited => {
                println!("\r\n[{} exited]", session.workspace_path().display());
                current = choose_session(manager, &mut input, menu_hint).await?;
            }
            Detach::Menu => current = choose_session(manager, &mut input, menu_hint).await?,
        }
    }
    Ok(())
}

async fn attach_loop(
    manager: &SessionManager,
    router: &InputRouter,
    session: &Arc<agents_mux::Session>,
    input: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    exits: &mut Subscription,
) -> Result<Detach> {
    let mut winch = signal(SignalKind::window_change()).context("Failed to watch for terminal resizes")?;

    loop {
        tokio::select! {
            bytes = input.recv() => {
                let Some(bytes) = bytes else {
                    return Ok(Detach::InputClosed);
                };
                match router.route(manager, session, &bytes) {
                    Ok(InputAction::ReturnToMenu) => return Ok(Detach::Menu),
                    Ok(_) => {}
                    Err(e) => error!("Input for {} failed: {}", session.workspace_path().display(), e),
                }
            }
            _ = winch.recv() => {
                if let Ok((cols, rows)) = crossterm::terminal::size() {
                    manager.resize_session(session.workspace_path(), cols, rows);
                }
            }
            event = exits.recv() => {
                if let Some(SessionEvent::Exit { session: id, channel: Channel::Primary, .. }) = event {
                    if id == session.id() {
                        return Ok(Detach::PrimaryExited);
                    }
                }
            }
        }
    }
}

/// Plain line chooser shown between sessions. `None` means quit.
async fn choose_session(
    manager: &SessionManager,
    input: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    menu_hint: &str,
) -> Result<Option<PathBuf>> {
    loop {
        let sessions = manager.sessions();
        if sessions.is_empty() {
            return Ok(None);
        }

        let mut stdout = io::stdout().lock();
        write!(stdout, "\x1b[2J\x1b[H")?;
        writeln!(stdout, "Sessions ({menu_hint} returns here):")?;
        for (i, summary) in sessions.iter().enumerate() {
            writeln!(
                stdout,
                "  {:>2}) {} {} [{}]",
                i + 1,
                summary.indicator(),
                summary.workspace_path.display(),
                summary.mode
            )?;
        }
        write!(stdout, "Number to attach, x<number> to close, q to quit: ")?;
        stdout.flush()?;
        drop(stdout);

        let Some(line) = read_line(input).await else {
            return Ok(None);
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case("q") {
            return Ok(None);
        }

        let (close, number) = match line.strip_prefix('x') {
            Some(rest) => (true, rest.trim()),
            None => (false, line),
        };
        let Some(summary) = number
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| sessions.get(i))
        else {
            continue;
        };

        if close {
            manager.destroy_session(&summary.workspace_path);
            continue;
        }
        return Ok(Some(summary.workspace_path.clone()));
    }
}

async fn read_line(input: &mut mpsc::UnboundedReceiver<Vec<u8>>) -> Option<String> {
    let mut line = Vec::new();
    while let Some(bytes) = input.recv().await {
        line.extend_from_slice(&bytes);
        if line.contains(&b'\n') || line.contains(&b'\r') {
            return Some(String::from_utf8_lossy(&line).into_owned());
        }
    }
    None
}

/// Blocking stdin reads on their own thread, delivered in order
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        let mut stdin = io::stdin();
        let mut buf = [0u8; 1024];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    warn!("Stdin read failed: {}", e);
                    break;
                }
            }
        }
    });
    rx
}

fn setup_logging() -> Result<PathBuf> {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    let log_dir = dirs::home_dir()
        .map(|home| home.join(".agents-mux").join("logs"))
        .unwrap_or_else(|| PathBuf::from(".agents-mux/logs"));
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;

    let log_file = log_dir.join(format!("agents-mux-{}.log", chrono::Local::now().format("%Y%m%d-%H%M%S")));
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
        .with_context(|| format!("Failed to create log file: {}", log_file.display()))?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(file)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "agents_mux=info".into()))
        .init();

    Ok(log_file)
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Restore the terminal before anything is printed
        let _ = disable_raw_mode();
        let _ = execute!(io::stderr(), Show);

        error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Please check the logs for more details.");
    }));
}
