use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use futures::StreamExt;
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc;
use tracing::{error, info};

use runboard::app::App;
use runboard::config::{self, Config};
use runboard::error::Result;
use runboard::event::AppEvent;
use runboard::logging::{self, LogLevel};
use runboard::tui::{Renderer, handle_key};

/// Redraw interval when nothing else happens (milliseconds)
const TICK_INTERVAL_MS: u64 = 250;

#[derive(Parser, Debug)]
#[command(
    name = "runboard",
    author,
    version,
    about = "Start, stop and watch a fleet of programs from one terminal",
    long_about = None
)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value_os_t = config::default_config_path())]
    config: PathBuf,

    /// Default number of output lines kept per program
    #[arg(short = 'b', long)]
    buffer_lines: Option<usize>,

    /// Write logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level (overrides RUNBOARD_LOG)
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

/// Initialize the terminal for TUI
fn init_terminal() -> io::Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Terminal::new(backend)
}

/// Restore the terminal to its original state
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()
}

fn load_config(args: &Args) -> Result<Config> {
    let mut file = config::load_from_path(&args.config)?;
    if let Some(lines) = args.buffer_lines {
        file.buffer_lines = lines;
    }
    Config::try_from(file)
}

/// Run the application
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: App,
    mut events: mpsc::UnboundedReceiver<AppEvent>,
) -> io::Result<()> {
    let mut keys = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(TICK_INTERVAL_MS));

    loop {
        let size = terminal.size()?;
        let visible_lines = Renderer::output_rows(&app, size.height);
        app.current_view_mut().set_visible_lines(visible_lines);

        terminal.draw(|frame| {
            Renderer::render(frame, &app);
        })?;

        tokio::select! {
            Some(event) = events.recv() => {
                app.handle_event(event);
                // Apply everything already queued before the next redraw.
                while let Ok(event) = events.try_recv() {
                    app.handle_event(event);
                }
            }
            Some(input) = keys.next() => {
                if let Event::Key(key) = input?
                    && key.kind == KeyEventKind::Press
                {
                    handle_key(&mut app, key);
                }
            }
            _ = ticker.tick() => {}
        }

        if app.should_quit() {
            let signalled = app.shutdown();
            info!(signalled, "shutting down");
            break;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = Args::parse();

    if let Err(err) = logging::init_logging(args.log_file.as_deref(), args.log_level) {
        eprintln!("Error: could not set up logging: {}", err);
        std::process::exit(1);
    }

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(err) => {
            error!(path = %args.config.display(), error = %err, "could not load configuration");
            eprintln!("Error: {}: {}", args.config.display(), err);
            std::process::exit(1);
        }
    };
    info!(programs = config.programs.len(), "configuration loaded");

    let (tx, rx) = mpsc::unbounded_channel::<AppEvent>();
    let app = match App::from_config(&config, Arc::new(tx)) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("Error: {}", err);
            std::process::exit(1);
        }
    };

    // Initialize terminal
    let mut terminal = init_terminal()?;

    // Run application
    let result = run_app(&mut terminal, app, rx).await;

    // Restore terminal
    restore_terminal(&mut terminal)?;

    result
}
