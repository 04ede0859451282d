mod ansi;
mod app;
mod buffer;
mod clipboard;
mod event;
mod filter;
mod history;
mod ingest;
mod json;
mod merge;
mod prompt;
mod search;
mod stack;
mod timestamp;
mod ui;
mod viewer;

use anyhow::{Context, Result};
use app::App;
use clap::{CommandFactory, Parser};
use crossterm::{
    cursor::Show,
    event::{self as term_event, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use event::Interrupt;
use history::History;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::time::Duration;
use viewer::Viewer;

const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "sift")]
#[command(version)]
#[command(about = "An in-memory file viewer with powerful filtering")]
#[command(after_help = "\
EXAMPLES:
    sift app.log                     View a single log file
    sift api.log web.log             Merge multiple files by timestamp
    kubectl logs pod | sift          Pipe logs from any command
    sift -f app.log                  Start in follow mode (like tail -f)

Press 'H' or F1 while running for keybinding help.
")]
struct Cli {
    /// Log files to view; two or more are merged by timestamp
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Follow mode (like tail -f)
    #[arg(short = 'f', long = "follow")]
    follow: bool,
}

/// Restores the terminal on every exit path, panics included.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode().context("failed to enable raw mode")?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, Show);
    }
}

fn main() {
    let cli = Cli::parse();

    let stdin_piped = !io::stdin().is_terminal();
    if cli.files.is_empty() && !stdin_piped {
        let _ = Cli::command().print_help();
        std::process::exit(1);
    }

    if let Err(err) = run(cli, stdin_piped) {
        eprintln!("Error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli, stdin_piped: bool) -> Result<()> {
    let interrupt = Interrupt::new();

    // Open sources before touching the terminal: a missing file should
    // fail with a plain error, not a corrupted screen.
    let (buf, label, follow_path) = if stdin_piped {
        (ingest::start_stdin(&interrupt), "<stdin>".to_string(), None)
    } else if cli.files.len() >= 2 {
        let buf = merge::start_merge(&cli.files, &interrupt).context("error loading files")?;
        (buf, merge::legend(&cli.files), None)
    } else {
        let path = cli.files[0].clone();
        let buf = ingest::start_file(&path, &interrupt).context("error loading file")?;
        (buf, path.display().to_string(), Some(path))
    };

    let history = History::load(History::default_path());
    let mut app = App::new(Viewer::new(buf, label), follow_path, history, interrupt);
    if cli.follow {
        app.toggle_follow();
        app.clear_message();
    }

    let _guard = TerminalGuard::enter()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)?;

    event_loop(&mut terminal, &mut app)
}

/// The single-threaded event loop: draw, wait for a key / resize /
/// producer interrupt, dispatch, repeat.
fn event_loop<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> Result<()> {
    let mut needs_redraw = true;
    loop {
        if needs_redraw {
            app.pre_render();
            terminal.draw(|f| ui::render(f, app))?;
            needs_redraw = false;
        }

        if term_event::poll(INPUT_POLL_INTERVAL)? {
            match term_event::read()? {
                Event::Key(key) => {
                    app::dispatch_key(app, terminal, key)?;
                    needs_redraw = true;
                }
                Event::Resize(..) => needs_redraw = true,
                _ => {}
            }
        } else if app.interrupt.take() || app.message_pending() {
            // Producer appended lines, or a status banner may have expired
            needs_redraw = true;
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
