use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use crossterm::event::{self, Event};
use tracing::Level;

use tfm_dirdiff::diff::DirectoryDiffViewer;
use tfm_dirdiff::layer::UILayerStack;
use tfm_dirdiff::renderer::Renderer;
use tfm_dirdiff::terminal::{self, RatatuiRenderer, TerminalGuard};

/// How long the event loop blocks waiting for terminal input before
/// re-rendering anyway, so background scan progress keeps animating.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser)]
#[command(name = "tfm-dirdiff")]
#[command(about = "Progressive two-tree directory diff viewer")]
#[command(version = "0.1.0")]
struct Cli {
    /// Left directory to compare
    left: PathBuf,

    /// Right directory to compare
    right: PathBuf,

    /// Show dotfiles on both sides
    #[arg(long)]
    hidden: bool,

    /// Enable verbose logging
    #[arg(long, short)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(log_level).init();

    if !cli.left.is_dir() {
        eprintln!("Error: left path '{}' is not a directory", cli.left.display());
        std::process::exit(1);
    }
    if !cli.right.is_dir() {
        eprintln!("Error: right path '{}' is not a directory", cli.right.display());
        std::process::exit(1);
    }

    let show_hidden = Arc::new(AtomicBool::new(cli.hidden));
    let show_hidden_accessor = {
        let show_hidden = show_hidden.clone();
        Arc::new(move || show_hidden.load(Ordering::Relaxed)) as Arc<dyn Fn() -> bool + Send + Sync>
    };

    let viewer = DirectoryDiffViewer::new(cli.left, cli.right, show_hidden_accessor)?;

    let _guard = TerminalGuard::enter()?;
    let mut renderer = RatatuiRenderer::new()?;
    renderer.enable_mouse_events(true);

    let mut stack = UILayerStack::new();
    stack.push(Box::new(viewer));

    while !stack.is_empty() {
        if event::poll(POLL_INTERVAL)? {
            match event::read()? {
                Event::Key(key) => {
                    if let Some(key_event) = terminal::translate_key_event(key) {
                        stack.dispatch_key_event(&key_event);
                    }
                }
                Event::Mouse(mouse) => {
                    if let Some(mouse_event) = terminal::translate_mouse_event(mouse) {
                        stack.dispatch_mouse_event(&mouse_event);
                    }
                }
                Event::Resize(_, _) => {
                    renderer.sync_size()?;
                    stack.dispatch_system_event(&terminal::resize_system_event());
                }
                _ => {}
            }
        }

        stack.collect_pending_pushes();
        stack.pop_closed_layers();
        stack.render(&mut renderer);
        renderer.refresh()?;
    }

    Ok(())
}
