//! threadlens: review a branch diff next to the agent conversation that
//! produced it.
//!
//! Startup order matters:
//! 1. Config and logging, before the terminal is taken over so failures can
//!    still be reported on stderr.
//! 2. Panic hook, then the SIGTERM flag, then the alternate screen.
//! 3. Event task, mapping loader and git worker. The first frame draws
//!    before any of them has produced anything.
//!
//! The event loop only exits through `break`, so `restore_tui()` always runs.

mod app;
mod config;
mod event;
mod git;
mod loader;
mod logging;
mod theme;
mod tui;
mod ui;
mod view;

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::time::Duration;

use clap::Parser as _;
use threadlens_core::db::IN_MEMORY;
use threadlens_core::discovery::MountState;
use threadlens_core::types::ConversationIdentity;

use crate::app::AppState;
use crate::config::Cli;
use crate::event::AppEvent;
use crate::loader::MappingLoader;
use crate::ui::keybindings::{self, KeyAction};

const STATE_DIR: &str = ".threadlens";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (config, warning) = config::load(&config::config_path());
    let mut config = config.with_cli(&cli);
    config.cache_path = resolve_in_repo(&cli.repo, &config.cache_path);

    logging::init(&cli.repo.join(STATE_DIR), &config.log_filter)?;
    if let Some(warning) = warning {
        tracing::warn!("{warning}");
    }
    tracing::info!(repo = %cli.repo.display(), base = %config.base, "starting");

    let theme = theme::Theme::from_name(&config.theme);
    let mut state = AppState::with_base(config.base.clone());

    tui::install_panic_hook();
    let term_flag = tui::register_sigterm()?;
    let mut terminal = tui::init_tui()?;

    let handler = event::EventHandler::new();
    event::spawn_event_task(handler.tx.clone());
    let mut rx = handler.rx;

    let loader = match MappingLoader::build(&config, &cli.repo, handler.tx.clone()) {
        Ok(loader) => loader,
        Err(err) => {
            tui::restore_tui()?;
            return Err(err);
        }
    };

    let (git_tx, git_rx) = crossbeam_channel::unbounded();
    let worker_tx = handler.tx.clone();
    let repo_path = cli.repo.clone();
    let palette = theme.diff_palette();
    std::thread::spawn(move || git::worker::git_worker_loop(repo_path, palette, git_rx, worker_tx));
    state.git_tx = Some(git_tx);
    state.request_diff();

    let mut loaded_for: Option<ConversationIdentity> = None;

    'event_loop: loop {
        tokio::select! {
            // Wakes a quiet loop so SIGTERM is noticed within 50 ms.
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
            maybe_event = rx.recv() => {
                let Some(event) = maybe_event else {
                    break 'event_loop;
                };
                match event {
                    AppEvent::Render => {
                        if let Err(err) = terminal.draw(|frame| ui::render(frame, &mut state, &theme)) {
                            tracing::error!(error = %err, "draw failed");
                            break 'event_loop;
                        }
                    }
                    AppEvent::Tick => {
                        let was_waiting = state.review.mount_state() == MountState::Waiting;
                        if let MountState::Mounted(outcome) = state.review.poll_mount() {
                            if was_waiting {
                                tracing::debug!(?outcome, "conversation panel mounted");
                                state.geometry.request();
                            }
                        }
                    }
                    AppEvent::GitResult(payload) => {
                        state.apply_git_result(*payload);
                        let identity = state.context.as_ref().map(|c| c.identity.clone());
                        if identity.is_some() && identity != loaded_for {
                            start_load(&mut state, &loader);
                            loaded_for = identity;
                        }
                    }
                    AppEvent::MappingLoaded { generation, state: panel } => {
                        state.apply_mapping(generation, panel);
                    }
                    AppEvent::Key(key) => match keybindings::handle_key(key, &mut state) {
                        KeyAction::Quit => break 'event_loop,
                        KeyAction::ReloadMapping => {
                            if let Some(context) = &state.context {
                                loader.forget(&context.identity);
                            }
                            start_load(&mut state, &loader);
                        }
                        KeyAction::Continue => {}
                    },
                    AppEvent::Mouse(mouse) => {
                        keybindings::handle_mouse(mouse, &mut state);
                    }
                    AppEvent::Resize(_, _) => state.geometry.request(),
                    AppEvent::Quit => break 'event_loop,
                }
            }
        }
        if term_flag.load(Ordering::Relaxed) {
            tracing::info!("SIGTERM received");
            break 'event_loop;
        }
    }

    tui::restore_tui()?;
    Ok(())
}

fn start_load(state: &mut AppState, loader: &MappingLoader) {
    if let Some((generation, identity, view)) = state.begin_mapping_load() {
        tracing::debug!(generation, %identity, "loading mapping");
        loader.spawn(generation, identity, view);
    }
}

/// Relative store paths live under the repository, not the working directory.
fn resolve_in_repo(repo: &Path, path: &str) -> String {
    if path == IN_MEMORY || Path::new(path).is_absolute() {
        return path.to_owned();
    }
    let resolved: PathBuf = repo.join(path);
    resolved.to_string_lossy().into_owned()
}
