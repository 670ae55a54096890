//! Terminal setup and teardown.
//!
//! Frames are written to stderr so stdout stays usable in pipelines
//! (`threadlens --repo . | tee`); diagnostics go to the log file.

use std::io::{self, BufWriter, Stderr};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use crossterm::terminal::{self, EnterAlternateScreen, LeaveAlternateScreen};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;

pub type Tui = Terminal<CrosstermBackend<BufWriter<Stderr>>>;

/// Raw mode, alternate screen and mouse capture (pointer motion drives the
/// hunk preview). Undo with [`restore_tui`].
///
/// # Errors
///
/// Any terminal control failure.
pub fn init_tui() -> io::Result<Tui> {
    terminal::enable_raw_mode()?;
    let mut writer = BufWriter::new(io::stderr());
    execute!(writer, EnterAlternateScreen, EnableMouseCapture)?;
    Terminal::new(CrosstermBackend::new(writer))
}

/// Leaves the alternate screen and raw mode. Safe to call more than once,
/// and called on every exit path since ratatui does not restore on drop.
///
/// # Errors
///
/// Any terminal control failure.
pub fn restore_tui() -> io::Result<()> {
    terminal::disable_raw_mode()?;
    execute!(io::stderr(), DisableMouseCapture, LeaveAlternateScreen)
}

/// Chains a hook that puts the terminal back and logs the panic before the
/// default report prints. Install before [`init_tui`].
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore_tui();
        tracing::error!(%info, "panic");
        previous(info);
    }));
}

/// Flag raised on SIGTERM; the event loop checks it on every wakeup.
///
/// # Errors
///
/// Fails if the handler cannot be registered.
pub fn register_sigterm() -> io::Result<Arc<AtomicBool>> {
    let flag = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&flag))?;
    Ok(flag)
}
