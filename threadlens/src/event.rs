//! Event bus for threadlens.
//!
//! Terminal input, timers, the git worker and mapping loads all funnel into a
//! single `AppEvent` stream on a tokio unbounded channel.
//!
//! Two independent intervals drive the loop:
//! - **Render** (33 ms): one `terminal.draw()` and at most one geometry pass.
//! - **Tick** (250 ms): mount retries and other housekeeping.

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind, MouseEvent};
use futures::{FutureExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;

use threadlens_core::pipeline::PanelState;

#[derive(Debug)]
#[non_exhaustive]
pub enum AppEvent {
    /// Key press (`KeyEventKind::Press` only; release/repeat are dropped).
    Key(KeyEvent),
    Mouse(MouseEvent),
    Resize(u16, u16),
    Tick,
    Render,
    GitResult(Box<crate::git::types::GitResultPayload>),
    /// A mapping load finished. `generation` identifies the request so a
    /// superseded load cannot overwrite a newer one.
    MappingLoaded { generation: u64, state: PanelState },
    Quit,
}

/// Both ends of the event channel. `tx` is cloned into every producer.
pub struct EventHandler {
    pub tx: mpsc::UnboundedSender<AppEvent>,
    pub rx: mpsc::UnboundedReceiver<AppEvent>,
}

impl EventHandler {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawns the task that turns timers and crossterm input into events.
///
/// The crossterm future is fused so a terminated stream is never polled again.
/// The task ends when the receiver is gone.
pub fn spawn_event_task(tx: mpsc::UnboundedSender<AppEvent>) {
    tokio::spawn(async move {
        let mut tick_interval = interval(Duration::from_millis(250));
        let mut render_interval = interval(Duration::from_millis(33));
        let mut reader = EventStream::new();

        loop {
            let event = tokio::select! {
                _ = tick_interval.tick() => AppEvent::Tick,
                _ = render_interval.tick() => AppEvent::Render,
                maybe_event = reader.next().fuse() => match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == KeyEventKind::Press => AppEvent::Key(key),
                    Some(Ok(Event::Resize(w, h))) => AppEvent::Resize(w, h),
                    Some(Ok(Event::Mouse(mouse))) => AppEvent::Mouse(mouse),
                    Some(Ok(_)) => continue,
                    Some(Err(err)) => {
                        tracing::warn!(error = %err, "terminal input error");
                        continue;
                    }
                    None => AppEvent::Quit,
                },
            };
            if tx.send(event).is_err() {
                break;
            }
        }
    });
}
