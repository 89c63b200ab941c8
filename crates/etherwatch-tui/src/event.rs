//! Terminal input and render ticks, merged into one channel by a
//! background tokio task.
//!
//! Resizes are not forwarded: the next render tick draws at the new size.

use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub enum Event {
    Key(KeyEvent),
    /// Render tick.
    Render,
}

/// Key presses only; releases, repeats, mouse, focus and resize are dropped.
fn map_terminal_event(event: CrosstermEvent) -> Option<Event> {
    match event {
        CrosstermEvent::Key(key) if key.kind == KeyEventKind::Press => Some(Event::Key(key)),
        _ => None,
    }
}

pub struct EventReader {
    rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventReader {
    pub fn new(render_rate: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        tokio::spawn(read_events(tx, render_rate, cancel.clone()));
        Self { rx, cancel }
    }

    /// `None` once the reader has stopped.
    pub async fn next(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventReader {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn read_events(
    tx: mpsc::UnboundedSender<Event>,
    render_rate: Duration,
    cancel: CancellationToken,
) {
    let mut terminal_events = EventStream::new();
    let mut ticks = tokio::time::interval(render_rate);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        let event = tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticks.tick() => Event::Render,
            Some(Ok(raw)) = terminal_events.next() => match map_terminal_event(raw) {
                Some(event) => event,
                None => continue,
            },
        };

        if tx.send(event).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEventState, KeyModifiers};

    use super::*;

    fn key(kind: KeyEventKind) -> CrosstermEvent {
        CrosstermEvent::Key(KeyEvent {
            code: KeyCode::Char('j'),
            modifiers: KeyModifiers::NONE,
            kind,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn key_presses_are_forwarded() {
        let mapped = map_terminal_event(key(KeyEventKind::Press));
        assert!(matches!(mapped, Some(Event::Key(k)) if k.code == KeyCode::Char('j')));
    }

    #[test]
    fn releases_and_resizes_are_dropped() {
        assert!(map_terminal_event(key(KeyEventKind::Release)).is_none());
        assert!(map_terminal_event(key(KeyEventKind::Repeat)).is_none());
        assert!(map_terminal_event(CrosstermEvent::Resize(120, 40)).is_none());
        assert!(map_terminal_event(CrosstermEvent::FocusGained).is_none());
    }
}
