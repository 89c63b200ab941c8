//! Application core: event loop and action dispatch.

use std::sync::Arc;
use std::time::Duration;

use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    text::{Line, Span},
    widgets::Paragraph,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use etherwatch_core::{HistoryClient, HistoryConfig, LiveSync, SyncState};

use crate::action::Action;
use crate::component::Component;
use crate::data_bridge::spawn_data_bridge;
use crate::event::{Event, EventReader};
use crate::screens::FleetScreen;
use crate::theme;
use crate::tui::Tui;
use crate::widgets::status_badge::sync_span;

/// How long to wait for the sync controller to wind down on quit.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Top-level application state and event loop.
pub struct App {
    screen: FleetScreen<HistoryClient>,
    running: bool,
    sync_state: SyncState,
    controller_origin: String,
    /// Live sync controller; handed to the data bridge on `run`.
    sync: LiveSync,
    action_tx: mpsc::UnboundedSender<Action>,
    action_rx: mpsc::UnboundedReceiver<Action>,
    /// Cancellation token for the data bridge task.
    data_cancel: CancellationToken,
}

impl App {
    pub fn new(
        sync: LiveSync,
        history: HistoryClient,
        history_config: HistoryConfig,
        controller_origin: impl Into<String>,
    ) -> Self {
        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let controller_origin = controller_origin.into();
        Self {
            screen: FleetScreen::new(Arc::new(history), history_config, controller_origin.clone()),
            running: true,
            sync_state: sync.state(),
            controller_origin,
            sync,
            action_tx,
            action_rx,
            data_cancel: CancellationToken::new(),
        }
    }

    /// Run the main event loop.
    pub async fn run(&mut self) -> Result<()> {
        let mut tui = Tui::new()?;
        tui.enter()?;

        let bridge = tokio::spawn(spawn_data_bridge(
            self.sync.clone(),
            self.action_tx.clone(),
            self.data_cancel.clone(),
        ));

        // ~30 FPS
        let mut events = EventReader::new(Duration::from_millis(33));

        info!(origin = %self.controller_origin, "TUI event loop started");

        while self.running {
            let Some(event) = events.next().await else {
                break;
            };

            match event {
                Event::Key(key) => {
                    if let Some(action) = self.handle_key_event(key)? {
                        self.action_tx.send(action)?;
                    }
                }
                Event::Render => {
                    self.action_tx.send(Action::Render)?;
                }
            }

            while let Ok(action) = self.action_rx.try_recv() {
                self.process_action(&action)?;

                if let Action::Render = action {
                    tui.draw(|frame| self.render(frame))?;
                }
            }
        }

        events.stop();
        self.data_cancel.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, bridge).await.is_err() {
            warn!("data bridge did not stop in time");
        }
        info!("TUI event loop ended");
        Ok(())
    }

    /// Global keys first, then the fleet screen.
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        if let Some(action) = global_action(key) {
            return Ok(Some(action));
        }
        self.screen.handle_key_event(key)
    }

    fn process_action(&mut self, action: &Action) -> Result<()> {
        match action {
            Action::Quit => {
                self.running = false;
            }

            Action::SyncStateChanged(state) => {
                debug!(from = %self.sync_state, to = %state, "sync state changed");
                self.sync_state = *state;
            }

            Action::Render => {}

            other => {
                if let Some(follow_up) = self.screen.update(other)? {
                    self.action_tx.send(follow_up)?;
                }
            }
        }
        Ok(())
    }

    fn render(&self, frame: &mut Frame) {
        let layout = Layout::vertical([Constraint::Min(1), Constraint::Length(1)]).split(frame.area());
        self.screen.render(frame, layout[0]);
        render_status_bar(frame, layout[1], self.sync_state, &self.controller_origin);
    }
}

fn global_action(key: KeyEvent) -> Option<Action> {
    match (key.modifiers, key.code) {
        (KeyModifiers::CONTROL, KeyCode::Char('c')) | (KeyModifiers::NONE, KeyCode::Char('q')) => {
            Some(Action::Quit)
        }
        _ => None,
    }
}

/// Feed state, controller origin, and key hints.
fn render_status_bar(frame: &mut Frame, area: Rect, state: SyncState, origin: &str) {
    let line = Line::from(vec![
        Span::raw(" "),
        sync_span(state),
        Span::styled(format!(" {origin}"), theme::muted()),
        Span::styled(" │ ", theme::key_hint()),
        Span::styled("↑/↓ ", theme::key_hint_key()),
        Span::styled("select  ", theme::key_hint()),
        Span::styled("Enter ", theme::key_hint_key()),
        Span::styled("history  ", theme::key_hint()),
        Span::styled("q ", theme::key_hint_key()),
        Span::styled("quit", theme::key_hint()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    #[test]
    fn quit_keys() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let q = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        let plain_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);

        assert!(matches!(global_action(ctrl_c), Some(Action::Quit)));
        assert!(matches!(global_action(q), Some(Action::Quit)));
        assert!(global_action(plain_c).is_none());
        assert!(global_action(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)).is_none());
    }

    #[test]
    fn status_bar_shows_feed_state_and_origin() {
        let mut terminal = Terminal::new(TestBackend::new(100, 1)).unwrap();
        terminal
            .draw(|f| render_status_bar(f, f.area(), SyncState::Fallback, "http://ctl:8080"))
            .unwrap();
        let line: String = terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(ratatui::buffer::Cell::symbol)
            .collect();
        assert!(line.contains("◌ synthetic http://ctl:8080"));
        assert!(line.contains("q quit"));
    }
}
