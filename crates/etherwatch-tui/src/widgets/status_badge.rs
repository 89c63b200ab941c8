//! Status badges: ●/▲/○ for device and interface health, plus the feed
//! indicator shown in the status bar.

use ratatui::style::{Modifier, Style};
use ratatui::text::Span;

use etherwatch_core::{Status, SyncState};

use crate::theme;

fn status_glyph(status: Status) -> (&'static str, ratatui::style::Color) {
    match status {
        Status::Ok => ("●", theme::OK_GREEN),
        Status::Alert => ("▲", theme::ALERT_RED),
        Status::Offline => ("○", theme::BORDER_GRAY),
    }
}

/// Styled "● OK" / "▲ ALERT" / "○ OFFLINE".
pub fn status_span(status: Status) -> Span<'static> {
    let (symbol, color) = status_glyph(status);
    Span::styled(
        format!("{symbol} {status}"),
        Style::default().fg(color).add_modifier(Modifier::BOLD),
    )
}

/// Feed state for the status bar.
pub fn sync_span(state: SyncState) -> Span<'static> {
    match state {
        SyncState::Live => Span::styled("● live", Style::default().fg(theme::OK_GREEN)),
        SyncState::Connecting => {
            Span::styled("◐ connecting", Style::default().fg(theme::WARN_YELLOW))
        }
        SyncState::Fallback => Span::styled("◌ synthetic", Style::default().fg(theme::ACCENT)),
    }
}
