//! Dashboard palette and semantic styles.

use ratatui::style::{Color, Modifier, Style};

// ── Core Palette ──────────────────────────────────────────────────────

pub const ACCENT: Color = Color::Rgb(65, 209, 255); // #41d1ff
pub const EMBER: Color = Color::Rgb(255, 140, 66); // #ff8c42
pub const ALERT_RED: Color = Color::Rgb(255, 107, 107); // #ff6b6b
pub const OK_GREEN: Color = Color::Rgb(80, 250, 123); // #50fa7b
pub const WARN_YELLOW: Color = Color::Rgb(241, 250, 140); // #f1fa8c

// ── Extended Palette ──────────────────────────────────────────────────

pub const DIM_WHITE: Color = Color::Rgb(189, 193, 207); // #bdc1cf
pub const BORDER_GRAY: Color = Color::Rgb(98, 114, 164); // #6272a4
pub const BG_HIGHLIGHT: Color = Color::Rgb(40, 42, 54); // #282a36

// ── Chart series ──────────────────────────────────────────────────────

pub const RX_LINE: Color = ACCENT;
pub const TX_LINE: Color = EMBER;

// ── Semantic Styles ───────────────────────────────────────────────────

/// Title text for blocks/panels.
pub fn title_style() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}

pub fn border_default() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Table header row.
pub fn table_header() -> Style {
    Style::default()
        .fg(ACCENT)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
}

pub fn table_row() -> Style {
    Style::default().fg(DIM_WHITE)
}

/// Selected device row.
pub fn table_selected() -> Style {
    Style::default()
        .bg(BG_HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Secondary text: labels, timestamps, chart captions.
pub fn muted() -> Style {
    Style::default().fg(BORDER_GRAY)
}

pub fn metric_value() -> Style {
    Style::default().fg(DIM_WHITE).add_modifier(Modifier::BOLD)
}

/// Key hint text (e.g., "q quit").
pub fn key_hint() -> Style {
    Style::default().fg(BORDER_GRAY)
}

/// Key hint key character.
pub fn key_hint_key() -> Style {
    Style::default().fg(ACCENT).add_modifier(Modifier::BOLD)
}
