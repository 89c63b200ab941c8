//! Fleet screen: the whole dashboard.
//!
//! Layout:
//! ┌─ EtherWatch · Live Telemetry ───────────────────────────────────────┐
//! │ Devices / Alerts / Interfaces / Aggregate throughput / Demo mode     │
//! │ Last update · Offline                                                │
//! └──────────────────────────────────────────────────────────────────────┘
//!  Attention  leaf-11 (ALERT) · …
//! ┌─ Fabric devices ──────────┐┌─ <device> ───────────────────────────────┐
//! │ status id rx tx drops lat ││ totals                                   │
//! │                           ││ interface rows                           │
//! │                           ││ history charts (when expanded)           │
//! └───────────────────────────┘└──────────────────────────────────────────┘

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Local, Utc};
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::symbols::Marker;
use ratatui::text::{Line, Span};
use ratatui::widgets::canvas::{Canvas, Context, Line as CanvasLine};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, TableState, Wrap};
use tracing::debug;

use etherwatch_core::{
    Device, Field, HistoryCache, HistoryConfig, HistoryEntry, HistorySource, Snapshot, Status,
    to_plot_points,
};

use crate::action::Action;
use crate::component::Component;
use crate::theme;
use crate::widgets::rate_fmt::{fmt_gbps, fmt_latency, fmt_mbps};
use crate::widgets::status_badge::status_span;

/// Plot area the normalizer targets; the canvas scales it to the cell grid.
const CHART_WIDTH: f64 = 220.0;
const CHART_HEIGHT: f64 = 70.0;

pub struct FleetScreen<S: HistorySource> {
    snapshot: Arc<Snapshot>,
    table_state: TableState,
    /// One cache per device that has been expanded at least once.
    history: HashMap<String, HistoryCache<S>>,
    source: Arc<S>,
    history_config: HistoryConfig,
    controller_origin: String,
}

impl<S: HistorySource> FleetScreen<S> {
    pub fn new(
        source: Arc<S>,
        history_config: HistoryConfig,
        controller_origin: impl Into<String>,
    ) -> Self {
        Self {
            snapshot: Arc::new(Snapshot::empty()),
            table_state: TableState::default(),
            history: HashMap::new(),
            source,
            history_config,
            controller_origin: controller_origin.into(),
        }
    }

    fn selected_index(&self) -> Option<usize> {
        self.table_state.selected()
    }

    fn selected_device(&self) -> Option<&Device> {
        self.selected_index()
            .and_then(|idx| self.snapshot.devices.get(idx))
    }

    fn is_expanded(&self, device_id: &str) -> bool {
        self.history
            .get(device_id)
            .is_some_and(HistoryCache::is_expanded)
    }

    fn select(&mut self, idx: usize) {
        let len = self.snapshot.devices.len();
        if len == 0 {
            self.table_state.select(None);
        } else {
            self.table_state.select(Some(idx.min(len - 1)));
        }
    }

    fn select_next(&mut self) {
        let next = self.selected_index().map_or(0, |i| i.saturating_add(1));
        self.select(next);
    }

    fn select_prev(&mut self) {
        let prev = self.selected_index().map_or(0, |i| i.saturating_sub(1));
        self.select(prev);
    }

    /// Swap in a new snapshot and bring the history caches in line with it.
    fn apply_snapshot(&mut self, snapshot: Arc<Snapshot>) {
        let demo = snapshot.is_synthetic();
        self.history
            .retain(|id, _| snapshot.device(id).is_some());

        for (id, cache) in &mut self.history {
            if let Some(device) = snapshot.device(id) {
                cache.set_demo_mode(demo);
                cache.set_interfaces(device.iface_names());
            }
        }

        // Keep the same device selected when it survives a reorder.
        let selected_id = self.selected_device().map(|d| d.id.clone());
        self.snapshot = snapshot;
        let idx = selected_id
            .and_then(|id| self.snapshot.devices.iter().position(|d| d.id == id))
            .or(self.selected_index())
            .unwrap_or(0);
        self.select(idx);
    }

    fn toggle_expand(&mut self) {
        let Some(device) = self.selected_device() else {
            return;
        };
        if device.ifaces.is_empty() {
            return;
        }
        let id = device.id.clone();
        let names = device.iface_names();
        let demo = self.snapshot.is_synthetic();

        let cache = self.history.entry(id.clone()).or_insert_with(|| {
            HistoryCache::new(
                id.clone(),
                names,
                Arc::clone(&self.source),
                self.history_config,
            )
        });
        cache.set_demo_mode(demo);
        if cache.is_expanded() {
            debug!(device_id = %id, "collapsing device");
            cache.collapse();
        } else {
            debug!(device_id = %id, demo, "expanding device");
            cache.expand();
        }
    }

    // ── Rendering ────────────────────────────────────────────────────

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(" EtherWatch · Live Telemetry ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let snap = &self.snapshot;
        let totals = snap.totals();
        let alerts = snap.alerts().count();
        let alert_style = if alerts > 0 {
            Style::default().fg(theme::ALERT_RED).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme::OK_GREEN).add_modifier(Modifier::BOLD)
        };

        let mut summary = vec![
            Span::styled(" Devices online ", theme::muted()),
            Span::styled(snap.devices.len().to_string(), theme::metric_value()),
            Span::styled("   Alerts glowing ", theme::muted()),
            Span::styled(alerts.to_string(), alert_style),
            Span::styled("   Interfaces streaming ", theme::muted()),
            Span::styled(totals.interfaces.to_string(), theme::metric_value()),
            Span::styled("   Aggregate throughput ", theme::muted()),
            Span::styled(
                format!("{} Gbps", fmt_gbps(totals.rx_bps + totals.tx_bps)),
                theme::metric_value(),
            ),
        ];
        if snap.is_synthetic() {
            summary.push(Span::styled("   Demo mode ", theme::muted()));
            summary.push(Span::styled(
                "Synthetic stream",
                Style::default().fg(theme::ACCENT).add_modifier(Modifier::BOLD),
            ));
        }

        let meta = Line::from(vec![
            Span::styled(" Last update · ", theme::muted()),
            Span::styled(last_update(snap), theme::table_row()),
            Span::styled(" · Offline: ", theme::muted()),
            Span::styled(snap.offline().count().to_string(), theme::table_row()),
        ]);

        frame.render_widget(
            Paragraph::new(vec![Line::from(summary), meta]).block(block),
            area,
        );
    }

    fn render_attention(&self, frame: &mut Frame, area: Rect) {
        let listed = self
            .snapshot
            .alerts()
            .map(|d| format!("{} ({})", d.id, d.status))
            .collect::<Vec<_>>()
            .join(" · ");
        let line = Line::from(vec![
            Span::styled(" Attention  ", theme::muted()),
            Span::styled(
                listed,
                Style::default().fg(theme::ALERT_RED).add_modifier(Modifier::BOLD),
            ),
        ]);
        frame.render_widget(Paragraph::new(line), area);
    }

    fn render_waiting(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(" Fabric devices ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let text = vec![
            Line::from(Span::styled("Waiting for telemetry…", theme::metric_value())),
            Line::from(Span::styled(
                format!("Listening to {} for fleet snapshots.", self.controller_origin),
                theme::muted(),
            )),
        ];
        frame.render_widget(
            Paragraph::new(text).block(block).wrap(Wrap { trim: true }),
            area,
        );
    }

    fn render_device_table(&self, frame: &mut Frame, area: Rect) {
        let block = Block::default()
            .title(Span::styled(" Fabric devices ", theme::title_style()))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());

        let header = Row::new(vec!["Status", "Device", "Rx Mbps", "Tx Mbps", "Drops", "Avg lat"])
            .style(theme::table_header());

        let rows: Vec<Row> = self
            .snapshot
            .devices
            .iter()
            .map(|device| {
                let agg = device.aggregates();
                let marker = if self.is_expanded(&device.id) { "▾ " } else { "▸ " };
                Row::new(vec![
                    Cell::from(status_span(device.status)),
                    Cell::from(format!("{marker}{}", device.id))
                        .style(Style::default().fg(theme::ACCENT)),
                    Cell::from(fmt_mbps(agg.rx_bps)),
                    Cell::from(fmt_mbps(agg.tx_bps)),
                    Cell::from(agg.drops.to_string()),
                    Cell::from(fmt_latency(agg.avg_latency_ms)),
                ])
                .style(theme::table_row())
            })
            .collect();

        let widths = [
            Constraint::Length(10), // status badge
            Constraint::Fill(2),    // id (flex)
            Constraint::Length(9),  // rx
            Constraint::Length(9),  // tx
            Constraint::Length(6),  // drops
            Constraint::Length(9),  // latency
        ];

        let table = Table::new(rows, widths)
            .header(header)
            .block(block)
            .row_highlight_style(theme::table_selected());

        let mut state = self.table_state;
        frame.render_stateful_widget(table, area, &mut state);
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect, device: &Device) {
        let block = Block::default()
            .title(Line::from(vec![
                Span::styled(format!(" {} ", device.id), theme::title_style()),
                status_span(device.status),
                Span::raw(" "),
            ]))
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(theme::border_default());
        let inner = block.inner(area);
        frame.render_widget(block, area);

        let iface_rows = u16::try_from(device.ifaces.len())
            .unwrap_or(u16::MAX)
            .saturating_add(1);
        let layout = Layout::vertical([
            Constraint::Length(1),          // totals
            Constraint::Length(iface_rows), // interface table
            Constraint::Length(1),          // spacer
            Constraint::Min(0),             // history
        ])
        .split(inner);

        let agg = device.aggregates();
        let totals = Line::from(vec![
            Span::styled("Total Rx ", theme::muted()),
            Span::styled(format!("{} Mbps", fmt_mbps(agg.rx_bps)), theme::metric_value()),
            Span::styled("  Total Tx ", theme::muted()),
            Span::styled(format!("{} Mbps", fmt_mbps(agg.tx_bps)), theme::metric_value()),
            Span::styled("  Frame drops ", theme::muted()),
            Span::styled(agg.drops.to_string(), theme::metric_value()),
            Span::styled("  Avg latency ", theme::muted()),
            Span::styled(fmt_latency(agg.avg_latency_ms), theme::metric_value()),
        ]);
        frame.render_widget(Paragraph::new(totals), layout[0]);

        self.render_interfaces(frame, layout[1], device);
        self.render_history(frame, layout[3], device);
    }

    #[allow(clippy::unused_self)]
    fn render_interfaces(&self, frame: &mut Frame, area: Rect, device: &Device) {
        let header = Row::new(vec!["Iface", "Status", "Rx Mbps", "Tx Mbps", "Drops", "Queue", "Latency"])
            .style(theme::table_header());
        let rows: Vec<Row> = device
            .ifaces
            .iter()
            .map(|ifc| {
                Row::new(vec![
                    Cell::from(ifc.name.clone()),
                    Cell::from(status_span(ifc.status)),
                    Cell::from(fmt_mbps(ifc.rx_bps)),
                    Cell::from(fmt_mbps(ifc.tx_bps)),
                    Cell::from(ifc.drops.to_string()),
                    Cell::from(ifc.queue_depth.to_string()),
                    Cell::from(fmt_latency(ifc.latency_ms)),
                ])
                .style(theme::table_row())
            })
            .collect();
        let widths = [
            Constraint::Fill(2),
            Constraint::Length(10),
            Constraint::Length(9),
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(9),
        ];
        frame.render_widget(Table::new(rows, widths).header(header), area);
    }

    fn render_history(&self, frame: &mut Frame, area: Rect, device: &Device) {
        let demo = self.snapshot.is_synthetic();
        let Some(cache) = self.history.get(&device.id).filter(|c| c.is_expanded()) else {
            let label = if demo { "show demo info" } else { "show history" };
            let hint = Line::from(vec![
                Span::styled("Enter ", theme::key_hint_key()),
                Span::styled(label, theme::key_hint()),
            ]);
            frame.render_widget(Paragraph::new(hint), area);
            return;
        };

        if demo {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "History trails are disabled in demo mode.",
                    theme::muted(),
                )),
                area,
            );
            return;
        }

        let count = u32::try_from(device.ifaces.len()).unwrap_or(u32::MAX).max(1);
        let slots = Layout::vertical(
            device
                .ifaces
                .iter()
                .map(|_| Constraint::Ratio(1, count))
                .collect::<Vec<_>>(),
        )
        .split(area);

        for (ifc, slot) in device.ifaces.iter().zip(slots.iter()) {
            let entry = cache.entry(&ifc.name).unwrap_or_default();
            self.render_iface_history(frame, *slot, &ifc.name, &entry);
        }
    }

    fn render_iface_history(&self, frame: &mut Frame, area: Rect, iface: &str, entry: &HistoryEntry) {
        let message = if entry.loading {
            Some(Span::styled("Loading history…", theme::muted()))
        } else if let Some(err) = &entry.error {
            Some(Span::styled(
                format!("History error: {err}"),
                Style::default().fg(theme::ALERT_RED),
            ))
        } else if entry.samples.is_empty() {
            Some(Span::styled("No recent history", theme::muted()))
        } else {
            None
        };

        if let Some(message) = message {
            let lines = vec![
                Line::from(Span::styled(iface.to_owned(), theme::table_row())),
                Line::from(message),
            ];
            frame.render_widget(Paragraph::new(lines), area);
            return;
        }

        let layout = Layout::vertical([Constraint::Length(1), Constraint::Min(0)]).split(area);

        let caption = match entry.samples.last() {
            Some(latest) => format!(
                "rx {} / tx {} Mbps · {}",
                fmt_mbps(latest.rx_bps),
                fmt_mbps(latest.tx_bps),
                local_time(latest.timestamp),
            ),
            None => String::new(),
        };
        let label = Line::from(vec![
            Span::styled(
                format!("{iface} · last {} min  ", self.history_config.window_minutes),
                theme::table_row(),
            ),
            Span::styled("● rx ", Style::default().fg(theme::RX_LINE)),
            Span::styled("● tx  ", Style::default().fg(theme::TX_LINE)),
            Span::styled(caption, theme::muted()),
        ]);
        frame.render_widget(Paragraph::new(label), layout[0]);

        let rx = to_plot_points(&entry.samples, Field::Rx, CHART_WIDTH, CHART_HEIGHT);
        let tx = to_plot_points(&entry.samples, Field::Tx, CHART_WIDTH, CHART_HEIGHT);

        let canvas = Canvas::default()
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(theme::border_default()),
            )
            .marker(Marker::Braille)
            .x_bounds([0.0, CHART_WIDTH])
            .y_bounds([0.0, CHART_HEIGHT])
            .paint(|ctx: &mut Context<'_>| {
                draw_series(ctx, &tx, theme::TX_LINE);
                draw_series(ctx, &rx, theme::RX_LINE);
            });
        frame.render_widget(canvas, layout[1]);
    }
}

/// Plot points use screen coordinates (y down); the canvas has y up.
fn draw_series(ctx: &mut Context<'_>, points: &[etherwatch_core::PlotPoint], color: ratatui::style::Color) {
    for pair in points.windows(2) {
        if let [a, b] = pair {
            ctx.draw(&CanvasLine {
                x1: a.x,
                y1: CHART_HEIGHT - a.y,
                x2: b.x,
                y2: CHART_HEIGHT - b.y,
                color,
            });
        }
    }
}

fn local_time(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M:%S").to_string()
}

fn last_update(snap: &Snapshot) -> String {
    if snap.captured_at == DateTime::UNIX_EPOCH {
        "—".into()
    } else {
        local_time(snap.captured_at)
    }
}

impl<S: HistorySource> Component for FleetScreen<S> {
    fn handle_key_event(&mut self, key: KeyEvent) -> Result<Option<Action>> {
        let action = match key.code {
            KeyCode::Down | KeyCode::Char('j') => Some(Action::SelectNext),
            KeyCode::Up | KeyCode::Char('k') => Some(Action::SelectPrev),
            KeyCode::Enter => Some(Action::ToggleExpand),
            _ => None,
        };
        Ok(action)
    }

    fn update(&mut self, action: &Action) -> Result<Option<Action>> {
        match action {
            Action::SnapshotUpdated(snap) => self.apply_snapshot(Arc::clone(snap)),
            Action::SelectNext => self.select_next(),
            Action::SelectPrev => self.select_prev(),
            Action::ToggleExpand => self.toggle_expand(),
            _ => {}
        }
        Ok(None)
    }

    fn render(&self, frame: &mut Frame, area: Rect) {
        let has_alerts = self.snapshot.alerts().next().is_some();
        let layout = Layout::vertical([
            Constraint::Length(4),
            Constraint::Length(u16::from(has_alerts)),
            Constraint::Min(1),
        ])
        .split(area);

        self.render_header(frame, layout[0]);
        if has_alerts {
            self.render_attention(frame, layout[1]);
        }

        if self.snapshot.is_empty() {
            self.render_waiting(frame, layout[2]);
            return;
        }

        let body = Layout::horizontal([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(layout[2]);
        self.render_device_table(frame, body[0]);
        if let Some(device) = self.selected_device() {
            self.render_detail(frame, body[1], device);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use crossterm::event::KeyModifiers;
    use etherwatch_core::{CoreError, HistorySample, Interface, SnapshotSource, synthetic};
    use pretty_assertions::assert_eq;
    use ratatui::{Terminal, backend::TestBackend};

    use super::*;

    #[derive(Default)]
    struct StaticHistory {
        samples: Vec<HistorySample>,
        fail_with: Option<u16>,
        calls: AtomicUsize,
    }

    impl HistorySource for StaticHistory {
        async fn fetch_history(
            &self,
            _device_id: &str,
            _iface: &str,
            _window_minutes: u32,
        ) -> Result<Vec<HistorySample>, CoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_with {
                Some(status) => Err(CoreError::Api {
                    message: format!("history request failed ({status})"),
                    status: Some(status),
                }),
                None => Ok(self.samples.clone()),
            }
        }
    }

    fn leaf_snapshot() -> Arc<Snapshot> {
        Arc::new(Snapshot {
            captured_at: DateTime::from_timestamp_millis(1_000).unwrap(),
            devices: vec![Device {
                id: "leaf-1".into(),
                status: Status::Ok,
                ifaces: vec![Interface {
                    rx_bps: 1e9,
                    tx_bps: 8e8,
                    latency_ms: 0.5,
                    ..Interface::idle("e1")
                }],
            }],
            source: SnapshotSource::Live,
        })
    }

    fn demo_snapshot() -> Arc<Snapshot> {
        Arc::new(synthetic::create_snapshot(
            DateTime::from_timestamp_millis(5_000).unwrap(),
        ))
    }

    fn screen(source: StaticHistory) -> (FleetScreen<StaticHistory>, Arc<StaticHistory>) {
        let source = Arc::new(source);
        let screen = FleetScreen::new(
            Arc::clone(&source),
            HistoryConfig::default(),
            "http://localhost:8080",
        );
        (screen, source)
    }

    fn render(screen: &FleetScreen<StaticHistory>) -> String {
        let (width, height) = (160_u16, 30_u16);
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|f| screen.render(f, f.area())).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .chunks(usize::from(width))
            .map(|row| row.iter().map(ratatui::buffer::Cell::symbol).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn press(screen: &mut FleetScreen<StaticHistory>, code: KeyCode) {
        if let Some(action) = screen.handle_key_event(key(code)).unwrap() {
            screen.update(&action).unwrap();
        }
    }

    async fn wait_for_history(screen: &FleetScreen<StaticHistory>, device_id: &str) {
        let mut rx = screen.history[device_id].subscribe();
        tokio::time::timeout(
            Duration::from_secs(30),
            rx.wait_for(|s| {
                s.entries()
                    .all(|(_, e)| !e.loading && (e.fetched_at.is_some() || e.error.is_some()))
            }),
        )
        .await
        .unwrap()
        .unwrap();
    }

    #[test]
    fn empty_fleet_shows_waiting_message() {
        let (screen, _) = screen(StaticHistory::default());
        let out = render(&screen);
        assert!(out.contains("Waiting for telemetry…"));
        assert!(out.contains("http://localhost:8080"));
        assert!(out.contains("Last update · —"));
        assert!(!out.contains("Attention"));
    }

    #[test]
    fn live_snapshot_renders_device_totals() {
        let (mut screen, _) = screen(StaticHistory::default());
        screen.update(&Action::SnapshotUpdated(leaf_snapshot())).unwrap();

        let out = render(&screen);
        assert!(out.contains("Devices online 1"));
        assert!(out.contains("Alerts glowing 0"));
        assert!(out.contains("Interfaces streaming 1"));
        assert!(out.contains("Aggregate throughput 1.80 Gbps"));
        assert!(out.contains("leaf-1"));
        assert!(out.contains("Total Rx 1000.0 Mbps"));
        assert!(out.contains("Total Tx 800.0 Mbps"));
        assert!(out.contains("● OK"));
        assert!(!out.contains("Demo mode"));
        assert!(!out.contains("Attention"));
    }

    #[test]
    fn demo_snapshot_flags_alerts_and_demo_mode() {
        let (mut screen, _) = screen(StaticHistory::default());
        screen.update(&Action::SnapshotUpdated(demo_snapshot())).unwrap();

        let out = render(&screen);
        assert!(out.contains("Demo mode Synthetic stream"));
        assert!(out.contains("Attention  leaf-11 (ALERT) · leaf-24 (OFFLINE)"));
        assert!(out.contains("Offline: 1"));
        assert!(out.contains("Alerts glowing 2"));
    }

    #[test]
    fn selection_moves_and_clamps() {
        let (mut screen, _) = screen(StaticHistory::default());
        screen.update(&Action::SnapshotUpdated(demo_snapshot())).unwrap();
        assert_eq!(screen.selected_device().map(|d| d.id.as_str()), Some("spine-01"));

        press(&mut screen, KeyCode::Char('j'));
        press(&mut screen, KeyCode::Down);
        press(&mut screen, KeyCode::Down);
        assert_eq!(screen.selected_device().map(|d| d.id.as_str()), Some("leaf-24"));

        press(&mut screen, KeyCode::Up);
        press(&mut screen, KeyCode::Char('k'));
        press(&mut screen, KeyCode::Char('k'));
        assert_eq!(screen.selected_device().map(|d| d.id.as_str()), Some("spine-01"));
    }

    #[test]
    fn selection_follows_device_across_reorder() {
        let (mut screen, _) = screen(StaticHistory::default());
        let snap = demo_snapshot();
        screen.update(&Action::SnapshotUpdated(Arc::clone(&snap))).unwrap();
        press(&mut screen, KeyCode::Down);
        press(&mut screen, KeyCode::Down);

        let mut reordered = (*snap).clone();
        reordered.devices.reverse();
        screen.update(&Action::SnapshotUpdated(Arc::new(reordered))).unwrap();
        assert_eq!(screen.selected_device().map(|d| d.id.as_str()), Some("leaf-24"));
        assert_eq!(screen.selected_index(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn demo_mode_expansion_never_fetches() {
        let (mut screen, source) = screen(StaticHistory::default());
        screen.update(&Action::SnapshotUpdated(demo_snapshot())).unwrap();
        press(&mut screen, KeyCode::Enter);
        tokio::time::sleep(Duration::from_secs(30)).await;

        assert!(screen.is_expanded("spine-01"));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
        assert!(render(&screen).contains("History trails are disabled in demo mode."));
    }

    #[tokio::test(start_paused = true)]
    async fn expanded_device_renders_history_chart() {
        let samples = vec![
            HistorySample::new(DateTime::from_timestamp_millis(0).unwrap(), 1e9, 5e8),
            HistorySample::new(DateTime::from_timestamp_millis(5_000).unwrap(), 1.2e9, 6e8),
        ];
        let (mut screen, source) = screen(StaticHistory {
            samples,
            ..StaticHistory::default()
        });
        screen.update(&Action::SnapshotUpdated(leaf_snapshot())).unwrap();
        assert!(render(&screen).contains("Enter show history"));

        press(&mut screen, KeyCode::Enter);
        wait_for_history(&screen, "leaf-1").await;

        let out = render(&screen);
        assert!(out.contains("e1 · last 5 min"));
        assert!(out.contains("rx 1200.0 / tx 600.0 Mbps"));
        assert!(source.calls.load(Ordering::SeqCst) >= 1);

        // Collapse again: the hint comes back and polling stops.
        press(&mut screen, KeyCode::Enter);
        let calls = source.calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), calls);
        assert!(render(&screen).contains("Enter show history"));
    }

    #[tokio::test(start_paused = true)]
    async fn history_failure_is_shown_inline() {
        let (mut screen, _) = screen(StaticHistory {
            fail_with: Some(503),
            ..StaticHistory::default()
        });
        screen.update(&Action::SnapshotUpdated(leaf_snapshot())).unwrap();
        press(&mut screen, KeyCode::Enter);
        wait_for_history(&screen, "leaf-1").await;

        assert!(render(&screen).contains("History error: history request failed (503)"));
    }

    #[tokio::test(start_paused = true)]
    async fn empty_history_says_so() {
        let (mut screen, _) = screen(StaticHistory::default());
        screen.update(&Action::SnapshotUpdated(leaf_snapshot())).unwrap();
        press(&mut screen, KeyCode::Enter);
        wait_for_history(&screen, "leaf-1").await;

        assert!(render(&screen).contains("No recent history"));
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_device_drops_its_history() {
        let (mut screen, _) = screen(StaticHistory::default());
        screen.update(&Action::SnapshotUpdated(leaf_snapshot())).unwrap();
        press(&mut screen, KeyCode::Enter);
        assert!(screen.history.contains_key("leaf-1"));

        screen.update(&Action::SnapshotUpdated(demo_snapshot())).unwrap();
        assert!(!screen.history.contains_key("leaf-1"));
        assert_eq!(screen.selected_device().map(|d| d.id.as_str()), Some("spine-01"));
    }
}
