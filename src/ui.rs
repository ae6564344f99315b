//! Pieces of the terminal UI shared by the launcher and the chat widget

pub mod helpers;

use crate::theme::ThemeColors;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::time::{Duration, Instant};
use unicode_width::UnicodeWidthStr;

/// How long a notification stays on screen
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

/// Transient toast in the top-right corner
#[derive(Debug, Clone)]
pub struct Notification {
    pub text: String,
    pub kind: NotificationKind,
    pub shown_at: Instant,
}

impl Notification {
    pub fn new(text: impl Into<String>, kind: NotificationKind) -> Self {
        Self {
            text: text.into(),
            kind,
            shown_at: Instant::now(),
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.duration_since(self.shown_at) >= NOTIFICATION_TTL
    }
}

/// Drop `slot` once its notification has expired. Returns true when it did.
pub fn expire(slot: &mut Option<Notification>, now: Instant) -> bool {
    if slot.as_ref().is_some_and(|n| n.is_expired(now)) {
        *slot = None;
        return true;
    }
    false
}

pub fn render_notification(frame: &mut Frame, area: Rect, note: &Notification, colors: &ThemeColors) {
    let accent = match note.kind {
        NotificationKind::Info => colors.info,
        NotificationKind::Error => colors.error,
    };
    let max_w = area.width.saturating_sub(4).max(10);
    let width = (note.text.width() as u16 + 4).min(max_w);
    let rect = Rect::new(
        area.x + area.width.saturating_sub(width + 1),
        area.y + 1,
        width,
        3.min(area.height),
    );
    frame.render_widget(Clear, rect);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(accent))
        .style(Style::default().bg(colors.bg_panel));
    let text = Paragraph::new(Line::from(Span::styled(
        note.text.clone(),
        Style::default().fg(accent).add_modifier(Modifier::BOLD),
    )))
    .wrap(Wrap { trim: true })
    .block(block);
    frame.render_widget(text, rect);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expire_after_ttl() {
        let mut slot = Some(Notification::new("saved", NotificationKind::Info));
        let shown = slot.as_ref().map(|n| n.shown_at).unwrap();
        assert!(!expire(&mut slot, shown + Duration::from_millis(2900)));
        assert!(slot.is_some());
        assert!(expire(&mut slot, shown + NOTIFICATION_TTL));
        assert!(slot.is_none());
        assert!(!expire(&mut slot, shown + NOTIFICATION_TTL));
    }

    #[test]
    fn test_notification_accent_follows_kind() {
        use ratatui::{backend::TestBackend, Terminal};

        let colors = ThemeColors::DARK;
        let mut terminal = Terminal::new(TestBackend::new(40, 10)).unwrap();
        for (kind, accent) in [
            (NotificationKind::Info, colors.info),
            (NotificationKind::Error, colors.error),
        ] {
            let note = Notification::new("saved", kind);
            terminal
                .draw(|frame| render_notification(frame, frame.area(), &note, &colors))
                .unwrap();
            // "saved" is 5 columns, so the toast is 9 wide and starts at x = 40 - 10
            let corner = &terminal.backend().buffer()[(30, 1)];
            assert_eq!(corner.fg, accent);
        }
    }
}
