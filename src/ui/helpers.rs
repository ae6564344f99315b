//! Helper functions shared by both screens

use crate::theme::ThemeColors;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Helper: Truncate to at most `max_cols` terminal columns, ending in an
/// ellipsis when something was cut
pub fn truncate_to_width(s: &str, max_cols: usize) -> String {
    if s.width() <= max_cols {
        return s.to_string();
    }
    let budget = max_cols.saturating_sub(1);
    let mut used = 0;
    let mut out = String::with_capacity(s.len().min(max_cols * 4));
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(c);
    }
    if max_cols > 0 {
        out.push('…');
    }
    out
}

/// Helper: Right-pad with spaces to exactly `cols` columns (truncating first)
pub fn pad_to_width(s: &str, cols: usize) -> String {
    let mut out = truncate_to_width(s, cols);
    let w = out.width();
    out.extend(std::iter::repeat(' ').take(cols.saturating_sub(w)));
    out
}

/// Helper: Key hint bar (`key action │ key action ...`), centered
pub fn hint_bar(hints: &[(&str, &str)], colors: &ThemeColors) -> Paragraph<'static> {
    let k = Style::default()
        .fg(colors.text_secondary)
        .add_modifier(Modifier::BOLD);
    let t = Style::default().fg(colors.text_muted);
    let sep = Span::styled(" │ ", Style::default().fg(colors.border_muted));

    let mut spans: Vec<Span> = Vec::with_capacity(hints.len() * 3);
    for (i, (key, action)) in hints.iter().enumerate() {
        if i > 0 {
            spans.push(sep.clone());
        }
        spans.push(Span::styled((*key).to_string(), k));
        spans.push(Span::styled(format!(" {}", action), t));
    }
    Paragraph::new(Line::from(spans))
        .style(Style::default().bg(colors.bg_panel))
        .alignment(Alignment::Center)
}

/// Helper: Rect of at most `width` x `height` centered in `area`
pub fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(area.height.saturating_sub(h) / 2),
            Constraint::Length(h),
            Constraint::Min(0),
        ])
        .split(area);
    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(area.width.saturating_sub(w) / 2),
            Constraint::Length(w),
            Constraint::Min(0),
        ])
        .split(vertical[1]);
    horizontal[1]
}
