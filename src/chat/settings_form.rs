//! Settings modal for the chat widget

use crate::config::Settings;
use crate::theme::ThemeColors;
use crate::ui::helpers::centered_rect;
use crossterm::event::KeyCode;
use ratatui::{
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Text,
    Number,
    Toggle,
}

struct Field {
    key: &'static str,
    label: &'static str,
    kind: FieldKind,
    draft: String,
}

/// What the caller must do after a key press.
#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    None,
    Close,
    Save(Settings),
    ClearHistory,
}

pub struct SettingsForm {
    pub open: bool,
    fields: Vec<Field>,
    /// Rows are the fields followed by the Save and Clear history buttons.
    selected: usize,
    confirming_clear: bool,
    base: Settings,
    error: Option<String>,
}

const LAYOUT: [(&str, &str, FieldKind); 7] = [
    ("apiUrl", "API URL", FieldKind::Text),
    ("temperature", "Temperature", FieldKind::Number),
    ("maxTokens", "Max tokens", FieldKind::Number),
    ("systemPrompt", "System prompt", FieldKind::Text),
    ("enableThinking", "Show thinking", FieldKind::Toggle),
    ("localHistoryEnabled", "Send history", FieldKind::Toggle),
    ("historyLimit", "History turns", FieldKind::Number),
];

fn draft_of(settings: &Settings, key: &str) -> String {
    match settings.get_field(key) {
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

impl SettingsForm {
    pub fn new() -> Self {
        Self {
            open: false,
            fields: Vec::new(),
            selected: 0,
            confirming_clear: false,
            base: Settings::default(),
            error: None,
        }
    }

    pub fn open_with(&mut self, settings: &Settings) {
        self.fields = LAYOUT
            .iter()
            .map(|&(key, label, kind)| Field {
                key,
                label,
                kind,
                draft: draft_of(settings, key),
            })
            .collect();
        self.base = settings.clone();
        self.selected = 0;
        self.confirming_clear = false;
        self.error = None;
        self.open = true;
    }

    pub fn close(&mut self) {
        self.open = false;
        self.confirming_clear = false;
        self.error = None;
    }

    fn save_row(&self) -> usize {
        self.fields.len()
    }

    fn clear_row(&self) -> usize {
        self.fields.len() + 1
    }

    /// Apply every draft on top of the settings the form was opened with.
    fn collect(&self) -> Result<Settings, String> {
        let mut settings = self.base.clone();
        for field in &self.fields {
            let raw = field.draft.trim();
            if raw.is_empty() && field.kind != FieldKind::Text {
                return Err(format!("{} must not be empty", field.label));
            }
            if field.kind == FieldKind::Number && serde_json::from_str::<serde_json::Value>(raw).map_or(true, |v| !v.is_number()) {
                return Err(format!("{} must be a number", field.label));
            }
            settings.set_field(field.key, raw)?;
        }
        Ok(settings)
    }

    pub fn handle_key_event(&mut self, key: KeyCode) -> FormAction {
        if !self.open {
            return FormAction::None;
        }

        if self.confirming_clear {
            return match key {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    self.close();
                    FormAction::ClearHistory
                }
                _ => {
                    self.confirming_clear = false;
                    FormAction::None
                }
            };
        }

        let rows = self.fields.len() + 2;
        match key {
            KeyCode::Esc => {
                self.close();
                FormAction::Close
            }
            KeyCode::Up | KeyCode::BackTab => {
                self.selected = (self.selected + rows - 1) % rows;
                FormAction::None
            }
            KeyCode::Down | KeyCode::Tab => {
                self.selected = (self.selected + 1) % rows;
                FormAction::None
            }
            KeyCode::Enter if self.selected == self.save_row() => match self.collect() {
                Ok(settings) => {
                    self.close();
                    FormAction::Save(settings)
                }
                Err(e) => {
                    self.error = Some(e);
                    FormAction::None
                }
            },
            KeyCode::Enter if self.selected == self.clear_row() => {
                self.confirming_clear = true;
                FormAction::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(field) = self.fields.get_mut(self.selected) {
                    match field.kind {
                        FieldKind::Toggle => {
                            let flipped = if field.draft == "true" { "false" } else { "true" };
                            field.draft = flipped.to_string();
                        }
                        _ if key == KeyCode::Char(' ') => field.draft.push(' '),
                        _ => self.selected += 1,
                    }
                }
                FormAction::None
            }
            KeyCode::Backspace => {
                if let Some(field) = self.fields.get_mut(self.selected) {
                    if field.kind != FieldKind::Toggle {
                        field.draft.pop();
                    }
                }
                FormAction::None
            }
            KeyCode::Char(c) => {
                if let Some(field) = self.fields.get_mut(self.selected) {
                    if field.kind != FieldKind::Toggle {
                        field.draft.push(c);
                        self.error = None;
                    }
                }
                FormAction::None
            }
            _ => FormAction::None,
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let popup = centered_rect(area, 64, (self.fields.len() + 9) as u16);
        frame.render_widget(Clear, popup);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border_focus))
            .title(" Settings ")
            .style(Style::default().bg(colors.bg_panel));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        let label_style = Style::default().fg(colors.text_secondary);
        let value_style = Style::default().fg(colors.text_primary);
        let highlight = Style::default().bg(colors.bg_highlight).add_modifier(Modifier::BOLD);

        let mut lines: Vec<Line> = Vec::with_capacity(self.fields.len() + 6);
        for (i, field) in self.fields.iter().enumerate() {
            let value = match field.kind {
                FieldKind::Toggle if field.draft == "true" => "[x]".to_string(),
                FieldKind::Toggle => "[ ]".to_string(),
                _ if i == self.selected => format!("{}▏", field.draft),
                _ => field.draft.clone(),
            };
            let mut line = Line::from(vec![
                Span::styled(format!("{:<16}", field.label), label_style),
                Span::styled(value, value_style),
            ]);
            if i == self.selected {
                line = line.style(highlight);
            }
            lines.push(line);
        }
        lines.push(Line::default());
        for (row, label, color) in [
            (self.save_row(), "[ Save ]", colors.success),
            (self.clear_row(), "[ Clear history ]", colors.error),
        ] {
            let mut style = Style::default().fg(color);
            if row == self.selected {
                style = style.patch(highlight);
            }
            lines.push(Line::from(Span::styled(label, style)));
        }
        lines.push(Line::default());
        if self.confirming_clear {
            lines.push(Line::from(Span::styled(
                "Clear all chat history? This cannot be undone. (y/n)",
                Style::default().fg(colors.error).add_modifier(Modifier::BOLD),
            )));
        } else if let Some(err) = &self.error {
            lines.push(Line::from(Span::styled(err.clone(), Style::default().fg(colors.error))));
        } else {
            lines.push(Line::from(Span::styled(
                "↑↓ move · type to edit · Space toggle · Enter select · Esc cancel",
                Style::default().fg(colors.text_muted),
            )));
        }

        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), inner);
    }
}

impl Default for SettingsForm {
    fn default() -> Self {
        Self::new()
    }
}
