//! Markdown (or plain text) to styled terminal lines

use super::links::{self, Segment};
use crate::theme::ThemeColors;
use pulldown_cmark::{Event, Options, Parser, Tag};
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};

const MARKDOWN_CHARS: &[char] = &['#', '*', '`', '_', '[', ']', '(', ')', '-', '+'];
const RULE_WIDTH: usize = 32;

/// Cheap check deciding whether a reply is worth parsing as Markdown.
pub fn looks_like_markdown(text: &str) -> bool {
    text.contains(MARKDOWN_CHARS) || text.contains("\n\n")
}

/// Screenshot chip numbering shared across every message of a transcript.
#[derive(Debug, Default)]
pub struct RefCursor {
    ids: Vec<i64>,
    pub selected: Option<usize>,
}

impl RefCursor {
    pub fn new(selected: Option<usize>) -> Self {
        Self {
            ids: Vec::new(),
            selected,
        }
    }

    /// Ids of the chips rendered so far, in display order.
    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    fn take(&mut self, id: i64) -> bool {
        let is_selected = self.selected == Some(self.ids.len());
        self.ids.push(id);
        is_selected
    }
}

enum Open {
    Paragraph,
    Heading,
    Styled,
    CodeBlock,
    List,
    Item,
    Quote,
    Link(String),
    Other,
}

struct Renderer<'a> {
    colors: &'a ThemeColors,
    refs: Option<&'a mut RefCursor>,
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    // adjacent text events are joined so references split by the parser still match
    pending: Option<(String, Style)>,
    styles: Vec<Style>,
    open: Vec<Open>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
}

impl<'a> Renderer<'a> {
    fn new(colors: &'a ThemeColors, refs: Option<&'a mut RefCursor>) -> Self {
        Self {
            colors,
            refs,
            lines: Vec::new(),
            current: Vec::new(),
            pending: None,
            styles: vec![Style::default().fg(colors.text_primary)],
            open: Vec::new(),
            lists: Vec::new(),
            quote_depth: 0,
            in_code_block: false,
        }
    }

    fn style(&self) -> Style {
        self.styles.iter().fold(Style::default(), |acc, s| acc.patch(*s))
    }

    fn push_style(&mut self, style: Style) {
        self.styles.push(style);
        self.open.push(Open::Styled);
    }

    fn queue_text(&mut self, text: &str, style: Style) {
        if let Some((buf, s)) = &mut self.pending {
            if *s == style {
                buf.push_str(text);
                return;
            }
        }
        self.flush_text();
        self.pending = Some((text.to_string(), style));
    }

    fn flush_text(&mut self) {
        if let Some((text, style)) = self.pending.take() {
            self.push_text(&text, style);
        }
    }

    fn flush_line(&mut self) {
        self.flush_text();
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.current.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(self.colors.border_muted),
            ));
        }
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank_line(&mut self) {
        self.flush_line();
        if self.lines.last().is_some_and(|l| !l.spans.is_empty()) {
            self.lines.push(Line::default());
        }
    }

    fn push_text(&mut self, text: &str, style: Style) {
        let Some(refs) = self.refs.as_deref_mut() else {
            self.current.push(Span::styled(text.to_string(), style));
            return;
        };
        let mut prev_chip = false;
        for seg in links::segments(text) {
            match seg {
                Segment::Text(t) => {
                    self.current.push(Span::styled(t.to_string(), style));
                    prev_chip = false;
                }
                Segment::Screenshot(id) => {
                    if prev_chip {
                        self.current.push(Span::styled(" ", style));
                    }
                    let mut chip = Style::default()
                        .fg(self.colors.screenshot_ref())
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    if refs.take(id) {
                        chip = chip.add_modifier(Modifier::REVERSED);
                    }
                    self.current.push(Span::styled(links::chip_label(id), chip));
                    prev_chip = true;
                }
            }
        }
    }

    fn code_style(&self) -> Style {
        Style::default().fg(self.colors.accent_orange)
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.open.push(Open::Paragraph),
            Tag::Heading { level, .. } => {
                self.flush_line();
                let style = Style::default()
                    .fg(self.colors.accent_blue)
                    .add_modifier(Modifier::BOLD);
                self.current
                    .push(Span::styled(format!("{} ", "#".repeat(level as usize)), style));
                self.styles.push(style);
                self.open.push(Open::Heading);
            }
            Tag::Strong => self.push_style(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Emphasis => self.push_style(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strikethrough => {
                self.push_style(Style::default().add_modifier(Modifier::CROSSED_OUT))
            }
            Tag::CodeBlock(_) => {
                self.flush_line();
                self.in_code_block = true;
                self.open.push(Open::CodeBlock);
            }
            Tag::List(start) => {
                self.flush_line();
                self.lists.push(start);
                self.open.push(Open::List);
            }
            Tag::Item => {
                self.flush_line();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let m = format!("{}. ", n);
                        *n += 1;
                        m
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::styled(
                    format!("{}{}", "  ".repeat(depth), marker),
                    Style::default().fg(self.colors.text_muted),
                ));
                self.open.push(Open::Item);
            }
            Tag::BlockQuote { .. } => {
                self.flush_line();
                self.quote_depth += 1;
                self.styles.push(Style::default().fg(self.colors.text_secondary));
                self.open.push(Open::Quote);
            }
            Tag::Link { dest_url, .. } => {
                self.styles.push(
                    Style::default()
                        .fg(self.colors.accent_blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.open.push(Open::Link(dest_url.to_string()));
            }
            _ => self.open.push(Open::Other),
        }
    }

    fn end(&mut self) {
        let Some(open) = self.open.pop() else { return };
        match open {
            Open::Paragraph => {
                if self.lists.is_empty() {
                    self.blank_line();
                } else {
                    self.flush_line();
                }
            }
            Open::Heading => {
                self.styles.pop();
                self.blank_line();
            }
            Open::Styled => {
                self.styles.pop();
            }
            Open::CodeBlock => {
                self.in_code_block = false;
                self.blank_line();
            }
            Open::List => {
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank_line();
                }
            }
            Open::Item => self.flush_line(),
            Open::Quote => {
                self.styles.pop();
                self.flush_line();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.blank_line();
                }
            }
            Open::Link(dest) => {
                self.styles.pop();
                if !dest.is_empty() {
                    self.current.push(Span::styled(
                        format!(" <{}>", dest),
                        Style::default().fg(self.colors.text_muted),
                    ));
                }
            }
            Open::Other => {}
        }
    }

    fn event(&mut self, event: Event<'_>) {
        let is_prose = matches!(event, Event::Text(_) | Event::Html(_) | Event::InlineHtml(_))
            && !self.in_code_block;
        if !is_prose {
            self.flush_text();
        }
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(_) => self.end(),
            Event::Text(text) if self.in_code_block => {
                let style = self.code_style();
                for line in text.lines() {
                    self.current.push(Span::styled(format!("  {}", line), style));
                    self.flush_line();
                }
            }
            Event::Text(text) | Event::Html(text) | Event::InlineHtml(text) => {
                let style = self.style();
                self.queue_text(&text, style);
            }
            Event::Code(code) => {
                let style = self.code_style().add_modifier(Modifier::BOLD);
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::SoftBreak => {
                let style = self.style();
                self.current.push(Span::styled(" ", style));
            }
            Event::HardBreak => self.flush_line(),
            Event::Rule => {
                self.flush_line();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(RULE_WIDTH),
                    Style::default().fg(self.colors.border_muted),
                )));
            }
            Event::TaskListMarker(done) => {
                let mark = if done { "[x] " } else { "[ ] " };
                self.current
                    .push(Span::styled(mark, Style::default().fg(self.colors.text_muted)));
            }
            _ => {}
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush_line();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

/// Render a whole message buffer. `refs` turns `screenshot:` tokens into
/// numbered chips; pass `None` while the reply is still streaming.
pub fn render(text: &str, colors: &ThemeColors, refs: Option<&mut RefCursor>) -> Vec<Line<'static>> {
    let mut r = Renderer::new(colors, refs);
    if looks_like_markdown(text) {
        let mut opts = Options::empty();
        opts.insert(Options::ENABLE_STRIKETHROUGH);
        opts.insert(Options::ENABLE_TASKLISTS);
        for event in Parser::new_ext(text, opts) {
            r.event(event);
        }
    } else {
        let style = r.style();
        for line in text.split('\n') {
            r.push_text(line, style);
            r.flush_line();
            if line.is_empty() {
                r.lines.push(Line::default());
            }
        }
    }
    r.finish()
}

/// Screenshot ids that `render` would turn into chips for `text`. Tokens
/// inside code spans and blocks are not chips and are skipped.
pub fn reference_ids(text: &str) -> Vec<i64> {
    let mut cursor = RefCursor::new(None);
    render(text, &ThemeColors::DARK, Some(&mut cursor));
    cursor.ids
}
