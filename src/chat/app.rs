//! Chat screen and its background workers

use super::decoder::Utf8StreamDecoder;
use super::markdown::{self, RefCursor};
use super::session::{ChatEffect, ChatMsg, ChatSession, PreviewState, Role, ScreenshotPreview};
use super::settings_form::{FormAction, SettingsForm};
use crate::api::ApiClient;
use crate::config::resolve_api_url;
use crate::error::ApiError;
use crate::store::LocalStore;
use crate::theme::{Theme, ThemeColors};
use crate::transform::format_date_time;
use crate::ui::{self, helpers};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use std::io::{self, Read};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const READ_BUF_SIZE: usize = 4096;
const SPINNER: [&str; 4] = ["◐", "◓", "◑", "◒"];
const QUICK_QUERIES: [&str; 3] = [
    "What did I work on today?",
    "Summarize what I was reading this morning",
    "Find the screenshot with the meeting notes",
];

/// Sends [`ChatMsg::Finished`] when dropped, so the send lock is released
/// however the worker exits.
struct FinishGuard(mpsc::Sender<ChatMsg>);

impl Drop for FinishGuard {
    fn drop(&mut self) {
        let _ = self.0.send(ChatMsg::Finished);
    }
}

/// Read the chat stream to the end, forwarding decoded text as it arrives.
fn stream_reply<R: Read>(mut reader: R, tx: &mpsc::Sender<ChatMsg>) -> Result<usize, ApiError> {
    let mut decoder = Utf8StreamDecoder::new();
    let mut buf = [0u8; READ_BUF_SIZE];
    let mut total = 0;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        total += n;
        let text = decoder.push(&buf[..n]);
        if !text.is_empty() {
            let _ = tx.send(ChatMsg::Chunk(text));
        }
    }
    if decoder.has_pending() {
        debug!("Chat stream ended inside a multi-byte sequence");
    }
    let tail = decoder.finish();
    if !tail.is_empty() {
        let _ = tx.send(ChatMsg::Chunk(tail));
    }
    Ok(total)
}

fn run_send(client: &ApiClient, prompt: &str, tx: &mpsc::Sender<ChatMsg>) {
    let _guard = FinishGuard(tx.clone());
    let result = client.chat_stream(prompt).and_then(|reader| {
        let _ = tx.send(ChatMsg::StreamOpened);
        stream_reply(reader, tx)
    });
    match result {
        Ok(bytes) => {
            debug!("Chat stream finished after {} bytes", bytes);
            let _ = tx.send(ChatMsg::Completed);
        }
        Err(e) => {
            let _ = tx.send(ChatMsg::Failed(e));
        }
    }
}

fn load_preview(client: &ApiClient, id: i64) -> Result<ScreenshotPreview, String> {
    let detail = client.screenshot_detail(id).map_err(|e| e.to_string())?;
    let image = match client.screenshot_image(id) {
        Ok(blob) => Some((blob.bytes.len(), blob.format().to_string())),
        Err(e) => {
            debug!("Image for screenshot {} unavailable: {}", id, e);
            None
        }
    };
    Ok(ScreenshotPreview { detail, image })
}

/// Word-wrapped transcript scrolled so that `scroll_back` rows are hidden
/// below the view. Returns the paragraph, its top row and the clamped
/// `scroll_back`.
fn transcript_view(lines: Vec<Line<'static>>, width: u16, height: u16, scroll_back: u16) -> (Paragraph<'static>, u16, u16) {
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    let total = paragraph.line_count(width.max(1));
    let max_back = total.saturating_sub(height as usize).min(u16::MAX as usize) as u16;
    let back = scroll_back.min(max_back);
    let top = max_back - back;
    (paragraph.scroll((top, 0)), top, back)
}

fn format_bytes(n: usize) -> String {
    const KIB: f64 = 1024.0;
    let n = n as f64;
    if n >= KIB * KIB {
        format!("{:.1} MiB", n / (KIB * KIB))
    } else if n >= KIB {
        format!("{:.1} KiB", n / KIB)
    } else {
        format!("{} B", n)
    }
}

pub struct ChatApp {
    session: ChatSession,
    client: ApiClient,
    api_flag: Option<String>,
    store: LocalStore,
    theme: Theme,
    form: SettingsForm,
    msg_tx: mpsc::Sender<ChatMsg>,
    msg_rx: mpsc::Receiver<ChatMsg>,
    /// Lines scrolled up from the bottom of the transcript.
    scroll_back: u16,
    quick_index: Option<usize>,
    tick: usize,
    exit: bool,
    should_redraw: bool,
}

impl ChatApp {
    pub fn new(store: LocalStore, api_flag: Option<String>) -> Self {
        let session = ChatSession::open(store.clone());
        let client = ApiClient::new(resolve_api_url(api_flag.as_deref(), &session.settings));
        let theme = Theme::load(&store);
        let (msg_tx, msg_rx) = mpsc::channel();
        Self {
            session,
            client,
            api_flag,
            store,
            theme,
            form: SettingsForm::new(),
            msg_tx,
            msg_rx,
            scroll_back: 0,
            quick_index: None,
            tick: 0,
            exit: false,
            should_redraw: true,
        }
    }

    pub fn run(&mut self, terminal: &mut ratatui::DefaultTerminal) -> io::Result<()> {
        info!("Chat started against {}", self.client.base_url());
        let mut last_tick = Instant::now();

        while !self.exit {
            // Short poll: 30ms keeps UI responsive; stream chunks are drained below.
            if event::poll(Duration::from_millis(30))? {
                while event::poll(Duration::from_millis(0))? {
                    match event::read()? {
                        Event::Key(key) if key.kind == KeyEventKind::Press => {
                            self.handle_key_event(key);
                            self.should_redraw = true;
                            if self.exit {
                                return Ok(());
                            }
                        }
                        Event::Paste(text) => {
                            self.session.input.push_str(&text);
                            self.should_redraw = true;
                        }
                        Event::Resize(_, _) => self.should_redraw = true,
                        _ => {}
                    }
                }
            }

            while let Ok(msg) = self.msg_rx.try_recv() {
                if matches!(msg, ChatMsg::Chunk(_)) {
                    self.scroll_back = 0;
                }
                self.session.apply(msg);
                self.should_redraw = true;
            }

            if self.session.thinking && last_tick.elapsed() >= Duration::from_millis(150) {
                self.tick = self.tick.wrapping_add(1);
                last_tick = Instant::now();
                self.should_redraw = true;
            }

            if self.session.expire_notification(Instant::now()) {
                self.should_redraw = true;
            }

            if self.should_redraw {
                terminal.draw(|frame| self.render(frame))?;
                self.should_redraw = false;
            }
        }

        Ok(())
    }

    fn execute(&mut self, effect: ChatEffect) {
        let client = self.client.clone();
        let tx = self.msg_tx.clone();
        match effect {
            ChatEffect::Send { prompt } => {
                thread::spawn(move || run_send(&client, &prompt, &tx));
            }
            ChatEffect::LoadPreview { seq, screenshot_id } => {
                thread::spawn(move || {
                    let result = load_preview(&client, screenshot_id);
                    let _ = tx.send(ChatMsg::PreviewLoaded { seq, result });
                });
            }
        }
    }

    fn apply_settings(&mut self, settings: crate::config::Settings) {
        self.session.save_settings(settings);
        let url = resolve_api_url(self.api_flag.as_deref(), &self.session.settings);
        if url != self.client.base_url() {
            info!("API URL changed to {}", url);
            self.client = ApiClient::new(url);
        }
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
            self.exit = true;
            return;
        }

        if self.form.open {
            match self.form.handle_key_event(key.code) {
                FormAction::Save(settings) => self.apply_settings(settings),
                FormAction::ClearHistory => {
                    self.session.clear_history();
                    self.scroll_back = 0;
                }
                FormAction::Close | FormAction::None => {}
            }
            return;
        }

        if self.session.preview.is_some() {
            if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')) {
                self.session.close_preview();
            }
            return;
        }

        match key.code {
            KeyCode::Char('t') if ctrl => {
                self.theme = self.theme.toggled();
                self.theme.save(&self.store);
            }
            KeyCode::Char('s') if ctrl => self.form.open_with(&self.session.settings),
            KeyCode::F(2) => self.form.open_with(&self.session.settings),
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.session.input.push('\n');
            }
            KeyCode::Enter => {
                if self.session.input.trim().is_empty() {
                    if let Some(effect) = self.session.open_preview() {
                        self.execute(effect);
                    }
                } else if let Some(effect) = self.session.submit() {
                    self.scroll_back = 0;
                    self.quick_index = None;
                    self.execute(effect);
                }
            }
            KeyCode::Tab | KeyCode::BackTab => {
                let forward = key.code == KeyCode::Tab;
                if self.session.messages.is_empty() {
                    self.cycle_quick_query(forward);
                } else {
                    self.session.cycle_ref(forward);
                }
            }
            KeyCode::Esc => {
                if self.session.selected_ref.is_some() {
                    self.session.selected_ref = None;
                } else {
                    self.session.input.clear();
                    self.quick_index = None;
                }
            }
            KeyCode::Up => self.scroll_back = self.scroll_back.saturating_add(1),
            KeyCode::Down => self.scroll_back = self.scroll_back.saturating_sub(1),
            KeyCode::PageUp => self.scroll_back = self.scroll_back.saturating_add(10),
            KeyCode::PageDown => self.scroll_back = self.scroll_back.saturating_sub(10),
            KeyCode::End => self.scroll_back = 0,
            KeyCode::Backspace => {
                self.session.input.pop();
            }
            KeyCode::Char(c) if !ctrl => self.session.input.push(c),
            _ => {}
        }
    }

    fn cycle_quick_query(&mut self, forward: bool) {
        let n = QUICK_QUERIES.len();
        let next = match self.quick_index {
            None if forward => 0,
            None => n - 1,
            Some(i) if forward => (i + 1) % n,
            Some(i) => (i + n - 1) % n,
        };
        self.quick_index = Some(next);
        self.session.input = QUICK_QUERIES[next].to_string();
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn render(&mut self, frame: &mut Frame) {
        let colors = self.theme.colors();
        frame.render_widget(
            Block::default().style(Style::default().bg(colors.bg_primary)),
            frame.area(),
        );

        let input_height = (self.session.input.lines().count().max(1) as u16 + 2).min(8);
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(input_height),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.render_header(frame, rows[0], &colors);
        self.render_transcript(frame, rows[1], &colors);
        self.render_input(frame, rows[2], &colors);
        self.render_status_bar(frame, rows[3], &colors);

        if self.session.preview.is_some() {
            self.render_preview(frame, frame.area(), &colors);
        }
        if self.form.open {
            self.form.render(frame, frame.area(), &colors);
        }
        if let Some(note) = &self.session.notification {
            ui::render_notification(frame, frame.area(), note, &colors);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let status = if self.session.sending {
            Span::styled(" ● replying", Style::default().fg(colors.accent_orange))
        } else {
            Span::styled(" ● ready", Style::default().fg(colors.success))
        };
        let line = Line::from(vec![
            Span::styled(
                " LifeTrace Chat ",
                Style::default()
                    .fg(colors.accent_blue)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(self.client.base_url().to_string(), Style::default().fg(colors.text_muted)),
            status,
        ]);
        frame.render_widget(
            Paragraph::new(line).style(Style::default().bg(colors.bg_panel)),
            area,
        );
    }

    fn welcome_lines(&self, colors: &ThemeColors) -> Vec<Line<'static>> {
        let mut lines = vec![
            Line::default(),
            Line::from(Span::styled(
                "Ask anything about what you have seen on screen.",
                Style::default()
                    .fg(colors.text_primary)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(Span::styled(
                "Replies can point at screenshots; Tab selects them, Enter opens one.",
                Style::default().fg(colors.text_muted),
            )),
            Line::default(),
            Line::from(Span::styled("Try (Tab to insert):", Style::default().fg(colors.text_secondary))),
        ];
        for (i, q) in QUICK_QUERIES.iter().enumerate() {
            let selected = self.quick_index == Some(i);
            let style = if selected {
                Style::default().fg(colors.accent_cyan).bg(colors.bg_highlight)
            } else {
                Style::default().fg(colors.accent_cyan)
            };
            lines.push(Line::from(Span::styled(format!("  › {}", q), style)));
        }
        lines
    }

    fn transcript_lines(&self, colors: &ThemeColors) -> Vec<Line<'static>> {
        let mut lines: Vec<Line<'static>> = Vec::new();
        let mut cursor = RefCursor::new(self.session.selected_ref);

        for (i, msg) in self.session.messages.iter().enumerate() {
            if msg.role == Role::Assistant && msg.content.is_empty() && self.session.is_streaming(i) {
                continue;
            }
            let (label, color) = match msg.role {
                Role::User => ("You", colors.accent_blue),
                Role::Assistant if msg.is_error() => ("Assistant", colors.error),
                Role::Assistant => ("Assistant", colors.accent_magenta),
            };
            lines.push(Line::from(Span::styled(
                label,
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            )));

            match msg.role {
                Role::User => {
                    for text in msg.content.split('\n') {
                        lines.push(Line::from(Span::styled(
                            text.to_string(),
                            Style::default().fg(colors.text_primary),
                        )));
                    }
                }
                Role::Assistant if msg.is_error() => {
                    lines.push(Line::from(Span::styled(
                        msg.content.clone(),
                        Style::default().fg(colors.error),
                    )));
                }
                Role::Assistant => {
                    let refs = self.session.shows_refs(i).then_some(&mut cursor);
                    lines.extend(markdown::render(&msg.content, colors, refs));
                }
            }
            lines.push(Line::default());
        }

        if self.session.thinking {
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} ", SPINNER[self.tick % SPINNER.len()]),
                    Style::default().fg(colors.thinking()),
                ),
                Span::styled(
                    "Thinking...",
                    Style::default()
                        .fg(colors.thinking())
                        .add_modifier(Modifier::ITALIC),
                ),
            ]));
        }
        lines
    }

    fn render_transcript(&mut self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let lines = if self.session.messages.is_empty() && !self.session.thinking {
            self.welcome_lines(colors)
        } else {
            self.transcript_lines(colors)
        };

        let (paragraph, _, back) = transcript_view(lines, area.width, area.height, self.scroll_back);
        self.scroll_back = back;
        frame.render_widget(paragraph, area);
    }

    fn render_input(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let border = if self.session.sending {
            Style::default().fg(colors.border_muted)
        } else {
            Style::default().fg(colors.border_focus)
        };
        let hint = if self.session.sending { " waiting for reply… " } else { " Enter to send " };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(border)
            .title(" Message ")
            .title_bottom(Line::from(hint).right_aligned());
        let inner = block.inner(area);
        let text: Vec<Line> = if self.session.input.is_empty() {
            vec![Line::from(Span::styled(
                "Type a question about your activity",
                Style::default().fg(colors.text_muted),
            ))]
        } else {
            self.session
                .input
                .split('\n')
                .map(|l| Line::from(Span::styled(l.to_string(), Style::default().fg(colors.text_primary))))
                .collect()
        };
        frame.render_widget(Paragraph::new(text).block(block), area);

        if self.form.open || self.session.preview.is_some() {
            return;
        }
        use unicode_width::UnicodeWidthStr;
        let last = self.session.input.rsplit('\n').next().unwrap_or("");
        let row = self.session.input.matches('\n').count() as u16;
        let x = (inner.x + last.width() as u16).min(inner.right().saturating_sub(1));
        let y = (inner.y + row).min(inner.bottom().saturating_sub(1));
        frame.set_cursor_position((x, y));
    }

    fn render_preview(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let Some(preview) = &self.session.preview else {
            return;
        };
        let popup = helpers::centered_rect(area, 76, 20);
        frame.render_widget(Clear, popup);
        let label = Style::default().fg(colors.text_muted);
        let value = Style::default().fg(colors.text_primary);
        let field = |name: &str, v: String| {
            Line::from(vec![
                Span::styled(format!("{:<12}", name), label),
                Span::styled(v, value),
            ])
        };

        let (title, lines) = match preview {
            PreviewState::Loading(id) => (
                format!(" Screenshot {} ", id),
                vec![Line::from(Span::styled("Loading...", label))],
            ),
            PreviewState::Failed { id, error } => (
                format!(" Screenshot {} ", id),
                vec![Line::from(Span::styled(
                    format!("Could not load screenshot: {}", error),
                    Style::default().fg(colors.error),
                ))],
            ),
            PreviewState::Loaded(p) => {
                let shot = &p.detail.screenshot;
                let mut lines = vec![
                    field("App", shot.app_name.clone().unwrap_or_else(|| "Unknown app".into())),
                    field("Window", shot.window_title.clone().unwrap_or_default()),
                    field("Captured", format_date_time(&shot.created_at)),
                    field("Size", format!("{} x {}", shot.width, shot.height)),
                    field("File", shot.file_path.clone()),
                ];
                if let Some((bytes, format)) = &p.image {
                    lines.push(field("Image", format!("{} {}", format, format_bytes(*bytes))));
                }
                lines.push(Line::default());
                let text = p
                    .detail
                    .ocr_result
                    .as_ref()
                    .map(|o| o.text_content.clone())
                    .or_else(|| shot.text_content.clone())
                    .filter(|t| !t.trim().is_empty());
                match text {
                    Some(t) => {
                        if let Some(ocr) = &p.detail.ocr_result {
                            lines.push(Line::from(Span::styled(
                                format!("Text ({:.0}% confidence)", ocr.confidence * 100.0),
                                label,
                            )));
                        }
                        lines.extend(t.lines().take(10).map(|l| {
                            Line::from(Span::styled(l.to_string(), Style::default().fg(colors.text_secondary)))
                        }));
                    }
                    None => lines.push(Line::from(Span::styled(crate::transform::NO_TEXT, label))),
                }
                (format!(" Screenshot {} ", shot.id), lines)
            }
        };

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.screenshot_ref()))
            .title(title)
            .title_bottom(Line::from(" Esc to close ").right_aligned())
            .style(Style::default().bg(colors.bg_panel));
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            popup,
        );
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let hints: &[(&str, &str)] = if self.form.open {
            &[("↑↓", "field"), ("Enter", "select"), ("Esc", "cancel")]
        } else if self.session.preview.is_some() {
            &[("Esc", "close preview")]
        } else {
            &[
                ("Enter", "send"),
                ("Alt-Enter", "newline"),
                ("Tab", "screenshots"),
                ("↑↓", "scroll"),
                ("Ctrl-S", "settings"),
                ("Ctrl-T", "theme"),
                ("Ctrl-Q", "quit"),
            ]
        };
        frame.render_widget(helpers::hint_bar(hints, colors), area);
    }
}
