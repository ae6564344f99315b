//! Launcher screen: search box, category tabs, grouped results, details

use super::state::{
    Carousel, DetailFocus, Effect, FocusArea, LauncherState, Msg, NavKey, Tab, ACTIONS,
    SEARCH_LIMIT, TIME_MACHINE_LIMIT,
};
use crate::api::{ApiClient, ListParams, ScreenshotDetail};
use crate::store::LocalStore;
use crate::theme::{Theme, ThemeColors};
use crate::transform::{events_to_results, DisplayResult, NO_TEXT};
use crate::ui::{self, helpers, NotificationKind};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use log::{debug, info};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Tabs, Wrap},
    Frame,
};
use std::io;
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

const TITLE_COLS: usize = 40;

/// Text shown under the carousel for one screenshot.
fn screenshot_text(detail: &ScreenshotDetail) -> String {
    detail
        .ocr_result
        .as_ref()
        .map(|o| o.text_content.as_str())
        .or(detail.screenshot.text_content.as_deref())
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(NO_TEXT)
        .to_string()
}

fn nav_key(key: &KeyEvent) -> Option<NavKey> {
    Some(match key.code {
        KeyCode::Up => NavKey::Up,
        KeyCode::Down => NavKey::Down,
        KeyCode::Left => NavKey::Left,
        KeyCode::Right => NavKey::Right,
        KeyCode::Tab => NavKey::Tab,
        KeyCode::BackTab => NavKey::BackTab,
        KeyCode::Enter => NavKey::Enter,
        KeyCode::Esc => NavKey::Esc,
        KeyCode::Backspace => NavKey::Backspace,
        KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => NavKey::Char(c),
        _ => return None,
    })
}

pub struct LauncherApp {
    state: LauncherState,
    client: ApiClient,
    store: LocalStore,
    theme: Theme,
    msg_tx: mpsc::Sender<Msg>,
    msg_rx: mpsc::Receiver<Msg>,
    exit: bool,
    should_redraw: bool,
}

impl LauncherApp {
    pub fn new(client: ApiClient, store: LocalStore) -> Self {
        let (msg_tx, msg_rx) = mpsc::channel();
        let theme = Theme::load(&store);
        Self {
            state: LauncherState::new(),
            client,
            store,
            theme,
            msg_tx,
            msg_rx,
            exit: false,
            should_redraw: true,
        }
    }

    pub fn run(&mut self, terminal: &mut ratatui::DefaultTerminal) -> io::Result<()> {
        info!("Launcher started against {}", self.client.base_url());
        let effects = self.state.on_start();
        self.execute(effects);

        while !self.exit {
            // Short poll: 30ms keeps UI responsive; worker results are drained below.
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
                        Event::Resize(_, _) => self.should_redraw = true,
                        _ => {}
                    }
                }
            }

            // Drain worker results (non-blocking)
            while let Ok(msg) = self.msg_rx.try_recv() {
                let effects = self.state.apply(msg);
                self.execute(effects);
                self.should_redraw = true;
            }

            if self.state.expire_notification(Instant::now()) {
                self.should_redraw = true;
            }

            if self.should_redraw {
                terminal.draw(|frame| self.render(frame))?;
                self.should_redraw = false;
            }
        }

        Ok(())
    }

    fn handle_key_event(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('q')) {
            self.exit = true;
            return;
        }

        if !self.state.show_settings {
            match key.code {
                KeyCode::Char('t') if ctrl => {
                    self.theme = self.theme.toggled();
                    self.theme.save(&self.store);
                    return;
                }
                KeyCode::Char('s') if ctrl => {
                    self.state.open_settings();
                    return;
                }
                KeyCode::F(2) => {
                    self.state.open_settings();
                    return;
                }
                KeyCode::Char('r') if ctrl => {
                    let effects = self.state.reload_time_machine();
                    self.execute(effects);
                    return;
                }
                _ => {}
            }
        }

        if let Some(nav) = nav_key(&key) {
            let effects = self.state.handle_key(nav);
            self.execute(effects);
        }
    }

    /// Run `job` on a worker thread and feed its result back to the UI loop.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce(&ApiClient) -> Msg + Send + 'static,
    {
        let client = self.client.clone();
        let tx = self.msg_tx.clone();
        thread::spawn(move || {
            let _ = tx.send(job(&client));
        });
    }

    fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            debug!("Effect: {:?}", effect);
            match effect {
                Effect::Search { seq, query } => self.spawn(move |client| Msg::SearchFinished {
                    seq,
                    result: client
                        .search_events_with_fallback(&query, SEARCH_LIMIT)
                        .map(|events| events_to_results(&events))
                        .map_err(|e| e.to_string()),
                }),
                Effect::LoadTimeMachine => self.spawn(|client| {
                    Msg::TimeMachineLoaded(
                        client
                            .list_events(&ListParams::limit(TIME_MACHINE_LIMIT))
                            .map(|events| events_to_results(&events))
                            .map_err(|e| e.to_string()),
                    )
                }),
                Effect::LoadEventDetail { seq, event_id } => {
                    self.spawn(move |client| Msg::EventDetailLoaded {
                        seq,
                        result: client
                            .event_detail(event_id)
                            .map(|d| d.screenshots.iter().map(|s| s.id).collect())
                            .map_err(|e| e.to_string()),
                    })
                }
                Effect::LoadScreenshotText { seq, screenshot_id } => {
                    self.spawn(move |client| Msg::ScreenshotTextLoaded {
                        seq,
                        text: match client.screenshot_detail(screenshot_id) {
                            Ok(detail) => screenshot_text(&detail),
                            Err(e) => format!("Failed to load screenshot {}: {}", screenshot_id, e),
                        },
                    })
                }
                Effect::Open { title } => {
                    info!("Open requested: {}", title);
                    self.state.notify(format!("Open: {}", title), NotificationKind::Info);
                }
                Effect::RunAction { action, title } => {
                    let target = title.unwrap_or_else(|| "(nothing selected)".into());
                    info!("Action '{}' on {}", action, target);
                    self.state.notify(format!("{}: {}", action, target), NotificationKind::Info);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Rendering
    // ------------------------------------------------------------------

    fn border_style(&self, area: FocusArea, colors: &ThemeColors) -> Style {
        if self.state.focus == area && !self.state.show_settings {
            Style::default()
                .fg(colors.border_focus)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(colors.border_default)
        }
    }

    fn render(&mut self, frame: &mut Frame) {
        let colors = self.theme.colors();
        frame.render_widget(
            Block::default().style(Style::default().bg(colors.bg_primary)),
            frame.area(),
        );

        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(frame.area());

        self.render_search(frame, rows[0], &colors);
        self.render_tabs(frame, rows[1], &colors);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
            .split(rows[2]);
        self.render_results(frame, body[0], &colors);
        self.render_details(frame, body[1], &colors);
        self.render_status_bar(frame, rows[3], &colors);

        if self.state.show_settings {
            self.render_settings(frame, frame.area(), &colors);
        }
        if let Some(note) = &self.state.notification {
            ui::render_notification(frame, frame.area(), note, &colors);
        }
    }

    fn render_search(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let status = if self.state.is_searching {
            " Searching... "
        } else if self.state.is_loading {
            " Loading... "
        } else {
            ""
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.border_style(FocusArea::Search, colors))
            .title(" LifeTrace ")
            .title_bottom(Line::from(status).right_aligned());
        let inner = block.inner(area);

        let line = if self.state.query.is_empty() {
            Line::from(vec![
                Span::styled("🔍 ", Style::default().fg(colors.accent_cyan)),
                Span::styled(
                    "Search apps, documents and your activity history",
                    Style::default().fg(colors.text_muted),
                ),
            ])
        } else {
            Line::from(vec![
                Span::styled("🔍 ", Style::default().fg(colors.accent_cyan)),
                Span::styled(self.state.query.clone(), Style::default().fg(colors.text_primary)),
            ])
        };
        frame.render_widget(Paragraph::new(line).block(block), area);

        if self.state.focus == FocusArea::Search && !self.state.show_settings {
            use unicode_width::UnicodeWidthStr;
            let x = inner.x + 3 + self.state.query.width() as u16;
            frame.set_cursor_position((x.min(inner.right().saturating_sub(1)), inner.y));
        }
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(format!(" {} ", t.label()))).collect();
        let tabs = Tabs::new(titles)
            .select(self.state.active_tab.index())
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_style(self.border_style(FocusArea::Tabs, colors)),
            )
            .style(Style::default().fg(colors.text_secondary))
            .highlight_style(
                Style::default()
                    .fg(colors.accent_blue)
                    .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
            )
            .divider(Span::styled("│", Style::default().fg(colors.border_muted)));
        frame.render_widget(tabs, area);
    }

    fn result_line(&self, row: &DisplayResult, selected: bool, width: usize, colors: &ThemeColors) -> Line<'static> {
        let marker = if selected { "▶ " } else { "  " };
        let meta = row
            .time_range
            .as_ref()
            .map(|t| t.start.clone())
            .or_else(|| row.subtitle.clone())
            .unwrap_or_default();
        let title_cols = width.saturating_sub(meta.len() + 6).clamp(8, TITLE_COLS);
        let mut line = Line::from(vec![
            Span::styled(marker, Style::default().fg(colors.accent_cyan)),
            Span::raw(format!("{} ", row.icon)),
            Span::styled(
                helpers::pad_to_width(&row.title, title_cols),
                Style::default().fg(colors.text_primary),
            ),
            Span::styled(format!(" {}", meta), Style::default().fg(colors.text_muted)),
        ]);
        if selected {
            let mut style = Style::default().bg(colors.bg_highlight);
            if self.state.focus == FocusArea::Results {
                style = style.add_modifier(Modifier::BOLD);
            }
            line = line.style(style);
        }
        line
    }

    fn render_results(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let results_title = if self.state.query.trim().is_empty() {
            format!(" {} ", self.state.active_tab.label())
        } else {
            format!(" Results for \"{}\" ", helpers::truncate_to_width(&self.state.query, 24))
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.border_style(FocusArea::Results, colors))
            .title(results_title);
        let inner = block.inner(area);

        let groups = self.state.grouped_results();
        if groups.is_empty() {
            let (text, color) = if self.state.is_searching || (self.state.is_loading && self.state.active_tab == Tab::TimeMachine) {
                ("Loading...".to_string(), colors.text_muted)
            } else if let Some(err) = &self.state.api_error {
                (format!("Could not load data: {}", err), colors.error)
            } else if self.state.has_searched {
                ("No results".to_string(), colors.text_muted)
            } else {
                ("Nothing here yet".to_string(), colors.text_muted)
            };
            let empty = Paragraph::new(Line::from(Span::styled(text, Style::default().fg(color))))
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        let width = inner.width as usize;
        let mut lines: Vec<Line> = Vec::new();
        let mut selected_line = 0usize;
        for (category, rows) in groups {
            lines.push(Line::from(Span::styled(
                format!("{} ({})", category.label(), rows.len()),
                Style::default()
                    .fg(colors.accent_yellow)
                    .add_modifier(Modifier::BOLD),
            )));
            for (idx, row) in rows {
                let selected = idx == self.state.selected_result_index
                    && self.state.selected_result.as_deref() == Some(row.id.as_str());
                if selected {
                    selected_line = lines.len();
                }
                lines.push(self.result_line(row, selected, width, colors));
            }
        }

        // Keep the selected row in view
        let height = inner.height as usize;
        let scroll = if height > 0 && selected_line >= height {
            selected_line + 1 - height
        } else {
            0
        };
        frame.render_widget(
            Paragraph::new(lines).block(block).scroll((scroll as u16, 0)),
            area,
        );
    }

    fn carousel_lines(&self, carousel: &Carousel, colors: &ThemeColors) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        if carousel.loading {
            lines.push(Line::from(Span::styled(
                "Loading screenshots...",
                Style::default().fg(colors.text_muted),
            )));
            return lines;
        }
        let Some(id) = carousel.current_id() else {
            return lines;
        };
        let dots: String = (0..carousel.total())
            .map(|i| if i == carousel.index { '●' } else { '○' })
            .take(20)
            .collect();
        lines.push(Line::from(vec![
            Span::styled(
                format!("Screenshot {}/{} ", carousel.index + 1, carousel.total()),
                Style::default().fg(colors.accent_magenta).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("#{} ", id), Style::default().fg(colors.text_muted)),
            Span::styled(dots, Style::default().fg(colors.accent_magenta)),
        ]));
        lines.push(Line::from(Span::styled(
            "[ previous   ] next",
            Style::default().fg(colors.text_muted),
        )));
        lines.push(Line::default());
        for text_line in carousel.description.lines().take(12) {
            lines.push(Line::from(Span::styled(
                text_line.to_string(),
                Style::default().fg(colors.text_secondary),
            )));
        }
        lines
    }

    fn render_details(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(self.border_style(FocusArea::Details, colors))
            .title(" Details ");

        let Some(row) = self.state.selected() else {
            let empty = Paragraph::new(Line::from(Span::styled(
                "Select a result to see its details",
                Style::default().fg(colors.text_muted),
            )))
            .block(block);
            frame.render_widget(empty, area);
            return;
        };

        let label = Style::default().fg(colors.text_muted);
        let value = Style::default().fg(colors.text_primary);
        let mut lines: Vec<Line> = vec![
            Line::from(vec![
                Span::raw(format!("{} ", row.icon)),
                Span::styled(
                    row.title.clone(),
                    Style::default().fg(colors.text_primary).add_modifier(Modifier::BOLD),
                ),
            ]),
            Line::default(),
            Line::from(vec![
                Span::styled("Category   ", label),
                Span::styled(row.category.label(), value),
            ]),
        ];
        if let Some(sub) = &row.subtitle {
            lines.push(Line::from(vec![
                Span::styled("Source     ", label),
                Span::styled(sub.clone(), value),
            ]));
        }
        if let Some(range) = &row.time_range {
            let text = if range.start == range.end {
                range.start.clone()
            } else {
                format!("{} → {}", range.start, range.end)
            };
            lines.push(Line::from(vec![
                Span::styled("Time       ", label),
                Span::styled(text, value),
            ]));
        }
        if row.event_id().is_none() {
            if let Some(desc) = &row.description {
                lines.push(Line::default());
                for text_line in desc.lines().take(12) {
                    lines.push(Line::from(Span::styled(
                        text_line.to_string(),
                        Style::default().fg(colors.text_secondary),
                    )));
                }
            }
        } else {
            if let Some(desc) = &row.description {
                lines.push(Line::from(vec![
                    Span::styled("Contents   ", label),
                    Span::styled(desc.clone(), value),
                ]));
            }
            lines.push(Line::default());
            lines.extend(self.carousel_lines(&self.state.carousel, colors));
        }

        lines.push(Line::default());
        let in_actions = self.state.focus == FocusArea::Details
            && self.state.detail_focus == DetailFocus::Actions;
        for (i, action) in ACTIONS.iter().enumerate() {
            let selected = in_actions && i == self.state.selected_action;
            let style = if selected {
                Style::default()
                    .fg(colors.accent_blue)
                    .bg(colors.bg_highlight)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(colors.text_secondary)
            };
            let marker = if selected { "▶ " } else { "  " };
            lines.push(Line::from(Span::styled(format!("{}{}", marker, action), style)));
        }

        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
            area,
        );
    }

    fn render_settings(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let popup = helpers::centered_rect(area, 56, 11);
        frame.render_widget(Clear, popup);
        let label = Style::default().fg(colors.text_muted);
        let value = Style::default().fg(colors.text_primary);
        let theme = match self.theme {
            Theme::Dark => "Dark",
            Theme::Light => "Light",
        };
        let lines = vec![
            Line::from(vec![
                Span::styled("Backend    ", label),
                Span::styled(self.client.base_url().to_string(), value),
            ]),
            Line::from(vec![
                Span::styled("Theme      ", label),
                Span::styled(format!("{} (Ctrl-T)", theme), value),
            ]),
            Line::from(vec![
                Span::styled("Data dir   ", label),
                Span::styled(self.store.root().display().to_string(), value),
            ]),
            Line::default(),
            Line::from(Span::styled(
                "More launcher options are not available yet.",
                Style::default().fg(colors.text_secondary),
            )),
            Line::default(),
            Line::from(Span::styled("Esc to close", label)),
        ];
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(colors.border_focus))
            .title(" Settings ")
            .style(Style::default().bg(colors.bg_panel));
        frame.render_widget(
            Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
            popup,
        );
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect, colors: &ThemeColors) {
        let hints: &[(&str, &str)] = if self.state.show_settings {
            &[("Esc", "close")]
        } else {
            match self.state.focus {
                FocusArea::Search => &[
                    ("Type", "search"),
                    ("Enter", "search again"),
                    ("↓", "results"),
                    ("Tab", "next area"),
                    ("Ctrl-T", "theme"),
                    ("Ctrl-Q", "quit"),
                ],
                FocusArea::Tabs => &[
                    ("←→", "switch tab"),
                    ("↓", "results"),
                    ("Tab", "next area"),
                    ("Esc", "search"),
                ],
                FocusArea::Results => &[
                    ("↑↓", "select"),
                    ("Enter", "open"),
                    ("→", "details"),
                    ("Ctrl-R", "reload"),
                    ("Esc", "search"),
                ],
                FocusArea::Details => &[
                    ("↑↓", "actions"),
                    ("[ ]", "screenshots"),
                    ("Enter", "run"),
                    ("←", "results"),
                    ("Esc", "search"),
                ],
            }
        };
        frame.render_widget(helpers::hint_bar(hints, colors), area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{OcrResult, ScreenshotData};

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    fn app() -> (LauncherApp, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        // nothing listens on port 9; effects only spawn threads that fail
        (LauncherApp::new(ApiClient::new("http://127.0.0.1:9"), store), dir)
    }

    #[test]
    fn test_nav_key_mapping() {
        assert_eq!(nav_key(&key(KeyCode::Char('a'), KeyModifiers::NONE)), Some(NavKey::Char('a')));
        assert_eq!(nav_key(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)), Some(NavKey::Char('A')));
        assert_eq!(nav_key(&key(KeyCode::Char('a'), KeyModifiers::CONTROL)), None);
        assert_eq!(nav_key(&key(KeyCode::BackTab, KeyModifiers::SHIFT)), Some(NavKey::BackTab));
        assert_eq!(nav_key(&key(KeyCode::F(5), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_screenshot_text_prefers_ocr() {
        let mut detail = ScreenshotDetail {
            screenshot: ScreenshotData {
                id: 1,
                text_content: Some("from record".into()),
                ..ScreenshotData::default()
            },
            ocr_result: None,
        };
        assert_eq!(screenshot_text(&detail), "from record");
        detail.ocr_result = Some(OcrResult {
            text_content: "from ocr".into(),
            ..OcrResult::default()
        });
        assert_eq!(screenshot_text(&detail), "from ocr");
        detail.ocr_result = None;
        detail.screenshot.text_content = None;
        assert_eq!(screenshot_text(&detail), NO_TEXT);
    }

    #[test]
    fn test_hotkeys() {
        let (mut app, _dir) = app();
        app.handle_key_event(key(KeyCode::Char('t'), KeyModifiers::CONTROL));
        assert_eq!(app.theme, Theme::Light);
        assert_eq!(Theme::load(&app.store), Theme::Light);

        app.handle_key_event(key(KeyCode::F(2), KeyModifiers::NONE));
        assert!(app.state.show_settings);
        // theme hotkey is swallowed while the settings view is open
        app.handle_key_event(key(KeyCode::Char('t'), KeyModifiers::CONTROL));
        assert_eq!(app.theme, Theme::Light);
        app.handle_key_event(key(KeyCode::Esc, KeyModifiers::NONE));
        assert!(!app.state.show_settings);

        app.handle_key_event(key(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(app.exit);
    }

    #[test]
    fn test_open_logs_and_notifies() {
        let (mut app, _dir) = app();
        app.state.focus = FocusArea::Results;
        app.handle_key_event(key(KeyCode::Enter, KeyModifiers::NONE));
        let note = app.state.notification.as_ref().expect("notification");
        assert!(note.text.starts_with("Open: "));
    }
}
