//! Launcher view state and keyboard navigation
//!
//! Every input is a method on [`LauncherState`] that mutates the state and
//! returns the [`Effect`]s (network calls, log intents) the caller must run.
//! Background results come back through [`LauncherState::apply`].

use super::mock::static_results;
use crate::transform::{Category, DisplayResult};
use crate::ui::{self, Notification, NotificationKind};
use log::{debug, info, warn};
use std::time::Instant;

pub const ACTIONS: [&str; 3] = ["Open", "Run as administrator", "Open file location"];
pub const ACTION_COUNT: usize = ACTIONS.len();
pub const SEARCH_LIMIT: usize = 20;
pub const TIME_MACHINE_LIMIT: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusArea {
    Search,
    Tabs,
    Results,
    Details,
}

impl FocusArea {
    pub const ORDER: [FocusArea; 4] = [
        FocusArea::Search,
        FocusArea::Tabs,
        FocusArea::Results,
        FocusArea::Details,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|f| *f == self).unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    pub fn prev(self) -> Self {
        let len = Self::ORDER.len();
        Self::ORDER[(self.position() + len - 1) % len]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailFocus {
    Content,
    Actions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    All,
    Apps,
    Docs,
    TimeMachine,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::All, Tab::Apps, Tab::Docs, Tab::TimeMachine];

    pub const fn label(self) -> &'static str {
        match self {
            Tab::All => "All",
            Tab::Apps => "Apps",
            Tab::Docs => "Docs",
            Tab::TimeMachine => "Time Machine",
        }
    }

    /// `None` for the "all" tab.
    pub const fn category(self) -> Option<Category> {
        match self {
            Tab::All => None,
            Tab::Apps => Some(Category::Apps),
            Tab::Docs => Some(Category::Docs),
            Tab::TimeMachine => Some(Category::TimeMachine),
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|t| *t == self).unwrap_or(0)
    }
}

/// Keys the launcher reacts to, already decoded from the terminal event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavKey {
    Up,
    Down,
    Left,
    Right,
    Tab,
    BackTab,
    Enter,
    Esc,
    Backspace,
    Char(char),
}

impl NavKey {
    /// Keys that never reach the search input as text.
    pub fn is_navigation(self) -> bool {
        !matches!(self, NavKey::Char(_) | NavKey::Backspace)
    }
}

/// I/O the caller runs on behalf of the state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Search { seq: u64, query: String },
    LoadTimeMachine,
    LoadEventDetail { seq: u64, event_id: i64 },
    LoadScreenshotText { seq: u64, screenshot_id: i64 },
    Open { title: String },
    RunAction { action: &'static str, title: Option<String> },
}

/// Results delivered by background workers.
#[derive(Debug, Clone)]
pub enum Msg {
    TimeMachineLoaded(Result<Vec<DisplayResult>, String>),
    SearchFinished {
        seq: u64,
        result: Result<Vec<DisplayResult>, String>,
    },
    EventDetailLoaded {
        seq: u64,
        result: Result<Vec<i64>, String>,
    },
    ScreenshotTextLoaded { seq: u64, text: String },
}

/// Screenshot carousel of the selected event.
#[derive(Debug, Clone, Default)]
pub struct Carousel {
    pub event_id: Option<i64>,
    pub screenshot_ids: Vec<i64>,
    pub index: usize,
    pub description: String,
    pub loading: bool,
}

impl Carousel {
    pub fn current_id(&self) -> Option<i64> {
        self.screenshot_ids.get(self.index).copied()
    }

    pub fn total(&self) -> usize {
        self.screenshot_ids.len()
    }
}

pub struct LauncherState {
    pub query: String,
    pub active_tab: Tab,
    pub focus: FocusArea,
    pub selected_result: Option<String>,
    pub selected_result_index: usize,
    pub detail_focus: DetailFocus,
    pub selected_action: usize,
    pub show_settings: bool,

    static_results: Vec<DisplayResult>,
    pub time_machine: Vec<DisplayResult>,
    pub is_loading: bool,
    pub api_error: Option<String>,

    pub search_results: Vec<DisplayResult>,
    pub is_searching: bool,
    pub has_searched: bool,
    pub last_search_query: String,
    search_seq: u64,

    pub carousel: Carousel,
    detail_seq: u64,

    pub notification: Option<Notification>,
}

impl Default for LauncherState {
    fn default() -> Self {
        Self::new()
    }
}

impl LauncherState {
    pub fn new() -> Self {
        let mut state = Self {
            query: String::new(),
            active_tab: Tab::All,
            focus: FocusArea::Search,
            selected_result: None,
            selected_result_index: 0,
            detail_focus: DetailFocus::Content,
            selected_action: 0,
            show_settings: false,
            static_results: static_results(),
            time_machine: Vec::new(),
            is_loading: false,
            api_error: None,
            search_results: Vec::new(),
            is_searching: false,
            has_searched: false,
            last_search_query: String::new(),
            search_seq: 0,
            carousel: Carousel::default(),
            detail_seq: 0,
            notification: None,
        };
        state.revalidate_selection();
        state
    }

    /// Effects to run once the UI is up.
    pub fn on_start(&mut self) -> Vec<Effect> {
        self.request_time_machine().into_iter().collect()
    }

    // ------------------------------------------------------------------
    // Result aggregation
    // ------------------------------------------------------------------

    /// Rows currently shown, in display order.
    pub fn filtered_results(&self) -> Vec<&DisplayResult> {
        if !self.query.trim().is_empty() {
            return self.search_results.iter().collect();
        }
        match self.active_tab.category() {
            None => self.static_results.iter().chain(self.time_machine.iter()).collect(),
            Some(Category::TimeMachine) => self.time_machine.iter().collect(),
            Some(category) => self
                .static_results
                .iter()
                .filter(|r| r.category == category)
                .collect(),
        }
    }

    /// Consecutive runs of the same category, with each row's list index.
    pub fn grouped_results(&self) -> Vec<(Category, Vec<(usize, &DisplayResult)>)> {
        let mut groups: Vec<(Category, Vec<(usize, &DisplayResult)>)> = Vec::new();
        for (idx, row) in self.filtered_results().into_iter().enumerate() {
            match groups.last_mut() {
                Some((cat, rows)) if *cat == row.category => rows.push((idx, row)),
                _ => groups.push((row.category, vec![(idx, row)])),
            }
        }
        groups
    }

    pub fn selected(&self) -> Option<&DisplayResult> {
        let id = self.selected_result.as_deref()?;
        self.filtered_results().into_iter().find(|r| r.id == id)
    }

    fn shows_time_machine(&self) -> bool {
        self.query.trim().is_empty() && matches!(self.active_tab, Tab::All | Tab::TimeMachine)
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Reselect index 0 of the current list, or clear the selection.
    fn revalidate_selection(&mut self) -> Option<Effect> {
        if self.filtered_results().is_empty() {
            self.selected_result = None;
            self.selected_result_index = 0;
            self.carousel = Carousel::default();
            None
        } else {
            self.select_index(0)
        }
    }

    fn select_index(&mut self, index: usize) -> Option<Effect> {
        let id = self.filtered_results().get(index).map(|r| r.id.clone())?;
        self.selected_result_index = index;
        let changed = self.selected_result.as_deref() != Some(id.as_str());
        self.selected_result = Some(id);
        if changed {
            self.load_detail_for_selection()
        } else {
            None
        }
    }

    fn load_detail_for_selection(&mut self) -> Option<Effect> {
        self.detail_seq += 1;
        let event_id = self.selected().and_then(DisplayResult::event_id);
        let description = self
            .selected()
            .and_then(|r| r.description.clone())
            .unwrap_or_default();
        self.carousel = Carousel {
            event_id,
            description,
            loading: event_id.is_some(),
            ..Carousel::default()
        };
        event_id.map(|event_id| Effect::LoadEventDetail {
            seq: self.detail_seq,
            event_id,
        })
    }

    /// Move into the results list, keeping the previous selection if it is
    /// still listed.
    fn navigate_to_results(&mut self) -> Option<Effect> {
        self.focus = FocusArea::Results;
        let previous = self.selected_result.as_deref().and_then(|id| {
            self.filtered_results().iter().position(|r| r.id == id)
        });
        match previous {
            Some(idx) => {
                self.selected_result_index = idx;
                None
            }
            None => self.select_index(0),
        }
    }

    fn reset_detail_focus(&mut self) {
        self.detail_focus = DetailFocus::Content;
        self.selected_action = 0;
    }

    // ------------------------------------------------------------------
    // Search
    // ------------------------------------------------------------------

    fn clear_search(&mut self) {
        self.search_seq += 1;
        self.search_results.clear();
        self.is_searching = false;
        self.has_searched = false;
        self.last_search_query.clear();
    }

    fn dispatch_search(&mut self) -> Option<Effect> {
        let query = self.query.trim().to_string();
        if query.is_empty() {
            return None;
        }
        self.search_seq += 1;
        self.is_searching = true;
        self.has_searched = true;
        self.api_error = None;
        debug!("Dispatching search #{}: {}", self.search_seq, query);
        Some(Effect::Search {
            seq: self.search_seq,
            query,
        })
    }

    /// Called after every edit of the query text.
    fn on_query_changed(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.query.trim().is_empty() {
            self.clear_search();
            effects.extend(self.revalidate_selection());
            return effects;
        }
        // the list now comes from search results, which may not hold the selection
        if !self.selection_is_listed() {
            effects.extend(self.revalidate_selection());
        }
        effects.extend(self.dispatch_search());
        effects
    }

    fn selection_is_listed(&self) -> bool {
        let Some(id) = self.selected_result.as_deref() else {
            return false;
        };
        self.filtered_results()
            .get(self.selected_result_index)
            .is_some_and(|r| r.id == id)
    }

    pub fn set_query(&mut self, query: &str) -> Vec<Effect> {
        self.query = query.to_string();
        self.on_query_changed()
    }

    fn request_time_machine(&mut self) -> Option<Effect> {
        if self.is_loading {
            return None;
        }
        self.is_loading = true;
        self.api_error = None;
        Some(Effect::LoadTimeMachine)
    }

    pub fn reload_time_machine(&mut self) -> Vec<Effect> {
        self.request_time_machine().into_iter().collect()
    }

    fn set_tab(&mut self, tab: Tab) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.active_tab = tab;
        self.query.clear();
        self.clear_search();
        effects.extend(self.revalidate_selection());
        if tab == Tab::TimeMachine && self.time_machine.is_empty() {
            effects.extend(self.request_time_machine());
        }
        effects
    }

    pub fn select_tab(&mut self, tab: Tab) -> Vec<Effect> {
        if tab == self.active_tab {
            return Vec::new();
        }
        self.set_tab(tab)
    }

    // ------------------------------------------------------------------
    // Carousel
    // ------------------------------------------------------------------

    fn step_carousel(&mut self, forward: bool) -> Option<Effect> {
        let total = self.carousel.total();
        if total == 0 {
            return None;
        }
        self.carousel.index = if forward {
            (self.carousel.index + 1) % total
        } else {
            (self.carousel.index + total - 1) % total
        };
        self.load_current_shot()
    }

    fn load_current_shot(&mut self) -> Option<Effect> {
        let screenshot_id = self.carousel.current_id()?;
        self.detail_seq += 1;
        self.carousel.description = "Loading...".to_string();
        Some(Effect::LoadScreenshotText {
            seq: self.detail_seq,
            screenshot_id,
        })
    }

    // ------------------------------------------------------------------
    // Keyboard
    // ------------------------------------------------------------------

    pub fn open_settings(&mut self) {
        self.show_settings = true;
    }

    pub fn handle_key(&mut self, key: NavKey) -> Vec<Effect> {
        if self.show_settings {
            if key == NavKey::Esc {
                self.show_settings = false;
            }
            return Vec::new();
        }

        // Text editing only while the search input has focus
        if !key.is_navigation() {
            return match (self.focus, key) {
                (FocusArea::Search, NavKey::Char(c)) => {
                    self.query.push(c);
                    self.on_query_changed()
                }
                (FocusArea::Search, NavKey::Backspace) => {
                    if self.query.pop().is_some() {
                        self.on_query_changed()
                    } else {
                        Vec::new()
                    }
                }
                (FocusArea::Details, NavKey::Char('['))
                    if self.detail_focus == DetailFocus::Content =>
                {
                    self.step_carousel(false).into_iter().collect()
                }
                (FocusArea::Details, NavKey::Char(']'))
                    if self.detail_focus == DetailFocus::Content =>
                {
                    self.step_carousel(true).into_iter().collect()
                }
                _ => Vec::new(),
            };
        }

        let mut effects = Vec::new();
        let len = self.filtered_results().len();
        match key {
            NavKey::Up => match self.focus {
                FocusArea::Results if self.selected_result_index > 0 => {
                    effects.extend(self.select_index(self.selected_result_index - 1));
                }
                FocusArea::Results => self.focus = FocusArea::Tabs,
                FocusArea::Details => match self.detail_focus {
                    DetailFocus::Actions if self.selected_action > 0 => self.selected_action -= 1,
                    DetailFocus::Actions => self.detail_focus = DetailFocus::Content,
                    DetailFocus::Content => {}
                },
                _ => {}
            },
            NavKey::Down => match self.focus {
                FocusArea::Search | FocusArea::Tabs if len > 0 => {
                    effects.extend(self.navigate_to_results());
                }
                FocusArea::Results if self.selected_result_index + 1 < len => {
                    effects.extend(self.select_index(self.selected_result_index + 1));
                }
                FocusArea::Details => match self.detail_focus {
                    DetailFocus::Content => {
                        self.detail_focus = DetailFocus::Actions;
                        self.selected_action = 0;
                    }
                    DetailFocus::Actions if self.selected_action + 1 < ACTION_COUNT => {
                        self.selected_action += 1;
                    }
                    DetailFocus::Actions => {}
                },
                _ => {}
            },
            NavKey::Left => match self.focus {
                FocusArea::Tabs => {
                    let idx = self.active_tab.index();
                    if idx > 0 {
                        effects.extend(self.set_tab(Tab::ALL[idx - 1]));
                    }
                }
                FocusArea::Results => self.focus = FocusArea::Tabs,
                FocusArea::Details => {
                    self.focus = FocusArea::Results;
                    self.reset_detail_focus();
                }
                FocusArea::Search => {}
            },
            NavKey::Right => match self.focus {
                FocusArea::Tabs => {
                    let idx = self.active_tab.index();
                    if idx + 1 < Tab::ALL.len() {
                        effects.extend(self.set_tab(Tab::ALL[idx + 1]));
                    }
                }
                FocusArea::Results => {
                    self.focus = FocusArea::Details;
                    self.reset_detail_focus();
                }
                _ => {}
            },
            NavKey::Enter => match self.focus {
                FocusArea::Search => effects.extend(self.dispatch_search()),
                FocusArea::Results => {
                    if let Some(row) = self.selected() {
                        effects.push(Effect::Open {
                            title: row.title.clone(),
                        });
                    }
                }
                FocusArea::Details if self.detail_focus == DetailFocus::Actions => {
                    effects.push(Effect::RunAction {
                        action: ACTIONS[self.selected_action],
                        title: self.selected().map(|r| r.title.clone()),
                    });
                }
                _ => {}
            },
            NavKey::Esc => {
                self.focus = FocusArea::Search;
                self.reset_detail_focus();
                self.query.clear();
                self.clear_search();
                effects.extend(self.revalidate_selection());
            }
            NavKey::Tab | NavKey::BackTab => {
                let next = if key == NavKey::Tab {
                    self.focus.next()
                } else {
                    self.focus.prev()
                };
                self.focus = next;
                if next == FocusArea::Details {
                    self.reset_detail_focus();
                }
            }
            NavKey::Char(_) | NavKey::Backspace => {}
        }
        effects
    }

    // ------------------------------------------------------------------
    // Background results
    // ------------------------------------------------------------------

    pub fn apply(&mut self, msg: Msg) -> Vec<Effect> {
        let mut effects = Vec::new();
        match msg {
            Msg::TimeMachineLoaded(result) => {
                self.is_loading = false;
                match result {
                    Ok(rows) => {
                        info!("Loaded {} time machine events", rows.len());
                        self.time_machine = rows;
                    }
                    Err(e) => {
                        warn!("Failed to load time machine data: {}", e);
                        self.notify(format!("Failed to load events: {}", e), NotificationKind::Error);
                        self.api_error = Some(e);
                    }
                }
                if self.shows_time_machine() {
                    effects.extend(self.revalidate_selection());
                }
            }
            Msg::SearchFinished { seq, result } => {
                if seq != self.search_seq {
                    debug!("Dropping stale search response #{} (latest #{})", seq, self.search_seq);
                    return effects;
                }
                self.is_searching = false;
                match result {
                    Ok(rows) => {
                        info!("Search #{} returned {} results", seq, rows.len());
                        self.search_results = rows;
                        self.last_search_query = self.query.trim().to_string();
                        self.api_error = None;
                    }
                    Err(e) => {
                        warn!("Search #{} failed: {}", seq, e);
                        self.search_results.clear();
                        self.notify(format!("Search failed: {}", e), NotificationKind::Error);
                        self.api_error = Some(e);
                    }
                }
                effects.extend(self.revalidate_selection());
            }
            Msg::EventDetailLoaded { seq, result } => {
                if seq != self.detail_seq {
                    return effects;
                }
                self.carousel.loading = false;
                match result {
                    Ok(ids) => {
                        self.carousel.screenshot_ids = ids;
                        self.carousel.index = 0;
                        effects.extend(self.load_current_shot());
                    }
                    Err(e) => {
                        debug!("Event detail unavailable: {}", e);
                        self.carousel.screenshot_ids.clear();
                    }
                }
            }
            Msg::ScreenshotTextLoaded { seq, text } => {
                if seq == self.detail_seq {
                    self.carousel.description = text;
                }
            }
        }
        effects
    }

    pub fn notify(&mut self, text: impl Into<String>, kind: NotificationKind) {
        self.notification = Some(Notification::new(text, kind));
    }

    /// Drop the notification once it has been visible long enough.
    /// Returns true when something changed.
    pub fn expire_notification(&mut self, now: Instant) -> bool {
        ui::expire(&mut self.notification, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::EventData;
    use crate::transform::events_to_results;

    fn events(n: i64) -> Vec<DisplayResult> {
        let data: Vec<EventData> = (1..=n)
            .map(|id| EventData {
                id,
                app_name: Some("Google Chrome".into()),
                window_title: Some(format!("Tab {}", id)),
                start_time: "2024-12-15T10:25:00".into(),
                end_time: None,
                screenshot_count: 2,
                first_screenshot_id: None,
            })
            .collect();
        events_to_results(&data)
    }

    fn loaded_state(n: i64) -> LauncherState {
        let mut s = LauncherState::new();
        let _ = s.on_start();
        s.apply(Msg::TimeMachineLoaded(Ok(events(n))));
        s
    }

    fn type_str(s: &mut LauncherState, text: &str) -> Vec<Effect> {
        let mut effects = Vec::new();
        for c in text.chars() {
            effects.extend(s.handle_key(NavKey::Char(c)));
        }
        effects
    }

    #[test]
    fn test_tab_cycles_both_directions() {
        let mut s = LauncherState::new();
        let expected = [FocusArea::Tabs, FocusArea::Results, FocusArea::Details, FocusArea::Search];
        for want in expected {
            s.handle_key(NavKey::Tab);
            assert_eq!(s.focus, want);
        }
        s.handle_key(NavKey::BackTab);
        assert_eq!(s.focus, FocusArea::Details);
        s.handle_key(NavKey::BackTab);
        assert_eq!(s.focus, FocusArea::Results);
    }

    #[test]
    fn test_entering_details_by_tab_resets_substate() {
        let mut s = loaded_state(1);
        s.focus = FocusArea::Results;
        s.handle_key(NavKey::Right);
        s.handle_key(NavKey::Down);
        s.handle_key(NavKey::Down);
        assert_eq!((s.detail_focus, s.selected_action), (DetailFocus::Actions, 1));
        s.handle_key(NavKey::Tab); // -> search
        s.handle_key(NavKey::BackTab); // -> details
        assert_eq!((s.detail_focus, s.selected_action), (DetailFocus::Content, 0));
    }

    #[test]
    fn test_selection_stays_in_range() {
        let mut s = loaded_state(3);
        s.select_tab(Tab::TimeMachine);
        s.handle_key(NavKey::Down);
        assert_eq!(s.focus, FocusArea::Results);
        let keys = [
            NavKey::Down, NavKey::Down, NavKey::Down, NavKey::Down, NavKey::Up,
            NavKey::Down, NavKey::Down, NavKey::Down,
        ];
        for key in keys {
            s.handle_key(key);
            let len = s.filtered_results().len();
            assert!(s.selected_result_index < len);
            assert_eq!(
                s.selected_result.as_deref(),
                Some(s.filtered_results()[s.selected_result_index].id.as_str())
            );
        }
        assert_eq!(s.selected_result_index, 2);
        for _ in 0..3 {
            s.handle_key(NavKey::Up);
        }
        assert_eq!(s.selected_result_index, 0);
        assert_eq!(s.focus, FocusArea::Tabs);
    }

    #[test]
    fn test_empty_list_clears_selection() {
        let mut s = LauncherState::new();
        s.select_tab(Tab::TimeMachine);
        assert!(s.filtered_results().is_empty());
        assert!(s.selected_result.is_none());
        assert_eq!(s.selected_result_index, 0);
        s.handle_key(NavKey::Down);
        assert_eq!(s.focus, FocusArea::Search);
    }

    #[test]
    fn test_filter_rule_is_deterministic() {
        let s = loaded_state(2);
        let all: Vec<String> = s.filtered_results().iter().map(|r| r.id.clone()).collect();
        let mut expected: Vec<String> = static_results().into_iter().map(|r| r.id).collect();
        expected.extend(["event-1".to_string(), "event-2".to_string()]);
        assert_eq!(all, expected);

        let mut s = loaded_state(2);
        s.select_tab(Tab::Docs);
        assert!(s.filtered_results().iter().all(|r| r.category == Category::Docs));
        assert_eq!(s.filtered_results().len(), 8);
        s.select_tab(Tab::TimeMachine);
        let ids: Vec<&str> = s.filtered_results().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["event-1", "event-2"]);
    }

    #[test]
    fn test_grouping_follows_category_runs() {
        let s = loaded_state(2);
        let groups = s.grouped_results();
        let cats: Vec<Category> = groups.iter().map(|(c, _)| *c).collect();
        assert_eq!(cats, vec![Category::Apps, Category::Docs, Category::TimeMachine]);
        assert_eq!(groups[2].1[0].0, 18);
    }

    #[test]
    fn test_tab_arrows_clamp_and_clear_search() {
        let mut s = loaded_state(1);
        type_str(&mut s, "rust");
        assert!(s.has_searched);
        s.focus = FocusArea::Tabs;
        s.handle_key(NavKey::Left);
        assert_eq!(s.active_tab, Tab::All);
        s.handle_key(NavKey::Right);
        assert_eq!(s.active_tab, Tab::Apps);
        assert!(s.query.is_empty());
        assert!(!s.has_searched);
        for _ in 0..5 {
            s.handle_key(NavKey::Right);
        }
        assert_eq!(s.active_tab, Tab::TimeMachine);
    }

    #[test]
    fn test_time_machine_tab_refetches_only_when_empty_and_idle() {
        let mut s = LauncherState::new();
        assert_eq!(s.on_start(), vec![Effect::LoadTimeMachine]);
        // still loading: guard suppresses a second fetch
        assert!(!s.select_tab(Tab::TimeMachine).contains(&Effect::LoadTimeMachine));
        s.apply(Msg::TimeMachineLoaded(Err("down".into())));
        s.select_tab(Tab::All);
        assert!(s.select_tab(Tab::TimeMachine).contains(&Effect::LoadTimeMachine));
        s.apply(Msg::TimeMachineLoaded(Ok(events(1))));
        s.select_tab(Tab::All);
        assert!(!s.select_tab(Tab::TimeMachine).contains(&Effect::LoadTimeMachine));
    }

    #[test]
    fn test_stale_search_response_is_dropped() {
        let mut s = loaded_state(0);
        let first = type_str(&mut s, "a");
        let second = type_str(&mut s, "b");
        let seq_of = |e: &[Effect]| match e.last() {
            Some(Effect::Search { seq, .. }) => *seq,
            other => panic!("expected search, got {:?}", other),
        };
        let (old, new) = (seq_of(&first), seq_of(&second));
        assert!(new > old);

        s.apply(Msg::SearchFinished { seq: new, result: Ok(events(1)) });
        s.apply(Msg::SearchFinished { seq: old, result: Ok(events(3)) });
        assert_eq!(s.filtered_results().len(), 1);
        assert_eq!(s.last_search_query, "ab");
        assert_eq!(s.selected_result.as_deref(), Some("event-1"));
    }

    #[test]
    fn test_first_keystroke_drops_stale_selection() {
        let mut s = LauncherState::new();
        s.handle_key(NavKey::Down);
        for _ in 0..5 {
            s.handle_key(NavKey::Down);
        }
        assert_eq!(s.selected_result_index, 5);
        assert!(s.selected_result.is_some());

        s.focus = FocusArea::Search;
        let effects = s.handle_key(NavKey::Char('a'));
        assert!(matches!(effects.last(), Some(Effect::Search { .. })));
        assert!(s.filtered_results().is_empty());
        assert!(s.selected_result.is_none());
        assert_eq!(s.selected_result_index, 0);
    }

    #[test]
    fn test_clearing_query_is_synchronous() {
        let mut s = loaded_state(2);
        let effects = type_str(&mut s, "x");
        let Some(Effect::Search { seq, .. }) = effects.last().cloned() else {
            panic!("search not dispatched");
        };
        s.handle_key(NavKey::Backspace);
        assert!(s.search_results.is_empty());
        assert!(!s.has_searched);
        assert!(!s.is_searching);
        // the request still in flight must not repopulate anything
        s.apply(Msg::SearchFinished { seq, result: Ok(events(5)) });
        assert!(s.search_results.is_empty());
        assert!(!s.has_searched);
    }

    #[test]
    fn test_search_error_and_empty_are_distinct() {
        let mut s = loaded_state(0);
        let Some(Effect::Search { seq, .. }) = type_str(&mut s, "q").pop() else {
            panic!()
        };
        s.apply(Msg::SearchFinished { seq, result: Ok(Vec::new()) });
        assert!(s.api_error.is_none());
        assert!(s.has_searched && s.filtered_results().is_empty());

        let Some(Effect::Search { seq, .. }) = s.handle_key(NavKey::Enter).pop() else {
            panic!()
        };
        s.apply(Msg::SearchFinished { seq, result: Err("boom".into()) });
        assert_eq!(s.api_error.as_deref(), Some("boom"));
        assert!(s.notification.is_some());
    }

    #[test]
    fn test_escape_returns_to_search_and_clears() {
        let mut s = loaded_state(1);
        type_str(&mut s, "abc");
        s.focus = FocusArea::Details;
        s.detail_focus = DetailFocus::Actions;
        s.handle_key(NavKey::Esc);
        assert_eq!(s.focus, FocusArea::Search);
        assert_eq!(s.detail_focus, DetailFocus::Content);
        assert!(s.query.is_empty());
        assert!(!s.has_searched);
        assert_eq!(s.selected_result_index, 0);
        assert!(s.selected_result.is_some());
    }

    #[test]
    fn test_details_action_navigation() {
        let mut s = loaded_state(1);
        s.focus = FocusArea::Results;
        s.handle_key(NavKey::Right);
        assert_eq!(s.focus, FocusArea::Details);
        s.handle_key(NavKey::Down);
        assert_eq!(s.detail_focus, DetailFocus::Actions);
        for _ in 0..5 {
            s.handle_key(NavKey::Down);
        }
        assert_eq!(s.selected_action, ACTION_COUNT - 1);
        let effects = s.handle_key(NavKey::Enter);
        assert!(matches!(
            effects.as_slice(),
            [Effect::RunAction { action: "Open file location", .. }]
        ));
        for _ in 0..ACTION_COUNT {
            s.handle_key(NavKey::Up);
        }
        assert_eq!(s.detail_focus, DetailFocus::Content);
        s.handle_key(NavKey::Left);
        assert_eq!(s.focus, FocusArea::Results);
    }

    #[test]
    fn test_typing_ignored_outside_search() {
        let mut s = LauncherState::new();
        s.focus = FocusArea::Results;
        assert!(s.handle_key(NavKey::Char('x')).is_empty());
        assert!(s.query.is_empty());
    }

    #[test]
    fn test_settings_modal_swallows_keys() {
        let mut s = loaded_state(1);
        s.open_settings();
        s.handle_key(NavKey::Tab);
        s.handle_key(NavKey::Char('a'));
        assert_eq!(s.focus, FocusArea::Search);
        assert!(s.query.is_empty());
        s.handle_key(NavKey::Esc);
        assert!(!s.show_settings);
    }

    #[test]
    fn test_event_selection_loads_carousel() {
        let mut s = loaded_state(1);
        s.select_tab(Tab::TimeMachine);
        let detail_seq = s.detail_seq;
        assert!(s.carousel.loading);
        assert_eq!(s.carousel.event_id, Some(1));

        let effects = s.apply(Msg::EventDetailLoaded { seq: detail_seq, result: Ok(vec![10, 11, 12]) });
        let Some(Effect::LoadScreenshotText { seq, screenshot_id }) = effects.first().cloned() else {
            panic!("expected screenshot load");
        };
        assert_eq!(screenshot_id, 10);
        s.apply(Msg::ScreenshotTextLoaded { seq, text: "hello".into() });
        assert_eq!(s.carousel.description, "hello");

        s.focus = FocusArea::Details;
        let back = s.handle_key(NavKey::Char('['));
        assert_eq!(s.carousel.index, 2);
        assert!(matches!(back.as_slice(), [Effect::LoadScreenshotText { screenshot_id: 12, .. }]));
        s.handle_key(NavKey::Char(']'));
        assert_eq!(s.carousel.index, 0);
    }

    #[test]
    fn test_notification_expires() {
        let mut s = LauncherState::new();
        s.notify("hi", NotificationKind::Info);
        let shown = s.notification.as_ref().unwrap().shown_at;
        assert!(!s.expire_notification(shown + std::time::Duration::from_secs(1)));
        assert!(s.expire_notification(shown + ui::NOTIFICATION_TTL));
        assert!(s.notification.is_none());
    }
}
