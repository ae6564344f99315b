//! Backend records -> display rows

use crate::api::{EventData, ScreenshotData, SemanticSearchResult};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use log::debug;
use serde_json::Value;
use std::fmt;

const TITLE_MAX_CHARS: usize = 50;
const DEFAULT_ICON: &str = "📷";
const DISPLAY_PATTERN: &str = "%Y/%m/%d %H:%M";
pub const UNKNOWN_TIME: &str = "Unknown time";
pub const NO_TEXT: &str = "No text content";

/// Lowercased app-name substring -> icon, checked in order.
const APP_ICONS: &[(&str, &str)] = &[
    ("chrome", "🌐"),
    ("firefox", "🦊"),
    ("edge", "🌐"),
    ("vscode", "💻"),
    ("visual studio code", "💻"),
    ("notepad", "📝"),
    ("notepad++", "📄"),
    ("word", "📄"),
    ("excel", "📊"),
    ("powerpoint", "📋"),
    ("onenote", "📓"),
    ("notion", "📋"),
    ("photoshop", "🎨"),
    ("illustrator", "🎨"),
    ("figma", "🎨"),
    ("steam", "🎮"),
    ("discord", "💬"),
    ("qq", "💬"),
    ("wechat", "💬"),
    ("explorer", "📁"),
    ("file", "📁"),
    ("music", "🎵"),
    ("video", "🎬"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Apps,
    Docs,
    TimeMachine,
}

impl Category {
    pub const fn label(self) -> &'static str {
        match self {
            Category::Apps => "Apps",
            Category::Docs => "Docs",
            Category::TimeMachine => "Time Machine",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Backend entity a row was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultSource {
    Static,
    Event(i64),
    Screenshot(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRange {
    pub start: String,
    pub end: String,
}

/// One row of the launcher result list. Rebuilt on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayResult {
    pub id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub category: Category,
    pub icon: String,
    pub time_range: Option<TimeRange>,
    pub description: Option<String>,
    pub source: ResultSource,
}

impl DisplayResult {
    pub fn event_id(&self) -> Option<i64> {
        match self.source {
            ResultSource::Event(id) => Some(id),
            _ => None,
        }
    }
}

pub fn icon_for_app(app_name: Option<&str>) -> &'static str {
    let Some(name) = app_name else {
        return DEFAULT_ICON;
    };
    let lower = name.to_lowercase();
    APP_ICONS
        .iter()
        .find(|(key, _)| lower.contains(key))
        .map(|(_, icon)| *icon)
        .unwrap_or(DEFAULT_ICON)
}

/// Cut to 50 characters and mark the cut with "...".
pub fn truncate_title(title: &str) -> String {
    match title.char_indices().nth(TITLE_MAX_CHARS) {
        Some((byte_end, _)) => format!("{}...", &title[..byte_end]),
        None => title.to_string(),
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Local));
    }
    // Naive timestamps from the backend are local wall-clock time
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Local.from_local_datetime(&naive).earliest();
        }
    }
    None
}

/// Format a backend timestamp for display.
///
/// Tries the string as-is, then coerced to an ISO time (`T00:00:00.000Z`
/// appended to a bare date), and finally returns it unchanged.
pub fn format_date_time(raw: &str) -> String {
    if raw.trim().is_empty() {
        return UNKNOWN_TIME.to_string();
    }
    if let Some(dt) = parse_timestamp(raw) {
        return dt.format(DISPLAY_PATTERN).to_string();
    }
    if !raw.contains('T') {
        let coerced = format!("{}T00:00:00.000Z", raw.trim());
        if let Some(dt) = parse_timestamp(&coerced) {
            return dt.format(DISPLAY_PATTERN).to_string();
        }
    }
    debug!("Unparseable timestamp kept as-is: {}", raw);
    raw.to_string()
}

fn title_from(window_title: Option<&str>, app_name: Option<&str>, fallback: &str) -> String {
    let title = window_title
        .filter(|t| !t.is_empty())
        .or(app_name.filter(|a| !a.is_empty()))
        .unwrap_or(fallback);
    truncate_title(title)
}

pub fn event_to_result(event: &EventData) -> DisplayResult {
    let start = format_date_time(&event.start_time);
    let end = event
        .end_time
        .as_deref()
        .map(format_date_time)
        .unwrap_or_else(|| start.clone());
    DisplayResult {
        id: format!("event-{}", event.id),
        title: title_from(event.window_title.as_deref(), event.app_name.as_deref(), "Event"),
        subtitle: event.app_name.clone(),
        category: Category::TimeMachine,
        icon: icon_for_app(event.app_name.as_deref()).to_string(),
        time_range: Some(TimeRange { start, end }),
        description: Some(format!("Contains {} screenshots", event.screenshot_count)),
        source: ResultSource::Event(event.id),
    }
}

pub fn events_to_results(events: &[EventData]) -> Vec<DisplayResult> {
    events.iter().map(event_to_result).collect()
}

pub fn screenshot_to_result(shot: &ScreenshotData) -> DisplayResult {
    let time = format_date_time(&shot.created_at);
    let description = shot
        .text_content
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or(NO_TEXT)
        .to_string();
    DisplayResult {
        id: format!("screenshot-{}", shot.id),
        title: title_from(shot.window_title.as_deref(), shot.app_name.as_deref(), "Unknown app"),
        subtitle: shot.app_name.clone(),
        category: Category::TimeMachine,
        icon: icon_for_app(shot.app_name.as_deref()).to_string(),
        time_range: Some(TimeRange {
            start: time.clone(),
            end: time,
        }),
        description: Some(description),
        source: ResultSource::Screenshot(shot.id),
    }
}

/// Prefer the embedded screenshot record, else build from metadata.
/// `ordinal` (the hit's position in its result list) keeps ids unique when
/// the metadata carries no id.
pub fn semantic_to_result(hit: &SemanticSearchResult, ordinal: usize) -> DisplayResult {
    if let Some(shot) = &hit.screenshot {
        return screenshot_to_result(shot);
    }
    let meta_str = |key: &str| hit.metadata.get(key).and_then(Value::as_str);
    let meta_id = hit.metadata.get("id").and_then(|v| {
        v.as_i64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
    });
    let app_name = meta_str("app_name");
    let time = meta_str("created_at")
        .map(format_date_time)
        .unwrap_or_else(|| "Digital record".to_string());
    let description = if hit.text.trim().is_empty() {
        NO_TEXT.to_string()
    } else {
        hit.text.clone()
    };
    DisplayResult {
        id: match meta_id {
            Some(id) => format!("search-result-{}", id),
            None => format!("search-result-unknown-{}", ordinal),
        },
        title: title_from(meta_str("window_title"), app_name, "Search result"),
        subtitle: app_name.map(str::to_string),
        category: Category::TimeMachine,
        icon: icon_for_app(app_name).to_string(),
        time_range: Some(TimeRange {
            start: time.clone(),
            end: time,
        }),
        description: Some(description),
        source: meta_id.map(ResultSource::Screenshot).unwrap_or(ResultSource::Static),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_icon_substring_match() {
        assert_eq!(icon_for_app(Some("Google Chrome")), "🌐");
        assert_eq!(icon_for_app(Some("Microsoft Excel")), "📊");
        assert_eq!(icon_for_app(Some("Notepad++")), "📝"); // "notepad" wins by order
        assert_eq!(icon_for_app(Some("Terminal")), DEFAULT_ICON);
        assert_eq!(icon_for_app(None), DEFAULT_ICON);
    }

    #[test]
    fn test_truncate_title_counts_chars() {
        let short = "main.rs - lifetrace";
        assert_eq!(truncate_title(short), short);

        let long: String = "界".repeat(60);
        let cut = truncate_title(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), 53);

        let exact: String = "a".repeat(50);
        assert_eq!(truncate_title(&exact), exact);
    }

    #[test]
    fn test_format_naive_timestamp() {
        assert_eq!(format_date_time("2024-12-15T10:25:00"), "2024/12/15 10:25");
        assert_eq!(format_date_time("2024-12-15 10:25:30.123"), "2024/12/15 10:25");
    }

    #[test]
    fn test_format_bare_date_uses_iso_retry() {
        let expected = Utc
            .with_ymd_and_hms(2024, 12, 15, 0, 0, 0)
            .unwrap()
            .with_timezone(&Local)
            .format(DISPLAY_PATTERN)
            .to_string();
        assert_eq!(format_date_time("2024-12-15"), expected);
    }

    #[test]
    fn test_format_garbage_returns_raw() {
        assert_eq!(format_date_time("yesterday-ish"), "yesterday-ish");
        assert_eq!(format_date_time(""), UNKNOWN_TIME);
    }

    #[test]
    fn test_event_transform() {
        let event = EventData {
            id: 12,
            app_name: Some("Visual Studio Code".into()),
            window_title: None,
            start_time: "2024-12-15T10:25:00".into(),
            end_time: None,
            screenshot_count: 4,
            first_screenshot_id: Some(100),
        };
        let r = event_to_result(&event);
        assert_eq!(r.id, "event-12");
        assert_eq!(r.title, "Visual Studio Code");
        assert_eq!(r.icon, "💻");
        assert_eq!(r.category, Category::TimeMachine);
        let range = r.time_range.unwrap();
        assert_eq!(range.start, range.end);
        assert_eq!(r.description.as_deref(), Some("Contains 4 screenshots"));
        assert_eq!(r.source, ResultSource::Event(12));
    }

    #[test]
    fn test_screenshot_without_text_gets_placeholder() {
        let shot = ScreenshotData {
            id: 3,
            created_at: "bad".into(),
            ..ScreenshotData::default()
        };
        let r = screenshot_to_result(&shot);
        assert_eq!(r.id, "screenshot-3");
        assert_eq!(r.title, "Unknown app");
        assert_eq!(r.description.as_deref(), Some(NO_TEXT));
        assert_eq!(r.time_range.unwrap().start, "bad");
    }

    #[test]
    fn test_semantic_hit_from_metadata() {
        let hit: SemanticSearchResult = serde_json::from_str(
            r#"{"text":"","score":0.8,"metadata":{"id":"42","app_name":"WeChat"}}"#,
        )
        .unwrap();
        let r = semantic_to_result(&hit, 0);
        assert_eq!(r.id, "search-result-42");
        assert_eq!(r.icon, "💬");
        assert_eq!(r.time_range.unwrap().start, "Digital record");
        assert_eq!(r.source, ResultSource::Screenshot(42));
    }

    #[test]
    fn test_semantic_hits_without_id_stay_distinct() {
        let hit: SemanticSearchResult =
            serde_json::from_str(r#"{"text":"notes","metadata":{"app_name":"Slack"}}"#).unwrap();
        let a = semantic_to_result(&hit, 0);
        let b = semantic_to_result(&hit, 1);
        assert_ne!(a.id, b.id);
        assert_eq!(b.id, "search-result-unknown-1");
        assert_eq!(a.source, ResultSource::Static);
    }
}
