//! Headless search: query the backend and print results as text

use crate::api::{ApiClient, ListParams, SemanticSearchRequest};
use crate::error::ApiError;
use crate::transform::{
    events_to_results, screenshot_to_result, semantic_to_result, DisplayResult, UNKNOWN_TIME,
};
use log::info;

/// What to search and how.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub query: Option<String>,
    pub screenshots: bool,
    pub semantic: bool,
    pub limit: usize,
}

/// Run one search. Without a query the most recent records are listed.
pub fn find(client: &ApiClient, opts: &FindOptions) -> Result<Vec<DisplayResult>, ApiError> {
    let query = opts.query.as_deref().map(str::trim).filter(|q| !q.is_empty());
    let limit = opts.limit.max(1);
    let params = ListParams::limit(limit as u32);

    let results = match (query, opts.screenshots) {
        (None, false) => events_to_results(&client.list_events(&params)?),
        (None, true) => client
            .list_screenshots(&params)?
            .iter()
            .map(screenshot_to_result)
            .collect(),
        (Some(q), false) => events_to_results(&client.search_events_with_fallback(q, limit)?),
        (Some(q), true) if opts.semantic => {
            let request = SemanticSearchRequest {
                query: q.to_string(),
                top_k: limit,
                ..SemanticSearchRequest::default()
            };
            client
                .semantic_search(&request)?
                .iter()
                .enumerate()
                .map(|(i, hit)| semantic_to_result(hit, i))
                .collect()
        }
        (Some(q), true) => client
            .search_screenshots(q, &params)?
            .iter()
            .map(screenshot_to_result)
            .collect(),
    };
    info!("find returned {} results", results.len());
    Ok(results)
}

/// One result as a line: time, icon, title, then the source in brackets.
pub fn format_row(row: &DisplayResult) -> String {
    let time = row
        .time_range
        .as_ref()
        .map(|t| t.start.as_str())
        .unwrap_or(UNKNOWN_TIME);
    let mut line = format!("{:<16}  {} {}", time, row.icon, row.title);
    if let Some(sub) = &row.subtitle {
        line.push_str(&format!("  [{}]", sub));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_server::{json_response, serve};
    use crate::transform::ResultSource;

    #[test]
    fn test_recent_events_without_query() {
        let body = r#"[{"id":3,"app_name":"Code","window_title":"lib.rs","start_time":"","screenshot_count":2}]"#;
        let (base, rx) = serve(vec![json_response("200 OK", body)]);
        let opts = FindOptions {
            query: Some("   ".into()),
            limit: 5,
            ..FindOptions::default()
        };
        let rows = find(&ApiClient::new(base), &opts).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source, ResultSource::Event(3));
        assert_eq!(rx.recv().unwrap().request_line, "GET /api/events?limit=5 HTTP/1.1");
        assert!(format_row(&rows[0]).starts_with(UNKNOWN_TIME));
    }

    #[test]
    fn test_screenshot_keyword_search() {
        let body = r#"[{"id":9,"app_name":"Firefox","window_title":"Docs","created_at":"","text_content":"hello"}]"#;
        let (base, rx) = serve(vec![json_response("200 OK", body)]);
        let opts = FindOptions {
            query: Some("hello".into()),
            screenshots: true,
            limit: 10,
            ..FindOptions::default()
        };
        let rows = find(&ApiClient::new(base), &opts).unwrap();
        assert_eq!(rows[0].id, "screenshot-9");
        assert_eq!(rows[0].description.as_deref(), Some("hello"));
        let req = rx.recv().unwrap();
        assert!(req.request_line.starts_with("POST /api/search"));
        assert!(req.body.contains("\"limit\":10"));
    }

    #[test]
    fn test_semantic_screenshot_search() {
        let body = r#"[{"text":"standup notes","score":0.8,"metadata":{"id":"12","app_name":"Slack"}}]"#;
        let (base, rx) = serve(vec![json_response("200 OK", body)]);
        let opts = FindOptions {
            query: Some("standup".into()),
            screenshots: true,
            semantic: true,
            limit: 3,
        };
        let rows = find(&ApiClient::new(base), &opts).unwrap();
        assert_eq!(rows[0].source, ResultSource::Screenshot(12));
        assert_eq!(format_row(&rows[0]), format!("{:<16}  {} Slack  [Slack]", "Digital record", rows[0].icon));
        let req = rx.recv().unwrap();
        assert!(req.request_line.starts_with("POST /api/semantic-search"));
        assert!(req.body.contains("\"top_k\":3"));
        assert!(!req.body.contains("use_rerank"));
    }

    #[test]
    fn test_errors_propagate() {
        let opts = FindOptions {
            limit: 1,
            ..FindOptions::default()
        };
        let err = find(&ApiClient::new("http://127.0.0.1:9"), &opts).unwrap_err();
        assert!(err.is_unreachable());
    }
}
