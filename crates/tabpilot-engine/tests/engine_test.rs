//! End-to-end command execution against the fake browser.

mod common;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use common::{Call, Harness, PNG, candidate};
use serde_json::json;
use tabpilot_engine::CommandRecord;

fn record(json: serde_json::Value) -> CommandRecord {
    serde_json::from_value(json).unwrap()
}

#[tokio::test]
async fn test_navigation_from_blank_tab() {
    let h = Harness::new();
    let result = h
        .executor
        .execute_record(&record(json!({"type": "navigation", "url": "example.com"})))
        .await;

    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.message.as_deref(), Some("Navigated to https://example.com"));
    assert_eq!(result.screenshot.as_deref(), Some(PNG));
    assert_eq!(h.platform.loads(), vec!["https://example.com"]);

    let image = base64::engine::general_purpose::STANDARD
        .decode(result.screenshot.unwrap())
        .unwrap();
    assert!(image.starts_with(b"\x89PNG"));
}

#[tokio::test]
async fn test_back_returns_to_previous_tracked_url() {
    let h = Harness::new();
    for url in ["https://a.example.com/", "https://b.example.com/"] {
        let r = h
            .executor
            .execute_record(&record(json!({"type": "navigation", "url": url})))
            .await;
        assert!(r.success);
    }

    let result = h.executor.execute_record(&record(json!({"type": "back"}))).await;
    assert!(result.success);
    assert_eq!(
        result.message.as_deref(),
        Some("Went back to https://a.example.com/")
    );

    let tab = h.tab_id().await;
    assert_eq!(h.session().history.current_position(&tab), Some(0));
    assert_eq!(
        h.platform.url_of(&tab).as_deref(),
        Some("https://a.example.com/")
    );
}

#[tokio::test]
async fn test_back_without_history_succeeds_with_warning() {
    let h = Harness::new();
    let result = h.executor.execute_record(&record(json!({"type": "back"}))).await;
    assert!(result.success);
    assert_eq!(result.warning.as_deref(), Some("No history to go back"));
    assert!(result.screenshot.is_none());
}

#[tokio::test]
async fn test_find_and_click_missing_text_names_it() {
    let h = Harness::new();
    h.executor
        .execute_record(&record(json!({"type": "navigation", "url": "https://example.com"})))
        .await;
    h.platform
        .on_script("collect_candidates", |_| Ok(json!([candidate(0, "Cancel")])));

    let result = h
        .executor
        .execute_record(&record(json!({"type": "findAndClick", "text": "Submit"})))
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().contains("Submit"));
    // Failures still carry the post-command screenshot.
    assert_eq!(result.screenshot.as_deref(), Some(PNG));
}

#[tokio::test]
async fn test_find_and_click_clicks_best_candidate() {
    let h = Harness::new();
    h.platform.on_script("collect_candidates", |_| {
        Ok(json!([candidate(0, "Submit later"), candidate(1, "Submit")]))
    });

    let result = h
        .executor
        .execute_record(&record(json!({"type": "findAndClick", "text": "Submit"})))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        h.platform.script_calls("click_candidate"),
        vec![vec![json!(1), json!(0)]]
    );
}

#[tokio::test]
async fn test_unknown_command_does_not_touch_browser() {
    let h = Harness::new();
    let result = h.executor.execute_record(&record(json!({"type": "teleport"}))).await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Unknown command type: teleport"));
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn test_invalid_record_is_rejected() {
    let h = Harness::new();
    let result = h
        .executor
        .execute_record(&record(json!({"type": "scroll", "direction": "down", "amount": 0})))
        .await;
    assert!(!result.success);
    assert!(result.error.as_deref().unwrap().starts_with("Invalid scroll command"));
    assert!(h.platform.calls().is_empty());
}

#[tokio::test]
async fn test_navigation_with_plain_words_searches_and_opens_first_result() {
    let h = Harness::new();
    h.platform.on_script("click_first_result", |_| {
        Ok(json!("https://www.rust-lang.org/"))
    });
    h.platform.navigates_on("click_first_result");

    let result = h
        .executor
        .execute_record(&record(json!({"type": "navigation", "url": "rust language"})))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        h.platform.loads(),
        vec!["https://www.google.com/search?q=rust+language"]
    );

    let tab = h.tab_id().await;
    assert_eq!(
        h.session().history.entries(&tab),
        vec![
            "https://www.google.com/search?q=rust+language",
            "https://www.rust-lang.org/"
        ]
    );
}

#[tokio::test]
async fn test_opened_search_result_gets_overlay_and_becomes_known_url() {
    let h = Harness::new();
    h.platform.on_script("click_first_result", |_| {
        Ok(json!("https://www.rust-lang.org/"))
    });
    h.platform.navigates_on("click_first_result");

    let result = h
        .executor
        .execute_record(&record(json!({"type": "navigation", "url": "rust language"})))
        .await;
    assert!(result.success, "{:?}", result.error);

    // Once for the results page, once for the opened result.
    assert_eq!(h.platform.script_calls("cursor_overlay").len(), 2);
    let tab = h.session().tabs.current().await.unwrap();
    assert_eq!(
        tab.last_known_url.as_deref(),
        Some("https://www.rust-lang.org/")
    );
    assert_eq!(
        h.platform.url_of(&tab.tab_id).as_deref(),
        Some("https://www.rust-lang.org/")
    );
}

#[tokio::test]
async fn test_search_fallback_without_results_fails() {
    let h = Harness::new();
    let result = h
        .executor
        .execute_record(&record(json!({"type": "navigation", "url": "rust language"})))
        .await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Could not find search results"));
}

#[tokio::test]
async fn test_error_page_falls_back_to_search() {
    let h = Harness::new();
    h.platform.on_script("detect_error_page", |_| Ok(json!(true)));

    let result = h
        .executor
        .execute_record(&record(json!({
            "type": "navigation",
            "url": "no-such-site.example",
            "skipFirstResult": true
        })))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        h.platform.loads(),
        vec![
            "https://no-such-site.example",
            "https://www.google.com/search?q=no-such-site.example"
        ]
    );
    assert!(h.platform.script_calls("click_first_result").is_empty());
}

#[tokio::test]
async fn test_unresolvable_host_falls_back_to_search() {
    let h = Harness::new();
    h.platform.fail_host("unreachable.example");

    let result = h
        .executor
        .execute_record(&record(json!({
            "type": "navigation",
            "url": "unreachable.example",
            "skipFirstResult": true
        })))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(h.platform.loads().len(), 2);
}

#[tokio::test]
async fn test_smart_click_uses_vision_point() {
    let h = Harness::new();
    h.executor
        .execute_record(&record(json!({"type": "navigation", "url": "https://example.com"})))
        .await;
    h.vision.respond_match(0.4, 0.2, 0.93);

    let result = h
        .executor
        .execute_record(&record(json!({"type": "smartClick", "target": "shopping cart icon"})))
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(
        result.message.as_deref(),
        Some("Clicked \"shopping cart icon\" (vision)")
    );
    assert_eq!(
        h.platform.script_calls("click_at_point"),
        vec![vec![json!(0.4), json!(0.2)]]
    );
}

#[tokio::test]
async fn test_smart_click_falls_through_every_strategy() {
    let h = Harness::new();
    h.executor
        .execute_record(&record(json!({"type": "navigation", "url": "https://example.com"})))
        .await;
    h.vision.respond_match(0.4, 0.2, 0.5);

    let result = h
        .executor
        .execute_record(&record(json!({"type": "click", "text": "Checkout"})))
        .await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Could not find element matching \"Checkout\"")
    );

    let scopes: Vec<_> = h.platform.script_calls("collect_candidates");
    assert_eq!(scopes, vec![vec![json!("clickable")], vec![json!("all")]]);
    assert_eq!(
        h.platform.script_calls("text_click_fallback"),
        vec![vec![json!("Checkout")]]
    );
}

#[tokio::test]
async fn test_smart_click_label_scan_succeeds() {
    let h = Harness::new();
    h.platform.on_script("text_click_fallback", |_| Ok(json!(true)));

    let result = h
        .executor
        .execute_record(&record(json!({"type": "smartClick", "target": "Sign in"})))
        .await;
    assert!(result.success, "{:?}", result.error);
}

#[tokio::test]
async fn test_scroll_defaults_amount() {
    let h = Harness::new();
    let result = h
        .executor
        .execute_record(&record(json!({"type": "scroll", "direction": "down"})))
        .await;
    assert!(result.success);
    assert_eq!(
        h.platform.script_calls("scroll"),
        vec![vec![json!("down"), json!(300)]]
    );
}

#[tokio::test]
async fn test_find_reports_missing_text() {
    let h = Harness::new();
    h.platform.on_script("find_text", |_| Ok(json!(false)));
    let result = h
        .executor
        .execute_record(&record(json!({"type": "find", "text": "Pricing"})))
        .await;
    assert!(!result.success);
    assert_eq!(
        result.error.as_deref(),
        Some("Text \"Pricing\" not found on page")
    );
}

#[tokio::test]
async fn test_type_and_press_enter() {
    let h = Harness::new();
    h.platform
        .on_script("type_text", |_| Ok(json!({"success": true, "tag": "input"})));
    h.platform.on_script("press_enter", |_| Ok(json!(true)));

    let typed = h
        .executor
        .execute_record(&record(json!({"type": "input", "text": "hello", "target": "email"})))
        .await;
    assert!(typed.success, "{:?}", typed.error);
    assert_eq!(
        h.platform.script_calls("type_text"),
        vec![vec![json!("hello"), json!("email")]]
    );

    let pressed = h
        .executor
        .execute_record(&record(json!({"type": "press_enter"})))
        .await;
    assert!(pressed.success);
}

#[tokio::test]
async fn test_search_command_without_input_fails() {
    let h = Harness::new();
    h.platform
        .on_script("search", |_| Ok(json!({"success": false, "method": null})));
    let result = h
        .executor
        .execute_record(&record(json!({"type": "search", "query": "socks"})))
        .await;
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("No search input found on page"));
}

#[tokio::test]
async fn test_refresh() {
    let h = Harness::new();
    let result = h.executor.execute_record(&record(json!({"type": "refresh"}))).await;
    assert!(result.success);
    assert_eq!(h.platform.count(|c| *c == Call::Reload), 1);
}

#[tokio::test(start_paused = true)]
async fn test_commands_never_overlap() {
    let h = Arc::new(Harness::new());
    h.platform.set_load_delay(Duration::from_millis(200));

    let tasks: Vec<_> = ["https://a.example.com/", "https://b.example.com/"]
        .into_iter()
        .map(|url| {
            let h = h.clone();
            tokio::spawn(async move {
                h.executor
                    .execute_record(&record(json!({"type": "navigation", "url": url})))
                    .await
            })
        })
        .collect();

    for task in tasks {
        assert!(task.await.unwrap().success);
    }
    assert_eq!(h.platform.max_loads_in_flight(), 1);
    assert_eq!(h.platform.loads().len(), 2);
}
