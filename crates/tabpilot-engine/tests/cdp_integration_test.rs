//! Integration tests against a real Chrome.
//!
//! These tests launch a headless Chrome and are ignored by default.
//! Run with: cargo test -p tabpilot-engine --test cdp_integration_test -- --ignored --nocapture

use std::time::Duration;

use serde_json::json;
use tabpilot_config::BrowserConfig;
use tabpilot_engine::platform::{
    BrowserPlatform, CdpPlatform, ChromeLauncher, HistoryDirection, LoadOutcome,
};
use tabpilot_engine::scripts;

const DEADLINE: Duration = Duration::from_secs(15);

fn test_config(profile: &tempfile::TempDir) -> BrowserConfig {
    BrowserConfig {
        debug_port: 9333, // avoid clashing with a desktop Chrome on 9222
        headless: true,
        profile_dir: Some(profile.path().to_path_buf()),
        ..BrowserConfig::default()
    }
}

fn page(body: &str) -> String {
    format!("data:text/html,{}", body)
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_detection() {
    let path = ChromeLauncher::find_chrome().expect("Chrome should be installed");
    println!("Found Chrome at: {}", path.display());
    assert!(path.exists());
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_window_load_and_scripts() {
    let profile = tempfile::tempdir().unwrap();
    let platform = CdpPlatform::start(&test_config(&profile)).await.unwrap();

    let tab = platform.create_window("about:blank").await.unwrap();
    platform.focus_window(&tab.window_id).await.unwrap();
    platform.activate_tab(&tab.tab_id).await.unwrap();

    let first = page("<button>Submit</button><a href='https://example.com'>Cancel</a>");
    let outcome = platform.load_url(&tab.tab_id, &first, DEADLINE).await.unwrap();
    assert_eq!(outcome, LoadOutcome::Completed);
    assert!(platform.get_tab(&tab.tab_id).await.unwrap().url.starts_with("data:"));

    let candidates = platform
        .execute_script(&tab.tab_id, scripts::COLLECT_CANDIDATES, &[json!("clickable")])
        .await
        .unwrap();
    let texts: Vec<_> = candidates
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap_or_default().to_string())
        .collect();
    assert!(texts.contains(&"Submit".to_string()), "{:?}", texts);

    let found = platform
        .execute_script(&tab.tab_id, scripts::FIND_TEXT, &[json!("Cancel")])
        .await
        .unwrap();
    assert_eq!(found, json!(true));

    let screenshot = platform.capture_visible(&tab.tab_id).await.unwrap();
    assert!(screenshot.starts_with("iVBOR"));

    platform.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_click_survives_throwing_click_method() {
    let profile = tempfile::tempdir().unwrap();
    let platform = CdpPlatform::start(&test_config(&profile)).await.unwrap();
    let tab = platform.create_window("about:blank").await.unwrap();

    let body = page(
        "<button onclick=\"document.title='clicked'\">Go</button>\
         <script>HTMLElement.prototype.click = function () { throw new Error('blocked'); };</script>",
    );
    platform.load_url(&tab.tab_id, &body, DEADLINE).await.unwrap();

    platform
        .execute_script(&tab.tab_id, scripts::COLLECT_CANDIDATES, &[json!("clickable")])
        .await
        .unwrap();
    let clicked = platform
        .execute_script(&tab.tab_id, scripts::CLICK_CANDIDATE, &[json!(0), json!(0)])
        .await
        .unwrap();
    assert_eq!(clicked, json!(true));

    let title = platform
        .execute_script(&tab.tab_id, "() => document.title", &[])
        .await
        .unwrap();
    assert_eq!(title, json!("clicked"));

    platform.shutdown().await;
}

#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_native_history_step() {
    let profile = tempfile::tempdir().unwrap();
    let platform = CdpPlatform::start(&test_config(&profile)).await.unwrap();
    let tab = platform.create_window("about:blank").await.unwrap();

    platform
        .load_url(&tab.tab_id, &page("<p>one</p>"), DEADLINE)
        .await
        .unwrap();
    platform
        .load_url(&tab.tab_id, &page("<p>two</p>"), DEADLINE)
        .await
        .unwrap();

    assert!(platform.history_step(&tab.tab_id, HistoryDirection::Back).await.unwrap());
    tokio::time::sleep(Duration::from_millis(500)).await;
    let url = platform.get_tab(&tab.tab_id).await.unwrap().url;
    assert!(url.contains("one"), "{}", url);

    assert!(platform.history_step(&tab.tab_id, HistoryDirection::Forward).await.unwrap());
    assert!(!platform.history_step(&tab.tab_id, HistoryDirection::Forward).await.unwrap());

    platform.shutdown().await;
}
