use super::*;

#[test]
fn test_validate_default_config() {
    let config = Config::default();
    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(result.warnings.is_empty());
}

#[test]
fn test_validate_invalid_port() {
    let mut config = Config::default();
    config.browser.debug_port = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
    assert!(result.errors.iter().any(|e| e.path == "browser.debug_port"));
}

#[test]
fn test_validate_zero_navigation_timeout() {
    let mut config = Config::default();
    config.engine.navigation_timeout_secs = 0;

    let result = ConfigValidator::validate(&config);
    assert!(result
        .errors
        .iter()
        .any(|e| e.path == "engine.navigation_timeout_secs"));
}

#[test]
fn test_validate_zero_screenshot_attempts() {
    let mut config = Config::default();
    config.engine.screenshot_max_attempts = 0;

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
}

#[test]
fn test_validate_many_screenshot_attempts_warning() {
    let mut config = Config::default();
    config.engine.screenshot_max_attempts = 20;

    let result = ConfigValidator::validate(&config);
    assert!(result.is_valid());
    assert!(!result.warnings.is_empty());
}

#[test]
fn test_validate_threshold_out_of_range() {
    let mut config = Config::default();
    config.vision.confidence_threshold = 1.5;

    let result = ConfigValidator::validate(&config);
    assert!(result
        .errors
        .iter()
        .any(|e| e.path == "vision.confidence_threshold"));
}

#[test]
fn test_validate_empty_model_only_when_enabled() {
    let mut config = Config::default();
    config.vision.model = String::new();
    assert!(!ConfigValidator::validate(&config).is_valid());

    config.vision.enabled = false;
    assert!(ConfigValidator::validate(&config).is_valid());
}

#[test]
fn test_validate_bad_search_engine_url() {
    let mut config = Config::default();
    config.engine.search_engine_url = "google.com/?q=".to_string();

    let result = ConfigValidator::validate(&config);
    assert!(!result.is_valid());
}

#[test]
fn test_into_result_reports_first_error() {
    let mut config = Config::default();
    config.browser.debug_port = 0;

    let err = ConfigValidator::validate(&config).into_result().unwrap_err();
    assert!(err.to_string().contains("browser.debug_port"));
}
