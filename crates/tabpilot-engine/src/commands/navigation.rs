//! Navigation, search, and history commands.

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use super::CommandOutcome;
use crate::engine::Session;
use crate::error::EngineError;
use crate::history::HistoryMove;
use crate::platform::PlatformError;
use crate::scripts;

/// Page text that marks a browser error page.
const ERROR_PAGE_MARKERS: &[&str] = &[
    "This site can't be reached",
    "This site can\u{2019}t be reached",
    "DNS_PROBE_POSSIBLE",
    "DNS_PROBE_FINISHED_NXDOMAIN",
    "ERR_NAME_NOT_RESOLVED",
    "ERR_CONNECTION_REFUSED",
    "ERR_CONNECTION_TIMED_OUT",
    "showing error page",
];

/// Where the first organic result lives on the results page.
const FIRST_RESULT_SELECTORS: &[&str] = &["#search .g a", "#rso a h3", "#search a[href] h3"];

/// Search input selectors, most specific tier first.
const SEARCH_INPUT_TIERS: &[&[&str]] = &[
    &[
        "input[type=\"search\"]",
        "input[role=\"search\"]",
        "[role=\"searchbox\"]",
        "[role=\"search\"] input",
    ],
    &[
        "input[name=\"q\"]",
        "input[name=\"query\"]",
        "input[name=\"search\"]",
    ],
    &[
        "input[id*=\"search\" i]",
        "input[class*=\"search\" i]",
        "input[placeholder*=\"search\" i]",
        "input[aria-label*=\"search\" i]",
    ],
    // Portuguese labels.
    &[
        "input[placeholder*=\"pesquis\" i]",
        "input[placeholder*=\"procur\" i]",
        "input[placeholder*=\"busca\" i]",
        "input[aria-label*=\"pesquis\" i]",
        "input[aria-label*=\"procur\" i]",
        "input[aria-label*=\"busca\" i]",
    ],
    &["form input[type=\"text\"]", "form input:not([type])"],
];

/// Button labels that submit a search.
const SEARCH_SUBMIT_LABELS: &[&str] = &["search", "pesquisar", "procurar", "buscar"];

/// Turn free text into a loadable URL, or `None` when it should be searched.
///
/// Explicit http(s) URLs pass through. Domain-shaped input such as
/// `example.com/path` gets `https://`. Everything else is a search query.
pub fn format_target(raw: &str) -> Option<String> {
    let input = raw.trim();
    let lower = input.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(input.to_string());
    }

    if input.is_empty() || input.chars().any(char::is_whitespace) {
        return None;
    }

    looks_like_domain(input).then(|| format!("https://{}", input))
}

fn looks_like_domain(input: &str) -> bool {
    let host_and_port = input
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default();
    let host = match host_and_port.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        Some(_) => return false,
        None => host_and_port,
    };

    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() < 2
        || labels
            .iter()
            .any(|l| l.is_empty() || !l.chars().all(|c| c.is_alphanumeric() || c == '-'))
    {
        return false;
    }

    let is_ipv4 = labels.len() == 4 && labels.iter().all(|l| l.parse::<u8>().is_ok());
    let tld = labels[labels.len() - 1];
    is_ipv4 || (tld.chars().count() >= 2 && tld.chars().all(char::is_alphabetic))
}

pub(super) async fn navigate(
    session: &Session,
    raw: &str,
    skip_first_result: bool,
) -> Result<CommandOutcome, EngineError> {
    let Some(url) = format_target(raw) else {
        debug!("{:?} is not URL-shaped, searching instead", raw);
        return search_fallback(session, raw, skip_first_result).await;
    };

    match session.tabs.navigate(&url).await {
        Ok(loaded) => {
            if shows_error_page(session).await {
                info!("{} produced an error page, searching instead", loaded);
                return search_fallback(session, raw, skip_first_result).await;
            }
            Ok(CommandOutcome::new(format!("Navigated to {}", loaded)))
        }
        Err(EngineError::Platform(PlatformError::NavigationFailed(reason))) => {
            info!("Navigation to {} failed ({}), searching instead", url, reason);
            search_fallback(session, raw, skip_first_result).await
        }
        Err(e) => Err(e),
    }
}

/// Any failure to inspect the page counts as an error page.
async fn shows_error_page(session: &Session) -> bool {
    match session
        .tabs
        .execute_script(scripts::DETECT_ERROR_PAGE, &[json!(ERROR_PAGE_MARKERS)])
        .await
    {
        Ok(value) => value.as_bool().unwrap_or(true),
        Err(e) => {
            warn!("Error page check failed: {}", e);
            true
        }
    }
}

/// Search the configured engine and, unless skipped, open the first result.
async fn search_fallback(
    session: &Session,
    text: &str,
    skip_first_result: bool,
) -> Result<CommandOutcome, EngineError> {
    let encoded: String = url::form_urlencoded::byte_serialize(text.trim().as_bytes()).collect();
    let search_url = format!("{}{}", session.tabs.config().search_engine_url, encoded);
    session.tabs.navigate(&search_url).await?;

    if skip_first_result {
        return Ok(CommandOutcome::new(format!("Searched for \"{}\"", text)));
    }

    let clicked = session
        .tabs
        .execute_script(scripts::CLICK_FIRST_RESULT, &[json!(FIRST_RESULT_SELECTORS)])
        .await?;
    let Some(href) = clicked.as_str() else {
        return Err(EngineError::NotFound(
            "Could not find search results".to_string(),
        ));
    };

    session.tabs.follow_page_navigation(href).await;
    if let Some(tab) = session.tabs.current().await {
        session.history.track(&tab.tab_id, href);
    }
    Ok(CommandOutcome::new(format!(
        "Searched for \"{}\" and opened {}",
        text, href
    )))
}

#[derive(Debug, Deserialize)]
struct SearchReport {
    success: bool,
    method: Option<String>,
}

pub(super) async fn search(session: &Session, query: &str) -> Result<CommandOutcome, EngineError> {
    let raw = session
        .tabs
        .execute_script(
            scripts::SEARCH,
            &[
                json!(query),
                json!(SEARCH_INPUT_TIERS),
                json!(SEARCH_SUBMIT_LABELS),
            ],
        )
        .await?;
    let report: SearchReport = serde_json::from_value(raw)
        .map_err(|e| EngineError::Script(format!("unexpected search result: {}", e)))?;

    if !report.success {
        return Err(EngineError::NotFound(
            "No search input found on page".to_string(),
        ));
    }
    debug!("Submitted search via {:?}", report.method);
    Ok(CommandOutcome::new(format!("Searched for \"{}\"", query)))
}

fn history_outcome(movement: HistoryMove, direction: &str) -> CommandOutcome {
    match movement {
        HistoryMove::Tracked { url, .. } => CommandOutcome::new(format!("Went {} to {}", direction, url)),
        HistoryMove::Native => CommandOutcome::new(format!("Went {}", direction)),
        HistoryMove::Unavailable { warning } => {
            CommandOutcome::new(format!("Could not go {}", direction)).with_warning(warning)
        }
    }
}

pub(super) async fn back(session: &Session) -> Result<CommandOutcome, EngineError> {
    let movement = session.history.back(&session.tabs).await?;
    Ok(history_outcome(movement, "back"))
}

pub(super) async fn forward(session: &Session) -> Result<CommandOutcome, EngineError> {
    let movement = session.history.forward(&session.tabs).await?;
    Ok(history_outcome(movement, "forward"))
}

pub(super) async fn refresh(session: &Session) -> Result<CommandOutcome, EngineError> {
    session.tabs.reload().await?;
    Ok(CommandOutcome::new("Page refreshed"))
}
