//! Record validation and command construction.

use super::{Command, CommandRecord, DEFAULT_SCROLL_AMOUNT, ScrollDirection};
use crate::error::EngineError;

/// Builds [`Command`] values from records, rejecting malformed ones.
pub struct CommandFactory;

impl CommandFactory {
    /// Validate a record's parameters for its kind and build the command.
    pub fn create(record: &CommandRecord) -> Result<Command, EngineError> {
        let kind = record.kind.trim();
        match kind {
            "navigation" | "navigate" => Ok(Command::Navigate {
                url: required(kind, "url", record.url.as_deref())?,
                skip_first_result: record.skip_first_result.unwrap_or(false),
            }),
            "search" => Ok(Command::Search {
                query: first_present(kind, "query or text", &[&record.query, &record.text])?,
            }),
            "back" => Ok(Command::Back),
            "forward" => Ok(Command::Forward),
            "refresh" => Ok(Command::Refresh),
            "scroll" => scroll(kind, record),
            "find" => Ok(Command::Find {
                text: first_present(kind, "text or target", &[&record.text, &record.target])?,
            }),
            "findAndClick" => Ok(Command::FindAndClick {
                text: first_present(kind, "text or target", &[&record.text, &record.target])?,
            }),
            "smartClick" | "click" | "smartFind" => Ok(Command::SmartClick {
                intent: first_present(kind, "target or text", &[&record.target, &record.text])?,
            }),
            "input" | "type" => Ok(Command::Type {
                text: record
                    .text
                    .clone()
                    .ok_or_else(|| EngineError::invalid(kind, "missing text"))?,
                target: non_blank(record.target.as_deref()),
            }),
            "press_enter" | "pressEnter" => Ok(Command::PressEnter),
            other => Err(EngineError::UnknownCommand(other.to_string())),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required(kind: &str, field: &str, value: Option<&str>) -> Result<String, EngineError> {
    non_blank(value).ok_or_else(|| EngineError::invalid(kind, format!("missing {}", field)))
}

fn first_present(
    kind: &str,
    fields: &str,
    values: &[&Option<String>],
) -> Result<String, EngineError> {
    values
        .iter()
        .find_map(|v| non_blank(v.as_deref()))
        .ok_or_else(|| EngineError::invalid(kind, format!("missing {}", fields)))
}

fn scroll(kind: &str, record: &CommandRecord) -> Result<Command, EngineError> {
    let direction: ScrollDirection = required(kind, "direction", record.direction.as_deref())?
        .parse()
        .map_err(|reason: String| EngineError::invalid(kind, reason))?;

    let amount = match record.amount {
        None => DEFAULT_SCROLL_AMOUNT,
        Some(n) if n > 0 => u32::try_from(n)
            .map_err(|_| EngineError::invalid(kind, format!("amount {} is too large", n)))?,
        Some(n) => {
            return Err(EngineError::invalid(
                kind,
                format!("amount must be positive, got {}", n),
            ));
        }
    };

    Ok(Command::Scroll { direction, amount })
}
