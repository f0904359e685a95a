//! Slash-command argument parsing.
//!
//! `/data`, `/graph` and `/delete` share one argument grammar: the full
//! four-field form runs the query directly, while partial forms drop the
//! user into the menu drill-down at the matching depth.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::bot::state::CraneScope;

/// Date format accepted in command arguments (day first, unlike the
/// ISO dates carried in callback tokens).
pub const COMMAND_DATE: &str = "%d-%m-%Y";

/// Full form: crane, start, end, fault selector. The fault selector is
/// greedy so multi-word keywords survive.
static FULL_FORM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(all|\d+)\s+(\d{2}-\d{2}-\d{4})\s+(\d{2}-\d{2}-\d{4})\s+(all|\d+|.+)$").unwrap()
});

/// Fault selector from a command argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultScope {
    All,
    Id(i32),
    /// Free-text keyword, resolved against the fault reference table.
    Keyword(String),
}

impl FaultScope {
    fn parse(token: &str) -> Self {
        if token == "all" {
            return Self::All;
        }
        match token.parse() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Keyword(token.to_string()),
        }
    }
}

/// Outcome of parsing a command's argument string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    /// All four fields given, run the query.
    Full {
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultScope,
    },
    /// No arguments, start at the crane menu.
    CraneMenu,
    /// Crane only, start at the year menu.
    YearMenu { crane: CraneScope },
    /// Crane and range, start at the fault menu.
    FaultMenu {
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
    },
    /// Arguments did not match any form.
    Usage,
}

/// Parse the text following a `/data`-family command.
pub fn parse(args: &str) -> ParsedCommand {
    let args = args.trim();

    if let Some(caps) = FULL_FORM.captures(args) {
        let Some(crane) = CraneScope::parse(&caps[1]) else {
            return ParsedCommand::Usage;
        };
        let (Ok(start), Ok(end)) = (
            NaiveDate::parse_from_str(&caps[2], COMMAND_DATE),
            NaiveDate::parse_from_str(&caps[3], COMMAND_DATE),
        ) else {
            return ParsedCommand::Usage;
        };
        if start > end {
            return ParsedCommand::Usage;
        }
        return ParsedCommand::Full {
            crane,
            start,
            end,
            fault: FaultScope::parse(&caps[4]),
        };
    }

    let fields: Vec<&str> = args.split_whitespace().collect();
    match fields.as_slice() {
        [] => ParsedCommand::CraneMenu,
        [crane] => match CraneScope::parse(crane) {
            Some(crane) => ParsedCommand::YearMenu { crane },
            None => ParsedCommand::Usage,
        },
        [crane, start, end] => {
            let Some(crane) = CraneScope::parse(crane) else {
                return ParsedCommand::Usage;
            };
            let (Ok(start), Ok(end)) = (
                NaiveDate::parse_from_str(start, COMMAND_DATE),
                NaiveDate::parse_from_str(end, COMMAND_DATE),
            ) else {
                return ParsedCommand::Usage;
            };
            if start > end {
                return ParsedCommand::Usage;
            }
            ParsedCommand::FaultMenu { crane, start, end }
        }
        _ => ParsedCommand::Usage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn full_form_variants() {
        assert_eq!(
            parse("2 01-01-2024 31-03-2024 all"),
            ParsedCommand::Full {
                crane: CraneScope::Id(2),
                start: date(2024, 1, 1),
                end: date(2024, 3, 31),
                fault: FaultScope::All,
            }
        );
        assert_eq!(
            parse("all 01-01-2024 31-03-2024 175"),
            ParsedCommand::Full {
                crane: CraneScope::All,
                start: date(2024, 1, 1),
                end: date(2024, 3, 31),
                fault: FaultScope::Id(175),
            }
        );
        assert_eq!(
            parse("all 01-01-2024 31-03-2024 brake fail"),
            ParsedCommand::Full {
                crane: CraneScope::All,
                start: date(2024, 1, 1),
                end: date(2024, 3, 31),
                fault: FaultScope::Keyword("brake fail".to_string()),
            }
        );
    }

    #[test]
    fn partial_forms_open_menus() {
        assert_eq!(parse(""), ParsedCommand::CraneMenu);
        assert_eq!(parse("   "), ParsedCommand::CraneMenu);
        assert_eq!(
            parse("7"),
            ParsedCommand::YearMenu {
                crane: CraneScope::Id(7)
            }
        );
        assert_eq!(
            parse("all 01-02-2024 29-02-2024"),
            ParsedCommand::FaultMenu {
                crane: CraneScope::All,
                start: date(2024, 2, 1),
                end: date(2024, 2, 29),
            }
        );
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert_eq!(parse("fc2"), ParsedCommand::Usage);
        assert_eq!(parse("2 2024-01-01 2024-03-31"), ParsedCommand::Usage);
        assert_eq!(parse("2 01-01-2024"), ParsedCommand::Usage);
        // Calendar-invalid day.
        assert_eq!(parse("2 32-01-2024 31-03-2024"), ParsedCommand::Usage);
        // Inverted range.
        assert_eq!(parse("2 31-03-2024 01-01-2024 all"), ParsedCommand::Usage);
        assert_eq!(parse("2 31-03-2024 01-01-2024"), ParsedCommand::Usage);
    }
}
