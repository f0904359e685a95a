//! Drill-down menu state machine.
//!
//! Menu position is carried entirely in the callback token, a
//! `|`-delimited string that grows one segment per selection:
//!
//! ```text
//! show_data                               crane select
//! show_data|2                             start year select
//! show_data|2|2024                        start month select
//! show_data|2|2024-01-01                  end year select
//! show_data|2|2024-01-01|2024             end month select
//! show_data|2|2024-01-01|2024-03-31       fault select, page 1
//! show_data|2|2024-01-01|2024-03-31|page=2
//! show_data|2|2024-01-01|2024-03-31|7     terminal
//! ```
//!
//! Decoding dispatches on segment count, so the token is the single source
//! of truth and every state survives process restarts.

use std::sync::LazyLock;

use chrono::{Datelike, Days, Local, NaiveDate};
use regex::Regex;

/// Fault buttons shown per page of the fault menu.
pub const FAULTS_PER_PAGE: usize = 10;
/// Month buttons per keyboard row.
pub const MONTHS_PER_ROW: usize = 3;

const TOKEN_CONFIRM: &str = "bulk_delete";
const TOKEN_CANCEL: &str = "cancel_delete";
const DATE_TOKEN: &str = "%Y-%m-%d";

/// Rightmost 4-digit run in a year button token.
static YEAR_DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d{4})").unwrap());

/// What the drill-down ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuAction {
    ShowData,
    ShowGraph,
    DeleteData,
}

impl MenuAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ShowData => "show_data",
            Self::ShowGraph => "show_graph",
            Self::DeleteData => "delete_data",
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "show_data" => Some(Self::ShowData),
            "show_graph" => Some(Self::ShowGraph),
            "delete_data" => Some(Self::DeleteData),
            _ => None,
        }
    }
}

/// Crane selection carried in a token segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CraneScope {
    All,
    Id(i32),
}

impl CraneScope {
    pub fn as_token(self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Id(id) => id.to_string(),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        if token == "all" {
            return Some(Self::All);
        }
        token.parse().ok().map(Self::Id)
    }

    pub fn filter(self) -> Option<i32> {
        match self {
            Self::All => None,
            Self::Id(id) => Some(id),
        }
    }
}

/// Fault selection carried in a terminal token segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultChoice {
    All,
    Id(i32),
}

impl FaultChoice {
    pub fn as_token(self) -> String {
        match self {
            Self::All => "all".to_string(),
            Self::Id(id) => id.to_string(),
        }
    }

    pub fn parse(token: &str) -> Option<Self> {
        if token == "all" {
            return Some(Self::All);
        }
        token.parse().ok().map(Self::Id)
    }

    pub fn filter(self) -> Option<i32> {
        match self {
            Self::All => None,
            Self::Id(id) => Some(id),
        }
    }
}

/// One decoded menu position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuState {
    Help,
    CraneSelect {
        action: MenuAction,
    },
    YearSelect {
        action: MenuAction,
        crane: CraneScope,
        /// `None` while choosing the start year, `Some` for the end year.
        start: Option<NaiveDate>,
    },
    MonthSelect {
        action: MenuAction,
        crane: CraneScope,
        start: Option<NaiveDate>,
        year: i32,
    },
    FaultSelect {
        action: MenuAction,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        page: usize,
    },
    Terminal {
        action: MenuAction,
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    },
    /// Bulk delete confirmed by the user, awaiting the admin gate.
    ConfirmDelete {
        crane: CraneScope,
        start: NaiveDate,
        end: NaiveDate,
        fault: FaultChoice,
    },
    CancelDelete,
}

/// Last calendar day of `(year, month)`.
pub fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    next.checked_sub_days(Days::new(1)).or(Some(first))
}

fn parse_date(token: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(token, DATE_TOKEN).ok()
}

/// Year button labels may carry decoration; take the rightmost 4-digit run,
/// falling back to the current year.
fn scan_year(token: &str) -> i32 {
    YEAR_DIGITS
        .captures_iter(token)
        .last()
        .and_then(|caps| caps[1].parse().ok())
        .unwrap_or_else(|| Local::now().year())
}

/// Start segments are full `%Y-%m-%d` dates, but a bare `YYYY-MM` token
/// still counts as a picked start, pinned to the first of that month.
fn parse_start_token(token: &str) -> Option<NaiveDate> {
    if let Some(date) = parse_date(token) {
        return Some(date);
    }
    let (year, month) = token.split_once('-')?;
    if year.len() != 4 || month.len() != 2 {
        return None;
    }
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, 1)
}

impl MenuState {
    /// Decode a callback token. `None` means the token is malformed and the
    /// press should be answered with a validation error.
    pub fn decode(token: &str) -> Option<Self> {
        if token == TOKEN_CANCEL {
            return Some(Self::CancelDelete);
        }
        let parts: Vec<&str> = token.split('|').collect();
        if parts[0] == TOKEN_CONFIRM {
            if parts.len() != 5 {
                return None;
            }
            return Some(Self::ConfirmDelete {
                crane: CraneScope::parse(parts[1])?,
                start: parse_date(parts[2])?,
                end: parse_date(parts[3])?,
                fault: FaultChoice::parse(parts[4])?,
            });
        }

        match parts.as_slice() {
            ["help"] => Some(Self::Help),
            [action] => Some(Self::CraneSelect {
                action: MenuAction::parse(action)?,
            }),
            [action, crane] => Some(Self::YearSelect {
                action: MenuAction::parse(action)?,
                crane: CraneScope::parse(crane)?,
                start: None,
            }),
            [action, crane, third] => {
                let action = MenuAction::parse(action)?;
                let crane = CraneScope::parse(crane)?;
                match parse_start_token(third) {
                    // Start date picked, move on to the end year.
                    Some(start) => Some(Self::YearSelect {
                        action,
                        crane,
                        start: Some(start),
                    }),
                    None => Some(Self::MonthSelect {
                        action,
                        crane,
                        start: None,
                        year: scan_year(third),
                    }),
                }
            }
            [action, crane, third, fourth] => {
                let action = MenuAction::parse(action)?;
                let crane = CraneScope::parse(crane)?;
                let start = parse_date(third)?;
                match parse_date(fourth) {
                    // Both endpoints chosen; widen to whole months.
                    Some(end) => Some(Self::FaultSelect {
                        action,
                        crane,
                        start: start.with_day(1)?,
                        end: month_end(end.year(), end.month())?,
                        page: 1,
                    }),
                    None => Some(Self::MonthSelect {
                        action,
                        crane,
                        start: Some(start),
                        year: scan_year(fourth),
                    }),
                }
            }
            [action, crane, third, fourth, fifth] => {
                let action = MenuAction::parse(action)?;
                let crane = CraneScope::parse(crane)?;
                let start = parse_date(third)?;
                let end = parse_date(fourth)?;
                if let Some(page) = fifth.strip_prefix("page=") {
                    // Page flips reuse the already-normalized range.
                    return Some(Self::FaultSelect {
                        action,
                        crane,
                        start,
                        end,
                        page: page.parse().ok().filter(|&p| p >= 1)?,
                    });
                }
                Some(Self::Terminal {
                    action,
                    crane,
                    start,
                    end,
                    fault: FaultChoice::parse(fifth)?,
                })
            }
            _ => None,
        }
    }

    /// Re-encode to the exact wire token [`decode`](Self::decode) accepts.
    pub fn encode(&self) -> String {
        let date = |d: &NaiveDate| d.format(DATE_TOKEN).to_string();
        match self {
            Self::Help => "help".to_string(),
            Self::CraneSelect { action } => action.as_str().to_string(),
            Self::YearSelect {
                action,
                crane,
                start: None,
            } => format!("{}|{}", action.as_str(), crane.as_token()),
            Self::YearSelect {
                action,
                crane,
                start: Some(start),
            } => format!("{}|{}|{}", action.as_str(), crane.as_token(), date(start)),
            Self::MonthSelect {
                action,
                crane,
                start: None,
                year,
            } => format!("{}|{}|{}", action.as_str(), crane.as_token(), year),
            Self::MonthSelect {
                action,
                crane,
                start: Some(start),
                year,
            } => format!(
                "{}|{}|{}|{}",
                action.as_str(),
                crane.as_token(),
                date(start),
                year
            ),
            Self::FaultSelect {
                action,
                crane,
                start,
                end,
                page,
            } => {
                let base = format!(
                    "{}|{}|{}|{}",
                    action.as_str(),
                    crane.as_token(),
                    date(start),
                    date(end)
                );
                if *page == 1 {
                    base
                } else {
                    format!("{base}|page={page}")
                }
            }
            Self::Terminal {
                action,
                crane,
                start,
                end,
                fault,
            } => format!(
                "{}|{}|{}|{}|{}",
                action.as_str(),
                crane.as_token(),
                date(start),
                date(end),
                fault.as_token()
            ),
            Self::ConfirmDelete {
                crane,
                start,
                end,
                fault,
            } => format!(
                "{TOKEN_CONFIRM}|{}|{}|{}|{}",
                crane.as_token(),
                date(start),
                date(end),
                fault.as_token()
            ),
            Self::CancelDelete => TOKEN_CANCEL.to_string(),
        }
    }

    /// Token produced by pressing `month` on a month grid. Appending the
    /// day suffix turns the trailing year segment into a full date, which
    /// is exactly how the next decode distinguishes the states.
    pub fn month_token(&self, month: u32) -> Option<String> {
        let Self::MonthSelect { year, start, .. } = self else {
            return None;
        };
        let day = if start.is_some() {
            // End month resolves to its last day.
            month_end(*year, month)?.day()
        } else {
            1
        };
        Some(format!("{}-{:02}-{:02}", self.encode(), month, day))
    }

    /// Token for flipping the fault menu to `page`.
    pub fn page_token(&self, page: usize) -> Option<String> {
        let Self::FaultSelect {
            action,
            crane,
            start,
            end,
            ..
        } = self
        else {
            return None;
        };
        let base = Self::FaultSelect {
            action: *action,
            crane: *crane,
            start: *start,
            end: *end,
            page: 1,
        }
        .encode();
        Some(format!("{base}|page={page}"))
    }
}
