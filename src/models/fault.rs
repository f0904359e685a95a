//! Fault reference model: the canonical (code, name) record a raw fault
//! signal resolves to.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Leading `(code)` prefix in a raw fault name, e.g. `(175)Brake Fail`.
static CODE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\((.*?)\)(.+)$").unwrap());

/// Any parenthesized segment, stripped for lookup normalization.
static PAREN_SEGMENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(.*?\)").unwrap());

/// A canonical fault reference row.
///
/// `fault_id` is a surrogate key stable across all records sharing the same
/// normalized name. The `(code, name)` pair is unique in storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultReference {
    pub fault_id: i32,
    pub code: Option<String>,
    pub name: String,
}

impl FaultReference {
    /// Split a raw fault name into its optional short code and normalized
    /// display name.
    ///
    /// The code is taken from a leading parenthesized prefix; the lookup name
    /// has every parenthesized segment stripped, so `(175)Brake Fail` and
    /// `Brake Fail` resolve to the same reference.
    pub fn normalize(raw: &str) -> (Option<String>, String) {
        let code = CODE_PREFIX
            .captures(raw.trim())
            .map(|caps| caps[1].trim().to_string());
        let name = PAREN_SEGMENT.replace_all(raw, "").trim().to_string();
        (code, name)
    }

    /// Button/display label: `code-name` when a code exists, the bare name
    /// otherwise.
    pub fn label(&self) -> String {
        match &self.code {
            Some(code) => format!("{}-{}", code, self.name),
            None => self.name.clone(),
        }
    }
}
