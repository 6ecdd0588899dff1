//! Name normalization
//!
//! Turns a raw party name into the canonical form every comparison runs on:
//!
//! 1. upper-case fold
//! 2. trim surrounding whitespace
//! 3. drop `.` and `,`
//! 4. `-` and `_` become a space
//! 5. runs of two or more spaces collapse into one
//!
//! A final trim keeps the function idempotent when step 3 or 4 exposes
//! whitespace at either edge (`". ACME"`, `"ACME -"`).

use once_cell::sync::Lazy;
use regex::Regex;

static SPACE_RUNS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" {2,}").expect("static regex is valid"));

/// Normalize a name for comparison.
///
/// Empty (or whitespace-only) input yields an empty string, which callers
/// treat as "nothing to match".
pub fn normalize_name(raw: &str) -> String {
    let upper = raw.to_uppercase();

    let stripped: String = upper
        .trim()
        .chars()
        .filter(|c| *c != '.' && *c != ',')
        .map(|c| if c == '-' || c == '_' { ' ' } else { c })
        .collect();

    SPACE_RUNS.replace_all(&stripped, " ").trim().to_string()
}

/// Fold a structured identifier (BIC, IBAN, ...) for exact comparison.
///
/// Identifiers skip the punctuation rules: only edge whitespace and case are folded.
pub fn fold_identifier(raw: &str) -> String {
    raw.trim().to_uppercase()
}
