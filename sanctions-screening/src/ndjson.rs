//! Newline-delimited JSON framing for the screening binary
//!
//! Every non-blank input line yields exactly one output line, in input order:
//! the screening result, or an error record carrying the input line number.
//! A bad line never shifts later results onto the wrong request.

use crate::screening::Screener;
use crate::types::{ScreeningRequest, ScreeningResult};
use serde::Serialize;
use tracing::warn;

/// Output record for one input line
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum LineOutcome {
    /// Request parsed and screened
    Screened(ScreeningResult),
    /// Line could not be read as a request
    Rejected {
        /// 1-based input line number
        line: u64,
        /// Why the line was rejected
        error: String,
    },
}

impl LineOutcome {
    /// True for an error record
    pub fn is_rejected(&self) -> bool {
        matches!(self, LineOutcome::Rejected { .. })
    }
}

/// Screen one raw input line. Blank lines produce nothing.
pub fn screen_line(screener: &Screener, line_no: u64, raw: &[u8]) -> Option<LineOutcome> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text.trim(),
        Err(e) => return Some(rejected(line_no, format!("invalid UTF-8: {}", e))),
    };
    if text.is_empty() {
        return None;
    }

    match serde_json::from_str::<ScreeningRequest>(text) {
        Ok(request) => Some(LineOutcome::Screened(screener.screen(&request))),
        Err(e) => Some(rejected(line_no, format!("invalid request: {}", e))),
    }
}

fn rejected(line: u64, error: String) -> LineOutcome {
    warn!(line, "Rejecting input line: {}", error);
    LineOutcome::Rejected { line, error }
}
