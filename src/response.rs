//! Classification of raw engine responses.
//!
//! A GTP response starts with `=` (success) or `?` (failure), optionally
//! followed by a numeric command id, then a space and the payload. The
//! payload may span several lines and is terminated by a blank line.

use std::fmt;

use crate::constants::{ERROR_MARKER, NO_RESPONSE, SUCCESS_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Success,
    /// The engine answered with `?`, or there was no answer at all.
    Error,
    /// Text without any marker line.
    Info,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Status::Success => "success",
            Status::Error => "error",
            Status::Info => "info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub content: String,
}

impl Response {
    fn new(status: Status, content: impl Into<String>) -> Self {
        Self {
            status,
            content: content.into(),
        }
    }

    /// What callers get when a command produced nothing. Distinct from an
    /// engine-reported error only by its fixed content.
    pub fn no_response() -> Self {
        Self::new(Status::Error, NO_RESPONSE)
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    pub fn is_no_response(&self) -> bool {
        self.status == Status::Error && self.content == NO_RESPONSE
    }
}

/// Classify a raw response as assembled by the session.
pub fn parse(raw: Option<&str>) -> Response {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Response::no_response();
    };

    let mut lines = raw.lines();
    while let Some(line) = lines.next() {
        let status = if line.starts_with(SUCCESS_MARKER) {
            Status::Success
        } else if line.starts_with(ERROR_MARKER) {
            Status::Error
        } else {
            continue;
        };

        let mut content = vec![strip_marker(line)];
        content.extend(lines.by_ref().take_while(|l| !l.trim().is_empty()));
        return Response::new(status, content.join("\n").trim_end());
    }

    Response::new(Status::Info, raw.trim())
}

/// Drop the marker and an optional command id from a marker line.
fn strip_marker(line: &str) -> &str {
    let rest = &line[1..];
    rest.trim_start_matches(|c: char| c.is_ascii_digit()).trim()
}
