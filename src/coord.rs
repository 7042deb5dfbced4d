//! GTP vertices and moves.
//!
//! A vertex is written as a column letter followed by a row number, e.g.
//! `D4` or `Q16`. Columns run `A`..`T` with `I` skipped; rows run `1`..`19`
//! from the bottom edge. Parsing is case-insensitive and never panics: any
//! token that does not have this shape is simply not a vertex.

use std::fmt;
use std::str::FromStr;

use crate::constants::{COLUMNS, N, SKIPPED_COLUMN};

/// A point on the board, zero-based from the lower-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Vertex {
    col: usize,
    row: usize,
}

impl Vertex {
    /// Build a vertex from zero-based column and row indices.
    pub fn new(col: usize, row: usize) -> Option<Self> {
        (col < N && row < N).then_some(Self { col, row })
    }

    /// Parse a GTP vertex such as `"Q16"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let bytes = s.as_bytes();
        if bytes.len() < 2 {
            return None;
        }

        let letter = bytes[0].to_ascii_uppercase();
        if letter == SKIPPED_COLUMN {
            return None;
        }
        let col = COLUMNS.iter().position(|&c| c == letter)?;

        // Rows are written without leading zeros.
        let digits = &s[1..];
        if digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let row: usize = digits.parse().ok()?;
        if !(1..=N).contains(&row) {
            return None;
        }

        Some(Self { col, row: row - 1 })
    }

    /// Zero-based column index (`A` = 0, `J` = 8).
    pub fn col(&self) -> usize {
        self.col
    }

    /// Zero-based row index (row `1` = 0).
    pub fn row(&self) -> usize {
        self.row
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", COLUMNS[self.col] as char, self.row + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseVertexError;

impl fmt::Display for ParseVertexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("not a GTP vertex")
    }
}

impl std::error::Error for ParseVertexError {}

impl FromStr for Vertex {
    type Err = ParseVertexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or(ParseVertexError)
    }
}

/// What an engine can answer to `genmove`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Move {
    Play(Vertex),
    Pass,
    Resign,
}

impl Move {
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("pass") {
            Some(Move::Pass)
        } else if s.eq_ignore_ascii_case("resign") {
            Some(Move::Resign)
        } else {
            Vertex::parse(s).map(Move::Play)
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Play(v) => v.fmt(f),
            Move::Pass => f.write_str("pass"),
            Move::Resign => f.write_str("resign"),
        }
    }
}
