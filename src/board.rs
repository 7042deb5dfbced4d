//! A plain 2D Go board with capture and suicide rules.
//!
//! Only the simulated engine keeps a board; the session itself never judges
//! legality, that is the engine's job.

use std::fmt;

use crate::constants::COLUMNS;
use crate::coord::Vertex;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Color {
    Black,
    White,
}

impl Color {
    /// Accepts the GTP spellings `b`, `w`, `black` and `white`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "b" | "black" => Some(Color::Black),
            "w" | "white" => Some(Color::White),
            _ => None,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
        }
    }

    /// Single-letter form used in GTP commands.
    pub fn gtp(self) -> &'static str {
        match self {
            Color::Black => "B",
            Color::White => "W",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.gtp())
    }
}

pub struct Board {
    pub size: usize,
    cells: Vec<Option<Color>>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![None; size * size],
        }
    }

    pub fn clear(&mut self) {
        self.cells.iter_mut().for_each(|c| *c = None);
    }

    fn idx(&self, v: Vertex) -> usize {
        v.row() * self.size + v.col()
    }

    fn contains(&self, v: Vertex) -> bool {
        v.col() < self.size && v.row() < self.size
    }

    pub fn get(&self, v: Vertex) -> Option<Color> {
        if !self.contains(v) {
            return None;
        }
        self.cells[self.idx(v)]
    }

    /// Every unoccupied point, bottom row first.
    pub fn empty_points(&self) -> Vec<Vertex> {
        (0..self.size)
            .flat_map(|row| (0..self.size).filter_map(move |col| Vertex::new(col, row)))
            .filter(|&v| self.get(v).is_none())
            .collect()
    }

    fn neighbors(&self, v: Vertex) -> impl Iterator<Item = Vertex> + '_ {
        let (x, y) = (v.col(), v.row());
        let s = self.size;
        let mut out = Vec::with_capacity(4);
        if x > 0 {
            out.extend(Vertex::new(x - 1, y));
        }
        if x + 1 < s {
            out.extend(Vertex::new(x + 1, y));
        }
        if y > 0 {
            out.extend(Vertex::new(x, y - 1));
        }
        if y + 1 < s {
            out.extend(Vertex::new(x, y + 1));
        }
        out.into_iter()
    }

    pub fn play(&mut self, v: Vertex, color: Color) -> MoveResult {
        if !self.contains(v) || self.get(v).is_some() {
            return MoveResult::illegal();
        }
        let idx = self.idx(v);
        self.cells[idx] = Some(color);

        let opp = color.opponent();
        let mut to_remove = Vec::new();
        for n in self.neighbors(v).collect::<Vec<_>>() {
            if self.get(n) == Some(opp) && self.group_liberties(n) == 0 {
                self.collect_group(n, &mut to_remove);
            }
        }
        to_remove.sort_by_key(|&p| self.idx(p));
        to_remove.dedup();
        let captures = to_remove.len();
        for p in to_remove {
            let i = self.idx(p);
            self.cells[i] = None;
        }

        if captures == 0 && self.group_liberties(v) == 0 {
            self.cells[idx] = None;
            return MoveResult {
                legal: false,
                captures: 0,
                suicide: true,
            };
        }
        MoveResult {
            legal: true,
            captures,
            suicide: false,
        }
    }

    fn collect_group(&self, start: Vertex, out: &mut Vec<Vertex>) {
        let Some(color) = self.get(start) else {
            return;
        };
        let mut stack = vec![start];
        let mut visited = vec![false; self.size * self.size];
        while let Some(v) = stack.pop() {
            let i = self.idx(v);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            out.push(v);
            stack.extend(self.neighbors(v).filter(|&n| self.get(n) == Some(color)));
        }
    }

    fn group_liberties(&self, start: Vertex) -> usize {
        let Some(color) = self.get(start) else {
            return 0;
        };
        let mut stack = vec![start];
        let mut visited = vec![false; self.size * self.size];
        let mut liberties = 0;
        while let Some(v) = stack.pop() {
            let i = self.idx(v);
            if visited[i] {
                continue;
            }
            visited[i] = true;
            for n in self.neighbors(v) {
                let ni = self.idx(n);
                match self.get(n) {
                    None if !visited[ni] => {
                        visited[ni] = true;
                        liberties += 1;
                    }
                    Some(c) if c == color && !visited[ni] => stack.push(n),
                    _ => {}
                }
            }
        }
        liberties
    }
}

#[derive(Debug)]
pub struct MoveResult {
    pub legal: bool,
    pub captures: usize,
    pub suicide: bool,
}

impl MoveResult {
    fn illegal() -> Self {
        MoveResult {
            legal: false,
            captures: 0,
            suicide: false,
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in (0..self.size).rev() {
            write!(f, "{:>2} ", row + 1)?;
            for col in 0..self.size {
                let ch = match Vertex::new(col, row).and_then(|v| self.get(v)) {
                    Some(Color::Black) => 'X',
                    Some(Color::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch} ")?;
            }
            writeln!(f)?;
        }
        write!(f, "   ")?;
        for &c in COLUMNS.iter().take(self.size) {
            write!(f, "{} ", c as char)?;
        }
        Ok(())
    }
}
