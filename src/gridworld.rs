use crate::{Action, Cell, Continous, Discrete};
use itertools::iproduct;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum GridError {
    #[error("grid needs at least one row and one column")]
    Empty,

    #[error("wall ({0}, {1}) is outside a {2}x{3} grid")]
    WallOutOfBounds(usize, usize, usize, usize),

    #[error("terminal ({0}, {1}) is outside a {2}x{3} grid")]
    TerminalOutOfBounds(usize, usize, usize, usize),

    #[error("cell ({0}, {1}) cannot be both a wall and a terminal")]
    WallTerminalOverlap(usize, usize),
}

/// Declarative grid description: dimensions, wall cells and the reward
/// paid on entering each terminal cell.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GridConfig {
    pub rows: usize,
    pub cols: usize,
    #[serde(default)]
    pub walls: Vec<Cell>,
    #[serde(default)]
    pub terminals: Vec<(Cell, Continous)>,
}

impl GridConfig {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Static grid topology. Every cell is exactly one of wall, terminal or
/// ordinary; the non-wall cells get dense state indices in row-major
/// order, fixed for the lifetime of the grid.
#[derive(Debug)]
pub struct GridWorld {
    rows: usize,
    cols: usize,
    walls: HashSet<Cell>,
    terminals: HashMap<Cell, Continous>,
    states: Vec<Cell>,
    index: HashMap<Cell, Discrete>,
}

impl GridWorld {
    pub fn new(config: GridConfig) -> Result<Self, GridError> {
        if config.rows == 0 || config.cols == 0 {
            return Err(GridError::Empty);
        }
        for &(r, c) in &config.walls {
            if r >= config.rows || c >= config.cols {
                return Err(GridError::WallOutOfBounds(r, c, config.rows, config.cols));
            }
        }
        let walls = config.walls.iter().copied().collect::<HashSet<_>>();

        let mut terminals = HashMap::new();
        for &((r, c), reward) in &config.terminals {
            if r >= config.rows || c >= config.cols {
                return Err(GridError::TerminalOutOfBounds(r, c, config.rows, config.cols));
            }
            if walls.contains(&(r, c)) {
                return Err(GridError::WallTerminalOverlap(r, c));
            }
            terminals.insert((r, c), reward);
        }

        let states = iproduct!(0..config.rows, 0..config.cols)
            .filter(|cell| !walls.contains(cell))
            .collect::<Vec<_>>();
        let index = states
            .iter()
            .enumerate()
            .map(|(i, &cell)| (cell, i as Discrete))
            .collect();

        Ok(Self {
            rows: config.rows,
            cols: config.cols,
            walls,
            terminals,
            states,
            index,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn is_wall(&self, cell: Cell) -> bool {
        self.walls.contains(&cell)
    }

    pub fn is_terminal(&self, cell: Cell) -> bool {
        self.terminals.contains_key(&cell)
    }

    pub fn terminal_reward(&self, cell: Cell) -> Option<Continous> {
        self.terminals.get(&cell).copied()
    }

    /// Non-wall cells in row-major order; a cell's position here is its
    /// state index.
    pub fn states(&self) -> &[Cell] {
        &self.states
    }

    pub fn state_index(&self, cell: Cell) -> Option<Discrete> {
        self.index.get(&cell).copied()
    }

    pub fn cell(&self, s: Discrete) -> Cell {
        self.states[s as usize]
    }

    /// Deterministic movement, ignoring slip: terminals absorb, and a move
    /// into a wall or off the grid bounces back to the source cell.
    pub fn step_from(&self, cell: Cell, action: Action) -> Cell {
        if self.is_terminal(cell) {
            return cell;
        }
        let (dr, dc) = action.offset();
        let r = cell.0 as isize + dr;
        let c = cell.1 as isize + dc;
        if r < 0 || c < 0 || r as usize >= self.rows || c as usize >= self.cols {
            return cell;
        }
        let target = (r as usize, c as usize);
        if self.walls.contains(&target) {
            cell
        } else {
            target
        }
    }
}
