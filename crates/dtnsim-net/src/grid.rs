//! Uniform-cell spatial index
//!
//! Cells are at least as wide as the largest radio range of the medium, so
//! any interface within range of a query lies in the query's cell or one of
//! its eight neighbours. Results are candidates only; callers still check
//! the euclidean distance.

use std::collections::HashMap;

use dtnsim_core::{Coord, InterfaceId};

type Cell = (i64, i64);

#[derive(Debug, Clone)]
pub struct ConnectivityGrid {
    cell_size: f64,
    cells: HashMap<Cell, Vec<InterfaceId>>,
    positions: HashMap<InterfaceId, (Cell, Coord)>,
}

impl ConnectivityGrid {
    /// Grid with cells of `cell_size` meters; zero sizes are bumped to 1
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
            positions: HashMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn cell_of(&self, at: &Coord) -> Cell {
        (
            (at.x / self.cell_size).floor() as i64,
            (at.y / self.cell_size).floor() as i64,
        )
    }

    /// Grow cells to at least `size`; interfaces are re-bucketed
    pub fn ensure_cell_size(&mut self, size: f64) {
        if size <= self.cell_size {
            return;
        }
        self.cell_size = size;
        let mut entries: Vec<(InterfaceId, Coord)> =
            self.positions.iter().map(|(&i, &(_, c))| (i, c)).collect();
        entries.sort_by_key(|(i, _)| *i);
        self.cells.clear();
        self.positions.clear();
        for (iface, at) in entries {
            self.add(iface, at);
        }
    }

    /// Register an interface at a location
    pub fn add(&mut self, iface: InterfaceId, at: Coord) {
        if self.positions.contains_key(&iface) {
            self.update_location(iface, at);
            return;
        }
        let cell = self.cell_of(&at);
        self.cells.entry(cell).or_default().push(iface);
        self.positions.insert(iface, (cell, at));
    }

    pub fn remove(&mut self, iface: InterfaceId) {
        if let Some((cell, _)) = self.positions.remove(&iface) {
            self.remove_from_cell(cell, iface);
        }
    }

    fn remove_from_cell(&mut self, cell: Cell, iface: InterfaceId) {
        if let Some(members) = self.cells.get_mut(&cell) {
            members.retain(|&i| i != iface);
            if members.is_empty() {
                self.cells.remove(&cell);
            }
        }
    }

    /// Move an interface, changing cells only across a boundary
    pub fn update_location(&mut self, iface: InterfaceId, at: Coord) {
        let new_cell = self.cell_of(&at);
        match self.positions.get_mut(&iface) {
            Some((cell, pos)) => {
                *pos = at;
                if *cell == new_cell {
                    return;
                }
                let old = std::mem::replace(cell, new_cell);
                self.remove_from_cell(old, iface);
                self.cells.entry(new_cell).or_default().push(iface);
            }
            None => self.add(iface, at),
        }
    }

    /// Interfaces in the 3x3 block of cells around `iface`, itself included
    pub fn get_near(&self, iface: InterfaceId) -> Vec<InterfaceId> {
        let Some(&((cx, cy), _)) = self.positions.get(&iface) else {
            return Vec::new();
        };
        let mut near = Vec::new();
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(members) = self.cells.get(&(cx + dx, cy + dy)) {
                    near.extend_from_slice(members);
                }
            }
        }
        near
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_near_covers_neighbouring_cells() {
        let mut grid = ConnectivityGrid::new(10.0);
        grid.add(InterfaceId(0), Coord::new(5.0, 5.0));
        grid.add(InterfaceId(1), Coord::new(14.0, 5.0));
        grid.add(InterfaceId(2), Coord::new(35.0, 5.0));
        let near = grid.get_near(InterfaceId(0));
        assert!(near.contains(&InterfaceId(0)));
        assert!(near.contains(&InterfaceId(1)));
        assert!(!near.contains(&InterfaceId(2)));
    }

    #[test]
    fn test_negative_coordinates() {
        let mut grid = ConnectivityGrid::new(10.0);
        grid.add(InterfaceId(0), Coord::new(-1.0, -1.0));
        grid.add(InterfaceId(1), Coord::new(1.0, 1.0));
        assert!(grid.get_near(InterfaceId(0)).contains(&InterfaceId(1)));
    }

    #[test]
    fn test_update_location_moves_between_cells() {
        let mut grid = ConnectivityGrid::new(10.0);
        grid.add(InterfaceId(0), Coord::new(0.0, 0.0));
        grid.add(InterfaceId(1), Coord::new(100.0, 0.0));
        assert!(!grid.get_near(InterfaceId(0)).contains(&InterfaceId(1)));
        grid.update_location(InterfaceId(1), Coord::new(5.0, 0.0));
        assert!(grid.get_near(InterfaceId(0)).contains(&InterfaceId(1)));
        assert_eq!(grid.len(), 2);
    }

    #[test]
    fn test_growing_cells_keeps_members() {
        let mut grid = ConnectivityGrid::new(1.0);
        grid.add(InterfaceId(0), Coord::new(0.0, 0.0));
        grid.add(InterfaceId(1), Coord::new(20.0, 0.0));
        grid.ensure_cell_size(25.0);
        assert_eq!(grid.cell_size(), 25.0);
        assert!(grid.get_near(InterfaceId(0)).contains(&InterfaceId(1)));
        grid.remove(InterfaceId(1));
        assert_eq!(grid.get_near(InterfaceId(0)), vec![InterfaceId(0)]);
    }
}
