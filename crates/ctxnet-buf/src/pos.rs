use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buf::NetBuf;
use crate::error::Result;

/// An integer position in a three-dimensional grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

/// A 16x16 column of the grid, addressed by its horizontal coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

impl From<GridPos> for ChunkPos {
    fn from(pos: GridPos) -> Self {
        Self {
            x: pos.x >> 4,
            z: pos.z >> 4,
        }
    }
}

impl NetBuf {
    /// Write a grid position as three signed varints, or three fixed
    /// `i32`s in passthrough mode.
    pub fn write_grid_pos(&mut self, pos: GridPos) {
        if self.config.passthrough {
            self.write_i32(pos.x);
            self.write_i32(pos.y);
            self.write_i32(pos.z);
        } else {
            self.write_var_i32(pos.x);
            self.write_var_i32(pos.y);
            self.write_var_i32(pos.z);
        }
    }

    pub fn read_grid_pos(&mut self) -> Result<GridPos> {
        if self.config.passthrough {
            Ok(GridPos::new(self.read_i32()?, self.read_i32()?, self.read_i32()?))
        } else {
            Ok(GridPos::new(
                self.read_var_i32()?,
                self.read_var_i32()?,
                self.read_var_i32()?,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_positions_are_three_bytes() {
        let mut buf = NetBuf::new();
        let pos = GridPos::new(-3, 60, 12);
        buf.write_grid_pos(pos);
        assert_eq!(buf.len(), 3);
        assert_eq!(buf.read_grid_pos().unwrap(), pos);
    }

    #[test]
    fn passthrough_positions_are_fixed_width() {
        let mut buf = NetBuf::passthrough();
        let pos = GridPos::new(1, 2, 3);
        buf.write_grid_pos(pos);
        assert_eq!(buf.len(), 12);
        assert_eq!(buf.read_grid_pos().unwrap(), pos);
    }

    #[test]
    fn chunk_of_negative_block_rounds_down() {
        assert_eq!(ChunkPos::from(GridPos::new(-1, 0, 17)), ChunkPos::new(-1, 1));
        assert_eq!(ChunkPos::from(GridPos::new(15, 99, -16)), ChunkPos::new(0, -1));
    }
}
