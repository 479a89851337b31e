//! Tile grid, positions and directions

use std::collections::VecDeque;

use glam::IVec2;
use serde::{Deserialize, Serialize};

/// A tile coordinate (x = column, y = row)
pub type Pos = IVec2;

/// Build a tile coordinate
#[inline]
pub const fn pos(x: i32, y: i32) -> Pos {
    IVec2::new(x, y)
}

/// Chebyshev (king-move) distance
#[inline]
pub fn chebyshev(a: Pos, b: Pos) -> i32 {
    (a - b).abs().max_element()
}

/// Manhattan distance
#[inline]
pub fn manhattan(a: Pos, b: Pos) -> i32 {
    (a - b).abs().element_sum()
}

/// Euclidean distance in tiles
#[inline]
pub fn euclidean(a: Pos, b: Pos) -> f32 {
    (a - b).as_vec2().length()
}

/// Cardinal direction; also used as enemy facing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// Clockwise order starting at north
    pub const ALL: [Direction; 4] = [
        Direction::North,
        Direction::East,
        Direction::South,
        Direction::West,
    ];

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 4]
    }

    /// Unit step on the grid (y grows downward)
    pub fn delta(self) -> Pos {
        match self {
            Direction::North => pos(0, -1),
            Direction::East => pos(1, 0),
            Direction::South => pos(0, 1),
            Direction::West => pos(-1, 0),
        }
    }

    pub fn clockwise(self) -> Self {
        match self {
            Direction::North => Direction::East,
            Direction::East => Direction::South,
            Direction::South => Direction::West,
            Direction::West => Direction::North,
        }
    }

    /// Direction of a single orthogonal step, if `delta` is one
    pub fn from_step(delta: Pos) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.delta() == delta)
    }

    /// Closest cardinal direction toward a vector (ties favor the x axis)
    pub fn toward(delta: Pos) -> Option<Self> {
        if delta == Pos::ZERO {
            return None;
        }
        Some(if delta.x.abs() >= delta.y.abs() {
            if delta.x > 0 { Direction::East } else { Direction::West }
        } else if delta.y > 0 {
            Direction::South
        } else {
            Direction::North
        })
    }
}

/// Static terrain kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TileKind {
    #[default]
    Floor,
    Wall,
    Box,
    Bush,
    Pillar,
    /// Never stored in a grid; reported by `Stage::tile_view` at the exit
    Exit,
}

impl TileKind {
    /// Can the player hide next to this tile
    pub fn is_cover(self) -> bool {
        matches!(
            self,
            TileKind::Wall | TileKind::Box | TileKind::Bush | TileKind::Pillar
        )
    }
}

/// Fixed-size terrain grid, row-major
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    width: i32,
    height: i32,
    tiles: Vec<TileKind>,
}

impl Grid {
    /// All-floor grid
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        Self {
            width,
            height,
            tiles: vec![TileKind::Floor; (width * height) as usize],
        }
    }

    /// All-floor grid enclosed by a wall ring
    pub fn walled(width: i32, height: i32) -> Self {
        let mut grid = Self::new(width, height);
        for x in 0..grid.width {
            grid.set(pos(x, 0), TileKind::Wall);
            grid.set(pos(x, grid.height - 1), TileKind::Wall);
        }
        for y in 0..grid.height {
            grid.set(pos(0, y), TileKind::Wall);
            grid.set(pos(grid.width - 1, y), TileKind::Wall);
        }
        grid
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    #[inline]
    pub fn in_bounds(&self, p: Pos) -> bool {
        p.x >= 0 && p.x < self.width && p.y >= 0 && p.y < self.height
    }

    #[inline]
    fn index(&self, p: Pos) -> usize {
        (p.y * self.width + p.x) as usize
    }

    /// Tile at `p`; out of bounds reads as wall
    pub fn get(&self, p: Pos) -> TileKind {
        if self.in_bounds(p) {
            self.tiles[self.index(p)]
        } else {
            TileKind::Wall
        }
    }

    /// Set a tile; out-of-bounds writes are ignored
    pub fn set(&mut self, p: Pos, kind: TileKind) {
        if self.in_bounds(p) {
            let i = self.index(p);
            self.tiles[i] = kind;
        }
    }

    /// In bounds and floor
    #[inline]
    pub fn is_floor(&self, p: Pos) -> bool {
        self.get(p) == TileKind::Floor
    }

    /// Any orthogonal neighbour offers cover
    pub fn has_adjacent_cover(&self, p: Pos) -> bool {
        Direction::ALL.iter().any(|d| {
            let n = p + d.delta();
            self.in_bounds(n) && self.get(n).is_cover()
        })
    }

    /// Floor tiles reachable from `start` by orthogonal steps
    pub fn reachable_from(&self, start: Pos) -> Vec<bool> {
        let mut seen = vec![false; self.tiles.len()];
        if !self.is_floor(start) {
            return seen;
        }
        let mut queue = VecDeque::new();
        seen[self.index(start)] = true;
        queue.push_back(start);
        while let Some(p) = queue.pop_front() {
            for d in Direction::ALL {
                let n = p + d.delta();
                if self.is_floor(n) && !seen[self.index(n)] {
                    seen[self.index(n)] = true;
                    queue.push_back(n);
                }
            }
        }
        seen
    }

    /// Is `to` reachable from `from` over floor tiles
    pub fn is_connected(&self, from: Pos, to: Pos) -> bool {
        self.in_bounds(to) && self.reachable_from(from)[self.index(to)]
    }

    /// Was `p` marked in a mask produced by `reachable_from`
    pub fn mask_contains(&self, mask: &[bool], p: Pos) -> bool {
        self.in_bounds(p) && mask.get(self.index(p)).copied().unwrap_or(false)
    }

    /// Bresenham line of sight; endpoints are not tested, every tile between must be floor
    pub fn line_of_sight(&self, from: Pos, to: Pos) -> bool {
        let d = (to - from).abs();
        let step = pos((to.x - from.x).signum(), (to.y - from.y).signum());
        let mut err = d.x - d.y;
        let mut cur = from;
        while cur != to {
            let e2 = 2 * err;
            if e2 > -d.y {
                err -= d.y;
                cur.x += step.x;
            }
            if e2 < d.x {
                err += d.x;
                cur.y += step.y;
            }
            if cur != to && !self.is_floor(cur) {
                return false;
            }
        }
        true
    }
}
