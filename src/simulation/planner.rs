//! Grid routing for emergency vehicles
//!
//! A* over a 4-connected grid of open/blocked cells. The planner holds no
//! state between calls; a grid and a cost model go in, a path comes out.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;

use super::error::PlanError;
use super::types::Direction;

/// Integer cell coordinate. `y` grows southwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(&self, other: &GridPos) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Neighbours in expansion order: north, east, south, west
    fn neighbours(&self) -> [GridPos; 4] {
        [
            GridPos::new(self.x, self.y - 1),
            GridPos::new(self.x + 1, self.y),
            GridPos::new(self.x, self.y + 1),
            GridPos::new(self.x - 1, self.y),
        ]
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// A rectangular grid of open and blocked cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingGrid {
    width: i32,
    height: i32,
    blocked: Vec<bool>,
}

impl RoutingGrid {
    /// Create a grid with every cell open
    pub fn new(width: i32, height: i32) -> Self {
        let width = width.max(0);
        let height = height.max(0);
        Self {
            width,
            height,
            blocked: vec![false; width as usize * height as usize],
        }
    }

    /// Square district with the intersection in the centre cell
    pub fn district(size: i32) -> Self {
        Self::new(size, size)
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width && pos.y < self.height
    }

    pub fn is_open(&self, pos: GridPos) -> bool {
        self.index(pos).is_some_and(|i| !self.blocked[i])
    }

    /// Mark a cell blocked. Out-of-range cells are ignored.
    pub fn block(&mut self, pos: GridPos) {
        if let Some(i) = self.index(pos) {
            self.blocked[i] = true;
        }
    }

    pub fn unblock(&mut self, pos: GridPos) {
        if let Some(i) = self.index(pos) {
            self.blocked[i] = false;
        }
    }

    /// Block every cell in the inclusive rectangle spanned by two corners
    pub fn block_rect(&mut self, a: GridPos, b: GridPos) {
        for y in a.y.min(b.y)..=a.y.max(b.y) {
            for x in a.x.min(b.x)..=a.x.max(b.x) {
                self.block(GridPos::new(x, y));
            }
        }
    }

    /// The cell the intersection occupies
    pub fn center(&self) -> GridPos {
        GridPos::new(self.width / 2, self.height / 2)
    }

    /// Edge cell where traffic from `direction` enters the district
    pub fn entry(&self, direction: Direction) -> GridPos {
        let c = self.center();
        match direction {
            Direction::North => GridPos::new(c.x, 0),
            Direction::South => GridPos::new(c.x, self.height - 1),
            Direction::East => GridPos::new(self.width - 1, c.y),
            Direction::West => GridPos::new(0, c.y),
        }
    }

    fn index(&self, pos: GridPos) -> Option<usize> {
        self.in_bounds(pos)
            .then(|| pos.y as usize * self.width as usize + pos.x as usize)
    }
}

/// Price of moving between two adjacent open cells.
///
/// Implementations should return at least 1; the planner clamps anything
/// lower so the Manhattan heuristic stays admissible. Path costs saturate
/// at `u32::MAX`.
pub trait CostModel {
    fn step_cost(&self, from: GridPos, to: GridPos) -> u32;
}

/// Every step costs 1
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformCost;

impl CostModel for UniformCost {
    fn step_cost(&self, _from: GridPos, _to: GridPos) -> u32 {
        1
    }
}

/// Per-cell entry costs, e.g. congested streets. Unlisted cells cost 1.
#[derive(Debug, Clone, Default)]
pub struct CellCosts {
    costs: HashMap<GridPos, u32>,
}

impl CellCosts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, pos: GridPos, cost: u32) {
        self.costs.insert(pos, cost);
    }
}

impl CostModel for CellCosts {
    fn step_cost(&self, _from: GridPos, to: GridPos) -> u32 {
        self.costs.get(&to).copied().unwrap_or(1)
    }
}

/// A route through the grid, start and goal inclusive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    pub nodes: Vec<GridPos>,
    pub cost: u32,
}

impl Path {
    /// Number of moves along the path
    pub fn steps(&self) -> usize {
        self.nodes.len().saturating_sub(1)
    }

    pub fn start(&self) -> Option<GridPos> {
        self.nodes.first().copied()
    }

    pub fn goal(&self) -> Option<GridPos> {
        self.nodes.last().copied()
    }

    /// Side from which the path enters its final cell.
    ///
    /// A path arriving from the cell above the goal comes from the north.
    /// Single-node paths have no approach.
    pub fn approach(&self) -> Option<Direction> {
        let [.., prev, goal] = self.nodes.as_slice() else {
            return None;
        };
        match (prev.x - goal.x, prev.y - goal.y) {
            (0, dy) if dy < 0 => Some(Direction::North),
            (0, dy) if dy > 0 => Some(Direction::South),
            (dx, 0) if dx > 0 => Some(Direction::East),
            (dx, 0) if dx < 0 => Some(Direction::West),
            _ => None,
        }
    }
}

/// Frontier entry. `Ord` is reversed so `BinaryHeap` pops the lowest
/// `f`, then the lowest `h`, then the earliest inserted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Frontier {
    f: u32,
    h: u32,
    seq: u64,
    g: u32,
    pos: GridPos,
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .cmp(&self.f)
            .then_with(|| other.h.cmp(&self.h))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Shortest path with unit step costs
pub fn plan_path(grid: &RoutingGrid, start: GridPos, goal: GridPos) -> Result<Path, PlanError> {
    plan_path_with(grid, start, goal, &UniformCost)
}

/// Shortest path under an arbitrary cost model
pub fn plan_path_with<C: CostModel + ?Sized>(
    grid: &RoutingGrid,
    start: GridPos,
    goal: GridPos,
    costs: &C,
) -> Result<Path, PlanError> {
    for pos in [start, goal] {
        if !grid.is_open(pos) {
            return Err(PlanError::InvalidGridCoordinate(pos));
        }
    }

    let mut frontier = BinaryHeap::new();
    let mut best_g: HashMap<GridPos, u32> = HashMap::new();
    let mut came_from: HashMap<GridPos, GridPos> = HashMap::new();
    let mut seq = 0u64;

    let h = start.manhattan(&goal);
    frontier.push(Frontier {
        f: h,
        h,
        seq,
        g: 0,
        pos: start,
    });
    best_g.insert(start, 0);

    while let Some(current) = frontier.pop() {
        if current.pos == goal {
            return Ok(Path {
                nodes: reconstruct(&came_from, goal),
                cost: current.g,
            });
        }

        // Stale entry superseded by a cheaper route
        if best_g.get(&current.pos).is_some_and(|&g| current.g > g) {
            continue;
        }

        for next in current.pos.neighbours() {
            if !grid.is_open(next) {
                continue;
            }
            let g = current.g.saturating_add(costs.step_cost(current.pos, next).max(1));
            if best_g.get(&next).is_some_and(|&known| g >= known) {
                continue;
            }
            best_g.insert(next, g);
            came_from.insert(next, current.pos);

            let h = next.manhattan(&goal);
            seq += 1;
            frontier.push(Frontier {
                f: g.saturating_add(h),
                h,
                seq,
                g,
                pos: next,
            });
        }
    }

    Err(PlanError::NoPathFound)
}

fn reconstruct(came_from: &HashMap<GridPos, GridPos>, goal: GridPos) -> Vec<GridPos> {
    let mut nodes = vec![goal];
    let mut cursor = goal;
    while let Some(&prev) = came_from.get(&cursor) {
        nodes.push(prev);
        cursor = prev;
    }
    nodes.reverse();
    nodes
}
