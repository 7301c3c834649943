//! Procedural maze generation.
//!
//! A track is a single chain of square tiles carved on an N×N grid. The
//! path starts in the middle of the top row heading down, wanders left,
//! right and down (never reversing a horizontal run) and stops as soon as
//! it touches the bottom row or one of the side columns.
//!
//! Generation is split into a pure [`step`] function over a [`GenState`]
//! and a driver ([`TrackGenerator`]) that injects the random direction
//! choice, so the carving rules can be tested without an RNG.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::geometry::{Point, Segment, distance, rect_borders};

/// Smallest supported grid size.
pub const MIN_TRACK_SIZE: usize = 3;
/// Largest supported grid size.
pub const MAX_TRACK_SIZE: usize = 15;

/// Attempts made by [`TrackGenerator::regenerate_distinct`] before giving up.
const MAX_DISTINCT_ATTEMPTS: usize = 32;

/// Cardinal direction on the grid (screen orientation, Down = +row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Right => Direction::Left,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
        }
    }

    /// Grid offset as (d_col, d_row).
    pub fn offset(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
        }
    }

    pub fn is_horizontal(self) -> bool {
        matches!(self, Direction::Left | Direction::Right)
    }

    /// Index into a tile's border array (Top, Right, Bottom, Left).
    fn border_index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Right => 1,
            Direction::Down => 2,
            Direction::Left => 3,
        }
    }
}

/// One cell of the track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    /// Grid column.
    pub col: usize,
    /// Grid row.
    pub row: usize,
    /// World x of the top-left corner.
    pub x: f64,
    /// World y of the top-left corner.
    pub y: f64,
    /// Side length in world units.
    pub size: f64,
    /// Side through which the path enters.
    pub entry: Direction,
    /// Side through which the path leaves.
    pub exit: Direction,
    /// Top, Right, Bottom, Left. `None` where the side is open.
    pub borders: [Option<Segment>; 4],
}

impl Tile {
    fn new(col: usize, row: usize, size: f64, entry: Direction, exit: Direction) -> Self {
        Self {
            col,
            row,
            x: col as f64 * size,
            y: row as f64 * size,
            size,
            entry,
            exit,
            borders: [None; 4],
        }
    }

    fn compute_borders(&mut self) {
        let rect = rect_borders(Point::new(self.x, self.y), self.size, self.size);
        for dir in [
            Direction::Up,
            Direction::Right,
            Direction::Down,
            Direction::Left,
        ] {
            let i = dir.border_index();
            self.borders[i] = if dir == self.entry || dir == self.exit {
                None
            } else {
                Some(rect[i])
            };
        }
    }

    /// Center of the tile in world coordinates.
    pub fn center(&self) -> Point {
        Point::new(self.x + self.size * 0.5, self.y + self.size * 0.5)
    }

    /// Whether a side is open.
    pub fn is_open(&self, side: Direction) -> bool {
        self.borders[side.border_index()].is_none()
    }

    /// Number of open sides.
    pub fn open_sides(&self) -> usize {
        self.borders.iter().filter(|b| b.is_none()).count()
    }

    /// Solid borders of this tile.
    pub fn walls(&self) -> impl Iterator<Item = &Segment> {
        self.borders.iter().flatten()
    }

    /// Whether a world point lies inside the tile (inclusive).
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.x && p.x <= self.x + self.size && p.y >= self.y && p.y <= self.y + self.size
    }
}

/// A generated maze: an ordered chain of tiles plus the finish line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    size: usize,
    tile_size: f64,
    tiles: Vec<Tile>,
    finish_line: Segment,
}

impl Track {
    /// Grid size (tiles per side).
    pub fn size(&self) -> usize {
        self.size
    }

    /// Side length of a tile in world units.
    pub fn tile_size(&self) -> f64 {
        self.tile_size
    }

    /// Tiles in path order, from the start cell to the boundary cell.
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn first_tile(&self) -> &Tile {
        &self.tiles[0]
    }

    pub fn last_tile(&self) -> &Tile {
        &self.tiles[self.tiles.len() - 1]
    }

    /// Segment bisecting the last tile, perpendicular to its exit direction.
    pub fn finish_line(&self) -> Segment {
        self.finish_line
    }

    /// Width and height of the world covered by the grid.
    pub fn world_extent(&self) -> f64 {
        self.size as f64 * self.tile_size
    }

    /// Whether a point lies inside the grid's world bounds.
    pub fn in_bounds(&self, p: Point) -> bool {
        let extent = self.world_extent();
        p.x >= 0.0 && p.x <= extent && p.y >= 0.0 && p.y <= extent
    }

    /// All solid borders of every tile.
    pub fn walls(&self) -> impl Iterator<Item = &Segment> {
        self.tiles.iter().flat_map(Tile::walls)
    }

    /// Solid borders of tiles whose center lies within `radius` of `p`,
    /// widened by half a tile diagonal so no wall within `radius` is missed.
    pub fn walls_near(&self, p: Point, radius: f64) -> impl Iterator<Item = &Segment> {
        let reach = radius + self.tile_size * std::f64::consts::FRAC_1_SQRT_2;
        self.tiles
            .iter()
            .filter(move |t| distance(t.center(), p) <= reach)
            .flat_map(Tile::walls)
    }

    /// Whether two tracks carve the same path.
    pub fn same_layout(&self, other: &Track) -> bool {
        self.size == other.size
            && self.tiles.len() == other.tiles.len()
            && self.tiles.iter().zip(&other.tiles).all(|(a, b)| {
                a.col == b.col && a.row == b.row && a.entry == b.entry && a.exit == b.exit
            })
    }
}

/// Occupancy grid used while carving.
#[derive(Debug, Clone)]
pub struct Grid {
    size: usize,
    tile_size: f64,
    occupied: Vec<bool>,
    tiles: Vec<Tile>,
}

impl Grid {
    fn new(size: usize, tile_size: f64) -> Self {
        Self {
            size,
            tile_size,
            occupied: vec![false; size * size],
            tiles: Vec::new(),
        }
    }

    fn in_range(&self, col: isize, row: isize) -> bool {
        col >= 0 && row >= 0 && (col as usize) < self.size && (row as usize) < self.size
    }

    pub fn is_occupied(&self, col: isize, row: isize) -> bool {
        self.in_range(col, row) && self.occupied[row as usize * self.size + col as usize]
    }

    fn place(&mut self, col: usize, row: usize, entry: Direction, exit: Direction) {
        self.occupied[row * self.size + col] = true;
        self.tiles.push(Tile::new(col, row, self.tile_size, entry, exit));
    }

    /// Whether any tile lies on the bottom row, left column or right column.
    pub fn touches_boundary(&self) -> bool {
        let last = self.size - 1;
        self.tiles
            .iter()
            .any(|t| t.row == last || t.col == 0 || t.col == last)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }
}

/// Carving state: the cell about to be filled and the direction the path
/// travelled to reach it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenState {
    pub col: isize,
    pub row: isize,
    pub heading: Direction,
}

/// Directions the path may take next without a 180° turn.
pub fn allowed_directions(heading: Direction) -> &'static [Direction] {
    match heading {
        Direction::Left => &[Direction::Left, Direction::Down],
        Direction::Right => &[Direction::Right, Direction::Down],
        _ => &[Direction::Left, Direction::Right, Direction::Down],
    }
}

/// Fill the current cell given the chosen direction and return the next state.
///
/// When turning sideways into a column whose cell in the row above is
/// already part of the path, a straight Down tile is inserted first and
/// the turn happens one row lower.
pub fn step(grid: &mut Grid, state: GenState, dir: Direction) -> GenState {
    let entry = state.heading.opposite();
    let (dc, dr) = dir.offset();
    let next_col = state.col + dc;
    let mut next_row = state.row + dr;
    let (col, row) = (state.col as usize, state.row as usize);

    if dir.is_horizontal()
        && grid.in_range(next_col, next_row + 1)
        && grid.is_occupied(next_col, state.row - 1)
    {
        grid.place(col, row, entry, Direction::Down);
        grid.place(col, row + 1, Direction::Up, dir);
        next_row += 1;
    } else {
        grid.place(col, row, entry, dir);
    }

    GenState {
        col: next_col,
        row: next_row,
        heading: dir,
    }
}

/// Randomized single-path track builder.
#[derive(Debug, Clone, Copy)]
pub struct TrackGenerator {
    size: usize,
    tile_size: f64,
}

impl TrackGenerator {
    /// `size` must lie in `MIN_TRACK_SIZE..=MAX_TRACK_SIZE`; callers validate.
    pub fn new(size: usize, tile_size: f64) -> Self {
        Self {
            size: size.clamp(MIN_TRACK_SIZE, MAX_TRACK_SIZE),
            tile_size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Carve a new track, choosing each direction with `choose`.
    pub fn generate_with<F>(&self, mut choose: F) -> Track
    where
        F: FnMut(&'static [Direction]) -> Direction,
    {
        let mut grid = Grid::new(self.size, self.tile_size);
        let mid = self.size / 2;
        grid.place(mid, 0, Direction::Up, Direction::Down);

        let mut state = GenState {
            col: mid as isize,
            row: 1,
            heading: Direction::Down,
        };
        while grid.in_range(state.col, state.row) && !grid.touches_boundary() {
            let dir = choose(allowed_directions(state.heading));
            state = step(&mut grid, state, dir);
        }

        let mut tiles = grid.tiles;
        if let Some(last) = tiles.last_mut() {
            last.exit = last.entry.opposite();
        }
        for tile in &mut tiles {
            tile.compute_borders();
        }

        let finish_line = finish_line_of(&tiles[tiles.len() - 1]);
        Track {
            size: self.size,
            tile_size: self.tile_size,
            tiles,
            finish_line,
        }
    }

    /// Carve a new track with uniformly random direction choices.
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> Track {
        self.generate_with(|choices| *choices.choose(rng).unwrap_or(&Direction::Down))
    }

    /// Carve a track whose layout differs from `previous`, retrying a
    /// bounded number of times. Returns the last attempt if every attempt
    /// reproduced the previous layout.
    pub fn regenerate_distinct<R: Rng + ?Sized>(&self, previous: &Track, rng: &mut R) -> Track {
        let mut track = self.generate(rng);
        for _ in 1..MAX_DISTINCT_ATTEMPTS {
            if !track.same_layout(previous) {
                return track;
            }
            track = self.generate(rng);
        }
        if track.same_layout(previous) {
            log::warn!(
                "no distinct layout found for size {} after {} attempts",
                self.size,
                MAX_DISTINCT_ATTEMPTS
            );
        }
        track
    }
}

fn finish_line_of(tile: &Tile) -> Segment {
    let c = tile.center();
    if tile.exit.is_horizontal() {
        Segment::new(Point::new(c.x, tile.y), Point::new(c.x, tile.y + tile.size))
    } else {
        Segment::new(Point::new(tile.x, c.y), Point::new(tile.x + tile.size, c.y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn assert_connected(track: &Track) {
        let tiles = track.tiles();
        let first = &tiles[0];
        assert_eq!((first.col, first.row), (track.size() / 2, 0));
        assert_eq!(first.entry, Direction::Up);

        for pair in tiles.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let (dc, dr) = a.exit.offset();
            assert_eq!(a.col as isize + dc, b.col as isize, "{:?} -> {:?}", a, b);
            assert_eq!(a.row as isize + dr, b.row as isize, "{:?} -> {:?}", a, b);
            assert_eq!(b.entry, a.exit.opposite());
        }

        for tile in tiles {
            assert_eq!(tile.open_sides(), 2, "{:?}", tile);
            assert!(tile.is_open(tile.entry));
            assert!(tile.is_open(tile.exit));
        }

        let last = track.last_tile();
        let n = track.size() - 1;
        assert!(last.row == n || last.col == 0 || last.col == n);
        assert_eq!(last.exit, last.entry.opposite());
        // The exit of the last tile faces out of the grid
        let (dc, dr) = last.exit.offset();
        let (oc, or) = (last.col as isize + dc, last.row as isize + dr);
        assert!(oc < 0 || or < 0 || oc > n as isize || or > n as isize);
    }

    #[test]
    fn test_generated_tracks_are_connected() {
        let mut rng = StdRng::seed_from_u64(7);
        for size in MIN_TRACK_SIZE..=11 {
            let generator = TrackGenerator::new(size, 50.0);
            for _ in 0..50 {
                let track = generator.generate(&mut rng);
                assert_connected(&track);
            }
        }
    }

    #[test]
    fn test_tiles_are_unique() {
        let mut rng = StdRng::seed_from_u64(11);
        let generator = TrackGenerator::new(9, 10.0);
        for _ in 0..100 {
            let track = generator.generate(&mut rng);
            let mut cells: Vec<_> = track.tiles().iter().map(|t| (t.col, t.row)).collect();
            cells.sort_unstable();
            cells.dedup();
            assert_eq!(cells.len(), track.tiles().len());
        }
    }

    #[test]
    fn test_straight_down_track() {
        let generator = TrackGenerator::new(5, 10.0);
        let track = generator.generate_with(|_| Direction::Down);
        let rows: Vec<_> = track.tiles().iter().map(|t| t.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3, 4]);
        assert!(track.tiles().iter().all(|t| t.col == 2));
        assert_eq!(track.last_tile().exit, Direction::Down);

        // Finish line is horizontal through the last tile's center
        let finish = track.finish_line();
        assert_eq!(finish.start, Point::new(20.0, 45.0));
        assert_eq!(finish.end, Point::new(30.0, 45.0));
    }

    #[test]
    fn test_minimal_track_reaches_boundary() {
        // 3×3: start (1,0), then (1,1), then one move reaches a boundary
        let generator = TrackGenerator::new(3, 100.0);
        let track = generator.generate_with(|_| Direction::Left);
        let cells: Vec<_> = track.tiles().iter().map(|t| (t.col, t.row)).collect();
        assert_eq!(cells, vec![(1, 0), (1, 1), (0, 1)]);
        let last = track.last_tile();
        assert_eq!(last.entry, Direction::Right);
        assert_eq!(last.exit, Direction::Left);
        // Vertical finish line for a horizontal exit
        let finish = track.finish_line();
        assert_eq!(finish.start.x, 50.0);
        assert_eq!(finish.end.x, 50.0);
    }

    #[test]
    fn test_allowed_directions_exclude_reversal() {
        assert!(!allowed_directions(Direction::Left).contains(&Direction::Right));
        assert!(!allowed_directions(Direction::Right).contains(&Direction::Left));
        assert_eq!(allowed_directions(Direction::Down).len(), 3);
    }

    #[test]
    fn test_step_inserts_gap_tile() {
        // Path came down column 3, went left to column 2 and down; turning
        // right back under column 3 would hug the earlier tile.
        let mut grid = Grid::new(7, 1.0);
        grid.place(3, 0, Direction::Up, Direction::Down);
        grid.place(3, 1, Direction::Up, Direction::Left);
        grid.place(2, 1, Direction::Right, Direction::Down);

        let state = GenState {
            col: 2,
            row: 2,
            heading: Direction::Down,
        };
        let next = step(&mut grid, state, Direction::Right);

        assert_eq!(
            next,
            GenState {
                col: 3,
                row: 3,
                heading: Direction::Right
            }
        );
        let placed: Vec<_> = grid.tiles()[3..]
            .iter()
            .map(|t| (t.col, t.row, t.entry, t.exit))
            .collect();
        assert_eq!(
            placed,
            vec![
                (2, 2, Direction::Up, Direction::Down),
                (2, 3, Direction::Up, Direction::Right),
            ]
        );
    }

    #[test]
    fn test_step_without_gap() {
        let mut grid = Grid::new(7, 1.0);
        grid.place(3, 0, Direction::Up, Direction::Down);
        let state = GenState {
            col: 3,
            row: 1,
            heading: Direction::Down,
        };
        let next = step(&mut grid, state, Direction::Left);
        assert_eq!((next.col, next.row), (2, 1));
        assert_eq!(grid.tiles().len(), 2);
        assert_eq!(grid.tiles()[1].exit, Direction::Left);
    }

    #[test]
    fn test_regenerate_distinct() {
        let mut rng = StdRng::seed_from_u64(3);
        let generator = TrackGenerator::new(3, 10.0);
        let previous = generator.generate(&mut rng);
        for _ in 0..20 {
            let next = generator.regenerate_distinct(&previous, &mut rng);
            assert!(!next.same_layout(&previous));
        }
    }

    #[test]
    fn test_walls_near_covers_all_close_walls() {
        let mut rng = StdRng::seed_from_u64(5);
        let track = TrackGenerator::new(7, 40.0).generate(&mut rng);
        let p = track.first_tile().center();
        let near: Vec<_> = track.walls_near(p, 60.0).collect();
        for wall in track.walls() {
            let d = distance(wall.midpoint(), p).min(distance(wall.start, p));
            if d < 30.0 {
                assert!(near.contains(&wall));
            }
        }
    }
}
