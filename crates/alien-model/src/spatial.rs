//! Uniform bucket grid over the toroidal world for neighborhood queries.

use alien_core::{SpaceMetric, Vec2};

/// Buckets of entry indices. Entries are numbered in insertion order.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    space: SpaceMetric,
    cols: usize,
    rows: usize,
    bucket_width: f64,
    bucket_height: f64,
    buckets: Vec<Vec<usize>>,
    positions: Vec<Vec2>,
}

impl SpatialGrid {
    /// Buckets are at least `cell_size` wide in both directions.
    pub fn new(space: SpaceMetric, cell_size: f64) -> Self {
        let cell_size = if cell_size > 0.0 { cell_size } else { 1.0 };
        let cols = ((space.width / cell_size).floor() as usize).max(1);
        let rows = ((space.height / cell_size).floor() as usize).max(1);
        Self {
            space,
            cols,
            rows,
            bucket_width: space.width / cols as f64,
            bucket_height: space.height / rows as f64,
            buckets: vec![Vec::new(); cols * rows],
            positions: Vec::new(),
        }
    }

    pub fn build(space: SpaceMetric, cell_size: f64, positions: impl IntoIterator<Item = Vec2>) -> Self {
        let mut grid = Self::new(space, cell_size);
        for pos in positions {
            grid.insert(pos);
        }
        grid
    }

    pub fn insert(&mut self, pos: Vec2) -> usize {
        let pos = self.space.correct_position(pos);
        let index = self.positions.len();
        let bucket = self.bucket_of(pos);
        self.buckets[bucket].push(index);
        self.positions.push(pos);
        index
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Indices of all entries within `radius` of `pos`, ascending.
    pub fn within(&self, pos: Vec2, radius: f64) -> Vec<usize> {
        let pos = self.space.correct_position(pos);
        let (col, row) = self.col_row(pos);
        let span_x = (radius / self.bucket_width).ceil() as usize;
        let span_y = (radius / self.bucket_height).ceil() as usize;

        let mut result = Vec::new();
        for c in Self::wrapped_range(col, span_x, self.cols) {
            for r in Self::wrapped_range(row, span_y, self.rows) {
                for &index in &self.buckets[r * self.cols + c] {
                    if self.space.distance(pos, self.positions[index]) <= radius {
                        result.push(index);
                    }
                }
            }
        }
        result.sort_unstable();
        result
    }

    /// Nearest entry within `radius` other than `exclude`.
    pub fn nearest(&self, pos: Vec2, radius: f64, exclude: impl Fn(usize) -> bool) -> Option<usize> {
        self.within(pos, radius)
            .into_iter()
            .filter(|i| !exclude(*i))
            .min_by(|a, b| {
                let da = self.space.distance(pos, self.positions[*a]);
                let db = self.space.distance(pos, self.positions[*b]);
                da.total_cmp(&db)
            })
    }

    fn wrapped_range(center: usize, span: usize, count: usize) -> Vec<usize> {
        if 2 * span + 1 >= count {
            return (0..count).collect();
        }
        (0..=2 * span)
            .map(|offset| (center + count + offset - span) % count)
            .collect()
    }

    fn col_row(&self, pos: Vec2) -> (usize, usize) {
        let col = ((pos.x / self.bucket_width) as usize).min(self.cols - 1);
        let row = ((pos.y / self.bucket_height) as usize).min(self.rows - 1);
        (col, row)
    }

    fn bucket_of(&self, pos: Vec2) -> usize {
        let (col, row) = self.col_row(pos);
        row * self.cols + col
    }
}
