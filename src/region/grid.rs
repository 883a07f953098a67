//! Row-major partition of the screen into named rectangular regions.

use crate::error::{HarnessError, Result};

/// A named rectangular cell of the screen grid.
///
/// Two regions are the same region when their ids match.
#[derive(Debug, Clone)]
pub struct Region {
    /// 0-based, row-major.
    pub id: usize,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub center_x: f64,
    pub center_y: f64,
    // Closed far edges. Shared with the neighbour's near edge; pinned to the
    // screen size on the last row and column.
    right: f64,
    bottom: f64,
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Region {}

impl Region {
    /// Closed-rectangle containment: points on any edge are inside.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.x <= x && x <= self.right && self.y <= y && y <= self.bottom
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }
}

/// Fixed rows × cols grid covering `[0, width] × [0, height]`.
#[derive(Debug, Clone)]
pub struct RegionGrid {
    screen_width: f64,
    screen_height: f64,
    rows: usize,
    cols: usize,
    regions: Vec<Region>,
}

impl RegionGrid {
    pub fn new(screen_width: f64, screen_height: f64, rows: usize, cols: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(HarnessError::InvalidConfiguration(format!(
                "region grid needs at least one row and column, got {rows}x{cols}"
            )));
        }
        if !(screen_width > 0.0 && screen_height > 0.0) {
            return Err(HarnessError::InvalidConfiguration(format!(
                "screen size must be positive, got {screen_width}x{screen_height}"
            )));
        }

        let width = screen_width / cols as f64;
        let height = screen_height / rows as f64;
        let edge = |extent: f64, i: usize, n: usize| {
            if i >= n {
                extent
            } else {
                extent * i as f64 / n as f64
            }
        };

        let mut regions = Vec::with_capacity(rows * cols);
        for row in 0..rows {
            for col in 0..cols {
                let x = edge(screen_width, col, cols);
                let y = edge(screen_height, row, rows);
                regions.push(Region {
                    id: row * cols + col,
                    name: format!("Region_{}_{}", row + 1, col + 1),
                    x,
                    y,
                    width,
                    height,
                    center_x: x + width / 2.0,
                    center_y: y + height / 2.0,
                    right: edge(screen_width, col + 1, cols),
                    bottom: edge(screen_height, row + 1, rows),
                });
            }
        }

        Ok(Self {
            screen_width,
            screen_height,
            rows,
            cols,
            regions,
        })
    }

    /// First region in creation order containing the point.
    ///
    /// Points on a shared edge belong to both neighbours; the earlier one
    /// in row-major order wins.
    pub fn resolve(&self, x: f64, y: f64) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(x, y))
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn get(&self, id: usize) -> Option<&Region> {
        self.regions.get(id)
    }

    pub fn screen_size(&self) -> (f64, f64) {
        (self.screen_width, self.screen_height)
    }

    /// `(rows, cols)`.
    pub fn dimensions(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_layout_row_major() {
        let grid = RegionGrid::new(1920.0, 1080.0, 3, 3).unwrap();
        assert_eq!(grid.regions().len(), 9);

        let r = grid.get(5).unwrap();
        assert_eq!(r.name, "Region_2_3");
        assert_eq!(r.x, 1280.0);
        assert_eq!(r.y, 360.0);
        assert_eq!(r.width, 640.0);
        assert_eq!(r.height, 360.0);
        assert_eq!(r.center_x, 1600.0);
        assert_eq!(r.center_y, 540.0);
    }

    #[test]
    fn test_tiling_area_matches_screen() {
        for &(w, h, rows, cols) in &[
            (1920.0, 1080.0, 3, 3),
            (800.0, 600.0, 1, 1),
            (1000.0, 1000.0, 4, 8),
            (1366.0, 768.0, 5, 2),
        ] {
            let grid = RegionGrid::new(w, h, rows, cols).unwrap();
            let total: f64 = grid.regions().iter().map(Region::area).sum();
            assert!(
                (total - w * h).abs() < 1e-6 * w * h,
                "{rows}x{cols} over {w}x{h} covers {total}"
            );
        }
    }

    #[test]
    fn test_resolve_total_over_screen() {
        let grid = RegionGrid::new(1200.0, 900.0, 3, 4).unwrap();
        let steps = 40;
        for i in 0..=steps {
            for j in 0..=steps {
                let x = 1200.0 * i as f64 / steps as f64;
                let y = 900.0 * j as f64 / steps as f64;
                assert!(grid.resolve(x, y).is_some(), "({x}, {y}) unresolved");
            }
        }
    }

    #[test]
    fn test_far_screen_edges_resolve() {
        for &(w, h, rows, cols) in &[
            (1366.0, 768.0, 1, 10),
            (1366.0, 768.0, 7, 1),
            (1920.0, 1080.0, 3, 11),
            (2560.0, 1440.0, 9, 7),
            (1280.0, 1024.0, 13, 3),
            (101.3, 77.7, 6, 9),
        ] {
            let grid = RegionGrid::new(w, h, rows, cols).unwrap();
            let last = rows * cols - 1;
            assert!(grid.resolve(w, h / 2.0).is_some(), "{rows}x{cols}: right edge");
            assert!(grid.resolve(w / 2.0, h).is_some(), "{rows}x{cols}: bottom edge");
            assert_eq!(grid.resolve(w, h).map(|r| r.id), Some(last));
        }
    }

    #[test]
    fn test_neighbours_share_edges() {
        let grid = RegionGrid::new(1366.0, 768.0, 7, 11).unwrap();
        for row in 0..7 {
            for col in 0..11 {
                let r = grid.get(row * 11 + col).unwrap();
                if col + 1 < 11 {
                    assert_eq!(r.right, grid.get(row * 11 + col + 1).unwrap().x);
                }
                if row + 1 < 7 {
                    assert_eq!(r.bottom, grid.get((row + 1) * 11 + col).unwrap().y);
                }
            }
        }
    }

    #[test]
    fn test_resolve_out_of_bounds() {
        let grid = RegionGrid::new(1920.0, 1080.0, 3, 3).unwrap();
        assert!(grid.resolve(-0.1, 10.0).is_none());
        assert!(grid.resolve(10.0, 1080.5).is_none());
        assert!(grid.resolve(1921.0, 500.0).is_none());
    }

    #[test]
    fn test_shared_boundary_first_match_wins() {
        // Documented tie-break: closed intervals, earlier region wins.
        let grid = RegionGrid::new(1920.0, 1080.0, 3, 3).unwrap();
        assert_eq!(grid.resolve(640.0, 100.0).unwrap().id, 0);
        assert_eq!(grid.resolve(100.0, 360.0).unwrap().id, 0);
        assert_eq!(grid.resolve(640.0, 360.0).unwrap().id, 0);
        assert_eq!(grid.resolve(1280.0, 720.0).unwrap().id, 4);
        assert_eq!(grid.resolve(1920.0, 1080.0).unwrap().id, 8);
    }

    #[test]
    fn test_invalid_grid_rejected() {
        assert!(matches!(
            RegionGrid::new(1920.0, 1080.0, 0, 3),
            Err(HarnessError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            RegionGrid::new(0.0, 1080.0, 3, 3),
            Err(HarnessError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_region_equality_by_id() {
        let grid = RegionGrid::new(100.0, 100.0, 2, 2).unwrap();
        let mut copy = grid.get(1).unwrap().clone();
        copy.name = "renamed".to_string();
        assert_eq!(&copy, grid.get(1).unwrap());
        assert_ne!(grid.get(0).unwrap(), grid.get(1).unwrap());
    }
}
