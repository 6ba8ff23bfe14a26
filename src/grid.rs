//! Grid addressing - maps block grid positions to block files and back
//!
//! A block at grid position `[a, b, c]` of the dataset at `root` lives at
//! `root/a/b/c`. Each coordinate becomes one decimal path segment, so two
//! distinct positions of the same rank can never share a file.

use std::path::{Component, Path, PathBuf};

/// Block coordinate in block-count units, one entry per dimension
pub type GridPosition = Vec<u64>;

/// Path of the block file at `grid_position` below `dataset_root`
///
/// Pure; never touches the filesystem.
pub fn block_path(dataset_root: impl AsRef<Path>, grid_position: &[u64]) -> PathBuf {
    let mut path = dataset_root.as_ref().to_path_buf();
    for coord in grid_position {
        path.push(coord.to_string());
    }
    path
}

/// Recover the grid position from a block file path
///
/// Returns `None` if `block_path` is not below `dataset_root` or if any
/// segment is not a canonical decimal (no sign, no leading zeros).
pub fn grid_position_from_path(
    dataset_root: impl AsRef<Path>,
    block_path: impl AsRef<Path>,
) -> Option<GridPosition> {
    let relative = block_path.as_ref().strip_prefix(dataset_root.as_ref()).ok()?;
    let mut position = Vec::new();
    for component in relative.components() {
        let Component::Normal(segment) = component else {
            return None;
        };
        let segment = segment.to_str()?;
        if segment.is_empty()
            || !segment.bytes().all(|b| b.is_ascii_digit())
            || (segment.len() > 1 && segment.starts_with('0'))
        {
            return None;
        }
        position.push(segment.parse().ok()?);
    }
    if position.is_empty() {
        None
    } else {
        Some(position)
    }
}

/// Number of blocks along each dimension
pub fn grid_size(dimensions: &[u64], block_size: &[u32]) -> Vec<u64> {
    dimensions
        .iter()
        .zip(block_size.iter())
        .map(|(&dim, &block)| dim.div_ceil(u64::from(block.max(1))))
        .collect()
}

/// Actual extents of the block at `grid_position`
///
/// Blocks on the upper boundary of the array are truncated to what is left
/// of the dimension. Returns `None` if the position is outside the grid or
/// has the wrong rank.
pub fn block_extent(
    dimensions: &[u64],
    block_size: &[u32],
    grid_position: &[u64],
) -> Option<Vec<u32>> {
    if grid_position.len() != dimensions.len() || block_size.len() != dimensions.len() {
        return None;
    }

    dimensions
        .iter()
        .zip(block_size.iter())
        .zip(grid_position.iter())
        .map(|((&dim, &block), &coord)| {
            let start = coord.checked_mul(u64::from(block))?;
            if start >= dim {
                return None;
            }
            let extent = (dim - start).min(u64::from(block));
            u32::try_from(extent).ok()
        })
        .collect()
}

/// Iterate all grid positions of an array, first dimension fastest
pub fn grid_positions(dimensions: &[u64], block_size: &[u32]) -> GridPositions {
    let size = grid_size(dimensions, block_size);
    let done = size.is_empty() || size.iter().any(|&s| s == 0);
    GridPositions {
        current: vec![0; size.len()],
        size,
        done,
    }
}

/// Iterator returned by [`grid_positions`]
#[derive(Debug, Clone)]
pub struct GridPositions {
    size: Vec<u64>,
    current: Vec<u64>,
    done: bool,
}

impl Iterator for GridPositions {
    type Item = GridPosition;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.current.clone();

        let mut dim = 0;
        loop {
            if dim == self.size.len() {
                self.done = true;
                break;
            }
            self.current[dim] += 1;
            if self.current[dim] < self.size[dim] {
                break;
            }
            self.current[dim] = 0;
            dim += 1;
        }

        Some(item)
    }
}
