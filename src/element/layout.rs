//! Slab selections for growing writes.

use crate::backend::Selection;

/// Clamp a 1-based growth axis into `1..=rank + 1`.
pub fn clamp_growth_axis(axis: usize, rank: usize) -> usize {
    axis.clamp(1, rank + 1)
}

/// Backend axis of data axis `k` when the growth axis is `growth_axis`.
pub fn backend_axis(growth_axis: usize, k: usize) -> usize {
    if k + 1 < growth_axis { k } else { k + 1 }
}

/// Initial backend shape: the data shape with a zero extent inserted at the
/// growth axis.
pub fn grown_shape(growth_axis: usize, data_shape: &[usize]) -> Vec<usize> {
    let g = clamp_growth_axis(growth_axis, data_shape.len()) - 1;
    let mut shape = data_shape.to_vec();
    shape.insert(g, 0);
    shape
}

/// Selection writing a value of `data_shape` at `index` along the growth axis.
///
/// Every data axis is selected from zero over its own extent, so a value
/// smaller than the field fills a sub-range.
pub fn slab_for(growth_axis: usize, data_shape: &[usize], index: usize) -> Vec<Selection> {
    let g = clamp_growth_axis(growth_axis, data_shape.len()) - 1;
    let mut selection: Vec<Selection> = data_shape.iter().map(|&d| Selection::Range(0, d)).collect();
    selection.insert(g, Selection::Index(index));
    selection
}
