//! Voxel-space exchange types shared with the mesh-build library.
//!
//! These are plain data containers; all algorithms that fill or transform
//! them live behind [`MeshBuildKernel`](crate::kernel::MeshBuildKernel).

use crate::{kernel::AreaType, math::Aabb3d};

/// One solid vertical span in a heightfield column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Floor of the span. `[Units: vx]`
    pub min: u16,
    /// Ceiling of the span. `[Units: vx]`
    pub max: u16,
    /// Area classification of the span's top surface.
    pub area: AreaType,
}

/// A voxelized representation of solid space, one column of sorted spans per
/// xz cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Heightfield {
    /// Width along the x-axis. `[Units: vx]`
    pub width: u32,
    /// Height along the z-axis. `[Units: vx]`
    pub height: u32,
    /// World-space bounds of the field.
    pub aabb: Aabb3d,
    /// The xz-plane voxel size. `[Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Units: wu]`
    pub cell_height: f32,
    /// Span columns in `x + z * width` order, each sorted by ascending `min`.
    pub columns: Vec<Vec<Span>>,
}

impl Heightfield {
    /// Creates an empty heightfield covering `aabb`.
    pub fn new(width: u32, height: u32, aabb: Aabb3d, cell_size: f32, cell_height: f32) -> Self {
        Self {
            width,
            height,
            aabb,
            cell_size,
            cell_height,
            columns: vec![Vec::new(); (width * height) as usize],
        }
    }

    /// The span column at cell `(x, z)`.
    pub fn column(&self, x: u32, z: u32) -> &[Span] {
        &self.columns[(x + z * self.width) as usize]
    }

    /// Total number of spans across all columns.
    pub fn span_count(&self) -> usize {
        self.columns.iter().map(Vec::len).sum()
    }
}

/// One open (walkable-candidate) span in a compact heightfield.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactSpan {
    /// Floor height of the open space. `[Units: vx]`
    pub y: u16,
    /// Clearance above the floor. `[Units: vx]`
    pub clearance: u16,
    /// Area classification.
    pub area: AreaType,
    /// Watershed region the span was assigned to; 0 before region building.
    pub region: u16,
}

/// Index range of a compact column into [`CompactHeightfield::spans`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactCell {
    /// First span of the column.
    pub index: u32,
    /// Number of spans in the column.
    pub count: u32,
}

/// The open-space counterpart of [`Heightfield`], produced by compaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactHeightfield {
    /// Width along the x-axis. `[Units: vx]`
    pub width: u32,
    /// Height along the z-axis. `[Units: vx]`
    pub height: u32,
    /// World-space bounds of the field.
    pub aabb: Aabb3d,
    /// The xz-plane voxel size. `[Units: wu]`
    pub cell_size: f32,
    /// The y-axis voxel size. `[Units: wu]`
    pub cell_height: f32,
    /// Cells in `x + z * width` order.
    pub cells: Vec<CompactCell>,
    /// All open spans, grouped by cell.
    pub spans: Vec<CompactSpan>,
    /// Largest distance-field value, once the distance field is built.
    pub max_distance: u16,
    /// Number of regions assigned, once regions are built.
    pub region_count: u16,
}

impl CompactHeightfield {
    /// The spans of cell `(x, z)`.
    pub fn cell_spans(&self, x: u32, z: u32) -> &[CompactSpan] {
        let cell = self.cells[(x + z * self.width) as usize];
        &self.spans[cell.index as usize..(cell.index + cell.count) as usize]
    }
}
