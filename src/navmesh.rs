//! The navmesh tile store.
//!
//! [`NavMesh`] owns the built tile blobs addressed by [`TileCoord`] plus the
//! global build parameters. Parameters are write-once per build epoch:
//! changing them requires a full clear and rebuild.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
};

use glam::Vec3;
use thiserror::Error;
use tracing::error;

use crate::tile::{BuiltTile, TileCoord};

/// Address-encoding budget shared between the tile and polygon id bits.
/// The remaining 10 bits of the 32-bit polygon reference are kept for salt.
const TILE_POLY_BITS: u32 = 22;

/// Global navmesh parameters, fixed at [`NavMesh::init`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NavMeshParams {
    /// World-space origin of tile (0, 0).
    pub origin: Vec3,
    /// World-space side length of one square tile.
    pub tile_world_size: f32,
    /// Maximum number of tiles the mesh can hold.
    pub max_tiles: u32,
    /// Maximum number of polygons per tile.
    pub max_polys: u32,
}

impl NavMeshParams {
    /// Derives parameters for a grid of `max_tiles` tiles, splitting the
    /// address-encoding budget between tile and polygon bits.
    pub fn for_grid(
        origin: Vec3,
        tile_world_size: f32,
        max_tiles: u32,
    ) -> Result<Self, NavMeshError> {
        let max_tiles = max_tiles.max(1);
        let tile_bits = max_tiles.next_power_of_two().trailing_zeros();
        if tile_bits >= TILE_POLY_BITS {
            return Err(NavMeshError::ParamsRejected(format!(
                "{max_tiles} tiles need {tile_bits} address bits, leaving no room for polygon ids"
            )));
        }
        Ok(Self {
            origin,
            tile_world_size,
            max_tiles,
            max_polys: 1 << (TILE_POLY_BITS - tile_bits),
        })
    }

    fn validate(&self) -> Result<(), NavMeshError> {
        if self.tile_world_size <= 0.0 {
            return Err(NavMeshError::ParamsRejected(
                "tile world size must be positive".to_owned(),
            ));
        }
        if self.max_tiles == 0 || self.max_polys == 0 {
            return Err(NavMeshError::ParamsRejected(
                "tile and polygon budgets must be non-zero".to_owned(),
            ));
        }
        let tile_bits = self.max_tiles.next_power_of_two().trailing_zeros();
        let poly_bits = self.max_polys.next_power_of_two().trailing_zeros();
        if tile_bits + poly_bits > TILE_POLY_BITS {
            return Err(NavMeshError::ParamsRejected(format!(
                "{} tiles x {} polygons does not fit the {TILE_POLY_BITS}-bit address budget",
                self.max_tiles, self.max_polys
            )));
        }
        Ok(())
    }
}

/// Failures of tile store operations.
#[derive(Debug, Error)]
pub enum NavMeshError {
    /// A tile operation ran before [`NavMesh::init`].
    #[error("navmesh is not initialized")]
    NotInitialized,
    /// The build parameters do not fit the address-encoding budget.
    #[error("navmesh parameters rejected: {0}")]
    ParamsRejected(String),
    /// A tile carries more polygons than the per-tile budget allows.
    #[error("tile ({}, {}) has {count} polygons, budget is {max}", coord.x, coord.z)]
    PolygonBudget {
        /// The offending tile.
        coord: TileCoord,
        /// Polygons in the tile.
        count: u32,
        /// The per-tile budget.
        max: u32,
    },
}

/// A built tile owned by the store. The blob layout belongs to the mesh-build
/// library and is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    /// The coordinate this tile occupies.
    pub coord: TileCoord,
    /// Number of polygons, decoded from the blob header.
    pub polygon_count: u32,
    /// Number of polygon vertices, decoded from the blob header.
    pub vertex_count: u32,
    /// The opaque serialized tile blob.
    pub data: Vec<u8>,
}

impl From<BuiltTile> for Tile {
    fn from(built: BuiltTile) -> Self {
        Self {
            coord: built.coord,
            polygon_count: built.polygon_count,
            vertex_count: built.vertex_count,
            data: built.data,
        }
    }
}

/// The tile store: at most one live tile per coordinate.
#[derive(Debug, Default)]
pub struct NavMesh {
    params: Option<NavMeshParams>,
    tiles: HashMap<TileCoord, Tile>,
}

/// The tile store as shared between the build driver, path queries and the
/// crowd context. All mutation happens on the thread that also steps the
/// crowd, so readers never observe a half-inserted tile.
pub type SharedNavMesh = Arc<RwLock<NavMesh>>;

impl NavMesh {
    /// Creates an empty, uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes the store with `params`, clearing any previous epoch.
    /// Fails if the parameters do not fit the address-encoding budget.
    pub fn init(&mut self, params: NavMeshParams) -> Result<(), NavMeshError> {
        if let Err(err) = params.validate() {
            error!(target: "navigation", "could not init navmesh: {err}");
            return Err(err);
        }
        self.tiles.clear();
        self.params = Some(params);
        Ok(())
    }

    /// The parameters of the current build epoch, if initialized.
    pub fn params(&self) -> Option<&NavMeshParams> {
        self.params.as_ref()
    }

    /// Whether the store has been initialized.
    pub fn is_ready(&self) -> bool {
        self.params.is_some()
    }

    /// Inserts `tile`, evicting any previous occupant of its coordinate.
    pub fn add_tile(&mut self, tile: Tile) -> Result<(), NavMeshError> {
        let params = self.params.as_ref().ok_or(NavMeshError::NotInitialized)?;
        if tile.polygon_count > params.max_polys {
            return Err(NavMeshError::PolygonBudget {
                coord: tile.coord,
                count: tile.polygon_count,
                max: params.max_polys,
            });
        }
        self.tiles.insert(tile.coord, tile);
        Ok(())
    }

    /// Removes and returns the tile at `coord`. Removing an absent tile is a
    /// no-op.
    pub fn remove_tile(&mut self, coord: TileCoord) -> Option<Tile> {
        self.tiles.remove(&coord)
    }

    /// The tile at `coord`, if any.
    pub fn tile_at(&self, coord: TileCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    /// Number of stored tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    /// Total polygons across all stored tiles.
    pub fn polygon_count(&self) -> u32 {
        self.tiles.values().map(|t| t.polygon_count).sum()
    }

    /// Drops all tiles and the parameters, ending the build epoch.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.params = None;
    }
}
