//! The tile store persistence codec.
//!
//! Fixed little-endian binary layout, written and read in this order:
//!
//! 1. world AABB (`min`, `max`, six `f32`s),
//! 2. tile-grid width and height (two `u32`s),
//! 3. navmesh build parameters (`origin` as three `f32`s, tile world size as
//!    `f32`, tile and polygon budgets as two `u32`s),
//! 4. for each tile in row-major order (z outer, x inner): a `u32` blob
//!    length followed by that many bytes of tile blob, written verbatim.
//!
//! An unbuilt coordinate is written as a zero-length blob; a built empty tile
//! is a real blob with zero polygons. Blob internals belong to the mesh-build
//! library and are never parsed here.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use glam::Vec3;
use thiserror::Error;

use crate::{
    kernel::{KernelError, MeshBuildKernel},
    math::Aabb3d,
    navmesh::{NavMesh, NavMeshError, NavMeshParams, Tile},
    tile::TileCoord,
};

/// Failures saving or loading the tile store.
#[derive(Debug, Error)]
pub enum PersistError {
    /// The underlying stream failed or ended early.
    #[error("navmesh stream error: {0}")]
    Io(#[from] std::io::Error),
    /// The stored parameters were rejected on re-initialization.
    #[error(transparent)]
    NavMesh(#[from] NavMeshError),
    /// A tile blob's header could not be decoded.
    #[error("corrupt tile blob: {0}")]
    CorruptTile(#[from] KernelError),
    /// A tile blob was stored at a different coordinate than it was encoded
    /// for.
    #[error("tile blob at ({}, {}) encoded for ({}, {})", at.x, at.z, encoded.x, encoded.z)]
    TileMismatch {
        /// Coordinate position in the stream.
        at: TileCoord,
        /// Coordinate found in the blob header.
        encoded: TileCoord,
    },
}

/// A tile store reconstructed by [`load`], together with the build extents it
/// was saved with.
#[derive(Debug)]
pub struct LoadedStore {
    /// Bounds of the navigable area.
    pub aabb: Aabb3d,
    /// Tile-grid width.
    pub tiles_x: u32,
    /// Tile-grid height.
    pub tiles_z: u32,
    /// The re-initialized, fully populated store.
    pub navmesh: NavMesh,
}

/// Writes the tile store to `writer`.
pub fn save<W: Write>(
    writer: &mut W,
    aabb: &Aabb3d,
    tiles_x: u32,
    tiles_z: u32,
    navmesh: &NavMesh,
) -> Result<(), PersistError> {
    let params = navmesh.params().ok_or(NavMeshError::NotInitialized)?;

    write_vec3(writer, aabb.min)?;
    write_vec3(writer, aabb.max)?;
    write_u32(writer, tiles_x)?;
    write_u32(writer, tiles_z)?;
    write_vec3(writer, params.origin)?;
    write_f32(writer, params.tile_world_size)?;
    write_u32(writer, params.max_tiles)?;
    write_u32(writer, params.max_polys)?;

    for z in 0..tiles_z {
        for x in 0..tiles_x {
            match navmesh.tile_at(TileCoord::new(x, z)) {
                Some(tile) => {
                    write_u32(writer, tile.data.len() as u32)?;
                    writer.write_all(&tile.data)?;
                }
                None => write_u32(writer, 0)?,
            }
        }
    }
    Ok(())
}

/// Reads a tile store from `reader`, re-initializing a fresh store with the
/// stored parameters and inserting tiles in the order they were written.
///
/// On any failure no store is produced, so the caller's navmesh stays in
/// whatever (typically cleared) state it was in.
pub fn load<R: Read>(
    reader: &mut R,
    kernel: &dyn MeshBuildKernel,
) -> Result<LoadedStore, PersistError> {
    let aabb = Aabb3d::new(read_vec3(reader)?, read_vec3(reader)?);
    let tiles_x = read_u32(reader)?;
    let tiles_z = read_u32(reader)?;
    let params = NavMeshParams {
        origin: read_vec3(reader)?,
        tile_world_size: read_f32(reader)?,
        max_tiles: read_u32(reader)?,
        max_polys: read_u32(reader)?,
    };

    let mut navmesh = NavMesh::new();
    navmesh.init(params)?;

    for z in 0..tiles_z {
        for x in 0..tiles_x {
            let len = read_u32(reader)? as usize;
            if len == 0 {
                continue;
            }
            let mut data = vec![0u8; len];
            reader.read_exact(&mut data)?;
            let header = kernel.decode_tile_header(&data)?;
            let at = TileCoord::new(x, z);
            if header.coord != at {
                return Err(PersistError::TileMismatch {
                    at,
                    encoded: header.coord,
                });
            }
            navmesh.add_tile(Tile {
                coord: at,
                polygon_count: header.polygon_count,
                vertex_count: header.vertex_count,
                data,
            })?;
        }
    }

    Ok(LoadedStore {
        aabb,
        tiles_x,
        tiles_z,
        navmesh,
    })
}

/// [`save`] to a file at `path`.
pub fn save_to_path(
    path: &Path,
    aabb: &Aabb3d,
    tiles_x: u32,
    tiles_z: u32,
    navmesh: &NavMesh,
) -> Result<(), PersistError> {
    let mut writer = BufWriter::new(File::create(path)?);
    save(&mut writer, aabb, tiles_x, tiles_z, navmesh)?;
    writer.flush()?;
    Ok(())
}

/// [`load`] from a file at `path`.
pub fn load_from_path(path: &Path, kernel: &dyn MeshBuildKernel) -> Result<LoadedStore, PersistError> {
    let mut reader = BufReader::new(File::open(path)?);
    let loaded = load(&mut reader, kernel)?;
    Ok(loaded)
}

fn write_u32<W: Write>(writer: &mut W, value: u32) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_f32<W: Write>(writer: &mut W, value: f32) -> std::io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

fn write_vec3<W: Write>(writer: &mut W, value: Vec3) -> std::io::Result<()> {
    write_f32(writer, value.x)?;
    write_f32(writer, value.y)?;
    write_f32(writer, value.z)
}

fn read_u32<R: Read>(reader: &mut R) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f32<R: Read>(reader: &mut R) -> std::io::Result<f32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

fn read_vec3<R: Read>(reader: &mut R) -> std::io::Result<Vec3> {
    Ok(Vec3::new(
        read_f32(reader)?,
        read_f32(reader)?,
        read_f32(reader)?,
    ))
}
