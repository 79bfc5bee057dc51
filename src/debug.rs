//! Debug visualization of build intermediates.
//!
//! Purely observational: the routines here walk the buffers retained from the
//! last tile build and emit primitives into an injected [`DebugDraw`] sink,
//! which is never read back.

use glam::Vec3;

use crate::{
    field::{CompactHeightfield, Heightfield},
    kernel::AreaType,
    poly::{ContourSet, MESH_NULL_IDX, PolygonMesh},
};

/// Colors are packed `0xAARRGGBB`.
const COLOR_SPAN_FILL: u32 = 0xffff00ff;
const COLOR_SPAN_OUTLINE: u32 = 0xff00aaff;
const COLOR_CONTOUR_EVEN: u32 = 0xffff0000;
const COLOR_CONTOUR_ODD: u32 = 0xffff00ff;
const COLOR_POLY_FILL: u32 = 0xff00aaff;
const COLOR_POLY_EDGE: u32 = 0xff0000ff;

/// Upper bound on emitted compact-heightfield cells, to keep a single draw
/// call from flooding the sink on large tiles.
const MAX_COMPACT_CELLS: usize = 0xffff;

/// Sink for line/triangle/cube draw requests.
pub trait DebugDraw {
    /// Draws a line segment.
    fn line(&mut self, from: Vec3, to: Vec3, color: u32);
    /// Draws a filled triangle.
    fn triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, color: u32);
    /// Draws a wireframe axis-aligned box.
    fn cube(&mut self, min: Vec3, max: Vec3, color: u32);
    /// Draws a solid axis-aligned box.
    fn solid_cube(&mut self, min: Vec3, max: Vec3, color: u32);
}

/// Draws every solid span of a heightfield as a box.
pub fn draw_heightfield(field: &Heightfield, sink: &mut dyn DebugDraw) {
    let origin = field.aabb.min;
    for z in 0..field.height {
        for x in 0..field.width {
            let fx = origin.x + x as f32 * field.cell_size;
            let fz = origin.z + z as f32 * field.cell_size;
            for span in field.column(x, z) {
                let min = Vec3::new(fx, origin.y + span.min as f32 * field.cell_height, fz);
                let max = Vec3::new(
                    fx + field.cell_size,
                    origin.y + span.max as f32 * field.cell_height,
                    fz + field.cell_size,
                );
                sink.solid_cube(min, max, COLOR_SPAN_FILL);
                sink.cube(min, max, COLOR_SPAN_OUTLINE);
            }
        }
    }
}

/// Draws the floor of every open span of a compact heightfield.
pub fn draw_compact_heightfield(field: &CompactHeightfield, sink: &mut dyn DebugDraw) {
    let origin = field.aabb.min;
    let cs = field.cell_size;
    let ch = field.cell_height;
    let mut emitted = 0usize;
    for z in 0..field.height {
        for x in 0..field.width {
            let vx = origin.x + x as f32 * cs;
            let vz = origin.z + z as f32 * cs;
            for span in field.cell_spans(x, z) {
                let vy = origin.y + span.y as f32 * ch;
                sink.triangle(
                    Vec3::new(vx, vy, vz),
                    Vec3::new(vx + cs, vy, vz + cs),
                    Vec3::new(vx + cs, vy, vz),
                    COLOR_SPAN_FILL,
                );
                sink.triangle(
                    Vec3::new(vx, vy, vz),
                    Vec3::new(vx, vy, vz + cs),
                    Vec3::new(vx + cs, vy, vz + cs),
                    COLOR_SPAN_FILL,
                );
                emitted += 1;
                if emitted > MAX_COMPACT_CELLS {
                    return;
                }
            }
        }
    }
}

/// Draws every contour as a closed line loop, alternating colors so adjacent
/// regions are distinguishable.
pub fn draw_contours(contours: &ContourSet, sink: &mut dyn DebugDraw) {
    let origin = contours.origin;
    let cs = contours.cell_size;
    let ch = contours.cell_height;
    for (i, contour) in contours.contours.iter().enumerate() {
        if contour.vertices.len() < 2 {
            continue;
        }
        let color = if i % 2 == 0 {
            COLOR_CONTOUR_EVEN
        } else {
            COLOR_CONTOUR_ODD
        };
        let to_world = |v: glam::U16Vec3| {
            origin + Vec3::new(v.x as f32 * cs, v.y as f32 * ch, v.z as f32 * cs)
        };
        let first = to_world(contour.vertices[0]);
        let mut prev = first;
        for v in &contour.vertices[1..] {
            let cur = to_world(*v);
            sink.line(prev, cur, color);
            prev = cur;
        }
        sink.line(prev, first, color);
    }
}

/// Draws the polygon mesh as triangle fans with edge outlines, highlighting
/// walkable polygons.
pub fn draw_polygon_mesh(mesh: &PolygonMesh, sink: &mut dyn DebugDraw) {
    for i in 0..mesh.polygon_count() {
        let fill = if mesh.areas[i] == AreaType::WALKABLE {
            COLOR_POLY_FILL
        } else {
            COLOR_SPAN_FILL
        };
        let corners: Vec<Vec3> = mesh
            .polygon(i)
            .iter()
            .take_while(|idx| **idx != MESH_NULL_IDX)
            .map(|idx| mesh.vertex_position(*idx as usize))
            .collect();
        if corners.len() < 3 {
            continue;
        }
        for j in 2..corners.len() {
            sink.triangle(corners[0], corners[j - 1], corners[j], fill);
        }
        for j in 1..corners.len() {
            sink.line(corners[j - 1], corners[j], COLOR_POLY_EDGE);
        }
        sink.line(corners[corners.len() - 1], corners[0], COLOR_POLY_EDGE);
    }
}
