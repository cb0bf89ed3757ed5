//! Clipping of attachment triangles against clipping-attachment polygons.
//!
//! A clip polygon is triangulated by ear clipping, the triangles are merged into convex
//! pieces, and each rendered triangle is clipped against every piece.

use crate::{ClippingAttachment, Skeleton};

/// Ear-clipping triangulation and convex decomposition of simple polygons.
#[derive(Clone, Debug, Default)]
pub struct Triangulator;

impl Triangulator {
    /// Triangulates a simple polygon given as `x, y` pairs. Returns vertex indices, three per
    /// triangle.
    pub fn triangulate(&self, vertices: &[f32]) -> Vec<u16> {
        let mut vertex_count = vertices.len() / 2;
        if vertex_count < 3 {
            return Vec::new();
        }

        let mut indices: Vec<usize> = (0..vertex_count).collect();
        let mut concave: Vec<bool> = (0..vertex_count)
            .map(|i| is_concave(i, vertex_count, vertices, &indices))
            .collect();
        let mut triangles = Vec::with_capacity((vertex_count - 2) * 3);

        while vertex_count > 3 {
            // Find an ear tip: a convex vertex whose triangle holds no concave vertex.
            let mut previous = vertex_count - 1;
            let mut i = 0usize;
            let mut next = 1usize;
            loop {
                if !concave[i] && is_ear(vertices, &indices, &concave, previous, i, next) {
                    break;
                }
                if next == 0 {
                    while i > 0 && concave[i] {
                        i -= 1;
                    }
                    break;
                }
                previous = i;
                i = next;
                next = (next + 1) % vertex_count;
            }

            triangles.push(indices[(vertex_count + i - 1) % vertex_count] as u16);
            triangles.push(indices[i] as u16);
            triangles.push(indices[(i + 1) % vertex_count] as u16);
            indices.remove(i);
            concave.remove(i);
            vertex_count -= 1;

            let previous_index = (vertex_count + i - 1) % vertex_count;
            let next_index = if i == vertex_count { 0 } else { i };
            concave[previous_index] = is_concave(previous_index, vertex_count, vertices, &indices);
            concave[next_index] = is_concave(next_index, vertex_count, vertices, &indices);
        }

        if vertex_count == 3 {
            triangles.extend([indices[2] as u16, indices[0] as u16, indices[1] as u16]);
        }
        triangles
    }

    /// Merges triangles from [`Triangulator::triangulate`] into convex polygons. Triangle
    /// fans sharing a base vertex merge first, then leftover triangles join a fan they
    /// extend without breaking convexity.
    pub fn decompose(&self, vertices: &[f32], triangles: &[u16]) -> Vec<Vec<f32>> {
        let mut polygons: Vec<Vec<f32>> = Vec::new();
        let mut polygon_indices: Vec<Vec<usize>> = Vec::new();

        let mut polygon: Vec<f32> = Vec::new();
        let mut indices: Vec<usize> = Vec::new();
        let mut fan_base: Option<usize> = None;
        let mut last_winding = 0;

        for triangle in triangles.chunks_exact(3) {
            let [t1, t2, t3] = [0, 1, 2].map(|c| triangle[c] as usize * 2);
            let (x1, y1) = (vertices[t1], vertices[t1 + 1]);
            let (x2, y2) = (vertices[t2], vertices[t2 + 1]);
            let (x3, y3) = (vertices[t3], vertices[t3 + 1]);

            if fan_base == Some(t1) && polygon.len() >= 4 {
                let o = polygon.len() - 4;
                let winding1 = winding(
                    polygon[o],
                    polygon[o + 1],
                    polygon[o + 2],
                    polygon[o + 3],
                    x3,
                    y3,
                );
                let winding2 = winding(x3, y3, polygon[0], polygon[1], polygon[2], polygon[3]);
                if winding1 == last_winding && winding2 == last_winding {
                    polygon.extend([x3, y3]);
                    indices.push(t3);
                    continue;
                }
            }

            if !polygon.is_empty() {
                polygons.push(std::mem::take(&mut polygon));
                polygon_indices.push(std::mem::take(&mut indices));
            }
            polygon.extend([x1, y1, x2, y2, x3, y3]);
            indices.extend([t1, t2, t3]);
            last_winding = winding(x1, y1, x2, y2, x3, y3);
            fan_base = Some(t1);
        }
        if !polygon.is_empty() {
            polygons.push(polygon);
            polygon_indices.push(indices);
        }

        let n = polygons.len();
        for i in 0..n {
            let (Some(&first_index), Some(&last_index)) =
                (polygon_indices[i].first(), polygon_indices[i].last())
            else {
                continue;
            };
            let o = polygons[i].len() - 4;
            let [mut prev_prev_x, mut prev_prev_y, mut prev_x, mut prev_y] =
                [0, 1, 2, 3].map(|c| polygons[i][o + c]);
            let [first_x, first_y, second_x, second_y] = [0, 1, 2, 3].map(|c| polygons[i][c]);
            let polygon_winding =
                winding(prev_prev_x, prev_prev_y, prev_x, prev_y, first_x, first_y);

            let mut ii = 0usize;
            while ii < n {
                let other = &polygon_indices[ii];
                if ii == i
                    || other.len() != 3
                    || other[0] != first_index
                    || other[1] != last_index
                {
                    ii += 1;
                    continue;
                }
                let other_last_index = other[2];
                let other_len = polygons[ii].len();
                let x3 = polygons[ii][other_len - 2];
                let y3 = polygons[ii][other_len - 1];

                let winding1 = winding(prev_prev_x, prev_prev_y, prev_x, prev_y, x3, y3);
                let winding2 = winding(x3, y3, first_x, first_y, second_x, second_y);
                if winding1 == polygon_winding && winding2 == polygon_winding {
                    polygons[ii].clear();
                    polygon_indices[ii].clear();
                    polygons[i].extend([x3, y3]);
                    polygon_indices[i].push(other_last_index);
                    prev_prev_x = prev_x;
                    prev_prev_y = prev_y;
                    prev_x = x3;
                    prev_y = y3;
                    // Restart the scan after growing the fan.
                    ii = 0;
                }
                ii += 1;
            }
        }

        polygons.retain(|p| !p.is_empty());
        polygons
    }
}

fn is_ear(
    vertices: &[f32],
    indices: &[usize],
    concave: &[bool],
    previous: usize,
    i: usize,
    next: usize,
) -> bool {
    let vertex_count = indices.len();
    let point = |index: usize| {
        let v = indices[index] * 2;
        (vertices[v], vertices[v + 1])
    };
    let (p1x, p1y) = point(previous);
    let (p2x, p2y) = point(i);
    let (p3x, p3y) = point(next);

    let mut ii = (next + 1) % vertex_count;
    while ii != previous {
        if concave[ii] {
            let (vx, vy) = point(ii);
            if positive_area(p3x, p3y, p1x, p1y, vx, vy)
                && positive_area(p1x, p1y, p2x, p2y, vx, vy)
                && positive_area(p2x, p2y, p3x, p3y, vx, vy)
            {
                return false;
            }
        }
        ii = (ii + 1) % vertex_count;
    }
    true
}

fn positive_area(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> bool {
    p1x * (p3y - p2y) + p2x * (p1y - p3y) + p3x * (p2y - p1y) >= 0.0
}

fn is_concave(index: usize, vertex_count: usize, vertices: &[f32], indices: &[usize]) -> bool {
    let previous = indices[(vertex_count + index - 1) % vertex_count] * 2;
    let current = indices[index] * 2;
    let next = indices[(index + 1) % vertex_count] * 2;
    !positive_area(
        vertices[previous],
        vertices[previous + 1],
        vertices[current],
        vertices[current + 1],
        vertices[next],
        vertices[next + 1],
    )
}

fn winding(p1x: f32, p1y: f32, p2x: f32, p2y: f32, p3x: f32, p3y: f32) -> i32 {
    let px = p2x - p1x;
    let py = p2y - p1y;
    if p3x * py - p3y * px + px * p1y - p1x * py >= 0.0 {
        1
    } else {
        -1
    }
}

/// Reverses the vertex order of a counter-clockwise polygon.
pub fn make_clockwise(polygon: &mut [f32]) {
    let len = polygon.len();
    if len < 6 {
        return;
    }
    let mut area = polygon[len - 2] * polygon[1] - polygon[0] * polygon[len - 1];
    let mut i = 0usize;
    while i + 3 < len {
        area += polygon[i] * polygon[i + 3] - polygon[i + 2] * polygon[i + 1];
        i += 2;
    }
    if area < 0.0 {
        return;
    }

    let last_x = len - 2;
    let mut i = 0usize;
    while i < len / 2 {
        let other = last_x - i;
        polygon.swap(i, other);
        polygon.swap(i + 1, other + 1);
        i += 2;
    }
}

/// Result of clipping one triangle against one convex polygon.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ClipOutcome {
    /// The triangle lies entirely inside; use it unchanged.
    Inside,
    /// The triangle lies entirely outside; it contributes nothing.
    Outside,
    /// The clip output holds the clipped polygon.
    Clipped,
}

/// Clips a triangle against a convex, clockwise polygon whose first vertex is repeated at
/// the end. On [`ClipOutcome::Clipped`], `output` holds the clipped polygon as `x, y`
/// pairs; otherwise it is empty.
pub fn clip_triangle(
    [x1, y1, x2, y2, x3, y3]: [f32; 6],
    clipping_area: &[f32],
    output: &mut Vec<f32>,
    scratch: &mut Vec<f32>,
) -> ClipOutcome {
    output.clear();
    if clipping_area.len() < 6 {
        return ClipOutcome::Inside;
    }
    let mut clipped = false;
    let mut input = std::mem::take(scratch);
    let mut out = std::mem::take(output);
    input.clear();
    input.extend_from_slice(&[x1, y1, x2, y2, x3, y3, x1, y1]);

    let last = clipping_area.len() - 4;
    let mut i = 0usize;
    let outcome = loop {
        let edge_x = clipping_area[i];
        let edge_y = clipping_area[i + 1];
        let ex = edge_x - clipping_area[i + 2];
        let ey = edge_y - clipping_area[i + 3];

        out.clear();
        for segment in input.windows(4).step_by(2) {
            let (input_x, input_y) = (segment[0], segment[1]);
            let (input_x2, input_y2) = (segment[2], segment[3]);
            let s2 = ey * (edge_x - input_x2) > ex * (edge_y - input_y2);
            let s1 = ey * (edge_x - input_x) - ex * (edge_y - input_y);
            if s1 > 0.0 {
                if s2 {
                    // Both inside.
                    out.extend([input_x2, input_y2]);
                    continue;
                }
                let ix = input_x2 - input_x;
                let iy = input_y2 - input_y;
                let t = s1 / (ix * ey - iy * ex);
                if (0.0..=1.0).contains(&t) {
                    out.extend([input_x + ix * t, input_y + iy * t]);
                } else {
                    out.extend([input_x2, input_y2]);
                    continue;
                }
            } else if s2 {
                let ix = input_x2 - input_x;
                let iy = input_y2 - input_y;
                let t = s1 / (ix * ey - iy * ex);
                if (0.0..=1.0).contains(&t) {
                    out.extend([input_x + ix * t, input_y + iy * t, input_x2, input_y2]);
                } else {
                    out.extend([input_x2, input_y2]);
                    continue;
                }
            }
            clipped = true;
        }

        if out.is_empty() {
            break ClipOutcome::Outside;
        }
        out.extend([out[0], out[1]]);
        if i == last {
            break if clipped {
                ClipOutcome::Clipped
            } else {
                ClipOutcome::Inside
            };
        }
        std::mem::swap(&mut input, &mut out);
        i += 2;
    };

    if outcome == ClipOutcome::Clipped {
        out.truncate(out.len() - 2);
    } else {
        out.clear();
    }
    *output = out;
    *scratch = input;
    outcome
}

/// Output layout of a batch clip.
#[derive(Copy, Clone, Debug)]
enum Layout {
    Positions,
    Unpacked,
    Render {
        light: [f32; 4],
        dark: Option<[f32; 4]>,
    },
}

/// Clips attachment triangles while a clipping attachment is active in draw order.
///
/// Start clipping with [`SkeletonClipper::clip_start`] when the clipping attachment's slot
/// is drawn, pass every following slot to [`SkeletonClipper::clip_end_with_slot`] after it
/// is drawn, and call [`SkeletonClipper::clip_end`] once the draw order is done. Clipped
/// output lands in the public buffers, which are reused between calls.
#[derive(Clone, Debug, Default)]
pub struct SkeletonClipper {
    triangulator: Triangulator,
    end_slot: Option<usize>,
    clipping_polygon: Vec<f32>,
    clipping_polygons: Vec<Vec<f32>>,
    clip_output: Vec<f32>,
    scratch: Vec<f32>,
    pub clipped_vertices: Vec<f32>,
    pub clipped_uvs: Vec<f32>,
    pub clipped_triangles: Vec<u16>,
}

impl SkeletonClipper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts clipping with the world polygon of `clip` attached to `slot`. Returns the
    /// number of convex pieces, or 0 when already clipping.
    pub fn clip_start(
        &mut self,
        skeleton: &Skeleton,
        slot: usize,
        clip: &ClippingAttachment,
    ) -> usize {
        if self.is_clipping() {
            return 0;
        }
        let mut polygon = std::mem::take(&mut self.clipping_polygon);
        polygon.clear();
        let n = clip.vertex.world_vertices_length;
        skeleton.compute_world_vertices(slot, &clip.vertex, 0, n, &mut polygon, 0, 2);
        polygon.truncate(n);
        let count = self.clip_start_polygon(&polygon, clip.end_slot);
        self.clipping_polygon = polygon;
        count
    }

    /// Starts clipping with a world-space polygon until `end_slot` is passed to
    /// [`SkeletonClipper::clip_end_with_slot`]. Returns the number of convex pieces, or 0
    /// when already clipping. A polygon with fewer than three vertices has no pieces, so
    /// everything drawn before the end slot is clipped away.
    pub fn clip_start_polygon(&mut self, polygon: &[f32], end_slot: usize) -> usize {
        if self.is_clipping() {
            return 0;
        }
        self.end_slot = Some(end_slot);
        self.clipping_polygons.clear();
        if polygon.len() < 6 {
            log::trace!("clip start: degenerate polygon with {} floats", polygon.len());
            return 0;
        }
        let mut polygon = polygon[..polygon.len() & !1].to_vec();
        make_clockwise(&mut polygon);
        let triangles = self.triangulator.triangulate(&polygon);
        let mut pieces = self.triangulator.decompose(&polygon, &triangles);
        for piece in &mut pieces {
            make_clockwise(piece);
            piece.extend([piece[0], piece[1]]);
        }
        log::trace!("clip start: {} convex pieces", pieces.len());
        self.clipping_polygons = pieces;
        self.clipping_polygons.len()
    }

    /// Ends clipping if `slot` is the active clipping attachment's end slot.
    pub fn clip_end_with_slot(&mut self, slot: usize) {
        if self.end_slot == Some(slot) {
            self.clip_end();
        }
    }

    pub fn clip_end(&mut self) {
        if self.end_slot.take().is_none() {
            return;
        }
        self.clipping_polygons.clear();
        self.clipping_polygon.clear();
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
    }

    pub fn is_clipping(&self) -> bool {
        self.end_slot.is_some()
    }

    /// Convex pieces of the active clip polygon, clockwise, first vertex repeated.
    pub fn clipping_polygons(&self) -> &[Vec<f32>] {
        &self.clipping_polygons
    }

    /// Clips positions only. `vertices` holds `x, y` pairs indexed by `triangles`. Returns
    /// whether any triangle was clipped or dropped.
    pub fn clip_triangles(&mut self, vertices: &[f32], triangles: &[u16]) -> bool {
        self.clip(vertices, triangles, &[], Layout::Positions)
    }

    /// Clips into interleaved render vertices `x, y, r, g, b, a, u, v`, followed by the dark
    /// color `r, g, b, a` when `dark` is given.
    pub fn clip_triangles_render(
        &mut self,
        vertices: &[f32],
        triangles: &[u16],
        uvs: &[f32],
        light: [f32; 4],
        dark: Option<[f32; 4]>,
    ) -> bool {
        self.clip(vertices, triangles, uvs, Layout::Render { light, dark })
    }

    /// Clips into separate position and UV buffers.
    pub fn clip_triangles_unpacked(
        &mut self,
        vertices: &[f32],
        triangles: &[u16],
        uvs: &[f32],
    ) -> bool {
        self.clip(vertices, triangles, uvs, Layout::Unpacked)
    }

    fn clip(&mut self, vertices: &[f32], triangles: &[u16], uvs: &[f32], layout: Layout) -> bool {
        self.clipped_vertices.clear();
        self.clipped_uvs.clear();
        self.clipped_triangles.clear();
        if !self.is_clipping() {
            return false;
        }

        let read = |buffer: &[f32], index: u16| {
            let offset = index as usize * 2;
            [
                buffer.get(offset).copied().unwrap_or(0.0),
                buffer.get(offset + 1).copied().unwrap_or(0.0),
            ]
        };
        let mut any_clipped = false;
        let mut index: u16 = 0;
        for triangle in triangles.chunks_exact(3) {
            let [p1, p2, p3] = [0, 1, 2].map(|c| read(vertices, triangle[c]));
            let uv = [0, 1, 2].map(|c| read(uvs, triangle[c]));
            let [[x1, y1], [x2, y2], [x3, y3]] = [p1, p2, p3];

            for piece in &self.clipping_polygons {
                let outcome = clip_triangle(
                    [x1, y1, x2, y2, x3, y3],
                    piece,
                    &mut self.clip_output,
                    &mut self.scratch,
                );
                match outcome {
                    ClipOutcome::Outside => {
                        any_clipped = true;
                    }
                    ClipOutcome::Clipped => {
                        any_clipped = true;
                        // Barycentric basis of the source triangle for attribute lookup.
                        let d0 = y2 - y3;
                        let d1 = x3 - x2;
                        let d2 = x1 - x3;
                        let d4 = y3 - y1;
                        let d = 1.0 / (d0 * d2 + d1 * (y1 - y3));
                        let count = self.clip_output.len() / 2;
                        for xy in self.clip_output.chunks_exact(2) {
                            let (x, y) = (xy[0], xy[1]);
                            let c0 = x - x3;
                            let c1 = y - y3;
                            let a = (d0 * c0 + d1 * c1) * d;
                            let b = (d4 * c0 + d2 * c1) * d;
                            let c = 1.0 - a - b;
                            let u = uv[0][0] * a + uv[1][0] * b + uv[2][0] * c;
                            let v = uv[0][1] * a + uv[1][1] * b + uv[2][1] * c;
                            push_vertex(
                                &mut self.clipped_vertices,
                                &mut self.clipped_uvs,
                                layout,
                                [x, y],
                                [u, v],
                            );
                        }
                        for ii in 1..count.saturating_sub(1) {
                            let ii = ii as u16;
                            self.clipped_triangles.extend([
                                index,
                                index.wrapping_add(ii),
                                index.wrapping_add(ii + 1),
                            ]);
                        }
                        index = index.wrapping_add(count as u16);
                    }
                    ClipOutcome::Inside => {
                        for (xy, uv) in [p1, p2, p3].into_iter().zip(uv) {
                            push_vertex(
                                &mut self.clipped_vertices,
                                &mut self.clipped_uvs,
                                layout,
                                xy,
                                uv,
                            );
                        }
                        self.clipped_triangles.extend([
                            index,
                            index.wrapping_add(1),
                            index.wrapping_add(2),
                        ]);
                        index = index.wrapping_add(3);
                        break;
                    }
                }
            }
        }
        any_clipped
    }
}

fn push_vertex(
    vertices: &mut Vec<f32>,
    uvs: &mut Vec<f32>,
    layout: Layout,
    [x, y]: [f32; 2],
    [u, v]: [f32; 2],
) {
    match layout {
        Layout::Positions => vertices.extend([x, y]),
        Layout::Unpacked => {
            vertices.extend([x, y]);
            uvs.extend([u, v]);
        }
        Layout::Render { light, dark } => {
            vertices.extend([x, y]);
            vertices.extend(light);
            vertices.extend([u, v]);
            if let Some(dark) = dark {
                vertices.extend(dark);
            }
        }
    }
}
