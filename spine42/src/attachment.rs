//! Attachment variants and the loader collaborator that binds them to texture regions.

use crate::{Atlas, Error};

/// Placement of an image inside a texture page.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRegion {
    /// Renderer-defined page handle; for atlas-backed regions, the page index.
    pub page: usize,
    pub page_width: f32,
    pub page_height: f32,
    pub u: f32,
    pub v: f32,
    pub u2: f32,
    pub v2: f32,
    pub degrees: i32,
    pub offset_x: f32,
    pub offset_y: f32,
    /// Packed size, before rotation on the page.
    pub width: f32,
    pub height: f32,
    /// Size before whitespace stripping.
    pub original_width: f32,
    pub original_height: f32,
}

/// Texture data a loader binds to a region or mesh attachment.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionBinding {
    /// Region used when the attachment has no sequence.
    pub region: Option<TextureRegion>,
    /// One region per frame when the attachment has a sequence.
    pub sequence_regions: Vec<TextureRegion>,
}

/// Resolves attachment paths to texture regions while a skeleton is decoded.
///
/// Region and mesh loaders return `Ok(None)` to drop the attachment from its skin, the
/// other kinds return `Ok(false)`. Any error aborts the load unless it is a
/// [`Error::MissingRegion`] and the decoder was configured to skip those.
pub trait AttachmentLoader {
    fn new_region_attachment(
        &mut self,
        skin: &str,
        name: &str,
        path: &str,
        sequence: Option<&Sequence>,
    ) -> Result<Option<RegionBinding>, Error>;

    fn new_mesh_attachment(
        &mut self,
        skin: &str,
        name: &str,
        path: &str,
        sequence: Option<&Sequence>,
    ) -> Result<Option<RegionBinding>, Error>;

    fn new_bounding_box_attachment(&mut self, _skin: &str, _name: &str) -> Result<bool, Error> {
        Ok(true)
    }

    fn new_path_attachment(&mut self, _skin: &str, _name: &str) -> Result<bool, Error> {
        Ok(true)
    }

    fn new_point_attachment(&mut self, _skin: &str, _name: &str) -> Result<bool, Error> {
        Ok(true)
    }

    fn new_clipping_attachment(&mut self, _skin: &str, _name: &str) -> Result<bool, Error> {
        Ok(true)
    }
}

/// Accepts every attachment without texture data. Geometry-only consumers (physics,
/// bounds, clipping) need nothing more.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullAttachmentLoader;

impl AttachmentLoader for NullAttachmentLoader {
    fn new_region_attachment(
        &mut self,
        _skin: &str,
        _name: &str,
        _path: &str,
        _sequence: Option<&Sequence>,
    ) -> Result<Option<RegionBinding>, Error> {
        Ok(Some(RegionBinding::default()))
    }

    fn new_mesh_attachment(
        &mut self,
        _skin: &str,
        _name: &str,
        _path: &str,
        _sequence: Option<&Sequence>,
    ) -> Result<Option<RegionBinding>, Error> {
        Ok(Some(RegionBinding::default()))
    }
}

/// Looks regions up by path in a parsed [`Atlas`].
#[derive(Copy, Clone, Debug)]
pub struct AtlasAttachmentLoader<'a> {
    atlas: &'a Atlas,
}

impl<'a> AtlasAttachmentLoader<'a> {
    pub fn new(atlas: &'a Atlas) -> Self {
        Self { atlas }
    }

    fn find(&self, path: &str, name: &str) -> Result<TextureRegion, Error> {
        self.atlas
            .texture_region(path)
            .ok_or_else(|| Error::MissingRegion {
                path: path.to_string(),
                attachment: name.to_string(),
            })
    }

    fn bind(
        &self,
        name: &str,
        path: &str,
        sequence: Option<&Sequence>,
    ) -> Result<RegionBinding, Error> {
        match sequence {
            Some(sequence) => {
                let sequence_regions = (0..sequence.count)
                    .map(|i| self.find(&sequence.path(path, i), name))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(RegionBinding {
                    region: None,
                    sequence_regions,
                })
            }
            None => Ok(RegionBinding {
                region: Some(self.find(path, name)?),
                sequence_regions: Vec::new(),
            }),
        }
    }
}

impl AttachmentLoader for AtlasAttachmentLoader<'_> {
    fn new_region_attachment(
        &mut self,
        _skin: &str,
        name: &str,
        path: &str,
        sequence: Option<&Sequence>,
    ) -> Result<Option<RegionBinding>, Error> {
        self.bind(name, path, sequence).map(Some)
    }

    fn new_mesh_attachment(
        &mut self,
        _skin: &str,
        name: &str,
        path: &str,
        sequence: Option<&Sequence>,
    ) -> Result<Option<RegionBinding>, Error> {
        self.bind(name, path, sequence).map(Some)
    }
}

/// Flip-book frames for a region or mesh attachment.
#[derive(Clone, Debug, PartialEq)]
pub struct Sequence {
    pub count: usize,
    pub start: i32,
    pub digits: usize,
    /// Frame shown in the setup pose.
    pub setup_index: i32,
    pub regions: Vec<TextureRegion>,
}

impl Sequence {
    /// Texture path of frame `index`: the base path followed by the zero-padded frame number.
    pub fn path(&self, base_path: &str, index: usize) -> String {
        let frame = i64::from(self.start) + index as i64;
        format!("{base_path}{frame:0>width$}", width = self.digits)
    }

    /// Region for a slot's sequence index, where `-1` selects the setup frame.
    pub fn region(&self, sequence_index: i32) -> Option<&TextureRegion> {
        let index = if sequence_index == -1 {
            self.setup_index
        } else {
            sequence_index
        };
        let index = usize::try_from(index).unwrap_or(0);
        self.regions
            .get(index.min(self.regions.len().saturating_sub(1)))
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VertexWeight {
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub weight: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MeshVertices {
    Unweighted(Vec<[f32; 2]>),
    /// Per vertex, the bones that influence it.
    Weighted(Vec<Vec<VertexWeight>>),
}

impl MeshVertices {
    pub fn vertex_count(&self) -> usize {
        match self {
            Self::Unweighted(v) => v.len(),
            Self::Weighted(v) => v.len(),
        }
    }

    pub fn is_weighted(&self) -> bool {
        matches!(self, Self::Weighted(_))
    }

    /// Length of a deform array: vertex positions when unweighted, one offset pair per
    /// weight when weighted.
    pub fn deform_len(&self) -> usize {
        match self {
            Self::Unweighted(v) => v.len() * 2,
            Self::Weighted(v) => v.iter().map(Vec::len).sum::<usize>() * 2,
        }
    }

    pub fn unweighted_flat(&self) -> Option<&[f32]> {
        match self {
            Self::Unweighted(v) => Some(v.as_flattened()),
            Self::Weighted(_) => None,
        }
    }
}

/// Vertex storage shared by meshes, bounding boxes, paths and clipping polygons.
#[derive(Clone, Debug, PartialEq)]
pub struct VertexData {
    pub id: u32,
    /// Id whose deform and sequence timelines drive this attachment.
    pub timeline_id: u32,
    pub vertices: MeshVertices,
    pub world_vertices_length: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct RegionAttachment {
    pub id: u32,
    pub name: String,
    pub path: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub width: f32,
    pub height: f32,
    pub color: [f32; 4],
    pub region: Option<TextureRegion>,
    pub sequence: Option<Sequence>,
}

impl RegionAttachment {
    /// Region for the given slot sequence index.
    pub fn texture_region(&self, sequence_index: i32) -> Option<&TextureRegion> {
        match &self.sequence {
            Some(sequence) => sequence.region(sequence_index),
            None => self.region.as_ref(),
        }
    }

    /// Corner offsets in bone space: bottom-left, upper-left, upper-right, bottom-right.
    pub fn local_vertices(&self, region: Option<&TextureRegion>) -> [f32; 8] {
        let (offset_x, offset_y, region_w, region_h, original_w, original_h) = match region {
            Some(r) => (
                r.offset_x,
                r.offset_y,
                r.width,
                r.height,
                r.original_width,
                r.original_height,
            ),
            None => (0.0, 0.0, self.width, self.height, self.width, self.height),
        };
        let region_scale_x = self.width / original_w * self.scale_x;
        let region_scale_y = self.height / original_h * self.scale_y;
        let local_x = -self.width / 2.0 * self.scale_x + offset_x * region_scale_x;
        let local_y = -self.height / 2.0 * self.scale_y + offset_y * region_scale_y;
        let local_x2 = local_x + region_w * region_scale_x;
        let local_y2 = local_y + region_h * region_scale_y;

        let (sin, cos) = self.rotation.to_radians().sin_cos();
        let x_cos = local_x * cos + self.x;
        let x_sin = local_x * sin;
        let y_cos = local_y * cos + self.y;
        let y_sin = local_y * sin;
        let x2_cos = local_x2 * cos + self.x;
        let x2_sin = local_x2 * sin;
        let y2_cos = local_y2 * cos + self.y;
        let y2_sin = local_y2 * sin;

        [
            x_cos - y_sin,
            y_cos + x_sin,
            x_cos - y2_sin,
            y2_cos + x_sin,
            x2_cos - y2_sin,
            y2_cos + x2_sin,
            x2_cos - y_sin,
            y_cos + x2_sin,
        ]
    }

    /// Texture coordinates matching [`Self::local_vertices`].
    pub fn uvs(&self, region: Option<&TextureRegion>) -> [f32; 8] {
        let Some(r) = region else {
            return [0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 1.0];
        };
        if r.degrees == 90 {
            [r.u2, r.v2, r.u, r.v2, r.u, r.v, r.u2, r.v]
        } else {
            [r.u, r.v2, r.u, r.v, r.u2, r.v, r.u2, r.v2]
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MeshAttachment {
    pub name: String,
    pub path: String,
    pub vertex: VertexData,
    pub color: [f32; 4],
    /// Normalized `0..1` coordinates within the region.
    pub region_uvs: Vec<f32>,
    pub triangles: Vec<u16>,
    /// Number of hull vertex coordinates (twice the hull vertex count).
    pub hull_length: usize,
    pub edges: Vec<u16>,
    pub width: f32,
    pub height: f32,
    pub region: Option<TextureRegion>,
    pub sequence: Option<Sequence>,
    /// Parent mesh name for linked meshes, kept after resolution.
    pub parent_mesh: Option<String>,
}

impl MeshAttachment {
    pub fn texture_region(&self, sequence_index: i32) -> Option<&TextureRegion> {
        match &self.sequence {
            Some(sequence) => sequence.region(sequence_index),
            None => self.region.as_ref(),
        }
    }

    /// Maps the region-relative UVs into page space, accounting for whitespace stripping
    /// and packing rotation.
    pub fn uvs(&self, region: Option<&TextureRegion>) -> Vec<f32> {
        let region_uvs = &self.region_uvs;
        let mut uvs = vec![0.0; region_uvs.len()];
        let Some(r) = region else {
            uvs.copy_from_slice(region_uvs);
            return uvs;
        };
        let (pw, ph) = (r.page_width.max(1.0), r.page_height.max(1.0));
        let mut u = r.u;
        let mut v = r.v;
        match r.degrees {
            90 => {
                u -= (r.original_height - r.offset_y - r.height) / pw;
                v -= (r.original_width - r.offset_x - r.width) / ph;
                let width = r.original_height / pw;
                let height = r.original_width / ph;
                for (out, src) in uvs.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                    out[0] = u + src[1] * width;
                    out[1] = v + (1.0 - src[0]) * height;
                }
            }
            180 => {
                u -= (r.original_width - r.offset_x - r.width) / pw;
                v -= r.offset_y / ph;
                let width = r.original_width / pw;
                let height = r.original_height / ph;
                for (out, src) in uvs.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                    out[0] = u + (1.0 - src[0]) * width;
                    out[1] = v + (1.0 - src[1]) * height;
                }
            }
            270 => {
                u -= r.offset_y / pw;
                v -= r.offset_x / ph;
                let width = r.original_height / pw;
                let height = r.original_width / ph;
                for (out, src) in uvs.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                    out[0] = u + (1.0 - src[1]) * width;
                    out[1] = v + src[0] * height;
                }
            }
            _ => {
                u -= r.offset_x / pw;
                v -= (r.original_height - r.offset_y - r.height) / ph;
                let width = r.original_width / pw;
                let height = r.original_height / ph;
                for (out, src) in uvs.chunks_exact_mut(2).zip(region_uvs.chunks_exact(2)) {
                    out[0] = u + src[0] * width;
                    out[1] = v + src[1] * height;
                }
            }
        }
        uvs
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BoundingBoxAttachment {
    pub name: String,
    pub vertex: VertexData,
    pub color: [f32; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub struct PathAttachment {
    pub name: String,
    pub vertex: VertexData,
    pub closed: bool,
    pub constant_speed: bool,
    /// Cumulative length at the end of each curve.
    pub lengths: Vec<f32>,
    pub color: [f32; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub struct PointAttachment {
    pub id: u32,
    pub name: String,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub color: [f32; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub struct ClippingAttachment {
    pub name: String,
    pub vertex: VertexData,
    /// Clipping stops after this slot is drawn.
    pub end_slot: usize,
    pub color: [f32; 4],
}

#[derive(Clone, Debug, PartialEq)]
pub enum Attachment {
    Region(RegionAttachment),
    Mesh(MeshAttachment),
    BoundingBox(BoundingBoxAttachment),
    Path(PathAttachment),
    Point(PointAttachment),
    Clipping(ClippingAttachment),
}

impl Attachment {
    pub fn name(&self) -> &str {
        match self {
            Self::Region(a) => &a.name,
            Self::Mesh(a) => &a.name,
            Self::BoundingBox(a) => &a.name,
            Self::Path(a) => &a.name,
            Self::Point(a) => &a.name,
            Self::Clipping(a) => &a.name,
        }
    }

    pub fn vertex_data(&self) -> Option<&VertexData> {
        match self {
            Self::Mesh(a) => Some(&a.vertex),
            Self::BoundingBox(a) => Some(&a.vertex),
            Self::Path(a) => Some(&a.vertex),
            Self::Clipping(a) => Some(&a.vertex),
            Self::Region(_) | Self::Point(_) => None,
        }
    }

    /// Load-unique identity of this attachment.
    pub fn id(&self) -> u32 {
        match self {
            Self::Region(a) => a.id,
            Self::Point(a) => a.id,
            Self::Mesh(a) => a.vertex.id,
            Self::BoundingBox(a) => a.vertex.id,
            Self::Path(a) => a.vertex.id,
            Self::Clipping(a) => a.vertex.id,
        }
    }

    /// Id that deform and sequence timelines are keyed by.
    pub fn timeline_id(&self) -> u32 {
        self.vertex_data().map_or_else(|| self.id(), |v| v.timeline_id)
    }

    pub fn sequence(&self) -> Option<&Sequence> {
        match self {
            Self::Region(a) => a.sequence.as_ref(),
            Self::Mesh(a) => a.sequence.as_ref(),
            _ => None,
        }
    }
}
