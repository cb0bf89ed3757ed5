//! Spine `.skel` (binary) loader for Spine 4.2 exports.
//!
//! The loader is IO-free: it operates on an in-memory byte slice.

use crate::{
    Animation, Attachment, AttachmentLoader, BezierCurve, BlendMode, BoneData, BonePairProperty,
    BoneProperty, BoundingBoxAttachment, ClippingAttachment, Curve, CurveFrames, DeformTimeline,
    Error, Event, EventData, IkConstraintData, IkKey, LoaderConfig, MeshAttachment, MeshVertices,
    NullAttachmentLoader, PathAttachment, PathConstraintData, PhysicsConstraintData,
    PhysicsProperty, PointAttachment, PositionMode, RegionAttachment, RotateMode, Sequence,
    SequenceKey, SequenceMode, SkeletonData, SkinData, SlotData, SpacingMode,
    Timeline, TransformConstraintData, TransformMode, VertexData, VertexWeight,
    detect_spine_version,
};
use byteorder::{BigEndian, ByteOrder};
use std::sync::Arc;

const CURVE_STEPPED: i8 = 1;
const CURVE_BEZIER: i8 = 2;

const ATTACHMENT_REGION: u8 = 0;
const ATTACHMENT_BOUNDING_BOX: u8 = 1;
const ATTACHMENT_MESH: u8 = 2;
const ATTACHMENT_LINKED_MESH: u8 = 3;
const ATTACHMENT_PATH: u8 = 4;
const ATTACHMENT_POINT: u8 = 5;
const ATTACHMENT_CLIPPING: u8 = 6;

const ATTACHMENT_DEFORM: u8 = 0;
const ATTACHMENT_SEQUENCE: u8 = 1;

const SLOT_ATTACHMENT: u8 = 0;
const SLOT_RGBA: u8 = 1;
const SLOT_RGB: u8 = 2;
const SLOT_RGBA2: u8 = 3;
const SLOT_RGB2: u8 = 4;
const SLOT_ALPHA: u8 = 5;

const BONE_ROTATE: u8 = 0;
const BONE_TRANSLATE: u8 = 1;
const BONE_TRANSLATEX: u8 = 2;
const BONE_TRANSLATEY: u8 = 3;
const BONE_SCALE: u8 = 4;
const BONE_SCALEX: u8 = 5;
const BONE_SCALEY: u8 = 6;
const BONE_SHEAR: u8 = 7;
const BONE_SHEARX: u8 = 8;
const BONE_SHEARY: u8 = 9;
const BONE_INHERIT: u8 = 10;

const PATH_POSITION: u8 = 0;
const PATH_SPACING: u8 = 1;
const PATH_MIX: u8 = 2;

const PHYSICS_INERTIA: u8 = 0;
const PHYSICS_STRENGTH: u8 = 1;
const PHYSICS_DAMPING: u8 = 2;
const PHYSICS_MASS: u8 = 4;
const PHYSICS_WIND: u8 = 5;
const PHYSICS_GRAVITY: u8 = 6;
const PHYSICS_MIX: u8 = 7;
const PHYSICS_RESET: u8 = 8;

/// Sequential big-endian reader with the asset's string table.
#[derive(Clone, Debug)]
pub(crate) struct BinaryInput<'a> {
    bytes: &'a [u8],
    cursor: usize,
    strings: Vec<String>,
}

impl<'a> BinaryInput<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self {
            bytes,
            cursor: 0,
            strings: Vec::new(),
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.cursor
    }

    fn remaining(&self) -> usize {
        self.bytes.len().saturating_sub(self.cursor)
    }

    /// Clamps a declared element count to what the remaining input could possibly hold.
    fn capacity(&self, count: usize) -> usize {
        count.min(self.remaining())
    }

    fn eof(&self, needed: usize) -> Error {
        Error::parse(format!(
            "unexpected EOF at offset {} (needed {needed} bytes, {} left)",
            self.cursor,
            self.remaining()
        ))
    }

    pub(crate) fn read_u8(&mut self) -> Result<u8, Error> {
        let b = *self.bytes.get(self.cursor).ok_or_else(|| self.eof(1))?;
        self.cursor += 1;
        Ok(b)
    }

    pub(crate) fn read_i8(&mut self) -> Result<i8, Error> {
        Ok(self.read_u8()? as i8)
    }

    pub(crate) fn read_bool(&mut self) -> Result<bool, Error> {
        Ok(self.read_u8()? != 0)
    }

    fn read_4(&mut self) -> Result<&'a [u8], Error> {
        if self.remaining() < 4 {
            return Err(self.eof(4));
        }
        let bytes = &self.bytes[self.cursor..self.cursor + 4];
        self.cursor += 4;
        Ok(bytes)
    }

    pub(crate) fn read_i32(&mut self) -> Result<i32, Error> {
        Ok(BigEndian::read_i32(self.read_4()?))
    }

    pub(crate) fn read_f32(&mut self) -> Result<f32, Error> {
        Ok(BigEndian::read_f32(self.read_4()?))
    }

    /// 1 to 5 byte varint, 7 bits per byte. Zig-zag decoded unless `optimize_positive`.
    pub(crate) fn read_varint(&mut self, optimize_positive: bool) -> Result<i32, Error> {
        let mut b = self.read_u8()?;
        let mut value: u32 = (b & 0x7F) as u32;
        if (b & 0x80) != 0 {
            b = self.read_u8()?;
            value |= ((b & 0x7F) as u32) << 7;
            if (b & 0x80) != 0 {
                b = self.read_u8()?;
                value |= ((b & 0x7F) as u32) << 14;
                if (b & 0x80) != 0 {
                    b = self.read_u8()?;
                    value |= ((b & 0x7F) as u32) << 21;
                    if (b & 0x80) != 0 {
                        b = self.read_u8()?;
                        value |= ((b & 0x7F) as u32) << 28;
                    }
                }
            }
        }

        if optimize_positive {
            Ok(value as i32)
        } else {
            Ok((value >> 1) as i32 ^ -((value & 1) as i32))
        }
    }

    /// Non-negative varint used as an element count.
    fn read_count(&mut self, what: &str) -> Result<usize, Error> {
        let offset = self.cursor;
        let value = self.read_varint(true)?;
        usize::try_from(value)
            .map_err(|_| Error::parse(format!("negative {what} {value} at offset {offset}")))
    }

    /// Varint index that must address one of `len` entries.
    fn read_index(
        &mut self,
        len: usize,
        kind: &'static str,
        context: impl FnOnce() -> String,
    ) -> Result<usize, Error> {
        let value = self.read_varint(true)?;
        usize::try_from(value)
            .ok()
            .filter(|&index| index < len)
            .ok_or_else(|| Error::reference(kind, i64::from(value), len, context()))
    }

    /// Length-prefixed string: 0 is null, 1 is empty. The payload is modified UTF-8 decoded
    /// by each lead byte's top nibble into UTF-16 units.
    pub(crate) fn read_string(&mut self) -> Result<Option<String>, Error> {
        let length_offset = self.cursor;
        let byte_count = self.read_count("string length")?;
        match byte_count {
            0 => return Ok(None),
            1 => return Ok(Some(String::new())),
            _ => {}
        }
        let byte_count = byte_count - 1;
        if self.remaining() < byte_count {
            return Err(Error::parse(format!(
                "unexpected EOF while reading string (len={byte_len}) at offset {length_offset}",
                byte_len = byte_count
            )));
        }

        let mut units = Vec::with_capacity(byte_count);
        let mut i = 0;
        while i < byte_count {
            let b = self.read_u8()?;
            match b >> 4 {
                12 | 13 => {
                    let b2 = self.read_u8()?;
                    units.push((u16::from(b & 0x1f) << 6) | u16::from(b2 & 0x3f));
                    i += 2;
                }
                14 => {
                    let b2 = self.read_u8()?;
                    let b3 = self.read_u8()?;
                    units.push(
                        (u16::from(b & 0x0f) << 12)
                            | (u16::from(b2 & 0x3f) << 6)
                            | u16::from(b3 & 0x3f),
                    );
                    i += 3;
                }
                _ => {
                    units.push(u16::from(b));
                    i += 1;
                }
            }
        }
        Ok(Some(String::from_utf16_lossy(&units)))
    }

    fn read_required_string(&mut self, what: &'static str) -> Result<String, Error> {
        let offset = self.cursor;
        self.read_string()?
            .ok_or(Error::NullValue { what, offset })
    }

    /// Index into the string table where 0 is null.
    pub(crate) fn read_string_ref(&mut self) -> Result<Option<String>, Error> {
        let offset = self.cursor;
        let index = self.read_varint(true)?;
        if index == 0 {
            return Ok(None);
        }
        usize::try_from(index - 1)
            .ok()
            .and_then(|i| self.strings.get(i))
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                Error::parse(format!(
                    "invalid stringRef index {index} (len={}) at offset {offset}",
                    self.strings.len()
                ))
            })
    }

    fn read_required_string_ref(&mut self, what: &'static str) -> Result<String, Error> {
        let offset = self.cursor;
        self.read_string_ref()?
            .ok_or(Error::NullValue { what, offset })
    }

    fn read_color(&mut self) -> Result<[f32; 4], Error> {
        Ok(rgba8888(self.read_i32()?))
    }

    fn read_f32_array(&mut self, count: usize, scale: f32) -> Result<Vec<f32>, Error> {
        let mut out = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            out.push(self.read_f32()? * scale);
        }
        Ok(out)
    }

    /// Varint array narrowed to `u16`; values must be below `limit`.
    fn read_short_array(&mut self, count: usize, limit: usize, what: &str) -> Result<Vec<u16>, Error> {
        let mut out = Vec::with_capacity(self.capacity(count));
        for _ in 0..count {
            let offset = self.cursor;
            let value = self.read_varint(true)?;
            let index = u16::try_from(value)
                .ok()
                .filter(|&v| usize::from(v) < limit)
                .ok_or_else(|| {
                    Error::parse(format!(
                        "{what} value {value} out of range (limit={limit}) at offset {offset}"
                    ))
                })?;
            out.push(index);
        }
        Ok(out)
    }
}

fn rgba8888(value: i32) -> [f32; 4] {
    let v = value as u32;
    [
        ((v >> 24) & 0xff) as f32 / 255.0,
        ((v >> 16) & 0xff) as f32 / 255.0,
        ((v >> 8) & 0xff) as f32 / 255.0,
        (v & 0xff) as f32 / 255.0,
    ]
}

fn rgb888(value: i32) -> [f32; 3] {
    let v = value as u32;
    [
        ((v >> 16) & 0xff) as f32 / 255.0,
        ((v >> 8) & 0xff) as f32 / 255.0,
        (v & 0xff) as f32 / 255.0,
    ]
}

/// Hash as the editor prints it: high word then low word, each in signed hex.
fn skeleton_hash(low: i32, high: i32) -> Option<String> {
    fn hex(v: i32) -> String {
        if v < 0 {
            format!("-{:x}", v.unsigned_abs())
        } else {
            format!("{v:x}")
        }
    }
    if low == 0 && high == 0 {
        None
    } else {
        Some(format!("{}{}", hex(high), hex(low)))
    }
}

fn map_transform_mode(v: i32) -> TransformMode {
    TransformMode::from_binary(v).unwrap_or_else(|| {
        log::warn!("unknown transform mode {v}, using Normal");
        TransformMode::Normal
    })
}

fn map_blend(v: i32) -> BlendMode {
    BlendMode::from_binary(v).unwrap_or_else(|| {
        log::warn!("unknown blend mode {v}, using Normal");
        BlendMode::Normal
    })
}

fn read_float(input: &mut BinaryInput<'_>) -> Result<f32, Error> {
    input.read_f32()
}

fn read_color_channel(input: &mut BinaryInput<'_>) -> Result<f32, Error> {
    Ok(f32::from(input.read_u8()?) / 255.0)
}

fn read_bezier(
    input: &mut BinaryInput<'_>,
    time1: f32,
    value1: f32,
    time2: f32,
    value2: f32,
    scale: f32,
) -> Result<BezierCurve, Error> {
    let cx1 = input.read_f32()?;
    let cy1 = input.read_f32()? * scale;
    let cx2 = input.read_f32()?;
    let cy2 = input.read_f32()? * scale;
    Ok(BezierCurve::new(time1, value1, cx1, cy1, cx2, cy2, time2, value2))
}

/// Reads `frame_count` frames of `N` channels. Each frame after the first is followed by a
/// curve type byte describing the transition into it.
fn read_curve_frames<const N: usize>(
    input: &mut BinaryInput<'_>,
    frame_count: usize,
    scales: [f32; N],
    read_value: fn(&mut BinaryInput<'_>) -> Result<f32, Error>,
) -> Result<CurveFrames<N>, Error> {
    if frame_count == 0 {
        return Err(Error::parse(format!(
            "curve timeline without frames at offset {}",
            input.position()
        )));
    }
    let read_values = |input: &mut BinaryInput<'_>| -> Result<[f32; N], Error> {
        let mut values = [0.0; N];
        for (value, scale) in values.iter_mut().zip(scales) {
            *value = read_value(input)? * scale;
        }
        Ok(values)
    };

    let mut frames = CurveFrames::with_capacity(input.capacity(frame_count));
    let mut time = input.read_f32()?;
    let mut values = read_values(input)?;
    for frame in 0..frame_count {
        frames.push(time, values);
        if frame + 1 == frame_count {
            break;
        }
        let time2 = input.read_f32()?;
        let values2 = read_values(input)?;
        match input.read_i8()? {
            CURVE_STEPPED => frames.curves[frame] = Curve::Stepped,
            CURVE_BEZIER => {
                let mut beziers = Vec::with_capacity(N);
                for c in 0..N {
                    beziers.push(read_bezier(
                        input, time, values[c], time2, values2[c], scales[c],
                    )?);
                }
                let beziers = beziers
                    .try_into()
                    .map_err(|_| Error::parse("bezier channel count mismatch"))?;
                frames.curves[frame] = Curve::Bezier(beziers);
            }
            _ => {}
        }
        time = time2;
        values = values2;
    }
    Ok(frames)
}

fn read_sequence(input: &mut BinaryInput<'_>) -> Result<Sequence, Error> {
    Ok(Sequence {
        count: input.read_count("sequence count")?,
        start: input.read_varint(true)?,
        digits: input.read_count("sequence digits")?,
        setup_index: input.read_varint(true)?,
        regions: Vec::new(),
    })
}

fn read_vertices(
    input: &mut BinaryInput<'_>,
    weighted: bool,
    scale: f32,
    bone_count: usize,
    attachment: &str,
) -> Result<MeshVertices, Error> {
    let vertex_count = input.read_count("vertex count")?;

    if !weighted {
        let mut out = Vec::with_capacity(input.capacity(vertex_count));
        for _ in 0..vertex_count {
            let x = input.read_f32()? * scale;
            let y = input.read_f32()? * scale;
            out.push([x, y]);
        }
        return Ok(MeshVertices::Unweighted(out));
    }

    let mut weights_per_vertex = Vec::with_capacity(input.capacity(vertex_count));
    for _ in 0..vertex_count {
        let bones = input.read_count("vertex bone count")?;
        let mut weights = Vec::with_capacity(input.capacity(bones));
        for _ in 0..bones {
            let bone = input.read_index(bone_count, "bone", || {
                format!("weighted vertex of attachment '{attachment}'")
            })?;
            let x = input.read_f32()? * scale;
            let y = input.read_f32()? * scale;
            let weight = input.read_f32()?;
            weights.push(VertexWeight { bone, x, y, weight });
        }
        weights_per_vertex.push(weights);
    }
    Ok(MeshVertices::Weighted(weights_per_vertex))
}

fn read_indices(
    input: &mut BinaryInput<'_>,
    len: usize,
    kind: &'static str,
    owner: &str,
) -> Result<Vec<usize>, Error> {
    let count = input.read_count("index count")?;
    let mut out = Vec::with_capacity(input.capacity(count));
    for _ in 0..count {
        out.push(input.read_index(len, kind, || owner.to_string())?);
    }
    Ok(out)
}

#[derive(Clone, Debug)]
struct LinkedMesh {
    skin: usize,
    slot: usize,
    /// Key of the linked mesh in its skin.
    name: String,
    parent_skin: i32,
    parent: String,
    inherit_timelines: bool,
}

/// Decodes Spine 4.2 `.skel` data, resolving textures through an [`AttachmentLoader`].
#[derive(Debug)]
pub struct SkeletonBinary<L> {
    loader: L,
    config: LoaderConfig,
    skipped: Vec<Error>,
    linked_meshes: Vec<LinkedMesh>,
    attachment_ids: u32,
}

impl<L: AttachmentLoader> SkeletonBinary<L> {
    pub fn new(loader: L) -> Self {
        Self::with_config(loader, LoaderConfig::default())
    }

    pub fn with_config(loader: L, config: LoaderConfig) -> Self {
        Self {
            loader,
            config,
            skipped: Vec::new(),
            linked_meshes: Vec::new(),
            attachment_ids: 0,
        }
    }

    /// Scales every positional value (bone translation, lengths, vertices, path spacing...).
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.config.scale = scale;
        self
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn into_loader(self) -> L {
        self.loader
    }

    /// Attachments dropped by the last load because their region was missing. Only
    /// populated when [`LoaderConfig::skip_missing_regions`] is set.
    pub fn skipped_attachments(&self) -> &[Error] {
        &self.skipped
    }

    fn scale(&self) -> f32 {
        if self.config.scale.is_finite() {
            self.config.scale
        } else {
            1.0
        }
    }

    fn next_attachment_id(&mut self) -> u32 {
        let id = self.attachment_ids;
        self.attachment_ids += 1;
        id
    }

    /// Downgrades a missing region to a skipped attachment when configured to.
    fn resolve<T>(&mut self, result: Result<Option<T>, Error>) -> Result<Option<T>, Error> {
        match result {
            Err(err @ Error::MissingRegion { .. }) if self.config.skip_missing_regions => {
                log::warn!("skipping attachment: {err}");
                self.skipped.push(err);
                Ok(None)
            }
            other => other,
        }
    }

    pub fn read_skeleton_data(&mut self, bytes: &[u8]) -> Result<Arc<SkeletonData>, Error> {
        self.skipped.clear();
        self.linked_meshes.clear();
        self.attachment_ids = 0;
        let scale = self.scale();
        let mut input = BinaryInput::new(bytes);
        let mut data = SkeletonData::default();

        let low_hash = input.read_i32()?;
        let high_hash = input.read_i32()?;
        data.hash = skeleton_hash(low_hash, high_hash);

        data.version = input.read_string()?;
        match data.version.as_deref() {
            Some(v) if !v.is_empty() => {
                let version = detect_spine_version(v)?;
                if !version.is_supported() {
                    return Err(Error::UnsupportedVersion {
                        value: v.to_string(),
                    });
                }
            }
            _ => log::warn!("skeleton has no version string, assuming the 4.2 layout"),
        }

        data.x = input.read_f32()?;
        data.y = input.read_f32()?;
        data.width = input.read_f32()?;
        data.height = input.read_f32()?;
        data.reference_scale = input.read_f32()? * scale;

        let nonessential = input.read_bool()?;
        if nonessential {
            data.fps = input.read_f32()?;
            data.images_path = input.read_string()?;
            data.audio_path = input.read_string()?;
        }

        let string_count = input.read_count("string table size")?;
        let mut strings = Vec::with_capacity(input.capacity(string_count));
        for _ in 0..string_count {
            strings.push(input.read_required_string("string table entry")?);
        }
        input.strings = strings;
        log::trace!("string table: {} entries", input.strings.len());

        self.read_bones(&mut input, &mut data, nonessential, scale)?;
        self.read_slots(&mut input, &mut data, nonessential)?;
        self.read_constraints(&mut input, &mut data, scale)?;

        if let Some(skin) = self.read_skin(&mut input, &data, true, nonessential)? {
            data.default_skin = Some(data.skins.len());
            data.skins.push(skin);
        }
        let skin_count = input.read_count("skin count")?;
        for _ in 0..skin_count {
            if let Some(skin) = self.read_skin(&mut input, &data, false, nonessential)? {
                data.skins.push(skin);
            }
        }
        log::trace!("skins: {}", data.skins.len());

        self.link_meshes(&mut data)?;

        let event_count = input.read_count("event count")?;
        for _ in 0..event_count {
            let name = input.read_required_string("event name")?;
            let int_value = input.read_varint(false)?;
            let float_value = input.read_f32()?;
            let string_value = input.read_string()?;
            let audio_path = input.read_string()?;
            let (volume, balance) = if audio_path.is_some() {
                (input.read_f32()?, input.read_f32()?)
            } else {
                (1.0, 0.0)
            };
            data.events.push(EventData {
                name,
                int_value,
                float_value,
                string_value,
                audio_path,
                volume,
                balance,
            });
        }

        let animation_count = input.read_count("animation count")?;
        for _ in 0..animation_count {
            let name = input.read_required_string("animation name")?;
            let animation = self.read_animation(&mut input, name, &data)?;
            data.animations.push(animation);
        }

        log::debug!(
            "decoded skeleton {:?}: {} bones, {} slots, {} skins, {} animations",
            data.version,
            data.bones.len(),
            data.slots.len(),
            data.skins.len(),
            data.animations.len()
        );
        Ok(Arc::new(data))
    }

    fn read_bones(
        &mut self,
        input: &mut BinaryInput<'_>,
        data: &mut SkeletonData,
        nonessential: bool,
        scale: f32,
    ) -> Result<(), Error> {
        let count = input.read_count("bone count")?;
        data.bones.reserve(input.capacity(count));
        for i in 0..count {
            let name = input.read_required_string("bone name")?;
            // A parent always precedes its children.
            let parent = if i == 0 {
                None
            } else {
                Some(input.read_index(i, "bone", || format!("parent of bone '{name}'"))?)
            };
            let mut bone = BoneData::new(name, parent);
            bone.rotation = input.read_f32()?;
            bone.x = input.read_f32()? * scale;
            bone.y = input.read_f32()? * scale;
            bone.scale_x = input.read_f32()?;
            bone.scale_y = input.read_f32()?;
            bone.shear_x = input.read_f32()?;
            bone.shear_y = input.read_f32()?;
            bone.length = input.read_f32()? * scale;
            bone.transform_mode = map_transform_mode(i32::from(input.read_i8()?));
            bone.skin_required = input.read_bool()?;
            if nonessential {
                bone.color = input.read_color()?;
                bone.icon = input.read_string()?;
                bone.visible = input.read_bool()?;
            }
            data.bones.push(bone);
        }
        log::trace!("bones: {}", data.bones.len());
        Ok(())
    }

    fn read_slots(
        &mut self,
        input: &mut BinaryInput<'_>,
        data: &mut SkeletonData,
        nonessential: bool,
    ) -> Result<(), Error> {
        let count = input.read_count("slot count")?;
        data.slots.reserve(input.capacity(count));
        for _ in 0..count {
            let name = input.read_required_string("slot name")?;
            let bone = input.read_index(data.bones.len(), "bone", || format!("slot '{name}'"))?;
            let mut slot = SlotData::new(name, bone);
            slot.color = input.read_color()?;
            let dark = input.read_i32()?;
            slot.dark_color = (dark != -1).then(|| rgb888(dark));
            slot.attachment = input.read_string_ref()?;
            slot.blend = map_blend(input.read_varint(true)?);
            if nonessential {
                slot.visible = input.read_bool()?;
            }
            data.slots.push(slot);
        }
        log::trace!("slots: {}", data.slots.len());
        Ok(())
    }

    fn read_constraints(
        &mut self,
        input: &mut BinaryInput<'_>,
        data: &mut SkeletonData,
        scale: f32,
    ) -> Result<(), Error> {
        let bone_count = data.bones.len();

        let count = input.read_count("ik constraint count")?;
        for _ in 0..count {
            let name = input.read_required_string("ik constraint name")?;
            let order = input.read_varint(true)?;
            let bones = read_indices(input, bone_count, "bone", &format!("ik constraint '{name}'"))?;
            let target =
                input.read_index(bone_count, "bone", || format!("target of ik constraint '{name}'"))?;
            let flags = input.read_u8()?;
            let mix = if flags & 32 != 0 {
                if flags & 64 != 0 { input.read_f32()? } else { 1.0 }
            } else {
                0.0
            };
            let softness = if flags & 128 != 0 {
                input.read_f32()? * scale
            } else {
                0.0
            };
            data.ik_constraints.push(IkConstraintData {
                name,
                order,
                skin_required: flags & 1 != 0,
                bones,
                target,
                bend_direction: if flags & 2 != 0 { 1 } else { -1 },
                compress: flags & 4 != 0,
                stretch: flags & 8 != 0,
                uniform: flags & 16 != 0,
                mix,
                softness,
            });
        }

        let count = input.read_count("transform constraint count")?;
        for _ in 0..count {
            let name = input.read_required_string("transform constraint name")?;
            let order = input.read_varint(true)?;
            let bones = read_indices(
                input,
                bone_count,
                "bone",
                &format!("transform constraint '{name}'"),
            )?;
            let target = input.read_index(bone_count, "bone", || {
                format!("target of transform constraint '{name}'")
            })?;
            let mut c = TransformConstraintData {
                name,
                order,
                bones,
                target,
                ..TransformConstraintData::default()
            };
            let flags = input.read_u8()?;
            c.skin_required = flags & 1 != 0;
            c.local = flags & 2 != 0;
            c.relative = flags & 4 != 0;
            if flags & 8 != 0 {
                c.offset_rotation = input.read_f32()?;
            }
            if flags & 16 != 0 {
                c.offset_x = input.read_f32()? * scale;
            }
            if flags & 32 != 0 {
                c.offset_y = input.read_f32()? * scale;
            }
            if flags & 64 != 0 {
                c.offset_scale_x = input.read_f32()?;
            }
            if flags & 128 != 0 {
                c.offset_scale_y = input.read_f32()?;
            }
            let flags = input.read_u8()?;
            if flags & 1 != 0 {
                c.offset_shear_y = input.read_f32()?;
            }
            if flags & 2 != 0 {
                c.mix_rotate = input.read_f32()?;
            }
            if flags & 4 != 0 {
                c.mix_x = input.read_f32()?;
            }
            if flags & 8 != 0 {
                c.mix_y = input.read_f32()?;
            }
            if flags & 16 != 0 {
                c.mix_scale_x = input.read_f32()?;
            }
            if flags & 32 != 0 {
                c.mix_scale_y = input.read_f32()?;
            }
            if flags & 64 != 0 {
                c.mix_shear_y = input.read_f32()?;
            }
            data.transform_constraints.push(c);
        }

        let count = input.read_count("path constraint count")?;
        for _ in 0..count {
            let name = input.read_required_string("path constraint name")?;
            let order = input.read_varint(true)?;
            let skin_required = input.read_bool()?;
            let bones = read_indices(input, bone_count, "bone", &format!("path constraint '{name}'"))?;
            let target = input.read_index(data.slots.len(), "slot", || {
                format!("target of path constraint '{name}'")
            })?;
            let flags = input.read_u8()?;
            let position_mode = if flags & 1 != 0 {
                PositionMode::Percent
            } else {
                PositionMode::Fixed
            };
            let spacing_mode = match (flags >> 1) & 3 {
                0 => SpacingMode::Length,
                1 => SpacingMode::Fixed,
                2 => SpacingMode::Percent,
                _ => SpacingMode::Proportional,
            };
            let rotate_mode = match (flags >> 3) & 3 {
                0 => RotateMode::Tangent,
                1 => RotateMode::Chain,
                2 => RotateMode::ChainScale,
                other => {
                    log::warn!("unknown path rotate mode {other}, using Tangent");
                    RotateMode::Tangent
                }
            };
            let offset_rotation = if flags & 128 != 0 {
                input.read_f32()?
            } else {
                0.0
            };
            let mut position = input.read_f32()?;
            if position_mode == PositionMode::Fixed {
                position *= scale;
            }
            let mut spacing = input.read_f32()?;
            if matches!(spacing_mode, SpacingMode::Length | SpacingMode::Fixed) {
                spacing *= scale;
            }
            data.path_constraints.push(PathConstraintData {
                name,
                order,
                skin_required,
                bones,
                target,
                position_mode,
                spacing_mode,
                rotate_mode,
                offset_rotation,
                position,
                spacing,
                mix_rotate: input.read_f32()?,
                mix_x: input.read_f32()?,
                mix_y: input.read_f32()?,
            });
        }

        let count = input.read_count("physics constraint count")?;
        for _ in 0..count {
            let name = input.read_required_string("physics constraint name")?;
            let order = input.read_varint(true)?;
            let bone = input.read_index(bone_count, "bone", || {
                format!("physics constraint '{name}'")
            })?;
            let mut c = PhysicsConstraintData::new(name, bone);
            c.order = order;
            let flags = input.read_u8()?;
            c.skin_required = flags & 1 != 0;
            if flags & 2 != 0 {
                c.x = input.read_f32()?;
            }
            if flags & 4 != 0 {
                c.y = input.read_f32()?;
            }
            if flags & 8 != 0 {
                c.rotate = input.read_f32()?;
            }
            if flags & 16 != 0 {
                c.scale_x = input.read_f32()?;
            }
            if flags & 32 != 0 {
                c.shear_x = input.read_f32()?;
            }
            let limit = if flags & 64 != 0 {
                input.read_f32()?
            } else {
                5000.0
            };
            c.limit = limit * scale;
            let fps = input.read_u8()?;
            if fps == 0 {
                return Err(Error::parse(format!(
                    "physics constraint '{}' has a zero step rate",
                    c.name
                )));
            }
            c.step = 1.0 / f32::from(fps);
            c.inertia = input.read_f32()?;
            c.strength = input.read_f32()?;
            c.damping = input.read_f32()?;
            c.mass_inverse = if flags & 128 != 0 {
                input.read_f32()?
            } else {
                1.0
            };
            c.wind = input.read_f32()?;
            c.gravity = input.read_f32()?;
            let flags = input.read_u8()?;
            c.inertia_global = flags & 1 != 0;
            c.strength_global = flags & 2 != 0;
            c.damping_global = flags & 4 != 0;
            c.mass_global = flags & 8 != 0;
            c.wind_global = flags & 16 != 0;
            c.gravity_global = flags & 32 != 0;
            c.mix_global = flags & 64 != 0;
            c.mix = if flags & 128 != 0 {
                input.read_f32()?
            } else {
                1.0
            };
            data.physics_constraints.push(c);
        }

        log::trace!(
            "constraints: {} ik, {} transform, {} path, {} physics",
            data.ik_constraints.len(),
            data.transform_constraints.len(),
            data.path_constraints.len(),
            data.physics_constraints.len()
        );
        Ok(())
    }

    /// Returns `None` for an absent default skin.
    fn read_skin(
        &mut self,
        input: &mut BinaryInput<'_>,
        data: &SkeletonData,
        default_skin: bool,
        nonessential: bool,
    ) -> Result<Option<SkinData>, Error> {
        let slot_count = data.slots.len();
        let (mut skin, entries) = if default_skin {
            let entries = input.read_count("default skin slot count")?;
            if entries == 0 {
                return Ok(None);
            }
            (SkinData::new("default", slot_count), entries)
        } else {
            let name = input.read_required_string("skin name")?;
            let mut skin = SkinData::new(name, slot_count);
            if nonessential {
                skin.color = input.read_color()?;
            }
            let owner = format!("skin '{}'", skin.name);
            skin.bones = read_indices(input, data.bones.len(), "bone", &owner)?;
            skin.ik_constraints =
                read_indices(input, data.ik_constraints.len(), "ik constraint", &owner)?;
            skin.transform_constraints = read_indices(
                input,
                data.transform_constraints.len(),
                "transform constraint",
                &owner,
            )?;
            skin.path_constraints =
                read_indices(input, data.path_constraints.len(), "path constraint", &owner)?;
            skin.physics_constraints = read_indices(
                input,
                data.physics_constraints.len(),
                "physics constraint",
                &owner,
            )?;
            let entries = input.read_count("skin slot count")?;
            (skin, entries)
        };

        let skin_index = data.skins.len();
        for _ in 0..entries {
            let slot = input.read_index(slot_count, "slot", || format!("skin '{}'", skin.name))?;
            let attachment_count = input.read_count("attachment count")?;
            for _ in 0..attachment_count {
                let name = input.read_required_string_ref("attachment name")?;
                let attachment = self.read_attachment(
                    input,
                    data,
                    &skin.name,
                    skin_index,
                    slot,
                    &name,
                    nonessential,
                )?;
                if let Some(attachment) = attachment {
                    skin.set_attachment(slot, name, attachment);
                }
            }
        }
        Ok(Some(skin))
    }

    #[allow(clippy::too_many_arguments)]
    fn read_attachment(
        &mut self,
        input: &mut BinaryInput<'_>,
        data: &SkeletonData,
        skin_name: &str,
        skin_index: usize,
        slot: usize,
        entry_name: &str,
        nonessential: bool,
    ) -> Result<Option<Attachment>, Error> {
        let scale = self.scale();
        let bone_count = data.bones.len();
        let flags = input.read_u8()?;
        let name = if flags & 8 != 0 {
            input.read_required_string_ref("attachment name")?
        } else {
            entry_name.to_string()
        };

        match flags & 0b111 {
            ATTACHMENT_REGION => {
                let path = if flags & 16 != 0 {
                    input.read_string_ref()?
                } else {
                    None
                };
                let color = if flags & 32 != 0 {
                    input.read_color()?
                } else {
                    [1.0; 4]
                };
                let sequence = if flags & 64 != 0 {
                    Some(read_sequence(input)?)
                } else {
                    None
                };
                let rotation = if flags & 128 != 0 {
                    input.read_f32()?
                } else {
                    0.0
                };
                let x = input.read_f32()?;
                let y = input.read_f32()?;
                let scale_x = input.read_f32()?;
                let scale_y = input.read_f32()?;
                let width = input.read_f32()?;
                let height = input.read_f32()?;
                let path = path.unwrap_or_else(|| name.clone());

                let result =
                    self.loader
                        .new_region_attachment(skin_name, &name, &path, sequence.as_ref());
                let Some(binding) = self.resolve(result)? else {
                    return Ok(None);
                };
                let sequence = sequence.map(|s| Sequence {
                    regions: binding.sequence_regions,
                    ..s
                });
                Ok(Some(Attachment::Region(RegionAttachment {
                    id: self.next_attachment_id(),
                    name,
                    path,
                    x: x * scale,
                    y: y * scale,
                    rotation,
                    scale_x,
                    scale_y,
                    width: width * scale,
                    height: height * scale,
                    color,
                    region: binding.region,
                    sequence,
                })))
            }
            ATTACHMENT_BOUNDING_BOX => {
                let vertices = read_vertices(input, flags & 16 != 0, scale, bone_count, &name)?;
                let color = if nonessential {
                    input.read_color()?
                } else {
                    [1.0; 4]
                };
                let result = self.loader.new_bounding_box_attachment(skin_name, &name);
                if self.resolve(result.map(|ok| ok.then_some(())))?.is_none() {
                    return Ok(None);
                }
                let vertex = self.vertex_data(vertices);
                Ok(Some(Attachment::BoundingBox(BoundingBoxAttachment {
                    name,
                    vertex,
                    color,
                })))
            }
            ATTACHMENT_MESH => {
                let path = if flags & 16 != 0 {
                    input.read_string_ref()?
                } else {
                    None
                };
                let color = if flags & 32 != 0 {
                    input.read_color()?
                } else {
                    [1.0; 4]
                };
                let sequence = if flags & 64 != 0 {
                    Some(read_sequence(input)?)
                } else {
                    None
                };
                let hull_length = input.read_count("hull length")?;
                let vertices = read_vertices(input, flags & 128 != 0, scale, bone_count, &name)?;
                let vertex_count = vertices.vertex_count();
                let region_uvs = input.read_f32_array(vertex_count << 1, 1.0)?;
                let triangle_count = (vertex_count << 1)
                    .checked_sub(hull_length + 2)
                    .ok_or_else(|| {
                        Error::parse(format!(
                            "mesh '{name}' hull length {hull_length} exceeds {vertex_count} vertices"
                        ))
                    })?
                    * 3;
                let triangles = input.read_short_array(triangle_count, vertex_count, "triangle")?;
                let (mut edges, mut width, mut height) = (Vec::new(), 0.0, 0.0);
                if nonessential {
                    let edge_count = input.read_count("edge count")?;
                    edges = input.read_short_array(edge_count, usize::from(u16::MAX) + 1, "edge")?;
                    width = input.read_f32()?;
                    height = input.read_f32()?;
                }
                let path = path.unwrap_or_else(|| name.clone());

                let result =
                    self.loader
                        .new_mesh_attachment(skin_name, &name, &path, sequence.as_ref());
                let Some(binding) = self.resolve(result)? else {
                    return Ok(None);
                };
                let sequence = sequence.map(|s| Sequence {
                    regions: binding.sequence_regions,
                    ..s
                });
                let vertex = self.vertex_data(vertices);
                Ok(Some(Attachment::Mesh(MeshAttachment {
                    name,
                    path,
                    vertex,
                    color,
                    region_uvs,
                    triangles,
                    hull_length: hull_length << 1,
                    edges,
                    width: width * scale,
                    height: height * scale,
                    region: binding.region,
                    sequence,
                    parent_mesh: None,
                })))
            }
            ATTACHMENT_LINKED_MESH => {
                let path = if flags & 16 != 0 {
                    input.read_required_string_ref("linked mesh path")?
                } else {
                    name.clone()
                };
                let color = if flags & 32 != 0 {
                    input.read_color()?
                } else {
                    [1.0; 4]
                };
                let sequence = if flags & 64 != 0 {
                    Some(read_sequence(input)?)
                } else {
                    None
                };
                let inherit_timelines = flags & 128 != 0;
                let parent_skin = input.read_varint(true)?;
                let parent = input.read_required_string_ref("linked mesh parent")?;
                let (mut width, mut height) = (0.0, 0.0);
                if nonessential {
                    width = input.read_f32()?;
                    height = input.read_f32()?;
                }

                let result =
                    self.loader
                        .new_mesh_attachment(skin_name, &name, &path, sequence.as_ref());
                let Some(binding) = self.resolve(result)? else {
                    return Ok(None);
                };
                let sequence = sequence.map(|s| Sequence {
                    regions: binding.sequence_regions,
                    ..s
                });
                self.linked_meshes.push(LinkedMesh {
                    skin: skin_index,
                    slot,
                    name: entry_name.to_string(),
                    parent_skin,
                    parent: parent.clone(),
                    inherit_timelines,
                });
                let vertex = self.vertex_data(MeshVertices::Unweighted(Vec::new()));
                Ok(Some(Attachment::Mesh(MeshAttachment {
                    name,
                    path,
                    vertex,
                    color,
                    region_uvs: Vec::new(),
                    triangles: Vec::new(),
                    hull_length: 0,
                    edges: Vec::new(),
                    width: width * scale,
                    height: height * scale,
                    region: binding.region,
                    sequence,
                    parent_mesh: Some(parent),
                })))
            }
            ATTACHMENT_PATH => {
                let closed = flags & 16 != 0;
                let constant_speed = flags & 32 != 0;
                let vertices = read_vertices(input, flags & 64 != 0, scale, bone_count, &name)?;
                let lengths = input.read_f32_array(vertices.vertex_count() / 3, scale)?;
                let color = if nonessential {
                    input.read_color()?
                } else {
                    [1.0; 4]
                };
                let result = self.loader.new_path_attachment(skin_name, &name);
                if self.resolve(result.map(|ok| ok.then_some(())))?.is_none() {
                    return Ok(None);
                }
                let vertex = self.vertex_data(vertices);
                Ok(Some(Attachment::Path(PathAttachment {
                    name,
                    vertex,
                    closed,
                    constant_speed,
                    lengths,
                    color,
                })))
            }
            ATTACHMENT_POINT => {
                let rotation = input.read_f32()?;
                let x = input.read_f32()?;
                let y = input.read_f32()?;
                let color = if nonessential {
                    input.read_color()?
                } else {
                    [0.38, 0.94, 0.0, 1.0]
                };
                let result = self.loader.new_point_attachment(skin_name, &name);
                if self.resolve(result.map(|ok| ok.then_some(())))?.is_none() {
                    return Ok(None);
                }
                Ok(Some(Attachment::Point(PointAttachment {
                    id: self.next_attachment_id(),
                    name,
                    x: x * scale,
                    y: y * scale,
                    rotation,
                    color,
                })))
            }
            ATTACHMENT_CLIPPING => {
                let end_slot = input.read_index(data.slots.len(), "slot", || {
                    format!("end slot of clipping attachment '{name}'")
                })?;
                let vertices = read_vertices(input, flags & 16 != 0, scale, bone_count, &name)?;
                let color = if nonessential {
                    input.read_color()?
                } else {
                    [0.2275, 0.2275, 0.8078, 1.0]
                };
                let result = self.loader.new_clipping_attachment(skin_name, &name);
                if self.resolve(result.map(|ok| ok.then_some(())))?.is_none() {
                    return Ok(None);
                }
                let vertex = self.vertex_data(vertices);
                Ok(Some(Attachment::Clipping(ClippingAttachment {
                    name,
                    vertex,
                    end_slot,
                    color,
                })))
            }
            other => Err(Error::parse(format!(
                "unknown attachment type {other} for '{name}' in skin '{skin_name}' at offset {}",
                input.position()
            ))),
        }
    }

    fn vertex_data(&mut self, vertices: MeshVertices) -> VertexData {
        let id = self.next_attachment_id();
        VertexData {
            id,
            timeline_id: id,
            world_vertices_length: vertices.vertex_count() << 1,
            vertices,
        }
    }

    /// Copies shared geometry from each linked mesh's parent.
    fn link_meshes(&mut self, data: &mut SkeletonData) -> Result<(), Error> {
        for linked in std::mem::take(&mut self.linked_meshes) {
            let skin_count = data.skins.len();
            let parent_skin = usize::try_from(linked.parent_skin)
                .ok()
                .filter(|&i| i < skin_count)
                .ok_or_else(|| {
                    Error::reference(
                        "skin",
                        i64::from(linked.parent_skin),
                        skin_count,
                        format!("linked mesh '{}'", linked.name),
                    )
                })?;
            let parent = match data.skins[parent_skin].attachment(linked.slot, &linked.parent) {
                Some(Attachment::Mesh(mesh)) => mesh.clone(),
                _ => {
                    return Err(Error::LinkedMeshParent {
                        skin: data.skins[linked.skin].name.clone(),
                        slot: linked.slot,
                        attachment: linked.name,
                        parent: linked.parent,
                    });
                }
            };
            let Some(Attachment::Mesh(mesh)) =
                data.skins[linked.skin].attachment_mut(linked.slot, &linked.name)
            else {
                continue;
            };
            if linked.inherit_timelines {
                mesh.vertex.timeline_id = parent.vertex.id;
            }
            mesh.vertex.vertices = parent.vertex.vertices;
            mesh.vertex.world_vertices_length = parent.vertex.world_vertices_length;
            mesh.region_uvs = parent.region_uvs;
            mesh.triangles = parent.triangles;
            mesh.hull_length = parent.hull_length;
            if !parent.edges.is_empty() {
                mesh.edges = parent.edges;
                mesh.width = parent.width;
                mesh.height = parent.height;
            }
        }
        Ok(())
    }

    fn read_animation(
        &mut self,
        input: &mut BinaryInput<'_>,
        name: String,
        data: &SkeletonData,
    ) -> Result<Animation, Error> {
        let scale = self.scale();
        let context = || format!("animation '{name}'");
        // Total timeline count; only useful for presizing storage.
        input.read_varint(true)?;
        let mut timelines = Vec::new();

        let slot_count = data.slots.len();
        for _ in 0..input.read_count("slot timeline count")? {
            let slot = input.read_index(slot_count, "slot", context)?;
            for _ in 0..input.read_count("slot timeline count")? {
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count("frame count")?;
                let timeline = if timeline_type == SLOT_ATTACHMENT {
                    let mut times = Vec::with_capacity(input.capacity(frame_count));
                    let mut names = Vec::with_capacity(input.capacity(frame_count));
                    for _ in 0..frame_count {
                        times.push(input.read_f32()?);
                        names.push(input.read_string_ref()?);
                    }
                    Timeline::Attachment { slot, times, names }
                } else {
                    input.read_varint(true)?; // bezier count
                    match timeline_type {
                        SLOT_RGBA => Timeline::Rgba {
                            slot,
                            frames: read_curve_frames(input, frame_count, [1.0; 4], read_color_channel)?,
                        },
                        SLOT_RGB => Timeline::Rgb {
                            slot,
                            frames: read_curve_frames(input, frame_count, [1.0; 3], read_color_channel)?,
                        },
                        SLOT_RGBA2 => Timeline::Rgba2 {
                            slot,
                            frames: read_curve_frames(input, frame_count, [1.0; 7], read_color_channel)?,
                        },
                        SLOT_RGB2 => Timeline::Rgb2 {
                            slot,
                            frames: read_curve_frames(input, frame_count, [1.0; 6], read_color_channel)?,
                        },
                        SLOT_ALPHA => Timeline::Alpha {
                            slot,
                            frames: read_curve_frames(input, frame_count, [1.0], read_color_channel)?,
                        },
                        other => {
                            return Err(Error::parse(format!(
                                "unknown slot timeline type {other} in animation '{name}' at offset {}",
                                input.position()
                            )));
                        }
                    }
                };
                timelines.push(timeline);
            }
        }

        let bone_count = data.bones.len();
        for _ in 0..input.read_count("bone timeline count")? {
            let bone = input.read_index(bone_count, "bone", context)?;
            for _ in 0..input.read_count("bone timeline count")? {
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count("frame count")?;
                if timeline_type == BONE_INHERIT {
                    let mut times = Vec::with_capacity(input.capacity(frame_count));
                    let mut modes = Vec::with_capacity(input.capacity(frame_count));
                    for _ in 0..frame_count {
                        times.push(input.read_f32()?);
                        modes.push(map_transform_mode(i32::from(input.read_i8()?)));
                    }
                    timelines.push(Timeline::Inherit { bone, times, modes });
                    continue;
                }
                input.read_varint(true)?; // bezier count
                let single = |input: &mut BinaryInput<'_>, property, scale| {
                    Ok::<_, Error>(Timeline::Bone {
                        bone,
                        property,
                        frames: read_curve_frames(input, frame_count, [scale], read_float)?,
                    })
                };
                let pair = |input: &mut BinaryInput<'_>, property, scale| {
                    Ok::<_, Error>(Timeline::BonePair {
                        bone,
                        property,
                        frames: read_curve_frames(input, frame_count, [scale; 2], read_float)?,
                    })
                };
                let timeline = match timeline_type {
                    BONE_ROTATE => single(input, BoneProperty::Rotate, 1.0)?,
                    BONE_TRANSLATE => pair(input, BonePairProperty::Translate, scale)?,
                    BONE_TRANSLATEX => single(input, BoneProperty::X, scale)?,
                    BONE_TRANSLATEY => single(input, BoneProperty::Y, scale)?,
                    BONE_SCALE => pair(input, BonePairProperty::Scale, 1.0)?,
                    BONE_SCALEX => single(input, BoneProperty::ScaleX, 1.0)?,
                    BONE_SCALEY => single(input, BoneProperty::ScaleY, 1.0)?,
                    BONE_SHEAR => pair(input, BonePairProperty::Shear, 1.0)?,
                    BONE_SHEARX => single(input, BoneProperty::ShearX, 1.0)?,
                    BONE_SHEARY => single(input, BoneProperty::ShearY, 1.0)?,
                    other => {
                        return Err(Error::parse(format!(
                            "unknown bone timeline type {other} in animation '{name}' at offset {}",
                            input.position()
                        )));
                    }
                };
                timelines.push(timeline);
            }
        }

        for _ in 0..input.read_count("ik timeline count")? {
            let constraint =
                input.read_index(data.ik_constraints.len(), "ik constraint", context)?;
            let frame_count = input.read_count("frame count")?;
            input.read_varint(true)?; // bezier count
            timelines.push(read_ik_timeline(input, constraint, frame_count, scale)?);
        }

        for _ in 0..input.read_count("transform timeline count")? {
            let constraint = input.read_index(
                data.transform_constraints.len(),
                "transform constraint",
                context,
            )?;
            let frame_count = input.read_count("frame count")?;
            input.read_varint(true)?; // bezier count
            timelines.push(Timeline::TransformConstraint {
                constraint,
                frames: read_curve_frames(input, frame_count, [1.0; 6], read_float)?,
            });
        }

        for _ in 0..input.read_count("path timeline count")? {
            let constraint =
                input.read_index(data.path_constraints.len(), "path constraint", context)?;
            let path = &data.path_constraints[constraint];
            for _ in 0..input.read_count("path timeline count")? {
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count("frame count")?;
                input.read_varint(true)?; // bezier count
                let timeline = match timeline_type {
                    PATH_POSITION => {
                        let scale = if path.position_mode == PositionMode::Fixed {
                            scale
                        } else {
                            1.0
                        };
                        Timeline::PathPosition {
                            constraint,
                            frames: read_curve_frames(input, frame_count, [scale], read_float)?,
                        }
                    }
                    PATH_SPACING => {
                        let scale = if matches!(
                            path.spacing_mode,
                            SpacingMode::Length | SpacingMode::Fixed
                        ) {
                            scale
                        } else {
                            1.0
                        };
                        Timeline::PathSpacing {
                            constraint,
                            frames: read_curve_frames(input, frame_count, [scale], read_float)?,
                        }
                    }
                    PATH_MIX => Timeline::PathMix {
                        constraint,
                        frames: read_curve_frames(input, frame_count, [1.0; 3], read_float)?,
                    },
                    other => {
                        return Err(Error::parse(format!(
                            "unknown path timeline type {other} in animation '{name}' at offset {}",
                            input.position()
                        )));
                    }
                };
                timelines.push(timeline);
            }
        }

        let physics_count = data.physics_constraints.len();
        for _ in 0..input.read_count("physics timeline count")? {
            // Zero targets every constraint with the matching global flag.
            let index = input.read_varint(true)?;
            let constraint = match index {
                0 => None,
                _ => Some(
                    usize::try_from(index - 1)
                        .ok()
                        .filter(|&i| i < physics_count)
                        .ok_or_else(|| {
                            Error::reference(
                                "physics constraint",
                                i64::from(index) - 1,
                                physics_count,
                                context(),
                            )
                        })?,
                ),
            };
            for _ in 0..input.read_count("physics timeline count")? {
                let timeline_type = input.read_u8()?;
                let frame_count = input.read_count("frame count")?;
                if timeline_type == PHYSICS_RESET {
                    let mut times = Vec::with_capacity(input.capacity(frame_count));
                    for _ in 0..frame_count {
                        times.push(input.read_f32()?);
                    }
                    timelines.push(Timeline::PhysicsReset { constraint, times });
                    continue;
                }
                input.read_varint(true)?; // bezier count
                let property = match timeline_type {
                    PHYSICS_INERTIA => PhysicsProperty::Inertia,
                    PHYSICS_STRENGTH => PhysicsProperty::Strength,
                    PHYSICS_DAMPING => PhysicsProperty::Damping,
                    PHYSICS_MASS => PhysicsProperty::Mass,
                    PHYSICS_WIND => PhysicsProperty::Wind,
                    PHYSICS_GRAVITY => PhysicsProperty::Gravity,
                    PHYSICS_MIX => PhysicsProperty::Mix,
                    other => {
                        return Err(Error::parse(format!(
                            "unknown physics timeline type {other} in animation '{name}' at offset {}",
                            input.position()
                        )));
                    }
                };
                timelines.push(Timeline::Physics {
                    constraint,
                    property,
                    frames: read_curve_frames(input, frame_count, [1.0], read_float)?,
                });
            }
        }

        for _ in 0..input.read_count("attachment timeline count")? {
            let skin_index = input.read_index(data.skins.len(), "skin", context)?;
            let skin = &data.skins[skin_index];
            for _ in 0..input.read_count("attachment timeline count")? {
                let slot = input.read_index(slot_count, "slot", context)?;
                for _ in 0..input.read_count("attachment timeline count")? {
                    let attachment_name =
                        input.read_required_string_ref("timeline attachment name")?;
                    let attachment = skin.attachment(slot, &attachment_name);
                    if attachment.is_none() {
                        if !self.config.skip_missing_regions {
                            return Err(Error::UnknownAttachment {
                                slot: data.slots[slot].name.clone(),
                                name: attachment_name,
                            });
                        }
                        log::warn!(
                            "dropping timeline for skipped attachment '{attachment_name}' in animation '{name}'"
                        );
                    }
                    let timeline_type = input.read_u8()?;
                    let frame_count = input.read_count("frame count")?;
                    let timeline = match timeline_type {
                        ATTACHMENT_DEFORM => {
                            let vertex = match attachment {
                                Some(a) => Some(a.vertex_data().ok_or_else(|| {
                                    Error::parse(format!(
                                        "deform timeline targets non-vertex attachment '{attachment_name}'"
                                    ))
                                })?),
                                None => None,
                            };
                            read_deform_timeline(input, slot, vertex, frame_count, scale)?
                                .map(Timeline::Deform)
                        }
                        ATTACHMENT_SEQUENCE => {
                            let mut times = Vec::with_capacity(input.capacity(frame_count));
                            let mut keys = Vec::with_capacity(input.capacity(frame_count));
                            for _ in 0..frame_count {
                                times.push(input.read_f32()?);
                                let mode_and_index = input.read_i32()?;
                                let mode = SequenceMode::from_binary(mode_and_index & 0xf)
                                    .ok_or_else(|| {
                                        Error::parse(format!(
                                            "invalid sequence mode {} in animation '{name}'",
                                            mode_and_index & 0xf
                                        ))
                                    })?;
                                keys.push(SequenceKey {
                                    mode,
                                    index: mode_and_index >> 4,
                                    delay: input.read_f32()?,
                                });
                            }
                            attachment.map(|a| Timeline::Sequence {
                                slot,
                                attachment: a.id(),
                                times,
                                keys,
                            })
                        }
                        other => {
                            return Err(Error::parse(format!(
                                "unknown attachment timeline type {other} in animation '{name}' at offset {}",
                                input.position()
                            )));
                        }
                    };
                    timelines.extend(timeline);
                }
            }
        }

        let draw_order_count = input.read_count("draw order count")?;
        if draw_order_count > 0 {
            let mut times = Vec::with_capacity(input.capacity(draw_order_count));
            let mut orders = Vec::with_capacity(input.capacity(draw_order_count));
            for _ in 0..draw_order_count {
                times.push(input.read_f32()?);
                orders.push(read_draw_order(input, slot_count, &name)?);
            }
            timelines.push(Timeline::DrawOrder { times, orders });
        }

        let event_count = input.read_count("event count")?;
        if event_count > 0 {
            let mut times = Vec::with_capacity(input.capacity(event_count));
            let mut events = Vec::with_capacity(input.capacity(event_count));
            for _ in 0..event_count {
                let time = input.read_f32()?;
                let index = input.read_index(data.events.len(), "event", context)?;
                let event_data = &data.events[index];
                let int_value = input.read_varint(false)?;
                let float_value = input.read_f32()?;
                let string_value = input
                    .read_string()?
                    .or_else(|| event_data.string_value.clone());
                let (volume, balance) = if event_data.audio_path.is_some() {
                    (input.read_f32()?, input.read_f32()?)
                } else {
                    (event_data.volume, event_data.balance)
                };
                times.push(time);
                events.push(Event {
                    data: index,
                    time,
                    int_value,
                    float_value,
                    string_value,
                    volume,
                    balance,
                });
            }
            timelines.push(Timeline::Event { times, events });
        }

        let duration = timelines
            .iter()
            .map(Timeline::duration)
            .fold(0.0f32, f32::max);
        log::trace!(
            "animation '{name}': {} timelines, duration {duration}",
            timelines.len()
        );
        Ok(Animation {
            name,
            timelines,
            duration,
        })
    }
}

/// The curve into each frame is carried by the flags byte that starts the next frame.
fn read_ik_timeline(
    input: &mut BinaryInput<'_>,
    constraint: usize,
    frame_count: usize,
    scale: f32,
) -> Result<Timeline, Error> {
    if frame_count == 0 {
        return Err(Error::parse(format!(
            "ik timeline without frames at offset {}",
            input.position()
        )));
    }
    let read_mix = |input: &mut BinaryInput<'_>, flags: u8| -> Result<(f32, f32), Error> {
        let mix = if flags & 1 != 0 {
            if flags & 2 != 0 { input.read_f32()? } else { 1.0 }
        } else {
            0.0
        };
        let softness = if flags & 4 != 0 {
            input.read_f32()? * scale
        } else {
            0.0
        };
        Ok((mix, softness))
    };

    let mut frames = CurveFrames::with_capacity(input.capacity(frame_count));
    let mut keys = Vec::with_capacity(input.capacity(frame_count));
    let mut flags = input.read_u8()?;
    let mut time = input.read_f32()?;
    let (mut mix, mut softness) = read_mix(input, flags)?;
    for frame in 0..frame_count {
        frames.push(time, [mix, softness]);
        keys.push(IkKey {
            bend_direction: if flags & 8 != 0 { 1 } else { -1 },
            compress: flags & 16 != 0,
            stretch: flags & 32 != 0,
        });
        if frame + 1 == frame_count {
            break;
        }
        flags = input.read_u8()?;
        let time2 = input.read_f32()?;
        let (mix2, softness2) = read_mix(input, flags)?;
        if flags & 64 != 0 {
            frames.curves[frame] = Curve::Stepped;
        } else if flags & 128 != 0 {
            frames.curves[frame] = Curve::Bezier([
                read_bezier(input, time, mix, time2, mix2, 1.0)?,
                read_bezier(input, time, softness, time2, softness2, scale)?,
            ]);
        }
        time = time2;
        mix = mix2;
        softness = softness2;
    }
    Ok(Timeline::IkConstraint {
        constraint,
        frames,
        keys,
    })
}

/// Returns `None` when the target attachment was skipped; the frames are still consumed.
fn read_deform_timeline(
    input: &mut BinaryInput<'_>,
    slot: usize,
    vertex: Option<&VertexData>,
    frame_count: usize,
    scale: f32,
) -> Result<Option<DeformTimeline>, Error> {
    if frame_count == 0 {
        return Err(Error::parse(format!(
            "deform timeline without frames at offset {}",
            input.position()
        )));
    }
    input.read_varint(true)?; // bezier count
    let setup = vertex.and_then(|v| v.vertices.unweighted_flat());
    let deform_len = vertex.map_or(0, |v| v.vertices.deform_len());

    let mut times = Vec::with_capacity(input.capacity(frame_count));
    let mut curves = Vec::with_capacity(input.capacity(frame_count));
    let mut frames = Vec::with_capacity(input.capacity(frame_count));
    let mut time = input.read_f32()?;
    for frame in 0..frame_count {
        let offset = input.position();
        let end = input.read_count("deform length")?;
        let deform = if end == 0 {
            setup.map_or_else(|| vec![0.0; deform_len], <[f32]>::to_vec)
        } else {
            let start = input.read_count("deform start")?;
            let end = start + end;
            let mut deform = vec![0.0; deform_len];
            if vertex.is_some() && end > deform_len {
                return Err(Error::parse(format!(
                    "deform range {start}..{end} exceeds {deform_len} values at offset {offset}"
                )));
            }
            for v in start..end {
                let value = input.read_f32()? * scale;
                if let Some(d) = deform.get_mut(v) {
                    *d = value;
                }
            }
            if let Some(setup) = setup {
                for (d, s) in deform.iter_mut().zip(setup) {
                    *d += s;
                }
            }
            deform
        };
        times.push(time);
        frames.push(deform);
        curves.push(Curve::Linear);
        if frame + 1 == frame_count {
            break;
        }
        let time2 = input.read_f32()?;
        match input.read_i8()? {
            CURVE_STEPPED => curves[frame] = Curve::Stepped,
            CURVE_BEZIER => {
                curves[frame] = Curve::Bezier([read_bezier(input, time, 0.0, time2, 1.0, 1.0)?]);
            }
            _ => {}
        }
        time = time2;
    }

    Ok(vertex.map(|v| DeformTimeline {
        slot,
        attachment: v.id,
        times,
        curves,
        vertices: frames,
    }))
}

/// Rebuilds a full draw order from the `(slot, offset)` pairs of the moved slots.
fn read_draw_order(
    input: &mut BinaryInput<'_>,
    slot_count: usize,
    animation: &str,
) -> Result<Vec<usize>, Error> {
    let invalid = |message: String| Error::parse(format!("{message} in animation '{animation}'"));
    let offset_count = input.read_count("draw order offset count")?;
    if offset_count > slot_count {
        return Err(invalid(format!(
            "{offset_count} draw order offsets for {slot_count} slots"
        )));
    }
    let mut draw_order: Vec<Option<usize>> = vec![None; slot_count];
    let mut unchanged = Vec::with_capacity(slot_count - offset_count);
    let mut original = 0;
    for _ in 0..offset_count {
        let slot = input.read_index(slot_count, "slot", || format!("draw order of '{animation}'"))?;
        if slot < original {
            return Err(invalid(format!("draw order offsets not sorted at slot {slot}")));
        }
        while original != slot {
            unchanged.push(original);
            original += 1;
        }
        let offset = input.read_varint(true)?;
        let target = usize::try_from(original as i64 + i64::from(offset))
            .ok()
            .filter(|&t| t < slot_count && draw_order[t].is_none())
            .ok_or_else(|| invalid(format!("invalid draw order offset {offset} for slot {slot}")))?;
        draw_order[target] = Some(original);
        original += 1;
    }
    while original < slot_count {
        unchanged.push(original);
        original += 1;
    }
    for entry in draw_order.iter_mut().rev() {
        if entry.is_none() {
            *entry = unchanged.pop();
        }
    }
    draw_order
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| invalid("incomplete draw order".to_string()))
}

impl SkeletonData {
    /// Decodes with the default configuration and no texture binding.
    pub fn from_skel_bytes(bytes: &[u8]) -> Result<Arc<Self>, Error> {
        Self::from_skel_bytes_with_scale(bytes, 1.0)
    }

    pub fn from_skel_bytes_with_scale(bytes: &[u8], scale: f32) -> Result<Arc<Self>, Error> {
        SkeletonBinary::new(NullAttachmentLoader)
            .with_scale(scale)
            .read_skeleton_data(bytes)
    }
}
