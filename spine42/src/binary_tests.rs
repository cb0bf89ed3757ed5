use crate::binary::BinaryInput;
use crate::{
    Atlas, AtlasAttachmentLoader, Attachment, BoneProperty, Curve, Error, LoaderConfig,
    MeshVertices, NullAttachmentLoader, Skeleton, SkeletonBinary, SkeletonData, Timeline,
    TransformMode,
};

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-6,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

/// Encoder for hand-built `.skel` fixtures.
#[derive(Default)]
struct SkelWriter {
    bytes: Vec<u8>,
}

impl SkelWriter {
    fn u8(&mut self, value: u8) -> &mut Self {
        self.bytes.push(value);
        self
    }

    fn bool(&mut self, value: bool) -> &mut Self {
        self.u8(u8::from(value))
    }

    fn i32(&mut self, value: i32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn f32(&mut self, value: f32) -> &mut Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn floats(&mut self, values: &[f32]) -> &mut Self {
        for &v in values {
            self.f32(v);
        }
        self
    }

    fn varint(&mut self, value: i32, optimize_positive: bool) -> &mut Self {
        let mut v = if optimize_positive {
            value as u32
        } else {
            ((value << 1) ^ (value >> 31)) as u32
        };
        while v >= 0x80 {
            self.bytes.push((v as u8 & 0x7f) | 0x80);
            v >>= 7;
        }
        self.bytes.push(v as u8);
        self
    }

    fn count(&mut self, value: usize) -> &mut Self {
        self.varint(value as i32, true)
    }

    fn string(&mut self, value: Option<&str>) -> &mut Self {
        match value {
            None => self.count(0),
            Some(s) => {
                self.count(s.len() + 1);
                self.bytes.extend_from_slice(s.as_bytes());
                self
            }
        }
    }

    fn str(&mut self, value: &str) -> &mut Self {
        self.string(Some(value))
    }

    fn finish(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.bytes)
    }
}

/// Hash, version, bounds, reference scale 100, no nonessential data and a string table.
fn header(w: &mut SkelWriter, version: &str, strings: &[&str]) {
    w.i32(0x1234).i32(0x5678).str(version);
    w.floats(&[-5.0, 0.0, 100.0, 200.0, 100.0]);
    w.bool(false);
    w.count(strings.len());
    for s in strings {
        w.str(s);
    }
}

/// `transform` is rotation, x, y, scale x, scale y, shear x, shear y, length.
fn bone(w: &mut SkelWriter, name: &str, parent: Option<usize>, transform: [f32; 8], inherit: u8) {
    w.str(name);
    if let Some(parent) = parent {
        w.count(parent);
    }
    w.floats(&transform).u8(inherit).bool(false);
}

const IDENTITY: [f32; 8] = [0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 0.0];

/// White slot without dark color; `attachment` is a string table reference (0 for none).
fn slot(w: &mut SkelWriter, name: &str, bone: usize, attachment: usize) {
    w.str(name).count(bone).i32(-1).i32(-1).count(attachment).count(0);
}

fn no_constraints(w: &mut SkelWriter) {
    w.count(0).count(0).count(0).count(0);
}

/// Root bone plus one slot per name, all on the root.
fn rig(w: &mut SkelWriter, strings: &[&str], slots: &[(&str, usize)]) {
    header(w, "4.2.40", strings);
    w.count(1);
    bone(w, "root", None, IDENTITY, 0);
    w.count(slots.len());
    for &(name, attachment) in slots {
        slot(w, name, 0, attachment);
    }
    no_constraints(w);
}

/// No named skins, no events, no animations.
fn empty_tail(w: &mut SkelWriter) {
    w.count(0).count(0).count(0);
}

/// Unweighted three-vertex mesh body with a single triangle.
fn triangle_mesh(w: &mut SkelWriter) {
    w.u8(2).count(3).count(3);
    w.floats(&[0.0, 0.0, 10.0, 0.0, 0.0, 10.0]);
    w.floats(&[0.0, 1.0, 1.0, 1.0, 0.0, 0.0]);
    w.count(0).count(1).count(2);
}

fn decode(bytes: &[u8]) -> Result<std::sync::Arc<SkeletonData>, Error> {
    SkeletonBinary::new(NullAttachmentLoader).read_skeleton_data(bytes)
}

#[test]
fn varints_decode_at_every_length_boundary() {
    let cases = [0, 1, 127, 128, 16_383, 16_384, 2_097_151, 2_097_152, i32::MAX];
    for value in cases {
        let bytes = SkelWriter::default().varint(value, true).finish();
        let mut input = BinaryInput::new(&bytes);
        assert_eq!(input.read_varint(true).expect("varint"), value);
        assert_eq!(input.position(), bytes.len(), "length of {value}");
    }
    for value in [0, -1, 1, -64, 64, i32::MIN, i32::MAX] {
        let bytes = SkelWriter::default().varint(value, false).finish();
        let mut input = BinaryInput::new(&bytes);
        assert_eq!(input.read_varint(false).expect("zigzag varint"), value);
    }
    assert_eq!(SkelWriter::default().varint(-1, true).finish().len(), 5);
}

#[test]
fn strings_distinguish_null_from_empty_and_decode_multibyte() {
    let bytes = SkelWriter::default()
        .string(None)
        .str("")
        .str("spine")
        .str("é€")
        .finish();
    let mut input = BinaryInput::new(&bytes);
    assert_eq!(input.read_string().expect("null"), None);
    assert_eq!(input.read_string().expect("empty").as_deref(), Some(""));
    assert_eq!(input.read_string().expect("ascii").as_deref(), Some("spine"));
    assert_eq!(input.read_string().expect("utf8").as_deref(), Some("é€"));
}

#[test]
fn truncated_input_reports_eof() {
    let bytes = [0u8, 0, 0];
    let mut input = BinaryInput::new(&bytes);
    assert!(matches!(input.read_i32(), Err(Error::BinaryParse { .. })));

    let bytes = SkelWriter::default().count(10).u8(b'a').finish();
    let mut input = BinaryInput::new(&bytes);
    assert!(matches!(input.read_string(), Err(Error::BinaryParse { .. })));
}

#[test]
fn decodes_bone_hierarchy_with_scale() {
    let mut w = SkelWriter::default();
    header(&mut w, "4.2.40", &[]);
    w.count(2);
    bone(&mut w, "root", None, [0.0, 10.0, 20.0, 1.0, 1.0, 0.0, 0.0, 0.0], 0);
    bone(&mut w, "arm", Some(0), [90.0, 5.0, 0.0, 2.0, 1.0, 0.0, 15.0, 50.0], 3);
    w.count(1);
    slot(&mut w, "sleeve", 1, 0);
    no_constraints(&mut w);
    w.count(0);
    empty_tail(&mut w);

    let data = SkeletonData::from_skel_bytes_with_scale(&w.finish(), 2.0).expect("decodes");
    assert_eq!(data.hash.as_deref(), Some("56781234"));
    assert_eq!(data.version.as_deref(), Some("4.2.40"));
    assert_approx(data.x, -5.0);
    assert_approx(data.height, 200.0);
    assert_approx(data.reference_scale, 200.0);

    assert_eq!(data.bones.len(), 2);
    let root = &data.bones[0];
    assert_eq!(root.parent, None);
    assert_approx(root.x, 20.0);
    assert_approx(root.y, 40.0);

    let arm = &data.bones[1];
    assert_eq!(arm.name, "arm");
    assert_eq!(arm.parent, Some(0));
    assert_approx(arm.rotation, 90.0);
    assert_approx(arm.x, 10.0);
    assert_approx(arm.scale_x, 2.0);
    assert_approx(arm.shear_y, 15.0);
    assert_approx(arm.length, 100.0);
    assert_eq!(arm.transform_mode, TransformMode::NoScale);

    assert_eq!(data.slots.len(), 1);
    assert_eq!(data.slots[0].bone, 1);
    assert_eq!(data.slots[0].attachment, None);
    assert_eq!(data.slots[0].dark_color, None);
    assert_eq!(data.slots[0].color, [1.0; 4]);
    assert!(data.skins.is_empty());
    assert_eq!(data.default_skin, None);
}

#[test]
fn rejects_unsupported_versions() {
    for version in ["3.8.99", "4.1.24", "5.0.1"] {
        let mut w = SkelWriter::default();
        header(&mut w, version, &[]);
        match decode(&w.finish()) {
            Err(Error::UnsupportedVersion { value }) => assert_eq!(value, version),
            other => panic!("expected UnsupportedVersion for {version}, got {other:?}"),
        }
    }
}

#[test]
fn null_bone_name_is_a_format_error() {
    let mut w = SkelWriter::default();
    header(&mut w, "4.2.40", &[]);
    w.count(1).string(None);
    assert!(matches!(
        decode(&w.finish()),
        Err(Error::NullValue {
            what: "bone name",
            ..
        })
    ));
}

#[test]
fn dangling_references_are_rejected() {
    let mut w = SkelWriter::default();
    header(&mut w, "4.2.40", &[]);
    w.count(2);
    bone(&mut w, "root", None, IDENTITY, 0);
    bone(&mut w, "child", Some(5), IDENTITY, 0);
    match decode(&w.finish()) {
        Err(Error::InvalidReference {
            kind, index, len, ..
        }) => {
            assert_eq!(kind, "bone");
            assert_eq!(index, 5);
            assert_eq!(len, 1);
        }
        other => panic!("expected InvalidReference, got {other:?}"),
    }

    let mut w = SkelWriter::default();
    header(&mut w, "4.2.40", &[]);
    w.count(1);
    bone(&mut w, "root", None, IDENTITY, 0);
    w.count(1);
    slot(&mut w, "body", 9, 0);
    assert!(matches!(
        decode(&w.finish()),
        Err(Error::InvalidReference { kind: "bone", .. })
    ));
}

#[test]
fn unknown_attachment_type_is_a_format_error() {
    let mut w = SkelWriter::default();
    rig(&mut w, &["odd"], &[("body", 0)]);
    w.count(1).count(0).count(1).count(1).u8(7);
    assert!(matches!(decode(&w.finish()), Err(Error::BinaryParse { .. })));
}

fn region_fixture() -> Vec<u8> {
    let mut w = SkelWriter::default();
    rig(&mut w, &["head"], &[("body", 1)]);
    // Default skin: slot 0 holds region "head".
    w.count(1).count(0).count(1).count(1);
    w.u8(0).floats(&[1.0, 2.0, 1.0, 1.0, 32.0, 16.0]);
    empty_tail(&mut w);
    w.finish()
}

#[test]
fn region_attachments_bind_atlas_regions() {
    let atlas = Atlas::parse("page.png\nsize: 64, 64\nhead\n  bounds: 0, 0, 32, 16\n")
        .expect("atlas");
    let mut binary =
        SkeletonBinary::with_config(AtlasAttachmentLoader::new(&atlas), LoaderConfig::default())
            .with_scale(0.5);
    let data = binary.read_skeleton_data(&region_fixture()).expect("decodes");

    let skin = data.default_skin().expect("default skin");
    assert_eq!(skin.name, "default");
    let Some(Attachment::Region(head)) = skin.attachment(0, "head") else {
        panic!("head region missing");
    };
    assert_eq!(head.path, "head");
    assert_approx(head.x, 0.5);
    assert_approx(head.width, 16.0);
    let region = head.region.as_ref().expect("bound region");
    assert_approx(region.u2, 0.5);
    assert_approx(region.v2, 0.25);

    let skeleton = Skeleton::new(data.clone());
    assert!(matches!(
        skeleton.slot_attachment(0),
        Some(Attachment::Region(_))
    ));
}

#[test]
fn missing_regions_fail_or_skip_by_config() {
    let atlas = Atlas::parse("page.png\nsize: 64, 64\nother\n  bounds: 0, 0, 8, 8\n")
        .expect("atlas");

    let mut strict = SkeletonBinary::new(AtlasAttachmentLoader::new(&atlas));
    match strict.read_skeleton_data(&region_fixture()) {
        Err(err @ Error::MissingRegion { .. }) => assert!(!err.is_fatal_for_asset()),
        other => panic!("expected MissingRegion, got {other:?}"),
    }

    let config = LoaderConfig::default().with_skip_missing_regions(true);
    let mut lenient = SkeletonBinary::with_config(AtlasAttachmentLoader::new(&atlas), config);
    let data = lenient
        .read_skeleton_data(&region_fixture())
        .expect("decodes with skipped attachment");
    assert_eq!(lenient.skipped_attachments().len(), 1);
    let skin = data.default_skin().expect("default skin");
    assert!(skin.attachment(0, "head").is_none());
    assert!(Skeleton::new(data.clone()).slot_attachment(0).is_none());
}

fn linked_mesh_fixture(parent: usize) -> Vec<u8> {
    let mut w = SkelWriter::default();
    rig(&mut w, &["body", "ghost"], &[("torso", 0)]);
    // Default skin: mesh "body" in slot 0.
    w.count(1).count(0).count(1).count(1);
    triangle_mesh(&mut w);
    // Skin "alt" with a linked mesh that inherits the parent's deform timelines.
    w.count(1).str("alt").count(0).count(0).count(0).count(0).count(0);
    w.count(1).count(0).count(1).count(1);
    w.u8(3 | 128).count(0).count(parent);
    w.count(0).count(0);
    w.finish()
}

#[test]
fn linked_meshes_copy_parent_geometry() {
    let data = decode(&linked_mesh_fixture(1)).expect("decodes");
    assert_eq!(data.skins.len(), 2);
    let Some(Attachment::Mesh(parent)) = data.skins[0].attachment(0, "body") else {
        panic!("parent mesh missing");
    };
    let alt = data.find_skin("alt").expect("alt skin");
    let Some(Attachment::Mesh(linked)) = data.skins[alt].attachment(0, "body") else {
        panic!("linked mesh missing");
    };
    assert_eq!(linked.parent_mesh.as_deref(), Some("body"));
    assert_eq!(linked.triangles, vec![0, 1, 2]);
    assert_eq!(linked.region_uvs, parent.region_uvs);
    assert_eq!(linked.hull_length, 6);
    assert_eq!(linked.vertex.world_vertices_length, 6);
    assert!(matches!(
        &linked.vertex.vertices,
        MeshVertices::Unweighted(v) if v.len() == 3
    ));
    assert_ne!(linked.vertex.id, parent.vertex.id);
    assert_eq!(linked.vertex.timeline_id, parent.vertex.id);
}

#[test]
fn linked_mesh_without_parent_is_rejected() {
    match decode(&linked_mesh_fixture(2)) {
        Err(Error::LinkedMeshParent {
            skin,
            attachment,
            parent,
            ..
        }) => {
            assert_eq!(skin, "alt");
            assert_eq!(attachment, "body");
            assert_eq!(parent, "ghost");
        }
        other => panic!("expected LinkedMeshParent, got {other:?}"),
    }
}

#[test]
fn constraints_decode_flag_bytes() {
    let mut w = SkelWriter::default();
    header(&mut w, "4.2.40", &[]);
    w.count(3);
    bone(&mut w, "root", None, IDENTITY, 0);
    bone(&mut w, "upper", Some(0), IDENTITY, 0);
    bone(&mut w, "target", Some(0), IDENTITY, 0);
    w.count(0);
    // IK: bend positive, stretch, mix 0.5, softness 10.
    w.count(1).str("aim").count(2).count(1).count(1).count(2);
    w.u8(2 | 8 | 32 | 64 | 128).f32(0.5).f32(10.0);
    w.count(0).count(0);
    // Physics: x and rotate enabled, default limit, 30 fps, mix 0.8 keyed globally.
    w.count(1).str("jiggle").count(1).count(1);
    w.u8(2 | 8).f32(0.5).f32(1.0).u8(30);
    w.floats(&[0.9, 80.0, 0.7, 3.0, 9.0]);
    w.u8(64 | 128).f32(0.8);
    w.count(0);
    empty_tail(&mut w);

    let data = SkeletonData::from_skel_bytes_with_scale(&w.finish(), 2.0).expect("decodes");
    let ik = &data.ik_constraints[0];
    assert_eq!(ik.order, 2);
    assert_eq!(ik.bones, vec![1]);
    assert_eq!(ik.target, 2);
    assert_eq!(ik.bend_direction, 1);
    assert!(ik.stretch && !ik.compress && !ik.uniform && !ik.skin_required);
    assert_approx(ik.mix, 0.5);
    assert_approx(ik.softness, 20.0);

    let physics = &data.physics_constraints[0];
    assert_eq!(physics.order, 1);
    assert_eq!(physics.bone, 1);
    assert_approx(physics.x, 0.5);
    assert_approx(physics.y, 0.0);
    assert_approx(physics.rotate, 1.0);
    assert_approx(physics.limit, 10_000.0);
    assert_approx(physics.step, 1.0 / 30.0);
    assert_approx(physics.inertia, 0.9);
    assert_approx(physics.mass_inverse, 1.0);
    assert_approx(physics.wind, 3.0);
    assert_approx(physics.gravity, 9.0);
    assert!(physics.mix_global && !physics.wind_global);
    assert_approx(physics.mix, 0.8);
}

/// Skeleton with `root` and `arm`, an event "footstep" and one animation whose body is
/// written by `timelines`.
fn animation_fixture(timelines: impl FnOnce(&mut SkelWriter)) -> Vec<u8> {
    let mut w = SkelWriter::default();
    header(&mut w, "4.2.40", &[]);
    w.count(2);
    bone(&mut w, "root", None, IDENTITY, 0);
    bone(&mut w, "arm", Some(0), IDENTITY, 0);
    w.count(3);
    for name in ["a", "b", "c"] {
        slot(&mut w, name, 1, 0);
    }
    no_constraints(&mut w);
    w.count(0).count(0);
    w.count(1).str("footstep").varint(7, false).f32(0.5).str("left").string(None);
    w.count(1).str("swing").count(1);
    timelines(&mut w);
    w.finish()
}

#[test]
fn bone_timelines_keep_stepped_and_bezier_curves() {
    let bytes = animation_fixture(|w| {
        w.count(0);
        w.count(1).count(1).u8(0).count(3).count(1);
        w.floats(&[0.0, 0.0]);
        w.floats(&[0.5, 90.0]).u8(1);
        w.floats(&[1.0, 180.0]).u8(2).floats(&[0.6, 100.0, 0.9, 170.0]);
        w.count(0).count(0).count(0).count(0).count(0).count(0).count(0);
    });
    let data = decode(&bytes).expect("decodes");
    let animation = data.animation("swing").expect("swing");
    assert_approx(animation.duration, 1.0);
    let Timeline::Bone {
        bone,
        property,
        frames,
    } = &animation.timelines[0]
    else {
        panic!("expected a bone timeline");
    };
    assert_eq!(*bone, 1);
    assert_eq!(*property, BoneProperty::Rotate);
    assert_eq!(frames.times, vec![0.0, 0.5, 1.0]);
    assert_eq!(frames.curves[0], Curve::Stepped);
    assert!(matches!(frames.curves[1], Curve::Bezier(_)));
    assert_approx(frames.sample1(0.25).expect("sampled"), 0.0);
    assert_approx(frames.sample1(2.0).expect("sampled"), 180.0);
}

#[test]
fn curve_timeline_without_frames_is_rejected() {
    let bytes = animation_fixture(|w| {
        w.count(0);
        w.count(1).count(1).u8(0).count(0).count(0);
    });
    assert!(matches!(decode(&bytes), Err(Error::BinaryParse { .. })));
}

#[test]
fn draw_order_and_events_decode() {
    let bytes = animation_fixture(|w| {
        w.count(0).count(0).count(0).count(0).count(0).count(0).count(0);
        // Slot 2 moves to the front.
        w.count(1).f32(0.0).count(1).count(2).varint(-2, true);
        w.count(1).f32(0.75).count(0).varint(-3, false).f32(1.5).string(None);
    });
    let data = decode(&bytes).expect("decodes");
    assert_eq!(data.events[0].name, "footstep");
    assert_eq!(data.events[0].int_value, 7);
    assert_eq!(data.events[0].audio_path, None);

    let animation = data.animation("swing").expect("swing");
    let Timeline::DrawOrder { orders, .. } = &animation.timelines[0] else {
        panic!("expected a draw order timeline");
    };
    assert_eq!(orders[0], vec![2, 0, 1]);

    let Timeline::Event { events, .. } = &animation.timelines[1] else {
        panic!("expected an event timeline");
    };
    let event = &events[0];
    assert_eq!(event.data, 0);
    assert_eq!(event.int_value, -3);
    assert_approx(event.float_value, 1.5);
    assert_eq!(event.string_value.as_deref(), Some("left"));
    assert_approx(event.volume, 1.0);
    assert_approx(event.balance, 0.0);
    assert_approx(animation.duration, 0.75);
}
