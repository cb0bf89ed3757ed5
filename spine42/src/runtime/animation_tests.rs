use crate::{
    Animation, Attachment, BoneData, BonePairProperty, BoneProperty, CurveFrames, DeformTimeline,
    Error, Event, IkConstraintData, IkKey, MeshAttachment, MeshVertices, MixBlend, MixDirection,
    Physics, PhysicsConstraintData, PhysicsProperty, RegionAttachment, Sequence, SequenceKey,
    SequenceMode, Skeleton, SkeletonData, SkinData, SlotData, Timeline, TransformConstraintData,
    TransformMode, VertexData, VertexWeight,
};
use std::sync::Arc;

fn assert_approx(actual: f32, expected: f32) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= 1.0e-4,
        "expected {expected}, got {actual} (diff {diff})"
    );
}

fn assert_all_approx(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{actual:?} vs {expected:?}");
    for (a, e) in actual.iter().zip(expected) {
        assert_approx(*a, *e);
    }
}

fn region(name: &str, id: u32, sequence: Option<Sequence>) -> Attachment {
    Attachment::Region(RegionAttachment {
        id,
        name: name.to_string(),
        path: name.to_string(),
        x: 0.0,
        y: 0.0,
        rotation: 0.0,
        scale_x: 1.0,
        scale_y: 1.0,
        width: 10.0,
        height: 10.0,
        color: [1.0; 4],
        region: None,
        sequence,
    })
}

fn mesh(name: &str, id: u32, vertices: MeshVertices) -> Attachment {
    let count = vertices.vertex_count();
    Attachment::Mesh(MeshAttachment {
        name: name.to_string(),
        path: name.to_string(),
        vertex: VertexData {
            id,
            timeline_id: id,
            world_vertices_length: count * 2,
            vertices,
        },
        color: [1.0; 4],
        region_uvs: vec![0.0; count * 2],
        triangles: vec![0, 1, 2],
        hull_length: count * 2,
        edges: Vec::new(),
        width: 0.0,
        height: 0.0,
        region: None,
        sequence: None,
        parent_mesh: None,
    })
}

fn weight(x: f32, y: f32) -> Vec<VertexWeight> {
    vec![VertexWeight {
        bone: 0,
        x,
        y,
        weight: 1.0,
    }]
}

/// Root and hip bones; a "body" slot showing region "a" on the hip and an "arm" slot
/// showing mesh "m" on the root.
fn rig_data() -> SkeletonData {
    let mut hip = BoneData::new("hip", Some(0));
    hip.rotation = 10.0;
    hip.scale_x = 2.0;

    let mut body = SlotData::new("body", 1);
    body.attachment = Some("a".to_string());
    let mut arm = SlotData::new("arm", 0);
    arm.attachment = Some("m".to_string());
    arm.dark_color = Some([0.0; 3]);

    let sequence = Sequence {
        count: 4,
        start: 1,
        digits: 2,
        setup_index: 0,
        regions: Vec::new(),
    };
    let mut skin = SkinData::new("default", 2);
    skin.set_attachment(0, "a", region("a", 1, None));
    skin.set_attachment(0, "b", region("b", 2, None));
    skin.set_attachment(0, "seq", region("seq", 5, Some(sequence)));
    let triangle = vec![[0.0, 0.0], [10.0, 0.0], [0.0, 10.0]];
    skin.set_attachment(1, "m", mesh("m", 3, MeshVertices::Unweighted(triangle)));
    let weighted = vec![weight(0.0, 0.0), weight(10.0, 0.0), weight(0.0, 10.0)];
    skin.set_attachment(1, "w", mesh("w", 4, MeshVertices::Weighted(weighted)));

    SkeletonData {
        bones: vec![BoneData::new("root", None), hip],
        slots: vec![body, arm],
        skins: vec![skin],
        default_skin: Some(0),
        ..SkeletonData::default()
    }
}

fn rig() -> Skeleton {
    Skeleton::new(Arc::new(rig_data()))
}

fn frames<const N: usize>(keys: &[(f32, [f32; N])]) -> CurveFrames<N> {
    let mut frames = CurveFrames::with_capacity(keys.len());
    for &(time, values) in keys {
        frames.push(time, values);
    }
    frames
}

fn animation(timelines: Vec<Timeline>) -> Animation {
    let duration = timelines.iter().map(Timeline::duration).fold(0.0, f32::max);
    Animation {
        name: "test".to_string(),
        timelines,
        duration,
    }
}

fn apply(
    skeleton: &mut Skeleton,
    timeline: &Timeline,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    timeline.apply(skeleton, time, time, None, alpha, blend, direction);
}

fn attachment_name(skeleton: &Skeleton, slot: usize) -> Option<&str> {
    skeleton.slots[slot].attachment.as_ref().map(|k| k.name.as_str())
}

#[test]
fn translate_timeline_moves_the_hip_halfway() {
    let mut skeleton = rig();
    let walk = animation(vec![Timeline::BonePair {
        bone: 1,
        property: BonePairProperty::Translate,
        frames: frames(&[(0.0, [0.0, 0.0]), (1.0, [10.0, 0.0])]),
    }]);
    assert_approx(walk.duration, 1.0);

    walk.apply(
        &mut skeleton,
        0.0,
        0.5,
        false,
        None,
        1.0,
        MixBlend::Setup,
        MixDirection::In,
    );
    assert_approx(skeleton.bones[1].x, 5.0);
    assert_approx(skeleton.bones[1].y, 0.0);

    skeleton.update_world_transform(Physics::None);
    assert_approx(skeleton.bones[1].world_x, 5.0);
}

#[test]
fn rotate_timeline_is_relative_to_the_setup_pose() {
    let mut skeleton = rig();
    let rotate = Timeline::Bone {
        bone: 1,
        property: BoneProperty::Rotate,
        frames: frames(&[(0.5, [30.0])]),
    };

    apply(&mut skeleton, &rotate, 1.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 25.0);

    skeleton.bones[1].rotation = 10.0;
    apply(&mut skeleton, &rotate, 1.0, 0.5, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 25.0);

    apply(&mut skeleton, &rotate, 1.0, 0.5, MixBlend::Add, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 40.0);

    // Before the first frame.
    skeleton.bones[1].rotation = 50.0;
    apply(&mut skeleton, &rotate, 0.0, 0.5, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 50.0);
    apply(&mut skeleton, &rotate, 0.0, 0.5, MixBlend::First, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 30.0);
    apply(&mut skeleton, &rotate, 0.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].rotation, 10.0);
}

#[test]
fn scale_timeline_multiplies_setup_and_flips_sign_instantly() {
    let mut skeleton = rig();
    let grow = Timeline::Bone {
        bone: 1,
        property: BoneProperty::ScaleX,
        frames: frames(&[(0.0, [3.0])]),
    };
    apply(&mut skeleton, &grow, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].scale_x, 6.0);
    apply(&mut skeleton, &grow, 0.0, 1.0, MixBlend::Add, MixDirection::In);
    assert_approx(skeleton.bones[1].scale_x, 10.0);

    let flip = Timeline::Bone {
        bone: 1,
        property: BoneProperty::ScaleX,
        frames: frames(&[(0.0, [-1.0])]),
    };
    apply(&mut skeleton, &flip, 0.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.bones[1].scale_x, -2.0);
    // Mixing out keeps the setup sign.
    apply(&mut skeleton, &flip, 0.0, 0.5, MixBlend::Setup, MixDirection::Out);
    assert_approx(skeleton.bones[1].scale_x, 2.0);
}

#[test]
fn inherit_timeline_switches_modes() {
    let mut skeleton = rig();
    let inherit = Timeline::Inherit {
        bone: 1,
        times: vec![0.5],
        modes: vec![TransformMode::OnlyTranslation],
    };
    apply(&mut skeleton, &inherit, 0.75, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.bones[1].inherit, TransformMode::OnlyTranslation);

    apply(&mut skeleton, &inherit, 0.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.bones[1].inherit, TransformMode::OnlyTranslation);
    apply(&mut skeleton, &inherit, 0.75, 1.0, MixBlend::Setup, MixDirection::Out);
    assert_eq!(skeleton.bones[1].inherit, TransformMode::Normal);
}

#[test]
fn attachment_timeline_swaps_and_clears_attachments() {
    let mut skeleton = rig();
    assert_eq!(attachment_name(&skeleton, 0), Some("a"));
    let swap = Timeline::Attachment {
        slot: 0,
        times: vec![0.5, 1.0],
        names: vec![Some("b".to_string()), None],
    };

    apply(&mut skeleton, &swap, 0.75, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(attachment_name(&skeleton, 0), Some("b"));
    apply(&mut skeleton, &swap, 1.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(attachment_name(&skeleton, 0), None);

    // Before the first frame only Setup and First restore the setup attachment.
    apply(&mut skeleton, &swap, 0.25, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(attachment_name(&skeleton, 0), None);
    apply(&mut skeleton, &swap, 0.25, 1.0, MixBlend::First, MixDirection::In);
    assert_eq!(attachment_name(&skeleton, 0), Some("a"));

    // Mixing out only restores for Setup.
    apply(&mut skeleton, &swap, 0.75, 1.0, MixBlend::Replace, MixDirection::In);
    apply(&mut skeleton, &swap, 0.75, 1.0, MixBlend::Replace, MixDirection::Out);
    assert_eq!(attachment_name(&skeleton, 0), Some("b"));
    apply(&mut skeleton, &swap, 0.75, 1.0, MixBlend::Setup, MixDirection::Out);
    assert_eq!(attachment_name(&skeleton, 0), Some("a"));
}

#[test]
fn color_timelines_blend_and_clamp() {
    let mut skeleton = rig();
    let tint = Timeline::Rgba {
        slot: 0,
        frames: frames(&[(0.0, [2.0, 0.5, -1.0, 1.0])]),
    };
    apply(&mut skeleton, &tint, 0.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_all_approx(&skeleton.slots[0].color, &[1.0, 0.5, 0.0, 1.0]);

    let fade = Timeline::Alpha {
        slot: 0,
        frames: frames(&[(0.0, [0.0])]),
    };
    apply(&mut skeleton, &fade, 0.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_approx(skeleton.slots[0].color[3], 0.5);
    assert_approx(skeleton.slots[0].color[1], 0.5);

    let two_color = Timeline::Rgba2 {
        slot: 1,
        frames: frames(&[(0.0, [1.0, 0.0, 0.0, 1.0, 0.5, 0.25, 1.0])]),
    };
    apply(&mut skeleton, &two_color, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    assert_all_approx(&skeleton.slots[1].color, &[1.0, 0.0, 0.0, 1.0]);
    let dark = skeleton.slots[1].dark_color.expect("arm has a dark color");
    assert_all_approx(&dark, &[0.5, 0.25, 1.0]);
}

#[test]
fn draw_order_timeline_reorders_slots() {
    let mut skeleton = rig();
    let order = Timeline::DrawOrder {
        times: vec![0.0, 1.0],
        orders: vec![vec![1, 0], Vec::new()],
    };
    apply(&mut skeleton, &order, 0.5, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.draw_order, [1, 0]);

    apply(&mut skeleton, &order, 0.5, 1.0, MixBlend::Replace, MixDirection::Out);
    assert_eq!(skeleton.draw_order, [1, 0]);
    apply(&mut skeleton, &order, 0.5, 1.0, MixBlend::Setup, MixDirection::Out);
    assert_eq!(skeleton.draw_order, [0, 1]);

    apply(&mut skeleton, &order, 0.5, 1.0, MixBlend::Replace, MixDirection::In);
    // An empty order is the setup order.
    apply(&mut skeleton, &order, 1.5, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.draw_order, [0, 1]);
}

fn event(time: f32, int_value: i32) -> Event {
    Event {
        data: 0,
        time,
        int_value,
        float_value: 0.0,
        string_value: None,
        volume: 1.0,
        balance: 0.0,
    }
}

fn fired(animation: &Animation, last_time: f32, time: f32, looped: bool) -> Vec<i32> {
    let mut skeleton = rig();
    let mut events = Vec::new();
    animation.apply(
        &mut skeleton,
        last_time,
        time,
        looped,
        Some(&mut events),
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    events.iter().map(|e| e.int_value).collect()
}

#[test]
fn events_fire_once_between_last_time_and_time() {
    let steps = animation(vec![Timeline::Event {
        times: vec![0.0, 0.5, 1.0],
        events: vec![event(0.0, 0), event(0.5, 1), event(1.0, 2)],
    }]);

    assert_eq!(fired(&steps, -1.0, 0.0, false), [0]);
    assert_eq!(fired(&steps, 0.0, 0.25, false), Vec::<i32>::new());
    assert_eq!(fired(&steps, 0.25, 0.75, false), [1]);
    assert_eq!(fired(&steps, 0.5, 1.0, false), [2]);
    assert_eq!(fired(&steps, 1.0, 2.0, false), Vec::<i32>::new());
    // A loop wrap fires the tail of the previous pass before the head of the next.
    assert_eq!(fired(&steps, 0.75, 1.25, true), [2, 0]);
}

#[test]
fn deform_keys_unweighted_meshes_in_absolute_positions() {
    let mut skeleton = rig();
    let bend = Timeline::Deform(DeformTimeline {
        slot: 1,
        attachment: 3,
        times: vec![0.0, 1.0],
        curves: vec![Default::default(); 2],
        vertices: vec![
            vec![0.0, 0.0, 10.0, 0.0, 0.0, 10.0],
            vec![0.0, 0.0, 20.0, 0.0, 0.0, 20.0],
        ],
    });

    // An empty deform is always set from the setup pose, even when adding.
    apply(&mut skeleton, &bend, 0.5, 1.0, MixBlend::Add, MixDirection::In);
    assert_all_approx(&skeleton.slots[1].deform, &[0.0, 0.0, 15.0, 0.0, 0.0, 15.0]);

    apply(&mut skeleton, &bend, 1.0, 0.5, MixBlend::Setup, MixDirection::In);
    assert_all_approx(&skeleton.slots[1].deform, &[0.0, 0.0, 15.0, 0.0, 0.0, 15.0]);

    apply(&mut skeleton, &bend, 1.0, 1.0, MixBlend::Replace, MixDirection::In);
    skeleton.update_world_transform(Physics::None);
    let world = skeleton.slot_world_vertices(1).expect("mesh vertices");
    assert_all_approx(&world, &[0.0, 0.0, 20.0, 0.0, 0.0, 20.0]);
}

#[test]
fn deform_keys_weighted_meshes_as_offsets() {
    let mut skeleton = rig();
    skeleton.set_attachment("arm", Some("w")).expect("weighted mesh");
    let nudge = Timeline::Deform(DeformTimeline {
        slot: 1,
        attachment: 4,
        times: vec![0.0],
        curves: vec![Default::default()],
        vertices: vec![vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]],
    });

    apply(&mut skeleton, &nudge, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    assert_all_approx(&skeleton.slots[1].deform, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    apply(&mut skeleton, &nudge, 0.0, 1.0, MixBlend::Add, MixDirection::In);
    assert_all_approx(&skeleton.slots[1].deform, &[2.0, 4.0, 6.0, 8.0, 10.0, 12.0]);

    skeleton.update_world_transform(Physics::None);
    let world = skeleton.slot_world_vertices(1).expect("mesh vertices");
    assert_all_approx(&world, &[2.0, 4.0, 16.0, 8.0, 10.0, 22.0]);
}

#[test]
fn deform_for_another_attachment_is_ignored() {
    let mut skeleton = rig();
    let other = Timeline::Deform(DeformTimeline {
        slot: 1,
        attachment: 99,
        times: vec![0.0],
        curves: vec![Default::default()],
        vertices: vec![vec![1.0; 6]],
    });
    apply(&mut skeleton, &other, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    assert!(skeleton.slots[1].deform.is_empty());
}

fn sequence_index(mode: SequenceMode, time: f32) -> i32 {
    let mut skeleton = rig();
    skeleton.set_attachment("body", Some("seq")).expect("sequence region");
    let flipbook = Timeline::Sequence {
        slot: 0,
        attachment: 5,
        times: vec![0.0],
        keys: vec![SequenceKey {
            mode,
            index: 0,
            delay: 0.1,
        }],
    };
    apply(&mut skeleton, &flipbook, time, 1.0, MixBlend::Replace, MixDirection::In);
    skeleton.slots[0].sequence_index
}

#[test]
fn sequence_timeline_advances_frames_by_mode() {
    assert_eq!(sequence_index(SequenceMode::Hold, 0.55), 0);
    assert_eq!(sequence_index(SequenceMode::Loop, 0.25), 2);
    assert_eq!(sequence_index(SequenceMode::Loop, 0.55), 1);
    assert_eq!(sequence_index(SequenceMode::Once, 0.9), 3);
    assert_eq!(sequence_index(SequenceMode::PingPong, 0.45), 2);
    assert_eq!(sequence_index(SequenceMode::OnceReverse, 0.1), 2);
    assert_eq!(sequence_index(SequenceMode::OnceReverse, 0.9), 0);
    assert_eq!(sequence_index(SequenceMode::LoopReverse, 0.1), 2);
}

#[test]
fn sequence_timeline_restores_the_setup_frame() {
    let mut skeleton = rig();
    skeleton.set_attachment("body", Some("seq")).expect("sequence region");
    let flipbook = Timeline::Sequence {
        slot: 0,
        attachment: 5,
        times: vec![0.5],
        keys: vec![SequenceKey {
            mode: SequenceMode::Hold,
            index: 2,
            delay: 0.1,
        }],
    };
    apply(&mut skeleton, &flipbook, 0.5, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.slots[0].sequence_index, 2);
    apply(&mut skeleton, &flipbook, 0.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_eq!(skeleton.slots[0].sequence_index, 2);
    apply(&mut skeleton, &flipbook, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    assert_eq!(skeleton.slots[0].sequence_index, -1);
}

#[test]
fn constraint_timelines_mix_constraint_values() {
    let mut data = rig_data();
    data.bones.push(BoneData::new("target", Some(0)));
    data.ik_constraints.push(IkConstraintData {
        name: "reach".to_string(),
        order: 0,
        skin_required: false,
        bones: vec![1],
        target: 2,
        bend_direction: 1,
        compress: false,
        stretch: false,
        uniform: false,
        mix: 1.0,
        softness: 0.0,
    });
    data.transform_constraints.push(TransformConstraintData {
        name: "follow".to_string(),
        order: 1,
        bones: vec![1],
        target: 2,
        ..TransformConstraintData::default()
    });
    let mut skeleton = Skeleton::new(Arc::new(data));

    let reach = Timeline::IkConstraint {
        constraint: 0,
        frames: frames(&[(0.0, [0.5, 2.0])]),
        keys: vec![IkKey {
            bend_direction: -1,
            compress: true,
            stretch: false,
        }],
    };
    apply(&mut skeleton, &reach, 0.0, 1.0, MixBlend::Setup, MixDirection::In);
    let ik = &skeleton.ik_constraints[0];
    assert_approx(ik.mix, 0.5);
    assert_approx(ik.softness, 2.0);
    assert_eq!(ik.bend_direction, -1);
    assert!(ik.compress);

    apply(&mut skeleton, &reach, 0.0, 0.5, MixBlend::Setup, MixDirection::Out);
    let ik = &skeleton.ik_constraints[0];
    assert_approx(ik.mix, 0.75);
    assert_eq!(ik.bend_direction, 1);
    assert!(!ik.compress);

    let follow = Timeline::TransformConstraint {
        constraint: 0,
        frames: frames(&[(0.0, [1.0, 0.5, 0.5, 0.0, 0.0, 0.0])]),
    };
    apply(&mut skeleton, &follow, 0.0, 0.5, MixBlend::Setup, MixDirection::In);
    let transform = &skeleton.transform_constraints[0];
    assert_approx(transform.mix_rotate, 0.5);
    assert_approx(transform.mix_x, 0.25);
    assert_approx(transform.mix_y, 0.25);
    assert_approx(transform.mix_scale_x, 0.0);
}

fn physics_rig() -> Skeleton {
    let mut data = rig_data();
    let mut sway = PhysicsConstraintData::new("sway", 1);
    sway.x = 1.0;
    sway.wind_global = true;
    data.physics_constraints.push(sway);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform(Physics::Update);
    skeleton
}

#[test]
fn physics_timelines_set_properties() {
    let mut skeleton = physics_rig();
    let mass = Timeline::Physics {
        constraint: Some(0),
        property: PhysicsProperty::Mass,
        frames: frames(&[(0.0, [4.0])]),
    };
    apply(&mut skeleton, &mass, 0.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.physics_constraints[0].mass_inverse, 0.25);

    let wind = Timeline::Physics {
        constraint: None,
        property: PhysicsProperty::Wind,
        frames: frames(&[(0.0, [3.0])]),
    };
    apply(&mut skeleton, &wind, 0.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.physics_constraints[0].wind, 3.0);

    // Gravity is not global for this constraint.
    let gravity = Timeline::Physics {
        constraint: None,
        property: PhysicsProperty::Gravity,
        frames: frames(&[(0.0, [3.0])]),
    };
    apply(&mut skeleton, &gravity, 0.0, 1.0, MixBlend::Replace, MixDirection::In);
    assert_approx(skeleton.physics_constraints[0].gravity, 0.0);
}

#[test]
fn physics_reset_timeline_fires_when_crossed() {
    let mut skeleton = physics_rig();
    skeleton.bones[1].x = 10.0;
    skeleton.update(1.0 / 60.0);
    skeleton.update_world_transform(Physics::Update);
    assert!(skeleton.physics_constraints[0].offsets()[0] != 0.0);

    let reset = Timeline::PhysicsReset {
        constraint: None,
        times: vec![0.5],
    };
    reset.apply(
        &mut skeleton,
        0.0,
        0.25,
        None,
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    assert!(skeleton.physics_constraints[0].offsets()[0] != 0.0);

    reset.apply(
        &mut skeleton,
        0.25,
        0.75,
        None,
        1.0,
        MixBlend::Replace,
        MixDirection::In,
    );
    assert_eq!(skeleton.physics_constraints[0].offsets(), [0.0; 4]);
}

#[test]
fn animations_are_found_by_name() {
    let mut data = rig_data();
    data.animations.push(animation(Vec::new()));
    assert_eq!(data.animation_by_name("test").map(|a| a.duration).ok(), Some(0.0));
    assert!(matches!(
        data.animation_by_name("run"),
        Err(Error::UnknownAnimation { name }) if name == "run"
    ));
}
