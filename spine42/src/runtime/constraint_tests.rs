use crate::{
    Attachment, BoneData, IkConstraintData, MeshVertices, PathAttachment, PathConstraintData,
    Physics, PositionMode, RotateMode, Skeleton, SkeletonData, SkinData, SlotData, SpacingMode,
    TransformConstraintData, VertexData,
};
use std::sync::Arc;

fn assert_near(actual: f32, expected: f32, eps: f32) {
    let diff = (actual - expected).abs();
    assert!(diff <= eps, "expected {expected}, got {actual} (diff {diff})");
}

fn assert_approx(actual: f32, expected: f32) {
    assert_near(actual, expected, 1.0e-3);
}

fn bone(name: &str, parent: Option<usize>, x: f32, y: f32, length: f32) -> BoneData {
    let mut data = BoneData::new(name, parent);
    data.x = x;
    data.y = y;
    data.length = length;
    data
}

fn ik(bones: Vec<usize>, target: usize) -> IkConstraintData {
    IkConstraintData {
        name: "ik".to_string(),
        order: 0,
        skin_required: false,
        bones,
        target,
        bend_direction: 1,
        compress: false,
        stretch: false,
        uniform: false,
        mix: 1.0,
        softness: 0.0,
    }
}

/// Root, one 10-long arm and an IK target placed at `target`.
fn one_bone_rig(target: [f32; 2], configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 0.0),
            bone("arm", Some(0), 0.0, 0.0, 10.0),
            bone("target", Some(0), target[0], target[1], 0.0),
        ],
        ..SkeletonData::default()
    };
    let mut constraint = ik(vec![1], 2);
    configure(&mut constraint);
    data.ik_constraints.push(constraint);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform(Physics::None);
    skeleton
}

/// Root, a 10-long upper arm with a 10-long forearm, and an IK target.
fn two_bone_rig(target: [f32; 2], configure: impl FnOnce(&mut IkConstraintData)) -> Skeleton {
    let mut data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 0.0),
            bone("upper", Some(0), 0.0, 0.0, 10.0),
            bone("lower", Some(1), 10.0, 0.0, 10.0),
            bone("target", Some(0), target[0], target[1], 0.0),
        ],
        ..SkeletonData::default()
    };
    let mut constraint = ik(vec![1, 2], 3);
    configure(&mut constraint);
    data.ik_constraints.push(constraint);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform(Physics::None);
    skeleton
}

fn tip(skeleton: &Skeleton, index: usize) -> [f32; 2] {
    let length = skeleton.data.bones[index].length;
    skeleton.bones[index].local_to_world([length, 0.0])
}

#[test]
fn one_bone_ik_points_at_the_target() {
    let skeleton = one_bone_rig([0.0, 10.0], |_| {});
    assert_approx(skeleton.bones[1].world_rotation_x(), 90.0);
    assert_approx(skeleton.bones[1].arotation, 90.0);

    let half = one_bone_rig([0.0, 10.0], |c| c.mix = 0.5);
    assert_approx(half.bones[1].world_rotation_x(), 45.0);

    let off = one_bone_rig([0.0, 10.0], |c| c.mix = 0.0);
    assert_approx(off.bones[1].world_rotation_x(), 0.0);
}

#[test]
fn one_bone_ik_stretches_and_compresses() {
    let far = one_bone_rig([20.0, 0.0], |c| c.stretch = true);
    assert_approx(far.bones[1].world_scale_x(), 2.0);
    assert_approx(far.bones[1].world_scale_y(), 1.0);

    let uniform = one_bone_rig([20.0, 0.0], |c| {
        c.stretch = true;
        c.uniform = true;
    });
    assert_approx(uniform.bones[1].world_scale_y(), 2.0);

    let near = one_bone_rig([5.0, 0.0], |c| c.compress = true);
    assert_approx(near.bones[1].world_scale_x(), 0.5);

    // Stretch alone never shrinks the bone.
    let near_stretch = one_bone_rig([5.0, 0.0], |c| c.stretch = true);
    assert_approx(near_stretch.bones[1].world_scale_x(), 1.0);
}

#[test]
fn two_bone_ik_reaches_with_either_bend() {
    let bent = two_bone_rig([10.0, 10.0], |_| {});
    let [x, y] = tip(&bent, 2);
    assert_approx(x, 10.0);
    assert_approx(y, 10.0);
    assert_approx(bent.bones[1].world_rotation_x(), 0.0);
    assert_approx(bent.bones[2].world_rotation_x(), 90.0);

    let flipped = two_bone_rig([10.0, 10.0], |c| c.bend_direction = -1);
    let [x, y] = tip(&flipped, 2);
    assert_approx(x, 10.0);
    assert_approx(y, 10.0);
    assert_approx(flipped.bones[1].world_rotation_x(), 90.0);
    assert_approx(flipped.bones[2].world_rotation_x(), 0.0);
}

#[test]
fn two_bone_ik_straightens_or_stretches_toward_far_targets() {
    let straight = two_bone_rig([30.0, 0.0], |_| {});
    let [x, y] = tip(&straight, 2);
    assert_approx(x, 20.0);
    assert_approx(y, 0.0);

    let stretched = two_bone_rig([30.0, 0.0], |c| c.stretch = true);
    assert_approx(stretched.bones[1].world_scale_x(), 1.5);
    let [x, y] = tip(&stretched, 2);
    assert_approx(x, 30.0);
    assert_approx(y, 0.0);
}

fn transform_rig(configure: impl FnOnce(&mut TransformConstraintData)) -> Skeleton {
    let mut target = bone("target", Some(0), 20.0, 30.0, 0.0);
    target.rotation = 45.0;
    let mut follower = bone("follower", Some(0), 0.0, 0.0, 0.0);
    follower.rotation = 10.0;
    let mut data = SkeletonData {
        bones: vec![bone("root", None, 0.0, 0.0, 0.0), target, follower],
        ..SkeletonData::default()
    };
    let mut constraint = TransformConstraintData {
        name: "copy".to_string(),
        bones: vec![2],
        target: 1,
        ..TransformConstraintData::default()
    };
    configure(&mut constraint);
    data.transform_constraints.push(constraint);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform(Physics::None);
    skeleton
}

#[test]
fn world_transform_constraint_copies_rotation_and_position() {
    let copied = transform_rig(|c| {
        c.mix_rotate = 1.0;
        c.mix_x = 1.0;
        c.mix_y = 1.0;
    });
    let follower = &copied.bones[2];
    assert_approx(follower.world_x, 20.0);
    assert_approx(follower.world_y, 30.0);
    assert_approx(follower.world_rotation_x(), 45.0);
    // The applied transform is rebuilt from the constrained world transform.
    assert_approx(follower.ax, 20.0);
    assert_approx(follower.arotation, 45.0);

    let partial = transform_rig(|c| {
        c.mix_rotate = 0.5;
        c.offset_rotation = 5.0;
    });
    assert_approx(partial.bones[2].world_rotation_x(), 10.0 + (45.0 + 5.0 - 10.0) * 0.5);
    assert_approx(partial.bones[2].world_x, 0.0);

    let relative = transform_rig(|c| {
        c.relative = true;
        c.mix_x = 1.0;
        c.offset_x = 2.0;
    });
    // Relative translation adds the target's world offset point.
    let target = &relative.bones[1];
    let [ox, oy] = target.local_to_world([2.0, 0.0]);
    assert_approx(relative.bones[2].world_x, ox);
    assert_approx(relative.bones[2].world_y, 0.0);
    assert!(oy > 30.0);
}

#[test]
fn local_transform_constraint_mixes_applied_values() {
    let absolute = transform_rig(|c| {
        c.local = true;
        c.mix_rotate = 0.5;
        c.offset_rotation = 5.0;
    });
    assert_approx(absolute.bones[2].arotation, 10.0 + (45.0 - 10.0 + 5.0) * 0.5);

    let relative = transform_rig(|c| {
        c.local = true;
        c.relative = true;
        c.mix_rotate = 1.0;
        c.mix_y = 0.5;
    });
    assert_approx(relative.bones[2].arotation, 55.0);
    assert_approx(relative.bones[2].ay, 15.0);
    assert_approx(relative.bones[2].world_y, 15.0);
}

/// A straight path from (0, 0) to (100, 0) with evenly spaced handles.
fn rail(constant_speed: bool) -> PathAttachment {
    PathAttachment {
        name: "rail".to_string(),
        vertex: VertexData {
            id: 1,
            timeline_id: 1,
            vertices: MeshVertices::Unweighted(vec![
                [-10.0, 0.0],
                [0.0, 0.0],
                [100.0 / 3.0, 0.0],
                [200.0 / 3.0, 0.0],
                [100.0, 0.0],
                [110.0, 0.0],
            ]),
            world_vertices_length: 12,
        },
        closed: false,
        constant_speed,
        lengths: vec![100.0, 110.0],
        color: [1.0; 4],
    }
}

fn path_rig(constant_speed: bool, configure: impl FnOnce(&mut PathConstraintData)) -> Skeleton {
    let mut data = SkeletonData {
        bones: vec![
            bone("root", None, 0.0, 0.0, 0.0),
            bone("head", Some(0), 0.0, 5.0, 10.0),
            bone("tail", Some(1), 10.0, 0.0, 10.0),
        ],
        ..SkeletonData::default()
    };
    let mut slot = SlotData::new("rail", 0);
    slot.attachment = Some("rail".to_string());
    data.slots.push(slot);
    let mut skin = SkinData::new("default", 1);
    skin.set_attachment(0, "rail", Attachment::Path(rail(constant_speed)));
    data.skins.push(skin);
    data.default_skin = Some(0);

    let mut constraint = PathConstraintData {
        name: "follow".to_string(),
        order: 0,
        skin_required: false,
        bones: vec![1, 2],
        target: 0,
        position_mode: PositionMode::Fixed,
        spacing_mode: SpacingMode::Length,
        rotate_mode: RotateMode::Tangent,
        offset_rotation: 0.0,
        position: 20.0,
        spacing: 0.0,
        mix_rotate: 1.0,
        mix_x: 1.0,
        mix_y: 1.0,
    };
    configure(&mut constraint);
    data.path_constraints.push(constraint);
    let mut skeleton = Skeleton::new(Arc::new(data));
    skeleton.update_world_transform(Physics::None);
    skeleton
}

#[test]
fn path_constraint_places_a_chain_along_the_path() {
    let skeleton = path_rig(false, |_| {});
    assert_approx(skeleton.bones[1].world_x, 20.0);
    assert_approx(skeleton.bones[1].world_y, 0.0);
    assert_approx(skeleton.bones[2].world_x, 30.0);
    assert_approx(skeleton.bones[2].world_y, 0.0);
    assert_approx(skeleton.bones[1].world_rotation_x(), 0.0);

    let percent = path_rig(false, |c| {
        c.position_mode = PositionMode::Percent;
        c.position = 0.5;
        c.spacing = 5.0;
    });
    assert_approx(percent.bones[1].world_x, 50.0);
    assert_approx(percent.bones[2].world_x, 65.0);

    let half = path_rig(false, |c| c.mix_x = 0.5);
    assert_approx(half.bones[1].world_x, 10.0);
    assert_approx(half.bones[1].world_y, 0.0);
}

#[test]
fn constant_speed_paths_measure_arc_length() {
    let skeleton = path_rig(true, |_| {});
    assert_near(skeleton.bones[1].world_x, 20.0, 0.01);
    assert_near(skeleton.bones[2].world_x, 30.0, 0.01);

    // Past the end the chain continues along the last tangent.
    let beyond = path_rig(true, |c| c.position = 105.0);
    assert_near(beyond.bones[1].world_x, 105.0, 0.01);
    assert_near(beyond.bones[2].world_x, 115.0, 0.01);
    assert_near(beyond.bones[2].world_y, 0.0, 0.01);
}
