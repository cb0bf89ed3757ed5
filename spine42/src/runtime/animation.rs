use crate::{
    Animation, Attachment, BoneData, BoneProperty, BonePairProperty, CurveFrames,
    DeformTimeline, Event, IkKey, PhysicsConstraintData, PhysicsProperty, SequenceKey,
    SequenceMode, Timeline, TransformMode,
};
use crate::timeline::{curve_percent, search};
use std::sync::Arc;

use super::skeleton::{Bone, Skeleton};
use super::PhysicsConstraint;

/// How a timeline's value is combined with the current pose.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixBlend {
    /// Mix between the setup pose and the timeline value. Before the first frame the setup
    /// pose is set.
    Setup,
    /// Mix between the current pose and the timeline value, where before the first frame
    /// the current pose is mixed toward the setup pose.
    First,
    /// Mix between the current pose and the timeline value. Before the first frame nothing
    /// changes.
    Replace,
    /// Add the timeline value, relative to the setup pose, to the current pose.
    Add,
}

/// Whether the animation is being mixed in or out, which decides how discrete values
/// (attachments, draw order, inherit modes) are applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MixDirection {
    In,
    Out,
}

impl Animation {
    /// Applies every timeline at `time`. Events between `last_time` (exclusive) and `time`
    /// (inclusive) are appended to `events` when given. With `looped`, both times wrap at
    /// the animation's duration and events keyed before the wrap still fire.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        mut last_time: f32,
        mut time: f32,
        looped: bool,
        mut events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        if looped && self.duration != 0.0 {
            time %= self.duration;
            if last_time > 0.0 {
                last_time %= self.duration;
            }
        }
        for timeline in &self.timelines {
            timeline.apply(
                skeleton,
                last_time,
                time,
                events.as_deref_mut(),
                alpha,
                blend,
                direction,
            );
        }
    }
}

impl Timeline {
    /// Applies this timeline's value at `time` to the skeleton.
    #[allow(clippy::too_many_arguments)]
    pub fn apply(
        &self,
        skeleton: &mut Skeleton,
        last_time: f32,
        time: f32,
        events: Option<&mut Vec<Event>>,
        alpha: f32,
        blend: MixBlend,
        direction: MixDirection,
    ) {
        match self {
            Self::Attachment { slot, times, names } => {
                apply_attachment(skeleton, *slot, times, names, time, blend, direction)
            }
            Self::Rgba { slot, frames } => {
                apply_color(skeleton, *slot, frames, time, alpha, blend, 0..4, None)
            }
            Self::Rgb { slot, frames } => {
                apply_color(skeleton, *slot, frames, time, alpha, blend, 0..3, None)
            }
            Self::Rgba2 { slot, frames } => {
                apply_color(skeleton, *slot, frames, time, alpha, blend, 0..4, Some(4))
            }
            Self::Rgb2 { slot, frames } => {
                apply_color(skeleton, *slot, frames, time, alpha, blend, 0..3, Some(3))
            }
            Self::Alpha { slot, frames } => {
                apply_color(skeleton, *slot, frames, time, alpha, blend, 3..4, None)
            }
            Self::Bone {
                bone,
                property,
                frames,
            } => apply_bone(
                skeleton, *bone, *property, frames, time, alpha, blend, direction,
            ),
            Self::BonePair {
                bone,
                property,
                frames,
            } => apply_bone_pair(
                skeleton, *bone, *property, frames, time, alpha, blend, direction,
            ),
            Self::Inherit { bone, times, modes } => {
                apply_inherit(skeleton, *bone, times, modes, time, blend, direction)
            }
            Self::IkConstraint {
                constraint,
                frames,
                keys,
            } => apply_ik(
                skeleton,
                *constraint,
                frames,
                keys,
                time,
                alpha,
                blend,
                direction,
            ),
            Self::TransformConstraint { constraint, frames } => {
                apply_transform_mix(skeleton, *constraint, frames, time, alpha, blend)
            }
            Self::PathPosition { constraint, frames } => {
                apply_path_value(skeleton, *constraint, frames, time, alpha, blend, false)
            }
            Self::PathSpacing { constraint, frames } => {
                apply_path_value(skeleton, *constraint, frames, time, alpha, blend, true)
            }
            Self::PathMix { constraint, frames } => {
                apply_path_mix(skeleton, *constraint, frames, time, alpha, blend)
            }
            Self::Physics {
                constraint,
                property,
                frames,
            } => apply_physics(skeleton, *constraint, *property, frames, time, alpha, blend),
            Self::PhysicsReset { constraint, times } => {
                apply_physics_reset(skeleton, *constraint, times, last_time, time)
            }
            Self::Deform(timeline) => apply_deform(skeleton, timeline, time, alpha, blend),
            Self::Sequence {
                slot,
                attachment,
                times,
                keys,
            } => apply_sequence(
                skeleton,
                *slot,
                *attachment,
                times,
                keys,
                time,
                blend,
                direction,
            ),
            Self::DrawOrder { times, orders } => {
                apply_draw_order(skeleton, times, orders, time, blend, direction)
            }
            Self::Event { times, events: keyed } => {
                if let Some(fired) = events {
                    collect_events(times, keyed, last_time, time, fired);
                }
            }
        }
    }
}

/// Value before the first frame: the setup value for `Setup`, a mix toward it for `First`,
/// and the current value otherwise.
fn before_first(current: f32, setup: f32, alpha: f32, blend: MixBlend) -> f32 {
    match blend {
        MixBlend::Setup => setup,
        MixBlend::First => current + (setup - current) * alpha,
        MixBlend::Replace | MixBlend::Add => current,
    }
}

/// Combines a value keyed relative to the setup pose. `None` means before the first frame.
fn relative_value(value: Option<f32>, current: f32, setup: f32, alpha: f32, blend: MixBlend) -> f32 {
    let Some(value) = value else {
        return before_first(current, setup, alpha, blend);
    };
    match blend {
        MixBlend::Setup => setup + value * alpha,
        MixBlend::First | MixBlend::Replace => current + (value + setup - current) * alpha,
        MixBlend::Add => current + value * alpha,
    }
}

/// Combines a value keyed in absolute terms. `None` means before the first frame.
fn absolute_value(value: Option<f32>, current: f32, setup: f32, alpha: f32, blend: MixBlend) -> f32 {
    let Some(value) = value else {
        return before_first(current, setup, alpha, blend);
    };
    if blend == MixBlend::Setup {
        setup + (value - setup) * alpha
    } else {
        current + (value - current) * alpha
    }
}

/// Combines a scale keyed as a multiple of the setup scale. While mixing, the sign flips
/// instantly instead of passing through zero.
fn scale_value(
    value: Option<f32>,
    current: f32,
    setup: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) -> f32 {
    let Some(value) = value else {
        return before_first(current, setup, alpha, blend);
    };
    let value = value * setup;
    if alpha == 1.0 {
        return if blend == MixBlend::Add {
            current + value - setup
        } else {
            value
        };
    }
    match (direction, blend) {
        (MixDirection::Out, MixBlend::Setup) => {
            setup + (value.abs() * signum(setup) - setup) * alpha
        }
        (MixDirection::Out, MixBlend::First | MixBlend::Replace) => {
            current + (value.abs() * signum(current) - current) * alpha
        }
        (MixDirection::In, MixBlend::Setup) => {
            let s = setup.abs() * signum(value);
            s + (value - s) * alpha
        }
        (MixDirection::In, MixBlend::First | MixBlend::Replace) => {
            let s = current.abs() * signum(value);
            s + (value - s) * alpha
        }
        (_, MixBlend::Add) => current + (value - setup) * alpha,
    }
}

fn signum(value: f32) -> f32 {
    if value == 0.0 { 0.0 } else { value.signum() }
}

fn frame_index(times: &[f32], time: f32) -> Option<usize> {
    match times.first() {
        Some(&first) if time >= first => Some(search(times, time)),
        _ => None,
    }
}

fn bone_channel(bone: &mut Bone, property: BoneProperty) -> &mut f32 {
    match property {
        BoneProperty::Rotate => &mut bone.rotation,
        BoneProperty::X => &mut bone.x,
        BoneProperty::Y => &mut bone.y,
        BoneProperty::ScaleX => &mut bone.scale_x,
        BoneProperty::ScaleY => &mut bone.scale_y,
        BoneProperty::ShearX => &mut bone.shear_x,
        BoneProperty::ShearY => &mut bone.shear_y,
    }
}

fn bone_setup(data: &BoneData, property: BoneProperty) -> f32 {
    match property {
        BoneProperty::Rotate => data.rotation,
        BoneProperty::X => data.x,
        BoneProperty::Y => data.y,
        BoneProperty::ScaleX => data.scale_x,
        BoneProperty::ScaleY => data.scale_y,
        BoneProperty::ShearX => data.shear_x,
        BoneProperty::ShearY => data.shear_y,
    }
}

fn pair_channels(property: BonePairProperty) -> [BoneProperty; 2] {
    match property {
        BonePairProperty::Translate => [BoneProperty::X, BoneProperty::Y],
        BonePairProperty::Scale => [BoneProperty::ScaleX, BoneProperty::ScaleY],
        BonePairProperty::Shear => [BoneProperty::ShearX, BoneProperty::ShearY],
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_bone_channel(
    bone: &mut Bone,
    data: &BoneData,
    property: BoneProperty,
    value: Option<f32>,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let setup = bone_setup(data, property);
    let current = bone_channel(bone, property);
    *current = match property {
        BoneProperty::ScaleX | BoneProperty::ScaleY => {
            scale_value(value, *current, setup, alpha, blend, direction)
        }
        _ => relative_value(value, *current, setup, alpha, blend),
    };
}

#[allow(clippy::too_many_arguments)]
fn apply_bone(
    skeleton: &mut Skeleton,
    bone: usize,
    property: BoneProperty,
    frames: &CurveFrames<1>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(bone) = skeleton.bones.get_mut(bone).filter(|b| b.active) else {
        return;
    };
    let bone_data = &data.bones[bone.data_index()];
    let value = frames.sample1(time);
    apply_bone_channel(bone, bone_data, property, value, alpha, blend, direction);
}

#[allow(clippy::too_many_arguments)]
fn apply_bone_pair(
    skeleton: &mut Skeleton,
    bone: usize,
    property: BonePairProperty,
    frames: &CurveFrames<2>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(bone) = skeleton.bones.get_mut(bone).filter(|b| b.active) else {
        return;
    };
    let bone_data = &data.bones[bone.data_index()];
    let value = frames.sample(time);
    for (channel, property) in pair_channels(property).into_iter().enumerate() {
        let value = value.map(|v| v[channel]);
        apply_bone_channel(bone, bone_data, property, value, alpha, blend, direction);
    }
}

fn apply_inherit(
    skeleton: &mut Skeleton,
    bone: usize,
    times: &[f32],
    modes: &[TransformMode],
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(bone) = skeleton.bones.get_mut(bone).filter(|b| b.active) else {
        return;
    };
    let setup = data.bones[bone.data_index()].transform_mode;
    if direction == MixDirection::Out {
        if blend == MixBlend::Setup {
            bone.inherit = setup;
        }
        return;
    }
    match frame_index(times, time) {
        Some(i) => bone.inherit = modes[i],
        None if matches!(blend, MixBlend::Setup | MixBlend::First) => bone.inherit = setup,
        None => {}
    }
}

/// Blends `channels` of the slot's light color, and the dark color from `dark_offset` on,
/// toward the sampled frame values. Colors stay within `0..=1`.
#[allow(clippy::too_many_arguments)]
fn apply_color<const N: usize>(
    skeleton: &mut Skeleton,
    slot: usize,
    frames: &CurveFrames<N>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    channels: std::ops::Range<usize>,
    dark_offset: Option<usize>,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(slot) = skeleton.slots.get_mut(slot) else {
        return;
    };
    if !skeleton.bones[slot.bone].active {
        return;
    }
    let slot_data = &data.slots[slot.data_index()];
    let value = frames.sample(time);
    let light_len = channels.len();

    let light_value = value.as_ref().map(|v| &v[..light_len]);
    blend_color(
        &mut slot.color[channels.clone()],
        &slot_data.color[channels],
        light_value,
        alpha,
        blend,
    );

    if let Some(offset) = dark_offset {
        let (Some(dark), Some(setup_dark)) = (slot.dark_color.as_mut(), slot_data.dark_color)
        else {
            return;
        };
        let dark_value = value.as_ref().map(|v| &v[offset..]);
        blend_color(dark, &setup_dark, dark_value, alpha, blend);
    }
}

fn blend_color(
    color: &mut [f32],
    setup: &[f32],
    value: Option<&[f32]>,
    alpha: f32,
    blend: MixBlend,
) {
    match value {
        None => match blend {
            MixBlend::Setup => color.copy_from_slice(setup),
            MixBlend::First => {
                for (c, s) in color.iter_mut().zip(setup) {
                    *c += (s - *c) * alpha;
                }
            }
            MixBlend::Replace | MixBlend::Add => return,
        },
        Some(value) if alpha == 1.0 => color.copy_from_slice(value),
        Some(value) => {
            if blend == MixBlend::Setup {
                color.copy_from_slice(setup);
            }
            for (c, v) in color.iter_mut().zip(value) {
                *c += (v - *c) * alpha;
            }
        }
    }
    for c in color {
        *c = c.clamp(0.0, 1.0);
    }
}

fn apply_attachment(
    skeleton: &mut Skeleton,
    slot: usize,
    times: &[f32],
    names: &[Option<String>],
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(s) = skeleton.slots.get(slot) else {
        return;
    };
    if !skeleton.bones[s.bone].active {
        return;
    }
    let setup = data.slots[s.data_index()].attachment.as_deref();
    let name = if direction == MixDirection::Out {
        if blend != MixBlend::Setup {
            return;
        }
        setup
    } else {
        match frame_index(times, time) {
            Some(i) => names[i].as_deref(),
            None if matches!(blend, MixBlend::Setup | MixBlend::First) => setup,
            None => return,
        }
    };
    let key = name.and_then(|name| skeleton.find_attachment(slot, name));
    skeleton.set_slot_attachment(slot, key);
}

fn apply_deform(
    skeleton: &mut Skeleton,
    timeline: &DeformTimeline,
    time: f32,
    alpha: f32,
    mut blend: MixBlend,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(slot) = skeleton.slots.get(timeline.slot) else {
        return;
    };
    if !skeleton.bones[slot.bone].active {
        return;
    }
    let Some(vertex) = slot
        .attachment
        .as_ref()
        .and_then(|key| data.skins.get(key.skin)?.attachment(timeline.slot, &key.name))
        .and_then(Attachment::vertex_data)
    else {
        return;
    };
    if vertex.timeline_id != timeline.attachment {
        return;
    }
    let Some(first_vertices) = timeline.vertices.first() else {
        return;
    };
    // Unweighted deforms are absolute positions; weighted ones are offsets from zero.
    let setup = vertex.vertices.unweighted_flat();
    let vertex_count = first_vertices.len();

    let deform = &mut skeleton.slots[timeline.slot].deform;
    if deform.is_empty() {
        blend = MixBlend::Setup;
    }

    let Some(i) = frame_index(&timeline.times, time) else {
        match blend {
            MixBlend::Setup => deform.clear(),
            MixBlend::First => {
                if alpha == 1.0 {
                    deform.clear();
                    return;
                }
                deform.resize(vertex_count, 0.0);
                match setup {
                    Some(setup) => {
                        for (d, s) in deform.iter_mut().zip(setup) {
                            *d += (s - *d) * alpha;
                        }
                    }
                    None => {
                        let alpha = 1.0 - alpha;
                        for d in deform.iter_mut() {
                            *d *= alpha;
                        }
                    }
                }
            }
            MixBlend::Replace | MixBlend::Add => {}
        }
        return;
    };

    deform.resize(vertex_count, 0.0);
    let last = timeline.times.len() - 1;
    if i == last {
        apply_deform_vertices(deform, setup, &timeline.vertices[last], alpha, blend);
        return;
    }

    let percent = curve_percent(&timeline.times, &timeline.curves, i, time);
    let prev = &timeline.vertices[i];
    let next = &timeline.vertices[i + 1];
    let value: Vec<f32> = prev
        .iter()
        .zip(next)
        .map(|(p, n)| p + (n - p) * percent)
        .collect();
    apply_deform_vertices(deform, setup, &value, alpha, blend);
}

fn apply_deform_vertices(
    deform: &mut [f32],
    setup: Option<&[f32]>,
    value: &[f32],
    alpha: f32,
    blend: MixBlend,
) {
    let setup_at = |i: usize| setup.and_then(|s| s.get(i)).copied().unwrap_or(0.0);
    let value_at = |i: usize| value.get(i).copied().unwrap_or(0.0);

    if alpha == 1.0 {
        if blend == MixBlend::Add {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += value_at(i) - setup_at(i);
            }
        } else {
            for (i, d) in deform.iter_mut().enumerate() {
                *d = value_at(i);
            }
        }
        return;
    }

    match blend {
        MixBlend::Setup => {
            for (i, d) in deform.iter_mut().enumerate() {
                let s = setup_at(i);
                *d = s + (value_at(i) - s) * alpha;
            }
        }
        MixBlend::First | MixBlend::Replace => {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += (value_at(i) - *d) * alpha;
            }
        }
        MixBlend::Add => {
            for (i, d) in deform.iter_mut().enumerate() {
                *d += (value_at(i) - setup_at(i)) * alpha;
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_sequence(
    skeleton: &mut Skeleton,
    slot: usize,
    attachment: u32,
    times: &[f32],
    keys: &[SequenceKey],
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(s) = skeleton.slots.get(slot) else {
        return;
    };
    if !skeleton.bones[s.bone].active {
        return;
    }
    let Some(current) = s
        .attachment
        .as_ref()
        .and_then(|key| data.skins.get(key.skin)?.attachment(slot, &key.name))
    else {
        return;
    };
    if current.id() != attachment && current.timeline_id() != attachment {
        return;
    }
    let Some(sequence) = current.sequence() else {
        return;
    };

    let slot = &mut skeleton.slots[slot];
    if direction == MixDirection::Out {
        if blend == MixBlend::Setup {
            slot.sequence_index = -1;
        }
        return;
    }
    let Some(i) = frame_index(times, time) else {
        if matches!(blend, MixBlend::Setup | MixBlend::First) {
            slot.sequence_index = -1;
        }
        return;
    };
    let key = keys[i];
    slot.sequence_index = sequence_frame(key, time - times[i], sequence.count as i32);
}

/// Frame of a sequence `elapsed` seconds after `key`.
fn sequence_frame(key: SequenceKey, elapsed: f32, count: i32) -> i32 {
    let mut index = key.index;
    if key.mode == SequenceMode::Hold || count <= 0 {
        return index;
    }
    index = (index as f32 + elapsed / key.delay + 0.0001) as i32;
    let n = count * 2 - 2;
    match key.mode {
        SequenceMode::Hold => index,
        SequenceMode::Once => index.min(count - 1),
        SequenceMode::Loop => index % count,
        SequenceMode::PingPong => {
            let index = if n == 0 { 0 } else { index % n };
            if index >= count { n - index } else { index }
        }
        SequenceMode::OnceReverse => (count - 1 - index).max(0),
        SequenceMode::LoopReverse => count - 1 - index % count,
        SequenceMode::PingPongReverse => {
            let index = if n == 0 { 0 } else { (index + count - 1) % n };
            if index >= count { n - index } else { index }
        }
    }
}

fn apply_draw_order(
    skeleton: &mut Skeleton,
    times: &[f32],
    orders: &[Vec<usize>],
    time: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let slot_count = skeleton.slots.len();
    let order = if direction == MixDirection::Out {
        if blend != MixBlend::Setup {
            return;
        }
        None
    } else {
        match frame_index(times, time) {
            Some(i) => Some(orders[i].as_slice()).filter(|o| !o.is_empty()),
            None if matches!(blend, MixBlend::Setup | MixBlend::First) => None,
            None => return,
        }
    };
    skeleton.draw_order.clear();
    match order {
        Some(order) => skeleton.draw_order.extend_from_slice(order),
        None => skeleton.draw_order.extend(0..slot_count),
    }
}

/// Appends events keyed in `(last_time, time]`. When `last_time > time` the animation
/// looped, so events after `last_time` fire first, then events from the start.
fn collect_events(
    times: &[f32],
    events: &[Event],
    mut last_time: f32,
    time: f32,
    fired: &mut Vec<Event>,
) {
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return;
    };
    if last_time > time {
        collect_events(times, events, last_time, f32::MAX, fired);
        last_time = -1.0;
    } else if last_time >= last {
        return;
    }
    if time < first {
        return;
    }
    let mut i = if last_time < first {
        0
    } else {
        let mut i = search(times, last_time) + 1;
        if let Some(&frame_time) = times.get(i) {
            while i > 0 && times[i - 1] == frame_time {
                i -= 1;
            }
        }
        i
    };
    while i < times.len() && time >= times[i] {
        fired.push(events[i].clone());
        i += 1;
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_ik(
    skeleton: &mut Skeleton,
    constraint: usize,
    frames: &CurveFrames<2>,
    keys: &[IkKey],
    time: f32,
    alpha: f32,
    blend: MixBlend,
    direction: MixDirection,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(c) = skeleton
        .ik_constraints
        .get_mut(constraint)
        .filter(|c| c.active)
    else {
        return;
    };
    let d = &data.ik_constraints[c.data_index()];
    let setup_key = IkKey {
        bend_direction: d.bend_direction,
        compress: d.compress,
        stretch: d.stretch,
    };

    let Some(i) = frames.frame_index(time) else {
        match blend {
            MixBlend::Setup => {
                c.mix = d.mix;
                c.softness = d.softness;
            }
            MixBlend::First => {
                c.mix += (d.mix - c.mix) * alpha;
                c.softness += (d.softness - c.softness) * alpha;
            }
            MixBlend::Replace | MixBlend::Add => return,
        }
        c.bend_direction = setup_key.bend_direction;
        c.compress = setup_key.compress;
        c.stretch = setup_key.stretch;
        return;
    };

    let [mix, softness] = frames.value_at(i, time);
    let key = if blend == MixBlend::Setup {
        c.mix = d.mix + (mix - d.mix) * alpha;
        c.softness = d.softness + (softness - d.softness) * alpha;
        Some(if direction == MixDirection::Out {
            setup_key
        } else {
            keys[i]
        })
    } else {
        c.mix += (mix - c.mix) * alpha;
        c.softness += (softness - c.softness) * alpha;
        (direction == MixDirection::In).then(|| keys[i])
    };
    if let Some(key) = key {
        c.bend_direction = key.bend_direction;
        c.compress = key.compress;
        c.stretch = key.stretch;
    }
}

/// Blends each mix toward the sampled values, or toward the setup mixes before the first
/// frame.
fn blend_mixes(
    mixes: &mut [&mut f32],
    setup: &[f32],
    value: Option<&[f32]>,
    alpha: f32,
    blend: MixBlend,
) {
    for (i, mix) in mixes.iter_mut().enumerate() {
        let current = **mix;
        **mix = absolute_value(value.map(|v| v[i]), current, setup[i], alpha, blend);
    }
}

fn apply_transform_mix(
    skeleton: &mut Skeleton,
    constraint: usize,
    frames: &CurveFrames<6>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(c) = skeleton
        .transform_constraints
        .get_mut(constraint)
        .filter(|c| c.active)
    else {
        return;
    };
    let d = &data.transform_constraints[c.data_index()];
    let setup = [
        d.mix_rotate,
        d.mix_x,
        d.mix_y,
        d.mix_scale_x,
        d.mix_scale_y,
        d.mix_shear_y,
    ];
    let value = frames.sample(time);
    blend_mixes(
        &mut [
            &mut c.mix_rotate,
            &mut c.mix_x,
            &mut c.mix_y,
            &mut c.mix_scale_x,
            &mut c.mix_scale_y,
            &mut c.mix_shear_y,
        ],
        &setup,
        value.as_ref().map(|v| v.as_slice()),
        alpha,
        blend,
    );
}

fn apply_path_value(
    skeleton: &mut Skeleton,
    constraint: usize,
    frames: &CurveFrames<1>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
    spacing: bool,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(c) = skeleton
        .path_constraints
        .get_mut(constraint)
        .filter(|c| c.active)
    else {
        return;
    };
    let d = &data.path_constraints[c.data_index()];
    let value = frames.sample1(time);
    if spacing {
        c.spacing = absolute_value(value, c.spacing, d.spacing, alpha, blend);
    } else {
        c.position = absolute_value(value, c.position, d.position, alpha, blend);
    }
}

fn apply_path_mix(
    skeleton: &mut Skeleton,
    constraint: usize,
    frames: &CurveFrames<3>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let data = Arc::clone(&skeleton.data);
    let Some(c) = skeleton
        .path_constraints
        .get_mut(constraint)
        .filter(|c| c.active)
    else {
        return;
    };
    let d = &data.path_constraints[c.data_index()];
    let setup = [d.mix_rotate, d.mix_x, d.mix_y];
    let value = frames.sample(time);
    blend_mixes(
        &mut [&mut c.mix_rotate, &mut c.mix_x, &mut c.mix_y],
        &setup,
        value.as_ref().map(|v| v.as_slice()),
        alpha,
        blend,
    );
}

/// Current value of a physics property. Mass is keyed as mass, stored as its inverse.
fn physics_value(c: &PhysicsConstraint, property: PhysicsProperty) -> f32 {
    match property {
        PhysicsProperty::Inertia => c.inertia,
        PhysicsProperty::Strength => c.strength,
        PhysicsProperty::Damping => c.damping,
        PhysicsProperty::Mass => 1.0 / c.mass_inverse,
        PhysicsProperty::Wind => c.wind,
        PhysicsProperty::Gravity => c.gravity,
        PhysicsProperty::Mix => c.mix,
    }
}

fn physics_setup(d: &PhysicsConstraintData, property: PhysicsProperty) -> f32 {
    match property {
        PhysicsProperty::Inertia => d.inertia,
        PhysicsProperty::Strength => d.strength,
        PhysicsProperty::Damping => d.damping,
        PhysicsProperty::Mass => 1.0 / d.mass_inverse,
        PhysicsProperty::Wind => d.wind,
        PhysicsProperty::Gravity => d.gravity,
        PhysicsProperty::Mix => d.mix,
    }
}

fn set_physics_value(c: &mut PhysicsConstraint, property: PhysicsProperty, value: f32) {
    match property {
        PhysicsProperty::Inertia => c.inertia = value,
        PhysicsProperty::Strength => c.strength = value,
        PhysicsProperty::Damping => c.damping = value,
        PhysicsProperty::Mass => c.mass_inverse = 1.0 / value,
        PhysicsProperty::Wind => c.wind = value,
        PhysicsProperty::Gravity => c.gravity = value,
        PhysicsProperty::Mix => c.mix = value,
    }
}

fn physics_global(d: &PhysicsConstraintData, property: PhysicsProperty) -> bool {
    match property {
        PhysicsProperty::Inertia => d.inertia_global,
        PhysicsProperty::Strength => d.strength_global,
        PhysicsProperty::Damping => d.damping_global,
        PhysicsProperty::Mass => d.mass_global,
        PhysicsProperty::Wind => d.wind_global,
        PhysicsProperty::Gravity => d.gravity_global,
        PhysicsProperty::Mix => d.mix_global,
    }
}

fn apply_physics(
    skeleton: &mut Skeleton,
    constraint: Option<usize>,
    property: PhysicsProperty,
    frames: &CurveFrames<1>,
    time: f32,
    alpha: f32,
    blend: MixBlend,
) {
    let data = Arc::clone(&skeleton.data);
    let value = frames.sample1(time);
    let apply = |c: &mut PhysicsConstraint| {
        let d = &data.physics_constraints[c.data_index()];
        let current = physics_value(c, property);
        let setup = physics_setup(d, property);
        set_physics_value(c, property, absolute_value(value, current, setup, alpha, blend));
    };
    match constraint {
        Some(index) => {
            if let Some(c) = skeleton
                .physics_constraints
                .get_mut(index)
                .filter(|c| c.active)
            {
                apply(c);
            }
        }
        None => {
            for c in &mut skeleton.physics_constraints {
                if c.active && physics_global(&data.physics_constraints[c.data_index()], property)
                {
                    apply(c);
                }
            }
        }
    }
}

fn apply_physics_reset(
    skeleton: &mut Skeleton,
    constraint: Option<usize>,
    times: &[f32],
    mut last_time: f32,
    time: f32,
) {
    if let Some(index) = constraint {
        if !skeleton
            .physics_constraints
            .get(index)
            .is_some_and(|c| c.active)
        {
            return;
        }
    }
    let (Some(&first), Some(&last)) = (times.first(), times.last()) else {
        return;
    };
    if last_time > time {
        apply_physics_reset(skeleton, constraint, times, last_time, f32::MAX);
        last_time = -1.0;
    } else if last_time >= last {
        return;
    }
    if time < first {
        return;
    }
    let crossed = last_time < first
        || times
            .get(search(times, last_time) + 1)
            .is_some_and(|&next| time >= next);
    if !crossed {
        return;
    }
    let skeleton_time = skeleton.time;
    match constraint {
        Some(index) => skeleton.physics_constraints[index].reset(skeleton_time),
        None => {
            for c in skeleton.physics_constraints.iter_mut().filter(|c| c.active) {
                c.reset(skeleton_time);
            }
        }
    }
}
