//! IK, transform and path constraints.
//!
//! Each constraint reads the current world transforms of its target, writes a correction
//! into the constrained bones' world matrices (or applied transforms) and leaves both
//! consistent for constraints later in the update cache.

use crate::{
    Attachment, IkConstraintData, PathAttachment, PathConstraintData, PositionMode, RotateMode,
    SpacingMode, TransformConstraintData, TransformMode,
};
use std::f32::consts::PI;
use std::sync::Arc;

use super::skeleton::{compute_vertex_world_vertices, wrap_pi, Bone, Skeleton, Slot};

const EPSILON: f32 = 1.0e-5;

#[derive(Clone, Debug)]
pub struct IkConstraint {
    data_index: usize,
    /// One or two bones, parent first.
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix: f32,
    pub softness: f32,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub active: bool,
}

impl IkConstraint {
    pub(crate) fn new(data_index: usize, data: &IkConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix: data.mix,
            softness: data.softness,
            bend_direction: data.bend_direction,
            compress: data.compress,
            stretch: data.stretch,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &IkConstraintData) {
        self.mix = data.mix;
        self.softness = data.softness;
        self.bend_direction = data.bend_direction;
        self.compress = data.compress;
        self.stretch = data.stretch;
    }
}

#[derive(Clone, Debug)]
pub struct TransformConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    pub target: usize,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
    pub active: bool,
}

impl TransformConstraint {
    pub(crate) fn new(data_index: usize, data: &TransformConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            mix_scale_x: data.mix_scale_x,
            mix_scale_y: data.mix_scale_y,
            mix_shear_y: data.mix_shear_y,
            active: false,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &TransformConstraintData) {
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
        self.mix_scale_x = data.mix_scale_x;
        self.mix_scale_y = data.mix_scale_y;
        self.mix_shear_y = data.mix_shear_y;
    }

    fn mixes(&self) -> [f32; 6] {
        [
            self.mix_rotate,
            self.mix_x,
            self.mix_y,
            self.mix_scale_x,
            self.mix_scale_y,
            self.mix_shear_y,
        ]
    }
}

#[derive(Clone, Debug)]
pub struct PathConstraint {
    data_index: usize,
    pub bones: Vec<usize>,
    /// Slot whose current attachment must be a path.
    pub target: usize,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub active: bool,
    scratch: PathScratch,
}

#[derive(Clone, Debug, Default)]
struct PathScratch {
    spaces: Vec<f32>,
    lengths: Vec<f32>,
    positions: Vec<f32>,
    world: Vec<f32>,
    curves: Vec<f32>,
}

impl PathConstraint {
    pub(crate) fn new(data_index: usize, data: &PathConstraintData) -> Self {
        Self {
            data_index,
            bones: data.bones.clone(),
            target: data.target,
            position: data.position,
            spacing: data.spacing,
            mix_rotate: data.mix_rotate,
            mix_x: data.mix_x,
            mix_y: data.mix_y,
            active: false,
            scratch: PathScratch::default(),
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &PathConstraintData) {
        self.position = data.position;
        self.spacing = data.spacing;
        self.mix_rotate = data.mix_rotate;
        self.mix_x = data.mix_x;
        self.mix_y = data.mix_y;
    }
}

fn signum(value: f32) -> f32 {
    if value == 0.0 { 0.0 } else { value.signum() }
}

fn wrap_degrees(mut degrees: f32) -> f32 {
    if degrees > 180.0 {
        degrees -= 360.0;
    } else if degrees < -180.0 {
        degrees += 360.0;
    }
    degrees
}

impl Skeleton {
    /// World matrix `[a, b, c, d, x, y]` a bone's local transform is expressed in: the
    /// parent's world transform, or the skeleton transform for a root bone.
    fn parent_frame(&self, index: usize) -> [f32; 6] {
        match self.bones[index].parent_index() {
            Some(p) => {
                let p = &self.bones[p];
                [p.a, p.b, p.c, p.d, p.world_x, p.world_y]
            }
            None => [
                self.scale_x,
                0.0,
                0.0,
                self.effective_scale_y(),
                self.x,
                self.y,
            ],
        }
    }

    pub(crate) fn apply_ik_constraint(&mut self, index: usize) {
        let c = &self.ik_constraints[index];
        if c.mix == 0.0 {
            return;
        }
        let target = &self.bones[c.target];
        let (target_x, target_y) = (target.world_x, target.world_y);
        let uniform = self.data.ik_constraints[c.data_index].uniform;
        let (mix, softness, bend) = (c.mix, c.softness, c.bend_direction);
        let (compress, stretch) = (c.compress, c.stretch);
        let bones = (c.bones.first().copied(), c.bones.get(1).copied());
        match bones {
            (Some(bone), None) => {
                self.apply_ik_one(bone, target_x, target_y, compress, stretch, uniform, mix)
            }
            (Some(parent), Some(child)) => self.apply_ik_two(
                parent, child, target_x, target_y, bend, stretch, uniform, softness, mix,
            ),
            _ => {}
        }
    }

    /// Rotates one bone so its x axis points at the target, optionally stretching or
    /// compressing it to reach.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ik_one(
        &mut self,
        index: usize,
        target_x: f32,
        target_y: f32,
        compress: bool,
        stretch: bool,
        uniform: bool,
        alpha: f32,
    ) {
        let skeleton_sx = self.scale_x;
        let skeleton_sy = self.effective_scale_y();
        let [pa, mut pb, pc, mut pd, parent_x, parent_y] = self.parent_frame(index);
        let length = self.data.bones[self.bones[index].data_index()].length;
        let bone = &self.bones[index];

        let mut rotation_ik = -bone.ashear_x - bone.arotation;
        let (mut tx, mut ty);
        if bone.inherit == TransformMode::OnlyTranslation {
            tx = (target_x - bone.world_x) * signum(skeleton_sx);
            ty = (target_y - bone.world_y) * signum(skeleton_sy);
        } else {
            if bone.inherit == TransformMode::NoRotationOrReflection {
                let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc).max(0.0001);
                let sa = pa / skeleton_sx;
                let sc = pc / skeleton_sy;
                pb = -sc * s * skeleton_sx;
                pd = sa * s * skeleton_sy;
                rotation_ik += sc.atan2(sa).to_degrees();
            }
            let x = target_x - parent_x;
            let y = target_y - parent_y;
            let d = pa * pd - pb * pc;
            if d.abs() <= 0.0001 {
                tx = 0.0;
                ty = 0.0;
            } else {
                tx = (x * pd - y * pb) / d - bone.ax;
                ty = (y * pa - x * pc) / d - bone.ay;
            }
        }
        rotation_ik += ty.atan2(tx).to_degrees();
        if bone.ascale_x < 0.0 {
            rotation_ik += 180.0;
        }
        let rotation_ik = wrap_degrees(rotation_ik);

        let mut sx = bone.ascale_x;
        let mut sy = bone.ascale_y;
        if compress || stretch {
            if matches!(
                bone.inherit,
                TransformMode::NoScale | TransformMode::NoScaleOrReflection
            ) {
                tx = target_x - bone.world_x;
                ty = target_y - bone.world_y;
            }
            let b = length * sx;
            if b > 0.0001 {
                let dd = tx * tx + ty * ty;
                if (compress && dd < b * b) || (stretch && dd > b * b) {
                    let s = (dd.sqrt() / b - 1.0) * alpha + 1.0;
                    sx *= s;
                    if uniform {
                        sy *= s;
                    }
                }
            }
        }

        let (ax, ay, arotation) = (bone.ax, bone.ay, bone.arotation);
        let (ashear_x, ashear_y) = (bone.ashear_x, bone.ashear_y);
        self.update_bone_world_transform_with(
            index,
            ax,
            ay,
            arotation + rotation_ik * alpha,
            sx,
            sy,
            ashear_x,
            ashear_y,
        );
    }

    /// Bends a parent and child bone so the child's tip reaches the target. Both bones must
    /// inherit normally.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_ik_two(
        &mut self,
        parent: usize,
        child: usize,
        target_x: f32,
        target_y: f32,
        bend_direction: i32,
        stretch: bool,
        uniform: bool,
        mut softness: f32,
        alpha: f32,
    ) {
        let child_length = self.data.bones[self.bones[child].data_index()].length;
        let p = &self.bones[parent];
        let c = &self.bones[child];
        if p.inherit != TransformMode::Normal || c.inherit != TransformMode::Normal {
            return;
        }

        let (px, py) = (p.ax, p.ay);
        let mut psx = p.ascale_x;
        let mut psy = p.ascale_y;
        let mut sx = psx;
        let mut sy = psy;
        let mut csx = c.ascale_x;
        let (os1, mut s2) = if psx < 0.0 {
            psx = -psx;
            (180.0, -1.0)
        } else {
            (0.0, 1.0)
        };
        if psy < 0.0 {
            psy = -psy;
            s2 = -s2;
        }
        let os2 = if csx < 0.0 {
            csx = -csx;
            180.0
        } else {
            0.0
        };

        let cx = c.ax;
        let u = (psx - psy).abs() <= 0.0001;
        let (cy, cwx, cwy) = if !u || stretch {
            (0.0, p.a * cx + p.world_x, p.c * cx + p.world_y)
        } else {
            let cy = c.ay;
            (
                cy,
                p.a * cx + p.b * cy + p.world_x,
                p.c * cx + p.d * cy + p.world_y,
            )
        };

        let [a, b, cc, d, pp_x, pp_y] = self.parent_frame(parent);
        let id = a * d - b * cc;
        let id = if id.abs() <= 0.0001 { 0.0 } else { 1.0 / id };
        let x = cwx - pp_x;
        let y = cwy - pp_y;
        let dx = (x * d - y * b) * id - px;
        let dy = (y * a - x * cc) * id - py;
        let l1 = (dx * dx + dy * dy).sqrt();
        let mut l2 = child_length * csx;

        if l1 < 0.0001 {
            self.apply_ik_one(parent, target_x, target_y, false, stretch, false, alpha);
            let c = &self.bones[child];
            let (scale_x, scale_y) = (c.ascale_x, c.ascale_y);
            let (shear_x, shear_y) = (c.ashear_x, c.ashear_y);
            self.update_bone_world_transform_with(
                child, cx, cy, 0.0, scale_x, scale_y, shear_x, shear_y,
            );
            return;
        }

        let x = target_x - pp_x;
        let y = target_y - pp_y;
        let mut tx = (x * d - y * b) * id - px;
        let mut ty = (y * a - x * cc) * id - py;
        let mut dd = tx * tx + ty * ty;
        if softness != 0.0 {
            softness *= psx * (csx + 1.0) * 0.5;
            let td = dd.sqrt();
            let sd = td - l1 - l2 * psx + softness;
            if sd > 0.0 {
                let mut p = (sd / (softness * 2.0)).min(1.0) - 1.0;
                p = (sd - softness * (1.0 - p * p)) / td;
                tx -= p * tx;
                ty -= p * ty;
                dd = tx * tx + ty * ty;
            }
        }

        let bend = bend_direction as f32;
        let (a1, a2) = 'solve: {
            if u {
                l2 *= psx;
                let mut cos = (dd - l1 * l1 - l2 * l2) / (2.0 * l1 * l2);
                let a2 = if cos < -1.0 {
                    cos = -1.0;
                    PI * bend
                } else if cos > 1.0 {
                    cos = 1.0;
                    if stretch {
                        let s = (dd.sqrt() / (l1 + l2) - 1.0) * alpha + 1.0;
                        sx *= s;
                        if uniform {
                            sy *= s;
                        }
                    }
                    0.0
                } else {
                    cos.acos() * bend
                };
                let a = l1 + l2 * cos;
                let b = l2 * a2.sin();
                break 'solve ((ty * a - tx * b).atan2(tx * a + ty * b), a2);
            }

            let a = psx * l2;
            let b = psy * l2;
            let aa = a * a;
            let bb = b * b;
            let ta = ty.atan2(tx);
            let c0 = bb * l1 * l1 + aa * dd - aa * bb;
            let c1 = -2.0 * bb * l1;
            let c2 = bb - aa;
            let discriminant = c1 * c1 - 4.0 * c2 * c0;
            if discriminant >= 0.0 {
                let mut q = discriminant.sqrt();
                if c1 < 0.0 {
                    q = -q;
                }
                q = -(c1 + q) * 0.5;
                let r0 = q / c2;
                let r1 = c0 / q;
                let r = if r0.abs() < r1.abs() { r0 } else { r1 };
                let r0 = dd - r * r;
                if r0 >= 0.0 {
                    let y = r0.sqrt() * bend;
                    break 'solve (ta - y.atan2(r), (y / psy).atan2((r - l1) / psx));
                }
            }

            let mut min_angle = PI;
            let mut min_x = l1 - a;
            let mut min_dist = min_x * min_x;
            let mut min_y = 0.0f32;
            let mut max_angle = 0.0f32;
            let mut max_x = l1 + a;
            let mut max_dist = max_x * max_x;
            let mut max_y = 0.0f32;
            let c = (-a * l1) / (aa - bb);
            if (-1.0..=1.0).contains(&c) {
                let c = c.acos();
                let x = a * c.cos() + l1;
                let y = b * c.sin();
                let d = x * x + y * y;
                if d < min_dist {
                    min_angle = c;
                    min_dist = d;
                    min_x = x;
                    min_y = y;
                }
                if d > max_dist {
                    max_angle = c;
                    max_dist = d;
                    max_x = x;
                    max_y = y;
                }
            }
            if dd <= (min_dist + max_dist) * 0.5 {
                (ta - (min_y * bend).atan2(min_x), min_angle * bend)
            } else {
                (ta - (max_y * bend).atan2(max_x), max_angle * bend)
            }
        };

        let os = cy.atan2(cx) * s2;
        let rotation = self.bones[parent].arotation;
        let a1 = wrap_degrees((a1 - os).to_degrees() + os1 - rotation);
        self.update_bone_world_transform_with(
            parent,
            px,
            py,
            rotation + a1 * alpha,
            sx,
            sy,
            0.0,
            0.0,
        );

        let c = &self.bones[child];
        let rotation = c.arotation;
        let (scale_x, scale_y) = (c.ascale_x, c.ascale_y);
        let (shear_x, shear_y) = (c.ashear_x, c.ashear_y);
        let a2 = wrap_degrees(((a2 + os).to_degrees() - shear_x) * s2 + os2 - rotation);
        self.update_bone_world_transform_with(
            child,
            cx,
            cy,
            rotation + a2 * alpha,
            scale_x,
            scale_y,
            shear_x,
            shear_y,
        );
    }

    pub(crate) fn apply_transform_constraint(&mut self, index: usize) {
        let c = &self.transform_constraints[index];
        let mixes = c.mixes();
        if mixes.iter().all(|&m| m == 0.0) {
            return;
        }
        let data = Arc::clone(&self.data);
        let d = &data.transform_constraints[c.data_index];
        let bones = std::mem::take(&mut self.transform_constraints[index].bones);
        let target = self.transform_constraints[index].target;
        match (d.local, d.relative) {
            (false, false) => self.transform_absolute_world(d, &bones, target, mixes),
            (false, true) => self.transform_relative_world(d, &bones, target, mixes),
            (true, false) => self.transform_absolute_local(d, &bones, target, mixes),
            (true, true) => self.transform_relative_local(d, &bones, target, mixes),
        }
        self.transform_constraints[index].bones = bones;
    }

    fn transform_absolute_world(
        &mut self,
        data: &TransformConstraintData,
        bones: &[usize],
        target: usize,
        [mix_rotate, mix_x, mix_y, mix_scale_x, mix_scale_y, mix_shear_y]: [f32; 6],
    ) {
        let translate = mix_x != 0.0 || mix_y != 0.0;
        let t = self.bones[target].clone();
        let (ta, tb, tc, td) = (t.a, t.b, t.c, t.d);
        let reflect = if ta * td - tb * tc > 0.0 { 1.0 } else { -1.0 };
        let offset_rotation = data.offset_rotation.to_radians() * reflect;
        let offset_shear_y = data.offset_shear_y.to_radians() * reflect;
        let [offset_x, offset_y] = t.local_to_world([data.offset_x, data.offset_y]);

        for &index in bones {
            let bone = &mut self.bones[index];
            if mix_rotate != 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let r = wrap_pi(tc.atan2(ta) - c.atan2(a) + offset_rotation) * mix_rotate;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }
            if translate {
                bone.world_x += (offset_x - bone.world_x) * mix_x;
                bone.world_y += (offset_y - bone.world_y) * mix_y;
            }
            if mix_scale_x != 0.0 {
                let mut s = (bone.a * bone.a + bone.c * bone.c).sqrt();
                if s != 0.0 {
                    s = (s + ((ta * ta + tc * tc).sqrt() - s + data.offset_scale_x) * mix_scale_x)
                        / s;
                }
                bone.a *= s;
                bone.c *= s;
            }
            if mix_scale_y != 0.0 {
                let mut s = (bone.b * bone.b + bone.d * bone.d).sqrt();
                if s != 0.0 {
                    s = (s + ((tb * tb + td * td).sqrt() - s + data.offset_scale_y) * mix_scale_y)
                        / s;
                }
                bone.b *= s;
                bone.d *= s;
            }
            if mix_shear_y > 0.0 {
                let (b, d) = (bone.b, bone.d);
                let by = d.atan2(b);
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta) - (by - bone.c.atan2(bone.a)));
                let r = by + (r + offset_shear_y) * mix_shear_y;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_applied_transform(index);
        }
    }

    fn transform_relative_world(
        &mut self,
        data: &TransformConstraintData,
        bones: &[usize],
        target: usize,
        [mix_rotate, mix_x, mix_y, mix_scale_x, mix_scale_y, mix_shear_y]: [f32; 6],
    ) {
        let translate = mix_x != 0.0 || mix_y != 0.0;
        let t = self.bones[target].clone();
        let (ta, tb, tc, td) = (t.a, t.b, t.c, t.d);
        let reflect = if ta * td - tb * tc > 0.0 { 1.0 } else { -1.0 };
        let offset_rotation = data.offset_rotation.to_radians() * reflect;
        let offset_shear_y = data.offset_shear_y.to_radians() * reflect;
        let [offset_x, offset_y] = t.local_to_world([data.offset_x, data.offset_y]);

        for &index in bones {
            let bone = &mut self.bones[index];
            if mix_rotate != 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let r = wrap_pi(tc.atan2(ta) + offset_rotation) * mix_rotate;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }
            if translate {
                bone.world_x += offset_x * mix_x;
                bone.world_y += offset_y * mix_y;
            }
            if mix_scale_x != 0.0 {
                let s = ((ta * ta + tc * tc).sqrt() - 1.0 + data.offset_scale_x) * mix_scale_x + 1.0;
                bone.a *= s;
                bone.c *= s;
            }
            if mix_scale_y != 0.0 {
                let s = ((tb * tb + td * td).sqrt() - 1.0 + data.offset_scale_y) * mix_scale_y + 1.0;
                bone.b *= s;
                bone.d *= s;
            }
            if mix_shear_y > 0.0 {
                let r = wrap_pi(td.atan2(tb) - tc.atan2(ta));
                let (b, d) = (bone.b, bone.d);
                let r = d.atan2(b) + (r - PI / 2.0 + offset_shear_y) * mix_shear_y;
                let s = (b * b + d * d).sqrt();
                bone.b = r.cos() * s;
                bone.d = r.sin() * s;
            }
            self.update_applied_transform(index);
        }
    }

    fn transform_absolute_local(
        &mut self,
        data: &TransformConstraintData,
        bones: &[usize],
        target: usize,
        [mix_rotate, mix_x, mix_y, mix_scale_x, mix_scale_y, mix_shear_y]: [f32; 6],
    ) {
        let t = self.bones[target].clone();
        for &index in bones {
            let bone = &self.bones[index];
            let mut rotation = bone.arotation;
            if mix_rotate != 0.0 {
                rotation += (t.arotation - rotation + data.offset_rotation) * mix_rotate;
            }
            let x = bone.ax + (t.ax - bone.ax + data.offset_x) * mix_x;
            let y = bone.ay + (t.ay - bone.ay + data.offset_y) * mix_y;
            let mut scale_x = bone.ascale_x;
            let mut scale_y = bone.ascale_y;
            if mix_scale_x != 0.0 && scale_x != 0.0 {
                scale_x = (scale_x + (t.ascale_x - scale_x + data.offset_scale_x) * mix_scale_x)
                    / scale_x;
            }
            if mix_scale_y != 0.0 && scale_y != 0.0 {
                scale_y = (scale_y + (t.ascale_y - scale_y + data.offset_scale_y) * mix_scale_y)
                    / scale_y;
            }
            let mut shear_y = bone.ashear_y;
            if mix_shear_y != 0.0 {
                shear_y += (t.ashear_y - shear_y + data.offset_shear_y) * mix_shear_y;
            }
            let shear_x = bone.ashear_x;
            self.update_bone_world_transform_with(
                index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
            );
        }
    }

    fn transform_relative_local(
        &mut self,
        data: &TransformConstraintData,
        bones: &[usize],
        target: usize,
        [mix_rotate, mix_x, mix_y, mix_scale_x, mix_scale_y, mix_shear_y]: [f32; 6],
    ) {
        let t = self.bones[target].clone();
        for &index in bones {
            let bone = &self.bones[index];
            let rotation = bone.arotation + (t.arotation + data.offset_rotation) * mix_rotate;
            let x = bone.ax + (t.ax + data.offset_x) * mix_x;
            let y = bone.ay + (t.ay + data.offset_y) * mix_y;
            let scale_x =
                bone.ascale_x * ((t.ascale_x - 1.0 + data.offset_scale_x) * mix_scale_x + 1.0);
            let scale_y =
                bone.ascale_y * ((t.ascale_y - 1.0 + data.offset_scale_y) * mix_scale_y + 1.0);
            let shear_y = bone.ashear_y + (t.ashear_y + data.offset_shear_y) * mix_shear_y;
            let shear_x = bone.ashear_x;
            self.update_bone_world_transform_with(
                index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
            );
        }
    }

    pub(crate) fn apply_path_constraint(&mut self, index: usize) {
        let data = Arc::clone(&self.data);
        let c = &self.path_constraints[index];
        let (mix_rotate, mix_x, mix_y) = (c.mix_rotate, c.mix_x, c.mix_y);
        if mix_rotate == 0.0 && mix_x == 0.0 && mix_y == 0.0 {
            return;
        }
        let target = c.target;
        let Some(Attachment::Path(path)) = self.slots[target]
            .attachment
            .as_ref()
            .and_then(|key| data.skins.get(key.skin)?.attachment(target, &key.name))
        else {
            return;
        };
        let d = &data.path_constraints[c.data_index];
        let (position, spacing) = (c.position, c.spacing);

        let tangents = d.rotate_mode == RotateMode::Tangent;
        let scale = d.rotate_mode == RotateMode::ChainScale;
        let bone_count = c.bones.len();
        if bone_count == 0 {
            return;
        }
        let spaces_count = if tangents { bone_count } else { bone_count + 1 };

        let bones = std::mem::take(&mut self.path_constraints[index].bones);
        let mut scratch = std::mem::take(&mut self.path_constraints[index].scratch);
        scratch.spaces.clear();
        scratch.spaces.resize(spaces_count, 0.0);
        scratch.lengths.clear();
        if scale {
            scratch.lengths.resize(bone_count, 0.0);
        }

        let spaces = scratch.spaces.as_mut_slice();
        let lengths = scratch.lengths.as_mut_slice();
        // Setup length and current world length of each bone but the last.
        let bone_length = |i: usize| {
            let bone = &self.bones[bones[i]];
            let setup_length = data.bones[bone.data_index()].length;
            let x = setup_length * bone.a;
            let y = setup_length * bone.c;
            (setup_length, (x * x + y * y).sqrt())
        };
        match d.spacing_mode {
            SpacingMode::Percent => {
                if scale {
                    for (i, out) in lengths.iter_mut().enumerate().take(spaces_count - 1) {
                        *out = bone_length(i).1;
                    }
                }
                spaces[1..].fill(spacing);
            }
            SpacingMode::Proportional => {
                let mut sum = 0.0f32;
                for i in 0..spaces_count - 1 {
                    let (setup_length, length) = bone_length(i);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        spaces[i + 1] = length;
                        sum += length;
                    }
                }
                if sum > 0.0 {
                    let factor = spaces_count as f32 / sum * spacing;
                    for space in &mut spaces[1..] {
                        *space *= factor;
                    }
                }
            }
            spacing_mode => {
                let length_spacing = spacing_mode == SpacingMode::Length;
                for i in 0..spaces_count - 1 {
                    let (setup_length, length) = bone_length(i);
                    if setup_length < EPSILON {
                        if scale {
                            lengths[i] = 0.0;
                        }
                        spaces[i + 1] = spacing;
                    } else {
                        if scale {
                            lengths[i] = length;
                        }
                        let space = if length_spacing {
                            setup_length + spacing
                        } else {
                            spacing
                        };
                        spaces[i + 1] = space * length / setup_length;
                    }
                }
            }
        }

        let slot = &self.slots[target];
        compute_path_world_positions(
            &self.bones,
            slot,
            path,
            d,
            &mut scratch,
            spaces_count,
            tangents,
            position,
        );

        let positions = scratch.positions.as_slice();
        let spaces = scratch.spaces.as_slice();
        let lengths = scratch.lengths.as_slice();
        let mut bone_x = positions[0];
        let mut bone_y = positions[1];
        let mut offset_rotation = d.offset_rotation;
        let tip = if offset_rotation == 0.0 {
            d.rotate_mode == RotateMode::Chain
        } else {
            let p = &self.bones[slot.bone];
            offset_rotation = offset_rotation.to_radians();
            if p.a * p.d - p.b * p.c <= 0.0 {
                offset_rotation = -offset_rotation;
            }
            false
        };

        for (i, &index) in bones.iter().enumerate() {
            let p = 3 + i * 3;
            let setup_length = data.bones[self.bones[index].data_index()].length;
            let bone = &mut self.bones[index];
            bone.world_x += (bone_x - bone.world_x) * mix_x;
            bone.world_y += (bone_y - bone.world_y) * mix_y;
            let x = positions[p];
            let y = positions[p + 1];
            let dx = x - bone_x;
            let dy = y - bone_y;
            if scale {
                let length = lengths[i];
                if length >= EPSILON {
                    let s = ((dx * dx + dy * dy).sqrt() / length - 1.0) * mix_rotate + 1.0;
                    bone.a *= s;
                    bone.c *= s;
                }
            }
            bone_x = x;
            bone_y = y;
            if mix_rotate > 0.0 {
                let (a, b, c, d) = (bone.a, bone.b, bone.c, bone.d);
                let mut r = if tangents {
                    positions[p - 1]
                } else if spaces[i + 1] == 0.0 {
                    positions[p + 2]
                } else {
                    dy.atan2(dx)
                };
                r -= c.atan2(a);
                if tip {
                    let (sin, cos) = r.sin_cos();
                    bone_x += (setup_length * (cos * a - sin * c) - dx) * mix_rotate;
                    bone_y += (setup_length * (sin * a + cos * c) - dy) * mix_rotate;
                } else {
                    r += offset_rotation;
                }
                let r = wrap_pi(r) * mix_rotate;
                let (sin, cos) = r.sin_cos();
                bone.a = cos * a - sin * c;
                bone.b = cos * b - sin * d;
                bone.c = sin * a + cos * c;
                bone.d = sin * b + cos * d;
            }
            self.update_applied_transform(index);
        }

        self.path_constraints[index].scratch = scratch;
        self.path_constraints[index].bones = bones;
    }
}

/// Samples `spaces_count` positions along the path into `scratch.positions`, three floats
/// each: x, y and the tangent angle in radians. Two extra floats follow the last position.
#[allow(clippy::too_many_arguments)]
fn compute_path_world_positions(
    bones: &[Bone],
    slot: &Slot,
    path: &PathAttachment,
    data: &PathConstraintData,
    scratch: &mut PathScratch,
    spaces_count: usize,
    tangents: bool,
    mut position: f32,
) {
    const NONE: i32 = -1;
    const BEFORE: i32 = -2;
    const AFTER: i32 = -3;

    let PathScratch {
        spaces,
        positions,
        world,
        curves,
        ..
    } = scratch;
    positions.clear();
    positions.resize(spaces_count * 3 + 2, 0.0);
    let output = positions.as_mut_slice();
    let vertex = &path.vertex;
    let closed = path.closed;
    let mut vertices_length = vertex.world_vertices_length;
    if vertices_length < 6 {
        return;
    }
    let world_vertices = |world: &mut Vec<f32>, start: usize, count: usize, offset: usize| {
        compute_vertex_world_vertices(bones, slot, vertex, start, count, world, offset, 2);
    };

    if !path.constant_speed {
        let lengths = path.lengths.as_slice();
        let curve_count = (vertices_length / 6) as i32 - if closed { 1 } else { 2 };
        let Some(&path_length) = usize::try_from(curve_count)
            .ok()
            .and_then(|c| lengths.get(c))
        else {
            return;
        };
        let curve_count = curve_count as usize;
        if data.position_mode == PositionMode::Percent {
            position *= path_length;
        }
        let multiplier = match data.spacing_mode {
            SpacingMode::Percent => path_length,
            SpacingMode::Proportional => path_length / spaces_count as f32,
            _ => 1.0,
        };

        world.clear();
        world.resize(8, 0.0);
        let mut prev_curve = NONE;
        let mut curve = 0usize;
        for i in 0..spaces_count {
            let o = i * 3;
            let space = spaces[i] * multiplier;
            position += space;
            let mut p = position;

            if closed {
                p = p.rem_euclid(path_length);
                curve = 0;
            } else if p < 0.0 {
                if prev_curve != BEFORE {
                    prev_curve = BEFORE;
                    world_vertices(world, 2, 4, 0);
                }
                add_before_position(p, world, 0, output, o);
                continue;
            } else if p > path_length {
                if prev_curve != AFTER {
                    prev_curve = AFTER;
                    world_vertices(world, vertices_length - 6, 4, 0);
                }
                add_after_position(p - path_length, world, 0, output, o);
                continue;
            }

            while curve < lengths.len() {
                let length = lengths[curve];
                if p > length {
                    curve += 1;
                    continue;
                }
                if curve == 0 {
                    p /= length;
                } else {
                    let prev = lengths[curve - 1];
                    p = (p - prev) / (length - prev);
                }
                break;
            }

            if curve as i32 != prev_curve {
                prev_curve = curve as i32;
                if closed && curve == curve_count {
                    world_vertices(world, vertices_length - 4, 4, 0);
                    world_vertices(world, 0, 4, 4);
                } else {
                    world_vertices(world, curve * 6 + 2, 8, 0);
                }
            }

            add_curve_position(
                p,
                [world[0], world[1], world[2], world[3]],
                [world[4], world[5], world[6], world[7]],
                output,
                o,
                tangents || (i > 0 && space == 0.0),
            );
        }
        return;
    }

    // Constant speed: measure every curve, then place positions by arc length.
    let mut curve_count = vertices_length / 6;
    world.clear();
    if closed {
        vertices_length += 2;
        world.resize(vertices_length, 0.0);
        world_vertices(world, 2, vertices_length - 4, 0);
        world_vertices(world, 0, 2, vertices_length - 4);
        world[vertices_length - 2] = world[0];
        world[vertices_length - 1] = world[1];
    } else {
        curve_count -= 1;
        vertices_length -= 4;
        world.resize(vertices_length, 0.0);
        world_vertices(world, 2, vertices_length, 0);
    }
    let world = world.as_slice();

    curves.clear();
    curves.resize(curve_count, 0.0);
    let mut path_length = 0.0f32;
    let (mut x1, mut y1) = (world[0], world[1]);
    let (mut cx1, mut cy1, mut cx2, mut cy2, mut x2, mut y2) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    let mut w = 2usize;
    for curve in curves.iter_mut() {
        cx1 = world[w];
        cy1 = world[w + 1];
        cx2 = world[w + 2];
        cy2 = world[w + 3];
        x2 = world[w + 4];
        y2 = world[w + 5];
        let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.1875;
        let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.1875;
        let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.09375;
        let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.09375;
        let mut ddfx = tmpx * 2.0 + dddfx;
        let mut ddfy = tmpy * 2.0 + dddfy;
        let mut dfx = (cx1 - x1) * 0.75 + tmpx + dddfx * 0.16666667;
        let mut dfy = (cy1 - y1) * 0.75 + tmpy + dddfy * 0.16666667;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        dfx += ddfx;
        dfy += ddfy;
        ddfx += dddfx;
        ddfy += dddfy;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        dfx += ddfx;
        dfy += ddfy;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        dfx += ddfx + dddfx;
        dfy += ddfy + dddfy;
        path_length += (dfx * dfx + dfy * dfy).sqrt();
        *curve = path_length;
        x1 = x2;
        y1 = y2;
        w += 6;
    }

    if data.position_mode == PositionMode::Percent {
        position *= path_length;
    }
    let multiplier = match data.spacing_mode {
        SpacingMode::Percent => path_length,
        SpacingMode::Proportional => path_length / spaces_count as f32,
        _ => 1.0,
    };

    let mut segments = [0.0f32; 10];
    let mut curve_length = 0.0f32;
    let mut prev_curve = NONE;
    let mut curve = 0usize;
    let mut segment = 0usize;
    for i in 0..spaces_count {
        let o = i * 3;
        let space = spaces[i] * multiplier;
        position += space;
        let mut p = position;

        if closed {
            p = p.rem_euclid(path_length);
            curve = 0;
        } else if p < 0.0 {
            add_before_position(p, world, 0, output, o);
            continue;
        } else if p > path_length {
            add_after_position(p - path_length, world, vertices_length - 4, output, o);
            continue;
        }

        while curve < curves.len() {
            let length = curves[curve];
            if p > length {
                curve += 1;
                continue;
            }
            if curve == 0 {
                p /= length;
            } else {
                let prev = curves[curve - 1];
                p = (p - prev) / (length - prev);
            }
            break;
        }

        if curve as i32 != prev_curve {
            prev_curve = curve as i32;
            let ii = curve * 6;
            x1 = world[ii];
            y1 = world[ii + 1];
            cx1 = world[ii + 2];
            cy1 = world[ii + 3];
            cx2 = world[ii + 4];
            cy2 = world[ii + 5];
            x2 = world[ii + 6];
            y2 = world[ii + 7];
            let tmpx = (x1 - cx1 * 2.0 + cx2) * 0.03;
            let tmpy = (y1 - cy1 * 2.0 + cy2) * 0.03;
            let dddfx = ((cx1 - cx2) * 3.0 - x1 + x2) * 0.006;
            let dddfy = ((cy1 - cy2) * 3.0 - y1 + y2) * 0.006;
            let mut ddfx = tmpx * 2.0 + dddfx;
            let mut ddfy = tmpy * 2.0 + dddfy;
            let mut dfx = (cx1 - x1) * 0.3 + tmpx + dddfx * 0.16666667;
            let mut dfy = (cy1 - y1) * 0.3 + tmpy + dddfy * 0.16666667;
            curve_length = (dfx * dfx + dfy * dfy).sqrt();
            segments[0] = curve_length;
            for seg in segments.iter_mut().take(8).skip(1) {
                dfx += ddfx;
                dfy += ddfy;
                ddfx += dddfx;
                ddfy += dddfy;
                curve_length += (dfx * dfx + dfy * dfy).sqrt();
                *seg = curve_length;
            }
            dfx += ddfx;
            dfy += ddfy;
            curve_length += (dfx * dfx + dfy * dfy).sqrt();
            segments[8] = curve_length;
            dfx += ddfx + dddfx;
            dfy += ddfy + dddfy;
            curve_length += (dfx * dfx + dfy * dfy).sqrt();
            segments[9] = curve_length;
            segment = 0;
        }

        p *= curve_length;
        while segment < segments.len() {
            let length = segments[segment];
            if p > length {
                segment += 1;
                continue;
            }
            if segment == 0 {
                p /= length;
            } else {
                let prev = segments[segment - 1];
                p = segment as f32 + (p - prev) / (length - prev);
            }
            break;
        }
        add_curve_position(
            p * 0.1,
            [x1, y1, cx1, cy1],
            [cx2, cy2, x2, y2],
            output,
            o,
            tangents || (i > 0 && space == 0.0),
        );
    }
}

fn add_before_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i];
    let y1 = temp[i + 1];
    let dx = temp[i + 2] - x1;
    let dy = temp[i + 3] - y1;
    let r = dy.atan2(dx);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

fn add_after_position(p: f32, temp: &[f32], i: usize, output: &mut [f32], o: usize) {
    let x1 = temp[i + 2];
    let y1 = temp[i + 3];
    let dx = x1 - temp[i];
    let dy = y1 - temp[i + 1];
    let r = dy.atan2(dx);
    output[o] = x1 + p * r.cos();
    output[o + 1] = y1 + p * r.sin();
    output[o + 2] = r;
}

/// Point at `p` along the Bezier `[x1, y1, cx1, cy1]`, `[cx2, cy2, x2, y2]`.
fn add_curve_position(
    p: f32,
    [x1, y1, cx1, cy1]: [f32; 4],
    [cx2, cy2, x2, y2]: [f32; 4],
    output: &mut [f32],
    o: usize,
    tangents: bool,
) {
    if p == 0.0 || p.is_nan() {
        output[o] = x1;
        output[o + 1] = y1;
        output[o + 2] = (cy1 - y1).atan2(cx1 - x1);
        return;
    }
    let tt = p * p;
    let ttt = tt * p;
    let u = 1.0 - p;
    let uu = u * u;
    let uuu = uu * u;
    let ut = u * p;
    let ut3 = ut * 3.0;
    let uut3 = u * ut3;
    let utt3 = ut3 * p;
    let x = x1 * uuu + cx1 * uut3 + cx2 * utt3 + x2 * ttt;
    let y = y1 * uuu + cy1 * uut3 + cy2 * utt3 + y2 * ttt;
    output[o] = x;
    output[o + 1] = y;
    if tangents {
        output[o + 2] = if p < 0.001 {
            (cy1 - y1).atan2(cx1 - x1)
        } else {
            (y - (y1 * uu + cy1 * ut * 2.0 + cy2 * tt))
                .atan2(x - (x1 * uu + cx1 * ut * 2.0 + cx2 * tt))
        };
    }
}
