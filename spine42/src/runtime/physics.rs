use crate::PhysicsConstraintData;
use std::f32::consts::TAU;
use std::sync::Arc;

use super::skeleton::{Physics, Skeleton};

/// Spring simulation that adds secondary motion to one bone.
#[derive(Clone, Debug)]
pub struct PhysicsConstraint {
    data_index: usize,
    pub bone: usize,
    pub inertia: f32,
    pub strength: f32,
    pub damping: f32,
    pub mass_inverse: f32,
    pub wind: f32,
    pub gravity: f32,
    pub mix: f32,
    pub active: bool,

    reset: bool,
    ux: f32,
    uy: f32,
    cx: f32,
    cy: f32,
    tx: f32,
    ty: f32,
    x_offset: f32,
    x_velocity: f32,
    y_offset: f32,
    y_velocity: f32,
    rotate_offset: f32,
    rotate_velocity: f32,
    scale_offset: f32,
    scale_velocity: f32,
    remaining: f32,
    last_time: f32,
}

impl PhysicsConstraint {
    pub(crate) fn new(data_index: usize, data: &PhysicsConstraintData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            inertia: data.inertia,
            strength: data.strength,
            damping: data.damping,
            mass_inverse: data.mass_inverse,
            wind: data.wind,
            gravity: data.gravity,
            mix: data.mix,
            active: false,
            reset: true,
            ux: 0.0,
            uy: 0.0,
            cx: 0.0,
            cy: 0.0,
            tx: 0.0,
            ty: 0.0,
            x_offset: 0.0,
            x_velocity: 0.0,
            y_offset: 0.0,
            y_velocity: 0.0,
            rotate_offset: 0.0,
            rotate_velocity: 0.0,
            scale_offset: 0.0,
            scale_velocity: 0.0,
            remaining: 0.0,
            last_time: 0.0,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub(crate) fn set_to_setup_pose(&mut self, data: &PhysicsConstraintData) {
        self.inertia = data.inertia;
        self.strength = data.strength;
        self.damping = data.damping;
        self.mass_inverse = data.mass_inverse;
        self.wind = data.wind;
        self.gravity = data.gravity;
        self.mix = data.mix;
    }

    /// Clears the simulation so the next update starts from the bone's current pose.
    pub fn reset(&mut self, time: f32) {
        self.remaining = 0.0;
        self.last_time = time;
        self.reset = true;
        self.x_offset = 0.0;
        self.x_velocity = 0.0;
        self.y_offset = 0.0;
        self.y_velocity = 0.0;
        self.rotate_offset = 0.0;
        self.rotate_velocity = 0.0;
        self.scale_offset = 0.0;
        self.scale_velocity = 0.0;
    }

    /// Makes the next update react as if the bone moved an additional `x, y` in world space.
    pub fn translate(&mut self, x: f32, y: f32) {
        self.ux -= x;
        self.uy -= y;
        self.cx -= x;
        self.cy -= y;
    }

    /// Makes the next update react as if the bone rotated `degrees` about the world point
    /// `x, y`.
    pub fn rotate(&mut self, x: f32, y: f32, degrees: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let dx = self.cx - x;
        let dy = self.cy - y;
        self.translate(dx * cos - dy * sin - dx, dx * sin + dy * cos - dy);
    }

    /// Offsets accumulated by the simulation: `[x, y, rotate, scale]`.
    pub fn offsets(&self) -> [f32; 4] {
        [
            self.x_offset,
            self.y_offset,
            self.rotate_offset,
            self.scale_offset,
        ]
    }
}

impl Skeleton {
    /// Calls [`PhysicsConstraint::translate`] on every physics constraint.
    pub fn physics_translate(&mut self, x: f32, y: f32) {
        for c in &mut self.physics_constraints {
            c.translate(x, y);
        }
    }

    /// Calls [`PhysicsConstraint::rotate`] on every physics constraint.
    pub fn physics_rotate(&mut self, x: f32, y: f32, degrees: f32) {
        for c in &mut self.physics_constraints {
            c.rotate(x, y, degrees);
        }
    }

    pub(crate) fn apply_physics_constraint(&mut self, index: usize, physics: Physics) {
        let data = Arc::clone(&self.data);
        let time = self.time;
        let skeleton_sx = self.scale_x;
        let skeleton_sy = self.effective_scale_y();
        let y_down = self.y_down;
        let reference_scale = data.reference_scale;

        let c = &mut self.physics_constraints[index];
        let mix = c.mix;
        if mix == 0.0 {
            return;
        }
        let d = &data.physics_constraints[c.data_index];
        let x = d.x > 0.0;
        let y = d.y > 0.0;
        let rotate_or_shear_x = d.rotate > 0.0 || d.shear_x > 0.0;
        let scale_x = d.scale_x > 0.0;
        let bone = &mut self.bones[c.bone];
        let l = data.bones[bone.data_index()].length;

        match physics {
            Physics::None => return,
            Physics::Reset | Physics::Update => {
                if physics == Physics::Reset {
                    c.reset(time);
                }
                let delta = (time - c.last_time).max(0.0);
                c.remaining += delta;
                c.last_time = time;

                let bx = bone.world_x;
                let by = bone.world_y;
                if c.reset {
                    c.reset = false;
                    c.ux = bx;
                    c.uy = by;
                } else {
                    let mut a = c.remaining;
                    let i = c.inertia;
                    let t = d.step;
                    let f = reference_scale;
                    let mut dd = -1.0f32;
                    let mut qx = d.limit * delta;
                    let qy = qx * skeleton_sy.abs();
                    qx *= skeleton_sx.abs();

                    if x || y {
                        if x {
                            let u = (c.ux - bx) * i;
                            c.x_offset += u.clamp(-qx, qx);
                            c.ux = bx;
                        }
                        if y {
                            let u = (c.uy - by) * i;
                            c.y_offset += u.clamp(-qy, qy);
                            c.uy = by;
                        }
                        if a >= t {
                            dd = c.damping.powf(60.0 * t);
                            let m = c.mass_inverse * t;
                            let e = c.strength;
                            let w = c.wind * f;
                            let g = if y_down { -c.gravity } else { c.gravity } * f;
                            loop {
                                if x {
                                    c.x_velocity += (w - c.x_offset * e) * m;
                                    c.x_offset += c.x_velocity * t;
                                    c.x_velocity *= dd;
                                }
                                if y {
                                    c.y_velocity -= (g + c.y_offset * e) * m;
                                    c.y_offset += c.y_velocity * t;
                                    c.y_velocity *= dd;
                                }
                                a -= t;
                                if a < t {
                                    break;
                                }
                            }
                        }
                        if x {
                            bone.world_x += c.x_offset * mix * d.x;
                        }
                        if y {
                            bone.world_y += c.y_offset * mix * d.y;
                        }
                    }

                    if rotate_or_shear_x || scale_x {
                        let ca = bone.c.atan2(bone.a);
                        let mut mr = 0.0f32;
                        let dx = (c.cx - bone.world_x).clamp(-qx, qx);
                        let dy = (c.cy - bone.world_y).clamp(-qy, qy);
                        let (mut sin, mut cos);
                        if rotate_or_shear_x {
                            mr = (d.rotate + d.shear_x) * mix;
                            let r = (dy + c.ty).atan2(dx + c.tx) - ca - c.rotate_offset * mr;
                            c.rotate_offset += (r - (r / TAU - 0.5).ceil() * TAU) * i;
                            (sin, cos) = (c.rotate_offset * mr + ca).sin_cos();
                        } else {
                            (sin, cos) = ca.sin_cos();
                        }
                        if scale_x {
                            let r = l * bone.world_scale_x();
                            if r > 0.0 {
                                c.scale_offset += (dx * cos + dy * sin) * i / r;
                            }
                        }

                        a = c.remaining;
                        if a >= t {
                            if dd == -1.0 {
                                dd = c.damping.powf(60.0 * t);
                            }
                            let m = c.mass_inverse * t;
                            let e = c.strength;
                            let w = c.wind;
                            let g = if y_down { -c.gravity } else { c.gravity };
                            let h = l / f;
                            loop {
                                a -= t;
                                if scale_x {
                                    c.scale_velocity +=
                                        (w * cos - g * sin - c.scale_offset * e) * m;
                                    c.scale_offset += c.scale_velocity * t;
                                    c.scale_velocity *= dd;
                                }
                                if rotate_or_shear_x {
                                    c.rotate_velocity -=
                                        ((w * sin + g * cos) * h + c.rotate_offset * e) * m;
                                    c.rotate_offset += c.rotate_velocity * t;
                                    c.rotate_velocity *= dd;
                                    if a < t {
                                        break;
                                    }
                                    (sin, cos) = (c.rotate_offset * mr + ca).sin_cos();
                                } else if a < t {
                                    break;
                                }
                            }
                        }
                    }
                    c.remaining = a;
                }
                c.cx = bone.world_x;
                c.cy = bone.world_y;
            }
            Physics::Pose => {
                if x {
                    bone.world_x += c.x_offset * mix * d.x;
                }
                if y {
                    bone.world_y += c.y_offset * mix * d.y;
                }
            }
        }

        if rotate_or_shear_x {
            let mut o = c.rotate_offset * mix;
            if d.shear_x > 0.0 {
                let mut r = 0.0;
                if d.rotate > 0.0 {
                    r = o * d.rotate;
                    let (sin, cos) = r.sin_cos();
                    let b = bone.b;
                    bone.b = cos * b - sin * bone.d;
                    bone.d = sin * b + cos * bone.d;
                }
                r += o * d.shear_x;
                let (sin, cos) = r.sin_cos();
                let a = bone.a;
                bone.a = cos * a - sin * bone.c;
                bone.c = sin * a + cos * bone.c;
            } else {
                o *= d.rotate;
                let (sin, cos) = o.sin_cos();
                let (a, b) = (bone.a, bone.b);
                bone.a = cos * a - sin * bone.c;
                bone.b = cos * b - sin * bone.d;
                bone.c = sin * a + cos * bone.c;
                bone.d = sin * b + cos * bone.d;
            }
        }
        if scale_x {
            let s = 1.0 + c.scale_offset * mix * d.scale_x;
            bone.a *= s;
            bone.c *= s;
        }
        if physics != Physics::Pose {
            c.tx = l * bone.a;
            c.ty = l * bone.c;
        }
        let bone_index = c.bone;
        self.update_applied_transform(bone_index);
    }
}
