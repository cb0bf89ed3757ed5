use crate::{
    Attachment, BlendMode, BoneData, Error, MeshVertices, PointAttachment, RegionAttachment,
    SkeletonData, SkinData, SlotData, TransformMode, VertexData,
};
use std::sync::Arc;

use super::{IkConstraint, PathConstraint, PhysicsConstraint, TransformConstraint};

#[derive(Clone, Debug)]
pub struct Bone {
    data_index: usize,
    parent: Option<usize>,

    pub inherit: TransformMode,
    /// False when the bone is skin-required and the current skin does not include it.
    pub active: bool,

    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,

    /// Local transform actually used for the world transform, after constraints.
    pub ax: f32,
    pub ay: f32,
    pub arotation: f32,
    pub ascale_x: f32,
    pub ascale_y: f32,
    pub ashear_x: f32,
    pub ashear_y: f32,

    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub world_x: f32,
    pub world_y: f32,
}

impl Bone {
    fn new(data_index: usize, data: &BoneData) -> Self {
        let mut bone = Self {
            data_index,
            parent: data.parent,
            inherit: data.transform_mode,
            active: true,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            ax: 0.0,
            ay: 0.0,
            arotation: 0.0,
            ascale_x: 1.0,
            ascale_y: 1.0,
            ashear_x: 0.0,
            ashear_y: 0.0,
            a: 1.0,
            b: 0.0,
            c: 0.0,
            d: 1.0,
            world_x: 0.0,
            world_y: 0.0,
        };
        bone.set_to_setup_pose(data);
        bone
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }

    pub fn parent_index(&self) -> Option<usize> {
        self.parent
    }

    pub fn set_to_setup_pose(&mut self, data: &BoneData) {
        self.x = data.x;
        self.y = data.y;
        self.rotation = data.rotation;
        self.scale_x = data.scale_x;
        self.scale_y = data.scale_y;
        self.shear_x = data.shear_x;
        self.shear_y = data.shear_y;
        self.inherit = data.transform_mode;
    }

    /// World rotation of the local x axis, in degrees.
    pub fn world_rotation_x(&self) -> f32 {
        self.c.atan2(self.a).to_degrees()
    }

    /// World rotation of the local y axis, in degrees.
    pub fn world_rotation_y(&self) -> f32 {
        self.d.atan2(self.b).to_degrees()
    }

    pub fn world_scale_x(&self) -> f32 {
        (self.a * self.a + self.c * self.c).sqrt()
    }

    pub fn world_scale_y(&self) -> f32 {
        (self.b * self.b + self.d * self.d).sqrt()
    }

    pub fn local_to_world(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        [
            self.a * x + self.b * y + self.world_x,
            self.c * x + self.d * y + self.world_y,
        ]
    }

    pub fn world_to_local(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        let inv_det = 1.0 / (self.a * self.d - self.b * self.c);
        let x = x - self.world_x;
        let y = y - self.world_y;
        [
            x * self.d * inv_det - y * self.b * inv_det,
            y * self.a * inv_det - x * self.c * inv_det,
        ]
    }

    pub fn world_to_local_rotation(&self, world_rotation: f32) -> f32 {
        let (sin, cos) = world_rotation.to_radians().sin_cos();
        (self.a * sin - self.c * cos)
            .atan2(self.d * cos - self.b * sin)
            .to_degrees()
            + self.rotation
            - self.shear_x
    }

    pub fn local_to_world_rotation(&self, local_rotation: f32) -> f32 {
        let (sin, cos) = (local_rotation - self.rotation - self.shear_x)
            .to_radians()
            .sin_cos();
        (cos * self.c + sin * self.d)
            .atan2(cos * self.a + sin * self.b)
            .to_degrees()
    }

    /// Rotates the world transform. The applied transform is left stale.
    pub fn rotate_world(&mut self, degrees: f32) {
        let (sin, cos) = degrees.to_radians().sin_cos();
        let (ra, rb) = (self.a, self.b);
        self.a = cos * ra - sin * self.c;
        self.b = cos * rb - sin * self.d;
        self.c = sin * ra + cos * self.c;
        self.d = sin * rb + cos * self.d;
    }

    #[cfg(feature = "glam")]
    pub fn world_affine(&self) -> glam::Affine2 {
        glam::Affine2::from_cols_array(&[
            self.a,
            self.c,
            self.b,
            self.d,
            self.world_x,
            self.world_y,
        ])
    }
}

/// Where a slot's current attachment lives: a skin index and the attachment's key in it.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct AttachmentKey {
    pub skin: usize,
    pub name: String,
}

#[derive(Clone, Debug)]
pub struct Slot {
    data_index: usize,
    pub bone: usize,
    pub color: [f32; 4],
    pub dark_color: Option<[f32; 3]>,
    pub attachment: Option<AttachmentKey>,
    /// Sequence frame to show, `-1` for the attachment's setup frame.
    pub sequence_index: i32,
    /// Vertex override for the current vertex attachment; empty when not deformed.
    pub deform: Vec<f32>,
    pub blend: BlendMode,
}

impl Slot {
    fn new(data_index: usize, data: &SlotData) -> Self {
        Self {
            data_index,
            bone: data.bone,
            color: data.color,
            dark_color: data.dark_color,
            attachment: None,
            sequence_index: -1,
            deform: Vec::new(),
            blend: data.blend,
        }
    }

    pub fn data_index(&self) -> usize {
        self.data_index
    }
}

/// Determines how physics and other non-deterministic updates are applied.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Physics {
    /// Physics are not updated or applied.
    None,
    /// Physics are reset to the current pose.
    Reset,
    /// Physics are updated and the pose from physics is applied.
    Update,
    /// Physics are not updated but the pose from physics is applied.
    Pose,
}

/// One step of [`Skeleton::update_world_transform`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum UpdateCacheItem {
    Bone(usize),
    Ik(usize),
    Transform(usize),
    Path(usize),
    Physics(usize),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum ConstraintKind {
    Ik,
    Transform,
    Path,
    Physics,
}

#[derive(Copy, Clone, Debug)]
struct OrderedConstraint {
    order: i32,
    kind: ConstraintKind,
    index: usize,
}

#[derive(Clone, Debug)]
pub struct Skeleton {
    pub data: Arc<SkeletonData>,
    pub bones: Vec<Bone>,
    bone_children: Vec<Vec<usize>>,
    pub slots: Vec<Slot>,
    /// Slot indices in the order they are drawn.
    pub draw_order: Vec<usize>,
    skin: Option<usize>,
    pub color: [f32; 4],
    pub ik_constraints: Vec<IkConstraint>,
    pub transform_constraints: Vec<TransformConstraint>,
    pub path_constraints: Vec<PathConstraint>,
    pub physics_constraints: Vec<PhysicsConstraint>,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    /// Flips the y axis for renderers whose y axis points down.
    pub y_down: bool,
    /// Seconds advanced by [`Skeleton::update`]; drives physics integration.
    pub time: f32,
    update_cache: Vec<UpdateCacheItem>,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones: Vec<Bone> = data
            .bones
            .iter()
            .enumerate()
            .map(|(i, b)| Bone::new(i, b))
            .collect();
        let bone_children = build_bone_children_indices(&bones);
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| Slot::new(i, s))
            .collect();
        let ik_constraints = data
            .ik_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| IkConstraint::new(i, c))
            .collect();
        let transform_constraints = data
            .transform_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| TransformConstraint::new(i, c))
            .collect();
        let path_constraints = data
            .path_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| PathConstraint::new(i, c))
            .collect();
        let physics_constraints = data
            .physics_constraints
            .iter()
            .enumerate()
            .map(|(i, c)| PhysicsConstraint::new(i, c))
            .collect();

        let mut skeleton = Self {
            draw_order: (0..data.slots.len()).collect(),
            data,
            bones,
            bone_children,
            slots,
            skin: None,
            color: [1.0; 4],
            ik_constraints,
            transform_constraints,
            path_constraints,
            physics_constraints,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            y_down: false,
            time: 0.0,
            update_cache: Vec::new(),
        };
        for slot in 0..skeleton.slots.len() {
            skeleton.set_slot_to_setup_pose(slot);
        }
        skeleton.update_cache();
        skeleton
    }

    /// Skeleton y scale with the y-down flip applied.
    pub fn effective_scale_y(&self) -> f32 {
        if self.y_down {
            -self.scale_y
        } else {
            self.scale_y
        }
    }

    /// Advances the physics clock.
    pub fn update(&mut self, delta: f32) {
        self.time += delta;
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.data.find_bone(name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.data.find_slot(name)
    }

    pub fn skin_index(&self) -> Option<usize> {
        self.skin
    }

    pub fn skin(&self) -> Option<&SkinData> {
        self.skin.and_then(|i| self.data.skins.get(i))
    }

    pub fn update_cache_items(&self) -> &[UpdateCacheItem] {
        &self.update_cache
    }

    /// Rebuilds the order in which bones and constraints are updated. Called after the skin
    /// changes or constraints are added.
    pub fn update_cache(&mut self) {
        fn sort_bone(
            bones: &[Bone],
            index: usize,
            sorted: &mut [bool],
            out: &mut Vec<UpdateCacheItem>,
        ) {
            if sorted[index] {
                return;
            }
            if let Some(parent) = bones[index].parent {
                sort_bone(bones, parent, sorted, out);
            }
            sorted[index] = true;
            out.push(UpdateCacheItem::Bone(index));
        }

        fn sort_reset(
            bones: &[Bone],
            children: &[Vec<usize>],
            indices: &[usize],
            sorted: &mut [bool],
        ) {
            for &index in indices {
                if !bones[index].active {
                    continue;
                }
                if sorted[index] {
                    sort_reset(bones, children, &children[index], sorted);
                }
                sorted[index] = false;
            }
        }

        fn sort_path_attachment(
            bones: &[Bone],
            attachment: &Attachment,
            slot_bone: usize,
            sorted: &mut [bool],
            out: &mut Vec<UpdateCacheItem>,
        ) {
            let Attachment::Path(path) = attachment else {
                return;
            };
            match &path.vertex.vertices {
                MeshVertices::Unweighted(_) => sort_bone(bones, slot_bone, sorted, out),
                MeshVertices::Weighted(vertices) => {
                    for weight in vertices.iter().flatten() {
                        sort_bone(bones, weight.bone, sorted, out);
                    }
                }
            }
        }

        let data = Arc::clone(&self.data);
        let skin = self.skin.and_then(|i| data.skins.get(i));

        let mut sorted = vec![false; self.bones.len()];
        for (i, bone) in self.bones.iter_mut().enumerate() {
            sorted[i] = data.bones[i].skin_required;
            bone.active = !sorted[i];
        }
        if let Some(skin) = skin {
            for &required in &skin.bones {
                let mut current = Some(required);
                while let Some(index) = current {
                    sorted[index] = false;
                    self.bones[index].active = true;
                    current = self.bones[index].parent;
                }
            }
        }

        let in_skin = |required: bool, list: Option<&[usize]>, index: usize| {
            !required || list.is_some_and(|l| l.contains(&index))
        };
        for (i, c) in self.ik_constraints.iter_mut().enumerate() {
            let d = &data.ik_constraints[i];
            c.active = self.bones[d.target].active
                && in_skin(d.skin_required, skin.map(|s| s.ik_constraints.as_slice()), i);
        }
        for (i, c) in self.transform_constraints.iter_mut().enumerate() {
            let d = &data.transform_constraints[i];
            c.active = self.bones[d.target].active
                && in_skin(d.skin_required, skin.map(|s| s.transform_constraints.as_slice()), i);
        }
        for (i, c) in self.path_constraints.iter_mut().enumerate() {
            let d = &data.path_constraints[i];
            c.active = self.bones[data.slots[d.target].bone].active
                && in_skin(d.skin_required, skin.map(|s| s.path_constraints.as_slice()), i);
        }
        for (i, c) in self.physics_constraints.iter_mut().enumerate() {
            let d = &data.physics_constraints[i];
            c.active = self.bones[d.bone].active
                && in_skin(d.skin_required, skin.map(|s| s.physics_constraints.as_slice()), i);
        }

        let mut ordered = Vec::with_capacity(
            data.ik_constraints.len()
                + data.transform_constraints.len()
                + data.path_constraints.len()
                + data.physics_constraints.len(),
        );
        let mut push = |kind, index, order, active| {
            if active {
                ordered.push(OrderedConstraint { order, kind, index });
            }
        };
        for (i, c) in self.ik_constraints.iter().enumerate() {
            push(ConstraintKind::Ik, i, data.ik_constraints[i].order, c.active);
        }
        for (i, c) in self.transform_constraints.iter().enumerate() {
            let order = data.transform_constraints[i].order;
            push(ConstraintKind::Transform, i, order, c.active);
        }
        for (i, c) in self.path_constraints.iter().enumerate() {
            push(ConstraintKind::Path, i, data.path_constraints[i].order, c.active);
        }
        for (i, c) in self.physics_constraints.iter().enumerate() {
            let order = data.physics_constraints[i].order;
            push(ConstraintKind::Physics, i, order, c.active);
        }
        // Stable: equal orders keep IK, transform, path, physics declaration order.
        ordered.sort_by_key(|c| c.order);

        let bones = &self.bones;
        let children = &self.bone_children;
        let mut cache = Vec::with_capacity(bones.len() + ordered.len());
        for constraint in ordered {
            match constraint.kind {
                ConstraintKind::Ik => {
                    let c = &self.ik_constraints[constraint.index];
                    let Some(&parent) = c.bones.first() else {
                        continue;
                    };
                    sort_bone(bones, c.target, &mut sorted, &mut cache);
                    sort_bone(bones, parent, &mut sorted, &mut cache);
                    if c.bones.len() == 1 {
                        cache.push(UpdateCacheItem::Ik(constraint.index));
                        sort_reset(bones, children, &children[parent], &mut sorted);
                    } else {
                        let child = c.bones[c.bones.len() - 1];
                        sort_bone(bones, child, &mut sorted, &mut cache);
                        cache.push(UpdateCacheItem::Ik(constraint.index));
                        sort_reset(bones, children, &children[parent], &mut sorted);
                        sorted[child] = true;
                    }
                }
                ConstraintKind::Transform => {
                    let c = &self.transform_constraints[constraint.index];
                    sort_bone(bones, c.target, &mut sorted, &mut cache);
                    if data.transform_constraints[constraint.index].local {
                        for &bone in &c.bones {
                            if let Some(parent) = bones[bone].parent {
                                sort_bone(bones, parent, &mut sorted, &mut cache);
                            }
                            sort_bone(bones, bone, &mut sorted, &mut cache);
                        }
                    } else {
                        for &bone in &c.bones {
                            sort_bone(bones, bone, &mut sorted, &mut cache);
                        }
                    }
                    cache.push(UpdateCacheItem::Transform(constraint.index));
                    for &bone in &c.bones {
                        sort_reset(bones, children, &children[bone], &mut sorted);
                    }
                    for &bone in &c.bones {
                        sorted[bone] = true;
                    }
                }
                ConstraintKind::Path => {
                    let c = &self.path_constraints[constraint.index];
                    let slot_index = c.target;
                    let slot_bone = self.slots[slot_index].bone;
                    let mut skins = Vec::with_capacity(2);
                    skins.extend(skin);
                    if data.default_skin != self.skin {
                        skins.extend(data.default_skin());
                    }
                    let attachments = skins
                        .iter()
                        .filter_map(|s| s.attachments.get(slot_index))
                        .flat_map(|m| m.values())
                        .chain(self.slot_attachment(slot_index));
                    for attachment in attachments {
                        sort_path_attachment(bones, attachment, slot_bone, &mut sorted, &mut cache);
                    }
                    for &bone in &c.bones {
                        sort_bone(bones, bone, &mut sorted, &mut cache);
                    }
                    cache.push(UpdateCacheItem::Path(constraint.index));
                    for &bone in &c.bones {
                        sort_reset(bones, children, &children[bone], &mut sorted);
                    }
                    for &bone in &c.bones {
                        sorted[bone] = true;
                    }
                }
                ConstraintKind::Physics => {
                    let bone = self.physics_constraints[constraint.index].bone;
                    sort_bone(bones, bone, &mut sorted, &mut cache);
                    cache.push(UpdateCacheItem::Physics(constraint.index));
                    sort_reset(bones, children, &children[bone], &mut sorted);
                    sorted[bone] = true;
                }
            }
        }
        for index in 0..bones.len() {
            sort_bone(bones, index, &mut sorted, &mut cache);
        }

        log::trace!(
            "update cache rebuilt: {} items for {} bones",
            cache.len(),
            bones.len()
        );
        self.update_cache = cache;
    }

    /// Computes world transforms for every active bone, applying constraints in update-cache
    /// order.
    pub fn update_world_transform(&mut self, physics: Physics) {
        for bone in &mut self.bones {
            bone.ax = bone.x;
            bone.ay = bone.y;
            bone.arotation = bone.rotation;
            bone.ascale_x = bone.scale_x;
            bone.ascale_y = bone.scale_y;
            bone.ashear_x = bone.shear_x;
            bone.ashear_y = bone.shear_y;
        }

        for i in 0..self.update_cache.len() {
            match self.update_cache[i] {
                UpdateCacheItem::Bone(index) => self.update_bone_world_transform(index),
                UpdateCacheItem::Ik(index) => self.apply_ik_constraint(index),
                UpdateCacheItem::Transform(index) => self.apply_transform_constraint(index),
                UpdateCacheItem::Path(index) => self.apply_path_constraint(index),
                UpdateCacheItem::Physics(index) => self.apply_physics_constraint(index, physics),
            }
        }
    }

    /// Recomputes one bone's world transform from its applied transform.
    pub fn update_bone_world_transform(&mut self, index: usize) {
        let bone = &self.bones[index];
        let (x, y, rotation) = (bone.ax, bone.ay, bone.arotation);
        let (scale_x, scale_y) = (bone.ascale_x, bone.ascale_y);
        let (shear_x, shear_y) = (bone.ashear_x, bone.ashear_y);
        self.update_bone_world_transform_with(
            index, x, y, rotation, scale_x, scale_y, shear_x, shear_y,
        );
    }

    /// Sets the bone's applied transform and computes its world transform from it and the
    /// parent's world transform.
    #[allow(clippy::too_many_arguments)]
    pub fn update_bone_world_transform_with(
        &mut self,
        index: usize,
        x: f32,
        y: f32,
        rotation: f32,
        scale_x: f32,
        scale_y: f32,
        shear_x: f32,
        shear_y: f32,
    ) {
        let sx = self.scale_x;
        let sy = self.effective_scale_y();
        let (skeleton_x, skeleton_y) = (self.x, self.y);
        let parent = self.bones[index].parent.map(|p| {
            let p = &self.bones[p];
            [p.a, p.b, p.c, p.d, p.world_x, p.world_y]
        });

        let bone = &mut self.bones[index];
        bone.ax = x;
        bone.ay = y;
        bone.arotation = rotation;
        bone.ascale_x = scale_x;
        bone.ascale_y = scale_y;
        bone.ashear_x = shear_x;
        bone.ashear_y = shear_y;

        let Some([pa, pb, pc, pd, parent_x, parent_y]) = parent else {
            let rx = (rotation + shear_x).to_radians();
            let ry = (rotation + 90.0 + shear_y).to_radians();
            bone.a = rx.cos() * scale_x * sx;
            bone.b = ry.cos() * scale_y * sx;
            bone.c = rx.sin() * scale_x * sy;
            bone.d = ry.sin() * scale_y * sy;
            bone.world_x = x * sx + skeleton_x;
            bone.world_y = y * sy + skeleton_y;
            return;
        };

        bone.world_x = pa * x + pb * y + parent_x;
        bone.world_y = pc * x + pd * y + parent_y;

        let [a, b, c, d] = inherited_world_matrix(
            bone.inherit,
            [pa, pb, pc, pd],
            [rotation, scale_x, scale_y, shear_x, shear_y],
            sx,
            sy,
        );
        bone.a = a;
        bone.b = b;
        bone.c = c;
        bone.d = d;
    }

    /// Derives the applied transform from the world transform, after a constraint wrote the
    /// world matrix directly.
    pub fn update_applied_transform(&mut self, index: usize) {
        let sx = self.scale_x;
        let sy = self.effective_scale_y();
        let (skeleton_x, skeleton_y) = (self.x, self.y);
        let parent = self.bones[index].parent.map(|p| {
            let p = &self.bones[p];
            [p.a, p.b, p.c, p.d, p.world_x, p.world_y]
        });
        let bone = &mut self.bones[index];

        let Some([mut pa, mut pb, mut pc, mut pd, parent_x, parent_y]) = parent else {
            bone.ax = bone.world_x - skeleton_x;
            bone.ay = bone.world_y - skeleton_y;
            bone.arotation = bone.c.atan2(bone.a).to_degrees();
            bone.ascale_x = (bone.a * bone.a + bone.c * bone.c).sqrt();
            bone.ascale_y = (bone.b * bone.b + bone.d * bone.d).sqrt();
            bone.ashear_x = 0.0;
            bone.ashear_y = (bone.a * bone.b + bone.c * bone.d)
                .atan2(bone.a * bone.d - bone.b * bone.c)
                .to_degrees();
            return;
        };

        let mut pid = 1.0 / (pa * pd - pb * pc);
        let mut ia = pd * pid;
        let mut ib = pb * pid;
        let mut ic = pc * pid;
        let mut id = pa * pid;
        let dx = bone.world_x - parent_x;
        let dy = bone.world_y - parent_y;
        bone.ax = dx * ia - dy * ib;
        bone.ay = dy * id - dx * ic;

        let (ra, rb, rc, rd) = if bone.inherit == TransformMode::OnlyTranslation {
            (bone.a, bone.b, bone.c, bone.d)
        } else {
            match bone.inherit {
                TransformMode::NoRotationOrReflection => {
                    let s = (pa * pd - pb * pc).abs() / (pa * pa + pc * pc);
                    let sa = pa / sx;
                    let sc = pc / sy;
                    pb = -sc * s * sx;
                    pd = sa * s * sy;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                }
                TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
                    let (sin, cos) = bone.rotation.to_radians().sin_cos();
                    pa = (pa * cos + pb * sin) / sx;
                    pc = (pc * cos + pd * sin) / sy;
                    let mut s = (pa * pa + pc * pc).sqrt();
                    if s > 0.00001 {
                        s = 1.0 / s;
                    }
                    pa *= s;
                    pc *= s;
                    s = (pa * pa + pc * pc).sqrt();
                    if bone.inherit == TransformMode::NoScale
                        && (pid < 0.0) != ((sx < 0.0) != (sy < 0.0))
                    {
                        s = -s;
                    }
                    let r = std::f32::consts::FRAC_PI_2 + pc.atan2(pa);
                    pb = r.cos() * s;
                    pd = r.sin() * s;
                    pid = 1.0 / (pa * pd - pb * pc);
                    ia = pd * pid;
                    ib = pb * pid;
                    ic = pc * pid;
                    id = pa * pid;
                }
                TransformMode::Normal | TransformMode::OnlyTranslation => {}
            }
            (
                ia * bone.a - ib * bone.c,
                ia * bone.b - ib * bone.d,
                id * bone.c - ic * bone.a,
                id * bone.d - ic * bone.b,
            )
        };

        bone.ashear_x = 0.0;
        bone.ascale_x = (ra * ra + rc * rc).sqrt();
        if bone.ascale_x > 0.0001 {
            let det = ra * rd - rb * rc;
            bone.ascale_y = det / bone.ascale_x;
            bone.ashear_y = -(ra * rb + rc * rd).atan2(det).to_degrees();
            bone.arotation = rc.atan2(ra).to_degrees();
        } else {
            bone.ascale_x = 0.0;
            bone.ascale_y = (rb * rb + rd * rd).sqrt();
            bone.ashear_y = 0.0;
            bone.arotation = 90.0 - rd.atan2(rb).to_degrees();
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    /// Resets bones and constraint mixes to the setup pose. Physics simulation state is kept.
    pub fn set_bones_to_setup_pose(&mut self) {
        let data = Arc::clone(&self.data);
        for (bone, bone_data) in self.bones.iter_mut().zip(&data.bones) {
            bone.set_to_setup_pose(bone_data);
        }
        for (c, d) in self.ik_constraints.iter_mut().zip(&data.ik_constraints) {
            c.set_to_setup_pose(d);
        }
        for (c, d) in self
            .transform_constraints
            .iter_mut()
            .zip(&data.transform_constraints)
        {
            c.set_to_setup_pose(d);
        }
        for (c, d) in self.path_constraints.iter_mut().zip(&data.path_constraints) {
            c.set_to_setup_pose(d);
        }
        for (c, d) in self
            .physics_constraints
            .iter_mut()
            .zip(&data.physics_constraints)
        {
            c.set_to_setup_pose(d);
        }
    }

    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order.clear();
        self.draw_order.extend(0..self.slots.len());
        for slot in 0..self.slots.len() {
            self.set_slot_to_setup_pose(slot);
        }
    }

    fn set_slot_to_setup_pose(&mut self, index: usize) {
        let data = Arc::clone(&self.data);
        let slot_data = &data.slots[index];
        let slot = &mut self.slots[index];
        slot.color = slot_data.color;
        if let (Some(dark), Some(setup)) = (slot.dark_color.as_mut(), slot_data.dark_color) {
            *dark = setup;
        }
        slot.attachment = None;
        let key = slot_data
            .attachment
            .as_deref()
            .and_then(|name| self.find_attachment(index, name));
        if key.is_some() {
            self.set_slot_attachment(index, key);
        }
    }

    /// Switches skins. Slots showing an attachment from the old skin switch to the new skin's
    /// attachment of the same name, if it has one. Without an old skin, slots whose setup
    /// attachment exists in the new skin show it.
    pub fn set_skin(&mut self, skin: Option<usize>) {
        if skin == self.skin {
            return;
        }
        if let Some(new_skin) = skin {
            let data = Arc::clone(&self.data);
            let Some(new) = data.skins.get(new_skin) else {
                log::warn!("ignoring out-of-range skin index {new_skin}");
                return;
            };
            for i in 0..self.slots.len() {
                let name = match self.skin {
                    Some(old_skin) => match &self.slots[i].attachment {
                        Some(key) if key.skin == old_skin => key.name.clone(),
                        _ => continue,
                    },
                    None => match &data.slots[i].attachment {
                        Some(name) => name.clone(),
                        None => continue,
                    },
                };
                if new.attachment(i, &name).is_some() {
                    self.set_slot_attachment(
                        i,
                        Some(AttachmentKey {
                            skin: new_skin,
                            name,
                        }),
                    );
                }
            }
        }
        self.skin = skin;
        self.update_cache();
    }

    pub fn set_skin_by_name(&mut self, name: &str) -> Result<(), Error> {
        let skin = self
            .data
            .find_skin(name)
            .ok_or_else(|| Error::UnknownSkin {
                name: name.to_string(),
            })?;
        self.set_skin(Some(skin));
        Ok(())
    }

    /// Finds an attachment by name, in the current skin first and then the default skin.
    pub fn attachment(&self, slot: usize, name: &str) -> Option<&Attachment> {
        let key = self.find_attachment(slot, name)?;
        self.data.skins.get(key.skin)?.attachment(slot, &key.name)
    }

    pub(crate) fn find_attachment(&self, slot: usize, name: &str) -> Option<AttachmentKey> {
        let found = |skin: usize| {
            self.data
                .skins
                .get(skin)
                .and_then(|s| s.attachment(slot, name))
                .map(|_| AttachmentKey {
                    skin,
                    name: name.to_string(),
                })
        };
        self.skin
            .and_then(found)
            .or_else(|| self.data.default_skin.and_then(found))
    }

    /// The attachment a slot currently shows.
    pub fn slot_attachment(&self, slot: usize) -> Option<&Attachment> {
        let key = self.slots.get(slot)?.attachment.as_ref()?;
        self.data.skins.get(key.skin)?.attachment(slot, &key.name)
    }

    /// Shows the named attachment in the named slot, or clears the slot for `None`.
    pub fn set_attachment(
        &mut self,
        slot_name: &str,
        attachment_name: Option<&str>,
    ) -> Result<(), Error> {
        let slot = self.find_slot(slot_name).ok_or_else(|| Error::UnknownSlot {
            name: slot_name.to_string(),
        })?;
        let key = match attachment_name {
            Some(name) => Some(self.find_attachment(slot, name).ok_or_else(|| {
                Error::UnknownAttachment {
                    slot: slot_name.to_string(),
                    name: name.to_string(),
                }
            })?),
            None => None,
        };
        self.set_slot_attachment(slot, key);
        Ok(())
    }

    /// Changes a slot's attachment. The deform is kept only when both attachments are
    /// vertex attachments driven by the same timelines.
    pub(crate) fn set_slot_attachment(&mut self, index: usize, key: Option<AttachmentKey>) {
        if self.slots[index].attachment == key {
            return;
        }
        let timeline_id = |key: Option<&AttachmentKey>| {
            key.and_then(|k| self.data.skins.get(k.skin)?.attachment(index, &k.name))
                .and_then(Attachment::vertex_data)
                .map(|v| v.timeline_id)
        };
        let old = timeline_id(self.slots[index].attachment.as_ref());
        let new = timeline_id(key.as_ref());
        let slot = &mut self.slots[index];
        if old.is_none() || old != new {
            slot.deform.clear();
        }
        slot.attachment = key;
        slot.sequence_index = -1;
    }

    /// Transforms `count` floats of a vertex attachment's vertices, starting at float `start`,
    /// into world space. Output pairs are written at `offset`, `stride` floats apart.
    #[allow(clippy::too_many_arguments)]
    pub fn compute_world_vertices(
        &self,
        slot: usize,
        vertex: &VertexData,
        start: usize,
        count: usize,
        world_vertices: &mut Vec<f32>,
        offset: usize,
        stride: usize,
    ) {
        let Some(slot) = self.slots.get(slot) else {
            return;
        };
        compute_vertex_world_vertices(
            &self.bones,
            slot,
            vertex,
            start,
            count,
            world_vertices,
            offset,
            stride,
        );
    }

    /// World vertices of the slot's current vertex attachment, or the four corners of its
    /// region attachment.
    pub fn slot_world_vertices(&self, slot: usize) -> Option<Vec<f32>> {
        match self.slot_attachment(slot)? {
            Attachment::Region(region) => Some(self.region_world_vertices(slot, region).to_vec()),
            attachment => {
                let vertex = attachment.vertex_data()?;
                let mut out = vec![0.0; vertex.world_vertices_length];
                self.compute_world_vertices(
                    slot,
                    vertex,
                    0,
                    vertex.world_vertices_length,
                    &mut out,
                    0,
                    2,
                );
                Some(out)
            }
        }
    }

    /// Quad corners in world space, in [`RegionAttachment::local_vertices`] order.
    pub fn region_world_vertices(&self, slot: usize, region: &RegionAttachment) -> [f32; 8] {
        let Some(slot) = self.slots.get(slot) else {
            return [0.0; 8];
        };
        let bone = &self.bones[slot.bone];
        let local = region.local_vertices(region.texture_region(slot.sequence_index));
        let mut out = [0.0; 8];
        for (o, l) in out.chunks_exact_mut(2).zip(local.chunks_exact(2)) {
            let [x, y] = bone.local_to_world([l[0], l[1]]);
            o[0] = x;
            o[1] = y;
        }
        out
    }

    pub fn point_world_position(&self, slot: usize, point: &PointAttachment) -> [f32; 2] {
        let bone = &self.bones[self.slots[slot].bone];
        bone.local_to_world([point.x, point.y])
    }

    /// World rotation of a point attachment, in degrees.
    pub fn point_world_rotation(&self, slot: usize, point: &PointAttachment) -> f32 {
        let bone = &self.bones[self.slots[slot].bone];
        let (sin, cos) = point.rotation.to_radians().sin_cos();
        let x = cos * bone.a + sin * bone.b;
        let y = cos * bone.c + sin * bone.d;
        y.atan2(x).to_degrees()
    }
}

/// World matrix of a child bone for its inherit mode. `local` is rotation, scale x, scale y,
/// shear x and shear y; `sx` and `sy` are the skeleton scale.
fn inherited_world_matrix(
    inherit: TransformMode,
    [mut pa, mut pb, mut pc, mut pd]: [f32; 4],
    [rotation, scale_x, scale_y, shear_x, shear_y]: [f32; 5],
    sx: f32,
    sy: f32,
) -> [f32; 4] {
    let [a, b, c, d] = match inherit {
        TransformMode::Normal => {
            let rx = (rotation + shear_x).to_radians();
            let ry = (rotation + 90.0 + shear_y).to_radians();
            let la = rx.cos() * scale_x;
            let lb = ry.cos() * scale_y;
            let lc = rx.sin() * scale_x;
            let ld = ry.sin() * scale_y;
            return [
                pa * la + pb * lc,
                pa * lb + pb * ld,
                pc * la + pd * lc,
                pc * lb + pd * ld,
            ];
        }
        TransformMode::OnlyTranslation => {
            let rx = (rotation + shear_x).to_radians();
            let ry = (rotation + 90.0 + shear_y).to_radians();
            [
                rx.cos() * scale_x,
                ry.cos() * scale_y,
                rx.sin() * scale_x,
                ry.sin() * scale_y,
            ]
        }
        TransformMode::NoRotationOrReflection => {
            let isx = 1.0 / sx;
            let isy = 1.0 / sy;
            pa *= isx;
            pc *= isy;
            let mut s = pa * pa + pc * pc;
            let prx;
            if s > 0.0001 {
                s = (pa * pd * isy - pb * isx * pc).abs() / s;
                pb = pc * s;
                pd = pa * s;
                prx = pc.atan2(pa).to_degrees();
            } else {
                pa = 0.0;
                pc = 0.0;
                prx = 90.0 - pd.atan2(pb).to_degrees();
            }
            let rx = (rotation + shear_x - prx).to_radians();
            let ry = (rotation + shear_y - prx + 90.0).to_radians();
            let la = rx.cos() * scale_x;
            let lb = ry.cos() * scale_y;
            let lc = rx.sin() * scale_x;
            let ld = ry.sin() * scale_y;
            [
                pa * la - pb * lc,
                pa * lb - pb * ld,
                pc * la + pd * lc,
                pc * lb + pd * ld,
            ]
        }
        TransformMode::NoScale | TransformMode::NoScaleOrReflection => {
            let (sin, cos) = rotation.to_radians().sin_cos();
            let mut za = (pa * cos + pb * sin) / sx;
            let mut zc = (pc * cos + pd * sin) / sy;
            let mut s = (za * za + zc * zc).sqrt();
            if s > 0.00001 {
                s = 1.0 / s;
            }
            za *= s;
            zc *= s;
            s = (za * za + zc * zc).sqrt();
            if inherit == TransformMode::NoScale
                && (pa * pd - pb * pc < 0.0) != ((sx < 0.0) != (sy < 0.0))
            {
                s = -s;
            }
            let r = std::f32::consts::FRAC_PI_2 + zc.atan2(za);
            let zb = r.cos() * s;
            let zd = r.sin() * s;
            let shear_x = shear_x.to_radians();
            let shear_y = (90.0 + shear_y).to_radians();
            let la = shear_x.cos() * scale_x;
            let lb = shear_y.cos() * scale_y;
            let lc = shear_x.sin() * scale_x;
            let ld = shear_y.sin() * scale_y;
            [
                za * la + zb * lc,
                za * lb + zb * ld,
                zc * la + zd * lc,
                zc * lb + zd * ld,
            ]
        }
    };
    [a * sx, b * sx, c * sy, d * sy]
}

#[allow(clippy::too_many_arguments)]
pub(crate) fn compute_vertex_world_vertices(
    bones: &[Bone],
    slot: &Slot,
    vertex: &VertexData,
    start: usize,
    count: usize,
    world_vertices: &mut Vec<f32>,
    offset: usize,
    stride: usize,
) {
    let start_vertex = start / 2;
    let vertex_count = count / 2;
    if vertex_count == 0 {
        return;
    }
    let out_end = offset + (vertex_count - 1) * stride + 2;
    if world_vertices.len() < out_end {
        world_vertices.resize(out_end, 0.0);
    }
    let deform = slot.deform.as_slice();

    match &vertex.vertices {
        MeshVertices::Unweighted(vertices) => {
            let bone = &bones[slot.bone];
            let source = if deform.is_empty() {
                vertices.as_flattened()
            } else {
                deform
            };
            let available = (source.len() / 2).saturating_sub(start_vertex);
            for i in 0..vertex_count.min(available) {
                let v = (start_vertex + i) * 2;
                let [x, y] = bone.local_to_world([source[v], source[v + 1]]);
                let w = offset + i * stride;
                world_vertices[w] = x;
                world_vertices[w + 1] = y;
            }
        }
        MeshVertices::Weighted(vertices) => {
            let skip: usize = vertices.iter().take(start_vertex).map(Vec::len).sum();
            let mut f = skip * 2;
            for (i, weights) in vertices
                .iter()
                .skip(start_vertex)
                .take(vertex_count)
                .enumerate()
            {
                let mut wx = 0.0f32;
                let mut wy = 0.0f32;
                for weight in weights {
                    let bone = &bones[weight.bone];
                    let (mut vx, mut vy) = (weight.x, weight.y);
                    if !deform.is_empty() {
                        vx += deform.get(f).copied().unwrap_or(0.0);
                        vy += deform.get(f + 1).copied().unwrap_or(0.0);
                    }
                    f += 2;
                    wx += (vx * bone.a + vy * bone.b + bone.world_x) * weight.weight;
                    wy += (vx * bone.c + vy * bone.d + bone.world_y) * weight.weight;
                }
                let w = offset + i * stride;
                world_vertices[w] = wx;
                world_vertices[w + 1] = wy;
            }
        }
    }
}

fn build_bone_children_indices(bones: &[Bone]) -> Vec<Vec<usize>> {
    let mut children = vec![Vec::<usize>::new(); bones.len()];
    for (index, bone) in bones.iter().enumerate() {
        if let Some(parent) = bone.parent {
            if parent < children.len() {
                children[parent].push(index);
            }
        }
    }
    children
}

pub(crate) fn wrap_pi(mut radians: f32) -> f32 {
    use std::f32::consts::{PI, TAU};
    if radians > PI {
        radians -= TAU;
    } else if radians < -PI {
        radians += TAU;
    }
    radians
}
