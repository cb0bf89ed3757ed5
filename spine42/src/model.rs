use crate::{Attachment, Error, Timeline};
use std::collections::HashMap;

#[derive(Clone, Debug)]
pub struct BoneData {
    pub name: String,
    pub parent: Option<usize>,
    pub length: f32,
    pub x: f32,
    pub y: f32,
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub shear_x: f32,
    pub shear_y: f32,
    pub transform_mode: TransformMode,
    pub skin_required: bool,
    /// Editor-only metadata, present when the asset was exported with nonessential data.
    pub color: [f32; 4],
    pub icon: Option<String>,
    pub visible: bool,
}

impl BoneData {
    pub fn new(name: impl Into<String>, parent: Option<usize>) -> Self {
        Self {
            name: name.into(),
            parent,
            length: 0.0,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            shear_x: 0.0,
            shear_y: 0.0,
            transform_mode: TransformMode::Normal,
            skin_required: false,
            color: [0.61, 0.61, 0.61, 1.0],
            icon: None,
            visible: true,
        }
    }
}

/// How much of the parent's world transform a bone inherits.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum TransformMode {
    #[default]
    Normal,
    OnlyTranslation,
    NoRotationOrReflection,
    NoScale,
    NoScaleOrReflection,
}

impl TransformMode {
    pub(crate) fn from_binary(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Normal,
            1 => Self::OnlyTranslation,
            2 => Self::NoRotationOrReflection,
            3 => Self::NoScale,
            4 => Self::NoScaleOrReflection,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct SlotData {
    pub name: String,
    pub bone: usize,
    pub color: [f32; 4],
    /// Two-color tint; `None` when the slot has no dark color.
    pub dark_color: Option<[f32; 3]>,
    pub attachment: Option<String>,
    pub blend: BlendMode,
    pub visible: bool,
}

impl SlotData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            bone,
            color: [1.0; 4],
            dark_color: None,
            attachment: None,
            blend: BlendMode::Normal,
            visible: true,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum BlendMode {
    #[default]
    Normal,
    Additive,
    Multiply,
    Screen,
}

impl BlendMode {
    pub(crate) fn from_binary(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Normal,
            1 => Self::Additive,
            2 => Self::Multiply,
            3 => Self::Screen,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug)]
pub struct IkConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
    pub uniform: bool,
    pub mix: f32,
    pub softness: f32,
}

#[derive(Clone, Debug, Default)]
pub struct TransformConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    pub target: usize,
    pub local: bool,
    pub relative: bool,
    pub offset_rotation: f32,
    pub offset_x: f32,
    pub offset_y: f32,
    pub offset_scale_x: f32,
    pub offset_scale_y: f32,
    pub offset_shear_y: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
    pub mix_scale_x: f32,
    pub mix_scale_y: f32,
    pub mix_shear_y: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum PositionMode {
    #[default]
    Fixed,
    Percent,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum SpacingMode {
    #[default]
    Length,
    Fixed,
    Percent,
    Proportional,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum RotateMode {
    #[default]
    Tangent,
    Chain,
    ChainScale,
}

#[derive(Clone, Debug)]
pub struct PathConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bones: Vec<usize>,
    /// Slot whose current attachment must be a path.
    pub target: usize,
    pub position_mode: PositionMode,
    pub spacing_mode: SpacingMode,
    pub rotate_mode: RotateMode,
    pub offset_rotation: f32,
    pub position: f32,
    pub spacing: f32,
    pub mix_rotate: f32,
    pub mix_x: f32,
    pub mix_y: f32,
}

#[derive(Clone, Debug)]
pub struct PhysicsConstraintData {
    pub name: String,
    pub order: i32,
    pub skin_required: bool,
    pub bone: usize,
    pub x: f32,
    pub y: f32,
    pub rotate: f32,
    pub scale_x: f32,
    pub shear_x: f32,
    pub limit: f32,
    /// Fixed simulation sub-step in seconds.
    pub step: f32,
    pub inertia: f32,
    pub strength: f32,
    pub damping: f32,
    pub mass_inverse: f32,
    pub wind: f32,
    pub gravity: f32,
    pub mix: f32,
    pub inertia_global: bool,
    pub strength_global: bool,
    pub damping_global: bool,
    pub mass_global: bool,
    pub wind_global: bool,
    pub gravity_global: bool,
    pub mix_global: bool,
}

impl PhysicsConstraintData {
    pub fn new(name: impl Into<String>, bone: usize) -> Self {
        Self {
            name: name.into(),
            order: 0,
            skin_required: false,
            bone,
            x: 0.0,
            y: 0.0,
            rotate: 0.0,
            scale_x: 0.0,
            shear_x: 0.0,
            limit: 5000.0,
            step: 1.0 / 60.0,
            inertia: 1.0,
            strength: 100.0,
            damping: 1.0,
            mass_inverse: 1.0,
            wind: 0.0,
            gravity: 0.0,
            mix: 1.0,
            inertia_global: false,
            strength_global: false,
            damping_global: false,
            mass_global: false,
            wind_global: false,
            gravity_global: false,
            mix_global: false,
        }
    }
}

#[derive(Clone, Debug)]
pub struct SkinData {
    pub name: String,
    /// Per-slot attachment maps, indexed by slot.
    pub attachments: Vec<HashMap<String, Attachment>>,
    pub bones: Vec<usize>,
    pub ik_constraints: Vec<usize>,
    pub transform_constraints: Vec<usize>,
    pub path_constraints: Vec<usize>,
    pub physics_constraints: Vec<usize>,
    pub color: [f32; 4],
}

impl SkinData {
    pub fn new(name: impl Into<String>, slot_count: usize) -> Self {
        Self {
            name: name.into(),
            attachments: vec![HashMap::new(); slot_count],
            bones: Vec::new(),
            ik_constraints: Vec::new(),
            transform_constraints: Vec::new(),
            path_constraints: Vec::new(),
            physics_constraints: Vec::new(),
            color: [0.99607843, 0.61960787, 0.30980393, 1.0],
        }
    }

    pub fn attachment(&self, slot: usize, name: &str) -> Option<&Attachment> {
        self.attachments.get(slot)?.get(name)
    }

    pub(crate) fn attachment_mut(&mut self, slot: usize, name: &str) -> Option<&mut Attachment> {
        self.attachments.get_mut(slot)?.get_mut(name)
    }

    pub fn set_attachment(&mut self, slot: usize, name: impl Into<String>, attachment: Attachment) {
        if self.attachments.len() <= slot {
            self.attachments.resize_with(slot + 1, HashMap::new);
        }
        self.attachments[slot].insert(name.into(), attachment);
    }
}

#[derive(Clone, Debug)]
pub struct EventData {
    pub name: String,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: Option<String>,
    pub audio_path: Option<String>,
    pub volume: f32,
    pub balance: f32,
}

/// A keyed occurrence of an [`EventData`] inside an animation.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Index into [`SkeletonData::events`].
    pub data: usize,
    pub time: f32,
    pub int_value: i32,
    pub float_value: f32,
    pub string_value: Option<String>,
    pub volume: f32,
    pub balance: f32,
}

#[derive(Clone, Debug)]
pub struct Animation {
    pub name: String,
    pub timelines: Vec<Timeline>,
    pub duration: f32,
}

/// Setup pose and animations shared by every [`crate::Skeleton`] built from one asset.
#[derive(Clone, Debug)]
pub struct SkeletonData {
    pub hash: Option<String>,
    pub version: Option<String>,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub reference_scale: f32,
    pub fps: f32,
    pub images_path: Option<String>,
    pub audio_path: Option<String>,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    pub skins: Vec<SkinData>,
    pub default_skin: Option<usize>,
    pub events: Vec<EventData>,
    pub animations: Vec<Animation>,
    pub ik_constraints: Vec<IkConstraintData>,
    pub transform_constraints: Vec<TransformConstraintData>,
    pub path_constraints: Vec<PathConstraintData>,
    pub physics_constraints: Vec<PhysicsConstraintData>,
}

impl Default for SkeletonData {
    fn default() -> Self {
        Self {
            hash: None,
            version: None,
            x: 0.0,
            y: 0.0,
            width: 0.0,
            height: 0.0,
            reference_scale: 100.0,
            fps: 30.0,
            images_path: None,
            audio_path: None,
            bones: Vec::new(),
            slots: Vec::new(),
            skins: Vec::new(),
            default_skin: None,
            events: Vec::new(),
            animations: Vec::new(),
            ik_constraints: Vec::new(),
            transform_constraints: Vec::new(),
            path_constraints: Vec::new(),
            physics_constraints: Vec::new(),
        }
    }
}

impl SkeletonData {
    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.bones.iter().position(|b| b.name == name)
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.slots.iter().position(|s| s.name == name)
    }

    pub fn find_skin(&self, name: &str) -> Option<usize> {
        self.skins.iter().position(|s| s.name == name)
    }

    pub fn find_event(&self, name: &str) -> Option<usize> {
        self.events.iter().position(|e| e.name == name)
    }

    pub fn animation(&self, name: &str) -> Option<&Animation> {
        self.animations.iter().find(|a| a.name == name)
    }

    /// Like [`SkeletonData::animation`], but a missing name is an error.
    pub fn animation_by_name(&self, name: &str) -> Result<&Animation, Error> {
        self.animation(name).ok_or_else(|| Error::UnknownAnimation {
            name: name.to_string(),
        })
    }

    pub fn default_skin(&self) -> Option<&SkinData> {
        self.default_skin.and_then(|i| self.skins.get(i))
    }
}
