//! Keyframe storage and sampling.
//!
//! Frames are kept in time order. Sampling finds the frame whose time is the greatest one
//! not after the query time, then interpolates toward the next frame using that frame's
//! curve. Queries past the last frame hold the last value.

use crate::{Event, TransformMode};

/// Number of floats stored per Bezier segment: 9 `(x, y)` points.
pub const BEZIER_SIZE: usize = 18;

/// Forward-differenced samples of one cubic Bezier channel.
///
/// The curve maps time to value but is only implicitly invertible, so evaluation walks the
/// samples monotonically and interpolates linearly between neighbours.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BezierCurve {
    samples: [f32; BEZIER_SIZE],
}

impl BezierCurve {
    /// Precomputes the samples for the segment from `(time1, value1)` to `(time2, value2)`
    /// with control points `(cx1, cy1)` and `(cx2, cy2)`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        time1: f32,
        value1: f32,
        cx1: f32,
        cy1: f32,
        cx2: f32,
        cy2: f32,
        time2: f32,
        value2: f32,
    ) -> Self {
        let (time1, value1, time2, value2) = (
            f64::from(time1),
            f64::from(value1),
            f64::from(time2),
            f64::from(value2),
        );
        let (cx1, cy1, cx2, cy2) = (
            f64::from(cx1),
            f64::from(cy1),
            f64::from(cx2),
            f64::from(cy2),
        );
        let tmpx = (time1 - cx1 * 2.0 + cx2) * 0.03;
        let tmpy = (value1 - cy1 * 2.0 + cy2) * 0.03;
        let dddx = ((cx1 - cx2) * 3.0 - time1 + time2) * 0.006;
        let dddy = ((cy1 - cy2) * 3.0 - value1 + value2) * 0.006;
        let mut ddx = tmpx * 2.0 + dddx;
        let mut ddy = tmpy * 2.0 + dddy;
        let mut dx = (cx1 - time1) * 0.3 + tmpx + dddx * 0.16666667;
        let mut dy = (cy1 - value1) * 0.3 + tmpy + dddy * 0.16666667;
        let mut x = time1 + dx;
        let mut y = value1 + dy;

        let mut samples = [0.0f32; BEZIER_SIZE];
        for pair in samples.chunks_exact_mut(2) {
            pair[0] = x as f32;
            pair[1] = y as f32;
            dx += ddx;
            dy += ddy;
            ddx += dddx;
            ddy += dddy;
            x += dx;
            y += dy;
        }
        Self { samples }
    }

    pub fn samples(&self) -> &[f32; BEZIER_SIZE] {
        &self.samples
    }

    /// Value at `time`, where the segment runs from `(time1, value1)` to `(time2, value2)`.
    pub fn value(&self, time: f32, time1: f32, value1: f32, time2: f32, value2: f32) -> f32 {
        let s = &self.samples;
        if s[0] > time {
            return value1 + (time - time1) / (s[0] - time1) * (s[1] - value1);
        }
        let mut i = 2;
        while i < BEZIER_SIZE {
            if s[i] >= time {
                let x = s[i - 2];
                let y = s[i - 1];
                return y + (time - x) / (s[i] - x) * (s[i + 1] - y);
            }
            i += 2;
        }
        let x = s[BEZIER_SIZE - 2];
        let y = s[BEZIER_SIZE - 1];
        y + (time - x) / (time2 - x) * (value2 - y)
    }
}

/// Interpolation from one frame to the next, one Bezier per channel.
#[derive(Clone, Debug, PartialEq, Default)]
pub enum Curve<const N: usize> {
    #[default]
    Linear,
    Stepped,
    Bezier([BezierCurve; N]),
}

/// Index of the last frame whose time is `<= time`. Callers check `time >= times[0]`.
pub(crate) fn search(times: &[f32], time: f32) -> usize {
    times.partition_point(|&t| t <= time).saturating_sub(1)
}

/// Frames of an `N`-channel curve timeline.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct CurveFrames<const N: usize> {
    pub times: Vec<f32>,
    pub values: Vec<[f32; N]>,
    /// Curve from frame `i` to frame `i + 1`; the last entry is unused.
    pub curves: Vec<Curve<N>>,
}

impl<const N: usize> CurveFrames<N> {
    pub fn with_capacity(frame_count: usize) -> Self {
        Self {
            times: Vec::with_capacity(frame_count),
            values: Vec::with_capacity(frame_count),
            curves: Vec::with_capacity(frame_count),
        }
    }

    pub fn push(&mut self, time: f32, values: [f32; N]) {
        self.times.push(time);
        self.values.push(values);
        self.curves.push(Curve::Linear);
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn last_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    /// Frame index for `time`, or `None` before the first frame.
    pub fn frame_index(&self, time: f32) -> Option<usize> {
        match self.times.first() {
            Some(&first) if time >= first => Some(search(&self.times, time)),
            _ => None,
        }
    }

    /// Interpolated channel values at `time`, or `None` before the first frame.
    pub fn sample(&self, time: f32) -> Option<[f32; N]> {
        let i = self.frame_index(time)?;
        Some(self.value_at(i, time))
    }

    pub(crate) fn value_at(&self, i: usize, time: f32) -> [f32; N] {
        let before = self.values[i];
        if i + 1 >= self.times.len() {
            return before;
        }
        let time1 = self.times[i];
        let time2 = self.times[i + 1];
        let after = self.values[i + 1];
        match &self.curves[i] {
            Curve::Stepped => before,
            Curve::Linear => {
                let t = (time - time1) / (time2 - time1);
                std::array::from_fn(|c| before[c] + (after[c] - before[c]) * t)
            }
            Curve::Bezier(beziers) => std::array::from_fn(|c| {
                beziers[c].value(time, time1, before[c], time2, after[c])
            }),
        }
    }
}

impl CurveFrames<1> {
    pub fn sample1(&self, time: f32) -> Option<f32> {
        self.sample(time).map(|[v]| v)
    }
}

/// Fraction `0..=1` of the way from frame `i` to frame `i + 1`.
pub(crate) fn curve_percent(times: &[f32], curves: &[Curve<1>], i: usize, time: f32) -> f32 {
    let Some(&time2) = times.get(i + 1) else {
        return 0.0;
    };
    let time1 = times[i];
    match &curves[i] {
        Curve::Linear => (time - time1) / (time2 - time1),
        Curve::Stepped => 0.0,
        Curve::Bezier([bezier]) => bezier.value(time, time1, 0.0, time2, 1.0),
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BoneProperty {
    Rotate,
    X,
    Y,
    ScaleX,
    ScaleY,
    ShearX,
    ShearY,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BonePairProperty {
    Translate,
    Scale,
    Shear,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PhysicsProperty {
    Inertia,
    Strength,
    Damping,
    Mass,
    Wind,
    Gravity,
    Mix,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceMode {
    Hold,
    Once,
    Loop,
    PingPong,
    OnceReverse,
    LoopReverse,
    PingPongReverse,
}

impl SequenceMode {
    pub(crate) fn from_binary(value: i32) -> Option<Self> {
        Some(match value {
            0 => Self::Hold,
            1 => Self::Once,
            2 => Self::Loop,
            3 => Self::PingPong,
            4 => Self::OnceReverse,
            5 => Self::LoopReverse,
            6 => Self::PingPongReverse,
            _ => return None,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SequenceKey {
    pub mode: SequenceMode,
    pub index: i32,
    pub delay: f32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct IkKey {
    pub bend_direction: i32,
    pub compress: bool,
    pub stretch: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeformTimeline {
    pub slot: usize,
    /// Id of the vertex attachment the frames were keyed for.
    pub attachment: u32,
    pub times: Vec<f32>,
    pub curves: Vec<Curve<1>>,
    /// Full deform array per frame (absolute for unweighted, offsets for weighted).
    pub vertices: Vec<Vec<f32>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Timeline {
    Attachment {
        slot: usize,
        times: Vec<f32>,
        names: Vec<Option<String>>,
    },
    Rgba {
        slot: usize,
        frames: CurveFrames<4>,
    },
    Rgb {
        slot: usize,
        frames: CurveFrames<3>,
    },
    /// Light rgba followed by dark rgb.
    Rgba2 {
        slot: usize,
        frames: CurveFrames<7>,
    },
    /// Light rgb followed by dark rgb.
    Rgb2 {
        slot: usize,
        frames: CurveFrames<6>,
    },
    Alpha {
        slot: usize,
        frames: CurveFrames<1>,
    },
    Bone {
        bone: usize,
        property: BoneProperty,
        frames: CurveFrames<1>,
    },
    BonePair {
        bone: usize,
        property: BonePairProperty,
        frames: CurveFrames<2>,
    },
    Inherit {
        bone: usize,
        times: Vec<f32>,
        modes: Vec<TransformMode>,
    },
    /// Channels: mix, softness.
    IkConstraint {
        constraint: usize,
        frames: CurveFrames<2>,
        keys: Vec<IkKey>,
    },
    /// Channels: rotate, x, y, scaleX, scaleY, shearY mixes.
    TransformConstraint {
        constraint: usize,
        frames: CurveFrames<6>,
    },
    PathPosition {
        constraint: usize,
        frames: CurveFrames<1>,
    },
    PathSpacing {
        constraint: usize,
        frames: CurveFrames<1>,
    },
    /// Channels: rotate, x, y mixes.
    PathMix {
        constraint: usize,
        frames: CurveFrames<3>,
    },
    /// `constraint == None` targets every constraint whose matching global flag is set.
    Physics {
        constraint: Option<usize>,
        property: PhysicsProperty,
        frames: CurveFrames<1>,
    },
    PhysicsReset {
        constraint: Option<usize>,
        times: Vec<f32>,
    },
    Deform(DeformTimeline),
    Sequence {
        slot: usize,
        attachment: u32,
        times: Vec<f32>,
        keys: Vec<SequenceKey>,
    },
    /// Per frame, the setup slot index for each draw order position.
    DrawOrder {
        times: Vec<f32>,
        orders: Vec<Vec<usize>>,
    },
    Event {
        times: Vec<f32>,
        events: Vec<Event>,
    },
}

impl Timeline {
    pub fn times(&self) -> &[f32] {
        match self {
            Self::Rgba { frames, .. } => &frames.times,
            Self::Rgb { frames, .. } => &frames.times,
            Self::Rgba2 { frames, .. } => &frames.times,
            Self::Rgb2 { frames, .. } => &frames.times,
            Self::Alpha { frames, .. }
            | Self::Bone { frames, .. }
            | Self::PathPosition { frames, .. }
            | Self::PathSpacing { frames, .. }
            | Self::Physics { frames, .. } => &frames.times,
            Self::BonePair { frames, .. } | Self::IkConstraint { frames, .. } => &frames.times,
            Self::TransformConstraint { frames, .. } => &frames.times,
            Self::PathMix { frames, .. } => &frames.times,
            Self::Deform(t) => &t.times,
            Self::Attachment { times, .. }
            | Self::Inherit { times, .. }
            | Self::PhysicsReset { times, .. }
            | Self::Sequence { times, .. }
            | Self::DrawOrder { times, .. }
            | Self::Event { times, .. } => times,
        }
    }

    /// Time of the last frame.
    pub fn duration(&self) -> f32 {
        self.times().last().copied().unwrap_or(0.0)
    }
}
