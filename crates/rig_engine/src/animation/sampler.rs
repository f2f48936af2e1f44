//! Keyframe samplers
//!
//! A sampler maps a time to a value by interpolating between keyframes. Outputs are stored
//! per property kind so a translation sampler can never be fed rotation data. Cubic spline
//! samplers store `[in_tangent, value, out_tangent]` triplets per keyframe.

use std::ops::{Add, Mul};

use crate::foundation::math::{lerp_vec3, quat_from_coords, slerp_shortest, utils, Quat, Vec3, Vec4};

/// Minimum keyframe interval used when computing the interpolation factor
const MIN_INTERVAL: f32 = 1.0e-6;

/// How values are interpolated between keyframes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interpolation {
    /// Hold the previous keyframe's value
    Step,
    /// Linear for vectors and scalars, shortest-arc slerp for rotations
    #[default]
    Linear,
    /// Cubic Hermite spline with per-keyframe tangents
    CubicSpline,
}

/// Keyframe values, one variant per property kind
#[derive(Debug, Clone, PartialEq)]
pub enum SamplerOutput {
    /// Bone or model translations
    Translations(Vec<Vec3>),
    /// Rotations as raw `x, y, z, w` coordinates
    Rotations(Vec<Vec4>),
    /// Bone or model scales
    Scales(Vec<Vec3>),
    /// Morph target weights
    Weights(Vec<f32>),
}

impl SamplerOutput {
    /// Rotation output from unit quaternions
    pub fn rotations(rotations: impl IntoIterator<Item = Quat>) -> Self {
        Self::Rotations(rotations.into_iter().map(|q| q.coords).collect())
    }

    /// Number of stored values (tangents included)
    pub fn len(&self) -> usize {
        match self {
            Self::Translations(values) | Self::Scales(values) => values.len(),
            Self::Rotations(values) => values.len(),
            Self::Weights(values) => values.len(),
        }
    }

    /// True if no values are stored
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of evaluating a sampler
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampledValue {
    /// Translation or scale
    Vector(Vec3),
    /// Normalized rotation
    Rotation(Quat),
    /// Morph weight
    Scalar(f32),
}

/// Keyframe times, values and interpolation mode
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSampler {
    times: Vec<f32>,
    output: SamplerOutput,
    interpolation: Interpolation,
}

impl AnimationSampler {
    /// Create a sampler; `times` should be strictly increasing
    pub fn new(times: Vec<f32>, output: SamplerOutput, interpolation: Interpolation) -> Self {
        Self {
            times,
            output,
            interpolation,
        }
    }

    /// Linear sampler
    pub fn linear(times: Vec<f32>, output: SamplerOutput) -> Self {
        Self::new(times, output, Interpolation::Linear)
    }

    /// Step sampler
    pub fn step(times: Vec<f32>, output: SamplerOutput) -> Self {
        Self::new(times, output, Interpolation::Step)
    }

    /// Cubic spline sampler; `output` holds three values per keyframe
    pub fn cubic_spline(times: Vec<f32>, output: SamplerOutput) -> Self {
        Self::new(times, output, Interpolation::CubicSpline)
    }

    /// Keyframe times
    pub fn times(&self) -> &[f32] {
        &self.times
    }

    /// Keyframe values
    pub fn output(&self) -> &SamplerOutput {
        &self.output
    }

    /// Interpolation mode
    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    /// Values stored per keyframe
    pub fn stride(&self) -> usize {
        match self.interpolation {
            Interpolation::CubicSpline => 3,
            Interpolation::Step | Interpolation::Linear => 1,
        }
    }

    /// Keyframes that have both a time and a complete value
    pub fn keyframe_count(&self) -> usize {
        self.times.len().min(self.output.len() / self.stride())
    }

    /// Time of the last usable keyframe
    pub fn end_time(&self) -> Option<f32> {
        self.keyframe_count()
            .checked_sub(1)
            .map(|last| self.times[last])
    }

    /// True if every keyframe time is finite and strictly after the previous one
    pub fn has_ordered_times(&self) -> bool {
        self.times.iter().all(|t| t.is_finite())
            && self.times.windows(2).all(|pair| pair[0] < pair[1])
    }

    /// Value at `time`, or `None` if the sampler has no keyframes
    ///
    /// Times before the first keyframe clamp to it, times after the last clamp to the last.
    pub fn evaluate(&self, time: f32) -> Option<SampledValue> {
        let count = self.keyframe_count();
        if count == 0 {
            return None;
        }
        let times = &self.times[..count];
        let interpolation = self.interpolation;

        let value = match &self.output {
            SamplerOutput::Translations(values) | SamplerOutput::Scales(values) => {
                SampledValue::Vector(sample_keys(times, values, interpolation, time, |a, b, t| {
                    lerp_vec3(&a, &b, t)
                }))
            }
            SamplerOutput::Rotations(values) => {
                let coords = sample_keys(times, values, interpolation, time, |a, b, t| {
                    slerp_shortest(&quat_from_coords(&a), &quat_from_coords(&b), t).coords
                });
                SampledValue::Rotation(quat_from_coords(&coords))
            }
            SamplerOutput::Weights(values) => {
                SampledValue::Scalar(sample_keys(times, values, interpolation, time, utils::lerp))
            }
        };
        Some(value)
    }
}

/// Interpolate `values` at `time`; `times` is non-empty and trimmed to usable keyframes
fn sample_keys<V>(
    times: &[f32],
    values: &[V],
    interpolation: Interpolation,
    time: f32,
    lerp: impl Fn(V, V, f32) -> V,
) -> V
where
    V: Copy + Add<Output = V> + Mul<f32, Output = V>,
{
    let stride = match interpolation {
        Interpolation::CubicSpline => 3,
        Interpolation::Step | Interpolation::Linear => 1,
    };
    // Cubic spline keyframes store the value between their tangents
    let offset = stride / 2;
    let value_at = |key: usize| values[key * stride + offset];

    let last = times.len() - 1;
    if time.is_nan() || time <= times[0] {
        return value_at(0);
    }
    if time >= times[last] {
        return value_at(last);
    }

    let key = times
        .partition_point(|&t| t <= time)
        .saturating_sub(1)
        .min(last.saturating_sub(1));
    let interval = (times[key + 1] - times[key]).max(MIN_INTERVAL);
    let t = ((time - times[key]) / interval).clamp(0.0, 1.0);

    match interpolation {
        Interpolation::Step => value_at(key),
        Interpolation::Linear => lerp(value_at(key), value_at(key + 1), t),
        Interpolation::CubicSpline => {
            let start = values[key * 3 + 1];
            let out_tangent = values[key * 3 + 2] * interval;
            let in_tangent = values[(key + 1) * 3] * interval;
            let end = values[(key + 1) * 3 + 1];
            hermite(start, out_tangent, end, in_tangent, t)
        }
    }
}

/// Cubic Hermite basis with tangents already scaled by the keyframe interval
fn hermite<V>(p0: V, m0: V, p1: V, m1: V, t: f32) -> V
where
    V: Copy + Add<Output = V> + Mul<f32, Output = V>,
{
    let t2 = t * t;
    let t3 = t2 * t;
    p0 * (2.0 * t3 - 3.0 * t2 + 1.0)
        + m0 * (t3 - 2.0 * t2 + t)
        + p1 * (-2.0 * t3 + 3.0 * t2)
        + m1 * (t3 - t2)
}
