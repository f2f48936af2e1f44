//! Animation clips
//!
//! A clip is a named set of samplers plus the channels that route each sampler's output to
//! a bone property, the model transform or a morph weight.

use thiserror::Error;

use super::pose::{Pose, PoseWriter};
use super::runtime::SkeletonRuntime;
use super::sampler::{AnimationSampler, SampledValue, SamplerOutput};
use crate::foundation::math::Transform;

/// What a channel animates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChannelTarget {
    /// A bone's local pose
    Bone(u32),
    /// The transform of the whole model
    Model,
    /// A morph target weight
    Morph(u32),
}

/// Which property of the target a channel writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetPath {
    /// Position
    Translation,
    /// Orientation
    Rotation,
    /// Scale
    Scale,
    /// Morph weight
    Weights,
}

impl TargetPath {
    fn accepts(self, output: &SamplerOutput) -> bool {
        matches!(
            (self, output),
            (Self::Translation, SamplerOutput::Translations(_))
                | (Self::Rotation, SamplerOutput::Rotations(_))
                | (Self::Scale, SamplerOutput::Scales(_))
                | (Self::Weights, SamplerOutput::Weights(_))
        )
    }
}

/// Binds one sampler to one target property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationChannel {
    /// Index into the clip's samplers
    pub sampler: usize,
    /// Animated object
    pub target: ChannelTarget,
    /// Animated property
    pub path: TargetPath,
}

impl AnimationChannel {
    /// Create a channel
    pub fn new(sampler: usize, target: ChannelTarget, path: TargetPath) -> Self {
        Self {
            sampler,
            target,
            path,
        }
    }

    /// Channel driving a bone property
    pub fn bone(sampler: usize, bone: u32, path: TargetPath) -> Self {
        Self::new(sampler, ChannelTarget::Bone(bone), path)
    }
}

/// Problems found by [`AnimationClip::validate`]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClipError {
    /// A channel references a sampler that does not exist
    #[error("Channel {channel} references missing sampler {sampler}")]
    MissingSampler {
        /// Channel index
        channel: usize,
        /// Sampler index it referenced
        sampler: usize,
    },

    /// A channel's path does not match the kind of data its sampler produces
    #[error("Channel {channel} writes {path:?} but its sampler produces other data")]
    PathMismatch {
        /// Channel index
        channel: usize,
        /// Path the channel writes
        path: TargetPath,
    },

    /// Morph weights must target a morph, bone and model channels must not
    #[error("Channel {channel} pairs {path:?} with {target:?}")]
    TargetMismatch {
        /// Channel index
        channel: usize,
        /// Channel target
        target: ChannelTarget,
        /// Channel path
        path: TargetPath,
    },

    /// Sampler has no usable keyframes
    #[error("Sampler {0} has no keyframes")]
    EmptySampler(usize),

    /// Number of values does not match the number of keyframe times
    #[error("Sampler {sampler} has {times} times but {values} values")]
    LengthMismatch {
        /// Sampler index
        sampler: usize,
        /// Keyframe times
        times: usize,
        /// Stored values
        values: usize,
    },

    /// Keyframe times are not strictly increasing
    #[error("Sampler {0} has unordered keyframe times")]
    UnorderedTimes(usize),
}

/// Named animation made of samplers and channels
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnimationClip {
    name: String,
    samplers: Vec<AnimationSampler>,
    channels: Vec<AnimationChannel>,
    duration: f32,
}

impl AnimationClip {
    /// Create a clip; duration is the latest keyframe time across all samplers
    ///
    /// Malformed data is logged and tolerated. Evaluation skips what it cannot use.
    pub fn new(
        name: impl Into<String>,
        samplers: Vec<AnimationSampler>,
        channels: Vec<AnimationChannel>,
    ) -> Self {
        let duration = samplers
            .iter()
            .filter_map(AnimationSampler::end_time)
            .filter(|t| t.is_finite())
            .fold(0.0_f32, f32::max);

        let clip = Self {
            name: name.into(),
            samplers,
            channels,
            duration,
        };
        if let Err(e) = clip.validate() {
            log::warn!("Animation clip '{}' is malformed: {}", clip.name, e);
        }
        clip
    }

    /// Clip name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    /// Length in seconds
    pub fn duration(&self) -> f32 {
        self.duration
    }

    /// All samplers
    pub fn samplers(&self) -> &[AnimationSampler] {
        &self.samplers
    }

    /// All channels
    pub fn channels(&self) -> &[AnimationChannel] {
        &self.channels
    }

    /// Check the clip for data that evaluation would have to skip
    pub fn validate(&self) -> Result<(), ClipError> {
        for (index, sampler) in self.samplers.iter().enumerate() {
            if sampler.keyframe_count() == 0 {
                return Err(ClipError::EmptySampler(index));
            }
            let values = sampler.output().len();
            if values != sampler.times().len() * sampler.stride() {
                return Err(ClipError::LengthMismatch {
                    sampler: index,
                    times: sampler.times().len(),
                    values,
                });
            }
            if !sampler.has_ordered_times() {
                return Err(ClipError::UnorderedTimes(index));
            }
        }

        for (index, channel) in self.channels.iter().enumerate() {
            let sampler = self
                .samplers
                .get(channel.sampler)
                .ok_or(ClipError::MissingSampler {
                    channel: index,
                    sampler: channel.sampler,
                })?;
            if !channel.path.accepts(sampler.output()) {
                return Err(ClipError::PathMismatch {
                    channel: index,
                    path: channel.path,
                });
            }
            let morph_target = matches!(channel.target, ChannelTarget::Morph(_));
            if morph_target != (channel.path == TargetPath::Weights) {
                return Err(ClipError::TargetMismatch {
                    channel: index,
                    target: channel.target,
                    path: channel.path,
                });
            }
        }

        Ok(())
    }

    /// Write every channel's value at `time` into `runtime`
    ///
    /// Only local poses, morph weights and the model transform change; call
    /// [`SkeletonRuntime::recompute`] afterwards. Channels with missing samplers, empty
    /// samplers, out-of-range bones or mismatched data are skipped.
    pub fn sample(&self, time: f32, runtime: &mut SkeletonRuntime) {
        self.sample_into(time, runtime);
    }

    /// Sample only the targets this clip drives
    ///
    /// A bone or model channel that writes one property takes the others from `rest`: the
    /// bind pose for bones, the current model transform for the model.
    pub fn sample_pose(&self, time: f32, rest: &SkeletonRuntime) -> Pose {
        let mut pose = Pose::new();
        self.sample_into(time, &mut PoseWriter::new(&mut pose, rest));
        pose
    }

    fn sample_into(&self, time: f32, sink: &mut impl ChannelSink) {
        for channel in &self.channels {
            let Some(sampler) = self.samplers.get(channel.sampler) else {
                continue;
            };
            if !channel.path.accepts(sampler.output()) {
                continue;
            }
            let Some(value) = sampler.evaluate(time) else {
                continue;
            };
            apply(channel, value, sink);
        }
    }
}

/// Destination for sampled channel values
pub(crate) trait ChannelSink {
    /// Transform written by bone and model channels
    fn transform_mut(&mut self, target: ChannelTarget) -> Option<&mut Transform>;

    /// Store a morph weight
    fn set_weight(&mut self, target: u32, weight: f32);
}

impl ChannelSink for SkeletonRuntime {
    fn transform_mut(&mut self, target: ChannelTarget) -> Option<&mut Transform> {
        match target {
            ChannelTarget::Bone(bone) => self.local_pose_mut(bone),
            ChannelTarget::Model => Some(self.model_transform_mut()),
            ChannelTarget::Morph(_) => None,
        }
    }

    fn set_weight(&mut self, target: u32, weight: f32) {
        self.set_morph_weight(target, weight);
    }
}

fn apply(channel: &AnimationChannel, value: SampledValue, sink: &mut impl ChannelSink) {
    match (channel.target, channel.path, value) {
        (ChannelTarget::Morph(target), TargetPath::Weights, SampledValue::Scalar(weight)) => {
            sink.set_weight(target, weight);
        }
        (ChannelTarget::Morph(_), _, _) | (_, TargetPath::Weights, _) => {}
        (target, path, value) => {
            let Some(transform) = sink.transform_mut(target) else {
                return;
            };
            match (path, value) {
                (TargetPath::Translation, SampledValue::Vector(position)) => {
                    transform.position = position;
                }
                (TargetPath::Rotation, SampledValue::Rotation(rotation)) => {
                    transform.rotation = rotation;
                }
                (TargetPath::Scale, SampledValue::Vector(scale)) => transform.scale = scale,
                _ => {}
            }
        }
    }
}
