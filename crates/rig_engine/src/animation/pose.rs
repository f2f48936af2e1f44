//! Sparse poses for blending
//!
//! A [`Pose`] holds values only for the targets something actually animated, so blending
//! two poses or stacking layers leaves everything else alone. Bone and model targets carry
//! a full [`Transform`]; morph targets carry a weight.

use std::collections::BTreeMap;

use super::clip::{ChannelSink, ChannelTarget};
use super::runtime::SkeletonRuntime;
use crate::foundation::math::{lerp_vec3, slerp_shortest, utils, Quat, Transform, Vec3};

/// Animated values keyed by target
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pose {
    transforms: BTreeMap<ChannelTarget, Transform>,
    morph_weights: BTreeMap<u32, f32>,
}

impl Pose {
    /// Create an empty pose
    pub fn new() -> Self {
        Self::default()
    }

    /// True if no target has a value
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty() && self.morph_weights.is_empty()
    }

    /// Transform of a bone or model target
    pub fn transform(&self, target: ChannelTarget) -> Option<&Transform> {
        self.transforms.get(&target)
    }

    /// Set the transform of a bone or model target; morph targets are ignored
    pub fn set_transform(&mut self, target: ChannelTarget, transform: Transform) {
        if !matches!(target, ChannelTarget::Morph(_)) {
            self.transforms.insert(target, transform);
        }
    }

    /// Weight of a morph target, if the pose has one
    pub fn morph_weight(&self, target: u32) -> Option<f32> {
        self.morph_weights.get(&target).copied()
    }

    /// Set a morph weight; clamping happens when the pose is applied
    pub fn set_morph_weight(&mut self, target: u32, weight: f32) {
        self.morph_weights.insert(target, weight);
    }

    /// Every target with a value
    pub fn targets(&self) -> impl Iterator<Item = ChannelTarget> + '_ {
        self.transforms
            .keys()
            .copied()
            .chain(self.morph_weights.keys().map(|&target| ChannelTarget::Morph(target)))
    }

    /// Blend `from` toward `to` by `t`
    ///
    /// Targets present in both are interpolated; a target present in only one pose keeps
    /// that pose's value.
    pub fn blend(from: &Self, to: &Self, t: f32) -> Self {
        let mut result = from.clone();
        result.overlay(to, t, |_| true);
        result
    }

    /// Blend `layer` over this pose by `weight` for the targets `affects` accepts
    ///
    /// Targets this pose lacks take the layer's value outright.
    pub fn overlay(&mut self, layer: &Self, weight: f32, affects: impl Fn(ChannelTarget) -> bool) {
        let weight = weight.clamp(0.0, 1.0);

        for (&target, value) in &layer.transforms {
            if !affects(target) {
                continue;
            }
            self.transforms
                .entry(target)
                .and_modify(|base| *base = Transform::blend(base, value, weight))
                .or_insert(*value);
        }
        for (&target, &value) in &layer.morph_weights {
            if !affects(ChannelTarget::Morph(target)) {
                continue;
            }
            self.morph_weights
                .entry(target)
                .and_modify(|base| *base = utils::lerp(*base, value, weight))
                .or_insert(value);
        }
    }

    /// Add the difference between `additive` and `reference`, scaled by `weight`
    ///
    /// Only targets present in both `additive` and `reference` contribute. Translation and
    /// morph deltas add, rotation deltas compose in local space and scale deltas multiply.
    /// Targets this pose lacks start from the reference value.
    pub fn add_difference(
        &mut self,
        additive: &Self,
        reference: &Self,
        weight: f32,
        affects: impl Fn(ChannelTarget) -> bool,
    ) {
        let weight = weight.clamp(0.0, 1.0);
        if weight <= 0.0 {
            return;
        }

        for (&target, value) in &additive.transforms {
            let Some(rest) = reference.transforms.get(&target) else {
                continue;
            };
            if !affects(target) {
                continue;
            }
            let base = self.transforms.entry(target).or_insert(*rest);

            base.position += (value.position - rest.position) * weight;

            let delta_rotation = rest.rotation.inverse() * value.rotation;
            base.rotation *= slerp_shortest(&Quat::identity(), &delta_rotation, weight);

            let delta_scale = value.scale.zip_map(&rest.scale, |scale, rest| {
                if rest.abs() <= f32::EPSILON {
                    1.0
                } else {
                    scale / rest
                }
            });
            let ones = Vec3::new(1.0, 1.0, 1.0);
            base.scale.component_mul_assign(&lerp_vec3(&ones, &delta_scale, weight));
        }

        for (&target, &value) in &additive.morph_weights {
            if !affects(ChannelTarget::Morph(target)) {
                continue;
            }
            let rest = reference.morph_weight(target).unwrap_or(0.0);
            *self.morph_weights.entry(target).or_insert(rest) += (value - rest) * weight;
        }
    }

    /// Give every target `other` has and this pose lacks its rest value
    ///
    /// Rest is the bind pose for bones, the current model transform for the model and zero
    /// for morph weights. Bones outside the skeleton are skipped.
    pub fn fill_missing(&mut self, other: &Self, rest: &SkeletonRuntime) {
        for &target in other.transforms.keys() {
            if self.transforms.contains_key(&target) {
                continue;
            }
            if let Some(value) = rest_transform(target, rest) {
                self.transforms.insert(target, value);
            }
        }
        for &target in other.morph_weights.keys() {
            self.morph_weights.entry(target).or_insert(0.0);
        }
    }

    /// Write every value into `runtime`
    ///
    /// Targets the pose lacks keep their current value. Morph weights are clamped by the
    /// runtime. Call [`SkeletonRuntime::recompute`] afterwards.
    pub fn apply_to(&self, runtime: &mut SkeletonRuntime) {
        for (&target, &transform) in &self.transforms {
            match target {
                ChannelTarget::Bone(bone) => {
                    runtime.set_local_pose(bone, transform);
                }
                ChannelTarget::Model => *runtime.model_transform_mut() = transform,
                ChannelTarget::Morph(_) => {}
            }
        }
        for (&target, &weight) in &self.morph_weights {
            runtime.set_morph_weight(target, weight);
        }
    }
}

fn rest_transform(target: ChannelTarget, rest: &SkeletonRuntime) -> Option<Transform> {
    match target {
        ChannelTarget::Bone(bone) => rest.skeleton().bind_pose().get(bone as usize).copied(),
        ChannelTarget::Model => Some(*rest.model_transform()),
        ChannelTarget::Morph(_) => None,
    }
}

/// Writes sampled channels into a pose, seeding new entries from a rest pose
pub(crate) struct PoseWriter<'a> {
    pose: &'a mut Pose,
    rest: &'a SkeletonRuntime,
}

impl<'a> PoseWriter<'a> {
    pub(crate) fn new(pose: &'a mut Pose, rest: &'a SkeletonRuntime) -> Self {
        Self { pose, rest }
    }
}

impl ChannelSink for PoseWriter<'_> {
    fn transform_mut(&mut self, target: ChannelTarget) -> Option<&mut Transform> {
        let initial = rest_transform(target, self.rest)?;
        Some(self.pose.transforms.entry(target).or_insert(initial))
    }

    fn set_weight(&mut self, target: u32, weight: f32) {
        self.pose.set_morph_weight(target, weight);
    }
}
