//! Skeletal animation
//!
//! Immutable assets ([`Skeleton`], [`AnimationClip`]) are shared between instances; each
//! instance owns a [`SkeletonRuntime`] (its pose) and an [`AnimationPlayer`] (its clock).
//!
//! Per frame:
//! 1. the player advances time and wraps or clamps it against the clip duration
//! 2. the clip's samplers write local transforms and morph weights into the runtime
//! 3. the runtime composes world matrices parent-first and multiplies in the inverse bind
//!    matrices to produce skinning matrices
//!
//! For more than one clip at a time, a [`StateMachine`] moves between clip states with
//! blended transitions and an [`AnimationController`] stacks state machines as weighted,
//! masked layers. Both work on sparse [`Pose`]s and write the result into a runtime.

pub mod clip;
pub mod controller;
pub mod library;
pub mod player;
pub mod pose;
pub mod runtime;
pub mod sampler;
pub mod skeleton;
pub mod state_machine;
pub mod system;

#[cfg(test)]
mod tests;

pub use clip::{AnimationChannel, AnimationClip, ChannelTarget, ClipError, TargetPath};
pub use controller::{AnimationController, AnimationLayer, LayerBlendMode, LayerMask};
pub use library::AnimationLibrary;
pub use player::{AnimationPlayer, PlaybackState};
pub use pose::Pose;
pub use runtime::{skin_bytes, SkeletonRuntime};
pub use sampler::{AnimationSampler, Interpolation, SampledValue, SamplerOutput};
pub use skeleton::{Bone, Skeleton, SkeletonBuilder, SkeletonError};
pub use state_machine::{
    AnimationState, Condition, Parameter, StateMachine, Transition, TransitionKind,
};
pub use system::{AnimatedInstance, AnimationSystem};
