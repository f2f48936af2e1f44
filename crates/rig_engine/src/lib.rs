//! # Rig Engine
//!
//! Skeletal animation runtime built on generational handle pools.
//!
//! ## Features
//!
//! - **Typed handles**: 64-bit handles carrying index, generation and a per-type tag
//! - **Pools and registries**: O(1) insert/lookup/remove with stale-handle detection
//! - **Skeletons**: validated bone hierarchies shared between instances
//! - **Keyframe animation**: step, linear and cubic spline sampling of TRS and morph weights
//! - **Playback**: play/pause/resume/stop, looping, speed control and crossfades
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use rig_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RigConfig::load_or_default("rig.toml");
//!     let mut library = AnimationLibrary::new();
//!     let mut system = AnimationSystem::new(&config);
//!
//!     let mut builder = SkeletonBuilder::new();
//!     builder.add_bone("root", None, Mat4::identity(), Mat4::identity());
//!     let skeleton = library.add_skeleton(builder.build()?);
//!
//!     let instance = system.spawn(library.skeleton(skeleton).unwrap_or_default());
//!     system.update(1.0 / 60.0);
//!     let _skin = system.skin_matrices(instance);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod animation;
pub mod config;
pub mod foundation;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        animation::{
            AnimatedInstance, AnimationChannel, AnimationClip, AnimationController,
            AnimationLibrary, AnimationPlayer, AnimationSampler, AnimationState,
            AnimationSystem, ChannelTarget, Condition, Interpolation, LayerBlendMode,
            LayerMask, PlaybackState, Pose, SamplerOutput, Skeleton, SkeletonBuilder,
            SkeletonRuntime, StateMachine, TargetPath, Transition, TransitionKind,
        },
        config::{AnimationConfig, Config, RigConfig},
        foundation::{
            collections::{type_id, Handle, Pool, Registry},
            math::{Mat4, Quat, Transform, Vec3},
            time::Timer,
        },
    };
}
