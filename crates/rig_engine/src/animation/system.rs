//! Per-frame animation update for every live instance

use std::sync::Arc;

use super::clip::AnimationClip;
use super::player::AnimationPlayer;
use super::runtime::SkeletonRuntime;
use super::skeleton::Skeleton;
use crate::config::{AnimationConfig, RigConfig};
use crate::foundation::collections::{Handle, Pool};
use crate::foundation::math::Mat4;

/// One animated model: its pose and its playback clock
#[derive(Debug, Clone)]
pub struct AnimatedInstance {
    /// Pose state
    pub runtime: SkeletonRuntime,
    /// Playback state
    pub player: AnimationPlayer,
}

/// Owns every animated instance and advances them together
pub struct AnimationSystem {
    instances: Pool<AnimatedInstance>,
    config: AnimationConfig,
}

impl AnimationSystem {
    /// Create an empty system with pool capacity and player defaults from `config`
    pub fn new(config: &RigConfig) -> Self {
        Self {
            instances: Pool::with_capacity(config.pools.initial_capacity),
            config: config.animation.clone(),
        }
    }

    /// Create an instance of `skeleton` in its bind pose
    pub fn spawn(&mut self, skeleton: Arc<Skeleton>) -> Handle {
        let handle = self.instances.insert(AnimatedInstance {
            runtime: SkeletonRuntime::new(skeleton),
            player: AnimationPlayer::from_config(&self.config),
        });
        if !handle.is_valid() {
            log::error!("Animation instance pool is full");
        }
        handle
    }

    /// Destroy an instance immediately
    pub fn despawn(&mut self, handle: Handle) -> bool {
        self.instances.remove(handle)
    }

    /// Destroy an instance at the next [`flush_despawns`](Self::flush_despawns)
    ///
    /// The instance keeps animating until then.
    pub fn queue_despawn(&mut self, handle: Handle) -> bool {
        self.instances.queue_remove(handle)
    }

    /// Destroy every queued instance, returning how many were removed
    pub fn flush_despawns(&mut self) -> usize {
        self.instances.flush_removals()
    }

    /// Instance behind `handle`
    pub fn instance(&self, handle: Handle) -> Option<&AnimatedInstance> {
        self.instances.get(handle)
    }

    /// Mutable instance behind `handle`
    pub fn instance_mut(&mut self, handle: Handle) -> Option<&mut AnimatedInstance> {
        self.instances.get_mut(handle)
    }

    /// Start `clip` on an instance; false if the handle is stale
    pub fn play(&mut self, handle: Handle, clip: Arc<AnimationClip>, restart: bool) -> bool {
        match self.instances.get_mut(handle) {
            Some(instance) => {
                instance.player.play(clip, restart);
                true
            }
            None => false,
        }
    }

    /// Advance every instance by `delta_time`, returning how many were posed
    pub fn update(&mut self, delta_time: f32) -> usize {
        let mut posed = 0;
        for (_, instance) in self.instances.iter_mut() {
            if instance.player.update(delta_time, &mut instance.runtime) {
                posed += 1;
            }
        }
        posed
    }

    /// Skinning matrices of an instance
    pub fn skin_matrices(&self, handle: Handle) -> Option<&[Mat4]> {
        self.instances
            .get(handle)
            .map(|instance| instance.runtime.skin_matrices())
    }

    /// Live instance count
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// True with no live instances
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}
