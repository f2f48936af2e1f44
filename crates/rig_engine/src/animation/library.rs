//! Shared animation assets
//!
//! Loaded skeletons and clips are immutable and shared between instances, so the library
//! stores them behind `Arc` in a [`Registry`] and hands out typed handles. Clips are also
//! indexed by name; a duplicate name gets a numeric suffix.

use std::collections::HashMap;
use std::sync::Arc;

use super::clip::AnimationClip;
use super::skeleton::Skeleton;
use crate::config::PoolConfig;
use crate::foundation::collections::{Handle, Registry};

/// Registry of skeletons and clips
#[derive(Default)]
pub struct AnimationLibrary {
    registry: Registry,
    clip_names: HashMap<String, Handle>,
}

impl AnimationLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a library with skeleton and clip slots reserved up front
    pub fn with_config(config: &PoolConfig) -> Self {
        let mut library = Self::new();
        library.registry.reserve::<Arc<Skeleton>>(config.initial_capacity);
        library.registry.reserve::<Arc<AnimationClip>>(config.initial_capacity);
        library
    }

    /// Store a skeleton
    pub fn add_skeleton(&mut self, skeleton: Skeleton) -> Handle {
        self.registry.add(Arc::new(skeleton))
    }

    /// Shared reference to a skeleton
    pub fn skeleton(&self, handle: Handle) -> Option<Arc<Skeleton>> {
        self.registry.get::<Arc<Skeleton>>(handle).cloned()
    }

    /// Remove a skeleton; instances already holding it keep their reference
    pub fn remove_skeleton(&mut self, handle: Handle) -> bool {
        self.registry.take::<Arc<Skeleton>>(handle).is_some()
    }

    /// Store a clip under a unique name
    pub fn add_clip(&mut self, mut clip: AnimationClip) -> Handle {
        let name = unique_name(clip.name(), |taken| self.clip_names.contains_key(taken));
        if name != clip.name() {
            log::warn!("Animation clip '{}' already exists, storing as '{}'", clip.name(), name);
        }
        clip.set_name(name.clone());

        let handle = self.registry.add(Arc::new(clip));
        if handle.is_valid() {
            self.clip_names.insert(name, handle);
        }
        handle
    }

    /// Shared reference to a clip
    pub fn clip(&self, handle: Handle) -> Option<Arc<AnimationClip>> {
        self.registry.get::<Arc<AnimationClip>>(handle).cloned()
    }

    /// Handle of the clip called `name`, or [`Handle::INVALID`]
    pub fn clip_handle(&self, name: &str) -> Handle {
        self.clip_names.get(name).copied().unwrap_or(Handle::INVALID)
    }

    /// Shared reference to the clip called `name`
    pub fn clip_by_name(&self, name: &str) -> Option<Arc<AnimationClip>> {
        self.clip(self.clip_handle(name))
    }

    /// Remove a clip and its name entry
    pub fn remove_clip(&mut self, handle: Handle) -> bool {
        match self.registry.take::<Arc<AnimationClip>>(handle) {
            Some(clip) => {
                self.clip_names.remove(clip.name());
                true
            }
            None => false,
        }
    }

    /// Names of all stored clips
    pub fn clip_names(&self) -> impl Iterator<Item = &str> {
        self.clip_names.keys().map(String::as_str)
    }

    /// Number of stored clips
    pub fn clip_count(&self) -> usize {
        self.registry.len::<Arc<AnimationClip>>()
    }

    /// Number of stored skeletons
    pub fn skeleton_count(&self) -> usize {
        self.registry.len::<Arc<Skeleton>>()
    }

    /// Underlying registry, for other per-model resources such as meshes or materials
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Mutable underlying registry
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }
}

/// `base`, or `base_1`, `base_2`, ... if `taken` already claims it
pub(super) fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }
    (1..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken(candidate.as_str()))
        .unwrap_or_else(|| base.to_string())
}
