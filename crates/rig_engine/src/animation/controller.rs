//! Layered animation
//!
//! An [`AnimationController`] stacks named layers, each running its own [`StateMachine`].
//! Layers are evaluated bottom to top: the first contributing layer sets the base pose,
//! override layers blend over it by their weight and additive layers add their difference
//! from a reference pose. A [`LayerMask`] limits which targets a layer touches.

use std::collections::HashSet;

use super::clip::ChannelTarget;
use super::library::unique_name;
use super::pose::Pose;
use super::runtime::SkeletonRuntime;
use super::state_machine::StateMachine;

/// How a layer combines with the layers below it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerBlendMode {
    /// Blend toward this layer's pose
    #[default]
    Override,
    /// Add this layer's difference from its reference pose
    Additive,
}

/// Targets a layer is allowed to write
///
/// An empty mask affects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayerMask {
    targets: HashSet<ChannelTarget>,
    invert: bool,
}

impl LayerMask {
    /// Mask affecting every target
    pub fn all() -> Self {
        Self::default()
    }

    /// Mask affecting only `targets`
    pub fn only(targets: impl IntoIterator<Item = ChannelTarget>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            invert: false,
        }
    }

    /// Mask affecting everything except `targets`
    pub fn except(targets: impl IntoIterator<Item = ChannelTarget>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
            invert: true,
        }
    }

    /// Add a target to the listed set
    pub fn insert(&mut self, target: ChannelTarget) {
        self.targets.insert(target);
    }

    /// True if the layer may write `target`
    pub fn affects(&self, target: ChannelTarget) -> bool {
        if self.targets.is_empty() {
            return true;
        }
        self.targets.contains(&target) != self.invert
    }
}

/// One named layer of a controller
#[derive(Debug)]
pub struct AnimationLayer {
    name: String,
    weight: f32,
    /// How the layer combines with lower layers
    pub blend_mode: LayerBlendMode,
    /// Targets the layer may write
    pub mask: LayerMask,
    /// States played on this layer
    pub state_machine: StateMachine,
    /// Pose additive layers measure their difference from
    pub reference_pose: Pose,
}

impl AnimationLayer {
    fn new(name: String) -> Self {
        Self {
            name,
            weight: 1.0,
            blend_mode: LayerBlendMode::Override,
            mask: LayerMask::all(),
            state_machine: StateMachine::new(),
            reference_pose: Pose::new(),
        }
    }

    /// Layer name, unique within its controller
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Blend weight in `[0, 1]`
    pub fn weight(&self) -> f32 {
        self.weight
    }

    /// Set the blend weight, clamped to `[0, 1]`
    pub fn set_weight(&mut self, weight: f32) {
        self.weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
    }
}

/// Ordered stack of animation layers
#[derive(Debug, Default)]
pub struct AnimationController {
    layers: Vec<AnimationLayer>,
}

impl AnimationController {
    /// Create a controller without layers
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a layer on top under a unique name
    pub fn add_layer(&mut self, name: &str) -> &mut AnimationLayer {
        let name = unique_name(name, |taken| self.layer(taken).is_some());
        log::debug!("Adding animation layer '{}'", name);
        let index = self.layers.len();
        self.layers.push(AnimationLayer::new(name));
        &mut self.layers[index]
    }

    /// Remove the layer called `name`
    pub fn remove_layer(&mut self, name: &str) -> bool {
        let before = self.layers.len();
        self.layers.retain(|layer| layer.name != name);
        self.layers.len() != before
    }

    /// Remove the layer at `index`
    pub fn remove_layer_at(&mut self, index: usize) -> bool {
        if index < self.layers.len() {
            self.layers.remove(index);
            true
        } else {
            false
        }
    }

    /// Layer called `name`
    pub fn layer(&self, name: &str) -> Option<&AnimationLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    /// Mutable layer called `name`
    pub fn layer_mut(&mut self, name: &str) -> Option<&mut AnimationLayer> {
        self.layers.iter_mut().find(|layer| layer.name == name)
    }

    /// Layer at `index`, bottom first
    pub fn layer_at(&self, index: usize) -> Option<&AnimationLayer> {
        self.layers.get(index)
    }

    /// All layers, bottom first
    pub fn layers(&self) -> &[AnimationLayer] {
        &self.layers
    }

    /// Number of layers
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// True without layers
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Set a layer's weight; false if no layer has that name
    pub fn set_layer_weight(&mut self, name: &str, weight: f32) -> bool {
        match self.layer_mut(name) {
            Some(layer) => {
                layer.set_weight(weight);
                true
            }
            None => false,
        }
    }

    /// Weight of the layer called `name`, zero if missing
    pub fn layer_weight(&self, name: &str) -> f32 {
        self.layer(name).map_or(0.0, AnimationLayer::weight)
    }

    /// State machine of the layer called `name`
    pub fn state_machine_mut(&mut self, name: &str) -> Option<&mut StateMachine> {
        self.layer_mut(name).map(|layer| &mut layer.state_machine)
    }

    /// Advance every weighted layer and combine their poses
    ///
    /// Layers with zero weight are skipped and do not advance. Returns `None` if no layer
    /// produced a pose.
    pub fn evaluate(&mut self, delta_time: f32, rest: &SkeletonRuntime) -> Option<Pose> {
        let mut result: Option<Pose> = None;

        for layer in &mut self.layers {
            if layer.weight <= 0.0 {
                continue;
            }
            layer.state_machine.evaluate_transitions();
            let Some(pose) = layer.state_machine.evaluate(delta_time, rest) else {
                continue;
            };

            let mask = &layer.mask;
            let affects = |target| mask.affects(target);
            if let Some(base) = result.as_mut() {
                match layer.blend_mode {
                    LayerBlendMode::Override => base.overlay(&pose, layer.weight, affects),
                    LayerBlendMode::Additive => {
                        base.add_difference(&pose, &layer.reference_pose, layer.weight, affects);
                    }
                }
            } else {
                let mut base = Pose::new();
                base.overlay(&pose, 1.0, affects);
                result = Some(base);
            }
        }

        result
    }

    /// Evaluate the layers and write the combined pose into `runtime`
    ///
    /// Targets no layer wrote return to the bind pose. Returns true if a pose was written.
    pub fn update(&mut self, delta_time: f32, runtime: &mut SkeletonRuntime) -> bool {
        let Some(pose) = self.evaluate(delta_time, runtime) else {
            return false;
        };
        runtime.reset_to_bind_pose();
        pose.apply_to(runtime);
        runtime.recompute();
        true
    }
}
