//! Animation state machine
//!
//! States wrap a clip with its own speed and loop flag. Transitions move between states
//! when their exit time is reached or their conditions on named parameters hold, blending
//! the two poses over the transition's duration.

use std::collections::HashMap;
use std::sync::Arc;

use super::clip::AnimationClip;
use super::library::unique_name;
use super::player::wrap_time;
use super::pose::Pose;
use super::runtime::SkeletonRuntime;
use crate::foundation::collections::{Handle, Pool};

/// A clip with its playback settings
#[derive(Debug, Clone)]
pub struct AnimationState {
    name: String,
    /// Clip played while in this state
    pub clip: Arc<AnimationClip>,
    /// Speed multiplier
    pub speed: f32,
    /// Whether the clip wraps at its end
    pub looping: bool,
    /// Time the clip starts from when the state is entered
    pub start_time: f32,
}

impl AnimationState {
    /// Looping state at normal speed
    pub fn new(name: impl Into<String>, clip: Arc<AnimationClip>) -> Self {
        Self {
            name: name.into(),
            clip,
            speed: 1.0,
            looping: true,
            start_time: 0.0,
        }
    }

    /// State name, unique within its machine
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// How the two clips advance while a transition blends them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransitionKind {
    /// Both clips keep playing
    #[default]
    Smooth,
    /// The source pose holds while the target plays
    Frozen,
    /// The target follows the source's normalized time
    Synchronized,
}

/// Named value read by transition conditions
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parameter {
    /// Flag
    Bool(bool),
    /// Number
    Float(f32),
}

/// Test on a named parameter; a missing or mistyped parameter fails
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Flag is set
    IsTrue(String),
    /// Flag is clear
    IsFalse(String),
    /// Number is above the threshold
    Greater(String, f32),
    /// Number is below the threshold
    Less(String, f32),
}

impl Condition {
    fn holds(&self, parameters: &HashMap<String, Parameter>) -> bool {
        match self {
            Self::IsTrue(name) => matches!(parameters.get(name), Some(Parameter::Bool(true))),
            Self::IsFalse(name) => matches!(parameters.get(name), Some(Parameter::Bool(false))),
            Self::Greater(name, threshold) => {
                matches!(parameters.get(name), Some(Parameter::Float(v)) if v > threshold)
            }
            Self::Less(name, threshold) => {
                matches!(parameters.get(name), Some(Parameter::Float(v)) if v < threshold)
            }
        }
    }
}

/// Edge between two states
///
/// Fires once the exit time (if any) is reached and every condition holds. A transition
/// with neither never fires on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    /// Source state
    pub from: Handle,
    /// Target state
    pub to: Handle,
    /// Blend length in seconds
    pub duration: f32,
    /// How the clips advance during the blend
    pub kind: TransitionKind,
    /// Normalized source time to wait for
    pub exit_time: Option<f32>,
    /// Parameter tests that must all hold
    pub conditions: Vec<Condition>,
}

impl Transition {
    /// Smooth transition with no trigger yet
    pub fn new(from: Handle, to: Handle, duration: f32) -> Self {
        Self {
            from,
            to,
            duration,
            kind: TransitionKind::Smooth,
            exit_time: None,
            conditions: Vec::new(),
        }
    }

    /// Set the blend kind
    #[must_use]
    pub fn with_kind(mut self, kind: TransitionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Wait until the source reaches `normalized` time
    #[must_use]
    pub fn with_exit_time(mut self, normalized: f32) -> Self {
        self.exit_time = Some(normalized);
        self
    }

    /// Require `condition` to hold
    #[must_use]
    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    fn is_ready(
        &self,
        progress: f32,
        cycle_complete: bool,
        parameters: &HashMap<String, Parameter>,
    ) -> bool {
        let exit_reached = match self.exit_time {
            Some(exit) => cycle_complete || progress >= exit,
            None => !self.conditions.is_empty(),
        };
        exit_reached && self.conditions.iter().all(|condition| condition.holds(parameters))
    }
}

/// Transition in progress
#[derive(Debug, Clone)]
struct ActiveTransition {
    from: Handle,
    to: Handle,
    duration: f32,
    kind: TransitionKind,
    elapsed: f32,
    to_time: f32,
}

impl ActiveTransition {
    fn weight(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }
}

/// States, transitions and the parameters that drive them
#[derive(Debug, Default)]
pub struct StateMachine {
    states: Pool<AnimationState>,
    state_names: HashMap<String, Handle>,
    transitions: Vec<Transition>,
    parameters: HashMap<String, Parameter>,
    current: Handle,
    time: f32,
    cycle_complete: bool,
    playing: bool,
    active: Option<ActiveTransition>,
}

impl StateMachine {
    /// Create an empty, stopped machine
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a state under a unique name; the first state added becomes current
    pub fn add_state(&mut self, mut state: AnimationState) -> Handle {
        let name = unique_name(&state.name, |taken| self.state_names.contains_key(taken));
        state.name.clone_from(&name);

        let handle = self.states.insert(state);
        if handle.is_valid() {
            self.state_names.insert(name, handle);
            if !self.current.is_valid() {
                self.set_current_state(handle, true);
            }
        }
        handle
    }

    /// Add a looping state playing `clip`
    pub fn add_clip_state(&mut self, name: impl Into<String>, clip: Arc<AnimationClip>) -> Handle {
        self.add_state(AnimationState::new(name, clip))
    }

    /// Remove a state and every transition touching it
    pub fn remove_state(&mut self, handle: Handle) -> bool {
        let Some(state) = self.states.take(handle) else {
            return false;
        };
        self.state_names.remove(&state.name);
        self.transitions
            .retain(|transition| transition.from != handle && transition.to != handle);

        if self
            .active
            .as_ref()
            .is_some_and(|active| active.from == handle || active.to == handle)
        {
            self.active = None;
        }
        if self.current == handle {
            self.current = Handle::INVALID;
            self.time = 0.0;
        }
        true
    }

    /// Add a transition; false if either state does not exist
    pub fn add_transition(&mut self, transition: Transition) -> bool {
        if !self.states.contains(transition.from) || !self.states.contains(transition.to) {
            return false;
        }
        self.transitions.push(transition);
        true
    }

    /// All transitions
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Jump to a state without blending, cancelling any transition
    pub fn set_current_state(&mut self, handle: Handle, reset_time: bool) -> bool {
        let Some(state) = self.states.get(handle) else {
            return false;
        };
        if reset_time {
            self.time = state.start_time;
        }
        self.current = handle;
        self.cycle_complete = false;
        self.active = None;
        true
    }

    /// Current state, or [`Handle::INVALID`]
    pub fn current_state(&self) -> Handle {
        self.current
    }

    /// State behind `handle`
    pub fn state(&self, handle: Handle) -> Option<&AnimationState> {
        self.states.get(handle)
    }

    /// Mutable state behind `handle`
    pub fn state_mut(&mut self, handle: Handle) -> Option<&mut AnimationState> {
        self.states.get_mut(handle)
    }

    /// Handle of the state called `name`, or [`Handle::INVALID`]
    pub fn state_handle(&self, name: &str) -> Handle {
        self.state_names.get(name).copied().unwrap_or(Handle::INVALID)
    }

    /// State called `name`
    pub fn state_by_name(&self, name: &str) -> Option<&AnimationState> {
        self.states.get(self.state_handle(name))
    }

    /// Names of all states
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.state_names.keys().map(String::as_str)
    }

    /// Set a flag parameter
    pub fn set_bool(&mut self, name: impl Into<String>, value: bool) {
        self.parameters.insert(name.into(), Parameter::Bool(value));
    }

    /// Set a number parameter
    pub fn set_float(&mut self, name: impl Into<String>, value: f32) {
        self.parameters.insert(name.into(), Parameter::Float(value));
    }

    /// Parameter called `name`
    pub fn parameter(&self, name: &str) -> Option<Parameter> {
        self.parameters.get(name).copied()
    }

    /// Start or stop advancing
    pub fn set_playing(&mut self, playing: bool) {
        self.playing = playing;
    }

    /// True while advancing
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Playback time of the current state
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Move the current state's clock
    pub fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    /// True while blending between two states
    pub fn is_transitioning(&self) -> bool {
        self.active.is_some()
    }

    /// Current state's time as a fraction of its clip
    pub fn normalized_time(&self) -> f32 {
        self.states
            .get(self.current)
            .map_or(0.0, |state| normalized(self.time, state.clip.duration()))
    }

    /// Start the first transition out of the current state whose trigger is met
    ///
    /// Does nothing while a transition is running. Returns true if one started.
    pub fn evaluate_transitions(&mut self) -> bool {
        if self.active.is_some() || !self.states.contains(self.current) {
            return false;
        }
        let progress = self.normalized_time();

        let Some(transition) = self.transitions.iter().find(|transition| {
            transition.from == self.current
                && transition.is_ready(progress, self.cycle_complete, &self.parameters)
        }) else {
            return false;
        };
        let Some(target) = self.states.get(transition.to) else {
            return false;
        };

        log::debug!(
            "State transition '{}' -> '{}' over {}s",
            self.states.get(self.current).map_or("", AnimationState::name),
            target.name(),
            transition.duration
        );
        self.active = Some(ActiveTransition {
            from: transition.from,
            to: transition.to,
            duration: transition.duration,
            kind: transition.kind,
            elapsed: 0.0,
            to_time: target.start_time,
        });
        true
    }

    /// Advance by `delta_time` and sample the resulting pose
    ///
    /// `rest` seeds properties the clips do not drive. Returns `None` when stopped or
    /// without a current state.
    pub fn evaluate(&mut self, delta_time: f32, rest: &SkeletonRuntime) -> Option<Pose> {
        if !self.playing {
            return None;
        }

        if let Some(mut active) = self.active.take() {
            let (Some(from), Some(to)) = (self.states.get(active.from), self.states.get(active.to))
            else {
                return None;
            };
            let (from, to) = (from.clone(), to.clone());

            active.elapsed += delta_time.abs();
            match active.kind {
                TransitionKind::Smooth => {
                    self.time = advance(self.time, delta_time, &from).0;
                    active.to_time = advance(active.to_time, delta_time, &to).0;
                }
                TransitionKind::Frozen => {
                    active.to_time = advance(active.to_time, delta_time, &to).0;
                }
                TransitionKind::Synchronized => {
                    self.time = advance(self.time, delta_time, &from).0;
                    active.to_time = normalized(self.time, from.clip.duration()) * to.clip.duration();
                }
            }

            let weight = active.weight();
            let mut from_pose = from.clip.sample_pose(self.time, rest);
            let mut to_pose = to.clip.sample_pose(active.to_time, rest);
            from_pose.fill_missing(&to_pose, rest);
            to_pose.fill_missing(&from_pose, rest);
            let pose = Pose::blend(&from_pose, &to_pose, weight);

            if weight >= 1.0 {
                self.current = active.to;
                self.time = active.to_time;
                self.cycle_complete = false;
            } else {
                self.active = Some(active);
            }
            return Some(pose);
        }

        let state = self.states.get(self.current)?;
        let (time, completed) = advance(self.time, delta_time, state);
        let pose = state.clip.sample_pose(time, rest);
        self.time = time;
        self.cycle_complete |= completed;
        Some(pose)
    }

    /// Check transitions, advance and write the pose into `runtime`
    ///
    /// Untouched bones return to the bind pose. Returns true if the pose was written.
    pub fn update(&mut self, delta_time: f32, runtime: &mut SkeletonRuntime) -> bool {
        self.evaluate_transitions();
        let Some(pose) = self.evaluate(delta_time, runtime) else {
            return false;
        };
        runtime.reset_to_bind_pose();
        pose.apply_to(runtime);
        runtime.recompute();
        true
    }
}

/// Advance a state's clock, reporting whether it reached the end of the clip
fn advance(time: f32, delta_time: f32, state: &AnimationState) -> (f32, bool) {
    let duration = state.clip.duration();
    if duration <= 0.0 {
        return (0.0, true);
    }
    let step = delta_time * state.speed;
    let raw = time + step;
    let completed = if step < 0.0 { raw <= 0.0 } else { raw >= duration };
    (wrap_time(raw, duration, state.looping), completed)
}

fn normalized(time: f32, duration: f32) -> f32 {
    if duration > 0.0 {
        time / duration
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::clip::{AnimationChannel, ChannelTarget, TargetPath};
    use crate::animation::sampler::{AnimationSampler, SamplerOutput};
    use crate::animation::skeleton::SkeletonBuilder;
    use crate::foundation::math::{Mat4, Vec3};
    use approx::assert_relative_eq;

    fn runtime() -> SkeletonRuntime {
        let mut builder = SkeletonBuilder::new();
        let root = builder.add_bone("root", None, Mat4::identity(), Mat4::identity());
        builder.add_bone("arm", Some(root), Mat4::identity(), Mat4::identity());
        SkeletonRuntime::new(Arc::new(builder.build().unwrap()))
    }

    /// Moves `bone` from the origin to `to` on X over `duration` seconds
    fn slide(name: &str, bone: u32, duration: f32, to: f32) -> Arc<AnimationClip> {
        Arc::new(AnimationClip::new(
            name,
            vec![AnimationSampler::linear(
                vec![0.0, duration],
                SamplerOutput::Translations(vec![Vec3::zeros(), Vec3::new(to, 0.0, 0.0)]),
            )],
            vec![AnimationChannel::bone(0, bone, TargetPath::Translation)],
        ))
    }

    /// Holds `bone` at `x`
    fn hold(name: &str, bone: u32, x: f32) -> Arc<AnimationClip> {
        Arc::new(AnimationClip::new(
            name,
            vec![AnimationSampler::step(
                vec![0.0, 1.0],
                SamplerOutput::Translations(vec![Vec3::new(x, 0.0, 0.0); 2]),
            )],
            vec![AnimationChannel::bone(0, bone, TargetPath::Translation)],
        ))
    }

    fn x(runtime: &SkeletonRuntime, bone: u32) -> f32 {
        runtime.local_pose(bone).unwrap().position.x
    }

    #[test]
    fn test_first_state_becomes_current() {
        let mut machine = StateMachine::new();
        let idle = machine.add_clip_state("idle", hold("idle", 0, 0.0));
        let walk = machine.add_clip_state("walk", hold("walk", 0, 1.0));

        assert_eq!(machine.current_state(), idle);
        assert_eq!(machine.state_handle("walk"), walk);
        assert_eq!(machine.state_by_name("idle").unwrap().name(), "idle");
        assert_eq!(machine.state_handle("run"), Handle::INVALID);
    }

    #[test]
    fn test_duplicate_state_names_get_suffix() {
        let mut machine = StateMachine::new();
        machine.add_clip_state("idle", hold("idle", 0, 0.0));
        let second = machine.add_clip_state("idle", hold("idle", 0, 0.0));

        assert_eq!(machine.state(second).unwrap().name(), "idle_1");
        assert_eq!(machine.state_names().count(), 2);
    }

    #[test]
    fn test_stopped_machine_writes_nothing() {
        let mut machine = StateMachine::new();
        machine.add_clip_state("walk", slide("walk", 0, 1.0, 4.0));
        let mut runtime = runtime();

        assert!(!machine.update(0.5, &mut runtime));
        assert_eq!(machine.time(), 0.0);
    }

    #[test]
    fn test_state_playback_loops() {
        let mut machine = StateMachine::new();
        machine.add_clip_state("walk", slide("walk", 0, 2.0, 4.0));
        machine.set_playing(true);
        let mut runtime = runtime();

        machine.update(2.5, &mut runtime);

        assert_relative_eq!(machine.time(), 0.5);
        assert_relative_eq!(x(&runtime, 0), 1.0);
    }

    #[test]
    fn test_condition_triggers_smooth_transition() {
        let mut machine = StateMachine::new();
        let idle = machine.add_clip_state("idle", hold("idle", 0, 0.0));
        let walk = machine.add_clip_state("walk", hold("walk", 0, 8.0));
        assert!(machine.add_transition(
            Transition::new(idle, walk, 1.0).when(Condition::Greater("speed".into(), 0.5))
        ));
        machine.set_playing(true);
        let mut runtime = runtime();

        machine.update(0.1, &mut runtime);
        assert!(!machine.is_transitioning());

        machine.set_float("speed", 1.0);
        machine.update(0.5, &mut runtime);
        assert!(machine.is_transitioning());
        assert_relative_eq!(x(&runtime, 0), 4.0, epsilon = 1e-5);

        machine.update(0.5, &mut runtime);
        assert!(!machine.is_transitioning());
        assert_eq!(machine.current_state(), walk);
        assert_relative_eq!(x(&runtime, 0), 8.0, epsilon = 1e-5);
    }

    #[test]
    fn test_transition_without_trigger_never_fires() {
        let mut machine = StateMachine::new();
        let idle = machine.add_clip_state("idle", hold("idle", 0, 0.0));
        let walk = machine.add_clip_state("walk", hold("walk", 0, 8.0));
        machine.add_transition(Transition::new(idle, walk, 0.0));
        machine.set_playing(true);

        assert!(!machine.evaluate_transitions());
    }

    #[test]
    fn test_exit_time_waits_for_source() {
        let mut machine = StateMachine::new();
        let wave = machine.add_clip_state("wave", slide("wave", 0, 1.0, 1.0));
        let idle = machine.add_clip_state("idle", hold("idle", 0, 0.0));
        machine.add_transition(Transition::new(wave, idle, 0.0).with_exit_time(0.75));
        machine.set_playing(true);
        let mut runtime = runtime();

        machine.update(0.5, &mut runtime);
        assert!(!machine.evaluate_transitions());

        machine.update(0.3, &mut runtime);
        machine.update(0.1, &mut runtime);
        assert_eq!(machine.current_state(), idle);
    }

    #[test]
    fn test_exit_time_counts_completed_loops() {
        let mut machine = StateMachine::new();
        let wave = machine.add_clip_state("wave", slide("wave", 0, 1.0, 1.0));
        let idle = machine.add_clip_state("idle", hold("idle", 0, 0.0));
        machine.add_transition(Transition::new(wave, idle, 0.0).with_exit_time(1.0));
        machine.set_playing(true);
        let mut runtime = runtime();

        // Wraps to 0.1, short of the exit time, but a full cycle has played
        machine.update(1.1, &mut runtime);
        assert!(machine.evaluate_transitions());
    }

    #[test]
    fn test_bones_only_source_drives_fade_to_bind() {
        let mut machine = StateMachine::new();
        let reach = machine.add_clip_state("reach", hold("reach", 1, 6.0));
        let walk = machine.add_clip_state("walk", hold("walk", 0, 2.0));
        machine.add_transition(
            Transition::new(reach, walk, 1.0).when(Condition::IsTrue("moving".into())),
        );
        machine.set_playing(true);
        machine.set_bool("moving", true);
        let mut runtime = runtime();

        machine.update(0.5, &mut runtime);
        assert_relative_eq!(x(&runtime, 1), 3.0, epsilon = 1e-5);
        assert_relative_eq!(x(&runtime, 0), 1.0, epsilon = 1e-5);

        machine.update(0.5, &mut runtime);
        machine.update(0.5, &mut runtime);
        assert_relative_eq!(x(&runtime, 1), 0.0, epsilon = 1e-6);
        assert_relative_eq!(x(&runtime, 0), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_frozen_transition_holds_source_time() {
        let mut machine = StateMachine::new();
        let walk = machine.add_clip_state("walk", slide("walk", 0, 2.0, 2.0));
        let idle = machine.add_clip_state("idle", hold("idle", 1, 0.0));
        machine.add_transition(
            Transition::new(walk, idle, 1.0)
                .with_kind(TransitionKind::Frozen)
                .when(Condition::IsTrue("stop".into())),
        );
        machine.set_playing(true);
        let mut runtime = runtime();

        machine.update(0.5, &mut runtime);
        machine.set_bool("stop", true);
        machine.update(0.5, &mut runtime);

        assert!(machine.is_transitioning());
        assert_relative_eq!(machine.time(), 0.5);
    }

    #[test]
    fn test_synchronized_transition_matches_normalized_time() {
        let mut machine = StateMachine::new();
        let walk = machine.add_clip_state("walk", slide("walk", 0, 2.0, 2.0));
        let run = machine.add_clip_state("run", slide("run", 0, 1.0, 4.0));
        machine.add_transition(
            Transition::new(walk, run, 10.0)
                .with_kind(TransitionKind::Synchronized)
                .when(Condition::IsTrue("run".into())),
        );
        machine.set_playing(true);
        machine.set_bool("run", true);
        let mut runtime = runtime();

        // Source at 1.0 of 2.0, target at 0.5 of 1.0, weight 0.1
        machine.update(1.0, &mut runtime);

        assert_relative_eq!(machine.time(), 1.0);
        assert_relative_eq!(x(&runtime, 0), 1.0 * 0.9 + 2.0 * 0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_remove_state_drops_transitions() {
        let mut machine = StateMachine::new();
        let idle = machine.add_clip_state("idle", hold("idle", 0, 0.0));
        let walk = machine.add_clip_state("walk", hold("walk", 0, 1.0));
        machine.add_transition(Transition::new(idle, walk, 0.2).with_exit_time(0.5));

        assert!(machine.remove_state(idle));
        assert!(!machine.remove_state(idle));
        assert!(machine.transitions().is_empty());
        assert_eq!(machine.current_state(), Handle::INVALID);
        assert!(machine.state_by_name("idle").is_none());
        assert!(!machine.add_transition(Transition::new(idle, walk, 0.2)));
    }

    #[test]
    fn test_conditions_need_matching_parameter_types() {
        let mut parameters = HashMap::new();
        parameters.insert("grounded".to_string(), Parameter::Bool(true));
        parameters.insert("speed".to_string(), Parameter::Float(2.0));

        assert!(Condition::IsTrue("grounded".into()).holds(&parameters));
        assert!(!Condition::IsFalse("grounded".into()).holds(&parameters));
        assert!(Condition::Less("speed".into(), 3.0).holds(&parameters));
        assert!(!Condition::Greater("grounded".into(), 0.0).holds(&parameters));
        assert!(!Condition::IsTrue("missing".into()).holds(&parameters));
        assert_eq!(
            parameters.get("speed").copied(),
            Some(Parameter::Float(2.0))
        );
    }

    #[test]
    fn test_model_target_is_carried_through_states() {
        let mut machine = StateMachine::new();
        let drift = Arc::new(AnimationClip::new(
            "drift",
            vec![AnimationSampler::linear(
                vec![0.0, 1.0],
                SamplerOutput::Translations(vec![Vec3::zeros(), Vec3::new(0.0, 2.0, 0.0)]),
            )],
            vec![AnimationChannel::new(0, ChannelTarget::Model, TargetPath::Translation)],
        ));
        machine.add_clip_state("drift", drift);
        machine.set_playing(true);
        let mut runtime = runtime();

        machine.update(0.5, &mut runtime);

        assert_relative_eq!(runtime.model_transform().position.y, 1.0);
    }
}
