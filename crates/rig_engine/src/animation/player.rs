//! Clip playback
//!
//! An [`AnimationPlayer`] owns the playback clock for one runtime: it advances time, wraps
//! or clamps it against the clip duration, writes the sampled pose and recomputes the
//! skinning matrices.

use std::sync::Arc;

use super::clip::AnimationClip;
use super::pose::Pose;
use super::runtime::SkeletonRuntime;
use crate::config::AnimationConfig;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PlaybackState {
    /// Not playing; time is at the start or the clamped end
    #[default]
    Stopped,
    /// Advancing every update
    Playing,
    /// Holding the current time
    Paused,
}

/// Blend from a previous clip into the current one
#[derive(Debug, Clone)]
struct Crossfade {
    from: Arc<AnimationClip>,
    from_time: f32,
    duration: f32,
    elapsed: f32,
}

impl Crossfade {
    fn weight(&self) -> f32 {
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }
}

/// Plays one clip at a time on a [`SkeletonRuntime`]
#[derive(Debug, Clone)]
pub struct AnimationPlayer {
    clip: Option<Arc<AnimationClip>>,
    state: PlaybackState,
    time: f32,
    speed: f32,
    looping: bool,
    crossfade: Option<Crossfade>,
    crossfade_seconds: f32,
    reset_pending: bool,
}

impl Default for AnimationPlayer {
    fn default() -> Self {
        Self::from_config(&AnimationConfig::default())
    }
}

impl AnimationPlayer {
    /// Create a stopped player with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a stopped player using the configured speed, looping and crossfade length
    pub fn from_config(config: &AnimationConfig) -> Self {
        Self {
            clip: None,
            state: PlaybackState::Stopped,
            time: 0.0,
            speed: config.default_speed,
            looping: config.default_looping,
            crossfade: None,
            crossfade_seconds: config.crossfade_seconds.max(0.0),
            reset_pending: false,
        }
    }

    /// Start playing `clip`
    ///
    /// Time restarts at zero when `restart` is set or nothing was loaded; otherwise the
    /// current time carries over. Switching to a different clip returns the runtime to the
    /// bind pose on the next update so bones the new clip does not animate are not left
    /// in the old clip's pose.
    pub fn play(&mut self, clip: Arc<AnimationClip>, restart: bool) {
        let same_clip = self
            .clip
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &clip));
        if restart || self.clip.is_none() {
            self.time = 0.0;
        }
        if !same_clip {
            self.reset_pending = true;
            log::debug!("Playing animation '{}'", clip.name());
        }
        self.clip = Some(clip);
        self.crossfade = None;
        self.state = PlaybackState::Playing;
    }

    /// Blend from the current clip into `clip` over `seconds`
    ///
    /// Starts `clip` from zero. Targets only one of the two clips drives blend against
    /// their rest value, so bones the new clip leaves alone settle into the bind pose. With
    /// nothing playing or a non-positive fade this is a restarting [`play`](Self::play).
    pub fn crossfade(&mut self, clip: Arc<AnimationClip>, seconds: f32) {
        let from = match (&self.clip, self.state) {
            (Some(current), PlaybackState::Playing | PlaybackState::Paused) if seconds > 0.0 => {
                Arc::clone(current)
            }
            _ => {
                self.play(clip, true);
                return;
            }
        };

        log::debug!(
            "Crossfading '{}' -> '{}' over {}s",
            from.name(),
            clip.name(),
            seconds
        );
        self.crossfade = Some(Crossfade {
            from,
            from_time: self.time,
            duration: seconds,
            elapsed: 0.0,
        });
        self.clip = Some(clip);
        self.time = 0.0;
        self.state = PlaybackState::Playing;
    }

    /// Crossfade using the configured blend length
    pub fn crossfade_default(&mut self, clip: Arc<AnimationClip>) {
        self.crossfade(clip, self.crossfade_seconds);
    }

    /// Pause if playing
    pub fn pause(&mut self) {
        if self.state == PlaybackState::Playing {
            self.state = PlaybackState::Paused;
        }
    }

    /// Resume if paused
    pub fn resume(&mut self) {
        if self.state == PlaybackState::Paused {
            self.state = PlaybackState::Playing;
        }
    }

    /// Stop and rewind to the start
    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
        self.time = 0.0;
        self.crossfade = None;
    }

    /// Jump to `time`, clamped to the clip
    ///
    /// The pose is written on the next update while playing, or by [`apply`](Self::apply).
    pub fn seek(&mut self, time: f32) {
        let duration = self.duration();
        self.time = if time.is_nan() { 0.0 } else { time.clamp(0.0, duration) };
    }

    /// Advance playback by `delta_time` seconds and pose `runtime`
    ///
    /// Does nothing unless playing. Returns true if the pose was written.
    pub fn update(&mut self, delta_time: f32, runtime: &mut SkeletonRuntime) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        let Some(clip) = self.clip.clone() else {
            self.state = PlaybackState::Stopped;
            return false;
        };

        let step = delta_time * self.speed;
        self.time = self.advance(self.time, step, clip.duration());
        if let Some(fade) = &mut self.crossfade {
            fade.elapsed += delta_time.abs();
            fade.from_time = wrap_time(fade.from_time + step, fade.from.duration(), self.looping);
        }

        self.write_pose(&clip, runtime);
        true
    }

    fn advance(&mut self, time: f32, step: f32, duration: f32) -> f32 {
        let time = time + step;
        if duration <= 0.0 {
            if !self.looping {
                self.state = PlaybackState::Stopped;
            }
            return 0.0;
        }
        if self.looping {
            return wrap_time(time, duration, true);
        }
        if time >= duration {
            self.state = PlaybackState::Stopped;
            duration
        } else if time <= 0.0 && step < 0.0 {
            self.state = PlaybackState::Stopped;
            0.0
        } else {
            time.max(0.0)
        }
    }

    /// Pose `runtime` at the current time without advancing
    pub fn apply(&mut self, runtime: &mut SkeletonRuntime) -> bool {
        let Some(clip) = self.clip.clone() else {
            return false;
        };
        self.write_pose(&clip, runtime);
        true
    }

    fn write_pose(&mut self, clip: &AnimationClip, runtime: &mut SkeletonRuntime) {
        if std::mem::take(&mut self.reset_pending) {
            runtime.reset_to_bind_pose();
        }

        let fade_finished = match &self.crossfade {
            Some(fade) => {
                let weight = fade.weight();
                let mut from = fade.from.sample_pose(fade.from_time, runtime);
                let mut to = clip.sample_pose(self.time, runtime);
                from.fill_missing(&to, runtime);
                to.fill_missing(&from, runtime);

                runtime.reset_to_bind_pose();
                Pose::blend(&from, &to, weight).apply_to(runtime);
                weight >= 1.0
            }
            None => {
                clip.sample(self.time, runtime);
                false
            }
        };
        if fade_finished {
            self.crossfade = None;
        }

        runtime.recompute();
    }

    /// Current clip
    pub fn clip(&self) -> Option<&Arc<AnimationClip>> {
        self.clip.as_ref()
    }

    /// Playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// True while playing
    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// True once a non-looping clip has played to its end
    pub fn is_finished(&self) -> bool {
        self.state == PlaybackState::Stopped
            && !self.looping
            && self.clip.is_some()
            && self.time >= self.duration()
    }

    /// True while blending from a previous clip
    pub fn is_crossfading(&self) -> bool {
        self.crossfade.is_some()
    }

    /// Playback time in seconds
    pub fn time(&self) -> f32 {
        self.time
    }

    /// Playback time as a fraction of the clip duration
    pub fn normalized_time(&self) -> f32 {
        let duration = self.duration();
        if duration > 0.0 {
            self.time / duration
        } else {
            0.0
        }
    }

    /// Duration of the current clip, zero without one
    pub fn duration(&self) -> f32 {
        self.clip.as_ref().map_or(0.0, |clip| clip.duration())
    }

    /// Speed multiplier
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Set the speed multiplier; negative speeds play backwards
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    /// Whether playback wraps at the end of the clip
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Enable or disable looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}

pub(super) fn wrap_time(time: f32, duration: f32, looping: bool) -> f32 {
    if duration <= 0.0 {
        0.0
    } else if looping {
        if (0.0..=duration).contains(&time) {
            time
        } else {
            time.rem_euclid(duration)
        }
    } else {
        time.clamp(0.0, duration)
    }
}
