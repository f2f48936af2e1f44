//! Headless rig demo
//!
//! Builds a small arm skeleton, plays a looping wave clip on a few instances and logs the
//! skinning matrices. Pass a `.toml` or `.ron` config path as the first argument to override
//! the defaults.

use std::sync::Arc;

use nalgebra::Vector3;
use rig_engine::animation::SkeletonError;
use rig_engine::foundation::logging;
use rig_engine::prelude::*;
use thiserror::Error;

/// Fixed simulation step, 60 Hz
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Frames simulated before exiting
const FRAME_COUNT: u64 = 180;

#[derive(Error, Debug)]
enum DemoError {
    #[error("Failed to build skeleton: {0}")]
    Skeleton(#[from] SkeletonError),

    #[error("Resource missing from library: {0:?}")]
    MissingResource(Handle),
}

struct RigDemoApp {
    library: AnimationLibrary,
    system: AnimationSystem,
    timer: Timer,
    instances: Vec<Handle>,
}

impl RigDemoApp {
    fn new(config: &RigConfig) -> Self {
        Self {
            library: AnimationLibrary::with_config(&config.pools),
            system: AnimationSystem::new(config),
            timer: Timer::new(),
            instances: Vec::new(),
        }
    }

    fn initialize(&mut self, instance_count: usize) -> Result<(), DemoError> {
        let skeleton = self.library.add_skeleton(build_arm()?);
        let wave = self.library.add_clip(build_wave());
        let blink = self.library.add_clip(build_blink());

        let skeleton = self
            .library
            .skeleton(skeleton)
            .ok_or(DemoError::MissingResource(skeleton))?;
        let wave = self.library.clip(wave).ok_or(DemoError::MissingResource(wave))?;
        if self.library.clip(blink).is_none() {
            return Err(DemoError::MissingResource(blink));
        }

        for index in 0..instance_count {
            let handle = self.system.spawn(Arc::clone(&skeleton));
            if let Some(instance) = self.system.instance_mut(handle) {
                instance.player.set_speed(1.0 + index as f32 * 0.25);
                instance.player.play(Arc::clone(&wave), true);
                instance.runtime.model_transform_mut().position =
                    Vector3::new(index as f32 * 2.0, 0.0, 0.0);
            }
            self.instances.push(handle);
        }

        log::info!(
            "Spawned {} instances; clips: {:?}",
            self.system.len(),
            self.library.clip_names().collect::<Vec<_>>()
        );
        Ok(())
    }

    fn run(&mut self, frames: u64) {
        let halfway = frames / 2;
        while self.timer.frame_count() < frames {
            self.timer.advance(FRAME_TIME);
            let posed = self.system.update(self.timer.delta_time());

            // Last instance blends into the blink clip halfway through
            if self.timer.frame_count() == halfway {
                self.switch_last_instance();
            }
            if self.timer.frame_count() % 60 == 0 {
                log::info!(
                    "t={:.2}s posed={} fps={:.1}",
                    self.timer.total_time(),
                    posed,
                    self.timer.average_fps()
                );
                self.log_skin_matrices();
            }
        }
    }

    fn switch_last_instance(&mut self) {
        let Some(&handle) = self.instances.last() else {
            return;
        };
        let Some(blink) = self.library.clip_by_name("blink") else {
            log::warn!("Blink clip not loaded");
            return;
        };
        if let Some(instance) = self.system.instance_mut(handle) {
            instance.player.crossfade_default(blink);
            log::info!("Instance {:?} crossfading to blink", handle);
        }
    }

    fn log_skin_matrices(&self) {
        for &handle in &self.instances {
            let Some(instance) = self.system.instance(handle) else {
                continue;
            };
            let data = instance.runtime.skin_matrix_data();
            let tip = instance.runtime.world_pose(2).map(|m| m.column(3).xyz());
            log::debug!(
                "{:?}: {} skin matrices ({} bytes), tip at {:?}, state {:?}, blink {:.2}",
                handle,
                data.len(),
                rig_engine::animation::skin_bytes(&data).len(),
                tip,
                instance.player.state(),
                instance.runtime.morph_weight(0)
            );
        }
    }
}

/// Shoulder, elbow and wrist, each bone one unit above its parent
fn build_arm() -> Result<Skeleton, SkeletonError> {
    let mut builder = SkeletonBuilder::new();
    let shoulder = builder.add_bone("shoulder", None, Mat4::identity(), Mat4::identity());
    let elbow = builder.add_bone(
        "elbow",
        Some(shoulder),
        Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)),
        Mat4::identity(),
    );
    builder.add_bone(
        "wrist",
        Some(elbow),
        Mat4::new_translation(&Vec3::new(0.0, 1.0, 0.0)),
        Mat4::identity(),
    );
    builder.derive_inverse_binds().build()
}

fn build_wave() -> AnimationClip {
    let bent = Quat::from_axis_angle(&Vec3::z_axis(), std::f32::consts::FRAC_PI_4);
    AnimationClip::new(
        "wave",
        vec![AnimationSampler::linear(
            vec![0.0, 0.5, 1.0],
            SamplerOutput::rotations([Quat::identity(), bent, Quat::identity()]),
        )],
        vec![AnimationChannel::bone(0, 1, TargetPath::Rotation)],
    )
}

fn build_blink() -> AnimationClip {
    AnimationClip::new(
        "blink",
        vec![AnimationSampler::step(
            vec![0.0, 0.2, 0.4],
            SamplerOutput::Weights(vec![0.0, 1.0, 0.0]),
        )],
        vec![AnimationChannel::new(0, ChannelTarget::Morph(0), TargetPath::Weights)],
    )
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => RigConfig::load_or_default(&path),
        None => RigConfig::default(),
    };
    logging::init_with_filter(&config.log_level);

    log::info!("Starting rig demo");
    let mut app = RigDemoApp::new(&config);
    if let Err(e) = app.initialize(3) {
        log::error!("Rig demo failed to initialize: {}", e);
        return Err(e.into());
    }

    app.run(FRAME_COUNT);
    log::info!("Rig demo completed after {} frames", app.timer.frame_count());
    Ok(())
}
