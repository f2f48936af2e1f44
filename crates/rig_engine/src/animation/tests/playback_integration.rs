//! Integration tests for the animation pipeline
//!
//! Drives skeletons through library, system and player the way an application does and
//! checks the resulting skinning matrices.

use std::sync::Arc;

use crate::animation::{
    AnimationChannel, AnimationClip, AnimationController, AnimationLibrary, AnimationPlayer,
    AnimationSampler, AnimationSystem, ChannelTarget, Condition, Interpolation, LayerMask,
    PlaybackState, SampledValue, SamplerOutput, Skeleton, SkeletonBuilder, SkeletonRuntime,
    TargetPath, Transition,
};
use crate::config::RigConfig;
use crate::foundation::math::{constants::HALF_PI, Mat4, Quat, Transform, Vec3};
use crate::foundation::time::Timer;
use approx::assert_relative_eq;

fn offset(y: f32) -> Mat4 {
    Mat4::new_translation(&Vec3::new(0.0, y, 0.0))
}

/// root -> child -> grandchild, one unit apart on Y
fn three_bone_chain() -> Skeleton {
    let mut builder = SkeletonBuilder::new();
    let root = builder.add_bone("root", None, Mat4::identity(), Mat4::identity());
    let child = builder.add_bone("child", Some(root), offset(1.0), Mat4::identity());
    builder.add_bone("grandchild", Some(child), offset(1.0), Mat4::identity());
    builder.derive_inverse_binds().build().unwrap()
}

fn ramp(interpolation: Interpolation) -> AnimationSampler {
    let output = match interpolation {
        Interpolation::CubicSpline => SamplerOutput::Weights(vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0]),
        Interpolation::Step | Interpolation::Linear => SamplerOutput::Weights(vec![0.0, 1.0]),
    };
    AnimationSampler::new(vec![0.5, 1.5], output, interpolation)
}

#[test]
fn test_identity_chain_skin_equals_inverse_bind() {
    let mut runtime = SkeletonRuntime::new(Arc::new(three_bone_chain()));
    for bone in 0..3 {
        runtime.set_local_pose(bone, Transform::identity());
    }
    runtime.recompute();

    let grandchild = runtime.skeleton().bone(2).unwrap().inverse_bind_matrix;
    assert_relative_eq!(runtime.skin_matrices()[2], grandchild, epsilon = 1e-6);
    assert_relative_eq!(*runtime.world_pose(2).unwrap(), Mat4::identity(), epsilon = 1e-6);
}

#[test]
fn test_first_and_last_keyframes_are_exact_for_every_mode() {
    for interpolation in [Interpolation::Step, Interpolation::Linear, Interpolation::CubicSpline] {
        let sampler = ramp(interpolation);

        assert_eq!(sampler.evaluate(0.5), Some(SampledValue::Scalar(0.0)), "{interpolation:?}");
        assert_eq!(sampler.evaluate(-2.0), Some(SampledValue::Scalar(0.0)), "{interpolation:?}");
        assert_eq!(sampler.evaluate(1.5), Some(SampledValue::Scalar(1.0)), "{interpolation:?}");
        assert_eq!(sampler.evaluate(30.0), Some(SampledValue::Scalar(1.0)), "{interpolation:?}");
    }
}

#[test]
fn test_linear_midpoint_of_zero_to_ten() {
    let sampler = AnimationSampler::linear(
        vec![0.0, 1.0],
        SamplerOutput::Translations(vec![Vec3::zeros(), Vec3::new(10.0, 10.0, 10.0)]),
    );

    assert_eq!(
        sampler.evaluate(0.5),
        Some(SampledValue::Vector(Vec3::new(5.0, 5.0, 5.0)))
    );
}

#[test]
fn test_scalar_midpoint_of_zero_to_ten() {
    let sampler = AnimationSampler::linear(vec![0.0, 1.0], SamplerOutput::Weights(vec![0.0, 10.0]));

    assert_eq!(sampler.evaluate(0.0), Some(SampledValue::Scalar(0.0)));
    assert_eq!(sampler.evaluate(0.5), Some(SampledValue::Scalar(5.0)));
}

#[test]
fn test_looping_time_after_five_seconds() {
    let clip = Arc::new(AnimationClip::new(
        "loop",
        vec![AnimationSampler::linear(vec![0.0, 2.0], SamplerOutput::Weights(vec![0.0, 1.0]))],
        vec![AnimationChannel::new(0, ChannelTarget::Morph(0), TargetPath::Weights)],
    ));
    let mut runtime = SkeletonRuntime::new(Arc::new(Skeleton::empty()));
    let mut player = AnimationPlayer::new();
    player.set_looping(true);
    player.play(clip, true);

    let mut timer = Timer::new();
    for _ in 0..20 {
        timer.advance(0.25);
        player.update(timer.delta_time(), &mut runtime);
    }

    assert_relative_eq!(timer.total_time(), 5.0);
    assert_relative_eq!(player.time(), 1.0, epsilon = 1e-5);
    assert_relative_eq!(runtime.morph_weight(0), 0.5, epsilon = 1e-5);
}

#[test]
fn test_stop_resets_from_any_state() {
    let clip = Arc::new(AnimationClip::new(
        "wave",
        vec![AnimationSampler::linear(vec![0.0, 3.0], SamplerOutput::Weights(vec![0.0, 1.0]))],
        Vec::new(),
    ));
    let mut runtime = SkeletonRuntime::new(Arc::new(Skeleton::empty()));
    let mut player = AnimationPlayer::new();

    player.stop();
    assert_eq!((player.state(), player.time()), (PlaybackState::Stopped, 0.0));

    player.play(Arc::clone(&clip), true);
    player.update(1.0, &mut runtime);
    player.stop();
    assert_eq!((player.state(), player.time()), (PlaybackState::Stopped, 0.0));

    player.play(clip, true);
    player.update(1.0, &mut runtime);
    player.pause();
    player.stop();
    assert_eq!((player.state(), player.time()), (PlaybackState::Stopped, 0.0));
}

#[test]
fn test_library_and_system_drive_a_waving_arm() {
    let config = RigConfig::default();
    let mut library = AnimationLibrary::new();
    let mut system = AnimationSystem::new(&config);

    let skeleton = library.add_skeleton(three_bone_chain());
    let wave = library.add_clip(AnimationClip::new(
        "wave",
        vec![AnimationSampler::linear(
            vec![0.0, 1.0],
            SamplerOutput::rotations([
                Quat::identity(),
                Quat::from_axis_angle(&Vec3::z_axis(), HALF_PI),
            ]),
        )],
        vec![AnimationChannel::bone(0, 1, TargetPath::Rotation)],
    ));

    let instance = system.spawn(library.skeleton(skeleton).unwrap());
    assert!(system.play(instance, library.clip(wave).unwrap(), true));

    // Bind pose before any update
    for skin in system.skin_matrices(instance).unwrap() {
        assert_relative_eq!(*skin, Mat4::identity(), epsilon = 1e-6);
    }

    system.update(1.0);

    // The child rotates 90 degrees about Z at y = 1, swinging the grandchild to (-1, 1)
    let runtime = &system.instance(instance).unwrap().runtime;
    let tip = runtime.world_pose(2).unwrap().transform_point(&Vec3::zeros().into());
    assert_relative_eq!(tip.coords, Vec3::new(-1.0, 1.0, 0.0), epsilon = 1e-5);

    // The root is untouched
    assert_relative_eq!(system.skin_matrices(instance).unwrap()[0], Mat4::identity(), epsilon = 1e-6);
}

#[test]
fn test_removed_clip_handle_is_stale_but_players_keep_playing() {
    let mut library = AnimationLibrary::new();
    let mut system = AnimationSystem::new(&RigConfig::default());
    let skeleton = library.add_skeleton(three_bone_chain());
    let clip = library.add_clip(AnimationClip::new(
        "lift",
        vec![AnimationSampler::linear(
            vec![0.0, 1.0],
            SamplerOutput::Translations(vec![Vec3::zeros(), Vec3::new(0.0, 4.0, 0.0)]),
        )],
        vec![AnimationChannel::bone(0, 0, TargetPath::Translation)],
    ));

    let instance = system.spawn(library.skeleton(skeleton).unwrap());
    system.play(instance, library.clip(clip).unwrap(), true);
    assert!(library.remove_clip(clip));
    assert!(library.clip(clip).is_none());

    system.update(0.5);

    let root = system.instance(instance).unwrap().runtime.local_pose(0).unwrap().position;
    assert_relative_eq!(root, Vec3::new(0.0, 2.0, 0.0));
}

#[test]
fn test_layered_controller_with_library_clips() {
    let mut library = AnimationLibrary::new();
    let skeleton = library.add_skeleton(three_bone_chain());
    let lift = library.add_clip(AnimationClip::new(
        "lift",
        vec![AnimationSampler::linear(
            vec![0.0, 1.0],
            SamplerOutput::Translations(vec![Vec3::zeros(), Vec3::new(0.0, 2.0, 0.0)]),
        )],
        vec![AnimationChannel::bone(0, 0, TargetPath::Translation)],
    ));
    let wave = library.add_clip(AnimationClip::new(
        "wave",
        vec![AnimationSampler::step(
            vec![0.0],
            SamplerOutput::rotations([Quat::from_axis_angle(&Vec3::z_axis(), HALF_PI)]),
        )],
        vec![AnimationChannel::bone(0, 1, TargetPath::Rotation)],
    ));
    let mut runtime = SkeletonRuntime::new(library.skeleton(skeleton).unwrap());

    let mut controller = AnimationController::new();
    let base = controller.add_layer("base");
    base.state_machine.add_clip_state("lift", library.clip(lift).unwrap());
    base.state_machine.set_playing(true);

    let upper = controller.add_layer("upper");
    upper.mask = LayerMask::only([ChannelTarget::Bone(1)]);
    let rest = upper.state_machine.add_clip_state("rest", library.clip_by_name("lift").unwrap());
    let waving = upper.state_machine.add_clip_state("wave", library.clip(wave).unwrap());
    upper.state_machine.add_transition(
        Transition::new(rest, waving, 0.0).when(Condition::IsTrue("greet".into())),
    );
    upper.state_machine.set_playing(true);

    controller.update(0.5, &mut runtime);
    let hips = runtime.world_pose(0).unwrap().transform_point(&Vec3::zeros().into());
    assert_relative_eq!(hips.coords, Vec3::new(0.0, 1.0, 0.0), epsilon = 1e-5);

    controller.state_machine_mut("upper").unwrap().set_bool("greet", true);
    controller.update(0.5, &mut runtime);

    // Hips lifted to y = 2, child rotated 90 degrees about Z one unit above
    let tip = runtime.world_pose(2).unwrap().transform_point(&Vec3::zeros().into());
    assert_relative_eq!(tip.coords, Vec3::new(-1.0, 3.0, 0.0), epsilon = 1e-5);
}
