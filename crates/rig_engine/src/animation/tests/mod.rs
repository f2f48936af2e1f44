//! Scenario tests spanning pools, skeletons, clips and playback

mod handle_properties;
mod playback_integration;
