//! Handle lifetime tests over long insert/remove sequences
//!
//! Sequences come from a fixed-seed `StdRng` so runs are reproducible.

use std::collections::HashMap;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::animation::{AnimationClip, Skeleton};
use crate::foundation::collections::{Handle, Pool, Registry};

#[test]
fn test_removed_handles_never_resolve_again() {
    let mut pool = Pool::new();
    let mut rng = StdRng::seed_from_u64(7);
    let mut live: Vec<(Handle, u64)> = Vec::new();
    let mut dead: Vec<Handle> = Vec::new();

    for step in 0..5_000_u64 {
        if live.is_empty() || rng.gen_bool(2.0 / 3.0) {
            let handle = pool.insert(step);
            assert!(handle.is_valid());
            assert_eq!(pool.get(handle), Some(&step));
            live.push((handle, step));
        } else {
            let victim = rng.gen_range(0..live.len());
            let (handle, _) = live.swap_remove(victim);
            assert!(pool.remove(handle));
            assert!(pool.get(handle).is_none());
            dead.push(handle);
        }
    }

    for handle in &dead {
        assert!(!pool.contains(*handle));
    }
    for (handle, value) in &live {
        assert_eq!(pool.get(*handle), Some(value));
    }
    assert_eq!(pool.len(), live.len());
}

#[test]
fn test_live_handles_point_to_distinct_storage() {
    let mut pool = Pool::new();
    let mut rng = StdRng::seed_from_u64(11);
    let mut live = Vec::new();

    for step in 0..500_u32 {
        if !live.is_empty() && rng.gen_bool(0.25) {
            let victim = rng.gen_range(0..live.len());
            pool.remove(live.swap_remove(victim));
        } else {
            live.push(pool.insert(step));
        }
    }

    let mut owners: HashMap<*const u32, Handle> = HashMap::new();
    for handle in &live {
        let address = pool.get(*handle).map(|value| value as *const u32).unwrap();
        assert!(owners.insert(address, *handle).is_none());
    }
}

#[test]
fn test_registry_keeps_resource_types_apart() {
    let mut registry = Registry::new();
    let skeleton = registry.add(Arc::new(Skeleton::empty()));
    let clip = registry.add(Arc::new(AnimationClip::new("idle", Vec::new(), Vec::new())));
    let weight = registry.add(0.5_f32);

    assert_eq!(registry.get::<Arc<AnimationClip>>(clip).unwrap().name(), "idle");
    assert_eq!(registry.get::<f32>(weight), Some(&0.5));

    assert!(registry.get::<Arc<AnimationClip>>(skeleton).is_none());
    assert!(registry.get::<Arc<Skeleton>>(clip).is_none());
    assert!(registry.get::<f32>(clip).is_none());
    assert!(registry.get::<Arc<Skeleton>>(Handle::INVALID).is_none());

    assert!(registry.remove(weight));
    assert!(registry.get::<f32>(weight).is_none());
    assert!(registry.contains(skeleton));
}
