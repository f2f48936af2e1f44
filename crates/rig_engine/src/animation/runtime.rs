//! Per-instance skeleton state
//!
//! A [`SkeletonRuntime`] holds the mutable pose of one animated model: local transforms
//! written by clips, world matrices composed down the hierarchy and the skinning matrices
//! uploaded to the GPU.
//!
//! ```text
//! local_pose ──► world_pose[b] = world_pose[parent] * local_pose[b]
//!                       │
//!                       └──► skin[b] = world_pose[b] * inverse_bind[b]
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use super::skeleton::Skeleton;
use crate::foundation::math::{to_skin_matrix, Mat4, SkinMatrix, Transform};

/// Mutable pose of one skeleton instance
#[derive(Debug, Clone)]
pub struct SkeletonRuntime {
    skeleton: Arc<Skeleton>,
    local_pose: Vec<Transform>,
    world_pose: Vec<Mat4>,
    skin_matrices: Vec<Mat4>,
    morph_weights: BTreeMap<u32, f32>,
    model_transform: Transform,
}

impl SkeletonRuntime {
    /// Create a runtime in the bind pose with matrices already computed
    pub fn new(skeleton: Arc<Skeleton>) -> Self {
        let bone_count = skeleton.bone_count();
        let mut runtime = Self {
            local_pose: skeleton.bind_pose().to_vec(),
            world_pose: vec![Mat4::identity(); bone_count],
            skin_matrices: vec![Mat4::identity(); bone_count],
            morph_weights: BTreeMap::new(),
            model_transform: Transform::identity(),
            skeleton,
        };
        runtime.recompute();
        runtime
    }

    /// Skeleton this runtime animates
    pub fn skeleton(&self) -> &Arc<Skeleton> {
        &self.skeleton
    }

    /// Number of bones
    pub fn bone_count(&self) -> usize {
        self.local_pose.len()
    }

    /// Local transform of `bone`
    pub fn local_pose(&self, bone: u32) -> Option<&Transform> {
        self.local_pose.get(bone as usize)
    }

    /// Mutable local transform of `bone`; call [`recompute`](Self::recompute) after editing
    pub fn local_pose_mut(&mut self, bone: u32) -> Option<&mut Transform> {
        self.local_pose.get_mut(bone as usize)
    }

    /// All local transforms
    pub fn local_poses(&self) -> &[Transform] {
        &self.local_pose
    }

    pub(crate) fn local_poses_mut(&mut self) -> &mut [Transform] {
        &mut self.local_pose
    }

    /// Replace the local transform of `bone`; false if the bone does not exist
    pub fn set_local_pose(&mut self, bone: u32, transform: Transform) -> bool {
        match self.local_pose.get_mut(bone as usize) {
            Some(slot) => {
                *slot = transform;
                true
            }
            None => false,
        }
    }

    /// Restore every bone to its bind transform and clear morph weights
    pub fn reset_to_bind_pose(&mut self) {
        self.local_pose.clear();
        self.local_pose.extend_from_slice(self.skeleton.bind_pose());
        self.morph_weights.clear();
    }

    /// Restore one bone to its bind transform
    pub fn reset_bone(&mut self, bone: u32) -> bool {
        match self.skeleton.bind_pose().get(bone as usize) {
            Some(&bind) => self.set_local_pose(bone, bind),
            None => false,
        }
    }

    /// World matrix of `bone` as of the last recompute
    pub fn world_pose(&self, bone: u32) -> Option<&Mat4> {
        self.world_pose.get(bone as usize)
    }

    /// All world matrices
    pub fn world_poses(&self) -> &[Mat4] {
        &self.world_pose
    }

    /// Skinning matrices as of the last recompute
    pub fn skin_matrices(&self) -> &[Mat4] {
        &self.skin_matrices
    }

    /// Skinning matrices in the column-major layout expected by shaders
    pub fn skin_matrix_data(&self) -> Vec<SkinMatrix> {
        self.skin_matrices.iter().map(to_skin_matrix).collect()
    }

    /// Append the skinning matrices to `out` without allocating a new buffer
    pub fn write_skin_matrices(&self, out: &mut Vec<SkinMatrix>) {
        out.extend(self.skin_matrices.iter().map(to_skin_matrix));
    }

    /// Recompute world and skin matrices for every bone
    pub fn recompute(&mut self) {
        let skeleton = Arc::clone(&self.skeleton);
        for &index in skeleton.traversal_order() {
            let bone = &skeleton.bones()[index as usize];
            let parent = bone
                .parent
                .map_or_else(Mat4::identity, |parent| self.world_pose[parent as usize]);
            self.update_bone(index, &parent);
        }
    }

    /// Recompute `bone` and its descendants only
    ///
    /// The parent's world matrix from the last full recompute is reused. Returns false if
    /// the bone does not exist.
    pub fn recompute_from(&mut self, bone: u32) -> bool {
        let skeleton = Arc::clone(&self.skeleton);
        let Some(start) = skeleton.bone(bone) else {
            return false;
        };

        let parent = start
            .parent
            .map_or_else(Mat4::identity, |parent| self.world_pose[parent as usize]);
        let mut stack = vec![(bone, parent)];
        while let Some((index, parent)) = stack.pop() {
            let world = self.update_bone(index, &parent);
            stack.extend(
                skeleton.bones()[index as usize]
                    .children
                    .iter()
                    .map(|&child| (child, world)),
            );
        }
        true
    }

    fn update_bone(&mut self, index: u32, parent: &Mat4) -> Mat4 {
        let index = index as usize;
        let world = parent * self.local_pose[index].to_matrix();
        self.world_pose[index] = world;
        self.skin_matrices[index] = world * self.skeleton.bones()[index].inverse_bind_matrix;
        world
    }

    /// Weight of morph target `target`, zero if never set
    pub fn morph_weight(&self, target: u32) -> f32 {
        self.morph_weights.get(&target).copied().unwrap_or(0.0)
    }

    /// Set a morph weight, clamped to `[0, 1]`
    pub fn set_morph_weight(&mut self, target: u32, weight: f32) {
        let weight = if weight.is_nan() { 0.0 } else { weight.clamp(0.0, 1.0) };
        self.morph_weights.insert(target, weight);
    }

    /// Morph weights that have been set, ordered by target
    pub fn morph_weights(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.morph_weights.iter().map(|(&target, &weight)| (target, weight))
    }

    /// Transform applied to the whole model
    pub fn model_transform(&self) -> &Transform {
        &self.model_transform
    }

    /// Mutable model transform
    pub fn model_transform_mut(&mut self) -> &mut Transform {
        &mut self.model_transform
    }
}

/// Byte view of skinning matrices for buffer uploads
pub fn skin_bytes(matrices: &[SkinMatrix]) -> &[u8] {
    bytemuck::cast_slice(matrices)
}
