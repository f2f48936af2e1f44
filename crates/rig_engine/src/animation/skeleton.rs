//! Immutable bone hierarchy
//!
//! A [`Skeleton`] is built once by the model loader and then shared (behind an `Arc`) by
//! every runtime instance that animates it. Construction validates the parent indices and
//! computes a parent-before-child traversal order, so per-frame evaluation never has to
//! check the hierarchy again.

use thiserror::Error;

use crate::foundation::math::{Mat4, Transform};

/// Skeleton construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkeletonError {
    /// A bone names a parent that does not exist
    #[error("Bone {bone} has parent {parent}, but the skeleton only has {bone_count} bones")]
    ParentOutOfRange {
        /// Offending bone
        bone: u32,
        /// Parent index it referenced
        parent: u32,
        /// Number of bones in the skeleton
        bone_count: usize,
    },

    /// A bone is its own parent
    #[error("Bone {0} is its own parent")]
    SelfParent(u32),

    /// The parent links form a cycle, so the bone is unreachable from any root
    #[error("Bone {0} is part of a parent cycle")]
    Cycle(u32),

    /// More bones than a `u32` index can address
    #[error("Too many bones: {0}")]
    TooManyBones(usize),
}

/// One bone of a skeleton
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    /// Bone name from the source asset
    pub name: String,
    /// Parent bone, `None` for roots
    pub parent: Option<u32>,
    /// Rest-pose transform relative to the parent
    pub local_bind_transform: Mat4,
    /// Maps mesh-space positions into this bone's space at bind time
    pub inverse_bind_matrix: Mat4,
    /// Direct children, derived from the parent links
    pub children: Vec<u32>,
}

impl Bone {
    /// Create a bone; children are filled in when the skeleton is built
    pub fn new(
        name: impl Into<String>,
        parent: Option<u32>,
        local_bind_transform: Mat4,
        inverse_bind_matrix: Mat4,
    ) -> Self {
        Self {
            name: name.into(),
            parent,
            local_bind_transform,
            inverse_bind_matrix,
            children: Vec::new(),
        }
    }
}

/// Validated bone hierarchy
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Skeleton {
    bones: Vec<Bone>,
    bind_pose: Vec<Transform>,
    order: Vec<u32>,
}

impl Skeleton {
    /// Build a skeleton from bones in loader order
    ///
    /// Parents do not have to precede their children in `bones`; the traversal order is
    /// computed here. Any `children` lists on the input are replaced by ones derived from
    /// the parent links.
    pub fn new(mut bones: Vec<Bone>) -> Result<Self, SkeletonError> {
        let bone_count = bones.len();
        if bone_count > u32::MAX as usize {
            return Err(SkeletonError::TooManyBones(bone_count));
        }

        for (index, bone) in bones.iter().enumerate() {
            if let Some(parent) = bone.parent {
                if parent as usize >= bone_count {
                    return Err(SkeletonError::ParentOutOfRange {
                        bone: index as u32,
                        parent,
                        bone_count,
                    });
                }
                if parent as usize == index {
                    return Err(SkeletonError::SelfParent(parent));
                }
            }
        }

        for bone in &mut bones {
            bone.children.clear();
        }
        for index in 0..bone_count {
            if let Some(parent) = bones[index].parent {
                bones[parent as usize].children.push(index as u32);
            }
        }

        let order = Self::traversal(&bones)?;
        let bind_pose = bones
            .iter()
            .map(|bone| Transform::from_matrix(bone.local_bind_transform))
            .collect();

        log::debug!("Built skeleton with {} bones", bone_count);

        Ok(Self {
            bones,
            bind_pose,
            order,
        })
    }

    /// Skeleton with no bones
    pub fn empty() -> Self {
        Self::default()
    }

    fn traversal(bones: &[Bone]) -> Result<Vec<u32>, SkeletonError> {
        let already_sorted = bones
            .iter()
            .enumerate()
            .all(|(index, bone)| bone.parent.map_or(true, |parent| (parent as usize) < index));
        if already_sorted {
            return Ok((0..bones.len() as u32).collect());
        }

        // Pre-order walk from every root; bones not reached hang off a cycle
        let mut order = Vec::with_capacity(bones.len());
        let mut visited = vec![false; bones.len()];
        let mut stack: Vec<u32> = bones
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, bone)| bone.parent.is_none())
            .map(|(index, _)| index as u32)
            .collect();

        while let Some(index) = stack.pop() {
            if std::mem::replace(&mut visited[index as usize], true) {
                continue;
            }
            order.push(index);
            stack.extend(bones[index as usize].children.iter().rev());
        }

        match visited.iter().position(|seen| !seen) {
            Some(unreached) => Err(SkeletonError::Cycle(unreached as u32)),
            None => Ok(order),
        }
    }

    /// All bones in stored order
    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    /// Bone at `index`
    pub fn bone(&self, index: u32) -> Option<&Bone> {
        self.bones.get(index as usize)
    }

    /// Number of bones
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// True if the skeleton has no bones
    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }

    /// Index of the first bone called `name`
    pub fn find_bone(&self, name: &str) -> Option<u32> {
        self.bones
            .iter()
            .position(|bone| bone.name == name)
            .map(|index| index as u32)
    }

    /// Bone indices in an order where every parent precedes its children
    pub fn traversal_order(&self) -> &[u32] {
        &self.order
    }

    /// Rest pose of every bone as decomposed transforms
    pub fn bind_pose(&self) -> &[Transform] {
        &self.bind_pose
    }

    /// World-space bind matrices, the inverses of ideal inverse bind matrices
    pub fn bind_world_matrices(&self) -> Vec<Mat4> {
        let mut world = vec![Mat4::identity(); self.bones.len()];
        for &index in &self.order {
            let bone = &self.bones[index as usize];
            let parent = bone
                .parent
                .map_or_else(Mat4::identity, |parent| world[parent as usize]);
            world[index as usize] = parent * bone.local_bind_transform;
        }
        world
    }
}

/// Incremental skeleton construction for loaders
#[derive(Debug, Default)]
pub struct SkeletonBuilder {
    bones: Vec<Bone>,
    derive_inverse_binds: bool,
}

impl SkeletonBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a bone and return its index
    pub fn add_bone(
        &mut self,
        name: impl Into<String>,
        parent: Option<u32>,
        local_bind_transform: Mat4,
        inverse_bind_matrix: Mat4,
    ) -> u32 {
        self.bones
            .push(Bone::new(name, parent, local_bind_transform, inverse_bind_matrix));
        (self.bones.len() - 1) as u32
    }

    /// Replace every inverse bind matrix with the inverse of the bone's bind world matrix
    ///
    /// For assets that ship without inverse bind matrices.
    pub fn derive_inverse_binds(mut self) -> Self {
        self.derive_inverse_binds = true;
        self
    }

    /// Validate and build the skeleton
    pub fn build(self) -> Result<Skeleton, SkeletonError> {
        let mut skeleton = Skeleton::new(self.bones)?;
        if self.derive_inverse_binds {
            let world = skeleton.bind_world_matrices();
            for (bone, world) in skeleton.bones.iter_mut().zip(world) {
                bone.inverse_bind_matrix = world.try_inverse().unwrap_or_else(Mat4::identity);
            }
        }
        Ok(skeleton)
    }
}
