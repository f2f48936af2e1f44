//! Handle-based collections
//!
//! Resources (meshes, materials, textures, skeletons, animation clips) are referenced by
//! [`Handle`]s instead of owning pointers. A handle carries a slot index, the slot's
//! generation and a per-type tag:
//!
//! ```text
//! type_id::<T>() ──► Handle { index, generation, type }
//!                         │
//!        Registry ── type tag ──► Pool<T> ── index/generation ──► Option<&T>
//! ```

pub mod handle;
pub mod pool;
pub mod registry;
pub mod type_id;

pub use handle::Handle;
pub use pool::Pool;
pub use registry::Registry;
pub use type_id::{type_id, TypeTag, NO_TYPE};
