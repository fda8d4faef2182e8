//! Strong index handles for nodes, edges and loops of one mesh level.
//!
//! Every entity of a [`MeshLevel`](crate::topology::mesh_level::MeshLevel) lives
//! in a flat array owned by that level; the handles below are plain indices into
//! those arrays. They are `u32` on the inside so that the large per-level
//! correspondence tables stay compact, and `repr(transparent)` so a slice of ids
//! has the same layout as a slice of `u32`.
//!
//! Ids are only meaningful together with the level they were issued by; a
//! coarse-level `LoopId` and a fine-level `LoopId` with the same value are
//! unrelated.

use std::fmt;

use static_assertions::assert_eq_size;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
        )]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wrap a raw array index.
            #[inline]
            pub const fn new(index: usize) -> Self {
                Self(index as u32)
            }

            /// The raw array index.
            #[inline]
            pub const fn idx(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.0).finish()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(id: $name) -> usize {
                id.idx()
            }
        }
    };
}

entity_id!(
    /// Index of a node on one mesh level.
    NodeId
);
entity_id!(
    /// Index of an edge on one mesh level.
    EdgeId
);
entity_id!(
    /// Index of a loop (polygonal face) on one mesh level.
    LoopId
);

assert_eq_size!(NodeId, u32);
assert_eq_size!(EdgeId, u32);
assert_eq_size!(LoopId, u32);
assert_eq_size!(Option<LoopId>, u64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_roundtrip_and_order() {
        let a = NodeId::new(3);
        let b = NodeId::new(7);
        assert_eq!(a.idx(), 3);
        assert!(a < b);
        assert_eq!(format!("{a:?}"), "NodeId(3)");
        assert_eq!(format!("{b}"), "7");
        assert_eq!(usize::from(LoopId::new(11)), 11);
    }
}
