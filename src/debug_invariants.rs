//! Structural self-checks for mesh levels and hierarchies.
//!
//! A [`MeshLevel`](crate::topology::mesh_level::MeshLevel) checks that every
//! edge, loop and kutta-node reference is in range, that edges and loops list
//! each other, and that loop sides match their edges. A
//! [`MeshHierarchy`](crate::topology::hierarchy::MeshHierarchy) adds area
//! conservation and classification survival between consecutive levels.
//!
//! Construction steps run these checks through [`debug_invariants!`] in debug
//! builds, and in release builds with the `check-invariants` or
//! `strict-invariants` feature.

use crate::mesh_error::MeshAgglomError;

/// Self-validation of a mesh structure.
pub trait DebugInvariants {
    /// Panic on the first violation when checks are enabled.
    fn debug_assert_invariants(&self);
    /// The first violated invariant, if any.
    fn validate_invariants(&self) -> Result<(), MeshAgglomError>;
}

/// [`InvariantViolation`](MeshAgglomError::InvariantViolation) on `level`
/// unless `holds`. The message is only built on failure.
pub(crate) fn ensure(
    holds: bool,
    level: usize,
    what: impl FnOnce() -> String,
) -> Result<(), MeshAgglomError> {
    if holds {
        Ok(())
    } else {
        Err(MeshAgglomError::InvariantViolation(format!(
            "level {level}: {}",
            what()
        )))
    }
}

/// Run a fallible check and panic with `ctx` on error when invariant checking
/// is enabled.
#[macro_export]
macro_rules! debug_invariants {
    ($expr:expr, $($ctx:tt)*) => {
        #[cfg(any(debug_assertions, feature = "strict-invariants", feature = "check-invariants"))]
        if let Err(e) = $expr {
            panic!(concat!("[invariants] ", $($ctx)*, ": {}"), e);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh_generation::flat_wing;
    use crate::topology::ids::LoopId;
    use crate::topology::mesh_level::MeshLevel;

    #[test]
    fn ensure_tags_the_level() {
        assert!(ensure(true, 2, || unreachable!()).is_ok());
        let err = ensure(false, 2, || "loop 5 is empty".into()).unwrap_err();
        assert_eq!(
            err,
            MeshAgglomError::InvariantViolation("level 2: loop 5 is empty".into())
        );
    }

    #[test]
    fn unlisted_edge_is_reported() {
        let mut level = MeshLevel::from_input(&flat_wing(2)).unwrap();
        level.validate_invariants().unwrap();
        level.loops_mut()[0].edges.rotate_left(1);
        assert!(matches!(
            level.validate_invariants(),
            Err(MeshAgglomError::InvariantViolation(_))
        ));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "[invariants] MeshLevel")]
    fn corrupted_level_panics_in_debug_builds() {
        let mut level = MeshLevel::from_input(&flat_wing(2)).unwrap();
        level.edges_mut()[0].loops[0] = LoopId::new(999);
        level.debug_assert_invariants();
    }
}
