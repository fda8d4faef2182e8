//! Spatial search.
//!
//! The [`Bvh`] answers "which items are near here" without a quadratic scan.
//! It backs node welding and the mirror maps of symmetric agglomeration.

pub mod bvh;

pub use bvh::Bvh;

use crate::config::SymmetryPlane;
use crate::mesh_error::MeshAgglomError;

/// For each point, the index of its mirror image through `plane`.
///
/// Every mirror must exist within `tolerance` and the map must be an
/// involution; otherwise the geometry is not symmetric.
pub fn mirror_map(
    points: &[[f64; 3]],
    plane: &SymmetryPlane,
    tolerance: f64,
) -> Result<Vec<usize>, MeshAgglomError> {
    let bvh = Bvh::from_points(points, 8);
    let mut map = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        let target = plane.mirror(*p);
        let (j, _) = bvh.nearest(target, tolerance).ok_or_else(|| {
            MeshAgglomError::InvalidGeometry(format!(
                "item {i} at {p:?} has no mirror image about axis {} = {}",
                plane.axis, plane.offset
            ))
        })?;
        map.push(j as usize);
    }
    for (i, &j) in map.iter().enumerate() {
        if map[j] != i {
            return Err(MeshAgglomError::InvalidGeometry(format!(
                "mirror images of items {i} and {j} do not pair up"
            )));
        }
    }
    Ok(map)
}
