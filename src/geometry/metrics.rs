//! Geometry metrics for mesh loops and edges.
//!
//! Loops are arbitrary planar-ish polygons given as an ordered list of 3-D
//! vertices. Area and normal use Newell's method so that triangles, quads and
//! general polygons share one code path; the centroid is the area-weighted
//! centroid of the fan triangulation about the vertex average.
//!
//! All vector helpers operate on plain `[f64; 3]` arrays.

use crate::geometry::bbox::BoundingBox;
use crate::mesh_error::MeshAgglomError;

pub(crate) const EPS: f64 = 1e-12;

/// Derived geometry of one loop.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LoopGeometry {
    /// Unit normal (zero vector for a degenerate loop).
    pub normal: [f64; 3],
    /// Unsigned area.
    pub area: f64,
    /// Area-weighted centroid.
    pub centroid: [f64; 3],
    /// Average parametric coordinate of the loop's nodes.
    pub uv_centroid: [f64; 2],
    /// Reference length used by the solver for core sizing (`sqrt(area)` on the
    /// finest level, area-weighted on coarse levels).
    pub ref_length: f64,
    /// Axis-aligned bounds of the loop's nodes.
    pub bbox: BoundingBox,
}

impl Default for LoopGeometry {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            area: 0.0,
            centroid: [0.0; 3],
            uv_centroid: [0.0; 2],
            ref_length: 0.0,
            bbox: BoundingBox::empty(),
        }
    }
}

/// Compute the geometry of a polygon from its ordered vertices.
///
/// Returns an error for fewer than three vertices or non-finite coordinates.
/// Zero-area polygons are *not* an error: they get a zero normal and zero area
/// and are left for the agglomerator to absorb.
pub fn polygon_geometry(
    vertices: &[[f64; 3]],
    uv: Option<&[[f64; 2]]>,
) -> Result<LoopGeometry, MeshAgglomError> {
    if vertices.len() < 3 {
        return Err(MeshAgglomError::InvalidGeometry(format!(
            "polygon needs at least 3 vertices, got {}",
            vertices.len()
        )));
    }
    if vertices.iter().flatten().any(|c| !c.is_finite()) {
        return Err(MeshAgglomError::InvalidGeometry(
            "non-finite vertex coordinate".into(),
        ));
    }

    let area_vec = newell_area_vector(vertices);
    let area = norm(area_vec);
    let normal = if area > EPS {
        scale(area_vec, 1.0 / area)
    } else {
        [0.0; 3]
    };

    let avg = vertex_average(vertices);
    let n = vertices.len();
    let mut weighted = [0.0; 3];
    let mut weight = 0.0;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        let tri = 0.5 * norm(cross(sub(a, avg), sub(b, avg)));
        let c = [
            (a[0] + b[0] + avg[0]) / 3.0,
            (a[1] + b[1] + avg[1]) / 3.0,
            (a[2] + b[2] + avg[2]) / 3.0,
        ];
        weighted = add(weighted, scale(c, tri));
        weight += tri;
    }
    let centroid = if weight > EPS {
        scale(weighted, 1.0 / weight)
    } else {
        avg
    };

    let uv_centroid = match uv {
        Some(uv) if !uv.is_empty() => {
            let mut acc = [0.0; 2];
            for p in uv {
                acc[0] += p[0];
                acc[1] += p[1];
            }
            [acc[0] / uv.len() as f64, acc[1] / uv.len() as f64]
        }
        _ => [0.0; 2],
    };

    Ok(LoopGeometry {
        normal,
        area,
        centroid,
        uv_centroid,
        ref_length: area.sqrt(),
        bbox: BoundingBox::from_points(vertices),
    })
}

/// Twice-area vector of a polygon divided by two (Newell's method).
pub fn newell_area_vector(vertices: &[[f64; 3]]) -> [f64; 3] {
    let n = vertices.len();
    let mut acc = [0.0; 3];
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[(i + 1) % n];
        acc[0] += (a[1] - b[1]) * (a[2] + b[2]);
        acc[1] += (a[2] - b[2]) * (a[0] + b[0]);
        acc[2] += (a[0] - b[0]) * (a[1] + b[1]);
    }
    scale(acc, 0.5)
}

/// Plain average of the vertices.
pub fn vertex_average(vertices: &[[f64; 3]]) -> [f64; 3] {
    let mut acc = [0.0; 3];
    for v in vertices {
        acc = add(acc, *v);
    }
    scale(acc, 1.0 / vertices.len().max(1) as f64)
}

/// Signed volume of the tetrahedron `(a, b, c, d)`.
pub fn signed_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let ab = sub(b, a);
    let ac = sub(c, a);
    let ad = sub(d, a);
    dot(ab, cross(ac, ad)) / 6.0
}

/// Angle in degrees between two vectors; `None` when either is degenerate.
pub fn angle_between_deg(a: [f64; 3], b: [f64; 3]) -> Option<f64> {
    let la = norm(a);
    let lb = norm(b);
    if la <= EPS || lb <= EPS {
        return None;
    }
    let c = (dot(a, b) / (la * lb)).clamp(-1.0, 1.0);
    Some(c.acos().to_degrees())
}

/// Normalize a vector, returning `None` for a zero-length input.
pub fn normalized(a: [f64; 3]) -> Option<[f64; 3]> {
    let len = norm(a);
    (len > EPS).then(|| scale(a, 1.0 / len))
}

pub fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn add(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub fn scale(a: [f64; 3], s: f64) -> [f64; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

pub fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

pub fn distance(a: [f64; 3], b: [f64; 3]) -> f64 {
    norm(sub(a, b))
}
