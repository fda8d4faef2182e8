//! Structured surface generators for tests, benchmarks and examples.
//!
//! Every generator returns a ready [`SurfaceMeshInput`]. Wings are tagged
//! [`SurfaceKind::Wing`] on component 0 with one span station per spanwise
//! row of loops and an explicit trailing-edge chain; bodies are tagged
//! [`SurfaceKind::Body`].

use std::f64::consts::PI;

use crate::topology::face_loop::{LoopTags, SurfaceKind};
use crate::topology::input::{LoopInput, SurfaceMeshInput};

fn wing_tags(station: usize) -> LoopTags {
    LoopTags {
        span_station: station as u32,
        kind: SurfaceKind::Wing,
        ..Default::default()
    }
}

/// Quads over an `(nx + 1) x (ny + 1)` node grid, row `j` tagged station `j`.
fn station_grid(
    nx: usize,
    ny: usize,
    position: impl Fn(usize, usize) -> [f64; 3],
) -> (Vec<[f64; 3]>, Vec<LoopInput>) {
    let row_stride = nx + 1;
    let mut nodes = Vec::with_capacity(row_stride * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push(position(i, j));
        }
    }
    let mut loops = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let v0 = j * row_stride + i;
            let v1 = v0 + 1;
            let v3 = v0 + row_stride;
            let v2 = v3 + 1;
            loops.push(LoopInput::new(vec![v0, v1, v2, v3], wing_tags(j)));
        }
    }
    (nodes, loops)
}

/// Flat rectangular wing: unit chord along `x` split into two loops, `n`
/// unit span stations along `y`. The trailing edge is `x = 1`.
pub fn flat_wing(n: usize) -> SurfaceMeshInput {
    let (nodes, loops) = station_grid(2, n, |i, j| [i as f64 * 0.5, j as f64, 0.0]);
    SurfaceMeshInput {
        nodes,
        loops,
        trailing_edge_chains: vec![(0..=n).map(|j| j * 3 + 2).collect()],
        ..Default::default()
    }
}

/// Flat wing spanning `y` in `[-n, n]`, mirror symmetric about `y = 0`.
pub fn symmetric_wing(n: usize) -> SurfaceMeshInput {
    let (nodes, loops) =
        station_grid(2, 2 * n, |i, j| [i as f64 * 0.5, j as f64 - n as f64, 0.0]);
    SurfaceMeshInput {
        nodes,
        loops,
        trailing_edge_chains: vec![(0..=2 * n).map(|j| j * 3 + 2).collect()],
        ..Default::default()
    }
}

/// Closed thin-wedge section (sharp edges at `x = 0` and `x = 1`) extruded
/// over `n` span stations; open at both span ends. Normals point outward.
pub fn wedge_wing(n: usize) -> SurfaceMeshInput {
    // Section ring: trailing edge, upper, leading edge, lower.
    const SECTION: [[f64; 2]; 4] = [[1.0, 0.0], [0.5, 0.06], [0.0, 0.0], [0.5, -0.06]];
    let mut nodes = Vec::with_capacity(4 * (n + 1));
    for j in 0..=n {
        for [x, z] in SECTION {
            nodes.push([x, j as f64, z]);
        }
    }
    let mut loops = Vec::with_capacity(4 * n);
    for j in 0..n {
        for k in 0..4 {
            let a = j * 4 + k;
            let b = j * 4 + (k + 1) % 4;
            loops.push(LoopInput::new(vec![a, a + 4, b + 4, b], wing_tags(j)));
        }
    }
    SurfaceMeshInput {
        nodes,
        loops,
        trailing_edge_chains: vec![(0..=n).map(|j| j * 4).collect()],
        ..Default::default()
    }
}

/// Closed triangulated body of revolution about the `x` axis: unit length,
/// `segments` nodes around, `stations` intervals along (poles included).
pub fn body_of_revolution(segments: usize, stations: usize) -> SurfaceMeshInput {
    let segments = segments.max(3);
    let stations = stations.max(2);
    let tags = LoopTags {
        kind: SurfaceKind::Body,
        component_id: 1,
        surface_id: 1,
        ..Default::default()
    };

    let nose = 0;
    let mut nodes = vec![[0.0, 0.0, 0.0]];
    for i in 1..stations {
        let t = i as f64 / stations as f64;
        let r = 0.25 * (PI * t).sin();
        for k in 0..segments {
            let theta = 2.0 * PI * k as f64 / segments as f64;
            nodes.push([t, r * theta.cos(), r * theta.sin()]);
        }
    }
    let tail = nodes.len();
    nodes.push([1.0, 0.0, 0.0]);
    let ring = |i: usize, k: usize| 1 + (i - 1) * segments + k % segments;

    let mut loops = Vec::new();
    for k in 0..segments {
        loops.push(LoopInput::new(vec![nose, ring(1, k + 1), ring(1, k)], tags));
    }
    for i in 1..stations - 1 {
        for k in 0..segments {
            let (a, b) = (ring(i, k), ring(i, k + 1));
            let (c, d) = (ring(i + 1, k + 1), ring(i + 1, k));
            loops.push(LoopInput::new(vec![a, b, c], tags));
            loops.push(LoopInput::new(vec![a, c, d], tags));
        }
    }
    for k in 0..segments {
        let i = stations - 1;
        loops.push(LoopInput::new(vec![ring(i, k), ring(i, k + 1), tail], tags));
    }
    SurfaceMeshInput {
        nodes,
        loops,
        ..Default::default()
    }
}

/// Unit square split into four triangles around its centre node (index 4).
pub fn square_patch() -> SurfaceMeshInput {
    let tags = LoopTags::default();
    SurfaceMeshInput {
        nodes: vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.5, 0.5, 0.0],
        ],
        loops: (0..4)
            .map(|k| LoopInput::new(vec![k, (k + 1) % 4, 4], tags))
            .collect(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::mesh_level::MeshLevel;

    #[test]
    fn flat_wing_layout() {
        let input = flat_wing(4);
        assert_eq!(input.nodes.len(), 15);
        assert_eq!(input.loops.len(), 8);
        assert_eq!(input.trailing_edge_chains[0], vec![2, 5, 8, 11, 14]);
        let level = MeshLevel::from_input(&input).unwrap();
        assert!((level.total_area() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn body_is_closed_with_outward_normals() {
        let level = MeshLevel::from_input(&body_of_revolution(12, 8)).unwrap();
        assert!(level.edges().iter().all(|e| !e.is_open()));
        for lp in level.loops() {
            let c = lp.geometry.centroid;
            let radial = [0.0, c[1], c[2]];
            let n = lp.geometry.normal;
            assert!(n[1] * radial[1] + n[2] * radial[2] > 0.0);
        }
    }

    #[test]
    fn wedge_normals_point_outward() {
        let level = MeshLevel::from_input(&wedge_wing(2)).unwrap();
        for lp in level.loops() {
            let z = lp.geometry.centroid[2];
            assert!(lp.geometry.normal[2] * z > 0.0);
        }
    }
}
