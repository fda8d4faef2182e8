//! Vortex sheets and their wake meshes.
//!
//! [`build_sheets`] turns kutta chains into [`VortexSheet`]s;
//! [`WakeBuilder`] sheds a straight wake from every trailing vortex and
//! stitches consecutive wake lines into quad strips. The strips are appended
//! to level 0 with fresh nodes, so the surface stays manifold and every wake
//! loop is agglomerated like any other loop (tagged [`SurfaceKind::Wake`],
//! one span station per strip).

pub mod trailing_vortex;
pub mod vortex_sheet;

pub use trailing_vortex::TrailingVortex;
pub use vortex_sheet::VortexSheet;

use log::{debug, info};

use crate::config::WakeConfig;
use crate::geometry::metrics::{add, dot, normalized, scale};
use crate::kutta::KuttaTopology;
use crate::mesh_error::MeshAgglomError;
use crate::topology::face_loop::{LoopTags, SurfaceKind};
use crate::topology::ids::NodeId;
use crate::topology::input::LoopInput;
use crate::topology::mesh_level::MeshLevel;
use crate::topology::node::Node;

use self::convex_bisector::bisector;

/// One sheet per chain with at least two nodes.
pub fn build_sheets(topology: &KuttaTopology, level: &MeshLevel) -> Vec<VortexSheet> {
    let mut sheets = Vec::new();
    for chain in &topology.chains {
        if let Some(sheet) = VortexSheet::from_chain(sheets.len(), chain, level) {
            sheets.push(sheet);
        }
    }
    info!("built {} vortex sheets", sheets.len());
    sheets
}

/// Sheds and meshes the wakes of a set of sheets.
#[derive(Clone, Debug)]
pub struct WakeBuilder<'a> {
    config: &'a WakeConfig,
    freestream: [f64; 3],
}

impl<'a> WakeBuilder<'a> {
    pub fn new(config: &'a WakeConfig, freestream: [f64; 3]) -> Result<Self, MeshAgglomError> {
        let freestream = normalized(freestream).ok_or_else(|| {
            MeshAgglomError::InvalidConfig("freestream must be non-zero".into())
        })?;
        if config.nodes_per_vortex < 2 {
            return Err(MeshAgglomError::InvalidConfig(
                "wake.nodes_per_vortex must be >= 2".into(),
            ));
        }
        Ok(Self { config, freestream })
    }

    /// Compute wake polylines for every vortex of `sheets`.
    ///
    /// The wake reaches `wake_length_factor` times the bounding-box diagonal
    /// of `level` downstream.
    pub fn shed(&self, sheets: &mut [VortexSheet], level: &MeshLevel) {
        let far = self.config.wake_length_factor * level.bounding_box().diagonal();
        let count = self.config.nodes_per_vortex;
        let step = far / (count - 1) as f64;
        let blend = self.config.bisector_blend;
        for sheet in sheets.iter_mut() {
            for v in &mut sheet.vortices {
                let first = if blend > 0.0 && !v.concave {
                    bisector(level, v.kutta_node)
                        .filter(|b| dot(*b, self.freestream) > 0.0)
                        .and_then(|b| {
                            normalized(add(scale(self.freestream, 1.0 - blend), scale(b, blend)))
                        })
                        .unwrap_or(self.freestream)
                } else {
                    self.freestream
                };
                v.shed(first, self.freestream, step, count);
            }
        }
        debug!("shed wakes {far:.3} downstream with {count} nodes per vortex");
    }

    /// Append the wake meshes of `sheets` to `level` and register the kutta
    /// nodes. Wake surface ids start after `max_surface_id`.
    pub fn merge(
        &self,
        sheets: &mut [VortexSheet],
        level: &mut MeshLevel,
        max_surface_id: u32,
    ) -> Result<(), MeshAgglomError> {
        let mut new_nodes = Vec::new();
        let mut new_loops = Vec::new();
        let base = level.num_nodes();
        let mut ranges = Vec::with_capacity(sheets.len());

        for sheet in sheets.iter_mut() {
            sheet.surface_id = max_surface_id + 1 + sheet.id as u32;
            for v in &mut sheet.vortices {
                v.wake_nodes.clear();
                for p in &v.wake_points {
                    v.wake_nodes.push(NodeId::new(base + new_nodes.len()));
                    let mut node = Node::new(*p);
                    node.component_id = sheet.component_id;
                    new_nodes.push(node);
                }
            }
            let start = new_loops.len();
            let m = sheet.vortices.len();
            for strip in 0..sheet.num_strips() {
                let left = &sheet.vortices[strip].wake_nodes;
                let right = &sheet.vortices[(strip + 1) % m].wake_nodes;
                let tags = LoopTags {
                    surface_id: sheet.surface_id,
                    component_id: sheet.component_id,
                    span_station: strip as u32,
                    kind: SurfaceKind::Wake,
                    control_surface: None,
                };
                for s in 0..left.len().saturating_sub(1) {
                    let ring = vec![
                        left[s].idx(),
                        left[s + 1].idx(),
                        right[s + 1].idx(),
                        right[s].idx(),
                    ];
                    new_loops.push(LoopInput::new(ring, tags));
                }
            }
            ranges.push((start, new_loops.len()));
        }

        let (_, loop_range) = level.append_loops(new_nodes, &new_loops)?;
        for (sheet, (start, end)) in sheets.iter_mut().zip(ranges) {
            sheet.wake_loops = loop_range.start + start..loop_range.start + end;
        }
        let kutta = sheets.iter().flat_map(|s| s.kutta_nodes()).collect();
        level.set_kutta_nodes(kutta);
        info!(
            "merged {} wake loops from {} sheets into level 0",
            loop_range.len(),
            sheets.len()
        );
        Ok(())
    }
}

mod convex_bisector {
    use crate::geometry::metrics::{add, normalized};
    use crate::kutta::convexity::merged_normal;
    use crate::topology::ids::NodeId;
    use crate::topology::mesh_level::MeshLevel;

    /// Mean aft-pointing bisector of the trailing edges at `n`.
    pub(super) fn bisector(level: &MeshLevel, n: NodeId) -> Option<[f64; 3]> {
        let sum = level
            .edges_of_node(n)
            .iter()
            .filter(|e| {
                let edge = level.edge(**e);
                edge.flags.trailing_edge && !edge.is_open()
            })
            .fold([0.0; 3], |acc, e| {
                add(acc, normalized(merged_normal(level, *e)).unwrap_or([0.0; 3]))
            });
        normalized(sum)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KuttaConfig;
    use crate::geometry::metrics::sub;
    use crate::kutta::SharpEdgeClassifier;
    use crate::mesh_generation::{flat_wing, wedge_wing};
    use crate::topology::components::ComponentTable;
    use crate::topology::input::SurfaceMeshInput;

    fn classified(input: &SurfaceMeshInput) -> (MeshLevel, KuttaTopology) {
        let mut level = MeshLevel::from_input(input).unwrap();
        let table = ComponentTable::new();
        let config = KuttaConfig::default();
        let topo = SharpEdgeClassifier::new(&table, &config, [1.0, 0.0, 0.0])
            .unwrap()
            .classify(&mut level, &input.trailing_edge_chains, &[])
            .unwrap();
        (level, topo)
    }

    #[test]
    fn flat_wing_wake_has_one_strip_per_station() {
        let (mut level, topo) = classified(&flat_wing(4));
        let mut sheets = build_sheets(&topo, &level);
        assert_eq!(sheets.len(), 1);
        let config = WakeConfig::default();
        let builder = WakeBuilder::new(&config, [1.0, 0.0, 0.0]).unwrap();
        builder.shed(&mut sheets, &level);
        let before = level.num_loops();
        builder.merge(&mut sheets, &mut level, 0).unwrap();

        let sheet = &sheets[0];
        assert_eq!(sheet.surface_id, 1);
        assert_eq!(sheet.wake_loops.len(), 4 * (config.nodes_per_vortex - 1));
        assert_eq!(level.num_loops(), before + sheet.wake_loops.len());
        assert_eq!(level.kutta_nodes().len(), 5);

        let far = config.wake_length_factor * 17.0f64.sqrt();
        for v in &sheet.vortices {
            assert_eq!(v.wake_nodes.len(), config.nodes_per_vortex);
            assert_eq!(level.node(v.wake_nodes[0]).xyz, v.te_xyz);
            assert!((v.length() - far).abs() < 1e-9);
        }
        for l in sheet.wake_loops.clone() {
            let tags = level.loops()[l].tags;
            assert_eq!(tags.kind, SurfaceKind::Wake);
        }
    }

    #[test]
    fn bisector_bends_the_first_segment_only() {
        let (level, topo) = classified(&wedge_wing(2));
        let mut sheets = build_sheets(&topo, &level);
        let config = WakeConfig {
            bisector_blend: 1.0,
            ..Default::default()
        };
        let freestream = normalized([1.0, 0.0, 1.0]).unwrap();
        WakeBuilder::new(&config, freestream)
            .unwrap()
            .shed(&mut sheets, &level);
        // The wedge bisector points along +x.
        let v = &sheets[0].vortices[1];
        let first = sub(v.wake_points[1], v.te_xyz);
        assert!(first[0] > 0.0);
        assert!(first[2].abs() < 1e-9);
        let second = normalized(sub(v.wake_points[2], v.wake_points[1])).unwrap();
        assert!((dot(second, freestream) - 1.0).abs() < 1e-12);
    }
}
