//! End-to-end preprocessing: raw surface in, multigrid hierarchy out.
//!
//! The stages run in a fixed order:
//!
//! 1. apply attachments (component table and control-surface tags),
//! 2. weld duplicate nodes,
//! 3. build level 0,
//! 4. classify sharp edges and walk kutta chains,
//! 5. build vortex sheets and shed their wakes,
//! 6. merge the wakes into level 0,
//! 7. coarsen into a [`MeshHierarchy`].
//!
//! Recoverable findings accumulate in [`PreprocessedModel::diagnostics`];
//! everything else is a [`MeshAgglomError`].

use hashbrown::HashMap;
use log::{debug, info};

use crate::config::PreprocessConfig;
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::geometry::bbox::BoundingBox;
use crate::kutta::{KuttaTopology, SharpEdgeClassifier};
use crate::mesh_error::MeshAgglomError;
use crate::topology::attachment::{AttachmentSummary, apply_attachments};
use crate::topology::components::ComponentTable;
use crate::topology::hierarchy::{GeometryVersion, MeshHierarchy};
use crate::topology::ids::NodeId;
use crate::topology::input::SurfaceMeshInput;
use crate::topology::mesh_level::MeshLevel;
use crate::topology::weld::{WeldReport, weld_duplicate_nodes};
use crate::wake::{VortexSheet, WakeBuilder, build_sheets};

/// Everything the solver needs from preprocessing.
#[derive(Clone, Debug)]
pub struct PreprocessedModel {
    pub hierarchy: MeshHierarchy,
    pub sheets: Vec<VortexSheet>,
    pub kutta: KuttaTopology,
    /// Classifier findings plus loops dropped while welding.
    pub diagnostics: Diagnostics,
    /// The component table after attachments were applied.
    pub components: ComponentTable,
    pub attachments: AttachmentSummary,
    pub weld: WeldReport,
}

/// Run the whole preprocessing pipeline on `input`.
pub fn preprocess(
    input: &SurfaceMeshInput,
    components: &ComponentTable,
    config: &PreprocessConfig,
) -> Result<PreprocessedModel, MeshAgglomError> {
    config.validate()?;
    input.validate()?;

    let mut components = components.clone();
    let mut input = input.clone();
    let records = std::mem::take(&mut input.attachments);
    let attachments = apply_attachments(&mut input, &mut components, &records)?;
    debug!(
        "attachments: {} components declared, {} loops tagged, {} skipped",
        attachments.components_declared, attachments.loops_tagged, attachments.skipped
    );

    let tolerance = config
        .weld_relative_tolerance
        .map(|r| r * BoundingBox::from_points(&input.nodes).diagonal())
        .unwrap_or(0.0);
    let (welded, weld) = weld_duplicate_nodes(&input, tolerance)?;
    let mut diagnostics = Diagnostics::new();
    for &loop_index in &weld.dropped_loops {
        diagnostics.push(Diagnostic::DroppedLoop { loop_index });
    }
    if weld.merged_nodes > 0 {
        info!("welded {} duplicate nodes", weld.merged_nodes);
    }

    let mut level = MeshLevel::from_input(&welded)?;
    let kutta = SharpEdgeClassifier::new(&components, &config.kutta, config.freestream)?
        .with_symmetry(config.symmetry)
        .classify(
            &mut level,
            &welded.trailing_edge_chains,
            &welded.leading_edge_chains,
        )?;
    diagnostics.extend(kutta.diagnostics.clone());

    let mut sheets = build_sheets(&kutta, &level);
    let wake = WakeBuilder::new(&config.wake, config.freestream)?;
    wake.shed(&mut sheets, &level);
    if config.wake.merge_into_mesh {
        wake.merge(&mut sheets, &mut level, welded.max_surface_id())?;
    } else {
        level.set_kutta_nodes(sheets.iter().flat_map(|s| s.kutta_nodes()).collect());
    }

    let hierarchy = MeshHierarchy::build(
        level,
        &config.hierarchy,
        &config.agglomeration,
        config.symmetry,
    )?;
    info!(
        "preprocessed {} input loops into {} levels with {} vortex sheets ({} diagnostics)",
        input.loops.len(),
        hierarchy.num_levels(),
        sheets.len(),
        diagnostics.len()
    );

    Ok(PreprocessedModel {
        hierarchy,
        sheets,
        kutta,
        diagnostics,
        components,
        attachments,
        weld,
    })
}

impl PreprocessedModel {
    /// Move level-0 surface nodes and carry the wakes along.
    ///
    /// Every wake shed from a moved kutta node is translated rigidly with
    /// its anchor. Returns `Ok(false)` if `version` is not newer than the
    /// geometry the hierarchy already holds.
    pub fn apply_deformation(
        &mut self,
        moves: &[(NodeId, [f64; 3])],
        version: GeometryVersion,
    ) -> Result<bool, MeshAgglomError> {
        if version <= self.hierarchy.synced_version() {
            return Ok(false);
        }
        let targets: HashMap<NodeId, [f64; 3]> = moves.iter().copied().collect();
        let mut all = moves.to_vec();
        for sheet in &mut self.sheets {
            for v in &mut sheet.vortices {
                let Some(&xyz) = targets.get(&v.kutta_node) else {
                    continue;
                };
                v.follow_anchor(xyz);
                all.extend(v.wake_nodes.iter().copied().zip(v.wake_points.iter().copied()));
            }
        }
        let updated = self.hierarchy.update_node_positions(&all, version)?;
        let finest = self.hierarchy.finest();
        for sheet in &mut self.sheets {
            sheet.update_core_widths(finest);
        }
        debug!(
            "applied deformation {} ({} surface moves, {} total)",
            version.0,
            moves.len(),
            all.len()
        );
        Ok(updated)
    }

    /// Total kutta nodes over all sheets.
    pub fn num_kutta_nodes(&self) -> usize {
        self.sheets.iter().map(|s| s.vortices.len()).sum()
    }
}
