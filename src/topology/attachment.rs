//! Surface attachment metadata.
//!
//! The geometry layer hands over a list of heterogeneous attachments. Only a
//! few of them mean anything to the mesh: they either update the
//! [`ComponentTable`] or tag loops with a control surface. Each variant has one
//! handler; the rest are acknowledged and skipped.

use log::trace;
use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshAgglomError;
use crate::topology::components::{ComponentRecord, ComponentTable};
use crate::topology::face_loop::SurfaceKind;
use crate::topology::input::SurfaceMeshInput;

/// One attachment record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Attachment {
    /// Free parameter value.
    Parm { name: String, value: f64 },
    /// Key/value attributes on a component.
    AttrCollection {
        component_id: u32,
        attributes: Vec<(String, String)>,
    },
    /// Declares a component.
    Geom {
        component_id: u32,
        name: String,
        kind: SurfaceKind,
        lifting: bool,
    },
    /// Control surface covering a set of input loops.
    SubSurface {
        control_surface: u32,
        loops: Vec<usize>,
    },
    Link { from: String, to: String },
    Mode { name: String },
    /// Puts components into one group.
    Set {
        name: String,
        group: u32,
        components: Vec<u32>,
    },
    VarPreset { name: String },
    Free,
}

/// What applying a batch of attachments changed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttachmentSummary {
    pub components_declared: usize,
    pub loops_tagged: usize,
    pub skipped: usize,
}

/// Apply every attachment in order.
///
/// `Geom` and `Set` update `table`; `SubSurface` writes control-surface tags
/// into `input`. Unknown components and out-of-range loops are errors.
pub fn apply_attachments(
    input: &mut SurfaceMeshInput,
    table: &mut ComponentTable,
    attachments: &[Attachment],
) -> Result<AttachmentSummary, MeshAgglomError> {
    let mut summary = AttachmentSummary::default();
    for attachment in attachments {
        match attachment {
            Attachment::Geom {
                component_id,
                name,
                kind,
                lifting,
            } => {
                let group = table.get(*component_id).and_then(|r| r.group);
                let mut record = ComponentRecord::new(name.clone(), *kind, *lifting);
                record.group = group;
                table.insert(*component_id, record);
                summary.components_declared += 1;
            }
            Attachment::AttrCollection {
                component_id,
                attributes,
            } => {
                let record = table.require_mut(*component_id)?;
                for (k, v) in attributes {
                    record.attributes.insert(k.clone(), v.clone());
                }
            }
            Attachment::SubSurface {
                control_surface,
                loops,
            } => {
                let len = input.loops.len();
                for &loop_index in loops {
                    let lp = input
                        .loops
                        .get_mut(loop_index)
                        .ok_or(MeshAgglomError::LoopOutOfBounds { loop_index, len })?;
                    lp.tags.control_surface = Some(*control_surface);
                    summary.loops_tagged += 1;
                }
            }
            Attachment::Set {
                group, components, ..
            } => {
                for &id in components {
                    table.require_mut(id)?.group = Some(*group);
                }
            }
            Attachment::Parm { name, .. }
            | Attachment::Mode { name }
            | Attachment::VarPreset { name } => {
                trace!("attachment {name} carries no mesh data");
                summary.skipped += 1;
            }
            Attachment::Link { from, to } => {
                trace!("link {from} -> {to} carries no mesh data");
                summary.skipped += 1;
            }
            Attachment::Free => summary.skipped += 1,
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::face_loop::LoopTags;
    use crate::topology::input::LoopInput;

    fn input() -> SurfaceMeshInput {
        SurfaceMeshInput {
            nodes: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [1.0, 1.0, 0.0]],
            loops: vec![
                LoopInput::new(vec![0, 1, 2], LoopTags::default()),
                LoopInput::new(vec![1, 3, 2], LoopTags::default()),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn geom_then_set_groups_components() {
        let mut inp = input();
        let mut table = ComponentTable::new();
        let summary = apply_attachments(
            &mut inp,
            &mut table,
            &[
                Attachment::Geom {
                    component_id: 1,
                    name: "wing".into(),
                    kind: SurfaceKind::Wing,
                    lifting: true,
                },
                Attachment::Set {
                    name: "main".into(),
                    group: 7,
                    components: vec![1],
                },
                Attachment::Mode {
                    name: "cruise".into(),
                },
                Attachment::Free,
            ],
        )
        .unwrap();
        assert_eq!(summary.components_declared, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(table.chain_key(1), 7);
    }

    #[test]
    fn sub_surface_tags_loops() {
        let mut inp = input();
        let mut table = ComponentTable::new();
        apply_attachments(
            &mut inp,
            &mut table,
            &[Attachment::SubSurface {
                control_surface: 2,
                loops: vec![1],
            }],
        )
        .unwrap();
        assert_eq!(inp.loops[0].tags.control_surface, None);
        assert_eq!(inp.loops[1].tags.control_surface, Some(2));
    }

    #[test]
    fn unknown_component_is_an_error() {
        let mut inp = input();
        let mut table = ComponentTable::new();
        let err = apply_attachments(
            &mut inp,
            &mut table,
            &[Attachment::AttrCollection {
                component_id: 4,
                attributes: vec![("color".into(), "red".into())],
            }],
        )
        .unwrap_err();
        assert_eq!(err, MeshAgglomError::UnknownComponent(4));
    }

    #[test]
    fn sub_surface_out_of_range() {
        let mut inp = input();
        let mut table = ComponentTable::new();
        let err = apply_attachments(
            &mut inp,
            &mut table,
            &[Attachment::SubSurface {
                control_surface: 1,
                loops: vec![5],
            }],
        )
        .unwrap_err();
        assert_eq!(
            err,
            MeshAgglomError::LoopOutOfBounds {
                loop_index: 5,
                len: 2
            }
        );
    }
}
