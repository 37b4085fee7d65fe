//! Pre-scan of a configuration batch: where every entry lands and how much
//! each target has to grow, computed before any storage is touched.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::descriptor::{ConfigBatch, SlotId};
use crate::error::{AtlasExtendError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    /// Stack of layered arrays; entries own consecutive layers.
    Layered,
    /// Packed sprite atlas; entries own one tile each.
    Sprite,
}

/// What the planner needs to know about a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetCapacity {
    pub kind: TargetKind,
    /// Slots that exist before any configuration is applied.
    pub builtin: usize,
    /// Slots that exist right now.
    pub capacity: usize,
    /// Hard ceiling on slots for this target.
    pub max_slots: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Placement {
    /// Fresh slots appended after the builtin ones.
    New,
    /// Existing slots addressed by a numeric id.
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedEntry {
    /// Position in the batch.
    pub ordinal: usize,
    pub key: String,
    pub target: String,
    pub start: u32,
    pub len: usize,
    pub placement: Placement,
}

impl PlannedEntry {
    pub fn slots(&self) -> std::ops::Range<usize> {
        self.start as usize..self.start as usize + self.len
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TargetPlan {
    pub builtin: usize,
    pub new_slots: usize,
    pub entries: usize,
}

impl TargetPlan {
    /// Capacity every array of the target must reach before the commit pass.
    pub fn required_capacity(&self) -> usize {
        self.builtin + self.new_slots
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadPlan {
    /// One entry per descriptor, in batch order.
    pub entries: Vec<PlannedEntry>,
    pub targets: BTreeMap<String, TargetPlan>,
}

/// Two-phase allocator front half: computes the plan, never mutates storage.
#[derive(Debug, Clone, Default)]
pub struct BulkLoadPlanner {
    targets: BTreeMap<String, TargetCapacity>,
}

impl BulkLoadPlanner {
    pub fn new(targets: impl IntoIterator<Item = (String, TargetCapacity)>) -> Self {
        Self {
            targets: targets.into_iter().collect(),
        }
    }

    pub fn plan(&self, batch: &ConfigBatch) -> Result<LoadPlan> {
        let mut plan = LoadPlan {
            entries: Vec::with_capacity(batch.len()),
            targets: self
                .targets
                .iter()
                .map(|(name, cap)| {
                    (
                        name.clone(),
                        TargetPlan {
                            builtin: cap.builtin,
                            ..TargetPlan::default()
                        },
                    )
                })
                .collect(),
        };

        for (ordinal, desc) in batch.iter().enumerate() {
            let cap = self
                .targets
                .get(&desc.target)
                .ok_or_else(|| AtlasExtendError::UnknownTarget(desc.target.clone()))?;
            let Some(tp) = plan.targets.get_mut(&desc.target) else {
                return Err(AtlasExtendError::UnknownTarget(desc.target.clone()));
            };
            desc.check_sides()?;
            let len = desc.len();
            if cap.kind == TargetKind::Sprite && len != 1 {
                return Err(AtlasExtendError::Config(format!(
                    "sprite `{}` lists {len} sides, sprite targets take exactly one",
                    desc.key()
                )));
            }

            let (start, placement) = match &desc.id {
                SlotId::Named(_) => {
                    let start = cap.builtin + tp.new_slots;
                    let required = start + len;
                    if required > cap.max_slots {
                        return Err(AtlasExtendError::CapacityOverflow {
                            target: desc.target.clone(),
                            required,
                            max: cap.max_slots,
                        });
                    }
                    tp.new_slots += len;
                    (start, Placement::New)
                }
                SlotId::Numeric(index) => {
                    if cap.kind == TargetKind::Sprite {
                        return Err(AtlasExtendError::Config(format!(
                            "sprite target `{}` cannot overwrite slot {index}",
                            desc.target
                        )));
                    }
                    let start = *index as usize;
                    if start + len > cap.capacity {
                        return Err(AtlasExtendError::IndexOutOfRange {
                            target: desc.target.clone(),
                            index: start + len - 1,
                            capacity: cap.capacity,
                        });
                    }
                    (start, Placement::Overwrite)
                }
            };
            tp.entries += 1;
            plan.entries.push(PlannedEntry {
                ordinal,
                key: desc.key(),
                target: desc.target.clone(),
                start: start as u32,
                len,
                placement,
            });
        }
        Ok(plan)
    }
}
