//! Sequence-dependent changeover costs.
//!
//! The cost of running `to` after `from` on a machine is assembled from the
//! machine's changeover group: for every attribute the successor carries,
//! each matching attribute of the predecessor contributes either zero (same
//! value), the matrix entry for that value pair, or the group's standard
//! time for the attribute. Machines that can run their setups concurrently
//! (`accumulative`) pay the longest contribution; all others pay the sum.
//!
//! The matrix is asymmetric and distinct param ids are never collapsed,
//! even when their display values happen to match.

use std::collections::HashMap;

use takt_core::{
    AttributeId, ChangeoverGroupId, Dataset, OperationId, ParamId, PlanIndex, Resource,
};

/// Changeover lookup for one scheduling run.
pub struct ChangeoverEngine<'a> {
    matrix: HashMap<(ChangeoverGroupId, AttributeId, ParamId, ParamId), i64>,
    standards: HashMap<(ChangeoverGroupId, AttributeId), i64>,
    index: &'a PlanIndex,
}

impl<'a> ChangeoverEngine<'a> {
    pub fn new(ds: &Dataset, index: &'a PlanIndex) -> Self {
        let matrix = ds
            .changeover_matrix
            .iter()
            .map(|e| {
                (
                    (
                        e.changeover_group_id,
                        e.attribute_id,
                        e.from_param_id,
                        e.to_param_id,
                    ),
                    e.setup_minutes,
                )
            })
            .collect();
        let standards = ds
            .changeover_standards
            .iter()
            .map(|s| ((s.changeover_group_id, s.attribute_id), s.setup_minutes))
            .collect();
        Self {
            matrix,
            standards,
            index,
        }
    }

    /// Setup minutes the machine spends switching from `from` to `to`.
    pub fn minutes_between(
        &self,
        from: OperationId,
        to: OperationId,
        resource: &Resource,
    ) -> i64 {
        let Some(group) = resource.changeover_group_id else {
            return 0;
        };
        let from_params = self.index.params_of(from);
        let to_params = self.index.params_of(to);
        if from_params.is_empty() || to_params.is_empty() {
            return 0;
        }

        let mut contributions = Vec::new();
        for &(attribute, to_param) in to_params {
            for &(from_attribute, from_param) in from_params {
                if from_attribute != attribute {
                    continue;
                }
                if from_param == to_param {
                    contributions.push(0);
                } else if let Some(&minutes) =
                    self.matrix.get(&(group, attribute, from_param, to_param))
                {
                    contributions.push(minutes);
                } else if let Some(&minutes) = self.standards.get(&(group, attribute)) {
                    contributions.push(minutes);
                }
                // neither a matrix pair nor a standard: the attribute does
                // not contribute
            }
        }

        if contributions.is_empty() {
            return 0;
        }
        if resource.accumulative {
            contributions.into_iter().max().unwrap_or(0)
        } else {
            contributions.into_iter().sum()
        }
    }
}
