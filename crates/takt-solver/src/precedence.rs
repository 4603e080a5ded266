//! Precedence derivation.
//!
//! Two sources feed the precedence edge list: consecutive operations of one
//! order (by ascending `op_no`), and BOM-induced cross-order edges, where
//! the first operation of a consuming order waits for the last operation of
//! every order producing the required part. A part nobody produces yields
//! no edge (material assumed on hand); an order producing its own input is
//! kept as-is and surfaces as infeasibility in the solver.

use takt_core::{Dataset, PlanIndex};

/// `start(after) >= end(before)`, positions into `Dataset::operations`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PrecedenceEdge {
    pub before: usize,
    pub after: usize,
}

/// Derive all precedence edges, deduplicated and in stable order.
pub fn build_precedences(ds: &Dataset, index: &PlanIndex) -> Vec<PrecedenceEdge> {
    let mut edges = Vec::new();

    for ops in index.ops_by_order.values() {
        for pair in ops.windows(2) {
            edges.push(PrecedenceEdge {
                before: pair[0],
                after: pair[1],
            });
        }
    }

    for link in &ds.bom {
        let Some(part) = &link.required_part_no else {
            continue;
        };
        let Some(producers) = index.part_producers.get(part) else {
            continue;
        };
        let Some(first_parent_op) = index
            .ops_by_order
            .get(&link.order_no)
            .and_then(|ops| ops.first())
        else {
            continue;
        };
        for producer in producers {
            if let Some(&last_producer_op) = index.order_last_op.get(producer) {
                edges.push(PrecedenceEdge {
                    before: last_producer_op,
                    after: *first_parent_op,
                });
            }
        }
    }

    edges.sort_unstable();
    edges.dedup();
    edges
}
