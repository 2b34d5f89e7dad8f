use std::collections::HashSet;

use crate::model::{FlowEdge, FlowGraph, GraphEdge, TransferMatrix};

pub const ORIGIN_SUFFIX: &str = " (Orig)";
pub const DESTINATION_SUFFIX: &str = " (Dest)";

/// Node label for an origin category.
pub fn origin_label(category: &str) -> String {
    format!("{category}{ORIGIN_SUFFIX}")
}

/// Node label for a destination category.
pub fn destination_label(category: &str) -> String {
    format!("{category}{DESTINATION_SUFFIX}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowSynthesis {
    pub flows: Vec<FlowEdge>,
    pub graph: FlowGraph,
}

impl FlowSynthesis {
    pub fn total_units(&self) -> u64 {
        self.flows.iter().map(|f| f.estimated_units).sum()
    }
}

/// Scale transfer coefficients by origin totals into absolute flows.
///
/// Pairs that round to zero units are dropped. Nodes are the side-labelled
/// categories in order of first appearance among the kept edges.
pub fn synthesize(
    matrix: &TransferMatrix,
    origin_categories: &[String],
    destination_categories: &[String],
    origin_totals: &[f64],
) -> FlowSynthesis {
    let mut flows = Vec::new();
    let mut graph = FlowGraph::default();
    let mut seen: HashSet<String> = HashSet::new();

    for (r, origin) in origin_categories.iter().enumerate().take(matrix.rows()) {
        let total = origin_totals.get(r).copied().unwrap_or(0.0);
        let source = origin_label(origin);

        for (c, destination) in destination_categories.iter().enumerate().take(matrix.cols()) {
            let probability = matrix.get(r, c);
            let estimated = (total * probability).round();
            if !(estimated > 0.0) {
                continue;
            }
            let estimated_units = estimated as u64;
            let target = destination_label(destination);

            for label in [&source, &target] {
                if seen.insert(label.clone()) {
                    graph.nodes.push(label.clone());
                }
            }

            graph.edges.push(GraphEdge {
                source: source.clone(),
                target,
                value: estimated_units,
            });
            flows.push(FlowEdge {
                origin_category: origin.clone(),
                destination_category: destination.clone(),
                probability,
                estimated_units,
            });
        }
    }

    log::debug!("{} flow edges over {} nodes", flows.len(), graph.nodes.len());

    FlowSynthesis { flows, graph }
}
