use std::collections::{HashMap, HashSet};

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::graph::{Graph, Link, Node, NodeId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    DuplicateNodeId {
        node_id: NodeId,
    },
    ChildrenMismatch {
        node_id: NodeId,
        expected: Vec<NodeId>,
        actual: Vec<NodeId>,
    },
    DanglingLink {
        source: NodeId,
        target: NodeId,
    },
}

/// Turns an untrusted JSON document into a normalized graph.
///
/// Anything that is not an object carrying `nodes` and `links` arrays
/// collapses to the empty graph.
pub fn normalize_document(document: Value) -> Graph {
    match parse_document(document) {
        Ok(graph) => normalize(graph),
        Err(error) => {
            tracing::warn!(%error, "discarding graph document");
            Graph::new()
        }
    }
}

/// Decodes the `{nodes, links}` envelope record by record.
///
/// Client-supplied `children` are stripped before decoding. A `parentId`
/// that cannot name a node reads as no parent and a non-boolean
/// `isBreakerLink` reads as `false`. Records that still do not decode (a node
/// without an integer id, a link without integer endpoints) are dropped with
/// a warning rather than failing the document.
pub fn parse_document(document: Value) -> Result<Graph> {
    let Value::Object(mut document) = document else {
        return Err(GraphError::malformed("expected a JSON object"));
    };
    let Some(Value::Array(raw_nodes)) = document.remove("nodes") else {
        return Err(GraphError::malformed("missing `nodes` array"));
    };
    let Some(Value::Array(raw_links)) = document.remove("links") else {
        return Err(GraphError::malformed("missing `links` array"));
    };

    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for mut raw in raw_nodes {
        if let Value::Object(fields) = &mut raw {
            fields.remove("children");
        }
        match serde_json::from_value::<Node>(raw) {
            Ok(node) => nodes.push(node),
            Err(error) => tracing::warn!(%error, "dropping undecodable node"),
        }
    }

    let mut links = Vec::with_capacity(raw_links.len());
    for raw in raw_links {
        match serde_json::from_value::<Link>(raw) {
            Ok(link) => links.push(link),
            Err(error) => tracing::warn!(%error, "dropping undecodable link"),
        }
    }

    Ok(Graph { nodes, links })
}

/// Restores the graph invariants.
///
/// Node ids are made unique (first occurrence wins), every `children` list is
/// re-derived from scratch out of `parent_id`, and links whose endpoints are
/// not both present are removed. A dangling `parent_id` is left in place; it
/// just contributes to no parent's `children`. Existing duplicate links are
/// not touched. Running this on its own output is a no-op.
pub fn normalize(mut graph: Graph) -> Graph {
    let mut seen = HashSet::with_capacity(graph.nodes.len());
    graph.nodes.retain(|node| {
        let first = seen.insert(node.id);
        if !first {
            tracing::warn!(node_id = node.id, "dropping node with duplicate id");
        }
        first
    });

    let positions: HashMap<NodeId, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(position, node)| (node.id, position))
        .collect();

    let edges: Vec<(usize, NodeId)> = graph
        .nodes
        .iter()
        .filter_map(|node| {
            let parent = positions.get(&node.parent_id?)?;
            Some((*parent, node.id))
        })
        .collect();

    for node in &mut graph.nodes {
        node.children.clear();
    }
    for (parent, child) in edges {
        graph.nodes[parent].children.push(child);
    }

    let before = graph.links.len();
    graph
        .links
        .retain(|link| positions.contains_key(&link.source) && positions.contains_key(&link.target));
    let dropped = before - graph.links.len();
    if dropped > 0 {
        tracing::debug!(dropped, "removed links with missing endpoints");
    }

    graph
}

pub fn invariant_violations(graph: &Graph) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    let mut ids = HashSet::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if !ids.insert(node.id) {
            violations.push(InvariantViolation::DuplicateNodeId { node_id: node.id });
        }
    }

    let mut expected: HashMap<NodeId, Vec<NodeId>> = HashMap::with_capacity(graph.nodes.len());
    for node in &graph.nodes {
        if let Some(parent_id) = node.parent_id.filter(|parent_id| ids.contains(parent_id)) {
            expected.entry(parent_id).or_default().push(node.id);
        }
    }

    for node in &graph.nodes {
        let mut wanted = expected.remove(&node.id).unwrap_or_default();
        let mut actual = node.children.clone();
        wanted.sort_unstable();
        actual.sort_unstable();
        if wanted != actual {
            violations.push(InvariantViolation::ChildrenMismatch {
                node_id: node.id,
                expected: wanted,
                actual,
            });
        }
    }

    for link in &graph.links {
        if !ids.contains(&link.source) || !ids.contains(&link.target) {
            violations.push(InvariantViolation::DanglingLink {
                source: link.source,
                target: link.target,
            });
        }
    }

    violations
}
