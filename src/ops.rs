use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{GraphError, Result};
use crate::graph::{Graph, Link, Node, NodeId};
use crate::normalize::{normalize, normalize_document};
use crate::store::GraphStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Removed,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLink {
    #[serde(default)]
    pub source: Option<NodeId>,
    #[serde(default)]
    pub target: Option<NodeId>,
    #[serde(default)]
    pub is_breaker_link: Option<bool>,
}

impl NewLink {
    pub fn from_value(payload: Value) -> Result<Self> {
        serde_json::from_value(payload)
            .map_err(|error| GraphError::invalid(format!("Invalid link payload: {error}")))
    }
}

impl GraphStore {
    pub fn get_node(&self, id: NodeId) -> Result<Node> {
        self.graph()
            .get_node(id)
            .cloned()
            .ok_or(GraphError::NotFound(id))
    }

    /// Replaces the whole graph with a client-submitted document.
    pub fn replace_graph(&mut self, document: Value) -> &Graph {
        let graph = normalize_document(document);
        tracing::info!(
            nodes = graph.nodes.len(),
            links = graph.links.len(),
            "graph replaced"
        );
        self.set_graph(graph);
        self.save();
        self.graph()
    }

    /// Shallow-merges `patch` into node `id`.
    ///
    /// `id` and `children` keys are ignored. `parentId` must be an integer or
    /// null; every other key overwrites or adds a display field.
    pub fn update_node(&mut self, id: NodeId, patch: Value) -> Result<Node> {
        let Value::Object(patch) = patch else {
            return Err(GraphError::invalid("Patch must be a JSON object"));
        };
        if !self.graph().has_node(id) {
            return Err(GraphError::NotFound(id));
        }
        let parent_id = patched_parent(id, &patch)?;

        let graph = self.graph_mut();
        if let Some(node) = graph.get_node_mut(id) {
            if let Some(parent_id) = parent_id {
                node.parent_id = parent_id;
            }
            for (key, value) in patch {
                match key.as_str() {
                    "id" | "children" | "parentId" => {}
                    _ => {
                        node.fields.insert(key, value);
                    }
                }
            }
        }
        let graph = normalize(std::mem::take(graph));
        self.set_graph(graph);
        self.save();

        tracing::info!(node_id = id, "node updated");
        self.get_node(id)
    }

    /// Deletes node `id`, orphaning its children and dropping its links.
    ///
    /// An unknown id is a no-op and nothing is written.
    pub fn delete_node(&mut self, id: NodeId) -> DeleteOutcome {
        let graph = self.graph_mut();
        let Some(parent_id) = graph.get_node(id).map(|node| node.parent_id) else {
            tracing::debug!(node_id = id, "delete of unknown node ignored");
            return DeleteOutcome::Missing;
        };

        let mut orphaned = 0usize;
        for node in &mut graph.nodes {
            if node.parent_id == Some(id) {
                node.parent_id = None;
                orphaned += 1;
            }
        }
        if let Some(parent_id) = parent_id {
            if let Some(parent) = graph.get_node_mut(parent_id) {
                parent.children.retain(|child| *child != id);
            }
        }
        graph.nodes.retain(|node| node.id != id);
        graph.links.retain(|link| !link.touches(id));

        let graph = normalize(std::mem::take(graph));
        self.set_graph(graph);
        self.save();

        tracing::info!(node_id = id, orphaned, "node deleted");
        DeleteOutcome::Removed
    }

    pub fn create_link(&mut self, request: NewLink) -> Result<Link> {
        let (Some(source), Some(target)) = (request.source, request.target) else {
            return Err(GraphError::invalid("Missing source or target"));
        };
        let graph = self.graph();
        for id in [source, target] {
            if !graph.has_node(id) {
                return Err(GraphError::NotFound(id));
            }
        }
        if graph.has_link(source, target) {
            return Err(GraphError::Conflict {
                source_id: source,
                target_id: target,
            });
        }

        let link = Link::new(source, target, request.is_breaker_link.unwrap_or(false));
        self.graph_mut().links.push(link.clone());
        self.save();

        tracing::info!(source, target, breaker = link.is_breaker_link, "link created");
        Ok(link)
    }

    pub fn reset(&mut self) {
        self.set_graph(Graph::new());
        self.save();
        tracing::info!("graph reset");
    }

    /// Normalizes `document`, or the current graph when none is given.
    ///
    /// The result becomes the current graph and is persisted only when it
    /// differs from what is already held. Returns whether it changed.
    pub fn validate(&mut self, document: Option<Value>) -> (Graph, bool) {
        let candidate = match document {
            Some(document) => normalize_document(document),
            None => normalize(self.graph().clone()),
        };
        let changed = &candidate != self.graph();
        if changed {
            self.set_graph(candidate);
            self.save();
        }
        tracing::info!(changed, "graph validated");
        (self.graph().clone(), changed)
    }
}

/// `Ok(None)` when the patch leaves the parent alone.
fn patched_parent(id: NodeId, patch: &Map<String, Value>) -> Result<Option<Option<NodeId>>> {
    match patch.get("parentId") {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(None)),
        Some(value) => match value.as_i64() {
            Some(parent_id) if parent_id == id => {
                Err(GraphError::invalid("A node cannot be its own parent"))
            }
            Some(parent_id) => Ok(Some(Some(parent_id))),
            None => Err(GraphError::invalid("parentId must be an integer or null")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::invariant_violations;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "notegraph_ops_{}_{}.json",
            name,
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    fn store_with(name: &str, document: Value) -> (GraphStore, PathBuf) {
        let path = temp_path(name);
        let mut store = GraphStore::open(&path);
        store.replace_graph(document);
        (store, path)
    }

    fn link_request(source: NodeId, target: NodeId) -> NewLink {
        NewLink {
            source: Some(source),
            target: Some(target),
            is_breaker_link: None,
        }
    }

    #[test]
    fn replace_graph_derives_children() {
        let (store, path) = store_with(
            "replace",
            json!({ "nodes": [{ "id": 1 }, { "id": 2, "parentId": 1 }], "links": [] }),
        );
        assert_eq!(store.get_node(1).unwrap().children, vec![2]);
        let on_disk: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk["nodes"][0]["children"], json!([2]));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn update_merges_fields_and_moves_node() {
        let (mut store, path) = store_with(
            "update",
            json!({
                "nodes": [{ "id": 1 }, { "id": 2 }, { "id": 3, "parentId": 1, "label": "old", "x": 4 }],
                "links": []
            }),
        );
        let node = store
            .update_node(3, json!({ "parentId": 2, "label": "new", "color": "red", "children": [1], "id": 99 }))
            .unwrap();
        assert_eq!(node.id, 3);
        assert_eq!(node.parent_id, Some(2));
        assert_eq!(node.fields.get("label"), Some(&json!("new")));
        assert_eq!(node.fields.get("x"), Some(&json!(4)));
        assert_eq!(node.fields.get("color"), Some(&json!("red")));
        assert!(node.children.is_empty());
        assert!(store.get_node(1).unwrap().children.is_empty());
        assert_eq!(store.get_node(2).unwrap().children, vec![3]);
        assert!(invariant_violations(store.graph()).is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn update_missing_node_changes_nothing() {
        let (mut store, path) = store_with("update_missing", json!({ "nodes": [{ "id": 1 }], "links": [] }));
        let before_disk = fs::read_to_string(&path).unwrap();
        let before = store.graph().clone();

        let error = store.update_node(5, json!({ "label": "x" })).unwrap_err();
        assert!(matches!(error, GraphError::NotFound(5)));
        assert_eq!(store.graph(), &before);
        assert_eq!(fs::read_to_string(&path).unwrap(), before_disk);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn update_rejects_bad_patches() {
        let (mut store, path) = store_with("update_bad", json!({ "nodes": [{ "id": 1 }], "links": [] }));
        assert!(matches!(
            store.update_node(1, json!([1, 2])),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.update_node(1, json!({ "parentId": "one" })),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(matches!(
            store.update_node(1, json!({ "parentId": 1 })),
            Err(GraphError::InvalidArgument(_))
        ));
        assert!(store.get_node(1).unwrap().is_root());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn delete_orphans_children_and_drops_links() {
        let (mut store, path) = store_with(
            "delete",
            json!({
                "nodes": [
                    { "id": 1 },
                    { "id": 2, "parentId": 1 },
                    { "id": 3, "parentId": 2 },
                    { "id": 4, "parentId": 2 }
                ],
                "links": [
                    { "source": 2, "target": 4, "isBreakerLink": false },
                    { "source": 1, "target": 3, "isBreakerLink": true },
                    { "source": 3, "target": 2, "isBreakerLink": false }
                ]
            }),
        );

        assert_eq!(store.delete_node(2), DeleteOutcome::Removed);
        let graph = store.graph();
        assert!(!graph.has_node(2));
        assert!(graph.get_node(3).unwrap().is_root());
        assert!(graph.get_node(4).unwrap().is_root());
        assert!(graph.get_node(1).unwrap().children.is_empty());
        assert_eq!(graph.links, vec![Link::new(1, 3, true)]);
        assert!(invariant_violations(graph).is_empty());

        let reloaded = GraphStore::open(&path);
        assert_eq!(reloaded.graph(), store.graph());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn delete_unknown_node_is_a_no_op() {
        let (mut store, path) = store_with("delete_missing", json!({ "nodes": [{ "id": 1 }], "links": [] }));
        let before = store.graph().clone();
        assert_eq!(store.delete_node(42), DeleteOutcome::Missing);
        assert_eq!(store.graph(), &before);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn link_creation_checks_presence_existence_and_duplicates() {
        let (mut store, path) = store_with(
            "links",
            json!({ "nodes": [{ "id": 1 }, { "id": 2 }], "links": [] }),
        );

        let link = store.create_link(link_request(1, 2)).unwrap();
        assert_eq!(link, Link::new(1, 2, false));
        assert!(matches!(
            store.create_link(link_request(1, 2)),
            Err(GraphError::Conflict { .. })
        ));
        assert!(matches!(
            store.create_link(link_request(2, 1)),
            Err(GraphError::Conflict { .. })
        ));
        assert!(matches!(
            store.create_link(link_request(1, 99)),
            Err(GraphError::NotFound(99))
        ));
        assert!(matches!(
            store.create_link(NewLink {
                source: Some(1),
                target: None,
                is_breaker_link: None,
            }),
            Err(GraphError::InvalidArgument(_))
        ));
        assert_eq!(store.graph().links.len(), 1);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn new_link_payload_decodes_breaker_flag() {
        let request =
            NewLink::from_value(json!({ "source": 3, "target": 4, "isBreakerLink": true })).unwrap();
        assert_eq!(request.is_breaker_link, Some(true));
        let request = NewLink::from_value(json!({ "target": 4 })).unwrap();
        assert_eq!(request.source, None);
        assert!(NewLink::from_value(json!({ "source": "a", "target": 4 })).is_err());
    }

    #[test]
    fn reset_empties_graph_and_document() {
        let (mut store, path) = store_with("reset", json!({ "nodes": [{ "id": 1 }], "links": [] }));
        store.reset();
        assert!(store.graph().is_empty());
        assert!(GraphStore::open(&path).graph().is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn validate_persists_only_on_change() {
        let (mut store, path) = store_with("validate", json!({ "nodes": [{ "id": 1 }], "links": [] }));
        let (graph, changed) = store.validate(None);
        assert!(!changed);
        assert_eq!(&graph, store.graph());

        let (graph, changed) = store.validate(Some(json!({
            "nodes": [{ "id": 1 }, { "id": 2, "parentId": 1 }],
            "links": [{ "source": 1, "target": 3 }]
        })));
        assert!(changed);
        assert_eq!(graph.get_node(1).unwrap().children, vec![2]);
        assert!(graph.links.is_empty());
        assert_eq!(GraphStore::open(&path).graph(), &graph);
        let _ = fs::remove_file(&path);
    }
}
