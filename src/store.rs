use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{GraphError, Result};
use crate::graph::Graph;
use crate::normalize::{invariant_violations, normalize_document};

/// The in-memory graph plus the JSON document that backs it.
///
/// The in-memory copy is authoritative: a failed write is logged and the
/// graph keeps serving requests.
#[derive(Debug)]
pub struct GraphStore {
    path: PathBuf,
    graph: Graph,
}

impl GraphStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let graph = load(&path);
        tracing::info!(
            path = %path.display(),
            nodes = graph.nodes.len(),
            roots = graph.nodes.iter().filter(|node| node.is_root()).count(),
            links = graph.links.len(),
            "graph loaded"
        );
        GraphStore { path, graph }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub(crate) fn set_graph(&mut self, graph: Graph) {
        self.graph = graph;
    }

    /// Writes the whole graph over the backing document.
    pub fn save(&self) -> bool {
        debug_assert!(
            invariant_violations(&self.graph).is_empty(),
            "persisting a graph that violates its invariants"
        );
        match write_document(&self.path, &self.graph) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "graph persisted");
                true
            }
            Err(error) => {
                tracing::error!(%error, "graph not persisted; keeping in-memory state");
                false
            }
        }
    }
}

/// Reads and normalizes the document at `path`.
///
/// A missing, unreadable or malformed document yields the empty graph.
pub fn load(path: &Path) -> Graph {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no graph document yet, starting empty");
            return Graph::new();
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to read graph document");
            return Graph::new();
        }
    };

    match serde_json::from_str::<Value>(&contents) {
        Ok(document) => normalize_document(document),
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "graph document is not valid JSON");
            Graph::new()
        }
    }
}

pub fn write_document(path: &Path, graph: &Graph) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(graph)?;
    bytes.push(b'\n');
    write_atomic(path, &bytes).map_err(|source| GraphError::Persistence {
        path: path.to_path_buf(),
        source,
    })
}

fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    let result = write_and_rename(&tmp, path, bytes);
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

fn write_and_rename(tmp: &Path, path: &Path, bytes: &[u8]) -> io::Result<()> {
    {
        let mut file = fs::File::create(tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(tmp, path)
}
