use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub type NodeId = i64;

/// A note on the canvas.
///
/// `parent_id` is the source of truth for the hierarchy; `children` is a
/// cache rebuilt by [`crate::normalize::normalize`] and never read back from
/// client input. Everything else the editor stores (label, position, text)
/// lives in `fields` and round-trips untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    #[serde(default, deserialize_with = "lenient_parent_id")]
    pub parent_id: Option<NodeId>,
    #[serde(default)]
    pub children: Vec<NodeId>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Node {
    #[cfg(test)]
    pub fn new(id: NodeId) -> Self {
        Node {
            id,
            parent_id: None,
            children: Vec::new(),
            fields: Map::new(),
        }
    }

    #[cfg(test)]
    pub fn with_parent(id: NodeId, parent_id: NodeId) -> Self {
        Node {
            parent_id: Some(parent_id),
            ..Node::new(id)
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub is_breaker_link: bool,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Link {
    pub fn new(source: NodeId, target: NodeId, is_breaker_link: bool) -> Self {
        Link {
            source,
            target,
            is_breaker_link,
            fields: Map::new(),
        }
    }

    /// Links are undirected for equality: `a-b` and `b-a` are the same pair.
    pub fn connects(&self, a: NodeId, b: NodeId) -> bool {
        (self.source == a && self.target == b) || (self.source == b && self.target == a)
    }

    pub fn touches(&self, id: NodeId) -> bool {
        self.source == id || self.target == id
    }
}

/// Anything but a JSON boolean reads as `false`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_bool().unwrap_or(false))
}

/// Accepts integers, integral floats and numeric strings. Any other value
/// cannot name a node and is read as no parent.
fn lenient_parent_id<'de, D>(deserializer: D) -> Result<Option<NodeId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let parent_id = match &value {
        Value::Null => return Ok(None),
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(text) => text.trim().parse::<NodeId>().ok(),
        _ => None,
    };
    if parent_id.is_none() {
        tracing::warn!(parent_id = %value, "unusable parentId, treating node as root");
    }
    Ok(parent_id)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub links: Vec<Link>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }

    pub fn has_node(&self, id: NodeId) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    pub fn get_node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn get_node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    pub fn has_link(&self, a: NodeId, b: NodeId) -> bool {
        self.links.iter().any(|link| link.connects(a, b))
    }
}
