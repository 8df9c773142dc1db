use serde_json::{Value, json};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;

struct Lcg {
    state: u64,
}

impl Lcg {
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(6364136223846793005).wrapping_add(1);
        (self.state >> 32) as u32
    }

    fn gen_range(&mut self, max: u32) -> u32 {
        if max == 0 { 0 } else { self.next_u32() % max }
    }
}

struct SeedNode {
    id: i64,
    parent_id: Option<i64>,
    children: Vec<i64>,
    x: i64,
    y: i64,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let data_path =
        env::var("NOTEGRAPH_DATA_PATH").unwrap_or_else(|_| "graph_data.json".to_string());
    let reset = env::var("SEED_RESET").ok().as_deref() == Some("true");
    if Path::new(&data_path).exists() && !reset {
        return Err(format!("{data_path} already exists; set SEED_RESET=true to overwrite").into());
    }

    let num_roots = env::var("SEED_ROOTS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(5);
    let num_children = env::var("SEED_CHILDREN")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(4);
    let num_links = env::var("SEED_LINKS")
        .ok()
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(6);
    let rng_seed = env::var("SEED_RANDOM")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(42);

    let mut rng = Lcg::new(rng_seed);
    let nodes = seed_nodes(num_roots, num_children, &mut rng);
    let links = seed_links(&nodes, num_links, &mut rng);

    let document = json!({
        "nodes": nodes.into_iter().map(node_json).collect::<Vec<_>>(),
        "links": links,
    });
    fs::write(&data_path, serde_json::to_string_pretty(&document)?)?;

    println!(
        "Seeded {} roots, {} children per root, {} links into {}",
        num_roots,
        num_children,
        document["links"].as_array().map_or(0, Vec::len),
        data_path
    );
    Ok(())
}

fn seed_nodes(num_roots: u32, num_children: u32, rng: &mut Lcg) -> Vec<SeedNode> {
    let mut nodes: Vec<SeedNode> = Vec::new();
    let mut next_id: i64 = 1;

    for root_idx in 0..num_roots {
        let root_x = 300 * i64::from(root_idx);
        let root_pos = nodes.len();
        nodes.push(SeedNode {
            id: next_id,
            parent_id: None,
            children: Vec::new(),
            x: root_x,
            y: 0,
        });
        let root_id = next_id;
        next_id += 1;

        for child_idx in 0..num_children {
            let jitter = i64::from(rng.gen_range(80)) - 40;
            nodes.push(SeedNode {
                id: next_id,
                parent_id: Some(root_id),
                children: Vec::new(),
                x: root_x + jitter,
                y: 120 * (i64::from(child_idx) + 1),
            });
            nodes[root_pos].children.push(next_id);
            next_id += 1;
        }
    }

    nodes
}

fn seed_links(nodes: &[SeedNode], num_links: u32, rng: &mut Lcg) -> Vec<Value> {
    let mut links = Vec::new();
    if nodes.len() < 2 {
        return links;
    }
    let mut chosen = HashSet::new();
    let len = nodes.len() as u32;
    // Never ask for more links than there are distinct pairs.
    let pairs = u64::from(len) * u64::from(len - 1) / 2;
    let wanted = u64::from(num_links).min(pairs);
    let mut attempts: u64 = 0;
    while (chosen.len() as u64) < wanted && attempts < wanted.saturating_mul(20) {
        attempts += 1;
        let a = nodes[rng.gen_range(len) as usize].id;
        let b = nodes[rng.gen_range(len) as usize].id;
        if a == b || !chosen.insert((a.min(b), a.max(b))) {
            continue;
        }
        links.push(json!({
            "source": a,
            "target": b,
            "isBreakerLink": rng.gen_range(4) == 0,
        }));
    }
    links
}

fn node_json(node: SeedNode) -> Value {
    json!({
        "id": node.id,
        "parentId": node.parent_id,
        "children": node.children,
        "label": format!("Note {}", node.id),
        "text": "",
        "x": node.x,
        "y": node.y,
    })
}
