//! Multi-layer proximity graph structure.

use chitra_common::{ChitraError, Result, VectorId};
use serde::{Deserialize, Serialize};

/// One graph node: the layers it participates in and its per-layer
/// neighbor lists.
///
/// A node present at layer `l` is present at every layer below `l`;
/// `neighbors` therefore always holds `max_layer + 1` lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    max_layer: usize,
    neighbors: Vec<Vec<VectorId>>,
}

impl Node {
    fn new(max_layer: usize) -> Self {
        Self {
            max_layer,
            neighbors: vec![Vec::new(); max_layer + 1],
        }
    }

    /// Highest layer this node participates in.
    pub fn max_layer(&self) -> usize {
        self.max_layer
    }

    /// Neighbor ids at a layer, empty above `max_layer`.
    pub fn neighbors_at(&self, layer: usize) -> &[VectorId] {
        self.neighbors
            .get(layer)
            .map(|ids| ids.as_slice())
            .unwrap_or(&[])
    }

}

/// The multi-layer graph: a flat arena of nodes keyed by vector id plus
/// entry-point tracking.
///
/// Pure storage with invariant bookkeeping; the insertion and search
/// algorithms live in [`crate::builder`] and [`crate::searcher`].
#[derive(Debug, Clone, Default)]
pub struct GraphIndex {
    nodes: Vec<Node>,
    entry_point: Option<(VectorId, usize)>,
}

impl GraphIndex {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The entry point `(id, layer)`, if any node has been inserted.
    pub fn entry_point(&self) -> Option<(VectorId, usize)> {
        self.entry_point
    }

    /// Highest populated layer, 0 for an empty graph.
    pub fn max_layer(&self) -> usize {
        self.entry_point.map(|(_, layer)| layer).unwrap_or(0)
    }

    /// Maximum layer of a node, or `None` for an unknown id.
    pub fn max_layer_of(&self, id: VectorId) -> Option<usize> {
        self.nodes.get(id as usize).map(|n| n.max_layer)
    }

    /// Neighbors of a node at a layer. Empty for unknown ids or layers the
    /// node does not participate in.
    pub fn neighbors_at(&self, id: VectorId, layer: usize) -> &[VectorId] {
        self.nodes
            .get(id as usize)
            .map(|n| n.neighbors_at(layer))
            .unwrap_or(&[])
    }

    /// Replace the neighbor list of a node at a layer.
    ///
    /// Self-references and duplicates are dropped; ids above the node's
    /// maximum layer are ignored.
    pub fn set_neighbors_at(&mut self, id: VectorId, layer: usize, ids: Vec<VectorId>) {
        let Some(node) = self.nodes.get_mut(id as usize) else {
            return;
        };
        let Some(slot) = node.neighbors.get_mut(layer) else {
            return;
        };

        slot.clear();
        for neighbor in ids {
            if neighbor != id && !slot.contains(&neighbor) {
                slot.push(neighbor);
            }
        }
    }

    /// Append a single neighbor to a node's list at a layer, skipping
    /// self-references and duplicates.
    pub fn add_neighbor(&mut self, id: VectorId, layer: usize, neighbor: VectorId) {
        if neighbor == id {
            return;
        }
        let Some(node) = self.nodes.get_mut(id as usize) else {
            return;
        };
        let Some(slot) = node.neighbors.get_mut(layer) else {
            return;
        };
        if !slot.contains(&neighbor) {
            slot.push(neighbor);
        }
    }

    /// Insert a node with the given maximum layer.
    ///
    /// `id` must be the next dense id (`self.len()`); the entry point moves
    /// to the new node when its layer reaches or exceeds the current top,
    /// so ties go to the latest insertion.
    pub fn insert_node(&mut self, id: VectorId, max_layer: usize) {
        debug_assert_eq!(id as usize, self.nodes.len());
        self.nodes.push(Node::new(max_layer));

        match self.entry_point {
            Some((_, top)) if max_layer < top => {}
            _ => self.entry_point = Some((id, max_layer)),
        }
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Rebuild a graph from previously exported nodes and entry point.
    ///
    /// # Errors
    ///
    /// Returns `CorruptSnapshot` when the structure is internally
    /// inconsistent: malformed layer lists, out-of-range or self-referential
    /// neighbor ids, duplicate neighbors, or an entry point that does not
    /// sit at the highest populated layer.
    pub fn from_parts(nodes: Vec<Node>, entry_point: Option<(VectorId, usize)>) -> Result<Self> {
        for (id, node) in nodes.iter().enumerate() {
            if node.neighbors.len() != node.max_layer + 1 {
                return Err(ChitraError::CorruptSnapshot(format!(
                    "node {} has {} layer lists for max layer {}",
                    id,
                    node.neighbors.len(),
                    node.max_layer
                )));
            }
            for (layer, ids) in node.neighbors.iter().enumerate() {
                for (pos, &neighbor) in ids.iter().enumerate() {
                    if neighbor as usize >= nodes.len() {
                        return Err(ChitraError::CorruptSnapshot(format!(
                            "node {} layer {} references unknown id {}",
                            id, layer, neighbor
                        )));
                    }
                    if neighbor as usize == id {
                        return Err(ChitraError::CorruptSnapshot(format!(
                            "node {} layer {} references itself",
                            id, layer
                        )));
                    }
                    if ids[..pos].contains(&neighbor) {
                        return Err(ChitraError::CorruptSnapshot(format!(
                            "node {} layer {} has duplicate neighbor {}",
                            id, layer, neighbor
                        )));
                    }
                }
            }
        }

        match entry_point {
            None => {
                if !nodes.is_empty() {
                    return Err(ChitraError::CorruptSnapshot(
                        "entry point missing for non-empty graph".to_string(),
                    ));
                }
            }
            Some((id, layer)) => {
                let Some(entry_node) = nodes.get(id as usize) else {
                    return Err(ChitraError::CorruptSnapshot(format!(
                        "entry point references unknown id {}",
                        id
                    )));
                };
                if entry_node.max_layer != layer {
                    return Err(ChitraError::CorruptSnapshot(format!(
                        "entry point layer {} does not match node layer {}",
                        layer, entry_node.max_layer
                    )));
                }
                if nodes.iter().any(|n| n.max_layer > layer) {
                    return Err(ChitraError::CorruptSnapshot(
                        "entry point is below the highest populated layer".to_string(),
                    ));
                }
            }
        }

        Ok(Self { nodes, entry_point })
    }
}
