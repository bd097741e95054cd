//! Saving and restoring learned parameters.

use crate::error::GraphError;
use crate::graph::{Graph, NodeId};
use log::info;
use std::fs;
use std::path::Path;

impl Graph {
    /// Writes every operator's learned state under `dir`, one file per node.
    ///
    /// The directory is created if missing. Stateless operators write
    /// nothing, and staged updates that were never committed are not part of
    /// what gets written.
    pub fn save_weights(&self, dir: &Path) -> Result<(), GraphError> {
        self.check_finalized("save_weights")?;
        fs::create_dir_all(dir).map_err(|e| GraphError::io(dir, e))?;
        let mut saved = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            let Some(op) = node.operator.as_deref() else {
                continue;
            };
            op.save(dir, NodeId(index))
                .map_err(|e| e.at_node(NodeId(index), "save_weights"))?;
            if op.as_adjustable().is_some() {
                saved += 1;
            }
        }
        info!("saved weights of {} nodes to {}", saved, dir.display());
        Ok(())
    }

    /// Restores state written by [`save_weights`](Graph::save_weights).
    ///
    /// Restored nodes and everything downstream of them are marked for
    /// recomputation. The graph must have the same topology it was saved
    /// with; shape disagreements are rejected per node.
    pub fn load_weights(&mut self, dir: &Path) -> Result<(), GraphError> {
        self.check_finalized("load_weights")?;
        let mut restored = Vec::new();
        for index in 0..self.nodes.len() {
            let id = NodeId(index);
            let Some(op) = self.nodes[index].operator.as_deref_mut() else {
                continue;
            };
            op.load(dir, id).map_err(|e| e.at_node(id, "load_weights"))?;
            if self.adjustable(id).is_some() {
                restored.push(id);
            }
        }
        self.cascade_stale(&restored);
        info!(
            "restored weights of {} nodes from {}",
            restored.len(),
            dir.display()
        );
        Ok(())
    }
}
