//! Per-function control-flow graphs.

use crate::ids::{BlockId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockKind {
    Entry,
    Normal,
    Exit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub kind: BlockKind,
    pub statements: Vec<NodeId>,
}

/// Basic blocks plus mirrored successor/predecessor adjacency.
///
/// Edges are only added through [`ControlFlowGraph::add_edge`], which keeps
/// both maps in sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlFlowGraph {
    pub entry: BlockId,
    pub exit: BlockId,
    pub blocks: Vec<BasicBlock>,
    pub successors: BTreeMap<BlockId, Vec<BlockId>>,
    pub predecessors: BTreeMap<BlockId, Vec<BlockId>>,
}

impl ControlFlowGraph {
    /// Create a graph holding only its entry and exit blocks.
    pub fn new(entry: BlockId, exit: BlockId) -> Self {
        let mut cfg = Self {
            entry: entry.clone(),
            exit: exit.clone(),
            blocks: Vec::new(),
            successors: BTreeMap::new(),
            predecessors: BTreeMap::new(),
        };
        cfg.add_block(entry, BlockKind::Entry);
        cfg.add_block(exit, BlockKind::Exit);
        cfg
    }

    pub fn add_block(&mut self, id: BlockId, kind: BlockKind) {
        self.successors.entry(id.clone()).or_default();
        self.predecessors.entry(id.clone()).or_default();
        self.blocks.push(BasicBlock {
            id,
            kind,
            statements: Vec::new(),
        });
    }

    pub fn block(&self, id: &BlockId) -> Option<&BasicBlock> {
        self.blocks.iter().find(|b| &b.id == id)
    }

    pub fn push_statement(&mut self, block: &BlockId, statement: NodeId) {
        if let Some(b) = self.blocks.iter_mut().find(|b| &b.id == block) {
            b.statements.push(statement);
        }
    }

    /// Add `from -> to`, ignoring duplicates.
    pub fn add_edge(&mut self, from: &BlockId, to: &BlockId) {
        let succ = self.successors.entry(from.clone()).or_default();
        if succ.contains(to) {
            return;
        }
        succ.push(to.clone());
        self.predecessors
            .entry(to.clone())
            .or_default()
            .push(from.clone());
    }

    pub fn successors_of(&self, id: &BlockId) -> &[BlockId] {
        self.successors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn predecessors_of(&self, id: &BlockId) -> &[BlockId] {
        self.predecessors.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Blocks reachable from the entry block, in discovery order.
    pub fn reachable(&self) -> Vec<BlockId> {
        let mut seen = vec![self.entry.clone()];
        let mut idx = 0;
        while idx < seen.len() {
            let current = seen[idx].clone();
            for next in self.successors_of(&current) {
                if !seen.contains(next) {
                    seen.push(next.clone());
                }
            }
            idx += 1;
        }
        seen
    }
}
