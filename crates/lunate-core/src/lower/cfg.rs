//! Control-flow graph construction over lowered function bodies.
//!
//! The graph is derived from the IR the lowerer has just written, so it sees
//! desugared control flow (switch chains, break scopes, protected calls)
//! exactly as the emitter will.

use lunate_ir::{BlockId, BlockKind, ControlFlowGraph, IrBuilder, NodeId, NodeKind};

/// Where `break` and `continue` go inside the innermost breakable construct.
#[derive(Debug, Clone)]
struct Targets {
    break_to: BlockId,
    continue_to: Option<BlockId>,
}

pub(super) struct CfgBuilder<'b> {
    builder: &'b mut IrBuilder,
    graph: ControlFlowGraph,
    /// `None` after a jump: the next statement opens an unreachable block.
    current: Option<BlockId>,
    targets: Vec<Targets>,
}

impl<'b> CfgBuilder<'b> {
    pub(super) fn build(builder: &'b mut IrBuilder, body: &NodeId) -> ControlFlowGraph {
        let entry = builder.fresh_block_id();
        let exit = builder.fresh_block_id();
        let mut this = CfgBuilder {
            builder,
            graph: ControlFlowGraph::new(entry.clone(), exit),
            current: Some(entry),
            targets: Vec::new(),
        };
        this.statement(body);
        if let Some(last) = this.current.take() {
            let exit = this.graph.exit.clone();
            this.graph.add_edge(&last, &exit);
        }
        this.graph
    }

    fn new_block(&mut self) -> BlockId {
        let id = self.builder.fresh_block_id();
        self.graph.add_block(id.clone(), BlockKind::Normal);
        id
    }

    fn current(&mut self) -> BlockId {
        match &self.current {
            Some(block) => block.clone(),
            None => {
                let block = self.new_block();
                self.current = Some(block.clone());
                block
            }
        }
    }

    fn place(&mut self, id: &NodeId) -> BlockId {
        let block = self.current();
        self.graph.push_statement(&block, id.clone());
        block
    }

    fn jump(&mut self, from: &BlockId, to: &BlockId) {
        self.graph.add_edge(from, to);
        self.current = None;
    }

    fn continue_target(&self) -> Option<BlockId> {
        self.targets.iter().rev().find_map(|t| t.continue_to.clone())
    }

    fn statement(&mut self, id: &NodeId) {
        let Some(kind) = self.builder.node(id).map(|n| n.kind.clone()) else {
            return;
        };

        match kind {
            NodeKind::BlockStatement { body } => body.iter().for_each(|s| self.statement(s)),

            NodeKind::IfStatement {
                consequent,
                alternate,
                ..
            } => {
                let fork = self.place(id);
                let mut ends = Vec::new();

                let then_block = self.new_block();
                self.graph.add_edge(&fork, &then_block);
                self.current = Some(then_block);
                self.statement(&consequent);
                ends.extend(self.current.take());

                match alternate {
                    Some(alternate) => {
                        let else_block = self.new_block();
                        self.graph.add_edge(&fork, &else_block);
                        self.current = Some(else_block);
                        self.statement(&alternate);
                        ends.extend(self.current.take());
                    }
                    None => ends.push(fork),
                }

                if !ends.is_empty() {
                    let join = self.new_block();
                    for end in &ends {
                        self.graph.add_edge(end, &join);
                    }
                    self.current = Some(join);
                }
            }

            NodeKind::WhileStatement { body, .. } | NodeKind::ForEachStatement { body, .. } => {
                let before = self.current();
                let header = self.new_block();
                self.graph.add_edge(&before, &header);
                self.graph.push_statement(&header, id.clone());
                let after = self.new_block();
                self.graph.add_edge(&header, &after);
                self.loop_body(&header, &header, &after, &body);
                self.current = Some(after);
            }

            NodeKind::DoWhileStatement { body, .. } => {
                let before = self.current();
                let first = self.new_block();
                self.graph.add_edge(&before, &first);
                let test = self.new_block();
                let after = self.new_block();
                self.loop_body(&first, &test, &after, &body);
                self.graph.push_statement(&test, id.clone());
                self.graph.add_edge(&test, &first);
                self.graph.add_edge(&test, &after);
                self.current = Some(after);
            }

            NodeKind::BreakScope { body } => {
                self.place(id);
                let after = self.new_block();
                let continue_to = self.continue_target();
                self.targets.push(Targets {
                    break_to: after.clone(),
                    continue_to,
                });
                self.statement(&body);
                self.targets.pop();
                if let Some(end) = self.current.take() {
                    self.graph.add_edge(&end, &after);
                }
                self.current = Some(after);
            }

            NodeKind::BreakStatement => {
                let from = self.place(id);
                let to = match self.targets.last() {
                    Some(t) => t.break_to.clone(),
                    None => self.graph.exit.clone(),
                };
                self.jump(&from, &to);
            }

            NodeKind::ContinueStatement => {
                let from = self.place(id);
                let to = self
                    .continue_target()
                    .unwrap_or_else(|| self.graph.exit.clone());
                self.jump(&from, &to);
            }

            NodeKind::ReturnStatement { .. } | NodeKind::ThrowStatement { .. } => {
                let from = self.place(id);
                let exit = self.graph.exit.clone();
                self.jump(&from, &exit);
            }

            _ => {
                self.place(id);
            }
        }
    }

    /// Walk a loop body starting in `first`, with `continue` going to
    /// `latch` and `break` to `after`. A body that falls through loops back
    /// to `latch`.
    fn loop_body(&mut self, first: &BlockId, latch: &BlockId, after: &BlockId, body: &NodeId) {
        let entry = if first == latch {
            let entry = self.new_block();
            self.graph.add_edge(latch, &entry);
            entry
        } else {
            first.clone()
        };

        self.targets.push(Targets {
            break_to: after.clone(),
            continue_to: Some(latch.clone()),
        });
        self.current = Some(entry);
        self.statement(body);
        self.targets.pop();

        if let Some(end) = self.current.take() {
            self.graph.add_edge(&end, latch);
        }
    }
}
