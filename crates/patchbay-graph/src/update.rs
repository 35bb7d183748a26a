//! Per-pass pull evaluation
//!
//! Evaluation starts at the roots and recurses into the source of every
//! incoming connection before the consuming node runs, so sources are
//! always evaluated first. Each node is visited at most once per pass.
//! A pass reports itself dirty when the flow state of any connection
//! toggled.

use crate::events::GraphEvent;
use crate::graph::Graph;
use crate::plugin::UpdateContext;
use patchbay_types::{ConnectionId, NodeId};
use std::collections::HashSet;
use tracing::trace;

/// What an input step learned about its connection
#[derive(Debug, Clone, Copy, Default)]
struct InputStep {
    dirty: bool,
    needs_update: bool,
}

impl Graph {
    /// Run one evaluation pass; returns whether anything changed
    pub fn update(&mut self, ctx: &UpdateContext) -> bool {
        let ctx = ctx.scoped(&self.variables);
        for node in self.nodes.values_mut() {
            node.update_count = 0;
        }

        let mut dirty = false;
        let roots = std::mem::take(&mut self.roots);
        for id in &roots {
            dirty |= self.update_recursive(id, &ctx);
        }
        self.roots = roots;

        let children = std::mem::take(&mut self.children);
        for id in &children {
            if self.nodes.get(id).is_some_and(|n| n.update_count == 0) {
                dirty |= self.update_recursive(id, &ctx);
            }
        }
        self.children = children;

        for node in self.nodes.values_mut() {
            node.updated = false;
        }
        dirty
    }

    fn update_recursive(&mut self, id: &NodeId, ctx: &UpdateContext) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        if node.update_count > 0 {
            return false;
        }
        node.update_count += 1;

        let mut dirty = false;
        let mut needs_update = node.inputs_changed || node.updated;
        let inputs = node.inputs.clone();

        // inactive inputs are collected before any input runs, since
        // updating one input may toggle the activeness of another
        let mut second_pass = Vec::new();
        for cid in &inputs {
            if !self.input_inactive(cid) {
                continue;
            }
            if self.connections.get(cid).is_some_and(|c| c.flow) {
                self.cascade_flow_off(cid);
                dirty = true;
            }
            second_pass.push(cid.clone());
        }

        let any_inactive = !second_pass.is_empty();
        for cid in &inputs {
            if any_inactive && (self.input_inactive(cid) || second_pass.contains(cid)) {
                continue;
            }
            let step = self.update_input(cid, ctx);
            dirty |= step.dirty;
            needs_update |= step.needs_update;
        }

        for cid in &second_pass {
            if self.input_inactive(cid) {
                continue;
            }
            self.cascade_force_update(cid);
            let step = self.update_input(cid, ctx);
            dirty |= step.dirty;
            needs_update |= step.needs_update;
        }

        let Some(node) = self.nodes.get_mut(id) else {
            return dirty;
        };
        if node.plugin.always_update() {
            node.updated |= node.plugin.update_state(ctx);
        } else if node.queued_update > 0 {
            node.plugin.update_state(ctx);
            node.updated = true;
            node.queued_update -= 1;
        } else if needs_update || (node.static_outputs.is_empty() && node.outputs.is_empty()) {
            node.updated |= node.plugin.update_state(ctx);
        } else if node.static_inputs.is_empty() && node.inputs.is_empty() {
            node.updated |= node.plugin.update_state(ctx);
        }
        node.inputs_changed = false;
        dirty
    }

    /// Evaluate the source of one connection and move its value across
    fn update_input(&mut self, cid: &ConnectionId, ctx: &UpdateContext) -> InputStep {
        let Some(conn) = self.connections.get(cid) else {
            return InputStep::default();
        };
        let (src_id, src_ref) = (conn.src_node.clone(), conn.src_slot.clone());
        let (dst_id, dst_ref) = (conn.dst_node.clone(), conn.dst_slot.clone());

        let mut step = InputStep {
            dirty: self.update_recursive(&src_id, ctx),
            needs_update: false,
        };

        let Some(src) = self.nodes.get_mut(&src_id) else {
            return step;
        };
        let Some(src_slot) = src.slot(&src_ref).cloned() else {
            return step;
        };
        // sampled unconditionally: some plugins flag themselves updated
        // while producing a value
        let value = src.plugin.update_output(&src_slot);
        let fresh = src.updated && src.plugin.query_output(&src_slot);

        if value.is_null() {
            step.dirty = false;
            return step;
        }

        if fresh {
            let Some(dst) = self.nodes.get_mut(&dst_id) else {
                return step;
            };
            let Some(dst_slot) = dst.slot(&dst_ref).cloned() else {
                return step;
            };
            let value = dst
                .plugin
                .validate_input(&dst_slot, value.coerce(src_slot.array, dst_slot.array));
            dst.input_values.insert(dst_slot.name.clone(), value.clone());
            dst.plugin.update_input(&dst_slot, value);
            dst.updated = true;
            step.needs_update = true;

            if self.set_flow(cid, true) {
                step.dirty = true;
            }
        } else if self.set_flow(cid, false) {
            step.dirty = true;
        }
        step
    }

    /// Whether the destination plugin currently ignores this connection's
    /// input
    fn input_inactive(&self, cid: &ConnectionId) -> bool {
        let Some(conn) = self.connections.get(cid) else {
            return false;
        };
        self.nodes
            .get(&conn.dst_node)
            .and_then(|node| {
                node.slot(&conn.dst_slot)
                    .map(|slot| node.plugin.input_inactive(slot))
            })
            .unwrap_or(false)
    }

    /// Turn flow off on a connection and on every flowing connection
    /// upstream of it
    fn cascade_flow_off(&mut self, cid: &ConnectionId) {
        let mut stack = vec![cid.clone()];
        while let Some(cid) = stack.pop() {
            self.set_flow(&cid, false);
            let Some(src) = self
                .connections
                .get(&cid)
                .and_then(|c| self.nodes.get(&c.src_node))
            else {
                continue;
            };
            stack.extend(
                src.inputs
                    .iter()
                    .filter(|up| self.connections.get(*up).is_some_and(|c| c.flow))
                    .cloned(),
            );
        }
    }

    /// Incoming connections of a node whose input is currently disabled
    pub(crate) fn inactive_inputs(&self, id: &NodeId) -> Vec<ConnectionId> {
        self.nodes
            .get(id)
            .map(|node| {
                node.inputs
                    .iter()
                    .filter(|cid| self.input_inactive(cid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Force the upstream of every input in `before` that is active again,
    /// so the next pass delivers its value as changed
    pub(crate) fn refresh_reactivated(&mut self, id: &NodeId, before: &[ConnectionId]) {
        let now = self.inactive_inputs(id);
        for cid in before.iter().filter(|cid| !now.contains(cid)) {
            trace!(graph = %self.uid, connection = %cid, "input reactivated");
            self.cascade_force_update(cid);
        }
    }

    /// Flag every node upstream of a connection as updated so the next
    /// input step picks up its values
    fn cascade_force_update(&mut self, cid: &ConnectionId) {
        let mut visited = HashSet::new();
        let mut stack = vec![cid.clone()];
        while let Some(cid) = stack.pop() {
            if !visited.insert(cid.clone()) {
                continue;
            }
            let Some(src_id) = self.connections.get(&cid).map(|c| c.src_node.clone()) else {
                continue;
            };
            if let Some(src) = self.nodes.get_mut(&src_id) {
                src.updated = true;
                stack.extend(src.inputs.iter().cloned());
            }
        }
    }

    /// Set the flow indicator; returns whether it changed
    fn set_flow(&mut self, cid: &ConnectionId, flow: bool) -> bool {
        let Some(conn) = self.connections.get_mut(cid) else {
            return false;
        };
        if conn.flow == flow {
            return false;
        }
        conn.flow = flow;
        trace!(graph = %self.uid, connection = %cid, flow, "flow changed");

        if self.core.config().emit_flow_events {
            self.emit(GraphEvent::FlowChanged {
                graph: self.uid.clone(),
                connection: cid.clone(),
                flow,
            });
        }
        true
    }
}
