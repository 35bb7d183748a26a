//! Loading and playing patch documents

use crate::config::PlayerConfig;
use anyhow::{bail, Context};
use patchbay_graph::prelude::*;
use patchbay_graph::LoadReport;
use patchbay_plugins::PluginLibrary;
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A loaded patch and its clock
pub(crate) struct Player {
    graph: Graph,
    ctx: UpdateContext,
    flow_changes: Arc<AtomicUsize>,
}

/// Outcome of [`Player::run`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct RunSummary {
    pub(crate) frames: u64,
    /// Frames whose pass reported a change
    pub(crate) dirty_frames: u64,
    /// Flow toggles seen, when flow events are enabled
    pub(crate) flow_changes: usize,
    pub(crate) abs_t: f64,
}

/// Structure of a loaded patch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct Inspection {
    pub(crate) graph: String,
    pub(crate) nodes: usize,
    pub(crate) connections: usize,
    pub(crate) roots: Vec<String>,
    pub(crate) children: Vec<String>,
    pub(crate) variables: Vec<String>,
    pub(crate) cyclic: bool,
    pub(crate) evaluation_order: Option<Vec<String>>,
    pub(crate) issues: Vec<String>,
}

/// Read a patch file with the built-in plugin library
pub(crate) fn load_patch(path: &Path, config: &PlayerConfig) -> anyhow::Result<(Graph, LoadReport)> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading patch {}", path.display()))?;
    let core = Core::with_config(PluginLibrary::with_defaults(), config.core.clone());
    let (graph, report) = Graph::from_json(&text, &core)
        .with_context(|| format!("loading patch {}", path.display()))?;
    for issue in &report.issues {
        warn!(patch = %path.display(), %issue, "recovered while loading");
    }
    Ok((graph, report))
}

impl Player {
    /// Wrap a loaded graph; the clock starts at zero
    pub(crate) fn new(graph: Graph, config: &PlayerConfig) -> Self {
        let flow_changes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&flow_changes);
        graph.core().events().subscribe(Arc::new(move |event: &GraphEvent| {
            if matches!(event, GraphEvent::FlowChanged { .. }) {
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }));
        Self {
            graph,
            ctx: UpdateContext::new(0.0, config.delta_t, 0),
            flow_changes,
        }
    }

    /// The patch being played
    pub(crate) fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Evaluate `frames` passes `delta_t` seconds apart
    pub(crate) fn run(&mut self, frames: u64, delta_t: f64) -> anyhow::Result<RunSummary> {
        if !delta_t.is_finite() || delta_t < 0.0 {
            bail!("frame interval must be a non-negative number of seconds, got {delta_t}");
        }

        self.graph.play();
        let mut dirty_frames = 0;
        for _ in 0..frames {
            let dirty = self.graph.update(&self.ctx);
            debug!(frame = self.ctx.frame, t = self.ctx.abs_t, dirty, "frame");
            if dirty {
                dirty_frames += 1;
            }
            self.ctx.advance(delta_t);
        }
        self.graph.stop();

        let summary = RunSummary {
            frames,
            dirty_frames,
            flow_changes: self.flow_changes.load(Ordering::Relaxed),
            abs_t: self.ctx.abs_t,
        };
        info!(frames, dirty_frames, "playback finished");
        Ok(summary)
    }
}

/// Describe a graph's structure
pub(crate) fn inspect(graph: &Graph, report: &LoadReport) -> Inspection {
    let names = |ids: &[NodeId]| ids.iter().map(ToString::to_string).collect::<Vec<_>>();
    let mut variables = graph.variables().names();
    variables.sort();
    Inspection {
        graph: graph.uid().to_string(),
        nodes: graph.node_count(),
        connections: graph.connection_count(),
        roots: names(graph.roots()),
        children: names(graph.children()),
        variables,
        cyclic: graph.is_cyclic(),
        evaluation_order: graph.evaluation_order().map(|order| names(&order)),
        issues: report.issues.iter().map(ToString::to_string).collect(),
    }
}

/// Save, reload and save again; `Ok(false)` when the two saves differ
pub(crate) fn round_trip(graph: &Graph) -> anyhow::Result<bool> {
    let first = graph.to_json().context("saving patch")?;
    let (reloaded, report) = Graph::from_json(&first, graph.core()).context("reloading patch")?;
    if !report.is_clean() {
        warn!(issues = report.issues.len(), "saved patch did not reload cleanly");
    }
    let second = reloaded.to_json().context("saving reloaded patch")?;
    Ok(first == second)
}
