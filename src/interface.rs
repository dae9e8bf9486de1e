use std::sync::atomic::{AtomicUsize, Ordering};

use atomic_refcell::AtomicRefCell;
use basedrop::{Collector, Shared, SharedCell};
use fnv::FnvHashMap;
use smallvec::SmallVec;

use crate::error::GraphWarning;
use crate::executor::GraphExecutor;
use crate::registry::{self, NodeHandle};
use crate::ring::{ParamUpdate, Producer, SpscRing};
use crate::scheduler::build_processing_order;
use crate::snapshot::{Connection, GraphSnapshot, NodeCell, SharedNode, SnapshotEntry};
use crate::PARAM_RING_CAPACITY;

/// Stream configuration shared by both halves of the engine.
#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub channels: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            max_block_size: 512,
            channels: 2,
        }
    }
}

/// A graph operation, decoded from the external command stream by the
/// boundary layer before it reaches the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphOp {
    AddNode {
        node_id: String,
        node_type: String,
        params: Vec<(String, f32)>,
    },
    RemoveNode {
        node_id: String,
    },
    Connect {
        from_node_id: String,
        from_outlet: u32,
        to_node_id: String,
        to_inlet: u32,
    },
    Disconnect {
        from_node_id: String,
        from_outlet: u32,
        to_node_id: String,
        to_inlet: u32,
    },
    SetOutput {
        node_id: Option<String>,
    },
    UpdateParams {
        node_id: String,
        params: Vec<(String, f32)>,
    },
}

/// Message-thread half of the engine: the single owner of the
/// authoritative graph state.
///
/// Topology-bearing ops mutate the authority, then a fresh snapshot is
/// built and published through a single atomic swap; a batch publishes
/// exactly once, after its last op, so the real-time thread never observes
/// an intermediate topology. Parameter updates bypass all of that: the
/// fast path writes node atomics directly, the queued path crosses the
/// SPSC ring and is applied by the audio thread at its next block start.
pub struct GraphInterface {
    nodes: FnvHashMap<String, SharedNode>,
    node_handles: FnvHashMap<String, NodeHandle>,
    /// Node ids in insertion order; the scheduler's deterministic
    /// tie-break.
    insertion_order: Vec<String>,
    connections: Vec<Connection>,
    output_node_id: Option<String>,
    /// Input-bus index → the node id bound to it.
    input_buses: FnvHashMap<usize, String>,

    snapshot_cell: Shared<SharedCell<GraphSnapshot>>,
    param_tx: Producer<ParamUpdate>,
    collector: Collector,

    pool_grow_events: Shared<AtomicUsize>,
    seen_grow_events: usize,

    config: EngineConfig,
}

impl GraphInterface {
    /// Build a connected engine pair: the interface stays on the message
    /// thread, the executor moves to the real-time thread.
    pub fn new(config: EngineConfig) -> (GraphInterface, GraphExecutor) {
        let collector = Collector::new();
        let coll_handle = collector.handle();

        let mut initial = GraphSnapshot::empty();
        initial.sample_rate = config.sample_rate;
        let snapshot_cell = Shared::new(
            &coll_handle,
            SharedCell::new(Shared::new(&coll_handle, initial)),
        );

        let pool_grow_events = Shared::new(&coll_handle, AtomicUsize::new(0));
        let (param_tx, param_rx) = SpscRing::with_capacity(PARAM_RING_CAPACITY);

        let executor = GraphExecutor::new(
            Shared::clone(&snapshot_cell),
            param_rx,
            Shared::clone(&pool_grow_events),
            config,
        );

        (
            Self {
                nodes: FnvHashMap::default(),
                node_handles: FnvHashMap::default(),
                insertion_order: Vec::new(),
                connections: Vec::new(),
                output_node_id: None,
                input_buses: FnvHashMap::default(),
                snapshot_cell,
                param_tx,
                collector,
                pool_grow_events,
                seen_grow_events: 0,
                config,
            },
            executor,
        )
    }

    /// Apply one operation. Topology-bearing ops publish a new snapshot
    /// immediately; prefer [`apply_ops`](Self::apply_ops) for batches.
    pub fn apply_op(&mut self, op: GraphOp) -> Vec<GraphWarning> {
        self.apply_ops(std::iter::once(op))
    }

    /// Apply a batch of operations in order, rebuilding and publishing the
    /// snapshot exactly once after the last topology-bearing op.
    pub fn apply_ops(&mut self, ops: impl IntoIterator<Item = GraphOp>) -> Vec<GraphWarning> {
        let mut warnings = Vec::new();
        let mut topology_changed = false;

        for op in ops {
            match op {
                GraphOp::UpdateParams { node_id, params } => {
                    if let Err(update) = self.param_tx.push(ParamUpdate {
                        node_id,
                        params,
                    }) {
                        log::warn!("parameter queue full, dropping update for \"{}\"", update.node_id);
                        warnings.push(GraphWarning::ParamQueueFull {
                            node_id: update.node_id,
                        });
                    }
                }
                op => {
                    self.apply_topology_op(op, &mut warnings);
                    topology_changed = true;
                }
            }
        }

        if topology_changed {
            self.rebuild_and_publish(&mut warnings);
        }

        warnings
    }

    fn apply_topology_op(&mut self, op: GraphOp, warnings: &mut Vec<GraphWarning>) {
        match op {
            GraphOp::AddNode {
                node_id,
                node_type,
                params,
            } => {
                // The input tag binds a host bus instead of creating a
                // DSP node.
                if node_type == "input" {
                    let bus = params
                        .iter()
                        .find(|(name, _)| name == "channel")
                        .map(|&(_, v)| v as usize)
                        .unwrap_or(0);
                    log::debug!("bound input bus {} to \"{}\"", bus, node_id);
                    self.input_buses.insert(bus, node_id);
                    return;
                }

                let spawn = match registry::create_node(&node_type, &self.collector.handle()) {
                    Some(spawn) => spawn,
                    None => {
                        log::warn!("unknown node type \"{}\" for \"{}\"", node_type, node_id);
                        warnings.push(GraphWarning::UnknownNodeType { node_id, node_type });
                        return;
                    }
                };

                for (name, value) in &params {
                    spawn.params.set(name, *value);
                }

                let mut dsp = spawn.dsp;
                dsp.prepare(
                    self.config.sample_rate,
                    self.config.max_block_size,
                    &spawn.params,
                );
                let type_tag = dsp.type_tag();

                let node = SharedNode::new(
                    &self.collector.handle(),
                    NodeCell {
                        id: node_id.clone(),
                        type_tag,
                        params: spawn.params,
                        dsp: AtomicRefCell::new(dsp),
                    },
                );

                if self.nodes.insert(node_id.clone(), node).is_some() {
                    self.insertion_order.retain(|id| id != &node_id);
                }
                self.node_handles.insert(node_id.clone(), spawn.handle);
                log::debug!("added node \"{}\" ({})", node_id, type_tag);
                self.insertion_order.push(node_id);
            }
            GraphOp::RemoveNode { node_id } => {
                self.connections
                    .retain(|c| c.from_node_id != node_id && c.to_node_id != node_id);
                self.nodes.remove(&node_id);
                self.node_handles.remove(&node_id);
                self.insertion_order.retain(|id| id != &node_id);
                self.input_buses.retain(|_, id| id != &node_id);
                if self.output_node_id.as_deref() == Some(node_id.as_str()) {
                    self.output_node_id = None;
                }
                log::debug!("removed node \"{}\"", node_id);
            }
            GraphOp::Connect {
                from_node_id,
                from_outlet,
                to_node_id,
                to_inlet,
            } => {
                let from_exists = self.nodes.contains_key(&from_node_id)
                    || self.input_buses.values().any(|id| id == &from_node_id);
                if !from_exists || !self.nodes.contains_key(&to_node_id) {
                    log::debug!(
                        "dangling connection {} -> {} accepted but unscheduled",
                        from_node_id,
                        to_node_id
                    );
                    warnings.push(GraphWarning::DanglingConnection {
                        from: from_node_id.clone(),
                        to: to_node_id.clone(),
                    });
                }

                // A (to, inlet) pair holds at most one connection; a new
                // claim replaces the old one.
                self.connections
                    .retain(|c| !(c.to_node_id == to_node_id && c.to_inlet == to_inlet));
                self.connections.push(Connection {
                    from_node_id,
                    from_outlet,
                    to_node_id,
                    to_inlet,
                });
            }
            GraphOp::Disconnect {
                from_node_id,
                from_outlet,
                to_node_id,
                to_inlet,
            } => {
                self.connections.retain(|c| {
                    !(c.from_node_id == from_node_id
                        && c.from_outlet == from_outlet
                        && c.to_node_id == to_node_id
                        && c.to_inlet == to_inlet)
                });
            }
            GraphOp::SetOutput { node_id } => {
                self.output_node_id = node_id;
            }
            GraphOp::UpdateParams { .. } => unreachable!("handled by apply_ops"),
        }
    }

    /// Direct parameter write (fast path): lands in the node's atomic
    /// cells immediately, visible to the audio thread no later than its
    /// next block.
    pub fn set_node_param(&self, node_id: &str, name: &str, value: f32) {
        if let Some(node) = self.nodes.get(node_id) {
            node.params().set(name, value);
        }
    }

    /// Read back a node parameter, if the node exists.
    pub fn node_param(&self, node_id: &str, name: &str) -> Option<f32> {
        self.nodes.get(node_id).map(|node| node.params().get(name))
    }

    /// The readout/loader handle of a node, for meter, spectrum, and
    /// convolver nodes.
    pub fn node_handle(&self, node_id: &str) -> Option<&NodeHandle> {
        self.node_handles.get(node_id)
    }

    /// Re-prepare every node for a new sample rate and republish. Only
    /// call while the host has processing stopped.
    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.config.sample_rate = sample_rate;
        for node in self.nodes.values() {
            node.borrow_dsp_mut().prepare(
                sample_rate,
                self.config.max_block_size,
                node.params(),
            );
        }
        let mut warnings = Vec::new();
        self.rebuild_and_publish(&mut warnings);
    }

    /// Drive deferred reclamation: frees nodes and snapshots the audio
    /// thread no longer references, and surfaces audio-thread diagnostics.
    /// Call periodically from the message thread.
    pub fn collect(&mut self) {
        let grow_events = self.pool_grow_events.load(Ordering::Relaxed);
        if grow_events > self.seen_grow_events {
            log::error!(
                "buffer pool grew {} time(s) on the audio thread; size the pool to the graph",
                grow_events - self.seen_grow_events
            );
            self.seen_grow_events = grow_events;
        }

        self.collector.collect();
    }

    fn rebuild_and_publish(&mut self, warnings: &mut Vec<GraphWarning>) {
        let (order, omitted) =
            build_processing_order(&self.insertion_order, &self.nodes, &self.connections);
        if omitted > 0 {
            log::warn!("{} node(s) in a cycle omitted from the processing order", omitted);
            warnings.push(GraphWarning::CycleDetected {
                omitted_nodes: omitted,
            });
        }

        // Input buses first, then scheduled nodes: the position in this
        // numbering is the per-block buffer table index.
        let mut input_buses: Vec<(usize, String)> = self
            .input_buses
            .iter()
            .map(|(&bus, id)| (bus, id.clone()))
            .collect();
        input_buses.sort_by_key(|&(bus, _)| bus);

        let mut source_of: FnvHashMap<&str, usize> = FnvHashMap::default();
        for (position, (_, id)) in input_buses.iter().enumerate() {
            source_of.insert(id.as_str(), position);
        }
        for (position, id) in order.iter().enumerate() {
            source_of.insert(id.as_str(), input_buses.len() + position);
        }

        let entries: Vec<SnapshotEntry> = order
            .iter()
            .enumerate()
            .map(|(position, id)| {
                let mut inputs: SmallVec<[Option<usize>; crate::snapshot::INLETS_INLINE]> =
                    SmallVec::new();
                for conn in &self.connections {
                    if &conn.to_node_id != id {
                        continue;
                    }
                    if let Some(&source) = source_of.get(conn.from_node_id.as_str()) {
                        let inlet = conn.to_inlet as usize;
                        if inputs.len() <= inlet {
                            inputs.resize(inlet + 1, None);
                        }
                        inputs[inlet] = Some(source);
                    }
                }
                SnapshotEntry {
                    node: self.nodes[id].clone(),
                    source: input_buses.len() + position,
                    inputs,
                }
            })
            .collect();

        let output_designated = self.output_node_id.is_some();
        let output_source = self
            .output_node_id
            .as_deref()
            .and_then(|id| source_of.get(id).copied());

        let lookup = self
            .nodes
            .iter()
            .map(|(id, node)| (id.clone(), node.clone()))
            .collect();

        let n_sources = input_buses.len() + entries.len();
        let snapshot = GraphSnapshot {
            entries,
            input_buses,
            output_source,
            output_designated,
            lookup,
            n_sources,
            sample_rate: self.config.sample_rate,
        };

        // The single release store the audio thread pairs with its
        // acquire load at block start.
        self.snapshot_cell
            .set(Shared::new(&self.collector.handle(), snapshot));
    }
}
