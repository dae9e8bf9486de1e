use std::sync::atomic::AtomicUsize;

use atomic_refcell::AtomicRef;
use basedrop::{Shared, SharedCell};
use smallvec::SmallVec;

use crate::buffer::BlockBuffer;
use crate::interface::EngineConfig;
use crate::midi::{MidiEvent, Transport};
use crate::node::{NodeInputs, ProcInfo};
use crate::pool::BufferPool;
use crate::ring::{Consumer, ParamUpdate};
use crate::snapshot::GraphSnapshot;

/// Inline capacity for the per-node inlet guard list on the hot path.
const INLET_GUARDS_INLINE: usize = 8;

/// Real-time half of the engine: turns one host callback into one pass of
/// the graph.
///
/// `process_block` performs no locking, no syscalls, and no allocation in
/// the steady state: the buffer pool, the wiring scratch table, and every
/// node's DSP state are pre-allocated, and cross-thread traffic is limited
/// to one acquire load of the snapshot cell plus the wait-free ring drain.
pub struct GraphExecutor {
    snapshot_cell: Shared<SharedCell<GraphSnapshot>>,
    param_rx: Consumer<ParamUpdate>,
    pool: BufferPool,

    /// Per-block buffer table: source index → pool slot, reused across
    /// blocks. It only reallocates when a published snapshot grows past
    /// every previous one.
    source_slots: Vec<Option<usize>>,

    max_block_size: usize,
}

impl GraphExecutor {
    pub(crate) fn new(
        snapshot_cell: Shared<SharedCell<GraphSnapshot>>,
        param_rx: Consumer<ParamUpdate>,
        pool_grow_events: Shared<AtomicUsize>,
        config: EngineConfig,
    ) -> Self {
        Self {
            snapshot_cell,
            param_rx,
            pool: BufferPool::new(config.channels, config.max_block_size, pool_grow_events),
            source_slots: Vec::with_capacity(64),
            max_block_size: config.max_block_size,
        }
    }

    /// Re-allocate the pool for a new stream shape. Not real-time safe;
    /// only call while the host has processing stopped.
    pub fn prepare(&mut self, channels: usize, max_block_size: usize) {
        self.max_block_size = max_block_size;
        self.pool.prepare(channels, max_block_size);
    }

    /// Process one host block in place.
    ///
    /// `io` carries the main input on entry and the graph's output on
    /// return; `aux_inputs[i]` backs input bus `i + 1` (sidechain etc.).
    /// MIDI events must be sorted by frame offset.
    pub fn process_block(
        &mut self,
        io: &mut BlockBuffer,
        frames: usize,
        aux_inputs: &[&BlockBuffer],
        midi: &[MidiEvent],
        transport: Transport,
    ) {
        let frames = frames.min(io.capacity()).min(self.max_block_size);

        let snapshot = self.snapshot_cell.get();

        // Queued parameter updates land before any node processes, in the
        // same block they were drained in.
        while let Some(update) = self.param_rx.pop() {
            if let Some(node) = snapshot.lookup.get(&update.node_id) {
                for (name, value) in &update.params {
                    node.params().set(name, *value);
                }
            }
        }

        // A graph nothing was ever added to leaves the host buffer alone
        // (plug-in passthrough); everything past this point either renders
        // the designated output or silences the block.
        if snapshot.is_empty() {
            return;
        }

        self.pool.reset_all();
        self.source_slots.clear();
        self.source_slots.resize(snapshot.n_sources, None);

        // Stage each bound host bus into a pool slot keyed by its binding.
        for (position, &(bus, _)) in snapshot.input_buses.iter().enumerate() {
            let host_buffer: Option<&BlockBuffer> = if bus == 0 {
                Some(&*io)
            } else {
                aux_inputs.get(bus - 1).copied()
            };
            if let Some(src) = host_buffer {
                let slot = self.pool.acquire();
                self.pool.slot(slot).borrow_mut().copy_from(src, frames);
                self.source_slots[position] = Some(slot);
            }
        }

        let info = ProcInfo::new(snapshot.sample_rate, frames, midi, transport);

        for entry in &snapshot.entries {
            let out_slot = self.pool.acquire();
            self.source_slots[entry.source] = Some(out_slot);

            // Resolve this node's inlets to the buffers upstream producers
            // wrote. Every source referenced here ran earlier in the
            // topological order, so its slot is already assigned.
            let guards: SmallVec<[Option<AtomicRef<BlockBuffer>>; INLET_GUARDS_INLINE]> = entry
                .inputs
                .iter()
                .map(|input| {
                    input
                        .and_then(|source| self.source_slots[source])
                        .map(|slot| self.pool.slot(slot).borrow())
                })
                .collect();
            let inputs = NodeInputs::new(&guards);

            // Borrowing the output mutably cannot panic: `out_slot` was
            // free a moment ago, so no input guard aliases it.
            let mut output = self.pool.slot(out_slot).borrow_mut();

            let mut dsp = entry.node.borrow_dsp_mut();
            if entry.node.params().bypassed() {
                dsp.process_bypass(frames, &inputs, &mut output);
            } else {
                dsp.process(&info, entry.node.params(), &inputs, &mut output);
            }
        }

        // Deliver the designated output, clamped to the host channel
        // count. A designated-but-unresolved output (cycle, missing node)
        // and an undesignated output both render silence.
        let resolved = snapshot
            .output_source
            .and_then(|source| self.source_slots[source]);
        match resolved {
            Some(slot) if snapshot.output_designated => {
                let out = self.pool.slot(slot).borrow();
                for ch in 0..io.channels().min(out.channels()) {
                    io.copy_channel_from(ch, &out, ch, frames);
                }
            }
            _ => io.clear_frames(frames),
        }
    }
}
