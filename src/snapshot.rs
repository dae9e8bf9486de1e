use atomic_refcell::{AtomicRefCell, AtomicRefMut};
use basedrop::{Handle, Shared};
use fnv::FnvHashMap;
use smallvec::SmallVec;

use crate::node::AudioGraphNode;
use crate::param::ParamSet;

/// Inline capacity for per-node inlet tables. The widest catalogue node
/// has two inlets; anything past this spills to the heap on the message
/// thread only.
pub(crate) const INLETS_INLINE: usize = 4;

/// A directed edge in the graph: `from`'s outlet feeds `to`'s inlet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub from_node_id: String,
    pub from_outlet: u32,
    pub to_node_id: String,
    pub to_inlet: u32,
}

/// One node as both threads see it.
///
/// The parameter set is atomic and freely shared; the DSP state sits in an
/// `AtomicRefCell` that only the real-time thread borrows while the node is
/// visible to a published snapshot (the message thread borrows it solely
/// for `prepare`, before publication or with processing stopped).
pub(crate) struct NodeCell {
    pub id: String,
    pub type_tag: &'static str,
    pub params: ParamSet,
    pub dsp: AtomicRefCell<Box<dyn AudioGraphNode>>,
}

/// Reference-counted handle to a [`NodeCell`].
///
/// Snapshots hold clones of these, so a node removed from the authority
/// stays alive until the last snapshot referencing it is dropped and the
/// collector reclaims it on the message thread. The real-time thread never
/// frees a node.
pub(crate) struct SharedNode {
    cell: Shared<NodeCell>,
}

impl SharedNode {
    pub fn new(coll_handle: &Handle, cell: NodeCell) -> Self {
        Self {
            cell: Shared::new(coll_handle, cell),
        }
    }

    #[inline]
    pub fn params(&self) -> &ParamSet {
        &self.cell.params
    }

    /// Borrow the DSP state mutably.
    ///
    /// This does not panic because each node appears at most once in a
    /// snapshot's processing order and the real-time thread is the only
    /// place this is borrowed during processing.
    #[inline]
    pub fn borrow_dsp_mut(&self) -> AtomicRefMut<'_, Box<dyn AudioGraphNode>> {
        AtomicRefCell::borrow_mut(&self.cell.dsp)
    }
}

impl Clone for SharedNode {
    fn clone(&self) -> Self {
        Self {
            cell: Shared::clone(&self.cell),
        }
    }
}

impl std::fmt::Debug for SharedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.cell.type_tag, self.cell.id)
    }
}

/// One scheduled node in a snapshot, with its inlet wiring resolved to
/// *source indices*: per-block buffer slots numbered so that input buses
/// come first, then scheduled nodes in processing order.
pub(crate) struct SnapshotEntry {
    pub node: SharedNode,
    /// This node's own source index.
    pub source: usize,
    /// Inlet → upstream source index; `None` is an unwired inlet.
    pub inputs: SmallVec<[Option<usize>; INLETS_INLINE]>,
}

/// Immutable view of the graph, built on the message thread and published
/// atomically. The real-time thread reads one snapshot per block and never
/// observes a partially applied batch of operations.
pub(crate) struct GraphSnapshot {
    /// Scheduled (non-input) nodes in topological order. The canonical
    /// connection list is baked into each entry's resolved inlet table,
    /// which is the same information in the form the block loop consumes.
    pub entries: Vec<SnapshotEntry>,
    /// Input-bus bindings, sorted by bus index. The position in this list
    /// is the binding's source index.
    pub input_buses: Vec<(usize, String)>,
    /// Source index of the designated output, if it resolved.
    pub output_source: Option<usize>,
    /// Whether an output node is designated at all (even if unresolved):
    /// an unresolvable designated output renders silence, while a snapshot
    /// with no state at all leaves the host buffer untouched.
    pub output_designated: bool,
    /// Node-id lookup for draining queued parameter updates.
    pub lookup: FnvHashMap<String, SharedNode>,
    /// Total number of sources (input buses + scheduled nodes).
    pub n_sources: usize,
    /// The sample rate every node in this snapshot was prepared for.
    pub sample_rate: f64,
}

impl GraphSnapshot {
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            input_buses: Vec::new(),
            output_source: None,
            output_designated: false,
            lookup: FnvHashMap::default(),
            n_sources: 0,
            sample_rate: 44_100.0,
        }
    }

    /// True for the pristine snapshot of a graph nothing has been added
    /// to. The block processor passes audio through untouched in this
    /// state.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
            && self.input_buses.is_empty()
            && !self.output_designated
            && self.lookup.is_empty()
    }
}
