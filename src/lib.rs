//! Real-time audio DSP node graph.
//!
//! The engine is split in two: a [`GraphInterface`] owned by the message
//! thread that applies graph operations and publishes immutable topology
//! snapshots, and a [`GraphExecutor`] owned by the real-time thread that
//! renders one block per host callback without locking or allocating.

mod buffer;
mod error;
mod executor;
mod interface;
mod midi;
mod param;
mod pool;
mod registry;
mod ring;
mod scheduler;
mod snapshot;

pub mod node;

pub use buffer::BlockBuffer;
pub use error::GraphWarning;
pub use executor::GraphExecutor;
pub use interface::{EngineConfig, GraphInterface, GraphOp};
pub use midi::{note_to_frequency, MidiEvent, MidiMessage, Transport};
pub use node::convolver::ConvolverHandle;
pub use node::meter::MeterHandle;
pub use node::spectrum::SpectrumHandle;
pub use node::{AudioGraphNode, NodeInputs, ProcInfo};
pub use param::{AtomicF32, ParamSet};
pub use pool::BUFFER_POOL_SLOTS;
pub use registry::NodeHandle;
pub use ring::{Consumer, ParamUpdate, Producer, SpscRing};
pub use snapshot::Connection;

/// Capacity of the parameter-update ring between the two threads.
pub const PARAM_RING_CAPACITY: usize = 1024;
