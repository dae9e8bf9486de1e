/// A non-fatal diagnostic from applying graph operations.
///
/// The engine never aborts on a recoverable problem; it prefers audible
/// silence over audible glitches. These warnings are returned to the caller
/// and logged so misconfigurations are visible without interrupting audio.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphWarning {
    /// An add-node op named a type the catalogue does not know. The op was
    /// ignored.
    UnknownNodeType { node_id: String, node_type: String },
    /// A connection references a node id that does not exist. The
    /// connection is kept in the authoritative list but will not appear in
    /// the processing order until both endpoints exist.
    DanglingConnection { from: String, to: String },
    /// One or more nodes form a cycle and were omitted from the processing
    /// order. Their outputs are silent for every block under this snapshot.
    CycleDetected { omitted_nodes: usize },
    /// A queued parameter update was dropped because the ring was full.
    ParamQueueFull { node_id: String },
}

impl std::error::Error for GraphWarning {}

impl std::fmt::Display for GraphWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphWarning::UnknownNodeType { node_id, node_type } => {
                write!(
                    f,
                    "unknown node type \"{}\" for node \"{}\": op ignored",
                    node_type, node_id
                )
            }
            GraphWarning::DanglingConnection { from, to } => {
                write!(
                    f,
                    "connection {} -> {} references a missing node: omitted from the processing order",
                    from, to
                )
            }
            GraphWarning::CycleDetected { omitted_nodes } => {
                write!(
                    f,
                    "cycle detected: {} node(s) omitted from the processing order",
                    omitted_nodes
                )
            }
            GraphWarning::ParamQueueFull { node_id } => {
                write!(
                    f,
                    "parameter queue full: update for node \"{}\" dropped",
                    node_id
                )
            }
        }
    }
}
