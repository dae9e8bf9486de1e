use std::collections::VecDeque;

use fnv::FnvHashMap;

use crate::snapshot::{Connection, SharedNode};

/// Build a topological processing order over the current node set with
/// Kahn's algorithm.
///
/// In-degrees are computed from the connection list, counting only
/// connections whose endpoints both exist (dangling connections are
/// ignored). The work queue is seeded, and ties broken, by node insertion
/// order, so identical inputs always produce identical orders. Nodes the
/// traversal never reaches are part of a cycle; they are omitted and their
/// count returned so the caller can record a diagnostic.
///
/// Runs on the message thread only; the real-time thread consumes the
/// finished order through the snapshot.
pub(crate) fn build_processing_order(
    insertion_order: &[String],
    nodes: &FnvHashMap<String, SharedNode>,
    connections: &[Connection],
) -> (Vec<String>, usize) {
    let mut in_degree: FnvHashMap<&str, usize> = FnvHashMap::default();
    let mut adjacency: FnvHashMap<&str, Vec<&str>> = FnvHashMap::default();

    for id in insertion_order {
        if nodes.contains_key(id) {
            in_degree.insert(id.as_str(), 0);
        }
    }

    for conn in connections {
        if nodes.contains_key(&conn.from_node_id) && nodes.contains_key(&conn.to_node_id) {
            *in_degree.get_mut(conn.to_node_id.as_str()).unwrap() += 1;
            adjacency
                .entry(conn.from_node_id.as_str())
                .or_default()
                .push(conn.to_node_id.as_str());
        }
    }

    let mut queue: VecDeque<&str> = insertion_order
        .iter()
        .map(String::as_str)
        .filter(|id| in_degree.get(id) == Some(&0))
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(id) = queue.pop_front() {
        order.push(id.to_string());

        if let Some(successors) = adjacency.get(id) {
            for &succ in successors {
                let degree = in_degree.get_mut(succ).unwrap();
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(succ);
                }
            }
        }
    }

    let omitted = in_degree.len() - order.len();
    (order, omitted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::gain::GainNode;
    use crate::param::ParamSet;
    use crate::snapshot::NodeCell;
    use atomic_refcell::AtomicRefCell;
    use basedrop::Collector;

    fn conn(from: &str, to: &str) -> Connection {
        Connection {
            from_node_id: from.to_string(),
            from_outlet: 0,
            to_node_id: to.to_string(),
            to_inlet: 0,
        }
    }

    fn make_nodes(collector: &Collector, ids: &[&str]) -> (Vec<String>, FnvHashMap<String, SharedNode>) {
        let mut nodes = FnvHashMap::default();
        let mut order = Vec::new();
        for &id in ids {
            order.push(id.to_string());
            nodes.insert(
                id.to_string(),
                SharedNode::new(
                    &collector.handle(),
                    NodeCell {
                        id: id.to_string(),
                        type_tag: "gain",
                        params: ParamSet::new(&[("gain", 1.0)]),
                        dsp: AtomicRefCell::new(Box::new(GainNode::new())),
                    },
                ),
            );
        }
        (order, nodes)
    }

    #[test]
    fn respects_dependencies() {
        let collector = Collector::new();
        let (ins, nodes) = make_nodes(&collector, &["c", "a", "b"]);
        let conns = [conn("a", "b"), conn("b", "c")];

        let (order, omitted) = build_processing_order(&ins, &nodes, &conns);
        assert_eq!(omitted, 0);

        let pos = |id: &str| order.iter().position(|n| n == id).unwrap();
        assert!(pos("a") < pos("b"));
        assert!(pos("b") < pos("c"));
    }

    #[test]
    fn ties_break_by_insertion_order() {
        let collector = Collector::new();
        let (ins, nodes) = make_nodes(&collector, &["z", "m", "a"]);

        let (order, _) = build_processing_order(&ins, &nodes, &[]);
        assert_eq!(order, vec!["z", "m", "a"]);

        // Identical inputs, identical output.
        let (again, _) = build_processing_order(&ins, &nodes, &[]);
        assert_eq!(order, again);
    }

    #[test]
    fn omits_exactly_the_cyclic_subset() {
        let collector = Collector::new();
        let (ins, nodes) = make_nodes(&collector, &["a", "b", "c", "d"]);
        // a -> b and a cycle between c and d.
        let conns = [conn("a", "b"), conn("c", "d"), conn("d", "c")];

        let (order, omitted) = build_processing_order(&ins, &nodes, &conns);
        assert_eq!(order, vec!["a", "b"]);
        assert_eq!(omitted, 2);
    }

    #[test]
    fn ignores_dangling_connections() {
        let collector = Collector::new();
        let (ins, nodes) = make_nodes(&collector, &["a"]);
        let conns = [conn("ghost", "a"), conn("a", "ghost")];

        let (order, omitted) = build_processing_order(&ins, &nodes, &conns);
        assert_eq!(order, vec!["a"]);
        assert_eq!(omitted, 0);
    }
}
