//! Genome to neural network compiler.
//!
//! A genome is an arbitrary list of encoded connections; the compiler turns
//! it into a compact executable network. Neurons that cannot influence any
//! action are culled, survivors are renumbered densely from zero, and the
//! connection list is emitted neuron-sinks-first so the feed-forward pass in
//! [`crate::agent`] can latch every neuron output exactly once.

use crate::actions::NUM_ACTIONS;
use crate::genome::{Gene, Genome, ACTION, NEURON, SENSOR};
use crate::sensors::NUM_SENSES;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Neuron output value at birth, before the first latch.
pub const INITIAL_NEURON_OUTPUT: f32 = 0.5;

/// One internal neuron. Undriven neurons (no inputs from sensors or other
/// neurons) never latch and act as constant bias feeds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Neuron {
    pub output: f32,
    pub driven: bool,
}

/// Executable network compiled from a genome. `connections` is ordered so
/// that every neuron-sink connection precedes every action-sink connection;
/// the feed-forward pass depends on that ordering.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NeuralNet {
    pub connections: Vec<Gene>,
    pub neurons: Vec<Neuron>,
}

/// Connectivity bookkeeping for one candidate neuron during compilation.
#[derive(Clone, Copy, Debug, Default)]
struct Node {
    remapped_number: u8,
    num_outputs: u16,
    num_self_inputs: u16,
    num_inputs_from_sensors_or_other_neurons: u16,
}

/// Ordered map from (renumbered) neuron index to its connectivity counters.
/// Ordered so remapping is deterministic across runs.
type NodeMap = BTreeMap<u8, Node>;

/// Copy the genome with every source/sink number reduced modulo its
/// cardinality: sensor count, action count, or the neuron budget.
fn renumber_connections(genome: &Genome, max_neurons: u32) -> Vec<Gene> {
    genome
        .iter()
        .map(|gene| {
            let mut conn = *gene;
            conn.source_num = if conn.source_type == NEURON {
                (conn.source_num as u32 % max_neurons) as u8
            } else {
                conn.source_num % NUM_SENSES as u8
            };
            conn.sink_num = if conn.sink_type == NEURON {
                (conn.sink_num as u32 % max_neurons) as u8
            } else {
                conn.sink_num % NUM_ACTIONS as u8
            };
            conn
        })
        .collect()
}

/// Scan the connection list and build the node map: per neuron, how many
/// outputs it drives, how many of its inputs are self-loops, and how many
/// arrive from sensors or other neurons.
fn make_node_map(connections: &[Gene]) -> NodeMap {
    let mut node_map = NodeMap::new();
    for conn in connections {
        if conn.sink_type == NEURON {
            let node = node_map.entry(conn.sink_num).or_default();
            if conn.source_type == NEURON && conn.source_num == conn.sink_num {
                node.num_self_inputs += 1;
            } else {
                node.num_inputs_from_sensors_or_other_neurons += 1;
            }
        }
        if conn.source_type == NEURON {
            let node = node_map.entry(conn.source_num).or_default();
            node.num_outputs += 1;
        }
    }
    node_map
}

/// Drop every connection feeding `neuron_number`, decrementing the output
/// count of any neuron source that fed it.
fn remove_connections_to_neuron(
    connections: &mut Vec<Gene>,
    node_map: &mut NodeMap,
    neuron_number: u8,
) {
    connections.retain(|conn| {
        if conn.sink_type == NEURON && conn.sink_num == neuron_number {
            if conn.source_type == NEURON {
                if let Some(source) = node_map.get_mut(&conn.source_num) {
                    source.num_outputs -= 1;
                }
            }
            false
        } else {
            true
        }
    });
}

/// Iteratively remove neurons that feed nothing, or only themselves. Each
/// removal may strand an upstream neuron, so passes repeat until a full pass
/// removes nothing.
fn cull_useless_neurons(connections: &mut Vec<Gene>, node_map: &mut NodeMap) {
    loop {
        let doomed: Vec<u8> = node_map
            .iter()
            .filter(|(_, node)| node.num_outputs == node.num_self_inputs)
            .map(|(&number, _)| number)
            .collect();
        if doomed.is_empty() {
            break;
        }
        for number in doomed {
            remove_connections_to_neuron(connections, node_map, number);
            node_map.remove(&number);
        }
    }
}

/// Compile a genome into an executable network.
///
/// Stages: renumber indices into range, build the node map, cull useless
/// neurons, assign dense indices to survivors, then emit the surviving
/// connections in two passes (neuron sinks, then action sinks) and
/// instantiate neuron state.
pub fn compile_network(genome: &Genome, max_neurons: u32) -> NeuralNet {
    let mut connections = renumber_connections(genome, max_neurons);
    let mut node_map = make_node_map(&connections);
    cull_useless_neurons(&mut connections, &mut node_map);

    debug_assert!(node_map.len() <= max_neurons as usize);
    for (new_number, node) in node_map.values_mut().enumerate() {
        debug_assert!(node.num_outputs != 0);
        node.remapped_number = new_number as u8;
    }

    let mut nnet = NeuralNet::default();

    // Pass A: connections sinking into neurons, indices remapped.
    for conn in connections.iter().filter(|c| c.sink_type == NEURON) {
        let mut wired = *conn;
        wired.sink_num = node_map[&wired.sink_num].remapped_number;
        if wired.source_type == NEURON {
            wired.source_num = node_map[&wired.source_num].remapped_number;
        }
        nnet.connections.push(wired);
    }

    // Pass B: connections sinking into actions.
    for conn in connections.iter().filter(|c| c.sink_type == ACTION) {
        let mut wired = *conn;
        if wired.source_type == NEURON {
            wired.source_num = node_map[&wired.source_num].remapped_number;
        }
        nnet.connections.push(wired);
    }

    // Neuron state, in remapped order.
    for node in node_map.values() {
        nnet.neurons.push(Neuron {
            output: INITIAL_NEURON_OUTPUT,
            driven: node.num_inputs_from_sensors_or_other_neurons != 0,
        });
    }

    nnet
}
