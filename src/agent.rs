//! Per-agent state and the sense-think-act tick.

use crate::actions::{self, NUM_ACTIONS};
use crate::brain::{self, NeuralNet};
use crate::config::Config;
use crate::genome::{Genome, ACTION, SENSOR};
use crate::geometry::{Coord, Dir};
use crate::sensors::{self, Sensor};
use crate::world::TickView;
use std::sync::Arc;

/// Default oscillator period at birth, in steps.
const INITIAL_OSC_PERIOD: u32 = 34;

/// One simulated creature: genome, compiled network, position, and the small
/// scalar state the actions tune.
#[derive(Clone, Debug)]
pub struct Agent {
    pub alive: bool,
    /// Index into the population container; the grid stores this value in
    /// the agent's cell.
    pub index: u16,
    pub loc: Coord,
    pub birth_loc: Coord,
    /// Steps lived this generation.
    pub age: u32,
    pub genome: Arc<Genome>,
    pub nnet: NeuralNet,
    /// Behavioral dampening factor in `[0, 1]`.
    pub responsiveness: f32,
    /// Oscillator period in steps, 2..=2048.
    pub osc_period: u32,
    /// Reach of the long forward probes, in cells.
    pub long_probe_dist: u32,
    /// Direction of the most recent move; random non-center at birth.
    pub last_move_dir: Dir,
    /// Bitfield of challenge accomplishments, set by the per-step hook.
    pub challenge_bits: u32,
}

impl Agent {
    /// Spawn an agent at `loc` with the given genome, compiling its network.
    /// The caller records the agent in the grid.
    pub fn new(index: u16, loc: Coord, genome: Arc<Genome>, config: &Config) -> Agent {
        let nnet = brain::compile_network(&genome, config.genome.max_number_neurons);
        Agent {
            alive: true,
            index,
            loc,
            birth_loc: loc,
            age: 0,
            genome,
            nnet,
            responsiveness: config.sensors.responsiveness,
            osc_period: INITIAL_OSC_PERIOD,
            long_probe_dist: config.sensors.long_probe_distance,
            last_move_dir: Dir::random8(),
            challenge_bits: 0,
        }
    }

    /// One full sense-think-act cycle. Runs on the worker thread that owns
    /// this agent for the step; world effects go through the deferred queues
    /// in `view`.
    pub fn tick(&mut self, view: &TickView, step: u32) {
        self.age += 1;
        let action_levels = self.feed_forward(view, step);
        actions::execute_actions(self, &action_levels, view);
    }

    /// Evaluate the network against the current world and return the raw
    /// action activations.
    ///
    /// Connections are ordered neuron-sinks-first at compile time, so all
    /// inter-neuron and sensor traffic accumulates before the first
    /// action-sink connection appears. At that point every driven neuron
    /// latches `tanh` of its accumulator exactly once; undriven neurons keep
    /// their prior output and act as bias feeds. Sensors are sampled lazily
    /// as their connections come up, not in bulk.
    pub fn feed_forward(&mut self, view: &TickView, step: u32) -> [f32; NUM_ACTIONS] {
        let mut action_levels = [0.0f32; NUM_ACTIONS];
        let mut neuron_accumulators = vec![0.0f32; self.nnet.neurons.len()];
        let mut outputs_latched = false;

        for conn_index in 0..self.nnet.connections.len() {
            let conn = self.nnet.connections[conn_index];

            if conn.sink_type == ACTION && !outputs_latched {
                for (neuron, accumulator) in
                    self.nnet.neurons.iter_mut().zip(&neuron_accumulators)
                {
                    if neuron.driven {
                        neuron.output = accumulator.tanh();
                    }
                }
                outputs_latched = true;
            }

            let input = if conn.source_type == SENSOR {
                sensors::sensor_value(self, Sensor::from_index(conn.source_num), view, step)
            } else {
                self.nnet.neurons[conn.source_num as usize].output
            };

            let weighted = input * conn.weight_as_float();
            if conn.sink_type == ACTION {
                action_levels[conn.sink_num as usize] += weighted;
            } else {
                neuron_accumulators[conn.sink_num as usize] += weighted;
            }
        }

        action_levels
    }
}
