//! Population container plus the deferred mutation queues.
//!
//! Agents live at indices `1..=population`; slot 0 is an explicit reserved
//! sentinel mirroring the grid's "empty = 0" encoding. During the parallel
//! phase no agent touches another agent, the grid, or the signal layers
//! directly; moves, deaths, and pheromone deposits queue up and drain
//! serially at the step boundary. That discipline is what makes the
//! per-agent phase trivially parallel.

use crate::agent::Agent;
use crate::genome::Genome;
use crate::geometry::Coord;
use crate::grid::{Grid, EMPTY};
use std::ops::{Index, IndexMut};
use std::sync::{Arc, Mutex};

/// One population slot. Slot 0 is always `Reserved`; the rest hold agents.
#[derive(Clone, Debug)]
pub enum Slot {
    Reserved,
    Agent(Agent),
}

/// Deferred world mutations accumulated during the parallel phase. Appends
/// are mutex-guarded so any worker may push; drains happen single-threaded.
#[derive(Debug, Default)]
pub struct ActionQueues {
    death: Mutex<Vec<u16>>,
    moves: Mutex<Vec<(u16, Coord)>>,
    deposits: Mutex<Vec<(u16, Coord)>>,
}

impl ActionQueues {
    /// Mark an agent for death at the step boundary. Duplicate entries are
    /// harmless.
    pub fn queue_for_death(&self, index: u16) {
        self.death.lock().unwrap().push(index);
    }

    /// Request a move to `new_loc`. Conflicting requests for one cell are
    /// resolved first-come-first-served at drain time.
    pub fn queue_for_move(&self, index: u16, new_loc: Coord) {
        self.moves.lock().unwrap().push((index, new_loc));
    }

    /// Request a pheromone deposit at `loc` on `layer`.
    pub fn queue_deposit(&self, layer: u16, loc: Coord) {
        self.deposits.lock().unwrap().push((layer, loc));
    }

    /// Take all queued deposits, leaving the queue empty.
    pub fn drain_deposits(&self) -> Vec<(u16, Coord)> {
        std::mem::take(&mut self.deposits.lock().unwrap())
    }

    /// Take all queued moves, leaving the queue empty.
    pub fn drain_moves(&self) -> Vec<(u16, Coord)> {
        std::mem::take(&mut self.moves.lock().unwrap())
    }

    fn drain_deaths(&self) -> Vec<u16> {
        std::mem::take(&mut self.death.lock().unwrap())
    }
}

/// The population: agent slots plus the deferred queues.
#[derive(Debug)]
pub struct Peeps {
    slots: Vec<Slot>,
    pub queues: ActionQueues,
}

impl Peeps {
    /// Allocate a container sized for `population` agents (plus the
    /// reserved slot).
    pub fn new(population: u32) -> Peeps {
        let mut slots = Vec::with_capacity(population as usize + 1);
        slots.push(Slot::Reserved);
        Peeps {
            slots,
            queues: ActionQueues::default(),
        }
    }

    /// Number of agent slots currently populated.
    pub fn population(&self) -> u32 {
        self.slots.len().saturating_sub(1) as u32
    }

    /// Replace the whole population; agents land at indices 1.. in order.
    pub fn repopulate(&mut self, agents: Vec<Agent>) {
        self.slots.truncate(1);
        self.slots.extend(agents.into_iter().map(Slot::Agent));
    }

    /// Iterate the live view of every populated slot.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.slots.iter().filter_map(|slot| match slot {
            Slot::Agent(agent) => Some(agent),
            Slot::Reserved => None,
        })
    }

    pub fn agents_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.slots.iter_mut().filter_map(|slot| match slot {
            Slot::Agent(agent) => Some(agent),
            Slot::Reserved => None,
        })
    }

    /// Index-aligned snapshot of every agent's genome (None for the reserved
    /// slot). The parallel phase reads neighbors' genomes through this
    /// snapshot while the agents themselves are mutably borrowed.
    pub fn genome_snapshot(&self) -> Vec<Option<Arc<Genome>>> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Slot::Agent(agent) if agent.alive => Some(agent.genome.clone()),
                _ => None,
            })
            .collect()
    }

    /// Split the container into the slot array and the queues so the
    /// parallel phase can mutate agents while workers append to the queues.
    pub fn split_for_tick(&mut self) -> (&mut [Slot], &ActionQueues) {
        (&mut self.slots, &self.queues)
    }

    /// Entries currently waiting in the death queue (duplicates included).
    pub fn queued_death_count(&self) -> usize {
        self.queues.death.lock().unwrap().len()
    }

    /// Apply every queued death: clear the agent's grid cell and mark it
    /// dead. Already-dead agents are no-ops, so duplicate queue entries and
    /// kill-then-move races are harmless. Serial only.
    pub fn drain_death_queue(&mut self, grid: &mut Grid) {
        for index in self.queues.drain_deaths() {
            if let Slot::Agent(agent) = &mut self.slots[index as usize] {
                if agent.alive {
                    grid.set(agent.loc, EMPTY);
                    agent.alive = false;
                }
            }
        }
    }

    /// Apply every queued move in queue order. A move lands only if the
    /// agent is still alive and the target cell is still empty; the rest are
    /// dropped silently. The agent's last-move direction follows the actual
    /// displacement. Serial only, after the death queue drains.
    pub fn drain_move_queue(&mut self, grid: &mut Grid) {
        for (index, new_loc) in self.queues.drain_moves() {
            if let Slot::Agent(agent) = &mut self.slots[index as usize] {
                if agent.alive && grid.is_empty_at(new_loc) {
                    let move_dir = (new_loc - agent.loc).as_dir();
                    grid.set(agent.loc, EMPTY);
                    grid.set(new_loc, agent.index);
                    agent.loc = new_loc;
                    agent.last_move_dir = move_dir;
                }
            }
        }
    }
}

impl Index<u16> for Peeps {
    type Output = Agent;

    fn index(&self, index: u16) -> &Agent {
        match &self.slots[index as usize] {
            Slot::Agent(agent) => agent,
            Slot::Reserved => panic!("agent index 0 is reserved"),
        }
    }
}

impl IndexMut<u16> for Peeps {
    fn index_mut(&mut self, index: u16) -> &mut Agent {
        match &mut self.slots[index as usize] {
            Slot::Agent(agent) => agent,
            Slot::Reserved => panic!("agent index 0 is reserved"),
        }
    }
}
