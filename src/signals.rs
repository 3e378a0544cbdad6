//! Pheromone layers: stacked 2D arrays of 8-bit signal intensity.
//!
//! Agents deposit while the step runs in parallel, so deposits are queued
//! (see [`crate::peeps::ActionQueues`]) and applied at the step boundary.
//! Fading happens serially after the queues drain.

use crate::geometry::Coord;
use serde::{Deserialize, Serialize};

/// Saturation ceiling for a signal cell.
pub const SIGNAL_MAX: u8 = 255;

/// `L` layers of `W x H` unsigned 8-bit pheromone cells.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Signals {
    size_x: u16,
    size_y: u16,
    /// One flat column-major buffer per layer: `layers[n][x * size_y + y]`.
    layers: Vec<Vec<u8>>,
}

impl Signals {
    /// Allocate `num_layers` zeroed layers of the given dimensions.
    pub fn new(num_layers: u16, size_x: u16, size_y: u16) -> Signals {
        Signals {
            size_x,
            size_y,
            layers: vec![vec![0; size_x as usize * size_y as usize]; num_layers as usize],
        }
    }

    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    fn offset(&self, loc: Coord) -> usize {
        loc.x as usize * self.size_y as usize + loc.y as usize
    }

    /// Signal intensity on `layer` at `loc`.
    #[inline]
    pub fn magnitude(&self, layer: usize, loc: Coord) -> u8 {
        self.layers[layer][self.offset(loc)]
    }

    /// Zero every cell on every layer.
    pub fn zero_fill(&mut self) {
        for layer in &mut self.layers {
            layer.fill(0);
        }
    }

    /// Deposit at `loc`: +1 to every cell in the radius-1.5 neighborhood
    /// (the in-bounds Moore neighborhood, center included), then +2 to the
    /// center itself, saturating at [`SIGNAL_MAX`].
    pub fn deposit(&mut self, layer: usize, loc: Coord) {
        let size_x = self.size_x as i16;
        let size_y = self.size_y as i16;
        for dx in -1..=1i16 {
            for dy in -1..=1i16 {
                let cell = Coord::new(loc.x + dx, loc.y + dy);
                if cell.x >= 0 && cell.x < size_x && cell.y >= 0 && cell.y < size_y {
                    let offset = self.offset(cell);
                    let value = &mut self.layers[layer][offset];
                    *value = value.saturating_add(1);
                }
            }
        }
        let offset = self.offset(loc);
        let value = &mut self.layers[layer][offset];
        *value = value.saturating_add(2);
    }

    /// Decay one layer: every cell loses 1, saturating at 0.
    pub fn fade(&mut self, layer: usize) {
        for value in &mut self.layers[layer] {
            *value = value.saturating_sub(1);
        }
    }

    /// Raw copy of one layer, for snapshot emission.
    pub fn layer_data(&self, layer: usize) -> Vec<u8> {
        self.layers[layer].clone()
    }
}
