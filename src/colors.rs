use std::collections::HashMap;

use crossterm::style::Color;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::types::WorkloadKey;

pub const PALETTE: [Color; 14] = [
    Color::Red,
    Color::Green,
    Color::Blue,
    Color::Yellow,
    Color::Magenta,
    Color::Cyan,
    Color::White,
    Color::Grey,
    Color::AnsiValue(91), // Bright Red
    Color::AnsiValue(92), // Bright Green
    Color::AnsiValue(94), // Bright Blue
    Color::AnsiValue(93), // Bright Yellow
    Color::AnsiValue(95), // Bright Magenta
    Color::AnsiValue(96), // Bright Cyan
];

/// Stable color per workload, picked at random from [`PALETTE`] on first use.
pub struct ColorTable {
    assigned: HashMap<WorkloadKey, Color>,
    rng: StdRng,
}

impl ColorTable {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    #[allow(dead_code)]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            assigned: HashMap::new(),
            rng,
        }
    }

    #[allow(dead_code)]
    pub fn get(&self, key: &WorkloadKey) -> Option<Color> {
        self.assigned.get(key).copied()
    }

    pub fn assign(&mut self, key: &WorkloadKey) -> Color {
        if let Some(color) = self.assigned.get(key) {
            return *color;
        }
        let color = PALETTE[self.rng.random_range(0..PALETTE.len())];
        self.assigned.insert(key.clone(), color);
        color
    }

    pub fn assigned_count(&self) -> usize {
        self.assigned.len()
    }
}

impl Default for ColorTable {
    fn default() -> Self {
        Self::new()
    }
}
