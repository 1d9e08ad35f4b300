mod simulated;

pub use simulated::SimulatedEngine;
