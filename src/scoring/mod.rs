pub mod accumulator;
pub mod classifier;
pub mod features;
