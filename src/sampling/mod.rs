//! Bounded random sampling

pub mod reservoir;

pub use reservoir::ReservoirSet;
