//! Domain models for the consilium case engine.

mod case;
mod message;
mod patient;
mod practitioner;

pub use case::*;
pub use message::*;
pub use patient::*;
pub use practitioner::*;
