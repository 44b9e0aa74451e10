use clap::ValueEnum;

pub mod convert;
pub mod error;
pub mod experiment;
pub mod generator;
pub mod harness;
pub mod library;
pub mod model;
pub mod record;
pub mod report;
pub mod runner;
pub mod schema;

/// Serialization libraries to benchmark.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum LibraryChoice {
    /// Every registered library, in report order.
    #[default]
    All,
    /// `rmp` writing a dynamic value tree.
    Rmp,
    /// `rmp-serde` with native models and arrays.
    RmpSerde,
}
