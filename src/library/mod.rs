//! Candidate serialization libraries behind one encode/decode contract.

use std::ops::BitOr;

use serde_json::Value;

use crate::convert;
use crate::error::{DecodeError, EncodeError};
use crate::record::Dataset;
use crate::LibraryChoice;

mod native;
mod tree;

pub use native::RmpSerde;
pub use tree::RmpTree;

/// A serialization library under test.
///
/// `encode` must accept every [`Dataset`] the catalog produces, falling back
/// to [`crate::convert`] for shapes without native support.
pub trait Library {
    fn name(&self) -> &str;
    fn encode(&self, data: &Dataset) -> Result<Vec<u8>, EncodeError>;
    fn decode(&self, bytes: &[u8]) -> Result<Value, DecodeError>;
}

/// Optional native encoding paths, as a bit-set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Options(u32);

impl Options {
    pub const NONE: Options = Options(0);
    /// Stream numeric arrays without building a value tree.
    pub const NATIVE_ARRAYS: Options = Options(1 << 0);
    /// Serialize validated models directly.
    pub const NATIVE_MODELS: Options = Options(1 << 1);

    pub fn contains(self, other: Options) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u32 {
        self.0
    }
}

impl BitOr for Options {
    type Output = Options;

    fn bitor(self, rhs: Options) -> Options {
        Options(self.0 | rhs.0)
    }
}

/// The library whose output is the decode fixture for every unpack experiment.
pub fn reference() -> RmpSerde {
    RmpSerde::new(Options::NONE, Some(convert::stringify))
}

/// All libraries, in report order.
pub fn registry() -> Vec<Box<dyn Library>> {
    select(LibraryChoice::All)
}

pub fn select(choice: LibraryChoice) -> Vec<Box<dyn Library>> {
    let mut out: Vec<Box<dyn Library>> = Vec::new();
    if matches!(choice, LibraryChoice::All | LibraryChoice::Rmp) {
        out.push(Box::new(RmpTree::new(Some(convert::stringify))));
    }
    if matches!(choice, LibraryChoice::All | LibraryChoice::RmpSerde) {
        out.push(Box::new(RmpSerde::new(
            Options::NATIVE_ARRAYS | Options::NATIVE_MODELS,
            Some(convert::stringify),
        )));
    }
    out
}
