//! Experiments and the flat list of benchmark cases built from them.

use std::fmt;

use tracing::debug;

use crate::error::EncodeError;
use crate::library::Library;
use crate::record::Dataset;

/// A named dataset plus whether it is measured encoding or decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct Experiment {
    pub name: String,
    pub data: Dataset,
    /// Measure decoding of the reference encoding of `data`.
    pub unpack: bool,
}

impl Experiment {
    pub fn new(name: impl Into<String>, data: Dataset, unpack: bool) -> Self {
        Self {
            name: name.into(),
            data,
            unpack,
        }
    }

    /// Report label; unique within a catalog.
    pub fn group(&self) -> String {
        if self.unpack {
            format!("{} deserialization", self.name)
        } else {
            format!("{} serialization", self.name)
        }
    }
}

/// What a case feeds its library.
#[derive(Clone, Copy, Debug)]
pub enum CaseInput<'a> {
    Encode(&'a Dataset),
    Decode(&'a [u8]),
}

impl CaseInput<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            CaseInput::Encode(_) => "encode",
            CaseInput::Decode(_) => "decode",
        }
    }
}

/// One (library, experiment) pair.
pub struct BenchCase<'a> {
    pub library: &'a dyn Library,
    pub experiment: &'a Experiment,
    pub input: CaseInput<'a>,
}

impl BenchCase<'_> {
    pub fn group(&self) -> String {
        self.experiment.group()
    }

    pub fn lib(&self) -> &str {
        self.library.name()
    }
}

impl fmt::Display for BenchCase<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {} ({})", self.group(), self.lib(), self.input.kind())
    }
}

/// Experiments plus their precomputed decode fixtures.
pub struct Catalog {
    experiments: Vec<Experiment>,
    fixtures: Vec<Option<Vec<u8>>>,
}

impl Catalog {
    /// Encodes every unpack experiment once with `reference`, so all libraries
    /// decode byte-identical input.
    pub fn new(experiments: Vec<Experiment>, reference: &dyn Library) -> Result<Self, EncodeError> {
        let fixtures = experiments
            .iter()
            .map(|e| {
                if !e.unpack {
                    return Ok(None);
                }
                let bytes = reference.encode(&e.data)?;
                debug!(
                    group = %e.group(),
                    reference = reference.name(),
                    bytes = bytes.len(),
                    "precomputed decode fixture"
                );
                Ok(Some(bytes))
            })
            .collect::<Result<Vec<_>, EncodeError>>()?;
        Ok(Self {
            experiments,
            fixtures,
        })
    }

    pub fn experiments(&self) -> &[Experiment] {
        &self.experiments
    }

    pub fn fixture(&self, index: usize) -> Option<&[u8]> {
        self.fixtures.get(index).and_then(|f| f.as_deref())
    }

    /// Cross product, outer by experiment, inner by library.
    pub fn cases<'a>(&'a self, libraries: &'a [Box<dyn Library>]) -> Vec<BenchCase<'a>> {
        let mut out = Vec::with_capacity(self.experiments.len() * libraries.len());
        for (i, experiment) in self.experiments.iter().enumerate() {
            let input = match self.fixture(i) {
                Some(bytes) => CaseInput::Decode(bytes),
                None => CaseInput::Encode(&experiment.data),
            };
            for library in libraries {
                out.push(BenchCase {
                    library: library.as_ref(),
                    experiment,
                    input,
                });
            }
        }
        debug!(cases = out.len(), "built case list");
        out
    }
}

/// Keeps cases whose group contains `pattern`.
pub fn filter_cases<'a>(cases: Vec<BenchCase<'a>>, pattern: Option<&str>) -> Vec<BenchCase<'a>> {
    match pattern {
        None => cases,
        Some(p) => cases.into_iter().filter(|c| c.group().contains(p)).collect(),
    }
}
