//! Runs benchmark cases one after another and collects their measurements.
//!
//! Cases never run concurrently. A case whose encode or decode fails is
//! logged, recorded as a [`CaseFailure`] and skipped; the rest still run.

use tracing::{info, warn};

use crate::error::CaseError;
use crate::experiment::{BenchCase, CaseInput};
use crate::harness::{try_measure, BenchConfig};
use crate::schema::{CaseFailure, Measurement};

#[derive(Debug, Default)]
pub struct RunOutcome {
    pub measurements: Vec<Measurement>,
    pub failures: Vec<CaseFailure>,
}

pub fn run_case(cfg: &BenchConfig, case: &BenchCase<'_>) -> Result<Measurement, CaseError> {
    let lib = case.library;
    let group = case.group();
    let (m, output_size) = match case.input {
        CaseInput::Encode(data) => {
            let encode_err = |source| CaseError::Encode {
                lib: lib.name().to_string(),
                group: group.clone(),
                source,
            };
            let size = lib.encode(data).map_err(encode_err)?.len() as u64;
            let m = try_measure(
                cfg.samples(),
                cfg.iters_per_sample(),
                cfg.warmup_iters(),
                || lib.encode(data),
            )
            .map_err(encode_err)?;
            (m, Some(size))
        }
        CaseInput::Decode(bytes) => {
            let m = try_measure(
                cfg.samples(),
                cfg.iters_per_sample(),
                cfg.warmup_iters(),
                || lib.decode(bytes),
            )
            .map_err(|source| CaseError::Decode {
                lib: lib.name().to_string(),
                group: group.clone(),
                source,
            })?;
            (m, None)
        }
    };

    Ok(Measurement {
        group,
        lib: lib.name().to_string(),
        experiment: case.experiment.name.clone(),
        unpack: case.experiment.unpack,
        median: m.median,
        mean: m.mean,
        ops: m.ops(),
        output_size,
        samples: m.samples,
        iters_per_sample: m.iters_per_sample,
        warmup_iters: m.warmup_iters,
    })
}

/// Runs `cases` in order.
pub fn run(cfg: &BenchConfig, cases: &[BenchCase<'_>]) -> RunOutcome {
    let mut outcome = RunOutcome::default();
    for (i, case) in cases.iter().enumerate() {
        match run_case(cfg, case) {
            Ok(m) => {
                info!(
                    case = i + 1,
                    of = cases.len(),
                    group = %m.group,
                    lib = %m.lib,
                    median_ms = m.median * 1e3,
                    output_size = ?m.output_size,
                    "measured"
                );
                outcome.measurements.push(m);
            }
            Err(e) => {
                warn!(
                    group = e.group(),
                    lib = e.lib(),
                    error = %e,
                    "case failed; left out of the report"
                );
                outcome.failures.push(CaseFailure::from(&e));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, EncodeError};
    use crate::experiment::{Catalog, Experiment};
    use crate::generator::{Generator, Scale};
    use crate::harness::Profile;
    use crate::library::{self, Library};
    use crate::record::{Dataset, Shape};
    use serde_json::Value;

    struct Broken;

    impl Library for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn encode(&self, data: &Dataset) -> Result<Vec<u8>, EncodeError> {
            Err(EncodeError::Unsupported {
                shape: data.shape().unwrap_or(Shape::Mapping),
            })
        }

        fn decode(&self, _bytes: &[u8]) -> Result<Value, DecodeError> {
            Err(DecodeError::NonStringKey)
        }
    }

    fn cfg() -> BenchConfig {
        BenchConfig {
            profile: Profile::Quick,
            seed: 0,
            scale: Scale {
                record_count: 3,
                array_element_count: 4,
                array_width: 2,
            },
        }
    }

    fn catalog(cfg: &BenchConfig) -> Catalog {
        let mut gen = Generator::with_seed(cfg.seed).unwrap();
        let experiments: Vec<Experiment> = gen
            .experiments(&cfg.scale)
            .unwrap()
            .into_iter()
            .filter(|e| e.name == "struct" || e.name == "uuid")
            .collect();
        Catalog::new(experiments, &library::reference()).unwrap()
    }

    #[test]
    fn test_measurements_carry_labels_and_sizes() {
        let cfg = cfg();
        let catalog = catalog(&cfg);
        let libs = library::registry();
        let outcome = run(&cfg, &catalog.cases(&libs));
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.measurements.len(), 3 * libs.len());

        for m in &outcome.measurements {
            assert!(m.median > 0.0 && m.ops > 0.0);
            if m.unpack {
                assert_eq!(m.group, "struct deserialization");
                assert!(m.output_size.is_none());
            } else {
                assert!(m.output_size.unwrap() > 0);
            }
        }
    }

    #[test]
    fn test_failure_does_not_stop_other_libraries() {
        let cfg = cfg();
        let catalog = catalog(&cfg);
        let mut libs = library::registry();
        libs.insert(0, Box::new(Broken));
        let outcome = run(&cfg, &catalog.cases(&libs));

        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures.iter().all(|f| f.lib == "broken"));
        assert_eq!(outcome.measurements.len(), 3 * (libs.len() - 1));
        assert!(outcome.measurements.iter().all(|m| m.lib != "broken"));
        let decode_failure = outcome
            .failures
            .iter()
            .find(|f| f.group == "struct deserialization")
            .unwrap();
        assert!(decode_failure.error.contains("failed to decode"));
    }
}
