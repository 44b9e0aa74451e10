use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use packbench::experiment::{filter_cases, Catalog};
use packbench::generator::{Generator, GeneratorConfig, Scale};
use packbench::harness::{BenchConfig, Profile};
use packbench::schema::{BenchReport, RunMeta};
use packbench::{library, report, runner, LibraryChoice};
use std::fs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const SCHEMA_VERSION: u32 = 1;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ProfileArg {
    Quick,
    Full,
}

impl From<ProfileArg> for Profile {
    fn from(v: ProfileArg) -> Self {
        match v {
            ProfileArg::Quick => Profile::Quick,
            ProfileArg::Full => Profile::Full,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate the datasets, run every case and write the JSON report.
    Run {
        /// Which library (or libraries) to benchmark.
        #[arg(long, value_enum, default_value_t = LibraryChoice::All)]
        library: LibraryChoice,

        /// Only run cases whose group contains this substring.
        #[arg(long, value_name = "PATTERN")]
        filter: Option<String>,
    },

    /// Print the case list without running it.
    List {
        #[arg(long, value_enum, default_value_t = LibraryChoice::All)]
        library: LibraryChoice,

        #[arg(long, value_name = "PATTERN")]
        filter: Option<String>,
    },

    /// Print a SHA-256 fingerprint per experiment dataset.
    ///
    /// Two machines with the same seed and scale must print identical lines.
    Fingerprint,

    /// Render Markdown tables from result files or directories of them.
    Report {
        #[arg(value_name = "PATH", required = true, num_args = 1..)]
        paths: Vec<PathBuf>,
    },
}

#[derive(Parser, Debug)]
#[command(name = "packbench")]
#[command(about = "Comparative msgpack serialization benchmarks (JSON output, Markdown reports)")]
struct Args {
    #[arg(long, value_enum, default_value_t = ProfileArg::Quick, global = true)]
    profile: ProfileArg,

    #[arg(long, default_value_t = 0, global = true)]
    seed: u64,

    /// Records per record-shaped dataset.
    #[arg(long, default_value_t = 100, global = true)]
    records: usize,

    /// Elements per numeric array dataset.
    #[arg(long, default_value_t = 100_000, global = true)]
    array_elements: usize,

    /// Columns of the two-dimensional arrays.
    #[arg(long, default_value_t = 100, global = true)]
    array_width: usize,

    /// Where to write the JSON report. If omitted, prints to stdout.
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Debug logging; `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "packbench=debug"
    } else {
        "packbench=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn git_sha_short() -> Option<String> {
    std::env::var("GIT_SHA")
        .ok()
        .or_else(|| std::env::var("GITHUB_SHA").ok())
        .map(|s| s.chars().take(12).collect())
}

fn write_output(out: Option<&PathBuf>, text: &str) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), "wrote output");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn build_catalog(cfg: &BenchConfig) -> anyhow::Result<Catalog> {
    let mut gen = Generator::new(GeneratorConfig {
        seed: cfg.seed,
        ..GeneratorConfig::default()
    })?;
    let experiments = gen.experiments(&cfg.scale)?;
    let catalog = Catalog::new(experiments, &library::reference())
        .context("encoding decode fixtures with the reference library")?;
    Ok(catalog)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let cfg = BenchConfig {
        profile: args.profile.into(),
        seed: args.seed,
        scale: Scale {
            record_count: args.records,
            array_element_count: args.array_elements,
            array_width: args.array_width,
        },
    };

    match &args.cmd {
        Command::Run { library: choice, filter } => {
            let catalog = build_catalog(&cfg)?;
            let libraries = library::select(*choice);
            let cases = filter_cases(catalog.cases(&libraries), filter.as_deref());
            if cases.is_empty() {
                bail!("no cases match the given library and filter");
            }
            info!(
                cases = cases.len(),
                profile = cfg.profile.as_str(),
                seed = cfg.seed,
                "starting run"
            );

            let outcome = runner::run(&cfg, &cases);
            if !outcome.failures.is_empty() {
                error!(failed = outcome.failures.len(), "some cases failed");
            }

            let report = BenchReport {
                run: RunMeta {
                    schema_version: SCHEMA_VERSION,
                    bench_version: env!("CARGO_PKG_VERSION").to_string(),
                    profile: cfg.profile.as_str().to_string(),
                    seed: cfg.seed,
                    record_count: cfg.scale.record_count,
                    array_element_count: cfg.scale.array_element_count,
                    array_width: cfg.scale.array_width,
                    timestamp_utc: chrono::Utc::now().to_rfc3339(),
                    git_sha: git_sha_short(),
                },
                measurements: outcome.measurements,
                failures: outcome.failures,
            };
            let json = serde_json::to_string_pretty(&report)?;
            write_output(args.out.as_ref(), &json)?;
        }
        Command::List { library: choice, filter } => {
            let catalog = build_catalog(&cfg)?;
            let libraries = library::select(*choice);
            let cases = filter_cases(catalog.cases(&libraries), filter.as_deref());
            let lines: Vec<String> = cases.iter().map(|c| c.to_string()).collect();
            write_output(args.out.as_ref(), &lines.join("\n"))?;
        }
        Command::Fingerprint => {
            let catalog = build_catalog(&cfg)?;
            let mut lines = Vec::new();
            for exp in catalog.experiments() {
                lines.push(format!(
                    "{}\t{}\t{}",
                    exp.group(),
                    exp.data.len(),
                    exp.data.fingerprint()?
                ));
            }
            write_output(args.out.as_ref(), &lines.join("\n"))?;
        }
        Command::Report { paths } => {
            let rows = report::load_results(paths)?;
            let (markdown, errors) = report::render_markdown(&rows);
            write_output(args.out.as_ref(), markdown.trim_end_matches('\n'))?;
            for e in &errors {
                error!(error = %e, "group skipped");
            }
            if !errors.is_empty() {
                bail!("{} report group(s) could not be rendered", errors.len());
            }
        }
    }

    Ok(())
}
