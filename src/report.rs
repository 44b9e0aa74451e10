//! Markdown tables from persisted benchmark results.
//!
//! Rows are read with a loose schema so that one malformed group costs only
//! that group: it is reported as a [`ReportSchemaError`] and the other groups
//! still render.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use serde::Deserialize;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{ReportError, ReportSchemaError};

const HEADER: [&str; 4] = [
    "Library",
    "Median (ms)",
    "Operations per second",
    "Output size (KiB)",
];

/// The subset of a persisted measurement the reporter reads.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ResultRow {
    pub group: String,
    pub lib: String,
    /// Seconds per call.
    pub median: Option<f64>,
    pub ops: Option<f64>,
    pub output_size: Option<u64>,
}

#[derive(Deserialize)]
struct ResultFile {
    measurements: Vec<ResultRow>,
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, ReportError> {
    let mut out = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "json")
        {
            out.push(entry.into_path());
        }
    }
    Ok(out)
}

pub fn read_results(path: &Path) -> Result<Vec<ResultRow>, ReportError> {
    let text = fs::read_to_string(path).map_err(|source| ReportError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let file: ResultFile = serde_json::from_str(&text).map_err(|source| ReportError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), rows = file.measurements.len(), "loaded results");
    Ok(file.measurements)
}

/// Reads every file in `paths`, walking directories for `*.json`, and
/// concatenates their rows in order.
pub fn load_results(paths: &[PathBuf]) -> Result<Vec<ResultRow>, ReportError> {
    let mut rows = Vec::new();
    for path in paths {
        if path.is_dir() {
            for file in json_files(path)? {
                rows.extend(read_results(&file)?);
            }
        } else {
            rows.extend(read_results(path)?);
        }
    }
    Ok(rows)
}

fn justify(row: &[String], widths: &[usize]) -> String {
    let cells: Vec<String> = row
        .iter()
        .zip(widths)
        .enumerate()
        .map(|(i, (cell, &w))| {
            if i == 0 {
                format!("{cell:<w$}")
            } else {
                format!("{cell:>w$}")
            }
        })
        .collect();
    format!("| {} |", cells.join(" | "))
}

/// Pipe table; first column left-aligned, the rest right-aligned.
pub fn format_table(header: &[&str], table: &[Vec<String>]) -> String {
    let header: Vec<String> = header.iter().map(|h| h.to_string()).collect();
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            std::iter::once(&header)
                .chain(table)
                .map(|row| row[i].chars().count())
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separator: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            let dashes = "-".repeat(w + 1);
            if i == 0 {
                format!(":{dashes}")
            } else {
                format!("{dashes}:")
            }
        })
        .collect();

    let mut lines = Vec::with_capacity(table.len() + 2);
    lines.push(justify(&header, &widths));
    lines.push(format!("|{}|", separator.join("|")));
    lines.extend(table.iter().map(|row| justify(row, &widths)));
    lines.join("\n")
}

fn require(
    value: Option<f64>,
    group: &str,
    row: &ResultRow,
    field: &'static str,
) -> Result<f64, ReportSchemaError> {
    value.ok_or_else(|| ReportSchemaError::MissingField {
        group: group.to_string(),
        lib: row.lib.clone(),
        field,
    })
}

/// One `####` section. The size column appears only when every row has one.
pub fn render_group(group: &str, rows: &[&ResultRow]) -> Result<String, ReportSchemaError> {
    let with_size = rows.first().is_some_and(|r| r.output_size.is_some());
    let mut table = Vec::with_capacity(rows.len());
    for row in rows {
        let median = require(row.median, group, row, "median")?;
        let ops = require(row.ops, group, row, "ops")?;
        let mut cells = vec![
            row.lib.clone(),
            format!("{:.3}", median * 1000.0),
            format!("{ops:.2}"),
        ];
        match (with_size, row.output_size) {
            (true, Some(size)) => cells.push((size / 1024).to_string()),
            (false, None) => {}
            _ => {
                return Err(ReportSchemaError::InconsistentOutputSize {
                    group: group.to_string(),
                    lib: row.lib.clone(),
                })
            }
        }
        table.push(cells);
    }

    let columns = if with_size { 4 } else { 3 };
    Ok(format!(
        "#### {group}\n\n{}\n\n",
        format_table(&HEADER[..columns], &table)
    ))
}

/// Renders all groups in sorted order; rows keep their arrival order.
///
/// Groups that fail schema checks are left out and returned alongside.
pub fn render_markdown(rows: &[ResultRow]) -> (String, Vec<ReportSchemaError>) {
    let mut groups: BTreeMap<&str, Vec<&ResultRow>> = BTreeMap::new();
    for row in rows {
        groups.entry(row.group.as_str()).or_default().push(row);
    }
    let groups: Vec<(&str, Vec<&ResultRow>)> = groups.into_iter().collect();

    let rendered: Vec<Result<String, ReportSchemaError>> = groups
        .par_iter()
        .map(|(group, rows)| render_group(group, rows))
        .collect();

    let mut out = String::new();
    let mut errors = Vec::new();
    for section in rendered {
        match section {
            Ok(s) => out.push_str(&s),
            Err(e) => errors.push(e),
        }
    }
    (out, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn row(group: &str, lib: &str, median: f64, ops: f64, size: Option<u64>) -> ResultRow {
        ResultRow {
            group: group.to_string(),
            lib: lib.to_string(),
            median: Some(median),
            ops: Some(ops),
            output_size: size,
        }
    }

    #[test]
    fn test_exact_markdown() {
        let rows = vec![
            row("struct serialization", "rmp", 0.00125, 800.0, Some(2048)),
            row("struct serialization", "rmp-serde", 0.0105, 95.238, Some(4095)),
            row("struct deserialization", "rmp", 0.0005, 2000.0, None),
        ];
        let (md, errors) = render_markdown(&rows);
        assert!(errors.is_empty());
        let expected = "\
#### struct deserialization

| Library | Median (ms) | Operations per second |
|:--------|------------:|----------------------:|
| rmp     |       0.500 |               2000.00 |

#### struct serialization

| Library   | Median (ms) | Operations per second | Output size (KiB) |
|:----------|------------:|----------------------:|------------------:|
| rmp       |       1.250 |                800.00 |                 2 |
| rmp-serde |      10.500 |                 95.24 |                 3 |

";
        assert_eq!(md, expected);
    }

    #[test]
    fn test_group_order_independent_of_arrival() {
        let a = row("a", "rmp", 0.001, 1000.0, None);
        let b = row("b", "rmp", 0.002, 500.0, None);
        let (first, _) = render_markdown(&[a.clone(), b.clone()]);
        let (second, _) = render_markdown(&[b, a]);
        assert_eq!(first, second);
        assert!(first.starts_with("#### a\n"));
    }

    #[test]
    fn test_rows_keep_arrival_order() {
        let (md, _) = render_markdown(&[
            row("g", "zeta", 0.001, 1.0, None),
            row("g", "alpha", 0.001, 1.0, None),
        ]);
        let zeta = md.find("zeta").unwrap();
        let alpha = md.find("alpha").unwrap();
        assert!(zeta < alpha);
    }

    #[test]
    fn test_multibyte_width() {
        let table = format_table(&["Library"], &[vec!["ぁぁぁぁぁぁぁぁ".to_string()]]);
        assert_eq!(
            table,
            "| Library  |\n|:---------|\n| ぁぁぁぁぁぁぁぁ |"
        );
    }

    #[test]
    fn test_bad_group_is_skipped() {
        let mut missing = row("broken", "rmp", 0.001, 1.0, None);
        missing.ops = None;
        let rows = vec![
            missing,
            row("mixed", "rmp", 0.001, 1.0, Some(10)),
            row("mixed", "rmp-serde", 0.001, 1.0, None),
            row("fine", "rmp", 0.001, 1.0, None),
        ];
        let (md, errors) = render_markdown(&rows);
        assert!(md.contains("#### fine"));
        assert!(!md.contains("#### broken"));
        assert!(!md.contains("#### mixed"));
        assert_eq!(
            errors,
            [
                ReportSchemaError::MissingField {
                    group: "broken".to_string(),
                    lib: "rmp".to_string(),
                    field: "ops",
                },
                ReportSchemaError::InconsistentOutputSize {
                    group: "mixed".to_string(),
                    lib: "rmp-serde".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_load_results_walks_directories() {
        let dir = tempfile::tempdir().unwrap();
        let doc = r#"{"run": {"seed": 0}, "measurements": [
            {"group": "uuid serialization", "lib": "rmp", "median": 0.001, "ops": 1000.0, "output_size": 3700},
            {"group": "uuid serialization", "lib": "rmp-serde", "median": 0.002, "ops": 500.0}
        ]}"#;
        let mut f = fs::File::create(dir.path().join("a.json")).unwrap();
        f.write_all(doc.as_bytes()).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let rows = load_results(&[dir.path().to_path_buf()]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].output_size, Some(3700));
        assert_eq!(rows[1].output_size, None);

        let err = load_results(&[dir.path().join("notes.txt")]).unwrap_err();
        assert!(matches!(err, ReportError::Parse { .. }));
        let err = load_results(&[dir.path().join("missing.json")]).unwrap_err();
        assert!(matches!(err, ReportError::Read { .. }));
    }
}
