//! Pedigree tables: recorded input and corrected output.
//!
//! Input is whitespace-delimited `id sire dam [birth]`, one individual per
//! line. Unknown parents are written as `0`, `NA`, `.` or left empty; an
//! optional header line starting with `id` is skipped. Output adds the
//! per-parent resolution status and exclusion score.

use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// One recorded pedigree row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PedigreeEntry {
    pub id: String,
    pub sire: Option<String>,
    pub dam: Option<String>,
    /// Birth date on any numeric scale (days, years, ...).
    pub birth_date: Option<f64>,
}

impl PedigreeEntry {
    pub fn new(id: &str, sire: Option<&str>, dam: Option<&str>) -> Self {
        Self {
            id: id.to_string(),
            sire: sire.map(str::to_string),
            dam: dam.map(str::to_string),
            birth_date: None,
        }
    }

    pub fn with_birth_date(mut self, birth_date: f64) -> Self {
        self.birth_date = Some(birth_date);
        self
    }
}

/// How a recorded parent fared against the genotypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParentStatus {
    /// The recorded parent was confirmed and kept.
    Unchanged,
    /// The recorded parent was replaced (or filled in) by a better candidate.
    Resolved,
    /// No candidate could be accepted; the recorded parent is left as is.
    Unresolved,
}

impl ParentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentStatus::Unchanged => "unchanged",
            ParentStatus::Resolved => "resolved",
            ParentStatus::Unresolved => "unresolved",
        }
    }
}

/// Outcome for one parent of one offspring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentOutcome {
    /// Parent identifier after correction.
    pub id: Option<String>,
    pub status: ParentStatus,
    /// Exclusion score of the kept or assigned parent.
    pub score: Option<f64>,
    /// Runner-up score minus best score; `None` without a runner-up.
    pub margin: Option<f64>,
}

impl ParentOutcome {
    /// Leave the recorded parent untouched and flag it.
    pub fn unresolved(recorded: Option<&String>) -> Self {
        Self {
            id: recorded.cloned(),
            status: ParentStatus::Unresolved,
            score: None,
            margin: None,
        }
    }
}

/// One corrected pedigree row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrectedRecord {
    pub id: String,
    pub recorded_sire: Option<String>,
    pub recorded_dam: Option<String>,
    pub birth_date: Option<f64>,
    pub sire: ParentOutcome,
    pub dam: ParentOutcome,
}

/// Parse a parent field, mapping the unknown-parent codes to `None`.
pub fn parse_parent(field: &str) -> Option<String> {
    match field.trim() {
        "" | "0" | "NA" | "." => None,
        s => Some(s.to_string()),
    }
}

/// Parse a pedigree file.
pub fn parse_pedigree_file(path: &Path) -> Result<Vec<PedigreeEntry>> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pedigree file: {}", path.display()))?;

    let mut entries = Vec::new();
    let mut seen_data = false;
    for (line_num, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        // Only the first non-comment line may be a header.
        if !seen_data {
            seen_data = true;
            if fields[0].eq_ignore_ascii_case("id") {
                continue;
            }
        }
        if fields.len() < 3 {
            bail!("Pedigree file line {} has fewer than 3 fields", line_num + 1);
        }
        let birth_date = match fields.get(3) {
            None => None,
            Some(&("NA" | ".")) => None,
            Some(s) => Some(s.parse::<f64>().with_context(|| {
                format!("Pedigree file line {}: bad birth date '{}'", line_num + 1, s)
            })?),
        };
        entries.push(PedigreeEntry {
            id: fields[0].to_string(),
            sire: parse_parent(fields[1]),
            dam: parse_parent(fields[2]),
            birth_date,
        });
    }
    Ok(entries)
}

/// Write corrected records as a tab-separated table.
pub fn write_corrected<W: Write>(writer: &mut W, records: &[CorrectedRecord]) -> Result<()> {
    writeln!(writer, "id\tsire\tdam\tsire_status\tdam_status\tsire_score\tdam_score")?;
    for r in records {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            r.id,
            r.sire.id.as_deref().unwrap_or("0"),
            r.dam.id.as_deref().unwrap_or("0"),
            r.sire.status.as_str(),
            r.dam.status.as_str(),
            format_score(r.sire.score),
            format_score(r.dam.score),
        )?;
    }
    Ok(())
}

/// Write corrected records to a file.
pub fn write_corrected_file(path: &Path, records: &[CorrectedRecord]) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create pedigree file: {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    write_corrected(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}

fn format_score(score: Option<f64>) -> String {
    score.map_or_else(|| "NA".to_string(), |s| format!("{:.6}", s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parent_codes() {
        assert_eq!(parse_parent("0"), None);
        assert_eq!(parse_parent("NA"), None);
        assert_eq!(parse_parent("."), None);
        assert_eq!(parse_parent(" S1 "), Some("S1".to_string()));
    }

    #[test]
    fn test_parse_pedigree_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ped.txt");
        std::fs::write(
            &path,
            "id sire dam birth\n\
             A 0 0 2010\n\
             B 0 0 NA\n\
             C A B 2015.5\n\
             \n\
             D A 0\n",
        )
        .unwrap();

        let ped = parse_pedigree_file(&path).unwrap();
        assert_eq!(ped.len(), 4);
        assert_eq!(ped[0], PedigreeEntry::new("A", None, None).with_birth_date(2010.0));
        assert_eq!(ped[1].birth_date, None);
        assert_eq!(ped[2].sire.as_deref(), Some("A"));
        assert_eq!(ped[2].dam.as_deref(), Some("B"));
        assert_eq!(ped[2].birth_date, Some(2015.5));
        assert_eq!(ped[3].dam, None);
    }

    #[test]
    fn test_parse_rejects_short_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ped.txt");
        std::fs::write(&path, "A 0\n").unwrap();
        assert!(parse_pedigree_file(&path).is_err());
    }

    #[test]
    fn test_header_after_comment_and_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ped.txt");

        std::fs::write(&path, "# exported pedigree\n\nid sire dam birth\nK S1 D1 2020\n").unwrap();
        let entries = parse_pedigree_file(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "K");
        assert_eq!(entries[0].birth_date, Some(2020.0));

        std::fs::write(&path, "# exported pedigree\nid sire dam\nK S1 D1\n").unwrap();
        let entries = parse_pedigree_file(&path).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].sire.as_deref(), Some("S1"));

        // A later line starting with "id" is data.
        std::fs::write(&path, "K S1 D1\nid S1 D1\n").unwrap();
        assert_eq!(parse_pedigree_file(&path).unwrap().len(), 2);
    }

    #[test]
    fn test_write_corrected() {
        let record = CorrectedRecord {
            id: "C".into(),
            recorded_sire: Some("X".into()),
            recorded_dam: None,
            birth_date: None,
            sire: ParentOutcome {
                id: Some("A".into()),
                status: ParentStatus::Resolved,
                score: Some(0.0),
                margin: Some(0.2),
            },
            dam: ParentOutcome::unresolved(None),
        };
        let mut out = Vec::new();
        write_corrected(&mut out, &[record]).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "C\tA\t0\tresolved\tunresolved\t0.000000\tNA");
    }
}
