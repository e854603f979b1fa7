//! JSON file adapters for the round source and the estimate sink.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clr_core::error::{PersistenceError, SourceError};
use clr_core::traits::{ContributionSource, EstimateSink};
use clr_core::types::{CurveRecord, ProjectGroup, ProjectId};
use clr_engine::shaping::{
    eligible_projects, populate_groups, ContributionRow, GrantEntry, PhantomFundingRow, RoundWindow,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Unshaped rows for one round window.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RawSnapshot {
    pub window: RoundWindow,
    pub grants: Vec<GrantEntry>,
    #[serde(default)]
    pub contributions: Vec<ContributionRow>,
    #[serde(default)]
    pub phantom_funding: Vec<PhantomFundingRow>,
}

/// Accepted round file layouts.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum RoundFile {
    Groups(Vec<ProjectGroup>),
    Raw(RawSnapshot),
}

impl RoundFile {
    /// Eligible grant ids. Only a raw snapshot lists them.
    pub fn eligible(&self) -> BTreeSet<ProjectId> {
        match self {
            Self::Groups(_) => BTreeSet::new(),
            Self::Raw(raw) => eligible_projects(&raw.grants),
        }
    }

    pub fn into_groups(self) -> Vec<ProjectGroup> {
        match self {
            Self::Groups(groups) => groups,
            Self::Raw(raw) => populate_groups(
                &raw.grants,
                &raw.contributions,
                &raw.phantom_funding,
                &raw.window,
            ),
        }
    }
}

/// Reads each round from its own JSON file on demand.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    current: PathBuf,
    previous: Option<PathBuf>,
}

impl JsonFileSource {
    pub fn new(current: PathBuf, previous: Option<PathBuf>) -> Self {
        Self { current, previous }
    }

    fn read(path: &Path) -> Result<RoundFile, SourceError> {
        let bytes = fs::read(path)
            .map_err(|e| SourceError::Unavailable(format!("{}: {e}", path.display())))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| SourceError::Malformed(format!("{}: {e}", path.display())))
    }

    fn load(path: &Path) -> Result<Vec<ProjectGroup>, SourceError> {
        Ok(Self::read(path)?.into_groups())
    }
}

impl ContributionSource for JsonFileSource {
    fn current_round(&self) -> Result<Vec<ProjectGroup>, SourceError> {
        Self::load(&self.current)
    }

    fn previous_round(&self) -> Result<Vec<ProjectGroup>, SourceError> {
        match &self.previous {
            Some(path) => Self::load(path),
            None => Ok(Vec::new()),
        }
    }

    fn eligible_projects(&self) -> Result<BTreeSet<ProjectId>, SourceError> {
        Ok(Self::read(&self.current)?.eligible())
    }
}

#[derive(Serialize)]
struct DistributionLine {
    percentage_distributed: f64,
}

/// Appends one JSON object per line to the curves and distribution files.
#[derive(Debug)]
pub struct JsonLinesSink {
    curves: Mutex<File>,
    distribution: Mutex<File>,
}

impl JsonLinesSink {
    pub fn create(curves_path: &Path, distribution_path: &Path) -> Result<Self> {
        if let Some(dir) = curves_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        if let Some(dir) = distribution_path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        Ok(Self {
            curves: Mutex::new(open_append(curves_path)?),
            distribution: Mutex::new(open_append(distribution_path)?),
        })
    }
}

fn open_append(path: &Path) -> Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

fn write_line<T: Serialize>(file: &Mutex<File>, value: &T) -> Result<(), PersistenceError> {
    let mut line =
        serde_json::to_string(value).map_err(|e| PersistenceError::Serialization(e.to_string()))?;
    line.push('\n');

    let mut file = file.lock();
    let len = file
        .metadata()
        .map_err(|e| PersistenceError::Io(e.to_string()))?
        .len();
    if let Err(e) = file.write_all(line.as_bytes()) {
        // Drop whatever part of the line made it to disk.
        let _ = file.set_len(len);
        return Err(PersistenceError::Io(e.to_string()));
    }
    Ok(())
}

impl EstimateSink for JsonLinesSink {
    fn save_curve(&self, record: &CurveRecord) -> Result<(), PersistenceError> {
        write_line(&self.curves, record).map_err(|e| PersistenceError::Curve {
            project: record.project,
            reason: e.to_string(),
        })
    }

    fn save_distribution_pct(&self, percentage: f64) -> Result<(), PersistenceError> {
        write_line(
            &self.distribution,
            &DistributionLine {
                percentage_distributed: percentage,
            },
        )
        .map_err(|e| PersistenceError::Saturation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clr_core::types::{PredictionCurve, PredictionPoint, ProjectId, RawContribution};

    #[test]
    fn loads_group_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current.json");
        fs::write(
            &path,
            r#"[{"id":1,"contributions":[{"id":"a","sum_of_each_profiles_contributions":5.0,"is_verified":true}]}]"#,
        )
        .unwrap();
        let source = JsonFileSource::new(path, None);
        let groups = source.current_round().unwrap();
        assert_eq!(groups[0].contributions, vec![RawContribution::new("a", 5.0, true)]);
        assert!(source.previous_round().unwrap().is_empty());
    }

    #[test]
    fn loads_raw_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json");
        fs::write(
            &path,
            r#"{
                "window": {"start": "2020-06-01T00:00:00Z", "end": "2020-06-30T00:00:00Z"},
                "grants": [{"id": 4}],
                "contributions": [
                    {"grant_id": 4, "contributor_id": "a", "amount": 2.0, "created_at": "2020-06-02T00:00:00Z"},
                    {"grant_id": 4, "contributor_id": "a", "amount": 3.0, "created_at": "2020-06-03T00:00:00Z"}
                ]
            }"#,
        )
        .unwrap();
        let groups = JsonFileSource::new(path, None).current_round().unwrap();
        assert_eq!(groups[0].id, ProjectId(4));
        assert_eq!(groups[0].contributions, vec![RawContribution::new("a", 5.0, false)]);
    }

    #[test]
    fn missing_file_is_unavailable() {
        let source = JsonFileSource::new(PathBuf::from("/nonexistent/clr.json"), None);
        assert!(matches!(source.current_round(), Err(SourceError::Unavailable(_))));
    }

    #[test]
    fn garbage_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "{not json").unwrap();
        let source = JsonFileSource::new(path, None);
        assert!(matches!(source.current_round(), Err(SourceError::Malformed(_))));
    }

    #[test]
    fn sink_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let curves = dir.path().join("out/curves.jsonl");
        let dist = dir.path().join("out/distribution.jsonl");
        let sink = JsonLinesSink::create(&curves, &dist).unwrap();
        let now = Utc.with_ymd_and_hms(2020, 6, 15, 0, 0, 0).unwrap();
        let record = CurveRecord {
            project: ProjectId(1),
            curve: PredictionCurve {
                project: ProjectId(1),
                points: vec![PredictionPoint::ZERO; 6],
                estimable: false,
            },
            last_calc_at: now,
            next_calc_at: now,
            summary: None,
        };
        sink.save_curve(&record).unwrap();
        sink.save_curve(&record).unwrap();
        sink.save_distribution_pct(55.5).unwrap();

        let text = fs::read_to_string(&curves).unwrap();
        assert_eq!(text.lines().count(), 2);
        let back: CurveRecord = serde_json::from_str(text.lines().next().unwrap()).unwrap();
        assert_eq!(back, record);
        assert!(fs::read_to_string(&dist).unwrap().contains("55.5"));
    }

    #[test]
    fn snapshot_lists_grants_without_gifts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.json");
        fs::write(
            &path,
            r#"{
                "window": {"start": "2020-06-01T00:00:00Z", "end": "2020-06-30T00:00:00Z"},
                "grants": [{"id": 1}, {"id": 2}],
                "contributions": [
                    {"grant_id": 1, "contributor_id": "a", "amount": 2.0, "created_at": "2020-06-02T00:00:00Z"}
                ]
            }"#,
        )
        .unwrap();
        let source = JsonFileSource::new(path, None);
        assert_eq!(source.current_round().unwrap().len(), 1);
        let eligible: Vec<ProjectId> = source.eligible_projects().unwrap().into_iter().collect();
        assert_eq!(eligible, vec![ProjectId(1), ProjectId(2)]);
    }

    #[test]
    fn group_file_lists_no_extra_projects() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("current.json");
        fs::write(&path, r#"[{"id":1,"contributions":[]}]"#).unwrap();
        assert!(JsonFileSource::new(path, None).eligible_projects().unwrap().is_empty());
    }

    #[test]
    fn write_failure_is_reported_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readonly.jsonl");
        fs::write(&path, "").unwrap();
        let sink = JsonLinesSink {
            curves: Mutex::new(File::open(&path).unwrap()),
            distribution: Mutex::new(File::open(&path).unwrap()),
        };
        match sink.save_distribution_pct(1.0) {
            Err(PersistenceError::Saturation(reason)) => assert!(reason.starts_with("i/o:")),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
