// ============================================================
// Layer 6 — Score Files
// ============================================================
// One file per (chunk, n_units, epoch):
//
//   {output_dir}/outlier-factors-{chunk}-{n_units}-{epoch}.csv
//
// Each line is "<event_id>, <outlier_factor>", in chunk timestep
// order starting at event 0. The column order is what ROC
// analysis joins on and must not change.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::domain::error::{LogModelError, LogModelResult};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub id:    String,
    pub score: f64,
}

/// Streams score rows into a freshly truncated file.
pub struct ScoreWriter {
    path:   PathBuf,
    writer: BufWriter<File>,
    rows:   usize,
}

impl ScoreWriter {
    pub fn create(path: impl Into<PathBuf>) -> LogModelResult<Self> {
        let path   = path.into();
        let writer = BufWriter::new(File::create(&path)?);
        Ok(Self { path, writer, rows: 0 })
    }

    pub fn write(&mut self, id: &str, score: f64) -> LogModelResult<()> {
        writeln!(self.writer, "{id}, {score}")?;
        self.rows += 1;
        Ok(())
    }

    /// Flush to disk and return the number of rows written.
    pub fn finish(mut self) -> LogModelResult<usize> {
        self.writer.flush()?;
        tracing::debug!("Wrote {} scores to '{}'", self.rows, self.path.display());
        Ok(self.rows)
    }
}

pub fn score_file_name(chunk: usize, n_units: usize, epoch: usize) -> String {
    format!("outlier-factors-{chunk}-{n_units}-{epoch}.csv")
}

/// Parse a score file. Ids may contain commas; the score is
/// everything after the last one.
pub fn read_scores(path: &Path) -> LogModelResult<Vec<ScoreRecord>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let invalid = || {
                LogModelError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("malformed score line in '{}': '{line}'", path.display()),
                ))
            };
            let (id, score) = line.rsplit_once(',').ok_or_else(invalid)?;
            Ok(ScoreRecord {
                id:    id.trim().to_string(),
                score: score.trim().parse().map_err(|_| invalid())?,
            })
        })
        .collect()
}
