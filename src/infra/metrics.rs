// ============================================================
// Layer 6 — Stat Log
// ============================================================
// Records held-out perplexity after every training epoch.
//
// Output file: {output_dir}/stat-{chunk}-{n_units}.csv
//
// One line per completed epoch, appended, no header:
//   1, 7.914207
//   2, 6.203311
//   ...
//
// perplexity = 2^(mean evaluation loss in bits). The file is
// opened in append mode, so a resumed run continues the same log.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::domain::error::{LogModelError, LogModelResult};

/// One row of the stat log
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStat {
    pub epoch:      usize,
    pub perplexity: f64,
}

impl EpochStat {
    /// Build a row from a mean base-2 log-loss.
    pub fn from_mean_loss(epoch: usize, mean_loss: f64) -> Self {
        Self { epoch, perplexity: mean_loss.exp2() }
    }
}

/// Append-only "epoch, perplexity" log for one (chunk, n_units).
#[derive(Debug, Clone)]
pub struct StatLog {
    path: PathBuf,
}

impl StatLog {
    pub fn new(dir: &Path, chunk: usize, n_units: usize) -> Self {
        Self { path: dir.join(stat_file_name(chunk, n_units)) }
    }

    /// Append one epoch's row. Creates the file on first use.
    pub fn append(&self, stat: EpochStat) -> LogModelResult<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        writeln!(f, "{}, {}", stat.epoch, stat.perplexity)?;

        tracing::debug!(
            "Logged epoch {} perplexity={:.4} to '{}'",
            stat.epoch, stat.perplexity, self.path.display(),
        );
        Ok(())
    }

    /// Read every row back. A missing file is an empty log.
    pub fn read(&self) -> LogModelResult<Vec<EpochStat>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(&self.path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(parse_row)
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn stat_file_name(chunk: usize, n_units: usize) -> String {
    format!("stat-{chunk}-{n_units}.csv")
}

fn parse_row(line: &str) -> LogModelResult<EpochStat> {
    let malformed = || {
        LogModelError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed stat line: '{line}'"),
        ))
    };
    let (epoch, perplexity) = line.split_once(',').ok_or_else(malformed)?;
    Ok(EpochStat {
        epoch:      epoch.trim().parse().map_err(|_| malformed())?,
        perplexity: perplexity.trim().parse().map_err(|_| malformed())?,
    })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perplexity_is_two_to_the_loss() {
        let stat = EpochStat::from_mean_loss(3, 2.5);
        assert_eq!(stat.epoch, 3);
        assert!((stat.perplexity - 2f64.powf(2.5)).abs() < 1e-12);
        assert_eq!(EpochStat::from_mean_loss(1, 0.0).perplexity, 1.0);
    }

    #[test]
    fn test_append_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatLog::new(dir.path(), 1, 8);
        assert!(log.read().unwrap().is_empty());

        log.append(EpochStat { epoch: 1, perplexity: 7.5 }).unwrap();
        log.append(EpochStat { epoch: 2, perplexity: 6.25 }).unwrap();

        assert!(log.path().ends_with("stat-1-8.csv"));
        let text = fs::read_to_string(log.path()).unwrap();
        assert_eq!(text, "1, 7.5\n2, 6.25\n");

        let rows = log.read().unwrap();
        assert_eq!(rows, vec![
            EpochStat { epoch: 1, perplexity: 7.5 },
            EpochStat { epoch: 2, perplexity: 6.25 },
        ]);
    }

    #[test]
    fn test_malformed_row() {
        assert!(parse_row("not a row").is_err());
        assert!(parse_row("x, 1.0").is_err());
    }
}
