use std::{
    fmt::Write as _,
    fs::OpenOptions,
    io::{self, Write},
    path::{Path, PathBuf},
};

use log::warn;

use crate::orchestration::RoundRecord;

/// Append only text log with one `round, participant_id, loss, accuracy` line per
/// participant per evaluated round.
///
/// Writing is best effort, failures are logged and otherwise ignored.
#[derive(Debug, Clone)]
pub struct EvaluationLog {
    path: PathBuf,
}

impl EvaluationLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the evaluations of `record`.
    pub fn append(&self, record: &RoundRecord) {
        if let Err(e) = self.try_append(record) {
            warn!(path:? = self.path; "could not write evaluation log: {e}");
        }
    }

    fn try_append(&self, record: &RoundRecord) -> io::Result<()> {
        let lines = format_lines(record);
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.write_all(lines.as_bytes())
    }
}

/// Renders the log lines of a round, accuracy is `nan` when not reported.
pub fn format_lines(record: &RoundRecord) -> String {
    record
        .evaluations
        .iter()
        .fold(String::new(), |mut out, eval| {
            let accuracy = match eval.accuracy {
                Some(accuracy) => accuracy.to_string(),
                None => "nan".to_string(),
            };
            let _ = writeln!(
                out,
                "{}, {}, {}, {}",
                record.round, eval.participant, eval.loss, accuracy
            );
            out
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{
        orchestration::ParticipantEvaluation,
        participants::ParticipantId,
        results::Metrics,
    };

    fn record(round: usize) -> RoundRecord {
        RoundRecord {
            round,
            loss: 0.5,
            metrics: Metrics::new(),
            fit_metrics: Metrics::new(),
            fit_participants: Vec::new(),
            evaluate_participants: Vec::new(),
            evaluations: vec![
                ParticipantEvaluation {
                    participant: ParticipantId::from("a"),
                    loss: 0.25,
                    accuracy: Some(0.75),
                },
                ParticipantEvaluation {
                    participant: ParticipantId::from("b"),
                    loss: 1.5,
                    accuracy: None,
                },
            ],
            failures: Vec::new(),
        }
    }

    #[test]
    fn lines_follow_the_log_format() {
        assert_eq!(format_lines(&record(3)), "3, a, 0.25, 0.75\n3, b, 1.5, nan\n");
    }

    #[test]
    fn appends_across_rounds() {
        let path = std::env::temp_dir().join(format!("fed-orchestra-log-{}.txt", std::process::id()));
        let _ = fs::remove_file(&path);

        let log = EvaluationLog::new(&path);
        log.append(&record(1));
        log.append(&record(2));

        let content = fs::read_to_string(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.starts_with("1, a"));
    }

    #[test]
    fn unwritable_path_is_not_fatal() {
        let log = EvaluationLog::new("/nonexistent-dir/for/sure/log.txt");
        log.append(&record(1));
    }
}
