use serde::Serialize;

/// A single item that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    pub item: String,
    pub error: String,
}

/// What a pipeline command did, for display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub operation: String,
    pub target: Option<String>,
    pub total: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failures: Vec<Failure>,
    pub notes: Vec<String>,
}

impl RunReport {
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn fail(&mut self, item: impl Into<String>, error: impl ToString) {
        self.failures.push(Failure {
            item: item.into(),
            error: error.to_string(),
        });
    }

    pub fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    /// Fold another report's counts into this one.
    pub fn absorb(&mut self, other: RunReport) {
        self.total += other.total;
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failures.extend(other.failures);
        self.notes.extend(other.notes);
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absorb() {
        let mut report = RunReport::new("upload");
        report.total = 2;
        report.succeeded = 2;

        let mut other = RunReport::new("upload");
        other.total = 3;
        other.succeeded = 1;
        other.skipped = 1;
        other.fail("page_2.json", "boom");

        report.absorb(other);
        assert_eq!(report.total, 5);
        assert_eq!(report.succeeded, 3);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.is_clean());
    }
}
