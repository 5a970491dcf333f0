use gpbackup_core::Error;
use std::fmt;

/// How a backup run ended.
#[derive(Debug)]
pub enum Outcome {
    Succeeded,

    /// The backup finished but the rows of these tables were not copied.
    TableFailures(Vec<String>),

    /// The backup stopped early.
    Aborted(Error),
}

impl Outcome {
    /// Process exit code: 0 on success, 1 when only tables failed, 2 on
    /// abort.
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Succeeded => 0,
            Outcome::TableFailures(_) => 1,
            Outcome::Aborted(_) => 2,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Aborted(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Succeeded => f.write_str("backup completed successfully"),
            Outcome::TableFailures(tables) => write!(
                f,
                "backup completed with {} failed table(s): {}",
                tables.len(),
                tables.join(", ")
            ),
            Outcome::Aborted(err) => write!(f, "backup failed: {err}"),
        }
    }
}
