//! Error types for rally planning and live sessions.

use std::path::PathBuf;

use thiserror::Error;

/// Process exit codes for the `rally-sync` binary.
pub struct ExitCode;

impl ExitCode {
    pub const SUCCESS: i32 = 0;
    pub const ERROR: i32 = 1;
    /// Invalid flags or environment overrides.
    pub const CONFIG_ERROR: i32 = 2;
    /// Roster file could not be read or written.
    pub const IO_ERROR: i32 = 3;
    /// Inputs did not produce a schedule.
    pub const SCHEDULE_ERROR: i32 = 4;
    pub const SESSION_ERROR: i32 = 5;
    /// Interrupted by Ctrl+C while a session was live.
    pub const INTERRUPTED: i32 = 130;
}

/// Top-level error aggregating every domain error.
#[derive(Debug, Error)]
pub enum RallyError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Roster(#[from] RosterError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted")]
    Interrupted,
}

impl RallyError {
    /// Maps the error to the exit code the binary terminates with.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => ExitCode::CONFIG_ERROR,
            Self::Schedule(_) | Self::Allocation(_) => ExitCode::SCHEDULE_ERROR,
            Self::Session(_) => ExitCode::SESSION_ERROR,
            Self::Roster(RosterError::Io { .. } | RosterError::Csv { .. }) | Self::Io(_) => {
                ExitCode::IO_ERROR
            }
            Self::Roster(_) => ExitCode::ERROR,
            Self::Interrupted => ExitCode::INTERRUPTED,
        }
    }
}

/// Validation failures raised before a plan can be built.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// Impact cannot be derived from an empty participant set.
    #[error("no participants for target '{target}'")]
    NoParticipants { target: String },

    #[error("participant '{participant}' listed twice for target '{target}'")]
    DuplicateParticipant { target: String, participant: String },

    #[error("target '{name}' declared more than once")]
    DuplicateTarget { name: String },

    #[error("no targets declared")]
    NoTargets,
}

/// Internal invariant violations of the waterfall allocator.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    #[error("participant '{participant}' assigned to both '{first}' and '{second}'")]
    Conflict {
        participant: String,
        first: String,
        second: String,
    },
}

/// Rejected operator commands.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("sequence already running")]
    AlreadyRunning,

    #[error("nothing scheduled; recompute the plan first")]
    NothingScheduled,
}

/// Roster source failures.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The duration expression parsed to zero seconds.
    #[error("invalid travel time '{raw}' for '{name}'")]
    InvalidDuration { name: String, raw: String },

    #[error("participant name must not be empty")]
    EmptyName,

    #[error("unknown participant '{0}'")]
    UnknownParticipant(String),

    #[error("roster file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("roster file {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Engine configuration outside its supported range.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tick interval must be within (0, 1s], got {0:?}")]
    TickInterval(std::time::Duration),

    #[error("grace period must be within [2s, 5s], got {0:?}")]
    GracePeriod(std::time::Duration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let err: RallyError = ScheduleError::NoTargets.into();
        assert_eq!(err.exit_code(), ExitCode::SCHEDULE_ERROR);

        let err: RallyError = SessionError::AlreadyRunning.into();
        assert_eq!(err.exit_code(), ExitCode::SESSION_ERROR);

        let err: RallyError = RosterError::Io {
            path: PathBuf::from("roster.csv"),
            source: std::io::Error::other("disk gone"),
        }
        .into();
        assert_eq!(err.exit_code(), ExitCode::IO_ERROR);

        let err: RallyError = RosterError::EmptyName.into();
        assert_eq!(err.exit_code(), ExitCode::ERROR);
    }

    #[test]
    fn test_messages() {
        let err = ScheduleError::NoParticipants {
            target: "Castle".to_string(),
        };
        assert_eq!(err.to_string(), "no participants for target 'Castle'");
        assert_eq!(
            SessionError::AlreadyRunning.to_string(),
            "sequence already running"
        );
    }
}
