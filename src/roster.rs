use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use csv::{Reader, Writer};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RosterError;
use crate::parser::parse_seconds;
use crate::schedule::Participant;

/// Where participant names and march times live. The planner only ever sees a
/// snapshot from `list_participants`; order carries no meaning.
pub trait RosterSource {
    fn list_participants(&self) -> Result<Vec<Participant>, RosterError>;

    fn upsert(&mut self, name: &str, travel_seconds: u32) -> Result<(), RosterError>;

    fn delete(&mut self, name: &str) -> Result<(), RosterError>;

    /// Upserts from a free-form duration ("1:30", "2m", ...); returns the parsed seconds
    fn upsert_raw(&mut self, name: &str, raw: &str) -> Result<u32, RosterError> {
        let seconds = parse_seconds(raw);
        if seconds == 0 {
            return Err(RosterError::InvalidDuration {
                name: name.trim().to_string(),
                raw: raw.to_string(),
            });
        }
        self.upsert(name, seconds)?;
        Ok(seconds)
    }
}

fn validate(name: &str, travel_seconds: u32) -> Result<String, RosterError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(RosterError::EmptyName);
    }
    if travel_seconds == 0 {
        return Err(RosterError::InvalidDuration {
            name: name.to_string(),
            raw: travel_seconds.to_string(),
        });
    }
    Ok(name.to_string())
}

fn to_participants(entries: &BTreeMap<String, u32>) -> Vec<Participant> {
    entries
        .iter()
        .map(|(name, &secs)| Participant::new(name.clone(), secs))
        .collect()
}

/// In-process roster, used by the web server when no file is configured
#[derive(Debug, Default, Clone)]
pub struct MemoryRoster {
    entries: BTreeMap<String, u32>,
}

impl MemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RosterSource for MemoryRoster {
    fn list_participants(&self) -> Result<Vec<Participant>, RosterError> {
        Ok(to_participants(&self.entries))
    }

    fn upsert(&mut self, name: &str, travel_seconds: u32) -> Result<(), RosterError> {
        let name = validate(name, travel_seconds)?;
        self.entries.insert(name, travel_seconds);
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), RosterError> {
        self.entries
            .remove(name.trim())
            .map(|_| ())
            .ok_or_else(|| RosterError::UnknownParticipant(name.trim().to_string()))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct RosterRow {
    name: String,
    travel_seconds: String,
}

/// Roster persisted as a `name,travel_seconds` CSV file, rewritten on every change
#[derive(Debug)]
pub struct CsvRoster {
    path: PathBuf,
    entries: BTreeMap<String, u32>,
}

impl CsvRoster {
    /// Loads the file if it exists; a missing file is an empty roster.
    /// Rows with an empty name or an unparseable time are skipped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RosterError> {
        let path = path.as_ref().to_path_buf();
        let mut entries = BTreeMap::new();

        if path.exists() {
            let csv_err = |source| RosterError::Csv {
                path: path.clone(),
                source,
            };
            let mut reader = Reader::from_path(&path).map_err(csv_err)?;
            for result in reader.deserialize::<RosterRow>() {
                let row = result.map_err(csv_err)?;
                let name = row.name.trim();
                // Travel times may be written by hand as "1:30" or "2m"
                let seconds = parse_seconds(&row.travel_seconds);
                if name.is_empty() || seconds == 0 {
                    warn!(name, raw = %row.travel_seconds, "skipping roster row");
                    continue;
                }
                entries.insert(name.to_string(), seconds);
            }
            debug!(path = %path.display(), count = entries.len(), "roster loaded");
        }

        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `entries` to the file, then adopts them. On failure the
    /// in-memory roster is left as it was.
    fn commit(&mut self, entries: BTreeMap<String, u32>) -> Result<(), RosterError> {
        let csv_err = |source| RosterError::Csv {
            path: self.path.clone(),
            source,
        };
        let mut writer = Writer::from_path(&self.path).map_err(csv_err)?;
        for (name, secs) in &entries {
            writer
                .serialize(RosterRow {
                    name: name.clone(),
                    travel_seconds: secs.to_string(),
                })
                .map_err(csv_err)?;
        }
        writer.flush().map_err(|source| RosterError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.entries = entries;
        Ok(())
    }
}

impl RosterSource for CsvRoster {
    fn list_participants(&self) -> Result<Vec<Participant>, RosterError> {
        Ok(to_participants(&self.entries))
    }

    fn upsert(&mut self, name: &str, travel_seconds: u32) -> Result<(), RosterError> {
        let name = validate(name, travel_seconds)?;
        let mut entries = self.entries.clone();
        entries.insert(name, travel_seconds);
        self.commit(entries)
    }

    fn delete(&mut self, name: &str) -> Result<(), RosterError> {
        let mut entries = self.entries.clone();
        if entries.remove(name.trim()).is_none() {
            return Err(RosterError::UnknownParticipant(name.trim().to_string()));
        }
        self.commit(entries)
    }
}
