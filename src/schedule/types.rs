use serde::{Deserialize, Serialize};

/// Seconds added to the enemy timer so our last march lands strictly before theirs.
pub const DEFENSE_BUFFER_SECS: u32 = 1;

/// A rally member and their fixed march time to the target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub id: String,
    pub travel_seconds: u32,
}

impl Participant {
    pub fn new(id: impl Into<String>, travel_seconds: u32) -> Self {
        Self {
            id: id.into(),
            travel_seconds,
        }
    }

    /// Builds anonymous participants ("#1", "#2", ...) from a batch of march times
    pub fn from_travel_times(times: &[u32]) -> Vec<Self> {
        times
            .iter()
            .enumerate()
            .map(|(i, &t)| Self::new(format!("#{}", i + 1), t))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every march lands together; the slowest participant sets impact.
    Attack,
    /// Reinforcements land just before the enemy rally does.
    Defense,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Attack => "attack",
            Mode::Defense => "defense",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attack" | "atk" => Ok(Mode::Attack),
            "defense" | "defence" | "def" => Ok(Mode::Defense),
            other => Err(format!("unknown mode '{}'", other)),
        }
    }
}

/// Structure or rally being hit (attack) or protected (defense)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub mode: Mode,
    #[serde(default)]
    pub enemy_march_seconds: u32,
    #[serde(default)]
    pub enemy_rally_seconds: u32,
}

impl Target {
    pub fn attack(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Attack,
            enemy_march_seconds: 0,
            enemy_rally_seconds: 0,
        }
    }

    pub fn defense(name: impl Into<String>, enemy_rally_seconds: u32, enemy_march_seconds: u32) -> Self {
        Self {
            name: name.into(),
            mode: Mode::Defense,
            enemy_march_seconds,
            enemy_rally_seconds,
        }
    }

    /// Whether the operator supplied an enemy timer (defense without the pure-sync fallback)
    pub fn has_enemy_timer(&self) -> bool {
        self.mode == Mode::Defense && self.enemy_rally_seconds.saturating_add(self.enemy_march_seconds) > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// First to leave, at the locked start when its wait is zero.
    Starter,
    /// Departure position, 1-based over the whole plan (the first follower is 2).
    Follower(u32),
}

/// One participant's departure instruction relative to the locked start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub participant_id: String,
    pub travel_seconds: u32,
    /// impact - travel; negative only for late defense entries
    pub wait_seconds: i64,
    pub is_late: bool,
    pub role: Role,
}

/// A resolved target: ordered departures plus everyone left out and why
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub target: Target,
    pub impact_seconds: u32,
    /// Non-late entries in departure order
    pub entries: Vec<ScheduleEntry>,
    /// Defense entries whose march exceeds the time to impact
    pub late: Vec<ScheduleEntry>,
    /// Participants cut by the capacity limit
    pub reserves: Vec<Participant>,
}

impl Plan {
    /// Seconds after lock at which the enemy lands, for defense targets with a timer
    pub fn enemy_impact_seconds(&self) -> Option<u32> {
        self.target.has_enemy_timer().then_some(self.impact_seconds)
    }
}
