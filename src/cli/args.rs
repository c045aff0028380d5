//! Clap derive structs for the `rally-sync` command line.

use std::path::PathBuf;
use std::time::Duration;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::config::EngineConfig;
use crate::parser::parse_seconds;
use crate::schedule::{CapacityPolicy, Mode, Target};

/// Rally synchronization planner: who marches when so everyone lands together.
#[derive(Parser, Debug)]
#[command(name = "rally-sync", author, version, about)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Timing knobs shared by every live session.
#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    /// Live timeline tick (e.g. "100ms").
    #[arg(long, global = true, default_value = "100ms", env = "RALLY_SYNC_TICK", value_parser = humantime::parse_duration)]
    pub tick: Duration,

    /// Display countdown before the start locks, in seconds.
    #[arg(long, global = true, default_value_t = 5, env = "RALLY_SYNC_COUNTDOWN")]
    pub countdown: u32,

    /// How long the final state stays up once everything resolved (2s-5s).
    #[arg(long, global = true, default_value = "3s", env = "RALLY_SYNC_GRACE", value_parser = humantime::parse_duration)]
    pub grace: Duration,

    /// Which entries to keep when a target is capped.
    #[arg(long, global = true, value_enum, default_value_t = CapacityPolicy::ClosestToSlowest)]
    pub policy: CapacityPolicy,
}

impl EngineArgs {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig {
            tick_interval: self.tick,
            pre_countdown_secs: self.countdown,
            grace_period: self.grace,
            capacity_policy: self.policy,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan an attack rally from a batch of march times.
    Attack(AttackArgs),

    /// Plan reinforcements that land just after an incoming enemy rally.
    Defense(DefenseArgs),

    /// Split a saved roster across several targets.
    Waterfall(WaterfallArgs),

    /// Manage the saved roster file.
    Roster(RosterCommand),

    /// Run the HTTP API.
    Serve(ServeArgs),
}

/// Options shared by the ad-hoc planning commands.
#[derive(Args, Debug)]
pub struct BatchArgs {
    /// March times separated by spaces or commas ("45 1:30 2m").
    #[arg(short, long, required = true, num_args = 1..)]
    pub times: Vec<String>,

    /// Keep at most this many marches.
    #[arg(long)]
    pub cap: Option<usize>,

    /// Run the live timeline after printing the plan (Ctrl-C cancels).
    #[arg(long)]
    pub live: bool,
}

#[derive(Args, Debug)]
pub struct AttackArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    #[arg(long, default_value = "Enemy")]
    pub target: String,
}

#[derive(Args, Debug)]
pub struct DefenseArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    #[arg(long, default_value = "Keep")]
    pub target: String,

    /// Time left on the enemy rally ("5:00").
    #[arg(long, value_parser = parse_duration_arg)]
    pub enemy_rally: u32,

    /// Enemy march time once the rally launches.
    #[arg(long, default_value = "0", value_parser = parse_duration_arg)]
    pub enemy_march: u32,
}

#[derive(Args, Debug)]
pub struct WaterfallArgs {
    /// Roster CSV (`name,travel_seconds`).
    #[arg(short, long, env = "RALLY_SYNC_ROSTER")]
    pub roster: PathBuf,

    /// Target as `name=attack` or `name=defense,RALLY[,MARCH]`, in priority order.
    #[arg(long = "target", required = true, value_parser = parse_target_arg)]
    pub targets: Vec<Target>,

    /// Marches per target.
    #[arg(long)]
    pub cap: Option<usize>,

    /// Pin participants to a target: `name=alice,bob`.
    #[arg(long = "override", value_parser = parse_override_arg)]
    pub overrides: Vec<(String, Vec<String>)>,

    /// Also write the plan text to this file.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub live: bool,
}

#[derive(Args, Debug)]
pub struct RosterCommand {
    #[arg(short, long, default_value = "roster.csv", env = "RALLY_SYNC_ROSTER")]
    pub file: PathBuf,

    #[command(subcommand)]
    pub subcommand: RosterSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum RosterSubcommand {
    List,
    /// Add or update a participant ("Alice 1:30").
    Add { name: String, travel: String },
    Remove { name: String },
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    #[arg(short, long, default_value_t = 8080, env = "RALLY_SYNC_PORT")]
    pub port: u16,

    /// Persist the roster to this CSV file instead of memory.
    #[arg(long, env = "RALLY_SYNC_ROSTER")]
    pub roster: Option<PathBuf>,
}

fn parse_duration_arg(raw: &str) -> Result<u32, String> {
    if raw.trim() == "0" {
        return Ok(0);
    }
    match parse_seconds(raw) {
        0 => Err(format!("invalid duration '{raw}'")),
        secs => Ok(secs),
    }
}

fn parse_target_arg(raw: &str) -> Result<Target, String> {
    let (name, rest) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=mode, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("missing target name in '{raw}'"));
    }
    let mut parts = rest.split(',');
    let mode: Mode = parts.next().unwrap_or_default().parse()?;
    let rally = parts.next().map(parse_duration_arg).transpose()?;
    let march = parts.next().map(parse_duration_arg).transpose()?;
    if parts.next().is_some() {
        return Err(format!("too many fields in '{raw}'"));
    }

    match (mode, rally) {
        (Mode::Attack, None) => Ok(Target::attack(name)),
        (Mode::Attack, Some(_)) => Err(format!("attack target '{name}' takes no enemy timing")),
        (Mode::Defense, rally) => Ok(Target::defense(name, rally.unwrap_or(0), march.unwrap_or(0))),
    }
}

fn parse_override_arg(raw: &str) -> Result<(String, Vec<String>), String> {
    let (target, names) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected target=name,name, got '{raw}'"))?;
    let names: Vec<String> = names
        .split(',')
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect();
    Ok((target.trim().to_string(), names))
}
