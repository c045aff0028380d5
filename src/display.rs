use std::fmt::Write as _;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::schedule::{Plan, PlanSet, Role};
use crate::timeline::{DepartureStatus, EntryStatus, SessionState, Snapshot};

/// Formats a march time, adding M:SS once it reaches a minute ("75s (1:15)")
pub fn format_travel(seconds: u32) -> String {
    if seconds >= 60 {
        format!("{}s ({}:{:02})", seconds, seconds / 60, seconds % 60)
    } else {
        format!("{}s", seconds)
    }
}

/// 1st, 2nd, 3rd, 4th, ... 11th, 12th, 13th, 21st
pub fn ordinal(n: u32) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", n, suffix)
}

fn role_label(role: Role) -> String {
    match role {
        Role::Starter => "Starter".to_string(),
        Role::Follower(n) => format!("{} Team", ordinal(n)),
    }
}

/// Copy-paste text for one plan, one line per team in departure order
pub fn render_plan(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "--- {} Plan: {} ---",
        plan.target.mode.as_str().to_uppercase(),
        plan.target.name
    );
    if plan.target.has_enemy_timer() {
        let _ = writeln!(out, "Enemy landing: {}s", plan.impact_seconds);
    } else {
        let _ = writeln!(out, "Max travel: {}", format_travel(plan.impact_seconds));
    }

    for (i, entry) in plan.entries.iter().enumerate() {
        let instruction = if entry.wait_seconds == 0 {
            "GO NOW".to_string()
        } else {
            format!("Wait {}s", entry.wait_seconds)
        };
        let _ = writeln!(
            out,
            "[Team {}] {} {} ({}): {}",
            i + 1,
            role_label(entry.role),
            entry.participant_id,
            format_travel(entry.travel_seconds),
            instruction
        );
    }
    for entry in &plan.late {
        let _ = writeln!(
            out,
            "[--] {} ({}): SKIP (too late)",
            entry.participant_id,
            format_travel(entry.travel_seconds)
        );
    }
    if !plan.reserves.is_empty() {
        let names: Vec<&str> = plan.reserves.iter().map(|p| p.id.as_str()).collect();
        let _ = writeln!(out, "Reserves: {}", names.join(", "));
    }
    out
}

/// Renders every plan of a recomputation, followed by unassigned roster members
pub fn render_plan_set(plan_set: &PlanSet) -> String {
    let mut out = plan_set
        .plans
        .iter()
        .map(render_plan)
        .collect::<Vec<_>>()
        .join("\n");
    if plan_set.allocation.is_some() && !plan_set.unassigned.is_empty() {
        let _ = writeln!(out, "\nUnassigned: {}", plan_set.unassigned.join(", "));
    }
    out
}

fn entry_line(entry: &EntryStatus, state: SessionState) -> String {
    let instruction = match (entry.status, state) {
        (DepartureStatus::Late, _) => "TOO LATE (travel > impact)".to_string(),
        (_, SessionState::Armed { .. }) => "STANDBY...".to_string(),
        (DepartureStatus::Departed, _) => "MARCH NOW!".to_string(),
        (DepartureStatus::Waiting, SessionState::Idle) if entry.wait_seconds == 0 => {
            "Start immediately".to_string()
        }
        (DepartureStatus::Waiting, _) => match entry.departs_at {
            Some(at) => format!("Wait {}s (march at {})", entry.remaining_seconds, at.format("%H:%M:%S")),
            None => format!("Wait {}s", entry.remaining_seconds),
        },
    };
    format!(
        "  {} {} ({}): {}",
        role_label(entry.role),
        entry.participant,
        format_travel(entry.travel_seconds),
        instruction
    )
}

/// Terminal rendering of one live frame
pub fn render_snapshot(snapshot: &Snapshot) -> String {
    let mut out = String::new();
    let banner = match snapshot.session_state {
        SessionState::Idle => "PREVIEW".to_string(),
        SessionState::Armed { countdown } => format!("PREPARE: {}...", countdown),
        SessionState::Running => "SEQUENCE ACTIVE".to_string(),
        SessionState::Complete => "ALL DONE".to_string(),
        SessionState::Cancelled => "CANCELLED".to_string(),
    };
    let _ = writeln!(out, "# {}", banner);

    for target in &snapshot.per_target {
        let _ = writeln!(out, "Target: {} ({})", target.target_name, target.mode);
        for entry in &target.entries {
            let _ = writeln!(out, "{}", entry_line(entry, snapshot.session_state));
        }
        if let Some(enemy) = &target.enemy_status {
            if enemy.impacted {
                let _ = writeln!(out, "  Enemy: LANDED");
            } else {
                let _ = writeln!(out, "  Enemy lands in {}s", enemy.remaining_seconds);
            }
        }
    }

    if let Some(next) = &snapshot.overall_next_event {
        let _ = writeln!(
            out,
            "Next: {} -> {} in {}s",
            next.participant, next.target, next.remaining_seconds
        );
    }
    out
}

/// Writes the plan text to a file for sharing
pub fn write_plan_to_file<P: AsRef<Path>>(plan_set: &PlanSet, path: P) -> Result<(), std::io::Error> {
    let mut file = File::create(path)?;
    file.write_all(render_plan_set(plan_set).as_bytes())
}
