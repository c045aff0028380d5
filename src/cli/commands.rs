//! Handlers behind each subcommand.

use tracing::{info, warn};

use crate::cli::args::{
    AttackArgs, BatchArgs, Cli, Commands, DefenseArgs, RosterCommand, RosterSubcommand, ServeArgs,
    WaterfallArgs,
};
use crate::config::EngineConfig;
use crate::display::{format_travel, render_plan_set, render_snapshot, write_plan_to_file};
use crate::error::RallyError;
use crate::parser::parse_batch;
use crate::roster::{CsvRoster, MemoryRoster, RosterSource};
use crate::schedule::{Overrides, Participant, PlanRequest, Target};
use crate::timeline::{RallyController, SessionState};
use crate::web::{start_server, AppState};

/// Dispatch a parsed invocation to its handler.
///
/// # Errors
///
/// Invalid engine settings, planning failures, roster I/O and Ctrl-C during a
/// live run all surface here.
pub async fn dispatch(cli: Cli) -> Result<(), RallyError> {
    let config = cli.engine.to_config();
    config.validate()?;

    match cli.command {
        Commands::Attack(args) => attack(args, config).await,
        Commands::Defense(args) => defense(args, config).await,
        Commands::Waterfall(args) => waterfall(args, config).await,
        Commands::Roster(cmd) => roster(cmd),
        Commands::Serve(args) => serve(args, config).await,
    }
}

fn batch_participants(batch: &BatchArgs) -> Vec<Participant> {
    let times = parse_batch(&batch.times.join(" "));
    Participant::from_travel_times(&times)
}

async fn attack(args: AttackArgs, config: EngineConfig) -> Result<(), RallyError> {
    let request = PlanRequest {
        targets: vec![Target::attack(args.target)],
        roster: batch_participants(&args.batch),
        overrides: Overrides::new(),
        per_target_cap: args.batch.cap,
    };
    plan_and_run(&request, config, args.batch.live, None).await
}

async fn defense(args: DefenseArgs, config: EngineConfig) -> Result<(), RallyError> {
    let request = PlanRequest {
        targets: vec![Target::defense(args.target, args.enemy_rally, args.enemy_march)],
        roster: batch_participants(&args.batch),
        overrides: Overrides::new(),
        per_target_cap: args.batch.cap,
    };
    plan_and_run(&request, config, args.batch.live, None).await
}

async fn waterfall(args: WaterfallArgs, config: EngineConfig) -> Result<(), RallyError> {
    let roster = CsvRoster::open(&args.roster)?;
    let request = PlanRequest {
        targets: args.targets,
        roster: roster.list_participants()?,
        overrides: args.overrides.into_iter().collect(),
        per_target_cap: args.cap,
    };
    plan_and_run(&request, config, args.live, args.output.as_deref()).await
}

async fn plan_and_run(
    request: &PlanRequest,
    config: EngineConfig,
    live: bool,
    output: Option<&std::path::Path>,
) -> Result<(), RallyError> {
    let mut controller = RallyController::new(config);
    let plan_set = controller.recompute_schedule(request)?;
    println!("{}", render_plan_set(plan_set));

    if let Some(path) = output {
        write_plan_to_file(plan_set, path)?;
        info!(path = %path.display(), "plan written");
    }

    if live {
        run_live(&mut controller).await?;
    }
    Ok(())
}

/// Drives one session in the terminal, redrawing whenever the frame text changes
async fn run_live(controller: &mut RallyController) -> Result<(), RallyError> {
    let mut frames = controller.subscribe();
    controller.start()?;

    let mut last = String::new();
    let mut interrupted = false;
    loop {
        tokio::select! {
            changed = frames.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                controller.cancel();
                continue;
            }
        }

        let snapshot = frames.borrow_and_update().clone();
        let text = render_snapshot(&snapshot);
        if text != last {
            println!("{text}");
            last = text;
        }
        if matches!(snapshot.session_state, SessionState::Complete | SessionState::Cancelled) {
            break;
        }
    }

    if interrupted {
        return Err(RallyError::Interrupted);
    }
    if let Some(state) = controller.wait().await {
        info!(?state, "session finished");
    }
    Ok(())
}

fn roster(cmd: RosterCommand) -> Result<(), RallyError> {
    let mut roster = CsvRoster::open(&cmd.file)?;
    match cmd.subcommand {
        RosterSubcommand::List => {
            let participants = roster.list_participants()?;
            if participants.is_empty() {
                println!("Roster {} is empty", roster.path().display());
            }
            for p in participants {
                println!("{}: {}", p.id, format_travel(p.travel_seconds));
            }
        }
        RosterSubcommand::Add { name, travel } => {
            let seconds = roster.upsert_raw(&name, &travel)?;
            println!("Saved {}: {}", name.trim(), format_travel(seconds));
        }
        RosterSubcommand::Remove { name } => {
            roster.delete(&name)?;
            println!("Removed {}", name.trim());
        }
    }
    Ok(())
}

async fn serve(args: ServeArgs, config: EngineConfig) -> Result<(), RallyError> {
    let roster: Box<dyn RosterSource + Send> = match &args.roster {
        Some(path) => Box::new(CsvRoster::open(path)?),
        None => {
            warn!("no roster file given; roster changes are lost on exit");
            Box::new(MemoryRoster::new())
        }
    };
    println!("Listening on http://localhost:{}", args.port);
    start_server(args.port, AppState::new(roster, config)).await?;
    Ok(())
}
