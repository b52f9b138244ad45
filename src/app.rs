use color_eyre::eyre::{
    Result,
    eyre,
};
use dicepilot::{
    EngineConfig,
    SessionEvent,
    screen::Region,
    session,
    sim::SimulatedTable,
};
use futures::StreamExt;
use itertools::Itertools;
use tokio_stream::wrappers::{
    BroadcastStream,
    errors::BroadcastStreamRecvError,
};
use tracing::{
    info,
    warn,
};

pub struct AppOptions {
    pub dual: bool,
    pub seed: u64,
    pub rounds: Option<u64>,
    pub config: Option<String>,
}

fn print_usage_and_exit() -> ! {
    println!(
        "Usage: dicepilot [--dual] [--seed <n>] [--rounds <n>] [--config <path>]\n\
         \n\
         Runs the betting engine against a simulated table.\n\
         \n\
         Flags:\n\
           --dual            Run two table instances with the alternating strategy\n\
           --seed <n>        Seed for the simulated table(s) (default 7)\n\
           --rounds <n>      Stop after this many settled turns (default: run until ctrl-c)\n\
           --config <path>   JSON engine config (default: built-in defaults)"
    );
    std::process::exit(0);
}

pub fn parse_cli_args() -> Result<AppOptions> {
    let mut args = std::env::args().skip(1);
    let mut dual = false;
    let mut seed: Option<u64> = None;
    let mut rounds: Option<u64> = None;
    let mut config: Option<String> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dual" => dual = true,
            "--seed" => {
                let value = args
                    .next()
                    .ok_or_else(|| eyre!("--seed requires a number argument"))?;
                seed = Some(value.parse()?);
            }
            "--rounds" => {
                let value = args
                    .next()
                    .ok_or_else(|| eyre!("--rounds requires a number argument"))?;
                rounds = Some(value.parse()?);
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| eyre!("--config requires a path argument"))?;
                if config.is_some() {
                    return Err(eyre!("--config may only be specified once"));
                }
                config = Some(path);
            }
            "--help" | "-h" => print_usage_and_exit(),
            other => return Err(eyre!("Unknown argument: {other}")),
        }
    }

    Ok(AppOptions {
        dual,
        seed: seed.unwrap_or(7),
        rounds,
        config,
    })
}

pub async fn run(options: AppOptions) -> Result<()> {
    let mut config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    if options.dual && config.region_b.is_none() {
        // demo default: second table directly to the right of the first
        config.region_b = Some(Region {
            x: config.region.x + config.region.width as i32,
            ..config.region
        });
    }
    info!(
        base_stake = config.base_stake,
        stake_cap = config.stake_cap,
        denominations = %config.normalized_denominations().iter().join("/"),
        dual = options.dual,
        seed = options.seed,
        "starting session against simulated table"
    );

    let table_a = SimulatedTable::new(options.seed);
    let mut session = if options.dual {
        let table_b = SimulatedTable::new(options.seed.wrapping_add(1));
        session::start_dual(config, table_a.ports(), table_b.ports())?
    } else {
        session::start_single(config, table_a.ports())?
    };

    let mut events = BroadcastStream::new(session.subscribe());
    let mut settled_turns = 0u64;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, stopping session");
                session.stop();
                break;
            }
            event = events.next() => {
                match event {
                    Some(Ok(event)) => {
                        report(&event);
                        if let SessionEvent::RoundSettled { turn: Some(_), .. } = event {
                            settled_turns += 1;
                            if options.rounds.is_some_and(|limit| settled_turns >= limit) {
                                info!(settled_turns, "round limit reached, stopping session");
                                session.stop();
                                break;
                            }
                        }
                        if let SessionEvent::Ended { .. } = event {
                            break;
                        }
                    }
                    Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                        warn!(skipped, "event stream lagged");
                    }
                    None => break,
                }
            }
        }
    }

    let snapshot = session.current_state();
    let status = session.join().await;
    println!("session ended: {status}");
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn report(event: &SessionEvent) {
    match event {
        SessionEvent::Started { mode, .. } => info!(?mode, "session started"),
        SessionEvent::WagerPlaced {
            instance,
            side,
            stake,
            achieved,
            ..
        } => {
            println!("[{instance}] wagered {achieved} (requested {stake}) on {side}");
        }
        SessionEvent::InexactStake {
            instance,
            requested,
            achieved,
            ..
        } => {
            warn!(%instance, requested, achieved, "stake composed inexactly");
        }
        SessionEvent::RoundSettled {
            instance,
            result,
            outcome,
            turn,
            ..
        } => match (turn, outcome) {
            (Some(turn), Some(outcome)) => {
                println!("[{instance}] turn {turn}: {result} -> {outcome:?}");
            }
            _ => info!(%instance, result = %result, "round observed"),
        },
        SessionEvent::ResultDiscarded { instance, result, .. } => {
            info!(%instance, result = %result, "leftover result discarded");
        }
        SessionEvent::RoundFailed {
            instance,
            reason,
            consecutive,
            ..
        } => {
            warn!(%instance, %reason, consecutive, "round failed");
        }
        SessionEvent::SideSwitched { from, to, .. } => {
            println!("side switched: {from} -> {to}");
        }
        SessionEvent::Paused { .. } => info!("session paused"),
        SessionEvent::Resumed { .. } => info!("session resumed"),
        SessionEvent::Ended { instance, status, .. } => {
            println!("[{instance}] ended: {status}");
        }
    }
}
