use clap::{Parser, ValueEnum};
use log::{info, warn};
use peer::autopilot::Autopilot;
use peer::game::Game;
use peer::input::Intent;
use peer::relay::{Delivery, RelayHub};
use peer::state::MatchState;
use peer::transport::Connector;
use shared::config::GameConfig;
use shared::logging::Logger;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::{interval, MissedTickBehavior};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// One snake, no transport
    Solo,
    /// A host and bot peers in one process over the in-process relay
    LocalMatch,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short = 'm', long, value_enum, default_value = "local-match")]
    mode: Mode,

    /// Number of bot peers joining the host (local-match only)
    #[arg(short = 'b', long, default_value = "3", value_parser = clap::value_parser!(u8).range(1..=3))]
    bots: u8,

    /// Frame interval in milliseconds
    #[arg(short = 't', long, default_value = "16")]
    tick_ms: u64,

    /// Milliseconds between snake moves
    #[arg(long, default_value_t = shared::MOVE_INTERVAL_MS)]
    move_interval: u64,

    /// Match length in seconds
    #[arg(short = 'd', long, default_value_t = shared::MATCH_DURATION_SECONDS)]
    duration: u64,

    /// Throttle window for scheduled game_state broadcasts
    #[arg(long, default_value_t = shared::BROADCAST_INTERVAL_MS)]
    broadcast_interval: u64,

    /// Seed for food and respawn placement
    #[arg(short = 's', long)]
    seed: Option<u64>,

    /// Stop after this many seconds even if the match is still running
    #[arg(long)]
    run_seconds: Option<u64>,

    /// Milliseconds between HUD lines
    #[arg(long, default_value = "1000")]
    hud_interval: u64,
}

struct Player {
    game: Game,
    pilot: Autopilot,
}

impl Player {
    fn new(game: Game) -> Self {
        Self {
            game,
            pilot: Autopilot::new(),
        }
    }

    fn steer(&mut self, now: u64) {
        if self.game.state() != MatchState::Playing {
            self.pilot.reset();
            return;
        }
        if let Some(direction) = self.pilot.decide(self.game.context()) {
            if let Err(e) = self.game.handle_intent(Intent::Steer(direction), now) {
                warn!("Steering failed: {}", e);
            }
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

fn config_from(args: &Args) -> GameConfig {
    GameConfig {
        move_interval_ms: args.move_interval,
        match_duration_seconds: args.duration,
        broadcast_interval_ms: args.broadcast_interval,
        ..GameConfig::default()
    }
}

fn seed_for(args: &Args, offset: u64) -> Option<u64> {
    args.seed.map(|seed| seed.wrapping_add(offset))
}

fn setup_solo(args: &Args) -> Result<Vec<Player>, Box<dyn std::error::Error>> {
    let mut game = Game::new(config_from(args), None, seed_for(args, 0), Logger::new("solo"));
    game.handle_intent(Intent::Solo, now_ms())?;
    Ok(vec![Player::new(game)])
}

fn setup_local_match(args: &Args) -> Result<Vec<Player>, Box<dyn std::error::Error>> {
    let hub: Arc<dyn Connector> = Arc::new(RelayHub::new(Delivery::Threaded, Logger::new("relay")));
    let now = now_ms();

    let mut host = Game::new(
        config_from(args),
        Some(Arc::clone(&hub)),
        seed_for(args, 0),
        Logger::new("host"),
    );
    host.handle_intent(Intent::Host, now)?;
    info!(
        "Hosting session {}",
        host.context().net.session_id().unwrap_or("?")
    );

    let mut players = vec![Player::new(host)];
    for n in 1..=args.bots {
        let mut bot = Game::new(
            config_from(args),
            Some(Arc::clone(&hub)),
            seed_for(args, n as u64),
            Logger::new(format!("bot-{}", n)),
        );
        bot.handle_intent(Intent::RefreshSessions, now)?;
        bot.handle_intent(Intent::Join(0), now)?;
        players.push(Player::new(bot));
    }
    Ok(players)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting snake peers in {:?} mode", args.mode);
    info!(
        "Move interval {}ms, match {}s, broadcast every {}ms",
        args.move_interval, args.duration, args.broadcast_interval
    );

    let mut players = match args.mode {
        Mode::Solo => setup_solo(&args)?,
        Mode::LocalMatch => setup_local_match(&args)?,
    };
    let expected_players = players.len();

    let started = now_ms();
    let deadline = args.run_seconds.map(|s| started + s * 1000);
    let mut last_hud = 0;

    let mut frame = interval(Duration::from_millis(args.tick_ms.max(1)));
    frame.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                let now = now_ms();
                for player in players.iter_mut() {
                    player.game.tick(now);
                    player.steer(now);
                }

                let host = &mut players[0].game;
                if host.state() == MatchState::Lobby
                    && host.context().roster.len() == expected_players
                {
                    info!("All {} players in the lobby, starting countdown", expected_players);
                    host.handle_intent(Intent::Confirm, now)?;
                }

                if now.saturating_sub(last_hud) >= args.hud_interval {
                    last_hud = now;
                    info!("{}", players[0].game.snapshot());
                }

                if players[0].game.state() == MatchState::MatchEnd {
                    info!("Final: {}", players[0].game.snapshot());
                    break;
                }
                if deadline.is_some_and(|d| now >= d) {
                    info!("Run time elapsed");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let now = now_ms();
    for player in players.iter_mut().rev() {
        player.game.handle_intent(Intent::Quit, now)?;
    }

    Ok(())
}
