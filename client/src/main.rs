use clap::Parser;
use client::config::{ClientConfig, Role};
use client::events::{EventKind, GameEvent};
use client::network::{Client, SessionCommand};
use log::{error, info, warn};
use tokio::sync::mpsc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Game server address (host:port)
    #[arg(short = 's', long, default_value = "localhost:3000")]
    server: String,

    /// Feed to subscribe to
    #[arg(short = 'r', long, value_enum, default_value_t = Role::Observer)]
    role: Role,

    /// Drop delta batches whose round is behind the local mirror
    #[arg(long)]
    reject_stale_rounds: bool,

    /// Ask the server to start the game once connected
    #[arg(long)]
    start: bool,

    /// Player role only: answer every turn with the first command and target
    #[arg(short = 'a', long)]
    auto_play: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mut config = ClientConfig::for_server(&args.server, args.role);
    config.reject_stale_rounds = args.reject_stale_rounds;

    info!("Starting client...");
    info!("Connecting to: {} as {:?}", config.socket_url(), config.role);
    if config.reject_stale_rounds {
        info!("Stale delta batches will be rejected");
    }

    let mut client = Client::new(config);
    let (commands, command_rx) = mpsc::unbounded_channel();

    let events = client.events();
    let mirror = client.mirror();
    events.subscribe(EventKind::Connect, |event| {
        if let GameEvent::Connect(connected) = event {
            info!("Connection state: {}", if *connected { "open" } else { "closed" });
        }
    });
    events.subscribe(EventKind::Sync, {
        let mirror = mirror.clone();
        move |_| info!("Synced: {}", mirror.borrow())
    });
    events.subscribe(EventKind::Update, move |event| {
        if let GameEvent::Update { round, changes } = event {
            info!(
                "Round {}: {} cells changed, {} painted",
                round,
                changes.len(),
                mirror.borrow().painted_count()
            );
        }
    });
    events.subscribe(EventKind::Joined, |event| {
        if let GameEvent::Joined { player_id, color } = event {
            info!("Playing as {} ({})", player_id, color);
        }
    });

    events.subscribe(EventKind::PlayerTurn, |event| {
        if let GameEvent::PlayerTurn(available) = event {
            let kinds: Vec<&str> = available.iter().map(|c| c.command_type.as_str()).collect();
            info!("Our turn, available commands: {:?}", kinds);
        }
    });

    if args.auto_play {
        if args.role != Role::Player {
            warn!("--auto-play has no effect for observers");
        } else {
            let commands = commands.clone();
            events.subscribe(EventKind::PlayerTurn, move |event| {
                let GameEvent::PlayerTurn(available) = event else {
                    return;
                };
                let Some((command, target)) = available.iter().find_map(|c| {
                    c.available_targets
                        .first()
                        .map(|t| (c.command_type.clone(), *t))
                }) else {
                    info!("Nothing to do this turn");
                    return;
                };

                let _ = commands.send(SessionCommand::SelectCommand(command));
                let _ = commands.send(SessionCommand::ClickTarget {
                    x: target.x,
                    y: target.y,
                });
            });
        }
    }

    {
        let commands = commands.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received Ctrl+C, shutting down...");
                let _ = commands.send(SessionCommand::Shutdown);
            }
        });
    }

    if let Err(e) = client.connect().await {
        error!("Could not connect: {}", e);
        return Err(e.into());
    }

    let phase = client.fetch_game_state().await;
    info!("Game is {}", phase);

    if args.start {
        commands.send(SessionCommand::Start)?;
    }

    client.run(command_rx).await?;

    Ok(())
}
