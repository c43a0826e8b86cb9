//! Match Tester CLI Tool
//!
//! Command-line client for exercising a running matchmaking server over WebSocket.
//!
//! Usage:
//!   # Start the service first:
//!   cargo run --bin animal-matchmaking
//!
//!   # Then run the match tester:
//!   cargo run --bin match-tester -- --help
//!   cargo run --bin match-tester join --nickname Alice --animal cat
//!   cargo run --bin match-tester join --nickname Bob --animal 1 --text
//!   cargo run --bin match-tester pair
//!   cargo run --bin match-tester load --pairs 100

use std::time::Duration;

use animal_matchmaking::transport::ServerEvent;
use animal_matchmaking::types::Animal;
use anyhow::Result;
use clap::{Parser, Subcommand};

#[path = "../../tests/match_tester.rs"]
#[allow(dead_code)]
mod match_tester;

use match_tester::{Channel, MatchTester, TestClient};

#[derive(Parser)]
#[command(name = "match-tester")]
#[command(about = "Interactive testing tool for the animal matchmaking WebSocket server")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base WebSocket URL of the server
    #[arg(long, default_value = "ws://localhost:5000")]
    url: String,

    /// Seconds to wait for each server reply
    #[arg(long, default_value = "30")]
    timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Join one player and wait for a match
    Join {
        /// Player nickname
        #[arg(short, long)]
        nickname: String,
        /// Animal name or index (cat, dog, rabbit, fox, bear)
        #[arg(short, long, default_value = "cat")]
        animal: String,
        /// Use the text channel instead of the JSON hub
        #[arg(long)]
        text: bool,
    },
    /// Join two players and verify they land in the same room
    Pair {
        #[arg(long, default_value = "Alice")]
        first: String,
        #[arg(long, default_value = "Bob")]
        second: String,
    },
    /// Connect many players concurrently and wait until all are matched
    Load {
        /// Number of pairs to create
        #[arg(short, long, default_value = "50")]
        pairs: usize,
    },
    /// Show how many players are waiting
    Count,
    /// Test the connection to the server
    TestConnection,
}

fn parse_animal(value: &str) -> Result<Animal> {
    if let Ok(index) = value.parse::<i64>() {
        return Animal::from_index(index)
            .ok_or_else(|| anyhow::anyhow!("Animal index must be between 0 and 4"));
    }

    Animal::ALL
        .into_iter()
        .find(|animal| animal.to_string().eq_ignore_ascii_case(value))
        .ok_or_else(|| anyhow::anyhow!("Unknown animal '{}'. Use cat, dog, rabbit, fox or bear", value))
}

async fn join_and_wait(
    url: &str,
    nickname: &str,
    animal: Animal,
    channel: Channel,
    wait: Duration,
) -> Result<()> {
    let mut client = TestClient::connect(url, channel).await?;
    client.join(nickname, animal).await?;

    match channel {
        Channel::Hub => {
            if let ServerEvent::MatchmakingJoined {
                message,
                waiting_count,
            } = client.next_event(wait).await?
            {
                println!("⏳ {} ({} waiting)", message, waiting_count);
            }
            let payload = client.wait_for_match(wait).await?;
            println!("🎮 Matched into room {}", payload.room_id);
            println!("   Seed: {}", payload.random_seed);
            for player in &payload.players {
                println!("   {} ({})", player.nickname, player.selected_animal);
            }
        }
        Channel::Text => loop {
            let frame = client.next_frame(wait).await?;
            println!("📨 {}", frame);
            if frame.starts_with("MATCHED:") || frame.starts_with("ERROR:") {
                break;
            }
        },
    }

    client.close().await.ok();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let wait = Duration::from_secs(cli.timeout);
    let tester = MatchTester::new(cli.url.clone()).with_timeout(wait);

    println!("🔌 Using server at: {}", cli.url);

    match cli.command {
        Commands::Join {
            nickname,
            animal,
            text,
        } => {
            let animal = parse_animal(&animal)?;
            let channel = if text { Channel::Text } else { Channel::Hub };
            if let Err(e) = join_and_wait(&cli.url, &nickname, animal, channel, wait).await {
                eprintln!("❌ Join failed for '{}': {}", nickname, e);
                std::process::exit(1);
            }
        }

        Commands::Pair { first, second } => {
            match tester
                .run_pair((first.as_str(), Animal::Cat), (second.as_str(), Animal::Dog))
                .await
            {
                Ok((a, b)) => {
                    if a.room_id == b.room_id && a.random_seed == b.random_seed {
                        println!("✅ Both players matched into room {}", a.room_id);
                        println!("   Seed: {}", a.random_seed);
                    } else {
                        println!(
                            "❌ Players disagree: {} / {} vs {} / {}",
                            a.room_id, a.random_seed, b.room_id, b.random_seed
                        );
                        std::process::exit(1);
                    }
                }
                Err(e) => {
                    eprintln!("❌ Pair scenario failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Load { pairs } => {
            println!("🧪 Connecting {} players...", pairs * 2);
            match tester.run_load(pairs).await {
                Ok(stats) => {
                    println!("📊 Load Results:");
                    println!("   Pairs requested: {}", stats.pairs_requested);
                    println!("   Players matched: {}", stats.players_matched);
                    println!("   Distinct rooms: {}", stats.distinct_rooms);
                    println!("   Distinct seeds: {}", stats.distinct_seeds);
                    println!("   Elapsed: {}ms", stats.elapsed_ms);

                    if stats.distinct_rooms != pairs || stats.distinct_seeds != pairs {
                        println!("❌ Expected {} distinct rooms and seeds", pairs);
                        std::process::exit(1);
                    }
                    println!("✅ Load run completed successfully!");
                }
                Err(e) => {
                    eprintln!("❌ Load run failed: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Count => match tester.waiting_count().await {
            Ok(count) => println!("⏳ {} player(s) waiting", count),
            Err(e) => {
                eprintln!("❌ Failed to read waiting count: {}", e);
                std::process::exit(1);
            }
        },

        Commands::TestConnection => {
            println!("🔍 Testing connection...");
            match TestClient::connect(&cli.url, Channel::Hub).await {
                Ok(client) => {
                    client.close().await.ok();
                    println!("✅ Connection successful!");
                }
                Err(e) => {
                    eprintln!("❌ Connection failed: {}", e);
                    eprintln!("💡 Make sure the service is running: cargo run --bin animal-matchmaking");
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
