//! Terminal roleplay with the configured character.

use std::path::Path;

use reverie_core::ReverieConfig;
use reverie_llm::LlmClient;
use reverie_rp::{Session, telemetry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};

const OPENING_LOCATION: &str = "School Library";
const OPENING_ACTION: &str = "waiting to discuss the project";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => ReverieConfig::from_file(Path::new(&path))?,
        None => ReverieConfig::default(),
    };
    telemetry::init(&config.general);

    let client = LlmClient::from_config(&config.llm)?;
    let mut session = Session::open(&config, client)?;
    let character = config.character.name.clone();
    let user = config.user.name.clone();

    if !session.restored() {
        let backstory = format!(
            "{user} fell asleep yesterday instead of finishing the project work with {character}. \
             {character} called but got no response."
        );
        session.seed_opening(OPENING_LOCATION, OPENING_ACTION, &backstory);
        println!(
            "*{character} sits at a table in the {OPENING_LOCATION}, {OPENING_ACTION}. \
             She looks up as {user} approaches.*\n"
        );
    }
    info!(%character, %user, "Roleplay started");
    println!("Type 'quit' to exit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "quit" || input == "exit" {
            break;
        }
        let outcome = session.take_turn(input).await;
        println!("\n{character}: {}\n", outcome.reply.full_text);
    }

    if let Err(e) = session.save() {
        error!(error = %e, "Final save failed");
    }
    Ok(())
}
