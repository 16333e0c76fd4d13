//! Interactive client for a TxVault server
//!
//! Forwards each typed line to the server and prints the replies

use clap::Parser;
use std::io::{self, Write};
use txvault::protocol::Verb;
use txvault::Client;

#[derive(Parser, Debug)]
struct Args {
    /// Server address
    #[arg(default_value = "127.0.0.1:4544")]
    addr: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to TxVault server at {}...", args.addr);
    let mut client = Client::connect(&args.addr).await?;
    println!("Connected! Type 'help' for available commands or 'quit' to exit.");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            break;
        }
        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        let name = input
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_uppercase();

        match name.as_str() {
            "QUIT" | "EXIT" => {
                println!("Goodbye!");
                break;
            }
            "HELP" => print_help(),
            "DISCONNECT" => {
                client.disconnect().await?;
                println!("Disconnected");
                return Ok(());
            }
            "MULTI" => match client.multi().await {
                Ok(()) => println!("OK"),
                Err(e) => println!("Error: {}", e),
            },
            "EXEC" => match client.exec().await {
                Ok(replies) if replies.is_empty() => println!("(empty transaction)"),
                Ok(replies) => {
                    for (i, reply) in replies.iter().enumerate() {
                        println!("{}) {}", i + 1, reply.to_line());
                    }
                }
                Err(e) => println!("{}", e),
            },
            _ => {
                let is_data = name.parse::<Verb>().map(Verb::is_data).unwrap_or(false);
                if is_data && client.in_transaction() {
                    match client.queue(input).await {
                        Ok(()) => println!("QUEUED"),
                        Err(e) => println!("{}", e),
                    }
                } else {
                    println!("{}", client.send_line(input).await?.to_line());
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}

fn print_help() {
    println!("Available commands:");
    println!("  SET <key> <value>            - Set a value (quote values with spaces)");
    println!("  GET <key>                    - Get value by key");
    println!("  DELETE <key>                 - Delete a key");
    println!("  INCR <key>                   - Increment a counter");
    println!("  INCRBY <key> <increment>     - Increment a counter by an amount");
    println!("  MULTI / EXEC                 - Queue commands and run them together");
    println!("  DISCONNECT                   - Ask the server to close the connection");
    println!("  help                         - Show this help message");
    println!("  quit                         - Exit the client");
}
