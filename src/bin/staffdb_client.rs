use std::error::Error;

use clap::Parser;
use staffdb::{Client, cli::CommandArgs};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server host name or address
    #[arg(short = 'H', long)]
    host: String,

    /// Server port
    #[arg(short, long)]
    port: u16,

    #[command(flatten)]
    commands: CommandArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut client = Client::connect((cli.host.as_str(), cli.port))?;
    println!(
        "Connected to {}:{} (protocol v{})",
        cli.host,
        cli.port,
        client.protocol()
    );

    for command in cli.commands.commands() {
        let outcome = client.execute(command)?;
        println!("{outcome}");
    }

    Ok(())
}
