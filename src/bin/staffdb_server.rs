use std::{
    error::Error,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use clap::Parser;
use log::{error, info};
use staffdb::{RecordStore, Server, ServerConfig, cli::CommandArgs, protocol::DEFAULT_CAPACITY};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the database file
    #[arg(short, long)]
    file: PathBuf,

    /// Create a new database file; fails if it already exists
    #[arg(short, long)]
    new: bool,

    /// Serve clients on this port after running any commands
    #[arg(short, long)]
    port: Option<u16>,

    /// Address to listen on
    #[arg(short, long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    bind: IpAddr,

    /// Maximum number of concurrent connections
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY)]
    capacity: usize,

    #[command(flatten)]
    commands: CommandArgs,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let mut store = if cli.new {
        RecordStore::create(&cli.file)?
    } else {
        RecordStore::open(&cli.file)?
    };
    info!("opened {:?} with {} employees", cli.file, store.len());

    for command in cli.commands.commands() {
        let outcome = command.execute(&mut store)?;
        println!("{outcome}");
    }

    let Some(port) = cli.port else {
        return Ok(());
    };

    let config = ServerConfig::new(SocketAddr::new(cli.bind, port)).with_capacity(cli.capacity);
    let server = Server::bind(config, store)?;

    let shutdown = server.shutdown_handle();
    ctrlc::set_handler(move || {
        if let Err(e) = shutdown.shutdown() {
            error!("failed to stop server: {e}");
        }
    })?;

    let store = server.run()?;
    info!("stopped with {} employees in {:?}", store.len(), store.path());
    Ok(())
}
