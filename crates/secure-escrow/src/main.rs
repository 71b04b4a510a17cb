//! Secure Escrow: create and approve two-party escrows from the terminal

use std::io::{self, BufRead, Write};

use secure_escrow_adapters::EscrowAdapterConfig;
use secure_escrow_core::PortError;

mod command;
mod escrow_bridge;
mod table;

use command::ShellCommand;
use escrow_bridge::EscrowBridge;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(io::stderr)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git = env!("GIT_HASH"),
        built = env!("BUILD_TIME"),
        "Starting Secure Escrow"
    );

    let config = EscrowAdapterConfig::from_env();
    let mut bridge = EscrowBridge::connect(&config).await?;
    println!("account: {}", bridge.account());
    println!("balance: {} Eth", bridge.balance_ether());
    println!("{}", table::render(&bridge.rows()));
    println!("{}", command::HELP);

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let command = match command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{e}");
                continue;
            }
        };
        if command == ShellCommand::Quit {
            break;
        }
        if let Err(e) = run(&mut bridge, command).await {
            tracing::error!(error = %e, "command failed");
            println!("error: {e}");
            if matches!(e, PortError::HandleUnavailable(_)) {
                println!("hint: run `reattach <contract>` first");
            }
        }
    }
    Ok(())
}

async fn run(bridge: &mut EscrowBridge, command: ShellCommand) -> Result<(), PortError> {
    match command {
        ShellCommand::List => {
            let applied = bridge.poll()?;
            if applied > 0 {
                println!("{applied} approval(s) received");
            }
            println!("{}", table::render(&bridge.rows()));
        }
        ShellCommand::Balance => {
            println!("balance: {} Eth", bridge.refresh_balance().await?);
        }
        ShellCommand::Create(form) => {
            let record = bridge.create(&form).await?;
            println!("escrow deployed at {}", record.contract_address);
            println!("balance: {} Eth", bridge.balance_ether());
        }
        ShellCommand::Approve(address) => {
            let record = bridge.approve(address).await?;
            println!("{}: {}", record.contract_address, record.status.label());
        }
        ShellCommand::Reattach(address) => {
            bridge.reattach(address).await?;
            println!("{address} reattached");
        }
        ShellCommand::Help => println!("{}", command::HELP),
        ShellCommand::Quit => {}
    }
    Ok(())
}
