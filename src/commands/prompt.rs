//! Interactive menu, used when no subcommand is given.
//!
//! Asks whether to host or connect, then for the port and (when needed) the
//! IP address, and starts the same conversation as the subcommands.

use std::io::{self, BufRead, Write};
use std::net::{IpAddr, SocketAddr};

use anyhow::{bail, Context, Result};
use tracing::warn;

use sealchat::chat::transport::detect_local_ip;
use sealchat::chat::{ChatConfig, DecryptPolicy, DEFAULT_PORT};

use super::chat;
use super::CommandExecutor;

/// What the user picked in the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuChoice {
    Host,
    Connect,
}

/// Interactive host/connect menu.
#[derive(Debug, Default)]
pub struct MenuCommand;

impl CommandExecutor for MenuCommand {
    fn execute(&self) -> Result<()> {
        let stdin = io::stdin();
        let mut input = stdin.lock();

        println!("Sealchat - encrypted peer-to-peer chat");
        println!("  1) Host a chat");
        println!("  2) Connect to a host");

        let choice = loop {
            let answer = prompt(&mut input, "Choose 1 or 2: ")?;
            match parse_choice(&answer) {
                Some(choice) => break choice,
                None => println!("Please enter 1 or 2."),
            }
        };

        let port = loop {
            let answer = prompt(&mut input, &format!("Port [{}]: ", DEFAULT_PORT))?;
            match parse_port(&answer) {
                Ok(port) => break port,
                Err(e) => println!("{}", e),
            }
        };

        let config = ChatConfig::default().with_port(port);
        let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;

        match choice {
            MenuChoice::Host => {
                let ip = match rt.block_on(detect_local_ip()) {
                    Ok(ip) => ip,
                    Err(e) => {
                        warn!(error = %e, "local IP detection failed");
                        println!("Could not detect your local IP address.");
                        ask_ip(&mut input, "Enter the IP address to listen on: ")?
                    }
                };
                // The session reads stdin from its own thread
                drop(input);
                rt.block_on(chat::host(ip, config, DecryptPolicy::Report))
            }
            MenuChoice::Connect => {
                let ip = ask_ip(&mut input, "Host IP address: ")?;
                drop(input);
                rt.block_on(chat::join(SocketAddr::new(ip, port), config, DecryptPolicy::Report))
            }
        }
    }
}

/// Print `label` and read one trimmed line.
fn prompt<R: BufRead>(input: &mut R, label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut line = String::new();
    let read = input.read_line(&mut line).context("Failed to read input")?;
    if read == 0 {
        bail!("Input closed");
    }
    Ok(line.trim().to_string())
}

fn ask_ip<R: BufRead>(input: &mut R, label: &str) -> Result<IpAddr> {
    loop {
        let answer = prompt(input, label)?;
        match answer.parse::<IpAddr>() {
            Ok(ip) => return Ok(ip),
            Err(_) => println!("'{}' is not a valid IP address.", answer),
        }
    }
}

/// Parse the menu answer.
pub fn parse_choice(answer: &str) -> Option<MenuChoice> {
    match answer.trim() {
        "1" => Some(MenuChoice::Host),
        "2" => Some(MenuChoice::Connect),
        _ => None,
    }
}

/// Parse a port answer; empty means the default port.
pub fn parse_port(answer: &str) -> Result<u16> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Ok(DEFAULT_PORT);
    }

    match answer.parse::<u16>() {
        Ok(0) | Err(_) => bail!("'{}' is not a valid port (1-65535).", answer),
        Ok(port) => Ok(port),
    }
}
