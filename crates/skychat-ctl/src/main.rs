//! skychat-ctl: interactive terminal client for a skychat relay.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;

use skychat_core::wire::{self, Reply};

const DEFAULT_ADDR: &str = "127.0.0.1:3333";

fn usage() -> String {
    format!(
        "\
Usage: skychat-ctl [--addr <host:port>] --name <name>

Options:
  --addr <host:port>   Relay address (default: {DEFAULT_ADDR})
  --name <name>        Name to register with

Type '/help' once connected for the list of commands.

Chat lines from other users arrive as hex: the relay seals each one for the
recipient session's key, and that key never leaves the relay. Lines you
address to yourself, and all relay replies, are shown as plain text.
"
    )
}

fn print_usage() {
    print!("{}", usage());
}

// ── Server lines ──────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
enum ServerLine {
    Show(String),
    NameTaken,
}

fn classify(line: &str) -> ServerLine {
    match Reply::decode(line) {
        Some(Reply::Info(text)) if text == wire::NAME_TAKEN => ServerLine::NameTaken,
        _ => ServerLine::Show(line.trim_end_matches('\r').to_string()),
    }
}

async fn send_line(writer: &mut OwnedWriteHalf, line: &str) -> Result<()> {
    writer
        .write_all(format!("{line}\n").as_bytes())
        .await
        .context("failed to send to the relay")
}

// ── Session loop ──────────────────────────────────────────────────────────────

async fn run(addr: &str, name: &str) -> Result<()> {
    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("failed to connect to skychat at {}; is it running?", addr))?;
    let (read_half, mut writer) = stream.into_split();
    let mut server = BufReader::new(read_half).lines();
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    send_line(&mut writer, &format!("/name {name}")).await?;

    loop {
        tokio::select! {
            line = server.next_line() => {
                match line.context("connection to the relay failed")? {
                    Some(line) => match classify(&line) {
                        ServerLine::Show(text) => println!("{text}"),
                        ServerLine::NameTaken => {
                            eprintln!("{}", wire::NAME_TAKEN);
                            std::process::exit(1);
                        }
                    },
                    None => {
                        println!("Disconnected from the server.");
                        return Ok(());
                    }
                }
            }

            input = stdin.next_line(), if stdin_open => {
                match input.context("failed to read stdin")? {
                    Some(input) => send_line(&mut writer, &input).await?,
                    None => {
                        stdin_open = false;
                        send_line(&mut writer, "/quit").await?;
                    }
                }
            }

            _ = tokio::signal::ctrl_c() => {
                send_line(&mut writer, "/quit").await?;
            }
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut addr = DEFAULT_ADDR.to_string();
    let mut name: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" => {
                i += 1;
                addr = args.get(i).context("--addr requires a value")?.clone();
            }
            "--name" => {
                i += 1;
                name = Some(args.get(i).context("--name requires a value")?.clone());
            }
            "help" | "--help" | "-h" => {
                print_usage();
                return Ok(());
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let Some(name) = name.filter(|n| !n.is_empty() && !n.contains(' ')) else {
        eprintln!("a single-word --name is required");
        eprintln!();
        print_usage();
        std::process::exit(1);
    };

    run(&addr, &name).await
}
