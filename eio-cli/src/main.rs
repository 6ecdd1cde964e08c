use std::time::Duration;

use clap::Parser;
use eio::{ClientConnection, Dialer, Message, Options, TransportType};
use http::{HeaderName, HeaderValue};

#[derive(clap::Parser)]
pub(crate) struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
pub(crate) enum Command {
    /// Connect to a server, print what it sends and optionally send messages
    Dial(DialCommand),
}

#[derive(clap::Parser)]
pub(crate) struct DialCommand {
    #[arg(help = "Engine.IO endpoint, e.g. http://localhost:3000/engine.io/")]
    url: String,
    #[arg(
        short,
        long,
        value_delimiter = ',',
        default_value = "polling,websocket",
        help = "Transports in ascending order of preference, the last one is tried first"
    )]
    transports: Vec<TransportType>,
    #[arg(short, long, default_value = "", help = "Extra query string to send")]
    query: String,
    #[arg(long = "header", value_parser = parse_header, help = "Extra header as NAME:VALUE")]
    headers: Vec<(HeaderName, HeaderValue)>,
    #[arg(short, long, help = "Text messages to send once connected")]
    send: Vec<String>,
    #[arg(long, help = "Close the connection after this many seconds")]
    close_after: Option<u64>,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let Args { command } = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match command {
        Command::Dial(dial_command) => dial(dial_command).await,
    }
}

fn parse_header(s: &str) -> Result<(HeaderName, HeaderValue), String> {
    let (name, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected NAME:VALUE, got {s:?}"))?;
    let name = HeaderName::try_from(name.trim()).map_err(|e| e.to_string())?;
    let value = HeaderValue::try_from(value.trim()).map_err(|e| e.to_string())?;
    Ok((name, value))
}

async fn dial(
    DialCommand {
        url,
        transports,
        query,
        headers,
        send,
        close_after,
    }: DialCommand,
) -> eyre::Result<()> {
    let options = Options {
        transports,
        ..Default::default()
    };
    let mut builder = Dialer::build_tokio()
        .with_options(options)
        .with_default_transports()
        .with_query(query)
        .on_connect(|conn| {
            tracing::info!(sid = conn.id(), transport = conn.transport(), "connected");
        });
    for (name, value) in headers {
        builder = builder.with_header(name, value);
    }
    let dialer = builder.build();

    let conn = dialer.dial(&url).await?;
    tracing::info!(
        ping_interval = ?conn.params().ping_interval,
        ping_timeout = ?conn.params().ping_timeout,
        upgrades = ?conn.params().upgrades,
        "session parameters"
    );

    for text in send {
        conn.send(text)?;
    }

    let deadline = async {
        match close_after {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::select! {
        _ = print_messages(&conn) => {},
        _ = deadline => tracing::info!("closing"),
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, closing"),
    }

    let reason = conn.shutdown().await;
    tracing::info!(%reason, "connection finished");
    Ok(())
}

async fn print_messages(conn: &ClientConnection) {
    while let Some(msg) = conn.recv().await {
        match msg {
            Message::Text(text) => println!("{text}"),
            Message::Binary(data) => println!("<{} binary bytes>", data.len()),
        }
    }
}
