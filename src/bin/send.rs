//! OSC test sender
//!
//! Sends one message, optionally repeated, to a running router.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::UdpSocket;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use osc_router::protocol::{numeric_value, OscArg, OscMessage};

/// Send an OSC message over UDP.
#[derive(Parser, Debug)]
#[command(name = "osc-send")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OSC address, e.g. /face/jawOpen
    address: String,

    /// Arguments: integers, floats, true/false, nil, anything else is a string.
    #[arg(allow_negative_numbers = true)]
    values: Vec<String>,

    /// Destination host:port.
    #[arg(short, long, default_value = "127.0.0.1:9000")]
    target: String,

    /// Send the message this many times.
    #[arg(short, long, default_value_t = 1)]
    repeat: u32,

    /// Delay between repeats.
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,

    /// Linearly ramp the first argument from 0 to its value over the repeats.
    #[arg(long)]
    ramp: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    if !args.address.starts_with('/') {
        anyhow::bail!("OSC address must start with '/': {}", args.address);
    }

    let values: Vec<OscArg> = args.values.iter().map(|v| parse_arg(v)).collect();
    let socket = UdpSocket::bind("0.0.0.0:0").context("binding local socket")?;
    socket
        .connect(&args.target)
        .with_context(|| format!("resolving {}", args.target))?;

    let repeat = args.repeat.max(1);
    for i in 0..repeat {
        let mut msg_args = values.clone();
        if args.ramp {
            if let Some(first) = msg_args.first_mut() {
                let fraction = if repeat > 1 { i as f64 / (repeat - 1) as f64 } else { 1.0 };
                *first = ramp(first, fraction);
            }
        }

        let msg = OscMessage::new(args.address.clone(), msg_args);
        socket.send(&msg.encode()?).context("sending datagram")?;
        tracing::debug!("Sent {} {:?}", msg.address, msg.args);

        if i + 1 < repeat {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    tracing::info!("Sent {} message(s) to {}", repeat, args.target);
    Ok(())
}

fn parse_arg(text: &str) -> OscArg {
    if let Ok(i) = text.parse::<i32>() {
        return OscArg::Int(i);
    }
    if let Ok(f) = text.parse::<f32>() {
        return OscArg::Float(f);
    }
    match text {
        "true" => OscArg::Bool(true),
        "false" => OscArg::Bool(false),
        "nil" => OscArg::Nil,
        _ => OscArg::String(text.to_string()),
    }
}

fn ramp(arg: &OscArg, fraction: f64) -> OscArg {
    match numeric_value(arg) {
        Some(end) => OscArg::Float((end * fraction) as f32),
        None => arg.clone(),
    }
}
