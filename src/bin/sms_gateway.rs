// ABOUTME: Command-line front-end for the gateway: binds from environment settings
// ABOUTME: and sends one message or a tab-separated batch read from stdin

//! # sms-gateway
//!
//! Connection settings come from the environment (`SMPP_SMSC`,
//! `SMPP_SYSTEM_ID`, `SMPP_PASSWORD` and friends, see
//! [`smpp_gateway::config`]).
//!
//! ```bash
//! # One message
//! sms-gateway --to 447700900000 --message "hello there"
//!
//! # A batch, one `destination<TAB>text` per line
//! printf '447700900000\thello\n447700900001\tbye\n' | sms-gateway
//!
//! # Stay bound for a minute to log inbound messages and receipts
//! sms-gateway --to 447700900000 --message ping --linger 60
//! ```

use argh::FromArgs;
use smpp_gateway::client::Session;
use smpp_gateway::config::GatewayConfig;
use smpp_gateway::message::{InboundDispatcher, LoggingSink, Reassembler};
use smpp_gateway::{GatewayError, MessageSender};
use std::error::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Send SMS through an SMPP transceiver session
#[derive(FromArgs)]
struct CliArgs {
    /// whether or not to enable debugging
    #[argh(switch, short = 'd')]
    debugging: bool,

    /// the recipient telephone number (reads stdin when omitted)
    #[argh(option, short = 't')]
    to: Option<String>,

    /// the message text, required with --to
    #[argh(option, short = 'm')]
    message: Option<String>,

    /// seconds to stay bound after sending so inbound traffic is logged
    #[argh(option, default = "0")]
    linger: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = argh::from_env();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(if cli_args.debugging { Level::DEBUG } else { Level::INFO })
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let config = GatewayConfig::from_env()?;

    let reassembler = Arc::new(Reassembler::new(config.reassembly_max_age));
    let sweeper = Reassembler::spawn_sweeper(&reassembler, config.sweep_interval);

    info!("Connecting to {}", config.smsc);
    let session = Session::builder(config.credentials)
        .settings(config.settings)
        .handler(Arc::new(InboundDispatcher::new(reassembler, LoggingSink)))
        .connect(config.smsc)
        .await?;
    info!("Bound as transceiver");

    let sender = MessageSender::new(session.clone(), config.source);

    let failures = match (cli_args.to, cli_args.message) {
        (Some(to), Some(message)) => u32::from(send_one(&sender, &to, &message).await.is_err()),
        (Some(_), None) | (None, Some(_)) => {
            error!("--to and --message must be given together");
            session.close().await?;
            return Err("incomplete arguments".into());
        }
        (None, None) => send_batch(&sender).await?,
    };

    if cli_args.linger > 0 {
        info!("Staying bound for {} seconds", cli_args.linger);
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(cli_args.linger)) => {}
            _ = tokio::signal::ctrl_c() => info!("Interrupted"),
        }
    }

    let keep_alive = session.keep_alive_status();
    if keep_alive.running {
        info!(
            "Keep-alive: {} pings, {} pongs",
            keep_alive.total_pings, keep_alive.total_pongs
        );
    }

    session.close().await?;
    sweeper.abort();

    if failures > 0 {
        return Err(format!("{failures} message(s) failed").into());
    }
    Ok(())
}

async fn send_one(
    sender: &MessageSender<Session>,
    to: &str,
    text: &str,
) -> Result<(), GatewayError> {
    match sender.send_message(to, text).await {
        Ok(receipts) => {
            let ids: Vec<&str> = receipts.iter().map(|r| r.message_id.as_str()).collect();
            info!("Sent to {to}: {}", ids.join(","));
            Ok(())
        }
        Err(e) => {
            error!("Sending to {to} failed: {e}");
            Err(e)
        }
    }
}

/// Sends every `destination<TAB>text` line on stdin and returns how many failed.
async fn send_batch(sender: &MessageSender<Session>) -> Result<u32, Box<dyn Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut failures = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let Some((to, text)) = line.split_once('\t') else {
            warn!("Skipping line without a tab: {line:?}");
            failures += 1;
            continue;
        };
        if send_one(sender, to.trim(), text).await.is_err() {
            failures += 1;
        }
    }
    Ok(failures)
}
