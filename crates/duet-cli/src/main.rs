//! Duet CLI tools: share links, in-process session demo.

#![forbid(unsafe_code)]

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use duet_common::{Capabilities, LogNotifySurface, NotifySurface};
use duet_session::{
    Command as SessionCommand, MemoryHub, RetryPolicy, Session, SessionConfig, SessionUpdate,
    TimerConfig,
};
use pulse_core::{parse_share_link, share_link};

#[derive(Parser, Debug)]
#[command(name = "duet")]
#[command(about = "Duet CLI tools")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a share link for a peer identity
    Share {
        /// Base URL to attach the identity to
        #[arg(short, long, default_value = "https://duet.example/")]
        base: String,

        /// Local peer identity to publish
        #[arg(short, long)]
        identity: String,
    },

    /// Extract the target identity from a share link
    Parse {
        /// The link to inspect
        link: String,
    },

    /// Run a host and a guest session in-process and mirror the countdown
    Demo {
        /// Countdown length in seconds
        #[arg(short, long, default_value_t = 5)]
        length: u32,
    },

    /// Show version information
    Version,
}

fn main() -> Result<()> {
    duet_common::init_tracing();

    let args = Args::parse();

    match args.command {
        Command::Share { base, identity } => {
            let url = share_link(&base, &identity)?;
            println!("{url}");
        }
        Command::Parse { link } => match parse_share_link(&link)? {
            Some(identity) => println!("{identity}"),
            None => println!("(no target)"),
        },
        Command::Demo { length } => {
            let rt = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            rt.block_on(run_demo(length))?;
        }
        Command::Version => {
            println!(
                "duet {} (pulse protocol v{})",
                env!("CARGO_PKG_VERSION"),
                pulse_core::PULSE_VERSION
            );
        }
    }

    Ok(())
}

fn demo_config(length: u32, target: Option<String>) -> SessionConfig {
    SessionConfig {
        base_url: "https://duet.example/".to_string(),
        timer: TimerConfig {
            length_seconds: length,
            ..TimerConfig::default()
        },
        capabilities: Capabilities {
            can_notify: true,
            can_share: false,
        },
        retry: RetryPolicy::default(),
        target,
    }
}

async fn run_demo(length: u32) -> Result<()> {
    tracing::info!(length, "starting in-process demo");
    let hub = MemoryHub::new();

    let mut greeter = LogNotifySurface::new();
    greeter.notify("Hello");

    let (host_transport, host_events) = hub.endpoint();
    let mut host = Session::spawn(
        demo_config(length, None),
        host_transport,
        host_events,
        Box::new(LogNotifySurface::new()),
    );

    let link = loop {
        match host.updates.recv().await {
            Some(SessionUpdate::Registered { share_link, .. }) => break share_link,
            Some(_) => continue,
            None => anyhow::bail!("host session ended before registering"),
        }
    };
    println!("[host] share this link: {link}");

    let target = parse_share_link(&link)?
        .ok_or_else(|| anyhow::anyhow!("host link carries no identity"))?;
    let (guest_transport, guest_events) = hub.endpoint();
    let guest = Session::spawn(
        demo_config(length, Some(target)),
        guest_transport,
        guest_events,
        Box::new(LogNotifySurface::new()),
    );

    host.commands.send(SessionCommand::Toggle)?;

    let host_printer = spawn_printer("host", host.updates);
    let guest_printer = spawn_printer("guest", guest.updates);

    // The countdown plus a margin for the final mirrored tick.
    tokio::time::sleep(Duration::from_secs(u64::from(length) + 2)).await;

    let _ = host.commands.send(SessionCommand::Shutdown);
    let _ = guest.commands.send(SessionCommand::Shutdown);
    host.task.await?;
    guest.task.await?;
    host_printer.await?;
    guest_printer.await?;

    Ok(())
}

fn spawn_printer(
    label: &'static str,
    mut updates: tokio::sync::mpsc::UnboundedReceiver<SessionUpdate>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update {
                SessionUpdate::Display { seconds, overlay } => {
                    let source = if overlay { "remote" } else { "local" };
                    println!("[{label}] {seconds:>4}s ({source})");
                }
                SessionUpdate::Expired => println!("[{label}] time's up"),
                SessionUpdate::Connected => println!("[{label}] connected"),
                SessionUpdate::Disconnected => println!("[{label}] disconnected"),
                SessionUpdate::Registered { identity, .. } => {
                    println!("[{label}] registered as {identity}");
                }
            }
        }
    })
}
