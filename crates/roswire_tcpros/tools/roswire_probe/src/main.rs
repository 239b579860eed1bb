use anyhow::{anyhow, Context, Result};
use tracing::info;

use roswire_core::naming;
use roswire_probe::config::{self, Command, Config};
use roswire_tcpros::RawSubscriber;

/// Bytes of each frame shown in echo mode.
const PREVIEW_LEN: usize = 32;

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_args().map_err(|reason| {
        config::print_usage();
        anyhow!(reason)
    })?;

    let topic = naming::resolve("/", &config.caller_id, &config.topic)
        .with_context(|| format!("resolve topic name {:?}", config.topic))?;

    match config.command {
        Command::Info => info_command(&config, &topic).await,
        Command::Echo => echo_command(&config, &topic).await,
    }
}

async fn info_command(config: &Config, topic: &str) -> Result<()> {
    let info = RawSubscriber::probe(&config.uri, topic, &config.caller_id)
        .await
        .with_context(|| format!("probe {} for {topic}", config.uri))?;

    println!("topic:    {topic}");
    println!("type:     {}", info.msg_type);
    println!("md5sum:   {}", info.md5sum);
    println!("latching: {}", info.latching);
    Ok(())
}

async fn echo_command(config: &Config, topic: &str) -> Result<()> {
    let mut link = RawSubscriber::connect(&config.uri, topic, &config.caller_id)
        .await
        .with_context(|| format!("subscribe to {} for {topic}", config.uri))?;

    info!(
        topic,
        msg_type = link.declared_type(),
        "echoing raw frames (ctrl-c to stop)"
    );

    let mut seen = 0u64;
    loop {
        tokio::select! {
            frame = link.next() => {
                let Some(frame) = frame else {
                    info!(topic, "publisher link closed");
                    break;
                };
                seen += 1;
                println!("[{seen}] {} bytes: {}", frame.len(), preview(&frame));
                if config.count.is_some_and(|limit| seen >= limit) {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown");
                break;
            }
        }
    }
    Ok(())
}

fn preview(frame: &[u8]) -> String {
    let shown = frame
        .iter()
        .take(PREVIEW_LEN)
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(" ");
    if frame.len() > PREVIEW_LEN {
        format!("{shown} ..")
    } else {
        shown
    }
}
