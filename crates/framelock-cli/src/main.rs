//! CLI front-end: local record/playback smoke-testing and a two-process
//! netplay demo, driving the session against an in-memory [`MockHost`] since
//! wiring to a concrete N64 emulator core is an external collaborator's job.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use framelock_core::pif::JCMD_CONTROLLER_READ;
use framelock_host::mock::MockHost;
use framelock_host::RamAccess;
use framelock_session::session::{CoreSession, NetplaySession};
use framelock_session::Config;

/// How many vblanks the local-only demo run drives before exiting.
const LOCAL_DEMO_FRAMES: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    let config = Config::parse();

    if let Some((relay_host, token, is_host)) = config.netplay_params() {
        run_netplay(&config, relay_host, token, is_host).await
    } else {
        run_local(&config)
    }
}

fn run_local(config: &Config) -> anyhow::Result<()> {
    let mut host = MockHost::new();
    let mut core = CoreSession::offline(0);

    if config.playback {
        let dir = config
            .playback_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--Playback requires --PlaybackPath"))?;
        info!(?dir, "starting playback session");
        core = core.start_playback(&mut host, dir)?;
    } else if config.record {
        let dir = config
            .record_path
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--Record requires --RecordPath"))?;
        info!(?dir, "starting recording session");
        core = core.start_recording(&host, dir)?;
    }

    for frame in 0..LOCAL_DEMO_FRAMES {
        let raw = if frame % 60 == 0 { 0x0000_8000 } else { 0 };
        core.on_vblank([raw, 0, 0, 0])?;
        if let Some(probe) = core.probe() {
            let status = probe.game_status(&host);
            core.note_game_status(status);
        }
        let _ = core.update_input(0, JCMD_CONTROLLER_READ);
    }

    core.finish_recording();
    info!(frames = LOCAL_DEMO_FRAMES, "local demo run complete");
    Ok(())
}

async fn run_netplay(
    config: &Config,
    relay_host: &str,
    token: &str,
    is_host: bool,
) -> anyhow::Result<()> {
    let broker: SocketAddr = relay_host
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid --relay-host {relay_host:?}: {e}"))?;
    let local_port = if is_host { 0 } else { 1 };
    let local_data_port = 0; // bind ephemeral; the resolved port is what goes into the HELLO

    info!(is_host, %broker, "connecting to rendezvous broker");
    let mut session = NetplaySession::connect(
        local_port,
        is_host,
        broker,
        token,
        local_data_port,
        config.buffer_target,
        config.state_ring_depth,
    )
    .await?;

    let mut host = MockHost::new();
    loop {
        session.check_sync().await;
        let _ = session.update_input(local_port, JCMD_CONTROLLER_READ);
        if let Err(e) = session.on_vblank(&mut host, 0).await {
            warn!(error = %e, "vblank tick failed, tearing down session");
            break;
        }
        tokio::time::sleep(Duration::from_millis(16)).await;
    }

    Ok(())
}
