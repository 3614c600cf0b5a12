//! The session: the single long-lived value that owns every core component
//! plus (for netplay) the peer transport. No hidden globals — everything
//! that used to live in file-scope mutable state in the source lives here.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::{info, warn};

use framelock_core::game_probe::{GameProbe, GameStatus};
use framelock_core::replay::{ReplayReader, ReplayWriter};
use framelock_core::{
    handle_transaction, FrameClock, InputBus, InputRing, Outcome, PifTransaction,
    RollbackCoordinator, StateRing,
};
use framelock_host::{AsyncSaveJob, EmulatorHost, SaveStateHost};
use framelock_net::peer_session::{PeerSession, RecvOutcome};
use framelock_net::quic_peer::QuicPeer;
use framelock_net::rendezvous::rendezvous_connect;
use framelock_proto::constants::REDUNDANCY;
use framelock_proto::messages::{
    ClientReady, GetRegistration, InputEvent, ReceiveKeyInfo, ReceiveRegistration, RegisterAck,
    RegisterPlayer, RegistrationSlot, SendKeyInfo, SendSettings,
};
use framelock_proto::msg_id::MsgId;

use crate::errors::SessionError;

const REGISTRATION_TIMEOUT: Duration = Duration::from_secs(5);
const SETTINGS_TIMEOUT: Duration = Duration::from_secs(10);
const CLIENT_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Local-only core wiring shared by record, playback, and netplay sessions:
/// clock, input bus, input ring, optional game probe, optional replay I/O.
pub struct CoreSession {
    pub clock: FrameClock,
    pub input_bus: InputBus,
    pub input_ring: InputRing,
    pub local_port: u8,
    probe: Option<GameProbe>,
    prior_status: Option<GameStatus>,
    /// Raws of the frame before the one just latched, as seen by
    /// `note_game_status`. Shifted forward from `pending_raws` only at the
    /// end of that call, so a transition is checked against the frame that
    /// actually preceded it rather than the one just latched.
    prev_raws: [u32; 4],
    pending_raws: [u32; 4],
    replay_writer: Option<ReplayWriter<BufWriter<File>>>,
    replay_reader: Option<ReplayReader>,
}

impl CoreSession {
    pub fn offline(local_port: u8) -> Self {
        Self {
            clock: FrameClock::new(),
            input_bus: InputBus::new(),
            input_ring: InputRing::default(),
            local_port,
            probe: None,
            prior_status: None,
            prev_raws: [0; 4],
            pending_raws: [0; 4],
            replay_writer: None,
            replay_reader: None,
        }
    }

    pub fn with_probe(mut self, probe: GameProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    /// The attached probe, if any, so a caller can read game status off the
    /// host each vblank and feed it back through [`CoreSession::note_game_status`].
    pub fn probe(&self) -> Option<&GameProbe> {
        self.probe.as_ref()
    }

    /// Open `dir/inputs.bin` for appending, wire up the replay writer, and
    /// snapshot the host's current state to `dir/state.st` so a later
    /// playback of this recording can restore the same starting point.
    pub fn start_recording(mut self, host: &impl SaveStateHost, dir: &Path) -> Result<Self, SessionError> {
        std::fs::create_dir_all(dir)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join("inputs.bin"))?;
        self.replay_writer = Some(ReplayWriter::new(BufWriter::new(file)));
        let snapshot = host.save_state()?;
        std::fs::write(dir.join("state.st"), snapshot)?;
        Ok(self)
    }

    /// Read `dir/inputs.bin` fully to build the playback index, and queue
    /// `dir/state.st` as the host's initial snapshot (§4.9: the async
    /// save-state job facility is used exactly once, here, at playback
    /// start).
    pub fn start_playback(
        mut self,
        host: &mut impl AsyncSaveJob,
        dir: &Path,
    ) -> Result<Self, SessionError> {
        let mut file = File::open(dir.join("inputs.bin"))?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        self.replay_reader = Some(ReplayReader::scan(&bytes));

        let snapshot = std::fs::read(dir.join("state.st"))?;
        host.queue_load(snapshot)?;
        Ok(self)
    }

    /// Drive C1/C2/C3 for one vblank. `live_raws` is ignored for ports being
    /// driven from playback. Returns the frame just latched.
    pub fn on_vblank(&mut self, live_raws: [u32; 4]) -> Result<u64, SessionError> {
        let frame = self.clock.on_vblank();
        self.input_bus.latch(frame);

        let mut raws = [0u32; 4];
        for port in 0u8..4 {
            let raw = if let Some(reader) = &self.replay_reader {
                reader.raw_for_playback(frame, port)
            } else {
                live_raws[port as usize]
            };
            raws[port as usize] = raw;
            self.input_bus.record(port, frame, raw, self.replay_reader.is_some());
        }

        if let Some(writer) = &mut self.replay_writer {
            writer.stage_frame(frame, raws);
            writer.advance(frame)?;
        }

        self.pending_raws = raws;
        Ok(frame)
    }

    /// Feed the probe's current status so the retroactive WAIT→ONGOING write
    /// rule (§4.3/§9) can fire. Call once per vblank, after `on_vblank`,
    /// with the RAM-derived status for the frame just latched.
    pub fn note_game_status(&mut self, status: GameStatus) {
        let transitioning = !self.prior_status.map(GameStatus::is_active).unwrap_or(false)
            && status.is_active();
        if transitioning {
            if let Some(writer) = &mut self.replay_writer {
                let frame = self.clock.current();
                if frame > 0 {
                    writer.retroactive_write(frame - 1, self.prev_raws);
                }
            }
        }
        self.prior_status = Some(status);
        self.prev_raws = self.pending_raws;
    }

    /// Answer one PIF controller transaction for `port`, driven by whatever
    /// the input bus currently holds for that port (§4's `update_input`).
    pub fn update_input(&self, port: u8, command: u8) -> PifTransaction {
        handle_transaction(command, self.input_bus.raw(port))
    }

    pub fn finish_recording(&mut self) {
        if let Some(writer) = self.replay_writer.take() {
            if let Err(e) = writer.finish() {
                warn!(error = %e, "failed to flush replay log at teardown");
            }
        }
    }
}

/// Adds rollback netcode (C8/C9) and the peer transport (C5/C6) on top of a
/// [`CoreSession`]. Buffer-target stall and rollback dispatch both live here
/// since they need the transport.
pub struct NetplaySession {
    pub core: CoreSession,
    pub rollback: RollbackCoordinator,
    pub state_ring: StateRing,
    pub peer: PeerSession,
    pub buffer_target: u64,
    pub remote_port: u8,
}

impl NetplaySession {
    /// Full setup sequence: rendezvous handshake, QUIC connect, registration
    /// round trip, settings sync, save sync, client-ready.
    pub async fn connect(
        local_port: u8,
        is_host: bool,
        broker: SocketAddr,
        token: &str,
        local_data_port: u16,
        buffer_target: u64,
        state_ring_depth: usize,
    ) -> Result<Self, SessionError> {
        let socket = UdpSocket::bind(("0.0.0.0", local_data_port)).await?;
        let bind_addr = socket.local_addr()?;
        let peer_addr =
            rendezvous_connect(&socket, broker, token.as_bytes().to_vec(), bind_addr.port()).await?;

        drop(socket); // hand the port to the QUIC endpoint, which rebinds it
        let quic = QuicPeer::establish(is_host, bind_addr, peer_addr).await?;
        let mut peer = PeerSession::new(quic);

        let remote_port = if local_port == 0 { 1 } else { 0 };
        let mut buffer_target = buffer_target;

        if is_host {
            let _register = wait_for_control::<RegisterPlayer>(
                &mut peer,
                MsgId::RegisterPlayer,
                REGISTRATION_TIMEOUT,
            )
            .await?;
            peer.send_control(
                MsgId::RegisterAck,
                &RegisterAck {
                    player_id: remote_port,
                    buffer_target: buffer_target as u8,
                },
            )
            .await?;
            let _ = wait_for_control::<GetRegistration>(
                &mut peer,
                MsgId::GetRegistration,
                REGISTRATION_TIMEOUT,
            )
            .await?;
            let empty_slot = RegistrationSlot {
                reg_id: 0,
                plugin: 0,
                raw: 0,
            };
            peer.send_control(
                MsgId::ReceiveRegistration,
                &ReceiveRegistration {
                    slots: [empty_slot; 4],
                },
            )
            .await?;
            let _ = wait_for_control::<ClientReady>(&mut peer, MsgId::ClientReady, CLIENT_READY_TIMEOUT)
                .await?;
            peer.send_control(MsgId::SendSettings, &SendSettings { settings: [0; 6] })
                .await?;
        } else {
            peer.send_control(
                MsgId::RegisterPlayer,
                &RegisterPlayer {
                    player: local_port,
                    plugin: 0,
                    raw: 1,
                    reg_id: 0,
                },
            )
            .await?;
            let ack: RegisterAck =
                wait_for_control(&mut peer, MsgId::RegisterAck, REGISTRATION_TIMEOUT).await?;
            buffer_target = ack.buffer_target as u64;

            peer.send_control(MsgId::GetRegistration, &GetRegistration).await?;
            let _: ReceiveRegistration =
                wait_for_control(&mut peer, MsgId::ReceiveRegistration, REGISTRATION_TIMEOUT).await?;

            peer.send_control(MsgId::ClientReady, &ClientReady).await?;
            let _: SendSettings =
                wait_for_control(&mut peer, MsgId::SendSettings, SETTINGS_TIMEOUT).await?;
        }

        info!(local_port, is_host, "netplay session established");

        let mut rollback = RollbackCoordinator::new(
            local_port,
            buffer_target,
            framelock_core::input_ring::DEFAULT_RING_SIZE,
        );
        rollback.set_port_active(local_port, true);
        rollback.set_port_active(remote_port, true);

        Ok(Self {
            core: CoreSession::offline(local_port),
            rollback,
            state_ring: StateRing::new(state_ring_depth),
            peer,
            buffer_target,
            remote_port,
        })
    }

    /// One vblank: dispatch any latched rollback, advance the clock, save
    /// state, send local input, drain the peer, and progress resim.
    pub async fn on_vblank(
        &mut self,
        host: &mut impl EmulatorHost,
        local_raw: u32,
    ) -> Result<Outcome, SessionError> {
        if let Some(target) =
            self.rollback
                .dispatch_rollback(&self.state_ring, host, self.core.clock.current())
        {
            self.core.clock.rewind_to(target);
        }

        let frame = self.core.clock.on_vblank();
        self.core.input_bus.latch(frame);
        self.state_ring.save(host, frame)?;

        let scheduled_frame = frame + self.buffer_target;
        self.core
            .input_ring
            .put(self.core.local_port, scheduled_frame, local_raw, 0);
        self.core
            .input_bus
            .record(self.core.local_port, frame, local_raw, false);

        self.send_local_input(scheduled_frame).await?;

        let events = self.peer.drain().await;
        self.apply_peer_events(events, frame);

        if self.rollback.is_resimulating() && self.rollback.tick_resim() {
            self.rollback.post_resim_scan(&self.core.input_ring, frame);
        }

        Ok(Outcome::Success)
    }

    /// Answer one PIF controller transaction for `port`; delegates to the
    /// wrapped [`CoreSession`].
    pub fn update_input(&self, port: u8, command: u8) -> PifTransaction {
        self.core.update_input(port, command)
    }

    /// §4.6 flow control: stall while `local_frame - remote_frame >
    /// buffer_target`, bounded to 500 ms.
    pub async fn check_sync(&mut self) {
        let local_frame = self.core.clock.current();
        let events = self
            .peer
            .stall_for_buffer_target(local_frame, self.buffer_target)
            .await;
        self.apply_peer_events(events, local_frame);
    }

    async fn send_local_input(&mut self, scheduled_frame: u64) -> Result<(), SessionError> {
        let mut events = Vec::with_capacity(REDUNDANCY);
        for back in 0..REDUNDANCY as u64 {
            let f = scheduled_frame.saturating_sub(back);
            if let Some(entry) = self.core.input_ring.get(self.core.local_port, f) {
                events.push(InputEvent {
                    frame: f as u32,
                    raw: entry.raw,
                    plugin: entry.plugin,
                });
            }
        }
        let msg = SendKeyInfo {
            player: self.core.local_port,
            sender_vi: scheduled_frame,
            events,
        };
        self.peer.send_input(&msg, MsgId::SendKeyInfo)?;
        Ok(())
    }

    fn apply_peer_events(&mut self, events: Vec<RecvOutcome>, current_frame: u64) {
        for event in events {
            let (msg_id, payload) = match event {
                RecvOutcome::Input(msg) | RecvOutcome::Control(msg) | RecvOutcome::Bulk(msg) => {
                    (msg.msg_id, msg.payload)
                }
                RecvOutcome::Disconnected => {
                    warn!("peer disconnected");
                    continue;
                }
            };

            let (player, sender_vi, remote_events) = match msg_id {
                MsgId::SendKeyInfo => {
                    let Ok(info) = postcard::from_bytes::<SendKeyInfo>(&payload) else {
                        continue;
                    };
                    (info.player, info.sender_vi, info.events)
                }
                MsgId::ReceiveKeyInfo => {
                    let Ok(info) = postcard::from_bytes::<ReceiveKeyInfo>(&payload) else {
                        continue;
                    };
                    (info.player, info.sender_vi, info.events)
                }
                _ => continue,
            };

            if player != self.remote_port {
                warn!(player, expected = self.remote_port, "input packet from unexpected port, dropping");
                continue;
            }

            self.peer.observe_remote_vi(sender_vi);
            for ev in &remote_events {
                self.core
                    .input_ring
                    .put(player, ev.frame as u64, ev.raw, ev.plugin);
                self.rollback
                    .on_remote_input(player, ev.frame as u64, ev.raw, current_frame);
            }
        }
    }
}

async fn wait_for_control<T: serde::de::DeserializeOwned>(
    peer: &mut PeerSession,
    expected: MsgId,
    bound: Duration,
) -> Result<T, SessionError> {
    timeout(bound, async {
        loop {
            for event in peer.drain().await {
                if let RecvOutcome::Control(msg) = event {
                    if msg.msg_id == expected {
                        if let Ok(decoded) = postcard::from_bytes(&msg.payload) {
                            return decoded;
                        }
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| SessionError::SetupTimeout(bound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use framelock_core::game_probe::GameStatus;
    use framelock_host::mock::MockHost;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn scratch_dir(name: &str) -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!("framelock-session-test-{name}-{}-{n}", std::process::id()))
    }

    #[test]
    fn record_then_playback_round_trips_input() {
        let dir = scratch_dir("round-trip");
        let rec_host = MockHost::new();
        let mut recorder = CoreSession::offline(0).start_recording(&rec_host, &dir).unwrap();
        for frame in 0u64..10 {
            let raw = if frame == 3 { 0x0000_1000 } else { 0 };
            recorder.on_vblank([raw, 0, 0, 0]).unwrap();
        }
        recorder.finish_recording();

        let mut play_host = MockHost::new();
        let mut player = CoreSession::offline(0).start_playback(&mut play_host, &dir).unwrap();
        for frame in 0u64..10 {
            player.on_vblank([0, 0, 0, 0]).unwrap();
            let expected = if frame == 3 { 0x0000_1000 } else { 0 };
            assert_eq!(player.input_bus.raw(0), expected, "frame {frame} mismatch");
            assert!(player.input_bus.from_playback(0));
        }

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn note_game_status_retroactively_writes_wait_to_ongoing_transition() {
        let dir = scratch_dir("retro-write");
        let host = MockHost::new();
        let mut session = CoreSession::offline(0).start_recording(&host, &dir).unwrap();

        session.on_vblank([0x0000_0010, 0, 0, 0]).unwrap(); // first frame: Start pressed during WAIT
        session.note_game_status(GameStatus::Wait);
        session.on_vblank([0, 0, 0, 0]).unwrap(); // next frame: ONGOING begins
        session.note_game_status(GameStatus::Ongoing);

        session.finish_recording();

        let bytes = std::fs::read(dir.join("inputs.bin")).unwrap();
        let reader = ReplayReader::scan(&bytes);
        assert_eq!(
            reader.raw_for_playback(1, 0) & 0x0000_0010,
            0,
            "start/pause bit must be masked on playback read"
        );
        assert!(
            reader.get(1).is_some(),
            "the frame preceding the transition must have been retroactively committed"
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn note_game_status_is_a_no_op_without_an_active_recorder() {
        let mut session = CoreSession::offline(2);
        session.note_game_status(GameStatus::Ongoing);
        assert_eq!(session.on_vblank([0, 0, 0, 0]).unwrap(), 1);
    }

    #[test]
    fn update_input_echoes_the_polled_ports_latched_raw() {
        use framelock_core::pif::JCMD_CONTROLLER_READ;

        let mut session = CoreSession::offline(0);
        session.on_vblank([0x0000_8000, 0, 0, 0]).unwrap();
        let txn = session.update_input(0, JCMD_CONTROLLER_READ);
        assert_eq!(txn.response, vec![0x00, 0x00, 0x80, 0x00]);
    }
}
