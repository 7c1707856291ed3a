//! Session lifecycle orchestration
//!
//! The [`SessionManager`] is the only component that mutates the
//! session store. Every trigger that can end a session — playback
//! exhaustion, the idle-channel watchdog, an explicit leave, an
//! external disconnect — converges on [`SessionManager::teardown`],
//! which is idempotent: the session is removed from the store before
//! any resource is released, so concurrent triggers see "absent" and
//! no-op. Scheduled timers capture the session generation and
//! re-validate it against the store before acting, which keeps a stale
//! timer from ever touching a newer session for the same guild.

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::config::SessionTiming;
use crate::error::Result;
use crate::gateway::VoiceGateway;
use crate::reply::{Ack, Rejection};
use crate::store::SessionStore;

/// Orchestrates per-guild voice sessions over a [`VoiceGateway`]
pub struct SessionManager {
    store: RwLock<SessionStore>,
    gateway: Arc<dyn VoiceGateway>,
    timing: SessionTiming,
}

impl SessionManager {
    /// Create a manager driving the given gateway
    pub fn new(gateway: Arc<dyn VoiceGateway>, timing: SessionTiming) -> Arc<Self> {
        Arc::new(Self {
            store: RwLock::new(SessionStore::new()),
            gateway,
            timing,
        })
    }

    /// Drain a gateway cycle-end feed into [`Self::on_cycle_end`].
    /// The adaptor sends the guild id each time one clip playthrough
    /// finishes.
    pub fn drive_cycle_ends(self: &Arc<Self>, mut cycle_ends: UnboundedReceiver<u64>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(guild_id) = cycle_ends.recv().await {
                manager.on_cycle_end(guild_id).await;
            }
        });
    }

    /// Start (or rejoin) looping playback in a voice channel.
    ///
    /// `cycles` as given by the user: `None` loops forever, a positive
    /// number plays that many cycles. Preconditions about the invoker
    /// (guild member, in a voice channel) are the command surface's
    /// responsibility and checked before this is called.
    pub async fn start(
        self: &Arc<Self>,
        guild_id: u64,
        channel_id: u64,
        cycles: Option<i64>,
    ) -> std::result::Result<Ack, Rejection> {
        if matches!(cycles, Some(n) if n <= 0) {
            return Err(Rejection::invalid_cycle_count());
        }
        let requested = cycles.map(|n| n as u64);

        // Reuse path: a live session for this guild either absorbs the
        // start (same channel) or rejects it (different channel).
        if let Some(outcome) = self.try_reuse(guild_id, channel_id, requested).await {
            return outcome;
        }

        if let Err(e) = self.gateway.connect(guild_id, channel_id).await {
            warn!(guild_id = %guild_id, channel_id = %channel_id, error = %e, "Failed to join voice channel");
            return Err(Rejection::join_failed());
        }

        let generation = {
            let mut store = self.store.write().await;
            // A racing start may have registered the session while we
            // were connecting; songbird reuses the call, so degrade to
            // the reuse semantics instead of double-joining.
            if let Some(existing) = store.get(guild_id) {
                if existing.channel_id == channel_id {
                    return Ok(Ack::Started);
                }
                return Err(Rejection::already_active_elsewhere());
            }
            let generation = store.insert(guild_id, channel_id, requested);
            let watchdog = self.spawn_watchdog(guild_id, channel_id, generation);
            if let Some(session) = store.get_mut(guild_id) {
                session.watchdog = Some(watchdog);
            }
            generation
        };

        info!(
            guild_id = %guild_id,
            channel_id = %channel_id,
            cycles = ?requested,
            "Voice session started"
        );

        if self.begin_cycle(guild_id, generation).await.is_err() {
            return Err(Rejection::join_failed());
        }
        Ok(Ack::Started)
    }

    /// Release the session for a guild on user request. The ack is
    /// returned immediately; resource release runs fire-and-forget.
    pub async fn leave(self: &Arc<Self>, guild_id: u64) -> std::result::Result<Ack, Rejection> {
        if self.store.read().await.get(guild_id).is_none() {
            return Err(Rejection::not_active());
        }
        self.spawn_teardown(guild_id);
        Ok(Ack::Stopped)
    }

    /// One playback cycle finished. Either schedule the next cycle
    /// after the inter-cycle gap or, on exhaustion, arm the grace
    /// timer so a rapid re-start can cancel the pending stop.
    pub async fn on_cycle_end(self: &Arc<Self>, guild_id: u64) {
        let mut store = self.store.write().await;
        let Some(session) = store.get_mut(guild_id) else {
            return;
        };
        if !session.cycle_active {
            // Idle notification with no cycle running; the transport
            // can emit these spuriously.
            debug!(guild_id = %guild_id, "Ignoring idle event without an active cycle");
            return;
        }
        session.cycle_active = false;
        let generation = session.generation;

        match session.remaining_cycles {
            None => self.schedule_cycle(guild_id, generation),
            Some(n) => {
                let left = n.saturating_sub(1);
                session.remaining_cycles = Some(left);
                if left > 0 {
                    self.schedule_cycle(guild_id, generation);
                } else {
                    debug!(guild_id = %guild_id, "Play count exhausted, arming grace stop");
                    session.pending_stop = Some(self.spawn_grace_stop(guild_id, generation));
                }
            }
        }
    }

    /// The bot's own voice state changed. An external actor moved or
    /// disconnected it when the new channel differs from the recorded
    /// one (or is gone), and the session must be released.
    pub async fn on_bot_voice_state(self: &Arc<Self>, guild_id: u64, new_channel: Option<u64>) {
        let recorded = self.store.read().await.get(guild_id).map(|s| s.channel_id);
        let Some(channel_id) = recorded else {
            return;
        };
        if new_channel != Some(channel_id) {
            info!(
                guild_id = %guild_id,
                recorded_channel = %channel_id,
                new_channel = ?new_channel,
                "Bot moved or disconnected externally, releasing session"
            );
            self.teardown(guild_id).await;
        }
    }

    /// Idempotently release everything a session owns. Removing the
    /// session from the store comes first, so any concurrent trigger
    /// sees "absent" and no-ops; then timers are cancelled, then the
    /// transport is released best-effort.
    pub async fn teardown(&self, guild_id: u64) {
        let session = self.store.write().await.remove(guild_id);
        let Some(mut session) = session else {
            return;
        };
        info!(guild_id = %guild_id, channel_id = %session.channel_id, "Tearing down voice session");
        session.cancel_timers();
        // Transport errors here are logged and swallowed by the
        // gateway; an already-destroyed connection is not an error.
        self.gateway.disconnect(guild_id).await;
    }

    /// Channel the session for a guild is bound to, if one is live
    pub async fn active_channel(&self, guild_id: u64) -> Option<u64> {
        self.store.read().await.get(guild_id).map(|s| s.channel_id)
    }

    /// Absorb a same-channel start into the live session, or reject a
    /// start for a different channel. `None` means no session exists.
    async fn try_reuse(
        self: &Arc<Self>,
        guild_id: u64,
        channel_id: u64,
        requested: Option<u64>,
    ) -> Option<std::result::Result<Ack, Rejection>> {
        let mut resume_generation = None;
        {
            let mut store = self.store.write().await;
            let session = store.get_mut(guild_id)?;
            if session.channel_id != channel_id {
                return Some(Err(Rejection::already_active_elsewhere()));
            }
            if let Some(pending) = session.pending_stop.take() {
                pending.abort();
                debug!(guild_id = %guild_id, "Cancelled pending grace stop on restart");
            }
            if session.remaining_cycles == Some(0) {
                // Exhausted but still in the grace window: adopt the
                // new count and resume the loop.
                session.remaining_cycles = requested;
                if !session.cycle_active {
                    resume_generation = Some(session.generation);
                }
            }
        }
        if let Some(generation) = resume_generation {
            self.schedule_cycle(guild_id, generation);
        }
        info!(guild_id = %guild_id, channel_id = %channel_id, "Joined ongoing play");
        Some(Ok(Ack::Started))
    }

    /// Mark a cycle active and start playback. On transport failure
    /// the session is torn down.
    async fn begin_cycle(self: &Arc<Self>, guild_id: u64, generation: u64) -> Result<()> {
        {
            let mut store = self.store.write().await;
            if !store.generation_matches(guild_id, generation) {
                return Ok(());
            }
            let Some(session) = store.get_mut(guild_id) else {
                return Ok(());
            };
            if session.cycle_active {
                return Ok(());
            }
            session.cycle_active = true;
        }
        if let Err(e) = self.gateway.play_clip(guild_id).await {
            warn!(guild_id = %guild_id, error = %e, "Playback failed, releasing session");
            self.teardown(guild_id).await;
            return Err(e);
        }
        Ok(())
    }

    /// Start the next cycle after the fixed inter-cycle gap. The task
    /// re-validates the generation when it fires, so it cannot revive
    /// a torn-down session.
    fn schedule_cycle(self: &Arc<Self>, guild_id: u64, generation: u64) {
        let manager = Arc::clone(self);
        let gap = self.timing.cycle_gap;
        tokio::spawn(async move {
            tokio::time::sleep(gap).await;
            let _ = manager.begin_cycle(guild_id, generation).await;
        });
    }

    /// Arm the exhaustion grace timer. The handle is stored on the
    /// session so a same-channel restart can abort it; if it fires, it
    /// only tears down a session that is still this one, still
    /// exhausted, and still idle.
    fn spawn_grace_stop(self: &Arc<Self>, guild_id: u64, generation: u64) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let grace = self.timing.stop_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let expired = {
                let store = manager.store.read().await;
                store.get(guild_id).is_some_and(|s| {
                    s.generation == generation
                        && s.remaining_cycles == Some(0)
                        && !s.cycle_active
                })
            };
            if expired {
                info!(guild_id = %guild_id, "Grace window elapsed after final cycle");
                // Teardown aborts this very timer; run it detached so
                // the abort cannot cut the release short.
                manager.spawn_teardown(guild_id);
            }
        })
    }

    /// Per-session idle-channel watchdog. Ticks on a fixed period,
    /// and when the bot is alone arms a debounce that re-reads live
    /// membership before acting. Exits as soon as its session is no
    /// longer the current one.
    fn spawn_watchdog(
        self: &Arc<Self>,
        guild_id: u64,
        channel_id: u64,
        generation: u64,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        let timing = self.timing;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(timing.empty_check_period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if !manager.is_current(guild_id, generation).await {
                    return;
                }
                if !manager.bot_is_alone(guild_id, channel_id).await {
                    continue;
                }
                debug!(guild_id = %guild_id, channel_id = %channel_id, "Channel looks empty, debouncing");
                tokio::time::sleep(timing.empty_debounce).await;
                if !manager.is_current(guild_id, generation).await {
                    return;
                }
                if manager.bot_is_alone(guild_id, channel_id).await {
                    info!(guild_id = %guild_id, channel_id = %channel_id, "Channel still empty, leaving");
                    // Teardown aborts this task; detach the release.
                    manager.spawn_teardown(guild_id);
                    return;
                }
            }
        })
    }

    /// Fire-and-forget teardown, used by tasks the teardown itself
    /// aborts and by `leave`'s synchronous acknowledgement.
    fn spawn_teardown(self: &Arc<Self>, guild_id: u64) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            manager.teardown(guild_id).await;
        });
    }

    async fn is_current(&self, guild_id: u64, generation: u64) -> bool {
        self.store
            .read()
            .await
            .generation_matches(guild_id, generation)
    }

    /// Nobody but the bot (or nobody at all) left in the channel.
    /// An unknown channel is treated as occupied, never as empty.
    async fn bot_is_alone(&self, guild_id: u64, channel_id: u64) -> bool {
        matches!(
            self.gateway.occupant_count(guild_id, channel_id).await,
            Some(n) if n <= 1
        )
    }

    #[cfg(test)]
    async fn remaining_cycles(&self, guild_id: u64) -> Option<Option<u64>> {
        self.store
            .read()
            .await
            .get(guild_id)
            .map(|s| s.remaining_cycles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HakariError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory gateway recording every call the manager makes
    #[derive(Default)]
    struct FakeGateway {
        connects: Mutex<Vec<(u64, u64)>>,
        disconnects: Mutex<Vec<u64>>,
        plays: Mutex<Vec<u64>>,
        occupants: Mutex<HashMap<(u64, u64), usize>>,
        fail_connect: AtomicBool,
        fail_play: AtomicBool,
    }

    impl FakeGateway {
        fn set_occupants(&self, guild_id: u64, channel_id: u64, count: usize) {
            self.occupants
                .lock()
                .unwrap()
                .insert((guild_id, channel_id), count);
        }

        fn connect_count(&self) -> usize {
            self.connects.lock().unwrap().len()
        }

        fn disconnect_count(&self) -> usize {
            self.disconnects.lock().unwrap().len()
        }

        fn play_count(&self) -> usize {
            self.plays.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VoiceGateway for FakeGateway {
        async fn connect(&self, guild_id: u64, channel_id: u64) -> Result<()> {
            if self.fail_connect.load(Ordering::SeqCst) {
                return Err(HakariError::transport("join refused"));
            }
            self.connects.lock().unwrap().push((guild_id, channel_id));
            Ok(())
        }

        async fn play_clip(&self, guild_id: u64) -> Result<()> {
            if self.fail_play.load(Ordering::SeqCst) {
                return Err(HakariError::transport("player refused"));
            }
            self.plays.lock().unwrap().push(guild_id);
            Ok(())
        }

        async fn disconnect(&self, guild_id: u64) {
            self.disconnects.lock().unwrap().push(guild_id);
        }

        async fn occupant_count(&self, guild_id: u64, channel_id: u64) -> Option<usize> {
            self.occupants
                .lock()
                .unwrap()
                .get(&(guild_id, channel_id))
                .copied()
        }
    }

    fn manager_with(gateway: &Arc<FakeGateway>) -> Arc<SessionManager> {
        SessionManager::new(
            Arc::clone(gateway) as Arc<dyn VoiceGateway>,
            SessionTiming::default(),
        )
    }

    /// Let spawned timers run; paused-clock tests auto-advance when idle.
    async fn settle(duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_creates_one_session_and_plays() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        let ack = manager.start(1, 10, Some(3)).await.unwrap();
        assert_eq!(ack, Ack::Started);
        assert_eq!(gateway.connect_count(), 1);
        assert_eq!(gateway.play_count(), 1);
        assert_eq!(manager.active_channel(1).await, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_cycles_rejected() {
        let gateway = Arc::new(FakeGateway::default());
        let manager = manager_with(&gateway);

        let rejection = manager.start(1, 10, Some(0)).await.unwrap_err();
        assert_eq!(rejection, Rejection::invalid_cycle_count());
        let rejection = manager.start(1, 10, Some(-4)).await.unwrap_err();
        assert_eq!(rejection, Rejection::invalid_cycle_count());
        assert_eq!(gateway.connect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_same_channel_reuses_session() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        let ack = manager.start(1, 10, Some(4)).await.unwrap();
        assert_eq!(ack, Ack::Started);
        // No second connection, and the live loop keeps its count.
        assert_eq!(gateway.connect_count(), 1);
        assert_eq!(manager.remaining_cycles(1).await, Some(None));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_other_channel_conflicts() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        let rejection = manager.start(1, 20, None).await.unwrap_err();
        assert_eq!(rejection, Rejection::already_active_elsewhere());
        // Original session untouched.
        assert_eq!(manager.active_channel(1).await, Some(10));
        assert_eq!(gateway.connect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_failure_registers_nothing() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.fail_connect.store(true, Ordering::SeqCst);
        let manager = manager_with(&gateway);

        let rejection = manager.start(1, 10, None).await.unwrap_err();
        assert_eq!(rejection, Rejection::join_failed());
        assert_eq!(manager.active_channel(1).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_failure_leaves_no_session_behind() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        gateway.fail_play.store(true, Ordering::SeqCst);
        let manager = manager_with(&gateway);

        let rejection = manager.start(1, 10, None).await.unwrap_err();
        assert_eq!(rejection, Rejection::join_failed());
        assert_eq!(manager.active_channel(1).await, None);
        assert_eq!(gateway.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_without_session_is_not_found() {
        let gateway = Arc::new(FakeGateway::default());
        let manager = manager_with(&gateway);

        let rejection = manager.leave(1).await.unwrap_err();
        assert_eq!(rejection, Rejection::not_active());
        assert_eq!(gateway.disconnect_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_releases_session() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        let ack = manager.leave(1).await.unwrap();
        assert_eq!(ack, Ack::Stopped);
        settle(Duration::from_millis(50)).await;
        assert_eq!(manager.active_channel(1).await, None);
        assert_eq!(gateway.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_count_plays_exactly_n_cycles() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, Some(3)).await.unwrap();
        assert_eq!(gateway.play_count(), 1);

        manager.on_cycle_end(1).await;
        settle(Duration::from_millis(150)).await;
        assert_eq!(gateway.play_count(), 2);

        manager.on_cycle_end(1).await;
        settle(Duration::from_millis(150)).await;
        assert_eq!(gateway.play_count(), 3);

        manager.on_cycle_end(1).await;
        settle(Duration::from_secs(6)).await;
        // Exactly one teardown, no fourth cycle.
        assert_eq!(gateway.play_count(), 3);
        assert_eq!(gateway.disconnect_count(), 1);
        assert_eq!(manager.active_channel(1).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_never_exhausts() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        for _ in 0..10 {
            manager.on_cycle_end(1).await;
            settle(Duration::from_millis(150)).await;
        }
        assert_eq!(gateway.play_count(), 11);
        assert_eq!(gateway.disconnect_count(), 0);
        assert_eq!(manager.active_channel(1).await, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_in_grace_window_cancels_pending_stop() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, Some(2)).await.unwrap();
        manager.on_cycle_end(1).await;
        settle(Duration::from_millis(150)).await;
        manager.on_cycle_end(1).await;
        // Exhausted: the grace stop is armed. Restart before it fires.
        settle(Duration::from_secs(1)).await;
        manager.start(1, 10, Some(5)).await.unwrap();

        settle(Duration::from_secs(10)).await;
        // Session reused, no duplicate connection, teardown cancelled.
        assert_eq!(gateway.connect_count(), 1);
        assert_eq!(gateway.disconnect_count(), 0);
        assert_eq!(manager.active_channel(1).await, Some(10));
        assert_eq!(manager.remaining_cycles(1).await, Some(Some(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spurious_idle_events_are_ignored() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, Some(3)).await.unwrap();
        manager.on_cycle_end(1).await;
        // Second idle before the next cycle started: no decrement.
        manager.on_cycle_end(1).await;
        assert_eq!(manager.remaining_cycles(1).await, Some(Some(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_teardown_is_noop() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        manager.teardown(1).await;
        manager.teardown(1).await;
        assert_eq!(gateway.disconnect_count(), 1);
        assert_eq!(manager.active_channel(1).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_channel_debounce_rechecks_membership() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();

        // Dip to alone, then someone comes back before the debounce.
        gateway.set_occupants(1, 10, 1);
        settle(Duration::from_millis(1500)).await;
        gateway.set_occupants(1, 10, 2);
        settle(Duration::from_secs(6)).await;
        assert_eq!(gateway.disconnect_count(), 0);
        assert_eq!(manager.active_channel(1).await, Some(10));

        // Alone for the whole debounce: the watchdog leaves.
        gateway.set_occupants(1, 10, 1);
        settle(Duration::from_secs(8)).await;
        assert_eq!(gateway.disconnect_count(), 1);
        assert_eq!(manager.active_channel(1).await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_watchdog_cannot_kill_new_session() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 1);
        let manager = manager_with(&gateway);

        // First session: alone from the start, watchdog will fire.
        manager.start(1, 10, None).await.unwrap();
        // Tear it down by hand mid-debounce and start a fresh one with
        // company; the old watchdog's generation is stale.
        settle(Duration::from_millis(1500)).await;
        manager.teardown(1).await;
        gateway.set_occupants(1, 10, 3);
        manager.start(1, 10, None).await.unwrap();

        settle(Duration::from_secs(10)).await;
        assert_eq!(gateway.disconnect_count(), 1);
        assert_eq!(manager.active_channel(1).await, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_moved_externally_releases_session() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        // Same channel: nothing happens.
        manager.on_bot_voice_state(1, Some(10)).await;
        assert_eq!(manager.active_channel(1).await, Some(10));
        // Dragged to another channel: session released.
        manager.on_bot_voice_state(1, Some(20)).await;
        assert_eq!(manager.active_channel(1).await, None);
        assert_eq!(gateway.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bot_disconnected_externally_releases_session() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);

        manager.start(1, 10, None).await.unwrap();
        manager.on_bot_voice_state(1, None).await;
        assert_eq!(manager.active_channel(1).await, None);
        assert_eq!(gateway.disconnect_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_end_feed_drives_the_loop() {
        let gateway = Arc::new(FakeGateway::default());
        gateway.set_occupants(1, 10, 2);
        let manager = manager_with(&gateway);
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        manager.drive_cycle_ends(rx);

        manager.start(1, 10, Some(2)).await.unwrap();
        tx.send(1).unwrap();
        settle(Duration::from_millis(150)).await;
        assert_eq!(gateway.play_count(), 2);
        tx.send(1).unwrap();
        settle(Duration::from_secs(6)).await;
        assert_eq!(gateway.disconnect_count(), 1);
    }
}
