//! Registration state and profile arbitration.
//!
//! The engine owns the set of registered games. While the set is non-empty
//! the configured gaming profile is active; once the last game unregisters
//! or exits, the profile captured at startup is restored. All mutations,
//! including the ones exit watchers trigger, run under one mutex that is
//! held across the profile-switch round trip.

use std::{collections::HashSet, sync::Arc};

use tokio::sync::Mutex;

use crate::{error::Error, process::ProcessHandle, tuned::ProfileClient};

/// Integer result of a register or unregister request, as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpResult {
    Success,
    Error,
    Rejected,
}

impl From<OpResult> for i32 {
    fn from(res: OpResult) -> i32 {
        match res {
            OpResult::Success => 0,
            OpResult::Error => -1,
            OpResult::Rejected => -2,
        }
    }
}

pub struct Engine {
    tuned: Arc<dyn ProfileClient>,
    gaming_profile: String,
    initial_profile: String,
    games: Mutex<HashSet<ProcessHandle>>,
}

impl Engine {
    /// Captures the profile active right now as the one to restore and
    /// validates the configured gaming profile against the ones TuneD
    /// knows about.
    pub async fn new(tuned: Arc<dyn ProfileClient>, gaming_profile: String) -> Result<Self, Error> {
        let initial_profile = tuned.active_profile().await?;
        if !tuned.list_profiles().await?.contains(&gaming_profile) {
            return Err(Error::UnknownProfile(gaming_profile));
        }
        tracing::info!(
            "Initial profile is \"{initial_profile}\", gaming profile is \"{gaming_profile}\""
        );
        Ok(Self {
            tuned,
            gaming_profile,
            initial_profile,
            games: Mutex::new(HashSet::new()),
        })
    }

    pub async fn register(
        self: &Arc<Self>,
        caller: ProcessHandle,
        game: ProcessHandle,
    ) -> OpResult {
        tracing::info!(
            "Request: register {} ({}) by {} ({})",
            game.pid(),
            game.cmdline().await,
            caller.pid(),
            caller.cmdline().await
        );
        if !self.register_allowed(&caller, &game) {
            return OpResult::Rejected;
        }
        let mut games = self.games.lock().await;
        if games.contains(&game) {
            tracing::error!("Process {} is already registered", game.pid());
            return OpResult::Error;
        }
        let (ok, _) = self.tuned.switch_profile(&self.gaming_profile).await;
        if !ok {
            return OpResult::Error;
        }
        games.insert(game);
        self.spawn_exit_watcher(game);
        OpResult::Success
    }

    pub async fn unregister(&self, caller: ProcessHandle, game: ProcessHandle) -> OpResult {
        tracing::info!(
            "Request: unregister {} ({}) by {} ({})",
            game.pid(),
            game.cmdline().await,
            caller.pid(),
            caller.cmdline().await
        );
        if !self.unregister_allowed(&caller, &game) {
            return OpResult::Rejected;
        }
        let mut games = self.games.lock().await;
        if !games.contains(&game) {
            tracing::error!("Process {} is not registered", game.pid());
            return OpResult::Error;
        }
        if games.len() == 1 {
            tracing::info!("No more registered PIDs left");
            let (ok, _) = self.tuned.switch_profile(&self.initial_profile).await;
            if !ok {
                // The entry stays in place so the set can only empty out
                // once a restore attempt has gone through.
                return OpResult::Error;
            }
        }
        games.remove(&game);
        OpResult::Success
    }

    pub async fn query(&self, caller: ProcessHandle, game: ProcessHandle) -> i32 {
        tracing::info!(
            "Request: status {} ({}) by {} ({})",
            game.pid(),
            game.cmdline().await,
            caller.pid(),
            caller.cmdline().await
        );
        if !self.query_allowed(&caller, &game) {
            return OpResult::Rejected.into();
        }
        let games = self.games.lock().await;
        let mut ret = 0;
        if !games.is_empty() {
            ret += 1;
            if games.contains(&game) {
                ret += 1;
            }
        }
        ret
    }

    /// Final restore to the profile captured at startup, attempted whether
    /// or not any games are still registered.
    pub async fn shutdown(&self) {
        tracing::info!("Stopping tunedmode...");
        let _ = self.tuned.switch_profile(&self.initial_profile).await;
    }

    // Hook point for caller permission checks.
    fn register_allowed(&self, _caller: &ProcessHandle, _game: &ProcessHandle) -> bool {
        true
    }

    fn unregister_allowed(&self, _caller: &ProcessHandle, _game: &ProcessHandle) -> bool {
        true
    }

    fn query_allowed(&self, _caller: &ProcessHandle, _game: &ProcessHandle) -> bool {
        true
    }

    /// One task per registration; it unregisters the game on the daemon's
    /// own behalf once the process is gone. The "not registered" error is
    /// benign when a client already unregistered it explicitly.
    fn spawn_exit_watcher(self: &Arc<Self>, game: ProcessHandle) {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            game.wait_exit().await;
            let _ = engine.unregister(ProcessHandle::current(), game).await;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Mutex as StdMutex, time::Duration};

    use async_trait::async_trait;

    use super::*;

    struct FakeTuned {
        active: StdMutex<String>,
        profiles: Vec<String>,
        refuse: StdMutex<Vec<String>>,
        switches: StdMutex<Vec<String>>,
    }

    impl FakeTuned {
        fn new(active: &str, profiles: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                active: StdMutex::new(active.to_owned()),
                profiles: profiles.iter().map(|p| (*p).to_owned()).collect(),
                refuse: StdMutex::new(Vec::new()),
                switches: StdMutex::new(Vec::new()),
            })
        }

        fn active(&self) -> String {
            self.active.lock().unwrap().clone()
        }

        fn refuse(&self, profile: &str) {
            self.refuse.lock().unwrap().push(profile.to_owned());
        }

        fn switches(&self) -> Vec<String> {
            self.switches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProfileClient for FakeTuned {
        async fn active_profile(&self) -> Result<String, Error> {
            Ok(self.active())
        }

        async fn list_profiles(&self) -> Result<Vec<String>, Error> {
            Ok(self.profiles.clone())
        }

        async fn request_switch(&self, profile: &str) -> Result<(bool, String), Error> {
            self.switches.lock().unwrap().push(profile.to_owned());
            if self.refuse.lock().unwrap().iter().any(|p| p == profile) {
                return Ok((false, format!("Cannot load profile {profile}")));
            }
            *self.active.lock().unwrap() = profile.to_owned();
            Ok((true, "OK".to_owned()))
        }
    }

    const GAMING: &str = "latency-performance";
    const INITIAL: &str = "balanced";

    async fn engine(tuned: &Arc<FakeTuned>) -> Arc<Engine> {
        Arc::new(
            Engine::new(tuned.clone() as Arc<dyn ProfileClient>, GAMING.to_owned())
                .await
                .unwrap(),
        )
    }

    fn pid(n: i32) -> ProcessHandle {
        ProcessHandle::new(n)
    }

    // Registered games need PIDs that stay alive for the duration of a
    // test, otherwise the exit watcher unregisters them mid-assertion.
    fn me() -> ProcessHandle {
        ProcessHandle::new(std::process::id() as i32)
    }

    fn my_parent() -> ProcessHandle {
        ProcessHandle::new(std::os::unix::process::parent_id() as i32)
    }

    #[tokio::test]
    async fn refuses_unknown_gaming_profile() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL]);
        let result = Engine::new(
            tuned.clone() as Arc<dyn ProfileClient>,
            "does-not-exist".to_owned(),
        )
        .await;
        assert!(matches!(result, Err(Error::UnknownProfile(name)) if name == "does-not-exist"));
    }

    #[tokio::test]
    async fn register_switches_and_unregister_restores() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        assert_eq!(engine.register(me(), me()).await, OpResult::Success);
        assert_eq!(tuned.active(), GAMING);
        assert_eq!(engine.query(me(), me()).await, 2);
        assert_eq!(engine.query(pid(9999), pid(9999)).await, 1);

        assert_eq!(engine.unregister(me(), me()).await, OpResult::Success);
        assert_eq!(tuned.active(), INITIAL);
        assert_eq!(engine.query(me(), me()).await, 0);
        assert_eq!(tuned.switches().last().map(String::as_str), Some(INITIAL));
    }

    #[tokio::test]
    async fn duplicate_register_is_an_error() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        assert_eq!(engine.register(me(), me()).await, OpResult::Success);
        assert_eq!(engine.register(me(), me()).await, OpResult::Error);
        assert_eq!(engine.query(me(), me()).await, 2);
        assert_eq!(tuned.active(), GAMING);
    }

    #[tokio::test]
    async fn reregister_after_unregister_succeeds() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        assert_eq!(engine.register(me(), me()).await, OpResult::Success);
        assert_eq!(engine.unregister(me(), me()).await, OpResult::Success);
        assert_eq!(engine.register(me(), me()).await, OpResult::Success);
        assert_eq!(engine.query(me(), me()).await, 2);
    }

    #[tokio::test]
    async fn unregister_of_unknown_pid_is_an_error() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        assert_eq!(engine.unregister(pid(42), pid(42)).await, OpResult::Error);
        assert!(tuned.switches().is_empty());
        assert_eq!(tuned.active(), INITIAL);
    }

    #[tokio::test]
    async fn failed_switch_leaves_set_unchanged() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        tuned.refuse(GAMING);
        let engine = engine(&tuned).await;

        assert_eq!(engine.register(pid(7), pid(7)).await, OpResult::Error);
        assert_eq!(engine.query(pid(7), pid(7)).await, 0);
        assert_eq!(tuned.active(), INITIAL);
    }

    #[tokio::test]
    async fn failed_restore_keeps_registration() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        assert_eq!(engine.register(me(), me()).await, OpResult::Success);
        tuned.refuse(INITIAL);
        assert_eq!(engine.unregister(me(), me()).await, OpResult::Error);
        assert_eq!(engine.query(me(), me()).await, 2);
    }

    #[tokio::test]
    async fn concurrent_registers_both_succeed() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        let (a, b) = tokio::join!(
            engine.register(me(), me()),
            engine.register(me(), my_parent()),
        );
        assert_eq!(a, OpResult::Success);
        assert_eq!(b, OpResult::Success);
        assert_eq!(engine.query(me(), me()).await, 2);
        assert_eq!(engine.query(me(), my_parent()).await, 2);

        // Only the last unregister restores the initial profile.
        assert_eq!(engine.unregister(me(), me()).await, OpResult::Success);
        assert_eq!(tuned.active(), GAMING);
        assert_eq!(engine.unregister(me(), my_parent()).await, OpResult::Success);
        assert_eq!(tuned.active(), INITIAL);
    }

    // A registered process exiting behind the daemon's back empties the
    // set and restores the initial profile within bounded time.
    #[tokio::test(flavor = "multi_thread")]
    async fn exit_watcher_unregisters_dead_process() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        let mut child = std::process::Command::new("sleep")
            .arg("0.2")
            .spawn()
            .unwrap();
        let game = pid(child.id() as i32);
        assert_eq!(engine.register(game, game).await, OpResult::Success);
        assert_eq!(tuned.active(), GAMING);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while engine.query(game, game).await != 0 {
            assert!(tokio::time::Instant::now() < deadline, "watcher never fired");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        child.wait().unwrap();
        assert_eq!(tuned.active(), INITIAL);
    }

    #[tokio::test]
    async fn shutdown_restores_initial_profile() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        assert_eq!(engine.register(me(), me()).await, OpResult::Success);
        engine.shutdown().await;
        assert_eq!(tuned.active(), INITIAL);
    }

    #[tokio::test]
    async fn shutdown_with_initial_profile_active_is_a_no_op() {
        let tuned = FakeTuned::new(INITIAL, &[INITIAL, GAMING]);
        let engine = engine(&tuned).await;

        engine.shutdown().await;
        assert!(tuned.switches().is_empty());
    }
}
