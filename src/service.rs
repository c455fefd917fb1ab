//! The GameMode control interface served on the session bus.
//!
//! Nine methods, three semantics: each register/unregister/query variant
//! only differs in how the `(caller, game)` pair of process handles is
//! derived from its raw arguments before the request is forwarded to the
//! engine.

use std::sync::Arc;

use zbus::{fdo, zvariant::OwnedFd};

use crate::{
    engine::Engine,
    error::Error,
    process::{pid_from_pidfd, ProcessHandle},
};

pub const GAMEMODE_BUS_NAME: &str = "com.feralinteractive.GameMode";
pub const GAMEMODE_BUS_PATH: &str = "/com/feralinteractive/GameMode";

pub struct GameMode {
    engine: Arc<Engine>,
}

impl GameMode {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }

    fn processes(caller_pid: i32, game_pid: i32) -> (ProcessHandle, ProcessHandle) {
        (ProcessHandle::new(caller_pid), ProcessHandle::new(game_pid))
    }

    async fn decode(
        caller_pidfd: OwnedFd,
        game_pidfd: OwnedFd,
    ) -> fdo::Result<(ProcessHandle, ProcessHandle)> {
        let caller_pid = pid_from_pidfd(caller_pidfd).await.map_err(bus_error)?;
        let game_pid = pid_from_pidfd(game_pidfd).await.map_err(bus_error)?;
        Ok(Self::processes(caller_pid, game_pid))
    }
}

/// Transport errors pass through untouched; anything else is logged with its
/// trace and surfaced as a generic bus failure.
fn bus_error(err: Error) -> fdo::Error {
    match err {
        Error::ZbusFdo(err) => err,
        Error::Zbus(err) => fdo::Error::ZBus(err),
        err => {
            tracing::error!("Unhandled error in method handler: {err}");
            tracing::debug!("{err:?}");
            fdo::Error::Failed(err.to_string())
        }
    }
}

#[zbus::interface(name = "com.feralinteractive.GameMode")]
impl GameMode {
    #[zbus(name = "RegisterGame")]
    async fn register_game(&self, pid: i32) -> i32 {
        let (caller, game) = Self::processes(pid, pid);
        self.engine.register(caller, game).await.into()
    }

    #[zbus(name = "RegisterGameByPID")]
    async fn register_game_by_pid(&self, caller_pid: i32, game_pid: i32) -> i32 {
        let (caller, game) = Self::processes(caller_pid, game_pid);
        self.engine.register(caller, game).await.into()
    }

    #[zbus(name = "RegisterGameByPIDFd")]
    async fn register_game_by_pidfd(
        &self,
        caller_pidfd: OwnedFd,
        game_pidfd: OwnedFd,
    ) -> fdo::Result<i32> {
        let (caller, game) = Self::decode(caller_pidfd, game_pidfd).await?;
        Ok(self.engine.register(caller, game).await.into())
    }

    #[zbus(name = "UnregisterGame")]
    async fn unregister_game(&self, pid: i32) -> i32 {
        let (caller, game) = Self::processes(pid, pid);
        self.engine.unregister(caller, game).await.into()
    }

    #[zbus(name = "UnregisterGameByPID")]
    async fn unregister_game_by_pid(&self, caller_pid: i32, game_pid: i32) -> i32 {
        let (caller, game) = Self::processes(caller_pid, game_pid);
        self.engine.unregister(caller, game).await.into()
    }

    #[zbus(name = "UnregisterGameByPIDFd")]
    async fn unregister_game_by_pidfd(
        &self,
        caller_pidfd: OwnedFd,
        game_pidfd: OwnedFd,
    ) -> fdo::Result<i32> {
        let (caller, game) = Self::decode(caller_pidfd, game_pidfd).await?;
        Ok(self.engine.unregister(caller, game).await.into())
    }

    #[zbus(name = "QueryStatus")]
    async fn query_status(&self, pid: i32) -> i32 {
        let (caller, game) = Self::processes(pid, pid);
        self.engine.query(caller, game).await
    }

    #[zbus(name = "QueryStatusByPID")]
    async fn query_status_by_pid(&self, caller_pid: i32, game_pid: i32) -> i32 {
        let (caller, game) = Self::processes(caller_pid, game_pid);
        self.engine.query(caller, game).await
    }

    #[zbus(name = "QueryStatusByPIDFd")]
    async fn query_status_by_pidfd(
        &self,
        caller_pidfd: OwnedFd,
        game_pidfd: OwnedFd,
    ) -> fdo::Result<i32> {
        let (caller, game) = Self::decode(caller_pidfd, game_pidfd).await?;
        Ok(self.engine.query(caller, game).await)
    }
}
