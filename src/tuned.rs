//! Client side of the TuneD control interface on the system bus.
//!
//! Wrapper of the DBus interface: `com.redhat.tuned.control`.

use async_trait::async_trait;

use crate::error::Error;

#[zbus::proxy(
    interface = "com.redhat.tuned.control",
    default_service = "com.redhat.tuned",
    default_path = "/Tuned",
    gen_blocking = false
)]
trait Tuned {
    /// Name of the profile TuneD currently applies.
    #[zbus(name = "active_profile")]
    async fn active_profile(&self) -> zbus::Result<String>;

    /// All profile names known to TuneD.
    #[zbus(name = "profiles")]
    async fn profiles(&self) -> zbus::Result<Vec<String>>;

    /// Asks TuneD to activate `profile`; the verdict is `(ok, message)`.
    #[zbus(name = "switch_profile")]
    async fn switch_profile(&self, profile: &str) -> zbus::Result<(bool, String)>;
}

/// Client-side view of the profile-switching service.
///
/// The provided `switch_profile` carries the arbitration every caller goes
/// through: a switch to the profile that is already active is answered
/// locally without a round trip, and transport failures fold into a
/// `(false, message)` verdict rather than an error.
#[async_trait]
pub trait ProfileClient: Send + Sync {
    async fn active_profile(&self) -> Result<String, Error>;

    async fn list_profiles(&self) -> Result<Vec<String>, Error>;

    async fn request_switch(&self, profile: &str) -> Result<(bool, String), Error>;

    async fn switch_profile(&self, profile: &str) -> (bool, String) {
        match self.active_profile().await {
            Ok(active) if active == profile => {
                return (true, "Requested profile is already active".to_owned())
            }
            Ok(_) => {}
            Err(err) => return (false, err.to_string()),
        }
        tracing::info!("Switching to profile \"{profile}\"");
        let (ok, msg) = match self.request_switch(profile).await {
            Ok(verdict) => verdict,
            Err(err) => (false, err.to_string()),
        };
        if !ok {
            tracing::warn!("Switching to \"{profile}\" failed: {msg}");
        }
        (ok, msg)
    }
}

/// [`ProfileClient`] backed by the real TuneD daemon.
pub struct TunedClient {
    proxy: TunedProxy<'static>,
}

impl TunedClient {
    pub async fn new(connection: &zbus::Connection) -> Result<Self, Error> {
        Ok(Self {
            proxy: TunedProxy::new(connection).await?,
        })
    }
}

#[async_trait]
impl ProfileClient for TunedClient {
    async fn active_profile(&self) -> Result<String, Error> {
        self.proxy.active_profile().await.map_err(From::from)
    }

    async fn list_profiles(&self) -> Result<Vec<String>, Error> {
        self.proxy.profiles().await.map_err(From::from)
    }

    async fn request_switch(&self, profile: &str) -> Result<(bool, String), Error> {
        self.proxy.switch_profile(profile).await.map_err(From::from)
    }
}
