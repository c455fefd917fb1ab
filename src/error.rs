#[derive(Debug)]
/// The error type for tunedmode.
pub enum Error {
    /// A zbus specific error.
    Zbus(zbus::Error),
    /// A zbus::fdo specific error.
    ZbusFdo(zbus::fdo::Error),
    /// An I/O failure while reading procfs or placing the configuration file.
    Io(std::io::Error),
    /// The configuration file could not be parsed.
    Config(ini::Error),
    /// The configured gaming profile is not known to TuneD.
    UnknownProfile(String),
    /// A process-handle fd whose fdinfo carries no `Pid:` field.
    PidfdDecode,
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Zbus(e) => f.write_str(&format!("zbus error: {e}")),
            Self::ZbusFdo(e) => f.write_str(&format!("zbus fdo error: {e}")),
            Self::Io(e) => f.write_str(&format!("i/o error: {e}")),
            Self::Config(e) => f.write_str(&format!("configuration error: {e}")),
            Self::UnknownProfile(name) => {
                f.write_str(&format!("gaming profile \"{name}\" doesn't exist"))
            }
            Self::PidfdDecode => f.write_str("pidfd fdinfo reports no Pid field"),
        }
    }
}

impl From<zbus::Error> for Error {
    fn from(e: zbus::Error) -> Self {
        Self::Zbus(e)
    }
}

impl From<zbus::fdo::Error> for Error {
    fn from(e: zbus::fdo::Error) -> Self {
        Self::ZbusFdo(e)
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<ini::Error> for Error {
    fn from(e: ini::Error) -> Self {
        Self::Config(e)
    }
}
