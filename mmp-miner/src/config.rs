//! Session configuration.
//!
//! Client identity and credentials live in an explicit configuration
//! struct built once at startup and handed to the session, which owns all
//! further metadata updates.

/// Client version tag, synchronized to the server as the `version` meta
/// variable.
pub fn client_version() -> String {
    format!("mmp-miner v{}", env!("CARGO_PKG_VERSION"))
}

/// A metadata value as carried by the META wire command.
///
/// Integers are serialized bare; strings carry the `:` trailing-argument
/// marker so they may contain spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    Int(i64),
    Str(String),
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        MetaValue::Int(v)
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        MetaValue::Str(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        MetaValue::Str(v)
    }
}

/// Mining session configuration.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Server address, `host:port`
    pub addr: String,

    /// Login username
    pub username: String,

    /// Login password
    pub password: String,

    /// Operator-chosen display name, synchronized as `name` when set
    pub worker_name: Option<String>,

    /// Compute device identity string, synchronized as `device`
    pub device: String,

    /// Available compute units on the device, synchronized as `cores`
    pub cores: u32,
}

impl SessionConfig {
    /// Identity metadata pushed once at session start.
    pub fn identity_meta(&self) -> Vec<(String, MetaValue)> {
        let mut meta = vec![
            ("device".to_string(), MetaValue::Str(self.device.clone())),
            ("version".to_string(), MetaValue::Str(client_version())),
        ];
        if let Some(name) = &self.worker_name {
            meta.push(("name".to_string(), MetaValue::Str(name.clone())));
        }
        meta.push((
            "os".to_string(),
            MetaValue::Str(format!(
                "{} {}",
                std::env::consts::OS,
                std::env::consts::ARCH
            )),
        ));
        meta.push(("cores".to_string(), MetaValue::Int(self.cores as i64)));
        meta
    }
}
