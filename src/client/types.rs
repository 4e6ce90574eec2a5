// ABOUTME: Bind credentials and timing settings for a transceiver session
// ABOUTME: Defaults follow the gateway's production timings (10s responses, 5s keep-alive and rebind)

use crate::client::keepalive::KeepAliveConfig;
use crate::codec::CodecError;
use crate::datatypes::{BindTransceiver, InterfaceVersion, NumericPlanIndicator, TypeOfNumber};
use std::time::Duration;

/// Credentials presented in bind_transceiver.
#[derive(Clone, PartialEq, Eq)]
pub struct BindCredentials {
    pub system_id: String,
    pub password: String,
    /// Empty unless the SMSC asks for one
    pub system_type: String,
    pub interface_version: InterfaceVersion,
    pub addr_ton: TypeOfNumber,
    pub addr_npi: NumericPlanIndicator,
    pub address_range: String,
}

impl BindCredentials {
    pub fn transceiver(system_id: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            system_id: system_id.into(),
            password: password.into(),
            system_type: String::new(),
            interface_version: InterfaceVersion::SmppV34,
            addr_ton: TypeOfNumber::Unknown,
            addr_npi: NumericPlanIndicator::Unknown,
            address_range: String::new(),
        }
    }

    pub fn with_system_type(mut self, system_type: impl Into<String>) -> Self {
        self.system_type = system_type.into();
        self
    }

    pub fn with_version(mut self, interface_version: InterfaceVersion) -> Self {
        self.interface_version = interface_version;
        self
    }

    /// Builds the bind PDU, rejecting fields that do not fit the wire limits.
    pub fn to_bind(&self, sequence_number: u32) -> Result<BindTransceiver, CodecError> {
        BindTransceiver::builder()
            .sequence_number(sequence_number)
            .system_id(&self.system_id)
            .password(&self.password)
            .system_type(&self.system_type)
            .interface_version(self.interface_version)
            .addr_ton(self.addr_ton)
            .addr_npi(self.addr_npi)
            .address_range(&self.address_range)
            .build()
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for BindCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindCredentials")
            .field("system_id", &self.system_id)
            .field("password", &"***")
            .field("system_type", &self.system_type)
            .field("interface_version", &self.interface_version)
            .finish()
    }
}

/// Session timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    /// Connect timeout and the longest wait for any response PDU
    pub response_timeout: Duration,

    pub keep_alive: KeepAliveConfig,

    /// Pause between reconnect attempts after the link drops. `None`
    /// closes the session on the first link failure instead.
    pub rebind_interval: Option<Duration>,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            response_timeout: Duration::from_secs(10),
            keep_alive: KeepAliveConfig::default(),
            rebind_interval: Some(Duration::from_secs(5)),
        }
    }
}
