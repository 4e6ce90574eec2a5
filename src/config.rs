// ABOUTME: Gateway configuration loaded once from the environment
// ABOUTME: Every failure names the variable at fault

use crate::client::{BindCredentials, SessionSettings};
use crate::codec::CodecError;
use crate::datatypes::{Address, NumericPlanIndicator, TypeOfNumber};
use crate::message::Reassembler;
use std::time::Duration;
use thiserror::Error;

pub const SMPP_SMSC: &str = "SMPP_SMSC";
pub const SMPP_SYSTEM_ID: &str = "SMPP_SYSTEM_ID";
pub const SMPP_PASSWORD: &str = "SMPP_PASSWORD";
pub const SMPP_SYSTEM_TYPE: &str = "SMPP_SYSTEM_TYPE";
pub const SMPP_SOURCE_ADDR: &str = "SMPP_SOURCE_ADDR";
pub const SMPP_SOURCE_TON: &str = "SMPP_SOURCE_TON";
pub const SMPP_SOURCE_NPI: &str = "SMPP_SOURCE_NPI";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// `host:port`
    pub smsc: String,
    pub credentials: BindCredentials,
    pub source: Address,
    pub settings: SessionSettings,
    pub reassembly_max_age: Duration,
    pub sweep_interval: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |var: &'static str| lookup(var).filter(|v| !v.is_empty());
        let required = |var: &'static str| optional(var).ok_or(ConfigError::Missing(var));

        let smsc = required(SMPP_SMSC)?;
        validate_endpoint(&smsc)?;

        let credentials = BindCredentials::transceiver(
            required(SMPP_SYSTEM_ID)?,
            optional(SMPP_PASSWORD).unwrap_or_default(),
        )
        .with_system_type(optional(SMPP_SYSTEM_TYPE).unwrap_or_default());
        credentials.to_bind(1).map_err(credential_error)?;

        let ton = match optional(SMPP_SOURCE_TON) {
            Some(raw) => TypeOfNumber::try_from(parse_u8(SMPP_SOURCE_TON, &raw)?).map_err(|_| {
                ConfigError::Invalid {
                    var: SMPP_SOURCE_TON,
                    reason: format!("{raw} is not a type of number"),
                }
            })?,
            None => TypeOfNumber::Unknown,
        };
        let npi = match optional(SMPP_SOURCE_NPI) {
            Some(raw) => NumericPlanIndicator::try_from(parse_u8(SMPP_SOURCE_NPI, &raw)?)
                .map_err(|_| ConfigError::Invalid {
                    var: SMPP_SOURCE_NPI,
                    reason: format!("{raw} is not a numbering plan"),
                })?,
            None => NumericPlanIndicator::Unknown,
        };
        let source = Address::new(ton, npi, &required(SMPP_SOURCE_ADDR)?).map_err(|e| {
            ConfigError::Invalid {
                var: SMPP_SOURCE_ADDR,
                reason: e.to_string(),
            }
        })?;

        Ok(GatewayConfig {
            smsc,
            credentials,
            source,
            settings: SessionSettings::default(),
            reassembly_max_age: Reassembler::DEFAULT_MAX_AGE,
            sweep_interval: Duration::from_secs(30),
        })
    }
}

fn validate_endpoint(smsc: &str) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        var: SMPP_SMSC,
        reason: reason.to_string(),
    };
    let (host, port) = smsc.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
    if host.is_empty() {
        return Err(invalid("empty host"));
    }
    port.parse::<u16>()
        .map_err(|_| invalid("port is not a number between 0 and 65535"))?;
    Ok(())
}

fn parse_u8(var: &'static str, raw: &str) -> Result<u8, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::Invalid {
        var,
        reason: format!("{raw} is not a number between 0 and 255"),
    })
}

fn credential_error(error: CodecError) -> ConfigError {
    let var = match &error {
        CodecError::FieldValidation { field: "password", .. } => SMPP_PASSWORD,
        CodecError::FieldValidation { field: "system_type", .. } => SMPP_SYSTEM_TYPE,
        _ => SMPP_SYSTEM_ID,
    };
    ConfigError::Invalid {
        var,
        reason: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<GatewayConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        GatewayConfig::from_lookup(|var| vars.get(var).cloned())
    }

    const MINIMAL: [(&str, &str); 3] = [
        (SMPP_SMSC, "smsc.example.net:2775"),
        (SMPP_SYSTEM_ID, "gateway"),
        (SMPP_SOURCE_ADDR, "12345"),
    ];

    #[test]
    fn minimal_environment() {
        let config = load(&MINIMAL).unwrap();
        assert_eq!(config.smsc, "smsc.example.net:2775");
        assert_eq!(config.credentials.system_id, "gateway");
        assert_eq!(config.credentials.password, "");
        assert_eq!(config.source.ton, TypeOfNumber::Unknown);
        assert_eq!(config.source.npi, NumericPlanIndicator::Unknown);
        assert_eq!(config.settings.response_timeout, Duration::from_secs(10));
        assert_eq!(config.settings.keep_alive.interval, Duration::from_secs(5));
        assert_eq!(config.settings.rebind_interval, Some(Duration::from_secs(5)));
        assert_eq!(config.reassembly_max_age, Duration::from_secs(600));
    }

    #[test]
    fn numbering_from_environment() {
        let mut vars = MINIMAL.to_vec();
        vars.push((SMPP_SOURCE_TON, "1"));
        vars.push((SMPP_SOURCE_NPI, "1"));
        vars.push((SMPP_SOURCE_ADDR, "+447700900000"));
        let config = load(&vars).unwrap();
        assert_eq!(config.source.ton, TypeOfNumber::International);
        assert_eq!(config.source.npi, NumericPlanIndicator::Isdn);
    }

    #[test]
    fn missing_variables_are_named() {
        assert_eq!(load(&MINIMAL[1..]).unwrap_err(), ConfigError::Missing(SMPP_SMSC));
        let mut vars = MINIMAL.to_vec();
        vars[1].1 = "";
        assert_eq!(load(&vars).unwrap_err(), ConfigError::Missing(SMPP_SYSTEM_ID));
    }

    #[test]
    fn invalid_values_are_named() {
        let cases = [
            (SMPP_SMSC, "no-port"),
            (SMPP_SOURCE_TON, "9"),
            (SMPP_SOURCE_NPI, "x"),
            (SMPP_PASSWORD, "much-too-long-password"),
        ];
        for (var, value) in cases {
            let mut vars = MINIMAL.to_vec();
            vars.push((var, value));
            match load(&vars) {
                Err(ConfigError::Invalid { var: named, .. }) => assert_eq!(named, var),
                other => panic!("{var}={value}: expected Invalid, got {other:?}"),
            }
        }
    }
}
