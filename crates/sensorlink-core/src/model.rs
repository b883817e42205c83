//! SensorLink data model types.
//!
//! These types describe what the device knows about its network identity:
//! - Credentials for the network it joins and the network it broadcasts
//! - IPv4 addressing configuration for the station interface
//! - The connectivity state owned by the state machine

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use thiserror::Error;

/// Maximum SSID length in bytes (802.11).
pub const MAX_SSID_LEN: usize = 32;

/// Maximum WPA passphrase length in bytes.
pub const MAX_PASSPHRASE_LEN: usize = 64;

/// Reasons a credential pair is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialsError {
    #[error("SSID must not be empty")]
    EmptySsid,

    #[error("passphrase must not be empty")]
    EmptyPassphrase,

    #[error("SSID is {0} bytes, limit is {MAX_SSID_LEN}")]
    SsidTooLong(usize),

    #[error("passphrase is {0} bytes, limit is {MAX_PASSPHRASE_LEN}")]
    PassphraseTooLong(usize),
}

/// A network identity: SSID plus passphrase.
///
/// A value of this type is always complete. Partial records (one field
/// empty) cannot be constructed and are treated as absent by the loaders.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkCredentials {
    ssid: String,
    passphrase: String,
}

impl NetworkCredentials {
    /// Validate and build a credential pair.
    pub fn new(
        ssid: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Result<Self, CredentialsError> {
        let ssid = ssid.into();
        let passphrase = passphrase.into();

        if ssid.is_empty() {
            return Err(CredentialsError::EmptySsid);
        }
        if passphrase.is_empty() {
            return Err(CredentialsError::EmptyPassphrase);
        }
        if ssid.len() > MAX_SSID_LEN {
            return Err(CredentialsError::SsidTooLong(ssid.len()));
        }
        if passphrase.len() > MAX_PASSPHRASE_LEN {
            return Err(CredentialsError::PassphraseTooLong(passphrase.len()));
        }

        Ok(Self { ssid, passphrase })
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }
}

// Passphrases never reach the logs.
impl fmt::Debug for NetworkCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkCredentials")
            .field("ssid", &self.ssid)
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Address assignment mode for the station interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpMode {
    #[default]
    Dhcp,
    Static,
}

impl IpMode {
    /// Wire/storage flag: `"1"` is static, `"0"` is DHCP.
    pub fn as_flag(self) -> &'static str {
        match self {
            IpMode::Dhcp => "0",
            IpMode::Static => "1",
        }
    }

    pub fn from_flag(flag: &str) -> Option<Self> {
        match flag.trim() {
            "0" => Some(IpMode::Dhcp),
            "1" => Some(IpMode::Static),
            _ => None,
        }
    }
}

/// A complete static IPv4 assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticIpv4 {
    pub address: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub netmask: Ipv4Addr,
}

/// Errors while building an [`IpConfig`] from user-supplied text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IpConfigError {
    #[error("{field} is not a valid IPv4 address: {value:?}")]
    InvalidAddress { field: &'static str, value: String },
}

/// IPv4 configuration of the station interface.
///
/// Static fields only exist in the `Static` variant, so "static mode with a
/// missing field" is unrepresentable: it collapses to `Dhcp` on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum IpConfig {
    #[default]
    Dhcp,
    Static(StaticIpv4),
}

impl IpConfig {
    /// Build from the raw text triplet and requested mode.
    ///
    /// Empty fields are "missing" and collapse the mode to DHCP. A non-empty
    /// field that is not dotted-quad IPv4 is an error.
    pub fn from_parts(
        mode: IpMode,
        address: &str,
        gateway: &str,
        netmask: &str,
    ) -> Result<Self, IpConfigError> {
        let address = parse_optional("static_ip", address)?;
        let gateway = parse_optional("gateway", gateway)?;
        let netmask = parse_optional("subnet", netmask)?;

        match (mode, address, gateway, netmask) {
            (IpMode::Static, Some(address), Some(gateway), Some(netmask)) => {
                Ok(IpConfig::Static(StaticIpv4 {
                    address,
                    gateway,
                    netmask,
                }))
            }
            _ => Ok(IpConfig::Dhcp),
        }
    }

    pub fn mode(&self) -> IpMode {
        match self {
            IpConfig::Dhcp => IpMode::Dhcp,
            IpConfig::Static(_) => IpMode::Static,
        }
    }

    pub fn static_ip(&self) -> Option<&StaticIpv4> {
        match self {
            IpConfig::Dhcp => None,
            IpConfig::Static(ip) => Some(ip),
        }
    }
}

fn parse_optional(field: &'static str, value: &str) -> Result<Option<Ipv4Addr>, IpConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    value
        .parse()
        .map(Some)
        .map_err(|_| IpConfigError::InvalidAddress {
            field,
            value: value.to_string(),
        })
}

/// Which radios are currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RadioMode {
    #[default]
    Off,
    Station,
    AccessPoint,
    Dual,
}

impl RadioMode {
    /// Human label shown on the device pages.
    pub fn label(self) -> &'static str {
        match self {
            RadioMode::Station => "Station",
            RadioMode::AccessPoint => "Access Point",
            RadioMode::Dual => "Station and Access Point",
            RadioMode::Off => "Unknown",
        }
    }

    pub fn has_access_point(self) -> bool {
        matches!(self, RadioMode::AccessPoint | RadioMode::Dual)
    }

    pub fn has_station(self) -> bool {
        matches!(self, RadioMode::Station | RadioMode::Dual)
    }
}

/// Connectivity state owned by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectivityState {
    /// Before the boot decision.
    #[default]
    Unconfigured,
    /// No station credentials; only the access point is up.
    ApOnly,
    /// Joining the configured network with the access point still up.
    StaConnecting,
    /// Joined; access point torn down.
    StaConnected,
    /// Link lost; access point restarted and reconnection scheduled.
    DualFallback,
}

impl fmt::Display for ConnectivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectivityState::Unconfigured => "UNCONFIGURED",
            ConnectivityState::ApOnly => "AP_ONLY",
            ConnectivityState::StaConnecting => "STA_CONNECTING",
            ConnectivityState::StaConnected => "STA_CONNECTED",
            ConnectivityState::DualFallback => "DUAL_FALLBACK",
        };
        f.write_str(name)
    }
}

/// A 48-bit hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl fmt::Debug for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_require_both_fields() {
        assert_eq!(
            NetworkCredentials::new("", "secret"),
            Err(CredentialsError::EmptySsid)
        );
        assert_eq!(
            NetworkCredentials::new("home", ""),
            Err(CredentialsError::EmptyPassphrase)
        );
        assert!(NetworkCredentials::new("home", "secret").is_ok());
    }

    #[test]
    fn test_credentials_length_limits() {
        let ssid = "s".repeat(MAX_SSID_LEN);
        let pass = "p".repeat(MAX_PASSPHRASE_LEN);
        assert!(NetworkCredentials::new(ssid.clone(), pass.clone()).is_ok());

        assert_eq!(
            NetworkCredentials::new(format!("{ssid}x"), "secret"),
            Err(CredentialsError::SsidTooLong(33))
        );
        assert_eq!(
            NetworkCredentials::new("home", format!("{pass}x")),
            Err(CredentialsError::PassphraseTooLong(65))
        );
    }

    #[test]
    fn test_credentials_debug_hides_passphrase() {
        let creds = NetworkCredentials::new("home", "hunter22").unwrap();
        let debug = format!("{creds:?}");
        assert!(debug.contains("home"));
        assert!(!debug.contains("hunter22"));
    }

    #[test]
    fn test_ip_config_static_when_complete() {
        let ip = IpConfig::from_parts(IpMode::Static, "10.0.0.5", "10.0.0.1", "255.255.255.0")
            .unwrap();
        assert_eq!(ip.mode(), IpMode::Static);
        let fixed = ip.static_ip().unwrap();
        assert_eq!(fixed.address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(fixed.gateway, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(fixed.netmask, Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn test_ip_config_collapses_to_dhcp_on_missing_field() {
        let ip = IpConfig::from_parts(IpMode::Static, "10.0.0.5", "", "255.255.255.0").unwrap();
        assert_eq!(ip, IpConfig::Dhcp);
    }

    #[test]
    fn test_ip_config_dhcp_ignores_fields() {
        let ip = IpConfig::from_parts(IpMode::Dhcp, "10.0.0.5", "10.0.0.1", "255.255.255.0")
            .unwrap();
        assert_eq!(ip, IpConfig::Dhcp);
    }

    #[test]
    fn test_ip_config_rejects_garbage() {
        let err = IpConfig::from_parts(IpMode::Static, "10.0.0.500", "10.0.0.1", "255.255.255.0")
            .unwrap_err();
        assert_eq!(
            err,
            IpConfigError::InvalidAddress {
                field: "static_ip",
                value: "10.0.0.500".to_string()
            }
        );
    }

    #[test]
    fn test_ip_mode_flags() {
        assert_eq!(IpMode::from_flag("1"), Some(IpMode::Static));
        assert_eq!(IpMode::from_flag("0"), Some(IpMode::Dhcp));
        assert_eq!(IpMode::from_flag("2"), None);
        assert_eq!(IpMode::Static.as_flag(), "1");
    }

    #[test]
    fn test_mac_display() {
        let mac = MacAddress([0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff]);
        assert_eq!(mac.to_string(), "24:0a:c4:00:01:ff");
    }

    #[test]
    fn test_radio_mode_labels() {
        assert_eq!(RadioMode::Dual.label(), "Station and Access Point");
        assert_eq!(RadioMode::Off.label(), "Unknown");
        assert!(RadioMode::Dual.has_access_point());
        assert!(!RadioMode::Station.has_access_point());
    }
}
