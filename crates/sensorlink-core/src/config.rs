//! Typed access to the network configuration held in the key-value store.
//!
//! Layout (namespace / key):
//! - `wifi` / `ssid`, `password`: station credentials
//! - `wifi_ap` / `ssid`, `password`: access point credentials
//! - `ipv4` / `static_ip`, `gateway`, `subnet`, `mode`: station addressing
//!
//! Loads never fail: a missing key means "use the default", and an
//! unavailable or corrupt store is logged and treated the same way so boot
//! always proceeds. Saves are synchronous and return after commit.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::model::{IpConfig, IpMode, NetworkCredentials};
use crate::store::{KeyValueStore, StoreError};

pub const STATION_NAMESPACE: &str = "wifi";
pub const ACCESS_POINT_NAMESPACE: &str = "wifi_ap";
pub const IPV4_NAMESPACE: &str = "ipv4";

pub const KEY_SSID: &str = "ssid";
pub const KEY_PASSWORD: &str = "password";
pub const KEY_STATIC_IP: &str = "static_ip";
pub const KEY_GATEWAY: &str = "gateway";
pub const KEY_SUBNET: &str = "subnet";
pub const KEY_MODE: &str = "mode";

/// Repository for credentials and IP configuration.
#[derive(Clone)]
pub struct NetworkConfig {
    store: Arc<dyn KeyValueStore>,
    default_access_point: NetworkCredentials,
}

impl NetworkConfig {
    pub fn new(store: Arc<dyn KeyValueStore>, default_access_point: NetworkCredentials) -> Self {
        Self {
            store,
            default_access_point,
        }
    }

    /// Station credentials, or `None` when absent or incomplete.
    pub fn station_credentials(&self) -> Option<NetworkCredentials> {
        self.load_credentials(STATION_NAMESPACE)
    }

    pub fn save_station_credentials(
        &self,
        credentials: &NetworkCredentials,
    ) -> Result<(), StoreError> {
        self.save_credentials(STATION_NAMESPACE, credentials)
    }

    /// Access point credentials, falling back to the built-in identity.
    pub fn access_point_credentials(&self) -> NetworkCredentials {
        self.load_credentials(ACCESS_POINT_NAMESPACE)
            .unwrap_or_else(|| self.default_access_point.clone())
    }

    pub fn save_access_point_credentials(
        &self,
        credentials: &NetworkCredentials,
    ) -> Result<(), StoreError> {
        self.save_credentials(ACCESS_POINT_NAMESPACE, credentials)
    }

    /// Station IP configuration; DHCP unless a complete static set is stored.
    pub fn ip_config(&self) -> IpConfig {
        let mode = self
            .read(IPV4_NAMESPACE, KEY_MODE)
            .and_then(|flag| IpMode::from_flag(&flag))
            .unwrap_or_default();
        if mode == IpMode::Dhcp {
            return IpConfig::Dhcp;
        }

        let address = self.read(IPV4_NAMESPACE, KEY_STATIC_IP).unwrap_or_default();
        let gateway = self.read(IPV4_NAMESPACE, KEY_GATEWAY).unwrap_or_default();
        let netmask = self.read(IPV4_NAMESPACE, KEY_SUBNET).unwrap_or_default();

        IpConfig::from_parts(mode, &address, &gateway, &netmask).unwrap_or_else(|e| {
            warn!("Stored IPv4 configuration is invalid, using DHCP: {}", e);
            IpConfig::Dhcp
        })
    }

    /// Persist IP configuration. A DHCP config clears the static triplet.
    pub fn save_ip_config(&self, config: &IpConfig) -> Result<(), StoreError> {
        match config {
            IpConfig::Static(ip) => {
                self.store
                    .put(IPV4_NAMESPACE, KEY_STATIC_IP, &ip.address.to_string())?;
                self.store
                    .put(IPV4_NAMESPACE, KEY_GATEWAY, &ip.gateway.to_string())?;
                self.store
                    .put(IPV4_NAMESPACE, KEY_SUBNET, &ip.netmask.to_string())?;
            }
            IpConfig::Dhcp => {
                self.store.erase(IPV4_NAMESPACE, KEY_STATIC_IP)?;
                self.store.erase(IPV4_NAMESPACE, KEY_GATEWAY)?;
                self.store.erase(IPV4_NAMESPACE, KEY_SUBNET)?;
            }
        }
        self.store
            .put(IPV4_NAMESPACE, KEY_MODE, config.mode().as_flag())?;
        self.store.commit(IPV4_NAMESPACE)?;
        debug!("Saved IPv4 configuration ({:?})", config.mode());
        Ok(())
    }

    fn load_credentials(&self, namespace: &str) -> Option<NetworkCredentials> {
        let ssid = self.read(namespace, KEY_SSID)?;
        let passphrase = self.read(namespace, KEY_PASSWORD)?;
        match NetworkCredentials::new(ssid, passphrase) {
            Ok(credentials) => Some(credentials),
            Err(e) => {
                debug!("Ignoring incomplete credentials in {}: {}", namespace, e);
                None
            }
        }
    }

    fn save_credentials(
        &self,
        namespace: &str,
        credentials: &NetworkCredentials,
    ) -> Result<(), StoreError> {
        self.store.put(namespace, KEY_SSID, credentials.ssid())?;
        self.store
            .put(namespace, KEY_PASSWORD, credentials.passphrase())?;
        self.store.commit(namespace)?;
        debug!("Saved credentials for {:?} in {}", credentials.ssid(), namespace);
        Ok(())
    }

    /// Committed value of a key; `None` if missing or unreadable.
    fn read(&self, namespace: &str, key: &str) -> Option<String> {
        match self.store.get(namespace, key) {
            Ok(value) => Some(value),
            Err(e) if e.is_not_found() => None,
            Err(e) => {
                warn!("Config store read {}/{} failed, using default: {}", namespace, key, e);
                None
            }
        }
    }
}
