//! Read-only snapshot of the device's network identity, used to render the
//! device pages and the status endpoint.

use std::net::Ipv4Addr;

use serde::Serialize;

use crate::config::NetworkConfig;
use crate::hal::Radio;
use crate::model::{ConnectivityState, IpConfig, MacAddress, RadioMode};
use crate::template::{escape_html, Variables};

/// Network identity gathered at one instant.
///
/// Built on demand and dropped after use; nothing here is cached.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    pub build_id: String,
    pub state: ConnectivityState,
    pub mode: RadioMode,
    pub mac: MacAddress,
    pub ap_ip: Option<Ipv4Addr>,
    pub sta_ip: Option<Ipv4Addr>,
    pub ap_ssid: String,
    #[serde(skip)]
    pub ap_passkey: String,
    pub sta_ssid: Option<String>,
    pub ip_config: IpConfig,
}

impl NetworkInfo {
    pub fn collect(
        build_id: &str,
        state: ConnectivityState,
        radio: &dyn Radio,
        config: &NetworkConfig,
    ) -> Self {
        let access_point = config.access_point_credentials();
        let mode = radio.mode();

        Self {
            build_id: build_id.to_string(),
            state,
            mode,
            mac: radio.mac_address(),
            ap_ip: radio.access_point_ip(),
            sta_ip: radio.station_ip(),
            ap_ssid: access_point.ssid().to_string(),
            ap_passkey: access_point.passphrase().to_string(),
            sta_ssid: config
                .station_credentials()
                .map(|c| c.ssid().to_string()),
            ip_config: config.ip_config(),
        }
    }

    /// Placeholder bindings for the device pages.
    ///
    /// Free-text values (SSIDs, passkey, build id) are HTML-escaped.
    pub fn variables(&self) -> Variables {
        let fixed = self.ip_config.static_ip();
        let mut vars = Variables::new();
        vars.set("GIT_COMMIT_HASH", escape_html(&self.build_id))
            .set("MAC_ADDRESS", self.mac.to_string())
            .set_optional("AP_IP", self.ap_ip.map(|ip| ip.to_string()))
            .set_optional("STA_IP", self.sta_ip.map(|ip| ip.to_string()))
            .set("AP_SSID", escape_html(&self.ap_ssid))
            .set_optional(
                "STA_SSID",
                self.sta_ssid.as_deref().map(|ssid| escape_html(ssid).into_owned()),
            )
            .set("AP_PASSKEY", escape_html(&self.ap_passkey))
            .set("WIFI_MODE", self.mode.label())
            .set("CONNECTIVITY_STATE", self.state.to_string())
            .set_optional("STATIC_IP", fixed.map(|ip| ip.address.to_string()))
            .set_optional("GATEWAY", fixed.map(|ip| ip.gateway.to_string()))
            .set_optional("SUBNET", fixed.map(|ip| ip.netmask.to_string()))
            .set("IP_MODE", self.ip_config.mode().as_flag());
        vars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::RadioError;
    use crate::model::{IpMode, NetworkCredentials};
    use crate::store::MemoryStore;
    use crate::template::render_to_string;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    struct FixedRadio;

    impl Radio for FixedRadio {
        fn start_access_point(&self, _: &NetworkCredentials) -> Result<(), RadioError> {
            Ok(())
        }
        fn stop_access_point(&self) -> Result<(), RadioError> {
            Ok(())
        }
        fn join(&self, _: &NetworkCredentials) -> Result<(), RadioError> {
            Ok(())
        }
        fn apply_ip_config(&self, _: &IpConfig) -> Result<(), RadioError> {
            Ok(())
        }
        fn mode(&self) -> RadioMode {
            RadioMode::AccessPoint
        }
        fn station_ip(&self) -> Option<Ipv4Addr> {
            None
        }
        fn access_point_ip(&self) -> Option<Ipv4Addr> {
            Some(Ipv4Addr::new(192, 168, 4, 1))
        }
        fn mac_address(&self) -> MacAddress {
            MacAddress([0x24, 0x0a, 0xc4, 0x12, 0x34, 0x56])
        }
        fn scan(&self) -> Result<Vec<String>, RadioError> {
            Ok(Vec::new())
        }
    }

    fn config() -> NetworkConfig {
        NetworkConfig::new(
            Arc::new(MemoryStore::new()),
            NetworkCredentials::new("SensorLink", "sensorlink").unwrap(),
        )
    }

    #[test]
    fn test_variables_for_unconfigured_device() {
        let info = NetworkInfo::collect("abc1234", ConnectivityState::ApOnly, &FixedRadio, &config());
        let page = "{{GIT_COMMIT_HASH}} {{MAC_ADDRESS}} {{AP_IP}} [{{STA_IP}}] {{AP_SSID}} \
                    [{{STA_SSID}}] {{WIFI_MODE}} {{IP_MODE}} [{{STATIC_IP}}]";

        assert_eq!(
            render_to_string(page, &info.variables()),
            "abc1234 24:0a:c4:12:34:56 192.168.4.1 [] SensorLink [] Access Point 0 []"
        );
    }

    #[test]
    fn test_variables_include_static_triplet() {
        let config = config();
        let ip = IpConfig::from_parts(IpMode::Static, "10.0.0.5", "10.0.0.1", "255.255.255.0")
            .unwrap();
        config.save_ip_config(&ip).unwrap();
        config
            .save_station_credentials(&NetworkCredentials::new("home", "secret").unwrap())
            .unwrap();

        let info = NetworkInfo::collect("x", ConnectivityState::StaConnecting, &FixedRadio, &config);
        let vars = info.variables();
        assert_eq!(vars.get("STATIC_IP"), Some("10.0.0.5"));
        assert_eq!(vars.get("GATEWAY"), Some("10.0.0.1"));
        assert_eq!(vars.get("SUBNET"), Some("255.255.255.0"));
        assert_eq!(vars.get("IP_MODE"), Some("1"));
        assert_eq!(vars.get("STA_SSID"), Some("home"));
        assert_eq!(vars.get("CONNECTIVITY_STATE"), Some("STA_CONNECTING"));
    }

    #[test]
    fn test_free_text_values_are_escaped() {
        let config = config();
        config
            .save_station_credentials(
                &NetworkCredentials::new("<script>alert(1)</script>", "secret").unwrap(),
            )
            .unwrap();

        let info = NetworkInfo::collect("x", ConnectivityState::StaConnecting, &FixedRadio, &config);
        assert_eq!(
            render_to_string(r#"<input value="{{STA_SSID}}">"#, &info.variables()),
            r#"<input value="&lt;script&gt;alert(1)&lt;/script&gt;">"#
        );
    }

    #[test]
    fn test_passkey_not_serialized() {
        let info = NetworkInfo::collect("x", ConnectivityState::ApOnly, &FixedRadio, &config());
        let json = serde_json::to_value(&info).unwrap();
        assert!(json.get("apPasskey").is_none());
        assert_eq!(json["apSsid"], "SensorLink");
        assert_eq!(json["state"], "AP_ONLY");
    }
}
