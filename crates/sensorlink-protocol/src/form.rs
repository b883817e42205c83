//! Decoding of `application/x-www-form-urlencoded` bodies and query strings.
//!
//! The device pages post plain `key=value&key=value` bodies, sometimes with a
//! `text/plain` content type, so decoding works on raw bytes rather than on
//! the request's declared type.
//!
//! A required field that is absent is [`FormError::MissingField`]; a field
//! that is present but unusable is [`FormError::InvalidField`]. Nothing is
//! applied unless the whole form decodes.

use std::collections::HashMap;

use thiserror::Error;

use sensorlink_core::{CredentialsError, IpConfig, IpConfigError, IpMode, NetworkCredentials};

/// Errors produced while decoding a form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("missing field {0:?}")]
    MissingField(&'static str),

    #[error("invalid field {field:?}: {reason}")]
    InvalidField { field: &'static str, reason: String },
}

/// Decoded key/value pairs. The first occurrence of a key wins.
#[derive(Debug, Clone, Default)]
pub struct FormBody {
    fields: HashMap<String, String>,
}

impl FormBody {
    pub fn parse(raw: &[u8]) -> Self {
        let mut fields = HashMap::new();
        for (key, value) in url::form_urlencoded::parse(raw) {
            fields
                .entry(key.trim().to_string())
                .or_insert_with(|| value.trim_end_matches(['\r', '\n']).to_string());
        }
        Self { fields }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn require(&self, field: &'static str) -> Result<&str, FormError> {
        self.get(field).ok_or(FormError::MissingField(field))
    }
}

/// Body of `/wifi-save-creds` and `/wifi-save-ap-creds`.
pub struct CredentialsForm;

impl CredentialsForm {
    pub fn decode(raw: &[u8]) -> Result<NetworkCredentials, FormError> {
        let form = FormBody::parse(raw);
        let ssid = form.require("ssid")?;
        let password = form.require("password")?;

        NetworkCredentials::new(ssid, password).map_err(|e| {
            let field = match e {
                CredentialsError::EmptySsid | CredentialsError::SsidTooLong(_) => "ssid",
                CredentialsError::EmptyPassphrase | CredentialsError::PassphraseTooLong(_) => {
                    "password"
                }
            };
            FormError::InvalidField {
                field,
                reason: e.to_string(),
            }
        })
    }
}

/// Body of `/ipv4-config`.
///
/// `mode` is always required. The address triplet is required when
/// `mode=1`; an empty member there still collapses the config to DHCP.
pub struct Ipv4Form;

impl Ipv4Form {
    pub fn decode(raw: &[u8]) -> Result<IpConfig, FormError> {
        let form = FormBody::parse(raw);
        let flag = form.require("mode")?;
        let mode = IpMode::from_flag(flag).ok_or_else(|| FormError::InvalidField {
            field: "mode",
            reason: format!("expected 0 or 1, got {flag:?}"),
        })?;

        if mode == IpMode::Dhcp {
            return Ok(IpConfig::Dhcp);
        }

        let address = form.require("static_ip")?;
        let gateway = form.require("gateway")?;
        let netmask = form.require("subnet")?;

        IpConfig::from_parts(mode, address, gateway, netmask).map_err(|e| match e {
            IpConfigError::InvalidAddress { field, ref value } => FormError::InvalidField {
                field,
                reason: format!("not an IPv4 address: {value:?}"),
            },
        })
    }
}

/// Query of `/led` and `/toggle`: `pin=<n>&state=<n>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedCommand {
    pub pin: u32,
    /// Any non-zero state drives the pin high.
    pub high: bool,
}

impl LedCommand {
    pub fn decode(query: &str) -> Result<Self, FormError> {
        let form = FormBody::parse(query.as_bytes());
        let pin = form.require("pin")?;
        let state = form.require("state")?;

        let pin = pin.parse::<u32>().map_err(|e| FormError::InvalidField {
            field: "pin",
            reason: e.to_string(),
        })?;
        let state = state.parse::<i64>().map_err(|e| FormError::InvalidField {
            field: "state",
            reason: e.to_string(),
        })?;

        Ok(Self {
            pin,
            high: state != 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_form_body_decodes_escapes() {
        let form = FormBody::parse(b"ssid=My+Home%21&password=p%26ss%3Dword");
        assert_eq!(form.get("ssid"), Some("My Home!"));
        assert_eq!(form.get("password"), Some("p&ss=word"));
        assert_eq!(form.get("other"), None);
    }

    #[test]
    fn test_form_body_first_occurrence_wins() {
        let form = FormBody::parse(b"ssid=first&ssid=second");
        assert_eq!(form.get("ssid"), Some("first"));
    }

    #[test]
    fn test_form_body_strips_trailing_newline() {
        let form = FormBody::parse(b"ssid=home&password=secret\r\n");
        assert_eq!(form.get("password"), Some("secret"));
    }

    #[test]
    fn test_credentials_form() {
        let creds = CredentialsForm::decode(b"ssid=home&password=secret").unwrap();
        assert_eq!(creds.ssid(), "home");
        assert_eq!(creds.passphrase(), "secret");
    }

    #[test]
    fn test_credentials_form_missing_field() {
        assert_eq!(
            CredentialsForm::decode(b"ssid=home").unwrap_err(),
            FormError::MissingField("password")
        );
        assert_eq!(
            CredentialsForm::decode(b"").unwrap_err(),
            FormError::MissingField("ssid")
        );
    }

    #[test]
    fn test_credentials_form_invalid_values() {
        let long = format!("ssid={}&password=secret", "s".repeat(33));
        assert!(matches!(
            CredentialsForm::decode(long.as_bytes()),
            Err(FormError::InvalidField { field: "ssid", .. })
        ));
        assert!(matches!(
            CredentialsForm::decode(b"ssid=home&password="),
            Err(FormError::InvalidField {
                field: "password",
                ..
            })
        ));
    }

    #[test]
    fn test_ipv4_form_static() {
        let ip = Ipv4Form::decode(
            b"static_ip=10.0.0.5&gateway=10.0.0.1&subnet=255.255.255.0&mode=1",
        )
        .unwrap();
        let fixed = ip.static_ip().unwrap();
        assert_eq!(fixed.address, Ipv4Addr::new(10, 0, 0, 5));
        assert_eq!(fixed.netmask, Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn test_ipv4_form_empty_member_collapses_to_dhcp() {
        let ip = Ipv4Form::decode(b"static_ip=10.0.0.5&gateway=&subnet=255.255.255.0&mode=1")
            .unwrap();
        assert_eq!(ip, IpConfig::Dhcp);
    }

    #[test]
    fn test_ipv4_form_dhcp_needs_only_mode() {
        assert_eq!(Ipv4Form::decode(b"mode=0").unwrap(), IpConfig::Dhcp);
    }

    #[test]
    fn test_ipv4_form_errors() {
        assert_eq!(
            Ipv4Form::decode(b"static_ip=10.0.0.5").unwrap_err(),
            FormError::MissingField("mode")
        );
        assert_eq!(
            Ipv4Form::decode(b"mode=1&static_ip=10.0.0.5&gateway=10.0.0.1").unwrap_err(),
            FormError::MissingField("subnet")
        );
        assert!(matches!(
            Ipv4Form::decode(b"mode=2"),
            Err(FormError::InvalidField { field: "mode", .. })
        ));
        assert!(matches!(
            Ipv4Form::decode(b"mode=1&static_ip=10.0.0&gateway=10.0.0.1&subnet=255.255.255.0"),
            Err(FormError::InvalidField {
                field: "static_ip",
                ..
            })
        ));
    }

    #[test]
    fn test_led_command() {
        assert_eq!(
            LedCommand::decode("pin=2&state=1").unwrap(),
            LedCommand { pin: 2, high: true }
        );
        assert_eq!(
            LedCommand::decode("state=0&pin=22").unwrap(),
            LedCommand {
                pin: 22,
                high: false
            }
        );
    }

    #[test]
    fn test_led_command_rejects_bad_query() {
        assert_eq!(
            LedCommand::decode("pin=2").unwrap_err(),
            FormError::MissingField("state")
        );
        assert!(matches!(
            LedCommand::decode("pin=two&state=1"),
            Err(FormError::InvalidField { field: "pin", .. })
        ));
        assert!(matches!(
            LedCommand::decode("pin=-1&state=1"),
            Err(FormError::InvalidField { field: "pin", .. })
        ));
    }
}
