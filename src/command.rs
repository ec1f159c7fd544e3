//! Command strings for common device operations.
//!
//! The transport treats payloads as opaque; this module only helps build
//! them. Responses are never parsed here.
//!
//! # Example
//!
//! ```
//! use kasa_transport::command::{child_command, RELAY_OFF};
//!
//! let cmd = child_command("8006E921", &[2, 3], RELAY_OFF).unwrap();
//! assert_eq!(
//!     cmd,
//!     r#"{"context":{"child_ids":["8006E92102","8006E92103"]},"system":{"set_relay_state":{"state":0}}}"#
//! );
//! ```

use serde::de::Error as _;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::Result;

/// Read device information.
pub const GET_SYSINFO: &str = r#"{"system":{"get_sysinfo":{}}}"#;
/// Reboot after one second.
pub const REBOOT: &str = r#"{"system":{"reboot":{"delay":1}}}"#;
/// Switch the relay on.
pub const RELAY_ON: &str = r#"{"system":{"set_relay_state":{"state":1}}}"#;
/// Switch the relay off.
pub const RELAY_OFF: &str = r#"{"system":{"set_relay_state":{"state":0}}}"#;
/// Turn the status LED off.
pub const LED_OFF: &str = r#"{"system":{"set_led_off":{"off":1}}}"#;
/// Turn the status LED on.
pub const LED_ON: &str = r#"{"system":{"set_led_off":{"off":0}}}"#;
/// Read realtime current and voltage.
pub const EMETER_REALTIME: &str = r#"{"emeter":{"get_realtime":{}}}"#;

#[derive(Serialize)]
struct Context {
    child_ids: Vec<String>,
}

/// Child socket id: the parent device id followed by a two-digit index.
pub fn child_id(device_id: &str, index: u8) -> String {
    format!("{}{:02}", device_id, index)
}

/// Address `command` to specific sockets of a power strip.
///
/// # Errors
///
/// Returns `Json` if `command` is not a JSON object.
pub fn child_command(device_id: &str, children: &[u8], command: &str) -> Result<String> {
    let mut value: Value = serde_json::from_str(command)?;
    let object = value
        .as_object_mut()
        .ok_or_else(|| serde_json::Error::custom("command must be a JSON object"))?;

    let context = Context {
        child_ids: children.iter().map(|&c| child_id(device_id, c)).collect(),
    };
    object.insert("context".to_string(), serde_json::to_value(context)?);

    Ok(serde_json::to_string(&value)?)
}

/// Rename the device (or a child socket when wrapped with [`child_command`]).
pub fn set_alias(alias: &str) -> String {
    json!({ "system": { "set_dev_alias": { "alias": alias } } }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KasaError;

    #[test]
    fn test_child_id_zero_pads() {
        assert_eq!(child_id("ABC", 0), "ABC00");
        assert_eq!(child_id("ABC", 12), "ABC12");
    }

    #[test]
    fn test_child_command_keeps_original_command() {
        let cmd = child_command("DEV", &[1], GET_SYSINFO).unwrap();
        let value: Value = serde_json::from_str(&cmd).unwrap();

        assert_eq!(value["context"]["child_ids"], json!(["DEV01"]));
        assert_eq!(value["system"]["get_sysinfo"], json!({}));
    }

    #[test]
    fn test_child_command_rejects_non_object() {
        let err = child_command("DEV", &[1], "[1,2]").unwrap_err();
        assert!(matches!(err, KasaError::Json(_)));

        let err = child_command("DEV", &[1], "{not json").unwrap_err();
        assert!(matches!(err, KasaError::Json(_)));
    }

    #[test]
    fn test_set_alias_escapes() {
        let cmd = set_alias(r#"Tank "A""#);
        assert_eq!(
            cmd,
            r#"{"system":{"set_dev_alias":{"alias":"Tank \"A\""}}}"#
        );
    }

    #[test]
    fn test_constants_are_valid_json() {
        for cmd in [
            GET_SYSINFO,
            REBOOT,
            RELAY_ON,
            RELAY_OFF,
            LED_OFF,
            LED_ON,
            EMETER_REALTIME,
        ] {
            assert!(serde_json::from_str::<Value>(cmd).is_ok(), "{}", cmd);
        }
    }
}
