//! Plugin argument decoding.
//!
//! Arguments travel as JSON text (`{"MaxSkew": 2}`) and every plugin owns
//! the schema of its blob. Decoding is strict: unknown fields are an error
//! so that a typo in a policy surfaces instead of silently using defaults.

use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::status::Status;

/// Reason attached to every argument decoding failure.
pub const ERR_REASON_INVALID_ARG: &str = "invalid arguments";

/// Arguments shared by the spread plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpreadArgs {
    /// Largest tolerated difference in virtual replicas between two
    /// pods (or zones, or nodes).
    #[serde(rename = "MaxSkew", default)]
    pub max_skew: i32,
}

/// Decode a plugin argument blob. A missing blob or one that does not
/// match `T` exactly yields an `Unschedulable` status.
pub fn decode_args<T: DeserializeOwned>(args: Option<&str>) -> Result<T, Status> {
    let raw = args.ok_or_else(|| Status::unschedulable(ERR_REASON_INVALID_ARG))?;
    serde_json::from_str(raw).map_err(|_| Status::unschedulable(ERR_REASON_INVALID_ARG))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_max_skew() {
        let args: SpreadArgs = decode_args(Some(r#"{"MaxSkew": 2}"#)).unwrap();
        assert_eq!(args.max_skew, 2);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = decode_args::<SpreadArgs>(Some(r#"{"MaxSkewness": 2}"#)).unwrap_err();
        assert_eq!(err, Status::unschedulable(ERR_REASON_INVALID_ARG));
    }

    #[test]
    fn missing_blob_is_rejected() {
        assert!(decode_args::<SpreadArgs>(None).is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        assert!(decode_args::<SpreadArgs>(Some("MaxSkew=2")).is_err());
        assert!(decode_args::<SpreadArgs>(Some(r#"{"MaxSkew": "two"}"#)).is_err());
    }

    #[test]
    fn empty_object_uses_default_skew() {
        let args: SpreadArgs = decode_args(Some("{}")).unwrap();
        assert_eq!(args.max_skew, 0);
    }
}
