//! The `hello`/`authenticate` handshake and negotiated session facts.

use bytes::Bytes;

use super::config::{ConnectionConfig, HTSP_VERSION};
use crate::{auth::challenge_digest, error::HtspError, message::Message};

/// Facts negotiated during a successful handshake.
///
/// Populated by [`HtspConnection::authenticate`](super::HtspConnection::authenticate);
/// `disk_space` stays `None` if the server omits the usage figures.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionInfo {
    /// HTSP protocol revision the server speaks.
    pub protocol_version: i64,
    /// Server software name.
    pub server_name: String,
    /// Server software version.
    pub server_version: String,
    /// Human-readable free/total disk space, e.g. `"410 GiB of 932 GiB"`.
    pub disk_space: Option<String>,
}

/// Build the opening `hello` request.
pub(super) fn hello_request(config: &ConnectionConfig) -> Message {
    Message::request("hello")
        .with("htspversion", HTSP_VERSION)
        .with("clientname", config.client_name())
        .with("clientversion", config.client_version())
        .with("username", config.username())
}

/// Extract the negotiated facts and challenge salt from a `hello` response.
pub(super) fn parse_hello(response: &Message) -> Result<(SessionInfo, Bytes), HtspError> {
    let challenge = response
        .get_bytes("challenge")
        .ok_or(HtspError::Handshake {
            method: "hello",
            field: "challenge",
        })?
        .clone();
    let protocol_version = response.get_int("htspversion").ok_or(HtspError::Handshake {
        method: "hello",
        field: "htspversion",
    })?;
    Ok((
        SessionInfo {
            protocol_version,
            server_name: response.get_str("servername").unwrap_or_default().to_owned(),
            server_version: response.get_str("serverversion").unwrap_or_default().to_owned(),
            disk_space: None,
        },
        challenge,
    ))
}

/// Build the `authenticate` request with the salted password digest.
pub(super) fn authenticate_request(config: &ConnectionConfig, challenge: &[u8]) -> Message {
    let digest = challenge_digest(config.password(), challenge);
    Message::request("authenticate")
        .with("username", config.username())
        .with("digest", digest.as_slice())
}

/// Access is granted when `noaccess` is absent or zero.
pub(super) fn access_granted(response: &Message) -> bool {
    response.get_int("noaccess").unwrap_or(0) == 0
}

/// Format a `getDiskSpace` response as whole-GiB free/total usage.
pub(super) fn disk_space_string(response: &Message) -> Option<String> {
    const GIB: i64 = 1024 * 1024 * 1024;
    let free = response.get_int("freediskspace")? / GIB;
    let total = response.get_int("totaldiskspace")? / GIB;
    Some(format!("{free} GiB of {total} GiB"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConnectionConfig {
        ConnectionConfig::new("htsp.test", 9982).credentials("viewer", "secret")
    }

    #[test]
    fn hello_carries_identity_and_protocol() {
        let hello = hello_request(&config());
        assert_eq!(hello.method(), Some("hello"));
        assert_eq!(hello.get_int("htspversion"), Some(HTSP_VERSION));
        assert_eq!(hello.get_str("username"), Some("viewer"));
    }

    #[test]
    fn parse_hello_requires_challenge() {
        let response = Message::new()
            .with("htspversion", 34_i64)
            .with("servername", "Tvheadend");
        let err = parse_hello(&response).expect_err("challenge is mandatory");
        assert!(matches!(
            err,
            HtspError::Handshake {
                field: "challenge",
                ..
            }
        ));
    }

    #[test]
    fn digest_uses_challenge_salt() {
        let request = authenticate_request(&config(), &[0xAB, 0xCD]);
        let digest = request.get_bytes("digest").expect("digest field");
        assert_eq!(digest.as_ref(), challenge_digest("secret", &[0xAB, 0xCD]));
    }

    #[test]
    fn noaccess_zero_or_absent_grants_access() {
        assert!(access_granted(&Message::new()));
        assert!(access_granted(&Message::new().with("noaccess", 0_i64)));
        assert!(!access_granted(&Message::new().with("noaccess", 1_i64)));
    }

    #[test]
    fn disk_space_formats_whole_gib() {
        const GIB: i64 = 1024 * 1024 * 1024;
        let response = Message::new()
            .with("freediskspace", 410 * GIB + 7)
            .with("totaldiskspace", 932 * GIB);
        assert_eq!(
            disk_space_string(&response).as_deref(),
            Some("410 GiB of 932 GiB")
        );
    }
}
