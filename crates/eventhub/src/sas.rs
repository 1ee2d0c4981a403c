//! Shared access signature tokens for Service Bus resources.

use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    hmac::{Hmac, Mac},
    secrecy::{ExposeSecret, Secret},
    sha2::Sha256,
};

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a signed token, in seconds.
pub const TOKEN_TTL: u64 = 86_400;

/// Characters `urlencoding` escapes that URI-component encoding keeps.
const UNRESERVED_MARKS: &[(&str, &str)] = &[
    ("%21", "!"),
    ("%27", "'"),
    ("%28", "("),
    ("%29", ")"),
    ("%2A", "*"),
];

/// Percent-encode `input` as a URI component.
///
/// Leaves `A-Z a-z 0-9 - _ . ! ~ * ' ( )` as is and encodes a space as `%20`.
pub fn encode_uri_component(input: &str) -> String {
    UNRESERVED_MARKS
        .iter()
        .fold(urlencoding::encode(input).into_owned(), |acc, (from, to)| {
            acc.replace(from, to)
        })
}

/// A token ready for the `Authorization` header.
#[derive(Clone, PartialEq, Eq)]
pub struct SignedToken {
    pub value: String,
    /// Unix timestamp, in seconds, after which the token is rejected.
    pub expiry: u64,
}

impl SignedToken {
    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedToken")
            .field("value", &"[REDACTED]")
            .field("expiry", &self.expiry)
            .finish()
    }
}

impl fmt::Display for SignedToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

/// Signs resource URIs with a shared access policy key.
///
/// The key bytes are its UTF-8 text; it is not base64-decoded first.
#[derive(Clone)]
pub struct SasSigner {
    key_name: String,
    mac: HmacSha256,
}

impl SasSigner {
    pub fn new(key_name: impl Into<String>, key: Secret<String>) -> Result<Self> {
        let key_name = key_name.into();
        if key_name.is_empty() {
            return Err(Error::MissingSettings {
                names: vec!["key_name"],
            });
        }
        let key = key.expose_secret();
        if key.is_empty() {
            return Err(Error::invalid_key("key is empty"));
        }
        let mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(Error::invalid_key)?;
        Ok(Self { key_name, mac })
    }

    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Sign `resource_uri`, valid for [`TOKEN_TTL`] seconds from `now`.
    pub fn sign(&self, resource_uri: &str, now: SystemTime) -> SignedToken {
        let issued = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let expiry = issued + TOKEN_TTL;
        let encoded_uri = encode_uri_component(resource_uri);

        let mut mac = self.mac.clone();
        mac.update(format!("{encoded_uri}\n{expiry}").as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());

        SignedToken {
            value: format!(
                "SharedAccessSignature sr={encoded_uri}&sig={}&se={expiry}&skn={}",
                encode_uri_component(&signature),
                self.key_name
            ),
            expiry,
        }
    }
}

impl fmt::Debug for SasSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SasSigner")
            .field("key_name", &self.key_name)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use {super::*, rstest::rstest};

    const URI: &str = "https://yothub-ns.servicebus.windows.net/yot/publishers/bot/messages";

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn signer() -> SasSigner {
        SasSigner::new("send", Secret::new("secret".into())).unwrap()
    }

    #[rstest]
    #[case("abc-_.~", "abc-_.~")]
    #[case("a b", "a%20b")]
    #[case("!'()*", "!'()*")]
    #[case("https://h/p?q=1&r=+", "https%3A%2F%2Fh%2Fp%3Fq%3D1%26r%3D%2B")]
    #[case("é", "%C3%A9")]
    #[case("100%", "100%25")]
    #[case("%21", "%2521")]
    fn uri_component_encoding(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(encode_uri_component(input), expected);
    }

    #[test]
    fn known_token() {
        let token = signer().sign(URI, at(1_478_080_800));
        assert_eq!(token.expiry, 1_478_167_200);
        assert_eq!(
            token.value,
            "SharedAccessSignature \
             sr=https%3A%2F%2Fyothub-ns.servicebus.windows.net%2Fyot%2Fpublishers%2Fbot%2Fmessages\
             &sig=VaukNdfWbTwtSDZ44%2BJ2nv3ivfJ8KqQBBs3FwsEZj40%3D&se=1478167200&skn=send"
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let now = at(1_478_080_800);
        assert_eq!(signer().sign(URI, now), signer().sign(URI, now));
    }

    #[test]
    fn one_second_later_changes_expiry_and_signature() {
        let a = signer().sign(URI, at(1_478_080_800));
        let b = signer().sign(URI, at(1_478_080_801));
        assert_eq!(b.expiry, a.expiry + 1);
        assert_ne!(a.value, b.value);
        assert!(
            b.value
                .contains("&sig=xzA8Nkxu5rskUU9%2FREfLIf%2FzuIFawrfa5ZE1ksqGKrI%3D&")
        );
    }

    #[test]
    fn sub_second_precision_is_floored() {
        let now = at(1_478_080_800) + Duration::from_millis(999);
        assert_eq!(signer().sign(URI, now).expiry, 1_478_167_200);
    }

    #[test]
    fn expiry_is_in_the_future() {
        let now = SystemTime::now();
        let token = signer().sign(URI, now);
        let now_secs = now.duration_since(UNIX_EPOCH).unwrap().as_secs();
        assert!(token.expiry > now_secs);
    }

    #[test]
    fn pre_epoch_clamps_to_zero() {
        let before = UNIX_EPOCH - Duration::from_secs(10);
        assert_eq!(signer().sign(URI, before).expiry, TOKEN_TTL);
    }

    #[test]
    fn rejects_empty_material() {
        let err = SasSigner::new("", Secret::new("k".into())).unwrap_err();
        assert!(matches!(err, Error::MissingSettings { .. }));
        let err = SasSigner::new("send", Secret::new(String::new())).unwrap_err();
        assert!(matches!(err, Error::InvalidKey { .. }));
    }

    #[test]
    fn debug_hides_secrets() {
        let signer = signer();
        let token = signer.sign(URI, at(0));
        assert!(!format!("{signer:?}").contains("secret"));
        assert!(!format!("{token:?}").contains("SharedAccessSignature"));
    }
}
