//! HTTP authentication for CalDAV.
//!
//! Basic (RFC 7617) and Digest (RFC 7616, MD5 and MD5-sess) schemes. The
//! scheme is picked from the server's first `WWW-Authenticate` challenge and
//! reused for every later request.

use base64::Engine;
use rand::Rng;
use std::collections::HashMap;

use super::config::Credentials;

/// Digest hash algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// Plain MD5.
    Md5,
    /// MD5 with a session key derived from nonce and cnonce.
    Md5Sess,
}

impl DigestAlgorithm {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "MD5" => Some(Self::Md5),
            "MD5-SESS" => Some(Self::Md5Sess),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Md5 => "MD5",
            Self::Md5Sess => "MD5-sess",
        }
    }
}

/// A parsed Digest challenge plus the nonce count used with it.
#[derive(Debug, Clone)]
pub struct DigestChallenge {
    /// The realm from the server challenge.
    pub realm: String,
    /// The server nonce.
    pub nonce: String,
    /// The opaque value, echoed back unchanged.
    pub opaque: Option<String>,
    /// Whether the server offered `qop=auth`.
    pub qop_auth: bool,
    /// The hash algorithm.
    pub algorithm: DigestAlgorithm,
    nc: u32,
}

impl DigestChallenge {
    /// Parses the parameters following the `Digest` token.
    ///
    /// Returns `None` if realm or nonce is missing, or the algorithm is not
    /// supported.
    pub fn parse(params: &str) -> Option<Self> {
        let params = parse_auth_params(params);

        let algorithm = match params.get("algorithm") {
            Some(value) => DigestAlgorithm::parse(value)?,
            None => DigestAlgorithm::Md5,
        };
        let qop_auth = params
            .get("qop")
            .is_some_and(|q| q.split(',').any(|v| v.trim().eq_ignore_ascii_case("auth")));

        Some(Self {
            realm: params.get("realm")?.clone(),
            nonce: params.get("nonce")?.clone(),
            opaque: params.get("opaque").cloned(),
            qop_auth,
            algorithm,
            nc: 0,
        })
    }

    /// Builds the Authorization header for one request.
    pub fn authorize(&mut self, method: &str, uri: &str, credentials: &Credentials) -> String {
        self.authorize_with_cnonce(method, uri, credentials, &generate_cnonce())
    }

    fn authorize_with_cnonce(
        &mut self,
        method: &str,
        uri: &str,
        credentials: &Credentials,
        cnonce: &str,
    ) -> String {
        self.nc += 1;
        let nc = format!("{:08x}", self.nc);

        let mut ha1 = md5_hex(&format!(
            "{}:{}:{}",
            credentials.username, self.realm, credentials.password
        ));
        if self.algorithm == DigestAlgorithm::Md5Sess {
            ha1 = md5_hex(&format!("{ha1}:{}:{cnonce}", self.nonce));
        }
        let ha2 = md5_hex(&format!("{method}:{uri}"));

        let response = if self.qop_auth {
            md5_hex(&format!("{ha1}:{}:{nc}:{cnonce}:auth:{ha2}", self.nonce))
        } else {
            md5_hex(&format!("{ha1}:{}:{ha2}", self.nonce))
        };

        let mut parts = vec![
            format!("username=\"{}\"", credentials.username),
            format!("realm=\"{}\"", self.realm),
            format!("nonce=\"{}\"", self.nonce),
            format!("uri=\"{uri}\""),
            format!("response=\"{response}\""),
            format!("algorithm={}", self.algorithm.as_str()),
        ];
        if self.qop_auth {
            parts.push("qop=auth".to_string());
            parts.push(format!("nc={nc}"));
            parts.push(format!("cnonce=\"{cnonce}\""));
        }
        if let Some(ref opaque) = self.opaque {
            parts.push(format!("opaque=\"{opaque}\""));
        }

        format!("Digest {}", parts.join(", "))
    }
}

/// The authentication scheme negotiated with the server.
#[derive(Debug, Clone)]
pub enum AuthScheme {
    /// HTTP Basic.
    Basic,
    /// HTTP Digest.
    Digest(DigestChallenge),
}

impl AuthScheme {
    /// Picks a scheme from `WWW-Authenticate` header values.
    ///
    /// Digest is preferred over Basic when both are offered.
    pub fn from_challenges<'a>(headers: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let mut basic = false;
        for header in headers {
            let header = header.trim();
            let (scheme, params) = header.split_once(' ').unwrap_or((header, ""));
            if scheme.eq_ignore_ascii_case("digest") {
                if let Some(challenge) = DigestChallenge::parse(params) {
                    return Some(Self::Digest(challenge));
                }
            } else if scheme.eq_ignore_ascii_case("basic") {
                basic = true;
            }
        }
        basic.then_some(Self::Basic)
    }

    /// Builds the Authorization header value for a request.
    pub fn authorize(&mut self, method: &str, uri: &str, credentials: &Credentials) -> String {
        match self {
            Self::Basic => basic_auth(credentials),
            Self::Digest(challenge) => challenge.authorize(method, uri, credentials),
        }
    }
}

/// Generates a Basic authentication header value.
pub fn basic_auth(credentials: &Credentials) -> String {
    let pair = format!("{}:{}", credentials.username, credentials.password);
    let encoded = base64::engine::general_purpose::STANDARD.encode(pair);
    format!("Basic {encoded}")
}

/// Parses `key=value` / `key="value"` pairs of a challenge.
fn parse_auth_params(content: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut chars = content.chars().peekable();

    while chars.peek().is_some() {
        while chars.peek().is_some_and(|c| c.is_whitespace() || *c == ',') {
            chars.next();
        }

        let key: String = chars
            .by_ref()
            .take_while(|c| *c != '=')
            .collect::<String>()
            .trim()
            .to_lowercase();
        if key.is_empty() {
            break;
        }

        let value = if chars.peek() == Some(&'"') {
            chars.next();
            let mut val = String::new();
            let mut escaped = false;
            for c in chars.by_ref() {
                match (escaped, c) {
                    (true, c) => {
                        val.push(c);
                        escaped = false;
                    }
                    (false, '\\') => escaped = true,
                    (false, '"') => break,
                    (false, c) => val.push(c),
                }
            }
            val
        } else {
            chars
                .by_ref()
                .take_while(|c| *c != ',' && !c.is_whitespace())
                .collect()
        };

        params.insert(key, value);
    }

    params
}

fn generate_cnonce() -> String {
    let bytes: [u8; 8] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn md5_hex(input: &str) -> String {
    format!("{:x}", md5::compute(input.as_bytes()))
}
