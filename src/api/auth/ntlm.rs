//! NTLMv2 challenge/response messages
//!
//! On-premises farms commonly accept only integrated authentication. The handshake is
//! three messages on one keep-alive connection:
//!
//! 1. client sends `Authorization: NTLM <negotiate>`
//! 2. server answers 401 with `WWW-Authenticate: NTLM <challenge>`
//! 3. client repeats the request with `Authorization: NTLM <authenticate>`

use super::Credentials;
use crate::api::error::{ListError, ListResult};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::Md5;
use rand::Rng;

type HmacMd5 = Hmac<Md5>;

const SIGNATURE: &[u8; 8] = b"NTLMSSP\0";

const NEGOTIATE_UNICODE: u32 = 0x0000_0001;
const REQUEST_TARGET: u32 = 0x0000_0004;
const NEGOTIATE_NTLM: u32 = 0x0000_0200;
const NEGOTIATE_ALWAYS_SIGN: u32 = 0x0000_8000;
const NEGOTIATE_EXTENDED_SESSIONSECURITY: u32 = 0x0008_0000;
const NEGOTIATE_TARGET_INFO: u32 = 0x0080_0000;
const NEGOTIATE_128: u32 = 0x2000_0000;
const NEGOTIATE_56: u32 = 0x8000_0000;

const NEGOTIATE_FLAGS: u32 = NEGOTIATE_UNICODE
    | REQUEST_TARGET
    | NEGOTIATE_NTLM
    | NEGOTIATE_ALWAYS_SIGN
    | NEGOTIATE_EXTENDED_SESSIONSECURITY
    | NEGOTIATE_TARGET_INFO
    | NEGOTIATE_128
    | NEGOTIATE_56;

/// AV pair id carrying the server's FILETIME
const AV_TIMESTAMP: u16 = 7;
const AV_EOL: u16 = 0;

/// Seconds between 1601-01-01 and the Unix epoch
const FILETIME_EPOCH_OFFSET: i64 = 11_644_473_600;

/// Parsed type 2 message
#[derive(Debug, Clone, PartialEq)]
pub struct Challenge {
    pub flags: u32,
    pub server_challenge: [u8; 8],
    pub target_info: Vec<u8>,
}

impl Challenge {
    pub fn parse(message: &[u8]) -> ListResult<Self> {
        if message.len() < 32 || &message[..8] != SIGNATURE || read_u32(message, 8) != 2 {
            return Err(ListError::Protocol("not an NTLM challenge message".to_string()));
        }

        let flags = read_u32(message, 20);
        let mut server_challenge = [0u8; 8];
        server_challenge.copy_from_slice(&message[24..32]);

        let target_info = if message.len() >= 48 {
            let len = read_u16(message, 40) as usize;
            let offset = read_u32(message, 44) as usize;
            message
                .get(offset..offset + len)
                .ok_or_else(|| ListError::Protocol("NTLM target info out of bounds".to_string()))?
                .to_vec()
        } else {
            Vec::new()
        };

        Ok(Self {
            flags,
            server_challenge,
            target_info,
        })
    }

    /// Server timestamp from the target info, if the server sent one
    pub fn timestamp(&self) -> Option<u64> {
        let info = &self.target_info;
        let mut pos = 0;
        while pos + 4 <= info.len() {
            let id = read_u16(info, pos);
            let len = read_u16(info, pos + 2) as usize;
            if id == AV_EOL {
                break;
            }
            if id == AV_TIMESTAMP && len == 8 && pos + 12 <= info.len() {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&info[pos + 4..pos + 12]);
                return Some(u64::from_le_bytes(raw));
            }
            pos += 4 + len;
        }
        None
    }
}

/// Type 1 message
pub fn negotiate_message() -> Vec<u8> {
    let mut message = Vec::with_capacity(32);
    message.extend_from_slice(SIGNATURE);
    message.extend_from_slice(&1u32.to_le_bytes());
    message.extend_from_slice(&NEGOTIATE_FLAGS.to_le_bytes());
    // empty domain and workstation security buffers
    message.extend_from_slice(&[0u8; 16]);
    message
}

/// Type 3 message answering `challenge`
pub fn authenticate_message(
    credentials: &Credentials,
    challenge: &Challenge,
    client_challenge: [u8; 8],
    timestamp: u64,
) -> Vec<u8> {
    let (domain, user) = credentials.domain_and_user();
    let key = nt_owf_v2(user, domain, &credentials.password);

    let mut blob = Vec::with_capacity(32 + challenge.target_info.len());
    blob.extend_from_slice(&[0x01, 0x01, 0, 0, 0, 0, 0, 0]);
    blob.extend_from_slice(&timestamp.to_le_bytes());
    blob.extend_from_slice(&client_challenge);
    blob.extend_from_slice(&[0u8; 4]);
    blob.extend_from_slice(&challenge.target_info);
    blob.extend_from_slice(&[0u8; 4]);

    let nt_proof = hmac_md5(&key, &[&challenge.server_challenge, &blob]);
    let mut nt_response = nt_proof.to_vec();
    nt_response.extend_from_slice(&blob);

    let mut lm_response = hmac_md5(&key, &[&challenge.server_challenge, &client_challenge]).to_vec();
    lm_response.extend_from_slice(&client_challenge);

    let domain_bytes = utf16le(domain);
    let user_bytes = utf16le(user);
    let flags = (challenge.flags & NEGOTIATE_FLAGS) | NEGOTIATE_UNICODE | NEGOTIATE_NTLM;

    let payloads: [&[u8]; 6] = [&lm_response, &nt_response, &domain_bytes, &user_bytes, &[], &[]];

    const HEADER_LEN: usize = 64;
    let mut message = Vec::with_capacity(HEADER_LEN + payloads.iter().map(|p| p.len()).sum::<usize>());
    message.extend_from_slice(SIGNATURE);
    message.extend_from_slice(&3u32.to_le_bytes());

    let mut offset = HEADER_LEN as u32;
    for payload in &payloads {
        let len = payload.len() as u16;
        message.extend_from_slice(&len.to_le_bytes());
        message.extend_from_slice(&len.to_le_bytes());
        message.extend_from_slice(&offset.to_le_bytes());
        offset += payload.len() as u32;
    }
    message.extend_from_slice(&flags.to_le_bytes());

    for payload in &payloads {
        message.extend_from_slice(payload);
    }
    message
}

/// NTOWFv2: HMAC-MD5 keyed by the NT hash over upper-cased user plus domain
pub fn nt_owf_v2(user: &str, domain: &str, password: &str) -> [u8; 16] {
    let identity = utf16le(&format!("{}{}", user.to_uppercase(), domain));
    hmac_md5(&nt_owf_v1(password), &[&identity])
}

/// NT hash: MD4 of the UTF-16LE password
pub fn nt_owf_v1(password: &str) -> [u8; 16] {
    use md4::{Digest, Md4};

    let digest = Md4::digest(utf16le(password));
    let mut out = [0u8; 16];
    out.copy_from_slice(&digest);
    out
}

/// `NTLM <base64 negotiate>` header value
pub fn negotiate_header() -> String {
    format!("NTLM {}", STANDARD.encode(negotiate_message()))
}

/// `NTLM <base64 authenticate>` header value, using the server time when offered
pub fn authenticate_header(credentials: &Credentials, challenge: &Challenge) -> String {
    let mut client_challenge = [0u8; 8];
    rand::thread_rng().fill(&mut client_challenge);
    let timestamp = challenge.timestamp().unwrap_or_else(filetime_now);
    let message = authenticate_message(credentials, challenge, client_challenge, timestamp);
    format!("NTLM {}", STANDARD.encode(message))
}

/// Find and decode an NTLM challenge among `WWW-Authenticate` values
pub fn challenge_from_headers<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<Challenge> {
    values.into_iter().find_map(|value| {
        let encoded = value.trim().strip_prefix("NTLM ")?;
        let decoded = STANDARD.decode(encoded.trim()).ok()?;
        Challenge::parse(&decoded).ok()
    })
}

pub fn filetime_now() -> u64 {
    let now = chrono::Utc::now();
    let secs = (now.timestamp() + FILETIME_EPOCH_OFFSET) as u64;
    secs * 10_000_000 + u64::from(now.timestamp_subsec_nanos() / 100)
}

fn hmac_md5(key: &[u8], parts: &[&[u8]]) -> [u8; 16] {
    let mut mac = HmacMd5::new_from_slice(key).expect("HMAC accepts keys of any length");
    for part in parts {
        mac.update(part);
    }
    let mut out = [0u8; 16];
    out.copy_from_slice(&mac.finalize().into_bytes());
    out
}

fn utf16le(value: &str) -> Vec<u8> {
    value.encode_utf16().flat_map(|unit| unit.to_le_bytes()).collect()
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
