// src/sid.rs
//
// =============================================================================
// EVTCSV: SID CODEC (spec.md §4.D)
// =============================================================================
//
// Text form: "S-" revision "-" authority ("-" subauthority)*
// Binary form: revision(u8) subAuthorityCount(u8) authority(6 bytes BE)
//              subAuthority[count](u32 LE)

use crate::error::SidError;

const MAX_AUTHORITY: u64 = (1u64 << 48) - 1;

fn parse_component(s: &str) -> Result<u64, SidError> {
    s.parse::<u64>()
        .map_err(|_| SidError::NotANumber(s.to_string()))
}

/// Parses canonical SID text into `(revision, authority, sub_authorities)`.
pub fn text_to_parts(text: &str) -> Result<(u8, u64, Vec<u32>), SidError> {
    let rest = text.strip_prefix("S-").ok_or(SidError::MissingPrefix)?;
    let mut parts = rest.split('-');

    let revision_str = parts.next().filter(|s| !s.is_empty()).ok_or(SidError::MissingRevision)?;
    let revision = parse_component(revision_str)?;
    if revision > u8::MAX as u64 {
        return Err(SidError::RevisionOutOfRange(revision as i64));
    }

    let authority_str = parts.next().filter(|s| !s.is_empty()).ok_or(SidError::MissingAuthority)?;
    let authority = parse_component(authority_str)?;
    if authority > MAX_AUTHORITY {
        return Err(SidError::AuthorityOutOfRange(authority));
    }

    let mut sub_authorities = Vec::new();
    for part in parts {
        let value = parse_component(part)?;
        if value > u32::MAX as u64 {
            return Err(SidError::SubAuthorityOutOfRange(value));
        }
        sub_authorities.push(value as u32);
    }

    Ok((revision as u8, authority, sub_authorities))
}

/// Encodes canonical SID text (e.g. `"S-1-5-32-544"`) to its binary form.
pub fn encode(text: &str) -> Result<Vec<u8>, SidError> {
    let (revision, authority, sub_authorities) = text_to_parts(text)?;
    if sub_authorities.len() > u8::MAX as usize {
        return Err(SidError::TooManySubAuthorities(sub_authorities.len()));
    }

    let mut bytes = Vec::with_capacity(8 + sub_authorities.len() * 4);
    bytes.push(revision);
    bytes.push(sub_authorities.len() as u8);
    // 48-bit authority, big-endian.
    let authority_be = authority.to_be_bytes();
    bytes.extend_from_slice(&authority_be[2..8]);
    for sub in &sub_authorities {
        bytes.extend_from_slice(&sub.to_le_bytes());
    }

    Ok(bytes)
}

/// Decodes a binary SID into canonical text form.
pub fn decode(bytes: &[u8]) -> Result<String, SidError> {
    if bytes.len() < 8 {
        return Err(SidError::BufferTooShort {
            need: 8,
            have: bytes.len(),
        });
    }
    let revision = bytes[0];
    let count = bytes[1] as usize;
    let need = 8 + count * 4;
    if bytes.len() < need {
        return Err(SidError::BufferTooShort {
            need,
            have: bytes.len(),
        });
    }

    let mut authority_be = [0u8; 8];
    authority_be[2..8].copy_from_slice(&bytes[2..8]);
    let authority = u64::from_be_bytes(authority_be);

    let mut text = format!("S-{}-{}", revision, authority);
    for i in 0..count {
        let off = 8 + i * 4;
        let sub = u32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
        text.push('-');
        text.push_str(&sub.to_string());
    }

    Ok(text)
}
