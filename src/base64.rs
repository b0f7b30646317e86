// src/base64.rs
//
// =============================================================================
// EVTCSV: BASE64 CODEC (spec.md §4.B)
// =============================================================================
//
// Streaming, libb64-style codec: the decoder tolerates bytes outside the
// alphabet (whitespace, stray newlines from a hand-edited CSV) by skipping
// them rather than failing, and the encoder emits a single unwrapped line
// terminated with 0, 1, or 2 `=` pad characters. This is deliberately not
// the `base64` crate's strict `Engine` — CSV fields that round-tripped
// through a text editor are exactly the tolerance case this format exists
// to survive.

const ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn decode_table() -> [i8; 256] {
    let mut table = [-1i8; 256];
    for (i, &b) in ALPHABET.iter().enumerate() {
        table[b as usize] = i as i8;
    }
    table
}

/// Encodes `data` as a single Base64 line with standard padding.
///
/// Buffer sizing per spec.md §4.B: ⌈len/3⌉·4.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(((data.len() + 2) / 3) * 4);
    let mut chunks = data.chunks_exact(3);

    for chunk in &mut chunks {
        let n = ((chunk[0] as u32) << 16) | ((chunk[1] as u32) << 8) | (chunk[2] as u32);
        out.push(ALPHABET[((n >> 18) & 0x3f) as usize] as char);
        out.push(ALPHABET[((n >> 12) & 0x3f) as usize] as char);
        out.push(ALPHABET[((n >> 6) & 0x3f) as usize] as char);
        out.push(ALPHABET[(n & 0x3f) as usize] as char);
    }

    let remainder = chunks.remainder();
    match remainder.len() {
        0 => {}
        1 => {
            let n = (remainder[0] as u32) << 16;
            out.push(ALPHABET[((n >> 18) & 0x3f) as usize] as char);
            out.push(ALPHABET[((n >> 12) & 0x3f) as usize] as char);
            out.push('=');
            out.push('=');
        }
        2 => {
            let n = ((remainder[0] as u32) << 16) | ((remainder[1] as u32) << 8);
            out.push(ALPHABET[((n >> 18) & 0x3f) as usize] as char);
            out.push(ALPHABET[((n >> 12) & 0x3f) as usize] as char);
            out.push(ALPHABET[((n >> 6) & 0x3f) as usize] as char);
            out.push('=');
        }
        _ => unreachable!("chunks_exact(3) remainder is always < 3"),
    }

    out
}

/// Decodes `text` as Base64, skipping any byte outside `[A-Za-z0-9+/=]`.
///
/// Buffer sizing per spec.md §4.B: ⌈len/4⌉·3, trimmed for trailing padding.
pub fn decode(text: &str) -> Vec<u8> {
    let table = decode_table();
    let mut sextets: Vec<u8> = Vec::with_capacity((text.len() / 4 + 1) * 3);
    let mut pad_count = 0usize;

    for &b in text.as_bytes() {
        if b == b'=' {
            pad_count += 1;
            continue;
        }
        let v = table[b as usize];
        if v < 0 {
            continue;
        }
        // A sextet arriving after padding started is malformed input; the
        // decoder is tolerant, so it is simply ignored rather than failing.
        if pad_count > 0 {
            continue;
        }
        sextets.push(v as u8);
    }

    let mut out = Vec::with_capacity(sextets.len() * 3 / 4 + 1);
    for quad in sextets.chunks(4) {
        let mut n: u32 = 0;
        for (i, &s) in quad.iter().enumerate() {
            n |= (s as u32) << (18 - 6 * i);
        }
        let bytes_out = match quad.len() {
            4 => 3,
            3 => 2,
            2 => 1,
            _ => 0,
        };
        let full = n.to_be_bytes();
        out.extend_from_slice(&full[1..1 + bytes_out]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_round_trips() {
        assert_eq!(decode(&encode(b"")), b"");
    }

    #[test]
    fn known_vectors() {
        assert_eq!(encode(b"f"), "Zg==");
        assert_eq!(encode(b"fo"), "Zm8=");
        assert_eq!(encode(b"foo"), "Zm9v");
        assert_eq!(encode(b"foob"), "Zm9vYg==");
        assert_eq!(encode(b"fooba"), "Zm9vYmE=");
        assert_eq!(encode(b"foobar"), "Zm9vYmFy");
    }

    #[test]
    fn decode_ignores_stray_characters() {
        assert_eq!(decode("Zm9v\n  Ym\tFy"), b"foobar");
    }

    #[test]
    fn round_trips_arbitrary_bytes() {
        for n in 0..300usize {
            let data: Vec<u8> = (0..n).map(|i| (i * 37 + 11) as u8).collect();
            assert_eq!(decode(&encode(&data)), data);
        }
    }
}
