//! Minimal RLP encoder covering what legacy transactions need:
//! byte strings, unsigned integers and flat lists of already-encoded items.

pub fn encode_bytes(bytes: &[u8]) -> Vec<u8> {
    if bytes.len() == 1 && bytes[0] < 0x80 {
        return vec![bytes[0]];
    }
    let mut out = length_prefix(bytes.len(), 0x80);
    out.extend_from_slice(bytes);
    out
}

pub fn encode_uint(value: u128) -> Vec<u8> {
    encode_bytes(trim_leading_zeros(&value.to_be_bytes()))
}

pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let payload_len = items.iter().map(Vec::len).sum();
    let mut out = length_prefix(payload_len, 0xc0);
    for item in items {
        out.extend_from_slice(item);
    }
    out
}

pub(crate) fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len());
    &bytes[start..]
}

fn length_prefix(len: usize, offset: u8) -> Vec<u8> {
    if len <= 55 {
        return vec![offset + len as u8];
    }
    let len_bytes = (len as u64).to_be_bytes();
    let len_bytes = trim_leading_zeros(&len_bytes);
    let mut out = Vec::with_capacity(1 + len_bytes.len());
    out.push(offset + 55 + len_bytes.len() as u8);
    out.extend_from_slice(len_bytes);
    out
}
