//! Just enough of the Solidity ABI for the two registries.

use thiserror::Error;
use ww_crypto::function_selector;

const WORD: usize = 32;
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("abi decode failed: {0}")]
pub struct AbiError(String);

fn uint_word(value: usize) -> [u8; WORD] {
    let mut word = [0_u8; WORD];
    word[WORD - 8..].copy_from_slice(&(value as u64).to_be_bytes());
    word
}

fn padded(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    let remainder = out.len() % WORD;
    if remainder != 0 {
        out.resize(out.len() + WORD - remainder, 0);
    }
    out
}

/// Calldata for a function without arguments, e.g. `getActiveJobs()`.
pub fn encode_call(signature: &str) -> Vec<u8> {
    function_selector(signature).to_vec()
}

/// Calldata for a function taking a single `address`.
pub fn encode_address_call(signature: &str, address: &[u8; 20]) -> Vec<u8> {
    let mut out = encode_call(signature);
    out.extend_from_slice(&[0_u8; 12]);
    out.extend_from_slice(address);
    out
}

/// Calldata for a function taking a single `string`.
pub fn encode_string_call(signature: &str, value: &str) -> Vec<u8> {
    let mut out = encode_call(signature);
    out.extend_from_slice(&uint_word(WORD));
    out.extend_from_slice(&uint_word(value.len()));
    out.extend_from_slice(&padded(value.as_bytes()));
    out
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, AbiError> {
    let word = data
        .get(at..at + WORD)
        .ok_or_else(|| AbiError(format!("word at {at} out of range ({} bytes)", data.len())))?;
    if word[..WORD - 8].iter().any(|byte| *byte != 0) {
        return Err(AbiError(format!("value at {at} does not fit in 64 bits")));
    }
    let mut tail = [0_u8; 8];
    tail.copy_from_slice(&word[WORD - 8..]);
    usize::try_from(u64::from_be_bytes(tail)).map_err(|err| AbiError(err.to_string()))
}

fn read_string_at(data: &[u8], at: usize) -> Result<String, AbiError> {
    let len = read_usize(data, at)?;
    let start = at + WORD;
    let bytes = data
        .get(start..start + len)
        .ok_or_else(|| AbiError(format!("string of {len} bytes at {at} out of range")))?;
    String::from_utf8(bytes.to_vec()).map_err(|err| AbiError(err.to_string()))
}

/// Decodes return data consisting of one `string`.
pub fn decode_string(data: &[u8]) -> Result<String, AbiError> {
    let offset = read_usize(data, 0)?;
    read_string_at(data, offset)
}

/// Decodes return data consisting of one `string[]`.
pub fn decode_string_array(data: &[u8]) -> Result<Vec<String>, AbiError> {
    let base = read_usize(data, 0)?;
    let count = read_usize(data, base)?;
    let heads = base + WORD;
    (0..count)
        .map(|index| {
            let offset = read_usize(data, heads + index * WORD)?;
            read_string_at(data, heads + offset)
        })
        .collect()
}

/// Extracts the message of an `Error(string)` revert payload.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    decode_string(payload).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_string_array(values: &[&str]) -> Vec<u8> {
        let mut out = uint_word(WORD).to_vec();
        out.extend_from_slice(&uint_word(values.len()));
        let mut tails = Vec::new();
        for value in values {
            out.extend_from_slice(&uint_word(values.len() * WORD + tails.len()));
            tails.extend_from_slice(&uint_word(value.len()));
            tails.extend_from_slice(&padded(value.as_bytes()));
        }
        out.extend_from_slice(&tails);
        out
    }

    #[test]
    fn string_call_layout() {
        let data = encode_string_call("updateProfileCID(string)", "bafy");
        assert_eq!(&data[..4], &function_selector("updateProfileCID(string)"));
        assert_eq!(data.len(), 4 + 3 * WORD);
        assert_eq!(data[4 + WORD - 1], 0x20);
        assert_eq!(data[4 + 2 * WORD - 1], 4);
        assert_eq!(&data[4 + 2 * WORD..4 + 2 * WORD + 4], b"bafy");
        assert_eq!(decode_string(&data[4..]).unwrap(), "bafy");
    }

    #[test]
    fn address_call_layout() {
        let data = encode_address_call("getProfileCID(address)", &[0xab; 20]);
        assert_eq!(data.len(), 4 + WORD);
        assert!(data[4..16].iter().all(|byte| *byte == 0));
        assert_eq!(&data[16..], &[0xab; 20]);
    }

    #[test]
    fn decodes_string_arrays() {
        let data = encode_string_array(&["bafyone", "", "bafythree-with-a-longer-identifier-value"]);
        assert_eq!(
            decode_string_array(&data).unwrap(),
            vec!["bafyone", "", "bafythree-with-a-longer-identifier-value"]
        );
        assert_eq!(decode_string_array(&encode_string_array(&[])).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn decodes_error_string_reverts() {
        let mut payload = ERROR_STRING_SELECTOR.to_vec();
        payload.extend_from_slice(&encode_string_call("x()", "Profile not registered")[4..]);
        assert_eq!(
            decode_revert_reason(&payload).as_deref(),
            Some("Profile not registered")
        );
        assert_eq!(decode_revert_reason(&[0xde, 0xad, 0xbe, 0xef]), None);
    }

    #[test]
    fn truncated_data_is_an_error() {
        assert!(decode_string(&[0_u8; 10]).is_err());
        let mut data = uint_word(WORD).to_vec();
        data.extend_from_slice(&uint_word(64));
        assert!(decode_string(&data).is_err());
    }
}
