use anyhow::{Result, anyhow, bail};
use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use zeroize::Zeroize;

mod rlp;

pub use rlp::{encode_bytes, encode_list, encode_uint};

pub fn keccak256(input: &[u8]) -> [u8; 32] {
    Keccak256::digest(input).into()
}

/// First four bytes of the Keccak-256 hash of a canonical function signature,
/// e.g. `updateProfileCID(string)`.
pub fn function_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn is_valid_address(address: &str) -> bool {
    match address.strip_prefix("0x") {
        Some(bare) => bare.len() == 40 && bare.chars().all(|ch| ch.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn parse_address(address: &str) -> Result<[u8; 20]> {
    if !is_valid_address(address) {
        bail!("invalid address: {address}");
    }
    let mut out = [0_u8; 20];
    hex::decode_to_slice(&address[2..], &mut out)
        .map_err(|err| anyhow!("invalid address {address}: {err}"))?;
    Ok(out)
}

/// EIP-55 mixed-case checksum encoding.
pub fn to_checksum_address(address: &str) -> Result<String> {
    if !is_valid_address(address) {
        bail!("invalid address: {address}");
    }

    let lower = address[2..].to_ascii_lowercase();
    let hash = keccak256(lower.as_bytes());

    let mut output = String::with_capacity(42);
    output.push_str("0x");
    for (index, ch) in lower.chars().enumerate() {
        let nibble = if index % 2 == 0 {
            hash[index / 2] >> 4
        } else {
            hash[index / 2] & 0x0f
        };
        if ch.is_ascii_alphabetic() && nibble >= 8 {
            output.push(ch.to_ascii_uppercase());
        } else {
            output.push(ch);
        }
    }
    Ok(output)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoverableSignature {
    pub r: [u8; 32],
    pub s: [u8; 32],
    pub recovery_id: u8,
}

pub trait Signer: Send + Sync {
    fn address(&self) -> String;
    fn sign_digest(&self, digest: &[u8; 32]) -> Result<RecoverableSignature>;
}

pub struct Secp256k1Signer {
    signing_key: SigningKey,
}

impl Secp256k1Signer {
    pub fn new_random() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    pub fn from_secret_key_bytes(mut secret_key: [u8; 32]) -> Result<Self> {
        let signing_key = SigningKey::from_slice(&secret_key)
            .map_err(|err| anyhow!("invalid secret key: {err}"));
        secret_key.zeroize();
        Ok(Self {
            signing_key: signing_key?,
        })
    }

    /// Parses a hex private key, with or without `0x`.
    pub fn from_hex(secret_key_hex: &str) -> Result<Self> {
        let trimmed = secret_key_hex.trim();
        let bare = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let mut decoded = hex::decode(bare).map_err(|_| anyhow!("private key must be hex"))?;
        if decoded.len() != 32 {
            decoded.zeroize();
            bail!("private key must be 32 bytes");
        }
        let mut secret_key = [0_u8; 32];
        secret_key.copy_from_slice(&decoded);
        decoded.zeroize();
        Self::from_secret_key_bytes(secret_key)
    }
}

impl Signer for Secp256k1Signer {
    fn address(&self) -> String {
        let point = self.signing_key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let lower = format!("0x{}", hex::encode(&hash[12..]));
        to_checksum_address(&lower).unwrap_or(lower)
    }

    fn sign_digest(&self, digest: &[u8; 32]) -> Result<RecoverableSignature> {
        let (signature, recovery_id) = self
            .signing_key
            .sign_prehash_recoverable(digest)
            .map_err(|err| anyhow!("signing failed: {err}"))?;

        let bytes = signature.to_bytes();
        let mut r = [0_u8; 32];
        let mut s = [0_u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);

        Ok(RecoverableSignature {
            r,
            s,
            recovery_id: recovery_id.to_byte(),
        })
    }
}

/// Pre-EIP-2718 transaction with EIP-155 replay protection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Option<[u8; 20]>,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    fn base_fields(&self) -> Vec<Vec<u8>> {
        vec![
            encode_uint(u128::from(self.nonce)),
            encode_uint(self.gas_price),
            encode_uint(u128::from(self.gas_limit)),
            encode_bytes(self.to.as_ref().map(|to| to.as_slice()).unwrap_or_default()),
            encode_uint(self.value),
            encode_bytes(&self.data),
        ]
    }

    pub fn signing_hash(&self) -> [u8; 32] {
        let mut fields = self.base_fields();
        fields.push(encode_uint(u128::from(self.chain_id)));
        fields.push(encode_uint(0));
        fields.push(encode_uint(0));
        keccak256(&encode_list(&fields))
    }

    /// Returns the raw signed transaction for `eth_sendRawTransaction`.
    pub fn sign(&self, signer: &dyn Signer) -> Result<Vec<u8>> {
        let signature = signer.sign_digest(&self.signing_hash())?;
        let v = u128::from(self.chain_id) * 2 + 35 + u128::from(signature.recovery_id);

        let mut fields = self.base_fields();
        fields.push(encode_uint(v));
        fields.push(encode_bytes(rlp::trim_leading_zeros(&signature.r)));
        fields.push(encode_bytes(rlp::trim_leading_zeros(&signature.s)));
        Ok(encode_list(&fields))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak_known_answers() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(hex::encode(function_selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn checksum_matches_eip55_vectors() {
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let lower = expected.to_ascii_lowercase();
            assert_eq!(to_checksum_address(&lower).unwrap(), expected);
        }
        assert!(to_checksum_address("0x1234").is_err());
    }

    #[test]
    fn address_validation() {
        assert!(is_valid_address("0x09Bc4E0D864854c6aFB6eB9A9cdF58aC190D0dF9"));
        assert!(!is_valid_address("09Bc4E0D864854c6aFB6eB9A9cdF58aC190D0dF9"));
        assert!(!is_valid_address("0x09Bc4E0D864854c6aFB6eB9A9cdF58aC190D0dZ9"));
        assert_eq!(parse_address("0x3535353535353535353535353535353535353535").unwrap(), [0x35; 20]);
    }

    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21_000,
            to: Some([0x35; 20]),
            value: 1_000_000_000_000_000_000,
            data: Vec::new(),
            chain_id: 1,
        }
    }

    #[test]
    fn eip155_signing_hash() {
        assert_eq!(
            hex::encode(eip155_example().signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn eip155_signed_transaction() {
        let signer = Secp256k1Signer::from_hex(
            "0x4646464646464646464646464646464646464646464646464646464646464646",
        )
        .unwrap();
        assert_eq!(signer.address(), "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F");

        let raw = eip155_example().sign(&signer).unwrap();
        assert_eq!(
            hex::encode(raw),
            "f86c098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a76400008025a028ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276a067cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
        );
    }

    #[test]
    fn rejects_malformed_private_keys() {
        assert!(Secp256k1Signer::from_hex("0x1234").is_err());
        assert!(Secp256k1Signer::from_hex("not-hex").is_err());
        assert!(Secp256k1Signer::from_secret_key_bytes([0_u8; 32]).is_err());
    }

    #[test]
    fn random_signers_have_checksummed_addresses() {
        let signer = Secp256k1Signer::new_random();
        let address = signer.address();
        assert!(is_valid_address(&address));
        assert_eq!(to_checksum_address(&address).unwrap(), address);
    }
}
