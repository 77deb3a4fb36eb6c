//! The `derivation` module derives the Cardano stake address for a candidate
//! phrase: entropy to Icarus master key, BIP32-Ed25519 derivation along the
//! stake path, and bech32 encoding of the reward address.
//!

use crate::{RecoveryError, RecoveryResult};
use bech32::{Bech32, Hrp};
use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};
use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::Scalar;
use hmac::{Hmac, Mac};
use sha2::Sha512;

/// HMAC-SHA512 is the pseudo-random function of the key derivation.
type HmacSha512 = Hmac<Sha512>;
/// BLAKE2b with a 28-byte digest hashes the stake key into the address.
type Blake2b224 = Blake2b<U28>;

/// The number of PBKDF2 iterations of the Icarus master key derivation.
const PBKDF2_ITERATIONS: u32 = 4096;
/// The size of the master key material: a 64-byte extended key plus a
/// 32-byte chain code.
const MASTER_KEY_SIZE: usize = 96;
/// The offset that marks an index as hardened.
const HARDENED: u32 = 0x8000_0000;
/// The derivation path of the first stake key: m/1852'/1815'/0'/2/0.
const STAKE_PATH: [u32; 5] = [1852 | HARDENED, 1815 | HARDENED, HARDENED, 2, 0];
/// The header byte of a mainnet reward address backed by a key hash.
const MAINNET_STAKE_HEADER: u8 = 0xE1;
/// The human-readable part of a mainnet stake address.
const STAKE_HRP: &str = "stake";

/// An extended private key together with its chain code.
struct ExtendedKey {
    /// The 64-byte extended key (scalar followed by the nonce extension).
    key: [u8; 64],
    /// The 32-byte chain code.
    chain_code: [u8; 32],
}

/// The function derives the Icarus master key from the given entropy.
///
/// The key material is produced by PBKDF2-HMAC-SHA512 with the passphrase as
/// the password and the entropy as the salt. The scalar half of the extended
/// key is clamped: the three lowest bits of the first byte are cleared, the
/// highest bit of the last byte is cleared, and the second-highest bit of
/// the last byte is set.
///
/// * `entropy` - The entropy encoded in the phrase.
/// * `passphrase` - The optional passphrase (empty by default).
fn master_key(entropy: &[u8], passphrase: &str) -> ExtendedKey {
    let mut output = [0u8; MASTER_KEY_SIZE];
    pbkdf2::pbkdf2::<HmacSha512>(
        passphrase.as_bytes(),
        entropy,
        PBKDF2_ITERATIONS,
        &mut output,
    );
    let mut key = [0u8; 64];
    key.copy_from_slice(&output[..64]);
    // Clamp the scalar half of the extended key.
    key[0] &= 0b1111_1000;
    key[31] &= 0b0111_1111;
    key[31] |= 0b0100_0000;
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&output[64..]);
    ExtendedKey { key, chain_code }
}

/// The function computes the Ed25519 public key of an extended key.
///
/// The scalar half is multiplied with the base point; no further clamping is
/// applied because the scalar is already clamped at derivation time.
///
/// * `scalar_bytes` - The 32-byte scalar half of the extended key.
fn public_key(scalar_bytes: &[u8]) -> [u8; 32] {
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(scalar_bytes);
    // Reducing modulo the group order does not change the product with the
    // base point.
    let scalar = Scalar::from_bytes_mod_order(bytes);
    EdwardsPoint::mul_base(&scalar).compress().to_bytes()
}

/// The function adds two 256-bit numbers in little-endian order, mod 2^256.
fn add_256(first: &[u8], second: &[u8; 32]) -> [u8; 32] {
    let mut sum = [0u8; 32];
    let mut carry = 0u16;
    for index in 0..32 {
        let value = first[index] as u16 + second[index] as u16 + carry;
        sum[index] = value as u8;
        carry = value >> 8;
    }
    sum
}

/// The function computes `scalar + 8 * z_left` mod 2^256.
///
/// Only the first 28 bytes of `z_left` are used, so the scaled value stays
/// well below the group order times eight.
///
/// * `scalar` - The 32-byte parent scalar, little-endian.
/// * `z_left` - The left half of the HMAC output.
fn add_left(scalar: &[u8], z_left: &[u8]) -> [u8; 32] {
    // Multiply the 28-byte value by eight, little-endian with carry.
    let mut scaled = [0u8; 32];
    let mut carry = 0u16;
    for index in 0..28 {
        let value = ((z_left[index] as u16) << 3) + carry;
        scaled[index] = value as u8;
        carry = value >> 8;
    }
    scaled[28] = carry as u8;
    add_256(scalar, &scaled)
}

/// The function derives a child key according to BIP32-Ed25519.
///
/// Hardened children are keyed with the extended private key (domain bytes
/// 0x00 and 0x01), soft children with the public key (domain bytes 0x02 and
/// 0x03); the index is appended in little-endian order. The child scalar is
/// `parent + 8 * Z_left`, the nonce extension is `parent + Z_right`, and the
/// chain code is the right half of the second HMAC.
///
/// * `parent` - The parent extended key.
/// * `index` - The child index; values with the highest bit set are hardened.
fn derive_child(parent: &ExtendedKey, index: u32) -> RecoveryResult<ExtendedKey> {
    let index_bytes = index.to_le_bytes();
    // The unwrap() calls are okay because HMAC-SHA512 accepts keys of any length.
    let mut z_mac = HmacSha512::new_from_slice(&parent.chain_code)
        .expect("HMAC-SHA512 accepts keys of any length.");
    let mut chain_mac = HmacSha512::new_from_slice(&parent.chain_code)
        .expect("HMAC-SHA512 accepts keys of any length.");
    if index >= HARDENED {
        z_mac.update(&[0x00]);
        z_mac.update(&parent.key);
        z_mac.update(&index_bytes);
        chain_mac.update(&[0x01]);
        chain_mac.update(&parent.key);
        chain_mac.update(&index_bytes);
    } else {
        let public = public_key(&parent.key[..32]);
        z_mac.update(&[0x02]);
        z_mac.update(&public);
        z_mac.update(&index_bytes);
        chain_mac.update(&[0x03]);
        chain_mac.update(&public);
        chain_mac.update(&index_bytes);
    }
    let z = z_mac.finalize().into_bytes();
    let chain = chain_mac.finalize().into_bytes();
    // Assemble the child key.
    let mut key = [0u8; 64];
    let child_scalar = add_left(&parent.key[..32], &z[..28]);
    key[..32].copy_from_slice(&child_scalar);
    let mut z_right = [0u8; 32];
    z_right.copy_from_slice(&z[32..]);
    key[32..].copy_from_slice(&add_256(&parent.key[32..], &z_right));
    let mut chain_code = [0u8; 32];
    chain_code.copy_from_slice(&chain[32..]);
    // The two bits that the clamping forces in the top byte (highest bit
    // clear, second-highest bit set) must survive the addition; a carry
    // that reaches them leaves a key outside the admissible range.
    if child_scalar[31] & 0b1100_0000 != 0b0100_0000 {
        return Err(RecoveryError::DerivationDegenerate);
    }
    Ok(ExtendedKey { key, chain_code })
}

/// The function derives the mainnet stake address for the given entropy.
///
/// The Icarus master key is derived from the entropy, the stake key is
/// derived along m/1852'/1815'/0'/2/0, and the address is the bech32
/// encoding of the header byte followed by the BLAKE2b-224 hash of the
/// stake public key.
///
/// * `entropy` - The entropy encoded in the phrase.
/// * `passphrase` - The optional passphrase (empty by default).
pub fn stake_address(entropy: &[u8], passphrase: &str) -> RecoveryResult<String> {
    // Derive the stake key along the fixed path.
    let mut node = master_key(entropy, passphrase);
    for index in STAKE_PATH.iter() {
        node = derive_child(&node, *index)?;
    }
    let public = public_key(&node.key[..32]);
    // The address payload is the header byte followed by the key hash.
    let mut payload = [0u8; 29];
    payload[0] = MAINNET_STAKE_HEADER;
    let hash = Blake2b224::digest(public);
    payload[1..].copy_from_slice(&hash);
    // The unwrap() calls are okay because the HRP is a constant and the
    // payload is far below the bech32 length limit.
    let hrp = Hrp::parse(STAKE_HRP).expect("The HRP constant is valid.");
    Ok(bech32::encode::<Bech32>(hrp, &payload)
        .expect("The address payload fits into a bech32 string."))
}

// ******************************** TESTS ********************************

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mnemonic::entropy_of;
    use crate::word_list::WordList;

    /// The function derives the stake address for a space-delimited phrase.
    ///
    /// * `phrase` - The phrase.
    /// * `passphrase` - The passphrase.
    fn address_of(phrase: &str, passphrase: &str) -> String {
        let list = WordList::default_english();
        let indices = list.indices_of_phrase(phrase).unwrap();
        assert!(crate::mnemonic::is_valid(&indices).unwrap());
        let entropy = entropy_of(&indices).unwrap();
        stake_address(&entropy, passphrase).unwrap()
    }

    /// This function tests the derivation of a stake address.
    ///
    /// * `phrase` - The phrase.
    /// * `expected_address` - The expected mainnet stake address.
    fn test_stake_address_vector(phrase: &str, expected_address: &str) {
        assert_eq!(address_of(phrase, ""), expected_address);
    }

    /// Macro rules for the stake address derivation tests.
    macro_rules! tests {
        ($([$phrase:expr, $address:expr]),*) => {
            #[test]
            fn test_stake_address_derivation() {
                $(
                    test_stake_address_vector($phrase, $address);
                )*
            }
        };
    }

    tests! {
        [
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art",
            "stake1u8p0gksk5e59v9h9vmqqlsyplevl30t6keu7u90fecsrg3sv33m94"
        ],
        [
            "all hour make first leader extend hole alien behind guard gospel lava path output census museum junior mass reopen famous sing advance salt reform",
            "stake1uyg3rhqqr2rqm76e8n3pq5lxq6ahxk3qrjhuxzet8p6zpsshnxn0z"
        ],
        [
            "legal winner thank year wave sausage worth useful legal winner thank yellow",
            "stake1uxt3ftd4ukkgvug2zexsr5ma2faudqzl6lnl9r0qerztyng03eqjr"
        ],
        [
            "ladder long kangaroo inherit unknown prize else second enter addict mystery valve riot attitude area blind fabric symbol skill sunset goose shock gasp grape",
            "stake1u9t04dtwptk5776eluj6ruyd782k66npnf55tdrp6dvwnzs24r8yq"
        ]
    }

    #[test]
    /// The function tests that the passphrase changes the derived address.
    fn test_passphrase() {
        let phrase = "legal winner thank year wave sausage worth useful legal winner thank yellow";
        assert_eq!(
            address_of(phrase, "TREZOR"),
            "stake1ux5ke0fp2gz04q7r5p4jt042293ljsyg52dqps7xnvsfhfg0cnyvd"
        );
        assert_ne!(address_of(phrase, "TREZOR"), address_of(phrase, ""));
    }

    #[test]
    /// The function tests that the derivation is deterministic.
    fn test_determinism() {
        let entropy = [0x42u8; 32];
        let first = stake_address(&entropy, "").unwrap();
        let second = stake_address(&entropy, "").unwrap();
        assert_eq!(first, second);
        assert!(first.starts_with("stake1"));
    }

    #[test]
    /// The function tests the shape of the derived address.
    fn test_address_shape() {
        let entropy = [0u8; 16];
        let address = stake_address(&entropy, "").unwrap();
        // 'stake1' plus 47 data characters plus the 6-character checksum.
        assert_eq!(address.len(), 59);
        assert!(address.starts_with("stake1"));
    }
}
