//! The `mnemonic` module provides the conversion between word indices and the
//! BIP-0039 bitstream as well as the checksum validation.
//!

use crate::{RecoveryError, RecoveryResult};
use sha2::{Digest, Sha256};

/// The number of bits that each word represents.
pub const NUM_BITS_PER_WORD: usize = 11;
/// The increase in the number of entropy bits from one phrase length to the next.
const ENTROPY_INCREMENT: usize = 32;

/// The legal phrase lengths.
pub const PHRASE_LENGTHS: [usize; 5] = [12, 15, 18, 21, 24];

/// The function returns true if the given number of words is a legal phrase length.
pub fn is_legal_length(num_words: usize) -> bool {
    PHRASE_LENGTHS.contains(&num_words)
}

/// The function returns the number of entropy bits for the given phrase length.
///
/// The number of entropy bits is the total number of bits rounded down to the
/// nearest multiple of `ENTROPY_INCREMENT`.
pub fn num_entropy_bits(num_words: usize) -> usize {
    ((num_words * NUM_BITS_PER_WORD) / ENTROPY_INCREMENT) * ENTROPY_INCREMENT
}

/// The function returns the number of checksum bits for the given phrase length.
pub fn num_checksum_bits(num_words: usize) -> usize {
    num_words * NUM_BITS_PER_WORD - num_entropy_bits(num_words)
}

/// The function returns an `InvalidLength` error for an illegal phrase length.
fn ensure_legal_length(num_words: usize) -> RecoveryResult<()> {
    if is_legal_length(num_words) {
        Ok(())
    } else {
        Err(RecoveryError::InvalidLength(format!(
            "The number of words must be 12, 15, 18, 21, or 24 (got {}).",
            num_words
        )))
    }
}

/// The function encodes the given indices in a byte array.
///
/// The indices are packed big-endian, 11 bits per index. The bits flow
/// through a small accumulator that emits a byte whenever eight bits are
/// pending; the last byte, if incomplete, is padded with zero bits.
///
/// * `indices` - The array of word indices.
pub fn bytes_from_indices(indices: &[u16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity((indices.len() * NUM_BITS_PER_WORD + 7) / 8);
    // The pending bits, kept at the low end of the accumulator.
    let mut accumulator: u32 = 0;
    let mut pending_bits = 0;
    for index in indices {
        // Append the bits of the index behind the pending bits.
        accumulator = (accumulator << NUM_BITS_PER_WORD) | u32::from(*index);
        pending_bits += NUM_BITS_PER_WORD;
        // Emit every complete byte, most significant bits first.
        while pending_bits >= 8 {
            pending_bits -= 8;
            bytes.push((accumulator >> pending_bits) as u8);
        }
        accumulator &= (1 << pending_bits) - 1;
    }
    // Pad the left-over bits with zeros to fill the last byte.
    if pending_bits > 0 {
        bytes.push((accumulator << (8 - pending_bits)) as u8);
    }
    bytes
}

/// The function returns the indices encoded in the given byte array.
///
/// The inverse of [bytes_from_indices](crate::mnemonic::bytes_from_indices):
/// the bytes flow through the accumulator and an index is extracted whenever
/// eleven bits are pending.
///
/// * `bytes` - The given byte array.
/// * `num_words` - The number of encoded words.
pub fn indices_from_bytes(bytes: &[u8], num_words: usize) -> RecoveryResult<Vec<u16>> {
    let mut indices = Vec::with_capacity(num_words);
    let mut accumulator: u32 = 0;
    let mut pending_bits = 0;
    for byte in bytes {
        // Append the byte behind the pending bits.
        accumulator = (accumulator << 8) | u32::from(*byte);
        pending_bits += 8;
        // A single byte never completes more than one index, because an
        // index is wider than a byte.
        if pending_bits >= NUM_BITS_PER_WORD {
            pending_bits -= NUM_BITS_PER_WORD;
            indices.push((accumulator >> pending_bits) as u16);
            accumulator &= (1 << pending_bits) - 1;
            if indices.len() == num_words {
                return Ok(indices);
            }
        }
    }
    Err(RecoveryError::InvalidLength(
        "Error parsing word indices from byte array.".to_string(),
    ))
}

/// The function checks the BIP-0039 checksum of the given word indices.
///
/// The indices are packed into a bitstream, the stream is split into entropy
/// and checksum, and the checksum bits are compared against the leading bits
/// of the SHA-256 hash of the entropy.
///
/// * `indices` - The word indices of the phrase.
pub fn is_valid(indices: &[u16]) -> RecoveryResult<bool> {
    ensure_legal_length(indices.len())?;
    // Convert the indices into a byte array.
    let bytes = bytes_from_indices(indices);
    // The number of entropy bytes is a multiple of 32 bits = 4 bytes.
    let num_entropy_bytes = (bytes.len() >> 2) << 2;
    // Compute the SHA-256 hash of the entropy bytes.
    let mut hasher = Sha256::new();
    hasher.update(&bytes[..num_entropy_bytes]);
    let hash = hasher.finalize();
    // The number of hash bits that are used as the checksum.
    let num_hash_bits = num_checksum_bits(indices.len());
    let num_zero_bits = 8 - num_hash_bits;
    // Set the unused bits to zero.
    let hash_byte = (hash[0] >> num_zero_bits) << num_zero_bits;
    // The phrase is valid if the checksum bits match the left-over byte.
    // The trailing bits of the packed stream are zero by construction.
    Ok(hash_byte == bytes[num_entropy_bytes])
}

/// The function extracts the entropy encoded in the given word indices.
///
/// The entropy consists of the leading bits of the packed bitstream; the
/// checksum is not verified here.
///
/// * `indices` - The word indices of the phrase.
pub fn entropy_of(indices: &[u16]) -> RecoveryResult<Vec<u8>> {
    ensure_legal_length(indices.len())?;
    let bytes = bytes_from_indices(indices);
    let num_entropy_bytes = (bytes.len() >> 2) << 2;
    Ok(bytes[..num_entropy_bytes].to_vec())
}

/// The function encodes the given entropy as word indices.
///
/// The SHA-256 checksum is computed and appended to the entropy, and the
/// resulting bitstream is split into 11-bit indices.
///
/// * `entropy` - The entropy bytes.
pub fn mnemonic_of(entropy: &[u8]) -> RecoveryResult<Vec<u16>> {
    // The number of words that encode the entropy plus the checksum.
    let num_words = ((entropy.len() << 3) + NUM_BITS_PER_WORD - 1) / NUM_BITS_PER_WORD;
    ensure_legal_length(num_words)?;
    let total_num_bits = num_words * NUM_BITS_PER_WORD;
    // Compute the SHA-256 hash of the entropy.
    let mut hasher = Sha256::new();
    hasher.update(entropy);
    let hash = hasher.finalize();
    // Prepare the byte array holding the entropy with the checksum appended.
    let mut encoded = vec![0; (total_num_bits + 7) >> 3];
    encoded[..entropy.len()].clone_from_slice(entropy);
    // The checksum is at most 8 bits, so appending the first hash byte suffices.
    encoded[entropy.len()] = hash[0];
    // Retrieve the indices from the byte array.
    indices_from_bytes(&encoded, num_words)
}

// ******************************** TESTS ********************************

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word_list::WordList;
    use std::error::Error;

    /// The function converts a hex string into a series of bytes.
    ///
    /// * `input` - The input in the form of a hex string.
    fn decode_hex_bytes(input: &str) -> Result<Vec<u8>, Box<dyn Error>> {
        if input.len() % 2 != 0 {
            Err("Error decoding hex string: The input length is not a multiple of 2.".into())
        } else {
            (0..input.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&input[i..i + 2], 16).map_err(|e| e.into()))
                .collect()
        }
    }

    #[test]
    /// The function tests the bit packing against hand-computed examples.
    ///
    /// The indices 3 and 1027 are 00000000011 and 10000000011 in binary.
    /// Concatenating the 22 bits and padding with two zero bits gives the
    /// bytes 0x00, 0x70, and 0x0c.
    fn test_index_packing() {
        let indices: Vec<u16> = vec![3, 1027];
        let packed = bytes_from_indices(&indices);
        assert_eq!(packed, vec![0x00, 0x70, 0x0c]);
        assert_eq!(indices_from_bytes(&packed, 2).unwrap(), indices);
        // A longer sequence with boundary values round-trips as well.
        let indices: Vec<u16> = vec![1948, 17, 2047, 0, 1024];
        let packed = bytes_from_indices(&indices);
        assert_eq!(packed, vec![0xf3, 0x80, 0x47, 0xff, 0x80, 0x08, 0x00]);
        assert_eq!(indices_from_bytes(&packed, 5).unwrap(), indices);
        // A byte array that is too short is rejected.
        assert!(indices_from_bytes(&[0x00], 1).is_err());
    }

    #[test]
    /// The function tests the entropy and checksum bit counts.
    fn test_bit_counts() {
        assert_eq!(num_entropy_bits(12), 128);
        assert_eq!(num_entropy_bits(15), 160);
        assert_eq!(num_entropy_bits(18), 192);
        assert_eq!(num_entropy_bits(21), 224);
        assert_eq!(num_entropy_bits(24), 256);
        assert_eq!(num_checksum_bits(12), 4);
        assert_eq!(num_checksum_bits(24), 8);
    }

    #[test]
    /// The function tests that illegal lengths are rejected.
    fn test_illegal_length() {
        let indices = vec![0u16; 13];
        assert!(is_valid(&indices).is_err());
        assert!(entropy_of(&indices).is_err());
        assert!(mnemonic_of(&[0u8; 17]).is_err());
    }

    #[test]
    /// The function tests the checksum against the all-zero entropy phrase.
    ///
    /// The phrase ending in 'about' encodes the all-zero entropy; replacing
    /// the last word with 'abandon' breaks the checksum.
    fn test_zero_entropy_checksum() {
        let list = WordList::default_english();
        let valid = list
            .indices_of_phrase(
                "abandon abandon abandon abandon abandon abandon \
                 abandon abandon abandon abandon abandon about",
            )
            .unwrap();
        assert!(is_valid(&valid).unwrap());
        let invalid = vec![0u16; 12];
        assert!(!is_valid(&invalid).unwrap());
    }

    /// This function tests the conversion from entropy to a phrase and back.
    ///
    /// * `hex_entropy` - The entropy as a hex string.
    /// * `phrase` - The corresponding phrase.
    fn test_mnemonic_conversion_vector(hex_entropy: &str, phrase: &str) {
        let list = WordList::default_english();
        // Obtain the entropy bytes from the hexadecimal encoding.
        let entropy = decode_hex_bytes(hex_entropy).unwrap();
        // Encode the entropy as word indices.
        let indices = mnemonic_of(&entropy).unwrap();
        // Assert that the encoded phrase matches the test vector.
        assert_eq!(list.phrase_of_indices(&indices), phrase);
        // Assert that the phrase satisfies the checksum.
        assert!(is_valid(&indices).unwrap());
        // Assert that the entropy round-trips.
        assert_eq!(entropy_of(&indices).unwrap(), entropy);
        // Assert that the phrase parses back to the same indices.
        assert_eq!(list.indices_of_phrase(phrase).unwrap(), indices);
    }

    /// Macro rules for the mnemonic conversion tests.
    macro_rules! tests {
        ($([$hex_entropy:expr, $phrase:expr]),*) => {
            #[test]
            fn test_mnemonic_conversion() {
                $(
                    test_mnemonic_conversion_vector($hex_entropy, $phrase);
                )*
            }
        };
    }

    tests! {
        // The mnemonic test vectors have been copied from this URL:
        // https://github.com/trezor/python-mnemonic/blob/master/vectors.json
        [
            "00000000000000000000000000000000",
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about"
        ],
        [
            "7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f",
            "legal winner thank year wave sausage worth useful legal winner thank yellow"
        ],
        [
            "80808080808080808080808080808080",
            "letter advice cage absurd amount doctor acoustic avoid letter advice cage above"
        ],
        [
            "ffffffffffffffffffffffffffffffff",
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong"
        ],
        [
            "000000000000000000000000000000000000000000000000",
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon agent"
        ],
        [
            "7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f",
            "legal winner thank year wave sausage worth useful legal winner thank year wave sausage worth useful legal will"
        ],
        [
            "808080808080808080808080808080808080808080808080",
            "letter advice cage absurd amount doctor acoustic avoid letter advice cage absurd amount doctor acoustic avoid letter always"
        ],
        [
            "ffffffffffffffffffffffffffffffffffffffffffffffff",
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo when"
        ],
        [
            "0000000000000000000000000000000000000000000000000000000000000000",
            "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon art"
        ],
        [
            "7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f7f",
            "legal winner thank year wave sausage worth useful legal winner thank year wave sausage worth useful legal winner thank year wave sausage worth title"
        ],
        [
            "8080808080808080808080808080808080808080808080808080808080808080",
            "letter advice cage absurd amount doctor acoustic avoid letter advice cage absurd amount doctor acoustic avoid letter advice cage absurd amount doctor acoustic bless"
        ],
        [
            "ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff",
            "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo vote"
        ],
        [
            "9e885d952ad362caeb4efe34a8e91bd2",
            "ozone drill grab fiber curtain grace pudding thank cruise elder eight picnic"
        ],
        [
            "6610b25967cdcca9d59875f5cb50b0ea75433311869e930b",
            "gravity machine north sort system female filter attitude volume fold club stay feature office ecology stable narrow fog"
        ],
        [
            "68a79eaca2324873eacc50cb9c6eca8cc68ea5d936f98787c60c7ebc74e6ce7c",
            "hamster diagram private dutch cause delay private meat slide toddler razor book happy fancy gospel tennis maple dilemma loan word shrug inflict delay length"
        ],
        [
            "c0ba5a8e914111210f2bd131f3d5e08d",
            "scheme spot photo card baby mountain device kick cradle pact join borrow"
        ],
        [
            "6d9be1ee6ebd27a258115aad99b7317b9c8d28b6d76431c3",
            "horn tenant knee talent sponsor spell gate clip pulse soap slush warm silver nephew swap uncle crack brave"
        ],
        [
            "9f6a2878b2520799a44ef18bc7df394e7061a224d2c33cd015b157d746869863",
            "panda eyebrow bullet gorilla call smoke muffin taste mesh discover soft ostrich alcohol speed nation flash devote level hobby quick inner drive ghost inside"
        ],
        [
            "23db8160a31d3e0dca3688ed941adbf3",
            "cat swing flag economy stadium alone churn speed unique patch report train"
        ],
        [
            "8197a4a47f0425faeaa69deebc05ca29c0a5b5cc76ceacc0",
            "light rule cinnamon wrap drastic word pride squirrel upgrade then income fatal apart sustain crack supply proud access"
        ],
        [
            "066dca1a2bb7e8a1db2832148ce9933eea0f3ac9548d793112d9a95c9407efad",
            "all hour make first leader extend hole alien behind guard gospel lava path output census museum junior mass reopen famous sing advance salt reform"
        ],
        [
            "f30f8c1da665478f49b001d94c5fc452",
            "vessel ladder alter error federal sibling chat ability sun glass valve picture"
        ],
        [
            "c10ec20dc3cd9f652c7fac2f1230f7a3c828389a14392f05",
            "scissors invite lock maple supreme raw rapid void congress muscle digital elegant little brisk hair mango congress clump"
        ],
        [
            "f585c11aec520db57dd353c69554b21a89b20fb0650966fa0a9d6f74fd989d8f",
            "void come effort suffer camp survey warrior heavy shoot primary clutch crush open amazing screen patrol group space point ten exist slush involve unfold"
        ]
    }
}
