// Copyright 2019 Stichting Organism
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-signer Schnorr signatures.
//!
//! The signing equation is `s = e * x + k` with `e` the SHA3-256 challenge
//! digest over public key, commitment and message, reduced mod the group
//! order. The same `(challenge, solution)` pair also carries the output of
//! the aggregation protocol.

use sha3::{Digest, Sha3_256};
use zeroize::Zeroize;

use crate::errors::AggregateError;
use crate::point::{Point, COMPRESSED_POINT_LENGTH};
use crate::scalar::{Scalar, SCALAR_LENGTH};

/// Wire tag for a plain single-signer signature.
pub const SIGNATURE_TAG: u8 = 0x41;

/// Wire tag for an aggregate signature.
pub const AGGREGATE_SIGNATURE_TAG: u8 = 0x18;

/// Byte length of the compact form: tag, compressed challenge, solution.
pub const COMPACT_SIGNATURE_LENGTH: usize = 1 + COMPRESSED_POINT_LENGTH + SCALAR_LENGTH;

// Base58 character counts are fixed because both known tags are non-zero:
// a 66-byte compact payload is always 90 characters, a 70-byte checked
// payload always 96.
const BASE58_PLAIN_LENGTH: usize = 90;
const BASE58_CHECK_LENGTH: usize = 96;

/// A Schnorr signature `(R, s)` with the implied public key and message
/// it was made over. Only the challenge and solution are ever serialized;
/// verifiers supply the other two out of band.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SchnorrSignature {
    /// The nonce commitment `R = k * G`.
    pub challenge: Point,
    /// The response `s`.
    pub solution: Scalar,
    /// Implied: the signer's public key.
    pub public_key: Point,
    /// Implied: the signed message.
    pub message: Vec<u8>,
}

/// The challenge digest `e`: SHA3-256 over compressed public key,
/// compressed commitment and message, reduced mod the group order.
pub(crate) fn challenge_digest(public_key: &[u8], commitment: &[u8], message: &[u8]) -> Scalar {
    let mut hasher = Sha3_256::new();
    hasher.update(public_key);
    hasher.update(commitment);
    hasher.update(message);
    Scalar::from_bytes_reduced(hasher.finalize().into())
}

impl SchnorrSignature {
    /// Signs `message` with `secret`. A fresh random nonce is drawn unless
    /// the caller supplies one; a supplied nonce must be non-zero.
    pub fn sign(
        secret: &Scalar,
        message: &[u8],
        nonce: Option<Scalar>,
    ) -> Result<SchnorrSignature, AggregateError> {
        let nonce = match nonce {
            Some(n) if n.is_zero() => return Err(AggregateError::BadNonce),
            Some(n) => n,
            None => Scalar::generate_secure(),
        };
        let public_key = secret
            .compute_public_key()
            .map_err(|_| AggregateError::ZeroScalar {
                context: "signing with a secret key",
            })?;
        let challenge = nonce.compute_public_key()?;
        let digest = challenge_digest(
            &public_key.serialize_compressed()?,
            &challenge.serialize_compressed()?,
            message,
        );
        let solution = digest.multiply(secret).add(&nonce);
        Ok(SchnorrSignature {
            challenge,
            solution,
            public_key,
            message: message.to_vec(),
        })
    }

    /// Checks `s * G == R + e * P` over the implied public key and
    /// message. Never panics: structurally bad signatures simply fail.
    pub fn verify(&self) -> bool {
        let public_bytes = match self.public_key.serialize_compressed() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let challenge_bytes = match self.challenge.serialize_compressed() {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let digest = challenge_digest(&public_bytes, &challenge_bytes, &self.message);
        let left = match self.solution.compute_public_key() {
            Ok(point) => point,
            Err(_) => return false,
        };
        let right = match self
            .public_key
            .exponentiate(&digest)
            .and_then(|point| point.combine(&self.challenge))
        {
            Ok(point) => point,
            Err(_) => return false,
        };
        left == right
    }

    /// The 66-byte compact form with the plain signature tag.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AggregateError> {
        self.to_bytes_with_tag(SIGNATURE_TAG)
    }

    /// The 66-byte compact form with an explicit tag byte.
    pub fn to_bytes_with_tag(&self, tag: u8) -> Result<Vec<u8>, AggregateError> {
        let mut out = Vec::with_capacity(COMPACT_SIGNATURE_LENGTH);
        out.push(tag);
        out.extend_from_slice(&self.challenge.serialize_compressed()?);
        out.extend_from_slice(&self.solution.to_bytes());
        Ok(out)
    }

    /// Parses the compact form. The implied public key and message are
    /// left unset for the caller to supply.
    pub fn from_bytes(bytes: &[u8]) -> Result<SchnorrSignature, AggregateError> {
        if bytes.len() != COMPACT_SIGNATURE_LENGTH {
            return Err(AggregateError::BytesLength {
                expected: COMPACT_SIGNATURE_LENGTH,
                actual: bytes.len(),
                context: "decoding a compact signature",
            });
        }
        if bytes[0] != SIGNATURE_TAG && bytes[0] != AGGREGATE_SIGNATURE_TAG {
            return Err(AggregateError::BadTag { actual: bytes[0] });
        }
        let challenge = Point::parse_at(bytes, 1)?;
        let solution = Scalar::from_bytes_at(bytes, 1 + COMPRESSED_POINT_LENGTH)?;
        Ok(SchnorrSignature {
            challenge,
            solution,
            public_key: Point::default(),
            message: Vec::new(),
        })
    }

    /// Plain base58 over the compact form.
    pub fn to_base58(&self) -> Result<String, AggregateError> {
        Ok(bs58::encode(self.to_bytes()?).into_string())
    }

    /// Base58check (4-byte double-SHA256 checksum) over the compact form.
    pub fn to_base58_check(&self) -> Result<String, AggregateError> {
        let mut payload = self.to_bytes()?;
        let encoded = bs58::encode(&payload).with_check().into_string();
        payload.zeroize();
        Ok(encoded)
    }

    /// Parses the plain base58 form.
    pub fn from_base58(input: &str) -> Result<SchnorrSignature, AggregateError> {
        let raw = bs58::decode(input)
            .into_vec()
            .map_err(|_| AggregateError::Base58Decode {
                input: input.to_string(),
            })?;
        SchnorrSignature::from_bytes(&raw)
    }

    /// Parses the base58check form, verifying the checksum.
    pub fn from_base58_check(input: &str) -> Result<SchnorrSignature, AggregateError> {
        let raw = bs58::decode(input)
            .with_check(None)
            .into_vec()
            .map_err(|_| AggregateError::Base58ChecksumDecode {
                input: input.to_string(),
            })?;
        SchnorrSignature::from_bytes(&raw)
    }

    /// Detects which base58 form a signature string carries by its
    /// character count, which the fixed payload sizes pin down exactly.
    pub fn from_base58_auto(input: &str) -> Result<SchnorrSignature, AggregateError> {
        match input.len() {
            BASE58_PLAIN_LENGTH => SchnorrSignature::from_base58(input),
            BASE58_CHECK_LENGTH => SchnorrSignature::from_base58_check(input),
            length => Err(AggregateError::UnrecognizedFormat {
                input: input.to_string(),
                length,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_signature() -> SchnorrSignature {
        SchnorrSignature::sign(&Scalar::from_u32(90210), b"attack at dawn", None).unwrap()
    }

    #[test]
    fn sign_and_verify() {
        let signature = test_signature();
        assert!(signature.verify());
    }

    #[test]
    fn sign_reports_success_with_an_explicit_nonce() {
        let signature =
            SchnorrSignature::sign(&Scalar::from_u32(7), b"msg", Some(Scalar::from_u32(11)))
                .unwrap();
        assert!(signature.verify());
        // Deterministic with a fixed nonce.
        let again =
            SchnorrSignature::sign(&Scalar::from_u32(7), b"msg", Some(Scalar::from_u32(11)))
                .unwrap();
        assert_eq!(signature.to_bytes().unwrap(), again.to_bytes().unwrap());
    }

    #[test]
    fn zero_inputs_are_rejected() {
        assert!(matches!(
            SchnorrSignature::sign(&Scalar::from_u32(7), b"msg", Some(Scalar::ZERO)),
            Err(AggregateError::BadNonce)
        ));
        assert!(SchnorrSignature::sign(&Scalar::ZERO, b"msg", None).is_err());
    }

    #[test]
    fn tampering_breaks_verification() {
        let signature = test_signature();

        let mut wrong_message = signature.clone();
        wrong_message.message = b"attack at dusk".to_vec();
        assert!(!wrong_message.verify());

        let mut wrong_key = signature.clone();
        wrong_key.public_key = Scalar::from_u32(4).compute_public_key().unwrap();
        assert!(!wrong_key.verify());

        let mut wrong_solution = signature;
        wrong_solution.solution = wrong_solution.solution.add(&Scalar::from_u32(1));
        assert!(!wrong_solution.verify());
    }

    #[test]
    fn unset_members_fail_closed() {
        let unset = SchnorrSignature::default();
        assert!(!unset.verify());
    }

    #[test]
    fn compact_round_trip() {
        let signature = test_signature();
        let bytes = signature.to_bytes().unwrap();
        assert_eq!(bytes.len(), COMPACT_SIGNATURE_LENGTH);
        assert_eq!(bytes[0], SIGNATURE_TAG);

        let mut parsed = SchnorrSignature::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.challenge, signature.challenge);
        assert_eq!(parsed.solution, signature.solution);

        // Verifies once the implied members are restored.
        parsed.public_key = signature.public_key;
        parsed.message = signature.message.clone();
        assert!(parsed.verify());

        let tagged = signature.to_bytes_with_tag(AGGREGATE_SIGNATURE_TAG).unwrap();
        assert_eq!(tagged[0], AGGREGATE_SIGNATURE_TAG);
        assert!(SchnorrSignature::from_bytes(&tagged).is_ok());
    }

    #[test]
    fn unknown_tags_and_bad_lengths_are_rejected() {
        let mut bytes = test_signature().to_bytes().unwrap();
        bytes[0] = 0x99;
        assert!(matches!(
            SchnorrSignature::from_bytes(&bytes),
            Err(AggregateError::BadTag { actual: 0x99 })
        ));
        assert!(SchnorrSignature::from_bytes(&bytes[..65]).is_err());
    }

    #[test]
    fn base58_round_trips_and_auto_detection() {
        let signature = test_signature();

        let plain = signature.to_base58().unwrap();
        assert_eq!(plain.len(), BASE58_PLAIN_LENGTH);
        let checked = signature.to_base58_check().unwrap();
        assert_eq!(checked.len(), BASE58_CHECK_LENGTH);

        for parsed in [
            SchnorrSignature::from_base58(&plain).unwrap(),
            SchnorrSignature::from_base58_check(&checked).unwrap(),
            SchnorrSignature::from_base58_auto(&plain).unwrap(),
            SchnorrSignature::from_base58_auto(&checked).unwrap(),
        ] {
            assert_eq!(parsed.challenge, signature.challenge);
            assert_eq!(parsed.solution, signature.solution);
        }

        assert!(matches!(
            SchnorrSignature::from_base58_auto("tooshort"),
            Err(AggregateError::UnrecognizedFormat { .. })
        ));
    }
}
