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

//! Wire encodings of aggregate signatures.
//!
//! Three nested forms:
//!
//! - **compact**, 66 bytes: tag, compressed aggregate commitment,
//!   aggregate solution. Implies that every registered signer committed.
//! - **uncompressed**, 98 bytes: compact plus the 32-byte
//!   committed-signer bitmap. This is the only form that belongs in
//!   durable data: the bitmap is covered by nothing, so any other form
//!   can be re-encoded by a third party and replayed.
//! - **complete**, 133 to 8546 bytes: uncompressed plus a two-byte
//!   big-endian key count and the sorted compressed signer keys, enough
//!   to verify with no other context.

use crate::bitmap::{SignerBitmap, BITMAP_LENGTH, MAX_SIGNERS};
use crate::errors::AggregateError;
use crate::point::{Point, COMPRESSED_POINT_LENGTH};
use crate::schnorr::{SchnorrSignature, AGGREGATE_SIGNATURE_TAG, COMPACT_SIGNATURE_LENGTH};
use crate::session::{AggregationSession, VerificationOutcome};

/// Byte length of the uncompressed form: compact signature plus bitmap.
pub const UNCOMPRESSED_SIGNATURE_LENGTH: usize = COMPACT_SIGNATURE_LENGTH + BITMAP_LENGTH;

/// Smallest well-formed complete encoding: one registered signer.
pub const COMPLETE_SIGNATURE_MIN_LENGTH: usize =
    UNCOMPRESSED_SIGNATURE_LENGTH + 2 + COMPRESSED_POINT_LENGTH;

/// Largest well-formed complete encoding: 256 registered signers.
pub const COMPLETE_SIGNATURE_MAX_LENGTH: usize =
    UNCOMPRESSED_SIGNATURE_LENGTH + 2 + COMPRESSED_POINT_LENGTH * MAX_SIGNERS;

impl AggregationSession {
    /// The 98-byte uncompressed form of the held aggregate signature.
    pub fn serialize_uncompressed(&self) -> Result<Vec<u8>, AggregateError> {
        let mut out = self.signature.to_bytes_with_tag(AGGREGATE_SIGNATURE_TAG)?;
        out.extend_from_slice(&self.committed_signers.serialize());
        Ok(out)
    }

    /// The self-contained complete form: uncompressed signature, key
    /// count, sorted compressed keys.
    pub fn serialize_complete(&self) -> Result<Vec<u8>, AggregateError> {
        let count = self.all_public_keys.len();
        if count == 0 {
            return Err(AggregateError::NoRegisteredKeys);
        }
        let mut out = self.serialize_uncompressed()?;
        out.reserve(2 + count * COMPRESSED_POINT_LENGTH);
        out.extend_from_slice(&(count as u16).to_be_bytes());
        for key in self.public_keys() {
            out.extend_from_slice(&key.serialize_compressed()?);
        }
        Ok(out)
    }

    /// Parses the compact or uncompressed form into this session, which
    /// must already hold the registered keys. A 66-byte compact input
    /// means every registered signer committed; a 98-byte input carries
    /// an explicit bitmap, rejected if it marks signers beyond the
    /// registered set.
    pub fn parse_uncompressed(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
        let signer_count = self.public_keys().len();
        if signer_count == 0 {
            return Err(AggregateError::NoRegisteredKeys);
        }
        let (signature, bitmap) = match bytes.len() {
            COMPACT_SIGNATURE_LENGTH => (
                SchnorrSignature::from_bytes(bytes)?,
                SignerBitmap::all_committed(signer_count)?,
            ),
            UNCOMPRESSED_SIGNATURE_LENGTH => (
                SchnorrSignature::from_bytes(&bytes[..COMPACT_SIGNATURE_LENGTH])?,
                SignerBitmap::deserialize(&bytes[COMPACT_SIGNATURE_LENGTH..], signer_count)?,
            ),
            actual => {
                return Err(AggregateError::BytesLength {
                    expected: UNCOMPRESSED_SIGNATURE_LENGTH,
                    actual,
                    context: "decoding an uncompressed aggregate signature",
                })
            }
        };
        self.signature = signature;
        self.committed_signers = bitmap;
        Ok(())
    }

    /// Parses a standalone key-list segment (count plus compressed keys)
    /// and registers the keys in this session.
    pub fn parse_public_keys(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
        if bytes.len() < 2 {
            return Err(AggregateError::BytesLength {
                expected: 2,
                actual: bytes.len(),
                context: "decoding a public key list",
            });
        }
        let count = u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
        let expected = 2 + count * COMPRESSED_POINT_LENGTH;
        if bytes.len() != expected {
            return Err(AggregateError::BytesLength {
                expected,
                actual: bytes.len(),
                context: "decoding a public key list",
            });
        }
        let mut keys = Vec::with_capacity(count);
        for index in 0..count {
            keys.push(Point::parse_at(bytes, 2 + index * COMPRESSED_POINT_LENGTH)?);
        }
        self.initialize_public_keys(&keys)
    }

    /// Parses the complete form, leaving this session ready to verify
    /// once the caller supplies the message.
    pub fn parse_complete(&mut self, bytes: &[u8]) -> Result<(), AggregateError> {
        if bytes.len() < COMPLETE_SIGNATURE_MIN_LENGTH
            || bytes.len() > COMPLETE_SIGNATURE_MAX_LENGTH
        {
            return Err(AggregateError::BytesLength {
                expected: COMPLETE_SIGNATURE_MIN_LENGTH,
                actual: bytes.len(),
                context: "decoding a complete aggregate signature",
            });
        }
        self.parse_public_keys(&bytes[UNCOMPRESSED_SIGNATURE_LENGTH..])?;
        self.parse_uncompressed(&bytes[..UNCOMPRESSED_SIGNATURE_LENGTH])
    }
}

/// Verifies a complete-form aggregate signature against `message`.
/// Malformed input rejects with a reason rather than failing.
pub fn verify_from_complete(
    bytes: &[u8],
    message: &[u8],
    want_details: bool,
) -> VerificationOutcome {
    let mut session = AggregationSession::new(false, false);
    if let Err(error) = session.parse_complete(bytes) {
        return VerificationOutcome::rejected(error.to_string());
    }
    session.set_message(message);
    session.verify(want_details)
}

/// Verifies a compact- or uncompressed-form signature against `message`
/// and an explicit set of registered signer keys.
pub fn verify_message_signature_public_keys(
    message: &[u8],
    signature: &[u8],
    public_keys: &[Point],
    want_details: bool,
) -> VerificationOutcome {
    let mut session = AggregationSession::new(false, false);
    if let Err(error) = session.initialize_public_keys(public_keys) {
        return VerificationOutcome::rejected(error.to_string());
    }
    if let Err(error) = session.parse_uncompressed(signature) {
        return VerificationOutcome::rejected(error.to_string());
    }
    session.set_message(message);
    session.verify(want_details)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Scalar;

    /// Drives a whole ceremony and returns the aggregator holding the
    /// final signature, plus the registered keys.
    fn aggregated_session(
        count: usize,
        committed: &[bool],
        message: &[u8],
    ) -> (AggregationSession, Vec<Point>) {
        let mut signers: Vec<AggregationSession> = (0..count)
            .map(|i| {
                AggregationSession::with_secret_key(false, Scalar::from_u32(2001 + 13 * i as u32))
                    .unwrap()
            })
            .collect();
        let keys: Vec<Point> = signers.iter().map(|s| *s.my_public_key()).collect();

        let mut aggregator = AggregationSession::new(true, false);
        aggregator.initialize_public_keys(&keys).unwrap();
        aggregator.aggregator_send_message(message).unwrap();

        let mut commitments = vec![Point::default(); count];
        let mut bitmap = SignerBitmap::new(count).unwrap();
        for signer in signers.iter_mut() {
            signer.initialize_public_keys(&keys).unwrap();
            let index = signer.signer_index().unwrap();
            if committed[index] {
                signer.signer_commit(message, None).unwrap();
                commitments[index] = *signer.my_commitment();
                bitmap.set(index, true).unwrap();
            }
        }
        aggregator
            .aggregator_receive_commitments(&commitments, &bitmap)
            .unwrap();

        let digest = aggregator.message_digest().clone();
        let aggregate_commitment = *aggregator.aggregate_commitment();
        let aggregate_public_key = *aggregator.aggregate_public_key();
        let mut solutions = vec![Scalar::ZERO; count];
        for signer in signers.iter_mut() {
            let index = signer.signer_index().unwrap();
            if committed[index] {
                signer
                    .signer_receive_challenge(
                        &bitmap,
                        &digest,
                        &aggregate_commitment,
                        &aggregate_public_key,
                    )
                    .unwrap();
                solutions[index] = signer.my_solution().clone();
            }
        }
        aggregator.aggregator_aggregate(&solutions).unwrap();
        (aggregator, keys)
    }

    #[test]
    fn complete_round_trip_verifies() {
        let (aggregator, keys) = aggregated_session(3, &[true, true, true], b"hello");
        let bytes = aggregator.serialize_complete().unwrap();
        assert_eq!(
            bytes.len(),
            UNCOMPRESSED_SIGNATURE_LENGTH + 2 + 3 * COMPRESSED_POINT_LENGTH
        );
        assert_eq!(bytes[0], AGGREGATE_SIGNATURE_TAG);

        let outcome = verify_from_complete(&bytes, b"hello", false);
        assert!(outcome.accepted, "{:?}", outcome.reason);
        assert!(!verify_from_complete(&bytes, b"hello!", false).accepted);

        let mut parsed = AggregationSession::new(false, false);
        parsed.parse_complete(&bytes).unwrap();
        assert_eq!(parsed.public_keys().len(), 3);
        for key in parsed.public_keys() {
            assert!(keys.contains(key));
        }
        assert_eq!(parsed.committed_signers(), aggregator.committed_signers());
        assert_eq!(
            parsed.signature().challenge,
            aggregator.signature().challenge
        );
        assert_eq!(parsed.signature().solution, aggregator.signature().solution);
    }

    #[test]
    fn compact_form_means_every_signer_committed() {
        let (aggregator, keys) = aggregated_session(2, &[true, true], b"both in");
        let uncompressed = aggregator.serialize_uncompressed().unwrap();
        assert_eq!(uncompressed.len(), UNCOMPRESSED_SIGNATURE_LENGTH);

        let compact = &uncompressed[..COMPACT_SIGNATURE_LENGTH];
        let outcome = verify_message_signature_public_keys(b"both in", compact, &keys, false);
        assert!(outcome.accepted, "{:?}", outcome.reason);

        let outcome =
            verify_message_signature_public_keys(b"both in", &uncompressed, &keys, false);
        assert!(outcome.accepted, "{:?}", outcome.reason);
    }

    #[test]
    fn partial_committed_set_round_trips() {
        let (aggregator, keys) = aggregated_session(3, &[true, false, true], b"101 wire");
        assert_eq!(aggregator.committed_signers().to_string(), "101");
        let bytes = aggregator.serialize_complete().unwrap();
        assert!(verify_from_complete(&bytes, b"101 wire", false).accepted);

        // The same signature under the compact form claims all three
        // committed, which must not verify.
        let outcome = verify_message_signature_public_keys(
            b"101 wire",
            &bytes[..COMPACT_SIGNATURE_LENGTH],
            &keys,
            false,
        );
        assert!(!outcome.accepted);
    }

    #[test]
    fn tampered_solution_bytes_reject() {
        let (aggregator, _) = aggregated_session(3, &[true, true, true], b"tamper");
        let mut bytes = aggregator.serialize_complete().unwrap();
        // Last solution byte lives at offset 65.
        bytes[COMPACT_SIGNATURE_LENGTH - 1] ^= 0x01;
        let outcome = verify_from_complete(&bytes, b"tamper", true);
        assert!(!outcome.accepted);
        assert!(outcome.reason.is_some());
    }

    #[test]
    fn bitmap_bit_beyond_the_key_count_rejects() {
        let (aggregator, _) = aggregated_session(3, &[true, true, true], b"overflow");
        let mut bytes = aggregator.serialize_complete().unwrap();
        // Mark a fourth, nonexistent signer as committed.
        bytes[COMPACT_SIGNATURE_LENGTH] |= 0x10;

        let mut session = AggregationSession::new(false, false);
        assert!(matches!(
            session.parse_complete(&bytes),
            Err(AggregateError::BitmapOverflow {
                index: 3,
                signer_count: 3
            })
        ));

        let outcome = verify_from_complete(&bytes, b"overflow", false);
        assert!(!outcome.accepted);
        assert!(outcome.reason.is_some());
    }

    #[test]
    fn extra_committed_bit_within_the_key_count_rejects() {
        let (aggregator, _) = aggregated_session(3, &[true, false, true], b"extra");
        let mut bytes = aggregator.serialize_complete().unwrap();
        // Claim the middle signer committed when it never did.
        bytes[COMPACT_SIGNATURE_LENGTH] |= 0x40;
        let outcome = verify_from_complete(&bytes, b"extra", false);
        assert!(!outcome.accepted);
    }

    #[test]
    fn malformed_buffers_reject_without_panicking() {
        assert!(!verify_from_complete(&[], b"m", false).accepted);
        assert!(!verify_from_complete(&[0u8; 64], b"m", false).accepted);
        assert!(!verify_from_complete(&[0u8; 10_000], b"m", false).accepted);

        let (aggregator, _) = aggregated_session(2, &[true, true], b"m");
        let mut bytes = aggregator.serialize_complete().unwrap();
        // Inconsistent key count.
        let count_offset = UNCOMPRESSED_SIGNATURE_LENGTH;
        bytes[count_offset] = 0x01;
        bytes[count_offset + 1] = 0x00;
        assert!(!verify_from_complete(&bytes, b"m", false).accepted);
    }

    #[test]
    fn key_list_segment_parses_standalone() {
        let (aggregator, keys) = aggregated_session(2, &[true, true], b"keys");
        let bytes = aggregator.serialize_complete().unwrap();
        let mut session = AggregationSession::new(false, false);
        session
            .parse_public_keys(&bytes[UNCOMPRESSED_SIGNATURE_LENGTH..])
            .unwrap();
        assert_eq!(session.public_keys().len(), keys.len());
        assert!(session.parse_public_keys(&[0x00]).is_err());
        assert!(session.parse_public_keys(&[0x00, 0x02, 0xaa]).is_err());
    }
}
