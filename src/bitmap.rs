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

//! The committed-signer bitmap.
//!
//! Registered signers are identified by their index into the sorted
//! public key list; the bitmap records which of them committed to a
//! nonce. The wire form is a fixed 32 bytes, which caps the protocol at
//! 256 signers.

use crate::errors::AggregateError;

/// Wire width of the bitmap in bytes.
pub const BITMAP_LENGTH: usize = 32;

/// Hard cap on registered signers, set by the bitmap width.
pub const MAX_SIGNERS: usize = 8 * BITMAP_LENGTH;

/// Which registered signers committed, indexed like the sorted key list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SignerBitmap(Vec<bool>);

impl SignerBitmap {
    /// An all-uncommitted bitmap for `signer_count` signers.
    pub fn new(signer_count: usize) -> Result<SignerBitmap, AggregateError> {
        if signer_count > MAX_SIGNERS {
            return Err(AggregateError::TooManySigners {
                count: signer_count,
            });
        }
        Ok(SignerBitmap(vec![false; signer_count]))
    }

    /// An all-committed bitmap for `signer_count` signers.
    pub fn all_committed(signer_count: usize) -> Result<SignerBitmap, AggregateError> {
        if signer_count > MAX_SIGNERS {
            return Err(AggregateError::TooManySigners {
                count: signer_count,
            });
        }
        Ok(SignerBitmap(vec![true; signer_count]))
    }

    /// A bitmap copied from explicit flags.
    pub fn from_bits(bits: &[bool]) -> Result<SignerBitmap, AggregateError> {
        if bits.len() > MAX_SIGNERS {
            return Err(AggregateError::TooManySigners { count: bits.len() });
        }
        Ok(SignerBitmap(bits.to_vec()))
    }

    /// Number of signers the bitmap covers.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the bitmap covers no signers at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether signer `index` committed. Out-of-range reads as false.
    pub fn is_committed(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Marks signer `index` committed or not.
    pub fn set(&mut self, index: usize, committed: bool) -> Result<(), AggregateError> {
        if index >= self.0.len() {
            return Err(AggregateError::BitmapOverflow {
                index,
                signer_count: self.0.len(),
            });
        }
        self.0[index] = committed;
        Ok(())
    }

    /// How many signers committed.
    pub fn count_committed(&self) -> usize {
        self.0.iter().filter(|bit| **bit).count()
    }

    /// Indices of the committed signers, ascending.
    pub fn committed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(index, bit)| bit.then_some(index))
    }

    /// The 32-byte wire form: bit `i` lives in byte `i / 8`, most
    /// significant bit first. Unused trailing bits are zero.
    pub fn serialize(&self) -> [u8; BITMAP_LENGTH] {
        let mut out = [0u8; BITMAP_LENGTH];
        for index in self.committed_indices() {
            out[index / 8] |= 1 << (7 - (index % 8));
        }
        out
    }

    /// Parses the wire form for a known signer count.
    ///
    /// Any set bit at an index at or beyond `signer_count` is rejected:
    /// such a bit names a signer that does not exist, and accepting it
    /// silently would let two distinct encodings verify the same
    /// signature.
    pub fn deserialize(raw: &[u8], signer_count: usize) -> Result<SignerBitmap, AggregateError> {
        if raw.len() != BITMAP_LENGTH {
            return Err(AggregateError::BytesLength {
                expected: BITMAP_LENGTH,
                actual: raw.len(),
                context: "decoding a committed-signer bitmap",
            });
        }
        if signer_count > MAX_SIGNERS {
            return Err(AggregateError::TooManySigners {
                count: signer_count,
            });
        }
        let mut bits = vec![false; signer_count];
        for index in 0..MAX_SIGNERS {
            let set = raw[index / 8] & (1 << (7 - (index % 8))) != 0;
            if !set {
                continue;
            }
            if index >= signer_count {
                return Err(AggregateError::BitmapOverflow {
                    index,
                    signer_count,
                });
            }
            bits[index] = true;
        }
        Ok(SignerBitmap(bits))
    }
}

/// Renders the bitmap as a `"101"`-style string of ones and zeros.
impl core::fmt::Display for SignerBitmap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for bit in &self.0 {
            f.write_str(if *bit { "1" } else { "0" })?;
        }
        Ok(())
    }
}
