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

//! Scalars modulo the secp256k1 group order.
//!
//! Secret keys, nonces, solutions and locking coefficients are all
//! [`Scalar`]s. The representation is 32 big-endian bytes, always either
//! fully reduced or the explicit zero value, and the bytes are wiped
//! when a scalar is dropped.

use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::SecretKey;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::context::CurveContext;
use crate::errors::AggregateError;
use crate::point::Point;

/// Byte length of a serialized scalar.
pub const SCALAR_LENGTH: usize = 32;

/// Version byte used by the checked base58 secret encoding.
pub const SECRET_VERSION_BYTE: u8 = 0x80;

/// The secp256k1 group order, big-endian.
const CURVE_ORDER: [u8; SCALAR_LENGTH] = [
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xfe,
    0xba, 0xae, 0xdc, 0xe6, 0xaf, 0x48, 0xa0, 0x3b,
    0xbf, 0xd2, 0x5e, 0x8c, 0xd0, 0x36, 0x41, 0x41,
];

/// Rejection-sampling bound for [`Scalar::generate_secure`]. Each draw
/// fails with probability below 2^-127, so exhausting this means the OS
/// randomness source is broken.
const MAX_GENERATION_ATTEMPTS: usize = 64;

/// An element of the scalar field, reduced mod the group order, or zero.
#[derive(Clone, Default, Zeroize, ZeroizeOnDrop)]
pub struct Scalar([u8; SCALAR_LENGTH]);

impl Scalar {
    /// The additive identity. Not a valid secret key or nonce.
    pub const ZERO: Scalar = Scalar([0u8; SCALAR_LENGTH]);

    /// Reduces an arbitrary 32-byte big-endian value. Any 256-bit value is
    /// below twice the group order, so one conditional subtraction reduces
    /// it fully.
    pub fn from_bytes_reduced(mut bytes: [u8; SCALAR_LENGTH]) -> Scalar {
        reduce_once(&mut bytes);
        Scalar(bytes)
    }

    /// Parses exactly 32 big-endian bytes, reducing out-of-range values.
    pub fn from_bytes(bytes: &[u8]) -> Result<Scalar, AggregateError> {
        if bytes.len() != SCALAR_LENGTH {
            return Err(AggregateError::BytesLength {
                expected: SCALAR_LENGTH,
                actual: bytes.len(),
                context: "decoding a scalar",
            });
        }
        let mut raw = [0u8; SCALAR_LENGTH];
        raw.copy_from_slice(bytes);
        Ok(Scalar::from_bytes_reduced(raw))
    }

    /// Parses 32 bytes starting at `offset` inside a larger buffer.
    pub fn from_bytes_at(bytes: &[u8], offset: usize) -> Result<Scalar, AggregateError> {
        let end = offset.saturating_add(SCALAR_LENGTH);
        if bytes.len() < end {
            return Err(AggregateError::BytesLength {
                expected: end,
                actual: bytes.len(),
                context: "reading a scalar at an offset",
            });
        }
        Scalar::from_bytes(&bytes[offset..end])
    }

    /// The scalar with the given small value. Handy for the unit locking
    /// coefficient and for deterministic tests.
    pub fn from_u32(value: u32) -> Scalar {
        let mut bytes = [0u8; SCALAR_LENGTH];
        bytes[SCALAR_LENGTH - 4..].copy_from_slice(&value.to_be_bytes());
        Scalar(bytes)
    }

    /// Draws a uniformly random non-zero scalar from the operating system
    /// randomness source, by rejection sampling.
    ///
    /// # Panics
    ///
    /// Panics if the OS keeps producing out-of-range values, which only
    /// happens when the randomness source is broken.
    pub fn generate_secure() -> Scalar {
        let mut buf = [0u8; SCALAR_LENGTH];
        for _ in 0..MAX_GENERATION_ATTEMPTS {
            OsRng.fill_bytes(&mut buf);
            if SecretKey::from_slice(&buf).is_ok() {
                return Scalar(buf);
            }
        }
        panic!("OS randomness failed to produce a valid scalar");
    }

    /// Big-endian serialization.
    pub fn to_bytes(&self) -> [u8; SCALAR_LENGTH] {
        self.0
    }

    /// Constant-time zero test.
    pub fn is_zero(&self) -> bool {
        self.0[..].ct_eq(&[0u8; SCALAR_LENGTH][..]).into()
    }

    /// Wipes the value in place.
    pub fn make_zero(&mut self) {
        self.0.zeroize();
    }

    /// Addition mod the group order.
    pub fn add(&self, other: &Scalar) -> Scalar {
        if self.is_zero() {
            return other.clone();
        }
        if other.is_zero() {
            return self.clone();
        }
        let lhs = SecretKey::from_slice(&self.0)
            .expect("a reduced non-zero scalar is a valid secret key");
        let tweak = secp256k1::Scalar::from_be_bytes(other.0)
            .expect("a reduced scalar is a valid tweak");
        match lhs.add_tweak(&tweak) {
            Ok(sum) => Scalar(sum.secret_bytes()),
            // The only failure mode of a non-zero tweak add is a sum of zero.
            Err(_) => Scalar::ZERO,
        }
    }

    /// Multiplication mod the group order.
    pub fn multiply(&self, other: &Scalar) -> Scalar {
        if self.is_zero() || other.is_zero() {
            return Scalar::ZERO;
        }
        let lhs = SecretKey::from_slice(&self.0)
            .expect("a reduced non-zero scalar is a valid secret key");
        let tweak = secp256k1::Scalar::from_be_bytes(other.0)
            .expect("a reduced scalar is a valid tweak");
        let product = lhs
            .mul_tweak(&tweak)
            .expect("the product of two non-zero scalars is non-zero");
        Scalar(product.secret_bytes())
    }

    /// The public point `self * G`. Fails for the zero scalar, whose
    /// public point would be the unserializable point at infinity.
    pub fn compute_public_key(&self) -> Result<Point, AggregateError> {
        self.compute_public_key_with(CurveContext::global())
    }

    /// Same as [`Scalar::compute_public_key`] against an explicit context.
    pub fn compute_public_key_with(
        &self,
        context: &CurveContext,
    ) -> Result<Point, AggregateError> {
        let secret = SecretKey::from_slice(&self.0).map_err(|_| AggregateError::ZeroScalar {
            context: "computing a public key",
        })?;
        Ok(Point::from_inner(secret.public_key(context.signing())))
    }

    /// Lowercase hex, 64 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses the 64-character hex form.
    pub fn from_hex(input: &str) -> Result<Scalar, AggregateError> {
        let raw = hex::decode(input).map_err(|_| AggregateError::HexDecode {
            input: input.to_string(),
        })?;
        Scalar::from_bytes(&raw)
    }

    /// Plain base58 over the 32 raw bytes, no version, no checksum.
    pub fn to_base58(&self) -> String {
        bs58::encode(&self.0).into_string()
    }

    /// Parses the plain base58 form.
    pub fn from_base58(input: &str) -> Result<Scalar, AggregateError> {
        let raw = bs58::decode(input)
            .into_vec()
            .map_err(|_| AggregateError::Base58Decode {
                input: input.to_string(),
            })?;
        Scalar::from_bytes(&raw)
    }

    /// Base58 over a version byte plus the 32 raw bytes, no checksum.
    pub fn to_base58_versioned(&self, version: u8) -> String {
        let mut payload = Vec::with_capacity(1 + SCALAR_LENGTH);
        payload.push(version);
        payload.extend_from_slice(&self.0);
        let encoded = bs58::encode(&payload).into_string();
        payload.zeroize();
        encoded
    }

    /// Parses the versioned base58 form, insisting on `version`.
    pub fn from_base58_versioned(input: &str, version: u8) -> Result<Scalar, AggregateError> {
        let raw = bs58::decode(input)
            .into_vec()
            .map_err(|_| AggregateError::Base58Decode {
                input: input.to_string(),
            })?;
        if raw.len() != 1 + SCALAR_LENGTH {
            return Err(AggregateError::BytesLength {
                expected: 1 + SCALAR_LENGTH,
                actual: raw.len(),
                context: "decoding a versioned base58 scalar",
            });
        }
        if raw[0] != version {
            return Err(AggregateError::BadVersionByte {
                expected: version,
                actual: raw[0],
            });
        }
        Scalar::from_bytes(&raw[1..])
    }

    /// Base58check: version byte, 32 raw bytes, 4-byte double-SHA256
    /// checksum.
    pub fn to_base58_check(&self, version: u8) -> String {
        bs58::encode(&self.0)
            .with_check_version(version)
            .into_string()
    }

    /// Parses the base58check form, verifying checksum and `version`.
    pub fn from_base58_check(input: &str, version: u8) -> Result<Scalar, AggregateError> {
        let raw = bs58::decode(input)
            .with_check(Some(version))
            .into_vec()
            .map_err(|_| AggregateError::Base58ChecksumDecode {
                input: input.to_string(),
            })?;
        if raw.len() != 1 + SCALAR_LENGTH {
            return Err(AggregateError::BytesLength {
                expected: 1 + SCALAR_LENGTH,
                actual: raw.len(),
                context: "decoding a base58check scalar",
            });
        }
        Scalar::from_bytes(&raw[1..])
    }

    /// Detects the encoding of a base58-family scalar string.
    ///
    /// The checksum self-authenticates, so base58check is tried first with
    /// any version byte accepted; failing that the string is decoded as
    /// plain base58 and classified by payload length (32 raw bytes, or a
    /// version byte plus 32).
    pub fn from_base58_auto(input: &str) -> Result<Scalar, AggregateError> {
        if let Ok(raw) = bs58::decode(input).with_check(None).into_vec() {
            if raw.len() == 1 + SCALAR_LENGTH {
                return Scalar::from_bytes(&raw[1..]);
            }
        }
        let raw = bs58::decode(input)
            .into_vec()
            .map_err(|_| AggregateError::Base58Decode {
                input: input.to_string(),
            })?;
        match raw.len() {
            SCALAR_LENGTH => Scalar::from_bytes(&raw),
            l if l == 1 + SCALAR_LENGTH => Scalar::from_bytes(&raw[1..]),
            _ => Err(AggregateError::UnrecognizedFormat {
                input: input.to_string(),
                length: input.len(),
            }),
        }
    }
}

impl PartialEq for Scalar {
    fn eq(&self, other: &Scalar) -> bool {
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

impl Eq for Scalar {}

impl core::fmt::Debug for Scalar {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "Scalar({})", self.to_hex())
    }
}

/// One conditional subtraction of the group order.
fn reduce_once(bytes: &mut [u8; SCALAR_LENGTH]) {
    if bytes[..] < CURVE_ORDER[..] {
        return;
    }
    let mut borrow: i16 = 0;
    for i in (0..SCALAR_LENGTH).rev() {
        let diff = bytes[i] as i16 - CURVE_ORDER[i] as i16 - borrow;
        if diff < 0 {
            bytes[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            bytes[i] = diff as u8;
            borrow = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_int_arithmetic() {
        let two = Scalar::from_u32(2);
        let three = Scalar::from_u32(3);
        assert_eq!(two.add(&three), Scalar::from_u32(5));
        assert_eq!(two.multiply(&three), Scalar::from_u32(6));
        assert_eq!(two.add(&Scalar::ZERO), two);
        assert_eq!(two.multiply(&Scalar::ZERO), Scalar::ZERO);
        assert_eq!(Scalar::ZERO.add(&Scalar::ZERO), Scalar::ZERO);
    }

    #[test]
    fn out_of_range_values_reduce() {
        assert_eq!(Scalar::from_bytes(&CURVE_ORDER).unwrap(), Scalar::ZERO);

        let mut order_plus_one = CURVE_ORDER;
        order_plus_one[SCALAR_LENGTH - 1] += 1;
        assert_eq!(
            Scalar::from_bytes(&order_plus_one).unwrap(),
            Scalar::from_u32(1)
        );

        // 2^256 - 1 mod n, checked against an independent computation.
        assert_eq!(
            Scalar::from_bytes_reduced([0xff; SCALAR_LENGTH]).to_hex(),
            "000000000000000000000000000000014551231950b75fc4402da1732fc9bebe"
        );
    }

    #[test]
    fn addition_wraps_to_zero() {
        // n - 1 plus 1 is the identity.
        let mut almost = CURVE_ORDER;
        almost[SCALAR_LENGTH - 1] -= 1;
        let n_minus_one = Scalar::from_bytes(&almost).unwrap();
        assert_eq!(n_minus_one.add(&Scalar::from_u32(1)), Scalar::ZERO);
    }

    #[test]
    fn rejects_bad_lengths() {
        assert!(matches!(
            Scalar::from_bytes(&[1u8; 31]),
            Err(AggregateError::BytesLength { .. })
        ));
        assert!(matches!(
            Scalar::from_bytes_at(&[0u8; 40], 16),
            Err(AggregateError::BytesLength { .. })
        ));
        let buf = [9u8; 64];
        assert!(Scalar::from_bytes_at(&buf, 32).is_ok());
    }

    #[test]
    fn hex_round_trip() {
        let scalar = Scalar::from_u32(0xdeadbeef);
        let recovered = Scalar::from_hex(&scalar.to_hex()).unwrap();
        assert_eq!(scalar, recovered);
        assert!(Scalar::from_hex("not hex at all").is_err());
    }

    #[test]
    fn base58_round_trips() {
        let scalar = Scalar::generate_secure();

        let plain = scalar.to_base58();
        assert_eq!(Scalar::from_base58(&plain).unwrap(), scalar);
        assert_eq!(Scalar::from_base58_auto(&plain).unwrap(), scalar);

        let versioned = scalar.to_base58_versioned(SECRET_VERSION_BYTE);
        assert_eq!(
            Scalar::from_base58_versioned(&versioned, SECRET_VERSION_BYTE).unwrap(),
            scalar
        );
        assert!(matches!(
            Scalar::from_base58_versioned(&versioned, 0x00),
            Err(AggregateError::BadVersionByte { .. })
        ));

        let checked = scalar.to_base58_check(SECRET_VERSION_BYTE);
        assert_eq!(
            Scalar::from_base58_check(&checked, SECRET_VERSION_BYTE).unwrap(),
            scalar
        );
        assert_eq!(Scalar::from_base58_auto(&checked).unwrap(), scalar);

        let mut corrupted = checked.into_bytes();
        let last = corrupted.len() - 1;
        corrupted[last] = if corrupted[last] == b'2' { b'3' } else { b'2' };
        let corrupted = String::from_utf8(corrupted).unwrap();
        assert!(Scalar::from_base58_check(&corrupted, SECRET_VERSION_BYTE).is_err());
    }

    #[test]
    fn generated_scalars_are_distinct_and_non_zero() {
        let a = Scalar::generate_secure();
        let b = Scalar::generate_secure();
        assert!(!a.is_zero());
        assert!(!b.is_zero());
        assert_ne!(a, b);
    }

    #[test]
    fn seeded_rng_draws_are_reproducible() {
        use rand::SeedableRng;
        let mut buf = [0u8; SCALAR_LENGTH];
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(42);
        rng.fill_bytes(&mut buf);
        let first = Scalar::from_bytes_reduced(buf);
        let mut rng = rand_chacha::ChaCha20Rng::seed_from_u64(42);
        rng.fill_bytes(&mut buf);
        assert_eq!(first, Scalar::from_bytes_reduced(buf));
        assert!(!first.is_zero());
    }

    #[test]
    fn zero_scalar_has_no_public_key() {
        assert!(matches!(
            Scalar::ZERO.compute_public_key(),
            Err(AggregateError::ZeroScalar { .. })
        ));
        assert!(Scalar::from_u32(1).compute_public_key().is_ok());
    }

    #[test]
    fn make_zero_wipes() {
        let mut scalar = Scalar::from_u32(77);
        scalar.make_zero();
        assert!(scalar.is_zero());
    }
}
