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

//! Curve points: public keys, nonce commitments and challenges.
//!
//! A [`Point`] is either a point on secp256k1 or the uninitialized
//! sentinel. The point at infinity is deliberately unrepresentable; group
//! operations that would land on it fail instead.

use std::cmp::Ordering;

use secp256k1::PublicKey;

use crate::context::CurveContext;
use crate::errors::AggregateError;
use crate::scalar::Scalar;

/// Byte length of a compressed point.
pub const COMPRESSED_POINT_LENGTH: usize = 33;

/// Byte length of an uncompressed point.
pub const UNCOMPRESSED_POINT_LENGTH: usize = 65;

/// A point on secp256k1, or the uninitialized sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Point(Option<PublicKey>);

impl Point {
    pub(crate) fn from_inner(inner: PublicKey) -> Point {
        Point(Some(inner))
    }

    /// Whether the point has been assigned a value.
    pub fn is_initialized(&self) -> bool {
        self.0.is_some()
    }

    /// Parses a 33-byte compressed or 65-byte uncompressed encoding,
    /// rejecting anything not on the curve.
    pub fn parse(bytes: &[u8]) -> Result<Point, AggregateError> {
        let inner = PublicKey::from_slice(bytes).map_err(|_| AggregateError::InvalidPoint {
            input_hex: hex::encode(bytes),
        })?;
        Ok(Point(Some(inner)))
    }

    /// Parses a compressed point starting at `offset` inside a larger
    /// buffer.
    pub fn parse_at(bytes: &[u8], offset: usize) -> Result<Point, AggregateError> {
        let end = offset.saturating_add(COMPRESSED_POINT_LENGTH);
        if bytes.len() < end {
            return Err(AggregateError::BytesLength {
                expected: end,
                actual: bytes.len(),
                context: "reading a compressed point at an offset",
            });
        }
        Point::parse(&bytes[offset..end])
    }

    /// Recognizes the format of a point encoding: a 66- or 130-character
    /// buffer that decodes as hex is treated as the hex form, anything
    /// else as raw bytes.
    pub fn parse_auto(input: &[u8]) -> Result<Point, AggregateError> {
        if input.len() == 2 * COMPRESSED_POINT_LENGTH
            || input.len() == 2 * UNCOMPRESSED_POINT_LENGTH
        {
            if let Ok(raw) = hex::decode(input) {
                return Point::parse(&raw);
            }
        }
        Point::parse(input)
    }

    /// Parses the 66- or 130-character hex form.
    pub fn from_hex(input: &str) -> Result<Point, AggregateError> {
        let raw = hex::decode(input).map_err(|_| AggregateError::HexDecode {
            input: input.to_string(),
        })?;
        Point::parse(&raw)
    }

    /// The 33-byte compressed encoding.
    pub fn serialize_compressed(&self) -> Result<[u8; COMPRESSED_POINT_LENGTH], AggregateError> {
        match &self.0 {
            Some(inner) => Ok(inner.serialize()),
            None => Err(AggregateError::UninitializedPoint {
                context: "serializing a compressed point",
            }),
        }
    }

    /// The 65-byte uncompressed encoding.
    pub fn serialize_uncompressed(
        &self,
    ) -> Result<[u8; UNCOMPRESSED_POINT_LENGTH], AggregateError> {
        match &self.0 {
            Some(inner) => Ok(inner.serialize_uncompressed()),
            None => Err(AggregateError::UninitializedPoint {
                context: "serializing an uncompressed point",
            }),
        }
    }

    /// Compressed hex, or a placeholder for the sentinel. Diagnostic use.
    pub fn to_hex_compressed(&self) -> String {
        match &self.0 {
            Some(inner) => hex::encode(inner.serialize()),
            None => "(uninitialized)".to_string(),
        }
    }

    /// Uncompressed hex, or a placeholder for the sentinel.
    pub fn to_hex_uncompressed(&self) -> String {
        match &self.0 {
            Some(inner) => hex::encode(inner.serialize_uncompressed()),
            None => "(uninitialized)".to_string(),
        }
    }

    /// Scalar multiplication: `self * exponent`.
    ///
    /// The zero exponent is rejected, its result being the point at
    /// infinity.
    pub fn exponentiate(&self, exponent: &Scalar) -> Result<Point, AggregateError> {
        self.exponentiate_with(CurveContext::global(), exponent)
    }

    /// Same as [`Point::exponentiate`] against an explicit context.
    pub fn exponentiate_with(
        &self,
        context: &CurveContext,
        exponent: &Scalar,
    ) -> Result<Point, AggregateError> {
        let inner = self.0.ok_or(AggregateError::UninitializedPoint {
            context: "exponentiating a point",
        })?;
        if exponent.is_zero() {
            return Err(AggregateError::ZeroScalar {
                context: "exponentiating a point",
            });
        }
        let tweak = secp256k1::Scalar::from_be_bytes(exponent.to_bytes())
            .expect("a reduced scalar is a valid tweak");
        let product = inner
            .mul_tweak(context.verification(), &tweak)
            .map_err(|_| AggregateError::PointAtInfinity {
                context: "exponentiating a point",
            })?;
        Ok(Point(Some(product)))
    }

    /// Group addition of two points.
    pub fn combine(&self, other: &Point) -> Result<Point, AggregateError> {
        let lhs = self.0.as_ref().ok_or(AggregateError::UninitializedPoint {
            context: "combining two points",
        })?;
        let rhs = other.0.as_ref().ok_or(AggregateError::UninitializedPoint {
            context: "combining two points",
        })?;
        let sum = lhs
            .combine(rhs)
            .map_err(|_| AggregateError::PointAtInfinity {
                context: "combining two points",
            })?;
        Ok(Point(Some(sum)))
    }

    /// Group addition over a non-empty set of points.
    pub fn combine_many(points: &[Point]) -> Result<Point, AggregateError> {
        let mut inners = Vec::with_capacity(points.len());
        for point in points {
            inners.push(point.0.as_ref().ok_or(AggregateError::UninitializedPoint {
                context: "combining a set of points",
            })?);
        }
        if inners.is_empty() {
            return Err(AggregateError::PointAtInfinity {
                context: "combining an empty set of points",
            });
        }
        let sum =
            PublicKey::combine_keys(&inners).map_err(|_| AggregateError::PointAtInfinity {
                context: "combining a set of points",
            })?;
        Ok(Point(Some(sum)))
    }
}

/// Canonical ordering over compressed serializations; the uninitialized
/// sentinel sorts first. This is the ordering the protocol uses to
/// normalize public key lists.
impl Ord for Point {
    fn cmp(&self, other: &Point) -> Ordering {
        match (&self.0, &other.0) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(lhs), Some(rhs)) => lhs.serialize().cmp(&rhs.serialize()),
        }
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Point) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
