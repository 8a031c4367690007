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

//! Errors which may occur when parsing keys and/or signatures to or from
//! wire formats, or when driving the aggregation protocol.

use thiserror::Error;

/// Represents an error in key registration, commitment exchange, signing,
/// aggregation or parsing.
///
/// Verification rejection is never an error: a bad signature makes
/// [`crate::AggregationSession::verify`] report a rejected outcome. `Err`
/// values here mean the operation itself could not be carried out.
#[derive(Error, Clone, Debug, Eq, PartialEq)]
pub enum AggregateError {
    /// A byte buffer had the wrong length for what it was supposed to encode.
    #[error("{context}: expected {expected} bytes, got {actual}")]
    BytesLength {
        /// Number of bytes the encoding requires.
        expected: usize,
        /// Number of bytes supplied.
        actual: usize,
        /// What was being decoded.
        context: &'static str,
    },

    /// Bytes that should encode a curve point do not name a point on
    /// secp256k1.
    #[error("bytes do not encode a secp256k1 point: {input_hex}")]
    InvalidPoint {
        /// Hex rendering of the offending bytes.
        input_hex: String,
    },

    /// A string that should be hexadecimal is not.
    #[error("not a valid hexadecimal string: {input}")]
    HexDecode {
        /// The offending input.
        input: String,
    },

    /// A string that should be base58 is not.
    #[error("not a valid base58 string: {input}")]
    Base58Decode {
        /// The offending input.
        input: String,
    },

    /// A base58check string failed to decode or its checksum did not match.
    #[error("base58check decoding failed (bad characters or checksum): {input}")]
    Base58ChecksumDecode {
        /// The offending input.
        input: String,
    },

    /// A versioned base58 payload carried an unexpected version byte.
    #[error("expected version byte 0x{expected:02x}, got 0x{actual:02x}")]
    BadVersionByte {
        /// The version byte the caller asked for.
        expected: u8,
        /// The version byte actually present.
        actual: u8,
    },

    /// Automatic format detection could not classify the input.
    #[error("cannot recognize the encoding of a {length}-character string: {input}")]
    UnrecognizedFormat {
        /// The offending input.
        input: String,
        /// Its character count.
        length: usize,
    },

    /// A serialized signature started with an unknown tag byte.
    #[error("unknown signature tag byte: 0x{actual:02x}")]
    BadTag {
        /// The tag actually present.
        actual: u8,
    },

    /// A transition was requested by a session that does not hold the
    /// required role.
    #[error("only the {role} may {operation}")]
    WrongRole {
        /// The transition that was attempted.
        operation: &'static str,
        /// The role it requires.
        role: &'static str,
    },

    /// A transition was requested from a state it is not valid in.
    #[error("cannot {operation} while the session is in the \"{state}\" state")]
    WrongState {
        /// The transition that was attempted.
        operation: &'static str,
        /// The state the session was observed in.
        state: &'static str,
    },

    /// A signer session's own public key is absent from the registered set.
    #[error("signer public key {public_key_hex} is not among the registered keys")]
    SignerKeyNotRegistered {
        /// Compressed hex of the signer's key.
        public_key_hex: String,
    },

    /// More signers than the protocol supports.
    #[error("{count} signers exceed the maximum of 256")]
    TooManySigners {
        /// Number of keys offered for registration.
        count: usize,
    },

    /// An operation that needs registered public keys found none.
    #[error("no public keys have been registered")]
    NoRegisteredKeys,

    /// A committed-signer bitmap does not match the registered key count.
    #[error("committed-signer bitmap covers {actual} signers, {expected} are registered")]
    BitmapLength {
        /// Registered signer count.
        expected: usize,
        /// Bitmap width supplied.
        actual: usize,
    },

    /// A serialized bitmap marks a signer index beyond the registered set.
    #[error("bitmap bit {index} is set but only {signer_count} signers are registered")]
    BitmapOverflow {
        /// Index of the offending bit.
        index: usize,
        /// Registered signer count.
        signer_count: usize,
    },

    /// The protocol requires at least one committed signer.
    #[error("no signers are committed")]
    NoCommittedSigners,

    /// More commitments were delivered than there are registered signers.
    #[error("{provided} commitments delivered for {registered} registered signers")]
    TooManyCommitments {
        /// Commitments delivered.
        provided: usize,
        /// Registered signer count.
        registered: usize,
    },

    /// A signer is marked committed but no usable commitment was delivered
    /// for it.
    #[error("signer {index} is marked committed but delivered no commitment")]
    MissingCommitment {
        /// Index of the offending signer.
        index: usize,
    },

    /// A committed signer's solution is absent from the delivered list.
    #[error("no solution delivered for committed signer {index}")]
    MissingSolution {
        /// Index of the offending signer.
        index: usize,
    },

    /// More solutions were delivered than there are registered signers.
    #[error("{provided} solutions delivered for {registered} registered signers")]
    TooManySolutions {
        /// Solutions delivered.
        provided: usize,
        /// Registered signer count.
        registered: usize,
    },

    /// The aggregator's challenge does not match what the signer recomputes
    /// from its own view of the session. Signing must be aborted.
    #[error("aggregator sent a {quantity} of {theirs}, recomputed {ours}")]
    AggregatorMismatch {
        /// Which quantity disagreed.
        quantity: &'static str,
        /// The value this session recomputed.
        ours: String,
        /// The value the aggregator supplied.
        theirs: String,
    },

    /// A group operation landed on the point at infinity, which has no
    /// serialized form.
    #[error("{context}: result is the point at infinity")]
    PointAtInfinity {
        /// The operation that produced it.
        context: &'static str,
    },

    /// An operation touched a point that has not been assigned a value.
    #[error("{context}: point is uninitialized")]
    UninitializedPoint {
        /// The operation that touched it.
        context: &'static str,
    },

    /// A scalar that must be non-zero was zero.
    #[error("{context}: scalar is zero")]
    ZeroScalar {
        /// The operation that needs it non-zero.
        context: &'static str,
    },

    /// A caller-supplied nonce cannot be used.
    #[error("the supplied nonce is zero or otherwise unusable")]
    BadNonce,
}
