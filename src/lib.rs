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

//
// Aggregate Schnorr signatures over secp256k1
//

// Any subset of up to 256 registered signers cooperates with one
// aggregator to produce a single 66-byte Schnorr signature, with
// per-signer locking coefficients defending against rogue-key attacks.

//Useful links:
//https://blockstream.com/2018/01/23/musig-key-aggregation-schnorr-signatures/
//https://eprint.iacr.org/2018/068

mod errors;
pub use errors::AggregateError;
pub mod context;
pub use crate::context::CurveContext;
pub mod scalar;
pub mod point;
pub mod schnorr;
pub mod bitmap;
pub mod session;
pub mod codec;
pub mod snapshot;

// Export everything public in schnorr-agg.
pub use crate::scalar::{Scalar, SCALAR_LENGTH, SECRET_VERSION_BYTE};
pub use crate::point::{Point, COMPRESSED_POINT_LENGTH, UNCOMPRESSED_POINT_LENGTH};
pub use crate::schnorr::{
    SchnorrSignature,
    AGGREGATE_SIGNATURE_TAG,
    COMPACT_SIGNATURE_LENGTH,
    SIGNATURE_TAG,
};
pub use crate::bitmap::{SignerBitmap, BITMAP_LENGTH, MAX_SIGNERS};
pub use crate::session::{
    AggregationSession,
    SessionState,
    VerificationOutcome,
    VerifyDiagnostics,
};
pub use crate::codec::{
    verify_from_complete,
    verify_message_signature_public_keys,
    COMPLETE_SIGNATURE_MAX_LENGTH,
    COMPLETE_SIGNATURE_MIN_LENGTH,
    UNCOMPRESSED_SIGNATURE_LENGTH,
};
pub use crate::snapshot::SessionSnapshot;
