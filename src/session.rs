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

//! The three-round signature aggregation ceremony.
//!
//! One aggregator and up to 256 signers cooperate to produce a single
//! Schnorr signature over a shared message:
//!
//! 1. every party registers the full sorted list of signer public keys;
//! 2. the aggregator publishes the message, committed signers answer with
//!    nonce commitments;
//! 3. the aggregator combines the commitments, locks each committed key
//!    with a coefficient bound to the whole committed set, and publishes
//!    the challenge digest;
//! 4. each committed signer independently recomputes the challenge,
//!    refuses to sign on any mismatch, and otherwise answers with its
//!    solution share;
//! 5. the aggregator sums the shares into the final signature.
//!
//! The locking coefficients are what make a rogue-key attack fail: a
//! participant cannot choose a key that cancels the others once every
//! coefficient depends on the full committed key set.

use serde::Serialize;
use sha3::{Digest, Sha3_256};
use tracing::warn;

use crate::bitmap::SignerBitmap;
use crate::errors::AggregateError;
use crate::point::{Point, COMPRESSED_POINT_LENGTH};
use crate::scalar::Scalar;
use crate::schnorr::{challenge_digest, SchnorrSignature};

/// Where a session stands in the ceremony.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No keys registered yet.
    Uninitialized,
    /// Keys registered, ceremony not begun.
    Ready,
    /// The aggregator has published the message.
    MessageSent,
    /// This signer has committed to its nonce.
    CommitmentsSent,
    /// The aggregator has collected commitments and published the
    /// challenge.
    ChallengeSent,
    /// This signer has produced its solution share.
    SolutionsSent,
    /// The aggregator holds the final signature.
    Aggregated,
    /// The session is replaying the ceremony to check a signature.
    VerifyingAggregate,
}

impl SessionState {
    /// Short human-readable name, used in state errors.
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Ready => "ready",
            SessionState::MessageSent => "message sent",
            SessionState::CommitmentsSent => "commitments sent",
            SessionState::ChallengeSent => "challenge sent",
            SessionState::SolutionsSent => "solutions sent",
            SessionState::Aggregated => "aggregated",
            SessionState::VerifyingAggregate => "verifying aggregate",
        }
    }
}

impl core::fmt::Display for SessionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Public intermediate quantities of a verification replay. Contains no
/// secrets.
#[derive(Clone, Debug, Serialize)]
pub struct VerifyDiagnostics {
    /// The message under verification, hex.
    pub message_hex: String,
    /// The committed-signer bitmap, ones and zeros.
    pub committed_signers: String,
    /// Registered public keys, compressed hex, sorted.
    pub public_keys: Vec<String>,
    /// Locking coefficients per registered signer, hex; zero for
    /// uncommitted signers.
    pub locking_coefficients: Vec<String>,
    /// The locked aggregate public key, compressed hex.
    pub aggregate_public_key: String,
    /// The aggregate commitment carried by the signature, compressed hex.
    pub aggregate_commitment: String,
    /// The recomputed challenge digest, hex.
    pub message_digest: String,
    /// The aggregate solution carried by the signature, hex.
    pub aggregate_solution: String,
    /// Left side of the verification equation, if it was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left_side: Option<String>,
    /// Right side of the verification equation, if it was reached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right_side: Option<String>,
}

/// The result of verifying an aggregate signature.
#[derive(Clone, Debug)]
pub struct VerificationOutcome {
    /// Whether the signature verifies.
    pub accepted: bool,
    /// Why it does not, when it does not.
    pub reason: Option<String>,
    /// Intermediate quantities, when the caller asked for them.
    pub details: Option<VerifyDiagnostics>,
}

impl VerificationOutcome {
    pub(crate) fn rejected(reason: String) -> VerificationOutcome {
        VerificationOutcome {
            accepted: false,
            reason: Some(reason),
            details: None,
        }
    }
}

/// One participant's view of an aggregation ceremony.
///
/// A session may hold the aggregator role, the signer role, both, or
/// neither (a pure verifier). Every transition checks the role and the
/// current [`SessionState`] and fails with a recoverable error rather
/// than corrupting the session.
pub struct AggregationSession {
    pub(crate) is_aggregator: bool,
    pub(crate) is_signer: bool,
    pub(crate) state: SessionState,

    /// This signer's key material; zero scalar and sentinel point for
    /// non-signer roles.
    pub(crate) secret_key: Scalar,
    pub(crate) public_key: Point,
    /// Position of this signer's key in the sorted registered list.
    pub(crate) signer_index: Option<usize>,

    /// All registered signer keys, sorted by compressed serialization.
    pub(crate) all_public_keys: Vec<Point>,
    pub(crate) message: Vec<u8>,

    /// This signer's nonce and its commitment.
    pub(crate) nonce: Scalar,
    pub(crate) commitment: Point,

    /// Aggregator-side view of round two.
    pub(crate) all_commitments: Vec<Point>,
    pub(crate) committed_signers: SignerBitmap,
    pub(crate) aggregate_commitment: Point,

    /// Locking material derived from the committed key set.
    pub(crate) concatenated_committed_keys: Vec<u8>,
    pub(crate) locking_coefficients: Vec<Scalar>,
    pub(crate) my_locking_coefficient: Scalar,
    pub(crate) aggregate_public_key: Point,
    pub(crate) message_digest: Scalar,

    /// Round-three material.
    pub(crate) my_solution: Scalar,
    pub(crate) all_solutions: Vec<Scalar>,
    pub(crate) aggregate_solution: Scalar,
    pub(crate) signature: SchnorrSignature,
}

impl AggregationSession {
    /// A session with the given roles and no key material. The signer
    /// role needs a key before the ceremony starts; see
    /// [`AggregationSession::with_secret_key`].
    pub fn new(is_aggregator: bool, is_signer: bool) -> AggregationSession {
        AggregationSession {
            is_aggregator,
            is_signer,
            state: SessionState::Uninitialized,
            secret_key: Scalar::ZERO,
            public_key: Point::default(),
            signer_index: None,
            all_public_keys: Vec::new(),
            message: Vec::new(),
            nonce: Scalar::ZERO,
            commitment: Point::default(),
            all_commitments: Vec::new(),
            committed_signers: SignerBitmap::default(),
            aggregate_commitment: Point::default(),
            concatenated_committed_keys: Vec::new(),
            locking_coefficients: Vec::new(),
            my_locking_coefficient: Scalar::ZERO,
            aggregate_public_key: Point::default(),
            message_digest: Scalar::ZERO,
            my_solution: Scalar::ZERO,
            all_solutions: Vec::new(),
            aggregate_solution: Scalar::ZERO,
            signature: SchnorrSignature::default(),
        }
    }

    /// A signer session (optionally also the aggregator) holding
    /// `secret` as its key.
    pub fn with_secret_key(
        is_aggregator: bool,
        secret: Scalar,
    ) -> Result<AggregationSession, AggregateError> {
        let public_key = secret.compute_public_key()?;
        let mut session = AggregationSession::new(is_aggregator, true);
        session.secret_key = secret;
        session.public_key = public_key;
        Ok(session)
    }

    /// A signer session with a freshly generated key.
    pub fn with_generated_key(is_aggregator: bool) -> AggregationSession {
        AggregationSession::with_secret_key(is_aggregator, Scalar::generate_secure())
            .expect("a freshly generated secret key is non-zero")
    }

    /// Registers the signer public keys for the ceremony. Every party
    /// must register the same set; the session keeps them sorted so all
    /// parties agree on signer indices.
    ///
    /// Callable at any time: registering keys restarts the ceremony.
    pub fn initialize_public_keys(&mut self, keys: &[Point]) -> Result<(), AggregateError> {
        if keys.is_empty() {
            return Err(AggregateError::NoRegisteredKeys);
        }
        for key in keys {
            if !key.is_initialized() {
                return Err(AggregateError::UninitializedPoint {
                    context: "registering signer public keys",
                });
            }
        }
        let mut sorted = keys.to_vec();
        sorted.sort();
        let bitmap = SignerBitmap::new(sorted.len())?;

        if self.is_signer {
            self.signer_index = match sorted.iter().position(|key| *key == self.public_key) {
                Some(index) => Some(index),
                None => {
                    return Err(AggregateError::SignerKeyNotRegistered {
                        public_key_hex: self.public_key.to_hex_compressed(),
                    })
                }
            };
        }

        self.all_commitments = vec![Point::default(); sorted.len()];
        self.committed_signers = bitmap;
        self.all_public_keys = sorted;
        self.state = SessionState::Ready;
        Ok(())
    }

    /// Aggregator, round one: publish the message to sign.
    pub fn aggregator_send_message(&mut self, message: &[u8]) -> Result<(), AggregateError> {
        self.require_role(self.is_aggregator, "publish the message", "aggregator")?;
        self.require_state("publish the message", &[SessionState::Ready])?;
        self.message = message.to_vec();
        self.state = SessionState::MessageSent;
        Ok(())
    }

    /// Signer, round two: draw a nonce (or use a caller-supplied
    /// non-zero one) and commit to it.
    pub fn signer_commit(
        &mut self,
        message: &[u8],
        nonce: Option<Scalar>,
    ) -> Result<(), AggregateError> {
        self.require_role(self.is_signer, "commit to a nonce", "signer")?;
        self.require_state(
            "commit to a nonce",
            &[SessionState::Ready, SessionState::MessageSent],
        )?;
        let nonce = match nonce {
            Some(n) if n.is_zero() => return Err(AggregateError::BadNonce),
            Some(n) => n,
            None => Scalar::generate_secure(),
        };
        self.commitment = nonce.compute_public_key()?;
        self.nonce = nonce;
        self.message = message.to_vec();
        self.state = SessionState::CommitmentsSent;
        Ok(())
    }

    /// Aggregator, round two: collect the commitments of the committed
    /// signers and derive the challenge.
    ///
    /// `commitments` is indexed like the sorted key list; entries for
    /// uncommitted signers may be left as the sentinel, and a short list
    /// is padded. A signer marked committed without a usable commitment
    /// is dropped from the committed set.
    pub fn aggregator_receive_commitments(
        &mut self,
        commitments: &[Point],
        committed: &SignerBitmap,
    ) -> Result<(), AggregateError> {
        self.require_role(self.is_aggregator, "collect commitments", "aggregator")?;
        self.require_state(
            "collect commitments",
            &[SessionState::MessageSent, SessionState::CommitmentsSent],
        )?;
        let signer_count = self.all_public_keys.len();
        if committed.len() != signer_count {
            return Err(AggregateError::BitmapLength {
                expected: signer_count,
                actual: committed.len(),
            });
        }
        if commitments.len() > signer_count {
            return Err(AggregateError::TooManyCommitments {
                provided: commitments.len(),
                registered: signer_count,
            });
        }
        let mut padded = commitments.to_vec();
        padded.resize(signer_count, Point::default());
        let mut effective = committed.clone();
        for index in committed.committed_indices() {
            if !padded[index].is_initialized() {
                warn!(
                    signer = index,
                    "marked committed without a usable commitment; dropping from the committed set"
                );
                effective.set(index, false)?;
            }
        }
        if effective.count_committed() == 0 {
            return Err(AggregateError::NoCommittedSigners);
        }

        self.all_commitments = padded;
        self.committed_signers = effective;
        self.compute_aggregate_commitment()?;
        self.compute_concatenated_committed_keys()?;
        self.compute_locking_coefficients()?;
        self.aggregate_public_key = self.locked_aggregate_public_key()?;
        self.compute_message_digest()?;
        self.state = SessionState::ChallengeSent;
        Ok(())
    }

    /// Signer, round three: take the aggregator's challenge, cross-check
    /// it against an independent recomputation, and produce this signer's
    /// solution share.
    ///
    /// A signer left out of the committed set passes through without
    /// signing. A cross-check mismatch aborts signing with an error.
    pub fn signer_receive_challenge(
        &mut self,
        committed: &SignerBitmap,
        digest: &Scalar,
        aggregate_commitment: &Point,
        aggregate_public_key: &Point,
    ) -> Result<(), AggregateError> {
        self.require_role(self.is_signer, "respond to the challenge", "signer")?;
        self.require_state(
            "respond to the challenge",
            &[SessionState::CommitmentsSent, SessionState::ChallengeSent],
        )?;
        let signer_count = self.all_public_keys.len();
        if committed.len() != signer_count {
            return Err(AggregateError::BitmapLength {
                expected: signer_count,
                actual: committed.len(),
            });
        }
        if committed.count_committed() == 0 {
            return Err(AggregateError::NoCommittedSigners);
        }
        let me = self
            .signer_index
            .ok_or(AggregateError::SignerKeyNotRegistered {
                public_key_hex: self.public_key.to_hex_compressed(),
            })?;

        self.committed_signers = committed.clone();
        if !committed.is_committed(me) {
            warn!(
                signer = me,
                "asked for a solution while not among the committed signers; not signing"
            );
            self.my_solution = Scalar::ZERO;
            self.state = SessionState::SolutionsSent;
            return Ok(());
        }

        self.compute_concatenated_committed_keys()?;
        self.compute_locking_coefficients()?;
        let recomputed_key = self.locked_aggregate_public_key()?;
        if recomputed_key != *aggregate_public_key {
            return Err(AggregateError::AggregatorMismatch {
                quantity: "aggregate public key",
                ours: recomputed_key.to_hex_compressed(),
                theirs: aggregate_public_key.to_hex_compressed(),
            });
        }
        let recomputed_digest = challenge_digest(
            &recomputed_key.serialize_compressed()?,
            &aggregate_commitment.serialize_compressed()?,
            &self.message,
        );
        if recomputed_digest != *digest {
            return Err(AggregateError::AggregatorMismatch {
                quantity: "message digest",
                ours: recomputed_digest.to_hex(),
                theirs: digest.to_hex(),
            });
        }

        self.aggregate_public_key = recomputed_key;
        self.aggregate_commitment = *aggregate_commitment;
        self.message_digest = recomputed_digest;
        self.my_solution = self
            .message_digest
            .multiply(&self.my_locking_coefficient)
            .multiply(&self.secret_key)
            .add(&self.nonce);
        self.state = SessionState::SolutionsSent;
        Ok(())
    }

    /// Aggregator, round three: sum the committed signers' solution
    /// shares into the final signature.
    ///
    /// `solutions` is indexed like the sorted key list; entries for
    /// uncommitted signers are ignored, but every committed index must be
    /// present.
    pub fn aggregator_aggregate(
        &mut self,
        solutions: &[Scalar],
    ) -> Result<(), AggregateError> {
        self.require_role(self.is_aggregator, "aggregate the solutions", "aggregator")?;
        self.require_state(
            "aggregate the solutions",
            &[SessionState::ChallengeSent, SessionState::SolutionsSent],
        )?;
        let signer_count = self.all_public_keys.len();
        if solutions.len() > signer_count {
            return Err(AggregateError::TooManySolutions {
                provided: solutions.len(),
                registered: signer_count,
            });
        }
        let mut sum = Scalar::ZERO;
        for index in self.committed_signers.committed_indices() {
            let share = solutions
                .get(index)
                .ok_or(AggregateError::MissingSolution { index })?;
            sum = sum.add(share);
        }
        self.all_solutions = solutions.to_vec();
        self.aggregate_solution = sum.clone();
        self.signature = SchnorrSignature {
            challenge: self.aggregate_commitment,
            solution: sum,
            public_key: self.aggregate_public_key,
            message: self.message.clone(),
        };
        self.state = SessionState::Aggregated;
        Ok(())
    }

    /// Replays the ceremony's public computation from the registered
    /// keys, the committed-signer bitmap and the held signature, and
    /// checks the verification equation.
    ///
    /// Usable from any state and repeatable; never panics on bad input.
    /// With `want_details` the outcome carries every public intermediate
    /// quantity.
    pub fn verify(&mut self, want_details: bool) -> VerificationOutcome {
        self.state = SessionState::VerifyingAggregate;
        let result = self.verify_equation();
        let (accepted, reason, sides) = match result {
            Ok((true, left, right)) => (true, None, Some((left, right))),
            Ok((false, left, right)) => (
                false,
                Some("the aggregate signature equation does not hold".to_string()),
                Some((left, right)),
            ),
            Err(error) => (false, Some(error.to_string()), None),
        };
        let details = if want_details {
            Some(self.verify_diagnostics(sides))
        } else {
            None
        };
        VerificationOutcome {
            accepted,
            reason,
            details,
        }
    }

    fn verify_equation(&mut self) -> Result<(bool, Point, Point), AggregateError> {
        let signer_count = self.all_public_keys.len();
        if signer_count == 0 {
            return Err(AggregateError::NoRegisteredKeys);
        }
        if self.committed_signers.len() != signer_count {
            return Err(AggregateError::BitmapLength {
                expected: signer_count,
                actual: self.committed_signers.len(),
            });
        }
        if self.committed_signers.count_committed() == 0 {
            return Err(AggregateError::NoCommittedSigners);
        }
        self.aggregate_commitment = self.signature.challenge;
        self.aggregate_solution = self.signature.solution.clone();
        self.all_public_keys.sort();
        self.compute_concatenated_committed_keys()?;
        self.compute_locking_coefficients()?;
        self.aggregate_public_key = self.locked_aggregate_public_key()?;
        self.compute_message_digest()?;

        let left = self.aggregate_solution.compute_public_key()?;
        let right = self
            .aggregate_public_key
            .exponentiate(&self.message_digest)?
            .combine(&self.aggregate_commitment)?;
        Ok((left == right, left, right))
    }

    fn verify_diagnostics(&self, sides: Option<(Point, Point)>) -> VerifyDiagnostics {
        VerifyDiagnostics {
            message_hex: hex::encode(&self.message),
            committed_signers: self.committed_signers.to_string(),
            public_keys: self
                .all_public_keys
                .iter()
                .map(Point::to_hex_compressed)
                .collect(),
            locking_coefficients: self
                .locking_coefficients
                .iter()
                .map(Scalar::to_hex)
                .collect(),
            aggregate_public_key: self.aggregate_public_key.to_hex_compressed(),
            aggregate_commitment: self.aggregate_commitment.to_hex_compressed(),
            message_digest: self.message_digest.to_hex(),
            aggregate_solution: self.aggregate_solution.to_hex(),
            left_side: sides.map(|(left, _)| left.to_hex_compressed()),
            right_side: sides.map(|(_, right)| right.to_hex_compressed()),
        }
    }

    /// Sets the message a verifier session checks a signature against.
    pub fn set_message(&mut self, message: &[u8]) {
        self.message = message.to_vec();
    }

    // Derived quantities. Each recomputes one piece of the locked
    // aggregate from the committed key set.

    fn compute_aggregate_commitment(&mut self) -> Result<(), AggregateError> {
        let mut committed = Vec::with_capacity(self.committed_signers.count_committed());
        for index in self.committed_signers.committed_indices() {
            let commitment = self.all_commitments.get(index).copied().unwrap_or_default();
            if !commitment.is_initialized() {
                return Err(AggregateError::MissingCommitment { index });
            }
            committed.push(commitment);
        }
        self.aggregate_commitment = Point::combine_many(&committed)?;
        Ok(())
    }

    fn compute_concatenated_committed_keys(&mut self) -> Result<(), AggregateError> {
        let mut concatenated = Vec::with_capacity(
            self.committed_signers.count_committed() * COMPRESSED_POINT_LENGTH,
        );
        for index in self.committed_signers.committed_indices() {
            concatenated.extend_from_slice(&self.all_public_keys[index].serialize_compressed()?);
        }
        self.concatenated_committed_keys = concatenated;
        Ok(())
    }

    /// The locking coefficient of committed signer `i` is the SHA3-256 of
    /// the concatenated committed keys followed by key `i`, reduced.
    /// With exactly one committed signer no rogue-key cancellation is
    /// possible and the coefficient short-circuits to one.
    fn compute_locking_coefficients(&mut self) -> Result<(), AggregateError> {
        let mut coefficients = vec![Scalar::ZERO; self.all_public_keys.len()];
        let committed: Vec<usize> = self.committed_signers.committed_indices().collect();
        if committed.len() == 1 {
            coefficients[committed[0]] = Scalar::from_u32(1);
        } else {
            for &index in &committed {
                let mut hasher = Sha3_256::new();
                hasher.update(&self.concatenated_committed_keys);
                hasher.update(self.all_public_keys[index].serialize_compressed()?);
                coefficients[index] = Scalar::from_bytes_reduced(hasher.finalize().into());
            }
        }
        self.locking_coefficients = coefficients;
        if let Some(me) = self.signer_index {
            self.my_locking_coefficient = self
                .locking_coefficients
                .get(me)
                .cloned()
                .unwrap_or(Scalar::ZERO);
        }
        Ok(())
    }

    fn locked_aggregate_public_key(&self) -> Result<Point, AggregateError> {
        let mut locked = Vec::with_capacity(self.committed_signers.count_committed());
        for index in self.committed_signers.committed_indices() {
            locked.push(self.all_public_keys[index].exponentiate(&self.locking_coefficients[index])?);
        }
        Point::combine_many(&locked)
    }

    fn compute_message_digest(&mut self) -> Result<(), AggregateError> {
        self.message_digest = challenge_digest(
            &self.aggregate_public_key.serialize_compressed()?,
            &self.aggregate_commitment.serialize_compressed()?,
            &self.message,
        );
        Ok(())
    }

    fn require_role(
        &self,
        held: bool,
        operation: &'static str,
        role: &'static str,
    ) -> Result<(), AggregateError> {
        if held {
            Ok(())
        } else {
            Err(AggregateError::WrongRole { operation, role })
        }
    }

    fn require_state(
        &self,
        operation: &'static str,
        allowed: &[SessionState],
    ) -> Result<(), AggregateError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(AggregateError::WrongState {
                operation,
                state: self.state.name(),
            })
        }
    }

    // Read accessors for the quantities the protocol requires parties to
    // exchange out of band.

    /// Current ceremony state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether this session holds the aggregator role.
    pub fn is_aggregator(&self) -> bool {
        self.is_aggregator
    }

    /// Whether this session holds the signer role.
    pub fn is_signer(&self) -> bool {
        self.is_signer
    }

    /// This signer's index into the sorted key list, once registered.
    pub fn signer_index(&self) -> Option<usize> {
        self.signer_index
    }

    /// This signer's public key.
    pub fn my_public_key(&self) -> &Point {
        &self.public_key
    }

    /// The registered signer keys, sorted.
    pub fn public_keys(&self) -> &[Point] {
        &self.all_public_keys
    }

    /// The message under signature.
    pub fn message(&self) -> &[u8] {
        &self.message
    }

    /// This signer's nonce commitment.
    pub fn my_commitment(&self) -> &Point {
        &self.commitment
    }

    /// Which signers committed.
    pub fn committed_signers(&self) -> &SignerBitmap {
        &self.committed_signers
    }

    /// How many signers committed.
    pub fn committed_signer_count(&self) -> usize {
        self.committed_signers.count_committed()
    }

    /// The combined nonce commitment.
    pub fn aggregate_commitment(&self) -> &Point {
        &self.aggregate_commitment
    }

    /// The locked aggregate public key.
    pub fn aggregate_public_key(&self) -> &Point {
        &self.aggregate_public_key
    }

    /// The challenge digest.
    pub fn message_digest(&self) -> &Scalar {
        &self.message_digest
    }

    /// This signer's locking coefficient.
    pub fn my_locking_coefficient(&self) -> &Scalar {
        &self.my_locking_coefficient
    }

    /// This signer's solution share.
    pub fn my_solution(&self) -> &Scalar {
        &self.my_solution
    }

    /// The summed solution.
    pub fn aggregate_solution(&self) -> &Scalar {
        &self.aggregate_solution
    }

    /// The final signature, once aggregated or parsed.
    pub fn signature(&self) -> &SchnorrSignature {
        &self.signature
    }
}
