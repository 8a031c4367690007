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

//! Diagnostic snapshots of a session.
//!
//! A snapshot renders everything a session knows, including its secret
//! key and nonce for signer roles. It exists for debugging ceremonies,
//! never for transport: treat the output as secret material.

use serde::Serialize;

use crate::scalar::SECRET_VERSION_BYTE;
use crate::session::AggregationSession;

/// A full dump of one session's view of the ceremony.
///
/// Fields prefixed `secret_` are populated only for signer roles and
/// disclose key material.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSnapshot {
    /// Which roles the session holds.
    pub role: String,
    /// Current ceremony state.
    pub state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signer_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_hex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub committed_signers: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_public_keys: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_commitments: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locking_coefficients: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_commitment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_digest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate_solution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_base58: Option<String>,
    /// The signer's secret key, base58check. Signer roles only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key_base58: Option<String>,
    /// The signer's nonce, base58check. Signer roles only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_nonce_base58: Option<String>,
}

impl SessionSnapshot {
    /// The snapshot as a JSON value.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl AggregationSession {
    /// Dumps the session, secrets included for signer roles. See the
    /// module warning.
    pub fn snapshot(&self) -> SessionSnapshot {
        let role = match (self.is_aggregator(), self.is_signer()) {
            (true, true) => "aggregator+signer",
            (true, false) => "aggregator",
            (false, true) => "signer",
            (false, false) => "verifier",
        };
        let point_field = |point: &crate::point::Point| {
            point.is_initialized().then(|| point.to_hex_compressed())
        };
        let scalar_field = |scalar: &crate::scalar::Scalar| {
            (!scalar.is_zero()).then(|| scalar.to_hex())
        };

        SessionSnapshot {
            role: role.to_string(),
            state: self.state().name().to_string(),
            signer_index: self.signer_index(),
            public_key: point_field(self.my_public_key()),
            message_hex: (!self.message().is_empty()).then(|| hex::encode(self.message())),
            commitment: point_field(self.my_commitment()),
            committed_signers: (!self.committed_signers().is_empty())
                .then(|| self.committed_signers().to_string()),
            all_public_keys: (!self.public_keys().is_empty()).then(|| {
                self.public_keys()
                    .iter()
                    .map(|key| key.to_hex_compressed())
                    .collect()
            }),
            all_commitments: self
                .all_commitments
                .iter()
                .any(|commitment| commitment.is_initialized())
                .then(|| {
                    self.all_commitments
                        .iter()
                        .map(|commitment| commitment.to_hex_compressed())
                        .collect()
                }),
            locking_coefficients: (!self.locking_coefficients.is_empty()).then(|| {
                self.locking_coefficients
                    .iter()
                    .map(|coefficient| coefficient.to_hex())
                    .collect()
            }),
            aggregate_commitment: point_field(self.aggregate_commitment()),
            aggregate_public_key: point_field(self.aggregate_public_key()),
            message_digest: scalar_field(self.message_digest()),
            my_solution: scalar_field(self.my_solution()),
            aggregate_solution: scalar_field(self.aggregate_solution()),
            signature_base58: self
                .signature()
                .challenge
                .is_initialized()
                .then(|| self.signature().to_base58().ok())
                .flatten(),
            secret_key_base58: (self.is_signer() && !self.secret_key.is_zero())
                .then(|| self.secret_key.to_base58_check(SECRET_VERSION_BYTE)),
            secret_nonce_base58: (self.is_signer() && !self.nonce.is_zero())
                .then(|| self.nonce.to_base58_check(SECRET_VERSION_BYTE)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::Scalar;
    use crate::session::SessionState;

    #[test]
    fn fresh_sessions_snapshot_to_role_and_state_only() {
        let snapshot = AggregationSession::new(false, false).snapshot();
        assert_eq!(snapshot.role, "verifier");
        assert_eq!(snapshot.state, SessionState::Uninitialized.name());
        assert!(snapshot.public_key.is_none());
        assert!(snapshot.secret_key_base58.is_none());
        let json = snapshot.to_json();
        assert!(json.get("secret_key_base58").is_none());
        assert!(json.get("role").is_some());
    }

    #[test]
    fn signer_snapshots_disclose_secret_material() {
        let secret = Scalar::from_u32(12345);
        let mut signer = AggregationSession::with_secret_key(false, secret.clone()).unwrap();
        let keys = vec![*signer.my_public_key()];
        signer.initialize_public_keys(&keys).unwrap();
        signer
            .signer_commit(b"snapshot me", Some(Scalar::from_u32(678)))
            .unwrap();

        let snapshot = signer.snapshot();
        assert_eq!(snapshot.role, "signer");
        assert_eq!(snapshot.state, SessionState::CommitmentsSent.name());
        assert_eq!(snapshot.signer_index, Some(0));
        assert_eq!(
            snapshot.secret_key_base58,
            Some(secret.to_base58_check(SECRET_VERSION_BYTE))
        );
        assert_eq!(
            snapshot.secret_nonce_base58,
            Some(Scalar::from_u32(678).to_base58_check(SECRET_VERSION_BYTE))
        );
        assert_eq!(snapshot.message_hex, Some(hex::encode(b"snapshot me")));
        assert!(snapshot.commitment.is_some());
    }

    #[test]
    fn verifier_snapshots_never_carry_secrets() {
        let mut signer = AggregationSession::with_generated_key(false);
        let keys = vec![*signer.my_public_key()];
        signer.initialize_public_keys(&keys).unwrap();

        let mut verifier = AggregationSession::new(false, false);
        verifier.initialize_public_keys(&keys).unwrap();
        let snapshot = verifier.snapshot();
        assert!(snapshot.secret_key_base58.is_none());
        assert!(snapshot.secret_nonce_base58.is_none());
        assert_eq!(snapshot.all_public_keys.as_ref().map(Vec::len), Some(1));
    }
}
