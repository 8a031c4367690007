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

use criterion::{criterion_group, criterion_main, Criterion};

use schnorr_agg::codec::verify_from_complete;
use schnorr_agg::{AggregationSession, Point, Scalar, SchnorrSignature, SignerBitmap};

/// Runs a whole ceremony with `count` signers, everyone committed.
fn aggregate(count: usize, message: &[u8]) -> AggregationSession {
    let mut signers: Vec<AggregationSession> = (0..count)
        .map(|i| {
            AggregationSession::with_secret_key(false, Scalar::from_u32(40_000 + i as u32))
                .expect("non-zero secret")
        })
        .collect();
    let keys: Vec<Point> = signers.iter().map(|s| *s.my_public_key()).collect();

    let mut aggregator = AggregationSession::new(true, false);
    aggregator.initialize_public_keys(&keys).unwrap();
    aggregator.aggregator_send_message(message).unwrap();

    let mut commitments = vec![Point::default(); count];
    let bitmap = SignerBitmap::all_committed(count).unwrap();
    for signer in signers.iter_mut() {
        signer.initialize_public_keys(&keys).unwrap();
        signer.signer_commit(message, None).unwrap();
        commitments[signer.signer_index().unwrap()] = *signer.my_commitment();
    }
    aggregator
        .aggregator_receive_commitments(&commitments, &bitmap)
        .unwrap();

    let digest = aggregator.message_digest().clone();
    let aggregate_commitment = *aggregator.aggregate_commitment();
    let aggregate_public_key = *aggregator.aggregate_public_key();
    let mut solutions = vec![Scalar::ZERO; count];
    for signer in signers.iter_mut() {
        signer
            .signer_receive_challenge(&bitmap, &digest, &aggregate_commitment, &aggregate_public_key)
            .unwrap();
        solutions[signer.signer_index().unwrap()] = signer.my_solution().clone();
    }
    aggregator.aggregator_aggregate(&solutions).unwrap();
    aggregator
}

fn sign(c: &mut Criterion) {
    let secret = Scalar::from_u32(12_345);
    c.bench_function("single Schnorr signing", move |b| {
        b.iter(|| SchnorrSignature::sign(&secret, b"benched message", None).unwrap())
    });
}

fn verify(c: &mut Criterion) {
    let signature = SchnorrSignature::sign(&Scalar::from_u32(12_345), b"benched message", None)
        .unwrap();
    c.bench_function("single Schnorr verification", move |b| {
        b.iter(|| assert!(signature.verify()))
    });
}

fn aggregate_three(c: &mut Criterion) {
    c.bench_function("full three-signer aggregation ceremony", move |b| {
        b.iter(|| aggregate(3, b"benched ceremony"))
    });
}

fn verify_aggregate(c: &mut Criterion) {
    let bytes = aggregate(3, b"benched ceremony")
        .serialize_complete()
        .unwrap();
    c.bench_function("aggregate verification from the complete form", move |b| {
        b.iter(|| assert!(verify_from_complete(&bytes, b"benched ceremony", false).accepted))
    });
}

criterion_group! {
    name = aggregate_benchmarks;
    config = Criterion::default();
    targets = sign, verify, aggregate_three, verify_aggregate,
}
criterion_main!(aggregate_benchmarks);
