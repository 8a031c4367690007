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

//! Shared secp256k1 context.
//!
//! Building a libsecp256k1 context precomputes multiplication tables, so the
//! crate keeps a single randomized instance and hands out references to it.

use once_cell::sync::OnceCell;
use rand::rngs::OsRng;
use rand::RngCore;
use secp256k1::{All, Secp256k1};

static GLOBAL_CONTEXT: OnceCell<CurveContext> = OnceCell::new();

/// A secp256k1 context capable of both signing and verification,
/// re-randomized with fresh OS entropy at construction to blind
/// scalar multiplications against side channels.
pub struct CurveContext {
    inner: Secp256k1<All>,
}

impl CurveContext {
    /// Builds a fresh randomized context. Most callers want
    /// [`CurveContext::global`]; this stays public so tests and embedders
    /// can run against their own instance.
    pub fn new() -> CurveContext {
        let mut inner = Secp256k1::new();
        let mut seed = [0u8; 32];
        OsRng.fill_bytes(&mut seed);
        inner.seeded_randomize(&seed);
        CurveContext { inner }
    }

    /// The process-wide shared context, built on first use.
    pub fn global() -> &'static CurveContext {
        GLOBAL_CONTEXT.get_or_init(CurveContext::new)
    }

    /// Context for operations involving secret material.
    pub fn signing(&self) -> &Secp256k1<All> {
        &self.inner
    }

    /// Context for public-data-only operations.
    pub fn verification(&self) -> &Secp256k1<All> {
        &self.inner
    }
}

impl Default for CurveContext {
    fn default() -> Self {
        CurveContext::new()
    }
}
