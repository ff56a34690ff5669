// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer identity.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

static NEXT_LAYER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Layer`](super::Layer).
///
/// Assigned once when the layer is constructed and never reused. Paint
/// regions and old-layer links are keyed by it, so a layer shared between
/// two frames through its `Arc` keeps the same id in both.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(u64);

impl LayerId {
    pub(crate) fn next() -> Self {
        Self(NEXT_LAYER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value (for diagnostics only).
    #[inline]
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LayerId({})", self.0)
    }
}
