// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types.
//!
//! Only recoverable input problems are errors. Contract violations such as
//! painting before preroll or stamping frame timings out of order panic, and
//! a full pipeline is reported as `None` from
//! [`Pipeline::produce`](crate::pipeline::Pipeline::produce).

use crate::layer::LayerId;

/// Convenience result type used across lamina.
pub type LaminaResult<T> = Result<T, LaminaError>;

/// Rejected [`LayerTree::assign_old_layer`](crate::layer::LayerTree::assign_old_layer)
/// calls. The first link recorded wins.
#[derive(thiserror::Error, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkError {
    /// The old layer is already claimed by another new layer.
    #[error("old layer {old:?} is already claimed by {claimed_by:?}")]
    DuplicateOldLayer {
        /// The contested old layer.
        old: LayerId,
        /// The new layer holding the existing claim.
        claimed_by: LayerId,
    },

    /// The new layer is already linked to an old layer.
    #[error("layer {new:?} is already linked to old layer {old:?}")]
    AlreadyLinked {
        /// The new layer.
        new: LayerId,
        /// The old layer it is linked to.
        old: LayerId,
    },
}

/// Top-level error taxonomy.
#[derive(thiserror::Error, Debug)]
pub enum LaminaError {
    /// Invalid old-layer linkage.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread")]
    Spawn {
        /// Thread name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl LaminaError {
    /// Build a [`LaminaError::Spawn`] value.
    pub fn spawn(name: impl Into<String>, source: std::io::Error) -> Self {
        Self::Spawn {
            name: name.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_error_converts() {
        let new = LayerId::next();
        let old = LayerId::next();
        let err: LaminaError = LinkError::AlreadyLinked { new, old }.into();
        assert!(matches!(err, LaminaError::Link(LinkError::AlreadyLinked { .. })));
        assert_eq!(
            err.to_string(),
            format!("layer {new:?} is already linked to old layer {old:?}")
        );
    }

    #[test]
    fn spawn_error_keeps_source() {
        let err = LaminaError::spawn("vsync", std::io::Error::other("no threads"));
        assert_eq!(err.to_string(), "failed to spawn vsync thread");
        assert!(std::error::Error::source(&err).is_some());
    }
}
