// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;

use crate::error::LinkError;
use crate::layer::LayerId;

/// Explicit "this new layer replaces that old layer" declarations.
///
/// Producers that rebuild a layer (rather than sharing its `Arc`) link the
/// rebuilt layer to its predecessor so the diff engine compares the two.
/// Each old layer can be claimed once and each new layer can link once.
#[derive(Clone, Debug, Default)]
pub struct OldLayerLinks {
    new_to_old: HashMap<LayerId, LayerId>,
    old_to_new: HashMap<LayerId, LayerId>,
}

impl OldLayerLinks {
    /// Records that `new` replaces `old`.
    ///
    /// Relinking an existing pair is accepted as a no-op.
    pub fn assign(&mut self, new: LayerId, old: LayerId) -> Result<(), LinkError> {
        if let Some(&linked) = self.new_to_old.get(&new) {
            if linked == old {
                return Ok(());
            }
            return Err(LinkError::AlreadyLinked { new, old: linked });
        }
        if let Some(&claimed_by) = self.old_to_new.get(&old) {
            return Err(LinkError::DuplicateOldLayer { old, claimed_by });
        }
        self.new_to_old.insert(new, old);
        self.old_to_new.insert(old, new);
        Ok(())
    }

    /// The old layer `new` replaces, if any.
    #[must_use]
    pub fn resolve(&self, new: LayerId) -> Option<LayerId> {
        self.new_to_old.get(&new).copied()
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.new_to_old.len()
    }

    /// Whether there are no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.new_to_old.is_empty()
    }
}
