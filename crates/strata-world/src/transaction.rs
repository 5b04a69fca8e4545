//! Before/after pairs handed to event listeners.
//!
//! A [`Transaction`] starts out valid. Listeners may mark it invalid (the
//! change is rolled back on its own while the rest of the batch commits) or
//! attach a custom replacement that is written in place of the proposed
//! final value.

use std::sync::Arc;

use crate::snapshot::BlockSnapshot;

/// A block change as seen by listeners.
pub type BlockTransaction = Transaction<Arc<BlockSnapshot>>;

/// An (original, final) pair with a validity flag and optional override.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction<T> {
    original: T,
    final_value: T,
    valid: bool,
    custom: Option<T>,
}

impl<T> Transaction<T> {
    pub fn new(original: T, final_value: T) -> Self {
        Self {
            original,
            final_value,
            valid: true,
            custom: None,
        }
    }

    pub fn original(&self) -> &T {
        &self.original
    }

    /// The value proposed by the mutation, ignoring any custom replacement.
    pub fn final_value(&self) -> &T {
        &self.final_value
    }

    pub fn custom(&self) -> Option<&T> {
        self.custom.as_ref()
    }

    /// Replace the final value with `value` when the batch commits.
    pub fn set_custom(&mut self, value: T) {
        self.custom = Some(value);
    }

    pub fn clear_custom(&mut self) {
        self.custom = None;
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    /// Shorthand for `set_valid(false)`.
    pub fn invalidate(&mut self) {
        self.valid = false;
    }

    /// The value that will be in place after commit: the custom
    /// replacement if one is set, the proposed final value otherwise.
    pub fn effective_final(&self) -> &T {
        self.custom.as_ref().unwrap_or(&self.final_value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_valid_without_custom() {
        let tx = Transaction::new(1, 2);
        assert!(tx.is_valid());
        assert_eq!(tx.custom(), None);
        assert_eq!(*tx.effective_final(), 2);
    }

    #[test]
    fn custom_overrides_effective_final_only() {
        let mut tx = Transaction::new("stone", "air");
        tx.set_custom("gravel");
        assert_eq!(*tx.final_value(), "air");
        assert_eq!(*tx.effective_final(), "gravel");
        tx.clear_custom();
        assert_eq!(*tx.effective_final(), "air");
    }

    #[test]
    fn invalidate_flips_validity() {
        let mut tx = Transaction::new(0u8, 1u8);
        tx.invalidate();
        assert!(!tx.is_valid());
        tx.set_valid(true);
        assert!(tx.is_valid());
    }
}
