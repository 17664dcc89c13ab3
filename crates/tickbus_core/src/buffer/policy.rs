//! # Overflow Policy
//!
//! What a ring buffer does when a publish finds it full.

use serde::{Deserialize, Serialize};

/// Behavior of a full [`super::EventBuffer`] on publish.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the new value; the buffer is unchanged.
    #[default]
    DropNewest,
    /// Evict the single oldest unread value, then admit the new one.
    DropOldest,
    /// Double the backing storage, then admit the new value. No data loss.
    Resize,
    /// Same as `DropNewest`, plus a warning on the diagnostic sink.
    LogAndDrop,
}

impl OverflowPolicy {
    /// Checks if a publish under this policy can be rejected.
    #[inline]
    #[must_use]
    pub const fn may_reject(self) -> bool {
        matches!(self, Self::DropNewest | Self::LogAndDrop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_may_reject() {
        assert!(OverflowPolicy::DropNewest.may_reject());
        assert!(OverflowPolicy::LogAndDrop.may_reject());
        assert!(!OverflowPolicy::DropOldest.may_reject());
        assert!(!OverflowPolicy::Resize.may_reject());
    }

    #[test]
    fn test_default_is_drop_newest() {
        assert_eq!(OverflowPolicy::default(), OverflowPolicy::DropNewest);
    }
}
