//! Error taxonomy for the editing core.
//!
//! Every variant is recoverable at the call boundary where it is raised:
//! a rejected request leaves the buffer, registry and keymaps unchanged.

use thiserror::Error;

/// Errors raised by the line buffer, the thingy registry and the keymap table.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZleError {
    /// The line buffer could not grow to hold the requested text.
    #[error("line buffer cannot hold {requested} characters (limit {limit})")]
    CapacityExceeded { requested: usize, limit: usize },

    /// No thingy is registered under this name.
    #[error("no such widget `{0}`")]
    UnboundName(String),

    /// An alias points at a thingy that has since been removed.
    #[error("widget `{name}` is an alias of `{target}`, which no longer exists")]
    BrokenChain { name: String, target: String },

    /// Following aliases revisited a thingy.
    #[error("alias cycle through widget `{0}`")]
    AliasCycle(String),

    /// Builtin thingies cannot be rebound or removed under their own name.
    #[error("widget `{0}` is a builtin and cannot be redefined")]
    ImmortalConflict(String),

    /// A builtin was registered twice.
    #[error("builtin widget `{0}` is already registered")]
    DuplicateBuiltin(String),

    #[error("keymap `{0}` already exists")]
    DuplicateKeymap(String),

    #[error("no such keymap `{0}`")]
    UnknownKeymap(String),

    /// The keymap is read-only (`.safe`).
    #[error("keymap `{0}` cannot be modified")]
    ImmutableKeymap(String),

    /// The keymap name is the one currently selected.
    #[error("keymap `{0}` is in use")]
    KeymapInUse(String),

    #[error("invalid key sequence `{input}`: {reason}")]
    InvalidKeySequence { input: String, reason: String },
}

pub type Result<T, E = ZleError> = std::result::Result<T, E>;

impl ZleError {
    /// Whether the error comes from the widget registry's configuration
    /// (as opposed to a rejected edit or keymap request).
    pub const fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Self::UnboundName(_) | Self::BrokenChain { .. } | Self::AliasCycle(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_offender() {
        let err = ZleError::BrokenChain {
            name: "my-accept".to_string(),
            target: "gone".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "widget `my-accept` is an alias of `gone`, which no longer exists"
        );
        assert_eq!(
            ZleError::UnknownKeymap("vi".to_string()).to_string(),
            "no such keymap `vi`"
        );
    }

    #[test]
    fn test_registry_errors_are_classified() {
        assert!(ZleError::AliasCycle("a".to_string()).is_registry_error());
        assert!(ZleError::UnboundName("a".to_string()).is_registry_error());
        assert!(!ZleError::ImmortalConflict("a".to_string()).is_registry_error());
    }
}
