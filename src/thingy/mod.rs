//! The thingy registry: names of widgets.
//!
//! Every name is a *thingy*. A thingy either names a builtin widget directly
//! or is an alias for another thingy. Builtins registered at startup are
//! immortal: they cannot be rebound or removed under their own name, but
//! they can be aliased under a different name.
//!
//! Records live in an arena indexed by [`ThingyId`]; names map to ids. Ids
//! are never reused for a different name, and removing a user thingy leaves
//! a tombstone, so an alias pointing at a removed thingy reports
//! [`ZleError::BrokenChain`] and starts working again if the name is bound
//! again.

use std::collections::{HashMap, HashSet};

use crate::error::{Result, ZleError};
use crate::widget::{BUILTIN_WIDGETS, Widget, WidgetFlags};

/// Stable index of a thingy in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThingyId(usize);

/// What a thingy refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    Builtin(Widget),
    Alias(ThingyId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRecord {
    pub kind: ActionKind,
    pub flags: WidgetFlags,
    pub immortal: bool,
}

/// The target of a user binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserTarget {
    /// Another thingy, by name.
    Alias(String),
    /// A builtin operation under a new, mortal name.
    Widget(Widget),
}

/// Result of following a thingy to its widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub widget: Widget,
    pub flags: WidgetFlags,
    /// Alias links followed.
    pub hops: usize,
}

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    record: Option<ActionRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct ThingyRegistry {
    slots: Vec<Slot>,
    ids: HashMap<String, ThingyId>,
}

impl ThingyRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the compiled-in builtin table.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (name, flags, widget) in BUILTIN_WIDGETS {
            // Names in the table are unique, so registration cannot collide.
            let _ = registry.register_builtin(name, *widget, *flags);
        }
        registry
    }

    /// Register an immortal builtin.
    ///
    /// # Errors
    ///
    /// [`ZleError::DuplicateBuiltin`] if `name` is already an immortal builtin.
    pub fn register_builtin(
        &mut self,
        name: &str,
        widget: Widget,
        flags: WidgetFlags,
    ) -> Result<ThingyId> {
        if self.is_immortal(name) {
            return Err(ZleError::DuplicateBuiltin(name.to_string()));
        }
        let record = ActionRecord {
            kind: ActionKind::Builtin(widget),
            flags,
            immortal: true,
        };
        Ok(self.store(name, record))
    }

    /// Create or replace a mortal thingy.
    ///
    /// # Errors
    ///
    /// - [`ZleError::ImmortalConflict`] if `name` is a builtin.
    /// - [`ZleError::UnboundName`] if an alias target does not exist.
    /// - [`ZleError::AliasCycle`] if the alias would lead back to `name`.
    ///
    /// The registry is unchanged when an error is returned.
    pub fn bind_user(&mut self, name: &str, target: UserTarget) -> Result<ThingyId> {
        if self.is_immortal(name) {
            return Err(ZleError::ImmortalConflict(name.to_string()));
        }
        let record = match target {
            UserTarget::Widget(widget) => ActionRecord {
                kind: ActionKind::Builtin(widget),
                flags: widget.default_flags(),
                immortal: false,
            },
            UserTarget::Alias(target) => {
                let target_id = self
                    .live_id(&target)
                    .ok_or(ZleError::UnboundName(target))?;
                if let Some(&own_id) = self.ids.get(name)
                    && self.chain_reaches(target_id, own_id)
                {
                    return Err(ZleError::AliasCycle(name.to_string()));
                }
                ActionRecord {
                    kind: ActionKind::Alias(target_id),
                    flags: WidgetFlags::empty(),
                    immortal: false,
                }
            }
        };
        tracing::debug!(name, kind = ?record.kind, "bound user widget");
        Ok(self.store(name, record))
    }

    /// Remove a mortal thingy. Removing a name that is not bound is a no-op.
    ///
    /// # Errors
    ///
    /// [`ZleError::ImmortalConflict`] if `name` is a builtin.
    pub fn unbind_user(&mut self, name: &str) -> Result<()> {
        if self.is_immortal(name) {
            return Err(ZleError::ImmortalConflict(name.to_string()));
        }
        if let Some(&id) = self.ids.get(name) {
            self.slots[id.0].record = None;
        }
        Ok(())
    }

    /// Follow aliases from `name` to a builtin widget.
    ///
    /// # Errors
    ///
    /// - [`ZleError::UnboundName`] if `name` is not bound.
    /// - [`ZleError::BrokenChain`] if an alias target has been removed.
    /// - [`ZleError::AliasCycle`] if the chain revisits a thingy. Binding
    ///   rejects cycles, so this signals a corrupted registry.
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        let mut id = self
            .live_id(name)
            .ok_or_else(|| ZleError::UnboundName(name.to_string()))?;
        let mut from = id;
        let mut visited = HashSet::new();
        let mut hops = 0;
        loop {
            if !visited.insert(id) {
                return Err(ZleError::AliasCycle(self.slots[id.0].name.clone()));
            }
            let Some(record) = self.slots[id.0].record.as_ref() else {
                return Err(ZleError::BrokenChain {
                    name: self.slots[from.0].name.clone(),
                    target: self.slots[id.0].name.clone(),
                });
            };
            match record.kind {
                ActionKind::Builtin(widget) => {
                    return Ok(Resolved {
                        widget,
                        flags: record.flags,
                        hops,
                    });
                }
                ActionKind::Alias(next) => {
                    from = id;
                    id = next;
                    hops += 1;
                }
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.live_id(name).is_some()
    }

    pub fn is_immortal(&self, name: &str) -> bool {
        self.get(name).is_some_and(|record| record.immortal)
    }

    /// The record currently bound to `name`.
    pub fn get(&self, name: &str) -> Option<&ActionRecord> {
        let id = self.ids.get(name)?;
        self.slots[id.0].record.as_ref()
    }

    /// Names of all bound thingies, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .slots
            .iter()
            .filter(|slot| slot.record.is_some())
            .map(|slot| slot.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// One-line description for listings: `name` for builtins,
    /// `name (target)` for aliases and mortal copies of a builtin.
    pub fn describe(&self, name: &str) -> Option<String> {
        let record = self.get(name)?;
        Some(match record.kind {
            ActionKind::Builtin(_) if record.immortal => name.to_string(),
            ActionKind::Builtin(widget) => format!("{name} ({widget})"),
            ActionKind::Alias(target) => format!("{name} ({})", self.slots[target.0].name),
        })
    }

    // --- Private helpers ---

    fn live_id(&self, name: &str) -> Option<ThingyId> {
        let id = *self.ids.get(name)?;
        self.slots[id.0].record.as_ref().map(|_| id)
    }

    /// Put `record` under `name`, reusing the name's id if it has one.
    fn store(&mut self, name: &str, record: ActionRecord) -> ThingyId {
        if let Some(&id) = self.ids.get(name) {
            self.slots[id.0].record = Some(record);
            return id;
        }
        let id = ThingyId(self.slots.len());
        self.slots.push(Slot {
            name: name.to_string(),
            record: Some(record),
        });
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Whether following aliases from `start` arrives at `needle`.
    fn chain_reaches(&self, start: ThingyId, needle: ThingyId) -> bool {
        let mut visited = HashSet::new();
        let mut id = start;
        loop {
            if id == needle {
                return true;
            }
            if !visited.insert(id) {
                return false;
            }
            match self.slots[id.0].record.as_ref().map(|r| r.kind) {
                Some(ActionKind::Alias(next)) => id = next,
                _ => return false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alias(target: &str) -> UserTarget {
        UserTarget::Alias(target.to_string())
    }

    #[test]
    fn test_builtins_resolve_to_themselves() {
        let registry = ThingyRegistry::with_builtins();
        let resolved = registry.resolve("accept-line").unwrap();
        assert_eq!(resolved.widget, Widget::AcceptLine);
        assert_eq!(resolved.hops, 0);
        assert!(registry.is_immortal("self-insert"));
    }

    #[test]
    fn test_three_hop_alias_chain() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("c", alias("kill-line")).unwrap();
        registry.bind_user("b", alias("c")).unwrap();
        registry.bind_user("a", alias("b")).unwrap();

        let resolved = registry.resolve("a").unwrap();
        assert_eq!(resolved.widget, Widget::KillLine);
        assert_eq!(resolved.hops, 3);
        assert!(resolved.flags.contains(WidgetFlags::KILL));
    }

    #[test]
    fn test_bind_user_over_builtin_is_rejected() {
        let mut registry = ThingyRegistry::with_builtins();
        let err = registry
            .bind_user("accept-line", UserTarget::Widget(Widget::Beep))
            .unwrap_err();
        assert_eq!(err, ZleError::ImmortalConflict("accept-line".to_string()));
        assert_eq!(registry.resolve("accept-line").unwrap().widget, Widget::AcceptLine);
    }

    #[test]
    fn test_builtin_can_be_aliased_under_new_name() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("my-accept", alias("accept-line")).unwrap();
        assert_eq!(registry.resolve("my-accept").unwrap().widget, Widget::AcceptLine);
        assert_eq!(
            registry.describe("my-accept").as_deref(),
            Some("my-accept (accept-line)")
        );
    }

    #[test]
    fn test_user_widget_can_be_replaced() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("w", UserTarget::Widget(Widget::Yank)).unwrap();
        registry.bind_user("w", alias("beep")).unwrap();
        assert_eq!(registry.resolve("w").unwrap().widget, Widget::Beep);
    }

    #[test]
    fn test_alias_cycle_rejected_at_bind_time() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("a", alias("beep")).unwrap();
        registry.bind_user("b", alias("a")).unwrap();

        let err = registry.bind_user("a", alias("b")).unwrap_err();
        assert_eq!(err, ZleError::AliasCycle("a".to_string()));
        // Unchanged: a still resolves through to beep.
        assert_eq!(registry.resolve("b").unwrap().widget, Widget::Beep);
    }

    #[test]
    fn test_self_alias_rejected() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("a", alias("beep")).unwrap();
        assert!(matches!(
            registry.bind_user("a", alias("a")),
            Err(ZleError::AliasCycle(_))
        ));
    }

    #[test]
    fn test_alias_to_missing_target_rejected() {
        let mut registry = ThingyRegistry::with_builtins();
        let err = registry.bind_user("a", alias("nope")).unwrap_err();
        assert_eq!(err, ZleError::UnboundName("nope".to_string()));
        assert!(!registry.contains("a"));
    }

    #[test]
    fn test_removed_target_breaks_then_heals_chain() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("inner", alias("yank")).unwrap();
        registry.bind_user("outer", alias("inner")).unwrap();
        registry.unbind_user("inner").unwrap();

        assert_eq!(
            registry.resolve("outer").unwrap_err(),
            ZleError::BrokenChain {
                name: "outer".to_string(),
                target: "inner".to_string()
            }
        );

        registry.bind_user("inner", alias("kill-word")).unwrap();
        assert_eq!(registry.resolve("outer").unwrap().widget, Widget::KillWord);
    }

    #[test]
    fn test_unbind_rules() {
        let mut registry = ThingyRegistry::with_builtins();
        assert_eq!(
            registry.unbind_user("yank").unwrap_err(),
            ZleError::ImmortalConflict("yank".to_string())
        );
        assert!(registry.unbind_user("never-bound").is_ok());
    }

    #[test]
    fn test_resolve_unknown_name() {
        let registry = ThingyRegistry::with_builtins();
        assert_eq!(
            registry.resolve("frobnicate").unwrap_err(),
            ZleError::UnboundName("frobnicate".to_string())
        );
    }

    #[test]
    fn test_duplicate_builtin_rejected() {
        let mut registry = ThingyRegistry::with_builtins();
        let err = registry
            .register_builtin("yank", Widget::Yank, WidgetFlags::empty())
            .unwrap_err();
        assert_eq!(err, ZleError::DuplicateBuiltin("yank".to_string()));
    }

    #[test]
    fn test_corrupted_cycle_detected_during_resolve() {
        let mut registry = ThingyRegistry::new();
        let a = registry.store(
            "a",
            ActionRecord {
                kind: ActionKind::Alias(ThingyId(1)),
                flags: WidgetFlags::empty(),
                immortal: false,
            },
        );
        registry.store(
            "b",
            ActionRecord {
                kind: ActionKind::Alias(a),
                flags: WidgetFlags::empty(),
                immortal: false,
            },
        );
        assert!(matches!(registry.resolve("a"), Err(ZleError::AliasCycle(_))));
    }

    #[test]
    fn test_names_are_sorted_and_skip_tombstones() {
        let mut registry = ThingyRegistry::with_builtins();
        registry.bind_user("zz-gone", alias("beep")).unwrap();
        registry.unbind_user("zz-gone").unwrap();
        let names = registry.names();
        assert_eq!(names.first(), Some(&"accept-line"));
        assert!(!names.contains(&"zz-gone"));
        assert!(names.windows(2).all(|w| w[0] <= w[1]));
    }
}
