//! Keymaps: named tables from key sequences to widget names.
//!
//! A [`KeymapTable`] holds every keymap under one or more names (a name can
//! be a link to another keymap, as `main` is to `emacs`), tracks the
//! selected keymap, and answers the incremental question the dispatch loop
//! asks after every input byte: [`KeymapTable::match_prefix`].
//!
//! Bindings store thingy *names*, not widgets. Names are resolved through
//! the registry when the key is dispatched, so rebinding a widget name
//! affects every key bound to it.

mod defaults;
mod keyseq;

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

pub use defaults::{ISEARCH_KEYMAP, MAIN_KEYMAP, SAFE_KEYMAP};
pub use keyseq::{format_key_sequence, parse_key_sequence, utf8_len};

use crate::error::{Result, ZleError};

/// What a key sequence is bound to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyBinding {
    /// A widget, by thingy name.
    Thingy(String),
    /// Bytes fed back into the input and interpreted as if typed.
    SendString(Vec<u8>),
}

impl std::fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Thingy(name) => f.write_str(name),
            Self::SendString(bytes) => write!(f, "\"{}\"", format_key_sequence(bytes)),
        }
    }
}

/// Actions used for input that has no binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fallback {
    /// For a single printable character.
    pub printable: String,
    /// For everything else.
    pub other: String,
}

impl Default for Fallback {
    fn default() -> Self {
        Self {
            printable: "self-insert".to_string(),
            other: "undefined-key".to_string(),
        }
    }
}

/// Outcome of matching the bytes read so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyMatch {
    /// Nothing is bound to these bytes or to any extension of them.
    NoMatch,
    /// Not bound, but a longer bound sequence starts with these bytes.
    Partial,
    /// Bound, and no longer sequence starts with these bytes.
    Exact(KeyBinding),
    /// Bound, and a longer bound sequence also starts with these bytes.
    Ambiguous(KeyBinding),
}

#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: BTreeMap<Vec<u8>, KeyBinding>,
    fallback: Fallback,
    immutable: bool,
}

impl Keymap {
    pub const fn new(fallback: Fallback) -> Self {
        Self {
            bindings: BTreeMap::new(),
            fallback,
            immutable: false,
        }
    }

    pub fn get(&self, seq: &[u8]) -> Option<&KeyBinding> {
        self.bindings.get(seq)
    }

    /// Whether some bound sequence is strictly longer than `seq` and starts with it.
    pub fn can_extend(&self, seq: &[u8]) -> bool {
        self.bindings
            .range::<[u8], _>((Bound::Excluded(seq), Bound::Unbounded))
            .next()
            .is_some_and(|(key, _)| key.starts_with(seq))
    }

    pub fn lookup(&self, seq: &[u8]) -> KeyMatch {
        classify(self.get(seq).cloned(), self.can_extend(seq))
    }

    pub const fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    pub const fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Bindings in byte order.
    pub fn bindings(&self) -> impl Iterator<Item = (&[u8], &KeyBinding)> {
        self.bindings.iter().map(|(seq, binding)| (seq.as_slice(), binding))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    fn insert(&mut self, seq: Vec<u8>, binding: KeyBinding) {
        self.bindings.insert(seq, binding);
    }
}

fn classify(exact: Option<KeyBinding>, extendable: bool) -> KeyMatch {
    match (exact, extendable) {
        (None, false) => KeyMatch::NoMatch,
        (None, true) => KeyMatch::Partial,
        (Some(binding), false) => KeyMatch::Exact(binding),
        (Some(binding), true) => KeyMatch::Ambiguous(binding),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeymapId(usize);

/// All keymaps by name, plus the current and local (overlay) selection.
#[derive(Debug, Clone)]
pub struct KeymapTable {
    maps: Vec<Keymap>,
    names: HashMap<String, KeymapId>,
    current: String,
    local: Option<KeymapId>,
}

impl KeymapTable {
    /// The builtin keymaps with `main` linked to `emacs`, or to `viins`
    /// when `vi` is set.
    pub fn with_defaults(vi: bool) -> Self {
        let mut table = Self {
            maps: Vec::new(),
            names: HashMap::new(),
            current: String::new(),
            local: None,
        };
        defaults::install(&mut table, vi);
        table
    }

    /// Create a keymap, empty or copied from `copy_from`.
    ///
    /// # Errors
    ///
    /// [`ZleError::DuplicateKeymap`] if `name` exists, or
    /// [`ZleError::UnknownKeymap`] if `copy_from` does not.
    pub fn create_keymap(&mut self, name: &str, copy_from: Option<&str>) -> Result<()> {
        if self.names.contains_key(name) {
            return Err(ZleError::DuplicateKeymap(name.to_string()));
        }
        let keymap = match copy_from {
            Some(source) => {
                let mut copy = self.require(source)?.clone();
                copy.immutable = false;
                copy
            }
            None => Keymap::new(Fallback::default()),
        };
        self.insert_builtin(name, keymap);
        Ok(())
    }

    /// Make `name` another name for the keymap called `existing`,
    /// replacing whatever `name` referred to before.
    ///
    /// # Errors
    ///
    /// [`ZleError::UnknownKeymap`] if `existing` does not exist, or
    /// [`ZleError::ImmutableKeymap`] if `name` currently names a read-only keymap.
    pub fn link_keymap(&mut self, name: &str, existing: &str) -> Result<()> {
        let id = self.id(existing)?;
        if self.keymap(name).is_some_and(Keymap::is_immutable) {
            return Err(ZleError::ImmutableKeymap(name.to_string()));
        }
        self.names.insert(name.to_string(), id);
        Ok(())
    }

    /// Remove a keymap name. The keymap survives under its other names.
    ///
    /// # Errors
    ///
    /// [`ZleError::UnknownKeymap`], [`ZleError::ImmutableKeymap`] for a
    /// read-only keymap, or [`ZleError::KeymapInUse`] for the selected name.
    pub fn delete_keymap(&mut self, name: &str) -> Result<()> {
        let keymap = self.require(name)?;
        if keymap.is_immutable() {
            return Err(ZleError::ImmutableKeymap(name.to_string()));
        }
        if name == self.current || name == MAIN_KEYMAP {
            return Err(ZleError::KeymapInUse(name.to_string()));
        }
        self.names.remove(name);
        Ok(())
    }

    /// Make `name` the current keymap.
    ///
    /// # Errors
    ///
    /// [`ZleError::UnknownKeymap`]; the current keymap is unchanged.
    pub fn select(&mut self, name: &str) -> Result<()> {
        self.id(name)?;
        if self.current != name {
            tracing::debug!(from = %self.current, to = name, "select keymap");
            self.current = name.to_string();
        }
        Ok(())
    }

    pub fn current_name(&self) -> &str {
        &self.current
    }

    /// Install `name` as an overlay consulted before the current keymap,
    /// or remove the overlay with `None`.
    ///
    /// # Errors
    ///
    /// [`ZleError::UnknownKeymap`].
    pub fn set_local(&mut self, name: Option<&str>) -> Result<()> {
        self.local = name.map(|name| self.id(name)).transpose()?;
        Ok(())
    }

    pub const fn has_local(&self) -> bool {
        self.local.is_some()
    }

    /// Bind `seq` to the thingy `action` in `keymap`.
    ///
    /// # Errors
    ///
    /// [`ZleError::UnknownKeymap`], [`ZleError::ImmutableKeymap`], or
    /// [`ZleError::InvalidKeySequence`] for an empty sequence.
    pub fn bind(&mut self, keymap: &str, seq: &[u8], action: &str) -> Result<()> {
        self.bind_as(keymap, seq, KeyBinding::Thingy(action.to_string()))
    }

    /// Bind `seq` in `keymap` to feed `bytes` back into the input.
    ///
    /// # Errors
    ///
    /// As for [`KeymapTable::bind`].
    pub fn bind_string(&mut self, keymap: &str, seq: &[u8], bytes: &[u8]) -> Result<()> {
        self.bind_as(keymap, seq, KeyBinding::SendString(bytes.to_vec()))
    }

    /// Remove the binding for `seq`. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// [`ZleError::UnknownKeymap`] or [`ZleError::ImmutableKeymap`].
    pub fn unbind(&mut self, keymap: &str, seq: &[u8]) -> Result<bool> {
        let map = self.require_mut(keymap)?;
        Ok(map.bindings.remove(seq).is_some())
    }

    /// Match the bytes read so far against the local overlay (if any) and
    /// the current keymap. A binding in the overlay wins over one in the
    /// current keymap; an extension in either keeps the match open.
    pub fn match_prefix(&self, seq: &[u8]) -> KeyMatch {
        let current = self.current_keymap();
        let local = self.local.map(|id| &self.maps[id.0]);
        let exact = local
            .and_then(|map| map.get(seq))
            .or_else(|| current.get(seq))
            .cloned();
        let extendable = local.is_some_and(|map| map.can_extend(seq)) || current.can_extend(seq);
        classify(exact, extendable)
    }

    /// Fallback actions for unbound input: the overlay's if one is set,
    /// else the current keymap's.
    pub fn fallback(&self) -> &Fallback {
        match self.local {
            Some(id) => self.maps[id.0].fallback(),
            None => self.current_keymap().fallback(),
        }
    }

    pub fn keymap(&self, name: &str) -> Option<&Keymap> {
        self.names.get(name).map(|id| &self.maps[id.0])
    }

    /// All keymap names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Whether two names refer to the same keymap.
    pub fn is_linked(&self, a: &str, b: &str) -> bool {
        matches!((self.names.get(a), self.names.get(b)), (Some(x), Some(y)) if x == y)
    }

    // --- Private helpers ---

    fn current_keymap(&self) -> &Keymap {
        let id = self.names.get(&self.current).copied().unwrap_or(KeymapId(0));
        &self.maps[id.0]
    }

    fn insert_builtin(&mut self, name: &str, keymap: Keymap) {
        let id = KeymapId(self.maps.len());
        self.maps.push(keymap);
        self.names.insert(name.to_string(), id);
    }

    fn id(&self, name: &str) -> Result<KeymapId> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| ZleError::UnknownKeymap(name.to_string()))
    }

    fn require(&self, name: &str) -> Result<&Keymap> {
        self.id(name).map(|id| &self.maps[id.0])
    }

    fn require_mut(&mut self, name: &str) -> Result<&mut Keymap> {
        let id = self.id(name)?;
        let map = &mut self.maps[id.0];
        if map.immutable {
            return Err(ZleError::ImmutableKeymap(name.to_string()));
        }
        Ok(map)
    }

    fn bind_as(&mut self, keymap: &str, seq: &[u8], binding: KeyBinding) -> Result<()> {
        if seq.is_empty() {
            return Err(ZleError::InvalidKeySequence {
                input: String::new(),
                reason: "empty key sequence".to_string(),
            });
        }
        let map = self.require_mut(keymap)?;
        tracing::debug!(keymap, seq = %format_key_sequence(seq), %binding, "bind key");
        map.insert(seq.to_vec(), binding);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thingy(name: &str) -> KeyBinding {
        KeyBinding::Thingy(name.to_string())
    }

    #[test]
    fn test_defaults_select_main_linked_to_emacs() {
        let table = KeymapTable::with_defaults(false);
        assert_eq!(table.current_name(), "main");
        assert!(table.is_linked("main", "emacs"));
        for name in ["emacs", "viins", "vicmd", "isearch", ".safe"] {
            assert!(table.keymap(name).is_some(), "{name}");
        }
    }

    #[test]
    fn test_vi_defaults_link_main_to_viins() {
        let table = KeymapTable::with_defaults(true);
        assert!(table.is_linked("main", "viins"));
    }

    #[test]
    fn test_escape_prefix_is_partial_then_exact() {
        let table = KeymapTable::with_defaults(false);
        assert_eq!(table.match_prefix(b"\x1b"), KeyMatch::Partial);
        assert_eq!(table.match_prefix(b"\x1b["), KeyMatch::Partial);
        assert_eq!(
            table.match_prefix(b"\x1b[A"),
            KeyMatch::Exact(thingy("up-line-or-history"))
        );
        assert_eq!(table.match_prefix(b"\x1b[Z"), KeyMatch::NoMatch);
    }

    #[test]
    fn test_lone_escape_is_ambiguous_in_viins() {
        let mut table = KeymapTable::with_defaults(true);
        table.select("viins").unwrap();
        assert_eq!(
            table.match_prefix(b"\x1b"),
            KeyMatch::Ambiguous(thingy("vi-cmd-mode"))
        );
    }

    #[test]
    fn test_unbound_printable_has_no_match() {
        let table = KeymapTable::with_defaults(false);
        assert_eq!(table.match_prefix(b"a"), KeyMatch::NoMatch);
        assert_eq!(table.fallback().printable, "self-insert");
    }

    #[test]
    fn test_bind_overwrites_and_unknown_keymap_fails() {
        let mut table = KeymapTable::with_defaults(false);
        table.bind("emacs", b"\x01", "end-of-line").unwrap();
        assert_eq!(table.match_prefix(b"\x01"), KeyMatch::Exact(thingy("end-of-line")));

        let err = table.bind("nope", b"a", "beep").unwrap_err();
        assert_eq!(err, ZleError::UnknownKeymap("nope".to_string()));
    }

    #[test]
    fn test_many_sequences_may_share_an_action() {
        let mut table = KeymapTable::with_defaults(false);
        table.bind("main", b"\x18a", "beep").unwrap();
        table.bind("main", b"\x18b", "beep").unwrap();
        assert_eq!(table.match_prefix(b"\x18a"), KeyMatch::Exact(thingy("beep")));
        assert_eq!(table.match_prefix(b"\x18b"), KeyMatch::Exact(thingy("beep")));
    }

    #[test]
    fn test_bind_via_link_changes_linked_keymap() {
        let mut table = KeymapTable::with_defaults(false);
        table.bind("main", b"\x18x", "beep").unwrap();
        assert!(table.keymap("emacs").unwrap().get(b"\x18x").is_some());
    }

    #[test]
    fn test_safe_keymap_is_immutable() {
        let mut table = KeymapTable::with_defaults(false);
        assert_eq!(
            table.bind(".safe", b"a", "beep").unwrap_err(),
            ZleError::ImmutableKeymap(".safe".to_string())
        );
        assert!(table.delete_keymap(".safe").is_err());
        assert!(table.link_keymap(".safe", "emacs").is_err());
    }

    #[test]
    fn test_create_keymap_copy_is_independent() {
        let mut table = KeymapTable::with_defaults(false);
        table.create_keymap("mine", Some(".safe")).unwrap();
        table.bind("mine", b"\x01", "beginning-of-line").unwrap();
        assert!(table.keymap(".safe").unwrap().get(b"\x01").is_none());
        assert!(!table.keymap("mine").unwrap().is_immutable());

        assert_eq!(
            table.create_keymap("mine", None).unwrap_err(),
            ZleError::DuplicateKeymap("mine".to_string())
        );
        assert_eq!(
            table.create_keymap("other", Some("missing")).unwrap_err(),
            ZleError::UnknownKeymap("missing".to_string())
        );
    }

    #[test]
    fn test_select_unknown_keeps_current() {
        let mut table = KeymapTable::with_defaults(false);
        table.select("vicmd").unwrap();
        assert!(table.select("bogus").is_err());
        assert_eq!(table.current_name(), "vicmd");
    }

    #[test]
    fn test_delete_keymap_rules() {
        let mut table = KeymapTable::with_defaults(false);
        table.link_keymap("alt", "emacs").unwrap();
        table.select("alt").unwrap();
        assert_eq!(
            table.delete_keymap("alt").unwrap_err(),
            ZleError::KeymapInUse("alt".to_string())
        );
        table.select("main").unwrap();
        table.delete_keymap("alt").unwrap();
        assert!(table.keymap("alt").is_none());
        assert!(table.keymap("emacs").is_some());
    }

    #[test]
    fn test_relinking_main_takes_effect_immediately() {
        let mut table = KeymapTable::with_defaults(false);
        table.link_keymap("main", "vicmd").unwrap();
        assert_eq!(table.match_prefix(b"h"), KeyMatch::Exact(thingy("backward-char")));
    }

    #[test]
    fn test_local_overlay_wins_and_merges_extensions() {
        let mut table = KeymapTable::with_defaults(false);
        table.set_local(Some(ISEARCH_KEYMAP)).unwrap();
        assert_eq!(table.match_prefix(b"\r"), KeyMatch::Exact(thingy("accept-search")));
        // ESC prefixes still come from the current keymap.
        assert_eq!(table.match_prefix(b"\x1b"), KeyMatch::Partial);
        table.set_local(None).unwrap();
        assert_eq!(table.match_prefix(b"\r"), KeyMatch::Exact(thingy("accept-line")));
    }

    #[test]
    fn test_send_string_and_unbind() {
        let mut table = KeymapTable::with_defaults(false);
        table.bind_string("main", b"\x18g", b"git status").unwrap();
        assert_eq!(
            table.match_prefix(b"\x18g"),
            KeyMatch::Exact(KeyBinding::SendString(b"git status".to_vec()))
        );
        assert!(table.unbind("main", b"\x18g").unwrap());
        assert!(!table.unbind("main", b"\x18g").unwrap());
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let mut table = KeymapTable::with_defaults(false);
        assert!(matches!(
            table.bind("main", b"", "beep"),
            Err(ZleError::InvalidKeySequence { .. })
        ));
    }
}
