// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use clinicbook_app::RecordId;
use std::collections::HashMap;
use std::fmt;
use time::OffsetDateTime;

/// Local name of a row that has data but no server id yet.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PendingToken(String);

impl PendingToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PendingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a displayed row. Moves only forward:
/// `Placeholder` -> `Pending` -> `Real`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RowIdentity {
    Placeholder(usize),
    Pending(PendingToken),
    Real(RecordId),
}

impl RowIdentity {
    pub const fn is_placeholder(&self) -> bool {
        matches!(self, Self::Placeholder(_))
    }

    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub const fn is_real(&self) -> bool {
        matches!(self, Self::Real(_))
    }

    pub const fn real_id(&self) -> Option<RecordId> {
        match self {
            Self::Real(id) => Some(*id),
            _ => None,
        }
    }

    pub fn pending_token(&self) -> Option<&PendingToken> {
        match self {
            Self::Pending(token) => Some(token),
            _ => None,
        }
    }

    /// Position in the placeholder -> pending -> real lifecycle.
    pub const fn stage(&self) -> u8 {
        match self {
            Self::Placeholder(_) => 0,
            Self::Pending(_) => 1,
            Self::Real(_) => 2,
        }
    }
}

impl fmt::Display for RowIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder(index) => write!(f, "placeholder:{index}"),
            Self::Pending(token) => write!(f, "pending:{token}"),
            Self::Real(id) => write!(f, "real:{id}"),
        }
    }
}

#[derive(Debug, Clone)]
struct TokenMinter {
    epoch: i128,
    issued: u64,
}

impl TokenMinter {
    fn new() -> Self {
        Self {
            epoch: OffsetDateTime::now_utc().unix_timestamp_nanos(),
            issued: 0,
        }
    }

    fn mint(&mut self, row_index: usize) -> PendingToken {
        self.issued += 1;
        PendingToken(format!("{:x}-{:x}-{row_index}", self.epoch, self.issued))
    }
}

/// Pending-id map: remembers which pending token a placeholder or pending
/// row resolved to, so every edit on one visual row before the first save
/// lands on the same pending row.
#[derive(Debug, Clone)]
pub struct PendingIds {
    by_origin: HashMap<RowIdentity, PendingToken>,
    minter: TokenMinter,
}

impl Default for PendingIds {
    fn default() -> Self {
        Self::new()
    }
}

impl PendingIds {
    pub fn new() -> Self {
        Self {
            by_origin: HashMap::new(),
            minter: TokenMinter::new(),
        }
    }

    /// Resolves the identity an edit should land on. Returns the identity and
    /// whether a new pending row was minted for it.
    pub fn ensure_editable_identity(
        &mut self,
        current: &RowIdentity,
        row_index: usize,
    ) -> (RowIdentity, bool) {
        if current.is_real() {
            return (current.clone(), false);
        }
        if let Some(token) = self.by_origin.get(current) {
            return (RowIdentity::Pending(token.clone()), false);
        }

        let (token, minted) = match current {
            RowIdentity::Pending(token) => (token.clone(), false),
            _ => (self.minter.mint(row_index), true),
        };
        self.by_origin.insert(current.clone(), token.clone());
        self.by_origin
            .insert(RowIdentity::Pending(token.clone()), token.clone());
        (RowIdentity::Pending(token), minted)
    }

    /// Mints a pending identity for a row created by an explicit add.
    pub fn mint(&mut self, row_index: usize) -> RowIdentity {
        let token = self.minter.mint(row_index);
        self.by_origin
            .insert(RowIdentity::Pending(token.clone()), token.clone());
        RowIdentity::Pending(token)
    }

    /// Re-registers a pending row brought back by undo.
    pub fn adopt(&mut self, token: &PendingToken) {
        self.by_origin
            .insert(RowIdentity::Pending(token.clone()), token.clone());
    }

    pub fn contains(&self, token: &PendingToken) -> bool {
        self.by_origin.values().any(|value| value == token)
    }

    /// Drops every entry pointing at `token`; called once the row is committed
    /// or discarded.
    pub fn retire(&mut self, token: &PendingToken) {
        self.by_origin.retain(|_, value| value != token);
    }

    /// Placeholder indices are reassigned whenever the view is rebuilt, so
    /// aliases keyed by them expire with the view.
    pub fn forget_placeholders(&mut self) {
        self.by_origin.retain(|origin, _| !origin.is_placeholder());
    }

    pub fn len(&self) -> usize {
        self.by_origin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_origin.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{PendingIds, RowIdentity};
    use clinicbook_app::RecordId;

    #[test]
    fn repeated_edits_on_a_placeholder_reuse_one_token() {
        let mut ids = PendingIds::new();
        let origin = RowIdentity::Placeholder(4);

        let (first, minted) = ids.ensure_editable_identity(&origin, 4);
        assert!(minted);
        assert!(first.is_pending());

        for _ in 0..4 {
            let (again, minted) = ids.ensure_editable_identity(&origin, 4);
            assert!(!minted);
            assert_eq!(again, first);
        }

        let (via_pending, minted) = ids.ensure_editable_identity(&first, 4);
        assert!(!minted);
        assert_eq!(via_pending, first);
    }

    #[test]
    fn distinct_placeholders_get_distinct_tokens() {
        let mut ids = PendingIds::new();
        let (a, _) = ids.ensure_editable_identity(&RowIdentity::Placeholder(0), 0);
        let (b, _) = ids.ensure_editable_identity(&RowIdentity::Placeholder(1), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn real_rows_pass_through_untouched() {
        let mut ids = PendingIds::new();
        let real = RowIdentity::Real(RecordId::new(12));
        assert_eq!(ids.ensure_editable_identity(&real, 0), (real.clone(), false));
        assert!(ids.is_empty());
    }

    #[test]
    fn retire_drops_every_alias_of_a_token() {
        let mut ids = PendingIds::new();
        let (pending, _) = ids.ensure_editable_identity(&RowIdentity::Placeholder(2), 2);
        let token = pending.pending_token().expect("pending token").clone();
        assert!(ids.contains(&token));

        ids.retire(&token);
        assert!(!ids.contains(&token));
        assert!(ids.is_empty());
    }

    #[test]
    fn forgetting_placeholders_keeps_pending_entries() {
        let mut ids = PendingIds::new();
        let (pending, _) = ids.ensure_editable_identity(&RowIdentity::Placeholder(2), 2);
        ids.forget_placeholders();

        let (again, minted) = ids.ensure_editable_identity(&pending, 2);
        assert!(!minted);
        assert_eq!(again, pending);
        assert_eq!(ids.len(), 1);
    }

    #[test]
    fn identities_render_with_stage_prefix() {
        assert_eq!(RowIdentity::Placeholder(3).to_string(), "placeholder:3");
        assert_eq!(RowIdentity::Real(RecordId::new(9)).to_string(), "real:9");
        assert!(RowIdentity::Placeholder(0).stage() < RowIdentity::Real(RecordId::new(1)).stage());
    }
}
