//! Field selection tri-state.
//!
//! Every consumer of the redaction engine (read path, write path, channel
//! redactor) honors the same contract: [`FieldSelection::Unrestricted`]
//! passes the record through unchanged, [`FieldSelection::Forbidden`] means
//! the operation as a whole fails or yields nothing, and an explicit field
//! set projects the record down to exactly those fields. The three answers
//! are meaningfully distinct and never collapse into one another.

use indexmap::IndexSet;

/// The outcome of minimal-field computation for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelection {
    /// No restriction applies; the full record may be seen or written.
    Unrestricted,
    /// Nothing at all may be seen or written.
    Forbidden,
    /// Exactly these fields may be seen or written, in declaration order.
    Fields(IndexSet<String>),
}

impl FieldSelection {
    /// Builds an explicit field set from an iterator of names.
    #[must_use]
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Fields(names.into_iter().map(Into::into).collect())
    }

    /// Returns `true` for the no-restriction sentinel.
    #[must_use]
    pub fn is_unrestricted(&self) -> bool {
        matches!(self, Self::Unrestricted)
    }

    /// Returns `true` for the fully-forbidden sentinel.
    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        matches!(self, Self::Forbidden)
    }

    /// The explicit field set, if any.
    #[must_use]
    pub fn as_fields(&self) -> Option<&IndexSet<String>> {
        match self {
            Self::Fields(fields) => Some(fields),
            _ => None,
        }
    }

    /// A canonical, order-insensitive key for grouping identical
    /// selections, used by the channel fan-out redactor.
    #[must_use]
    pub fn group_key(&self) -> SelectionKey {
        match self {
            Self::Unrestricted => SelectionKey::Unrestricted,
            Self::Forbidden => SelectionKey::Forbidden,
            Self::Fields(fields) => {
                let mut sorted: Vec<String> = fields.iter().cloned().collect();
                sorted.sort();
                SelectionKey::Fields(sorted)
            }
        }
    }
}

/// Hashable grouping key derived from a [`FieldSelection`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectionKey {
    /// Full record.
    Unrestricted,
    /// No message at all.
    Forbidden,
    /// Sorted explicit field names.
    Fields(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_equality_ignores_order() {
        let a = FieldSelection::fields(["id", "userId"]);
        let b = FieldSelection::fields(["userId", "id"]);
        assert_eq!(a, b);
        assert_eq!(a.group_key(), b.group_key());
    }

    #[test]
    fn test_sentinels_are_distinct() {
        let explicit = FieldSelection::fields(Vec::<String>::new());
        assert_ne!(explicit, FieldSelection::Forbidden);
        assert_ne!(explicit, FieldSelection::Unrestricted);
        assert_ne!(FieldSelection::Forbidden, FieldSelection::Unrestricted);
    }
}
