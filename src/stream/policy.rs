use std::collections::BTreeSet;
use std::fmt;

use crate::events::EventKind;

/// Which bus events a stream client re-emits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardPolicy {
    /// Every kind is forwarded
    All,
    /// Only the listed kinds are forwarded
    AllowList(BTreeSet<EventKind>),
}

impl ForwardPolicy {
    pub fn only(kinds: impl IntoIterator<Item = EventKind>) -> Self {
        Self::AllowList(kinds.into_iter().collect())
    }

    pub fn forwards(&self, kind: EventKind) -> bool {
        match self {
            Self::All => true,
            Self::AllowList(kinds) => kinds.contains(&kind),
        }
    }
}

impl Default for ForwardPolicy {
    fn default() -> Self {
        Self::only([EventKind::Track])
    }
}

impl fmt::Display for ForwardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("*"),
            Self::AllowList(kinds) => {
                let names: Vec<_> = kinds.iter().map(EventKind::as_str).collect();
                f.write_str(&names.join(","))
            }
        }
    }
}
