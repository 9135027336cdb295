use ahashmap::AHashSet;

use crate::variable::VariableId;

/// One step of an object path: a known property name or an unknown key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSeg {
    Named(String),
    Unknown,
}

pub type ObjectPath = Vec<PathSeg>;

pub fn named_path(name: &str) -> ObjectPath {
    vec![PathSeg::Named(name.to_string())]
}

/// Recursion guard keyed by stable entity identity plus the queried path.
/// Re-entering the same (entity, path) pair reports "already tracked" so
/// cyclic value graphs terminate.
#[derive(Debug, Default, Clone)]
pub struct EntityTracker {
    entered: AHashSet<(VariableId, ObjectPath)>,
}

impl EntityTracker {
    /// Returns true the first time this pair is seen.
    pub fn enter(&mut self, variable: VariableId, path: &ObjectPath) -> bool {
        self.entered.insert((variable, path.clone()))
    }
}

/// Context threaded through effect queries. Created fresh at every driver
/// boundary; each interaction kind tracks its own entered pairs.
#[derive(Debug, Default)]
pub struct EffectContext {
    pub accessed: EntityTracker,
    pub assigned: EntityTracker,
    pub called: EntityTracker,
    pub probed: EntityTracker,
}
