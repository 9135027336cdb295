use ahashmap::AHashMap;

use crate::module::ExternalId;
use crate::options::ModuleSideEffects;
use crate::variable::VariableId;

/// A module outside the graph. Names imported from it become `External`
/// variables created on demand; the name `*` is its namespace.
#[derive(Debug)]
pub struct ExternalModule {
    pub id: String,
    pub index: ExternalId,
    pub module_side_effects: ModuleSideEffects,
    /// Some binding of this module is used by included code.
    pub used: bool,
    /// An included module re-exports from this module.
    pub reexported: bool,
    pub importers: Vec<String>,
    pub variables: AHashMap<String, VariableId>,
}

impl ExternalModule {
    pub fn new(id: String, index: ExternalId, module_side_effects: ModuleSideEffects) -> Self {
        Self {
            id,
            index,
            module_side_effects,
            used: false,
            reexported: false,
            importers: Vec::new(),
            variables: AHashMap::default(),
        }
    }
}
