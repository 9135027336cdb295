use ahashmap::{AHashMap, AHashSet};

use crate::ast::{Ast, NodeId};
use crate::options::{ModuleSideEffects, ResolvedId, SyntheticNamedExports};
use crate::sourcemap::RawSourceMap;
use crate::variable::VariableId;

/// Handle into the graph's internal-module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle into the graph's external-module arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExternalId(pub u32);

impl ExternalId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A downstream module, internal or external.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModuleRef {
    Internal(ModuleId),
    External(ExternalId),
}

impl ModuleRef {
    pub fn internal(self) -> Option<ModuleId> {
        match self {
            ModuleRef::Internal(id) => Some(id),
            ModuleRef::External(_) => None,
        }
    }

    pub fn is_external(self) -> bool {
        matches!(self, ModuleRef::External(_))
    }
}

/// `import { name as local } from "source"`; `name` is `default`, `*` or the
/// exporter-side name.
#[derive(Debug, Clone)]
pub struct ImportDescription {
    pub source: String,
    pub name: String,
    pub start: u32,
    /// Filled during linking.
    pub module: Option<ModuleRef>,
}

/// `export { local_name as key } from "source"`; `local_name` is `*` for
/// `export * as key from "source"`.
#[derive(Debug, Clone)]
pub struct ReexportDescription {
    pub source: String,
    pub local_name: String,
    pub start: u32,
    /// Filled during linking.
    pub module: Option<ModuleRef>,
}

/// A direct export of this module.
#[derive(Debug, Clone)]
pub enum ExportDescription {
    Local {
        local_name: String,
        /// The declared function/class name behind `export default`, when one
        /// exists.
        identifier: Option<String>,
    },
    /// The missing-export shim marker.
    Shim,
}

/// One source file in the graph: its lowered AST, descriptor tables and the
/// per-module analysis state.
#[derive(Debug)]
pub struct Module {
    pub id: String,
    pub index: ModuleId,
    pub is_entry: bool,
    pub module_side_effects: ModuleSideEffects,
    pub synthetic_named_exports: SyntheticNamedExports,
    pub meta: serde_json::Value,
    pub code: String,
    pub ast: Ast,
    pub sourcemap_chain: Vec<RawSourceMap>,

    /// Raw specifier strings this module imports from, in first-use order.
    pub sources: Vec<String>,
    pub resolved_ids: AHashMap<String, ResolvedId>,

    pub import_descriptions: AHashMap<String, ImportDescription>,
    pub reexport_descriptions: AHashMap<String, ReexportDescription>,
    pub reexports_order: Vec<String>,
    pub exports: AHashMap<String, ExportDescription>,
    pub exports_order: Vec<String>,
    pub export_all_sources: Vec<String>,
    /// Linked `export *` targets, internal modules first, externals appended.
    pub export_all_modules: Vec<ModuleRef>,

    pub dependencies: Vec<ModuleRef>,
    pub dynamic_dependencies: Vec<ModuleRef>,
    pub importers: Vec<String>,
    pub dynamic_importers: Vec<String>,
    pub included_dynamic_importers: Vec<ModuleId>,
    pub implicitly_loaded_after: Vec<String>,

    /// Tokens of every import cycle this module participates in.
    pub cycles: AHashSet<u32>,
    /// Depth-first execution order; `usize::MAX` until assigned.
    pub exec_index: usize,
    pub is_executed: bool,
    pub needs_export_shim: bool,
    pub uses_top_level_await: bool,
    pub imported_from_not_treeshaken: bool,

    /// Top-level lexical scope: declared name to its variable.
    pub scope: AHashMap<String, VariableId>,
    /// Declaration node to the variables it declares; including the node
    /// includes these.
    pub declared_variables: AHashMap<NodeId, Vec<VariableId>>,
    pub namespace_variable: VariableId,
    pub default_variable: Option<VariableId>,
    pub export_shim_variable: Option<VariableId>,
    pub synthetic_exports: AHashMap<String, VariableId>,
    pub synthetic_namespace: Option<VariableId>,

    /// Variables referenced through this module's imports.
    pub imports: AHashSet<VariableId>,
    /// Modules whose execution is a precondition for using a variable here.
    pub side_effect_dependencies_by_variable: AHashMap<VariableId, AHashSet<ModuleRef>>,
    /// Re-points a re-export through a cycle participant so execution order
    /// is preserved in cyclic re-export chains.
    pub alternative_reexport_modules: AHashMap<VariableId, ModuleId>,
    /// Memo for `export *` probes: name to (variable, indirect-external).
    pub namespace_reexports_by_name: AHashMap<String, (Option<VariableId>, bool)>,
    all_export_names: Option<Vec<String>>,
    pub relevant_dependencies: Option<Vec<ModuleRef>>,

    pub dynamic_imports: Vec<NodeId>,
    pub import_metas: Vec<NodeId>,
}

impl Module {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        index: ModuleId,
        is_entry: bool,
        module_side_effects: ModuleSideEffects,
        synthetic_named_exports: SyntheticNamedExports,
        meta: serde_json::Value,
        namespace_variable: VariableId,
    ) -> Self {
        Self {
            id,
            index,
            is_entry,
            module_side_effects,
            synthetic_named_exports,
            meta,
            code: String::new(),
            ast: Ast::default(),
            sourcemap_chain: Vec::new(),
            sources: Vec::new(),
            resolved_ids: AHashMap::default(),
            import_descriptions: AHashMap::default(),
            reexport_descriptions: AHashMap::default(),
            reexports_order: Vec::new(),
            exports: AHashMap::default(),
            exports_order: Vec::new(),
            export_all_sources: Vec::new(),
            export_all_modules: Vec::new(),
            dependencies: Vec::new(),
            dynamic_dependencies: Vec::new(),
            importers: Vec::new(),
            dynamic_importers: Vec::new(),
            included_dynamic_importers: Vec::new(),
            implicitly_loaded_after: Vec::new(),
            cycles: AHashSet::default(),
            exec_index: usize::MAX,
            is_executed: false,
            needs_export_shim: false,
            uses_top_level_await: false,
            imported_from_not_treeshaken: false,
            scope: AHashMap::default(),
            declared_variables: AHashMap::default(),
            namespace_variable,
            default_variable: None,
            export_shim_variable: None,
            synthetic_exports: AHashMap::default(),
            synthetic_namespace: None,
            imports: AHashSet::default(),
            side_effect_dependencies_by_variable: AHashMap::default(),
            alternative_reexport_modules: AHashMap::default(),
            namespace_reexports_by_name: AHashMap::default(),
            all_export_names: None,
            relevant_dependencies: None,
            dynamic_imports: Vec::new(),
            import_metas: Vec::new(),
        }
    }

    pub fn add_source(&mut self, source: &str) {
        if !self.sources.iter().any(|existing| existing == source) {
            self.sources.push(source.to_string());
        }
    }

    pub fn add_export(&mut self, name: String, description: ExportDescription) {
        if !self.exports.contains_key(&name) {
            self.exports_order.push(name.clone());
        }
        self.exports.insert(name, description);
    }

    pub fn add_reexport(&mut self, name: String, description: ReexportDescription) {
        if !self.reexport_descriptions.contains_key(&name) {
            self.reexports_order.push(name.clone());
        }
        self.reexport_descriptions.insert(name, description);
    }

    pub fn add_dependency(&mut self, target: ModuleRef) {
        if !self.dependencies.contains(&target) {
            self.dependencies.push(target);
        }
    }

    pub fn add_dynamic_dependency(&mut self, target: ModuleRef) {
        if !self.dynamic_dependencies.contains(&target) {
            self.dynamic_dependencies.push(target);
        }
    }

    pub fn has_default_export(&self) -> bool {
        self.exports.contains_key("default") || self.reexport_descriptions.contains_key("default")
    }

    pub fn cached_export_names(&self) -> Option<&Vec<String>> {
        self.all_export_names.as_ref()
    }

    pub fn cache_export_names(&mut self, names: Vec<String>) {
        self.all_export_names = Some(names);
    }
}
