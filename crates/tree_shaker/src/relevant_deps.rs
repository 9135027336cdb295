//! Per-module selection of the dependencies that must survive in the output
//! graph: modules that define used bindings, and modules whose side effects
//! stay observable.

use ahashmap::AHashSet;

use crate::error::ShakeError;
use crate::graph::ModuleGraph;
use crate::module::{ModuleId, ModuleRef};
use crate::resolve_export::ExportSearch;
use crate::variable::{VariableId, VariableKind};

impl ModuleGraph {
    /// The dependency set the renderer must emit for `m`, cached after the
    /// first computation.
    pub fn get_dependencies_to_be_included(
        &mut self,
        m: ModuleId,
    ) -> Result<Vec<ModuleRef>, ShakeError> {
        if let Some(cached) = &self.modules[m.index()].relevant_dependencies {
            return Ok(cached.clone());
        }

        let mut dependency_variables: Vec<VariableId> =
            self.modules[m.index()].imports.iter().copied().collect();
        dependency_variables.sort();

        let namespace_included = self
            .variables
            .get(self.modules[m.index()].namespace_variable)
            .included;
        let exports_reachable = self.modules[m.index()].is_entry
            || !self.modules[m.index()].included_dynamic_importers.is_empty()
            || namespace_included
            || !self.modules[m.index()].implicitly_loaded_after.is_empty();
        if exports_reachable {
            for name in self.get_all_export_names(m) {
                let mut searched = AHashSet::default();
                let (variable, _) = self.get_variable_for_export_name(
                    ModuleRef::Internal(m),
                    &name,
                    ExportSearch {
                        importer_for_side_effects: Some(m),
                        is_export_all_search: false,
                        only_explicit: false,
                    },
                    &mut searched,
                )?;
                if let Some(variable) = variable {
                    if !dependency_variables.contains(&variable) {
                        dependency_variables.push(variable);
                    }
                }
            }
        }

        let mut necessary: AHashSet<ModuleRef> = AHashSet::default();
        let mut always_checked: AHashSet<ModuleRef> = AHashSet::default();
        for variable in dependency_variables {
            if let Some(owed) = self.modules[m.index()]
                .side_effect_dependencies_by_variable
                .get(&variable)
            {
                always_checked.extend(owed.iter().copied());
            }
            let defining = self.collapse_to_defining_variable(variable);
            necessary.insert(self.variables.get(defining).module);
        }

        let mut relevant: Vec<ModuleRef> = Vec::new();
        if !self.options.treeshake
            || self.modules[m.index()].module_side_effects
                == crate::options::ModuleSideEffects::NoTreeshake
        {
            for dependency in self.modules[m.index()].dependencies.clone() {
                push_unique(&mut relevant, dependency);
            }
        } else {
            self.add_relevant_side_effect_dependencies(
                m,
                &mut relevant,
                &necessary,
                &always_checked,
            );
        }
        let mut necessary_ordered: Vec<ModuleRef> = necessary.into_iter().collect();
        necessary_ordered.sort();
        for dependency in necessary_ordered {
            push_unique(&mut relevant, dependency);
        }
        relevant.retain(|dependency| *dependency != ModuleRef::Internal(m));

        self.modules[m.index()].relevant_dependencies = Some(relevant.clone());
        Ok(relevant)
    }

    /// Keeps a dependency when it is necessary, or when its side effects are
    /// observable; otherwise descends into its own dependencies.
    fn add_relevant_side_effect_dependencies(
        &mut self,
        m: ModuleId,
        relevant: &mut Vec<ModuleRef>,
        necessary: &AHashSet<ModuleRef>,
        always_checked: &AHashSet<ModuleRef>,
    ) {
        let mut handled: AHashSet<ModuleRef> = AHashSet::default();
        let mut queue: Vec<ModuleRef> = self.modules[m.index()].dependencies.clone();
        let mut always_checked_ordered: Vec<ModuleRef> = always_checked.iter().copied().collect();
        always_checked_ordered.sort();
        queue.extend(always_checked_ordered);

        let mut index = 0;
        while index < queue.len() {
            let dependency = queue[index];
            index += 1;
            if !handled.insert(dependency) {
                continue;
            }
            if necessary.contains(&dependency) {
                push_unique(relevant, dependency);
                continue;
            }
            if !(self.ref_side_effects(dependency).is_truthy()
                || always_checked.contains(&dependency))
            {
                continue;
            }
            match dependency {
                ModuleRef::External(_) => push_unique(relevant, dependency),
                ModuleRef::Internal(internal) => {
                    if self.module_has_effects(internal) {
                        push_unique(relevant, dependency);
                    } else {
                        queue.extend(self.modules[internal.index()].dependencies.iter().copied());
                    }
                }
            }
        }
    }

    /// Synthetic exports collapse onto their base; default exports onto the
    /// binding they alias. The result's owner is the defining module.
    fn collapse_to_defining_variable(&self, variable: VariableId) -> VariableId {
        let mut current = variable;
        loop {
            match &self.variables.get(current).kind {
                VariableKind::Synthetic { .. } => current = self.variables.base_variable(current),
                VariableKind::Default {
                    original: Some(_), ..
                } => current = self.variables.original_variable(current),
                _ => return current,
            }
        }
    }
}

fn push_unique(list: &mut Vec<ModuleRef>, entry: ModuleRef) {
    if !list.contains(&entry) {
        list.push(entry);
    }
}
