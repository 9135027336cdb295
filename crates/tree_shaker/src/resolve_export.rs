//! Cross-module export resolution: direct exports, re-exports, `export *`
//! probing with tie-breaks, synthetic named exports, missing-export shims and
//! circular re-export detection.

use ahashmap::AHashSet;
use itertools::Itertools;

use crate::error::{ShakeError, Warning};
use crate::graph::ModuleGraph;
use crate::module::{ExportDescription, ExternalId, ModuleId, ModuleRef};
use crate::variable::{Variable, VariableId, VariableKind};

/// Options threaded through one resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExportSearch {
    pub importer_for_side_effects: Option<ModuleId>,
    pub is_export_all_search: bool,
    pub only_explicit: bool,
}

/// (name, module) pairs already descended into during this resolution.
pub type SearchedNamesAndModules = AHashSet<(String, ModuleRef)>;

impl ModuleGraph {
    /// Resolves `name` on `target` to a variable. The second tuple field is
    /// true when the result comes from an external module reached through
    /// `export *` chains.
    pub fn get_variable_for_export_name(
        &mut self,
        target: ModuleRef,
        name: &str,
        search: ExportSearch,
        searched: &mut SearchedNamesAndModules,
    ) -> Result<(Option<VariableId>, bool), ShakeError> {
        let m = match target {
            ModuleRef::External(external) => {
                return Ok((Some(self.external_variable(external, name)), false));
            }
            ModuleRef::Internal(m) => m,
        };

        // star sentinel: the module's own namespace, or an external namespace
        // re-exported through `export *`
        if let Some(rest) = name.strip_prefix('*') {
            if rest.is_empty() {
                return Ok((Some(self.modules[m.index()].namespace_variable), false));
            }
            if let Some(ModuleRef::External(external)) = self.module_by_id(rest) {
                return Ok((Some(self.external_variable(external, "*")), false));
            }
            return Ok((None, false));
        }

        if let Some(description) = self.modules[m.index()].reexport_descriptions.get(name).cloned()
        {
            let Some(reexport_target) = description.module else {
                return Ok((None, false));
            };
            let (variable, _) = self.get_variable_for_export_name_recursive(
                reexport_target,
                &description.local_name,
                ExportSearch {
                    importer_for_side_effects: search.importer_for_side_effects,
                    is_export_all_search: search.is_export_all_search,
                    only_explicit: false,
                },
                searched,
            )?;
            return match variable {
                Some(variable) => {
                    if let Some(importer) = search.importer_for_side_effects {
                        self.set_alternative_exporter_if_cyclic(variable, importer, m);
                    }
                    Ok((Some(variable), false))
                }
                None => {
                    if search.is_export_all_search {
                        return Ok((None, false));
                    }
                    let importer = self.modules[m.index()].id.clone();
                    let code = self.modules[m.index()].code.clone();
                    let chain = self.modules[m.index()].sourcemap_chain.clone();
                    let (loc, frame) = self.enriched_location(
                        &importer,
                        &code,
                        &chain,
                        description.start as usize,
                    );
                    Err(ShakeError::MissingExport {
                        name: description.local_name,
                        exporter: self.ref_id(reexport_target).to_string(),
                        importer,
                        pos: description.start as usize,
                        loc,
                        frame,
                    })
                }
            };
        }

        if let Some(export) = self.modules[m.index()].exports.get(name).cloned() {
            return match export {
                ExportDescription::Shim => Ok((Some(self.export_shim_variable(m)), false)),
                ExportDescription::Local { local_name, .. } => {
                    let variable = match (
                        local_name.as_str(),
                        self.modules[m.index()].default_variable,
                    ) {
                        ("default", Some(default_variable)) => Some(default_variable),
                        _ => self.trace_variable(m, &local_name)?,
                    };
                    if let (Some(variable), Some(importer)) =
                        (variable, search.importer_for_side_effects)
                    {
                        self.modules[importer.index()]
                            .side_effect_dependencies_by_variable
                            .entry(variable)
                            .or_default()
                            .insert(ModuleRef::Internal(m));
                        self.set_alternative_exporter_if_cyclic(variable, importer, m);
                    }
                    Ok((variable, false))
                }
            };
        }

        if search.only_explicit {
            return Ok((None, false));
        }

        if name != "default" {
            if let Some(&(variable, indirect)) =
                self.modules[m.index()].namespace_reexports_by_name.get(name)
            {
                if variable.is_some() {
                    return Ok((variable, indirect));
                }
            } else {
                let result = self.get_variable_from_namespace_reexports(
                    m,
                    name,
                    search.importer_for_side_effects,
                    searched,
                )?;
                self.modules[m.index()]
                    .namespace_reexports_by_name
                    .insert(name.to_string(), result);
                if result.0.is_some() {
                    return Ok(result);
                }
            }
        }

        if self.modules[m.index()].synthetic_named_exports.is_enabled() {
            let variable = self.synthetic_export(m, name)?;
            return Ok((Some(variable), false));
        }

        if !search.is_export_all_search && self.options.shim_missing_exports {
            self.shim_missing_export(m, name);
            return Ok((Some(self.export_shim_variable(m)), false));
        }

        Ok((None, false))
    }

    /// Descent wrapper: a (name, module) pair entered twice is a circular
    /// re-export, fatal outside `export *` probes and silently unresolved
    /// inside them.
    fn get_variable_for_export_name_recursive(
        &mut self,
        target: ModuleRef,
        name: &str,
        search: ExportSearch,
        searched: &mut SearchedNamesAndModules,
    ) -> Result<(Option<VariableId>, bool), ShakeError> {
        if !searched.insert((name.to_string(), target)) {
            if search.is_export_all_search {
                return Ok((None, false));
            }
            return Err(ShakeError::CircularReexport {
                name: name.to_string(),
                module: self.ref_id(target).to_string(),
            });
        }
        self.get_variable_for_export_name(target, name, search, searched)
    }

    /// Probes `export *` targets for `name`. Internal matches win, then
    /// external, then synthetic; conflicting internal owners warn and hide
    /// the name, multiple external candidates warn and pick the first.
    fn get_variable_from_namespace_reexports(
        &mut self,
        m: ModuleId,
        name: &str,
        importer_for_side_effects: Option<ModuleId>,
        searched: &SearchedNamesAndModules,
    ) -> Result<(Option<VariableId>, bool), ShakeError> {
        let mut synthetic_candidate: Option<VariableId> = None;
        let mut internal_candidates: Vec<(VariableId, ModuleId)> = Vec::new();
        let mut external_candidates: Vec<VariableId> = Vec::new();

        let targets = self.modules[m.index()].export_all_modules.clone();
        for target in targets {
            // a real re-exported binding beats the target's synthetic fallback
            if let ModuleRef::Internal(internal) = target {
                if self.modules[internal.index()]
                    .synthetic_named_exports
                    .is_named_fallback(name)
                {
                    continue;
                }
            }
            // probes fork the searched set so siblings stay independent
            let mut forked = searched.clone();
            let (variable, indirect_external) = self.get_variable_for_export_name_recursive(
                target,
                name,
                ExportSearch {
                    importer_for_side_effects,
                    is_export_all_search: true,
                    only_explicit: false,
                },
                &mut forked,
            )?;
            let Some(variable) = variable else {
                continue;
            };
            if target.is_external() || indirect_external {
                if !external_candidates.contains(&variable) {
                    external_candidates.push(variable);
                }
            } else if self.variables.get(variable).is_synthetic() {
                synthetic_candidate.get_or_insert(variable);
            } else if let ModuleRef::Internal(owner) = target {
                if !internal_candidates
                    .iter()
                    .any(|(candidate, _)| *candidate == variable)
                {
                    internal_candidates.push((variable, owner));
                }
            }
        }

        if !internal_candidates.is_empty() {
            if internal_candidates.len() > 1 {
                let sources = internal_candidates
                    .iter()
                    .map(|(_, owner)| self.modules[owner.index()].id.clone())
                    .sorted()
                    .collect();
                let reexporting_module = self.modules[m.index()].id.clone();
                self.warn(Warning::NamespaceConflict {
                    name: name.to_string(),
                    reexporting_module,
                    sources,
                });
                return Ok((None, false));
            }
            return Ok((Some(internal_candidates[0].0), false));
        }

        if !external_candidates.is_empty() {
            let used = external_candidates[0];
            if external_candidates.len() > 1 {
                let sources: Vec<String> = external_candidates
                    .iter()
                    .map(|candidate| self.variable_module_id(*candidate))
                    .collect();
                let reexporting_module = self.modules[m.index()].id.clone();
                let used_module = self.variable_module_id(used);
                self.warn(Warning::AmbiguousExternalNamespaces {
                    name: name.to_string(),
                    reexporting_module,
                    used_module,
                    sources,
                });
            }
            return Ok((Some(used), true));
        }

        Ok((synthetic_candidate, false))
    }

    fn variable_module_id(&self, variable: VariableId) -> String {
        self.ref_id(self.variables.get(variable).module).to_string()
    }

    /// Records the cyclic re-exporter as the preferred import source for a
    /// variable whose owner shares a cycle with the re-exporter.
    fn set_alternative_exporter_if_cyclic(
        &mut self,
        variable: VariableId,
        importer: ModuleId,
        reexporter: ModuleId,
    ) {
        let ModuleRef::Internal(owner) = self.variables.get(variable).module else {
            return;
        };
        if owner == reexporter {
            return;
        }
        let cyclic = {
            let owner_cycles = &self.modules[owner.index()].cycles;
            let reexporter_cycles = &self.modules[reexporter.index()].cycles;
            owner_cycles
                .iter()
                .any(|token| reexporter_cycles.contains(token))
        };
        if cyclic {
            self.modules[importer.index()]
                .alternative_reexport_modules
                .insert(variable, reexporter);
        }
    }

    pub fn external_variable(&mut self, external: ExternalId, name: &str) -> VariableId {
        if let Some(&existing) = self.externals[external.index()].variables.get(name) {
            return existing;
        }
        let variable = self.variables.alloc(Variable::new(
            name,
            ModuleRef::External(external),
            VariableKind::External { module: external },
        ));
        self.externals[external.index()]
            .variables
            .insert(name.to_string(), variable);
        variable
    }

    pub fn export_shim_variable(&mut self, m: ModuleId) -> VariableId {
        if let Some(existing) = self.modules[m.index()].export_shim_variable {
            return existing;
        }
        let variable = self.variables.alloc(Variable::new(
            "_missingExportShim",
            ModuleRef::Internal(m),
            VariableKind::Shim,
        ));
        self.modules[m.index()].export_shim_variable = Some(variable);
        variable
    }

    fn shim_missing_export(&mut self, m: ModuleId, name: &str) {
        if !matches!(
            self.modules[m.index()].exports.get(name),
            Some(ExportDescription::Shim)
        ) {
            let module_id = self.modules[m.index()].id.clone();
            self.warn(Warning::ShimmedExport {
                module: module_id,
                name: name.to_string(),
            });
            self.modules[m.index()]
                .add_export(name.to_string(), ExportDescription::Shim);
            self.modules[m.index()].needs_export_shim = true;
        }
    }

    /// The lazily created synthetic named export for `name`, backed by the
    /// module's synthetic namespace.
    fn synthetic_export(&mut self, m: ModuleId, name: &str) -> Result<VariableId, ShakeError> {
        if let Some(&existing) = self.modules[m.index()].synthetic_exports.get(name) {
            return Ok(existing);
        }
        let base = self.synthetic_namespace(m)?;
        let variable = self.variables.alloc(Variable::new(
            name,
            ModuleRef::Internal(m),
            VariableKind::Synthetic { base },
        ));
        self.modules[m.index()]
            .synthetic_exports
            .insert(name.to_string(), variable);
        Ok(variable)
    }

    fn synthetic_namespace(&mut self, m: ModuleId) -> Result<VariableId, ShakeError> {
        if let Some(existing) = self.modules[m.index()].synthetic_namespace {
            return Ok(existing);
        }
        let fallback = self.modules[m.index()]
            .synthetic_named_exports
            .fallback_name()
            .unwrap_or("default")
            .to_string();
        let mut searched = SearchedNamesAndModules::default();
        let (variable, _) = self.get_variable_for_export_name(
            ModuleRef::Internal(m),
            &fallback,
            ExportSearch {
                importer_for_side_effects: None,
                is_export_all_search: false,
                only_explicit: true,
            },
            &mut searched,
        )?;
        match variable {
            Some(variable) => {
                self.modules[m.index()].synthetic_namespace = Some(variable);
                Ok(variable)
            }
            None => Err(ShakeError::SyntheticNamedExportsNeedNamespaceExport {
                module: self.modules[m.index()].id.clone(),
                fallback,
            }),
        }
    }

    /// Every name this module exports: own exports and re-exports, the
    /// non-default names of `export *` targets, and `*id` sentinels for
    /// external `export *` sources.
    pub fn get_all_export_names(&mut self, m: ModuleId) -> Vec<String> {
        if let Some(cached) = self.modules[m.index()].cached_export_names() {
            return cached.clone();
        }
        let mut seen_modules = AHashSet::default();
        let names = self.collect_export_names(m, &mut seen_modules);
        self.modules[m.index()].cache_export_names(names.clone());
        names
    }

    fn collect_export_names(
        &mut self,
        m: ModuleId,
        seen_modules: &mut AHashSet<ModuleId>,
    ) -> Vec<String> {
        seen_modules.insert(m);
        let mut names: Vec<String> = Vec::new();
        let mut present: AHashSet<String> = AHashSet::default();
        let own: Vec<String> = self.modules[m.index()]
            .exports_order
            .iter()
            .chain(self.modules[m.index()].reexports_order.iter())
            .cloned()
            .collect();
        for name in own {
            if present.insert(name.clone()) {
                names.push(name);
            }
        }
        let targets = self.modules[m.index()].export_all_modules.clone();
        for target in targets {
            match target {
                ModuleRef::Internal(internal) => {
                    if seen_modules.contains(&internal) {
                        continue;
                    }
                    for name in self.collect_export_names(internal, seen_modules) {
                        if name != "default" && present.insert(name.clone()) {
                            names.push(name);
                        }
                    }
                }
                ModuleRef::External(external) => {
                    let sentinel = format!("*{}", self.externals[external.index()].id);
                    if present.insert(sentinel.clone()) {
                        names.push(sentinel);
                    }
                }
            }
        }
        names
    }
}
