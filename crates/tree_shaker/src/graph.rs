use ahashmap::{AHashMap, AHashSet};
use ecma_parse::parse_es_module;
use logger::Logger;

use crate::ast::lower::lower_module;
use crate::ast::{NodeId, NodeKind};
use crate::error::{code_frame, locate, Location, ShakeError, Warning};
use crate::external_module::ExternalModule;
use crate::module::{
    ExportDescription, ExternalId, ImportDescription, Module, ModuleId, ModuleRef,
    ReexportDescription,
};
use crate::options::{ModuleInput, ModuleSideEffects, ResolvedId, ShakeOptions};
use crate::sourcemap::{trace_original_location, RawSourceMap};
use crate::variable::{Variable, VariableArena, VariableId, VariableKind};

/// Graph lifecycle. Resolution caches are only trusted after `Analyse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Load,
    Analyse,
    Generate,
}

#[derive(Debug)]
pub struct ModuleGraph {
    pub options: ShakeOptions,
    pub modules: Vec<Module>,
    pub externals: Vec<ExternalModule>,
    pub variables: VariableArena,
    pub entry_modules: Vec<ModuleId>,
    pub phase: Phase,
    pub needs_treeshaking_pass: bool,
    module_refs_by_id: AHashMap<String, ModuleRef>,
    warnings: Vec<Warning>,
    next_cycle_token: u32,
}

impl ModuleGraph {
    /// Builds and links the graph: parse + lower every input, populate
    /// descriptor tables, resolve dependency edges, assign execution order
    /// and bind identifier references. Inclusion is a separate step.
    pub fn build(
        inputs: Vec<ModuleInput>,
        options: ShakeOptions,
        logger: impl Logger,
    ) -> Result<Self, ShakeError> {
        let mut graph = Self {
            options,
            modules: Vec::with_capacity(inputs.len()),
            externals: Vec::new(),
            variables: VariableArena::default(),
            entry_modules: Vec::new(),
            phase: Phase::Load,
            needs_treeshaking_pass: false,
            module_refs_by_id: AHashMap::default(),
            warnings: Vec::new(),
            next_cycle_token: 0,
        };

        for input in inputs {
            graph.add_module(input)?;
        }
        for index in 0..graph.modules.len() {
            graph.init_module_source(ModuleId(index as u32));
        }
        graph.phase = Phase::Analyse;
        graph.link_modules(&logger);
        graph.sort_modules();
        graph.bind_references()?;
        Ok(graph)
    }

    fn add_module(&mut self, input: ModuleInput) -> Result<(), ShakeError> {
        if self.module_refs_by_id.contains_key(&input.id) {
            return Err(ShakeError::DuplicateModule { id: input.id });
        }
        let index = ModuleId(self.modules.len() as u32);
        let parsed = match parse_es_module(input.id.as_str(), input.code.as_str()) {
            Ok(parsed) => parsed,
            Err(diagnostic) => {
                return Err(self.parse_error(&input, diagnostic));
            }
        };
        let lowered = lower_module(&parsed.module, parsed.base_pos);

        let namespace_variable = self.variables.alloc(Variable::new(
            "*",
            ModuleRef::Internal(index),
            VariableKind::Namespace,
        ));
        let mut module = Module::new(
            input.id.clone(),
            index,
            input.is_entry,
            input.module_side_effects,
            input.synthetic_named_exports,
            input.meta,
            namespace_variable,
        );
        module.code = input.code;
        module.resolved_ids = input.resolved_ids;
        module.sourcemap_chain = input.sourcemap_chain;
        module.implicitly_loaded_after = input.implicitly_loaded_after;
        module.ast = lowered.ast;
        module.uses_top_level_await = lowered.uses_top_level_await;
        module.dynamic_imports = lowered.dynamic_imports;
        module.import_metas = lowered.import_metas;

        if module.is_entry {
            self.entry_modules.push(index);
        }
        self.module_refs_by_id
            .insert(module.id.clone(), ModuleRef::Internal(index));
        self.modules.push(module);
        Ok(())
    }

    fn parse_error(&mut self, input: &ModuleInput, diagnostic: ecma_parse::ParseDiagnostic) -> ShakeError {
        let mut message = diagnostic.message;
        let well_known = [".js", ".mjs", ".cjs", ".json"];
        if !well_known.iter().any(|ext| input.id.ends_with(ext)) {
            message.push_str(
                " (Note that you need plugins to import files that are not JavaScript)",
            );
        }
        let pos = diagnostic.offset as usize;
        let (loc, frame) = self.enriched_location(
            &input.id,
            &input.code,
            &input.sourcemap_chain,
            pos,
        );
        ShakeError::Parse {
            id: input.id.clone(),
            message,
            pos,
            loc,
            frame,
        }
    }

    /// Line/column plus code frame for a byte offset, traced through the
    /// module's sourcemap chain when one is present.
    pub fn enriched_location(
        &mut self,
        module_id: &str,
        code: &str,
        chain: &[RawSourceMap],
        pos: usize,
    ) -> (Location, String) {
        let (line, column) = locate(code, pos);
        let mut loc = Location {
            file: module_id.to_string(),
            line,
            column,
        };
        if !chain.is_empty() {
            match trace_original_location(chain, line, column) {
                Ok(Some(original)) => {
                    loc = Location {
                        file: original.source.unwrap_or(loc.file),
                        line: original.line,
                        column: original.column,
                    };
                }
                Ok(None) => {}
                Err(message) => self.warn(Warning::SourcemapError {
                    module: module_id.to_string(),
                    message,
                }),
            }
        }
        let frame = code_frame(code, line, column);
        (loc, frame)
    }

    /// Walks the top level of a freshly lowered module: descriptor tables
    /// for imports, exports and re-exports, plus the module-level variables
    /// for every top-level declaration.
    fn init_module_source(&mut self, m: ModuleId) {
        let body = self.modules[m.index()].ast.body();
        for stmt in body {
            let span_start = self.modules[m.index()].ast.node(stmt).span.start;
            let kind = self.modules[m.index()].ast.kind(stmt).clone();
            match kind {
                NodeKind::ImportDeclaration { source, specifiers } => {
                    self.modules[m.index()].add_source(&source);
                    for specifier in specifiers {
                        self.modules[m.index()].import_descriptions.insert(
                            specifier.local,
                            ImportDescription {
                                source: source.clone(),
                                name: specifier.imported,
                                start: span_start,
                                module: None,
                            },
                        );
                    }
                }
                NodeKind::ExportAllDeclaration {
                    source,
                    exported_name,
                } => {
                    self.modules[m.index()].add_source(&source);
                    match exported_name {
                        Some(name) => self.modules[m.index()].add_reexport(
                            name,
                            ReexportDescription {
                                source,
                                local_name: "*".to_string(),
                                start: span_start,
                                module: None,
                            },
                        ),
                        None => {
                            let module = &mut self.modules[m.index()];
                            if !module.export_all_sources.contains(&source) {
                                module.export_all_sources.push(source);
                            }
                        }
                    }
                }
                NodeKind::ExportNamedDeclaration {
                    declaration,
                    specifiers,
                    source,
                } => {
                    if let Some(source) = source {
                        self.modules[m.index()].add_source(&source);
                        for specifier in specifiers {
                            self.modules[m.index()].add_reexport(
                                specifier.exported,
                                ReexportDescription {
                                    source: source.clone(),
                                    local_name: specifier.local,
                                    start: span_start,
                                    module: None,
                                },
                            );
                        }
                    } else if let Some(declaration) = declaration {
                        let names = self.declare_top_level(m, declaration);
                        for name in names {
                            self.modules[m.index()].add_export(
                                name.clone(),
                                ExportDescription::Local {
                                    local_name: name,
                                    identifier: None,
                                },
                            );
                        }
                    } else {
                        for specifier in specifiers {
                            self.modules[m.index()].add_export(
                                specifier.exported,
                                ExportDescription::Local {
                                    local_name: specifier.local,
                                    identifier: None,
                                },
                            );
                        }
                    }
                }
                NodeKind::ExportDefaultDeclaration {
                    declaration,
                    local_name,
                } => {
                    if let Some(name) = &local_name {
                        if !name.is_empty() {
                            self.declare_local(m, name, declaration, Some(declaration));
                        }
                    }
                    let default_variable = self.variables.alloc(Variable::new(
                        "default",
                        ModuleRef::Internal(m),
                        VariableKind::Default {
                            declaration: stmt,
                            original: None,
                        },
                    ));
                    self.modules[m.index()].default_variable = Some(default_variable);
                    self.modules[m.index()].add_export(
                        "default".to_string(),
                        ExportDescription::Local {
                            local_name: "default".to_string(),
                            identifier: local_name,
                        },
                    );
                }
                NodeKind::VariableDeclaration { .. }
                | NodeKind::FunctionDeclaration { .. }
                | NodeKind::ClassDeclaration { .. } => {
                    self.declare_top_level(m, stmt);
                }
                _ => {}
            }
        }
    }

    /// Creates module-scope variables for a top-level declaration statement
    /// and returns the declared names in source order.
    fn declare_top_level(&mut self, m: ModuleId, stmt: NodeId) -> Vec<String> {
        let kind = self.modules[m.index()].ast.kind(stmt).clone();
        let mut declared = Vec::new();
        match kind {
            NodeKind::VariableDeclaration { declarators, .. } => {
                for declarator in declarators {
                    let declarator_kind = self.modules[m.index()].ast.kind(declarator).clone();
                    if let NodeKind::Declarator {
                        names,
                        init,
                        destructured,
                    } = declarator_kind
                    {
                        let single_init = if destructured { None } else { init };
                        for name in names {
                            self.declare_local(m, &name, declarator, single_init);
                            declared.push(name);
                        }
                    }
                }
            }
            NodeKind::FunctionDeclaration { name, .. }
            | NodeKind::ClassDeclaration { name, .. } => {
                if !name.is_empty() {
                    self.declare_local(m, &name, stmt, Some(stmt));
                    declared.push(name);
                }
            }
            _ => {}
        }
        declared
    }

    fn declare_local(
        &mut self,
        m: ModuleId,
        name: &str,
        declarator: NodeId,
        init: Option<NodeId>,
    ) -> VariableId {
        if let Some(&existing) = self.modules[m.index()].scope.get(name) {
            if let VariableKind::Local { declarators, .. } = &mut self.variables.get_mut(existing).kind
            {
                declarators.push(declarator);
            }
            self.modules[m.index()]
                .declared_variables
                .entry(declarator)
                .or_default()
                .push(existing);
            return existing;
        }
        let variable = self.variables.alloc(Variable::new(
            name,
            ModuleRef::Internal(m),
            VariableKind::Local {
                declarators: vec![declarator],
                init,
            },
        ));
        self.modules[m.index()].scope.insert(name.to_string(), variable);
        self.modules[m.index()]
            .declared_variables
            .entry(declarator)
            .or_default()
            .push(variable);
        variable
    }

    /// Resolves every descriptor source to a target module, fills dependency
    /// edges and importer lists, and partitions `export *` targets so
    /// internal exports win over external ones.
    fn link_modules(&mut self, logger: &impl Logger) {
        for index in 0..self.modules.len() {
            let m = ModuleId(index as u32);
            let importer_id = self.modules[index].id.clone();
            let sources = self.modules[index].sources.clone();
            let mut targets: AHashMap<String, ModuleRef> = AHashMap::default();
            for source in &sources {
                let resolved = self.modules[index].resolved_ids.get(source).cloned();
                let target = self.resolve_target(&importer_id, source, resolved, logger);
                targets.insert(source.clone(), target);
                self.modules[index].add_dependency(target);
                self.add_importer(target, &importer_id);
            }

            for description in self.modules[index].import_descriptions.values_mut() {
                description.module = targets.get(&description.source).copied();
            }
            for description in self.modules[index].reexport_descriptions.values_mut() {
                description.module = targets.get(&description.source).copied();
            }

            let export_all_sources = self.modules[index].export_all_sources.clone();
            let mut internal_targets = Vec::new();
            let mut external_targets = Vec::new();
            for source in &export_all_sources {
                match targets.get(source) {
                    Some(target @ ModuleRef::Internal(_)) => internal_targets.push(*target),
                    Some(target @ ModuleRef::External(_)) => external_targets.push(*target),
                    None => {}
                }
            }
            internal_targets.extend(external_targets);
            self.modules[index].export_all_modules = internal_targets;

            // dynamic imports resolve through the same table
            let dynamic_imports = self.modules[index].dynamic_imports.clone();
            for node in dynamic_imports {
                let specifier = match self.modules[index].ast.kind(node) {
                    NodeKind::ImportExpression { specifier, .. } => specifier.clone(),
                    _ => None,
                };
                let Some(specifier) = specifier else {
                    continue;
                };
                let resolved = self.modules[index].resolved_ids.get(&specifier).cloned();
                let target = self.resolve_target(&importer_id, &specifier, resolved, logger);
                if let NodeKind::ImportExpression { resolution, .. } =
                    &mut self.modules[index].ast.node_mut(node).kind
                {
                    *resolution = Some(target);
                }
                self.modules[index].add_dynamic_dependency(target);
                self.add_dynamic_importer(target, &importer_id);
            }
        }

        for index in 0..self.modules.len() {
            if self.modules[index].module_side_effects == ModuleSideEffects::NoTreeshake {
                let dependencies = self.modules[index].dependencies.clone();
                for dependency in dependencies {
                    if let ModuleRef::Internal(target) = dependency {
                        self.modules[target.index()].imported_from_not_treeshaken = true;
                    }
                }
            }
        }
    }

    fn resolve_target(
        &mut self,
        importer_id: &str,
        source: &str,
        resolved: Option<ResolvedId>,
        logger: &impl Logger,
    ) -> ModuleRef {
        match resolved {
            Some(resolved) if resolved.external => {
                self.get_or_create_external(&resolved.id, resolved.module_side_effects)
            }
            Some(resolved) => match self.module_refs_by_id.get(&resolved.id) {
                Some(target) => *target,
                None => {
                    logger.warn(format!(
                        "resolved id \"{}\" (imported by \"{}\") is not part of the graph, treating it as external",
                        resolved.id, importer_id
                    ));
                    self.get_or_create_external(&resolved.id, resolved.module_side_effects)
                }
            },
            None => {
                logger.warn(format!(
                    "\"{}\" is imported by \"{}\" but has no resolution, treating it as external",
                    source, importer_id
                ));
                self.get_or_create_external(source, ModuleSideEffects::default())
            }
        }
    }

    fn get_or_create_external(
        &mut self,
        id: &str,
        module_side_effects: ModuleSideEffects,
    ) -> ModuleRef {
        if let Some(existing) = self.module_refs_by_id.get(id) {
            return *existing;
        }
        let index = ExternalId(self.externals.len() as u32);
        self.externals
            .push(ExternalModule::new(id.to_string(), index, module_side_effects));
        let target = ModuleRef::External(index);
        self.module_refs_by_id.insert(id.to_string(), target);
        target
    }

    fn add_importer(&mut self, target: ModuleRef, importer_id: &str) {
        match target {
            ModuleRef::Internal(id) => {
                let importers = &mut self.modules[id.index()].importers;
                if !importers.iter().any(|existing| existing == importer_id) {
                    importers.push(importer_id.to_string());
                }
            }
            ModuleRef::External(id) => {
                let importers = &mut self.externals[id.index()].importers;
                if !importers.iter().any(|existing| existing == importer_id) {
                    importers.push(importer_id.to_string());
                }
            }
        }
    }

    fn add_dynamic_importer(&mut self, target: ModuleRef, importer_id: &str) {
        if let ModuleRef::Internal(id) = target {
            let importers = &mut self.modules[id.index()].dynamic_importers;
            if !importers.iter().any(|existing| existing == importer_id) {
                importers.push(importer_id.to_string());
            }
        }
    }

    /// Assigns `exec_index` in DFS post-order over static imports, entries
    /// first and dynamically imported subtrees after the static pass. Every
    /// back edge found on the active DFS path mints a cycle token shared by
    /// all participants.
    fn sort_modules(&mut self) {
        let mut entered: AHashSet<ModuleId> = AHashSet::default();
        let mut next_exec = 0usize;
        let mut roots = self.entry_modules.clone();
        while !roots.is_empty() {
            let dynamic = self.run_execution_dfs(&roots, &mut entered, &mut next_exec);
            roots = dynamic
                .into_iter()
                .filter(|candidate| !entered.contains(candidate))
                .collect();
        }
    }

    fn run_execution_dfs(
        &mut self,
        roots: &[ModuleId],
        entered: &mut AHashSet<ModuleId>,
        next_exec: &mut usize,
    ) -> Vec<ModuleId> {
        enum Action {
            Enter(ModuleId),
            Exit(ModuleId),
        }

        let mut stack: Vec<Action> = roots.iter().rev().copied().map(Action::Enter).collect();
        let mut path: Vec<ModuleId> = Vec::new();
        let mut on_path: AHashSet<ModuleId> = AHashSet::default();
        let mut dynamic_targets: Vec<ModuleId> = Vec::new();

        while let Some(action) = stack.pop() {
            match action {
                Action::Enter(id) => {
                    if on_path.contains(&id) {
                        // back edge: every module on the path from the target
                        // up shares one cycle token
                        let token = self.next_cycle_token;
                        self.next_cycle_token += 1;
                        if let Some(start) = path.iter().rposition(|&candidate| candidate == id) {
                            for &participant in &path[start..] {
                                self.modules[participant.index()].cycles.insert(token);
                            }
                        }
                        continue;
                    }
                    if !entered.insert(id) {
                        continue;
                    }
                    stack.push(Action::Exit(id));
                    path.push(id);
                    on_path.insert(id);
                    let module = &self.modules[id.index()];
                    let static_deps: Vec<ModuleId> = module
                        .dependencies
                        .iter()
                        .filter_map(|dependency| dependency.internal())
                        .collect();
                    dynamic_targets.extend(
                        module
                            .dynamic_dependencies
                            .iter()
                            .filter_map(|dependency| dependency.internal()),
                    );
                    for dependency in static_deps.into_iter().rev() {
                        stack.push(Action::Enter(dependency));
                    }
                }
                Action::Exit(id) => {
                    path.pop();
                    on_path.remove(&id);
                    self.modules[id.index()].exec_index = *next_exec;
                    *next_exec += 1;
                }
            }
        }
        dynamic_targets
    }

    /// Binds every free identifier reference to its variable, via module
    /// scope first and import descriptions second, and resolves
    /// `export default` identifier aliases.
    fn bind_references(&mut self) -> Result<(), ShakeError> {
        for index in 0..self.modules.len() {
            let m = ModuleId(index as u32);
            for node_index in 0..self.modules[index].ast.nodes.len() {
                let name = match &self.modules[index].ast.nodes[node_index].kind {
                    NodeKind::Identifier {
                        name,
                        variable: None,
                        bindable: true,
                    } => Some(name.clone()),
                    _ => None,
                };
                let Some(name) = name else {
                    continue;
                };
                if let Some(variable) = self.trace_variable(m, &name)? {
                    if let NodeKind::Identifier { variable: slot, .. } =
                        &mut self.modules[index].ast.nodes[node_index].kind
                    {
                        *slot = Some(variable);
                    }
                }
            }

            // assignments deoptimize their targets as soon as they are
            // analyzed, included or not
            let assignment_targets: Vec<NodeId> = self.modules[index]
                .ast
                .nodes
                .iter()
                .filter_map(|node| match &node.kind {
                    NodeKind::AssignmentExpression { target, .. } => Some(*target),
                    NodeKind::UpdateExpression { argument } => Some(*argument),
                    _ => None,
                })
                .collect();
            for target in assignment_targets {
                self.deoptimize_assignment_target(m, target);
            }

            // every import must resolve, referenced or not
            let descriptions: Vec<ImportDescription> = self.modules[index]
                .import_descriptions
                .values()
                .cloned()
                .collect();
            for description in descriptions {
                self.resolve_import_description(m, &description, false)?;
            }

            // `export default foo` aliases the binding of foo
            if let Some(default_variable) = self.modules[index].default_variable {
                let declaration = match &self.variables.get(default_variable).kind {
                    VariableKind::Default { declaration, .. } => *declaration,
                    _ => continue,
                };
                let inner = match self.modules[index].ast.kind(declaration) {
                    NodeKind::ExportDefaultDeclaration { declaration, .. } => *declaration,
                    _ => continue,
                };
                let alias = match self.modules[index].ast.kind(inner) {
                    NodeKind::Identifier {
                        variable: Some(variable),
                        ..
                    } => Some(*variable),
                    _ => None,
                };
                if alias.is_some() {
                    if let VariableKind::Default { original, .. } =
                        &mut self.variables.get_mut(default_variable).kind
                    {
                        *original = alias;
                    }
                }
            }
        }
        Ok(())
    }

    /// Scope lookup, then import descriptions (delegating to the exporter),
    /// then None. A missing imported export is fatal.
    pub fn trace_variable(
        &mut self,
        m: ModuleId,
        name: &str,
    ) -> Result<Option<VariableId>, ShakeError> {
        if let Some(&variable) = self.modules[m.index()].scope.get(name) {
            return Ok(Some(variable));
        }
        let Some(description) = self.modules[m.index()].import_descriptions.get(name).cloned()
        else {
            return Ok(None);
        };
        self.resolve_import_description(m, &description, true)
            .map(Some)
    }

    /// Resolves one import description on its exporter. `record_usage` adds
    /// the variable to the importer's referenced-imports set; validation
    /// passes leave that set alone.
    fn resolve_import_description(
        &mut self,
        m: ModuleId,
        description: &ImportDescription,
        record_usage: bool,
    ) -> Result<VariableId, ShakeError> {
        let Some(target) = description.module else {
            return Err(self.missing_export_error(m, description));
        };
        let mut searched = AHashSet::default();
        let (variable, _) = self.get_variable_for_export_name(
            target,
            &description.name,
            crate::resolve_export::ExportSearch {
                importer_for_side_effects: Some(m),
                is_export_all_search: false,
                only_explicit: false,
            },
            &mut searched,
        )?;
        match variable {
            Some(variable) => {
                if record_usage {
                    self.modules[m.index()].imports.insert(variable);
                }
                Ok(variable)
            }
            None => Err(self.missing_export_error(m, description)),
        }
    }

    fn missing_export_error(&mut self, m: ModuleId, description: &ImportDescription) -> ShakeError {
        let importer = self.modules[m.index()].id.clone();
        let code = self.modules[m.index()].code.clone();
        let chain = self.modules[m.index()].sourcemap_chain.clone();
        let (loc, frame) =
            self.enriched_location(&importer, &code, &chain, description.start as usize);
        let exporter = description
            .module
            .map(|target| self.ref_id(target).to_string())
            .unwrap_or_else(|| description.source.clone());
        ShakeError::MissingExport {
            name: description.name.clone(),
            exporter,
            importer,
            pos: description.start as usize,
            loc,
            frame,
        }
    }

    pub fn module(&self, m: ModuleId) -> &Module {
        &self.modules[m.index()]
    }

    pub fn module_mut(&mut self, m: ModuleId) -> &mut Module {
        &mut self.modules[m.index()]
    }

    pub fn external(&self, e: ExternalId) -> &ExternalModule {
        &self.externals[e.index()]
    }

    pub fn module_by_id(&self, id: &str) -> Option<ModuleRef> {
        self.module_refs_by_id.get(id).copied()
    }

    pub fn ref_id(&self, target: ModuleRef) -> &str {
        match target {
            ModuleRef::Internal(id) => &self.modules[id.index()].id,
            ModuleRef::External(id) => &self.externals[id.index()].id,
        }
    }

    pub fn ref_side_effects(&self, target: ModuleRef) -> ModuleSideEffects {
        match target {
            ModuleRef::Internal(id) => self.modules[id.index()].module_side_effects,
            ModuleRef::External(id) => self.externals[id.index()].module_side_effects,
        }
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.push(warning);
    }

    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    pub fn request_treeshaking_pass(&mut self) {
        self.needs_treeshaking_pass = true;
    }

    /// Module ids sorted by execution order; modules never reached by the
    /// execution DFS keep `usize::MAX` and sort last.
    pub fn execution_order(&self) -> Vec<ModuleId> {
        let mut order: Vec<ModuleId> = (0..self.modules.len())
            .map(|index| ModuleId(index as u32))
            .collect();
        order.sort_by_key(|id| (self.modules[id.index()].exec_index, *id));
        order
    }
}
