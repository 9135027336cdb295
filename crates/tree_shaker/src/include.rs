//! The inclusion fixpoint: seeding from entries, the per-pass statement walk,
//! variable inclusion with execution marking, and dynamic-import namespace
//! forcing. Inclusion flags are monotone; the loop runs until a pass changes
//! nothing.

use ahashmap::AHashSet;

use crate::ast::context::{ObjectPath, PathSeg};
use crate::ast::{NodeId, NodeKind};
use crate::error::ShakeError;
use crate::graph::{ModuleGraph, Phase};
use crate::module::{ModuleId, ModuleRef};
use crate::options::ModuleSideEffects;
use crate::resolve_export::ExportSearch;
use crate::variable::{VariableId, VariableKind};

impl ModuleGraph {
    /// Drives inclusion to a fixpoint over the module graph.
    pub fn include_statements(&mut self) -> Result<(), ShakeError> {
        let entries = self.entry_modules.clone();
        for entry in entries {
            self.mark_module_and_impure_dependencies_as_executed(entry);
            if !self.options.treeshake
                || self.modules[entry.index()].module_side_effects
                    == ModuleSideEffects::NoTreeshake
            {
                self.include_all_in_bundle(entry)?;
            }
            self.include_all_exports(entry, false)?;
        }

        if self.options.treeshake {
            // monotone transitions over a finite lattice; anything further
            // means a transition is being reported without happening
            let node_count: usize = self.modules.iter().map(|m| m.ast.nodes.len()).sum();
            let max_passes = self.variables.len() + node_count + 2;
            let mut passes = 0usize;
            loop {
                self.needs_treeshaking_pass = false;
                for m in self.execution_order() {
                    if !self.modules[m.index()].is_executed {
                        continue;
                    }
                    if self.modules[m.index()].module_side_effects
                        == ModuleSideEffects::NoTreeshake
                    {
                        self.include_all_in_bundle(m)?;
                    } else {
                        let program = self.modules[m.index()].ast.program;
                        if self.should_be_included(m, program) {
                            self.include_node(m, program, false)?;
                        }
                    }
                }
                if !self.needs_treeshaking_pass {
                    break;
                }
                passes += 1;
                assert!(passes <= max_passes, "tree-shaking failed to converge");
            }
        } else {
            for index in 0..self.modules.len() {
                let m = ModuleId(index as u32);
                self.mark_module_and_impure_dependencies_as_executed(m);
                self.include_all_in_bundle(m)?;
            }
        }
        self.phase = Phase::Generate;
        Ok(())
    }

    pub fn include_all_in_bundle(&mut self, m: ModuleId) -> Result<(), ShakeError> {
        let program = self.modules[m.index()].ast.program;
        self.include_node(m, program, true)
    }

    /// Ensures every exported variable of `m` is included. External star
    /// re-exports mark the external module re-exported; namespace members
    /// are forced for dynamic imports.
    pub fn include_all_exports(
        &mut self,
        m: ModuleId,
        include_namespace_members: bool,
    ) -> Result<(), ShakeError> {
        if !self.modules[m.index()].is_executed {
            self.mark_module_and_impure_dependencies_as_executed(m);
        }
        for name in self.get_all_export_names(m) {
            if let Some(external_id) = name.strip_prefix('*') {
                if !external_id.is_empty() {
                    if let Some(ModuleRef::External(external)) = self.module_by_id(external_id) {
                        self.externals[external.index()].used = true;
                        self.externals[external.index()].reexported = true;
                    }
                    continue;
                }
            }
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
            let Some(variable) = variable else {
                // conflicting `export *` names resolve to nothing and stay
                // hidden from the namespace
                continue;
            };
            if let VariableKind::External { module } = self.variables.get(variable).kind {
                self.externals[module.index()].reexported = true;
            }
            // exports are reachable from outside; their object shape is
            // unknown from here on
            self.deoptimize_variable_path(variable, &vec![PathSeg::Unknown]);
            self.include_variable(m, variable)?;
        }
        if include_namespace_members {
            let namespace = self.modules[m.index()].namespace_variable;
            self.include_variable(m, namespace)?;
        }
        Ok(())
    }

    /// Marks a variable included, running execution marking for its owning
    /// module and every module owed for side effects, then includes its
    /// declarations.
    pub fn include_variable(
        &mut self,
        importer: ModuleId,
        variable: VariableId,
    ) -> Result<(), ShakeError> {
        let newly_included = !self.variables.get(variable).included;
        if newly_included {
            self.variables.get_mut(variable).included = true;
            self.request_treeshaking_pass();
            match self.variables.get(variable).module {
                ModuleRef::Internal(owner) => {
                    if !self.modules[owner.index()].is_executed {
                        self.mark_module_and_impure_dependencies_as_executed(owner);
                    }
                }
                ModuleRef::External(external) => {
                    self.externals[external.index()].used = true;
                }
            }
        }

        for target in self.get_and_extend_side_effect_modules(variable, importer) {
            match target {
                ModuleRef::Internal(owed) => {
                    if !self.modules[owed.index()].is_executed {
                        self.mark_module_and_impure_dependencies_as_executed(owed);
                    }
                }
                ModuleRef::External(external) => {
                    self.externals[external.index()].used = true;
                }
            }
        }

        if !newly_included {
            return Ok(());
        }
        let kind = self.variables.get(variable).kind.clone();
        let owner = self.variables.get(variable).module;
        match (kind, owner) {
            (VariableKind::Local { declarators, .. }, ModuleRef::Internal(owner)) => {
                for declarator in declarators {
                    self.include_declaration(owner, declarator)?;
                }
            }
            (
                VariableKind::Default {
                    declaration,
                    original,
                },
                ModuleRef::Internal(owner),
            ) => {
                self.include_declaration(owner, declaration)?;
                if let Some(original) = original {
                    self.include_variable(owner, original)?;
                }
            }
            (VariableKind::Namespace, ModuleRef::Internal(owner)) => {
                // a used namespace object materializes every named export
                self.include_all_exports(owner, false)?;
            }
            (VariableKind::Synthetic { base }, _) => {
                self.include_variable(importer, base)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Includes a declaration node fully, then walks parent links so the
    /// surrounding statement survives rendering without pulling in sibling
    /// declarators.
    fn include_declaration(&mut self, m: ModuleId, node: NodeId) -> Result<(), ShakeError> {
        self.include_node(m, node, true)?;
        let mut current = self.modules[m.index()].ast.node(node).parent;
        while let Some(parent) = current {
            self.modules[m.index()].ast.node_mut(parent).included = true;
            if matches!(
                self.modules[m.index()].ast.kind(parent),
                NodeKind::Program { .. }
            ) {
                break;
            }
            current = self.modules[m.index()].ast.node(parent).parent;
        }
        Ok(())
    }

    /// Marks a node included and recurses. Statement granularity applies at
    /// program bodies and variable declarations; sequence expressions follow
    /// the last-expression policy; everything else includes its children so
    /// every reference in rendered code keeps its declaration alive.
    pub fn include_node(
        &mut self,
        m: ModuleId,
        n: NodeId,
        recursive: bool,
    ) -> Result<(), ShakeError> {
        {
            let entry = self.modules[m.index()].ast.node_mut(n);
            if !entry.included {
                entry.included = true;
            }
        }
        // declaration nodes carry their variables along
        if let Some(declared) = self.modules[m.index()].declared_variables.get(&n).cloned() {
            for variable in declared {
                self.include_variable(m, variable)?;
            }
        }
        let kind = self.modules[m.index()].ast.kind(n).clone();
        match kind {
            NodeKind::Program { body } => {
                for stmt in body {
                    if recursive || self.should_be_included(m, stmt) {
                        self.include_node(m, stmt, recursive)?;
                    }
                }
            }
            NodeKind::VariableDeclaration { declarators, .. } => {
                for declarator in declarators {
                    if recursive || self.should_be_included(m, declarator) {
                        self.include_node(m, declarator, recursive)?;
                    }
                }
            }
            NodeKind::SequenceExpression { expressions } => {
                let value_used = !matches!(
                    self.modules[m.index()]
                        .ast
                        .node(n)
                        .parent
                        .map(|parent| self.modules[m.index()].ast.kind(parent)),
                    Some(NodeKind::ExpressionStatement { .. })
                );
                let last = expressions.len().saturating_sub(1);
                for (index, expression) in expressions.into_iter().enumerate() {
                    if recursive
                        || (index == last && value_used)
                        || self.should_be_included(m, expression)
                    {
                        self.include_node(m, expression, recursive)?;
                    }
                }
            }
            NodeKind::Identifier {
                variable: Some(variable),
                ..
            } => {
                self.include_variable(m, variable)?;
            }
            NodeKind::ImportExpression {
                argument,
                resolution,
                ..
            } => {
                self.include_node(m, argument, recursive)?;
                match resolution {
                    Some(ModuleRef::Internal(target)) => {
                        if !self.modules[target.index()]
                            .included_dynamic_importers
                            .contains(&m)
                        {
                            self.modules[target.index()]
                                .included_dynamic_importers
                                .push(m);
                            // dynamic imports preserve the full namespace
                            self.include_all_exports(target, true)?;
                        }
                    }
                    Some(ModuleRef::External(external)) => {
                        self.externals[external.index()].used = true;
                    }
                    None => {}
                }
            }
            NodeKind::AssignmentExpression { target, value } => {
                self.include_node(m, target, recursive)?;
                self.include_node(m, value, recursive)?;
                self.deoptimize_assignment_target(m, target);
            }
            NodeKind::UpdateExpression { argument } => {
                self.include_node(m, argument, recursive)?;
                self.deoptimize_assignment_target(m, argument);
            }
            other => {
                for child in other.children() {
                    self.include_node(m, child, recursive)?;
                }
            }
        }
        Ok(())
    }

    pub(crate) fn deoptimize_assignment_target(&mut self, m: ModuleId, target: NodeId) {
        match self.modules[m.index()].ast.kind(target) {
            NodeKind::Identifier {
                variable: Some(variable),
                ..
            } => {
                let variable = *variable;
                self.deoptimize_variable_path(variable, &Vec::new());
            }
            NodeKind::MemberExpression { .. } => {
                if let Some((variable, path)) = self.resolve_member_target(m, target) {
                    self.deoptimize_variable_path(variable, &path);
                }
            }
            _ => {}
        }
    }

    /// An empty path marks the variable reassigned and, when a literal was
    /// previously served through it, schedules another pass. Deeper paths
    /// would only invalidate property shapes, which the value model does not
    /// track.
    pub fn deoptimize_variable_path(&mut self, variable: VariableId, path: &ObjectPath) {
        if !path.is_empty() {
            return;
        }
        let invalidates_served_literal = {
            let entry = self.variables.get_mut(variable);
            if entry.is_reassigned {
                false
            } else {
                entry.is_reassigned = true;
                entry.read_for_literal.get()
            }
        };
        if invalidates_served_literal {
            self.request_treeshaking_pass();
        }
    }

    /// Marks a module executed along with every dependency that may carry
    /// side effects of its own.
    pub fn mark_module_and_impure_dependencies_as_executed(&mut self, m: ModuleId) {
        let mut stack = vec![m];
        while let Some(current) = stack.pop() {
            if self.modules[current.index()].is_executed {
                continue;
            }
            self.modules[current.index()].is_executed = true;
            self.request_treeshaking_pass();
            let dependencies = self.modules[current.index()].dependencies.clone();
            for dependency in dependencies {
                if let ModuleRef::Internal(target) = dependency {
                    if self.modules[target.index()].module_side_effects.is_truthy()
                        && !self.modules[target.index()].is_executed
                    {
                        stack.push(target);
                    }
                }
            }
        }
    }

    /// The modules whose execution is owed before `variable` can be used
    /// from `importer`, extended along default-alias and synthetic-base
    /// chains and merged back into the importer's table.
    fn get_and_extend_side_effect_modules(
        &mut self,
        variable: VariableId,
        importer: ModuleId,
    ) -> Vec<ModuleRef> {
        let mut merged: AHashSet<ModuleRef> = self.modules[importer.index()]
            .side_effect_dependencies_by_variable
            .get(&variable)
            .cloned()
            .unwrap_or_default();
        let mut referenced: AHashSet<VariableId> = AHashSet::default();
        referenced.insert(variable);
        let mut current = variable;
        loop {
            let next = match &self.variables.get(current).kind {
                VariableKind::Default { original, .. } => *original,
                VariableKind::Synthetic { base } => Some(*base),
                _ => None,
            };
            let Some(next) = next else {
                break;
            };
            if !referenced.insert(next) {
                break;
            }
            current = next;
            if let Some(extra) = self.modules[importer.index()]
                .side_effect_dependencies_by_variable
                .get(&current)
            {
                merged.extend(extra.iter().copied());
            }
        }
        if !merged.is_empty() {
            self.modules[importer.index()]
                .side_effect_dependencies_by_variable
                .insert(variable, merged.clone());
        }
        let mut result: Vec<ModuleRef> = merged.into_iter().collect();
        result.sort();
        result
    }
}
