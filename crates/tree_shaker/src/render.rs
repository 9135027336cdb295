//! The output surface: statement-granularity rendering from the original
//! source with partial variable declarations, the rendered/removed export
//! split, and the `ModuleInfo` summary.

use ahashmap::AHashSet;

use crate::ast::{NodeId, NodeKind, Span, VarDeclKind};
use crate::error::ShakeError;
use crate::graph::ModuleGraph;
use crate::module::{ModuleId, ModuleRef};
use crate::options::{ModuleSideEffects, RenderOptions};
use crate::resolve_export::ExportSearch;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedExports {
    pub rendered: Vec<String>,
    pub removed: Vec<String>,
}

/// The module summary handed to the renderer and plugin-facing surfaces.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub id: String,
    pub is_entry: bool,
    pub is_included: bool,
    pub has_default_export: bool,
    pub imported_ids: Vec<String>,
    pub dynamically_imported_ids: Vec<String>,
    pub importers: Vec<String>,
    pub dynamic_importers: Vec<String>,
    pub implicitly_loaded_after: Vec<String>,
    pub module_side_effects: ModuleSideEffects,
    pub meta: serde_json::Value,
}

impl ModuleGraph {
    /// Renders the included statements of a module from its source text.
    pub fn render_module(&self, m: ModuleId, options: &RenderOptions) -> String {
        let module = &self.modules[m.index()];
        let mut rendered: Vec<String> = Vec::new();
        for stmt in module.ast.body() {
            let node = module.ast.node(stmt);
            match &node.kind {
                NodeKind::ImportDeclaration { .. }
                | NodeKind::ExportAllDeclaration { .. } => {
                    if options.keep_module_declarations {
                        rendered.push(self.slice(m, node.span).to_string());
                    }
                }
                NodeKind::ExportNamedDeclaration {
                    declaration: None, ..
                } => {
                    if options.keep_module_declarations {
                        rendered.push(self.slice(m, node.span).to_string());
                    }
                }
                NodeKind::ExportNamedDeclaration {
                    declaration: Some(declaration),
                    ..
                } => {
                    if !node.included {
                        continue;
                    }
                    let inner = module.ast.node(*declaration);
                    match &inner.kind {
                        NodeKind::VariableDeclaration { kind, declarators } => {
                            if let Some(text) = self.render_variable_declaration(
                                m,
                                node.span,
                                *kind,
                                declarators,
                                options.keep_module_declarations,
                            ) {
                                rendered.push(text);
                            }
                        }
                        _ => {
                            let text = if options.keep_module_declarations {
                                self.slice(m, node.span).to_string()
                            } else {
                                self.slice(m, inner.span).to_string()
                            };
                            rendered.push(text);
                        }
                    }
                }
                NodeKind::VariableDeclaration { kind, declarators } => {
                    if !node.included {
                        continue;
                    }
                    if let Some(text) =
                        self.render_variable_declaration(m, node.span, *kind, declarators, true)
                    {
                        rendered.push(text);
                    }
                }
                NodeKind::ExportDefaultDeclaration { .. } => {
                    if node.included {
                        rendered.push(self.slice(m, node.span).to_string());
                    }
                }
                _ => {
                    if node.included {
                        rendered.push(self.slice(m, node.span).to_string());
                    }
                }
            }
        }
        rendered.join("\n")
    }

    /// A declaration statement with only its included declarators. Returns
    /// the whole source slice when nothing was dropped.
    fn render_variable_declaration(
        &self,
        m: ModuleId,
        statement_span: Span,
        kind: VarDeclKind,
        declarators: &[NodeId],
        keep_export_prefix: bool,
    ) -> Option<String> {
        let module = &self.modules[m.index()];
        let included: Vec<NodeId> = declarators
            .iter()
            .copied()
            .filter(|declarator| module.ast.node(*declarator).included)
            .collect();
        if included.is_empty() {
            return None;
        }
        if included.len() == declarators.len() {
            return Some(self.slice(m, statement_span).to_string());
        }
        let exported = self.slice(m, statement_span).trim_start().starts_with("export");
        let mut text = String::new();
        if exported && keep_export_prefix {
            text.push_str("export ");
        }
        text.push_str(kind.keyword());
        text.push(' ');
        let parts: Vec<&str> = included
            .iter()
            .map(|declarator| self.slice(m, module.ast.node(*declarator).span))
            .collect();
        text.push_str(&parts.join(", "));
        text.push(';');
        Some(text)
    }

    fn slice(&self, m: ModuleId, span: Span) -> &str {
        let code = &self.modules[m.index()].code;
        let start = (span.start as usize).min(code.len());
        let end = (span.end as usize).min(code.len()).max(start);
        &code[start..end]
    }

    /// Splits this module's own export names into those whose variables made
    /// it into the output and those tree-shaken away.
    pub fn get_rendered_exports(&mut self, m: ModuleId) -> Result<RenderedExports, ShakeError> {
        let names = self.modules[m.index()].exports_order.clone();
        let mut result = RenderedExports::default();
        for name in names {
            let mut searched = AHashSet::default();
            let (variable, _) = self.get_variable_for_export_name(
                ModuleRef::Internal(m),
                &name,
                ExportSearch {
                    importer_for_side_effects: None,
                    is_export_all_search: false,
                    only_explicit: true,
                },
                &mut searched,
            )?;
            let included = variable
                .map(|variable| self.variables.get(variable).included)
                .unwrap_or(false);
            if included {
                result.rendered.push(name);
            } else {
                result.removed.push(name);
            }
        }
        Ok(result)
    }

    pub fn module_info(&self, m: ModuleId) -> ModuleInfo {
        let module = &self.modules[m.index()];
        let program_included = module.ast.node(module.ast.program).included;
        let namespace_included = self.variables.get(module.namespace_variable).included;
        ModuleInfo {
            id: module.id.clone(),
            is_entry: module.is_entry,
            is_included: program_included
                || namespace_included
                || module.imported_from_not_treeshaken,
            has_default_export: module.has_default_export(),
            imported_ids: module
                .dependencies
                .iter()
                .map(|dependency| self.ref_id(*dependency).to_string())
                .collect(),
            dynamically_imported_ids: module
                .dynamic_dependencies
                .iter()
                .map(|dependency| self.ref_id(*dependency).to_string())
                .collect(),
            importers: module.importers.clone(),
            dynamic_importers: module.dynamic_importers.clone(),
            implicitly_loaded_after: module.implicitly_loaded_after.clone(),
            module_side_effects: module.module_side_effects,
            meta: module.meta.clone(),
        }
    }
}
