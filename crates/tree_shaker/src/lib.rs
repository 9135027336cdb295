//! Module-graph tree-shaking core: decides which bindings and statements of
//! a set of linked ES modules must be emitted, and which dependencies each
//! module keeps in the output graph.

pub mod ast;
pub mod error;
pub mod external_module;
pub mod graph;
pub mod module;
pub mod options;
pub mod render;
pub mod resolve_export;
pub mod sourcemap;
pub mod variable;

mod effects;
mod include;
mod relevant_deps;

#[cfg(test)]
mod resolve_tests;
#[cfg(test)]
mod shake_tests;

use logger::Logger;

pub use crate::error::{ShakeError, Warning};
pub use crate::graph::{ModuleGraph, Phase};
pub use crate::module::{ModuleId, ModuleRef};
pub use crate::options::{
    ModuleInput, ModuleSideEffects, RenderOptions, ResolvedId, ShakeOptions,
    SyntheticNamedExports,
};
pub use crate::render::{ModuleInfo, RenderedExports};

/// Builds the module graph and runs inclusion to its fixpoint. Warnings stay
/// on the graph for the caller to drain, structured or via
/// [`report_warnings`].
pub fn shake(
    inputs: Vec<ModuleInput>,
    options: ShakeOptions,
    logger: impl Logger,
) -> Result<ModuleGraph, ShakeError> {
    let mut graph = ModuleGraph::build(inputs, options, &logger)?;
    graph.include_statements()?;
    Ok(graph)
}

/// Drains the graph's accumulated warnings into the logger, each prefixed
/// with its string code.
pub fn report_warnings(graph: &mut ModuleGraph, logger: impl Logger) {
    for warning in graph.take_warnings() {
        logger.warn(format!("{}: {}", warning.code(), warning));
    }
}
