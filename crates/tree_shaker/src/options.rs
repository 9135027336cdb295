use ahashmap::AHashMap;

use crate::sourcemap::RawSourceMap;

/// Side-effect assumption for a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModuleSideEffects {
    /// Executing the module is assumed to be observable.
    #[default]
    Impure,
    /// The module is pure and removable when nothing uses its bindings.
    Pure,
    /// The module must be kept entirely, statements and dependencies both.
    NoTreeshake,
}

impl ModuleSideEffects {
    /// Everything except an explicit `Pure` counts as "has side effects".
    pub fn is_truthy(self) -> bool {
        !matches!(self, ModuleSideEffects::Pure)
    }
}

/// User-declared named exports that are not statically present in the module
/// and are backed by a fallback export instead.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyntheticNamedExports {
    #[default]
    None,
    /// Fall back to the `default` export.
    Default,
    /// Fall back to the named export.
    Named(String),
}

impl SyntheticNamedExports {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, SyntheticNamedExports::None)
    }

    pub fn fallback_name(&self) -> Option<&str> {
        match self {
            SyntheticNamedExports::None => None,
            SyntheticNamedExports::Default => Some("default"),
            SyntheticNamedExports::Named(name) => Some(name),
        }
    }

    /// True when `name` is the explicitly configured fallback export name.
    pub fn is_named_fallback(&self, name: &str) -> bool {
        matches!(self, SyntheticNamedExports::Named(fallback) if fallback == name)
    }
}

/// The outcome of specifier resolution for one import source, supplied by the
/// caller's resolver pipeline.
#[derive(Debug, Clone)]
pub struct ResolvedId {
    pub id: String,
    pub external: bool,
    pub module_side_effects: ModuleSideEffects,
    pub synthetic_named_exports: SyntheticNamedExports,
}

impl ResolvedId {
    pub fn internal(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: false,
            module_side_effects: ModuleSideEffects::default(),
            synthetic_named_exports: SyntheticNamedExports::default(),
        }
    }

    pub fn external(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            external: true,
            module_side_effects: ModuleSideEffects::default(),
            synthetic_named_exports: SyntheticNamedExports::default(),
        }
    }
}

/// One module as handed to the graph: source text plus everything the
/// parser/resolver pipeline already decided about it.
#[derive(Debug, Clone)]
pub struct ModuleInput {
    pub id: String,
    pub code: String,
    pub resolved_ids: AHashMap<String, ResolvedId>,
    pub module_side_effects: ModuleSideEffects,
    pub synthetic_named_exports: SyntheticNamedExports,
    pub is_entry: bool,
    pub implicitly_loaded_after: Vec<String>,
    pub sourcemap_chain: Vec<RawSourceMap>,
    pub meta: serde_json::Value,
}

impl ModuleInput {
    pub fn new(id: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            code: code.into(),
            resolved_ids: AHashMap::default(),
            module_side_effects: ModuleSideEffects::default(),
            synthetic_named_exports: SyntheticNamedExports::default(),
            is_entry: false,
            implicitly_loaded_after: Vec::new(),
            sourcemap_chain: Vec::new(),
            meta: serde_json::Value::Null,
        }
    }

    pub fn entry(id: impl Into<String>, code: impl Into<String>) -> Self {
        let mut input = Self::new(id, code);
        input.is_entry = true;
        input
    }

    pub fn resolving(mut self, specifier: impl Into<String>, resolved: ResolvedId) -> Self {
        self.resolved_ids.insert(specifier.into(), resolved);
        self
    }

    pub fn with_side_effects(mut self, side_effects: ModuleSideEffects) -> Self {
        self.module_side_effects = side_effects;
        self
    }

    pub fn with_synthetic_named_exports(mut self, synthetic: SyntheticNamedExports) -> Self {
        self.synthetic_named_exports = synthetic;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ShakeOptions {
    /// When false, every statement of every module is included.
    pub treeshake: bool,
    /// Create shim variables for missing exports instead of failing the build.
    pub shim_missing_exports: bool,
    /// Whether reading a property of an unknown object counts as an effect.
    pub property_read_side_effects: bool,
}

impl Default for ShakeOptions {
    fn default() -> Self {
        Self {
            treeshake: true,
            shim_missing_exports: false,
            property_read_side_effects: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderOptions {
    /// Keep import / re-export statements in the output. A bundler that
    /// rewrites module declarations itself passes false.
    pub keep_module_declarations: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            keep_module_declarations: true,
        }
    }
}
