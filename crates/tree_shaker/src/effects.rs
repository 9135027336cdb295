//! Effect and literal-value queries over the lowered IR. Pure by default:
//! a node is effectful when it writes unknown memory, calls an unknown value,
//! reads a property of an unknown object, or is a construct the analysis
//! keeps whole.

use crate::ast::context::{EffectContext, ObjectPath, PathSeg};
use crate::ast::{LiteralValue, LogicalOp, MemberProp, NodeId, NodeKind, UnaryOperator};
use crate::graph::ModuleGraph;
use crate::module::ModuleId;
use crate::options::ModuleSideEffects;
use crate::variable::{VariableId, VariableKind};

impl ModuleGraph {
    /// The statement-granularity seed test of the inclusion driver.
    pub fn should_be_included(&self, m: ModuleId, n: NodeId) -> bool {
        self.node_has_effects(m, n, &mut EffectContext::default())
    }

    /// True when a module must stay because executing it is observable.
    pub fn module_has_effects(&self, m: ModuleId) -> bool {
        if self.modules[m.index()].module_side_effects == ModuleSideEffects::NoTreeshake {
            return true;
        }
        self.modules[m.index()].ast.body().into_iter().any(|stmt| {
            self.modules[m.index()].ast.node(stmt).included
                && self.node_has_effects(m, stmt, &mut EffectContext::default())
        })
    }

    pub fn node_has_effects(&self, m: ModuleId, n: NodeId, ctx: &mut EffectContext) -> bool {
        let kind = self.modules[m.index()].ast.kind(n).clone();
        match kind {
            NodeKind::Program { body }
            | NodeKind::BlockStatement { body } => body
                .into_iter()
                .any(|child| self.node_has_effects(m, child, ctx)),
            NodeKind::ExpressionStatement { expression } => {
                self.node_has_effects(m, expression, ctx)
            }
            NodeKind::VariableDeclaration { declarators, .. } => declarators
                .into_iter()
                .any(|declarator| self.node_has_effects(m, declarator, ctx)),
            NodeKind::Declarator {
                init, destructured, ..
            } => {
                // extracting from a destructuring pattern can hit getters
                (destructured && self.options.property_read_side_effects)
                    || init.is_some_and(|init| self.node_has_effects(m, init, ctx))
            }
            NodeKind::FunctionDeclaration { .. } | NodeKind::FunctionExpression { .. } => false,
            NodeKind::ClassDeclaration {
                heritage,
                definition_effects,
                ..
            } => {
                definition_effects
                    || heritage.is_some_and(|heritage| self.node_has_effects(m, heritage, ctx))
            }
            NodeKind::IfStatement {
                test,
                consequent,
                alternate,
            } => {
                if self.node_has_effects(m, test, ctx) {
                    return true;
                }
                match self.node_literal_value(m, test, ctx) {
                    Some(value) => {
                        if value.truthiness() {
                            self.node_has_effects(m, consequent, ctx)
                        } else {
                            alternate.is_some_and(|alternate| {
                                self.node_has_effects(m, alternate, ctx)
                            })
                        }
                    }
                    None => {
                        self.node_has_effects(m, consequent, ctx)
                            || alternate.is_some_and(|alternate| {
                                self.node_has_effects(m, alternate, ctx)
                            })
                    }
                }
            }
            NodeKind::ReturnStatement { argument } => {
                argument.is_some_and(|argument| self.node_has_effects(m, argument, ctx))
            }
            NodeKind::ImportDeclaration { .. }
            | NodeKind::ExportAllDeclaration { .. }
            | NodeKind::MetaProperty
            | NodeKind::Identifier { .. }
            | NodeKind::Literal { .. } => false,
            NodeKind::ExportNamedDeclaration { declaration, .. } => {
                declaration.is_some_and(|declaration| self.node_has_effects(m, declaration, ctx))
            }
            NodeKind::ExportDefaultDeclaration { declaration, .. } => {
                self.node_has_effects(m, declaration, ctx)
            }
            NodeKind::OpaqueStatement { .. } | NodeKind::OpaqueExpression { .. } => true,
            NodeKind::InertExpression { children }
            | NodeKind::ArrayExpression { elements: children }
            | NodeKind::ObjectExpression { values: children }
            | NodeKind::SequenceExpression {
                expressions: children,
            } => children
                .into_iter()
                .any(|child| self.node_has_effects(m, child, ctx)),
            NodeKind::MemberExpression { .. } => self.member_access_has_effects(m, n, ctx),
            NodeKind::CallExpression {
                callee, arguments, ..
            } => {
                arguments
                    .into_iter()
                    .any(|argument| self.node_has_effects(m, argument, ctx))
                    || self.call_has_effects(m, callee, ctx)
            }
            NodeKind::NewExpression { .. } | NodeKind::ImportExpression { .. } => true,
            NodeKind::AssignmentExpression { target, value } => {
                self.node_has_effects(m, value, ctx)
                    || self.assignment_target_has_effects(m, target, ctx)
            }
            NodeKind::UpdateExpression { argument } => {
                self.assignment_target_has_effects(m, argument, ctx)
            }
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                if self.node_has_effects(m, test, ctx) {
                    return true;
                }
                match self.node_literal_value(m, test, ctx) {
                    Some(value) => {
                        if value.truthiness() {
                            self.node_has_effects(m, consequent, ctx)
                        } else {
                            self.node_has_effects(m, alternate, ctx)
                        }
                    }
                    None => {
                        self.node_has_effects(m, consequent, ctx)
                            || self.node_has_effects(m, alternate, ctx)
                    }
                }
            }
            NodeKind::LogicalExpression {
                operator,
                left,
                right,
            } => {
                if self.node_has_effects(m, left, ctx) {
                    return true;
                }
                match self.node_literal_value(m, left, ctx) {
                    Some(value) => {
                        let takes_right = match operator {
                            LogicalOp::And => value.truthiness(),
                            LogicalOp::Or => !value.truthiness(),
                            LogicalOp::NullishCoalescing => value.is_nullish(),
                        };
                        takes_right && self.node_has_effects(m, right, ctx)
                    }
                    None => self.node_has_effects(m, right, ctx),
                }
            }
            NodeKind::BinaryExpression { left, right } => {
                self.node_has_effects(m, left, ctx) || self.node_has_effects(m, right, ctx)
            }
            NodeKind::UnaryExpression { operator, argument } => {
                matches!(operator, UnaryOperator::Delete)
                    || self.node_has_effects(m, argument, ctx)
            }
        }
    }

    /// Walks a member chain down to a bound identifier, yielding the base
    /// variable and the property path above it.
    pub fn resolve_member_target(
        &self,
        m: ModuleId,
        node: NodeId,
    ) -> Option<(VariableId, ObjectPath)> {
        let mut segments_outward = Vec::new();
        let mut current = node;
        loop {
            match self.modules[m.index()].ast.kind(current) {
                NodeKind::MemberExpression {
                    object, property, ..
                } => {
                    match property {
                        MemberProp::Static(name) => {
                            segments_outward.push(PathSeg::Named(name.clone()))
                        }
                        MemberProp::Computed(_) => segments_outward.push(PathSeg::Unknown),
                    }
                    current = *object;
                }
                NodeKind::Identifier {
                    variable: Some(variable),
                    ..
                } => {
                    segments_outward.reverse();
                    return Some((*variable, segments_outward));
                }
                _ => return None,
            }
        }
    }

    fn member_access_has_effects(&self, m: ModuleId, node: NodeId, ctx: &mut EffectContext) -> bool {
        let (object, property) = match self.modules[m.index()].ast.kind(node) {
            NodeKind::MemberExpression {
                object, property, ..
            } => (*object, property.clone()),
            _ => return false,
        };
        if let MemberProp::Computed(key) = property {
            if self.node_has_effects(m, key, ctx) {
                return true;
            }
        }
        if self.node_has_effects(m, object, ctx) {
            return true;
        }
        match self.resolve_member_target(m, node) {
            Some((variable, path)) => self.variable_has_effects_when_accessed(variable, &path, ctx),
            None => match self.modules[m.index()].ast.kind(object) {
                NodeKind::Literal { .. } => false,
                _ => self.options.property_read_side_effects,
            },
        }
    }

    fn call_has_effects(&self, m: ModuleId, callee: NodeId, ctx: &mut EffectContext) -> bool {
        if self.node_has_effects(m, callee, ctx) {
            return true;
        }
        match self.modules[m.index()].ast.kind(callee) {
            NodeKind::Identifier {
                variable: Some(variable),
                ..
            } => self.variable_has_effects_when_called(*variable, &Vec::new(), ctx),
            NodeKind::Identifier { variable: None, .. } => true,
            NodeKind::FunctionExpression { body, .. } => {
                let body = body.clone();
                self.function_body_has_effects(m, &body, ctx)
            }
            NodeKind::MemberExpression { .. } => match self.resolve_member_target(m, callee) {
                Some((variable, path)) => self.variable_has_effects_when_called(variable, &path, ctx),
                None => true,
            },
            _ => true,
        }
    }

    fn assignment_target_has_effects(
        &self,
        m: ModuleId,
        target: NodeId,
        ctx: &mut EffectContext,
    ) -> bool {
        match self.modules[m.index()].ast.kind(target) {
            NodeKind::Identifier {
                variable: Some(variable),
                ..
            } => self.variable_has_effects_when_assigned(*variable, &Vec::new(), ctx),
            NodeKind::Identifier {
                variable: None,
                bindable,
                ..
            } => *bindable,
            NodeKind::MemberExpression {
                object, property, ..
            } => {
                let object = *object;
                let computed_key = match property {
                    MemberProp::Computed(key) => Some(*key),
                    MemberProp::Static(_) => None,
                };
                if let Some(key) = computed_key {
                    if self.node_has_effects(m, key, ctx) {
                        return true;
                    }
                }
                if self.node_has_effects(m, object, ctx) {
                    return true;
                }
                match self.resolve_member_target(m, target) {
                    Some((variable, path)) => {
                        self.variable_has_effects_when_assigned(variable, &path, ctx)
                    }
                    None => true,
                }
            }
            _ => true,
        }
    }

    pub fn function_body_has_effects(
        &self,
        m: ModuleId,
        body: &[NodeId],
        ctx: &mut EffectContext,
    ) -> bool {
        body.iter()
            .any(|stmt| self.node_has_effects(m, *stmt, ctx))
    }

    pub fn variable_has_effects_when_accessed(
        &self,
        variable: VariableId,
        path: &ObjectPath,
        ctx: &mut EffectContext,
    ) -> bool {
        if path.is_empty() {
            return false;
        }
        if !ctx.accessed.enter(variable, path) {
            return false;
        }
        let entry = self.variables.get(variable);
        match &entry.kind {
            VariableKind::Local { init, .. } => {
                if entry.is_reassigned {
                    return self.options.property_read_side_effects;
                }
                let owner = entry.module.internal();
                match (owner, init) {
                    (Some(owner), Some(init)) => {
                        match self.modules[owner.index()].ast.kind(*init) {
                            NodeKind::ObjectExpression { .. }
                            | NodeKind::ArrayExpression { .. }
                            | NodeKind::FunctionExpression { .. }
                            | NodeKind::FunctionDeclaration { .. }
                            | NodeKind::ClassDeclaration { .. }
                            | NodeKind::Literal { .. }
                            | NodeKind::InertExpression { .. } => false,
                            _ => self.options.property_read_side_effects,
                        }
                    }
                    _ => self.options.property_read_side_effects,
                }
            }
            VariableKind::Default { original, .. } => match original {
                Some(original) => self.variable_has_effects_when_accessed(*original, path, ctx),
                None => false,
            },
            VariableKind::Namespace => false,
            VariableKind::External { .. } => self.options.property_read_side_effects,
            VariableKind::Synthetic { .. } => self.options.property_read_side_effects,
            VariableKind::Shim => true,
        }
    }

    pub fn variable_has_effects_when_assigned(
        &self,
        variable: VariableId,
        path: &ObjectPath,
        ctx: &mut EffectContext,
    ) -> bool {
        if !ctx.assigned.enter(variable, path) {
            return false;
        }
        let entry = self.variables.get(variable);
        match &entry.kind {
            // a write to an included binding is observable by included readers
            VariableKind::Local { .. } => entry.included,
            VariableKind::Default { original, .. } => match original {
                Some(original) => self.variable_has_effects_when_assigned(*original, path, ctx),
                None => entry.included,
            },
            VariableKind::Namespace
            | VariableKind::External { .. }
            | VariableKind::Synthetic { .. }
            | VariableKind::Shim => true,
        }
    }

    pub fn variable_has_effects_when_called(
        &self,
        variable: VariableId,
        path: &ObjectPath,
        ctx: &mut EffectContext,
    ) -> bool {
        if !ctx.called.enter(variable, path) {
            return false;
        }
        let entry = self.variables.get(variable);
        match &entry.kind {
            VariableKind::Local { init, .. } => {
                if entry.is_reassigned || !path.is_empty() {
                    return true;
                }
                let owner = entry.module.internal();
                match (owner, init) {
                    (Some(owner), Some(init)) => self.callable_has_effects(owner, *init, ctx),
                    _ => true,
                }
            }
            VariableKind::Default {
                original,
                declaration,
            } => match original {
                Some(original) => self.variable_has_effects_when_called(*original, path, ctx),
                None => {
                    if !path.is_empty() {
                        return true;
                    }
                    let Some(owner) = entry.module.internal() else {
                        return true;
                    };
                    let inner = match self.modules[owner.index()].ast.kind(*declaration) {
                        NodeKind::ExportDefaultDeclaration { declaration, .. } => *declaration,
                        _ => return true,
                    };
                    self.callable_has_effects(owner, inner, ctx)
                }
            },
            VariableKind::Namespace
            | VariableKind::External { .. }
            | VariableKind::Synthetic { .. }
            | VariableKind::Shim => true,
        }
    }

    fn callable_has_effects(&self, m: ModuleId, node: NodeId, ctx: &mut EffectContext) -> bool {
        match self.modules[m.index()].ast.kind(node) {
            NodeKind::FunctionDeclaration { body, .. }
            | NodeKind::FunctionExpression { body, .. } => {
                let body = body.clone();
                self.function_body_has_effects(m, &body, ctx)
            }
            _ => true,
        }
    }

    /// Probes for a statically known value. `None` means unknown.
    pub fn node_literal_value(
        &self,
        m: ModuleId,
        n: NodeId,
        ctx: &mut EffectContext,
    ) -> Option<LiteralValue> {
        let kind = self.modules[m.index()].ast.kind(n).clone();
        match kind {
            NodeKind::Literal { value } => Some(value),
            NodeKind::Identifier {
                variable: Some(variable),
                ..
            } => self.variable_literal_value(variable, ctx),
            NodeKind::SequenceExpression { expressions } => expressions
                .last()
                .and_then(|last| self.node_literal_value(m, *last, ctx)),
            NodeKind::ConditionalExpression {
                test,
                consequent,
                alternate,
            } => {
                let test = self.node_literal_value(m, test, ctx)?;
                if test.truthiness() {
                    self.node_literal_value(m, consequent, ctx)
                } else {
                    self.node_literal_value(m, alternate, ctx)
                }
            }
            NodeKind::LogicalExpression {
                operator,
                left,
                right,
            } => {
                let left_value = self.node_literal_value(m, left, ctx)?;
                let takes_right = match operator {
                    LogicalOp::And => left_value.truthiness(),
                    LogicalOp::Or => !left_value.truthiness(),
                    LogicalOp::NullishCoalescing => left_value.is_nullish(),
                };
                if takes_right {
                    self.node_literal_value(m, right, ctx)
                } else {
                    Some(left_value)
                }
            }
            NodeKind::UnaryExpression { operator, argument } => match operator {
                UnaryOperator::Not => self
                    .node_literal_value(m, argument, ctx)
                    .map(|value| LiteralValue::Boolean(!value.truthiness())),
                UnaryOperator::Void => Some(LiteralValue::Undefined),
                _ => None,
            },
            NodeKind::CallExpression { callee, .. } => self.call_literal_value(m, callee, ctx),
            _ => None,
        }
    }

    fn variable_literal_value(
        &self,
        variable: VariableId,
        ctx: &mut EffectContext,
    ) -> Option<LiteralValue> {
        if !ctx.probed.enter(variable, &Vec::new()) {
            return None;
        }
        let entry = self.variables.get(variable);
        if entry.is_reassigned {
            return None;
        }
        match &entry.kind {
            VariableKind::Local { init: Some(init), .. } => {
                let owner = entry.module.internal()?;
                let value = self.node_literal_value(owner, *init, ctx);
                if value.is_some() {
                    entry.read_for_literal.set(true);
                }
                value
            }
            VariableKind::Default {
                original: Some(original),
                ..
            } => self.variable_literal_value(*original, ctx),
            _ => None,
        }
    }

    /// The return value of calling a known, single-return function binding.
    fn call_literal_value(
        &self,
        m: ModuleId,
        callee: NodeId,
        ctx: &mut EffectContext,
    ) -> Option<LiteralValue> {
        let variable = match self.modules[m.index()].ast.kind(callee) {
            NodeKind::Identifier {
                variable: Some(variable),
                ..
            } => *variable,
            _ => return None,
        };
        if !ctx.probed.enter(variable, &vec![PathSeg::Unknown]) {
            return None;
        }
        let entry = self.variables.get(variable);
        if entry.is_reassigned {
            return None;
        }
        let (owner, init) = match &entry.kind {
            VariableKind::Local { init: Some(init), .. } => (entry.module.internal()?, *init),
            _ => return None,
        };
        let body = match self.modules[owner.index()].ast.kind(init) {
            NodeKind::FunctionDeclaration { body, .. }
            | NodeKind::FunctionExpression { body, .. } => body.clone(),
            _ => return None,
        };
        match body.as_slice() {
            [only] => match self.modules[owner.index()].ast.kind(*only) {
                NodeKind::ReturnStatement {
                    argument: Some(argument),
                } => self.node_literal_value(owner, *argument, ctx),
                _ => None,
            },
            _ => None,
        }
    }
}
