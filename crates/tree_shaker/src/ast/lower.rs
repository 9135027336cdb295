//! Lowers the swc AST into the analysis IR: a flat node arena with spans,
//! parent links and inclusion flags, plus the import/export statement shapes
//! the module walks to build its descriptor tables.

use ahashmap::AHashSet;
use swc_common::{BytePos, Spanned};
use swc_ecma_ast as js;

use super::hoist;
use super::{
    Ast, ExportSpecifierIr, ImportSpecifierIr, LiteralValue, LogicalOp, MemberProp, NodeId,
    NodeKind, Span, UnaryOperator, VarDeclKind,
};

pub struct LoweredModule {
    pub ast: Ast,
    pub uses_top_level_await: bool,
    pub dynamic_imports: Vec<NodeId>,
    pub import_metas: Vec<NodeId>,
}

pub fn lower_module(module: &js::Module, base_pos: BytePos) -> LoweredModule {
    let mut lowering = Lowering {
        ast: Ast::default(),
        base: base_pos.0,
        scopes: Vec::new(),
        uses_top_level_await: false,
        dynamic_imports: Vec::new(),
        import_metas: Vec::new(),
    };

    let mut body = Vec::with_capacity(module.body.len());
    for item in &module.body {
        if let Some(node) = lowering.lower_module_item(item) {
            body.push(node);
        }
    }
    let program_span = lowering.span(module.span());
    let program = lowering.ast.push(program_span, NodeKind::Program { body });
    lowering.ast.program = program;
    lowering.ast.connect_parents();

    LoweredModule {
        ast: lowering.ast,
        uses_top_level_await: lowering.uses_top_level_await,
        dynamic_imports: lowering.dynamic_imports,
        import_metas: lowering.import_metas,
    }
}

/// Collects the names bound by a declaration pattern in source order.
pub fn declared_pattern_names(pat: &js::Pat, out: &mut Vec<String>) {
    match pat {
        js::Pat::Ident(ident) => out.push(ident.id.sym.to_string()),
        js::Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                declared_pattern_names(element, out);
            }
        }
        js::Pat::Rest(rest) => declared_pattern_names(&rest.arg, out),
        js::Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    js::ObjectPatProp::KeyValue(kv) => declared_pattern_names(&kv.value, out),
                    js::ObjectPatProp::Assign(assign) => out.push(assign.key.sym.to_string()),
                    js::ObjectPatProp::Rest(rest) => declared_pattern_names(&rest.arg, out),
                }
            }
        }
        js::Pat::Assign(assign) => declared_pattern_names(&assign.left, out),
        js::Pat::Expr(_) | js::Pat::Invalid(_) => {}
    }
}

struct Lowering {
    ast: Ast,
    base: u32,
    scopes: Vec<AHashSet<String>>,
    uses_top_level_await: bool,
    dynamic_imports: Vec<NodeId>,
    import_metas: Vec<NodeId>,
}

impl Lowering {
    fn span(&self, span: swc_common::Span) -> Span {
        Span {
            start: span.lo.0.saturating_sub(self.base),
            end: span.hi.0.saturating_sub(self.base),
        }
    }

    fn add(&mut self, span: swc_common::Span, kind: NodeKind) -> NodeId {
        let span = self.span(span);
        self.ast.push(span, kind)
    }

    fn is_shadowed(&self, name: &str) -> bool {
        self.scopes.iter().any(|scope| scope.contains(name))
    }

    fn lower_module_item(&mut self, item: &js::ModuleItem) -> Option<NodeId> {
        match item {
            js::ModuleItem::ModuleDecl(decl) => self.lower_module_decl(decl),
            js::ModuleItem::Stmt(stmt) => self.lower_stmt(stmt),
        }
    }

    fn lower_module_decl(&mut self, decl: &js::ModuleDecl) -> Option<NodeId> {
        match decl {
            js::ModuleDecl::Import(import) => {
                let mut specifiers = Vec::with_capacity(import.specifiers.len());
                for specifier in &import.specifiers {
                    match specifier {
                        js::ImportSpecifier::Named(named) => specifiers.push(ImportSpecifierIr {
                            local: named.local.sym.to_string(),
                            imported: named
                                .imported
                                .as_ref()
                                .map(|name| name.atom().to_string())
                                .unwrap_or_else(|| named.local.sym.to_string()),
                        }),
                        js::ImportSpecifier::Default(default) => {
                            specifiers.push(ImportSpecifierIr {
                                local: default.local.sym.to_string(),
                                imported: "default".to_string(),
                            })
                        }
                        js::ImportSpecifier::Namespace(namespace) => {
                            specifiers.push(ImportSpecifierIr {
                                local: namespace.local.sym.to_string(),
                                imported: "*".to_string(),
                            })
                        }
                    }
                }
                Some(self.add(
                    import.span,
                    NodeKind::ImportDeclaration {
                        source: import.src.value.to_string(),
                        specifiers,
                    },
                ))
            }
            js::ModuleDecl::ExportDecl(export) => {
                let declaration = self.lower_decl(&export.decl);
                Some(self.add(
                    export.span,
                    NodeKind::ExportNamedDeclaration {
                        declaration,
                        specifiers: Vec::new(),
                        source: None,
                    },
                ))
            }
            js::ModuleDecl::ExportNamed(named) => {
                let source = named.src.as_ref().map(|src| src.value.to_string());
                // `export * as ns from "src"` parses as a named export with a
                // single namespace specifier
                for specifier in &named.specifiers {
                    if let js::ExportSpecifier::Namespace(namespace) = specifier {
                        return Some(self.add(
                            named.span,
                            NodeKind::ExportAllDeclaration {
                                source: source.clone().unwrap_or_default(),
                                exported_name: Some(namespace.name.atom().to_string()),
                            },
                        ));
                    }
                }
                let mut specifiers = Vec::with_capacity(named.specifiers.len());
                for specifier in &named.specifiers {
                    match specifier {
                        js::ExportSpecifier::Named(spec) => {
                            let local = spec.orig.atom().to_string();
                            let exported = spec
                                .exported
                                .as_ref()
                                .map(|name| name.atom().to_string())
                                .unwrap_or_else(|| local.clone());
                            specifiers.push(ExportSpecifierIr { local, exported });
                        }
                        js::ExportSpecifier::Default(spec) => {
                            specifiers.push(ExportSpecifierIr {
                                local: "default".to_string(),
                                exported: spec.exported.sym.to_string(),
                            });
                        }
                        js::ExportSpecifier::Namespace(_) => {}
                    }
                }
                Some(self.add(
                    named.span,
                    NodeKind::ExportNamedDeclaration {
                        declaration: None,
                        specifiers,
                        source,
                    },
                ))
            }
            js::ModuleDecl::ExportDefaultDecl(export) => {
                let (declaration, local_name) = match &export.decl {
                    js::DefaultDecl::Fn(fn_expr) => {
                        let name = fn_expr.ident.as_ref().map(|ident| ident.sym.to_string());
                        let body = self.lower_function(&fn_expr.function);
                        let node = self.add(
                            fn_expr.function.span,
                            NodeKind::FunctionDeclaration {
                                name: name.clone().unwrap_or_default(),
                                body,
                            },
                        );
                        (node, name)
                    }
                    js::DefaultDecl::Class(class_expr) => {
                        let name = class_expr.ident.as_ref().map(|ident| ident.sym.to_string());
                        let (heritage, members, definition_effects) =
                            self.lower_class(&class_expr.class);
                        let node = self.add(
                            class_expr.class.span,
                            NodeKind::ClassDeclaration {
                                name: name.clone().unwrap_or_default(),
                                heritage,
                                members,
                                definition_effects,
                            },
                        );
                        (node, name)
                    }
                    js::DefaultDecl::TsInterfaceDecl(_) => {
                        let node = self.add(export.span, NodeKind::InertExpression {
                            children: Vec::new(),
                        });
                        (node, None)
                    }
                };
                Some(self.add(
                    export.span,
                    NodeKind::ExportDefaultDeclaration {
                        declaration,
                        local_name,
                    },
                ))
            }
            js::ModuleDecl::ExportDefaultExpr(export) => {
                let declaration = self.lower_expr(&export.expr);
                Some(self.add(
                    export.span,
                    NodeKind::ExportDefaultDeclaration {
                        declaration,
                        local_name: None,
                    },
                ))
            }
            js::ModuleDecl::ExportAll(export) => Some(self.add(
                export.span,
                NodeKind::ExportAllDeclaration {
                    source: export.src.value.to_string(),
                    exported_name: None,
                },
            )),
            _ => None,
        }
    }

    fn lower_decl(&mut self, decl: &js::Decl) -> Option<NodeId> {
        match decl {
            js::Decl::Var(var_decl) => Some(self.lower_var_decl(var_decl)),
            js::Decl::Fn(fn_decl) => {
                let body = self.lower_function(&fn_decl.function);
                Some(self.add(
                    fn_decl.function.span,
                    NodeKind::FunctionDeclaration {
                        name: fn_decl.ident.sym.to_string(),
                        body,
                    },
                ))
            }
            js::Decl::Class(class_decl) => {
                let (heritage, members, definition_effects) = self.lower_class(&class_decl.class);
                Some(self.add(
                    class_decl.class.span,
                    NodeKind::ClassDeclaration {
                        name: class_decl.ident.sym.to_string(),
                        heritage,
                        members,
                        definition_effects,
                    },
                ))
            }
            js::Decl::Using(using) => Some(self.add(
                using.span,
                NodeKind::OpaqueStatement {
                    children: Vec::new(),
                },
            )),
            _ => None,
        }
    }

    fn lower_var_decl(&mut self, var_decl: &js::VarDecl) -> NodeId {
        let kind = match var_decl.kind {
            js::VarDeclKind::Var => VarDeclKind::Var,
            js::VarDeclKind::Let => VarDeclKind::Let,
            js::VarDeclKind::Const => VarDeclKind::Const,
        };
        let mut declarators = Vec::with_capacity(var_decl.decls.len());
        for declarator in &var_decl.decls {
            let mut names = Vec::new();
            declared_pattern_names(&declarator.name, &mut names);
            let destructured = !matches!(declarator.name, js::Pat::Ident(_));
            let init = declarator.init.as_ref().map(|init| self.lower_expr(init));
            declarators.push(self.add(
                declarator.span,
                NodeKind::Declarator {
                    names,
                    init,
                    destructured,
                },
            ));
        }
        self.add(
            var_decl.span,
            NodeKind::VariableDeclaration { kind, declarators },
        )
    }

    fn lower_stmt(&mut self, stmt: &js::Stmt) -> Option<NodeId> {
        match stmt {
            js::Stmt::Block(block) => {
                let body = self.lower_stmts(&block.stmts);
                Some(self.add(block.span, NodeKind::BlockStatement { body }))
            }
            js::Stmt::Empty(_) => None,
            js::Stmt::Debugger(debugger) => Some(self.add(
                debugger.span,
                NodeKind::OpaqueStatement {
                    children: Vec::new(),
                },
            )),
            js::Stmt::With(with) => {
                let mut children = vec![self.lower_expr(&with.obj)];
                children.extend(self.lower_stmt(&with.body));
                Some(self.add(with.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::Return(ret) => {
                let argument = ret.arg.as_ref().map(|arg| self.lower_expr(arg));
                Some(self.add(ret.span, NodeKind::ReturnStatement { argument }))
            }
            js::Stmt::Labeled(labeled) => {
                let children = self.lower_stmt(&labeled.body).into_iter().collect();
                Some(self.add(labeled.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::Break(brk) => Some(self.add(
                brk.span,
                NodeKind::OpaqueStatement {
                    children: Vec::new(),
                },
            )),
            js::Stmt::Continue(cont) => Some(self.add(
                cont.span,
                NodeKind::OpaqueStatement {
                    children: Vec::new(),
                },
            )),
            js::Stmt::If(if_stmt) => {
                let test = self.lower_expr(&if_stmt.test);
                let consequent = self
                    .lower_stmt(&if_stmt.cons)
                    .unwrap_or_else(|| self.empty_block(if_stmt.span));
                let alternate = if_stmt.alt.as_ref().and_then(|alt| self.lower_stmt(alt));
                Some(self.add(
                    if_stmt.span,
                    NodeKind::IfStatement {
                        test,
                        consequent,
                        alternate,
                    },
                ))
            }
            js::Stmt::Switch(switch) => {
                let mut children = vec![self.lower_expr(&switch.discriminant)];
                for case in &switch.cases {
                    if let Some(test) = &case.test {
                        children.push(self.lower_expr(test));
                    }
                    children.extend(self.lower_stmts(&case.cons));
                }
                Some(self.add(switch.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::Throw(throw) => {
                let children = vec![self.lower_expr(&throw.arg)];
                Some(self.add(throw.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::Try(try_stmt) => {
                let mut children = Vec::new();
                let block_body = self.lower_stmts(&try_stmt.block.stmts);
                children.push(self.add(
                    try_stmt.block.span,
                    NodeKind::BlockStatement { body: block_body },
                ));
                if let Some(handler) = &try_stmt.handler {
                    let handler_body = self.lower_stmts(&handler.body.stmts);
                    children.push(self.add(
                        handler.body.span,
                        NodeKind::BlockStatement { body: handler_body },
                    ));
                }
                if let Some(finalizer) = &try_stmt.finalizer {
                    let finalizer_body = self.lower_stmts(&finalizer.stmts);
                    children.push(self.add(
                        finalizer.span,
                        NodeKind::BlockStatement {
                            body: finalizer_body,
                        },
                    ));
                }
                Some(self.add(try_stmt.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::While(while_stmt) => {
                let mut children = vec![self.lower_expr(&while_stmt.test)];
                children.extend(self.lower_stmt(&while_stmt.body));
                Some(self.add(while_stmt.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::DoWhile(do_while) => {
                let mut children = Vec::new();
                children.extend(self.lower_stmt(&do_while.body));
                children.push(self.lower_expr(&do_while.test));
                Some(self.add(do_while.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::For(for_stmt) => {
                let mut children = Vec::new();
                match &for_stmt.init {
                    Some(js::VarDeclOrExpr::VarDecl(var_decl)) => {
                        children.push(self.lower_var_decl(var_decl))
                    }
                    Some(js::VarDeclOrExpr::Expr(expr)) => children.push(self.lower_expr(expr)),
                    None => {}
                }
                if let Some(test) = &for_stmt.test {
                    children.push(self.lower_expr(test));
                }
                if let Some(update) = &for_stmt.update {
                    children.push(self.lower_expr(update));
                }
                children.extend(self.lower_stmt(&for_stmt.body));
                Some(self.add(for_stmt.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::ForIn(for_in) => {
                let mut children = self.lower_for_head(&for_in.left);
                children.push(self.lower_expr(&for_in.right));
                children.extend(self.lower_stmt(&for_in.body));
                Some(self.add(for_in.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::ForOf(for_of) => {
                let mut children = self.lower_for_head(&for_of.left);
                children.push(self.lower_expr(&for_of.right));
                children.extend(self.lower_stmt(&for_of.body));
                Some(self.add(for_of.span, NodeKind::OpaqueStatement { children }))
            }
            js::Stmt::Decl(decl) => self.lower_decl(decl),
            js::Stmt::Expr(expr_stmt) => {
                let expression = self.lower_expr(&expr_stmt.expr);
                Some(self.add(expr_stmt.span, NodeKind::ExpressionStatement { expression }))
            }
        }
    }

    fn lower_stmts(&mut self, stmts: &[js::Stmt]) -> Vec<NodeId> {
        stmts
            .iter()
            .filter_map(|stmt| self.lower_stmt(stmt))
            .collect()
    }

    fn lower_for_head(&mut self, head: &js::ForHead) -> Vec<NodeId> {
        match head {
            js::ForHead::VarDecl(var_decl) => vec![self.lower_var_decl(var_decl)],
            js::ForHead::Pat(pat) => match &**pat {
                js::Pat::Ident(ident) => {
                    let bindable = !self.is_shadowed(ident.id.sym.as_ref());
                    vec![self.ast.push(
                        self.span(ident.id.span),
                        NodeKind::Identifier {
                            name: ident.id.sym.to_string(),
                            variable: None,
                            bindable,
                        },
                    )]
                }
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn empty_block(&mut self, span: swc_common::Span) -> NodeId {
        self.add(span, NodeKind::BlockStatement { body: Vec::new() })
    }

    fn lower_function(&mut self, function: &js::Function) -> Vec<NodeId> {
        let mut scope = AHashSet::default();
        for param in &function.params {
            hoist::pattern_names(&param.pat, &mut scope);
        }
        let stmts: &[js::Stmt] = function
            .body
            .as_ref()
            .map(|body| body.stmts.as_slice())
            .unwrap_or(&[]);
        scope.extend(hoist::declared_names(stmts));
        self.scopes.push(scope);
        let body = self.lower_stmts(stmts);
        self.scopes.pop();
        body
    }

    fn lower_arrow(&mut self, arrow: &js::ArrowExpr) -> Vec<NodeId> {
        let mut scope = AHashSet::default();
        for param in &arrow.params {
            hoist::pattern_names(param, &mut scope);
        }
        match &*arrow.body {
            js::BlockStmtOrExpr::BlockStmt(block) => {
                scope.extend(hoist::declared_names(&block.stmts));
                self.scopes.push(scope);
                let body = self.lower_stmts(&block.stmts);
                self.scopes.pop();
                body
            }
            js::BlockStmtOrExpr::Expr(expr) => {
                self.scopes.push(scope);
                let argument = self.lower_expr(expr);
                self.scopes.pop();
                vec![self.add(
                    arrow.span,
                    NodeKind::ReturnStatement {
                        argument: Some(argument),
                    },
                )]
            }
        }
    }

    fn lower_class(&mut self, class: &js::Class) -> (Option<NodeId>, Vec<NodeId>, bool) {
        let heritage = class
            .super_class
            .as_ref()
            .map(|super_class| self.lower_expr(super_class));
        let mut members = Vec::new();
        let mut definition_effects = false;
        for member in &class.body {
            match member {
                js::ClassMember::Constructor(constructor) => {
                    let mut scope = AHashSet::default();
                    for param in &constructor.params {
                        if let js::ParamOrTsParamProp::Param(param) = param {
                            hoist::pattern_names(&param.pat, &mut scope);
                        }
                    }
                    let stmts: &[js::Stmt] = constructor
                        .body
                        .as_ref()
                        .map(|body| body.stmts.as_slice())
                        .unwrap_or(&[]);
                    scope.extend(hoist::declared_names(stmts));
                    self.scopes.push(scope);
                    let body = self.lower_stmts(stmts);
                    self.scopes.pop();
                    members.push(self.add(
                        constructor.span,
                        NodeKind::FunctionExpression { name: None, body },
                    ));
                }
                js::ClassMember::Method(method) => {
                    if let js::PropName::Computed(computed) = &method.key {
                        members.push(self.lower_expr(&computed.expr));
                    }
                    let body = self.lower_function(&method.function);
                    members.push(self.add(
                        method.span,
                        NodeKind::FunctionExpression { name: None, body },
                    ));
                }
                js::ClassMember::PrivateMethod(method) => {
                    let body = self.lower_function(&method.function);
                    members.push(self.add(
                        method.span,
                        NodeKind::FunctionExpression { name: None, body },
                    ));
                }
                js::ClassMember::ClassProp(prop) => {
                    if let js::PropName::Computed(computed) = &prop.key {
                        members.push(self.lower_expr(&computed.expr));
                    }
                    if let Some(value) = &prop.value {
                        members.push(self.lower_expr(value));
                        if prop.is_static {
                            definition_effects = true;
                        }
                    }
                }
                js::ClassMember::PrivateProp(prop) => {
                    if let Some(value) = &prop.value {
                        members.push(self.lower_expr(value));
                        if prop.is_static {
                            definition_effects = true;
                        }
                    }
                }
                js::ClassMember::StaticBlock(static_block) => {
                    definition_effects = true;
                    let body = self.lower_stmts(&static_block.body.stmts);
                    members.push(
                        self.add(static_block.span, NodeKind::BlockStatement { body }),
                    );
                }
                js::ClassMember::TsIndexSignature(_) | js::ClassMember::Empty(_) => {}
                _ => {
                    definition_effects = true;
                }
            }
        }
        (heritage, members, definition_effects)
    }

    fn lower_exprs(&mut self, args: &[js::ExprOrSpread]) -> Vec<NodeId> {
        args.iter()
            .map(|arg| {
                let expr = self.lower_expr(&arg.expr);
                if arg.spread.is_some() {
                    // spreading drives an arbitrary iterator
                    self.ast.push(
                        self.ast.node(expr).span,
                        NodeKind::OpaqueExpression {
                            children: vec![expr],
                        },
                    )
                } else {
                    expr
                }
            })
            .collect()
    }

    fn lower_member(&mut self, member: &js::MemberExpr, optional: bool) -> NodeId {
        let object = self.lower_expr(&member.obj);
        let property = match &member.prop {
            js::MemberProp::Ident(ident) => MemberProp::Static(ident.sym.to_string()),
            js::MemberProp::Computed(computed) => {
                if let js::Expr::Lit(js::Lit::Str(value)) = &*computed.expr {
                    MemberProp::Static(value.value.to_string())
                } else {
                    MemberProp::Computed(self.lower_expr(&computed.expr))
                }
            }
            _ => MemberProp::Static("#private".to_string()),
        };
        self.add(
            member.span,
            NodeKind::MemberExpression {
                object,
                property,
                optional,
            },
        )
    }

    fn lower_expr(&mut self, expr: &js::Expr) -> NodeId {
        let span = expr.span();
        match expr {
            js::Expr::This(_) => self.add(
                span,
                NodeKind::InertExpression {
                    children: Vec::new(),
                },
            ),
            js::Expr::Array(array) => {
                let elements = array
                    .elems
                    .iter()
                    .flatten()
                    .map(|element| {
                        let node = self.lower_expr(&element.expr);
                        if element.spread.is_some() {
                            self.ast.push(
                                self.ast.node(node).span,
                                NodeKind::OpaqueExpression {
                                    children: vec![node],
                                },
                            )
                        } else {
                            node
                        }
                    })
                    .collect();
                self.add(span, NodeKind::ArrayExpression { elements })
            }
            js::Expr::Object(object) => self.lower_object(object),
            js::Expr::Fn(fn_expr) => {
                let name = fn_expr.ident.as_ref().map(|ident| ident.sym.to_string());
                let body = self.lower_function(&fn_expr.function);
                self.add(span, NodeKind::FunctionExpression { name, body })
            }
            js::Expr::Arrow(arrow) => {
                let body = self.lower_arrow(arrow);
                self.add(span, NodeKind::FunctionExpression { name: None, body })
            }
            js::Expr::Unary(unary) => {
                let operator = match unary.op {
                    js::UnaryOp::Bang => UnaryOperator::Not,
                    js::UnaryOp::Void => UnaryOperator::Void,
                    js::UnaryOp::Delete => UnaryOperator::Delete,
                    _ => UnaryOperator::Other,
                };
                let argument = self.lower_expr(&unary.arg);
                self.add(span, NodeKind::UnaryExpression { operator, argument })
            }
            js::Expr::Update(update) => {
                let argument = self.lower_expr(&update.arg);
                self.add(span, NodeKind::UpdateExpression { argument })
            }
            js::Expr::Bin(bin) => {
                let left = self.lower_expr(&bin.left);
                let right = self.lower_expr(&bin.right);
                let operator = match bin.op {
                    js::BinaryOp::LogicalAnd => Some(LogicalOp::And),
                    js::BinaryOp::LogicalOr => Some(LogicalOp::Or),
                    js::BinaryOp::NullishCoalescing => Some(LogicalOp::NullishCoalescing),
                    _ => None,
                };
                match operator {
                    Some(operator) => self.add(
                        span,
                        NodeKind::LogicalExpression {
                            operator,
                            left,
                            right,
                        },
                    ),
                    None => self.add(span, NodeKind::BinaryExpression { left, right }),
                }
            }
            js::Expr::Assign(assign) => {
                let target = match &assign.left {
                    js::AssignTarget::Simple(simple) => match simple {
                        js::SimpleAssignTarget::Ident(ident) => {
                            let bindable = !self.is_shadowed(ident.id.sym.as_ref());
                            self.add(
                                ident.id.span,
                                NodeKind::Identifier {
                                    name: ident.id.sym.to_string(),
                                    variable: None,
                                    bindable,
                                },
                            )
                        }
                        js::SimpleAssignTarget::Member(member) => self.lower_member(member, false),
                        js::SimpleAssignTarget::Paren(paren) => self.lower_expr(&paren.expr),
                        _ => self.add(
                            span,
                            NodeKind::OpaqueExpression {
                                children: Vec::new(),
                            },
                        ),
                    },
                    js::AssignTarget::Pat(_) => self.add(
                        span,
                        NodeKind::OpaqueExpression {
                            children: Vec::new(),
                        },
                    ),
                };
                let value = self.lower_expr(&assign.right);
                self.add(span, NodeKind::AssignmentExpression { target, value })
            }
            js::Expr::Member(member) => self.lower_member(member, false),
            js::Expr::SuperProp(_) => self.add(
                span,
                NodeKind::OpaqueExpression {
                    children: Vec::new(),
                },
            ),
            js::Expr::Cond(cond) => {
                let test = self.lower_expr(&cond.test);
                let consequent = self.lower_expr(&cond.cons);
                let alternate = self.lower_expr(&cond.alt);
                self.add(
                    span,
                    NodeKind::ConditionalExpression {
                        test,
                        consequent,
                        alternate,
                    },
                )
            }
            js::Expr::Call(call) => match &call.callee {
                js::Callee::Import(_) => {
                    let argument = match call.args.first() {
                        Some(arg) => self.lower_expr(&arg.expr),
                        None => self.add(
                            span,
                            NodeKind::InertExpression {
                                children: Vec::new(),
                            },
                        ),
                    };
                    let specifier = call.args.first().and_then(|arg| match &*arg.expr {
                        js::Expr::Lit(js::Lit::Str(value)) => Some(value.value.to_string()),
                        _ => None,
                    });
                    let node = self.add(
                        span,
                        NodeKind::ImportExpression {
                            argument,
                            specifier,
                            resolution: None,
                        },
                    );
                    self.dynamic_imports.push(node);
                    node
                }
                js::Callee::Expr(callee) => {
                    let callee = self.lower_expr(callee);
                    let arguments = self.lower_exprs(&call.args);
                    self.add(
                        span,
                        NodeKind::CallExpression {
                            callee,
                            arguments,
                            optional: false,
                        },
                    )
                }
                js::Callee::Super(_) => {
                    let children = self.lower_exprs(&call.args);
                    self.add(span, NodeKind::OpaqueExpression { children })
                }
            },
            js::Expr::New(new) => {
                let callee = self.lower_expr(&new.callee);
                let arguments = new
                    .args
                    .as_ref()
                    .map(|args| self.lower_exprs(args))
                    .unwrap_or_default();
                self.add(span, NodeKind::NewExpression { callee, arguments })
            }
            js::Expr::Seq(seq) => {
                let expressions = seq.exprs.iter().map(|expr| self.lower_expr(expr)).collect();
                self.add(span, NodeKind::SequenceExpression { expressions })
            }
            js::Expr::Ident(ident) => {
                let bindable = !self.is_shadowed(ident.sym.as_ref());
                self.add(
                    span,
                    NodeKind::Identifier {
                        name: ident.sym.to_string(),
                        variable: None,
                        bindable,
                    },
                )
            }
            js::Expr::Lit(lit) => {
                let value = match lit {
                    js::Lit::Str(value) => Some(LiteralValue::String(value.value.to_string())),
                    js::Lit::Bool(value) => Some(LiteralValue::Boolean(value.value)),
                    js::Lit::Null(_) => Some(LiteralValue::Null),
                    js::Lit::Num(value) => Some(LiteralValue::Number(value.value)),
                    _ => None,
                };
                match value {
                    Some(value) => self.add(span, NodeKind::Literal { value }),
                    None => self.add(
                        span,
                        NodeKind::InertExpression {
                            children: Vec::new(),
                        },
                    ),
                }
            }
            js::Expr::Tpl(tpl) => {
                let children = tpl.exprs.iter().map(|expr| self.lower_expr(expr)).collect();
                self.add(span, NodeKind::InertExpression { children })
            }
            js::Expr::TaggedTpl(tagged) => {
                let mut children = vec![self.lower_expr(&tagged.tag)];
                for expr in &tagged.tpl.exprs {
                    children.push(self.lower_expr(expr));
                }
                self.add(span, NodeKind::OpaqueExpression { children })
            }
            js::Expr::Class(class_expr) => {
                let (heritage, members, definition_effects) = self.lower_class(&class_expr.class);
                let mut children: Vec<NodeId> = heritage.into_iter().collect();
                children.extend(members);
                if definition_effects {
                    self.add(span, NodeKind::OpaqueExpression { children })
                } else {
                    self.add(span, NodeKind::InertExpression { children })
                }
            }
            js::Expr::Yield(yield_expr) => {
                let children = yield_expr
                    .arg
                    .as_ref()
                    .map(|arg| vec![self.lower_expr(arg)])
                    .unwrap_or_default();
                self.add(span, NodeKind::OpaqueExpression { children })
            }
            js::Expr::Await(await_expr) => {
                if self.scopes.is_empty() {
                    self.uses_top_level_await = true;
                }
                let children = vec![self.lower_expr(&await_expr.arg)];
                self.add(span, NodeKind::OpaqueExpression { children })
            }
            js::Expr::Paren(paren) => self.lower_expr(&paren.expr),
            js::Expr::MetaProp(_) => {
                let node = self.add(span, NodeKind::MetaProperty);
                self.import_metas.push(node);
                node
            }
            js::Expr::OptChain(opt_chain) => match &*opt_chain.base {
                js::OptChainBase::Member(member) => self.lower_member(member, true),
                js::OptChainBase::Call(call) => {
                    let callee = self.lower_expr(&call.callee);
                    let arguments = self.lower_exprs(&call.args);
                    self.add(
                        span,
                        NodeKind::CallExpression {
                            callee,
                            arguments,
                            optional: true,
                        },
                    )
                }
            },
            _ => self.add(
                span,
                NodeKind::OpaqueExpression {
                    children: Vec::new(),
                },
            ),
        }
    }

    fn lower_accessor_body(&mut self, stmts: &[js::Stmt], params: &[&js::Pat]) -> Vec<NodeId> {
        let mut scope = AHashSet::default();
        for param in params {
            hoist::pattern_names(param, &mut scope);
        }
        scope.extend(hoist::declared_names(stmts));
        self.scopes.push(scope);
        let body = self.lower_stmts(stmts);
        self.scopes.pop();
        body
    }

    fn lower_object(&mut self, object: &js::ObjectLit) -> NodeId {
        let mut opaque = false;
        let mut values = Vec::new();
        for prop in &object.props {
            match prop {
                js::PropOrSpread::Spread(spread) => {
                    opaque = true;
                    values.push(self.lower_expr(&spread.expr));
                }
                js::PropOrSpread::Prop(prop) => match &**prop {
                    js::Prop::Shorthand(ident) => {
                        let bindable = !self.is_shadowed(ident.sym.as_ref());
                        values.push(self.add(
                            ident.span,
                            NodeKind::Identifier {
                                name: ident.sym.to_string(),
                                variable: None,
                                bindable,
                            },
                        ));
                    }
                    js::Prop::KeyValue(kv) => {
                        if let js::PropName::Computed(computed) = &kv.key {
                            values.push(self.lower_expr(&computed.expr));
                        }
                        values.push(self.lower_expr(&kv.value));
                    }
                    js::Prop::Method(method) => {
                        if let js::PropName::Computed(computed) = &method.key {
                            values.push(self.lower_expr(&computed.expr));
                        }
                        let body = self.lower_function(&method.function);
                        values.push(self.add(
                            method.function.span,
                            NodeKind::FunctionExpression { name: None, body },
                        ));
                    }
                    js::Prop::Getter(getter) => {
                        opaque = true;
                        if let Some(body) = &getter.body {
                            let stmts = self.lower_accessor_body(&body.stmts, &[]);
                            values.push(self.add(
                                getter.span,
                                NodeKind::FunctionExpression {
                                    name: None,
                                    body: stmts,
                                },
                            ));
                        }
                    }
                    js::Prop::Setter(setter) => {
                        opaque = true;
                        if let Some(body) = &setter.body {
                            let stmts = self.lower_accessor_body(&body.stmts, &[&*setter.param]);
                            values.push(self.add(
                                setter.span,
                                NodeKind::FunctionExpression {
                                    name: None,
                                    body: stmts,
                                },
                            ));
                        }
                    }
                    js::Prop::Assign(_) => {}
                },
            }
        }
        if opaque {
            self.add(object.span, NodeKind::OpaqueExpression { children: values })
        } else {
            self.add(object.span, NodeKind::ObjectExpression { values })
        }
    }
}
