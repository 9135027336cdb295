use ahashmap::AHashSet;
use swc_ecma_ast::{ArrowExpr, Function, Pat, Stmt, VarDeclKind};
use swc_ecma_visit::{Visit, VisitWith};

/// Collects the names a function body declares, so identifier references
/// inside the body are not bound to module-level variables of the same name.
///
/// `var` declarations hoist from any nesting depth; function, class, `let`
/// and `const` declarations are only taken from the immediate statement
/// level. Deeper block-scoped declarations are ignored, which at worst binds
/// a reference to an outer variable and keeps it alive.
pub fn declared_names(body: &[Stmt]) -> AHashSet<String> {
    let mut collector = VarCollector {
        names: AHashSet::default(),
    };
    for stmt in body {
        stmt.visit_with(&mut collector);
        collect_immediate(stmt, &mut collector.names);
    }
    collector.names
}

pub fn pattern_names(pat: &Pat, out: &mut AHashSet<String>) {
    match pat {
        Pat::Ident(ident) => {
            out.insert(ident.id.sym.to_string());
        }
        Pat::Array(array) => {
            for element in array.elems.iter().flatten() {
                pattern_names(element, out);
            }
        }
        Pat::Rest(rest) => pattern_names(&rest.arg, out),
        Pat::Object(object) => {
            for prop in &object.props {
                match prop {
                    swc_ecma_ast::ObjectPatProp::KeyValue(kv) => pattern_names(&kv.value, out),
                    swc_ecma_ast::ObjectPatProp::Assign(assign) => {
                        out.insert(assign.key.sym.to_string());
                    }
                    swc_ecma_ast::ObjectPatProp::Rest(rest) => pattern_names(&rest.arg, out),
                }
            }
        }
        Pat::Assign(assign) => pattern_names(&assign.left, out),
        Pat::Expr(_) | Pat::Invalid(_) => {}
    }
}

fn collect_immediate(stmt: &Stmt, out: &mut AHashSet<String>) {
    match stmt {
        Stmt::Decl(swc_ecma_ast::Decl::Fn(fn_decl)) => {
            out.insert(fn_decl.ident.sym.to_string());
        }
        Stmt::Decl(swc_ecma_ast::Decl::Class(class_decl)) => {
            out.insert(class_decl.ident.sym.to_string());
        }
        Stmt::Decl(swc_ecma_ast::Decl::Var(var_decl))
            if var_decl.kind != VarDeclKind::Var =>
        {
            for declarator in &var_decl.decls {
                pattern_names(&declarator.name, out);
            }
        }
        _ => {}
    }
}

struct VarCollector {
    names: AHashSet<String>,
}

impl Visit for VarCollector {
    fn visit_var_decl(&mut self, var_decl: &swc_ecma_ast::VarDecl) {
        if var_decl.kind == VarDeclKind::Var {
            for declarator in &var_decl.decls {
                pattern_names(&declarator.name, &mut self.names);
            }
        }
        var_decl.visit_children_with(self);
    }

    // hoisting stops at function boundaries
    fn visit_function(&mut self, _function: &Function) {}
    fn visit_arrow_expr(&mut self, _arrow: &ArrowExpr) {}
}
