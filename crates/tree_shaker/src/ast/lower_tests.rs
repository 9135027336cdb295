use ecma_parse::parse_es_module;
use pretty_assertions::assert_eq;

use super::lower::{lower_module, LoweredModule};
use super::{ExportSpecifierIr, ImportSpecifierIr, NodeKind};

fn lower(code: &str) -> LoweredModule {
    let parsed = parse_es_module("test.js", code).unwrap();
    lower_module(&parsed.module, parsed.base_pos)
}

fn body_kinds(lowered: &LoweredModule) -> Vec<NodeKind> {
    lowered
        .ast
        .body()
        .into_iter()
        .map(|id| lowered.ast.kind(id).clone())
        .collect()
}

#[test]
fn collects_import_specifiers() {
    let lowered = lower("import def, { a, b as c } from './x';\nimport * as ns from './y';");
    let kinds = body_kinds(&lowered);
    match &kinds[0] {
        NodeKind::ImportDeclaration { source, specifiers } => {
            assert_eq!(source, "./x");
            assert_eq!(
                specifiers,
                &vec![
                    ImportSpecifierIr {
                        local: "def".to_string(),
                        imported: "default".to_string()
                    },
                    ImportSpecifierIr {
                        local: "a".to_string(),
                        imported: "a".to_string()
                    },
                    ImportSpecifierIr {
                        local: "c".to_string(),
                        imported: "b".to_string()
                    },
                ]
            );
        }
        other => panic!("expected an import declaration, got {:?}", other),
    }
    match &kinds[1] {
        NodeKind::ImportDeclaration { specifiers, .. } => {
            assert_eq!(specifiers[0].imported, "*");
            assert_eq!(specifiers[0].local, "ns");
        }
        other => panic!("expected an import declaration, got {:?}", other),
    }
}

#[test]
fn lowers_named_exports_with_and_without_source() {
    let lowered = lower("const a = 1;\nexport { a, a as b };\nexport { x as y } from './x';");
    let kinds = body_kinds(&lowered);
    match &kinds[1] {
        NodeKind::ExportNamedDeclaration {
            declaration: None,
            specifiers,
            source: None,
        } => {
            assert_eq!(
                specifiers,
                &vec![
                    ExportSpecifierIr {
                        local: "a".to_string(),
                        exported: "a".to_string()
                    },
                    ExportSpecifierIr {
                        local: "a".to_string(),
                        exported: "b".to_string()
                    },
                ]
            );
        }
        other => panic!("expected a named export, got {:?}", other),
    }
    match &kinds[2] {
        NodeKind::ExportNamedDeclaration {
            specifiers,
            source: Some(source),
            ..
        } => {
            assert_eq!(source, "./x");
            assert_eq!(specifiers[0].local, "x");
            assert_eq!(specifiers[0].exported, "y");
        }
        other => panic!("expected a re-export, got {:?}", other),
    }
}

#[test]
fn lowers_star_reexports() {
    let lowered = lower("export * from './a';\nexport * as ns from './b';");
    let kinds = body_kinds(&lowered);
    assert!(matches!(
        &kinds[0],
        NodeKind::ExportAllDeclaration { source, exported_name: None } if source == "./a"
    ));
    assert!(matches!(
        &kinds[1],
        NodeKind::ExportAllDeclaration { source, exported_name: Some(name) }
            if source == "./b" && name == "ns"
    ));
}

#[test]
fn default_function_declarations_keep_their_name() {
    let lowered = lower("export default function main() {}");
    let kinds = body_kinds(&lowered);
    match &kinds[0] {
        NodeKind::ExportDefaultDeclaration { local_name, .. } => {
            assert_eq!(local_name.as_deref(), Some("main"));
        }
        other => panic!("expected a default export, got {:?}", other),
    }

    let anonymous = lower("export default function () {}");
    match &body_kinds(&anonymous)[0] {
        NodeKind::ExportDefaultDeclaration { local_name, .. } => {
            assert_eq!(local_name.as_deref(), None);
        }
        other => panic!("expected a default export, got {:?}", other),
    }
}

#[test]
fn records_dynamic_imports_with_their_specifier() {
    let lowered = lower("import('./lazy').then(go);");
    assert_eq!(lowered.dynamic_imports.len(), 1);
    match lowered.ast.kind(lowered.dynamic_imports[0]) {
        NodeKind::ImportExpression { specifier, .. } => {
            assert_eq!(specifier.as_deref(), Some("./lazy"));
        }
        other => panic!("expected a dynamic import, got {:?}", other),
    }
}

#[test]
fn destructured_declarators_bind_every_name() {
    let lowered = lower("const { a, b: c, ...rest } = value;");
    let declarator = lowered
        .ast
        .nodes
        .iter()
        .find_map(|node| match &node.kind {
            NodeKind::Declarator { names, destructured, .. } => {
                Some((names.clone(), *destructured))
            }
            _ => None,
        })
        .expect("a declarator should be lowered");
    assert_eq!(declarator.0, vec!["a", "c", "rest"]);
    assert!(declarator.1);
}

#[test]
fn shadowed_references_are_not_bindable() {
    let lowered = lower("export const u = 1;\nexport function f(u) { return u; }\nuse(u);");
    let mut bindable = Vec::new();
    let mut shadowed = Vec::new();
    for node in &lowered.ast.nodes {
        if let NodeKind::Identifier {
            name,
            bindable: is_bindable,
            ..
        } = &node.kind
        {
            if name == "u" {
                if *is_bindable {
                    bindable.push(node.span.start);
                } else {
                    shadowed.push(node.span.start);
                }
            }
        }
    }
    // the reference inside f is shadowed by the parameter, the top-level
    // call argument is not
    assert_eq!(shadowed.len(), 1);
    assert_eq!(bindable.len(), 1);
}

#[test]
fn spans_are_zero_based_file_offsets() {
    let code = "const a = 1;\nconst b = 2;";
    let lowered = lower(code);
    let body = lowered.ast.body();
    assert_eq!(lowered.ast.node(body[0]).span.start, 0);
    let second = lowered.ast.node(body[1]).span;
    assert_eq!(&code[second.start as usize..second.start as usize + 7], "const b");
}

#[test]
fn top_level_await_sets_the_module_flag() {
    let lowered = lower("await ready();");
    assert!(lowered.uses_top_level_await);
    let inside = lower("async function f() { await ready(); }");
    assert!(!inside.uses_top_level_await);
}

#[test]
fn loops_lower_to_opaque_statements_with_children() {
    let lowered = lower("for (const item of items) { handle(item); }");
    let kinds = body_kinds(&lowered);
    match &kinds[0] {
        NodeKind::OpaqueStatement { children } => assert!(!children.is_empty()),
        other => panic!("expected an opaque statement, got {:?}", other),
    }
}
