use logger::NullLogger;
use pretty_assertions::assert_eq;

use crate::error::{ShakeError, Warning};
use crate::graph::ModuleGraph;
use crate::module::{ModuleId, ModuleRef};
use crate::options::{
    ModuleInput, ModuleSideEffects, RenderOptions, ResolvedId, ShakeOptions,
};
use crate::shake;
use crate::variable::VariableId;

fn shaken(inputs: Vec<ModuleInput>) -> ModuleGraph {
    shake(inputs, ShakeOptions::default(), NullLogger).unwrap()
}

fn internal(graph: &ModuleGraph, id: &str) -> ModuleId {
    graph
        .module_by_id(id)
        .and_then(|target| target.internal())
        .expect("internal module")
}

fn var_included(graph: &ModuleGraph, m: ModuleId, name: &str) -> bool {
    graph
        .variables
        .get(graph.module(m).scope[name])
        .included
}

fn render(graph: &ModuleGraph, m: ModuleId) -> String {
    graph.render_module(m, &RenderOptions::default())
}

#[test]
fn pure_imports_keep_only_the_used_binding() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "export const u = 1;\nexport const v = 2;"),
        ModuleInput::entry("/b.js", "import { u } from './a';\nconsole.log(u);")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");

    assert!(var_included(&graph, a, "u"));
    assert!(!var_included(&graph, a, "v"));

    let rendered_a = render(&graph, a);
    assert!(rendered_a.contains("u = 1"));
    assert!(!rendered_a.contains("v = 2"));

    let rendered_b = render(&graph, b);
    assert!(rendered_b.contains("import { u } from './a'"));
    assert!(rendered_b.contains("console.log(u)"));

    assert_eq!(
        graph.get_dependencies_to_be_included(b).unwrap(),
        vec![ModuleRef::Internal(a)]
    );
    assert_eq!(
        graph.get_rendered_exports(a).unwrap().rendered,
        vec!["u".to_string()]
    );
    assert_eq!(
        graph.get_rendered_exports(a).unwrap().removed,
        vec!["v".to_string()]
    );
    assert_eq!(graph.take_warnings(), vec![]);
}

#[test]
fn side_effect_modules_keep_their_statements_when_impure() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "console.log(\"hi\");"),
        ModuleInput::entry("/b.js", "import './a';")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");
    let statement = graph.module(a).ast.body()[0];
    assert!(graph.module(a).ast.node(statement).included);
    assert_eq!(
        graph.get_dependencies_to_be_included(b).unwrap(),
        vec![ModuleRef::Internal(a)]
    );
}

#[test]
fn pure_flagged_modules_are_dropped_when_only_executed() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "console.log(\"hi\");")
            .with_side_effects(ModuleSideEffects::Pure),
        ModuleInput::entry("/b.js", "import './a';")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");
    let statement = graph.module(a).ast.body()[0];
    assert!(!graph.module(a).ast.node(statement).included);
    assert_eq!(graph.get_dependencies_to_be_included(b).unwrap(), vec![]);
}

#[test]
fn reexport_relays_contribute_no_statements() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "export const x = 1;"),
        ModuleInput::new("/b.js", "export { x } from './a';")
            .resolving("./a", ResolvedId::internal("/a.js")),
        ModuleInput::entry("/c.js", "import { x } from './b';\nconsole.log(x);")
            .resolving("./b", ResolvedId::internal("/b.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");
    let c = internal(&graph, "/c.js");

    assert!(var_included(&graph, a, "x"));
    let bare = graph.render_module(
        b,
        &RenderOptions {
            keep_module_declarations: false,
        },
    );
    assert_eq!(bare, "");

    // the relay is skipped, the defining module stays
    assert_eq!(
        graph.get_dependencies_to_be_included(c).unwrap(),
        vec![ModuleRef::Internal(a)]
    );
}

#[test]
fn circular_reexports_are_fatal_during_binding() {
    let result = shake(
        vec![
            ModuleInput::new("/a.js", "export { x } from './b';")
                .resolving("./b", ResolvedId::internal("/b.js")),
            ModuleInput::new("/b.js", "export { x } from './a';")
                .resolving("./a", ResolvedId::internal("/a.js")),
            ModuleInput::entry("/c.js", "import { x } from './a';\nconsole.log(x);")
                .resolving("./a", ResolvedId::internal("/a.js")),
        ],
        ShakeOptions::default(),
        NullLogger,
    );
    match result {
        Err(ShakeError::CircularReexport { name, module }) => {
            assert_eq!(name, "x");
            assert_eq!(module, "/b.js");
        }
        other => panic!("expected a circular reexport error, got {:?}", other),
    }
}

#[test]
fn conflicting_star_exports_stay_hidden_from_the_namespace() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "export const k = 1;"),
        ModuleInput::new("/b.js", "export const k = 2;"),
        ModuleInput::new("/m.js", "export * from './a';\nexport * from './b';")
            .resolving("./a", ResolvedId::internal("/a.js"))
            .resolving("./b", ResolvedId::internal("/b.js")),
        ModuleInput::entry("/e.js", "import * as ns from './m';\nconsole.log(ns.k);")
            .resolving("./m", ResolvedId::internal("/m.js")),
    ]);
    let warnings = graph.take_warnings();
    assert_eq!(
        warnings,
        vec![Warning::NamespaceConflict {
            name: "k".to_string(),
            reexporting_module: "/m.js".to_string(),
            sources: vec!["/a.js".to_string(), "/b.js".to_string()],
        }]
    );

    let m = graph.module_by_id("/m.js").unwrap();
    let mut searched = ahashmap::AHashSet::default();
    let (variable, _) = graph
        .get_variable_for_export_name(
            m,
            "k",
            crate::resolve_export::ExportSearch::default(),
            &mut searched,
        )
        .unwrap();
    assert_eq!(variable, None);
}

#[test]
fn dynamic_imports_preserve_the_full_namespace() {
    let graph = shaken(vec![
        ModuleInput::new("/a.js", "export const v = 1;\nexport const w = 2;"),
        ModuleInput::entry(
            "/b.js",
            "import('./a').then(function (ns) { use(ns.v); });",
        )
        .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");

    assert!(var_included(&graph, a, "v"));
    assert!(var_included(&graph, a, "w"));
    assert_eq!(
        graph.module(b).dynamic_dependencies,
        vec![ModuleRef::Internal(a)]
    );
    assert_eq!(graph.module(a).included_dynamic_importers, vec![b]);
}

#[test]
fn no_treeshake_modules_keep_everything_and_every_dependency() {
    let mut graph = shaken(vec![
        ModuleInput::new("/d.js", "export const noise = 1;"),
        ModuleInput::new(
            "/a.js",
            "import './d';\nexport const used = 1;\nconst unused = 2;",
        )
        .with_side_effects(ModuleSideEffects::NoTreeshake)
        .resolving("./d", ResolvedId::internal("/d.js")),
        ModuleInput::entry("/e.js", "import { used } from './a';\nconsole.log(used);")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let d = internal(&graph, "/d.js");

    for statement in graph.module(a).ast.body() {
        assert!(graph.module(a).ast.node(statement).included);
    }
    assert!(var_included(&graph, a, "unused"));
    assert_eq!(
        graph.get_dependencies_to_be_included(a).unwrap(),
        vec![ModuleRef::Internal(d)]
    );
}

#[test]
fn entry_exports_are_always_preserved() {
    let mut graph = shaken(vec![ModuleInput::entry(
        "/e.js",
        "export const a = 1;\nexport function b() {}\nexport default 42;\nconst internal = 9;",
    )]);
    let e = internal(&graph, "/e.js");
    for name in graph.get_all_export_names(e) {
        let mut searched = ahashmap::AHashSet::default();
        let (variable, _) = graph
            .get_variable_for_export_name(
                ModuleRef::Internal(e),
                &name,
                crate::resolve_export::ExportSearch::default(),
                &mut searched,
            )
            .unwrap();
        let variable = variable.unwrap_or_else(|| panic!("{} should resolve", name));
        assert!(
            graph.variables.get(variable).included,
            "{} should be included",
            name
        );
    }
    assert!(!var_included(&graph, e, "internal"));
}

#[test]
fn inclusion_is_monotone_across_extra_passes() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "export const u = 1;\nexport const v = 2;"),
        ModuleInput::entry("/b.js", "import { u } from './a';\nconsole.log(u);")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let before: Vec<bool> = (0..graph.variables.len())
        .map(|index| graph.variables.get(VariableId(index as u32)).included)
        .collect();
    graph.include_statements().unwrap();
    let after: Vec<bool> = (0..graph.variables.len())
        .map(|index| graph.variables.get(VariableId(index as u32)).included)
        .collect();
    assert_eq!(before, after);
}

#[test]
fn disabling_treeshake_includes_every_statement() {
    let graph = shake(
        vec![
            ModuleInput::new("/a.js", "export const u = 1;\nexport const v = 2;"),
            ModuleInput::entry("/b.js", "import { u } from './a';\nconsole.log(u);")
                .resolving("./a", ResolvedId::internal("/a.js")),
        ],
        ShakeOptions {
            treeshake: false,
            ..ShakeOptions::default()
        },
        NullLogger,
    )
    .unwrap();
    let a = internal(&graph, "/a.js");
    assert!(var_included(&graph, a, "u"));
    assert!(var_included(&graph, a, "v"));
    assert!(render(&graph, a).contains("v = 2"));
}

#[test]
fn statically_dead_branches_are_dropped() {
    let graph = shaken(vec![ModuleInput::entry(
        "/e.js",
        "if (false) { console.log(\"dead\"); }\nconsole.log(\"alive\");",
    )]);
    let e = internal(&graph, "/e.js");
    let rendered = render(&graph, e);
    assert!(rendered.contains("alive"));
    assert!(!rendered.contains("dead"));
}

#[test]
fn reassignments_deoptimize_literal_tests() {
    let graph = shaken(vec![ModuleInput::entry(
        "/e.js",
        "let flag = false;\nflag = true;\nif (flag) { console.log(\"on\"); }",
    )]);
    let e = internal(&graph, "/e.js");
    let rendered = render(&graph, e);
    assert!(rendered.contains("let flag = false"));
    assert!(rendered.contains("flag = true"));
    assert!(rendered.contains("console.log(\"on\")"));
    assert!(graph.variables.get(graph.module(e).scope["flag"]).is_reassigned);
}

#[test]
fn import_cycles_share_a_cycle_token() {
    let graph = shaken(vec![
        ModuleInput::entry(
            "/a.js",
            "import { y } from './b';\nexport const x = 1;\nconsole.log(y);",
        )
        .resolving("./b", ResolvedId::internal("/b.js")),
        ModuleInput::new("/b.js", "import { x } from './a';\nexport const y = x + 1;")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");
    assert!(!graph.module(a).cycles.is_empty());
    assert_eq!(graph.module(a).cycles, graph.module(b).cycles);
    assert_ne!(graph.module(a).exec_index, usize::MAX);
    assert_ne!(graph.module(b).exec_index, usize::MAX);
    assert!(graph.module(b).exec_index < graph.module(a).exec_index);
}

#[test]
fn module_info_summarizes_the_graph_surface() {
    let graph = shaken(vec![
        ModuleInput::new("/a.js", "export default 1;"),
        ModuleInput::entry("/b.js", "import d from './a';\nconsole.log(d);")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let a = internal(&graph, "/a.js");
    let b = internal(&graph, "/b.js");

    let info_a = graph.module_info(a);
    assert!(info_a.has_default_export);
    assert!(info_a.is_included);
    assert!(!info_a.is_entry);
    assert_eq!(info_a.importers, vec!["/b.js".to_string()]);

    let info_b = graph.module_info(b);
    assert!(info_b.is_entry);
    assert_eq!(info_b.imported_ids, vec!["/a.js".to_string()]);
    assert_eq!(info_b.dynamically_imported_ids, Vec::<String>::new());
}

#[test]
fn report_warnings_forwards_codes_to_the_logger() {
    let mut graph = shaken(vec![
        ModuleInput::new("/a.js", "export const k = 1;"),
        ModuleInput::new("/b.js", "export const k = 2;"),
        ModuleInput::new("/m.js", "export * from './a';\nexport * from './b';")
            .resolving("./a", ResolvedId::internal("/a.js"))
            .resolving("./b", ResolvedId::internal("/b.js")),
        ModuleInput::entry("/e.js", "import * as ns from './m';\nconsole.log(ns.k);")
            .resolving("./m", ResolvedId::internal("/m.js")),
    ]);
    let logger = logger::MemoryLogger::new();
    crate::report_warnings(&mut graph, &logger);
    let warnings = logger.warnings().unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].starts_with("NAMESPACE_CONFLICT: "));
    assert!(warnings[0].contains("\"k\""));
    // drained: nothing left on the graph, nothing reported twice
    assert_eq!(graph.take_warnings(), vec![]);
}

#[test]
fn external_reexports_are_marked_used_and_reexported() {
    let graph = shaken(vec![ModuleInput::entry(
        "/e.js",
        "export { helper } from 'ext';",
    )
    .resolving("ext", ResolvedId::external("ext"))]);
    let external = match graph.module_by_id("ext") {
        Some(ModuleRef::External(external)) => external,
        other => panic!("expected an external module, got {:?}", other),
    };
    assert!(graph.external(external).used);
    assert!(graph.external(external).reexported);
}
