use ahashmap::AHashSet;
use logger::NullLogger;
use pretty_assertions::assert_eq;

use crate::error::{ShakeError, Warning};
use crate::graph::ModuleGraph;
use crate::options::{ModuleInput, ResolvedId, ShakeOptions, SyntheticNamedExports};
use crate::resolve_export::ExportSearch;
use crate::variable::{VariableId, VariableKind};

fn build(inputs: Vec<ModuleInput>) -> ModuleGraph {
    ModuleGraph::build(inputs, ShakeOptions::default(), NullLogger).unwrap()
}

fn resolve(
    graph: &mut ModuleGraph,
    id: &str,
    name: &str,
) -> Result<Option<VariableId>, ShakeError> {
    let target = graph.module_by_id(id).expect("module should exist");
    let mut searched = AHashSet::default();
    graph
        .get_variable_for_export_name(target, name, ExportSearch::default(), &mut searched)
        .map(|(variable, _)| variable)
}

#[test]
fn resolves_direct_exports_and_the_namespace() {
    let mut graph = build(vec![ModuleInput::new(
        "/a.js",
        "export const x = 1;",
    )]);
    let resolved = resolve(&mut graph, "/a.js", "x").unwrap().unwrap();
    let a = graph.module_by_id("/a.js").unwrap().internal().unwrap();
    assert_eq!(resolved, graph.module(a).scope["x"]);

    let namespace = resolve(&mut graph, "/a.js", "*").unwrap().unwrap();
    assert_eq!(namespace, graph.module(a).namespace_variable);
}

#[test]
fn circular_reexports_raise_with_the_second_visited_module() {
    let inputs = vec![
        ModuleInput::new("/a.js", "export { x } from './b';")
            .resolving("./b", ResolvedId::internal("/b.js")),
        ModuleInput::new("/b.js", "export { x } from './a';")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ];
    let mut graph = build(inputs.clone());
    match resolve(&mut graph, "/a.js", "x") {
        Err(ShakeError::CircularReexport { name, module }) => {
            assert_eq!(name, "x");
            assert_eq!(module, "/b.js");
        }
        other => panic!("expected a circular reexport error, got {:?}", other),
    }

    let mut graph = build(inputs);
    match resolve(&mut graph, "/b.js", "x") {
        Err(ShakeError::CircularReexport { module, .. }) => assert_eq!(module, "/a.js"),
        other => panic!("expected a circular reexport error, got {:?}", other),
    }
}

#[test]
fn conflicting_star_reexports_warn_and_hide_the_name() {
    let mut graph = build(vec![
        ModuleInput::new("/a.js", "export const k = 1;"),
        ModuleInput::new("/b.js", "export const k = 2;"),
        ModuleInput::new("/m.js", "export * from './a';\nexport * from './b';")
            .resolving("./a", ResolvedId::internal("/a.js"))
            .resolving("./b", ResolvedId::internal("/b.js")),
    ]);
    assert_eq!(resolve(&mut graph, "/m.js", "k").unwrap(), None);
    let warnings = graph.take_warnings();
    assert_eq!(
        warnings,
        vec![Warning::NamespaceConflict {
            name: "k".to_string(),
            reexporting_module: "/m.js".to_string(),
            sources: vec!["/a.js".to_string(), "/b.js".to_string()],
        }]
    );

    // the probe result is memoized, a second query does not warn again
    assert_eq!(resolve(&mut graph, "/m.js", "k").unwrap(), None);
    assert_eq!(graph.take_warnings(), vec![]);
}

#[test]
fn internal_star_reexports_beat_external_ones_silently() {
    let mut graph = build(vec![
        ModuleInput::new("/a.js", "export const k = 1;"),
        ModuleInput::new("/m.js", "export * from './a';\nexport * from 'ext';")
            .resolving("./a", ResolvedId::internal("/a.js"))
            .resolving("ext", ResolvedId::external("ext")),
    ]);
    let resolved = resolve(&mut graph, "/m.js", "k").unwrap().unwrap();
    let a = graph.module_by_id("/a.js").unwrap().internal().unwrap();
    assert_eq!(resolved, graph.module(a).scope["k"]);
    assert_eq!(graph.take_warnings(), vec![]);
}

#[test]
fn ambiguous_external_star_reexports_pick_the_first_and_warn() {
    let mut graph = build(vec![ModuleInput::new(
        "/m.js",
        "export * from 'ext1';\nexport * from 'ext2';",
    )
    .resolving("ext1", ResolvedId::external("ext1"))
    .resolving("ext2", ResolvedId::external("ext2"))]);
    let resolved = resolve(&mut graph, "/m.js", "z").unwrap().unwrap();
    assert!(matches!(
        graph.variables.get(resolved).kind,
        VariableKind::External { .. }
    ));
    let warnings = graph.take_warnings();
    assert_eq!(warnings.len(), 1);
    match &warnings[0] {
        Warning::AmbiguousExternalNamespaces {
            name, used_module, ..
        } => {
            assert_eq!(name, "z");
            assert_eq!(used_module, "ext1");
        }
        other => panic!("expected an ambiguous-namespace warning, got {:?}", other),
    }
}

#[test]
fn real_reexports_beat_synthetic_named_exports() {
    let mut graph = build(vec![
        ModuleInput::new("/c.js", "export const x = 1;"),
        ModuleInput::new(
            "/a.js",
            "export default {};\nexport { x } from './c';",
        )
        .with_synthetic_named_exports(SyntheticNamedExports::Default)
        .resolving("./c", ResolvedId::internal("/c.js")),
        ModuleInput::new("/m.js", "export * from './a';")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let resolved = resolve(&mut graph, "/m.js", "x").unwrap().unwrap();
    let c = graph.module_by_id("/c.js").unwrap().internal().unwrap();
    assert_eq!(resolved, graph.module(c).scope["x"]);
    assert!(matches!(
        graph.variables.get(resolved).kind,
        VariableKind::Local { .. }
    ));
}

#[test]
fn synthetic_named_exports_serve_unknown_names_from_the_fallback() {
    let mut graph = build(vec![ModuleInput::new("/a.js", "export default {};")
        .with_synthetic_named_exports(SyntheticNamedExports::Default)]);
    let resolved = resolve(&mut graph, "/a.js", "anything").unwrap().unwrap();
    let a = graph.module_by_id("/a.js").unwrap().internal().unwrap();
    match graph.variables.get(resolved).kind {
        VariableKind::Synthetic { base } => {
            assert_eq!(Some(base), graph.module(a).default_variable);
        }
        ref other => panic!("expected a synthetic export, got {:?}", other),
    }
    // the same name resolves to the same cached variable
    assert_eq!(
        resolve(&mut graph, "/a.js", "anything").unwrap().unwrap(),
        resolved
    );
}

#[test]
fn synthetic_named_exports_without_their_fallback_are_fatal() {
    let mut graph = build(vec![ModuleInput::new("/a.js", "export const x = 1;")
        .with_synthetic_named_exports(SyntheticNamedExports::Named("fallback".to_string()))]);
    match resolve(&mut graph, "/a.js", "anything") {
        Err(ShakeError::SyntheticNamedExportsNeedNamespaceExport { module, fallback }) => {
            assert_eq!(module, "/a.js");
            assert_eq!(fallback, "fallback");
        }
        other => panic!("expected the synthetic-exports error, got {:?}", other),
    }
}

#[test]
fn missing_exports_are_shimmed_when_enabled() {
    let options = ShakeOptions {
        shim_missing_exports: true,
        ..ShakeOptions::default()
    };
    let mut graph = ModuleGraph::build(
        vec![
            ModuleInput::new("/a.js", "export const present = 1;"),
            ModuleInput::entry("/b.js", "import { missing } from './a';\nuse(missing);")
                .resolving("./a", ResolvedId::internal("/a.js")),
        ],
        options,
        NullLogger,
    )
    .unwrap();
    let a = graph.module_by_id("/a.js").unwrap().internal().unwrap();
    assert!(graph.module(a).needs_export_shim);
    assert_eq!(
        graph.take_warnings(),
        vec![Warning::ShimmedExport {
            module: "/a.js".to_string(),
            name: "missing".to_string(),
        }]
    );
    let resolved = resolve(&mut graph, "/a.js", "missing").unwrap().unwrap();
    assert!(matches!(
        graph.variables.get(resolved).kind,
        VariableKind::Shim
    ));
}

#[test]
fn missing_exports_without_shimming_are_fatal_with_a_location() {
    let result = ModuleGraph::build(
        vec![
            ModuleInput::new("/a.js", "export const present = 1;"),
            ModuleInput::entry("/b.js", "import { missing } from './a';")
                .resolving("./a", ResolvedId::internal("/a.js")),
        ],
        ShakeOptions::default(),
        NullLogger,
    );
    match result {
        Err(ShakeError::MissingExport {
            name,
            exporter,
            importer,
            loc,
            ..
        }) => {
            assert_eq!(name, "missing");
            assert_eq!(exporter, "/a.js");
            assert_eq!(importer, "/b.js");
            assert_eq!((loc.line, loc.column), (1, 0));
        }
        other => panic!("expected a missing-export error, got {:?}", other),
    }
}

#[test]
fn default_export_aliases_chain_to_the_original_binding() {
    let mut graph = build(vec![
        ModuleInput::new("/a.js", "const foo = 1;\nexport default foo;"),
        ModuleInput::new("/m.js", "import x from './a';\nexport { x };")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let resolved = resolve(&mut graph, "/m.js", "x").unwrap().unwrap();
    let a = graph.module_by_id("/a.js").unwrap().internal().unwrap();
    assert_eq!(Some(resolved), graph.module(a).default_variable);
    assert_eq!(
        graph.variables.original_variable(resolved),
        graph.module(a).scope["foo"]
    );
    assert_eq!(
        graph.variables.direct_original_variable(resolved),
        Some(graph.module(a).scope["foo"])
    );
}

#[test]
fn export_star_names_propagate_without_default() {
    let mut graph = build(vec![
        ModuleInput::new(
            "/a.js",
            "export const x = 1;\nexport default 2;",
        ),
        ModuleInput::new("/m.js", "export const own = 3;\nexport * from './a';")
            .resolving("./a", ResolvedId::internal("/a.js")),
    ]);
    let m = graph.module_by_id("/m.js").unwrap().internal().unwrap();
    assert_eq!(graph.get_all_export_names(m), vec!["own", "x"]);
    // `default` does not travel through `export *`
    assert_eq!(resolve(&mut graph, "/m.js", "default").unwrap(), None);
}
