#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::config::BuildConfig;
    use crate::discovery::discover_entries;
    use crate::error::BuildError;
    use crate::graph::{ImportTarget, ModuleGraph};

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn build_graph(dir: &tempfile::TempDir) -> Result<ModuleGraph, BuildError> {
        let mut config = BuildConfig::new(dir.path().join("src"), dir.path().join("dist"));
        config.external_specs.insert("react".to_string());
        let entries = discover_entries(&config)?;
        ModuleGraph::build(&config, &entries)
    }

    #[test]
    fn records_imports_exports_and_type_decls() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "buttons/primary.tsx",
            "import { tokens } from '../_shared/tokens';\n\
             export interface ButtonProps { label: string; }\n\
             export const primary: string = tokens;\n\
             export default function Primary(props: ButtonProps): string { return primary; }\n",
        );
        write(&src, "_shared/tokens.ts", "export const tokens: string = 'blue';\n");

        let graph = build_graph(&dir).unwrap();
        assert!(graph.modules.contains_key("buttons/primary"));
        assert!(graph.modules.contains_key("_shared/tokens"));

        let record = graph.module("buttons/primary").unwrap();
        assert_eq!(record.imports.len(), 1);
        assert_eq!(
            record.imports[0].target,
            ImportTarget::Internal("_shared/tokens".to_string())
        );
        assert!(record.exports.values.contains_key("primary"));
        assert!(record.exports.types.contains_key("ButtonProps"));
        assert!(record.exports.default.is_some());
        assert_eq!(record.type_decls.len(), 1);
    }

    #[test]
    fn runtime_bodies_are_type_erased() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "export function card(label: string): string { return label as string; }\n",
        );
        let graph = build_graph(&dir).unwrap();
        let record = graph.module("card").unwrap();
        let body = record.body.join("\n");
        assert!(!body.contains(": string"));
        assert!(!body.contains(" as "));
        assert!(body.contains("function card(label)"));
    }

    #[test]
    fn syntax_error_is_a_type_check_failure() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("src"), "broken.ts", "const = ;\n");
        let err = build_graph(&dir).unwrap_err();
        assert!(matches!(err, BuildError::TypeCheck { .. }));
    }

    #[test]
    fn importing_a_missing_export_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import { ghost } from './_shared/util';\nexport const card: string = ghost;\n",
        );
        write(&src, "_shared/util.ts", "export const real: number = 1;\n");
        let err = build_graph(&dir).unwrap_err();
        match err {
            BuildError::TypeCheck { module, message } => {
                assert_eq!(module, "card");
                assert!(message.contains("ghost"));
            }
            other => panic!("expected TypeCheck, got {other}"),
        }
    }

    #[test]
    fn runtime_import_cycles_fail_verification() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "a.ts",
            "import { b } from './b';\nexport const a: number = b;\n",
        );
        write(
            &src,
            "b.ts",
            "import { a } from './a';\nexport const b: number = a;\n",
        );
        let err = build_graph(&dir).unwrap_err();
        match err {
            BuildError::TypeCheck { message, .. } => assert!(message.contains("cycle")),
            other => panic!("expected TypeCheck, got {other}"),
        }
    }

    #[test]
    fn export_star_expands_into_the_surface() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "kit.ts", "export * from './_parts/atoms';\n");
        write(
            &src,
            "_parts/atoms.ts",
            "export const atom: number = 1;\nexport interface Atom { id: number; }\n",
        );
        let graph = build_graph(&dir).unwrap();
        let surface = graph.export_surface("kit").unwrap();
        assert!(surface.values.contains_key("atom"));
        assert!(surface.types.contains_key("Atom"));
    }

    #[test]
    fn anonymous_default_export_gets_a_synthetic_name() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "export default function (): string { return 'card'; }\n",
        );
        let graph = build_graph(&dir).unwrap();
        let record = graph.module("card").unwrap();
        assert!(record.declared_names.contains("_default_card"));
        assert!(record.body.join("\n").contains("const _default_card = function"));
    }

    #[test]
    fn stylesheet_imports_must_not_bind_names() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import styles from './card.css';\nexport const card: string = styles;\n",
        );
        write(&src, "card.css", ".card { }\n");
        let err = build_graph(&dir).unwrap_err();
        assert!(matches!(err, BuildError::TypeCheck { .. }));
    }

    #[test]
    fn bundle_import_outside_the_tree_is_unresolved() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("src"),
            "card.tsx",
            "import { x } from './nope';\nexport const card: number = x;\n",
        );
        let err = build_graph(&dir).unwrap_err();
        assert!(matches!(err, BuildError::UnresolvedImport { .. }));
    }

    #[test]
    fn enums_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("src"),
            "card.ts",
            "export enum Kind { A, B }\n",
        );
        let err = build_graph(&dir).unwrap_err();
        match err {
            BuildError::TypeCheck { message, .. } => assert!(message.contains("enum")),
            other => panic!("expected TypeCheck, got {other}"),
        }
    }

    #[test]
    fn type_only_imports_are_not_runtime_edges() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import type { Shape } from './_shared/shapes';\n\
             export const card: Shape = { id: 1 };\n",
        );
        write(&src, "_shared/shapes.ts", "export interface Shape { id: number; }\n");
        let graph = build_graph(&dir).unwrap();
        let record = graph.module("card").unwrap();
        let closure = graph.runtime_closure("card").unwrap();
        assert_eq!(closure, vec!["card"]);
        // The type closure still reaches the shape module.
        assert!(graph.type_closure("card").unwrap().contains(&"_shared/shapes".to_string()));
        assert!(!record.imports[0].has_runtime_effect());
    }
}
