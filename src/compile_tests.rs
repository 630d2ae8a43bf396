#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::compile::{compile_entries, CompiledUnit};
    use crate::config::BuildConfig;
    use crate::discovery::discover_entries;
    use crate::error::BuildError;
    use crate::graph::ModuleGraph;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn compile(dir: &tempfile::TempDir) -> Result<Vec<CompiledUnit>, BuildError> {
        let mut config = BuildConfig::new(dir.path().join("src"), dir.path().join("dist"));
        config.external_specs.insert("react".to_string());
        let entries = discover_entries(&config)?;
        let graph = ModuleGraph::build(&config, &entries)?;
        compile_entries(&graph)
    }

    fn unit<'a>(units: &'a [CompiledUnit], logical: &str) -> &'a CompiledUnit {
        units
            .iter()
            .find(|u| u.logical_name == logical)
            .unwrap_or_else(|| panic!("no compiled unit for {logical}"))
    }

    #[test]
    fn internal_closure_is_inlined_dependencies_first() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "buttons/primary.tsx",
            "import { tokens } from '../_shared/tokens';\n\
             export function primary(): string { return tokens; }\n",
        );
        write(&src, "_shared/tokens.ts", "export const tokens: string = 'blue';\n");

        let units = compile(&dir).unwrap();
        let code = &unit(&units, "buttons/primary").code;
        let tokens_at = code.find("const tokens = 'blue';").unwrap();
        let primary_at = code.find("function primary()").unwrap();
        assert!(tokens_at < primary_at);
        assert!(code.contains("export { primary };"));
        // Internal imports never survive into the output.
        assert!(!code.contains("_shared"));
    }

    #[test]
    fn entries_never_pull_in_each_other() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "a.ts", "export const a: string = 'ALPHA_MARKER';\n");
        write(&src, "b.ts", "export const b: string = 'BRAVO_MARKER';\n");

        let units = compile(&dir).unwrap();
        assert!(!unit(&units, "a").code.contains("BRAVO_MARKER"));
        assert!(!unit(&units, "b").code.contains("ALPHA_MARKER"));
    }

    #[test]
    fn externals_are_hoisted_and_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "counter.tsx",
            "import React from 'react';\n\
             import { useState } from 'react';\n\
             import { helper } from './_shared/helper';\n\
             export function counter(): string { return helper(useState, React); }\n",
        );
        write(
            &src,
            "_shared/helper.ts",
            "import { useState } from 'react';\n\
             export function helper(a: unknown, b: unknown): string { return String(useState); }\n",
        );

        let units = compile(&dir).unwrap();
        let code = &unit(&units, "counter").code;
        assert_eq!(code.matches("from 'react'").count(), 1);
        assert!(code.contains("import React, { useState } from 'react';"));
        assert!(code.starts_with("import React"));
        assert!(unit(&units, "counter").imported_externals.contains("react"));
    }

    #[test]
    fn unused_external_bindings_are_pruned() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import { useMemo } from 'react';\nexport const card: string = 'card';\n",
        );
        let units = compile(&dir).unwrap();
        let code = &unit(&units, "card").code;
        assert!(!code.contains("react"));
        assert!(unit(&units, "card").imported_externals.is_empty());
    }

    #[test]
    fn renamed_internal_imports_are_bridged_with_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import { helper as h } from './_shared/helper';\n\
             export function card(): string { return h(); }\n",
        );
        write(
            &src,
            "_shared/helper.ts",
            "export function helper(): string { return 'x'; }\n",
        );
        let units = compile(&dir).unwrap();
        let code = &unit(&units, "card").code;
        assert!(code.contains("const h = helper;"));
        let alias_at = code.find("const h = helper;").unwrap();
        let use_at = code.find("function card()").unwrap();
        assert!(alias_at < use_at);
    }

    #[test]
    fn namespace_imports_become_object_literals() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import * as helpers from './_shared/helpers';\n\
             export function card(): string { return helpers.one(); }\n",
        );
        write(
            &src,
            "_shared/helpers.ts",
            "export function one(): string { return '1'; }\n\
             export function two(): string { return '2'; }\n",
        );
        let units = compile(&dir).unwrap();
        let code = &unit(&units, "card").code;
        assert!(code.contains("const helpers = { one, two };"));
    }

    #[test]
    fn colliding_top_level_bindings_fail() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import { helper } from './_shared/a';\n\
             import { other } from './_shared/b';\n\
             export function card(): string { return helper() + other(); }\n",
        );
        write(&src, "_shared/a.ts", "export function helper(): string { return 'a'; }\n");
        write(
            &src,
            "_shared/b.ts",
            "function helper(): string { return 'b'; }\n\
             export function other(): string { return helper(); }\n",
        );
        let err = compile(&dir).unwrap_err();
        match err {
            BuildError::TypeCheck { message, .. } => assert!(message.contains("helper")),
            other => panic!("expected TypeCheck, got {other}"),
        }
    }

    #[test]
    fn default_reexports_resolve_to_the_concrete_binding() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "button.tsx", "export { default } from './_impl/button';\n");
        write(
            &src,
            "_impl/button.tsx",
            "export default function Button(): string { return 'button'; }\n",
        );
        let units = compile(&dir).unwrap();
        let code = &unit(&units, "button").code;
        assert!(code.contains("function Button()"));
        assert!(code.contains("export default Button;"));
    }
}
