#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use crate::config::BuildConfig;
    use crate::error::BuildError;
    use crate::pipeline::run_build;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn library_fixture(dir: &tempfile::TempDir) -> BuildConfig {
        let src = dir.path().join("src");
        write(
            &src,
            "buttons/primary.tsx",
            "export interface ButtonProps { label: string; }\n\
             export function primary(props: ButtonProps): string { return props.label; }\n",
        );
        write(&src, "buttons/primary.css", ".btn { color: red; }\n");
        write(&src, "text/body.tsx", "export const body: string = 'body';\n");
        BuildConfig::new(src, dir.path().join("dist"))
    }

    fn read(dir: &tempfile::TempDir, rel: &str) -> String {
        fs::read_to_string(dir.path().join("dist").join(rel)).unwrap()
    }

    #[test]
    fn builds_the_full_output_tree() {
        let dir = tempfile::tempdir().unwrap();
        let config = library_fixture(&dir);
        let report = run_build(&config).unwrap();

        assert_eq!(report.entries, vec!["buttons/primary", "text/body"]);
        for file in [
            "buttons/primary.js",
            "buttons/primary.d.ts",
            "assets/buttons-primary.css",
            "text/body.js",
            "text/body.d.ts",
            "index.js",
            "index.d.ts",
            "package.json",
        ] {
            assert!(
                dir.path().join("dist").join(file).is_file(),
                "missing output {file}"
            );
        }
    }

    #[test]
    fn style_asset_travels_with_its_entry_only() {
        let dir = tempfile::tempdir().unwrap();
        let config = library_fixture(&dir);
        run_build(&config).unwrap();

        let primary = read(&dir, "buttons/primary.js");
        assert!(primary.starts_with("import '../assets/buttons-primary.css';"));

        // No stylesheet bound: no asset, no import.
        let body = read(&dir, "text/body.js");
        assert!(!body.contains("import '"));
        assert!(!dir.path().join("dist/assets/text-body.css").exists());

        let manifest = read(&dir, "package.json");
        assert!(manifest.contains("\"./assets/buttons-primary.css\""));
        assert!(!manifest.contains("text-body"));

        let asset = read(&dir, "assets/buttons-primary.css");
        assert!(asset.contains(".btn-"));
        assert!(!asset.contains(".btn {"));
    }

    #[test]
    fn declarations_mirror_the_runtime_surface() {
        let dir = tempfile::tempdir().unwrap();
        let config = library_fixture(&dir);
        run_build(&config).unwrap();

        let decl = read(&dir, "buttons/primary.d.ts");
        assert!(decl.contains("interface ButtonProps { label: string; }"));
        assert!(decl.contains("declare function primary(props: ButtonProps): string;"));
        assert!(decl.contains("export { primary };"));
        assert!(decl.contains("export type { ButtonProps };"));

        let body = read(&dir, "text/body.d.ts");
        assert!(body.contains("declare const body: string;"));
        assert!(body.contains("export { body };"));
    }

    #[test]
    fn umbrella_reexports_every_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = library_fixture(&dir);
        run_build(&config).unwrap();

        let umbrella = read(&dir, "index.js");
        assert!(umbrella.contains("export * from './buttons/primary.js';"));
        assert!(umbrella.contains("export * from './text/body.js';"));
        assert_eq!(umbrella, read(&dir, "index.d.ts"));

        let manifest = read(&dir, "package.json");
        assert!(manifest.contains("\"module\": \"./index.js\""));
        assert!(manifest.contains("\"types\": \"./index.d.ts\""));
    }

    #[test]
    fn rebuilding_unchanged_sources_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let config = library_fixture(&dir);
        run_build(&config).unwrap();
        let first: Vec<(String, String)> = [
            "buttons/primary.js",
            "buttons/primary.d.ts",
            "assets/buttons-primary.css",
            "index.js",
            "package.json",
        ]
        .iter()
        .map(|f| (f.to_string(), read(&dir, f)))
        .collect();

        run_build(&config).unwrap();
        for (file, content) in first {
            assert_eq!(content, read(&dir, &file), "{file} changed across rebuilds");
        }
    }

    #[test]
    fn naming_collision_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "badge.ts", "export const badge: number = 1;\n");
        write(&src, "badge.tsx", "export const badge: number = 2;\n");
        let config = BuildConfig::new(src, dir.path().join("dist"));

        let err = run_build(&config).unwrap_err();
        assert!(matches!(err, BuildError::NamingCollision { .. }));
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn colliding_asset_paths_abort_before_any_write() {
        // Segment flattening maps both logical names onto
        // assets/buttons-primary.css; neither asset may clobber the other.
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "buttons/primary.tsx", "export const primary: number = 1;\n");
        write(&src, "buttons/primary.css", ".btn { color: red; }\n");
        write(&src, "buttons-primary.tsx", "export const flat: number = 2;\n");
        write(&src, "buttons-primary.css", ".btn { color: blue; }\n");
        let config = BuildConfig::new(src, dir.path().join("dist"));

        let err = run_build(&config).unwrap_err();
        assert!(matches!(err, BuildError::NamingCollision { .. }));
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn unannotated_public_surface_aborts_before_any_write() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "card.ts", "export const card = 'card';\n");
        let config = BuildConfig::new(src, dir.path().join("dist"));

        let err = run_build(&config).unwrap_err();
        assert!(matches!(err, BuildError::DeclarationEmit { .. }));
        assert!(!dir.path().join("dist").exists());
    }

    #[test]
    fn default_exports_get_named_umbrella_aliases() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "buttons/primary.tsx",
            "export default function Primary(): string { return 'p'; }\n",
        );
        let config = BuildConfig::new(src, dir.path().join("dist"));
        run_build(&config).unwrap();

        let umbrella = read(&dir, "index.js");
        assert!(umbrella
            .contains("export { default as ButtonsPrimary } from './buttons/primary.js';"));
    }

    #[test]
    fn explicit_stylesheet_import_binds_the_asset() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(
            &src,
            "card.tsx",
            "import './styles/card.css';\nexport const card: string = 'card';\n",
        );
        write(&src, "styles/card.css", ".card { padding: 1px; }\n");
        let config = BuildConfig::new(src, dir.path().join("dist"));
        run_build(&config).unwrap();

        let code = read(&dir, "card.js");
        assert!(code.starts_with("import './assets/card.css';"));
        let manifest = read(&dir, "package.json");
        assert!(manifest.contains("\"./assets/card.css\""));
    }

    #[test]
    fn empty_stylesheet_binds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        write(&src, "card.tsx", "export const card: string = 'card';\n");
        write(&src, "card.css", "\n\n");
        let config = BuildConfig::new(src, dir.path().join("dist"));
        run_build(&config).unwrap();

        let code = read(&dir, "card.js");
        assert!(!code.contains("import '"));
        let manifest = read(&dir, "package.json");
        assert!(manifest.contains("\"sideEffects\": []"));
    }
}
