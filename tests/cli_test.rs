//! CLI integration tests for the schema-canon binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("schema-canon"))
}

// Helper to create a temp document file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod normalize_command {
    use super::*;

    #[test]
    fn basic_normalize_merges_all_of() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{
                "allOf": [
                    { "type": "string", "minLength": 1 },
                    { "minLength": 3 }
                ]
            }"#,
        );

        cmd()
            .args(["normalize", document.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""minLength":3"#))
            .stdout(predicate::str::contains("allOf").not());
    }

    #[test]
    fn normalize_resolves_refs() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r##"{
                "a": { "$ref": "#/defs/t" },
                "defs": { "t": { "type": "string" } }
            }"##,
        );

        cmd()
            .args(["normalize", document.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""a":{"type":"string"}"#));
    }

    #[test]
    fn normalize_with_source_fallback() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r##"{ "a": { "$ref": "#/shared/t" } }"##,
        );
        let source = write_temp_file(
            &dir,
            "source.json",
            r#"{ "shared": { "t": { "type": "boolean" } } }"#,
        );

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--source",
                source.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""a":{"type":"boolean"}"#));
    }

    #[test]
    fn normalize_with_pretty() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"type":"object"}"#);

        cmd()
            .args(["normalize", document.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            // Pretty output has newlines and indentation
            .stdout(predicate::str::contains("{\n"));
    }

    #[test]
    fn normalize_with_output_file() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{"allOf":[{"minimum":1},{"minimum":4}]}"#,
        );
        let output = dir.path().join("output.json");

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--output",
                output.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_empty());

        // Verify file was written
        let content = fs::read_to_string(&output).unwrap();
        assert!(content.contains(r#""minimum":4"#));
    }

    #[test]
    fn no_merge_keeps_all_of() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{"allOf":[{"minimum":1},{"minimum":4}]}"#,
        );

        cmd()
            .args(["normalize", document.to_str().unwrap(), "--no-merge"])
            .assert()
            .success()
            .stdout(predicate::str::contains("allOf"));
    }

    #[test]
    fn no_resolve_refs_keeps_refs() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r##"{
                "a": { "$ref": "#/defs/t" },
                "defs": { "t": { "type": "string" } }
            }"##,
        );

        cmd()
            .args(["normalize", document.to_str().unwrap(), "--no-resolve-refs"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r##""$ref":"#/defs/t""##));
    }

    #[test]
    fn lift_distributes_siblings() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{
                "minLength": 2,
                "oneOf": [ { "type": "string" }, { "type": "number" } ]
            }"#,
        );

        cmd()
            .args(["normalize", document.to_str().unwrap(), "--lift"])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                r#"{"oneOf":[{"type":"string","minLength":2},{"type":"number","minLength":2}]}"#,
            ));
    }

    #[test]
    fn origins_marker_embedded() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"a":{"type":"string"}}"#);

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--origins-key",
                "x-origins",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""x-origins":{"type":["/a/type"]}"#));
    }

    #[test]
    fn defaults_marker_and_injection() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{"properties":{"a":{"type":"string"}}}"#,
        );

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--defaults-key",
                "x-defaults",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""required":[]"#))
            .stdout(predicate::str::contains(r#""x-defaults":["required"]"#));
    }

    #[test]
    fn hash_marker_embedded() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"type":"string"}"#);

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--hash-key",
                "x-hash",
            ])
            .assert()
            .success()
            .stdout(predicate::str::is_match(r#""x-hash":"[0-9a-f]{64}""#).unwrap());
    }

    #[test]
    fn broken_ref_warns_on_stderr() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r##"{"a":{"$ref":"#/missing"}}"##);

        cmd()
            .args(["normalize", document.to_str().unwrap()])
            .assert()
            .success()
            .stderr(predicate::str::contains("warning:"));
    }

    #[test]
    fn strict_fails_on_warnings() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r##"{"a":{"$ref":"#/missing"}}"##);

        cmd()
            .args(["normalize", document.to_str().unwrap(), "--strict"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("warning(s) reported"));
    }

    #[test]
    fn validate_reports_malformed_combinators() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"allOf":{"not":"a list"}}"#);

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--validate",
                "--strict",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("allOf"));
    }
}

mod denormalize_command {
    use super::*;

    #[test]
    fn strips_standard_markers() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{
                "type": "string",
                "x-hash": "0123",
                "x-origins": { "type": ["/type"] }
            }"#,
        );

        cmd()
            .args(["denormalize", document.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("x-hash").not())
            .stdout(predicate::str::contains("x-origins").not())
            .stdout(predicate::str::contains(r#""type":"string""#));
    }

    #[test]
    fn strips_only_listed_keys() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(
            &dir,
            "doc.json",
            r#"{ "custom-marker": true, "x-hash": "0123", "type": "string" }"#,
        );

        cmd()
            .args([
                "denormalize",
                document.to_str().unwrap(),
                "--keys",
                "custom-marker",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("custom-marker").not())
            .stdout(predicate::str::contains("x-hash"));
    }

    #[test]
    fn round_trips_normalize_output() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"a":{"type":"string"}}"#);
        let annotated = dir.path().join("annotated.json");

        cmd()
            .args([
                "normalize",
                document.to_str().unwrap(),
                "--origins-key",
                "x-origins",
                "--hash-key",
                "x-hash",
                "--output",
                annotated.to_str().unwrap(),
            ])
            .assert()
            .success();

        cmd()
            .args(["denormalize", annotated.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"a":{"type":"string"}}"#));
    }
}

mod hash_command {
    use super::*;

    #[test]
    fn prints_root_hash() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"type":"string"}"#);

        cmd()
            .args(["hash", document.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::is_match(r"^[0-9a-f]{64}\n$").unwrap());
    }

    #[test]
    fn pointer_selects_subtree() {
        let dir = TempDir::new().unwrap();
        let outer = write_temp_file(&dir, "outer.json", r#"{"a":{"type":"string"}}"#);
        let inner = write_temp_file(&dir, "inner.json", r#"{"type":"string"}"#);

        let at_pointer = cmd()
            .args(["hash", outer.to_str().unwrap(), "--pointer", "/a"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let at_root = cmd()
            .args(["hash", inner.to_str().unwrap()])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        assert_eq!(at_pointer, at_root);
    }

    #[test]
    fn annotations_do_not_change_the_hash() {
        let dir = TempDir::new().unwrap();
        let plain = write_temp_file(&dir, "plain.json", r#"{"type":"string"}"#);
        let titled = write_temp_file(
            &dir,
            "titled.json",
            r#"{"type":"string","title":"Name"}"#,
        );

        let a = cmd()
            .args(["hash", plain.to_str().unwrap()])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let b = cmd()
            .args(["hash", titled.to_str().unwrap()])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        assert_eq!(a, b);
    }

    #[test]
    fn bad_pointer_is_an_error() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"type":"string"}"#);

        cmd()
            .args(["hash", document.to_str().unwrap(), "--pointer", "/missing"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no node at pointer"));
    }

    #[test]
    fn scalar_pointer_is_an_error() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"{"a":{"type":"string"}}"#);

        cmd()
            .args(["hash", document.to_str().unwrap(), "--pointer", "/a/type"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no object node"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn file_not_found() {
        cmd()
            .args(["normalize", "/nonexistent/doc.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn invalid_json_document() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "bad.json", r#"{ not valid json"#);

        cmd()
            .args(["normalize", document.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn non_object_top_level() {
        let dir = TempDir::new().unwrap();
        let document = write_temp_file(&dir, "doc.json", r#"[1, 2, 3]"#);

        cmd()
            .args(["normalize", document.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("must be an object"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Normalize schema documents"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("schema-canon"));
    }

    #[test]
    fn normalize_help() {
        cmd()
            .args(["normalize", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--origins-key"))
            .stdout(predicate::str::contains("--lift"))
            .stdout(predicate::str::contains("--strict"));
    }

    #[test]
    fn denormalize_help() {
        cmd()
            .args(["denormalize", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--keys"));
    }
}

mod fixtures {
    use super::*;

    #[test]
    fn normalize_catalog_fixture() {
        cmd()
            .args(["normalize", "tests/fixtures/catalog.json"])
            .assert()
            .success()
            // The price allOf merges flat.
            .stdout(predicate::str::contains(r#""multipleOf":0.01"#))
            // The recursive product reference re-emits as a cycle pointer.
            .stdout(predicate::str::contains(r##""$ref":"#/$defs/product""##));
    }

    #[test]
    fn hash_catalog_fixture_is_stable() {
        let first = cmd()
            .args(["hash", "tests/fixtures/catalog.json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let second = cmd()
            .args(["hash", "tests/fixtures/catalog.json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        assert_eq!(first, second);
    }
}
