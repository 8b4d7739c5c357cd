//! End-to-end parse sessions over in-memory project trees.

use stackcfg_core::{
    ErrorKind, ErrorList, InMemoryProvider, ParseOptions, ParseSession, ParsedConfig, Registry,
};
use std::path::Path;

fn parse_with(files: &[(&str, &str)], dir: &str, opts: &ParseOptions) -> Result<ParsedConfig, ErrorList> {
    let provider = InMemoryProvider::new(files.iter().copied());
    let registry = Registry::builtin();
    ParseSession::new(&registry, &provider, Path::new("/"), Path::new(dir), opts).run()
}

fn parse(files: &[(&str, &str)], dir: &str) -> Result<ParsedConfig, ErrorList> {
    parse_with(files, dir, &ParseOptions::default())
}

fn attr_names(cfg: &ParsedConfig, labels: &[&str]) -> Vec<String> {
    cfg.globals_with(labels)
        .expect("globals block")
        .attributes
        .keys()
        .cloned()
        .collect()
}

// ── Merging ──────────────────────────────────────────────────────────

#[test]
fn globals_from_two_files_merge_into_one_block() {
    let cfg = parse(
        &[
            ("/s/a.tm", "globals {\n  x = 1\n}\n"),
            ("/s/b.tm", "globals {\n  y = 2\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    assert_eq!(cfg.globals.len(), 1);
    assert_eq!(attr_names(&cfg, &[]), vec!["x", "y"]);
}

#[test]
fn one_merged_block_per_label_tuple() {
    let cfg = parse(
        &[
            ("/s/a.tm", "globals \"a\" {\n  x = 1\n}\nglobals \"a\" \"b\" {\n  y = 1\n}\n"),
            ("/s/b.tm.hcl", "globals \"a\" {\n  z = 1\n}\nglobals {\n  w = 1\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    assert_eq!(cfg.globals.len(), 3);
    assert_eq!(attr_names(&cfg, &["a"]), vec!["x", "z"]);
    assert_eq!(attr_names(&cfg, &["a", "b"]), vec!["y"]);
    assert_eq!(attr_names(&cfg, &[]), vec!["w"]);
}

#[test]
fn duplicate_attribute_across_files_fails_in_either_order() {
    for (first, second) in [("a.tm", "b.tm"), ("b.tm", "a.tm")] {
        let p1 = format!("/s/{}", first);
        let p2 = format!("/s/{}", second);
        let errs = parse(
            &[(p1.as_str(), "globals {\n  x = 1\n}\n"), (p2.as_str(), "globals {\n  x = 2\n}\n")],
            "/s",
        )
        .unwrap_err();
        let err = errs.single().unwrap();
        assert_eq!(err.kind, ErrorKind::Redeclared);
        assert_eq!(err.range.as_ref().unwrap().file.as_ref(), Path::new("/s/b.tm"));
        assert!(err.message.contains("/s/a.tm:2,3-4"), "{}", err.message);
    }
}

#[test]
fn hidden_and_foreign_files_are_ignored() {
    let cfg = parse(
        &[
            ("/s/.hidden.tm", "globals {\n  x = 1\n}\n"),
            ("/s/main.tf", "this is not parsed"),
            ("/s/a.tm", "globals {\n  x = 2\n}\n"),
            ("/s/sub/c.tm", "globals {\n  x = 3\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    let globals = cfg.globals_with(&[]).unwrap();
    assert_eq!(globals.attributes["x"].expr.text(), "2");
}

#[test]
fn unknown_top_level_block_is_a_schema_error() {
    let errs = parse(&[("/s/a.tm", "resource \"x\" {\n}\n")], "/s").unwrap_err();
    let err = errs.single().unwrap();
    assert_eq!(err.kind, ErrorKind::Schema);
    assert_eq!(err.message, "unrecognized block \"resource\"");
}

#[test]
fn every_error_of_every_file_is_reported() {
    let errs = parse(
        &[
            ("/s/a.tm", "globals {\n  x = 1\n}\nbogus {\n}\n"),
            ("/s/b.tm", "globals {\n  x = 2\n}\nassert {\n}\n"),
            ("/s/c.tm", "globals {\n  = 1\n}\n"),
        ],
        "/s",
    )
    .unwrap_err();
    assert!(errs.contains_kind(ErrorKind::Schema));
    assert!(errs.contains_kind(ErrorKind::Redeclared));
    assert!(errs.contains_kind(ErrorKind::Syntax));
    assert!(errs.len() >= 5, "{}", errs);
}

// ── Imports ──────────────────────────────────────────────────────────

#[test]
fn imported_globals_merge_with_native_ones() {
    let cfg = parse(
        &[
            ("/stack/cfg.tm", "import {\n  source = \"/shared/globals.tm\"\n}\nglobals {\n  local = true\n}\n"),
            ("/shared/globals.tm", "globals {\n  shared = \"yes\"\n}\n"),
        ],
        "/stack",
    )
    .unwrap();
    assert_eq!(attr_names(&cfg, &[]), vec!["local", "shared"]);
    let shared = &cfg.globals_with(&[]).unwrap().attributes["shared"];
    assert_eq!(shared.range.file.as_ref(), Path::new("/shared/globals.tm"));
}

#[test]
fn attribute_set_natively_and_through_import_conflicts() {
    let errs = parse(
        &[
            ("/stack/cfg.tm", "import {\n  source = \"/shared/g.tm\"\n}\nglobals {\n  a = 1\n}\n"),
            ("/shared/g.tm", "globals {\n  a = 2\n}\n"),
        ],
        "/stack",
    )
    .unwrap_err();
    assert_eq!(errs.single().unwrap().kind, ErrorKind::Redeclared);
}

#[test]
fn import_cycle_is_reported_in_the_closing_file() {
    let errs = parse(
        &[
            ("/stack/cfg.tm", "import {\n  source = \"/other/cfg.tm\"\n}\n"),
            ("/other/cfg.tm", "import {\n  source = \"/stack/cfg.tm\"\n}\n"),
        ],
        "/stack",
    )
    .unwrap_err();
    let err = errs.single().unwrap();
    assert_eq!(err.kind, ErrorKind::Import);
    assert_eq!(err.range.as_ref().unwrap().file.as_ref(), Path::new("/other/cfg.tm"));
}

#[test]
fn long_import_cycle_terminates() {
    let errs = parse(
        &[
            ("/s/cfg.tm", "import {\n  source = \"/a/x.tm\"\n}\n"),
            ("/a/x.tm", "import {\n  source = \"/b/x.tm\"\n}\n"),
            ("/b/x.tm", "import {\n  source = \"/c/x.tm\"\n}\n"),
            ("/c/x.tm", "import {\n  source = \"/a/x.tm\"\n}\n"),
        ],
        "/s",
    )
    .unwrap_err();
    let err = errs.single().unwrap();
    assert!(err.message.starts_with("import cycle detected"));
    assert_eq!(err.range.as_ref().unwrap().file.as_ref(), Path::new("/c/x.tm"));
}

#[test]
fn self_import_fails_in_every_spelling() {
    for source in ["cfg.tm", "/s/cfg.tm", "./cfg.tm", "*.tm", "c?g.tm"] {
        let src = format!("import {{\n  source = \"{}\"\n}}\n", source);
        let errs = parse(&[("/s/cfg.tm", src.as_str())], "/s").unwrap_err();
        let err = errs.single().unwrap();
        assert_eq!(err.kind, ErrorKind::Import, "source {}", source);
        assert!(err.message.contains("imports itself"), "source {}: {}", source, err);
    }
}

#[test]
fn same_directory_import_fails() {
    let errs = parse(
        &[
            ("/s/cfg.tm", "import {\n  source = \"other.tm.hcl\"\n}\n"),
            ("/s/other.tm.hcl", "globals {\n}\n"),
        ],
        "/s",
    )
    .unwrap_err();
    assert!(errs.iter().any(|e| e.message.contains("same directory")));
}

#[test]
fn glob_imports_follow_lexical_order() {
    let cfg = parse(
        &[
            ("/s/cfg.tm", "import {\n  source = \"/modules/*.tm\"\n}\n"),
            ("/modules/b.tm", "globals \"b\" {\n}\n"),
            ("/modules/a.tm", "globals \"a\" {\n}\n"),
            ("/modules/c.tm", "globals \"c\" {\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    let order: Vec<_> = cfg.globals.iter().map(|g| g.labels[0].clone()).collect();
    assert_eq!(order, vec!["a", "b", "c"]);
}

#[test]
fn empty_glob_is_an_import_error() {
    let errs = parse(&[("/s/cfg.tm", "import {\n  source = \"/nothing/*.tm\"\n}\n")], "/s")
        .unwrap_err();
    assert_eq!(errs.single().unwrap().kind, ErrorKind::Import);
}

#[test]
fn imported_stack_is_unexpected() {
    let errs = parse(
        &[
            ("/s/cfg.tm", "import {\n  source = \"/shared/stack.tm\"\n}\n"),
            ("/shared/stack.tm", "stack {\n  name = \"x\"\n}\n"),
        ],
        "/s",
    )
    .unwrap_err();
    assert!(errs.contains_kind(ErrorKind::Unexpected));
}

#[test]
fn diamond_imports_merge_once() {
    let cfg = parse(
        &[
            ("/s/cfg.tm", "import {\n  source = \"/a/a.tm\"\n}\nimport {\n  source = \"/b/b.tm\"\n}\n"),
            ("/a/a.tm", "import {\n  source = \"/common/c.tm\"\n}\n"),
            ("/b/b.tm", "import {\n  source = \"/common/c.tm\"\n}\n"),
            ("/common/c.tm", "globals {\n  common = 1\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    assert_eq!(attr_names(&cfg, &[]), vec!["common"]);
}

#[test]
fn importing_a_scope_file_back_fails_in_either_order() {
    for importer in ["/s/a.tm", "/s/z.tm"] {
        let files = [
            (importer, "import {\n  source = \"/x/1.tm\"\n}\n"),
            ("/s/stack.tm", "stack {\n}\n"),
            ("/x/1.tm", "import {\n  source = \"/s/stack.tm\"\n}\n"),
        ];
        let errs = parse(&files, "/s").unwrap_err();
        let err = errs.single().unwrap();
        assert_eq!(err.kind, ErrorKind::Import, "importer {}", importer);
        assert!(err.message.contains("belongs to the scope"));
        assert_eq!(err.range.as_ref().unwrap().file.as_ref(), Path::new("/x/1.tm"));
    }
}

#[test]
fn glob_import_under_a_root_with_metacharacters() {
    let provider = InMemoryProvider::new([
        ("/p[1]/s/cfg.tm", "import {\n  source = \"/m/*.tm\"\n}\nimport {\n  source = \"../m/b*.tm\"\n}\n"),
        ("/p[1]/m/a.tm", "globals {\n  a = 1\n}\n"),
        ("/p[1]/m/b.tm", "globals {\n  b = 1\n}\n"),
        ("/p1/m/a.tm", "globals {\n  wrong = 1\n}\n"),
    ]);
    let registry = Registry::builtin();
    let opts = ParseOptions::default();
    let errs = ParseSession::new(&registry, &provider, Path::new("/p[1]"), Path::new("/p[1]/s"), &opts)
        .run()
        .unwrap_err();
    // `/m/*.tm` takes both files, so the `b*` glob re-imports one of them.
    let err = errs.single().unwrap();
    assert!(err.message.contains("imported more than once"), "{}", errs);

    let provider = InMemoryProvider::new([
        ("/p[1]/s/cfg.tm", "import {\n  source = \"/m/*.tm\"\n}\n"),
        ("/p[1]/m/a.tm", "globals {\n  a = 1\n}\n"),
    ]);
    let cfg = ParseSession::new(&registry, &provider, Path::new("/p[1]"), Path::new("/p[1]/s"), &opts)
        .run()
        .unwrap();
    assert_eq!(attr_names(&cfg, &[]), vec!["a"]);
}

// ── Block handlers ───────────────────────────────────────────────────

const SCRIPT: &str = "script \"deploy\" {\n  description = \"Deploy\"\n  job {\n    command = [\"echo\", \"hi\"]\n  }\n}\n";

#[test]
fn scripts_require_the_experiment() {
    let errs = parse(&[("/s/script.tm", SCRIPT)], "/s").unwrap_err();
    let err = errs.single().unwrap();
    assert_eq!(err.kind, ErrorKind::Schema);
    assert!(err.message.contains("terramate.config.experiments = [\"scripts\"]"));
}

#[test]
fn experiment_enabled_through_options() {
    let opts = ParseOptions::default().with_experiment("scripts");
    let cfg = parse_with(&[("/s/script.tm", SCRIPT)], "/s", &opts).unwrap();
    let script = cfg.script(&["deploy"]).unwrap();
    assert_eq!(script.jobs.len(), 1);
    assert_eq!(script.description.as_ref().unwrap().text(), "\"Deploy\"");
}

#[test]
fn experiment_enabled_through_terramate_config() {
    let cfg = parse(
        &[
            ("/s/script.tm", SCRIPT),
            ("/s/terramate.tm", "terramate {\n  config {\n    experiments = [\"scripts\"]\n  }\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    assert_eq!(cfg.scripts.len(), 1);
}

#[test]
fn redeclared_script_cites_the_first() {
    let opts = ParseOptions::default().with_experiment("scripts");
    let errs = parse_with(&[("/s/a.tm", SCRIPT), ("/s/b.tm", SCRIPT)], "/s", &opts).unwrap_err();
    let err = errs.single().unwrap();
    assert_eq!(err.kind, ErrorKind::Redeclared);
    assert!(err.message.contains("/s/a.tm"), "{}", err.message);
}

#[test]
fn job_with_both_command_forms_reports_two_errors() {
    let opts = ParseOptions::default().with_experiment("scripts");
    let errs = parse_with(
        &[(
            "/s/a.tm",
            "script \"x\" {\n  job {\n    command = [\"a\"]\n    commands = [[\"a\"]]\n  }\n}\n",
        )],
        "/s",
        &opts,
    )
    .unwrap_err();
    assert_eq!(errs.len(), 2);
}

#[test]
fn sharing_blocks_populate_config_when_enabled() {
    let opts = ParseOptions::default().with_experiment("outputs-sharing");
    let cfg = parse_with(
        &[
            (
                "/sharing.tm",
                "sharing_backend \"default\" {\n  type     = terraform\n  filename = \"sharing.tf\"\n  command  = [\"terraform\", \"output\", \"-json\"]\n}\n",
            ),
            (
                "/s/io.tm",
                "input \"vpc\" {\n  backend       = \"default\"\n  value         = outputs.vpc.value\n  from_stack_id = \"net\"\n}\noutput \"id\" {\n  backend = \"default\"\n  value   = module.x.id\n}\n",
            ),
        ],
        "/s",
        &opts,
    )
    .unwrap();
    assert_eq!(cfg.inputs[0].name, "vpc");
    assert_eq!(cfg.outputs[0].value.text(), "module.x.id");
    assert!(cfg.sharing_backends.is_empty());

    let cfg = parse_with(
        &[(
            "/sharing.tm",
            "sharing_backend \"default\" {\n  type     = terraform\n  filename = \"sharing.tf\"\n  command  = [\"terraform\", \"output\", \"-json\"]\n}\n",
        )],
        "/",
        &opts,
    )
    .unwrap();
    assert_eq!(cfg.sharing_backends[0].command, vec!["terraform", "output", "-json"]);
}

#[test]
fn sharing_blocks_are_gated_and_validated() {
    let errs = parse(&[("/s/io.tm", "output \"id\" {\n}\n")], "/s").unwrap_err();
    assert!(errs.single().unwrap().message.contains("outputs-sharing"));

    let opts = ParseOptions::default().with_experiment("outputs-sharing");
    let errs = parse_with(
        &[(
            "/s/io.tm",
            "sharing_backend \"a\" \"b\" {\n  type = s3\n  filename = \"\"\n}\ninput \"x\" {\n  value = 1\n}\n",
        )],
        "/s",
        &opts,
    )
    .unwrap_err();
    let messages: Vec<_> = errs.iter().map(|e| e.message.as_str()).collect();
    assert!(messages.contains(&"sharing_backend block must have exactly one label, 2 given"));
    assert!(messages.contains(&"unrecognized sharing backend type: s3"));
    assert!(messages.contains(&"empty \"sharing_backend.filename\""));
    assert!(messages.contains(&"attribute \"sharing_backend.command\" is required"));
    assert!(messages.contains(&"attribute \"input.backend\" is required"));
    assert!(messages.contains(&"attribute \"input.from_stack_id\" is required"));
}

#[test]
fn duplicate_input_names_fail_post_validation() {
    let opts = ParseOptions::default().with_experiment("outputs-sharing");
    let input = "input \"x\" {\n  backend = \"b\"\n  value = 1\n  from_stack_id = \"s\"\n}\n";
    let errs = parse_with(&[("/s/a.tm", input), ("/s/b.tm", input)], "/s", &opts).unwrap_err();
    let err = errs.single().unwrap();
    assert_eq!(err.kind, ErrorKind::Redeclared);
    assert!(err.message.starts_with("input \"x\" redeclared"));
}

#[test]
fn stack_and_asserts() {
    let cfg = parse(
        &[(
            "/s/stack.tm",
            "stack {\n  name = \"app\"\n  after = [\"/net\"]\n}\nassert {\n  assertion = true\n  message = \"ok\"\n}\n",
        )],
        "/s",
    )
    .unwrap();
    assert_eq!(cfg.stack.unwrap().name.as_deref(), Some("app"));
    assert_eq!(cfg.asserts.len(), 1);
}

#[test]
fn second_stack_block_is_redeclared() {
    let errs = parse(
        &[("/s/a.tm", "stack {\n}\n"), ("/s/b.tm", "stack {\n}\n")],
        "/s",
    )
    .unwrap_err();
    assert_eq!(errs.single().unwrap().kind, ErrorKind::Redeclared);
}

#[test]
fn generate_blocks_append_across_files_and_imports() {
    let cfg = parse(
        &[
            ("/s/a.tm", "import {\n  source = \"/gen/backend.tm\"\n}\n\ngenerate_file \"README\" {\n  content = \"docs\"\n}\n"),
            ("/s/b.tm", "generate_hcl \"main.tf\" {\n  content {\n    x = 1\n  }\n}\n"),
            ("/gen/backend.tm", "generate_hcl \"backend.tf\" {\n  content {\n    y = 1\n  }\n}\n"),
        ],
        "/s",
    )
    .unwrap();
    let labels: Vec<_> = cfg.generate_hcls.iter().map(|g| g.label.as_str()).collect();
    assert_eq!(labels, vec!["backend.tf", "main.tf"]);
    assert_eq!(cfg.generate_files.len(), 1);
}

#[test]
fn generate_label_clash_across_files() {
    let errs = parse(
        &[
            ("/s/a.tm", "generate_hcl \"out\" {\n  content {\n  }\n}\n"),
            ("/s/b.tm", "generate_file \"out\" {\n  content = \"x\"\n}\n"),
        ],
        "/s",
    )
    .unwrap_err();
    let err = errs.single().unwrap();
    assert_eq!(err.kind, ErrorKind::Redeclared);
    assert_eq!(err.range.as_ref().unwrap().file.as_ref(), Path::new("/s/b.tm"));
}

#[test]
fn top_level_attributes_are_kept() {
    let cfg = parse(&[("/s/a.tm", "a = 1\n"), ("/s/b.tm", "b = \"x\"\n")], "/s").unwrap();
    let names: Vec<_> = cfg.attributes.keys().cloned().collect();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn parsed_config_serializes_to_json() {
    let cfg = parse(&[("/s/a.tm", "globals \"l\" {\n  x = [1, 2]\n}\n")], "/s").unwrap();
    let json = serde_json::to_value(&cfg).unwrap();
    assert_eq!(json["dir"], "/s");
    assert_eq!(json["globals"][0]["labels"][0], "l");
    assert_eq!(json["globals"][0]["attributes"]["x"]["expr"]["text"], "[1, 2]");
}
