use sluice::core::interfaces::JsBundler;
use sluice::core::models::{JsOptions, PipelineConfig, Task};
use sluice::core::services::PipelineService;
use sluice::infrastructure::{ModuleTransformer, OxcJsBundler};
use sourcemap::SourceMap;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn js_project() -> TempDir {
    let fixture = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/site/src/js");
    let temp_dir = tempfile::tempdir().unwrap();
    let js_dir = temp_dir.path().join("src/js");
    std::fs::create_dir_all(&js_dir).unwrap();

    for name in ["main.js", "greet.js", "data.json"] {
        std::fs::copy(fixture.join(name), js_dir.join(name)).unwrap();
    }

    temp_dir
}

/// Zero-based (line, column) of the first occurrence of `needle`
fn position_of(code: &str, needle: &str) -> (u32, u32) {
    let offset = code.find(needle).unwrap();
    let before = &code[..offset];
    let line = before.matches('\n').count();
    let column = offset - before.rfind('\n').map(|i| i + 1).unwrap_or(0);
    (line as u32, column as u32)
}

fn assert_marker_maps_to_greet(code: &str, map_json: &str) {
    let map = SourceMap::from_slice(map_json.as_bytes()).unwrap();
    let (line, column) = position_of(code, "\"marker\"");

    let token = map.lookup_token(line, column).unwrap();
    let source = token.get_source().unwrap();
    assert!(source.ends_with("src/js/greet.js"), "mapped to {}", source);
    assert_eq!(token.get_src_line(), 1);
}

fn bundler(root: &Path, minify: bool) -> OxcJsBundler {
    let mut options: JsOptions = PipelineConfig::for_root(root).js;
    options.minify = minify;
    OxcJsBundler::new(options, true, root.to_path_buf())
}

#[test]
fn test_lowering_removes_newer_syntax() {
    let transformer = ModuleTransformer::new("es2019");
    let source = "export const pick = (a) => a?.b ?? 'fallback';\n";

    let module = transformer
        .transform(source, Path::new("/p/src/js/pick.js"), "src/js/pick.js")
        .unwrap();

    assert!(!module.code.contains("??"));
    assert!(!module.code.contains("?."));
    assert!(module.code.contains("exports"));
}

#[test]
fn test_modern_target_keeps_syntax() {
    let transformer = ModuleTransformer::new("es2020");
    let source = "export const pick = (a) => a ?? 'fallback';\n";

    let module = transformer
        .transform(source, Path::new("/p/src/js/pick.js"), "src/js/pick.js")
        .unwrap();

    assert!(module.code.contains("??"));
}

#[tokio::test]
async fn test_unminified_bundle_maps_back_to_module() {
    let project = js_project();
    let entry = project.path().join("src/js/main.js");

    let output = bundler(project.path(), false).bundle(&entry).await.unwrap();

    assert_eq!(output.modules, 3);
    let map = output.source_map.unwrap();
    assert_marker_maps_to_greet(&output.code, &map);
}

#[tokio::test]
async fn test_minified_bundle_maps_back_to_module() {
    let project = js_project();
    let entry = project.path().join("src/js/main.js");

    let output = bundler(project.path(), true).bundle(&entry).await.unwrap();

    assert!(!output.code.contains("// src/js/greet.js"));
    let map = output.source_map.unwrap();
    assert_marker_maps_to_greet(&output.code, &map);
}

#[tokio::test]
async fn test_edited_module_is_retransformed() {
    let project = js_project();
    let entry = project.path().join("src/js/main.js");
    let bundler = bundler(project.path(), false);

    bundler.bundle(&entry).await.unwrap();
    std::fs::write(
        project.path().join("src/js/greet.js"),
        "export function greet(name) {\n  console.log(\"changed\", name);\n}\n",
    )
    .unwrap();

    let output = bundler.bundle(&entry).await.unwrap();
    assert_eq!(output.cached, 2);
    assert!(output.code.contains("changed"));
    assert!(!output.code.contains("marker"));
}

#[tokio::test]
async fn test_js_task_writes_bundle_and_map() {
    let project = js_project();
    let mut config = PipelineConfig::for_root(project.path());
    config.notify.enabled = false;
    let dist = config.outdir.clone();
    let service = PipelineService::with_defaults(config).unwrap();

    let report = service.run_task(Task::Js).await.unwrap();
    assert_eq!(report.outputs.len(), 2);

    let code = std::fs::read_to_string(dist.join("bundle.js")).unwrap();
    let map_json = std::fs::read_to_string(dist.join("maps/bundle.js.map")).unwrap();

    let map = SourceMap::from_slice(map_json.as_bytes()).unwrap();
    let greet = (0..map.get_source_count())
        .find(|&i| map.get_source(i).is_some_and(|s| s.ends_with("greet.js")))
        .unwrap();
    let contents = map.get_source_contents(greet).unwrap();
    assert!(contents.contains("console.log(\"marker\", name)"));

    assert_marker_maps_to_greet(&code, &map_json);
}

#[tokio::test]
async fn test_service_tracks_bundle_modules() {
    let project = js_project();
    let mut config = PipelineConfig::for_root(project.path());
    config.notify.enabled = false;
    let service = PipelineService::with_defaults(config).unwrap();

    assert!(service.js_modules().is_empty());
    service.run_task(Task::Js).await.unwrap();

    let modules = service.js_modules();
    assert_eq!(modules.len(), 3);
    assert!(modules.iter().any(|m| m.ends_with("src/js/greet.js")));
    assert!(modules.iter().any(|m| m.ends_with("src/js/data.json")));
}

/// Bundle `files` from the first one and run the result with node.
/// `None` when node is not installed.
async fn run_bundle(files: &[(&str, &str)], minify: bool) -> Option<String> {
    let project = tempfile::tempdir().unwrap();
    for (name, source) in files {
        let path = project.path().join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, source).unwrap();
    }

    let entry = project.path().join(files[0].0);
    let output = bundler(project.path(), minify).bundle(&entry).await.unwrap();

    let node = which::which("node").ok()?;
    let script = project.path().join("out.js");
    std::fs::write(&script, &output.code).unwrap();
    let run = std::process::Command::new(node).arg(&script).output().unwrap();
    assert!(
        run.status.success(),
        "node failed:\n{}\n{}",
        String::from_utf8_lossy(&run.stderr),
        output.code
    );
    Some(String::from_utf8(run.stdout).unwrap())
}

#[tokio::test]
async fn test_named_default_and_namespace_imports_run() {
    let files = [
        (
            "main.js",
            "import greet, { PI, square } from './math.js';\nimport * as math from './math.js';\nconsole.log(greet('x'), PI, square(3), math.square(2), math.default('y'), Object.keys(math).sort().join(','));\n",
        ),
        (
            "math.js",
            "export const PI = 3;\nexport function square(n) { return n * n; }\nexport default function (name) { return 'hi ' + name; }\n",
        ),
    ];

    if let Some(stdout) = run_bundle(&files, false).await {
        assert_eq!(stdout, "hi x 3 9 4 hi y PI,default,square\n");
    }
}

#[tokio::test]
async fn test_reexports_run() {
    let files = [
        (
            "main.js",
            "import { a, renamed, ns, fromDefault } from './barrel.js';\nimport * as barrel from './barrel.js';\nconsole.log(a, renamed, ns.b, fromDefault, 'default' in barrel);\n",
        ),
        (
            "barrel.js",
            "export * from './a.js';\nexport { b as renamed, default as fromDefault } from './b.js';\nexport * as ns from './b.js';\n",
        ),
        ("a.js", "export const a = 'A';\nexport default 'not re-exported';\n"),
        ("b.js", "export const b = 'B';\nexport default 'D';\n"),
    ];

    if let Some(stdout) = run_bundle(&files, false).await {
        assert_eq!(stdout, "A B B D false\n");
    }
}

#[tokio::test]
async fn test_commonjs_interop_runs() {
    let files = [
        (
            "main.js",
            "import legacy, { helper } from './legacy.cjs';\nimport * as ns from './legacy.cjs';\nconst direct = require('./esm.js');\nconsole.log(legacy.helper(), helper(), ns.helper(), direct.value, direct.default);\n",
        ),
        ("legacy.cjs", "module.exports = { helper: function () { return 'cjs'; } };\n"),
        ("esm.js", "export const value = 1;\nexport default 'esm';\n"),
    ];

    if let Some(stdout) = run_bundle(&files, false).await {
        assert_eq!(stdout, "cjs cjs cjs 1 esm\n");
    }
}

#[tokio::test]
async fn test_import_cycle_sees_hoisted_functions() {
    let files = [
        (
            "main.js",
            "import { isEven } from './even.js';\nimport { zeroIsEven } from './odd.js';\nconsole.log(isEven(10), isEven(7), zeroIsEven);\n",
        ),
        (
            "even.js",
            "import { isOdd } from './odd.js';\nexport function isEven(n) { return n === 0 ? true : isOdd(n - 1); }\n",
        ),
        (
            "odd.js",
            "import { isEven } from './even.js';\nexport function isOdd(n) { return n === 0 ? false : isEven(n - 1); }\nexport const zeroIsEven = isEven(0);\n",
        ),
    ];

    if let Some(stdout) = run_bundle(&files, false).await {
        assert_eq!(stdout, "true false true\n");
    }
}

#[tokio::test]
async fn test_exported_let_is_live() {
    let files = [
        (
            "main.js",
            "import { count, inc } from './counter.js';\nconsole.log(count);\ninc();\nconsole.log(count);\n",
        ),
        ("counter.js", "export let count = 0;\nexport function inc() { count += 1; }\n"),
    ];

    if let Some(stdout) = run_bundle(&files, false).await {
        assert_eq!(stdout, "0\n1\n");
    }
}

#[tokio::test]
async fn test_class_fields_run_with_default_target() {
    let files = [
        (
            "main.js",
            "import { Counter } from './counter.js';\nconst c = new Counter();\nc.inc();\nc.inc();\nconsole.log(c.value, c.step, Counter.created);\n",
        ),
        (
            "counter.js",
            "export class Counter {\n  static created = 'yes';\n  #count = 0;\n  step = 2;\n  inc() { this.#count += this.step; }\n  get value() { return this.#count; }\n}\n",
        ),
    ];

    for minify in [false, true] {
        if let Some(stdout) = run_bundle(&files, minify).await {
            assert_eq!(stdout, "4 2 yes\n", "minify: {}", minify);
        }
    }
}

#[tokio::test]
async fn test_commented_out_require_is_not_bundled() {
    let files = [(
        "main.js",
        "// const _ = require('lodash');\nconst note = \"require('./missing')\";\nconsole.log('ok', note.length > 0);\n",
    )];

    if let Some(stdout) = run_bundle(&files, false).await {
        assert_eq!(stdout, "ok true\n");
    }
}
