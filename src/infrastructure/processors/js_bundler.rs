use crate::core::{interfaces::JsBundler, models::{BundleOutput, JsOptions}};
use crate::infrastructure::processors::{
    minifier::OxcMinifier, module_transformer::ModuleTransformer, runtime_helpers,
};
use crate::utils::cache::{CacheEntry, ModuleCache};
use crate::utils::source_maps::{self, BundleMapBuilder};
use crate::utils::{Logger, Result, SluiceError, Timer};
use std::collections::{BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

const RESOLVE_EXTENSIONS: [&str; 5] = ["js", "mjs", "cjs", "jsx", "json"];

const RUNTIME: &str = r#"var __sluiceCache = {};
function __sluiceRequire(id) {
  var cached = __sluiceCache[id];
  if (cached) return cached.exports;
  var module = __sluiceCache[id] = { exports: {} };
  var entry = __sluiceModules[id];
  entry[0].call(module.exports, function (name) {
    var dep = entry[1][name];
    if (dep === undefined) throw new Error("Cannot find module '" + name + "'");
    return __sluiceRequire(dep);
  }, module, module.exports);
  return module.exports;
}
function __sluiceDefault(m) {
  return m && m.__esModule ? m["default"] : m;
}
function __sluiceExport(target, getters) {
  for (var name in getters) {
    Object.defineProperty(target, name, { enumerable: true, get: getters[name] });
  }
}
function __sluiceReexport(target, source) {
  Object.keys(source).forEach(function (name) {
    if (name === "default" || name === "__esModule") return;
    if (Object.prototype.hasOwnProperty.call(target, name)) return;
    Object.defineProperty(target, name, {
      enumerable: true,
      get: function () { return source[name]; }
    });
  });
  return source;
}
"#;

/// One node of the module graph
#[derive(Debug)]
struct GraphModule {
    path: PathBuf,
    display: String,
    code: String,
    source_map: Option<String>,
    helpers: Vec<String>,
    dependencies: Vec<(String, usize)>,
}

#[derive(Default)]
struct ModuleGraph {
    ids: HashMap<PathBuf, usize>,
    modules: Vec<GraphModule>,
    cached: usize,
}

/// Bundles an entry module and everything it imports into one script,
/// reusing unchanged modules from earlier runs
pub struct OxcJsBundler {
    core: Arc<BundlerCore>,
}

struct BundlerCore {
    options: JsOptions,
    source_maps: bool,
    project_root: PathBuf,
    transformer: ModuleTransformer,
    minifier: OxcMinifier,
    cache: ModuleCache,
}

impl OxcJsBundler {
    pub fn new(options: JsOptions, source_maps: bool, project_root: PathBuf) -> Self {
        let transformer = ModuleTransformer::new(options.target.clone());
        Self {
            core: Arc::new(BundlerCore {
                options,
                source_maps,
                project_root,
                transformer,
                minifier: OxcMinifier::new(),
                cache: ModuleCache::new(),
            }),
        }
    }

}

impl BundlerCore {
    fn bundle(&self, entry: &Path) -> Result<BundleOutput> {
        let mut graph = ModuleGraph::default();
        self.visit(&normalize(entry), &mut graph)?;

        let live: Vec<PathBuf> = graph.modules.iter().map(|m| m.path.clone()).collect();
        self.cache.retain_paths(&live);

        let (code, map_builder) = self.concatenate(&graph)?;

        let (code, source_map) = match (self.options.minify, map_builder) {
            (true, Some(builder)) => {
                let minified = self.minifier.minify(&code, Some(&self.options.bundle_name))?;
                Logger::debug(&format!(
                    "Minified {} ({:.1}% smaller)",
                    self.options.bundle_name,
                    OxcMinifier::calculate_reduction(&code, &minified.code)
                ));
                let mut map = builder.finish()?;
                if let Some(minified_map) = minified.source_map {
                    source_maps::compose(&mut map, &minified_map)?;
                }
                (minified.code, Some(source_maps::to_json(&map)?))
            }
            (true, None) => (self.minifier.minify(&code, None)?.code, None),
            (false, Some(builder)) => {
                let map = builder.finish()?;
                (code, Some(source_maps::to_json(&map)?))
            }
            (false, None) => (code, None),
        };

        Ok(BundleOutput {
            code,
            source_map,
            modules: graph.modules.len(),
            cached: graph.cached,
        })
    }

    /// Depth-first walk; ids follow discovery order with the entry at 0
    fn visit(&self, path: &Path, graph: &mut ModuleGraph) -> Result<usize> {
        if let Some(&id) = graph.ids.get(path) {
            return Ok(id);
        }

        let source = std::fs::read_to_string(path).map_err(|e| {
            SluiceError::js_in(format!("cannot read module: {}", e), path.to_path_buf())
        })?;
        let display = self.display_path(path);
        let hash = ModuleCache::compute_content_hash(source.as_bytes());

        let entry = match self.cache.get(path, &hash) {
            Some(entry) => {
                graph.cached += 1;
                entry
            }
            None => {
                Logger::processing_file(&display, "transform");
                let transformed = self.transformer.transform(&source, path, &display)?;
                let entry = CacheEntry {
                    hash,
                    code: transformed.code,
                    source_map: transformed.source_map,
                    specifiers: transformed.specifiers,
                    helpers: transformed.helpers,
                };
                self.cache.insert(path.to_path_buf(), entry.clone());
                entry
            }
        };

        let id = graph.modules.len();
        graph.ids.insert(path.to_path_buf(), id);
        graph.modules.push(GraphModule {
            path: path.to_path_buf(),
            display,
            code: entry.code,
            source_map: entry.source_map,
            helpers: entry.helpers,
            dependencies: Vec::new(),
        });

        let mut dependencies = Vec::with_capacity(entry.specifiers.len());
        for specifier in entry.specifiers {
            let resolved = self.resolve(&specifier, path)?;
            let dependency_id = self.visit(&resolved, graph)?;
            dependencies.push((specifier, dependency_id));
        }
        graph.modules[id].dependencies = dependencies;

        Ok(id)
    }

    /// Relative and absolute specifiers only; tries the path as written,
    /// then known extensions, then `index.js`
    fn resolve(&self, specifier: &str, importer: &Path) -> Result<PathBuf> {
        let is_path = specifier.starts_with("./")
            || specifier.starts_with("../")
            || specifier.starts_with('/');
        if !is_path {
            return Err(SluiceError::js_in(
                format!(
                    "cannot resolve '{}': only relative imports are bundled",
                    specifier
                ),
                importer.to_path_buf(),
            ));
        }

        let base_dir = importer.parent().unwrap_or_else(|| Path::new("."));
        let base = normalize(&base_dir.join(specifier));

        if base.is_file() {
            return Ok(base);
        }

        for extension in RESOLVE_EXTENSIONS {
            let candidate = PathBuf::from(format!("{}.{}", base.display(), extension));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }

        let index = base.join("index.js");
        if index.is_file() {
            return Ok(index);
        }

        Err(SluiceError::js_in(
            format!("cannot resolve '{}'", specifier),
            importer.to_path_buf(),
        ))
    }

    fn display_path(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.project_root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Wrap every module in a function and append the runtime; nothing
    /// after the modules moves their lines
    fn concatenate(&self, graph: &ModuleGraph) -> Result<(String, Option<BundleMapBuilder>)> {
        let mut map_builder = self
            .source_maps
            .then(|| BundleMapBuilder::new(self.options.bundle_name.clone()));

        let mut bundle = String::from("(function () {\nvar __sluiceModules = {};\n");
        let mut line = 2u32;

        for (id, module) in graph.modules.iter().enumerate() {
            bundle.push_str(&format!(
                "// {}\n__sluiceModules[{}] = [function (require, module, exports) {{\n",
                module.display, id
            ));
            line += 2;

            if let (Some(builder), Some(map)) = (map_builder.as_mut(), module.source_map.as_deref()) {
                builder.add_module(line, map)?;
            }

            bundle.push_str(&module.code);
            if !module.code.ends_with('\n') {
                bundle.push('\n');
            }
            let padding = usize::from(!module.code.ends_with('\n'));
            line += (module.code.matches('\n').count() + padding) as u32;

            let dependencies: serde_json::Map<String, serde_json::Value> = module
                .dependencies
                .iter()
                .map(|(specifier, dep)| (specifier.clone(), serde_json::Value::from(*dep)))
                .collect();
            bundle.push_str(&format!(
                "}}, {}];\n",
                serde_json::Value::Object(dependencies)
            ));
            line += 1;
        }

        bundle.push_str(RUNTIME);
        let helpers: BTreeSet<&str> = graph
            .modules
            .iter()
            .flat_map(|module| module.helpers.iter().map(String::as_str))
            .collect();
        bundle.push_str(&runtime_helpers::helper_runtime(helpers));
        bundle.push_str("__sluiceRequire(0);\n})();\n");

        Ok((bundle, map_builder))
    }
}

#[async_trait::async_trait]
impl JsBundler for OxcJsBundler {
    async fn bundle(&self, entry: &Path) -> Result<BundleOutput> {
        let _timer = Timer::start("JS bundling");
        Logger::bundling_started();
        let started = Instant::now();

        let core = Arc::clone(&self.core);
        let entry = entry.to_path_buf();
        let output = tokio::task::spawn_blocking(move || core.bundle(&entry)).await??;

        Logger::bundling_finished(started.elapsed(), output.modules, output.cached);
        Ok(output)
    }

    fn module_paths(&self) -> Vec<PathBuf> {
        self.core.cache.paths()
    }
}

/// Lexically resolve `.` and `..` so one file always gets one id
fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn options(minify: bool) -> JsOptions {
        JsOptions {
            entry: PathBuf::from("js/main.js"),
            bundle_name: "bundle.js".to_string(),
            target: "es2020".to_string(),
            minify,
        }
    }

    fn project() -> tempfile::TempDir {
        let temp_dir = tempdir().unwrap();
        let js = temp_dir.path().join("src/js");
        std::fs::create_dir_all(js.join("lib")).unwrap();
        std::fs::write(
            js.join("main.js"),
            "import { greet } from './greet';\nimport config from './config.json';\nimport './lib';\ngreet(config.name);\n",
        )
        .unwrap();
        std::fs::write(
            js.join("greet.js"),
            "export function greet(name) {\n  console.log(`Hello, ${name}`);\n}\n",
        )
        .unwrap();
        std::fs::write(js.join("config.json"), "{\"name\": \"sluice\"}").unwrap();
        std::fs::write(js.join("lib/index.js"), "console.log('lib loaded');\n").unwrap();
        temp_dir
    }

    #[tokio::test]
    async fn test_bundle_graph_order() {
        let temp_dir = project();
        let bundler = OxcJsBundler::new(options(false), false, temp_dir.path().to_path_buf());

        let output = bundler
            .bundle(&temp_dir.path().join("src/js/main.js"))
            .await
            .unwrap();

        assert_eq!(output.modules, 4);
        assert_eq!(output.cached, 0);
        assert!(output.code.contains("// src/js/main.js\n__sluiceModules[0]"));
        assert!(output.code.contains("// src/js/greet.js\n__sluiceModules[1]"));
        assert!(output.code.contains("// src/js/config.json\n__sluiceModules[2]"));
        assert!(output.code.contains("// src/js/lib/index.js\n__sluiceModules[3]"));
        assert!(output.code.contains("{\"./config.json\":2,\"./greet\":1,\"./lib\":3}"));
        assert!(output.code.contains("__sluiceRequire(0);"));
        assert!(output.source_map.is_none());
    }

    #[tokio::test]
    async fn test_unchanged_modules_come_from_cache() {
        let temp_dir = project();
        let bundler = OxcJsBundler::new(options(false), false, temp_dir.path().to_path_buf());
        let entry = temp_dir.path().join("src/js/main.js");

        bundler.bundle(&entry).await.unwrap();
        std::fs::write(
            temp_dir.path().join("src/js/greet.js"),
            "export function greet(name) { console.info(name); }\n",
        )
        .unwrap();
        let output = bundler.bundle(&entry).await.unwrap();

        assert_eq!(output.cached, 3);
        assert!(output.code.contains("console.info"));
        assert_eq!(bundler.module_paths().len(), 4);
    }

    #[tokio::test]
    async fn test_minified_bundle_with_map() {
        let temp_dir = project();
        let bundler = OxcJsBundler::new(options(true), true, temp_dir.path().to_path_buf());

        let output = bundler
            .bundle(&temp_dir.path().join("src/js/main.js"))
            .await
            .unwrap();

        assert!(!output.code.contains("// src/js/main.js"));
        assert!(!output.code.contains("sourceMappingURL"));
        let map: serde_json::Value =
            serde_json::from_str(&output.source_map.expect("source map")).unwrap();
        let sources: Vec<&str> = map["sources"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|s| s.as_str())
            .collect();
        assert!(sources.contains(&"src/js/greet.js"));
    }

    #[tokio::test]
    async fn test_bare_specifier_is_rejected() {
        let temp_dir = tempdir().unwrap();
        let entry = temp_dir.path().join("main.js");
        std::fs::write(&entry, "import React from 'react';\n").unwrap();

        let bundler = OxcJsBundler::new(options(false), false, temp_dir.path().to_path_buf());
        let err = bundler.bundle(&entry).await.unwrap_err();

        assert!(err.to_string().contains("only relative imports are bundled"));
    }

    #[tokio::test]
    async fn test_missing_dependency_is_reported() {
        let temp_dir = tempdir().unwrap();
        let entry = temp_dir.path().join("main.js");
        std::fs::write(&entry, "import './nope.js';\n").unwrap();

        let bundler = OxcJsBundler::new(options(false), false, temp_dir.path().to_path_buf());
        let err = bundler.bundle(&entry).await.unwrap_err();

        assert!(matches!(err, SluiceError::Js { .. }));
        assert!(err.format_detailed().contains("main.js"));
    }

    #[tokio::test]
    async fn test_cycles_terminate() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(temp_dir.path().join("a.js"), "import './b.js';\nexport const a = 1;\n").unwrap();
        std::fs::write(temp_dir.path().join("b.js"), "import './a.js';\nexport const b = 2;\n").unwrap();

        let bundler = OxcJsBundler::new(options(false), false, temp_dir.path().to_path_buf());
        let output = bundler.bundle(&temp_dir.path().join("a.js")).await.unwrap();

        assert_eq!(output.modules, 2);
    }

    #[tokio::test]
    async fn test_helpers_ship_once_after_the_modules() {
        let temp_dir = tempdir().unwrap();
        std::fs::write(
            temp_dir.path().join("main.js"),
            "import { Point } from './point.js';\nclass Tagged { tag = 'main'; }\nconsole.log(new Point().x, new Tagged().tag);\n",
        )
        .unwrap();
        std::fs::write(
            temp_dir.path().join("point.js"),
            "export class Point { x = 1; #y = 2; get y() { return this.#y; } }\n",
        )
        .unwrap();

        let bundler = OxcJsBundler::new(options(false), false, temp_dir.path().to_path_buf());
        let output = bundler.bundle(&temp_dir.path().join("main.js")).await.unwrap();

        assert_eq!(output.code.matches("var babelHelpers = {").count(), 1);
        let helpers_at = output.code.find("var babelHelpers").unwrap();
        assert!(output.code.rfind("__sluiceModules[1]").unwrap() < helpers_at);
        assert!(helpers_at < output.code.find("__sluiceRequire(0);").unwrap());
    }

    #[test]
    fn test_normalize() {
        assert_eq!(
            normalize(Path::new("/p/src/js/./lib/../greet.js")),
            PathBuf::from("/p/src/js/greet.js")
        );
    }
}
