use crate::core::{interfaces::HtmlProcessor, models::HtmlOptions};
use crate::utils::{Logger, Result, SluiceError, Timer};
use regex::Regex;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

const MAX_INCLUDE_DEPTH: usize = 16;

/// Resolves `@include('file', {...})` directives and minifies the result
pub struct IncludeHtmlProcessor {
    options: HtmlOptions,
    root: PathBuf,
    include_pattern: Regex,
}

impl IncludeHtmlProcessor {
    pub fn new(options: HtmlOptions, root: PathBuf) -> Result<Self> {
        let prefix = regex::escape(&options.include_prefix);
        let include_pattern = Regex::new(&format!(
            r#"(?s){}include\(\s*(['"])(.+?)['"]\s*(?:,\s*(\{{.*?\}}))?\s*\)"#,
            prefix
        ))?;

        Ok(Self {
            options,
            root,
            include_pattern,
        })
    }

    fn base_dir(&self, including_file: &Path) -> PathBuf {
        match self.options.include_base.as_str() {
            "@file" => including_file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.root.clone()),
            "@root" => self.root.clone(),
            base => self.root.join(base),
        }
    }

    /// Expand includes in `content`, which was read from `path`
    pub fn resolve_includes(&self, content: &str, path: &Path) -> Result<String> {
        let mut stack = vec![path.to_path_buf()];
        self.expand(content, path, &Map::new(), &mut stack)
    }

    fn expand(
        &self,
        content: &str,
        path: &Path,
        vars: &Map<String, Value>,
        stack: &mut Vec<PathBuf>,
    ) -> Result<String> {
        if stack.len() > MAX_INCLUDE_DEPTH {
            return Err(SluiceError::include(format!(
                "include depth exceeds {} at {}",
                MAX_INCLUDE_DEPTH,
                path.display()
            )));
        }

        let mut output = String::with_capacity(content.len());
        let mut last = 0;

        for captures in self.include_pattern.captures_iter(content) {
            let whole = captures.get(0).ok_or_else(|| SluiceError::include("empty match"))?;
            let target = &captures[2];

            let mut scoped = vars.clone();
            if let Some(json) = captures.get(3) {
                let parsed: Value = serde_json::from_str(json.as_str()).map_err(|e| {
                    SluiceError::include(format!(
                        "invalid include arguments in {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                if let Value::Object(args) = parsed {
                    scoped.extend(args);
                }
            }

            let include_path = self.base_dir(path).join(target);
            if stack.contains(&include_path) {
                return Err(SluiceError::include(format!(
                    "include cycle: {} includes {}",
                    path.display(),
                    include_path.display()
                )));
            }

            let included = std::fs::read_to_string(&include_path).map_err(|e| {
                SluiceError::include(format!(
                    "cannot read {} (included from {}): {}",
                    include_path.display(),
                    path.display(),
                    e
                ))
            })?;

            Logger::processing_file(target, "include");

            let substituted = self.substitute(&included, &scoped);
            stack.push(include_path.clone());
            let expanded = self.expand(&substituted, &include_path, &scoped, stack)?;
            stack.pop();

            output.push_str(&content[last..whole.start()]);
            output.push_str(&expanded);
            last = whole.end();
        }

        output.push_str(&content[last..]);
        Ok(output)
    }

    fn substitute(&self, content: &str, vars: &Map<String, Value>) -> String {
        // Longest names first so `@title` does not clobber `@titleSuffix`
        let mut names: Vec<&String> = vars.keys().collect();
        names.sort_by_key(|name| std::cmp::Reverse(name.len()));

        let mut result = content.to_string();
        for name in names {
            let value = match &vars[name.as_str()] {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            let token = format!("{}{}", self.options.include_prefix, name);
            result = result.replace(&token, &value);
        }
        result
    }

    pub fn minify(&self, html: &str) -> String {
        let mut cfg = minify_html::Cfg::new();
        cfg.keep_closing_tags = true;
        cfg.keep_html_and_head_opening_tags = true;
        cfg.keep_comments = false;
        cfg.minify_css = false;
        cfg.minify_js = false;

        let minified = minify_html::minify(html.as_bytes(), &cfg);
        String::from_utf8_lossy(&minified).into_owned()
    }
}

#[async_trait::async_trait]
impl HtmlProcessor for IncludeHtmlProcessor {
    async fn process(&self, content: &str, path: &Path) -> Result<String> {
        let _timer = Timer::start(&format!(
            "Processing HTML {}",
            path.file_name().and_then(|s| s.to_str()).unwrap_or("unknown")
        ));

        let resolved = self.resolve_includes(content, path)?;

        if self.options.minify {
            Ok(self.minify(&resolved))
        } else {
            Ok(resolved)
        }
    }
}
