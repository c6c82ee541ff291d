use crate::utils::{Result, SluiceError};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use std::path::Path;

/// Minified code and its map back to the unminified input
#[derive(Debug, Clone)]
pub struct MinifiedCode {
    pub code: String,
    pub source_map: Option<String>,
}

/// JavaScript compression and mangling with oxc
pub struct OxcMinifier;

impl OxcMinifier {
    pub fn new() -> Self {
        Self
    }

    /// Minify a script. With `map_file` set, also emit a source map whose
    /// sources point at `map_file`.
    pub fn minify(&self, source_code: &str, map_file: Option<&str>) -> Result<MinifiedCode> {
        let allocator = Allocator::default();

        let parse_result = Parser::new(&allocator, source_code, SourceType::cjs()).parse();
        if !parse_result.errors.is_empty() {
            let errors: Vec<String> = parse_result
                .errors
                .iter()
                .map(|e| format!("Parse error: {}", e))
                .collect();
            return Err(SluiceError::js(errors.join("\n")));
        }

        let mut program = parse_result.program;
        let options = MinifierOptions {
            mangle: Some(MangleOptions::default()),
            compress: Some(CompressOptions::smallest()),
        };
        let minified = Minifier::new(options).minify(&allocator, &mut program);

        let printed = Codegen::new()
            .with_options(CodegenOptions {
                minify: true,
                comments: CommentOptions::disabled(),
                source_map_path: map_file.map(|file| Path::new(file).to_path_buf()),
                ..CodegenOptions::default()
            })
            .with_scoping(minified.scoping)
            .build(&program);

        Ok(MinifiedCode {
            code: printed.code,
            source_map: printed.map.map(|map| map.to_json_string()),
        })
    }

    /// Estimate size reduction percentage
    pub fn calculate_reduction(original: &str, minified: &str) -> f64 {
        let original_size = original.len() as f64;
        if original_size == 0.0 {
            return 0.0;
        }

        ((original_size - minified.len() as f64) / original_size) * 100.0
    }
}

impl Default for OxcMinifier {
    fn default() -> Self {
        Self::new()
    }
}
