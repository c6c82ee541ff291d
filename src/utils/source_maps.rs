use crate::utils::{Result, SluiceError};
use sourcemap::{DecodedMap, SourceMap, SourceMapIndex, SourceMapSection};

/// Collects per-module maps at their line offsets in a concatenated bundle
pub struct BundleMapBuilder {
    file: String,
    sections: Vec<SourceMapSection>,
}

impl BundleMapBuilder {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            sections: Vec::new(),
        }
    }

    /// Register a module whose generated code starts at `line_offset` (0-based)
    pub fn add_module(&mut self, line_offset: u32, map_json: &str) -> Result<()> {
        let map = parse(map_json)?;
        self.sections.push(SourceMapSection::new(
            (line_offset, 0),
            None,
            Some(DecodedMap::Regular(map)),
        ));
        Ok(())
    }

    /// Flatten into a single map for the bundle
    pub fn finish(self) -> Result<SourceMap> {
        let index = SourceMapIndex::new(Some(self.file), self.sections);
        index
            .flatten()
            .map_err(|e| SluiceError::js(format!("failed to merge module source maps: {}", e)))
    }
}

pub fn parse(map_json: &str) -> Result<SourceMap> {
    SourceMap::from_slice(map_json.as_bytes())
        .map_err(|e| SluiceError::js(format!("invalid source map: {}", e)))
}

/// Rebase `bundle_map` so it describes the minified output described by
/// `minified_map` (which maps minified code back to the bundle)
pub fn compose(bundle_map: &mut SourceMap, minified_map_json: &str) -> Result<()> {
    let minified_map = parse(minified_map_json)?;
    bundle_map.adjust_mappings(&minified_map);
    Ok(())
}

pub fn to_json(map: &SourceMap) -> Result<String> {
    let mut buffer = Vec::new();
    map.to_writer(&mut buffer)
        .map_err(|e| SluiceError::js(format!("failed to serialize source map: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| SluiceError::js(format!("failed to serialize source map: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    // `a` at 1:0 of a.js, `b` at 1:0 of b.js
    const MAP_A: &str = r#"{"version":3,"sources":["a.js"],"sourcesContent":["a"],"names":[],"mappings":"AAAA"}"#;
    const MAP_B: &str = r#"{"version":3,"sources":["b.js"],"sourcesContent":["b"],"names":[],"mappings":"AAAA"}"#;

    #[test]
    fn test_modules_are_offset() {
        let mut builder = BundleMapBuilder::new("bundle.js");
        builder.add_module(2, MAP_A).unwrap();
        builder.add_module(5, MAP_B).unwrap();

        let map = builder.finish().unwrap();

        let token = map.lookup_token(2, 0).unwrap();
        assert_eq!(token.get_source(), Some("a.js"));
        assert_eq!(token.get_src_line(), 0);

        let token = map.lookup_token(5, 0).unwrap();
        assert_eq!(token.get_source(), Some("b.js"));
    }

    #[test]
    fn test_serialized_map_is_json() {
        let mut builder = BundleMapBuilder::new("bundle.js");
        builder.add_module(0, MAP_A).unwrap();
        let json = to_json(&builder.finish().unwrap()).unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["version"], 3);
        assert_eq!(value["sources"][0], "a.js");
    }

    #[test]
    fn test_invalid_map_is_rejected() {
        let mut builder = BundleMapBuilder::new("bundle.js");
        assert!(builder.add_module(0, "not json").is_err());
    }
}
