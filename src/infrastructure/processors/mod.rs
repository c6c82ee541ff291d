// Processors module
pub mod html_processor;
pub mod css_processor;
pub mod module_transformer;
pub mod minifier;
pub mod runtime_helpers;
pub mod js_bundler;
pub mod image_optimizer;

pub use html_processor::*;
pub use css_processor::*;
pub use module_transformer::*;
pub use minifier::*;
pub use js_bundler::*;
pub use image_optimizer::*;
