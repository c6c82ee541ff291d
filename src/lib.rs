// Sluice - static asset pipeline
// src/ -> dist/ for HTML, CSS, JS, images, fonts and videos, plus a
// live-reload dev server

pub mod utils;
pub mod core;
pub mod infrastructure;
pub mod cli;
