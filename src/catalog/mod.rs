//! Agent catalog: descriptor loading, prompt front-matter, and the list of
//! agents registered as tools.

pub mod frontmatter;
pub mod loader;
pub mod registry;
