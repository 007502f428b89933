//! Turning a rendered page into crawl data.
//!
//! Each submodule is a pure function of its input:
//!
//! | Module | Input | Output |
//! |--------|-------|--------|
//! | [`content`] | rendered page | title and article body |
//! | [`links`] | rendered page + source URL | candidate article URLs |
//! | [`metadata`] | extracted text | procedure terms and financial figures |

pub mod content;
pub mod links;
pub mod metadata;
