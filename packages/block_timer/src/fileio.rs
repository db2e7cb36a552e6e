//! File and string helpers used around instrumented programs.
//!
//! These cover reading line-oriented documents (such as the list of labels to instrument),
//! listing and creating output directories and copying fixed-length strings received from
//! foreign code.

mod lines;
mod listing;
mod native_string;

pub use lines::*;
pub use listing::*;
pub use native_string::*;
