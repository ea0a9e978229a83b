//! # Path Matcher Module
//!
//! Compiles path patterns into matchers and extracts named parameters from
//! request paths.
//!
//! ## Overview
//!
//! The matcher is responsible for:
//! - Compiling literal segments, `:name` captures and `*` wildcards into
//!   anchored regexes at registration time
//! - Matching request pathnames and reporting the matched prefix
//! - Percent-decoding captured values, surfacing malformed encodings as
//!   400-class errors instead of panics
//!
//! ## Pattern syntax
//!
//! | Pattern        | Matches                 | Captures            |
//! |----------------|-------------------------|---------------------|
//! | `/users`       | `/users`                | —                   |
//! | `/users/:id`   | `/users/42`             | `id = "42"`         |
//! | `/files/:p?`   | `/files`, `/files/a`    | `p` (optional)      |
//! | `/files/:p+`   | `/files/a/b`            | `p = "a/b"`         |
//! | `*`            | any path                | `0` = whole path    |
//!
//! Two fast paths carry distinct semantics: a bare `/` compiled as a
//! non-terminal mount point matches every path without consuming any of it,
//! and a bare `*` captures the entire remaining path under the positional
//! key `"0"`.

mod core;

pub use core::{MatchOptions, PathKey, PathMatch, PathPattern};
