//! Relative dependency paths.
//!
//! A path is split on `/` into groups and each group on `.` into tokens.
//! Groups that are exactly `""`, `"."` or `".."` stay whole and become
//! navigation steps:
//!
//! | path           | steps                                  |
//! |----------------|----------------------------------------|
//! | `age`          | child `age`                            |
//! | `./car.make`   | stay, child `car`, child `make`        |
//! | `../age`       | parent, child `age`                    |
//! | `/nicknames.0` | root, child `nicknames`, element `0`   |
//!
//! Resolution that fails at any step yields `None`; bad paths are never fatal.

mod parser;
mod resolver;

pub use parser::{parse_path, PathToken};
pub use resolver::{resolve_path, resolve_tokens, ControlNavigator};
