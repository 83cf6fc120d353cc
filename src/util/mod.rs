//! Text helpers for content that arrives from the network.
//!
//! ```
//! use geotalk::util::strip_control_chars;
//!
//! assert_eq!(strip_control_chars("\x1b[31mLouvre\x1b[0m"), "Louvre");
//! ```

mod text;

pub use text::{sanitize, strip_control_chars};
