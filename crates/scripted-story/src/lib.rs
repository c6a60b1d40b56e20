//! # scripted-story
//!
//! A deterministic [`StoryRuntime`] backed by a tiny line-oriented script
//! format. It plays back a fixed script rather than interpreting a real
//! story language, which makes it suitable as a demo bridge and as the
//! runtime under integration tests.
//!
//! Script format, one construct per line:
//!
//! ```text
//! # spooky            global tag (before any content)
//! VAR gold = 10       initial variable (JSON value)
//! FUNC luck = 7       function returning a constant
//! === cellar          label (knot); = label also accepted (stitch).
//!                     Its `== cellar` marker is emitted with the next line.
//! ~ gold = 15         assignment applied when the next line is emitted
//! The cellar is dark. #damp    one continuation unit, trailing tags
//! * Light a match -> strike    choice, optional divert
//! * Leave
//! -> cellar           divert
//! ```

pub mod parser;
pub mod runtime;

pub use parser::{parse, Program};
pub use runtime::{ScriptedStory, ScriptedStoryFactory};
