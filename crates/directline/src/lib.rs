//! Direct Line payload fixes.
//!
//! The Bot Framework connector mangles `application/vnd.microsoft.keyboard`
//! attachments on the Direct Line channel. [`DirectLinePrompts`] moves them
//! into `sourceEvent.choices` on the way out, where Direct Line clients can
//! still read them.

pub mod prompts;

pub use prompts::{DirectLinePrompts, KEYBOARD_CONTENT_TYPE, relocate_choices};
