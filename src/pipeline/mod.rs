//! Pipeline stages for revision sheet generation.
//!
//! Each submodule implements exactly one step, so every step can be tested
//! on its own with a scripted [`llm::ModelClient`].
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ extract ──▶ fold ──▶ supplement ──▶ sanitize
//! (path/URL) (data URI) (stage 1)  (## …)   (stage 2)      (cleanup)
//! ```
//!
//! 1. [`input`]: read local images or download them, concurrently
//! 2. [`encode`]: sniff the image format and wrap the bytes as a data URI
//! 3. [`extract`]: one model call turning text and/or images into titled points
//! 4. [`fold`]: render the points as `## <title>` headings
//! 5. [`supplement`]: one model call expanding the headings into Markdown
//! 6. [`sanitize`]: deterministic repair of leaked JSON and stray markup
//!
//! [`llm`] is the model seam shared by both calls; [`structured`] parses
//! their JSON answers.

pub mod encode;
pub mod extract;
pub mod fold;
pub mod input;
pub mod llm;
pub mod sanitize;
pub mod structured;
pub mod supplement;
