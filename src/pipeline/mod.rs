//! Document-level building blocks of the report pipeline.
//!
//! Each submodule does one thing to one or more PDF files and can be used
//! on its own; [`crate::compile`] wires them together.
//!
//! ## Data Flow
//!
//! ```text
//! HTML ──▶ render ──▶ stamp ──▶ merge ──▶ scan ──▶ toc
//!        (Chrome)   (markers)  (body)   (markers)  (ranges)
//! ```
//!
//! 1. [`render`]: HTML to PDF, through headless Chrome or the built-in
//!    plain-text renderer
//! 2. [`stamp`]: burn a [`marker`] into every page, or `Page i/n` labels
//!    after the final merge
//! 3. [`merge`]: concatenate documents in order, skipping unreadable ones
//! 4. [`scan`]: recover the markers from a merged document
//! 5. [`toc`]: fold recovered markers into per-section page ranges
//!
//! [`pdf`] is the shared lopdf layer all of them go through.

pub mod marker;
pub mod merge;
pub mod pdf;
pub mod render;
pub mod scan;
pub mod stamp;
pub mod toc;
