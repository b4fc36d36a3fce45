//! Configuration types for report compilation.
//!
//! All compile behaviour is controlled through [`CompileConfig`], built via
//! its [`CompileConfigBuilder`]. Inputs that change per report (project,
//! articles, certificates, output path) live in
//! [`crate::compile::CompileRequest`] instead, so one config can be reused
//! for many reports.

use crate::error::ReportError;
use crate::pipeline::render::{Margins, PageSize, RenderOptions};
use crate::pipeline::stamp::StampStyle;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;

/// Watermark printed across the material specification by default.
pub const DEFAULT_WATERMARK: &str = "FA-TEC";

/// Configuration for compiling a report.
///
/// Built via [`CompileConfig::builder()`] or using [`CompileConfig::default()`].
///
/// # Example
/// ```rust
/// use tracecert::{CompileConfig, PageSize};
///
/// let config = CompileConfig::builder()
///     .page_size(PageSize::Letter)
///     .include_watermark(false)
///     .build()
///     .unwrap();
/// assert!(config.paginate);
/// ```
#[derive(Clone)]
pub struct CompileConfig {
    /// Page size, margins and background printing for rendered documents.
    /// Default: A4, 1 cm margins, backgrounds on.
    pub render: RenderOptions,

    /// Font size, colour and inset of markers and page labels.
    /// Default: 6 pt, gray 0.7, 10 pt from the edges.
    pub stamp_style: StampStyle,

    /// Label pages with `Page i/n` after the final merge. Default: true.
    pub paginate: bool,

    /// Leave the cover without a page label. Default: true.
    pub skip_first_page_number: bool,

    /// Print the watermark behind the material specification. Default: true.
    pub include_watermark: bool,

    /// Watermark text. Default: [`DEFAULT_WATERMARK`].
    pub watermark_text: String,

    /// Directory the temp workspace is created in. Default: the system temp dir.
    pub workspace_root: Option<PathBuf>,

    /// Optional progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            render: RenderOptions::default(),
            stamp_style: StampStyle::default(),
            paginate: true,
            skip_first_page_number: true,
            include_watermark: true,
            watermark_text: DEFAULT_WATERMARK.to_string(),
            workspace_root: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for CompileConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileConfig")
            .field("render", &self.render)
            .field("stamp_style", &self.stamp_style)
            .field("paginate", &self.paginate)
            .field("skip_first_page_number", &self.skip_first_page_number)
            .field("include_watermark", &self.include_watermark)
            .field("watermark_text", &self.watermark_text)
            .field("workspace_root", &self.workspace_root)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn CompileProgressCallback>"),
            )
            .finish()
    }
}

impl CompileConfig {
    /// Create a new builder for `CompileConfig`.
    pub fn builder() -> CompileConfigBuilder {
        CompileConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`CompileConfig`].
#[derive(Debug)]
pub struct CompileConfigBuilder {
    config: CompileConfig,
}

impl CompileConfigBuilder {
    pub fn render_options(mut self, options: RenderOptions) -> Self {
        self.config.render = options;
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.render.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.config.render.margins = margins;
        self
    }

    pub fn print_background(mut self, v: bool) -> Self {
        self.config.render.print_background = v;
        self
    }

    pub fn stamp_style(mut self, style: StampStyle) -> Self {
        self.config.stamp_style = style;
        self
    }

    pub fn paginate(mut self, v: bool) -> Self {
        self.config.paginate = v;
        self
    }

    pub fn skip_first_page_number(mut self, v: bool) -> Self {
        self.config.skip_first_page_number = v;
        self
    }

    pub fn include_watermark(mut self, v: bool) -> Self {
        self.config.include_watermark = v;
        self
    }

    pub fn watermark_text(mut self, text: impl Into<String>) -> Self {
        self.config.watermark_text = text.into();
        self
    }

    pub fn workspace_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.workspace_root = Some(dir.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CompileConfig, ReportError> {
        let c = &self.config;
        let style = &c.stamp_style;
        if !(1.0..=72.0).contains(&style.font_size) {
            return Err(ReportError::InvalidConfig(format!(
                "stamp font size must be 1–72 pt, got {}",
                style.font_size
            )));
        }
        if !(0.0..=1.0).contains(&style.gray) {
            return Err(ReportError::InvalidConfig(format!(
                "stamp gray must be 0.0–1.0, got {}",
                style.gray
            )));
        }
        if style.inset < 0.0 {
            return Err(ReportError::InvalidConfig("stamp inset must be ≥ 0".into()));
        }

        let (width, height) = c.render.page_size.dimensions();
        if width <= 0.0 || height <= 0.0 {
            return Err(ReportError::InvalidConfig(format!(
                "page size must be positive, got {width}×{height} pt"
            )));
        }
        let m = c.render.margins;
        if [m.top, m.right, m.bottom, m.left].iter().any(|v| *v < 0.0)
            || m.left + m.right >= width
            || m.top + m.bottom >= height
        {
            return Err(ReportError::InvalidConfig(
                "margins must be non-negative and leave room for content".into(),
            ));
        }

        if c.include_watermark && c.watermark_text.trim().is_empty() {
            return Err(ReportError::InvalidConfig(
                "watermark text must not be empty when the watermark is enabled".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::NoopProgressCallback;
    use std::sync::Arc;

    #[test]
    fn defaults() {
        let c = CompileConfig::default();
        assert_eq!(c.render.page_size, PageSize::A4);
        assert!(c.render.print_background);
        assert_eq!(c.stamp_style.font_size, 6.0);
        assert_eq!(c.stamp_style.gray, 0.7);
        assert_eq!(c.stamp_style.inset, 10.0);
        assert!(c.paginate && c.skip_first_page_number && c.include_watermark);
        assert_eq!(c.watermark_text, "FA-TEC");
    }

    #[test]
    fn builder_sets_fields() {
        let c = CompileConfig::builder()
            .page_size(PageSize::Letter)
            .margins(Margins::uniform(36.0))
            .paginate(false)
            .watermark_text("ACME")
            .workspace_root("/tmp")
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        assert_eq!(c.render.page_size, PageSize::Letter);
        assert_eq!(c.render.margins.left, 36.0);
        assert!(!c.paginate);
        assert_eq!(c.watermark_text, "ACME");
        assert!(c.progress_callback.is_some());
    }

    #[test]
    fn invalid_style_is_rejected() {
        let bad_gray = CompileConfig::builder()
            .stamp_style(StampStyle { gray: 1.5, ..StampStyle::default() })
            .build();
        assert!(matches!(bad_gray, Err(ReportError::InvalidConfig(_))));

        let bad_size = CompileConfig::builder()
            .stamp_style(StampStyle { font_size: 0.0, ..StampStyle::default() })
            .build();
        assert!(bad_size.is_err());
    }

    #[test]
    fn oversized_margins_are_rejected() {
        let r = CompileConfig::builder().margins(Margins::uniform(400.0)).build();
        assert!(r.is_err());
    }

    #[test]
    fn empty_watermark_only_matters_when_enabled() {
        assert!(CompileConfig::builder().watermark_text(" ").build().is_err());
        assert!(CompileConfig::builder()
            .include_watermark(false)
            .watermark_text("")
            .build()
            .is_ok());
    }

    #[test]
    fn debug_hides_callback() {
        let c = CompileConfig::builder()
            .progress_callback(Arc::new(NoopProgressCallback))
            .build()
            .unwrap();
        assert!(format!("{c:?}").contains("<dyn CompileProgressCallback>"));
    }
}
