//! Table-of-contents construction from recovered stamps.

use crate::model::{Stamp, TocSection};

/// Pages the cover occupies in front of the body.
pub const COVER_PAGES: u32 = 1;

/// Sections in first-seen order, each with its page range in the final document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableOfContents {
    sections: Vec<TocSection>,
}

impl TableOfContents {
    /// Group `stamps` by document type, assuming a single cover page in front.
    pub fn build(stamps: &[Stamp]) -> Self {
        Self::build_with_offset(stamps, COVER_PAGES)
    }

    /// Group `stamps` by document type, shifting every range by `offset` pages.
    ///
    /// A section spans from its lowest to its highest stamped page. Sections
    /// are listed in the order their first stamp appears.
    pub fn build_with_offset(stamps: &[Stamp], offset: u32) -> Self {
        let mut sections: Vec<TocSection> = Vec::new();
        for stamp in stamps {
            let page = stamp.page_number + offset;
            match sections.iter_mut().find(|s| s.name == stamp.doc_type) {
                Some(section) => {
                    section.page_start = section.page_start.min(page);
                    section.page_end = section.page_end.max(page);
                }
                None => sections.push(TocSection {
                    name: stamp.doc_type.clone(),
                    page_start: page,
                    page_end: page,
                }),
            }
        }
        Self { sections }
    }

    pub fn sections(&self) -> &[TocSection] {
        &self.sections
    }

    pub fn get(&self, name: &str) -> Option<&TocSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn into_sections(self) -> Vec<TocSection> {
        self.sections
    }
}
