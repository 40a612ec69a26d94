use crate::error::ExportError;

pub const LETTER_WIDTH_MM: f64 = 215.9;
pub const LETTER_HEIGHT_MM: f64 = 279.4;
pub const MARGIN_MM: f64 = 15.0;
/// Student name and generation date above the content on page one.
pub const TITLE_BLOCK_MM: f64 = 14.0;

const EPSILON_MM: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub page_width: f64,
    pub page_height: f64,
    pub margin: f64,
    pub title_block: f64,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: LETTER_WIDTH_MM,
            page_height: LETTER_HEIGHT_MM,
            margin: MARGIN_MM,
            title_block: TITLE_BLOCK_MM,
        }
    }
}

/// One page's view of the tall scaled image, in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSlice {
    /// Distance into the scaled image where this page starts.
    pub source_top: f64,
    pub height: f64,
    /// Where the image's top edge lands on the page; negative once the
    /// image has been shifted up past earlier pages.
    pub image_y: f64,
    /// Top of the drawable area this slice fills.
    pub drawable_top: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub content_width: f64,
    pub content_height: f64,
    pub pages: Vec<PageSlice>,
}

impl PageLayout {
    pub fn content_width(&self) -> f64 {
        self.page_width - 2.0 * self.margin
    }

    pub fn drawable_height(&self) -> f64 {
        self.page_height - 2.0 * self.margin
    }

    pub fn first_page_drawable_height(&self) -> f64 {
        self.drawable_height() - self.title_block
    }

    pub fn scaled_height(&self, snapshot_width: u32, snapshot_height: u32) -> f64 {
        f64::from(snapshot_height) * self.content_width() / f64::from(snapshot_width)
    }

    /// Pages needed for `content_height` once page one gives up the title
    /// block. Never less than one.
    pub fn page_count(&self, content_height: f64) -> usize {
        let pages = ((content_height + self.title_block) / self.drawable_height() - EPSILON_MM)
            .ceil();
        if pages < 1.0 {
            1
        } else {
            pages as usize
        }
    }

    pub fn plan(&self, snapshot_width: u32, snapshot_height: u32) -> Result<PagePlan, ExportError> {
        if snapshot_width == 0 || snapshot_height == 0 {
            return Err(ExportError::EmptySnapshot {
                width: snapshot_width,
                height: snapshot_height,
            });
        }
        if self.first_page_drawable_height() <= 0.0 {
            return Err(ExportError::Layout(format!(
                "no drawable height left on a {} mm page",
                self.page_height
            )));
        }

        let content_height = self.scaled_height(snapshot_width, snapshot_height);
        let count = self.page_count(content_height);
        let mut pages = Vec::with_capacity(count);
        let mut consumed = 0.0;

        for index in 0..count {
            let (drawable_top, capacity) = if index == 0 {
                (self.margin + self.title_block, self.first_page_drawable_height())
            } else {
                (self.margin, self.drawable_height())
            };
            let height = capacity.min(content_height - consumed).max(0.0);
            pages.push(PageSlice {
                source_top: consumed,
                height,
                image_y: drawable_top - consumed,
                drawable_top,
            });
            consumed += height;
        }

        tracing::debug!(
            content_height,
            pages = pages.len(),
            "planned report pages"
        );

        Ok(PagePlan {
            content_width: self.content_width(),
            content_height,
            pages,
        })
    }
}

impl PagePlan {
    /// Pixel rows `(top, height)` of the snapshot covered by each page. Rows
    /// tile the snapshot with no gaps or overlap.
    pub fn pixel_rows(&self, snapshot_width: u32, snapshot_height: u32) -> Vec<(u32, u32)> {
        let px_per_mm = f64::from(snapshot_width) / self.content_width;
        let to_row = |mm: f64| ((mm * px_per_mm).round() as u32).min(snapshot_height);

        self.pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let top = to_row(page.source_top);
                let bottom = if index + 1 == self.pages.len() {
                    snapshot_height
                } else {
                    to_row(page.source_top + page.height)
                };
                (top, bottom.saturating_sub(top))
            })
            .collect()
    }
}
