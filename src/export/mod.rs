//! Report exports: a plain-text transcript and a paginated PDF built from a
//! rasterized snapshot of the rendered report.

pub mod pagination;
pub mod pdf;
pub mod text;

pub use pdf::{export_to_document, ExportedDocument, Rasterizer, SnapshotFile};
pub use text::{has_visible_content, to_plain_text, NOTHING_VISIBLE};
