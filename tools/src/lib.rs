//! Command implementations behind the `organize_dataset`, `dataset_summary`,
//! `single_infer` and `import_backbone` binaries.

pub mod import;
pub mod organize;
pub mod summary;

pub use import::{run_import, ImportArgs};
pub use organize::{run_organize, OrganizeArgs};
pub use summary::{render_text, SummaryArgs};
