//! The fetch stage: image workers, the two pool levels and chapter assembly.
//!
//! - [`worker::ImageFetchWorker`] fetches, validates and stores one image
//! - [`image_pool::ImageFetchPool`] runs a chapter's workers under a concurrency limit
//! - [`assembler::ChapterAssembler`] discovers a chapter's images, runs its pool and
//!   renames the accepted pages into a gap-free sequence
//! - [`chapter_pool::ChapterFetchPool`] runs assemblies concurrently or sequentially

pub mod assembler;
pub mod chapter_pool;
pub mod image_pool;
pub mod worker;

pub use assembler::ChapterAssembler;
pub use chapter_pool::ChapterFetchPool;
pub use image_pool::ImageFetchPool;
pub use worker::ImageFetchWorker;
