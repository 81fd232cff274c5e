pub mod batch_extractor;
pub mod single_extractor;

pub use batch_extractor::BatchExtractor;
pub use single_extractor::SingleExtractor;
