mod main;

pub use main::BatchExtractor;
