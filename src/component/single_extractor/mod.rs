mod main;

pub use main::SingleExtractor;
