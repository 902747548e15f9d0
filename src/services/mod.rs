pub mod completion;
pub mod normalizer;
