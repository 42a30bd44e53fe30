pub mod codebook;
pub mod encoder;
