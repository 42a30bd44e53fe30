pub mod artifact;
pub mod forest;
pub mod inference;
pub mod trainer;
pub mod tree;
pub mod validation;
