pub mod blacklist;
pub mod extractor;
pub mod jwt;
pub mod revocation;
pub mod rotation;
pub mod tokens;
