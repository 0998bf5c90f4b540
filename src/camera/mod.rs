#[cfg(feature = "opencv")]
pub mod opencv_backend;
pub mod test_pattern;
