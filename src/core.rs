pub mod acceptance;
pub mod classifier;
pub mod estimator;
pub mod fetcher;
