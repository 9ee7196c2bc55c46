pub mod json_analysis_store;
pub mod spectral_feature_extractor;
