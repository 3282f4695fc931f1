pub mod chunk;
pub mod defect;
pub mod feature_analyzer;
pub mod matcher;
pub mod metrics;
pub mod pixel;
pub mod pixel_buffer;
pub mod raster;
pub mod region;
pub mod sample;
pub mod scorer;
pub mod smart_buffer;
