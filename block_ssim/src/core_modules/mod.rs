pub mod aggregator;
pub mod backend;
pub mod block_grid;
pub mod block_stats;
pub mod engine;
pub mod image_loader;
pub mod luma;
pub mod result_buffer;
