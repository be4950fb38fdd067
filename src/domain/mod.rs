pub mod day_mask;
pub mod models;
