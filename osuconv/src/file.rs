pub mod batch;
pub mod beatmap;
