// Record processing: flattening/renaming, then derived fields

pub mod enrich;
pub mod normalize;
