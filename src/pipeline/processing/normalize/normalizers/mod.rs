// Base trait and per-source normalizers
pub mod base;

pub mod ca_hcd;
pub mod mhvillage;
pub mod rivcoview;

pub use base::SourceNormalizer;
pub use ca_hcd::CaHcdNormalizer;
pub use mhvillage::MhVillageNormalizer;
pub use rivcoview::RivCoViewNormalizer;
