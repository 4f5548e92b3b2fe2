pub mod bbox;
pub mod roidb;
