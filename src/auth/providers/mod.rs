//! Identity provider clients used by the reference backend.

pub mod microsoft;
