//! Addressable LED output

pub mod ws2812;
