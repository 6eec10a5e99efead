// src/lib.rs

pub mod adapters;
pub mod config;
pub mod currency;
pub mod logging;
pub mod openrtb;
