//! Motion and temperature sensing

pub mod lis2dh12;
