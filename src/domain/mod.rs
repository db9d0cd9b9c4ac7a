pub mod forecast;
pub mod sales;

pub use forecast::*;
pub use sales::*;
