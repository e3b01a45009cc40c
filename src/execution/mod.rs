// Strategy loop: fetch, analyze, report
pub mod trader;

pub use trader::{CycleReport, Trader, TraderConfig};
