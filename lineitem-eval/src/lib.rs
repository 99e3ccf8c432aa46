//! Evaluation side of the pipeline:
//! - the q6 driver run, from offline compression to the printed report
//! - the Q6 query engine over a loaded table
//! - stage timing and the report printed by the driver
//! - a chunked codec micro-benchmark
//! - synthetic lineitem data for tests and benches

pub mod driver;
pub mod micro;
pub mod query;
pub mod report;
#[cfg(test)]
mod test;
pub mod util;
