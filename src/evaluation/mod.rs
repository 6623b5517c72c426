pub mod fitness;
pub mod report;
pub mod validate;

pub use report::Report;
pub use validate::validate;
