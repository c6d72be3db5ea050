mod error;
mod ranking;
mod scorecard;
mod session;
mod types;
mod weighting;

pub use error::*;
pub use ranking::*;
pub use scorecard::*;
pub use session::*;
pub use types::*;
pub use weighting::*;
