//! Domain models for medication reviews.

mod answer;
mod medication;
mod question;
mod review;

pub use answer::*;
pub use medication::*;
pub use question::*;
pub use review::*;
