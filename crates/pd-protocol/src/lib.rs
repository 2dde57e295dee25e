pub mod diagnosis;
pub mod features;
pub mod inference;
pub mod knowledge;
pub mod stages;

pub use diagnosis::*;
pub use features::*;
pub use inference::*;
pub use knowledge::*;
pub use stages::*;
