pub mod clearing;
pub mod history;
pub mod house;
pub mod orders;

pub use clearing::*;
pub use history::*;
pub use house::*;
pub use orders::*;
