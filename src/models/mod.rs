pub mod hit;
pub mod timing;

pub use hit::{Hit, NewHit};
pub use timing::{NavigationTiming, TimingField};
