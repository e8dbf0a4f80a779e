//! Geometry utilities: SE3 transforms, SO(3) helpers, rigid alignment.

pub mod alignment;
pub mod se3;
pub mod so3;

pub use alignment::align_rigid;
pub use se3::SE3;
