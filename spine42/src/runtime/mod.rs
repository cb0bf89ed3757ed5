mod animation;
mod constraints;
mod physics;
mod skeleton;

pub use animation::*;
pub use constraints::*;
pub use physics::*;
pub use skeleton::*;


#[cfg(test)]
mod animation_tests;

#[cfg(test)]
mod constraint_tests;
