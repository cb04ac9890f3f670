pub mod skeleton_model;

pub use skeleton_model::{Skeleton, SkeletonNode};
