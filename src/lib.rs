//! ## About
//!
//! This crate contains the kinematics for servo arms built into rigid-body vehicles or robots: a
//! lightweight transform hierarchy with lazily propagated world poses, a resolver that discovers
//! how a set of servos is chained up relative to an end effector in the host's body tree, and a
//! cyclic coordinate descent (CCD) solver that drives the servos toward a target pose each frame.
//!
//! See the [ChainTracker] struct to get started.
//!
//! ## Reading list
//!
//! * [Lecture on Inverse Kinematics](https://cseweb.ucsd.edu/classes/wi17/cse169-a/sessions.html)
//! * [Cyclic Coordinate Descent](https://zalo.github.io/blog/inverse-kinematics/)
//!
//! ## Naming conventions
//! * Traits – capabilities the host provides ([Actuator], [BodyTree], [MountingSide]) or algorithms ([Inverse])
//! * Structs – substantives that indicate entities implementing a behavior
//! * Methods – imperative forms with the exception of getters and factories, which
//!             are uses substantives (i.e., omit a `get_` prefix) much like the standard library.
//! * Angles are in degrees throughout.

pub mod actuator;
pub mod body;
pub mod errors;
pub mod joint;
pub mod pose;
pub mod resolver;
pub mod solver;
pub mod tracker;
pub mod transform;

pub use actuator::{Actuator, Servo};
pub use body::{BodyArena, BodyNode, BodyTree, HousingSide, MountingSide};
pub use errors::{ChainError, HierarchyError, TreeError};
pub use joint::KinematicJoint;
pub use pose::Pose;
pub use resolver::{is_inverted, resolve_order, EffectorRelation, ResolvedOrder};
pub use solver::{step, CcdSolver, Inverse, SolverConfig, StepInfo};
pub use tracker::ChainTracker;
pub use transform::{TransformHierarchy, TransformIndex, TransformNode};
