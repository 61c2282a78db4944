#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Entropy coding for a block-based video codec.
//!
//! A multi-symbol [range coder](range) carries everything. On top of it sit
//! adaptive [CDFs](cdf), a [generic model](generic) for unbounded integers
//! and a [Laplace vector coder](laplace) whose statistics follow the picture
//! through an [adaptation context](adapt). [`Accounting`](accounting) reports
//! where the bits went.

pub mod accounting;
pub mod adapt;
pub mod cdf;
pub mod error;
pub mod generic;
pub mod laplace;
pub mod range;
pub mod util;

pub use accounting::{Accounting, Category, Plane, Technique};
pub use adapt::{AdaptContext, AdaptParams};
pub use error::{Error, Result};
pub use generic::GenericModel;
pub use range::{Checkpoint, RangeDecoder, RangeEncoder, Tell};
