// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! sgy-nmo: normal-moveout correction and stacking of CDP gathers.
//!
//! The pieces chain as: a [`VelocityTable`] is interpolated onto the sample
//! axis of every CDP, [`correct_gather`] flattens each gather's reflection
//! hyperbolas using that velocity function, and [`stack`] averages the
//! corrected traces into one output trace.
#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]

mod error;
mod nmo;
mod stack;
mod velocity;

pub use error::NmoError;
pub use nmo::{correct_gather, NmoParams, SINC_HALF_WINDOW};
pub use stack::stack;
pub use velocity::{VelocityFunctions, VelocityTable};
