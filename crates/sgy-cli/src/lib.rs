// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Library side of the `sgy-stack` tool: job config, progress display and the
//! stacking pipeline. The binary in `src/bin/sgy-stack.rs` is a thin shell
//! over [`pipeline::run`].

pub mod config;
pub mod pipeline;
pub mod progress;
