// SPDX-License-Identifier: BUSL-1.1

//! Generated gRPC stubs for the core/local northbound RPC surface.
//!
//! Compiled from `proto/ratectl/v1/ratectl.proto` by `build.rs`; see
//! `DESIGN.md` for why this replaces the original's raw `ControlOperation`
//! struct on the northbound hop (it stays a framed byte-stream protocol only
//! on the local-to-stage hop, where a co-located native stage must read it).

pub mod v1 {
    tonic::include_proto!("ratectl.v1");
}
