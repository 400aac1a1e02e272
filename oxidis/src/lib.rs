//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::single_match, clippy::too_many_arguments)]

pub mod adjacency;
pub mod collections;
pub mod debug;
pub mod error;
pub mod instance;
pub mod interface;
pub mod lsdb;
pub mod network;
pub mod packet;
pub mod tasks;
