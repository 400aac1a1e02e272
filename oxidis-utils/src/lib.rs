//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::single_match, clippy::too_many_arguments)]

pub mod bytes;
pub mod socket;
pub mod timer;
