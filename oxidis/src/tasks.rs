//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::Duration;

use oxidis_utils::timer::{Timer, TimerHeap};

use crate::packet::{LevelNumber, LspId, Snpa};

//
// IS-IS timer diagram:
//
//                          +--------------+
//       hello_interval --> |              |
//    p2p_hello_interval -> |              |
//          dis_election -> |   LinkDb     |
//         csnp_interval -> |   heap       |
//                          +--------------+
//   adjacency_holdtimer -> |  AdjLinkDb   |
//                          |  heaps (NxL) |
//                          +--------------+
//      lsp_expiry_timer -> |              |
//      lsp_delete_timer -> |  Update      |
//     lsp_refresh_timer -> |  process     |
//        lsp_gen_timer --> |  heaps (L)   |
//                          +--------------+
//
// Every timer carries a `TimerAction` value; the heap worker resolves the
// action's keys against the instance and runs the corresponding handler.
// An action whose keys no longer resolve is silently discarded.
//

// Hello timers are jittered per ISO 10589 to avoid synchronization between
// systems on the same LAN.
const HELLO_JITTER: f64 = 0.25;

// Tagged timer actions, dispatched by the timer heap workers.
#[derive(Clone, Debug)]
pub enum TimerAction {
    HelloInterval { link: usize, level: LevelNumber },
    P2pHelloInterval { link: usize },
    AdjacencyHoldtimer { link: usize, level: LevelNumber, snpa: Snpa },
    DisElection { link: usize, level: LevelNumber },
    CsnpInterval { link: usize, level: LevelNumber },
    LspExpiry { level: LevelNumber, lsp_id: LspId },
    LspDelete { level: LevelNumber, lsp_id: LspId },
    LspRefresh { level: LevelNumber, lsp_id: LspId },
    LspGenerate { level: LevelNumber },
}

pub type ActionHeap = TimerHeap<TimerAction>;
pub type ActionTimer = Timer<TimerAction>;

// ===== IS-IS timers =====

// Periodic IS-IS Hello transmission.
pub(crate) fn hello_interval(
    heap: &ActionHeap,
    link: usize,
    level: LevelNumber,
) -> ActionTimer {
    heap.timer(TimerAction::HelloInterval { link, level }, HELLO_JITTER)
}

// Periodic point-to-point IS-IS Hello transmission.
pub(crate) fn p2p_hello_interval(
    heap: &ActionHeap,
    link: usize,
) -> ActionTimer {
    heap.timer(TimerAction::P2pHelloInterval { link }, HELLO_JITTER)
}

// Adjacency hold timer.
pub(crate) fn adjacency_holdtimer(
    heap: &ActionHeap,
    link: usize,
    level: LevelNumber,
    snpa: Snpa,
) -> ActionTimer {
    heap.timer(TimerAction::AdjacencyHoldtimer { link, level, snpa }, 0.0)
}

// DIS election debounce timer.
pub(crate) fn dis_election(
    heap: &ActionHeap,
    link: usize,
    level: LevelNumber,
) -> ActionTimer {
    heap.timer(TimerAction::DisElection { link, level }, 0.0)
}

// Periodic CSNP transmission while DIS.
pub(crate) fn csnp_interval(
    heap: &ActionHeap,
    link: usize,
    level: LevelNumber,
) -> ActionTimer {
    heap.timer(TimerAction::CsnpInterval { link, level }, 0.0)
}

// LSP remaining lifetime timer.
pub(crate) fn lsp_expiry_timer(
    heap: &ActionHeap,
    level: LevelNumber,
    lsp_id: LspId,
) -> ActionTimer {
    heap.timer(TimerAction::LspExpiry { level, lsp_id }, 0.0)
}

// LSP ZeroAge grace timer.
pub(crate) fn lsp_delete_timer(
    heap: &ActionHeap,
    level: LevelNumber,
    lsp_id: LspId,
) -> ActionTimer {
    heap.timer(TimerAction::LspDelete { level, lsp_id }, 0.0)
}

// Periodic refresh of locally originated LSPs.
pub(crate) fn lsp_refresh_timer(
    heap: &ActionHeap,
    level: LevelNumber,
    lsp_id: LspId,
) -> ActionTimer {
    heap.timer(TimerAction::LspRefresh { level, lsp_id }, 0.0)
}

// Debounced own-LSP regeneration timer.
pub(crate) fn lsp_gen_timer(
    heap: &ActionHeap,
    level: LevelNumber,
) -> ActionTimer {
    heap.timer(TimerAction::LspGenerate { level }, 0.0)
}

// The DIS election is always handed off to the timer worker, even when
// triggered from the receive path, so that election runs after any further
// batched input.
pub(crate) const DIS_ELECTION_DELAY: Duration = Duration::from_millis(1);
