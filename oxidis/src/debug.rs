//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span, info};

use crate::adjacency::{Adjacency, AdjacencyState};
use crate::interface::DisCandidate;
use crate::network::MulticastAddr;
use crate::packet::pdu::{Lsp, Pdu};
use crate::packet::{LevelNumber, LspId, Snpa};

// IS-IS debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    // Instances
    InstanceCreate,
    InstanceStart,
    // Interfaces
    InterfaceStart(&'a str),
    InterfaceDisChange(&'a str, LevelNumber, &'a Option<DisCandidate>),
    // Adjacencies
    AdjacencyCreate(&'a Adjacency),
    AdjacencyDelete(&'a Adjacency),
    AdjacencyStateChange(&'a Adjacency, AdjacencyState),
    // Network
    PduRx(&'a str, &'a Snpa, &'a Pdu),
    PduTx(&'a str, MulticastAddr, &'a Pdu),
    PduDiscard(&'a str, &'a str),
    // Flooding
    LspDiscard(LevelNumber, &'a Lsp),
    // LSDB maintenance
    LspInstall(LevelNumber, &'a Lsp),
    LspOriginate(LevelNumber, &'a Lsp),
    LspPurge(LevelNumber, &'a LspId, LspPurgeReason),
    LspDelete(LevelNumber, &'a LspId),
    LspRefresh(LevelNumber, &'a LspId),
    // Protocol traps
    TrapCorruptedLsp(&'a str),
    TrapLspBufferSizeMismatch(u16),
    TrapMaxAreaAddrsMismatch(u8),
    TrapIdLengthMismatch(u8),
    TrapAreaMismatch(&'a str),
}

// Reason why an LSP is being purged.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum LspPurgeReason {
    Expired,
    Removed,
    Confusion,
    Unsupported,
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::InstanceCreate | Debug::InstanceStart => {
                debug!("{}", self);
            }
            Debug::InterfaceStart(name) => {
                debug_span!("interface", %name).in_scope(|| {
                    debug!("{}", self);
                })
            }
            Debug::InterfaceDisChange(name, level, dis) => {
                debug_span!("interface", %name).in_scope(|| {
                    if let Some(dis) = dis {
                        info!(%level, system_id = %dis.system_id, "{}", self);
                    } else {
                        info!(%level, system_id = "none", "{}", self);
                    }
                })
            }
            Debug::AdjacencyCreate(adj) | Debug::AdjacencyDelete(adj) => {
                debug_span!("adjacency", system_id = %adj.system_id)
                    .in_scope(|| {
                        debug!(snpa = %adj.snpa, "{}", self);
                    })
            }
            Debug::AdjacencyStateChange(adj, new_state) => {
                debug_span!("adjacency", system_id = %adj.system_id)
                    .in_scope(|| {
                        info!(snpa = %adj.snpa, ?new_state, "{}", self);
                    })
            }
            Debug::PduRx(ifname, src, pdu) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("input").in_scope(|| {
                        let data = serde_json::to_string(&pdu).unwrap();
                        debug!(interface = %ifname, %src, %data, "{}", self);
                    })
                })
            }
            Debug::PduTx(ifname, dst, pdu) => {
                debug_span!("network").in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        let data = serde_json::to_string(&pdu).unwrap();
                        debug!(interface = %ifname, ?dst, %data, "{}", self);
                    })
                })
            }
            Debug::PduDiscard(ifname, reason) => {
                debug!(interface = %ifname, %reason, "{}", self);
            }
            Debug::LspDiscard(level, lsp) => {
                debug!(%level, lsp_id = %lsp.lsp_id, seqno = %lsp.seqno, "{}", self);
            }
            Debug::LspInstall(level, lsp) | Debug::LspOriginate(level, lsp) => {
                debug!(%level, lsp_id = %lsp.lsp_id, seqno = %lsp.seqno, len = %lsp.raw.len(), "{}", self);
            }
            Debug::LspPurge(level, lsp_id, reason) => {
                debug!(%level, %lsp_id, ?reason, "{}", self);
            }
            Debug::LspDelete(level, lsp_id) | Debug::LspRefresh(level, lsp_id) => {
                debug!(%level, %lsp_id, "{}", self);
            }
            Debug::TrapCorruptedLsp(ifname) => {
                info!(interface = %ifname, "{}", self);
            }
            Debug::TrapLspBufferSizeMismatch(size) => {
                info!(%size, "{}", self);
            }
            Debug::TrapMaxAreaAddrsMismatch(max_area_addrs) => {
                info!(%max_area_addrs, "{}", self);
            }
            Debug::TrapIdLengthMismatch(id_len) => {
                info!(%id_len, "{}", self);
            }
            Debug::TrapAreaMismatch(ifname) => {
                info!(interface = %ifname, "{}", self);
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::InstanceCreate => {
                write!(f, "instance created")
            }
            Debug::InstanceStart => {
                write!(f, "starting instance")
            }
            Debug::InterfaceStart(..) => {
                write!(f, "starting interface")
            }
            Debug::InterfaceDisChange(..) => {
                write!(f, "trap lanLevelDesignatedIntermediateSystemChange")
            }
            Debug::AdjacencyCreate(..) => {
                write!(f, "adjacency created")
            }
            Debug::AdjacencyDelete(..) => {
                write!(f, "adjacency deleted")
            }
            Debug::AdjacencyStateChange(..) => {
                write!(f, "trap adjacencyStateChange")
            }
            Debug::PduRx(..) => {
                write!(f, "received PDU")
            }
            Debug::PduTx(..) => {
                write!(f, "sent PDU")
            }
            Debug::PduDiscard(..) => {
                write!(f, "discarded PDU")
            }
            Debug::LspDiscard(..) => {
                write!(f, "discarded LSP")
            }
            Debug::LspInstall(..) => {
                write!(f, "installing LSP")
            }
            Debug::LspOriginate(..) => {
                write!(f, "originating LSP")
            }
            Debug::LspPurge(..) => {
                write!(f, "purging LSP")
            }
            Debug::LspDelete(..) => {
                write!(f, "deleting LSP")
            }
            Debug::LspRefresh(..) => {
                write!(f, "refreshing LSP")
            }
            Debug::TrapCorruptedLsp(..) => {
                write!(f, "trap corruptedLSPReceived")
            }
            Debug::TrapLspBufferSizeMismatch(..) => {
                write!(f, "trap originatingLSPBufferSizeMismatch")
            }
            Debug::TrapMaxAreaAddrsMismatch(..) => {
                write!(f, "trap maximumAreaAddressesMismatch")
            }
            Debug::TrapIdLengthMismatch(..) => {
                write!(f, "trap iDFieldLengthMismatch")
            }
            Debug::TrapAreaMismatch(..) => {
                write!(f, "trap areaMismatch")
            }
        }
    }
}
