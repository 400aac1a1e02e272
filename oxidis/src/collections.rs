//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex};

use crate::interface::Link;
use crate::network::PollWaker;
use crate::packet::{LevelNumber, LspId};
use crate::tasks::ActionHeap;

// Ordered container of links. The container is fixed at instance startup;
// a link's position determines its Circuit ID (index + 1), which stays
// stable for the life of the link.
pub struct LinkDb {
    // The heap driving the per-link timers; held to keep its worker alive.
    _timers: ActionHeap,
    links: Vec<Arc<Link>>,
    send_ready: Mutex<BTreeSet<usize>>,
    waker: PollWaker,
}

// ===== impl LinkDb =====

impl LinkDb {
    pub(crate) fn new(
        timers: ActionHeap,
        links: Vec<Arc<Link>>,
        waker: PollWaker,
    ) -> LinkDb {
        LinkDb {
            _timers: timers,
            links,
            send_ready: Mutex::new(BTreeSet::new()),
            waker,
        }
    }

    // Returns a reference to the link at the given index.
    pub fn get(&self, index: usize) -> Option<&Arc<Link>> {
        self.links.get(index)
    }

    // Returns a reference to the link with the given Circuit ID.
    pub fn get_by_circuit_id(&self, circuit_id: u8) -> Option<&Arc<Link>> {
        if circuit_id == 0 {
            return None;
        }
        self.links.get(circuit_id as usize - 1)
    }

    // Returns a reference to the link with the given name.
    pub fn get_by_name(&self, name: &str) -> Option<&Arc<Link>> {
        self.links.iter().find(|link| link.name == name)
    }

    // Returns an iterator over all links.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Link>> {
        self.links.iter()
    }

    // Sets the SRM flag for the LSP ID on every link except `except`.
    pub(crate) fn set_all_srm(
        &self,
        level: LevelNumber,
        lsp_id: LspId,
        except: Option<usize>,
    ) {
        for link in self.links.iter().filter(|link| Some(link.index) != except)
        {
            if link.flags_insert(level, Flag::Srm, lsp_id) {
                self.link_send_ready(link.index);
            }
        }
    }

    // Clears the SSN flag for the LSP ID on every link except `except`.
    pub(crate) fn clear_all_ssn(
        &self,
        level: LevelNumber,
        lsp_id: LspId,
        except: Option<usize>,
    ) {
        for link in self.links.iter().filter(|link| Some(link.index) != except)
        {
            link.flags_remove(level, Flag::Ssn, &lsp_id);
            if link.flags_all_empty() {
                self.link_send_unready(link.index);
            }
        }
    }

    // Marks a link as having PDUs queued for transmission, waking the
    // readiness multiplexer.
    pub(crate) fn link_send_ready(&self, index: usize) {
        let mut send_ready = self.send_ready.lock().unwrap();
        if send_ready.insert(index) {
            self.waker.wake();
        }
    }

    // Marks a link as having nothing queued for transmission.
    pub(crate) fn link_send_unready(&self, index: usize) {
        let mut send_ready = self.send_ready.lock().unwrap();
        send_ready.remove(&index);
    }

    // Returns a snapshot of the links currently ready to send.
    pub(crate) fn send_ready_snapshot(&self) -> BTreeSet<usize> {
        self.send_ready.lock().unwrap().clone()
    }

    pub(crate) fn waker(&self) -> &PollWaker {
        &self.waker
    }
}

// SRM and SSN flooding flags.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Flag {
    Srm,
    Ssn,
}
