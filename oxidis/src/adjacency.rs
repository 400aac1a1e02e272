//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::time::Duration;

use crate::debug::Debug;
use crate::interface::DisCandidate;
use crate::packet::pdu::Hello;
use crate::packet::{AreaAddr, LanId, LevelNumber, Snpa, SystemId};
use crate::tasks::{self, ActionHeap, ActionTimer};

// Per-link, per-level set of LAN neighbors, keyed by SNPA.
pub struct AdjLinkDb {
    level: LevelNumber,
    link: usize,
    timers: ActionHeap,
    adjacencies: Mutex<BTreeMap<Snpa, Adjacency>>,
}

#[derive(Debug)]
pub struct Adjacency {
    pub snpa: Snpa,
    pub system_id: SystemId,
    pub lan_id: Option<LanId>,
    pub priority: Option<u8>,
    pub hold_time: u16,
    pub area_addrs: Vec<AreaAddr>,
    pub state: AdjacencyState,
    hold_timer: ActionTimer,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdjacencyState {
    Down,
    Initializing,
    Up,
}

// ===== impl AdjLinkDb =====

impl AdjLinkDb {
    pub(crate) fn new(
        link: usize,
        level: LevelNumber,
        timers: ActionHeap,
    ) -> AdjLinkDb {
        AdjLinkDb {
            level,
            link,
            timers,
            adjacencies: Mutex::new(BTreeMap::new()),
        }
    }

    // Processes a validated LAN hello. Returns whether DIS election
    // information has changed.
    pub(crate) fn update_adjacency(
        &self,
        our_snpa: Snpa,
        src: Snpa,
        hello: &Hello,
        priority: u8,
        lan_id: LanId,
    ) -> bool {
        let mut adjacencies = self.adjacencies.lock().unwrap();

        match adjacencies.get_mut(&src) {
            Some(adj) => {
                // If the System ID changed, ignore the hello.
                if adj.system_id != hello.source {
                    return false;
                }
                adj.update(self.level, our_snpa, hello, priority, lan_id)
            }
            None => {
                let hold_timer = tasks::adjacency_holdtimer(
                    &self.timers,
                    self.link,
                    self.level,
                    src,
                );
                let mut adj =
                    Adjacency::new(src, hello.source, hold_timer);
                adj.update(self.level, our_snpa, hello, priority, lan_id);
                let is_up = adj.state == AdjacencyState::Up;
                adjacencies.insert(src, adj);

                // A brand new adjacency affects the DIS election only once
                // it is up.
                is_up
            }
        }
    }

    // Removes an adjacency whose hold time expired. Returns whether DIS
    // election information has changed.
    pub(crate) fn expire_adjacency(&self, snpa: Snpa) -> bool {
        let mut adjacencies = self.adjacencies.lock().unwrap();

        let Some(mut adj) = adjacencies.remove(&snpa) else {
            return false;
        };
        let was_up = adj.state == AdjacencyState::Up;
        adj.state = AdjacencyState::Down;
        Debug::AdjacencyStateChange(&adj, AdjacencyState::Down).log();
        Debug::AdjacencyDelete(&adj).log();
        was_up
    }

    // Returns whether an adjacency in the Up state exists for the SNPA.
    pub(crate) fn has_up_adjacency(&self, snpa: Snpa) -> bool {
        let adjacencies = self.adjacencies.lock().unwrap();
        adjacencies
            .get(&snpa)
            .is_some_and(|adj| adj.state == AdjacencyState::Up)
    }

    // Returns the SNPAs of all adjacencies not in the Down state, for the
    // IS Neighbors TLV of outgoing hellos.
    pub(crate) fn neighbor_snpas(&self) -> Vec<Snpa> {
        let adjacencies = self.adjacencies.lock().unwrap();
        adjacencies
            .values()
            .filter(|adj| adj.state != AdjacencyState::Down)
            .map(|adj| adj.snpa)
            .collect()
    }

    // Returns the DIS election candidates (adjacencies in the Up state).
    pub(crate) fn dis_candidates(&self) -> Vec<DisCandidate> {
        let adjacencies = self.adjacencies.lock().unwrap();
        adjacencies
            .values()
            .filter(|adj| adj.state == AdjacencyState::Up)
            .map(|adj| DisCandidate {
                priority: adj.priority.unwrap_or(0),
                system_id: adj.system_id,
                lan_id: adj
                    .lan_id
                    .unwrap_or(LanId::from((adj.system_id, 0))),
                myself: false,
            })
            .collect()
    }

    // Returns the System IDs of all adjacencies in the Up state, for the
    // pseudonode LSP.
    pub(crate) fn up_system_ids(&self) -> Vec<SystemId> {
        let adjacencies = self.adjacencies.lock().unwrap();
        adjacencies
            .values()
            .filter(|adj| adj.state == AdjacencyState::Up)
            .map(|adj| adj.system_id)
            .collect()
    }

    // Returns the state of the adjacency with the given SNPA.
    pub fn adjacency_state(&self, snpa: Snpa) -> Option<AdjacencyState> {
        let adjacencies = self.adjacencies.lock().unwrap();
        adjacencies.get(&snpa).map(|adj| adj.state)
    }
}

// ===== impl Adjacency =====

impl Adjacency {
    fn new(
        snpa: Snpa,
        system_id: SystemId,
        hold_timer: ActionTimer,
    ) -> Adjacency {
        let adj = Adjacency {
            snpa,
            system_id,
            lan_id: None,
            priority: None,
            hold_time: 0,
            area_addrs: Default::default(),
            state: AdjacencyState::Down,
            hold_timer,
        };
        Debug::AdjacencyCreate(&adj).log();
        adj
    }

    // Updates the adjacency from a received hello. Returns whether DIS
    // election information has changed.
    fn update(
        &mut self,
        level: LevelNumber,
        our_snpa: Snpa,
        hello: &Hello,
        priority: u8,
        lan_id: LanId,
    ) -> bool {
        let mut dis_info_changed = false;

        self.hold_time = hello.holdtime;

        if self.priority != Some(priority) {
            self.priority = Some(priority);
            dis_info_changed = true;
        }
        if self.lan_id != Some(lan_id) {
            self.lan_id = Some(lan_id);
            dis_info_changed = true;
        }

        // Level-1 hello acceptance has already verified the area match.
        if level == LevelNumber::L1 {
            self.area_addrs = hello.tlvs.area_addrs().cloned().collect();
        }

        // Check for two-way communication.
        let old_state = self.state;
        let new_state = if hello.tlvs.neighbors().any(|nbr| *nbr == our_snpa) {
            AdjacencyState::Up
        } else {
            AdjacencyState::Initializing
        };
        if new_state != old_state {
            self.state = new_state;
            Debug::AdjacencyStateChange(self, new_state).log();
            if new_state == AdjacencyState::Up
                || old_state == AdjacencyState::Up
            {
                dis_info_changed = true;
            }
        }

        self.hold_timer.start(Duration::from_secs(self.hold_time.into()));

        dis_info_changed
    }
}
