//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;
use std::io::IoSlice;
use std::sync::Mutex;
use std::time::Duration;

use ipnetwork::Ipv4Network;

use crate::adjacency::AdjLinkDb;
use crate::collections::Flag;
use crate::debug::{Debug, LspPurgeReason};
use crate::instance::Instance;
use crate::network::{LLC_HDR, LinkLayer, MulticastAddr, ReceivedFrame};
use crate::packet::consts::{MAX_AREA_ADDRS, Nlpid, PduType};
use crate::packet::error::DecodeError;
use crate::packet::pdu::{
    Header, Hello, HelloTlvs, HelloVariant, Pdu, Snp, SnpTlvs,
};
use crate::packet::{
    LanId, LevelNumber, LevelType, Levels, LspId, Snpa, SystemId,
};
use crate::tasks::{self, ActionHeap, ActionTimer};

// A single LAN (or point-to-point) interface running IS-IS.
pub struct Link {
    pub index: usize,
    pub circuit_id: u8,
    pub name: String,
    pub p2p: bool,
    pub level_type: LevelType,
    pub snpa: Snpa,
    pub ipv4_addr: Option<Ipv4Network>,
    pub mtu: u32,
    pub(crate) sock: Box<dyn LinkLayer>,
    pub levels: Levels<Option<LevelLink>>,
    p2p_hello_timer: Option<ActionTimer>,
}

// Per-level state of a LAN link.
pub struct LevelLink {
    pub level: LevelNumber,
    pub priority: u8,
    pub adjacencies: AdjLinkDb,
    flags: Mutex<FlagSets>,
    dis: Mutex<DisState>,
    hello_timer: ActionTimer,
    dis_timer: ActionTimer,
    csnp_timer: ActionTimer,
}

// Flooding flags, keyed by LSP ID so that flag identity survives LSDB
// replacement.
#[derive(Default)]
struct FlagSets {
    srm: BTreeSet<LspId>,
    ssn: BTreeSet<LspId>,
}

struct DisState {
    dis: Option<DisCandidate>,
    lan_id: LanId,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DisCandidate {
    pub priority: u8,
    pub system_id: SystemId,
    pub lan_id: LanId,
    pub myself: bool,
}

// ===== impl Link =====

impl Link {
    pub(crate) fn new(
        index: usize,
        name: String,
        p2p: bool,
        level_type: LevelType,
        priority: u8,
        system_id: SystemId,
        sock: Box<dyn LinkLayer>,
        heap: &ActionHeap,
        mut adj_heap: impl FnMut(LevelNumber) -> ActionHeap,
    ) -> Link {
        let addrs = sock.if_addrs();
        let circuit_id = (index + 1) as u8;

        let mut levels = Levels::<Option<LevelLink>>::default();
        let mut p2p_hello_timer = None;
        if p2p {
            p2p_hello_timer = Some(tasks::p2p_hello_interval(heap, index));
        } else {
            for level in level_type {
                *levels.get_mut(level) = Some(LevelLink::new(
                    index,
                    level,
                    priority,
                    LanId::from((system_id, circuit_id)),
                    heap,
                    adj_heap(level),
                ));
            }
        }

        Debug::InterfaceStart(&name).log();

        Link {
            index,
            circuit_id,
            name,
            p2p,
            level_type,
            snpa: addrs.snpa,
            ipv4_addr: addrs.ipv4,
            mtu: addrs.mtu,
            sock,
            levels,
            p2p_hello_timer,
        }
    }

    // Joins the relevant multicast groups and starts the link's timers.
    pub(crate) fn start(&self, instance: &Instance) {
        let groups = if self.p2p {
            vec![MulticastAddr::AllIss]
        } else {
            self.level_type
                .into_iter()
                .map(|level| self.multicast_addr(level))
                .collect()
        };
        for group in groups {
            if let Err(error) = self.sock.add_drop_group(group, true) {
                error.log();
            }
        }

        if let Some(timer) = &self.p2p_hello_timer {
            timer.start(Duration::from_secs(1));
        }
        for level in self.level_type {
            if let Some(ll) = self.levels.get(level) {
                ll.hello_timer.start(Duration::from_secs(1));
                // Initial DIS election, once enough hellos went around.
                ll.dis_timer.start(Duration::from_secs(
                    u64::from(instance.config.hello_interval) * 2,
                ));
            }
        }
    }

    // Returns the MTU size available for sending IS-IS PDUs. On broadcast
    // networks the 3-byte LLC header must be accounted for.
    pub(crate) fn iso_mtu(&self) -> usize {
        self.mtu as usize - LLC_HDR.len()
    }

    // Returns the multicast address used for transmitting PDUs.
    pub(crate) fn multicast_addr(&self, level: LevelNumber) -> MulticastAddr {
        if self.p2p {
            return MulticastAddr::AllIss;
        }
        match level {
            LevelNumber::L1 => MulticastAddr::AllL1Iss,
            LevelNumber::L2 => MulticastAddr::AllL2Iss,
        }
    }

    pub fn is_dis(&self, level: LevelNumber) -> bool {
        self.levels
            .get(level)
            .as_ref()
            .is_some_and(|ll| ll.is_dis())
    }

    // ===== Receive path =====

    // Validates the LLC/CLNS shell of a received frame and dispatches the
    // PDU by type.
    pub fn receive_packet(&self, instance: &Instance, frame: ReceivedFrame) {
        let ReceivedFrame { src, data } = frame;

        // Our own transmissions are looped back by the multicast group.
        if src == self.snpa {
            return;
        }

        if data.len() < LLC_HDR.len() + Header::LEN as usize
            || data[..LLC_HDR.len()] != LLC_HDR
        {
            Debug::PduDiscard(&self.name, "bad LLC header").log();
            return;
        }
        let payload = data.slice(LLC_HDR.len()..);

        // Strip the padding of short ethernet frames.
        let Some(pdu_len) = Pdu::raw_pdu_len(&payload) else {
            Debug::PduDiscard(&self.name, "unknown PDU type").log();
            return;
        };
        if pdu_len < Header::LEN as usize || pdu_len > payload.len() {
            Debug::PduDiscard(&self.name, "invalid PDU length").log();
            return;
        }
        let payload = payload.slice(..pdu_len);

        let pdu = match Pdu::decode(payload) {
            Ok(pdu) => pdu,
            Err(DecodeError::InvalidIdLength(id_len)) => {
                Debug::TrapIdLengthMismatch(id_len).log();
                return;
            }
            Err(error) => {
                let reason = error.to_string();
                Debug::PduDiscard(&self.name, &reason).log();
                return;
            }
        };

        // Validate the "Maximum Area Addresses" field.
        let max_area_addrs = match &pdu {
            Pdu::Hello(pdu) => pdu.hdr.max_area_addrs,
            Pdu::Lsp(pdu) => pdu.hdr.max_area_addrs,
            Pdu::Snp(pdu) => pdu.hdr.max_area_addrs,
        };
        if max_area_addrs != 0 && max_area_addrs != MAX_AREA_ADDRS {
            Debug::TrapMaxAreaAddrsMismatch(max_area_addrs).log();
            return;
        }

        Debug::PduRx(&self.name, &src, &pdu).log();

        match pdu {
            Pdu::Hello(hello) => match hello.variant {
                HelloVariant::Lan { priority, lan_id } => {
                    let level = match hello.hdr.pdu_type {
                        PduType::HelloLanL1 => LevelNumber::L1,
                        _ => LevelNumber::L2,
                    };
                    if let Some(ll) = self.levels.get(level) {
                        ll.receive_hello(
                            instance, self, src, &hello, priority, lan_id,
                        );
                    }
                }
                HelloVariant::P2P { .. } => {
                    // Point-to-point adjacency procedures are not
                    // implemented.
                    Debug::PduDiscard(&self.name, "p2p hello").log();
                }
            },
            Pdu::Lsp(lsp) => {
                let level = if lsp.hdr.pdu_type == PduType::LspL1 {
                    LevelNumber::L1
                } else {
                    LevelNumber::L2
                };
                let Some(ll) = self.levels.get(level) else {
                    return;
                };
                let Some(uproc) = instance.update_process(level) else {
                    return;
                };
                if !ll.adjacencies.has_up_adjacency(src) {
                    Debug::PduDiscard(&self.name, "no adjacency").log();
                    return;
                }
                uproc.receive_lsp(instance, self, lsp);
            }
            Pdu::Snp(snp) => {
                let level = if matches!(
                    snp.hdr.pdu_type,
                    PduType::CsnpL1 | PduType::PsnpL1
                ) {
                    LevelNumber::L1
                } else {
                    LevelNumber::L2
                };
                let Some(ll) = self.levels.get(level) else {
                    return;
                };
                let Some(uproc) = instance.update_process(level) else {
                    return;
                };
                if !ll.adjacencies.has_up_adjacency(src) {
                    Debug::PduDiscard(&self.name, "no adjacency").log();
                    return;
                }
                uproc.receive_snp(instance, self, &snp);
            }
        }
    }

    // Drains all frames pending on the link's descriptor.
    pub(crate) fn receive_packets(&self, instance: &Instance) {
        loop {
            match self.sock.recv_pkt() {
                Ok(Some(frame)) => self.receive_packet(instance, frame),
                Ok(None) => break,
                Err(error) => {
                    error.log();
                    break;
                }
            }
        }
    }

    // ===== Send path =====

    pub(crate) fn send_pdu(&self, pdu: &Pdu, dst: MulticastAddr) {
        Debug::PduTx(&self.name, dst, pdu).log();
        let buf = pdu.encode();
        self.send_raw(&buf, dst);
    }

    fn send_raw(&self, buf: &[u8], dst: MulticastAddr) {
        let bufs = [IoSlice::new(&LLC_HDR), IoSlice::new(buf)];
        if let Err(error) = self.sock.writev(dst, &bufs) {
            error.log();
        }
    }

    // Drains the SRM and SSN flag sets once the socket is writable: queued
    // LSPs are flooded and pending acknowledgments are packaged into PSNPs.
    pub fn send_drain(&self, instance: &Instance) {
        for level in self.level_type {
            if self.levels.get(level).is_none() {
                continue;
            };
            let Some(uproc) = instance.update_process(level) else {
                continue;
            };

            // Flood LSPs with the SRM flag set.
            let srm = self.flags_snapshot(level, Flag::Srm);
            for lsp_id in srm {
                if let Some(segment) = uproc.get(&lsp_id) {
                    // Refresh the lifetime field with the remaining time;
                    // a segment that ran out is purged before going out.
                    if segment.tx_lifetime_update() == 0 {
                        uproc.purge_lsp(
                            instance,
                            &segment,
                            LspPurgeReason::Expired,
                        );
                    }
                    let raw = segment.raw();
                    self.send_raw(&raw, self.multicast_addr(level));
                }
                self.flags_remove(level, Flag::Srm, &lsp_id);
            }

            // Package the SSN flags into one or more PSNPs.
            let ssn = self.flags_take(level, Flag::Ssn);
            if !ssn.is_empty() {
                let entries = ssn
                    .iter()
                    .filter_map(|lsp_id| uproc.get(lsp_id))
                    .map(|segment| segment.snp_entry())
                    .collect::<Vec<_>>();
                let max_entries = SnpTlvs::max_lsp_entries(
                    self.iso_mtu() - Snp::PSNP_HEADER_LEN as usize,
                );
                let source =
                    LanId::from((instance.config.system_id, 0));
                for chunk in entries.chunks(max_entries) {
                    let pdu = Pdu::Snp(Snp::new(
                        level,
                        source,
                        None,
                        SnpTlvs::new(chunk.iter().copied()),
                    ));
                    self.send_pdu(&pdu, self.multicast_addr(level));
                }
            }
        }

        if self.flags_all_empty() {
            instance.links.link_send_unready(self.index);
        }
    }

    // ===== Hello transmission =====

    pub(crate) fn hello_tx(&self, instance: &Instance, level: LevelNumber) {
        let Some(ll) = self.levels.get(level) else {
            return;
        };

        let hello = ll.generate_hello(instance, self);
        self.send_pdu(&Pdu::Hello(hello), self.multicast_addr(level));

        // The DIS beacons at a faster rate.
        let mut interval = instance.config.hello_interval;
        if ll.is_dis() {
            interval = std::cmp::max(interval / 3, 1);
        }
        ll.hello_timer.start(Duration::from_secs(interval.into()));
    }

    pub(crate) fn p2p_hello_tx(&self, instance: &Instance) {
        let config = &instance.config;
        let mut hello = Hello::new(
            LevelType::All,
            self.level_type,
            config.system_id,
            config.hello_interval * config.hello_multiplier,
            HelloVariant::P2P { local_circuit_id: 0 },
            HelloTlvs::new(
                [Nlpid::Ipv4 as u8],
                [config.area_addr.clone()],
                [],
                self.ipv4_addr.map(|prefix| prefix.ip()),
                std::iter::empty(),
            ),
        );
        hello.add_padding(self.iso_mtu() as u16);
        self.send_pdu(&Pdu::Hello(hello), MulticastAddr::AllIss);

        if let Some(timer) = &self.p2p_hello_timer {
            timer.start(Duration::from_secs(config.hello_interval.into()));
        }
    }

    // ===== Timer events =====

    pub(crate) fn adjacency_holdtimer_expiry(
        &self,
        level: LevelNumber,
        snpa: Snpa,
    ) {
        if let Some(ll) = self.levels.get(level)
            && ll.adjacencies.expire_adjacency(snpa)
        {
            ll.dis_info_changed();
        }
    }

    // ===== DIS election =====

    // Runs the DIS election for the level, per ISO 10589 section 8.4.5: the
    // candidate set is every Up adjacency plus ourselves; the winner has the
    // highest priority, with the numerically greatest System ID breaking
    // ties. No DIS is elected while no adjacency is up.
    pub(crate) fn dis_election(&self, instance: &Instance, level: LevelNumber) {
        let Some(ll) = self.levels.get(level) else {
            return;
        };
        let system_id = instance.config.system_id;
        let self_lan_id = LanId::from((system_id, self.circuit_id));

        let mut candidates = ll.adjacencies.dis_candidates();
        let elect = if candidates.is_empty() {
            None
        } else {
            candidates.push(DisCandidate {
                priority: ll.priority,
                system_id,
                lan_id: self_lan_id,
                myself: true,
            });
            candidates
                .into_iter()
                .max_by_key(|rtr| (rtr.priority, rtr.system_id))
        };

        let mut dis = ll.dis.lock().unwrap();
        if dis.dis.map(|dis| dis.system_id)
            == elect.map(|elect| elect.system_id)
        {
            let mut regen = false;
            if let Some(elect) = elect
                && let Some(current) = dis.dis.as_mut()
            {
                // The DIS may have changed its perceived LAN ID.
                if current.lan_id != elect.lan_id {
                    current.lan_id = elect.lan_id;
                    dis.lan_id = elect.lan_id;
                    regen = true;
                }
                // While we are the DIS, the pseudonode LSP tracks the
                // adjacency set.
                if elect.myself {
                    regen = true;
                }
            }
            drop(dis);
            if regen && let Some(uproc) = instance.update_process(level) {
                uproc.schedule_gen(crate::instance::LSP_GEN_EVENT_DELAY);
            }
            return;
        }

        Debug::InterfaceDisChange(&self.name, level, &elect).log();

        let was_self = dis.dis.is_some_and(|dis| dis.myself);
        let is_self = elect.is_some_and(|elect| elect.myself);
        dis.dis = elect;
        dis.lan_id = elect.map(|elect| elect.lan_id).unwrap_or(self_lan_id);
        drop(dis);

        if was_self && !is_self {
            // Resigned: stop advertising the LSDB summary. The pseudonode
            // LSP segments are force-purged by the next regeneration.
            ll.csnp_timer.stop();
        }
        if is_self && !was_self {
            // Elected: generate the pseudonode LSP and start describing the
            // LSDB with periodic CSNPs.
            ll.csnp_timer.start(Duration::ZERO);
        }

        // The non-pseudonode LSP points at the new DIS.
        if let Some(uproc) = instance.update_process(level) {
            uproc.schedule_gen(crate::instance::LSP_GEN_EVENT_DELAY);
        }
    }

    // ===== CSNP transmission =====

    // While DIS, describe the full LSDB range with one or more CSNPs.
    pub(crate) fn csnp_tx(&self, instance: &Instance, level: LevelNumber) {
        let Some(ll) = self.levels.get(level) else {
            return;
        };
        // A stray expiration after resigning re-arms nothing.
        if !ll.is_dis() {
            return;
        }
        ll.csnp_timer
            .start(Duration::from_secs(instance.config.csnp_interval.into()));
        let Some(uproc) = instance.update_process(level) else {
            return;
        };

        let source = LanId::from((instance.config.system_id, 0));
        let entries = uproc.csnp_entries();
        let max_entries = SnpTlvs::max_lsp_entries(
            self.iso_mtu() - Snp::CSNP_HEADER_LEN as usize,
        );

        let mut start = LspId::from([0; 8]);
        let chunks = entries.chunks(max_entries).collect::<Vec<_>>();
        if chunks.is_empty() {
            // Nothing in the LSDB: advertise an empty summary covering the
            // full LSP ID range.
            let end = LspId::from([0xff; 8]);
            let pdu = Pdu::Snp(Snp::new(
                level,
                source,
                Some((start, end)),
                SnpTlvs::new([]),
            ));
            self.send_pdu(&pdu, self.multicast_addr(level));
            return;
        }
        let last = chunks.len() - 1;
        for (i, chunk) in chunks.into_iter().enumerate() {
            let end = if i == last {
                LspId::from([0xff; 8])
            } else {
                chunk.last().map(|entry| entry.lsp_id).unwrap()
            };
            let pdu = Pdu::Snp(Snp::new(
                level,
                source,
                Some((start, end)),
                SnpTlvs::new(chunk.iter().copied()),
            ));
            self.send_pdu(&pdu, self.multicast_addr(level));
            start = end.increment();
        }
    }

    // ===== SRM and SSN flags =====

    pub(crate) fn flags_insert(
        &self,
        level: LevelNumber,
        flag: Flag,
        lsp_id: LspId,
    ) -> bool {
        let Some(ll) = self.levels.get(level) else {
            return false;
        };
        let mut flags = ll.flags.lock().unwrap();
        match flag {
            Flag::Srm => flags.srm.insert(lsp_id),
            Flag::Ssn => flags.ssn.insert(lsp_id),
        }
    }

    pub(crate) fn flags_remove(
        &self,
        level: LevelNumber,
        flag: Flag,
        lsp_id: &LspId,
    ) {
        let Some(ll) = self.levels.get(level) else {
            return;
        };
        let mut flags = ll.flags.lock().unwrap();
        match flag {
            Flag::Srm => flags.srm.remove(lsp_id),
            Flag::Ssn => flags.ssn.remove(lsp_id),
        };
    }

    fn flags_snapshot(&self, level: LevelNumber, flag: Flag) -> Vec<LspId> {
        let Some(ll) = self.levels.get(level) else {
            return vec![];
        };
        let flags = ll.flags.lock().unwrap();
        match flag {
            Flag::Srm => flags.srm.iter().copied().collect(),
            Flag::Ssn => flags.ssn.iter().copied().collect(),
        }
    }

    fn flags_take(&self, level: LevelNumber, flag: Flag) -> BTreeSet<LspId> {
        let Some(ll) = self.levels.get(level) else {
            return Default::default();
        };
        let mut flags = ll.flags.lock().unwrap();
        match flag {
            Flag::Srm => std::mem::take(&mut flags.srm),
            Flag::Ssn => std::mem::take(&mut flags.ssn),
        }
    }

    pub(crate) fn flags_all_empty(&self) -> bool {
        for level in self.level_type {
            if let Some(ll) = self.levels.get(level) {
                let flags = ll.flags.lock().unwrap();
                if !flags.srm.is_empty() || !flags.ssn.is_empty() {
                    return false;
                }
            }
        }
        true
    }

    // Marks an LSP for transmission on this link.
    pub(crate) fn set_srm(
        &self,
        instance: &Instance,
        level: LevelNumber,
        lsp_id: LspId,
    ) {
        if self.flags_insert(level, Flag::Srm, lsp_id) {
            instance.links.link_send_ready(self.index);
        }
    }

    pub(crate) fn clear_srm(
        &self,
        instance: &Instance,
        level: LevelNumber,
        lsp_id: &LspId,
    ) {
        self.flags_remove(level, Flag::Srm, lsp_id);
        if self.flags_all_empty() {
            instance.links.link_send_unready(self.index);
        }
    }

    // Marks an LSP for acknowledgment via PSNP on this link.
    pub(crate) fn set_ssn(
        &self,
        instance: &Instance,
        level: LevelNumber,
        lsp_id: LspId,
    ) {
        if self.flags_insert(level, Flag::Ssn, lsp_id) {
            instance.links.link_send_ready(self.index);
        }
    }

    pub(crate) fn clear_ssn(
        &self,
        instance: &Instance,
        level: LevelNumber,
        lsp_id: &LspId,
    ) {
        self.flags_remove(level, Flag::Ssn, lsp_id);
        if self.flags_all_empty() {
            instance.links.link_send_unready(self.index);
        }
    }

    // Returns a copy of the SRM flag set for the level.
    pub fn srm_set(&self, level: LevelNumber) -> BTreeSet<LspId> {
        self.levels
            .get(level)
            .as_ref()
            .map(|ll| ll.flags.lock().unwrap().srm.clone())
            .unwrap_or_default()
    }

    // Returns a copy of the SSN flag set for the level.
    pub fn ssn_set(&self, level: LevelNumber) -> BTreeSet<LspId> {
        self.levels
            .get(level)
            .as_ref()
            .map(|ll| ll.flags.lock().unwrap().ssn.clone())
            .unwrap_or_default()
    }
}

// ===== impl LevelLink =====

impl LevelLink {
    fn new(
        link: usize,
        level: LevelNumber,
        priority: u8,
        lan_id: LanId,
        heap: &ActionHeap,
        adj_heap: ActionHeap,
    ) -> LevelLink {
        LevelLink {
            level,
            priority,
            adjacencies: AdjLinkDb::new(link, level, adj_heap),
            flags: Mutex::new(FlagSets::default()),
            // Until a DIS is elected, the LAN ID is derived from the local
            // system (see IS-IS 8.4.1.a). It is rewritten on election.
            dis: Mutex::new(DisState { dis: None, lan_id }),
            hello_timer: tasks::hello_interval(heap, link, level),
            dis_timer: tasks::dis_election(heap, link, level),
            csnp_timer: tasks::csnp_interval(heap, link, level),
        }
    }

    pub fn is_dis(&self) -> bool {
        self.dis.lock().unwrap().dis.is_some_and(|dis| dis.myself)
    }

    pub fn dis(&self) -> Option<DisCandidate> {
        self.dis.lock().unwrap().dis
    }

    // Returns the LAN ID this link currently advertises.
    pub fn lan_id(&self) -> LanId {
        self.dis.lock().unwrap().lan_id
    }

    // Schedules the DIS election on the link's timer worker. The election
    // never runs inline on the receive path.
    pub(crate) fn dis_info_changed(&self) {
        if self.dis_timer.scheduled() {
            return;
        }
        self.dis_timer.start(tasks::DIS_ELECTION_DELAY);
    }

    // Processes a received LAN hello (ISO 10589 section 8.4.2).
    fn receive_hello(
        &self,
        instance: &Instance,
        link: &Link,
        src: Snpa,
        hello: &Hello,
        priority: u8,
        lan_id: LanId,
    ) {
        // A Level-1 hello must carry exactly one Area Addresses TLV with at
        // least one matching area.
        if self.level == LevelNumber::L1
            && (hello.tlvs.area_addrs.len() != 1
                || !hello
                    .tlvs
                    .area_addrs()
                    .any(|addr| *addr == instance.config.area_addr))
        {
            Debug::TrapAreaMismatch(&link.name).log();
            return;
        }

        // Check for duplicate System ID.
        if hello.source == instance.config.system_id {
            Debug::PduDiscard(&link.name, "duplicate System-ID").log();
            return;
        }

        if self.adjacencies.update_adjacency(
            link.snpa,
            src,
            hello,
            priority,
            lan_id,
        ) {
            self.dis_info_changed();
        }
    }

    fn generate_hello(&self, instance: &Instance, link: &Link) -> Hello {
        let config = &instance.config;
        let mut hello = Hello::new(
            self.level.into(),
            link.level_type,
            config.system_id,
            config.hello_interval * config.hello_multiplier,
            HelloVariant::Lan {
                priority: self.priority,
                lan_id: self.lan_id(),
            },
            HelloTlvs::new(
                [Nlpid::Ipv4 as u8],
                [config.area_addr.clone()],
                self.adjacencies.neighbor_snpas(),
                link.ipv4_addr.map(|prefix| prefix.ip()),
                std::iter::empty(),
            ),
        );
        hello.add_padding(link.iso_mtu() as u16);
        hello
    }
}
