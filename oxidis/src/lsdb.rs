//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bitflags::bitflags;
use bytes::Bytes;

use crate::debug::{Debug, LspPurgeReason};
use crate::instance::Instance;
use crate::interface::Link;
use crate::packet::consts::{LspFlags, Nlpid};
use crate::packet::pdu::{Lsp, LspTlvs, Snp};
use crate::packet::tlv::{ExtIsReach, LspEntry};
use crate::packet::{LanId, LevelNumber, LspId};
use crate::tasks::{self, ActionHeap, ActionTimer};

// LSP ZeroAge lifetime.
pub const LSP_ZERO_AGE_LIFETIME: u64 = 60;
// LSP initial sequence number.
const LSP_INIT_SEQNO: u32 = 0x00000001;
// Largest LSP that will be accepted from the wire.
pub const RECEIVE_LSP_BUFFER_SIZE: usize = 1492;

// Per-level link-state database and flooding machinery.
pub struct UpdateProcess {
    pub level: LevelNumber,
    pub(crate) timers: ActionHeap,
    lsdb: Mutex<BTreeMap<LspId, Arc<LspSegment>>>,
    gen_timer: ActionTimer,
}

// One LSP ID worth of link-state information. The segment owns its PDU
// buffer; lifetime countdown and purge truncation happen under the segment
// lock only.
pub struct LspSegment {
    pub lsp_id: LspId,
    state: Mutex<SegmentState>,
    expiry_timer: ActionTimer,
    delete_timer: ActionTimer,
    refresh_timer: ActionTimer,
}

struct SegmentState {
    data: Lsp,
    flags: LspSegmentFlags,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    pub struct LspSegmentFlags: u8 {
        const RECEIVED = 0x01;
        const PURGED = 0x02;
    }
}

// ===== impl UpdateProcess =====

impl UpdateProcess {
    pub(crate) fn new(level: LevelNumber, timers: ActionHeap) -> UpdateProcess {
        let gen_timer = tasks::lsp_gen_timer(&timers, level);
        UpdateProcess {
            level,
            timers,
            lsdb: Mutex::new(BTreeMap::new()),
            gen_timer,
        }
    }

    // Returns the segment with the given LSP ID.
    pub fn get(&self, lsp_id: &LspId) -> Option<Arc<LspSegment>> {
        self.lsdb.lock().unwrap().get(lsp_id).cloned()
    }

    // Returns all LSP IDs present in the database.
    pub fn lsp_ids(&self) -> Vec<LspId> {
        self.lsdb.lock().unwrap().keys().copied().collect()
    }

    // Returns an SNP entry for every segment, ordered by LSP ID.
    pub(crate) fn csnp_entries(&self) -> Vec<LspEntry> {
        let lsdb = self.lsdb.lock().unwrap();
        lsdb.values().map(|segment| segment.snp_entry()).collect()
    }

    // Schedules a debounced regeneration of the local LSPs.
    pub fn schedule_gen(&self, delay: Duration) {
        if self.gen_timer.scheduled() {
            return;
        }
        self.gen_timer.start(delay);
    }

    // ===== LSP receipt (ISO 10589 sections 7.3.15.1 and 7.3.16.4) =====

    pub fn receive_lsp(&self, instance: &Instance, link: &Link, lsp: Lsp) {
        let level = self.level;

        // ISO 7.3.14.2: an oversized LSP is treated as a checksum failure.
        if lsp.raw.len() > RECEIVE_LSP_BUFFER_SIZE {
            Debug::TrapCorruptedLsp(&link.name).log();
            return;
        }

        // Verify the checksum of LSPs that are not being purged.
        if !lsp.is_checksum_valid() {
            Debug::TrapCorruptedLsp(&link.name).log();
            Debug::LspDiscard(level, &lsp).log();
            return;
        }

        // A differing LSP Buffer Size is only trapped; processing continues.
        if let Some(size) = lsp.tlvs.lsp_buf_size()
            && size != instance.config.lsp_mtu
        {
            Debug::TrapLspBufferSizeMismatch(size).log();
        }

        let lsp_id = lsp.lsp_id;
        let segment = self.get(&lsp_id);
        let result = match &segment {
            Some(segment) => segment.compare(lsp.seqno, lsp.rem_lifetime),
            None => Ordering::Less,
        };

        // Self-originated LSPs take the 7.3.16 shortcuts.
        if lsp_id.system_id == instance.config.system_id {
            let supported = segment
                .as_ref()
                .is_some_and(|segment| !segment.is_purged())
                && (lsp_id.pseudonode == 0
                    || instance
                        .links
                        .get_by_circuit_id(lsp_id.pseudonode)
                        .is_some_and(|pn_link| pn_link.is_dis(level)));

            if !supported {
                if !lsp.is_expired() {
                    // A segment we no longer originate is circulating with
                    // remaining lifetime: purge it from the network.
                    let segment = self.install(instance, lsp, true);
                    self.purge_lsp(
                        instance,
                        &segment,
                        LspPurgeReason::Unsupported,
                    );
                }
                return;
            }
            if result == Ordering::Less {
                // The wire holds a newer copy of our own LSP: bump the
                // sequence number past it and reflood (7.3.16.1).
                let segment = segment.unwrap();
                let next = segment.next_instance(
                    level,
                    instance.config.lsp_lifetime,
                    lsp.seqno + 1,
                );
                self.originate_lsp(instance, next);
                return;
            }
            // Same or older is handled like any other LSP.
        }

        match result {
            Ordering::Less => {
                // 7.3.16.4.a: a purge for an LSP we do not hold is
                // acknowledged without being retained. The acknowledgment
                // only exists on point-to-point links.
                if segment.is_none() && lsp.is_expired() {
                    return;
                }

                // Newer: install and flood on all other links.
                self.install(instance, lsp, true);
                instance.links.set_all_srm(level, lsp_id, Some(link.index));
                link.clear_srm(instance, level, &lsp_id);
                if link.p2p {
                    link.set_ssn(instance, level, lsp_id);
                }
                instance.links.clear_all_ssn(level, lsp_id, Some(link.index));
            }
            Ordering::Equal => {
                let segment = segment.unwrap();

                // LSP confusion handling (ISO 7.3.16.2).
                if segment.cksum() != lsp.cksum {
                    if segment.is_received() {
                        self.purge_lsp(
                            instance,
                            &segment,
                            LspPurgeReason::Confusion,
                        );
                    } else {
                        self.refresh_lsp(instance, &segment);
                    }
                    return;
                }

                // An equal-seqno zero-lifetime update re-extends the
                // ZeroAge grace period of a purging segment.
                if lsp.is_expired() {
                    segment.touch_purge();
                }

                // Same: stop sending, acknowledge on point-to-point.
                link.clear_srm(instance, level, &lsp_id);
                if link.p2p {
                    link.set_ssn(instance, level, lsp_id);
                }
            }
            Ordering::Greater => {
                // Older: send our newer copy, and do not acknowledge.
                link.set_srm(instance, level, lsp_id);
                link.clear_ssn(instance, level, &lsp_id);
            }
        }
    }

    // ===== SNP receipt (ISO 10589 section 7.3.15.2) =====

    pub fn receive_snp(&self, instance: &Instance, link: &Link, snp: &Snp) {
        let level = self.level;
        let is_csnp = snp.summary.is_some();
        let mut mentioned = BTreeSet::new();

        for entry in snp.tlvs.lsp_entries() {
            let lsp_id = entry.lsp_id;
            if is_csnp {
                mentioned.insert(lsp_id);
            }

            match self.get(&lsp_id) {
                Some(segment) => {
                    match segment.compare(entry.seqno, entry.rem_lifetime) {
                        // LSP confusion handling (ISO 7.3.16.2).
                        Ordering::Equal if segment.cksum() != entry.cksum => {
                            if segment.is_received() {
                                self.purge_lsp(
                                    instance,
                                    &segment,
                                    LspPurgeReason::Confusion,
                                );
                            } else {
                                self.refresh_lsp(instance, &segment);
                            }
                        }
                        // b.2: the entry acknowledges our copy.
                        Ordering::Equal => {
                            if link.p2p {
                                link.clear_srm(instance, level, &lsp_id);
                            }
                        }
                        // b.3: our copy is newer, flood it.
                        Ordering::Greater => {
                            link.clear_ssn(instance, level, &lsp_id);
                            link.set_srm(instance, level, lsp_id);
                        }
                        // b.4: the neighbor holds a newer copy, request it.
                        Ordering::Less => {
                            link.set_ssn(instance, level, lsp_id);
                            if link.p2p {
                                link.clear_srm(instance, level, &lsp_id);
                            }
                        }
                    }
                }
                None => {
                    // b.5: create a zero-seqno entry for an unknown LSP so
                    // it can be requested via PSNP.
                    if entry.seqno != 0
                        && entry.rem_lifetime != 0
                        && entry.cksum != 0
                    {
                        let mut lsp = Lsp::new(
                            level,
                            entry.rem_lifetime,
                            lsp_id,
                            0,
                            LspFlags::default(),
                            LspTlvs::default(),
                        );
                        lsp.cksum = entry.cksum;
                        self.install(instance, lsp, true);
                        link.set_ssn(instance, level, lsp_id);
                    }
                }
            }
        }

        // c: flood LSPs within the described range that the CSNP failed to
        // mention.
        if let Some((start, end)) = snp.summary {
            let lsdb = self.lsdb.lock().unwrap();
            let missing = lsdb
                .range(start..=end)
                .filter(|(lsp_id, _)| !mentioned.contains(*lsp_id))
                .filter(|(_, segment)| {
                    let entry = segment.snp_entry();
                    entry.seqno != 0 && entry.rem_lifetime != 0
                })
                .map(|(lsp_id, _)| *lsp_id)
                .collect::<Vec<_>>();
            drop(lsdb);

            for lsp_id in missing {
                link.set_srm(instance, level, lsp_id);
            }
        }
    }

    // ===== LSDB maintenance =====

    // Installs the LSP, replacing any previous instance of the segment.
    pub(crate) fn install(
        &self,
        _instance: &Instance,
        lsp: Lsp,
        received: bool,
    ) -> Arc<LspSegment> {
        Debug::LspInstall(self.level, &lsp).log();

        let mut lsdb = self.lsdb.lock().unwrap();
        if let Some(segment) = lsdb.get(&lsp.lsp_id).cloned() {
            drop(lsdb);
            segment.update(lsp, received);
            segment
        } else {
            let segment = Arc::new(LspSegment::new(
                &self.timers,
                self.level,
                lsp,
                received,
            ));
            lsdb.insert(segment.lsp_id, segment.clone());
            segment
        }
    }

    // Installs a locally built LSP, floods it everywhere, and arms its
    // refresh timer at three quarters of the lifetime.
    pub(crate) fn originate_lsp(&self, instance: &Instance, lsp: Lsp) {
        Debug::LspOriginate(self.level, &lsp).log();

        let lsp_id = lsp.lsp_id;
        let refresh = u64::from(lsp.rem_lifetime) * 3 / 4;
        let segment = self.install(instance, lsp, false);
        instance.links.set_all_srm(self.level, lsp_id, None);
        segment.refresh_timer.start(Duration::from_secs(refresh));
    }

    // Starts the purge of a segment (ISO 7.3.16.4): zero lifetime, truncate
    // to the header, flood, and hold the husk for ZeroAge. A no-op if the
    // purge is already in progress.
    pub(crate) fn purge_lsp(
        &self,
        instance: &Instance,
        segment: &Arc<LspSegment>,
        reason: LspPurgeReason,
    ) {
        if !segment.purge() {
            return;
        }
        Debug::LspPurge(self.level, &segment.lsp_id, reason).log();
        instance.links.set_all_srm(self.level, segment.lsp_id, None);
    }

    // Originates the next instance of a locally owned segment.
    pub(crate) fn refresh_lsp(
        &self,
        instance: &Instance,
        segment: &Arc<LspSegment>,
    ) {
        Debug::LspRefresh(self.level, &segment.lsp_id).log();
        let next = segment.next_instance(
            self.level,
            instance.config.lsp_lifetime,
            segment.seqno() + 1,
        );
        self.originate_lsp(instance, next);
    }

    // ===== Timer events =====

    pub(crate) fn process_expiry(&self, instance: &Instance, lsp_id: LspId) {
        if let Some(segment) = self.get(&lsp_id) {
            self.purge_lsp(instance, &segment, LspPurgeReason::Expired);
        }
    }

    pub(crate) fn process_delete(&self, lsp_id: LspId) {
        let mut lsdb = self.lsdb.lock().unwrap();
        if lsdb
            .get(&lsp_id)
            .is_some_and(|segment| segment.is_purged())
        {
            Debug::LspDelete(self.level, &lsp_id).log();
            lsdb.remove(&lsp_id);
        }
    }

    pub(crate) fn process_refresh(&self, instance: &Instance, lsp_id: LspId) {
        if let Some(segment) = self.get(&lsp_id)
            && !segment.is_purged()
        {
            self.refresh_lsp(instance, &segment);
        }
    }

    pub(crate) fn process_gen(&self, instance: &Instance) {
        lsp_originate_all(instance, self);
    }
}

// ===== impl LspSegment =====

impl LspSegment {
    fn new(
        heap: &ActionHeap,
        level: LevelNumber,
        data: Lsp,
        received: bool,
    ) -> LspSegment {
        let lsp_id = data.lsp_id;
        let expiry_timer = tasks::lsp_expiry_timer(heap, level, lsp_id);
        let delete_timer = tasks::lsp_delete_timer(heap, level, lsp_id);
        let refresh_timer = tasks::lsp_refresh_timer(heap, level, lsp_id);

        let mut flags = LspSegmentFlags::empty();
        flags.set(LspSegmentFlags::RECEIVED, received);
        if data.rem_lifetime == 0 {
            flags.insert(LspSegmentFlags::PURGED);
            delete_timer.start(Duration::from_secs(LSP_ZERO_AGE_LIFETIME));
        } else {
            expiry_timer
                .start(Duration::from_secs(data.rem_lifetime.into()));
        }

        LspSegment {
            lsp_id,
            state: Mutex::new(SegmentState { data, flags }),
            expiry_timer,
            delete_timer,
            refresh_timer,
        }
    }

    // Replaces the segment's contents with a newer instance.
    fn update(&self, data: Lsp, received: bool) {
        let mut state = self.state.lock().unwrap();
        let purging = data.rem_lifetime == 0;
        state.data = data;
        state.flags.set(LspSegmentFlags::RECEIVED, received);
        if purging {
            // An equal-seqno zero-lifetime update re-extends the grace
            // period to the full ZeroAge.
            state.flags.insert(LspSegmentFlags::PURGED);
            self.expiry_timer.stop();
            self.refresh_timer.stop();
            self.delete_timer.start(Duration::from_secs(
                LSP_ZERO_AGE_LIFETIME,
            ));
        } else {
            state.flags.remove(LspSegmentFlags::PURGED);
            self.delete_timer.stop();
            self.expiry_timer.start(Duration::from_secs(
                state.data.rem_lifetime.into(),
            ));
        }
    }

    // Turns the segment into a purge. Returns false when the purge is
    // already in progress.
    fn purge(&self) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.flags.contains(LspSegmentFlags::PURGED) {
            return false;
        }
        state.data.purge();
        state.flags.insert(LspSegmentFlags::PURGED);
        self.expiry_timer.stop();
        self.refresh_timer.stop();
        self.delete_timer
            .start(Duration::from_secs(LSP_ZERO_AGE_LIFETIME));
        true
    }

    // Restarts the ZeroAge grace period of a purging segment.
    fn touch_purge(&self) {
        let state = self.state.lock().unwrap();
        if state.flags.contains(LspSegmentFlags::PURGED) {
            self.delete_timer
                .start(Duration::from_secs(LSP_ZERO_AGE_LIFETIME));
        }
    }

    // Compares the database copy against a received (seqno, lifetime) pair.
    // `Greater` means the database copy is newer.
    pub fn compare(&self, rx_seqno: u32, rx_rem_lifetime: u16) -> Ordering {
        let state = self.state.lock().unwrap();
        lsp_compare(
            state.data.seqno,
            state.data.rem_lifetime,
            rx_seqno,
            rx_rem_lifetime,
        )
    }

    // Rewrites the lifetime field of the PDU buffer with the actual
    // remaining time before transmission, returning that time. A return of
    // zero means the lifetime ran out and the segment must be purged before
    // going out.
    pub(crate) fn tx_lifetime_update(&self) -> u16 {
        let mut state = self.state.lock().unwrap();
        if state.flags.contains(LspSegmentFlags::PURGED) {
            return u16::MAX;
        }
        let rem_lifetime = state.data.rem_lifetime();
        if rem_lifetime != 0 {
            state.data.set_rem_lifetime(rem_lifetime);
        }
        rem_lifetime
    }

    // Builds the next locally originated instance of this segment.
    pub(crate) fn next_instance(
        &self,
        level: LevelNumber,
        lifetime: u16,
        seqno: u32,
    ) -> Lsp {
        let state = self.state.lock().unwrap();
        Lsp::new(
            level,
            lifetime,
            self.lsp_id,
            seqno,
            state.data.flags,
            state.data.tlvs.clone(),
        )
    }

    // Returns whether reoriginating with the given contents would be a
    // no-op.
    fn content_unchanged(&self, lsp: &Lsp) -> bool {
        let state = self.state.lock().unwrap();
        !state.flags.contains(LspSegmentFlags::PURGED)
            && state.data.flags == lsp.flags
            && state.data.tlvs == lsp.tlvs
    }

    pub fn seqno(&self) -> u32 {
        self.state.lock().unwrap().data.seqno
    }

    pub fn cksum(&self) -> u16 {
        self.state.lock().unwrap().data.cksum
    }

    pub fn is_purged(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .flags
            .contains(LspSegmentFlags::PURGED)
    }

    pub fn is_received(&self) -> bool {
        self.state
            .lock()
            .unwrap()
            .flags
            .contains(LspSegmentFlags::RECEIVED)
    }

    // Converts the segment into an LSP Entry for use in an SNP.
    pub fn snp_entry(&self) -> LspEntry {
        let state = self.state.lock().unwrap();
        LspEntry {
            rem_lifetime: state.data.rem_lifetime(),
            lsp_id: self.lsp_id,
            seqno: state.data.seqno,
            cksum: state.data.cksum,
        }
    }

    // Returns the raw PDU buffer.
    pub fn raw(&self) -> Bytes {
        self.state.lock().unwrap().data.raw.clone()
    }

    // Runs the closure against the segment's decoded contents.
    pub fn with_data<R>(&self, f: impl FnOnce(&Lsp) -> R) -> R {
        let state = self.state.lock().unwrap();
        f(&state.data)
    }
}

// ===== global functions =====

// Compares which LSP instance is more recent: a higher sequence number is
// newer; with equal sequence numbers, an expired instance (zero remaining
// lifetime) is newer than a live one (ISO 10589 sections 7.3.16.3 and
// 7.3.16.4.b.1).
pub fn lsp_compare(
    db_seqno: u32,
    db_rem_lifetime: u16,
    rx_seqno: u32,
    rx_rem_lifetime: u16,
) -> Ordering {
    let cmp = db_seqno.cmp(&rx_seqno);
    if cmp != Ordering::Equal {
        return cmp;
    }
    if db_rem_lifetime == 0 && rx_rem_lifetime != 0 {
        return Ordering::Greater;
    }
    if db_rem_lifetime != 0 && rx_rem_lifetime == 0 {
        return Ordering::Less;
    }
    Ordering::Equal
}

// ===== helper functions =====

// Builds the local LSPs: the main LSP, plus one pseudonode LSP for every
// LAN where this system is the DIS. All fragments are rebuilt from scratch
// on every change; unchanged fragments are filtered out by the caller.
fn lsp_build(instance: &Instance, uproc: &UpdateProcess) -> Vec<Lsp> {
    let level = uproc.level;
    let mut lsps = vec![];

    // Build main LSP.
    let tlvs = lsp_build_tlvs(instance, level);
    lsps.extend(lsp_build_fragments(instance, uproc, level, 0, tlvs));

    // Build pseudonode LSPs.
    for link in instance
        .links
        .iter()
        .filter(|link| !link.p2p)
        .filter(|link| link.is_dis(level))
    {
        let tlvs = lsp_build_tlvs_pseudo(instance, link, level);
        let fragments =
            lsp_build_fragments(instance, uproc, level, link.circuit_id, tlvs);
        lsps.extend(fragments);
    }

    lsps
}

fn lsp_build_flags(instance: &Instance, lsp_id: LspId) -> LspFlags {
    // Per ISO 10589 - Section 9.9, the "Level 1 Intermediate System"
    // bit must always be set, even in L2-only systems.
    let mut lsp_flags = LspFlags::IS_TYPE1;
    if instance.config.level_type.intersects(LevelNumber::L2) {
        lsp_flags.insert(LspFlags::IS_TYPE2);
    }
    if instance.config.overload
        && lsp_id.pseudonode == 0
        && lsp_id.fragment == 0
    {
        lsp_flags.insert(LspFlags::OL);
    }
    lsp_flags
}

fn lsp_build_tlvs(instance: &Instance, level: LevelNumber) -> LspTlvs {
    let config = &instance.config;

    // The area address is advertised in the Level 2 LSP only.
    let area_addrs =
        (level == LevelNumber::L2).then(|| config.area_addr.clone());

    let mut ipv4_addrs = vec![];
    let mut ext_is_reach = vec![];
    for link in instance.links.iter() {
        if let Some(prefix) = link.ipv4_addr {
            ipv4_addrs.push(prefix.ip());
        }
        if link.p2p {
            continue;
        }
        let Some(ll) = link.levels.get(level) else {
            continue;
        };
        // One entry per LAN, pointing at the pseudonode of its DIS.
        if ll.dis().is_some() {
            ext_is_reach.push(ExtIsReach {
                neighbor: ll.lan_id(),
                metric: config.metric,
                sub_tlvs: vec![],
            });
        }
    }

    LspTlvs::new(
        [Nlpid::Ipv4 as u8],
        area_addrs,
        Some(instance.hostname.clone()),
        None,
        [],
        ext_is_reach,
        ipv4_addrs,
        [],
        [],
        [],
        None,
        std::iter::empty(),
        std::iter::empty(),
    )
}

fn lsp_build_tlvs_pseudo(
    instance: &Instance,
    link: &Link,
    level: LevelNumber,
) -> LspTlvs {
    let system_id = instance.config.system_id;

    // Zero-metric entries for ourselves and for every adjacency in the Up
    // state on this LAN.
    let mut ext_is_reach = vec![ExtIsReach {
        neighbor: LanId::from((system_id, 0)),
        metric: 0,
        sub_tlvs: vec![],
    }];
    if let Some(ll) = link.levels.get(level) {
        for neighbor in ll.adjacencies.up_system_ids() {
            ext_is_reach.push(ExtIsReach {
                neighbor: LanId::from((neighbor, 0)),
                metric: 0,
                sub_tlvs: vec![],
            });
        }
    }

    LspTlvs::new(
        [],
        None,
        None,
        None,
        [],
        ext_is_reach,
        [],
        [],
        [],
        [],
        None,
        std::iter::empty(),
        std::iter::empty(),
    )
}

fn lsp_build_fragments(
    instance: &Instance,
    uproc: &UpdateProcess,
    level: LevelNumber,
    pseudonode_id: u8,
    mut tlvs: LspTlvs,
) -> Vec<Lsp> {
    let system_id = instance.config.system_id;
    let max_len =
        instance.config.lsp_mtu as usize - Lsp::HEADER_LEN as usize;

    let mut fragments = vec![];
    for frag_id in 0..=255 {
        let Some(tlvs) = tlvs.next_chunk(max_len) else {
            break;
        };

        let lsp_id = LspId::from((system_id, pseudonode_id, frag_id));
        let seqno = uproc
            .get(&lsp_id)
            .map(|segment| segment.seqno() + 1)
            .unwrap_or(LSP_INIT_SEQNO);
        let lsp_flags = lsp_build_flags(instance, lsp_id);
        let fragment = Lsp::new(
            level,
            instance.config.lsp_lifetime,
            lsp_id,
            seqno,
            lsp_flags,
            tlvs,
        );
        fragments.push(fragment);
    }

    // An empty LSP is emitted only for segment zero.
    if fragments.is_empty() {
        let lsp_id = LspId::from((system_id, pseudonode_id, 0));
        let seqno = uproc
            .get(&lsp_id)
            .map(|segment| segment.seqno() + 1)
            .unwrap_or(LSP_INIT_SEQNO);
        let lsp_flags = lsp_build_flags(instance, lsp_id);
        fragments.push(Lsp::new(
            level,
            instance.config.lsp_lifetime,
            lsp_id,
            seqno,
            lsp_flags,
            LspTlvs::default(),
        ));
    }

    fragments
}

// ===== global functions =====

// Rebuilds and reoriginates the local LSPs: changed fragments get the next
// sequence number, unchanged fragments are left alone, and fragments that
// are no longer produced are force-purged.
pub(crate) fn lsp_originate_all(instance: &Instance, uproc: &UpdateProcess) {
    let system_id = instance.config.system_id;

    let before: HashSet<_> = uproc
        .lsp_ids()
        .into_iter()
        .filter(|lsp_id| lsp_id.system_id == system_id)
        .collect();
    let mut after = HashSet::new();

    // Build updated local LSPs.
    for lsp in lsp_build(instance, uproc) {
        after.insert(lsp.lsp_id);

        // Skip origination if the fragment content hasn't changed.
        if let Some(segment) = uproc.get(&lsp.lsp_id)
            && segment.content_unchanged(&lsp)
        {
            continue;
        }

        uproc.originate_lsp(instance, lsp);
    }

    // Purge any LSP fragments that are no longer in use.
    for lsp_id in before.difference(&after) {
        if let Some(segment) = uproc.get(lsp_id) {
            uproc.purge_lsp(instance, &segment, LspPurgeReason::Removed);
        }
    }
}
