//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::Ordering;
use std::io::IoSlice;
use std::net::Ipv4Addr;
use std::os::fd::BorrowedFd;
use std::sync::{Arc, Mutex};

use bytes::{Bytes, BytesMut};
use ipnetwork::Ipv4Network;
use oxidis::adjacency::AdjacencyState;
use oxidis::error::IoError;
use oxidis::instance::{Config, Instance, LinkConfig};
use oxidis::lsdb::lsp_compare;
use oxidis::network::{
    LLC_HDR, LinkAddrs, LinkLayer, MulticastAddr, ReceivedFrame,
};
use oxidis::packet::consts::LspFlags;
use oxidis::packet::pdu::{
    Hello, HelloTlvs, HelloVariant, Lsp, LspTlvs, Pdu, Snp, SnpTlvs,
};
use oxidis::packet::tlv::LspEntry;
use oxidis::packet::{
    AreaAddr, LanId, LevelNumber, LevelType, LspId, Snpa, SystemId,
};
use oxidis::tasks::TimerAction;

const LEVEL: LevelNumber = LevelNumber::L1;

//
// In-memory link layer. Transmitted frames are captured for inspection.
//

struct TestLink {
    addrs: LinkAddrs,
    sent: Mutex<Vec<(MulticastAddr, Bytes)>>,
}

impl TestLink {
    fn new(index: usize) -> TestLink {
        TestLink {
            addrs: LinkAddrs {
                snpa: Snpa::from([0xaa, 0, 0, 0, 0, index as u8]),
                ipv4: Some(
                    Ipv4Network::new(
                        Ipv4Addr::new(10, 0, index as u8, 1),
                        24,
                    )
                    .unwrap(),
                ),
                mtu: 1500,
            },
            sent: Mutex::new(Vec::new()),
        }
    }
}

impl LinkLayer for TestLink {
    fn poll_fd(&self) -> Option<BorrowedFd<'_>> {
        None
    }

    fn recv_pkt(&self) -> Result<Option<ReceivedFrame>, IoError> {
        Ok(None)
    }

    fn writev(
        &self,
        dst: MulticastAddr,
        bufs: &[IoSlice<'_>],
    ) -> Result<usize, IoError> {
        let mut frame = BytesMut::new();
        for buf in bufs {
            frame.extend_from_slice(buf);
        }
        let len = frame.len();
        self.sent.lock().unwrap().push((dst, frame.freeze()));
        Ok(len)
    }

    fn add_drop_group(
        &self,
        _addr: MulticastAddr,
        _add: bool,
    ) -> Result<(), IoError> {
        Ok(())
    }

    fn if_addrs(&self) -> LinkAddrs {
        self.addrs
    }
}

//
// Helper functions.
//

const SELF_ID: [u8; 6] = [0x11; 6];

fn test_instance(num_links: usize) -> Arc<Instance> {
    let config = Config {
        system_id: SystemId::from(SELF_ID),
        area_addr: AreaAddr::from([0x49].as_slice()),
        level_type: LevelType::L1,
        hostname: Some("rt1".to_owned()),
        interfaces: (0..num_links)
            .map(|i| LinkConfig {
                name: format!("eth{i}"),
                p2p: false,
            })
            .collect(),
        ..Default::default()
    };
    let socks = (0..num_links)
        .map(|i| Box::new(TestLink::new(i)) as Box<dyn LinkLayer>)
        .collect();
    Instance::with_link_layers(config, socks).unwrap()
}

// Delivers a PDU to a link as if it arrived from the wire.
fn deliver(instance: &Instance, link: usize, src: Snpa, pdu: &Pdu) {
    let mut data = BytesMut::new();
    data.extend_from_slice(&LLC_HDR);
    data.extend_from_slice(&pdu.encode());
    let link = instance.links.get(link).unwrap().clone();
    link.receive_packet(
        instance,
        ReceivedFrame {
            src,
            data: data.freeze(),
        },
    );
}

// Builds a LAN hello from a neighbor. The neighbor reports us once
// `two_way` is set.
fn neighbor_hello(
    instance: &Instance,
    link: usize,
    system_id: SystemId,
    priority: u8,
    two_way: bool,
) -> Pdu {
    let our_snpa = instance.links.get(link).unwrap().snpa;
    let neighbors = two_way.then_some(our_snpa);
    Pdu::Hello(Hello::new(
        LevelType::L1,
        LevelType::L1,
        system_id,
        30,
        HelloVariant::Lan {
            priority,
            lan_id: LanId::from((system_id, 1)),
        },
        HelloTlvs::new(
            [0xcc],
            [AreaAddr::from([0x49].as_slice())],
            neighbors,
            std::iter::empty(),
            std::iter::empty(),
        ),
    ))
}

// Brings up an adjacency on the given link.
fn adjacency_up(
    instance: &Instance,
    link: usize,
    snpa: Snpa,
    system_id: SystemId,
    priority: u8,
) {
    let hello = neighbor_hello(instance, link, system_id, priority, true);
    deliver(instance, link, snpa, &hello);
}

fn adjacency_state(
    instance: &Instance,
    link: usize,
    snpa: Snpa,
) -> Option<AdjacencyState> {
    instance
        .links
        .get(link)
        .unwrap()
        .levels
        .get(LEVEL)
        .as_ref()
        .unwrap()
        .adjacencies
        .adjacency_state(snpa)
}

// Builds a remote LSP with the given identity.
fn remote_lsp(lsp_id: [u8; 8], seqno: u32, rem_lifetime: u16) -> Lsp {
    Lsp::new(
        LEVEL,
        rem_lifetime,
        LspId::from(lsp_id),
        seqno,
        LspFlags::IS_TYPE1,
        LspTlvs::new(
            [0xcc],
            [],
            Some("rt9".to_owned()),
            None,
            [],
            [],
            [Ipv4Addr::new(10, 9, 9, 1)],
            [],
            [],
            [],
            None,
            std::iter::empty(),
            std::iter::empty(),
        ),
    )
}

fn nbr_snpa(i: u8) -> Snpa {
    Snpa::from([0xbb, 0, 0, 0, 0, i])
}

fn nbr_sysid(i: u8) -> SystemId {
    SystemId::from([0x22, 0x22, 0x22, 0x22, 0x22, i])
}

//
// Tests.
//

// LSP instance comparison (ISO 10589 section 7.3.16).
#[test]
fn test_lsp_compare() {
    // Higher sequence number wins.
    assert_eq!(lsp_compare(2, 1200, 1, 1200), Ordering::Greater);
    assert_eq!(lsp_compare(1, 1200, 2, 1200), Ordering::Less);
    // Equal sequence numbers: zero lifetime is newer.
    assert_eq!(lsp_compare(7, 0, 7, 1200), Ordering::Greater);
    assert_eq!(lsp_compare(7, 1200, 7, 0), Ordering::Less);
    assert_eq!(lsp_compare(7, 0, 7, 0), Ordering::Equal);
    assert_eq!(lsp_compare(7, 300, 7, 1200), Ordering::Equal);
}

// Two hellos on the same SNPA: one-way brings the adjacency to
// Initializing, two-way brings it up.
#[test]
fn test_adjacency_up() {
    let instance = test_instance(1);
    let snpa = nbr_snpa(1);
    let system_id = nbr_sysid(1);

    let hello = neighbor_hello(&instance, 0, system_id, 64, false);
    deliver(&instance, 0, snpa, &hello);
    assert_eq!(
        adjacency_state(&instance, 0, snpa),
        Some(AdjacencyState::Initializing)
    );

    let hello = neighbor_hello(&instance, 0, system_id, 64, true);
    deliver(&instance, 0, snpa, &hello);
    assert_eq!(
        adjacency_state(&instance, 0, snpa),
        Some(AdjacencyState::Up)
    );
}

// A hello from a known SNPA with a different System ID is dropped.
#[test]
fn test_adjacency_sysid_mismatch() {
    let instance = test_instance(1);
    let snpa = nbr_snpa(1);

    adjacency_up(&instance, 0, snpa, nbr_sysid(1), 64);
    assert_eq!(
        adjacency_state(&instance, 0, snpa),
        Some(AdjacencyState::Up)
    );

    // Same SNPA, different System ID: no state change.
    let hello = neighbor_hello(&instance, 0, nbr_sysid(2), 64, false);
    deliver(&instance, 0, snpa, &hello);
    assert_eq!(
        adjacency_state(&instance, 0, snpa),
        Some(AdjacencyState::Up)
    );
}

// A Level-1 hello without a matching area is rejected.
#[test]
fn test_hello_area_mismatch() {
    let instance = test_instance(1);
    let snpa = nbr_snpa(1);
    let system_id = nbr_sysid(1);

    let pdu = Pdu::Hello(Hello::new(
        LevelType::L1,
        LevelType::L1,
        system_id,
        30,
        HelloVariant::Lan {
            priority: 64,
            lan_id: LanId::from((system_id, 1)),
        },
        HelloTlvs::new(
            [0xcc],
            [AreaAddr::from([0x49, 0x00, 0x99].as_slice())],
            std::iter::empty(),
            std::iter::empty(),
            std::iter::empty(),
        ),
    ));
    deliver(&instance, 0, snpa, &pdu);
    assert_eq!(adjacency_state(&instance, 0, snpa), None);
}

// DIS election determinism: highest (priority, System ID) tuple wins.
#[test]
fn test_dis_election() {
    let instance = test_instance(1);
    let link = instance.links.get(0).unwrap().clone();
    let snpa = nbr_snpa(1);
    let system_id = nbr_sysid(1);

    // Equal priority: the numerically greater System ID (the neighbor's)
    // wins.
    adjacency_up(&instance, 0, snpa, system_id, 64);
    instance.process_timer_action(TimerAction::DisElection {
        link: 0,
        level: LEVEL,
    });
    assert!(!link.is_dis(LEVEL));
    let ll = link.levels.get(LEVEL).as_ref().unwrap();
    assert_eq!(ll.dis().unwrap().system_id, system_id);
    assert_eq!(ll.lan_id(), LanId::from((system_id, 1)));

    // With the neighbor at a lower priority, we win.
    adjacency_up(&instance, 0, snpa, system_id, 63);
    instance.process_timer_action(TimerAction::DisElection {
        link: 0,
        level: LEVEL,
    });
    assert!(link.is_dis(LEVEL));
    assert_eq!(
        ll.lan_id(),
        LanId::from((SystemId::from(SELF_ID), link.circuit_id))
    );
}

// Losing the only Up adjacency leaves the LAN without a DIS.
#[test]
fn test_dis_resign_no_adjacencies() {
    let instance = test_instance(1);
    let link = instance.links.get(0).unwrap().clone();
    let snpa = nbr_snpa(1);

    adjacency_up(&instance, 0, snpa, nbr_sysid(1), 63);
    instance.process_timer_action(TimerAction::DisElection {
        link: 0,
        level: LEVEL,
    });
    assert!(link.is_dis(LEVEL));

    instance.process_timer_action(TimerAction::AdjacencyHoldtimer {
        link: 0,
        level: LEVEL,
        snpa,
    });
    instance.process_timer_action(TimerAction::DisElection {
        link: 0,
        level: LEVEL,
    });
    assert!(!link.is_dis(LEVEL));
    assert!(link.levels.get(LEVEL).as_ref().unwrap().dis().is_none());
}

// Flooding a newer LSP: SRM set everywhere but the receiving link, and
// cleared by the send drain.
#[test]
fn test_flooding_flags() {
    let instance = test_instance(3);
    let uproc = instance.update_process(LEVEL).unwrap();
    let lsp_id = LspId::from([0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0, 0]);

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);
    let lsp = remote_lsp(lsp_id.as_bytes(), 1, 1200);
    deliver(&instance, 0, nbr_snpa(1), &Pdu::Lsp(lsp));

    // Installed, and queued for flooding on every link but the first.
    assert!(uproc.get(&lsp_id).is_some());
    let link_a = instance.links.get(0).unwrap().clone();
    let link_b = instance.links.get(1).unwrap().clone();
    let link_c = instance.links.get(2).unwrap().clone();
    assert!(!link_a.srm_set(LEVEL).contains(&lsp_id));
    assert!(link_b.srm_set(LEVEL).contains(&lsp_id));
    assert!(link_c.srm_set(LEVEL).contains(&lsp_id));
    assert!(link_b.ssn_set(LEVEL).is_empty());
    assert!(link_c.ssn_set(LEVEL).is_empty());

    // The send drain transmits the LSP and clears the flags.
    link_b.send_drain(&instance);
    link_c.send_drain(&instance);
    assert!(!link_b.srm_set(LEVEL).contains(&lsp_id));
    assert!(!link_c.srm_set(LEVEL).contains(&lsp_id));

    // Receiving the same LSP again leaves the flags clear.
    let lsp = remote_lsp(lsp_id.as_bytes(), 1, 1200);
    deliver(&instance, 0, nbr_snpa(1), &Pdu::Lsp(lsp));
    assert!(!link_a.srm_set(LEVEL).contains(&lsp_id));
    assert!(!link_b.srm_set(LEVEL).contains(&lsp_id));
    assert!(!link_c.srm_set(LEVEL).contains(&lsp_id));
}

// An older LSP triggers retransmission of the newer database copy.
#[test]
fn test_flooding_older() {
    let instance = test_instance(1);
    let link = instance.links.get(0).unwrap().clone();
    let lsp_id = LspId::from([0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0, 0]);

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);
    deliver(
        &instance,
        0,
        nbr_snpa(1),
        &Pdu::Lsp(remote_lsp(lsp_id.as_bytes(), 5, 1200)),
    );
    link.send_drain(&instance);

    deliver(
        &instance,
        0,
        nbr_snpa(1),
        &Pdu::Lsp(remote_lsp(lsp_id.as_bytes(), 3, 1200)),
    );
    assert!(link.srm_set(LEVEL).contains(&lsp_id));
    assert!(!link.ssn_set(LEVEL).contains(&lsp_id));
}

// LSP expiry and the ZeroAge grace period (ISO 7.3.16.4).
#[test]
fn test_purge() {
    let instance = test_instance(3);
    let uproc = instance.update_process(LEVEL).unwrap();
    let lsp_id = LspId::from([0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0, 0]);

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);
    deliver(
        &instance,
        0,
        nbr_snpa(1),
        &Pdu::Lsp(remote_lsp(lsp_id.as_bytes(), 1, 30)),
    );
    for link in instance.links.iter() {
        link.send_drain(&instance);
    }

    // Lifetime runs out: the segment turns into a purge and is flooded on
    // every link.
    instance.process_timer_action(TimerAction::LspExpiry {
        level: LEVEL,
        lsp_id,
    });
    let segment = uproc.get(&lsp_id).unwrap();
    assert!(segment.is_purged());
    segment.with_data(|data| {
        assert_eq!(data.rem_lifetime, 0);
        assert_eq!(data.cksum, 0);
        assert_eq!(data.raw.len(), Lsp::HEADER_LEN as usize);
    });
    for link in instance.links.iter() {
        assert!(link.srm_set(LEVEL).contains(&lsp_id));
    }

    // An equal-seqno zero-lifetime update re-extends the grace period
    // instead of reviving the segment.
    let mut raw = remote_lsp(lsp_id.as_bytes(), 1, 0).raw.to_vec();
    raw[24] = 0;
    raw[25] = 0;
    let purge = Pdu::decode(Bytes::from(raw)).unwrap();
    deliver(&instance, 0, nbr_snpa(1), &purge);
    assert!(uproc.get(&lsp_id).unwrap().is_purged());

    // Once the ZeroAge grace expires, the LSP ID is gone from the LSDB.
    instance.process_timer_action(TimerAction::LspDelete {
        level: LEVEL,
        lsp_id,
    });
    assert!(uproc.get(&lsp_id).is_none());
}

// An SNP entry for an unknown LSP creates a zero-seqno placeholder that is
// requested via PSNP (ISO 7.3.15.2.b.5).
#[test]
fn test_snp_placeholder() {
    let instance = test_instance(1);
    let uproc = instance.update_process(LEVEL).unwrap();
    let link = instance.links.get(0).unwrap().clone();
    let lsp_id = LspId::from([0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0, 0]);

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);

    let psnp = Pdu::Snp(Snp::new(
        LEVEL,
        LanId::from((nbr_sysid(1), 0)),
        None,
        SnpTlvs::new([LspEntry {
            rem_lifetime: 1200,
            lsp_id,
            seqno: 7,
            cksum: 0x1234,
        }]),
    ));
    deliver(&instance, 0, nbr_snpa(1), &psnp);

    let segment = uproc.get(&lsp_id).unwrap();
    assert_eq!(segment.seqno(), 0);
    assert!(link.ssn_set(LEVEL).contains(&lsp_id));

    // Draining the link packages the SSN flags into a PSNP.
    link.send_drain(&instance);
    assert!(link.ssn_set(LEVEL).is_empty());
}

// A CSNP that fails to mention an LSP we hold queues that LSP for
// transmission (ISO 7.3.15.2.c).
#[test]
fn test_csnp_gap_fill() {
    let instance = test_instance(1);
    let link = instance.links.get(0).unwrap().clone();
    let lsp_id = LspId::from([0x99, 0x99, 0x99, 0x99, 0x99, 0x99, 0, 0]);

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);
    deliver(
        &instance,
        0,
        nbr_snpa(1),
        &Pdu::Lsp(remote_lsp(lsp_id.as_bytes(), 1, 1200)),
    );
    link.send_drain(&instance);
    assert!(!link.srm_set(LEVEL).contains(&lsp_id));

    // Empty CSNP covering the full LSP ID range.
    let csnp = Pdu::Snp(Snp::new(
        LEVEL,
        LanId::from((nbr_sysid(1), 0)),
        Some((LspId::from([0x00; 8]), LspId::from([0xff; 8]))),
        SnpTlvs::new([]),
    ));
    deliver(&instance, 0, nbr_snpa(1), &csnp);
    assert!(link.srm_set(LEVEL).contains(&lsp_id));
}

// Local LSP generation: segment zero carries the hostname, and every
// regeneration bumps the sequence number only when the content changed.
#[test]
fn test_own_lsp_generation() {
    let instance = test_instance(1);
    let uproc = instance.update_process(LEVEL).unwrap();
    let own_id = LspId::from((SystemId::from(SELF_ID), 0, 0));

    instance.process_timer_action(TimerAction::LspGenerate { level: LEVEL });
    let segment = uproc.get(&own_id).unwrap();
    assert_eq!(segment.seqno(), 1);
    segment.with_data(|data| {
        assert_eq!(data.tlvs.hostname(), Some("rt1"));
    });

    // Unchanged content: no new instance.
    instance.process_timer_action(TimerAction::LspGenerate { level: LEVEL });
    assert_eq!(uproc.get(&own_id).unwrap().seqno(), 1);

    // A refresh always originates the next sequence number.
    instance.process_timer_action(TimerAction::LspRefresh {
        level: LEVEL,
        lsp_id: own_id,
    });
    assert_eq!(uproc.get(&own_id).unwrap().seqno(), 2);
}

// The pseudonode LSP exists exactly while this system is the DIS, and
// lists every Up adjacency plus the system itself.
#[test]
fn test_pseudonode_lsp() {
    let instance = test_instance(1);
    let uproc = instance.update_process(LEVEL).unwrap();
    let link = instance.links.get(0).unwrap().clone();
    let snpa = nbr_snpa(1);
    let pn_id = LspId::from((SystemId::from(SELF_ID), link.circuit_id, 0));

    // Become the DIS.
    adjacency_up(&instance, 0, snpa, nbr_sysid(1), 63);
    instance.process_timer_action(TimerAction::DisElection {
        link: 0,
        level: LEVEL,
    });
    assert!(link.is_dis(LEVEL));
    instance.process_timer_action(TimerAction::LspGenerate { level: LEVEL });

    let segment = uproc.get(&pn_id).unwrap();
    segment.with_data(|data| {
        let neighbors: Vec<_> =
            data.tlvs.ext_is_reach().map(|reach| reach.neighbor).collect();
        assert!(
            neighbors.contains(&LanId::from((SystemId::from(SELF_ID), 0)))
        );
        assert!(neighbors.contains(&LanId::from((nbr_sysid(1), 0))));
        assert!(data.tlvs.ext_is_reach().all(|reach| reach.metric == 0));
    });

    // The non-pseudonode LSP points at the pseudonode.
    let own_id = LspId::from((SystemId::from(SELF_ID), 0, 0));
    uproc.get(&own_id).unwrap().with_data(|data| {
        let lan_id = LanId::from((SystemId::from(SELF_ID), link.circuit_id));
        assert!(
            data.tlvs.ext_is_reach().any(|reach| reach.neighbor == lan_id)
        );
    });

    // Resign: the next regeneration force-purges the pseudonode segments.
    instance.process_timer_action(TimerAction::AdjacencyHoldtimer {
        link: 0,
        level: LEVEL,
        snpa,
    });
    instance.process_timer_action(TimerAction::DisElection {
        link: 0,
        level: LEVEL,
    });
    assert!(!link.is_dis(LEVEL));
    instance.process_timer_action(TimerAction::LspGenerate { level: LEVEL });
    assert!(uproc.get(&pn_id).unwrap().is_purged());
}

// A received copy of our own LSP that is newer than the database forces a
// sequence number bump past it.
#[test]
fn test_own_lsp_seqno_bump() {
    let instance = test_instance(1);
    let uproc = instance.update_process(LEVEL).unwrap();
    let own_id = LspId::from((SystemId::from(SELF_ID), 0, 0));

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);
    instance.process_timer_action(TimerAction::LspGenerate { level: LEVEL });
    assert_eq!(uproc.get(&own_id).unwrap().seqno(), 1);

    // A stale copy of our LSP with a higher seqno comes back from the
    // network.
    let stale = Lsp::new(
        LEVEL,
        1200,
        own_id,
        10,
        LspFlags::IS_TYPE1,
        LspTlvs::default(),
    );
    deliver(&instance, 0, nbr_snpa(1), &Pdu::Lsp(stale));
    assert_eq!(uproc.get(&own_id).unwrap().seqno(), 11);
}

// A segment we no longer originate is purged from the network when it
// comes back with remaining lifetime.
#[test]
fn test_own_lsp_unsupported_purge() {
    let instance = test_instance(1);
    let uproc = instance.update_process(LEVEL).unwrap();
    let link = instance.links.get(0).unwrap().clone();
    let stale_id = LspId::from((SystemId::from(SELF_ID), 0, 7));

    adjacency_up(&instance, 0, nbr_snpa(1), nbr_sysid(1), 64);

    let stale = Lsp::new(
        LEVEL,
        1200,
        stale_id,
        3,
        LspFlags::IS_TYPE1,
        LspTlvs::default(),
    );
    deliver(&instance, 0, nbr_snpa(1), &Pdu::Lsp(stale));

    let segment = uproc.get(&stale_id).unwrap();
    assert!(segment.is_purged());
    assert!(link.srm_set(LEVEL).contains(&stale_id));
}
