//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::LazyLock as Lazy;

use bytes::Bytes;
use const_addrs::ip4;
use oxidis::packet::consts::LspFlags;
use oxidis::packet::pdu::{
    Hello, HelloTlvs, HelloVariant, Lsp, LspTlvs, Pdu, Snp, SnpTlvs,
};
use oxidis::packet::tlv::{ExtIsReach, LspEntry, UnknownTlv};
use oxidis::packet::{
    AreaAddr, LanId, LevelNumber, LevelType, LspId, Snpa, SystemId,
};

//
// Helper functions.
//

fn test_encode_pdu(bytes_expected: &[u8], pdu: &Pdu) {
    let bytes_actual = pdu.encode();
    assert_eq!(bytes_expected, bytes_actual.as_ref());
}

fn test_decode_pdu(bytes: &[u8], pdu_expected: &Pdu) {
    let bytes = Bytes::copy_from_slice(bytes);
    let pdu_actual = Pdu::decode(bytes).unwrap();
    assert_eq!(*pdu_expected, pdu_actual);
}

//
// Test packets.
//

static HELLO1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x1b, 0x01, 0x00, 0x0f, 0x01, 0x00, 0x00, // header
            0x01, // circuit type
            0x11, 0x11, 0x11, 0x11, 0x11, 0x11, // source
            0x00, 0x1e, // holdtime
            0x00, 0x30, // PDU length
            0x40, // priority
            0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x01, // LAN ID
            0x81, 0x01, 0xcc, // Protocols Supported
            0x01, 0x02, 0x01, 0x49, // Area Addresses
            0x06, 0x06, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, // IS Neighbors
            0x84, 0x04, 0x0a, 0x00, 0x00, 0x01, // IPv4 Interface Addresses
        ],
        Pdu::Hello(Hello::new(
            LevelType::L1,
            LevelType::L1,
            SystemId::from([0x11; 6]),
            30,
            HelloVariant::Lan {
                priority: 64,
                lan_id: LanId::from([0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x01]),
            },
            HelloTlvs::new(
                [0xcc],
                [AreaAddr::from([0x49].as_slice())],
                [Snpa::from([0x22; 6])],
                [ip4!("10.0.0.1")],
                std::iter::empty(),
            ),
        )),
    )
});

static LSP1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x1b, 0x01, 0x00, 0x12, 0x01, 0x00, 0x00, // header
            0x00, 0x1b, // PDU length
            0x00, 0x00, // remaining lifetime
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // LSP ID
            0x00, 0x00, 0x00, 0x01, // sequence number
            0xfe, 0xfe, // checksum
            0x01, // flags
        ],
        Pdu::Lsp(Lsp::new(
            LevelNumber::L1,
            0,
            LspId::from([0x00; 8]),
            0x00000001,
            LspFlags::IS_TYPE1,
            LspTlvs::default(),
        )),
    )
});

static PSNP1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x11, 0x01, 0x00, 0x1a, 0x01, 0x00, 0x00, // header
            0x00, 0x23, // PDU length
            0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x00, // source
            0x09, 0x10, // LSP Entries TLV
            0x04, 0xb0, // remaining lifetime
            0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x00, 0x00, // LSP ID
            0x00, 0x00, 0x00, 0x05, // sequence number
            0xab, 0xcd, // checksum
        ],
        Pdu::Snp(Snp::new(
            LevelNumber::L1,
            LanId::from([0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x00]),
            None,
            SnpTlvs::new([LspEntry {
                rem_lifetime: 1200,
                lsp_id: LspId::from([
                    0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x00, 0x00,
                ]),
                seqno: 5,
                cksum: 0xabcd,
            }]),
        )),
    )
});

static CSNP1: Lazy<(Vec<u8>, Pdu)> = Lazy::new(|| {
    (
        vec![
            0x83, 0x21, 0x01, 0x00, 0x18, 0x01, 0x00, 0x00, // header
            0x00, 0x33, // PDU length
            0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x00, // source
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, // start LSP ID
            0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, // end LSP ID
            0x09, 0x10, // LSP Entries TLV
            0x04, 0xb0, // remaining lifetime
            0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x00, 0x00, // LSP ID
            0x00, 0x00, 0x00, 0x05, // sequence number
            0xab, 0xcd, // checksum
        ],
        Pdu::Snp(Snp::new(
            LevelNumber::L1,
            LanId::from([0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x00]),
            Some((LspId::from([0x00; 8]), LspId::from([0xff; 8]))),
            SnpTlvs::new([LspEntry {
                rem_lifetime: 1200,
                lsp_id: LspId::from([
                    0x44, 0x44, 0x44, 0x44, 0x44, 0x44, 0x00, 0x00,
                ]),
                seqno: 5,
                cksum: 0xabcd,
            }]),
        )),
    )
});

//
// Tests.
//

#[test]
fn test_encode_hello1() {
    let (bytes, pdu) = &*HELLO1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_hello1() {
    let (bytes, pdu) = &*HELLO1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_lsp1() {
    let (bytes, pdu) = &*LSP1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_lsp1() {
    let (bytes, pdu) = &*LSP1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_psnp1() {
    let (bytes, pdu) = &*PSNP1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_psnp1() {
    let (bytes, pdu) = &*PSNP1;
    test_decode_pdu(bytes, pdu);
}

#[test]
fn test_encode_csnp1() {
    let (bytes, pdu) = &*CSNP1;
    test_encode_pdu(bytes, pdu);
}

#[test]
fn test_decode_csnp1() {
    let (bytes, pdu) = &*CSNP1;
    test_decode_pdu(bytes, pdu);
}

// A full LSP must survive an encode/decode round trip unchanged.
#[test]
fn test_lsp_roundtrip() {
    let tlvs = LspTlvs::new(
        [0xcc],
        [AreaAddr::from([0x49, 0x00, 0x01].as_slice())],
        Some("rt1".to_owned()),
        Some(1492),
        [],
        [
            ExtIsReach {
                neighbor: LanId::from([0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x03]),
                metric: 10,
                sub_tlvs: vec![],
            },
            ExtIsReach {
                neighbor: LanId::from([0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x00]),
                metric: 20,
                sub_tlvs: vec![UnknownTlv::new(
                    6,
                    4,
                    Bytes::copy_from_slice(&[10, 0, 1, 1]),
                )],
            },
        ],
        [ip4!("10.0.1.1"), ip4!("10.0.2.1")],
        [],
        [],
        [],
        Some(ip4!("1.1.1.1")),
        std::iter::empty(),
        std::iter::empty(),
    );
    let lsp = Lsp::new(
        LevelNumber::L2,
        1200,
        LspId::from([0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00]),
        0x42,
        LspFlags::IS_TYPE1 | LspFlags::IS_TYPE2,
        tlvs,
    );
    assert!(lsp.is_checksum_valid());

    let pdu = Pdu::Lsp(lsp);
    let decoded = Pdu::decode(pdu.encode()).unwrap();
    assert_eq!(pdu, decoded);
}

// Unknown TLVs are preserved verbatim and ignored.
#[test]
fn test_unknown_tlv_preserved() {
    let (bytes, _) = &*PSNP1;
    let mut bytes = bytes.clone();
    bytes.extend_from_slice(&[0xfa, 0x02, 0xaa, 0xbb]);
    let pdu_len = bytes.len() as u16;
    bytes[8..10].copy_from_slice(&pdu_len.to_be_bytes());

    let pdu = Pdu::decode(Bytes::copy_from_slice(&bytes)).unwrap();
    let Pdu::Snp(snp) = pdu else {
        panic!("unexpected PDU type");
    };
    assert_eq!(
        snp.tlvs.unknown,
        vec![UnknownTlv::new(
            0xfa,
            2,
            Bytes::copy_from_slice(&[0xaa, 0xbb])
        )]
    );
}

// A corrupted LSP must fail checksum verification.
#[test]
fn test_lsp_checksum_corruption() {
    let lsp = Lsp::new(
        LevelNumber::L1,
        1200,
        LspId::from([0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00]),
        1,
        LspFlags::IS_TYPE1,
        LspTlvs::new(
            [0xcc],
            [],
            Some("rt1".to_owned()),
            None,
            [],
            [],
            [ip4!("10.0.0.1")],
            [],
            [],
            [],
            None,
            std::iter::empty(),
            std::iter::empty(),
        ),
    );
    assert!(lsp.is_checksum_valid());

    // Flipping the low bit of any octet after the LSP ID flips the verdict.
    for i in 12..lsp.raw.len() {
        let mut corrupt = lsp.clone();
        let mut raw = corrupt.raw.to_vec();
        raw[i] ^= 0x01;
        corrupt.raw = Bytes::from(raw.clone());
        corrupt.cksum = u16::from_be_bytes([raw[24], raw[25]]);
        if corrupt.cksum == 0 {
            continue;
        }
        assert!(
            !corrupt.is_checksum_valid(),
            "corruption at octet {i} went undetected"
        );
    }
}

// Hello padding must fill the PDU up to the requested size.
#[test]
fn test_hello_padding() {
    let (_, pdu) = &*HELLO1;
    let Pdu::Hello(hello) = pdu else {
        panic!("unexpected PDU type");
    };
    let mut hello = hello.clone();
    hello.add_padding(1497);
    let bytes = Pdu::Hello(hello).encode();
    assert_eq!(bytes.len(), 1497);

    // And the padded PDU must still decode.
    Pdu::decode(bytes).unwrap();
}

// TLV emission rolls over to a fresh TLV of the same type once the
// 255-octet value limit is reached.
#[test]
fn test_tlv_rollover() {
    let neighbors =
        (0..64u8).map(|i| ExtIsReach {
            neighbor: LanId::from([0x22, 0x22, 0x22, 0x22, 0x22, i, 0x00]),
            metric: 10,
            sub_tlvs: vec![],
        });
    let tlvs = LspTlvs::new(
        [0xcc],
        [],
        None,
        None,
        [],
        neighbors,
        [],
        [],
        [],
        [],
        None,
        std::iter::empty(),
        std::iter::empty(),
    );

    // 11 octets per entry, at most 23 entries per TLV.
    assert_eq!(tlvs.ext_is_reach.len(), 3);
    assert!(
        tlvs.ext_is_reach
            .iter()
            .all(|tlv| tlv.list.len() * 11 <= 255)
    );
    assert_eq!(tlvs.ext_is_reach().count(), 64);

    // All entries must survive a round trip through an LSP.
    let lsp = Lsp::new(
        LevelNumber::L1,
        1200,
        LspId::from([0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x00, 0x00]),
        1,
        LspFlags::IS_TYPE1,
        tlvs,
    );
    let decoded = Pdu::decode(lsp.raw.clone()).unwrap();
    let Pdu::Lsp(decoded) = decoded else {
        panic!("unexpected PDU type");
    };
    assert_eq!(decoded.tlvs.ext_is_reach().count(), 64);
}

// LSP ID increment, used to derive CSNP range boundaries.
#[test]
fn test_lsp_id_increment() {
    assert_eq!(
        LspId::from([0x00; 8]).increment(),
        LspId::from([0, 0, 0, 0, 0, 0, 0, 1])
    );
    assert_eq!(
        LspId::from([0, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]).increment(),
        LspId::from([0, 0, 0, 1, 0, 0, 0, 0])
    );
    assert_eq!(LspId::from([0xff; 8]).increment(), LspId::from([0x00; 8]));
}

// SNP entry packing: at most 15 entries per 255-octet TLV.
#[test]
fn test_snp_entry_packing() {
    assert_eq!(SnpTlvs::max_lsp_entries(242), 15);
    assert_eq!(SnpTlvs::max_lsp_entries(241), 14);
    assert_eq!(SnpTlvs::max_lsp_entries(2 * 242), 30);

    let entries = (0..20u8).map(|i| LspEntry {
        rem_lifetime: 1200,
        lsp_id: LspId::from([0x22, 0x22, 0x22, 0x22, 0x22, i, 0x00, 0x00]),
        seqno: 1,
        cksum: 0x1234,
    });
    let tlvs = SnpTlvs::new(entries);
    assert_eq!(tlvs.lsp_entries.len(), 2);
    assert_eq!(tlvs.lsp_entries[0].list.len(), 15);
    assert_eq!(tlvs.lsp_entries[1].list.len(), 5);
}
