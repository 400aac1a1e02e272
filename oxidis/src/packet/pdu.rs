//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::{RefCell, RefMut};
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Instant;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::FromPrimitive;
use oxidis_utils::bytes::TLS_BUF;
use serde::{Deserialize, Serialize};
use tracing::debug_span;

use crate::packet::consts::{
    IDRP_DISCRIMINATOR, LspFlags, PduType, SYSTEM_ID_LEN, TlvType, VERSION,
    VERSION_PROTO_EXT,
};
use crate::packet::error::{DecodeError, DecodeResult};
use crate::packet::cksum;
use crate::packet::tlv::{
    AreaAddressesTlv, DynamicHostnameTlv, ExtIpv4Reach,
    ExtIpv4ReachTlv, ExtIsReach, ExtIsReachTlv, Ipv4AddressesTlv, Ipv4Reach,
    Ipv4ReachTlv, Ipv4RouterIdTlv, Ipv6AddressesTlv, Ipv6Reach, Ipv6ReachTlv,
    IsReach, IsReachTlv, LspBufferSizeTlv, LspEntriesTlv, LspEntry,
    NeighborsTlv, PaddingTlv, ProtocolsSupportedTlv, TLV_HDR_SIZE,
    TLV_MAX_LEN, Tlv, UnknownTlv, tlv_entries_split, tlv_take_max,
};
use crate::packet::{
    AreaAddr, LanId, LevelNumber, LevelType, LspId, Snpa, SystemId,
};

// IS-IS PDU.
#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum Pdu {
    Hello(Hello),
    Lsp(Lsp),
    Snp(Snp),
}

// IS-IS PDU common header.
#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Header {
    pub pdu_type: PduType,
    pub max_area_addrs: u8,
}

// IS-IS Hello PDU.
#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Hello {
    pub hdr: Header,
    pub circuit_type: LevelType,
    pub source: SystemId,
    pub holdtime: u16,
    pub variant: HelloVariant,
    pub tlvs: HelloTlvs,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum HelloVariant {
    Lan { priority: u8, lan_id: LanId },
    P2P { local_circuit_id: u8 },
}

#[derive(Clone, Debug, Default, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct HelloTlvs {
    pub protocols_supported: Option<ProtocolsSupportedTlv>,
    pub area_addrs: Vec<AreaAddressesTlv>,
    pub neighbors: Vec<NeighborsTlv>,
    pub ipv4_addrs: Vec<Ipv4AddressesTlv>,
    pub ipv6_addrs: Vec<Ipv6AddressesTlv>,
    pub padding: Vec<PaddingTlv>,
    pub unknown: Vec<UnknownTlv>,
}

// IS-IS Link State PDU.
#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Lsp {
    pub hdr: Header,
    pub rem_lifetime: u16,
    pub lsp_id: LspId,
    pub seqno: u32,
    pub cksum: u16,
    pub flags: LspFlags,
    pub tlvs: LspTlvs,
    #[serde(skip)]
    pub raw: Bytes,
    // Time the LSP was created or received. When combined with the Remaining
    // Lifetime field, the actual LSP remaining lifetime can be determined.
    #[serde(skip)]
    pub base_time: Option<Instant>,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LspTlvs {
    pub protocols_supported: Option<ProtocolsSupportedTlv>,
    pub area_addrs: Vec<AreaAddressesTlv>,
    pub hostname: Option<DynamicHostnameTlv>,
    pub lsp_buf_size: Option<LspBufferSizeTlv>,
    pub is_reach: Vec<IsReachTlv>,
    pub ext_is_reach: Vec<ExtIsReachTlv>,
    pub ipv4_addrs: Vec<Ipv4AddressesTlv>,
    pub ipv4_internal_reach: Vec<Ipv4ReachTlv>,
    pub ipv4_external_reach: Vec<Ipv4ReachTlv>,
    pub ext_ipv4_reach: Vec<ExtIpv4ReachTlv>,
    pub ipv4_router_id: Option<Ipv4RouterIdTlv>,
    pub ipv6_addrs: Vec<Ipv6AddressesTlv>,
    pub ipv6_reach: Vec<Ipv6ReachTlv>,
    pub unknown: Vec<UnknownTlv>,
}

// IS-IS Sequence Numbers PDU.
#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Snp {
    pub hdr: Header,
    pub source: LanId,
    pub summary: Option<(LspId, LspId)>,
    pub tlvs: SnpTlvs,
}

#[derive(Clone, Debug, Default, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct SnpTlvs {
    pub lsp_entries: Vec<LspEntriesTlv>,
    pub unknown: Vec<UnknownTlv>,
}

// ===== impl Pdu =====

impl Pdu {
    // Decodes IS-IS PDU from a bytes buffer.
    pub fn decode(mut buf: Bytes) -> DecodeResult<Self> {
        let buf_orig = buf.clone();

        // Decode PDU common header.
        let hdr = Header::decode(&mut buf)?;

        // Decode PDU-specific fields.
        let pdu = match hdr.pdu_type {
            PduType::HelloLanL1 | PduType::HelloLanL2 | PduType::HelloP2P => {
                Pdu::Hello(Hello::decode(hdr, &mut buf, &buf_orig)?)
            }
            PduType::LspL1 | PduType::LspL2 => {
                Pdu::Lsp(Lsp::decode(hdr, &mut buf, &buf_orig)?)
            }
            PduType::CsnpL1
            | PduType::CsnpL2
            | PduType::PsnpL1
            | PduType::PsnpL2 => {
                Pdu::Snp(Snp::decode(hdr, &mut buf, &buf_orig)?)
            }
        };

        Ok(pdu)
    }

    // Encodes IS-IS PDU into a bytes buffer.
    pub fn encode(&self) -> Bytes {
        match self {
            Pdu::Hello(pdu) => pdu.encode(),
            Pdu::Lsp(pdu) => pdu.raw.clone(),
            Pdu::Snp(pdu) => pdu.encode(),
        }
    }

    // Returns the IS-IS PDU type.
    pub const fn pdu_type(&self) -> PduType {
        match self {
            Pdu::Hello(pdu) => pdu.hdr.pdu_type,
            Pdu::Lsp(pdu) => pdu.hdr.pdu_type,
            Pdu::Snp(pdu) => pdu.hdr.pdu_type,
        }
    }

    // Extracts the PDU length field from a raw buffer, without decoding the
    // full PDU. Used to discard the padding of short ethernet frames before
    // decoding.
    pub fn raw_pdu_len(buf: &[u8]) -> Option<usize> {
        let pdu_type = *buf.get(4)?;
        let pdu_type = PduType::from_u8(pdu_type)?;
        let offset = match pdu_type {
            PduType::HelloLanL1 | PduType::HelloLanL2 | PduType::HelloP2P => {
                17
            }
            PduType::LspL1
            | PduType::LspL2
            | PduType::CsnpL1
            | PduType::CsnpL2
            | PduType::PsnpL1
            | PduType::PsnpL2 => 8,
        };
        let len = buf.get(offset..offset + 2)?;
        Some(u16::from_be_bytes([len[0], len[1]]) as usize)
    }
}

// ===== impl Header =====

impl Header {
    pub const LEN: u8 = 8;

    pub const fn new(pdu_type: PduType, max_area_addrs: u8) -> Self {
        Header {
            pdu_type,
            max_area_addrs,
        }
    }

    // Decodes IS-IS PDU header from a bytes buffer.
    pub fn decode(buf: &mut Bytes) -> DecodeResult<Self> {
        let packet_len = buf.len();

        // Ensure the packet has enough data for the fixed-length IS-IS header.
        if packet_len < Self::LEN as _ {
            return Err(DecodeError::IncompletePdu);
        }

        // Parse IDRP discriminator.
        let idrp_discr = buf.try_get_u8()?;
        if idrp_discr != IDRP_DISCRIMINATOR {
            return Err(DecodeError::InvalidIrdpDiscriminator(idrp_discr));
        }

        // Parse length of fixed header.
        let fixed_header_length = buf.try_get_u8()?;

        // Parse version/protocol ID extension.
        let version_proto_ext = buf.try_get_u8()?;
        if version_proto_ext != VERSION_PROTO_EXT {
            return Err(DecodeError::InvalidVersion(version_proto_ext));
        }

        // Parse ID length.
        let id_len = buf.try_get_u8()?;
        if id_len != 0 && id_len != SYSTEM_ID_LEN {
            return Err(DecodeError::InvalidIdLength(id_len));
        }

        // Parse PDU type.
        let pdu_type = buf.try_get_u8()?;
        let pdu_type = match PduType::from_u8(pdu_type) {
            Some(pdu_type) => pdu_type,
            None => return Err(DecodeError::UnknownPduType(pdu_type)),
        };

        // Additional sanity checks.
        if fixed_header_length != Self::fixed_header_length(pdu_type) {
            return Err(DecodeError::InvalidHeaderLength(fixed_header_length));
        }
        if packet_len < fixed_header_length as _ {
            return Err(DecodeError::IncompletePdu);
        }

        // Parse version.
        let version = buf.try_get_u8()?;
        if version != VERSION {
            return Err(DecodeError::InvalidVersion(version));
        }

        // Parse reserved field.
        let _reserved = buf.try_get_u8()?;

        // Parse maximum area addresses.
        let max_area_addrs = buf.try_get_u8()?;

        Ok(Header {
            pdu_type,
            max_area_addrs,
        })
    }

    // Encodes IS-IS PDU header into a bytes buffer.
    fn encode(&self, buf: &mut BytesMut) {
        // Encode IDRP discriminator.
        buf.put_u8(IDRP_DISCRIMINATOR);
        // Encode length of fixed header.
        buf.put_u8(Self::fixed_header_length(self.pdu_type));
        // Encode version/protocol ID extension.
        buf.put_u8(VERSION_PROTO_EXT);
        // Encode ID length (use default value).
        buf.put_u8(0);
        // Encode PDU type.
        buf.put_u8(self.pdu_type as u8);
        // Encode version.
        buf.put_u8(VERSION);
        // Encode reserved field.
        buf.put_u8(0);
        // Encode maximum area addresses.
        buf.put_u8(self.max_area_addrs);
    }

    // Returns the length of the fixed header for a given PDU type.
    const fn fixed_header_length(pdu_type: PduType) -> u8 {
        match pdu_type {
            PduType::HelloLanL1 | PduType::HelloLanL2 => Hello::HEADER_LEN_LAN,
            PduType::HelloP2P => Hello::HEADER_LEN_P2P,
            PduType::LspL1 | PduType::LspL2 => Lsp::HEADER_LEN,
            PduType::CsnpL1 | PduType::CsnpL2 => Snp::CSNP_HEADER_LEN,
            PduType::PsnpL1 | PduType::PsnpL2 => Snp::PSNP_HEADER_LEN,
        }
    }
}

// ===== impl Hello =====

impl Hello {
    const HEADER_LEN_LAN: u8 = 27;
    const HEADER_LEN_P2P: u8 = 20;
    const CIRCUIT_TYPE_MASK: u8 = 0x03;
    const PRIORITY_MASK: u8 = 0x7F;

    pub fn new(
        level_type: LevelType,
        circuit_type: LevelType,
        source: SystemId,
        holdtime: u16,
        variant: HelloVariant,
        tlvs: HelloTlvs,
    ) -> Self {
        let pdu_type = match level_type {
            LevelType::L1 => PduType::HelloLanL1,
            LevelType::L2 => PduType::HelloLanL2,
            LevelType::All => PduType::HelloP2P,
        };
        Hello {
            hdr: Header::new(pdu_type, 0),
            circuit_type,
            source,
            holdtime,
            variant,
            tlvs,
        }
    }

    fn decode(
        hdr: Header,
        buf: &mut Bytes,
        buf_orig: &Bytes,
    ) -> DecodeResult<Self> {
        // Parse circuit type.
        let circuit_type = buf.try_get_u8()? & Self::CIRCUIT_TYPE_MASK;
        let circuit_type = match circuit_type {
            1 if hdr.pdu_type != PduType::HelloLanL2 => LevelType::L1,
            2 if hdr.pdu_type != PduType::HelloLanL1 => LevelType::L2,
            3 => LevelType::All,
            _ => {
                return Err(DecodeError::InvalidHelloCircuitType(circuit_type));
            }
        };

        // Parse source ID.
        let source = SystemId::decode(buf)?;

        // Parse holding time.
        let holdtime = buf.try_get_u16()?;
        if holdtime == 0 {
            return Err(DecodeError::InvalidHelloHoldtime(holdtime));
        }

        // Parse PDU length.
        let pdu_len = buf.try_get_u16()?;
        if pdu_len != buf_orig.len() as u16 {
            return Err(DecodeError::InvalidPduLength(pdu_len));
        }

        // Parse custom fields.
        let variant = if hdr.pdu_type == PduType::HelloP2P {
            // Parse local circuit ID.
            let local_circuit_id = buf.try_get_u8()?;

            HelloVariant::P2P { local_circuit_id }
        } else {
            // Parse priority.
            let priority = buf.try_get_u8()? & Self::PRIORITY_MASK;
            // Parse LAN ID.
            let lan_id = LanId::decode(buf)?;

            HelloVariant::Lan { priority, lan_id }
        };

        // Parse top-level TLVs.
        let span = debug_span!("Hello", source = %source);
        let _span_guard = span.enter();
        let mut tlvs = HelloTlvs::default();
        while buf.remaining() >= TLV_HDR_SIZE {
            // Parse TLV type.
            let tlv_type = buf.try_get_u8()?;
            let tlv_etype = TlvType::from_u8(tlv_type);

            // Parse and validate TLV length.
            let tlv_len = buf.try_get_u8()?;
            if tlv_len as usize > buf.remaining() {
                return Err(DecodeError::InvalidTlvLength(tlv_len));
            }

            // Parse TLV value.
            let span = debug_span!("TLV", r#type = tlv_type, length = tlv_len);
            let _span_guard = span.enter();
            let mut buf_tlv = buf.copy_to_bytes(tlv_len as usize);
            match tlv_etype {
                Some(TlvType::AreaAddresses) => {
                    match AreaAddressesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.area_addrs.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Neighbors)
                    if hdr.pdu_type != PduType::HelloP2P =>
                {
                    match NeighborsTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.neighbors.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Padding) => {
                    match PaddingTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.padding.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Authentication) => {
                    // Authentication is not processed; skip the TLV body.
                    continue;
                }
                Some(TlvType::ProtocolsSupported) => {
                    if tlvs.protocols_supported.is_some() {
                        continue;
                    }
                    match ProtocolsSupportedTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.protocols_supported = Some(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv4Addresses) => {
                    match Ipv4AddressesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv4_addrs.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv6Addresses) => {
                    match Ipv6AddressesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv6_addrs.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                _ => {
                    // Save unknown top-level TLV.
                    tlvs.unknown
                        .push(UnknownTlv::new(tlv_type, tlv_len, buf_tlv));
                }
            }
        }

        Ok(Hello {
            hdr,
            circuit_type,
            source,
            holdtime,
            variant,
            tlvs,
        })
    }

    fn encode(&self) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = pdu_encode_start(buf, &self.hdr);

            let circuit_type = match self.circuit_type {
                LevelType::L1 => 1,
                LevelType::L2 => 2,
                LevelType::All => 3,
            };
            buf.put_u8(circuit_type);
            self.source.encode(&mut buf);
            buf.put_u16(self.holdtime);

            // The PDU length will be initialized later.
            let len_pos = buf.len();
            buf.put_u16(0);

            match self.variant {
                HelloVariant::Lan { priority, lan_id } => {
                    buf.put_u8(priority);
                    lan_id.encode(&mut buf);
                }
                HelloVariant::P2P { local_circuit_id } => {
                    buf.put_u8(local_circuit_id);
                }
            }

            // Encode TLVs.
            if let Some(tlv) = &self.tlvs.protocols_supported {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.area_addrs {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.neighbors {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ipv4_addrs {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ipv6_addrs {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.padding {
                tlv.encode(&mut buf);
            }

            pdu_encode_end(buf, len_pos, None)
        })
    }

    // Appends as many Padding TLVs as necessary so that the encoded PDU
    // reaches `max_size` octets.
    pub fn add_padding(&mut self, max_size: u16) {
        // Compute the total length of existing TLVs.
        let mut total_tlv_len = 0;
        if let Some(tlv) = &self.tlvs.protocols_supported {
            total_tlv_len += Tlv::len(tlv);
        }
        for tlv in &self.tlvs.area_addrs {
            total_tlv_len += Tlv::len(tlv);
        }
        for tlv in &self.tlvs.neighbors {
            total_tlv_len += Tlv::len(tlv);
        }
        for tlv in &self.tlvs.ipv4_addrs {
            total_tlv_len += Tlv::len(tlv);
        }
        for tlv in &self.tlvs.ipv6_addrs {
            total_tlv_len += Tlv::len(tlv);
        }

        // Calculate the total padding required.
        let mut rem_padding = max_size as usize
            - Header::fixed_header_length(self.hdr.pdu_type) as usize
            - total_tlv_len;

        // Add as many Padding TLVs as necessary.
        while rem_padding >= 2 {
            let padding_len =
                std::cmp::min(rem_padding - TLV_HDR_SIZE, TLV_MAX_LEN);
            self.tlvs.padding.push(PaddingTlv {
                length: padding_len as u8,
            });
            rem_padding -= TLV_HDR_SIZE + padding_len;
        }
    }
}

impl HelloTlvs {
    pub fn new(
        protocols_supported: impl IntoIterator<Item = u8>,
        area_addrs: impl IntoIterator<Item = AreaAddr>,
        neighbors: impl IntoIterator<Item = Snpa>,
        ipv4_addrs: impl IntoIterator<Item = Ipv4Addr>,
        ipv6_addrs: impl IntoIterator<Item = Ipv6Addr>,
    ) -> Self {
        HelloTlvs {
            protocols_supported: Some(ProtocolsSupportedTlv::from(
                protocols_supported,
            )),
            area_addrs: tlv_entries_split(area_addrs),
            neighbors: tlv_entries_split(neighbors),
            ipv4_addrs: tlv_entries_split(ipv4_addrs),
            ipv6_addrs: tlv_entries_split(ipv6_addrs),
            padding: Default::default(),
            unknown: Default::default(),
        }
    }

    // Returns an iterator over all area addresses from TLVs of type 1.
    pub fn area_addrs(&self) -> impl Iterator<Item = &AreaAddr> {
        self.area_addrs.iter().flat_map(|tlv| tlv.list.iter())
    }

    // Returns an iterator over all IS neighbors from TLVs of type 6.
    pub fn neighbors(&self) -> impl Iterator<Item = &Snpa> {
        self.neighbors.iter().flat_map(|tlv| tlv.list.iter())
    }

    // Returns an iterator over all IPv4 addresses from TLVs of type 132.
    pub fn ipv4_addrs(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.ipv4_addrs.iter().flat_map(|tlv| tlv.list.iter())
    }
}

// ===== impl Lsp =====

impl Lsp {
    pub const HEADER_LEN: u8 = 27;
    const PDU_LEN_RANGE: std::ops::Range<usize> = 8..10;
    const REM_LIFETIME_RANGE: std::ops::Range<usize> = 10..12;
    const CKSUM_RANGE: std::ops::Range<usize> = 24..26;
    // Offset of the LSP ID field, where checksum computation starts.
    const CKSUM_START: usize = 12;
    // Offset of the checksum octets relative to the LSP ID field.
    const CKSUM_SKIP: usize = 12;

    pub fn new(
        level: LevelNumber,
        rem_lifetime: u16,
        lsp_id: LspId,
        seqno: u32,
        flags: LspFlags,
        tlvs: LspTlvs,
    ) -> Self {
        let pdu_type = match level {
            LevelNumber::L1 => PduType::LspL1,
            LevelNumber::L2 => PduType::LspL2,
        };
        let mut lsp = Lsp {
            hdr: Header::new(pdu_type, 0),
            rem_lifetime,
            lsp_id,
            seqno,
            cksum: 0,
            flags,
            tlvs,
            raw: Default::default(),
            base_time: lsp_base_time(),
        };
        lsp.encode();
        lsp
    }

    fn decode(
        hdr: Header,
        buf: &mut Bytes,
        buf_orig: &Bytes,
    ) -> DecodeResult<Self> {
        // Parse PDU length.
        let pdu_len = buf.try_get_u16()?;
        if pdu_len != buf_orig.len() as u16 {
            return Err(DecodeError::InvalidPduLength(pdu_len));
        }

        // Parse remaining lifetime.
        let rem_lifetime = buf.try_get_u16()?;

        // Parse LSP ID.
        let lsp_id = LspId::decode(buf)?;

        // Parse sequence number.
        let seqno = buf.try_get_u32()?;

        // Parse checksum.
        let cksum = buf.try_get_u16()?;

        // Parse flags.
        let flags = buf.try_get_u8()?;
        let flags = LspFlags::from_bits_truncate(flags);

        // Parse top-level TLVs.
        let span = debug_span!("LSP", lsp_id = %lsp_id, seqno);
        let _span_guard = span.enter();
        let mut tlvs = LspTlvs::default();
        while buf.remaining() >= TLV_HDR_SIZE {
            // Parse TLV type.
            let tlv_type = buf.try_get_u8()?;
            let tlv_etype = TlvType::from_u8(tlv_type);

            // Parse and validate TLV length.
            let tlv_len = buf.try_get_u8()?;
            if tlv_len as usize > buf.remaining() {
                return Err(DecodeError::InvalidTlvLength(tlv_len));
            }

            // Parse TLV value.
            let span = debug_span!("TLV", r#type = tlv_type, length = tlv_len);
            let _span_guard = span.enter();
            let mut buf_tlv = buf.copy_to_bytes(tlv_len as usize);
            match tlv_etype {
                Some(TlvType::AreaAddresses) => {
                    match AreaAddressesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.area_addrs.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Authentication) => {
                    // Authentication is not processed; skip the TLV body.
                    continue;
                }
                Some(TlvType::DynamicHostname) => {
                    match DynamicHostnameTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.hostname = Some(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::LspBufferSize) => {
                    match LspBufferSizeTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.lsp_buf_size = Some(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::IsReach) => {
                    match IsReachTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.is_reach.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::ExtIsReach) => {
                    match ExtIsReachTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ext_is_reach.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv4InternalReach) => {
                    match Ipv4ReachTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv4_internal_reach.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::ProtocolsSupported) => {
                    if tlvs.protocols_supported.is_some() {
                        continue;
                    }
                    match ProtocolsSupportedTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.protocols_supported = Some(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv4ExternalReach) => {
                    match Ipv4ReachTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv4_external_reach.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv4Addresses) => {
                    match Ipv4AddressesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv4_addrs.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::ExtIpv4Reach) => {
                    match ExtIpv4ReachTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ext_ipv4_reach.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv4RouterId) => {
                    if tlvs.ipv4_router_id.is_some() {
                        continue;
                    }
                    match Ipv4RouterIdTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv4_router_id = Some(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv6Addresses) => {
                    match Ipv6AddressesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv6_addrs.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                Some(TlvType::Ipv6Reach) => {
                    match Ipv6ReachTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.ipv6_reach.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                _ => {
                    // Save unknown top-level TLV.
                    tlvs.unknown
                        .push(UnknownTlv::new(tlv_type, tlv_len, buf_tlv));
                }
            }
        }

        Ok(Lsp {
            hdr,
            rem_lifetime,
            lsp_id,
            seqno,
            cksum,
            flags,
            tlvs,
            raw: buf_orig.clone(),
            base_time: lsp_base_time(),
        })
    }

    pub(crate) fn encode(&mut self) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = pdu_encode_start(buf, &self.hdr);

            // The PDU length will be initialized later.
            let len_pos = buf.len();
            buf.put_u16(0);
            buf.put_u16(self.rem_lifetime);
            self.lsp_id.encode(&mut buf);
            buf.put_u32(self.seqno);
            // The checksum will be initialized later.
            buf.put_u16(0);
            buf.put_u8(self.flags.bits());

            // Encode TLVs.
            if let Some(tlv) = &self.tlvs.protocols_supported {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.area_addrs {
                tlv.encode(&mut buf);
            }
            if let Some(tlv) = &self.tlvs.hostname {
                tlv.encode(&mut buf);
            }
            if let Some(tlv) = &self.tlvs.lsp_buf_size {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.is_reach {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ext_is_reach {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ipv4_addrs {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ipv4_internal_reach {
                tlv.encode(TlvType::Ipv4InternalReach, &mut buf);
            }
            for tlv in &self.tlvs.ipv4_external_reach {
                tlv.encode(TlvType::Ipv4ExternalReach, &mut buf);
            }
            for tlv in &self.tlvs.ext_ipv4_reach {
                tlv.encode(&mut buf);
            }
            if let Some(tlv) = &self.tlvs.ipv4_router_id {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ipv6_addrs {
                tlv.encode(&mut buf);
            }
            for tlv in &self.tlvs.ipv6_reach {
                tlv.encode(&mut buf);
            }

            // Store LSP raw data.
            let bytes = pdu_encode_end(buf, len_pos, Some(self));
            self.raw = bytes.clone();
            bytes
        })
    }

    // Checks if the LSP checksum is valid.
    pub fn is_checksum_valid(&self) -> bool {
        // RFC 3719 - Section 7:
        // "An implementation SHOULD treat all LSPs with a zero checksum and a
        // non-zero remaining lifetime as if they had as checksum error".
        if self.cksum == 0 {
            return self.rem_lifetime == 0;
        }

        // Skip everything before (and including) the Remaining Lifetime field.
        cksum::checksum_is_valid(&self.raw[Self::CKSUM_START..])
    }

    // Returns whether the LSP has expired (i.e., its remaining lifetime has
    // reached zero).
    pub fn is_expired(&self) -> bool {
        self.rem_lifetime == 0
    }

    // Returns the current LSP remaining lifetime.
    //
    // This value is computed by subtracting the elapsed time since the LSP was
    // received or originated from its initial lifetime.
    pub fn rem_lifetime(&self) -> u16 {
        let mut rem_lifetime = self.rem_lifetime;

        if let Some(base_time) = self.base_time {
            let elapsed = u16::try_from(base_time.elapsed().as_secs())
                .unwrap_or(u16::MAX);
            rem_lifetime = rem_lifetime.saturating_sub(elapsed);
        }

        rem_lifetime
    }

    // Updates the LSP remaining lifetime.
    pub(crate) fn set_rem_lifetime(&mut self, rem_lifetime: u16) {
        // Update Remaining Lifetime field.
        self.rem_lifetime = rem_lifetime;

        // Update raw data.
        let mut raw = BytesMut::from(self.raw.as_ref());
        raw[Self::REM_LIFETIME_RANGE]
            .copy_from_slice(&rem_lifetime.to_be_bytes());
        self.raw = raw.freeze();

        // Update base time.
        self.base_time = lsp_base_time();
    }

    // Turns the LSP into a purge: the remaining lifetime and checksum are
    // zeroed and the body is truncated down to the LSP header.
    pub(crate) fn purge(&mut self) {
        self.rem_lifetime = 0;
        self.cksum = 0;
        self.tlvs = Default::default();

        let mut raw = BytesMut::from(&self.raw[..Self::HEADER_LEN as usize]);
        raw[Self::PDU_LEN_RANGE]
            .copy_from_slice(&(Self::HEADER_LEN as u16).to_be_bytes());
        raw[Self::REM_LIFETIME_RANGE].copy_from_slice(&[0, 0]);
        raw[Self::CKSUM_RANGE].copy_from_slice(&[0, 0]);
        self.raw = raw.freeze();

        self.base_time = lsp_base_time();
    }

    // Converts the LSP into an LSP Entry for use in an SNP.
    pub fn as_snp_entry(&self) -> LspEntry {
        LspEntry {
            rem_lifetime: self.rem_lifetime,
            lsp_id: self.lsp_id,
            seqno: self.seqno,
            cksum: self.cksum,
        }
    }
}

impl LspTlvs {
    pub fn new(
        protocols_supported: impl IntoIterator<Item = u8>,
        area_addrs: impl IntoIterator<Item = AreaAddr>,
        hostname: Option<String>,
        lsp_buf_size: Option<u16>,
        is_reach: impl IntoIterator<Item = IsReach>,
        ext_is_reach: impl IntoIterator<Item = ExtIsReach>,
        ipv4_addrs: impl IntoIterator<Item = Ipv4Addr>,
        ipv4_internal_reach: impl IntoIterator<Item = Ipv4Reach>,
        ipv4_external_reach: impl IntoIterator<Item = Ipv4Reach>,
        ext_ipv4_reach: impl IntoIterator<Item = ExtIpv4Reach>,
        ipv4_router_id: Option<Ipv4Addr>,
        ipv6_addrs: impl IntoIterator<Item = Ipv6Addr>,
        ipv6_reach: impl IntoIterator<Item = Ipv6Reach>,
    ) -> Self {
        let protocols_supported =
            protocols_supported.into_iter().collect::<Vec<_>>();
        LspTlvs {
            protocols_supported: (!protocols_supported.is_empty())
                .then_some(ProtocolsSupportedTlv::from(protocols_supported)),
            area_addrs: tlv_entries_split(area_addrs),
            hostname: hostname.map(|hostname| DynamicHostnameTlv { hostname }),
            lsp_buf_size: lsp_buf_size.map(|size| LspBufferSizeTlv { size }),
            is_reach: tlv_entries_split(is_reach),
            ext_is_reach: tlv_entries_split(ext_is_reach),
            ipv4_addrs: tlv_entries_split(ipv4_addrs),
            ipv4_internal_reach: tlv_entries_split(ipv4_internal_reach),
            ipv4_external_reach: tlv_entries_split(ipv4_external_reach),
            ext_ipv4_reach: tlv_entries_split(ext_ipv4_reach),
            ipv4_router_id: ipv4_router_id.map(Ipv4RouterIdTlv::new),
            ipv6_addrs: tlv_entries_split(ipv6_addrs),
            ipv6_reach: tlv_entries_split(ipv6_reach),
            unknown: Default::default(),
        }
    }

    // Takes as much TLV content as fits within `max_len` octets, leaving the
    // remainder behind. Returns `None` once no content is left, so that the
    // caller can transparently segment a large body across multiple LSP
    // fragments.
    pub(crate) fn next_chunk(&mut self, max_len: usize) -> Option<Self> {
        let mut rem_len = max_len;
        let protocols_supported = self.protocols_supported.take();
        if let Some(protocols_supported) = &protocols_supported {
            rem_len -= protocols_supported.len();
        }
        let area_addrs = tlv_take_max(&mut self.area_addrs, &mut rem_len);
        let hostname = self.hostname.take();
        if let Some(hostname) = &hostname {
            rem_len -= hostname.len();
        }
        let lsp_buf_size = self.lsp_buf_size.take();
        if let Some(lsp_buf_size) = &lsp_buf_size {
            rem_len -= lsp_buf_size.len();
        }
        let ipv4_router_id = self.ipv4_router_id.take();
        if let Some(ipv4_router_id) = &ipv4_router_id {
            rem_len -= ipv4_router_id.len();
        }
        let is_reach = tlv_take_max(&mut self.is_reach, &mut rem_len);
        let ext_is_reach = tlv_take_max(&mut self.ext_is_reach, &mut rem_len);
        let ipv4_addrs = tlv_take_max(&mut self.ipv4_addrs, &mut rem_len);
        let ipv4_internal_reach =
            tlv_take_max(&mut self.ipv4_internal_reach, &mut rem_len);
        let ipv4_external_reach =
            tlv_take_max(&mut self.ipv4_external_reach, &mut rem_len);
        let ext_ipv4_reach =
            tlv_take_max(&mut self.ext_ipv4_reach, &mut rem_len);
        let ipv6_addrs = tlv_take_max(&mut self.ipv6_addrs, &mut rem_len);
        let ipv6_reach = tlv_take_max(&mut self.ipv6_reach, &mut rem_len);
        if rem_len == max_len {
            return None;
        }

        Some(LspTlvs {
            protocols_supported,
            area_addrs,
            hostname,
            lsp_buf_size,
            is_reach,
            ext_is_reach,
            ipv4_addrs,
            ipv4_internal_reach,
            ipv4_external_reach,
            ext_ipv4_reach,
            ipv4_router_id,
            ipv6_addrs,
            ipv6_reach,
            unknown: Default::default(),
        })
    }

    // Returns an iterator over all area addresses from TLVs of type 1.
    pub fn area_addrs(&self) -> impl Iterator<Item = &AreaAddr> {
        self.area_addrs.iter().flat_map(|tlv| tlv.list.iter())
    }

    // Returns the dynamic hostname (TLV type 137).
    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_ref().map(|tlv| tlv.hostname.as_str())
    }

    // Returns the maximum sized LSP which may be generated (TLV type 14).
    pub fn lsp_buf_size(&self) -> Option<u16> {
        self.lsp_buf_size.as_ref().map(|tlv| tlv.size)
    }

    // Returns an iterator over all IS neighbors from TLVs of type 22.
    pub fn ext_is_reach(&self) -> impl Iterator<Item = &ExtIsReach> {
        self.ext_is_reach.iter().flat_map(|tlv| tlv.list.iter())
    }

    // Returns an iterator over all IPv4 addresses from TLVs of type 132.
    pub fn ipv4_addrs(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.ipv4_addrs.iter().flat_map(|tlv| tlv.list.iter())
    }
}

// ===== impl Snp =====

impl Snp {
    pub const CSNP_HEADER_LEN: u8 = 33;
    pub const PSNP_HEADER_LEN: u8 = 17;

    pub fn new(
        level: LevelNumber,
        source: LanId,
        summary: Option<(LspId, LspId)>,
        tlvs: SnpTlvs,
    ) -> Self {
        let pdu_type = match (summary.is_some(), level) {
            (false, LevelNumber::L1) => PduType::PsnpL1,
            (false, LevelNumber::L2) => PduType::PsnpL2,
            (true, LevelNumber::L1) => PduType::CsnpL1,
            (true, LevelNumber::L2) => PduType::CsnpL2,
        };
        Snp {
            hdr: Header::new(pdu_type, 0),
            source,
            summary,
            tlvs,
        }
    }

    fn decode(
        hdr: Header,
        buf: &mut Bytes,
        buf_orig: &Bytes,
    ) -> DecodeResult<Self> {
        // Parse PDU length.
        let pdu_len = buf.try_get_u16()?;
        if pdu_len != buf_orig.len() as u16 {
            return Err(DecodeError::InvalidPduLength(pdu_len));
        }

        // Parse source ID.
        let source = LanId::decode(buf)?;

        // Parse start and end LSP IDs.
        let mut summary = None;
        if matches!(hdr.pdu_type, PduType::CsnpL1 | PduType::CsnpL2) {
            let start_lsp_id = LspId::decode(buf)?;
            let end_lsp_id = LspId::decode(buf)?;
            summary = Some((start_lsp_id, end_lsp_id));
        }

        // Parse top-level TLVs.
        let span = debug_span!("SNP", source = %source);
        let _span_guard = span.enter();
        let mut tlvs = SnpTlvs::default();
        while buf.remaining() >= TLV_HDR_SIZE {
            // Parse TLV type.
            let tlv_type = buf.try_get_u8()?;
            let tlv_etype = TlvType::from_u8(tlv_type);

            // Parse and validate TLV length.
            let tlv_len = buf.try_get_u8()?;
            if tlv_len as usize > buf.remaining() {
                return Err(DecodeError::InvalidTlvLength(tlv_len));
            }

            // Parse TLV value.
            let span = debug_span!("TLV", r#type = tlv_type, length = tlv_len);
            let _span_guard = span.enter();
            let mut buf_tlv = buf.copy_to_bytes(tlv_len as usize);
            match tlv_etype {
                Some(TlvType::Authentication) => {
                    // Authentication is not processed; skip the TLV body.
                    continue;
                }
                Some(TlvType::LspEntries) => {
                    match LspEntriesTlv::decode(tlv_len, &mut buf_tlv) {
                        Ok(tlv) => tlvs.lsp_entries.push(tlv),
                        Err(error) => error.log(),
                    }
                }
                _ => {
                    // Save unknown top-level TLV.
                    tlvs.unknown
                        .push(UnknownTlv::new(tlv_type, tlv_len, buf_tlv));
                }
            }
        }

        Ok(Snp {
            hdr,
            source,
            summary,
            tlvs,
        })
    }

    fn encode(&self) -> Bytes {
        TLS_BUF.with(|buf| {
            let mut buf = pdu_encode_start(buf, &self.hdr);

            // The PDU length will be initialized later.
            let len_pos = buf.len();
            buf.put_u16(0);
            self.source.encode(&mut buf);

            if let Some((start_lsp_id, end_lsp_id)) = &self.summary {
                start_lsp_id.encode(&mut buf);
                end_lsp_id.encode(&mut buf);
            }

            // Encode TLVs.
            for tlv in &self.tlvs.lsp_entries {
                tlv.encode(&mut buf);
            }

            pdu_encode_end(buf, len_pos, None)
        })
    }
}

impl SnpTlvs {
    pub fn new(lsp_entries: impl IntoIterator<Item = LspEntry>) -> Self {
        // Fragment TLVs as necessary.
        let lsp_entries = lsp_entries
            .into_iter()
            .collect::<Vec<_>>()
            .chunks(LspEntriesTlv::MAX_ENTRIES)
            .map(|chunk| LspEntriesTlv {
                list: chunk.to_vec(),
            })
            .collect();

        SnpTlvs {
            lsp_entries,
            unknown: Default::default(),
        }
    }

    // Calculates the maximum number of LSP entries that can fit within the
    // given size.
    pub fn max_lsp_entries(mut size: usize) -> usize {
        let mut lsp_entries = 0;

        // Calculate how many full TLVs fit in the available size.
        let full_tlvs = size / LspEntriesTlv::MAX_SIZE;

        // Update the remaining size after accounting for all full TLVs.
        size %= LspEntriesTlv::MAX_SIZE;

        // Add the number of LSP entries from all full TLVs.
        lsp_entries +=
            full_tlvs * (LspEntriesTlv::MAX_SIZE / LspEntriesTlv::ENTRY_SIZE);

        // Check if the remaining size has enough room for a partial TLV.
        if size >= (TLV_HDR_SIZE + LspEntriesTlv::ENTRY_SIZE) {
            // Add the number of LSP entries from the remaining partial TLV.
            lsp_entries += (size - TLV_HDR_SIZE) / LspEntriesTlv::ENTRY_SIZE;
        }

        lsp_entries
    }

    // Returns an iterator over all LSP entries from TLVs of type 9.
    pub fn lsp_entries(&self) -> impl Iterator<Item = &LspEntry> {
        self.lsp_entries.iter().flat_map(|tlv| tlv.list.iter())
    }
}

// ===== helper functions =====

fn lsp_base_time() -> Option<Instant> {
    #[cfg(not(feature = "testing"))]
    {
        Some(Instant::now())
    }
    #[cfg(feature = "testing")]
    {
        None
    }
}

fn pdu_encode_start<'a>(
    buf: &'a RefCell<BytesMut>,
    hdr: &Header,
) -> RefMut<'a, BytesMut> {
    let mut buf = buf.borrow_mut();
    buf.clear();
    hdr.encode(&mut buf);
    buf
}

fn pdu_encode_end(
    mut buf: RefMut<'_, BytesMut>,
    len_pos: usize,
    lsp: Option<&mut Lsp>,
) -> Bytes {
    // Initialize PDU length.
    let pkt_len = buf.len() as u16;
    buf[len_pos..len_pos + 2].copy_from_slice(&pkt_len.to_be_bytes());

    if let Some(lsp) = lsp {
        // Compute and initialize LSP checksum, skipping everything before
        // the LSP ID field.
        let cksum =
            cksum::checksum(&buf[Lsp::CKSUM_START..], Lsp::CKSUM_SKIP);
        buf[Lsp::CKSUM_RANGE].copy_from_slice(&cksum);
        lsp.cksum = u16::from_be_bytes(cksum);
    }

    buf.clone().freeze()
}
