//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

#![allow(clippy::len_without_is_empty)]

use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use derive_new::new;
use num_traits::ToPrimitive;
use oxidis_utils::bytes::{BytesExt, BytesMutExt};
use serde::{Deserialize, Serialize};

use crate::packet::consts::TlvType;
use crate::packet::error::{TlvDecodeError, TlvDecodeResult};
use crate::packet::{AreaAddr, LanId, LspId, Snpa};

// TLV header size.
pub const TLV_HDR_SIZE: usize = 2;
// TLV maximum length.
pub const TLV_MAX_LEN: usize = 255;
// Maximum narrow metric.
pub const MAX_NARROW_METRIC: u32 = 63;

const IPV4_ADDR_LEN: usize = 4;
const IPV6_ADDR_LEN: usize = 16;
const MAX_IPV4_PREFIXLEN: u8 = 32;
const MAX_IPV6_PREFIXLEN: u8 = 128;

// Trait for all TLVs.
pub trait Tlv {
    // Return the length of TLV.
    fn len(&self) -> usize;
}

// Trait for TLV types whose payload is made up of multiple logical entries,
// which may span across multiple TLV instances.
pub trait EntryBasedTlv: From<Vec<Self::Entry>> {
    type Entry;
    const FIXED_FIELDS_LEN: usize = 0;

    // Return an iterator over the TLV entries.
    fn entries(&self) -> impl Iterator<Item = &Self::Entry>;

    // Return the length of a given entry.
    fn entry_len(entry: &Self::Entry) -> usize;

    // Return the length of TLV.
    fn len(&self) -> usize {
        TLV_HDR_SIZE
            + Self::FIXED_FIELDS_LEN
            + self.entries().map(Self::entry_len).sum::<usize>()
    }
}

impl<T: EntryBasedTlv> Tlv for T {
    fn len(&self) -> usize {
        EntryBasedTlv::len(self)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AreaAddressesTlv {
    pub list: Vec<AreaAddr>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct NeighborsTlv {
    pub list: Vec<Snpa>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct PaddingTlv {
    pub length: u8,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LspBufferSizeTlv {
    pub size: u16,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct DynamicHostnameTlv {
    pub hostname: String,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ProtocolsSupportedTlv {
    pub list: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv4AddressesTlv {
    pub list: Vec<Ipv4Addr>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv6AddressesTlv {
    pub list: Vec<Ipv6Addr>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct Ipv4RouterIdTlv(Ipv4Addr);

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LspEntriesTlv {
    pub list: Vec<LspEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct LspEntry {
    pub rem_lifetime: u16,
    pub lsp_id: LspId,
    pub seqno: u32,
    pub cksum: u16,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IsReachTlv {
    pub list: Vec<IsReach>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct IsReach {
    pub metric: u8,
    pub metric_delay: Option<u8>,
    pub metric_expense: Option<u8>,
    pub metric_error: Option<u8>,
    pub neighbor: LanId,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ExtIsReachTlv {
    pub list: Vec<ExtIsReach>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ExtIsReach {
    pub neighbor: LanId,
    pub metric: u32,
    // Sub-TLVs are recognized and preserved, but not interpreted.
    pub sub_tlvs: Vec<UnknownTlv>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv4ReachTlv {
    pub list: Vec<Ipv4Reach>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv4Reach {
    pub up_down: bool,
    pub ie_bit: bool,
    pub metric: u8,
    pub metric_delay: Option<u8>,
    pub metric_expense: Option<u8>,
    pub metric_error: Option<u8>,
    pub addr: Ipv4Addr,
    pub mask: Ipv4Addr,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ExtIpv4ReachTlv {
    pub list: Vec<ExtIpv4Reach>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct ExtIpv4Reach {
    pub metric: u32,
    pub up_down: bool,
    pub plen: u8,
    pub prefix: Ipv4Addr,
    // Sub-TLVs are recognized and preserved, but not interpreted.
    pub sub_tlvs: Vec<UnknownTlv>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv6ReachTlv {
    pub list: Vec<Ipv6Reach>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct Ipv6Reach {
    pub metric: u32,
    pub up_down: bool,
    pub external: bool,
    pub plen: u8,
    pub prefix: Ipv6Addr,
    // Sub-TLVs are recognized and preserved, but not interpreted.
    pub sub_tlvs: Vec<UnknownTlv>,
}

#[derive(Clone, Debug, PartialEq)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct UnknownTlv {
    pub tlv_type: u8,
    pub length: u8,
    pub value: Bytes,
}

// ===== impl AreaAddressesTlv =====

impl AreaAddressesTlv {
    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        while buf.remaining() >= 1 {
            // Parse area address length.
            let addr_len = buf.try_get_u8()?;

            // Sanity checks.
            if addr_len > AreaAddr::MAX_LEN {
                return Err(TlvDecodeError::InvalidAreaAddrLen(addr_len));
            }
            if addr_len as usize > buf.remaining() {
                return Err(TlvDecodeError::InvalidLength(tlv_len));
            }

            // Parse area address.
            let addr = buf.copy_to_bytes(addr_len as usize);
            list.push(AreaAddr::from(addr.as_ref()));
        }

        Ok(AreaAddressesTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::AreaAddresses);
        for entry in &self.list {
            buf.put_u8(entry.as_ref().len() as _);
            buf.put_slice(entry.as_ref());
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for AreaAddressesTlv {
    type Entry = AreaAddr;

    fn entries(&self) -> impl Iterator<Item = &AreaAddr> {
        self.list.iter()
    }

    fn entry_len(entry: &AreaAddr) -> usize {
        1 + entry.as_ref().len()
    }
}

impl<I> From<I> for AreaAddressesTlv
where
    I: IntoIterator<Item = AreaAddr>,
{
    fn from(iter: I) -> AreaAddressesTlv {
        AreaAddressesTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl NeighborsTlv =====

impl NeighborsTlv {
    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        // Validate the TLV length.
        if tlv_len as usize % Snpa::LENGTH != 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        while buf.remaining() >= Snpa::LENGTH {
            // Parse neighbor SNPA.
            let snpa = Snpa::decode(buf)?;
            list.push(snpa);
        }

        Ok(NeighborsTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::Neighbors);
        for entry in &self.list {
            entry.encode(buf);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for NeighborsTlv {
    type Entry = Snpa;

    fn entries(&self) -> impl Iterator<Item = &Snpa> {
        self.list.iter()
    }

    fn entry_len(_entry: &Snpa) -> usize {
        Snpa::LENGTH
    }
}

impl<I> From<I> for NeighborsTlv
where
    I: IntoIterator<Item = Snpa>,
{
    fn from(iter: I) -> NeighborsTlv {
        NeighborsTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl PaddingTlv =====

impl PaddingTlv {
    const PADDING: [u8; 255] = [0; 255];

    pub(crate) fn decode(
        tlv_len: u8,
        _buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        // Ignore padding data.
        Ok(PaddingTlv { length: tlv_len })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::Padding);
        buf.put_slice(&Self::PADDING[0..self.length as usize]);
        tlv_encode_end(buf, start_pos);
    }
}

impl Tlv for PaddingTlv {
    fn len(&self) -> usize {
        TLV_HDR_SIZE + self.length as usize
    }
}

// ===== impl LspBufferSizeTlv =====

impl LspBufferSizeTlv {
    const SIZE: usize = 2;

    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        // Validate the TLV length.
        if tlv_len as usize != Self::SIZE {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        let size = buf.try_get_u16()?;

        Ok(LspBufferSizeTlv { size })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::LspBufferSize);
        buf.put_u16(self.size);
        tlv_encode_end(buf, start_pos);
    }
}

impl Tlv for LspBufferSizeTlv {
    fn len(&self) -> usize {
        TLV_HDR_SIZE + Self::SIZE
    }
}

// ===== impl DynamicHostnameTlv =====

impl DynamicHostnameTlv {
    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        // Validate the TLV length.
        if tlv_len == 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        let mut hostname_bytes = [0; 255];
        buf.try_copy_to_slice(&mut hostname_bytes[..tlv_len as usize])?;
        let hostname =
            String::from_utf8_lossy(&hostname_bytes[..tlv_len as usize])
                .to_string();

        Ok(DynamicHostnameTlv { hostname })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::DynamicHostname);
        buf.put_slice(self.hostname.as_bytes());
        tlv_encode_end(buf, start_pos);
    }
}

impl Tlv for DynamicHostnameTlv {
    fn len(&self) -> usize {
        TLV_HDR_SIZE + self.hostname.len()
    }
}

// ===== impl ProtocolsSupportedTlv =====

impl ProtocolsSupportedTlv {
    pub(crate) fn decode(
        _tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        while buf.remaining() >= 1 {
            let proto = buf.try_get_u8()?;
            list.push(proto);
        }

        Ok(ProtocolsSupportedTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::ProtocolsSupported);
        for entry in &self.list {
            buf.put_u8(*entry);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl Tlv for ProtocolsSupportedTlv {
    fn len(&self) -> usize {
        TLV_HDR_SIZE + self.list.len()
    }
}

impl<I> From<I> for ProtocolsSupportedTlv
where
    I: IntoIterator<Item = u8>,
{
    fn from(iter: I) -> ProtocolsSupportedTlv {
        ProtocolsSupportedTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl Ipv4AddressesTlv =====

impl Ipv4AddressesTlv {
    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        // Validate the TLV length.
        if tlv_len as usize % IPV4_ADDR_LEN != 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        while buf.remaining() >= IPV4_ADDR_LEN {
            // Parse IPv4 address.
            let addr = buf.try_get_ipv4()?;
            list.push(addr);
        }

        Ok(Ipv4AddressesTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::Ipv4Addresses);
        for entry in &self.list {
            buf.put_ipv4(entry);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for Ipv4AddressesTlv {
    type Entry = Ipv4Addr;

    fn entries(&self) -> impl Iterator<Item = &Ipv4Addr> {
        self.list.iter()
    }

    fn entry_len(_entry: &Ipv4Addr) -> usize {
        IPV4_ADDR_LEN
    }
}

impl<I> From<I> for Ipv4AddressesTlv
where
    I: IntoIterator<Item = Ipv4Addr>,
{
    fn from(iter: I) -> Ipv4AddressesTlv {
        Ipv4AddressesTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl Ipv6AddressesTlv =====

impl Ipv6AddressesTlv {
    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        // Validate the TLV length.
        if tlv_len as usize % IPV6_ADDR_LEN != 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        while buf.remaining() >= IPV6_ADDR_LEN {
            // Parse IPv6 address.
            let addr = buf.try_get_ipv6()?;
            list.push(addr);
        }

        Ok(Ipv6AddressesTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::Ipv6Addresses);
        for entry in &self.list {
            buf.put_ipv6(entry);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for Ipv6AddressesTlv {
    type Entry = Ipv6Addr;

    fn entries(&self) -> impl Iterator<Item = &Ipv6Addr> {
        self.list.iter()
    }

    fn entry_len(_entry: &Ipv6Addr) -> usize {
        IPV6_ADDR_LEN
    }
}

impl<I> From<I> for Ipv6AddressesTlv
where
    I: IntoIterator<Item = Ipv6Addr>,
{
    fn from(iter: I) -> Ipv6AddressesTlv {
        Ipv6AddressesTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl Ipv4RouterIdTlv =====

impl Ipv4RouterIdTlv {
    const SIZE: usize = 4;

    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        // Validate the TLV length.
        if tlv_len as usize != Self::SIZE {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        let addr = buf.try_get_ipv4()?;

        Ok(Ipv4RouterIdTlv(addr))
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::Ipv4RouterId);
        buf.put_ipv4(&self.0);
        tlv_encode_end(buf, start_pos);
    }

    pub fn get(&self) -> &Ipv4Addr {
        &self.0
    }
}

impl Tlv for Ipv4RouterIdTlv {
    fn len(&self) -> usize {
        TLV_HDR_SIZE + Self::SIZE
    }
}

// ===== impl LspEntriesTlv =====

impl LspEntriesTlv {
    pub const ENTRY_SIZE: usize = 16;
    pub const MAX_ENTRIES: usize = TLV_MAX_LEN / Self::ENTRY_SIZE;
    pub const MAX_SIZE: usize =
        TLV_HDR_SIZE + Self::MAX_ENTRIES * Self::ENTRY_SIZE;

    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        // Validate the TLV length.
        if tlv_len as usize % Self::ENTRY_SIZE != 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        while buf.remaining() >= Self::ENTRY_SIZE {
            let rem_lifetime = buf.try_get_u16()?;
            let lsp_id = LspId::decode(buf)?;
            let seqno = buf.try_get_u32()?;
            let cksum = buf.try_get_u16()?;

            let entry = LspEntry {
                rem_lifetime,
                lsp_id,
                cksum,
                seqno,
            };
            list.push(entry);
        }

        Ok(LspEntriesTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::LspEntries);
        for entry in &self.list {
            buf.put_u16(entry.rem_lifetime);
            entry.lsp_id.encode(buf);
            buf.put_u32(entry.seqno);
            buf.put_u16(entry.cksum);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for LspEntriesTlv {
    type Entry = LspEntry;

    fn entries(&self) -> impl Iterator<Item = &LspEntry> {
        self.list.iter()
    }

    fn entry_len(_entry: &LspEntry) -> usize {
        Self::ENTRY_SIZE
    }
}

impl<I> From<I> for LspEntriesTlv
where
    I: IntoIterator<Item = LspEntry>,
{
    fn from(iter: I) -> LspEntriesTlv {
        LspEntriesTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl IsReachTlv =====

impl IsReachTlv {
    const ENTRY_SIZE: usize = 11;
    const METRIC_S_BIT: u8 = 0x80;
    const METRIC_MASK: u8 = 0x3F;

    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        // Validate the TLV length.
        if tlv_len == 0 || (tlv_len - 1) % Self::ENTRY_SIZE as u8 != 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        // Virtual Flag - Used by partition repair (unsupported).
        let _virtual_flag = buf.try_get_u8()?;
        while buf.remaining() >= Self::ENTRY_SIZE {
            let metric = buf.try_get_u8()?;
            let metric = metric & Self::METRIC_MASK;
            let metric_delay = buf.try_get_u8()?;
            let metric_delay = (metric_delay & Self::METRIC_S_BIT == 0)
                .then_some(metric_delay & Self::METRIC_MASK);
            let metric_expense = buf.try_get_u8()?;
            let metric_expense = (metric_expense & Self::METRIC_S_BIT == 0)
                .then_some(metric_expense & Self::METRIC_MASK);
            let metric_error = buf.try_get_u8()?;
            let metric_error = (metric_error & Self::METRIC_S_BIT == 0)
                .then_some(metric_error & Self::METRIC_MASK);
            let neighbor = LanId::decode(buf)?;

            let entry = IsReach {
                metric,
                metric_delay,
                metric_expense,
                metric_error,
                neighbor,
            };
            list.push(entry);
        }

        Ok(IsReachTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::IsReach);
        // Virtual Flag - Used by partition repair (unsupported).
        buf.put_u8(0);
        for entry in &self.list {
            buf.put_u8(entry.metric);
            buf.put_u8(entry.metric_delay.unwrap_or(Self::METRIC_S_BIT));
            buf.put_u8(entry.metric_expense.unwrap_or(Self::METRIC_S_BIT));
            buf.put_u8(entry.metric_error.unwrap_or(Self::METRIC_S_BIT));
            entry.neighbor.encode(buf);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for IsReachTlv {
    type Entry = IsReach;
    const FIXED_FIELDS_LEN: usize = 1;

    fn entries(&self) -> impl Iterator<Item = &IsReach> {
        self.list.iter()
    }

    fn entry_len(_entry: &IsReach) -> usize {
        Self::ENTRY_SIZE
    }
}

impl<I> From<I> for IsReachTlv
where
    I: IntoIterator<Item = IsReach>,
{
    fn from(iter: I) -> IsReachTlv {
        IsReachTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl ExtIsReachTlv =====

impl ExtIsReachTlv {
    const ENTRY_MIN_SIZE: usize = 11;

    pub(crate) fn decode(
        _tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        while buf.remaining() >= Self::ENTRY_MIN_SIZE {
            let neighbor = LanId::decode(buf)?;
            let metric = buf.try_get_u24()?;

            // Parse Sub-TLVs.
            let mut sub_tlvs = vec![];
            let sub_tlvs_len = buf.try_get_u8()?;
            if sub_tlvs_len as usize > buf.remaining() {
                return Err(TlvDecodeError::InvalidLength(sub_tlvs_len));
            }
            let mut buf_stlvs = buf.copy_to_bytes(sub_tlvs_len as usize);
            while buf_stlvs.remaining() >= TLV_HDR_SIZE {
                let stlv_type = buf_stlvs.try_get_u8()?;
                let stlv_len = buf_stlvs.try_get_u8()?;
                if stlv_len as usize > buf_stlvs.remaining() {
                    return Err(TlvDecodeError::InvalidLength(stlv_len));
                }
                let buf_stlv = buf_stlvs.copy_to_bytes(stlv_len as usize);
                sub_tlvs.push(UnknownTlv::new(stlv_type, stlv_len, buf_stlv));
            }

            list.push(ExtIsReach {
                neighbor,
                metric,
                sub_tlvs,
            });
        }

        Ok(ExtIsReachTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::ExtIsReach);
        for entry in &self.list {
            entry.neighbor.encode(buf);
            buf.put_u24(entry.metric);
            let sub_tlvs_len =
                entry.sub_tlvs.iter().map(Tlv::len).sum::<usize>();
            buf.put_u8(sub_tlvs_len as u8);
            for stlv in &entry.sub_tlvs {
                stlv.encode(buf);
            }
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for ExtIsReachTlv {
    type Entry = ExtIsReach;

    fn entries(&self) -> impl Iterator<Item = &ExtIsReach> {
        self.list.iter()
    }

    fn entry_len(entry: &ExtIsReach) -> usize {
        Self::ENTRY_MIN_SIZE
            + entry.sub_tlvs.iter().map(Tlv::len).sum::<usize>()
    }
}

impl<I> From<I> for ExtIsReachTlv
where
    I: IntoIterator<Item = ExtIsReach>,
{
    fn from(iter: I) -> ExtIsReachTlv {
        ExtIsReachTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl Ipv4ReachTlv =====

impl Ipv4ReachTlv {
    const ENTRY_SIZE: usize = 12;
    const METRIC_S_BIT: u8 = 0x80;
    const METRIC_UP_DOWN_BIT: u8 = 0x80;
    const METRIC_IE_BIT: u8 = 0x40;
    const METRIC_MASK: u8 = 0x3F;

    pub(crate) fn decode(
        tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        // Validate the TLV length.
        if tlv_len as usize % Self::ENTRY_SIZE != 0 {
            return Err(TlvDecodeError::InvalidLength(tlv_len));
        }

        while buf.remaining() >= Self::ENTRY_SIZE {
            let metric = buf.try_get_u8()?;
            let up_down = metric & Self::METRIC_UP_DOWN_BIT != 0;
            let ie_bit = metric & Self::METRIC_IE_BIT != 0;
            let metric = metric & Self::METRIC_MASK;
            let metric_delay = buf.try_get_u8()?;
            let metric_delay = (metric_delay & Self::METRIC_S_BIT == 0)
                .then_some(metric_delay & Self::METRIC_MASK);
            let metric_expense = buf.try_get_u8()?;
            let metric_expense = (metric_expense & Self::METRIC_S_BIT == 0)
                .then_some(metric_expense & Self::METRIC_MASK);
            let metric_error = buf.try_get_u8()?;
            let metric_error = (metric_error & Self::METRIC_S_BIT == 0)
                .then_some(metric_error & Self::METRIC_MASK);
            let addr = buf.try_get_ipv4()?;
            let mask = buf.try_get_ipv4()?;

            let entry = Ipv4Reach {
                up_down,
                ie_bit,
                metric,
                metric_delay,
                metric_expense,
                metric_error,
                addr,
                mask,
            };
            list.push(entry);
        }

        Ok(Ipv4ReachTlv { list })
    }

    pub(crate) fn encode(&self, tlv_type: TlvType, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, tlv_type);
        for entry in &self.list {
            let mut metric = entry.metric;
            if entry.up_down {
                metric |= Self::METRIC_UP_DOWN_BIT;
            }
            if entry.ie_bit {
                metric |= Self::METRIC_IE_BIT;
            }
            buf.put_u8(metric);
            buf.put_u8(entry.metric_delay.unwrap_or(Self::METRIC_S_BIT));
            buf.put_u8(entry.metric_expense.unwrap_or(Self::METRIC_S_BIT));
            buf.put_u8(entry.metric_error.unwrap_or(Self::METRIC_S_BIT));
            buf.put_ipv4(&entry.addr);
            buf.put_ipv4(&entry.mask);
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for Ipv4ReachTlv {
    type Entry = Ipv4Reach;

    fn entries(&self) -> impl Iterator<Item = &Ipv4Reach> {
        self.list.iter()
    }

    fn entry_len(_entry: &Ipv4Reach) -> usize {
        Self::ENTRY_SIZE
    }
}

impl<I> From<I> for Ipv4ReachTlv
where
    I: IntoIterator<Item = Ipv4Reach>,
{
    fn from(iter: I) -> Ipv4ReachTlv {
        Ipv4ReachTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl ExtIpv4ReachTlv =====

impl ExtIpv4ReachTlv {
    const ENTRY_MIN_SIZE: usize = 5;
    const CONTROL_UPDOWN_BIT: u8 = 0x80;
    const CONTROL_SUBTLVS: u8 = 0x40;
    const CONTROL_PLEN_MASK: u8 = 0x3F;

    pub(crate) fn decode(
        _tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        while buf.remaining() >= Self::ENTRY_MIN_SIZE {
            // Parse metric.
            let metric = buf.try_get_u32()?;

            // Parse control field.
            let control = buf.try_get_u8()?;
            let up_down = (control & Self::CONTROL_UPDOWN_BIT) != 0;
            let subtlvs = (control & Self::CONTROL_SUBTLVS) != 0;
            let plen = control & Self::CONTROL_PLEN_MASK;
            if plen > MAX_IPV4_PREFIXLEN {
                return Err(TlvDecodeError::InvalidPrefixLength(plen));
            }

            // Parse prefix (variable length).
            let mut prefix_bytes = [0; IPV4_ADDR_LEN];
            let plen_wire = prefix_wire_len(plen);
            buf.try_copy_to_slice(&mut prefix_bytes[..plen_wire])?;
            let prefix = Ipv4Addr::from(prefix_bytes);

            // Parse Sub-TLVs.
            let mut sub_tlvs = vec![];
            if subtlvs {
                let sub_tlvs_len = buf.try_get_u8()?;
                if sub_tlvs_len as usize > buf.remaining() {
                    return Err(TlvDecodeError::InvalidLength(sub_tlvs_len));
                }
                let mut buf_stlvs = buf.copy_to_bytes(sub_tlvs_len as usize);
                while buf_stlvs.remaining() >= TLV_HDR_SIZE {
                    let stlv_type = buf_stlvs.try_get_u8()?;
                    let stlv_len = buf_stlvs.try_get_u8()?;
                    if stlv_len as usize > buf_stlvs.remaining() {
                        return Err(TlvDecodeError::InvalidLength(stlv_len));
                    }
                    let buf_stlv = buf_stlvs.copy_to_bytes(stlv_len as usize);
                    sub_tlvs
                        .push(UnknownTlv::new(stlv_type, stlv_len, buf_stlv));
                }
            }

            list.push(ExtIpv4Reach {
                metric,
                up_down,
                plen,
                prefix,
                sub_tlvs,
            });
        }

        Ok(ExtIpv4ReachTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::ExtIpv4Reach);
        for entry in &self.list {
            buf.put_u32(entry.metric);

            let mut control = entry.plen & Self::CONTROL_PLEN_MASK;
            if entry.up_down {
                control |= Self::CONTROL_UPDOWN_BIT;
            }
            if !entry.sub_tlvs.is_empty() {
                control |= Self::CONTROL_SUBTLVS;
            }
            buf.put_u8(control);

            let plen_wire = prefix_wire_len(entry.plen);
            buf.put_slice(&entry.prefix.octets()[..plen_wire]);

            if !entry.sub_tlvs.is_empty() {
                let sub_tlvs_len =
                    entry.sub_tlvs.iter().map(Tlv::len).sum::<usize>();
                buf.put_u8(sub_tlvs_len as u8);
                for stlv in &entry.sub_tlvs {
                    stlv.encode(buf);
                }
            }
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for ExtIpv4ReachTlv {
    type Entry = ExtIpv4Reach;

    fn entries(&self) -> impl Iterator<Item = &ExtIpv4Reach> {
        self.list.iter()
    }

    fn entry_len(entry: &ExtIpv4Reach) -> usize {
        let mut len = Self::ENTRY_MIN_SIZE + prefix_wire_len(entry.plen);
        if !entry.sub_tlvs.is_empty() {
            len += 1 + entry.sub_tlvs.iter().map(Tlv::len).sum::<usize>();
        }
        len
    }
}

impl<I> From<I> for ExtIpv4ReachTlv
where
    I: IntoIterator<Item = ExtIpv4Reach>,
{
    fn from(iter: I) -> ExtIpv4ReachTlv {
        ExtIpv4ReachTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl Ipv6ReachTlv =====

impl Ipv6ReachTlv {
    const ENTRY_MIN_SIZE: usize = 6;
    const FLAG_UPDOWN: u8 = 0x80;
    const FLAG_EXTERNAL: u8 = 0x40;
    const FLAG_SUBTLVS: u8 = 0x20;

    pub(crate) fn decode(
        _tlv_len: u8,
        buf: &mut Bytes,
    ) -> TlvDecodeResult<Self> {
        let mut list = vec![];

        while buf.remaining() >= Self::ENTRY_MIN_SIZE {
            // Parse metric.
            let metric = buf.try_get_u32()?;

            // Parse flags field.
            let flags = buf.try_get_u8()?;
            let up_down = (flags & Self::FLAG_UPDOWN) != 0;
            let external = (flags & Self::FLAG_EXTERNAL) != 0;
            let subtlvs = (flags & Self::FLAG_SUBTLVS) != 0;

            // Parse prefix length.
            let plen = buf.try_get_u8()?;
            if plen > MAX_IPV6_PREFIXLEN {
                return Err(TlvDecodeError::InvalidPrefixLength(plen));
            }

            // Parse prefix (variable length).
            let mut prefix_bytes = [0; IPV6_ADDR_LEN];
            let plen_wire = prefix_wire_len(plen);
            buf.try_copy_to_slice(&mut prefix_bytes[..plen_wire])?;
            let prefix = Ipv6Addr::from(prefix_bytes);

            // Parse Sub-TLVs.
            let mut sub_tlvs = vec![];
            if subtlvs {
                let sub_tlvs_len = buf.try_get_u8()?;
                if sub_tlvs_len as usize > buf.remaining() {
                    return Err(TlvDecodeError::InvalidLength(sub_tlvs_len));
                }
                let mut buf_stlvs = buf.copy_to_bytes(sub_tlvs_len as usize);
                while buf_stlvs.remaining() >= TLV_HDR_SIZE {
                    let stlv_type = buf_stlvs.try_get_u8()?;
                    let stlv_len = buf_stlvs.try_get_u8()?;
                    if stlv_len as usize > buf_stlvs.remaining() {
                        return Err(TlvDecodeError::InvalidLength(stlv_len));
                    }
                    let buf_stlv = buf_stlvs.copy_to_bytes(stlv_len as usize);
                    sub_tlvs
                        .push(UnknownTlv::new(stlv_type, stlv_len, buf_stlv));
                }
            }

            list.push(Ipv6Reach {
                metric,
                up_down,
                external,
                plen,
                prefix,
                sub_tlvs,
            });
        }

        Ok(Ipv6ReachTlv { list })
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        let start_pos = tlv_encode_start(buf, TlvType::Ipv6Reach);
        for entry in &self.list {
            buf.put_u32(entry.metric);

            let mut flags = 0;
            if entry.up_down {
                flags |= Self::FLAG_UPDOWN;
            }
            if entry.external {
                flags |= Self::FLAG_EXTERNAL;
            }
            if !entry.sub_tlvs.is_empty() {
                flags |= Self::FLAG_SUBTLVS;
            }
            buf.put_u8(flags);
            buf.put_u8(entry.plen);

            let plen_wire = prefix_wire_len(entry.plen);
            buf.put_slice(&entry.prefix.octets()[..plen_wire]);

            if !entry.sub_tlvs.is_empty() {
                let sub_tlvs_len =
                    entry.sub_tlvs.iter().map(Tlv::len).sum::<usize>();
                buf.put_u8(sub_tlvs_len as u8);
                for stlv in &entry.sub_tlvs {
                    stlv.encode(buf);
                }
            }
        }
        tlv_encode_end(buf, start_pos);
    }
}

impl EntryBasedTlv for Ipv6ReachTlv {
    type Entry = Ipv6Reach;

    fn entries(&self) -> impl Iterator<Item = &Ipv6Reach> {
        self.list.iter()
    }

    fn entry_len(entry: &Ipv6Reach) -> usize {
        let mut len = Self::ENTRY_MIN_SIZE + prefix_wire_len(entry.plen);
        if !entry.sub_tlvs.is_empty() {
            len += 1 + entry.sub_tlvs.iter().map(Tlv::len).sum::<usize>();
        }
        len
    }
}

impl<I> From<I> for Ipv6ReachTlv
where
    I: IntoIterator<Item = Ipv6Reach>,
{
    fn from(iter: I) -> Ipv6ReachTlv {
        Ipv6ReachTlv {
            list: iter.into_iter().collect(),
        }
    }
}

// ===== impl UnknownTlv =====

impl UnknownTlv {
    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.tlv_type);
        buf.put_u8(self.length);
        buf.put_slice(&self.value);
    }
}

impl Tlv for UnknownTlv {
    fn len(&self) -> usize {
        TLV_HDR_SIZE + self.value.len()
    }
}

// ===== helper functions =====

// Calculates the number of bytes required to encode a prefix.
const fn prefix_wire_len(len: u8) -> usize {
    (len as usize).div_ceil(8)
}

// ===== global functions =====

pub(crate) fn tlv_encode_start(
    buf: &mut BytesMut,
    tlv_type: impl ToPrimitive,
) -> usize {
    let start_pos = buf.len();
    buf.put_u8(tlv_type.to_u8().unwrap());
    // The TLV length will be rewritten later.
    buf.put_u8(0);
    start_pos
}

pub(crate) fn tlv_encode_end(buf: &mut BytesMut, start_pos: usize) {
    // Rewrite TLV length.
    buf[start_pos + 1] = (buf.len() - start_pos - TLV_HDR_SIZE) as u8;
}

// Takes as many TLVs as will fit into the provided PDU remaining length.
pub(crate) fn tlv_take_max<T>(
    tlv_list: &mut Vec<T>,
    rem_len: &mut usize,
) -> Vec<T>
where
    T: Tlv,
{
    let mut tlvs = Vec::new();
    let mut count = 0;

    if *rem_len == 0 {
        return tlvs;
    }

    for tlv in tlv_list.iter() {
        let tlv_len = tlv.len();
        if *rem_len >= tlv_len {
            *rem_len -= tlv_len;
            count += 1;
        } else {
            *rem_len = 0;
            break;
        }
    }

    tlvs.extend(tlv_list.drain(0..count));
    tlvs
}

// Splits a list of TLV entries into as many TLVs as necessary.
//
// A new sibling TLV of the same type is started whenever the next entry
// would overflow the 255-byte TLV body.
pub(crate) fn tlv_entries_split<T>(
    entries: impl IntoIterator<Item = T::Entry>,
) -> Vec<T>
where
    T: EntryBasedTlv,
{
    let mut tlvs = vec![];
    let mut tlv_entries = vec![];
    let mut tlv_len = 0;

    for entry in entries {
        let entry_len = T::entry_len(&entry);
        if tlv_len + entry_len > (TLV_MAX_LEN - T::FIXED_FIELDS_LEN) {
            let tlv = T::from(std::mem::take(&mut tlv_entries));
            tlvs.push(tlv);
            tlv_len = 0;
        }
        tlv_entries.push(entry);
        tlv_len += entry_len;
    }
    if !tlv_entries.is_empty() {
        let tlv = T::from(tlv_entries);
        tlvs.push(tlv);
    }

    tlvs.shrink_to_fit();
    tlvs
}
