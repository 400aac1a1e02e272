//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::io::{IoSlice, IoSliceMut};
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};

use bytes::Bytes;
use ipnetwork::Ipv4Network;
use nix::errno::Errno;
use nix::sys::socket::{self, LinkAddr, MsgFlags};
use oxidis_utils::socket::{LinkAddrExt, PacketSocketExt, Socket};
use serde::Serialize;

use crate::error::IoError;
use crate::packet::Snpa;

// Ethernet LLC header.
pub const LLC_HDR: [u8; 3] = [0xFE, 0xFE, 0x03];

// IS-IS ethernet multicast addresses.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[derive(Serialize)]
pub enum MulticastAddr {
    AllIss,
    AllL1Iss,
    AllL2Iss,
}

// A frame handed up by the link layer: the payload starts at the LLC header.
#[derive(Debug)]
pub struct ReceivedFrame {
    pub src: Snpa,
    pub data: Bytes,
}

// Addressing information of a link.
#[derive(Clone, Copy, Debug)]
pub struct LinkAddrs {
    pub snpa: Snpa,
    pub ipv4: Option<Ipv4Network>,
    pub mtu: u32,
}

// Raw link-layer access used by a link. The production implementation is an
// AF_PACKET socket; tests substitute an in-memory transport.
pub trait LinkLayer: Send + Sync {
    // Returns the descriptor to register with the readiness multiplexer,
    // when one exists.
    fn poll_fd(&self) -> Option<BorrowedFd<'_>>;

    // Receives a single frame, or `None` when no frame is pending.
    fn recv_pkt(&self) -> Result<Option<ReceivedFrame>, IoError>;

    // Transmits the concatenation of `bufs` to the given multicast group.
    fn writev(
        &self,
        dst: MulticastAddr,
        bufs: &[IoSlice<'_>],
    ) -> Result<usize, IoError>;

    // Joins or leaves a link-layer multicast group.
    fn add_drop_group(
        &self,
        addr: MulticastAddr,
        add: bool,
    ) -> Result<(), IoError>;

    // Returns the link's addressing information.
    fn if_addrs(&self) -> LinkAddrs;
}

// AF_PACKET implementation of the link layer.
pub struct EthernetLink {
    socket: Socket,
    ifindex: u32,
    addrs: LinkAddrs,
}

// Wakes the readiness multiplexer when a link becomes ready to send.
pub(crate) struct PollWaker {
    rx: OwnedFd,
    tx: OwnedFd,
}

// BPF filter that accepts IS-IS over LLC (802.3 length field with
// DSAP/SSAP 0xFE and the IDRP discriminator). Shamelessly copied from FRR!
const ISIS_BPF_FILTER: [libc::sock_filter; 10] = [
    // l0: ldh [0]
    bpf_filter_block(0x28, 0, 0, 0x00000000),
    // l1: jeq #0xfefe, l2, l4
    bpf_filter_block(0x15, 0, 2, 0x0000fefe),
    // l2: ldb [3]
    bpf_filter_block(0x30, 0, 0, 0x00000003),
    // l3: jmp l7
    bpf_filter_block(0x05, 0, 0, 0x00000003),
    // l4: ldh proto
    bpf_filter_block(0x28, 0, 0, 0xfffff000),
    // l5: jeq #0x00fe, l6, l9
    bpf_filter_block(0x15, 0, 3, 0x000000fe),
    // l6: ldb [0]
    bpf_filter_block(0x30, 0, 0, 0x00000000),
    // l7: jeq #0x83, l8, l9
    bpf_filter_block(0x15, 0, 1, 0x00000083),
    // l8: ret #0x40000
    bpf_filter_block(0x06, 0, 0, 0x00040000),
    // l9: ret #0
    bpf_filter_block(0x06, 0, 0, 0x00000000),
];

// ===== impl MulticastAddr =====

impl MulticastAddr {
    pub const fn as_bytes(&self) -> [u8; 6] {
        match self {
            MulticastAddr::AllIss => [0x09, 0x00, 0x2B, 0x00, 0x00, 0x05],
            MulticastAddr::AllL1Iss => [0x01, 0x80, 0xC2, 0x00, 0x00, 0x14],
            MulticastAddr::AllL2Iss => [0x01, 0x80, 0xC2, 0x00, 0x00, 0x15],
        }
    }
}

// ===== impl EthernetLink =====

impl EthernetLink {
    pub fn new(ifname: &str) -> Result<EthernetLink, IoError> {
        use socket2::{Domain, Protocol, Type};

        // Resolve interface index and addresses.
        let ifindex = nix::net::if_::if_nametoindex(ifname)
            .map_err(|_| IoError::InterfaceNotFound(ifname.to_owned()))?;
        let addrs = if_addrs(ifname)?;

        // Create raw socket.
        let socket = Socket::new(
            Domain::PACKET,
            Type::DGRAM,
            Some(Protocol::from(libc::ETH_P_ALL)),
        )
        .map_err(IoError::SocketError)?;
        socket.set_nonblocking(true).map_err(IoError::SocketError)?;

        // Bind to local interface.
        let sockaddr = LinkAddr::new(libc::ETH_P_ALL as u16, ifindex, None);
        socket::bind(socket.as_raw_fd(), &sockaddr)
            .map_err(|errno| IoError::SocketError(errno.into()))?;

        // Attach BPF filter.
        socket
            .attach_packet_filter(&ISIS_BPF_FILTER)
            .map_err(IoError::SocketError)?;

        Ok(EthernetLink {
            socket,
            ifindex,
            addrs,
        })
    }
}

impl LinkLayer for EthernetLink {
    fn poll_fd(&self) -> Option<BorrowedFd<'_>> {
        Some(self.socket.as_fd())
    }

    fn recv_pkt(&self) -> Result<Option<ReceivedFrame>, IoError> {
        let mut buf = [0; 16384];
        let (src, bytes) = {
            let mut iov = [IoSliceMut::new(&mut buf)];
            match socket::recvmsg::<LinkAddr>(
                self.socket.as_raw_fd(),
                &mut iov,
                None,
                MsgFlags::empty(),
            ) {
                Ok(msg) => {
                    let Some(src) =
                        msg.address.as_ref().and_then(|addr| addr.addr())
                    else {
                        return Err(IoError::RecvMissingSourceAddr);
                    };
                    (src, msg.bytes)
                }
                Err(Errno::EWOULDBLOCK) | Err(Errno::EINTR) => {
                    return Ok(None);
                }
                Err(errno) => {
                    return Err(IoError::RecvError(errno.into()));
                }
            }
        };

        Ok(Some(ReceivedFrame {
            src: Snpa::from(src),
            data: Bytes::copy_from_slice(&buf[..bytes]),
        }))
    }

    fn writev(
        &self,
        dst: MulticastAddr,
        bufs: &[IoSlice<'_>],
    ) -> Result<usize, IoError> {
        // The kernel builds the MAC header: the 802.3 length field is taken
        // from the address protocol.
        let len = bufs.iter().map(|buf| buf.len()).sum::<usize>();
        let sockaddr =
            LinkAddr::new(len as u16, self.ifindex, Some(dst.as_bytes()));
        socket::sendmsg(
            self.socket.as_raw_fd(),
            bufs,
            &[],
            MsgFlags::empty(),
            Some(&sockaddr),
        )
        .map_err(|errno| IoError::SendError(errno.into()))
    }

    fn add_drop_group(
        &self,
        addr: MulticastAddr,
        add: bool,
    ) -> Result<(), IoError> {
        self.socket
            .set_packet_multicast(addr.as_bytes(), self.ifindex, add)
            .map_err(|error| IoError::MulticastJoinError(addr, error))
    }

    fn if_addrs(&self) -> LinkAddrs {
        self.addrs
    }
}

// ===== impl PollWaker =====

impl PollWaker {
    pub(crate) fn new() -> Result<PollWaker, IoError> {
        let (rx, tx) = nix::unistd::pipe2(nix::fcntl::OFlag::O_NONBLOCK)
            .map_err(|errno| IoError::SocketError(errno.into()))?;
        Ok(PollWaker { rx, tx })
    }

    pub(crate) fn wake(&self) {
        let _ = nix::unistd::write(&self.tx, &[1]);
    }

    pub(crate) fn drain(&self) {
        let mut buf = [0; 64];
        while let Ok(n) = nix::unistd::read(&self.rx, &mut buf) {
            if n < buf.len() {
                break;
            }
        }
    }

    pub(crate) fn poll_fd(&self) -> BorrowedFd<'_> {
        self.rx.as_fd()
    }
}

// ===== helper functions =====

// Discovers the MAC address, primary IPv4 prefix, and MTU of an interface.
fn if_addrs(ifname: &str) -> Result<LinkAddrs, IoError> {
    let mut snpa = None;
    let mut ipv4 = None;

    for ifaddr in
        nix::ifaddrs::getifaddrs().map_err(|errno| {
            IoError::SocketError(errno.into())
        })?
    {
        if ifaddr.interface_name != ifname {
            continue;
        }
        if let Some(link) =
            ifaddr.address.as_ref().and_then(|addr| addr.as_link_addr())
            && let Some(addr) = link.addr()
        {
            snpa = Some(Snpa::from(addr));
        }
        if ipv4.is_none()
            && let Some(addr) = ifaddr
                .address
                .as_ref()
                .and_then(|addr| addr.as_sockaddr_in())
            && let Some(mask) = ifaddr
                .netmask
                .as_ref()
                .and_then(|mask| mask.as_sockaddr_in())
            && let Ok(prefix) = Ipv4Network::with_netmask(addr.ip(), mask.ip())
        {
            ipv4 = Some(prefix);
        }
    }

    let Some(snpa) = snpa else {
        return Err(IoError::InterfaceNotFound(ifname.to_owned()));
    };

    // The MTU is not part of the getifaddrs(3) view.
    let mtu = std::fs::read_to_string(format!("/sys/class/net/{ifname}/mtu"))
        .ok()
        .and_then(|mtu| mtu.trim().parse().ok())
        .unwrap_or(1500);

    Ok(LinkAddrs { snpa, ipv4, mtu })
}

const fn bpf_filter_block(
    code: u16,
    jt: u8,
    jf: u8,
    k: u32,
) -> libc::sock_filter {
    libc::sock_filter { code, jt, jf, k }
}
