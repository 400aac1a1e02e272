//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

// Thin shims over the AF_PACKET socket options and addresses that have no
// safe wrapper in the socket crates. The option payloads and the sockaddr_ll
// layout are dictated by the kernel ABI.

use std::io::Result;
use std::os::raw::{c_int, c_ushort, c_void};
use std::os::unix::io::AsRawFd;

use nix::sys::socket::{LinkAddr, SockaddrLike};

// Re-export the standard socket type.
pub use socket2::Socket;

// Extension methods for AF_PACKET sockets.
pub trait PacketSocketExt: AsRawFd {
    // Attaches a classic BPF program to the socket.
    fn attach_packet_filter(&self, filter: &[libc::sock_filter]) -> Result<()> {
        let prog = libc::sock_fprog {
            len: filter.len() as c_ushort,
            filter: filter.as_ptr() as *mut _,
        };

        setsockopt(self, libc::SOL_SOCKET, libc::SO_ATTACH_FILTER, &prog)
    }

    // Joins or leaves a link-layer multicast group on the given interface
    // (PACKET_ADD_MEMBERSHIP / PACKET_DROP_MEMBERSHIP).
    fn set_packet_multicast(
        &self,
        addr: [u8; 6],
        ifindex: u32,
        add: bool,
    ) -> Result<()> {
        let mut mreq = libc::packet_mreq {
            mr_ifindex: ifindex as c_int,
            mr_type: libc::PACKET_MR_MULTICAST as c_ushort,
            mr_alen: addr.len() as c_ushort,
            mr_address: [0; 8],
        };
        mreq.mr_address[..addr.len()].copy_from_slice(&addr);

        let optname = if add {
            libc::PACKET_ADD_MEMBERSHIP
        } else {
            libc::PACKET_DROP_MEMBERSHIP
        };
        setsockopt(self, libc::SOL_PACKET, optname, &mreq)
    }
}

// Extension methods for LinkAddr.
pub trait LinkAddrExt {
    // Creates a new `LinkAddr` using the given protocol number, interface
    // index, and an optional MAC address.
    fn new(protocol: u16, ifindex: u32, addr: Option<[u8; 6]>) -> Self;
}

// ===== impl Socket =====

impl PacketSocketExt for Socket {}

// ===== impl LinkAddr =====

impl LinkAddrExt for LinkAddr {
    fn new(protocol: u16, ifindex: u32, addr: Option<[u8; 6]>) -> Self {
        let mut sll_halen = 0;
        let mut sll_addr = [0; 8];
        if let Some(addr) = addr {
            sll_halen = addr.len() as u8;
            sll_addr[..addr.len()].copy_from_slice(&addr);
        }
        let sll = libc::sockaddr_ll {
            sll_family: libc::AF_PACKET as u16,
            sll_protocol: protocol.to_be(),
            sll_ifindex: ifindex as _,
            sll_hatype: 0,
            sll_pkttype: 0,
            sll_halen,
            sll_addr,
        };
        let sll_len = size_of_val(&sll) as libc::socklen_t;
        unsafe {
            LinkAddr::from_raw(&sll as *const _ as *const _, Some(sll_len))
        }
        .unwrap()
    }
}

// ===== global functions =====

fn setsockopt<F, T>(
    sock: &F,
    level: c_int,
    optname: c_int,
    optval: &T,
) -> Result<()>
where
    F: AsRawFd + ?Sized,
{
    let ret = unsafe {
        libc::setsockopt(
            sock.as_raw_fd(),
            level,
            optname,
            optval as *const T as *const c_void,
            size_of::<T>() as libc::socklen_t,
        )
    };
    if ret == -1 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(())
}
