//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::sync::{Arc, Weak};
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout};
use oxidis_utils::timer::TimerHeap;

use crate::collections::LinkDb;
use crate::debug::Debug;
use crate::error::{Error, IoError};
use crate::interface::Link;
use crate::lsdb::UpdateProcess;
use crate::network::{EthernetLink, LinkLayer, PollWaker};
use crate::packet::{AreaAddr, LevelNumber, LevelType, Levels, SystemId};
use crate::tasks::TimerAction;

// Delay applied to event-driven LSP regenerations, collapsing bursts of
// adjacency and DIS changes into a single new LSP instance.
pub(crate) const LSP_GEN_EVENT_DELAY: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct Config {
    pub system_id: SystemId,
    pub area_addr: AreaAddr,
    pub level_type: LevelType,
    pub priority: u8,
    pub overload: bool,
    pub hostname: Option<String>,
    pub interfaces: Vec<LinkConfig>,
    pub hello_interval: u16,
    pub hello_multiplier: u16,
    pub csnp_interval: u16,
    pub lsp_lifetime: u16,
    pub lsp_mtu: u16,
    pub lsp_gen_delay: Duration,
    pub metric: u32,
}

#[derive(Clone, Debug)]
pub struct LinkConfig {
    pub name: String,
    pub p2p: bool,
}

pub struct Instance {
    pub config: Config,
    // Hostname advertised in the dynamic hostname TLV.
    pub hostname: String,
    pub links: LinkDb,
    update: Levels<Option<UpdateProcess>>,
}

// ===== impl Config =====

impl Default for Config {
    fn default() -> Config {
        Config {
            system_id: SystemId::from([0; 6]),
            area_addr: AreaAddr::from([0].as_slice()),
            level_type: LevelType::L1,
            priority: 64,
            overload: false,
            hostname: None,
            interfaces: vec![],
            hello_interval: 10,
            hello_multiplier: 3,
            csnp_interval: 10,
            lsp_lifetime: 1200,
            lsp_mtu: 1492,
            lsp_gen_delay: Duration::from_secs(2),
            metric: 10,
        }
    }
}

// ===== impl Instance =====

impl Instance {
    // Starts an instance using AF_PACKET sockets on the configured
    // interfaces.
    pub fn start(config: Config) -> Result<Arc<Instance>, Error> {
        let mut socks: Vec<Box<dyn LinkLayer>> = vec![];
        for link_config in &config.interfaces {
            let sock =
                EthernetLink::new(&link_config.name).map_err(|error| {
                    Error::InterfaceStartError(
                        link_config.name.clone(),
                        Box::new(error.into()),
                    )
                })?;
            socks.push(Box::new(sock));
        }
        Self::with_link_layers(config, socks)
    }

    // Starts an instance over caller-provided link layers.
    pub fn with_link_layers(
        config: Config,
        socks: Vec<Box<dyn LinkLayer>>,
    ) -> Result<Arc<Instance>, Error> {
        assert_eq!(config.interfaces.len(), socks.len());

        if config.interfaces.is_empty() {
            return Err(Error::NoInterfaces);
        }
        // The Circuit ID space limits the number of links.
        if config.interfaces.len() > 255 {
            return Err(Error::TooManyInterfaces(config.interfaces.len()));
        }
        for (i, link_config) in config.interfaces.iter().enumerate() {
            if config.interfaces[..i]
                .iter()
                .any(|other| other.name == link_config.name)
            {
                return Err(Error::DuplicateInterface(
                    link_config.name.clone(),
                ));
            }
        }

        let waker = PollWaker::new()?;
        let hostname =
            config.hostname.clone().unwrap_or_else(system_hostname);

        Debug::InstanceCreate.log();

        let instance = Arc::new_cyclic(|me: &Weak<Instance>| {
            // Every timer heap dispatches its actions back into the
            // instance; a heap outliving the instance dispatches into the
            // void.
            let dispatcher = |me: &Weak<Instance>| {
                let me = me.clone();
                move |action: TimerAction| {
                    if let Some(instance) = me.upgrade() {
                        instance.process_timer_action(action);
                    }
                }
            };

            let link_timers = TimerHeap::new("links", dispatcher(me));
            let mut links = vec![];
            for (index, sock) in socks.into_iter().enumerate() {
                let link_config = &config.interfaces[index];
                let name = link_config.name.clone();
                let link = Link::new(
                    index,
                    name.clone(),
                    link_config.p2p,
                    config.level_type,
                    config.priority,
                    config.system_id,
                    sock,
                    &link_timers,
                    |level| {
                        TimerHeap::new(
                            &format!("{name}-l{level}-adjdb"),
                            dispatcher(me),
                        )
                    },
                );
                links.push(Arc::new(link));
            }

            let mut update = Levels::<Option<UpdateProcess>>::default();
            for level in config.level_type {
                *update.get_mut(level) = Some(UpdateProcess::new(
                    level,
                    TimerHeap::new(&format!("l{level}-update"), dispatcher(me)),
                ));
            }

            Instance {
                config,
                hostname,
                links: LinkDb::new(link_timers, links, waker),
                update,
            }
        });

        Debug::InstanceStart.log();

        // Join multicast groups and start the per-link timers.
        for link in instance.links.iter() {
            link.start(&instance);
        }

        // Schedule the initial LSP generation.
        for level in instance.config.level_type {
            if let Some(uproc) = instance.update_process(level) {
                uproc.schedule_gen(instance.config.lsp_gen_delay);
            }
        }

        Ok(instance)
    }

    // Returns the update process of the given level, if enabled.
    pub fn update_process(&self, level: LevelNumber) -> Option<&UpdateProcess> {
        self.update.get(level).as_ref()
    }

    // Dispatches a timer action to its handler. Actions whose keys no
    // longer resolve are discarded.
    pub fn process_timer_action(&self, action: TimerAction) {
        match action {
            TimerAction::HelloInterval { link, level } => {
                if let Some(link) = self.links.get(link) {
                    link.hello_tx(self, level);
                }
            }
            TimerAction::P2pHelloInterval { link } => {
                if let Some(link) = self.links.get(link) {
                    link.p2p_hello_tx(self);
                }
            }
            TimerAction::AdjacencyHoldtimer { link, level, snpa } => {
                if let Some(link) = self.links.get(link) {
                    link.adjacency_holdtimer_expiry(level, snpa);
                }
            }
            TimerAction::DisElection { link, level } => {
                if let Some(link) = self.links.get(link) {
                    link.dis_election(self, level);
                }
            }
            TimerAction::CsnpInterval { link, level } => {
                if let Some(link) = self.links.get(link) {
                    link.csnp_tx(self, level);
                }
            }
            TimerAction::LspExpiry { level, lsp_id } => {
                if let Some(uproc) = self.update_process(level) {
                    uproc.process_expiry(self, lsp_id);
                }
            }
            TimerAction::LspDelete { level, lsp_id } => {
                if let Some(uproc) = self.update_process(level) {
                    uproc.process_delete(lsp_id);
                }
            }
            TimerAction::LspRefresh { level, lsp_id } => {
                if let Some(uproc) = self.update_process(level) {
                    uproc.process_refresh(self, lsp_id);
                }
            }
            TimerAction::LspGenerate { level } => {
                if let Some(uproc) = self.update_process(level) {
                    uproc.process_gen(self);
                }
            }
        }
    }

    // The receive-and-send worker: drives all link descriptors through one
    // readiness multiplexer. Links are polled for writability only while
    // one of their flag sets is non-empty.
    pub fn run(self: &Arc<Self>) -> Result<(), Error> {
        loop {
            let ready = self.links.send_ready_snapshot();

            let mut pollfds = vec![PollFd::new(
                self.links.waker().poll_fd(),
                PollFlags::POLLIN,
            )];
            let mut indices = vec![usize::MAX];
            for link in self.links.iter() {
                if let Some(fd) = link.sock.poll_fd() {
                    let mut events = PollFlags::POLLIN;
                    if ready.contains(&link.index) {
                        events |= PollFlags::POLLOUT;
                    }
                    pollfds.push(PollFd::new(fd, events));
                    indices.push(link.index);
                }
            }

            match nix::poll::poll(&mut pollfds, PollTimeout::NONE) {
                Ok(_) => (),
                Err(Errno::EINTR) => continue,
                Err(errno) => {
                    return Err(IoError::PollError(errno.into()).into());
                }
            }

            let revents = pollfds
                .iter()
                .map(|pollfd| pollfd.revents().unwrap_or(PollFlags::empty()))
                .collect::<Vec<_>>();
            drop(pollfds);

            if revents[0].contains(PollFlags::POLLIN) {
                self.links.waker().drain();
            }
            for (slot, revents) in revents.into_iter().enumerate().skip(1) {
                let Some(link) = self.links.get(indices[slot]) else {
                    continue;
                };
                if revents.contains(PollFlags::POLLIN) {
                    link.receive_packets(self);
                }
                if revents.contains(PollFlags::POLLOUT) {
                    link.send_drain(self);
                }
            }
        }
    }
}

// ===== helper functions =====

fn system_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|hostname| hostname.into_string().ok())
        .unwrap_or_else(|| "is-is".to_owned())
}
