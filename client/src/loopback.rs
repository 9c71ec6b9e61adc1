//! In-process link for driving a session without a socket
//!
//! [`loopback`] returns the link half (given to a `TransportSession`) and a
//! [`LoopbackRemote`] that plays the relay: it injects inbound packets,
//! simulates link loss and records everything the session sent.

use crate::transport::{Link, LinkEvent, TransportError};
use shared::Packet;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

#[derive(Debug, Default)]
struct LoopbackState {
    open: bool,
    refuse: bool,
    fail_sends: bool,
    endpoint: Option<String>,
    inbound: VecDeque<LinkEvent>,
    sent: Vec<Packet>,
}

#[derive(Debug)]
pub struct LoopbackLink {
    state: Rc<RefCell<LoopbackState>>,
}

#[derive(Debug, Clone)]
pub struct LoopbackRemote {
    state: Rc<RefCell<LoopbackState>>,
}

pub fn loopback() -> (LoopbackLink, LoopbackRemote) {
    let state = Rc::new(RefCell::new(LoopbackState::default()));
    (
        LoopbackLink {
            state: Rc::clone(&state),
        },
        LoopbackRemote { state },
    )
}

impl Link for LoopbackLink {
    fn open(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if state.refuse {
            return Err(TransportError::Unreachable(endpoint.to_string()));
        }
        state.open = true;
        state.endpoint = Some(endpoint.to_string());
        state.inbound.clear();
        Ok(())
    }

    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return Err(TransportError::NotOpen);
        }
        if state.fail_sends {
            return Err(TransportError::Unreachable("send failed".to_string()));
        }
        state.sent.push(packet.clone());
        Ok(())
    }

    fn try_recv(&mut self) -> Option<LinkEvent> {
        let mut state = self.state.borrow_mut();
        if !state.open {
            return None;
        }
        state.inbound.pop_front()
    }

    fn close(&mut self) {
        let mut state = self.state.borrow_mut();
        state.open = false;
        state.inbound.clear();
    }
}

impl LoopbackRemote {
    /// Queues a packet as if the relay had sent it.
    pub fn push(&self, packet: Packet) {
        self.state
            .borrow_mut()
            .inbound
            .push_back(LinkEvent::Packet(packet));
    }

    pub fn lose(&self, reason: &str) {
        self.state.borrow_mut().inbound.push_back(LinkEvent::Lost {
            reason: reason.to_string(),
        });
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.state.borrow_mut().refuse = refuse;
    }

    /// Makes every later `send` fail while the link stays open.
    pub fn fail_sends(&self, fail: bool) {
        self.state.borrow_mut().fail_sends = fail;
    }

    pub fn sent(&self) -> Vec<Packet> {
        self.state.borrow().sent.clone()
    }

    pub fn take_sent(&self) -> Vec<Packet> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    pub fn is_open(&self) -> bool {
        self.state.borrow().open
    }

    pub fn endpoint(&self) -> Option<String> {
        self.state.borrow().endpoint.clone()
    }
}
