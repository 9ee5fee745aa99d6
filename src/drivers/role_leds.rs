//! Mesh role LED indicator.
//!
//! Four discrete LEDs mirror the node's mesh role: one steady LED per
//! attached role, and a toggling pattern while the node is detached so
//! a glance at the board shows it hunting for a parent.
//!
//! Generic over [`StatefulOutputPin`] so the host simulation can use a
//! plain in-memory pin.

use embedded_hal::digital::StatefulOutputPin;
use log::warn;

use crate::mesh::Role;

/// The four role indicator LEDs.
pub struct RoleLeds<P: StatefulOutputPin> {
    status: P,
    leader: P,
    router: P,
    child: P,
}

impl<P: StatefulOutputPin> RoleLeds<P> {
    pub fn new(status: P, leader: P, router: P, child: P) -> Self {
        let mut leds = Self {
            status,
            leader,
            router,
            child,
        };
        leds.all_off();
        leds
    }

    /// Show the given role.
    pub fn indicate(&mut self, role: Role) {
        let result = match role {
            Role::Leader => self
                .router
                .set_low()
                .and_then(|()| self.child.set_low())
                .and_then(|()| self.leader.set_high()),
            Role::Router => self
                .leader
                .set_low()
                .and_then(|()| self.child.set_low())
                .and_then(|()| self.router.set_high()),
            Role::Child => self
                .leader
                .set_low()
                .and_then(|()| self.router.set_low())
                .and_then(|()| self.child.set_high()),
            Role::Detached | Role::Disabled => self
                .leader
                .toggle()
                .and_then(|_| self.router.toggle())
                .and_then(|_| self.child.toggle())
                .and_then(|_| self.status.toggle()),
        };
        if result.is_err() {
            warn!("Role LED update failed");
        }
    }

    fn all_off(&mut self) {
        let result = self
            .status
            .set_low()
            .and_then(|()| self.leader.set_low())
            .and_then(|()| self.router.set_low())
            .and_then(|()| self.child.set_low());
        if result.is_err() {
            warn!("Role LED init failed");
        }
    }
}
