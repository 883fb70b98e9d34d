//! The immutable [`Resource`] record and the [`MesosResource`] derived view
//! over it that exposes the semantic predicates the pool and stages reason
//! about (atomic?, reserved?, role, principal, resource-id label).

use std::ops::Deref;

use serde::{Deserialize, Serialize};

use crate::proto::{DiskInfo, Labels, ReservationStackEntry};
use crate::value::Value;

/// The role every unreserved resource in an offer carries, matching the
/// Mesos convention of using `"*"` for "no role".
pub const DEFAULT_ROLE: &str = "*";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub name: String,
    pub role: String,
    pub reservations: Vec<ReservationStackEntry>,
    /// The deprecated single-`reservation` field. Only consulted when
    /// `reservations` is empty — the stack is always preferred when both
    /// are present, preserving the protocol-level precedence bit-for-bit.
    pub deprecated_reservation: Option<ReservationStackEntry>,
    pub disk: Option<DiskInfo>,
    pub value: Value,
}

impl Resource {
    pub fn new(name: impl Into<String>, role: impl Into<String>, value: Value) -> Self {
        Resource {
            name: name.into(),
            role: role.into(),
            reservations: Vec::new(),
            deprecated_reservation: None,
            disk: None,
            value,
        }
    }

    pub fn with_disk(mut self, disk: DiskInfo) -> Self {
        self.disk = Some(disk);
        self
    }

    /// The reservation that determines this resource's effective role,
    /// principal and labels: the last entry of the stack if non-empty,
    /// otherwise the deprecated single-reservation field.
    pub fn effective_reservation(&self) -> Option<&ReservationStackEntry> {
        self.reservations.last().or(self.deprecated_reservation.as_ref())
    }

    pub fn effective_role(&self) -> &str {
        self.effective_reservation()
            .map(|r| r.role.as_str())
            .unwrap_or(self.role.as_str())
    }

    pub fn effective_principal(&self) -> Option<&str> {
        self.effective_reservation()
            .and_then(|r| r.principal.as_deref())
    }

    pub fn effective_labels(&self) -> Option<&Labels> {
        self.effective_reservation().map(|r| &r.labels)
    }

    pub fn effective_resource_id(&self) -> Option<&str> {
        self.effective_labels().and_then(Labels::resource_id)
    }

    pub fn effective_persistence_id(&self) -> Option<&str> {
        self.disk
            .as_ref()
            .and_then(|d| d.persistence.as_ref())
            .map(|p| p.id.as_str())
    }

    pub fn is_unreserved(&self) -> bool {
        self.reservations.is_empty()
            && self.deprecated_reservation.is_none()
            && self.role == DEFAULT_ROLE
    }

    pub fn has_resource_id(&self) -> bool {
        self.effective_resource_id().is_some()
    }

    pub fn is_atomic(&self) -> bool {
        self.disk.as_ref().is_some_and(DiskInfo::is_atomic)
    }

    /// Append one reservation entry, the way a RESERVE recommendation does
    /// (§6: "On RESERVE, append one entry `{role, principal, labels}`").
    pub fn reserve(mut self, role: impl Into<String>, principal: Option<String>, labels: Labels) -> Self {
        self.reservations.push(ReservationStackEntry {
            role: role.into(),
            principal,
            labels,
        });
        self
    }

    /// Drop the top reservation, clearing disk persistence/volume info too
    /// if this was a MOUNT release, and reset the role to the default.
    /// Mirrors [`crate::resource_pool::ResourcePool::release_atomic`].
    pub fn released(mut self) -> Self {
        self.reservations.clear();
        self.deprecated_reservation = None;
        self.role = DEFAULT_ROLE.to_string();
        if let Some(disk) = self.disk.as_mut() {
            disk.persistence = None;
            disk.volume = None;
        }
        self
    }

    pub fn with_value(&self, value: Value) -> Self {
        let mut clone = self.clone();
        clone.value = value;
        clone
    }
}

/// A thin derived view over a [`Resource`], named after the protocol's
/// `Resource` protobuf to keep the "raw record vs. semantic view" split
/// explicit even though in this crate both live in the same struct.
#[derive(Clone, Debug, PartialEq)]
pub struct MesosResource(pub Resource);

impl MesosResource {
    pub fn new(resource: Resource) -> Self {
        MesosResource(resource)
    }

    pub fn into_inner(self) -> Resource {
        self.0
    }
}

impl Deref for MesosResource {
    type Target = Resource;

    fn deref(&self) -> &Resource {
        &self.0
    }
}

impl From<Resource> for MesosResource {
    fn from(resource: Resource) -> Self {
        MesosResource(resource)
    }
}
