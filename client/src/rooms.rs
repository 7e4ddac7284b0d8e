//! Room registry: discovered rooms plus the display-name cache.
//!
//! Rooms are discovered by listing "rooms for this user" at login; a room
//! with no prior messages has no server-side representation, so peers can
//! also be registered locally with a derived id before any message exists.

use healthlink_protocol::{RoomId, RoomSummary, UserId};
use std::collections::HashMap;

#[derive(Debug)]
pub struct RoomRegistry {
    me: UserId,
    rooms: HashMap<RoomId, RoomSummary>,
    /// sender id -> display name, used to label notifications.
    names: HashMap<UserId, String>,
}

impl RoomRegistry {
    pub fn new(me: UserId) -> Self {
        Self {
            me,
            rooms: HashMap::new(),
            names: HashMap::new(),
        }
    }

    /// Record one listing entry and cache both display names.
    pub fn insert(&mut self, room: RoomSummary) {
        self.names
            .insert(room.doctor_id.clone(), room.doctor_name.clone());
        self.names
            .insert(room.patient_id.clone(), room.patient_name.clone());
        self.rooms.insert(room.room_id.clone(), room);
    }

    /// Register a doctor-patient pair before any message exists. The room
    /// id is derived locally; the server learns about the room on the
    /// first message.
    pub fn register_pair(
        &mut self,
        doctor: (&UserId, &str),
        patient: (&UserId, &str),
    ) -> RoomId {
        let room_id = RoomId::derive(doctor.0, patient.0);
        self.insert(RoomSummary {
            room_id: room_id.clone(),
            doctor_id: doctor.0.clone(),
            doctor_name: doctor.1.to_owned(),
            patient_id: patient.0.clone(),
            patient_name: patient.1.to_owned(),
        });
        room_id
    }

    pub fn get(&self, room: &RoomId) -> Option<&RoomSummary> {
        self.rooms.get(room)
    }

    /// The other participant of a room, from this user's perspective.
    pub fn peer_of(&self, room: &RoomId) -> Option<(&UserId, &str)> {
        self.get(room).map(|r| r.other_party(&self.me))
    }

    pub fn display_name(&self, user: &UserId) -> String {
        self.names
            .get(user)
            .cloned()
            .unwrap_or_else(|| user.to_string())
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }

    pub fn rooms(&self) -> impl Iterator<Item = &RoomSummary> {
        self.rooms.values()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(doctor: &str, patient: &str) -> RoomSummary {
        RoomSummary {
            room_id: RoomId::derive(&UserId::from(doctor), &UserId::from(patient)),
            doctor_id: UserId::from(doctor),
            doctor_name: format!("Dr. {doctor}"),
            patient_id: UserId::from(patient),
            patient_name: patient.to_uppercase(),
        }
    }

    #[test]
    fn insert_populates_name_cache() {
        let mut registry = RoomRegistry::new(UserId::from("d1"));
        registry.insert(summary("d1", "p1"));

        assert_eq!(registry.display_name(&UserId::from("p1")), "P1");
        assert_eq!(registry.display_name(&UserId::from("d1")), "Dr. d1");
        // Unknown senders fall back to their id.
        assert_eq!(registry.display_name(&UserId::from("p9")), "p9");
    }

    #[test]
    fn register_pair_creates_room_before_any_message() {
        let mut registry = RoomRegistry::new(UserId::from("p1"));
        let doctor = UserId::from("d1");
        let patient = UserId::from("p1");

        let room_id = registry.register_pair((&doctor, "Dr. Rao"), (&patient, "Asha"));
        assert_eq!(room_id, RoomId::derive(&patient, &doctor));
        assert!(registry.get(&room_id).is_some());
    }

    #[test]
    fn peer_of_is_relative_to_self() {
        let mut registry = RoomRegistry::new(UserId::from("d1"));
        registry.insert(summary("d1", "p1"));
        let room_id = RoomId::derive(&UserId::from("d1"), &UserId::from("p1"));

        let (peer, name) = registry.peer_of(&room_id).unwrap();
        assert_eq!(peer, &UserId::from("p1"));
        assert_eq!(name, "P1");
    }
}
