use std::collections::HashMap;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::room::{Member, Room};

pub const MAX_USER_COUNT: usize = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("room is full, please try again later")]
    RoomFull,
    #[error("user is already in the room")]
    DuplicateUser,
}

#[derive(Debug, Clone)]
pub struct LeaveOutcome {
    pub member: Member,
    pub room_closed: bool,
}

#[derive(Default)]
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Room>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn find_room(&self, room_id: &str) -> Option<Room> {
        self.rooms.read().await.get(room_id).cloned()
    }

    // The write lock spans check and mutation, so two near-simultaneous
    // joins cannot both pass the capacity check.
    pub async fn join_room(
        &self,
        room_id: &str,
        user_id: &str,
        payload: Value,
    ) -> Result<Member, JoinError> {
        let mut rooms = self.rooms.write().await;

        if let Some(room) = rooms.get(room_id) {
            if room.members.len() >= MAX_USER_COUNT {
                return Err(JoinError::RoomFull);
            }

            if room.member(user_id).is_some() {
                return Err(JoinError::DuplicateUser);
            }
        }

        let room = rooms
            .entry(room_id.to_string())
            .or_insert_with(|| Room::new(room_id));

        if room.members.is_empty() {
            room.admin_user_id = Some(user_id.to_string());
        }

        let member = Member::new(room_id, user_id, payload);
        room.members.push(member.clone());

        Ok(member)
    }

    pub async fn leave_room(&self, room_id: &str, user_id: &str) -> Option<LeaveOutcome> {
        let mut rooms = self.rooms.write().await;

        let room = rooms.get_mut(room_id)?;
        let index = room.members.iter().position(|m| m.user_id == user_id)?;
        let member = room.members.remove(index);

        let room_closed = room.members.is_empty();
        if room_closed {
            rooms.remove(room_id);
        }

        Some(LeaveOutcome {
            member,
            room_closed,
        })
    }
}
