use serde_json::Value;

#[derive(Debug, Clone)]
pub struct Room {
    pub room_id: String,
    pub admin_user_id: Option<String>,
    pub members: Vec<Member>,
}

impl Room {
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            admin_user_id: None,
            members: Vec::new(),
        }
    }

    pub fn member(&self, user_id: &str) -> Option<&Member> {
        self.members.iter().find(|m| m.user_id == user_id)
    }
}

#[derive(Debug, Clone)]
pub struct Member {
    pub user_id: String,
    pub room_id: String,
    pub payload: Value,
}

impl Member {
    // Extra payload fields ride along untouched; only the identifiers are
    // normalized so rebroadcasts always carry them.
    pub fn new(room_id: &str, user_id: &str, mut payload: Value) -> Self {
        if let Value::Object(fields) = &mut payload {
            fields.insert("roomId".to_string(), Value::String(room_id.to_string()));
            fields.insert("userId".to_string(), Value::String(user_id.to_string()));
        }

        Self {
            user_id: user_id.to_string(),
            room_id: room_id.to_string(),
            payload,
        }
    }
}
