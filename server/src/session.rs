// Plain values only; the registry never sees a reference into connection
// state.
#[derive(Debug, Clone)]
pub struct SessionBinding {
    pub user_id: String,
    pub room_id: String,
}
