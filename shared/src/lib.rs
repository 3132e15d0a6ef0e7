pub mod received_signal_command;
pub mod signal_command;
pub mod signal_event_id;
pub mod signal_payload_type;

pub const SIGNAL_PORT: u16 = 3000;

pub const MAX_ID_LENGTH: usize = 64;

pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
