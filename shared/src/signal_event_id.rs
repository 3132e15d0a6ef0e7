use crate::signal_payload_type::SignalPayloadType;

const EVENT_BYTE_OFFSET: u8 = 64;

macro_rules! signal_event_id_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, PartialEq, Eq, Clone, Copy, strum_macros::Display)]
        #[strum(serialize_all = "camelCase")]
        #[repr(u8)]
        $vis enum $name {
            $($variant),*
        }

        impl $name {

            pub fn to_byte(&self) -> u8 {
                *self as u8 + EVENT_BYTE_OFFSET
            }

            pub fn from_byte(byte: u8) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
                match byte.wrapping_sub(EVENT_BYTE_OFFSET) {
                    $(x if x == $name::$variant as u8 => Ok($name::$variant),)*
                    _ => Err("Invalid SignalEventId".into()),
                }
            }
        }
    };
}

signal_event_id_enum! {
    pub enum SignalEventId {
        Join,
        Leave,
        Offer,
        Answer,
        Candidate,
        Message,
        Welcome,
        CreateOffer,
        ErrorResponse,
        Ping,
        Pong,
    }
}

impl SignalEventId {
    pub fn get_payload_type(&self) -> SignalPayloadType {
        match &self {
            SignalEventId::Join
            | SignalEventId::Leave
            | SignalEventId::Offer
            | SignalEventId::Answer
            | SignalEventId::Candidate
            | SignalEventId::Message
            | SignalEventId::Welcome
            | SignalEventId::CreateOffer => SignalPayloadType::Json,
            SignalEventId::ErrorResponse => SignalPayloadType::String,
            SignalEventId::Ping | SignalEventId::Pong => SignalPayloadType::Simple,
        }
    }
}
