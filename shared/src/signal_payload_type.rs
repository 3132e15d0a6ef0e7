#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SignalPayloadType {
    Simple,
    String,
    Json,
}
