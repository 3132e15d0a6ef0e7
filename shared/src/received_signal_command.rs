use crate::signal_command::SignalCommand;

#[derive(Debug, Clone)]
pub enum ReceivedSignalCommand {
    EOF,
    Command(SignalCommand),
}
