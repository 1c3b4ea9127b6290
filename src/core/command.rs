//! Command classification

/// What a bus command asks the bridge to do.
///
/// Resolved once per message. Precedence follows declaration order:
/// `Read` beats `Name,`, which beats `Find,`, which beats `D,`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandKind {
    /// `Read...`: publish the device's current burst of lines
    Read,
    /// `Name,<value>`: change the in-memory identity, then forward
    Rename(String),
    /// `Find,<value>`: locate notification, then forward
    Locate(String),
    /// `D,<amount>`: dispensed-quantity metric, then forward.
    /// `None` when the amount is not an integer.
    Dispense(Option<i64>),
    /// Anything else is forwarded verbatim
    PassThrough,
}

impl CommandKind {
    /// Classify a command string
    pub fn classify(command: &str) -> Self {
        if command.starts_with("Read") {
            Self::Read
        } else if let Some(rest) = command.strip_prefix("Name,") {
            Self::Rename(first_field(rest).to_string())
        } else if let Some(rest) = command.strip_prefix("Find,") {
            Self::Locate(first_field(rest).to_string())
        } else if let Some(rest) = command.strip_prefix("D,") {
            Self::Dispense(first_field(rest).trim().parse().ok())
        } else {
            Self::PassThrough
        }
    }

    /// Whether the command text goes to the device
    pub fn forwards(&self) -> bool {
        !matches!(self, Self::Read)
    }
}

fn first_field(rest: &str) -> &str {
    rest.split(',').next().unwrap_or_default()
}
