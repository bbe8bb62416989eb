use std::fmt;

/// A published batch of commands.
///
/// Immutable once published. The timestamp is the wall-clock second at
/// which the first command of the batch was accepted by the accumulator,
/// not the instant of publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bulk {
    timestamp: u64,
    commands: Vec<String>,
}

impl Bulk {
    /// A bulk published by the engine always has at least one command.
    pub fn new(timestamp: u64, commands: Vec<String>) -> Self {
        Self {
            timestamp,
            commands,
        }
    }

    /// Unix seconds at which the first command was accepted.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    /// Number of commands in this bulk.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Renders the full output line, trailing newline included.
    pub fn to_line(&self) -> String {
        format!("{self}\n")
    }
}

/// Renders `bulk: cmd1, cmd2` — no trailing comma, no newline.
impl fmt::Display for Bulk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("bulk: ")?;
        for (index, command) in self.commands.iter().enumerate() {
            if index != 0 {
                f.write_str(", ")?;
            }
            f.write_str(command)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_comma_separated_line() {
        let bulk = Bulk::new(0, vec!["cmd1".into(), "cmd2".into()]);
        assert_eq!(bulk.to_string(), "bulk: cmd1, cmd2");
        assert_eq!(bulk.to_line(), "bulk: cmd1, cmd2\n");
    }

    #[test]
    fn empty_commands_stay_visible() {
        let bulk = Bulk::new(0, vec![String::new(), "cmd2".into()]);
        assert_eq!(bulk.to_line(), "bulk: , cmd2\n");
    }

    #[test]
    fn single_command_has_no_separator() {
        let bulk = Bulk::new(0, vec!["cmd".into()]);
        assert_eq!(bulk.to_line(), "bulk: cmd\n");
    }
}
