//! In-band escape-command grammar.
//!
//! A command is two bytes: the escape prefix followed by a selector.
//! Decoding is a pure function of the current byte and the byte before
//! it; executing the resulting command is the session's business.

/// Escape prefix key (ctrl-t). The byte after it selects the command.
pub const ESCAPE_KEY: u8 = 0x14;

/// Session commands reachable through the escape prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Help,
    SendBreak,
    ShowConfig,
    ToggleDtr,
    ToggleRts,
    ToggleEcho,
    ToggleHex,
    ClearScreen,
    ShowLineStates,
    Quit,
    ShowStats,
    SendEscapeKey,
    CycleTimestamp,
    ShowVersion,
}

/// What to do with an operator byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Not part of a command sequence; forward unmodified.
    Pass,
    /// Swallow the byte (unknown selector after the prefix).
    Drop,
    /// Swallow the byte and run the command.
    Run(Command),
}

/// Decode one operator byte against the byte that preceded it.
pub fn decode(previous_byte: u8, input_byte: u8) -> Decision {
    if previous_byte != ESCAPE_KEY {
        return Decision::Pass;
    }

    match input_byte {
        b'?' => Decision::Run(Command::Help),
        b'b' => Decision::Run(Command::SendBreak),
        b'c' => Decision::Run(Command::ShowConfig),
        b'd' => Decision::Run(Command::ToggleDtr),
        b'r' => Decision::Run(Command::ToggleRts),
        b'e' => Decision::Run(Command::ToggleEcho),
        b'h' => Decision::Run(Command::ToggleHex),
        b'l' => Decision::Run(Command::ClearScreen),
        b'L' => Decision::Run(Command::ShowLineStates),
        b'q' => Decision::Run(Command::Quit),
        b's' => Decision::Run(Command::ShowStats),
        b't' => Decision::Run(Command::SendEscapeKey),
        b'T' => Decision::Run(Command::CycleTimestamp),
        b'v' => Decision::Run(Command::ShowVersion),
        _ => Decision::Drop,
    }
}
