/// Pure line-by-line response parsing, kept free of any I/O so the
/// correlation rules in the component spec can be unit tested without a
/// socket.
#[derive(Debug, Default)]
pub struct ResponseAccumulator {
    current_service_id: Option<String>,
    current_private_key: Option<String>,
    block_had_private_key: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// Mid-block data line consumed, or a blank/unrecognized line ignored.
    Continue,
    /// Terminal `250 OK`. `service_id` is `Some` only if the block carried
    /// a `ServiceID=` line; a bare `250 OK` is just an ack.
    TerminalOk {
        service_id: Option<String>,
        private_key: Option<String>,
        had_private_key: bool,
    },
    /// A `4xx`/`5xx` status line.
    ErrorLine(String),
}

impl ResponseAccumulator {
    pub fn process_line(&mut self, raw: &str) -> LineEvent {
        let line = raw.trim_end_matches(['\r', '\n']).trim();
        if line.is_empty() {
            return LineEvent::Continue;
        }

        if let Some(id) = line.strip_prefix("250-ServiceID=") {
            self.current_service_id = Some(format!("{id}.onion"));
            self.block_had_private_key = false;
            return LineEvent::Continue;
        }
        if let Some(key) = line.strip_prefix("250-PrivateKey=") {
            self.current_private_key = Some(key.to_string());
            self.block_had_private_key = true;
            return LineEvent::Continue;
        }
        if line == "250 OK" {
            let service_id = self.current_service_id.take();
            let private_key = self.current_private_key.take();
            let had_private_key = self.block_had_private_key;
            self.block_had_private_key = false;
            return LineEvent::TerminalOk {
                service_id,
                private_key,
                had_private_key,
            };
        }

        if let Some(code) = line.get(..3) {
            if code.chars().all(|c| c.is_ascii_digit()) {
                let severity = code.as_bytes()[0];
                if severity == b'4' || severity == b'5' {
                    return LineEvent::ErrorLine(line.to_string());
                }
            }
        }
        LineEvent::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_ok_is_an_ack() {
        let mut acc = ResponseAccumulator::default();
        let ev = acc.process_line("250 OK\r\n");
        assert_eq!(
            ev,
            LineEvent::TerminalOk {
                service_id: None,
                private_key: None,
                had_private_key: false,
            }
        );
    }

    #[test]
    fn add_onion_known_key_block_yields_service_id_without_private_key() {
        let mut acc = ResponseAccumulator::default();
        assert_eq!(
            acc.process_line("250-ServiceID=abc123\r\n"),
            LineEvent::Continue
        );
        let ev = acc.process_line("250 OK\r\n");
        assert_eq!(
            ev,
            LineEvent::TerminalOk {
                service_id: Some("abc123.onion".to_string()),
                private_key: None,
                had_private_key: false,
            }
        );
    }

    #[test]
    fn add_onion_new_block_yields_service_id_and_private_key() {
        let mut acc = ResponseAccumulator::default();
        acc.process_line("250-ServiceID=xyz789\r\n");
        acc.process_line("250-PrivateKey=ED25519-V3:deadbeef\r\n");
        let ev = acc.process_line("250 OK\r\n");
        assert_eq!(
            ev,
            LineEvent::TerminalOk {
                service_id: Some("xyz789.onion".to_string()),
                private_key: Some("ED25519-V3:deadbeef".to_string()),
                had_private_key: true,
            }
        );
    }

    #[test]
    fn error_status_lines_are_surfaced() {
        let mut acc = ResponseAccumulator::default();
        let ev = acc.process_line("512 Unrecognized command\r\n");
        assert_eq!(ev, LineEvent::ErrorLine("512 Unrecognized command".to_string()));
    }

    #[test]
    fn state_resets_between_blocks() {
        let mut acc = ResponseAccumulator::default();
        acc.process_line("250-ServiceID=first\r\n");
        acc.process_line("250-PrivateKey=key1\r\n");
        acc.process_line("250 OK\r\n");

        // A subsequent bare ack must not resurrect the previous block.
        let ev = acc.process_line("250 OK\r\n");
        assert_eq!(
            ev,
            LineEvent::TerminalOk {
                service_id: None,
                private_key: None,
                had_private_key: false,
            }
        );
    }
}
