use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use termlink::{
    DeviceControl, ModemLine, ModemLines, Options, PrintMode, Session, SessionEvent, TermLinkResult,
    ESCAPE_KEY,
};

/// Integration tests for the TermLink connection engine
#[cfg(test)]
mod integration_tests {
    use super::*;

    #[derive(Default)]
    struct MockDevice {
        written: Vec<u8>,
        breaks: usize,
        lines: ModemLines,
    }

    impl Write for MockDevice {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DeviceControl for MockDevice {
        fn send_break(&mut self) -> TermLinkResult<()> {
            self.breaks += 1;
            Ok(())
        }

        fn modem_lines(&mut self) -> TermLinkResult<ModemLines> {
            Ok(self.lines)
        }

        fn toggle_line(&mut self, line: ModemLine) -> TermLinkResult<bool> {
            Ok(match line {
                ModemLine::Dtr => {
                    self.lines.dtr = !self.lines.dtr;
                    self.lines.dtr
                }
                ModemLine::Rts => {
                    self.lines.rts = !self.lines.rts;
                    self.lines.rts
                }
            })
        }
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> Vec<u8> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session_with(options: Options) -> (Session, SharedBuf) {
        let out = SharedBuf::default();
        let session = Session::with_writer(options, Box::new(out.clone())).unwrap();
        (session, out)
    }

    fn base_options() -> Options {
        Options {
            device: "/dev/ttyUSB0".to_string(),
            ..Options::default()
        }
    }

    #[test]
    fn test_end_to_end_plain_transmission() {
        // baud 9600, 8N1, flow none, no echo, no hex: the device sees
        // exactly the typed bytes, in order.
        let mut options = base_options();
        options.baudrate = 9600;
        let (mut session, _) = session_with(options);
        let mut device = MockDevice::default();

        let before = session.statistics().tx_total;
        let event = session.process_input(&mut device, b"AB");

        assert_eq!(event, SessionEvent::Continue);
        assert_eq!(device.written, [0x41, 0x42]);
        assert_eq!(session.statistics().tx_total, before + 2);
    }

    #[test]
    fn test_quit_sequence_terminates() {
        let (mut session, _) = session_with(base_options());
        let mut device = MockDevice::default();
        assert_eq!(
            session.process_input(&mut device, &[ESCAPE_KEY, b'q']),
            SessionEvent::Quit
        );
    }

    #[test]
    fn test_literal_prefix_sequence() {
        let (mut session, _) = session_with(base_options());
        let mut device = MockDevice::default();
        session.process_input(&mut device, &[ESCAPE_KEY, b't']);
        assert_eq!(device.written, [ESCAPE_KEY]);
        assert_eq!(session.statistics().tx_total, 1);
    }

    #[test]
    fn test_unknown_sequence_is_inert() {
        let (mut session, _) = session_with(base_options());
        let mut device = MockDevice::default();
        session.process_input(&mut device, &[ESCAPE_KEY, b'#']);
        assert!(device.written.is_empty());
        assert_eq!(session.statistics().tx_total, 0);
        assert_eq!(session.statistics().rx_total, 0);
    }

    #[test]
    fn test_dtr_toggle_via_escape() {
        let (mut session, out) = session_with(base_options());
        let mut device = MockDevice::default();
        session.process_input(&mut device, &[ESCAPE_KEY, b'd']);
        assert!(device.lines.dtr);
        let rendered = String::from_utf8(out.contents()).unwrap();
        assert!(rendered.contains("set DTR to HIGH"));
    }

    #[test]
    fn test_hex_send_pipeline() {
        let mut options = base_options();
        options.hex_mode = true;
        let (mut session, _) = session_with(options);
        let mut device = MockDevice::default();

        session.process_input(&mut device, b"de");
        session.process_input(&mut device, b"ad");
        assert_eq!(device.written, [0xde, 0xad]);
        assert_eq!(session.statistics().tx_total, 2);
    }

    #[test]
    fn test_hex_receive_rendering() {
        let mut options = base_options();
        options.hex_mode = true;
        let (mut session, out) = session_with(options);
        session.process_device_bytes(&[0x01, 0xab]);
        assert_eq!(out.contents(), b"01 ab ");
    }

    #[test]
    fn test_onlcrnl_with_local_echo() {
        let mut options = base_options();
        options.map = "ONLCRNL".to_string();
        options.local_echo = true;
        let (mut session, out) = session_with(options);
        let mut device = MockDevice::default();

        session.process_input(&mut device, b"\n");
        assert_eq!(device.written, b"\r\n");
        assert_eq!(out.contents(), b"\r\n");
        assert_eq!(session.statistics().tx_total, 2);
    }

    #[test]
    fn test_session_log_captures_device_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.log");
        let mut options = base_options();
        options.log = Some(path.clone());
        let (mut session, _) = session_with(options);

        session.process_device_bytes(b"hello\n");
        drop(session);

        let captured = std::fs::read(&path).unwrap();
        assert_eq!(captured, b"hello\n");
    }

    #[test]
    fn test_echo_toggle_round_trip() {
        let (mut session, out) = session_with(base_options());
        let mut device = MockDevice::default();

        session.process_input(&mut device, b"a");
        assert!(!out.contents().starts_with(b"a"));

        session.process_input(&mut device, &[ESCAPE_KEY, b'e']);
        session.process_input(&mut device, b"b");
        let rendered = out.contents();
        assert_eq!(rendered.last(), Some(&b'b'));
        assert_eq!(device.written, b"ab");
    }

    #[test]
    fn test_statistics_monotone_across_many_batches() {
        let (mut session, _) = session_with(base_options());
        let mut device = MockDevice::default();
        let mut previous = session.statistics();
        for round in 1..=10u64 {
            session.process_input(&mut device, b"out");
            session.process_device_bytes(b"in");
            let stats = session.statistics();
            assert!(stats.tx_total >= previous.tx_total);
            assert!(stats.rx_total >= previous.rx_total);
            assert_eq!(stats.tx_total, round * 3);
            assert_eq!(stats.rx_total, round * 2);
            previous = stats;
        }
    }

    #[test]
    fn test_hex_toggle_affects_send_validation() {
        let (mut session, out) = session_with(base_options());
        let mut device = MockDevice::default();

        assert_eq!(session.print_mode(), PrintMode::Normal);
        session.process_input(&mut device, &[ESCAPE_KEY, b'h']);
        assert_eq!(session.print_mode(), PrintMode::Hex);

        session.process_input(&mut device, b"zz");
        assert!(device.written.is_empty());
        let rendered = String::from_utf8(out.contents()).unwrap();
        assert!(rendered.contains("Invalid hex character"));
    }
}
