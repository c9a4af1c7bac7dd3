use termlink::{
    DeviceSettings, ErrorSlots, Options, Session, TermLinkError, TermLinkResult,
};

/// Error taxonomy and resilience tests
#[cfg(test)]
mod error_handling_tests {
    use super::*;

    fn options() -> Options {
        Options {
            device: "/dev/ttyUSB0".to_string(),
            ..Options::default()
        }
    }

    #[test]
    fn test_error_types_display() {
        let errors = vec![
            TermLinkError::Configuration {
                field: "parity",
                message: "unknown mode mark".to_string(),
            },
            TermLinkError::DeviceUnavailable("No such file or directory".to_string()),
            TermLinkError::LockConflict,
            TermLinkError::NotATerminal,
            TermLinkError::RuntimeIo("read failed".to_string()),
            TermLinkError::ReadinessWait("EBADF".to_string()),
            TermLinkError::InvalidInput("bad hex".to_string()),
        ];

        for error in errors {
            assert!(!error.to_string().is_empty());
        }

        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<TermLinkError>();
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let error: TermLinkError = io_error.into();
        assert!(matches!(error, TermLinkError::Io(_)));
    }

    #[test]
    fn test_result_alias() {
        fn ok() -> TermLinkResult<u8> {
            Ok(42)
        }
        assert_eq!(ok().unwrap(), 42);
    }

    #[test]
    fn test_illegal_line_parameters_rejected() {
        let cases: Vec<(&str, Options)> = vec![
            ("data bits", {
                let mut o = options();
                o.databits = 9;
                o
            }),
            ("stop bits", {
                let mut o = options();
                o.stopbits = 3;
                o
            }),
            ("parity", {
                let mut o = options();
                o.parity = "space".to_string();
                o
            }),
            ("flow control", {
                let mut o = options();
                o.flow = "xonxoff".to_string();
                o
            }),
        ];

        for (expected_field, opts) in cases {
            match DeviceSettings::from_options(&opts) {
                Err(TermLinkError::Configuration { field, .. }) => {
                    assert_eq!(field, expected_field)
                }
                other => panic!("expected configuration error, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_legal_line_parameters_accepted() {
        for databits in [5u8, 6, 7, 8] {
            for parity in ["odd", "even", "none"] {
                for stopbits in [1u8, 2] {
                    for flow in ["hard", "soft", "none"] {
                        let mut opts = options();
                        opts.databits = databits;
                        opts.parity = parity.to_string();
                        opts.stopbits = stopbits;
                        opts.flow = flow.to_string();
                        assert!(DeviceSettings::from_options(&opts).is_ok());
                    }
                }
            }
        }
    }

    #[test]
    fn test_session_rejects_bad_configuration_before_device() {
        let mut opts = options();
        opts.map = "BOGUS".to_string();
        assert!(matches!(
            Session::new(opts),
            Err(TermLinkError::Configuration { field: "map", .. })
        ));

        let mut opts = options();
        opts.databits = 4;
        assert!(matches!(
            Session::new(opts),
            Err(TermLinkError::Configuration { field: "data bits", .. })
        ));
    }

    #[test]
    fn test_error_slot_selection() {
        let mut slots = ErrorSlots::default();
        slots.record_silent("could not open device");
        assert_eq!(slots.exit_message(false), None);
        assert_eq!(slots.exit_message(true), Some("could not open device"));

        slots.record_loud("device file is locked");
        assert_eq!(slots.exit_message(false), Some("device file is locked"));
    }
}
