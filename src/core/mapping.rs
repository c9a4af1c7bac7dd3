//! Byte-mapping flags parsed from the comma-separated map list.

use crate::domain::error::{TermLinkError, TermLinkResult};

/// Enabled character transformations.
///
/// INLCR, IGNCR and ICRNL are programmed into the device driver
/// itself; the remaining flags need byte expansion the driver cannot
/// express and are applied by the session pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingConfig {
    /// Map NL to CR on input (device driver)
    pub inlcr: bool,
    /// Ignore CR on input (device driver)
    pub igncr: bool,
    /// Map CR to NL on input (device driver)
    pub icrnl: bool,
    /// Map CR to NL on output
    pub o_cr_nl: bool,
    /// Map DEL to BS on output
    pub o_del_bs: bool,
    /// Print received NL as CR-NL
    pub i_nl_crnl: bool,
    /// Map NL and CR to CR-NL on output
    pub o_nl_crnl: bool,
}

impl MappingConfig {
    /// Parse a comma-separated flag list; any unrecognized token fails
    /// the whole configuration.
    pub fn parse(list: &str) -> TermLinkResult<Self> {
        let mut config = Self::default();
        for token in list.split(',').filter(|token| !token.is_empty()) {
            match token {
                "INLCR" => config.inlcr = true,
                "IGNCR" => config.igncr = true,
                "ICRNL" => config.icrnl = true,
                "OCRNL" => config.o_cr_nl = true,
                "ODELBS" => config.o_del_bs = true,
                "INLCRNL" => config.i_nl_crnl = true,
                "ONLCRNL" => config.o_nl_crnl = true,
                unknown => {
                    return Err(TermLinkError::Configuration {
                        field: "map",
                        message: format!("unknown mapping flag {unknown}"),
                    })
                }
            }
        }
        Ok(config)
    }

    /// True when some flag must be programmed into the device driver.
    pub fn wants_input_flags(&self) -> bool {
        self.inlcr || self.igncr || self.icrnl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_list() {
        let config = MappingConfig::parse("").unwrap();
        assert_eq!(config, MappingConfig::default());
        assert!(!config.wants_input_flags());
    }

    #[test]
    fn test_all_flags() {
        let config =
            MappingConfig::parse("INLCR,IGNCR,ICRNL,OCRNL,ODELBS,INLCRNL,ONLCRNL").unwrap();
        assert!(config.inlcr);
        assert!(config.igncr);
        assert!(config.icrnl);
        assert!(config.o_cr_nl);
        assert!(config.o_del_bs);
        assert!(config.i_nl_crnl);
        assert!(config.o_nl_crnl);
        assert!(config.wants_input_flags());
    }

    #[test]
    fn test_single_pipeline_flag() {
        let config = MappingConfig::parse("ONLCRNL").unwrap();
        assert!(config.o_nl_crnl);
        assert!(!config.wants_input_flags());
    }

    #[test]
    fn test_unknown_flag_fails() {
        let err = MappingConfig::parse("INLCR,NOPE").unwrap_err();
        match err {
            TermLinkError::Configuration { field, message } => {
                assert_eq!(field, "map");
                assert!(message.contains("NOPE"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_lowercase_rejected() {
        assert!(MappingConfig::parse("inlcr").is_err());
    }
}
